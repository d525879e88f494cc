use std::path::Path;

use {anyhow::Result, clap::Subcommand};

use switchboard_config::{Severity, SwitchboardConfig, ValidationResult};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check,
    /// Print the effective configuration as TOML.
    Show,
}

pub fn handle_config(action: ConfigAction, config_dir: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check => check(config_dir),
        ConfigAction::Show => {
            let mut config = switchboard_config::discover_and_load(config_dir);
            switchboard_config::apply_env_overrides(&mut config)?;
            println!("{}", toml_string(&config)?);
            Ok(())
        },
    }
}

fn toml_string(config: &SwitchboardConfig) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(config_dir: Option<&Path>) -> Result<()> {
    let result = match switchboard_config::find_config_file(config_dir) {
        Some(path) => switchboard_config::validate_file(&path)?,
        None => switchboard_config::validate(&SwitchboardConfig::default()),
    };

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    report(&result);

    if result.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

fn report(result: &ValidationResult) {
    for d in &result.diagnostics {
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if !result.diagnostics.is_empty() {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shown_config_parses_back() {
        let rendered = toml_string(&SwitchboardConfig::default()).unwrap();
        assert!(rendered.contains("[server]"));
        let parsed: SwitchboardConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.server.port, 5000);
        assert_eq!(parsed.webhook.wrapper_field, "metaData");
    }
}
