use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::SwitchboardConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "switchboard.toml",
    "switchboard.yaml",
    "switchboard.yml",
    "switchboard.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<SwitchboardConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.display().to_string(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `<config_dir>/switchboard.*` when an explicit directory is given
/// 2. `./switchboard.{toml,yaml,yml,json}` (project-local)
/// 3. `~/.config/switchboard/switchboard.*` (user-global)
///
/// Returns `SwitchboardConfig::default()` if no config file is found or the
/// file fails to parse.
pub fn discover_and_load(config_dir: Option<&Path>) -> SwitchboardConfig {
    if let Some(path) = find_config_file(config_dir) {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    SwitchboardConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file(config_dir: Option<&Path>) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    if let Some(dir) = config_dir {
        dirs.push(dir.to_path_buf());
    }
    dirs.push(PathBuf::from("."));
    if let Some(dir) = self::config_dir() {
        dirs.push(dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/switchboard/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "switchboard").map(|d| d.config_dir().to_path_buf())
}

/// Returns the data directory holding `switchboard.db`.
///
/// Falls back to `./data` when no home directory can be resolved.
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "switchboard")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Apply `SWITCHBOARD_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut SwitchboardConfig) -> Result<()> {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    config: &mut SwitchboardConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(bind) = lookup("SWITCHBOARD_BIND") {
        config.server.bind = bind;
    }
    if let Some(port) = lookup("SWITCHBOARD_PORT") {
        config.server.port = port
            .trim()
            .parse()
            .with_context(|| format!("SWITCHBOARD_PORT={port}"))?;
    }
    if let Some(path) = lookup("SWITCHBOARD_DB_PATH") {
        config.database.path = Some(PathBuf::from(path));
    }
    Ok(())
}

fn parse_config(raw: &str, path: &Path) -> Result<SwitchboardConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
