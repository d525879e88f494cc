use std::{path::Path, sync::Arc};

use {
    anyhow::Context,
    switchboard_config::SwitchboardConfig,
    switchboard_messages::MessageStore,
    switchboard_pipeline::{NoopPublisher, PayloadReport, Pipeline, PipelineConfig},
    tracing::warn,
};

use crate::db_commands::open_store;

/// Outcome of one payload file.
#[derive(Debug)]
enum FileResult {
    Processed(PayloadReport),
    Failed(String),
}

/// Feed every `*.json` file in `dir` through the pipeline, in file-name
/// order, then print store totals.
pub async fn process_payloads(config: &SwitchboardConfig, dir: &Path) -> anyhow::Result<()> {
    let files = payload_files(dir).await?;
    if files.is_empty() {
        println!("No JSON files found in {}", dir.display());
        return Ok(());
    }
    println!("Found {} JSON file(s) to process", files.len());

    let store = Arc::new(open_store(config).await?);
    let pipeline = Pipeline::new(
        Arc::clone(&store) as _,
        Arc::new(NoopPublisher),
        PipelineConfig::from(config),
    );

    let mut processed = 0;
    let mut failed = 0;
    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match process_file(&pipeline, path).await {
            FileResult::Processed(report) => {
                processed += 1;
                println!(
                    "ok   {name}: {} event(s), {} stored, {} duplicate(s), {} status update(s)",
                    report.events, report.stored, report.duplicates, report.statuses_applied
                );
            },
            FileResult::Failed(reason) => {
                failed += 1;
                warn!(file = %name, error = %reason, "payload file skipped");
                println!("fail {name}: {reason}");
            },
        }
    }

    let stats = store.stats().await?;
    println!();
    println!("Files: {} total, {processed} processed, {failed} failed", files.len());
    println!(
        "Store: {} message(s) across {} conversation(s)",
        stats.messages, stats.conversations
    );
    store.pool().close().await;
    Ok(())
}

async fn payload_files(dir: &Path) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("payload directory not readable: {}", dir.display()))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn process_file(pipeline: &Pipeline, path: &Path) -> FileResult {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) => return FileResult::Failed(e.to_string()),
    };
    let payload: serde_json::Value = match serde_json::from_slice(&raw) {
        Ok(payload) => payload,
        Err(e) => return FileResult::Failed(format!("invalid JSON: {e}")),
    };
    FileResult::Processed(pipeline.process_payload(&payload).await)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn message_payload(id: &str) -> serde_json::Value {
        json!({
            "metaData": {
                "entry": [{
                    "changes": [{
                        "value": {
                            "metadata": { "phone_number_id": "918329446654" },
                            "messages": [{
                                "id": id,
                                "from": "919937320320",
                                "timestamp": "1754400000",
                                "type": "text",
                                "text": { "body": "Hi" },
                            }],
                        },
                    }],
                }],
            }
        })
    }

    fn config_in(dir: &tempfile::TempDir) -> SwitchboardConfig {
        let mut config = SwitchboardConfig::default();
        config.database.path = Some(dir.path().join("switchboard.db"));
        config
    }

    #[tokio::test]
    async fn only_json_files_are_picked_up_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = payload_files(dir.path()).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.json", "b.json"]);
    }

    #[tokio::test]
    async fn bad_files_do_not_stop_the_batch() {
        let payloads = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        std::fs::write(
            payloads.path().join("1.json"),
            message_payload("wamid.1").to_string(),
        )
        .unwrap();
        std::fs::write(payloads.path().join("2.json"), "{ broken").unwrap();
        std::fs::write(
            payloads.path().join("3.json"),
            message_payload("wamid.1").to_string(),
        )
        .unwrap();

        let config = config_in(&data);
        process_payloads(&config, payloads.path()).await.unwrap();

        let store = open_store(&config).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.messages, 1);
        assert_eq!(stats.conversations, 1);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        assert!(
            process_payloads(&config, &dir.path().join("nope"))
                .await
                .is_err()
        );
    }
}
