//! CLI command implementations
//!
//! Commands are thin: load config, open the file-backed tables, hand
//! off to the core. The interactive pieces the core asks for — the
//! overwrite/duplicate decision and the quota download fallback — are
//! implemented here against stdin and the working directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::container::{import, Exporter, ParsedContainer};
use crate::graph::GraphsKeeper;
use crate::observability::Logger;
use crate::reconcile::{BlobPayload, BlobRef, BlobSource, ReconcileError, ReconcileResult};
use crate::save::{
    DecisionPrompt, FallbackSink, FixedPayload, SaveError, SaveOrchestrator, SaveOutcome,
    SaveResult,
};
use crate::state::RemoteStateLoader;
use crate::store::FileStore;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Parse arguments and run the selected command to completion
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let runtime = tokio::runtime::Runtime::new().map_err(CliError::io)?;
    runtime.block_on(run_command(cli.command))
}

async fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::List { config } => list(&config).await,
        Command::Save {
            config,
            title,
            payload,
            force,
        } => save(&config, &title, &payload, force).await,
        Command::Export { config, graph, out } => export(&config, &graph, &out).await,
        Command::Import {
            config,
            file,
            title,
            force,
        } => import_container(&config, &file, &title, force).await,
        Command::Delete { config, graph } => delete(&config, &graph).await,
        Command::Drop { config } => drop_all(&config).await,
        Command::Fetch { config, name, out } => fetch(&config, &name, out.as_deref()).await,
    }
}

async fn open_keeper(config: &Config) -> CliResult<GraphsKeeper<FileStore>> {
    let root = config.data_dir.as_path();
    Ok(GraphsKeeper::new(
        FileStore::open(root, "graph_meta").await?,
        FileStore::open(root, "graph_data").await?,
        FileStore::open(root, "blob_meta").await?,
        FileStore::open(root, "blob_data").await?,
        FileStore::open(root, "state").await?,
    ))
}

async fn open_orchestrator(
    config: &Config,
) -> CliResult<SaveOrchestrator<FileStore, StdinDecision, DownloadFallback>> {
    let keeper = open_keeper(config).await?;
    let fallback = DownloadFallback {
        dir: PathBuf::from("."),
    };
    Ok(SaveOrchestrator::open(keeper, StdinDecision, fallback).await?)
}

async fn list(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let orch = open_orchestrator(&config).await?;

    if orch.records().is_empty() {
        println!("no saved graphs");
        return Ok(());
    }
    for record in orch.records() {
        let marker = if orch.selected() == Some(record.graph_id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {}  \"{}\"  rev {}  {} bytes  {}",
            marker,
            record.graph_id,
            record.title,
            record.revisions,
            record.size,
            record.last_updated.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

async fn save(config_path: &Path, title: &str, payload_path: &Path, force: bool) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let bytes = std::fs::read(payload_path).map_err(CliError::io)?;
    let payload: Value = serde_json::from_slice(&bytes)
        .map_err(|e| CliError::input(format!("payload is not JSON: {}", e)))?;

    let keeper = open_keeper(&config).await?;
    let source = KeeperBlobSource(keeper.clone());
    let fallback = DownloadFallback {
        dir: PathBuf::from("."),
    };
    let mut orch = SaveOrchestrator::open(keeper, StdinDecision, fallback).await?;

    let live = live_refs_from_payload(&payload);
    let outcome = orch
        .resolve_save(title, &live, &source, &FixedPayload(payload), force)
        .await?;
    report_outcome(title, &outcome);
    Ok(())
}

async fn export(config_path: &Path, graph_id: &str, out: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let keeper = open_keeper(&config).await?;

    let record = keeper
        .load_record(graph_id)
        .await?
        .ok_or_else(|| CliError::input(format!("no record with graph id '{}'", graph_id)))?;

    let bytes = Exporter::new(&keeper).export(&record).await?;
    std::fs::write(out, &bytes).map_err(CliError::io)?;
    println!(
        "exported {} (\"{}\", {} bytes) to {}",
        graph_id,
        record.title,
        bytes.len(),
        out.display()
    );
    Ok(())
}

async fn import_container(
    config_path: &Path,
    file: &Path,
    title: &str,
    force: bool,
) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let bytes = std::fs::read(file).map_err(CliError::io)?;

    let keeper = open_keeper(&config).await?;
    let fallback = DownloadFallback {
        dir: PathBuf::from("."),
    };
    let mut orch = SaveOrchestrator::open(keeper, StdinDecision, fallback).await?;

    let outcome = match import(bytes)? {
        ParsedContainer::Current(current) => {
            // a missing attachment skips that one blob, never the import
            let mut prepared = PreparedBlobSource::default();
            let mut live = Vec::new();
            for meta in current.blob_meta().values() {
                match current.blob(&meta.blob_id) {
                    Ok(content) => {
                        live.push(BlobRef::new(&meta.blob_id, &meta.title));
                        prepared.blobs.insert(
                            meta.blob_id.clone(),
                            BlobPayload {
                                bytes: content.bytes,
                                content_type: content.content_type,
                            },
                        );
                    }
                    Err(e) if !e.is_fatal() => Logger::warn(
                        "ATTACHMENT_SKIPPED",
                        &[("blobId", meta.blob_id.as_str()), ("reason", &e.to_string())],
                    ),
                    Err(e) => return Err(e.into()),
                }
            }
            let payload = FixedPayload(current.payload().clone());
            orch.resolve_save(title, &live, &prepared, &payload, force)
                .await?
        }
        ParsedContainer::LegacyStructured(mut legacy) => {
            // materialize every blob up front; the substitution scheme
            // marks each reference as its blob is resolved
            let ids: Vec<String> = legacy.blob_meta().keys().cloned().collect();
            let mut prepared = PreparedBlobSource::default();
            let mut live = Vec::with_capacity(ids.len());
            for blob_id in ids {
                let content = legacy.blob(&blob_id)?;
                let meta = &legacy.blob_meta()[&blob_id];
                live.push(BlobRef::new(&blob_id, &meta.title));
                prepared.blobs.insert(
                    blob_id,
                    BlobPayload {
                        bytes: content.bytes,
                        content_type: content.content_type,
                    },
                );
            }
            let payload = FixedPayload(Value::String(legacy.final_data()));
            orch.resolve_save(title, &live, &prepared, &payload, force)
                .await?
        }
        ParsedContainer::Legacy(text) => {
            let payload = FixedPayload(Value::String(text));
            orch.resolve_save(title, &[], &NoBlobSource, &payload, force)
                .await?
        }
    };
    report_outcome(title, &outcome);
    Ok(())
}

async fn delete(config_path: &Path, graph_id: &str) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let mut orch = open_orchestrator(&config).await?;
    orch.delete(graph_id).await?;
    println!("deleted {}", graph_id);
    Ok(())
}

async fn drop_all(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let keeper = open_keeper(&config).await?;
    keeper.drop_all().await?;
    println!("dropped all tables under {}", config.data_dir.display());
    Ok(())
}

async fn fetch(config_path: &Path, name: &str, out: Option<&Path>) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let loader = RemoteStateLoader::new(config.state_base_url.clone(), config.state_fetch_timeout());
    let body = loader.fetch(name).await?;

    match out {
        Some(path) => {
            std::fs::write(path, body.as_bytes()).map_err(CliError::io)?;
            println!("wrote state '{}' to {}", name, path.display());
        }
        None => match import(body.into_bytes())? {
            ParsedContainer::Current(current) => println!(
                "state '{}' is a current container with {} blob(s)",
                name,
                current.blob_meta().len()
            ),
            ParsedContainer::LegacyStructured(legacy) => println!(
                "state '{}' is a legacy structured container with {} blob(s)",
                name,
                legacy.blob_meta().len()
            ),
            ParsedContainer::Legacy(text) => {
                println!("state '{}' is legacy text ({} bytes)", name, text.len())
            }
        },
    }
    Ok(())
}

fn report_outcome(title: &str, outcome: &SaveOutcome) {
    match outcome {
        SaveOutcome::Created { graph_id } => println!("saved \"{}\" as {}", title, graph_id),
        SaveOutcome::OverwroteAll { graph_ids } => {
            println!("overwrote {} save(s) of \"{}\"", graph_ids.len(), title)
        }
        SaveOutcome::Duplicated { graph_id } => {
            println!("saved \"{}\" as duplicate {}", title, graph_id)
        }
        SaveOutcome::SavedToFallback => {
            println!("storage full; \"{}\" was written as a download file", title)
        }
        SaveOutcome::FallbackDeclined => {
            println!("storage full; \"{}\" was NOT saved", title)
        }
    }
}

/// Collect live blob references from a payload by walking it for
/// objects carrying a string `blob` field; the sibling `title` field
/// names the reference when present.
fn live_refs_from_payload(payload: &Value) -> Vec<BlobRef> {
    let mut refs = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    walk_for_refs(payload, &mut refs, &mut seen);
    refs
}

fn walk_for_refs(
    value: &Value,
    refs: &mut Vec<BlobRef>,
    seen: &mut std::collections::BTreeSet<String>,
) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(blob_id)) = obj.get("blob") {
                if seen.insert(blob_id.clone()) {
                    let title = obj
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or(blob_id.as_str());
                    refs.push(BlobRef::new(blob_id, title));
                }
            }
            for nested in obj.values() {
                walk_for_refs(nested, refs, seen);
            }
        }
        Value::Array(items) => {
            for nested in items {
                walk_for_refs(nested, refs, seen);
            }
        }
        _ => {}
    }
}

/// Yes/no decision read from stdin
struct StdinDecision;

#[async_trait]
impl DecisionPrompt for StdinDecision {
    async fn confirm(&self, prompt: &str) -> bool {
        eprint!("{} [y/N] ", prompt);
        let _ = std::io::stderr().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim(), "y" | "Y" | "yes")
    }
}

/// Quota fallback: write the payload as `<title>.json` in `dir`
struct DownloadFallback {
    dir: PathBuf,
}

#[async_trait]
impl FallbackSink for DownloadFallback {
    async fn deliver(&self, title: &str, bytes: Vec<u8>) -> SaveResult<()> {
        let path = self.dir.join(format!("{}.json", sanitize_title(title)));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| SaveError::Fallback(format!("write {}: {}", path.display(), e)))?;
        println!("download written to {}", path.display());
        Ok(())
    }
}

fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' | ' ' => c,
            _ => '_',
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Blob source backed by the persisted blob table; only consulted for
/// references that are not already in the graph's metadata map
struct KeeperBlobSource(GraphsKeeper<FileStore>);

#[async_trait]
impl BlobSource for KeeperBlobSource {
    async fn fetch(&self, reference: &BlobRef) -> ReconcileResult<BlobPayload> {
        match self.0.load_blob(&reference.blob_id).await? {
            Some(bytes) => Ok(BlobPayload {
                bytes,
                content_type: "application/octet-stream".to_string(),
            }),
            None => Err(ReconcileError::fetch(
                &reference.blob_id,
                "payload references a blob that is not stored",
            )),
        }
    }
}

/// Pre-materialized blobs for container imports
#[derive(Default)]
struct PreparedBlobSource {
    blobs: std::collections::BTreeMap<String, BlobPayload>,
}

#[async_trait]
impl BlobSource for PreparedBlobSource {
    async fn fetch(&self, reference: &BlobRef) -> ReconcileResult<BlobPayload> {
        self.blobs
            .get(&reference.blob_id)
            .cloned()
            .ok_or_else(|| ReconcileError::fetch(&reference.blob_id, "blob not in container"))
    }
}

/// For payloads that hold no blob references at all
struct NoBlobSource;

#[async_trait]
impl BlobSource for NoBlobSource {
    async fn fetch(&self, reference: &BlobRef) -> ReconcileResult<BlobPayload> {
        Err(ReconcileError::fetch(&reference.blob_id, "no blob source"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_live_refs_walk_nested_payload() {
        let payload = json!({
            "nodes": {
                "n1": { "title": "photo", "blob": "1.blob" },
                "n2": { "title": "plain" },
                "n3": { "children": [ { "blob": "2.blob" } ] }
            }
        });

        let refs = live_refs_from_payload(&payload);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], BlobRef::new("1.blob", "photo"));
        assert_eq!(refs[1], BlobRef::new("2.blob", "2.blob"));
    }

    #[test]
    fn test_live_refs_deduplicate() {
        let payload = json!([
            { "blob": "1.blob", "title": "first" },
            { "blob": "1.blob", "title": "second" }
        ]);

        let refs = live_refs_from_payload(&payload);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].title, "first");
    }

    #[test]
    fn test_live_refs_ignore_non_string_blob() {
        let payload = json!({ "blob": 7 });
        assert!(live_refs_from_payload(&payload).is_empty());
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("My Graph"), "My Graph");
        assert_eq!(sanitize_title("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_title("  "), "untitled");
    }
}
