//! CLI command implementations.
//!
//! Each `run_*` function builds the services it needs from the config,
//! performs one operation, and prints a human-readable summary to stdout.
//!
//! `ingest` and `search` run in separate processes, so they need an index
//! that outlives the process. The in-memory index is only usable by `serve`.

use anyhow::{bail, Result};
use drive_recall_core::ingest::{DocumentOutcome, IngestPolicy, IngestReport, IngestRequest};
use drive_recall_core::models::{DocumentRef, SearchMatch};
use drive_recall_core::source::Credential;

use crate::config::Config;
use crate::drive::DriveClient;
use crate::services::Services;

/// Ingest `ids` and print one line per document.
///
/// Exits with an error when any document failed, so scripts can retry.
pub async fn run_ingest(
    config: &Config,
    credential: Credential,
    ids: Vec<String>,
    policy: Option<IngestPolicy>,
    concurrency: Option<usize>,
) -> Result<()> {
    require_durable_index(config)?;

    let mut config = config.clone();
    if let Some(policy) = policy {
        config.ingest.policy = policy;
    }
    if let Some(concurrency) = concurrency {
        config.ingest.concurrency = concurrency.max(1);
    }

    let services = Services::from_config(&config).await?;
    let report = services
        .ingestor
        .ingest(&IngestRequest::new(credential, ids))
        .await;
    print!("{}", format_report(&report));

    if !report.is_success() {
        bail!(
            "{} of {} documents were not indexed; retry with: {}",
            report.outcomes.len() - report.indexed_count(),
            report.outcomes.len(),
            report.retryable_ids().join(" ")
        );
    }
    Ok(())
}

/// Search and print ranked matches.
pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    require_durable_index(config)?;
    let services = Services::from_config(config).await?;
    let matches = services.retriever.search(query, limit).await?;

    if matches.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, hit) in matches.iter().enumerate() {
        print!("{}", format_match(i + 1, hit));
    }
    Ok(())
}

/// List the Drive files the credential can ingest.
pub async fn run_files(config: &Config, credential: Credential) -> Result<()> {
    let drive = DriveClient::new(&config.drive)?;
    let files = drive.list_files(&credential).await?;

    if files.is_empty() {
        println!("No files.");
        return Ok(());
    }
    for file in &files {
        println!("{}", format_file(file));
    }
    Ok(())
}

/// Print the Google consent URL.
pub fn run_auth_url(config: &Config) -> Result<()> {
    let Some(oauth) = &config.oauth else {
        bail!("[oauth] section is not configured");
    };
    let identity = crate::identity::GoogleIdentity::from_env(oauth)?;
    println!("{}", identity.authorization_url(&uuid::Uuid::new_v4().to_string())?);
    Ok(())
}

fn require_durable_index(config: &Config) -> Result<()> {
    if config.index.provider == "memory" {
        bail!(
            "index.provider = \"memory\" does not persist between commands; \
             configure [index] provider = \"pinecone\" or use `recall serve`"
        );
    }
    Ok(())
}

fn format_report(report: &IngestReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        match outcome {
            DocumentOutcome::Indexed { id } => out.push_str(&format!("indexed  {}\n", id)),
            DocumentOutcome::Failed { id, error } => {
                out.push_str(&format!("failed   {} ({})\n", id, error))
            }
            DocumentOutcome::Skipped { id } => out.push_str(&format!("skipped  {}\n", id)),
        }
    }
    out.push_str(&format!(
        "{} of {} documents indexed ({} policy)\n",
        report.indexed_count(),
        report.outcomes.len(),
        report.policy
    ));
    out
}

fn format_match(rank: usize, hit: &SearchMatch) -> String {
    let date = hit
        .metadata
        .modified_time
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default();
    let mut out = format!("{}. [{:.3}] {}\n", rank, hit.score, hit.metadata.name);
    if !date.is_empty() {
        out.push_str(&format!("    modified: {}\n", date));
    }
    if let Some(link) = &hit.metadata.web_view_link {
        out.push_str(&format!("    link: {}\n", link));
    }
    out.push_str(&format!("    id: {}\n\n", hit.id));
    out
}

fn format_file(file: &DocumentRef) -> String {
    format!("{}\t{}\t{}", file.id, file.content_type, file.name)
}
