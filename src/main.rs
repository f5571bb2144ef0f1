use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use futures::future::join_all;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crpt_api::config::CrptConfig;
use crpt_api::ratelimit::{AdmissionPolicy, TimeWindow};
use crpt_api::{Document, DocumentSubmitter};

/// Submit registration documents to the CRPT API under a request rate limit.
#[derive(Debug, Parser)]
#[command(name = "crpt-submit", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum requests per time unit
    #[arg(long)]
    limit: Option<u64>,

    /// Time unit of the limit (second, minute, hour, day)
    #[arg(long)]
    unit: Option<TimeWindow>,

    /// What to do when the limit is reached (block, reject)
    #[arg(long)]
    policy: Option<AdmissionPolicy>,

    /// Override the document creation endpoint
    #[arg(long)]
    endpoint: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Document files (JSON) to submit
    #[arg(required = true)]
    documents: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = CrptConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(limit) = args.limit {
        config.limiter.request_limit = limit;
    }
    if let Some(unit) = args.unit {
        config.limiter.time_unit = unit;
    }
    if let Some(policy) = args.policy {
        config.limiter.policy = policy;
    }
    if let Some(endpoint) = args.endpoint {
        config.transport.endpoint = endpoint;
    }
    config.validate()?;
    info!(
        endpoint = %config.transport.endpoint,
        limit = config.limiter.request_limit,
        unit = ?config.limiter.time_unit,
        policy = ?config.limiter.policy,
        "Configuration loaded"
    );

    let documents = args
        .documents
        .iter()
        .map(|path| -> anyhow::Result<_> {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let document = Document::from_json(&json)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok((path, document))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let submitter = DocumentSubmitter::from_config(&config)?;

    let results = join_all(documents.iter().map(|(path, document)| {
        let submitter = &submitter;
        async move { (path, submitter.submit(document).await) }
    }))
    .await;

    submitter.close().await;

    let mut failed = 0usize;
    for (path, result) in &results {
        match result {
            Ok(()) => info!(file = %path.display(), "Document submitted"),
            Err(e) => {
                failed += 1;
                error!(
                    file = %path.display(),
                    error = %e,
                    retryable = e.is_retryable(),
                    "Document submission failed"
                );
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} documents failed", failed, results.len());
    }

    info!(count = results.len(), "All documents submitted");
    Ok(())
}
