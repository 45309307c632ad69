//! gitsha
//!
//! Probes every short SHA of a fixed length against a GitHub repository and
//! appends the ones that resolve to a match log. Progress is checkpointed, so
//! an interrupted scan picks up after the last completed probe.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use prefix_scanner::{
    shutdown, CheckpointPolicy, FileCheckpointStore, FileMatchLog, HttpFetcher, ScanConfig,
    ScanEngine, UrlTemplate,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gitsha")]
#[command(version, about = "Find commits a repository still serves by short SHA")]
struct Cli {
    /// Repository to probe, as owner/repo
    #[arg(short, long, required_unless_present = "url_template")]
    repo: Option<String>,

    /// Characters per short SHA [default: 4]
    #[arg(short, long)]
    length: Option<usize>,

    /// Maximum requests in flight [default: 20]
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Seconds to hold new requests after a rate-limit response [default: 30]
    #[arg(long)]
    cooldown_secs: Option<u64>,

    /// Per-request timeout in seconds [default: 10]
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Where progress is saved
    #[arg(long, env = "GITSHA_CHECKPOINT_FILE", default_value = FileCheckpointStore::DEFAULT_PATH)]
    checkpoint_file: PathBuf,

    /// Where found SHAs are appended
    #[arg(long, env = "GITSHA_MATCHES_FILE", default_value = FileMatchLog::DEFAULT_PATH)]
    matches_file: PathBuf,

    /// Which completed SHA is saved: latest or watermark
    #[arg(long)]
    policy: Option<CheckpointPolicy>,

    /// Start over from the first SHA after the last one
    #[arg(long)]
    continuous: bool,

    /// Probe URL with a {candidate} placeholder, instead of GitHub commits
    #[arg(long)]
    url_template: Option<String>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Environment configuration with command-line overrides applied.
    fn scan_config(&self) -> Result<ScanConfig> {
        let mut config = ScanConfig::from_env().context("invalid GITSHA_* environment")?;

        if let Some(length) = self.length {
            config = config.with_length(length);
        }
        if let Some(concurrency) = self.concurrency {
            config = config.with_concurrency(concurrency);
        }
        if let Some(secs) = self.cooldown_secs {
            config = config.with_cooldown(Duration::from_secs(secs));
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_probe_timeout(Duration::from_secs(secs));
        }
        if let Some(policy) = self.policy {
            config = config.with_policy(policy);
        }
        if self.continuous {
            config = config.continuous();
        }

        Ok(config)
    }

    fn url_template(&self) -> Result<UrlTemplate> {
        let template = match (&self.url_template, &self.repo) {
            (Some(template), _) => UrlTemplate::new(template)?,
            (None, Some(repo)) => UrlTemplate::github_commit(repo)?,
            (None, None) => bail!("either --repo or --url-template is required"),
        };
        Ok(template)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables before clap reads its env fallbacks
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,prefix_scanner=info,gitsha=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let config = cli.scan_config()?;
    let template = cli.url_template()?;
    let fetcher = HttpFetcher::new().context("failed to build HTTP client")?;

    tracing::info!(
        checkpoint = %cli.checkpoint_file.display(),
        matches = %cli.matches_file.display(),
        "starting gitsha"
    );

    let engine = ScanEngine::new(
        template,
        Arc::new(fetcher),
        Arc::new(FileCheckpointStore::new(&cli.checkpoint_file)),
        Arc::new(FileMatchLog::new(&cli.matches_file)),
    )
    .with_config(config);

    let listener = shutdown::listen(engine.shutdown_token());
    let report = engine.run().await.context("scan could not start")?;
    listener.abort();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for found in &report.matches {
            println!("found {found}");
        }
        println!("{report}");
    }

    Ok(())
}
