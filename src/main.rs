//! # Drive Recall CLI (`recall`)
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./config/recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall serve` | Start the HTTP API server |
//! | `recall ingest <ids…>` | Fetch, embed, and index Drive documents |
//! | `recall search "<query>"` | Search indexed documents |
//! | `recall files` | List Drive files that can be ingested |
//! | `recall auth-url` | Print the Google sign-in URL |
//! | `recall completions <shell>` | Print shell completions |
//!
//! Commands that talk to Drive read the access token from `--credential`
//! or `DRIVE_ACCESS_TOKEN`. Logging is controlled with `RUST_LOG`.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use drive_recall::{commands, config, server};
use drive_recall_core::ingest::IngestPolicy;
use drive_recall_core::source::Credential;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "recall",
    about = "Drive Recall: semantic search over your Google Drive documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve,

    /// Fetch, embed, and index documents by Drive file id.
    Ingest {
        /// Drive file ids.
        #[arg(required = true)]
        ids: Vec<String>,

        /// Google access token with Drive read scope.
        #[arg(long, env = "DRIVE_ACCESS_TOKEN", hide_env_values = true)]
        credential: String,

        /// `fail-fast` stops at the first error; `best-effort` continues.
        #[arg(long)]
        policy: Option<IngestPolicy>,

        /// Documents processed at once.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Search indexed documents.
    Search {
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List Drive files that can be ingested.
    Files {
        #[arg(long, env = "DRIVE_ACCESS_TOKEN", hide_env_values = true)]
        credential: String,
    },

    /// Print the Google sign-in URL.
    AuthUrl,

    /// Print shell completions to stdout.
    Completions { shell: Shell },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "recall", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => server::run_server(&cfg).await?,
        Commands::Ingest {
            ids,
            credential,
            policy,
            concurrency,
        } => {
            commands::run_ingest(&cfg, Credential::new(credential), ids, policy, concurrency).await?
        }
        Commands::Search { query, limit } => commands::run_search(&cfg, &query, limit).await?,
        Commands::Files { credential } => {
            commands::run_files(&cfg, Credential::new(credential)).await?
        }
        Commands::AuthUrl => commands::run_auth_url(&cfg)?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
