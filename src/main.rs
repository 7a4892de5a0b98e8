//! # log-rag CLI (`logq`)
//!
//! Ask natural-language questions about application log files.
//!
//! ## Usage
//!
//! ```bash
//! logq --config ./config/logq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `logq init` | Create the SQLite database and run schema migrations |
//! | `logq ingest [paths]` | Parse, embed, and store log lines (incremental) |
//! | `logq watch [paths]` | Follow log files, ingest new lines, print alerts |
//! | `logq ask "<question>"` | Answer a question from the stored logs |
//! | `logq list` | List stored entries with optional filters |
//! | `logq get <id>` | Show one stored entry |
//! | `logq stats` | Counts by level, component, and period |
//! | `logq delete <ids>` | Remove entries by id |
//! | `logq serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! logq init
//! logq ingest ./logs
//! logq ask "why did the payment service fail?" --start 2025-01-10 --end 2025-01-15
//! logq list --level error --json
//! logq stats --period weekly
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use log_rag::ask::{self, AskArgs};
use log_rag::list::{self, build_filter, ListArgs};
use log_rag::progress::ProgressMode;
use log_rag::{config, entries, ingest, migrate, server, stats, watch};
use log_rag_core::models::LogLevel;
use log_rag_core::stats::Period;

/// log-rag: question answering over application logs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/logq.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "logq",
    about = "log-rag: ask questions about your application logs",
    version,
    long_about = "log-rag parses log files into timestamped entries, embeds them into a vector \
    store, and answers natural-language questions by retrieving the most similar entries and \
    asking a language model to summarise them."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/logq.toml")]
    config: PathBuf,

    /// Increase log verbosity on stderr (-v debug, -vv trace). `RUST_LOG`
    /// takes precedence when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Ingest log files.
    ///
    /// Each path may be a file or a directory (walked with
    /// `ingest.include_globs`). Without paths, `ingest.paths` is used.
    /// Files are read from their last checkpoint unless `--full` is given.
    Ingest {
        paths: Vec<PathBuf>,

        /// Ignore checkpoints and re-read every file from the start.
        #[arg(long)]
        full: bool,

        /// Parse only: print line, record, and malformed counts.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr.
        #[arg(long, value_enum, default_value_t = ProgressArg::Auto)]
        progress: ProgressArg,
    },

    /// Follow log files and ingest appended lines until interrupted.
    ///
    /// New ERROR and FATAL records are printed as alerts.
    Watch {
        paths: Vec<PathBuf>,

        /// Poll interval in seconds (default: `ingest.poll_interval_secs`).
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many polls.
        #[arg(long, hide = true)]
        max_polls: Option<u64>,
    },

    /// Answer a question from the stored logs.
    Ask {
        question: String,

        /// Only consider entries at or after this time
        /// (`YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`).
        #[arg(long)]
        start: Option<String>,

        /// Only consider entries at or before this time. A date-only value
        /// includes the whole day.
        #[arg(long)]
        end: Option<String>,

        /// Number of entries to retrieve, at least 1 (default: `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Derive time and level filters from the question text, and
        /// answer "how many X logs" / "show X" questions from the store.
        #[arg(long)]
        infer_filters: bool,

        /// Print `{answer_text, source_entries}` as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List stored entries, oldest first.
    List {
        /// Only these levels (repeatable).
        #[arg(long = "level")]
        levels: Vec<LogLevel>,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        /// Show at most this many entries.
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,

        /// Write the JSON export to this file instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show one stored entry by id.
    Get {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Show counts by level, component, and time period.
    Stats {
        /// Histogram bucket: hourly, daily, weekly, or monthly.
        #[arg(long, default_value = "daily")]
        period: Period,

        #[arg(long = "level")]
        levels: Vec<LogLevel>,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Delete entries by id.
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    /// Human progress when stderr is a terminal.
    Auto,
    Human,
    Json,
    Off,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Auto => ProgressMode::default_for_tty(),
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
            ProgressArg::Off => ProgressMode::Off,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "log_rag=debug,log_rag_core=debug,info",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            if cfg.store.backend == "memory" {
                println!("Memory backend: nothing to initialize.");
            } else {
                migrate::run_migrations(&cfg).await?;
                println!("Database initialized successfully.");
            }
        }
        Commands::Ingest {
            paths,
            full,
            dry_run,
            progress,
        } => {
            ingest::run_ingest(&cfg, paths, full, dry_run, progress.into()).await?;
        }
        Commands::Watch {
            paths,
            interval,
            max_polls,
        } => {
            watch::run_watch(&cfg, paths, interval, max_polls).await?;
        }
        Commands::Ask {
            question,
            start,
            end,
            top_k,
            infer_filters,
            json,
        } => {
            ask::run_ask(
                &cfg,
                AskArgs {
                    question,
                    start,
                    end,
                    top_k,
                    infer_filters,
                    json,
                },
            )
            .await?;
        }
        Commands::List {
            levels,
            start,
            end,
            limit,
            json,
            output,
        } => {
            list::run_list(
                &cfg,
                ListArgs {
                    levels,
                    start,
                    end,
                    limit,
                    json,
                    output,
                },
            )
            .await?;
        }
        Commands::Get { id, json } => {
            entries::run_get(&cfg, &id, json).await?;
        }
        Commands::Stats {
            period,
            levels,
            start,
            end,
            json,
        } => {
            let filter = build_filter(&levels, start.as_deref(), end.as_deref())?;
            stats::run_stats(&cfg, filter, period, json).await?;
        }
        Commands::Delete { ids } => {
            entries::run_delete(&cfg, ids).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
