//! # MGB Catalog CLI (`mgb`)
//!
//! The `mgb` binary drives catalog ingestion: schema setup, per-source
//! syncs, derived-field backfills and a stats summary.
//!
//! ## Usage
//!
//! ```bash
//! mgb --config ./config/mgb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `mgb init` | Create the SQLite database and run schema migrations |
//! | `mgb sources` | List sources and whether their credentials are set |
//! | `mgb sync <source>` | Ingest `books`, `games`, `movies`, `tv` or `trailers` |
//! | `mgb backfill release-dates` | Recompute `release_date` for every game |
//! | `mgb stats` | Print item counts and last sync times |
//!
//! Credentials come from the environment (a `.env` file is loaded first).
//! By default: `GOOGLE_API_KEY` for Google Books and YouTube, `CLIENT_ID`
//! and `AUTHORIZATION_GAMES_TOKEN` for IGDB, `TMDB_API_KEY` for TMDb.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use mgb_catalog::ingest::SyncOptions;
use mgb_catalog::progress::ProgressMode;
use mgb_catalog::{backfill, config, ingest, logging, migrate, sources, stats};

/// MGB Catalog CLI: pulls games, movies, TV shows and books from public
/// provider APIs into a local SQLite catalog.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/mgb.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "mgb",
    about = "MGB Catalog - multi-source media catalog ingestion",
    version,
    long_about = "MGB Catalog pages through Google Books, IGDB, TMDb and YouTube, \
    normalizes every record into one schema, and upserts it into SQLite keyed by the \
    provider's identifier. Re-running a sync updates rows in place."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/mgb.toml`.
    #[arg(long, global = true, default_value = "./config/mgb.toml")]
    config: PathBuf,

    /// Progress output on stderr: `off`, `human` or `json`.
    ///
    /// Defaults to `human` when stderr is a terminal and `off` otherwise.
    #[arg(long, global = true)]
    progress: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Safe to run repeatedly.
    Init,

    /// List sources and their credential status.
    Sources,

    /// Ingest one source.
    ///
    /// Source is one of `books`, `games`, `movies`, `tv`, `trailers`.
    Sync {
        source: String,

        /// Maximum number of items to store.
        #[arg(long)]
        limit: Option<usize>,

        /// Maximum number of pages to request.
        #[arg(long)]
        pages: Option<u32>,

        /// First page to request (games, movies and tv; rejected for books).
        #[arg(long)]
        start_page: Option<u32>,
    },

    /// Recompute derived fields over stored rows.
    Backfill {
        #[command(subcommand)]
        target: BackfillTarget,
    },

    /// Show catalog statistics.
    Stats,
}

#[derive(Subcommand)]
enum BackfillTarget {
    /// Derive `release_date` from each game's IGDB `first_release_date`.
    ReleaseDates,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::load_dotenv();
    logging::init_tracing("info,sqlx=warn")?;

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Sync {
            source,
            limit,
            pages,
            start_page,
        } => {
            let mode = match cli.progress.as_deref() {
                Some(value) => ProgressMode::parse(value)?,
                None => ProgressMode::default_for_tty(),
            };
            let reporter = mode.reporter();
            let options = SyncOptions {
                limit,
                pages,
                start_page,
            };
            ingest::run_sync(&cfg, &source, options, reporter.as_ref()).await?;
        }
        Commands::Backfill { target } => match target {
            BackfillTarget::ReleaseDates => {
                backfill::run_backfill_release_dates(&cfg).await?;
            }
        },
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
