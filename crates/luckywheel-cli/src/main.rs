//! Luckywheel CLI - daily spin quota for a lucky wheel
//!
//! Spins the wheel, shows the remaining daily quota and prize history, and
//! can keep the periodic midnight reset running.

mod commands;
mod output;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use luckywheel_core::{
    db, Database, DailyQuotaTracker, MemoryStorage, QuotaStorage, SqliteStorage, SystemClock,
    TrackerConfig,
};

#[derive(Parser)]
#[command(name = "luckywheel")]
#[command(author, version, about = "Lucky wheel with a daily spin quota", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Override database path (or set LUCKYWHEEL_DB_PATH env var)
    #[arg(long, env = "LUCKYWHEEL_DB_PATH", global = true)]
    db: Option<String>,

    /// Keep state in memory only, nothing is saved
    #[arg(long, global = true)]
    memory: bool,

    /// Separate quota namespace, e.g. one per user
    #[arg(long, env = "LUCKYWHEEL_PROFILE", global = true)]
    profile: Option<String>,

    /// Spins granted each day
    #[arg(long, env = "LUCKYWHEEL_DAILY_ALLOWANCE", global = true, default_value = "10")]
    allowance: u32,

    /// Number of spin records kept
    #[arg(long, env = "LUCKYWHEEL_HISTORY_LIMIT", global = true, default_value = "50")]
    history_limit: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Show remaining spins and the next reset time
    Status,

    /// Use one spin
    Spin(commands::spin::SpinArgs),

    /// List recent spins, newest first
    History {
        /// Maximum number of records to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Refill today's quota
    Refill {
        /// Spins to grant (defaults to the daily allowance)
        #[arg(short, long)]
        spins: Option<u32>,
    },

    /// Delete the spin history, keeping the remaining count
    ClearHistory,

    /// Run the periodic daily reset check until stopped
    Watch(commands::watch::WatchArgs),
}

impl Cli {
    fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            daily_allowance: self.allowance,
            history_limit: self.history_limit,
            profile: self.profile.clone(),
        }
    }

    async fn open_storage(&self, out: &output::Printer) -> (Arc<dyn QuotaStorage>, &'static str) {
        if self.memory {
            return (Arc::new(MemoryStorage::new()), "memory");
        }

        let opened = match &self.db {
            Some(path) => match db::expand_path(path) {
                Ok(path) => Database::open(path).await,
                Err(e) => Err(e),
            },
            None => Database::new().await,
        };

        match opened {
            Ok(database) => (Arc::new(SqliteStorage::new(database.pool)), "sqlite"),
            Err(e) => {
                log::error!("Failed to open database: {}", e);
                out.warn(&format!("Database unavailable ({}), nothing will be saved", e));
                (Arc::new(MemoryStorage::new()), "memory")
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let out = output::Printer::new(cli.format, cli.quiet);

    let (storage, backend) = cli.open_storage(&out).await;
    let tracker =
        DailyQuotaTracker::load(cli.tracker_config(), storage, Arc::new(SystemClock)).await;

    // Create context for commands
    let ctx = commands::Context {
        tracker: Arc::new(tracker),
        out,
        backend,
    };

    // Execute command
    match cli.command {
        Commands::Status => commands::status::show_status(&ctx).await,
        Commands::Spin(args) => commands::spin::execute(&ctx, args).await,
        Commands::History { limit } => commands::status::show_history(&ctx, limit).await,
        Commands::Refill { spins } => commands::admin::refill(&ctx, spins).await,
        Commands::ClearHistory => commands::admin::clear_history(&ctx).await,
        Commands::Watch(args) => commands::watch::execute(&ctx, args).await,
    }
}
