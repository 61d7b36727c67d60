mod commands;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use coursecal_core::date_range::DayRange;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "coursecal=info,coursecal_core=info,coursecal_google=info,tower_http=info";
const VERBOSE_FILTER: &str = "coursecal=debug,coursecal_core=debug,coursecal_google=debug,tower_http=info";

#[derive(Parser)]
#[command(name = "coursecal")]
#[command(about = "Notify course participants about calendar changes and process registrations")]
struct Cli {
    /// Config file (defaults to $COURSECAL_CONFIG, then ~/.config/coursecal/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the admin calendar with history and notify participants
    Poll,
    /// Mail the upcoming schedule
    Schedule {
        /// Only this tag (e.g. "Salsa1")
        #[arg(short, long)]
        tag: Option<String>,

        /// First day to include (YYYY-MM-DD), used together with --to
        #[arg(long)]
        from: Option<String>,

        /// Last day to include (YYYY-MM-DD), used together with --from
        #[arg(long)]
        to: Option<String>,
    },
    /// Replace the push channel on the admin calendar
    RenewCalendarWatch,
    /// Restart the mailbox watch
    RenewGmailWatch,
    /// Process the registration mail after a mailbox history id
    Registration {
        #[arg(long)]
        history_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Poll => commands::poll::run(config).await,
        Commands::Schedule { tag, from, to } => {
            let days = day_filter(from.as_deref(), to.as_deref())?;
            commands::schedule::run(config, tag, days).await
        }
        Commands::RenewCalendarWatch => commands::watch::run_calendar(config).await,
        Commands::RenewGmailWatch => commands::watch::run_gmail(config).await,
        Commands::Registration { history_id } => commands::registration::run(config, &history_id).await,
    }
}

/// A day filter applies only when both ends are given.
fn day_filter(from: Option<&str>, to: Option<&str>) -> Result<Option<DayRange>> {
    match (from, to) {
        (Some(from), Some(to)) => Ok(Some(DayRange::from_args(from, to).map_err(|e| anyhow::anyhow!(e))?)),
        _ => Ok(None),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
