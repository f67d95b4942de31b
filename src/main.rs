mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use phodiary::config::DiaryConfig;
use phodiary::service::DiaryService;

#[derive(Parser)]
#[command(name = "phodiary", version, about = "Photo diary engine maintenance commands")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Purge diaries that stayed in the trash past the retention window
    PurgeTrash {
        /// List what would be purged without deleting anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Geocode photos that are still missing a location
    ResolveLocations,
    /// Recompute a diary's album links from its photos
    Reconcile {
        diary_id: i64,
    },
    /// List an owner's albums
    Albums {
        owner_id: i64,
    },
    /// Check database integrity and print row counts
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = DiaryConfig::load()?;

    // Log to stderr so stdout stays clean for command output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Command::Doctor = cli.command {
        return cli::doctor::doctor(&config);
    }

    let service = DiaryService::from_config(config)?;
    match cli.command {
        Command::PurgeTrash { dry_run } => cli::trash::purge_trash(&service, dry_run).await?,
        Command::ResolveLocations => cli::locations::resolve_locations(&service).await?,
        Command::Reconcile { diary_id } => cli::albums::reconcile(&service, diary_id).await?,
        Command::Albums { owner_id } => cli::albums::albums(&service, owner_id).await?,
        Command::Doctor => {}
    }

    Ok(())
}
