//! Kitlist CLI - Command-line interface for the offline-first packing manager
//!
//! Shows the sync badge, inspects the pending queue, and resolves conflicts;
//! the entity commands exercise the store + tracker write path end to end.

use std::env;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use kitlist_core::conflict::{ConflictResolver, ResolutionStrategy};
use kitlist_core::connectivity::ConnectivityConfig;
use kitlist_core::db::{
    ChangeRepository, ConflictRepository, Database, EntityStore, MetaRepository, PersistenceMode,
};
use kitlist_core::models::{Item, SyncConflict, Trip};
use kitlist_core::mutations::MutationContext;
use kitlist_core::state::SyncState;
use kitlist_core::sync::SyncRegistry;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "kitlist")]
#[command(about = "Offline-first packing lists from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH", global = true)]
    db_path: Option<PathBuf>,

    /// Demo mode: reads work, writes are dropped
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Actor id recorded on tracked changes
    #[arg(long, value_name = "ID", global = true)]
    user: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the sync badge (online, syncing, pending, conflicts)
    Status {
        /// Probe backend reachability first
        #[arg(long)]
        probe: bool,
    },
    /// List changes waiting on the remote
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List unresolved conflicts with suggested resolutions
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a conflict
    Resolve {
        /// Conflict id
        id: String,
        /// Winning side
        #[arg(value_enum)]
        strategy: CliStrategy,
    },
    /// Manage trips
    #[command(subcommand)]
    Trip(TripCommands),
    /// Manage packable items
    #[command(subcommand)]
    Item(ItemCommands),
    /// Show this device's sync identifier
    Device,
}

#[derive(Subcommand)]
enum TripCommands {
    /// Create a trip
    Add {
        /// Trip name
        name: String,
        /// Where the trip goes
        #[arg(long)]
        destination: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,
    },
    /// List trips
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Soft-delete a trip
    Delete {
        /// Trip id
        id: String,
    },
}

#[derive(Subcommand)]
enum ItemCommands {
    /// Add an item to a trip
    Add {
        /// Owning trip id
        trip_id: String,
        /// Item name
        name: String,
        /// Category label
        #[arg(long, default_value = "general")]
        category: String,
        /// How many to pack
        #[arg(long, default_value = "1")]
        quantity: u32,
    },
    /// List a trip's items
    List {
        /// Owning trip id
        trip_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark an item packed (or unpacked)
    Pack {
        /// Item id
        id: String,
        /// Mark unpacked instead
        #[arg(long)]
        unpack: bool,
    },
    /// Soft-delete an item
    Delete {
        /// Item id
        id: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CliStrategy {
    /// Keep the local snapshot
    Local,
    /// Keep the server snapshot
    Server,
    /// Merge both (server wins collisions)
    Merge,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] kitlist_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Unknown item: {0}")]
    ItemNotFound(String),
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kitlist=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let mode = if cli.ephemeral {
        PersistenceMode::Ephemeral
    } else {
        PersistenceMode::Durable
    };
    let user_id = resolve_user_id(cli.user);

    let db = open_database(&db_path, mode).await?;

    match cli.command {
        Commands::Status { probe } => run_status(db, probe).await?,
        Commands::Pending { json } => run_pending(&db, json).await?,
        Commands::Conflicts { json } => run_conflicts(&db, json).await?,
        Commands::Resolve { id, strategy } => run_resolve(db, &id, strategy).await?,
        Commands::Trip(command) => run_trip(&db, command, &user_id).await?,
        Commands::Item(command) => run_item(&db, command, &user_id).await?,
        Commands::Device => {
            let device_id = MetaRepository::new(&db).device_id().await?;
            println!("{device_id}");
        }
    }

    Ok(())
}

async fn run_status(db: Database, probe: bool) -> Result<(), CliError> {
    let registry = SyncRegistry::new(db, ConnectivityConfig::default());

    let connected = if probe {
        Some(registry.connectivity.check_now().await)
    } else {
        None
    };

    let state = registry.sync.sync_state().await?;
    println!("{}", format_badge(&state));
    if let Some(connected) = connected {
        println!(
            "Backend: {}",
            if connected { "reachable" } else { "unreachable" }
        );
    }
    Ok(())
}

async fn run_pending(db: &Database, as_json: bool) -> Result<(), CliError> {
    let pending = ChangeRepository::new(db).list_pending().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&pending)?);
        return Ok(());
    }

    if pending.is_empty() {
        println!("Nothing pending");
        return Ok(());
    }
    for change in &pending {
        println!(
            "{:<13}  {:<9}  {:<17}  {}",
            short_id(&change.id),
            change.operation.to_string(),
            change.entity_kind().to_string(),
            change.entity_id()
        );
    }
    Ok(())
}

async fn run_conflicts(db: &Database, as_json: bool) -> Result<(), CliError> {
    let conflicts = ConflictRepository::new(db).list().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&conflicts)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No conflicts");
        return Ok(());
    }
    for conflict in &conflicts {
        println!("{}", format_conflict_line(conflict));
    }
    Ok(())
}

async fn run_resolve(db: Database, id: &str, strategy: CliStrategy) -> Result<(), CliError> {
    let registry = SyncRegistry::new(db, ConnectivityConfig::default());

    match strategy {
        CliStrategy::Local => {
            registry
                .sync
                .resolve_conflict(id, ResolutionStrategy::Local)
                .await?;
            println!("Resolved {id} keeping local");
        }
        CliStrategy::Server => {
            registry
                .sync
                .resolve_conflict(id, ResolutionStrategy::Server)
                .await?;
            println!("Resolved {id} keeping server");
        }
        CliStrategy::Merge => match registry.sync.resolve_conflict_with_merge(id).await? {
            Some(merged) => {
                // Two-phase resolution: the merged value still needs a
                // follow-up write by whichever side owns the entity
                println!("{}", serde_json::to_string_pretty(&merged)?);
            }
            None => println!("No conflict with id {id}"),
        },
    }
    Ok(())
}

async fn run_trip(db: &Database, command: TripCommands, user_id: &str) -> Result<(), CliError> {
    let ctx = MutationContext::new(db, user_id);

    match command {
        TripCommands::Add {
            name,
            destination,
            start,
            end,
        } => {
            let trip = ctx
                .create_trip(Trip::new(name, destination, start, end, user_id))
                .await?;
            println!("{}", trip.id);
        }
        TripCommands::List { json } => {
            let trips: Vec<Trip> = EntityStore::new(db).list_all().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&trips)?);
            } else {
                for trip in &trips {
                    println!(
                        "{:<13}  {:<24}  {} to {}",
                        short_id(&trip.id),
                        trip.name,
                        trip.start_date,
                        trip.end_date
                    );
                }
            }
        }
        TripCommands::Delete { id } => {
            ctx.delete_trip(&id).await?;
            println!("{id}");
        }
    }
    Ok(())
}

async fn run_item(db: &Database, command: ItemCommands, user_id: &str) -> Result<(), CliError> {
    let ctx = MutationContext::new(db, user_id);

    match command {
        ItemCommands::Add {
            trip_id,
            name,
            category,
            quantity,
        } => {
            let item = ctx
                .create_item(Item::new(trip_id, name, category, quantity))
                .await?;
            println!("{}", item.id);
        }
        ItemCommands::List { trip_id, json } => {
            let items: Vec<Item> = EntityStore::new(db).list_for_trip(&trip_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for item in &items {
                    println!(
                        "{:<13}  [{}] {:<24}  x{}",
                        short_id(&item.id),
                        if item.packed { "x" } else { " " },
                        item.name,
                        item.quantity
                    );
                }
            }
        }
        ItemCommands::Pack { id, unpack } => {
            let updated = ctx
                .set_item_packed(&id, !unpack)
                .await?
                .ok_or(CliError::ItemNotFound(id))?;
            println!("{}", updated.id);
        }
        ItemCommands::Delete { id } => {
            ctx.delete_item(&id).await?;
            println!("{id}");
        }
    }
    Ok(())
}

fn format_badge(state: &SyncState) -> String {
    let connection = if state.is_online { "online" } else { "offline" };
    let activity = if state.is_syncing { ", syncing" } else { "" };
    format!(
        "{connection}{activity} | {} pending | {} conflict{} | last sync: {}",
        state.pending_count(),
        state.conflict_count(),
        if state.conflict_count() == 1 { "" } else { "s" },
        state
            .last_sync_at
            .map_or_else(|| "never".to_string(), format_sync_time)
    )
}

fn format_conflict_line(conflict: &SyncConflict) -> String {
    let suggestion = ConflictResolver::suggest(conflict);
    format!(
        "{:<13}  {:<17}  {:<15}  {}  suggest: {} ({:?})",
        short_id(&conflict.id),
        conflict.entity_kind.to_string(),
        conflict.conflict_type.to_string(),
        short_id(&conflict.entity_id),
        suggestion.strategy,
        suggestion.confidence
    )
}

fn format_sync_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

fn resolve_user_id(cli_user: Option<String>) -> String {
    kitlist_core::util::normalize_text_option(cli_user.or_else(|| env::var("KITLIST_USER").ok()))
        .unwrap_or_else(|| "cli-user".to_string())
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("KITLIST_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kitlist")
        .join("kitlist.db")
}

async fn open_database(path: &PathBuf, mode: PersistenceMode) -> Result<Database, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Database::open_with_mode(path, mode).await?)
}
