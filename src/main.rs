use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ecs_exception_scheduler::config::Config;
use ecs_exception_scheduler::db::{self, FileBlobStore, PgBlobStore, StateBackend};
use ecs_exception_scheduler::inventory::{self, CsvInventorySource, InventoryView};
use ecs_exception_scheduler::models::DriftInput;
use ecs_exception_scheduler::schedule::ScheduleStore;
use ecs_exception_scheduler::selection::ScheduleEditor;
use ecs_exception_scheduler::{drift, filter, report, status};

#[derive(Parser)]
#[command(name = "ecs-exception-scheduler")]
#[command(about = "Exception windows and service drift for container clusters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Inspect and edit exception windows
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
    },
    /// Group a sync payload's service changes by cluster
    Drift {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        query: Option<String>,
    },
    /// Cluster inventory listing
    Inventory {
        #[command(subcommand)]
        command: InventoryCommand,
    },
}

#[derive(Subcommand)]
enum ScheduleCommand {
    /// Show the window and status for one resource
    Show { resource: String },
    /// List every stored window
    List,
    /// Select days as in the calendar, then confirm
    Set {
        resource: String,
        /// Day clicked in the calendar (YYYY-MM-DD); repeat in click order
        #[arg(long = "click", required = true)]
        clicks: Vec<NaiveDate>,
    },
    /// Remove the window for a resource
    Remove { resource: String },
}

#[derive(Subcommand)]
enum InventoryCommand {
    /// Fetch a fresh inventory, falling back to the cache on failure
    Refresh {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show the cached inventory
    List {
        #[arg(long)]
        query: Option<String>,
    },
}

async fn connect(config: &Config) -> anyhow::Result<StateBackend> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(url)
                .await
                .context("failed to connect to Postgres")?;
            Ok(StateBackend::Postgres(PgBlobStore::new(pool)))
        }
        None => Ok(StateBackend::File(FileBlobStore::new(&config.state_dir))),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let backend = connect(&config).await?;
    let today = status::today();

    match cli.command {
        Commands::InitDb => match &backend {
            StateBackend::Postgres(store) => {
                db::init_db(store.pool()).await?;
                println!("Schema ready.");
            }
            StateBackend::File(_) => {
                println!(
                    "No database configured; state is kept in {}.",
                    config.state_dir.display()
                );
            }
        },
        Commands::Schedule { command } => {
            let store = ScheduleStore::open(backend)
                .await
                .context("failed to open schedule store")?;
            match command {
                ScheduleCommand::Show { resource } => {
                    println!("{}", report::render_schedule(&resource, store.get(&resource).as_ref(), today));
                }
                ScheduleCommand::List => {
                    print!("{}", report::render_schedule_list(&store.list_all(), today));
                }
                ScheduleCommand::Set { resource, clicks } => {
                    let mut editor = ScheduleEditor::open(&resource, store.get(&resource).as_ref(), today);
                    for day in clicks {
                        if !editor.click(day) {
                            eprintln!("Ignoring {day}: days before {today} cannot be selected.");
                        }
                    }
                    if !editor.can_confirm() {
                        bail!("no selectable day was given for {resource}");
                    }
                    let window = editor.confirm(&store).await?;
                    println!("{}", report::render_schedule(&resource, Some(&window), today));
                }
                ScheduleCommand::Remove { resource } => {
                    let mut editor = ScheduleEditor::open(&resource, store.get(&resource).as_ref(), today);
                    if !editor.can_remove() {
                        println!("{resource}: no exception window scheduled");
                        return Ok(());
                    }
                    editor.remove(&store).await?;
                    println!("Removed exception window for {resource}.");
                }
            }
        }
        Commands::Drift { input, query } => {
            let payload = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let input: DriftInput =
                serde_json::from_str(&payload).context("sync payload is not valid JSON")?;
            let drift_report = drift::aggregate(&drift::records_from_input(input));
            let drift_report = match query.as_deref() {
                Some(query) => drift::filter_report(&drift_report, query),
                None => drift_report,
            };
            print!("{}", report::render_drift(&drift_report));
        }
        Commands::Inventory { command } => {
            let store = ScheduleStore::open(backend.clone())
                .await
                .context("failed to open schedule store")?;
            let mut view = InventoryView::default();
            let query = match command {
                InventoryCommand::Refresh { csv } => {
                    view.refresh(&backend, &CsvInventorySource::new(csv), Utc::now())
                        .await;
                    None
                }
                InventoryCommand::List { query } => {
                    view.load_cached(&backend, Utc::now()).await;
                    query
                }
            };

            let clusters = match query.as_deref() {
                Some(query) => filter::filter_by_name(view.clusters(), query),
                None => view.clusters().to_vec(),
            };
            let schedules = store.list_all();
            let summary = inventory::summarize(view.clusters(), &schedules, today);
            print!(
                "{}",
                report::render_inventory(&view, &clusters, &summary, &schedules, today)
            );
        }
    }

    Ok(())
}
