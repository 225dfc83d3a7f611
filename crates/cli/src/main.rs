use anyhow::Context;
use caremanager_core::validation::require_window;
use caremanager_core::{CareManagerService, CoreConfig, InMemoryStore, VisitStatusGroup};
use caremanager_peers::PeerConfig;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "caremanager")]
#[command(about = "Care manager operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the status group a visit status falls into
    StatusGroup {
        /// Visit status, e.g. on_scene (omit for a visit with no status)
        status: Option<String>,
    },
    /// Ask the booking peer whether a window can be booked for a dispatch record
    CanSchedule {
        dispatch_id: i64,
        /// Window start, unix seconds
        start: i64,
        /// Window end, unix seconds
        end: i64,
    },
    /// Probe advanced-care availability for whole days
    Availability {
        dispatch_id: i64,
        /// Dates (YYYY-MM-DD), comma-separated
        #[arg(value_delimiter = ',', required = true)]
        dates: Vec<NaiveDate>,
    },
    /// Archive a dispatch record on the booking peer
    Cancel { dispatch_id: i64 },
}

fn group_label(status: Option<&str>) -> &'static str {
    match VisitStatusGroup::from_status(status) {
        VisitStatusGroup::Active => "active",
        VisitStatusGroup::Upcoming => "upcoming",
        VisitStatusGroup::Past => "past",
    }
}

/// Wires the configured peers. The visit store is in-memory; none of the CLI commands read it.
fn connect_service() -> anyhow::Result<CareManagerService> {
    let core = CoreConfig::from_overrides(std::env::var("ADVANCED_CARE_SERVICE_LINE_ID").ok())?;
    let peers = PeerConfig::from_env()?;
    let (booking, routing) = caremanager_peers::connect(&peers)?;
    Ok(CareManagerService::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(booking),
        Arc::new(routing),
        core,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("caremanager=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::StatusGroup { status }) => {
            println!("{}", group_label(status.as_deref()));
        }
        Some(Commands::CanSchedule {
            dispatch_id,
            start,
            end,
        }) => {
            let window = require_window(start, end)?;
            let outcome = connect_service()?
                .can_schedule_visit(dispatch_id, window)
                .await
                .with_context(|| format!("checking dispatch {dispatch_id}"))?;
            println!("{outcome:?}");
        }
        Some(Commands::Availability { dispatch_id, dates }) => {
            let results = connect_service()?
                .get_visit_availability(dispatch_id, &dates)
                .await
                .with_context(|| format!("probing dispatch {dispatch_id}"))?;
            for day in results {
                let label = if day.is_available {
                    "available"
                } else {
                    "unavailable"
                };
                println!("{}: {label}", day.date);
            }
        }
        Some(Commands::Cancel { dispatch_id }) => {
            connect_service()?
                .cancel_visit(dispatch_id)
                .await
                .with_context(|| format!("cancelling dispatch {dispatch_id}"))?;
            println!("Archived dispatch {dispatch_id}");
        }
        None => {
            println!("Use 'caremanager --help' for commands");
        }
    }

    Ok(())
}
