use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use galley::ledger::OrderRecord;
use galley::shutdown::cancel_on_signal;
use galley::store::MemoryStore;
use galley::workforce::WorkerLoad;
use galley::{Kitchen, KitchenConfig};

#[derive(Parser, Debug)]
#[command(name = "galley")]
#[command(version)]
#[command(about = "Priority scheduler for kitchen orders")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Submit orders against a menu and run them to completion
    Run(RunArgs),

    /// Validate a menu file and show its staff
    Check {
        /// Menu file (JSON)
        #[arg(long)]
        menu: PathBuf,

        /// Output format
        #[arg(long, short = 'o', default_value = "table")]
        output: OutputFormat,
    },
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Menu file (JSON) with ingredients, recipes and workers
    #[arg(long)]
    menu: PathBuf,

    /// Order to submit, as "Recipe:quantity". Repeat for more orders.
    #[arg(long = "order", value_parser = parse_order)]
    orders: Vec<(String, i64)>,

    /// Wall-clock milliseconds per estimate unit
    #[arg(long, default_value = "1000")]
    time_unit_ms: u64,

    /// Jitter half-width applied to stage durations (0.2 = ±20%)
    #[arg(long, default_value = "0.2")]
    jitter: f64,

    /// Maximum number of stages executing at once
    #[arg(long, default_value = "64")]
    slots: usize,

    /// Write the menu state here after every admitted order
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct RejectedOrder {
    recipe: String,
    quantity: i64,
    error: String,
}

#[derive(Serialize)]
struct RunOutput {
    orders: Vec<OrderRecord>,
    rejected: Vec<RejectedOrder>,
    workers: Vec<WorkerLoad>,
    revenue: f64,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_order(s: &str) -> Result<(String, i64), String> {
    let (recipe, quantity) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected Recipe:quantity, got {:?}", s))?;
    let recipe = recipe.trim();
    if recipe.is_empty() {
        return Err(format!("missing recipe name in {:?}", s));
    }
    let quantity = quantity
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid quantity in {:?}: {}", s, e))?;
    Ok((recipe.to_string(), quantity))
}

fn print_loads(loads: &[WorkerLoad]) {
    println!("{:<6} {:<20} {:<8} BACKLOG", "ID", "NAME", "ROLE");
    println!("{}", "-".repeat(44));
    for load in loads {
        println!(
            "{:<6} {:<20} {:<8} {}",
            load.worker_id,
            load.name,
            load.role.to_string(),
            load.backlog_size
        );
    }
}

// =============================================================================
// Commands
// =============================================================================

async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = MemoryStore::load(&args.menu)?;
    if let Some(path) = args.snapshot {
        store = store.with_snapshot_path(path);
    }

    let config = KitchenConfig::default()
        .with_time_unit(Duration::from_millis(args.time_unit_ms))
        .with_jitter(args.jitter)
        .with_execution_slots(args.slots);
    let kitchen = Kitchen::new(config, Arc::new(store))?;

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone());
    let handles = kitchen.start(shutdown.clone());

    let mut admitted = Vec::new();
    let mut rejected = Vec::new();
    for (recipe, quantity) in args.orders {
        match kitchen.submit_order(&recipe, quantity).await {
            Ok(receipt) => {
                tracing::info!(
                    order_id = receipt.order_id,
                    estimated_time = receipt.estimated_time,
                    total_cost = receipt.total_cost,
                    "Order accepted"
                );
                admitted.push(receipt.order_id);
            }
            Err(e) => {
                tracing::warn!(recipe = %recipe, quantity, error = %e, "Order rejected");
                rejected.push(RejectedOrder {
                    recipe,
                    quantity,
                    error: e.to_string(),
                });
            }
        }
    }

    for order_id in admitted {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            status = kitchen.wait_for(order_id) => {
                if let Some(status) = status {
                    tracing::debug!(order_id, status = %status, "Order settled");
                }
            }
        }
    }

    shutdown.cancel();
    for handle in handles {
        let _ = handle.await;
    }

    let output = RunOutput {
        orders: kitchen.orders().await,
        rejected,
        workers: kitchen.worker_loads().await,
        revenue: kitchen.revenue().await,
    };

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Table => {
            println!(
                "{:<6} {:<16} {:<5} {:<10} {:<10} STATUS",
                "ORDER", "RECIPE", "QTY", "ESTIMATE", "COST"
            );
            println!("{}", "-".repeat(72));
            for order in &output.orders {
                println!(
                    "{:<6} {:<16} {:<5} {:<10.1} {:<10.2} {}",
                    order.order_id,
                    order.recipe,
                    order.quantity,
                    order.estimated_time,
                    order.total_cost,
                    order.status
                );
            }
            for order in &output.rejected {
                println!(
                    "{:<6} {:<16} {:<5} {:<10} {:<10} rejected: {}",
                    "-", order.recipe, order.quantity, "-", "-", order.error
                );
            }
            println!();
            print_loads(&output.workers);
            println!();
            println!("Revenue: {:.2}", output.revenue);
        }
    }
    Ok(())
}

fn check(menu: PathBuf, output: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = MemoryStore::load(&menu)?;
    let menu = store.menu()?;
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&menu)?),
        OutputFormat::Table => {
            println!(
                "Menu OK: {} recipes, {} ingredients, {} workers",
                menu.recipes.len(),
                menu.ingredients.len(),
                menu.workers.len()
            );
            for recipe in &menu.recipes {
                println!(
                    "  {:<16} complexity {:<5} price {:.2}",
                    recipe.name, recipe.complexity, recipe.price
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Run(run_args) => run(run_args).await?,
        Commands::Check { menu, output } => check(menu, output)?,
    }
    Ok(())
}
