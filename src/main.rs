use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use shoplytic_desk_lib::{
    config, init_logging, BatchSummary, DateRange, DeskConfig, FetchOutcome, ItemOutcome,
    OrderDesk, OrderFilter, ProductUpdate,
};

#[derive(Parser, Debug)]
#[command(name = "shoplytic-desk", version, about = "Order reconciliation and bulk fulfillment desk")]
struct Cli {
    /// Data directory (defaults to SHOPLYTIC_DATA_DIR or the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the cached order list
    Orders {
        /// Customer name or order number substring
        #[arg(long, default_value = "")]
        search: String,
        /// Payment status to show ("all" for every status)
        #[arg(long)]
        status: Option<String>,
    },
    /// Fetch orders for the active date range and reconcile them
    Refresh,
    /// Fulfill the given orders
    Fulfill {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Cancel the given orders
    Cancel {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show the extended view of one order
    Details { id: String },
    /// Fetch and show the product list
    Products,
    /// Update a product's price, SKU or inventory
    UpdateProduct {
        #[arg(long)]
        variant: String,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        sku: Option<String>,
        #[arg(long)]
        inventory: Option<i64>,
    },
    /// Fetch and show the orders summary
    Summary,
    /// Set the date range used by fetches (omit both to clear it)
    Range {
        /// Start date, YYYY-MM-DD
        #[arg(long)]
        start: Option<String>,
        /// End date, YYYY-MM-DD
        #[arg(long)]
        end: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("error: failed to start runtime: {err}");
            process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(run(cli)) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn load_config(data_dir: Option<PathBuf>) -> Result<DeskConfig> {
    let config = match data_dir {
        Some(dir) => config::load_from(&dir),
        None => config::load(),
    };
    config.context("loading configuration")
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.data_dir)?;
    init_logging(&config);

    let mut desk = OrderDesk::open(&config).context("opening desk store")?;
    desk.restore().context("restoring cached state")?;

    match cli.command {
        Commands::Orders { search, status } => {
            if !desk.has_loaded_orders() {
                println!("Orders have not been loaded yet; run `refresh`.");
                return Ok(());
            }
            desk.set_filter(OrderFilter::new(search, status));
            print_orders(&desk);
        }
        Commands::Refresh => {
            match desk.refresh_orders().await.context("refreshing orders")? {
                FetchOutcome::Live(report) => println!(
                    "Fetched {} orders ({} dropped, {} statuses recorded)",
                    report.total, report.dropped, report.override_writes
                ),
                FetchOutcome::Cached { error, records } => {
                    println!("Fetch failed: {error}. Showing {records} cached orders.")
                }
            }
            print_orders(&desk);
        }
        Commands::Fulfill { ids } => {
            select(&mut desk, &ids);
            let summary = desk.fulfill_selected().await.context("fulfilling orders")?;
            print_batch(&summary);
        }
        Commands::Cancel { ids } => {
            select(&mut desk, &ids);
            let summary = desk.cancel_selected().await.context("cancelling orders")?;
            print_batch(&summary);
        }
        Commands::Details { id } => {
            let details = desk
                .order_details(&id)
                .await
                .with_context(|| format!("fetching details for order {id}"))?;
            println!("{}", serde_json::to_string_pretty(&details)?);
        }
        Commands::Products => {
            if let Some(error) = desk.refresh_products().await?.error() {
                println!("Fetch failed: {error}. Showing cached products.");
            }
            for p in desk.products() {
                println!(
                    "{:<14} {:<32} {:<12} {:>10} {:>6}",
                    p.variant_id, p.title, p.sku, p.price_display, p.inventory_quantity
                );
            }
        }
        Commands::UpdateProduct {
            variant,
            price,
            sku,
            inventory,
        } => {
            let update = ProductUpdate {
                variant_id: variant,
                price,
                sku,
                inventory,
            };
            match desk.update_product(&update).await.context("updating product")? {
                Some(product) => println!("Updated {} ({})", product.title, product.variant_id),
                None => println!("Update sent; product is not in the cached list."),
            }
        }
        Commands::Summary => {
            if let Some(error) = desk.refresh_summary().await?.error() {
                println!("Fetch failed: {error}. Showing cached summary.");
            }
            match desk.summary() {
                Some(snapshot) => {
                    println!("{}", serde_json::to_string_pretty(&snapshot.summary)?);
                    println!("as of {}", snapshot.fetched_at.to_rfc3339());
                }
                None => println!("No summary available."),
            }
        }
        Commands::Range { start, end } => {
            let range = DateRange::parse(start.as_deref(), end.as_deref())?;
            desk.set_date_range(range)?;
            if range.is_unbounded() {
                println!("Date range cleared");
            } else {
                println!("Date range set: {:?} .. {:?}", range.start, range.end);
            }
        }
    }
    Ok(())
}

fn select(desk: &mut OrderDesk, ids: &[String]) {
    for id in ids {
        if !desk.selection().contains(id) && !desk.toggle(id) {
            println!("Skipping {id}: not an unfulfilled order in the cached list");
        }
    }
}

fn print_orders(desk: &OrderDesk) {
    let visible = desk.visible_orders();
    if visible.is_empty() {
        println!("No orders.");
        return;
    }
    for o in visible {
        println!(
            "{:<10} {:<24} {:>10} {:<8} {:<10} {:<12} {}",
            o.order_number,
            o.customer,
            o.total_price_display,
            o.payment_type,
            o.payment_status,
            o.fulfillment_status.as_str(),
            o.created_at_display
        );
    }
}

fn print_batch(summary: &BatchSummary) {
    for item in &summary.items {
        match &item.outcome {
            ItemOutcome::Success => println!("{:<10} ok", item.order_number),
            ItemOutcome::Failure(err) => println!("{:<10} failed: {err}", item.order_number),
        }
    }
    println!(
        "{}: {} succeeded, {} failed",
        summary.action.as_str(),
        summary.success_count(),
        summary.failure_count()
    );
}
