use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rental_catalog::config::SnapshotKind;
use rental_catalog::query::{self, FilterCriteria, SortKey};
use rental_catalog::render;
use rental_catalog::{
    load_config, Catalog, CatalogView, Config, ListingRepository, LoadStatus, RefreshOutcome,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Browse a rental listing snapshot: filter, sort, and inspect price history.
///
/// The snapshot comes from the config file's `[snapshot]` section unless one
/// of --snapshot, --snapshot-dir or --url overrides it.
#[derive(Parser)]
#[command(name = "rental-catalog", version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read the snapshot from this file
    #[arg(long, global = true, conflicts_with_all = ["snapshot_dir", "url"])]
    snapshot: Option<PathBuf>,

    /// Read the newest results_*.json in this directory
    #[arg(long, global = true, conflicts_with = "url")]
    snapshot_dir: Option<PathBuf>,

    /// Fetch the snapshot over HTTP
    #[arg(long, global = true)]
    url: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the filtered, sorted listing table
    List {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Print the building and floorplan option lists
    Facets,
    /// Print one unit's price history, oldest first
    History {
        unit: String,
        /// Disambiguate units that exist in several buildings
        #[arg(long)]
        building: Option<String>,
    },
    /// Refresh on an interval and reprint the table on every change
    Watch {
        /// Seconds between refreshes
        #[arg(long, default_value_t = 300)]
        interval: u64,
        #[command(flatten)]
        query: QueryArgs,
    },
}

#[derive(Args, Debug, Default)]
struct QueryArgs {
    /// Keep only this building (repeatable)
    #[arg(long = "building")]
    buildings: Vec<String>,

    /// Keep only this floorplan type (repeatable)
    #[arg(long = "floorplan")]
    floorplans: Vec<String>,

    #[arg(long)]
    min_price: Option<f64>,

    #[arg(long)]
    max_price: Option<f64>,

    /// Earliest availability date (YYYY-MM-DD)
    #[arg(long)]
    from: Option<String>,

    /// Latest availability date (YYYY-MM-DD)
    #[arg(long)]
    to: Option<String>,

    /// Match unit, building or floorplan type
    #[arg(long, default_value = "")]
    search: String,

    /// Sort column; naming the same column again flips the direction
    #[arg(long = "sort")]
    sort: Vec<SortKey>,

    /// Print at most this many rows
    #[arg(long)]
    limit: Option<usize>,
}

impl QueryArgs {
    fn apply(&self, catalog: &Catalog) {
        catalog.set_filter(FilterCriteria {
            buildings: self.buildings.iter().cloned().collect(),
            floorplan_types: self.floorplans.iter().cloned().collect(),
            min_price: self.min_price,
            max_price: self.max_price,
            available_from: self.from.clone(),
            available_to: self.to.clone(),
            search: self.search.clone(),
        });
        for key in &self.sort {
            catalog.set_sort_key(*key);
        }
    }
}

impl Cli {
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };

        if let Some(url) = &self.url {
            config.snapshot.kind = SnapshotKind::Http;
            config.snapshot.url = Some(url.clone());
        } else if let Some(dir) = &self.snapshot_dir {
            config.snapshot.kind = SnapshotKind::Latest;
            config.snapshot.dir = dir.clone();
        } else if let Some(path) = &self.snapshot {
            config.snapshot.kind = SnapshotKind::File;
            config.snapshot.path = path.clone();
        }

        Ok(config)
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    init_tracing(&config.logging.level);

    let repository = ListingRepository::new(config.snapshot.build_source()?)
        .with_price_order(config.validation.price_order);
    let catalog = Catalog::new(repository);

    match &cli.command {
        Commands::List { query } => {
            load(&catalog).await?;
            query.apply(&catalog);
            print_view(&catalog.view(), query.limit, cli.json)?;
        }
        Commands::Facets => {
            load(&catalog).await?;
            let facets = catalog.view().facets.clone();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&facets)?);
            } else {
                print!("{}", render::facets_text(&facets));
            }
        }
        Commands::History { unit, building } => {
            load(&catalog).await?;
            print_history(&catalog, unit, building.as_deref(), cli.json)?;
        }
        Commands::Watch { interval, query } => {
            load(&catalog).await?;
            query.apply(&catalog);
            watch(catalog, Duration::from_secs(*interval), query.limit, cli.json).await?;
        }
    }

    Ok(())
}

async fn load(catalog: &Catalog) -> Result<()> {
    match catalog.refresh().await {
        RefreshOutcome::Loaded { records } => {
            info!("Loaded {} listings", records);
            Ok(())
        }
        RefreshOutcome::Failed(message) => anyhow::bail!("Failed to load listings: {}", message),
        RefreshOutcome::Skipped => Ok(()),
    }
}

fn print_view(view: &CatalogView, limit: Option<usize>, as_json: bool) -> Result<()> {
    let shown = limit.unwrap_or(view.rows.len()).min(view.rows.len());

    if as_json {
        let value = json!({
            "status": view.status,
            "error": view.error,
            "filter": view.filter,
            "sort": view.sort,
            "total": view.total,
            "matched": view.rows.len(),
            "rows": &view.rows[..shown],
            "report": view.report,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", render::view_summary(view));
    println!();
    print!("{}", render::listing_table(&view.rows[..shown]));
    if shown < view.rows.len() {
        println!("… {} more", view.rows.len() - shown);
    }
    Ok(())
}

fn print_history(catalog: &Catalog, unit: &str, building: Option<&str>, as_json: bool) -> Result<()> {
    let snapshot = catalog.repository().snapshot();
    let matches = snapshot.find(unit, building);

    let record = match matches.as_slice() {
        [] => anyhow::bail!("No listing with unit {:?}", unit),
        [record] => *record,
        several => {
            let buildings: Vec<&str> = several.iter().map(|r| r.building.as_str()).collect();
            anyhow::bail!(
                "Unit {:?} exists in several buildings ({}); pass --building",
                unit,
                buildings.join(", ")
            );
        }
    };

    let samples = query::project(record)
        .with_context(|| format!("Cannot chart price history for unit {}", record.unit))?;
    let summary = query::summarize(&samples);

    if as_json {
        let value = json!({
            "listing": record,
            "series": samples,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", render::history_text(record, &samples, summary.as_ref()));
    }
    Ok(())
}

async fn watch(catalog: Catalog, interval: Duration, limit: Option<usize>, as_json: bool) -> Result<()> {
    let catalog = Arc::new(catalog);
    let mut views = catalog.subscribe();
    print_view(&catalog.view(), limit, as_json)?;
    println!();

    // The repository logs failed refreshes and keeps the previous listings
    let refresher = tokio::spawn({
        let catalog = catalog.clone();
        async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                catalog.refresh().await;
            }
        }
    });

    info!("👀 Watching listings, refreshing every {:?}", interval);
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                if view.status == LoadStatus::Loading {
                    continue;
                }
                if let Err(err) = print_view(&view, limit, as_json) {
                    refresher.abort();
                    return Err(err);
                }
                println!();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                break;
            }
        }
    }

    refresher.abort();
    Ok(())
}
