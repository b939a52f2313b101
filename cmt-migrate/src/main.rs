//! cmt-migrate - parallel catalog migration
//!
//! Moves records from a source catalog export into the target platform with
//! a fixed pool of workers. Without `--execute` the run is a dry run that
//! only prints the plan.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cmt_common::events::EventBus;
use cmt_migrate::config::{resolve_credentials, resolve_run_settings, CliOverrides, RunSettings};
use cmt_migrate::models::{MigrationState, SourceRecord};
use cmt_migrate::run_mode::{prepare_state, RunMode, StateOptions};
use cmt_migrate::services::description::{DescriptionRenderer, TemplateDescription};
use cmt_migrate::services::fetcher::HttpSubResourceFetcher;
use cmt_migrate::services::item_pipeline::ItemPipeline;
use cmt_migrate::services::platform_transport::ShopifyTransport;
use cmt_migrate::services::pricing::PricingRule;
use cmt_migrate::services::source_catalog::{
    check_handle_collisions, load_all, select_batch, JsonFileCatalog, SourceCatalog,
};
use cmt_migrate::services::spreadsheet_catalog::{is_spreadsheet, SpreadsheetCatalog};
use cmt_migrate::services::state_store::{JsonFileStateStore, StateStore};
use cmt_migrate::services::wholesale::mark_wholesale_skips;
use cmt_migrate::services::work_distributor::{DistributionFilter, WorkDistributor};
use cmt_migrate::services::worker_pool::WorkerPool;

/// Command-line arguments for cmt-migrate
#[derive(Parser, Debug)]
#[command(name = "cmt-migrate")]
#[command(about = "Parallel catalog migration into the target platform")]
#[command(version)]
struct Args {
    /// Source catalog: JSON array, JSON lines, or a supplier spreadsheet
    #[arg(long)]
    source: Option<PathBuf>,

    /// Preview planned work without calling the platform (default)
    #[arg(long, conflicts_with = "execute")]
    dry_run: bool,

    /// Run the migration
    #[arg(long)]
    execute: bool,

    /// Publish records whose QA passes
    #[arg(long)]
    auto_publish: bool,

    /// Number of concurrent workers
    #[arg(long)]
    workers: Option<usize>,

    /// Offset into the source list
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Number of records from the offset
    #[arg(long)]
    count: Option<usize>,

    /// Continue from the persisted state, skipping decided records
    #[arg(long)]
    resume: bool,

    /// Print persisted state counts and exit
    #[arg(long)]
    status: bool,

    /// Clear the persisted state before running
    #[arg(long)]
    reset: bool,

    /// Do not retry records that failed in an earlier run
    #[arg(long)]
    exclude_failed: bool,

    /// Save state after this many records (1 = every record)
    #[arg(long)]
    checkpoint_every: Option<usize>,

    /// State file location
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target store host, e.g. my-shop.myshopify.com
    #[arg(long)]
    store: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = cmt_common::config::load_toml_config(args.config.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&toml_config.logging.level)),
        )
        .init();

    info!("cmt-migrate {}", env!("CARGO_PKG_VERSION"));

    let settings = resolve_run_settings(
        &toml_config,
        &CliOverrides {
            workers: args.workers,
            checkpoint_every: args.checkpoint_every,
            auto_publish: args.auto_publish,
            state_file: args.state_file.clone(),
        },
    )?;
    info!(
        "State file: {} (from {})",
        settings.state_path.display(),
        settings.state_source
    );

    let store = JsonFileStateStore::new(&settings.state_path);

    if args.status {
        let state = store.load().await.context("Failed to load migration state")?;
        print_status(&state);
        return Ok(());
    }

    // Fatal configuration errors surface before the state is touched
    let mode = RunMode::from_flags(args.execute, args.dry_run);
    let credentials = match mode {
        RunMode::Execute => Some(resolve_credentials(args.store.as_deref(), None, &toml_config)?),
        RunMode::DryRun => None,
    };

    let source = args
        .source
        .as_deref()
        .context("--source is required unless --status is given")?;
    let catalog = open_catalog(source)
        .await
        .with_context(|| format!("Failed to open source {}", source.display()))?;
    let records = load_all(catalog.as_ref(), settings.page_size).await?;
    check_handle_collisions(&records, &settings.pipeline.vendor)?;
    let batch = select_batch(records, args.start, args.count);
    info!(
        start = args.start,
        batch = batch.len(),
        "Selected records from {}",
        source.display()
    );

    let mut state = prepare_state(
        &store,
        mode,
        StateOptions {
            resume: args.resume,
            reset: args.reset,
        },
    )
    .await
    .with_context(|| format!("State file {}", settings.state_path.display()))?;

    if settings.skip_wholesale {
        mark_wholesale_skips(&batch, &mut state);
    }

    let records: Arc<[SourceRecord]> = batch.into();
    let filter = DistributionFilter {
        exclude_failed: args.exclude_failed,
    };
    let distributor = WorkDistributor::from_state(Arc::clone(&records), &state, filter);

    let renderer = Arc::new(TemplateDescription::new(
        settings.pipeline.vendor.clone(),
        toml_config.titles.replacements.clone(),
    ));
    let pricing = Arc::new(settings.pricing.clone());

    let Some(credentials) = credentials else {
        print_plan(&distributor, pricing.as_ref(), renderer.as_ref(), &settings);
        return Ok(());
    };

    let transport = ShopifyTransport::new(credentials.connection(&toml_config))
        .context("Failed to build HTTP client")?;
    info!(base_url = transport.base_url(), "Target platform");

    let fetcher = Arc::new(HttpSubResourceFetcher::new(
        settings.image_root.clone(),
        settings.fetch_timeout,
    ));
    let pipeline = Arc::new(ItemPipeline::new(
        pricing,
        renderer,
        fetcher,
        settings.qa.clone(),
        settings.pipeline.clone(),
    ));

    let pool = WorkerPool::new(
        settings.pool.clone(),
        Arc::new(transport),
        pipeline,
        Arc::new(store),
        EventBus::new(256),
    );

    let summary = pool.run(distributor, state).await.context("Migration run failed")?;
    print!("{}", summary);

    if summary.failed() > 0 {
        warn!(
            failed = summary.failed(),
            "Some records failed; rerun with --resume to retry them"
        );
    }
    Ok(())
}

async fn open_catalog(source: &Path) -> cmt_common::Result<Box<dyn SourceCatalog>> {
    if is_spreadsheet(source) {
        Ok(Box::new(SpreadsheetCatalog::open(source).await?))
    } else {
        Ok(Box::new(JsonFileCatalog::open(source).await?))
    }
}

fn print_status(state: &MigrationState) {
    let counts = state.counts();
    println!("Migration state");
    println!("  completed: {}", counts.completed);
    println!("  failed:    {}", counts.failed);
    println!("  skipped:   {}", counts.skipped);
    if let Some(started) = state.started_at() {
        println!("  started:   {}", started.to_rfc3339());
    }
    if let Some(updated) = state.last_update() {
        println!("  updated:   {}", updated.to_rfc3339());
    }
    for (source_id, entry) in state.failed() {
        println!("    {}: {}", source_id, entry.error);
    }
}

fn print_plan(
    distributor: &WorkDistributor,
    pricing: &dyn PricingRule,
    renderer: &dyn DescriptionRenderer,
    settings: &RunSettings,
) {
    println!(
        "DRY RUN: {} records to migrate ({} already decided), {} workers",
        distributor.total(),
        distributor.excluded(),
        settings.pool.workers
    );

    let mut position = 0;
    while let Some(assignment) = distributor.next() {
        position += 1;
        let record = assignment.record;
        match pricing.price(record) {
            Ok(price) => {
                let description = renderer.render(record, &price);
                println!(
                    "{:4}. {:12} | ${:8.2} -> ${:8.2} | {} images | {}",
                    position,
                    record.external_reference(),
                    price.cost,
                    price.retail,
                    record.images.len(),
                    description.title
                );
            }
            Err(e) => println!(
                "{:4}. {:12} | would fail: {} | {}",
                position,
                record.external_reference(),
                e,
                record.name
            ),
        }
    }
    println!("Pass --execute to run the migration.");
}
