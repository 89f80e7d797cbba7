use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use fiyat_watcher::alert::{AlertSink, LogAlertSink, WebhookAlertSink};
use fiyat_watcher::config::{AppConfig, ProductsFile};
use fiyat_watcher::extractor::PriceExtractor;
use fiyat_watcher::fetcher::Fetcher;
use fiyat_watcher::scheduler::TrackerScheduler;
use fiyat_watcher::sites;
use fiyat_watcher::store::HistoryStore;

#[derive(Parser, Debug)]
#[command(name = "fiyat-watcher", about = "Polls product pages and records price history")]
struct Args {
    /// Override the products file from the configuration.
    #[arg(long)]
    products: Option<PathBuf>,

    /// Run a single tracking cycle and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fiyat_watcher=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env()?;

    // A profile with a selector that does not parse is a packaging bug;
    // refuse to start rather than fail on every extraction.
    sites::validate()?;

    let products_path = args
        .products
        .unwrap_or_else(|| PathBuf::from(&config.scheduler.products_file));
    let products = ProductsFile::load(&products_path).products;
    if products.is_empty() {
        warn!(path = %products_path.display(), "no products to track");
    }
    info!(count = products.len(), "loaded tracked products");

    let store = HistoryStore::connect(&config.database.url, config.database.max_connections).await?;
    let fetcher = Fetcher::new(&config.scraper)?;
    let alerts: Arc<dyn AlertSink> = match &config.alerts.webhook_url {
        Some(url) => Arc::new(WebhookAlertSink::new(url.clone())),
        None => Arc::new(LogAlertSink),
    };

    let scheduler = Arc::new(TrackerScheduler::new(
        fetcher,
        PriceExtractor::new(),
        store,
        alerts,
        products,
        &config,
    ));

    if args.once {
        let report = scheduler.run_cycle().await;
        info!(
            checked = report.products_checked,
            succeeded = report.succeeded,
            failed = report.failed,
            alerts = report.alerts_sent,
            "single cycle complete"
        );
        return Ok(());
    }

    info!(
        interval_secs = config.scheduler.check_interval_secs,
        "starting tracking loop"
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    shutdown_tx.send(true)?;
    runner.await?;

    scheduler.persist_products(&products_path).await?;
    Ok(())
}
