use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::alert::{AlertSink, PriceDropEvent};
use crate::config::{AppConfig, ProductsFile};
use crate::extractor::PriceExtractor;
use crate::fetcher::Fetcher;
use crate::models::TrackedProduct;
use crate::sites;
use crate::store::HistoryStore;

/// Summary of one full pass over the tracked set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleReport {
    pub products_checked: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub alerts_sent: usize,
    pub duration_ms: u64,
}

#[derive(Debug)]
struct CheckOutcome {
    url: String,
    checked_at: DateTime<Utc>,
    price: Option<f64>,
    title: Option<String>,
    alerted: bool,
    failed: bool,
}

/// Owns the in-memory tracked set and drives the fetch → extract → persist →
/// alert pipeline. Cycles run on a fixed start-to-start cadence; within a
/// cycle, products are checked concurrently with bounded parallelism, and a
/// failure in one product's pipeline never aborts another's.
pub struct TrackerScheduler {
    fetcher: Fetcher,
    extractor: PriceExtractor,
    store: HistoryStore,
    alerts: Arc<dyn AlertSink>,
    products: Arc<RwLock<Vec<TrackedProduct>>>,
    check_interval: Duration,
    max_concurrent_checks: usize,
}

impl TrackerScheduler {
    pub fn new(
        fetcher: Fetcher,
        extractor: PriceExtractor,
        store: HistoryStore,
        alerts: Arc<dyn AlertSink>,
        products: Vec<TrackedProduct>,
        config: &AppConfig,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            alerts,
            products: Arc::new(RwLock::new(products)),
            check_interval: Duration::from_secs(config.scheduler.check_interval_secs),
            max_concurrent_checks: config.scraper.max_concurrent_checks.max(1),
        }
    }

    /// Snapshot of the tracked set as of now.
    pub async fn products(&self) -> Vec<TrackedProduct> {
        self.products.read().await.clone()
    }

    /// Adds a product to the tracked set. The URL is the unique key;
    /// duplicates are rejected. Takes effect on the next cycle.
    pub async fn add_product(&self, product: TrackedProduct) -> Result<()> {
        let mut products = self.products.write().await;
        if products.iter().any(|p| p.url == product.url) {
            anyhow::bail!("product already tracked: {}", product.url);
        }
        info!(url = %product.url, threshold = product.threshold, "tracking new product");
        products.push(product);
        Ok(())
    }

    /// Removes a product and cascades the delete to its price history.
    /// Returns false when the URL was not tracked.
    pub async fn remove_product(&self, url: &str) -> Result<bool> {
        let removed = {
            let mut products = self.products.write().await;
            let before = products.len();
            products.retain(|p| p.url != url);
            products.len() < before
        };

        if removed {
            let deleted = self.store.remove_url(url).await?;
            info!(url, history_records = deleted, "removed tracked product");
        }
        Ok(removed)
    }

    /// Writes the current tracked set back to the products file.
    pub async fn persist_products(&self, path: &Path) -> crate::Result<()> {
        let file = ProductsFile {
            products: self.products.read().await.clone(),
        };
        file.save(path)
    }

    /// Runs cycles until a shutdown signal arrives. The first cycle starts
    /// immediately; subsequent ticks fire start-to-start so total latency
    /// stays bounded even when a cycle runs long. An in-flight cycle
    /// completes before the loop exits; its fetches are already bounded by
    /// the fetcher's own timeouts.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    info!(
                        checked = report.products_checked,
                        succeeded = report.succeeded,
                        failed = report.failed,
                        alerts = report.alerts_sent,
                        duration_ms = report.duration_ms,
                        "tracking cycle complete"
                    );
                }
                _ = shutdown.changed() => {
                    info!("scheduler stopping");
                    break;
                }
            }
        }
    }

    /// One full pass: snapshot the tracked set, check every product with
    /// bounded concurrency, then merge observation state back. User edits
    /// made while the cycle runs are untouched and take effect next cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        let started = tokio::time::Instant::now();
        let snapshot = self.products.read().await.clone();

        let outcomes: Vec<CheckOutcome> = stream::iter(snapshot)
            .map(|product| self.check_product(product))
            .buffer_unordered(self.max_concurrent_checks)
            .collect()
            .await;

        {
            let mut products = self.products.write().await;
            for outcome in &outcomes {
                let Some(product) = products.iter_mut().find(|p| p.url == outcome.url) else {
                    // Removed mid-cycle; nothing to merge.
                    continue;
                };
                product.last_checked_at = Some(outcome.checked_at);
                if let Some(price) = outcome.price {
                    product.last_price = Some(price);
                }
                if outcome.title.is_some() {
                    product.name = outcome.title.clone();
                }
            }
        }

        let failed = outcomes.iter().filter(|o| o.failed).count();
        CycleReport {
            products_checked: outcomes.len(),
            succeeded: outcomes.len() - failed,
            failed,
            alerts_sent: outcomes.iter().filter(|o| o.alerted).count(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Idle → fetching → extracting → persisted/failed for one product.
    /// Every failure path is logged with the url and stage and leaves the
    /// rest of the cycle untouched.
    async fn check_product(&self, product: TrackedProduct) -> CheckOutcome {
        let site = sites::classify(&product.url);
        let checked_at = Utc::now();
        let mut outcome = CheckOutcome {
            url: product.url.clone(),
            checked_at,
            price: None,
            title: None,
            alerted: false,
            failed: false,
        };

        let page = match self.fetcher.fetch(&product.url, site).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %product.url, site = %site, stage = "fetch", error = %e, "product check failed");
                outcome.failed = true;
                return outcome;
            }
        };

        let profile = site.profile();
        outcome.title = self.extractor.extract_title(&page.body, profile);

        let price = match self.extractor.extract_price(&page.body, profile) {
            Ok(price) => price,
            Err(e) => {
                warn!(url = %product.url, site = %site, stage = "extract", error = %e, "product check failed");
                outcome.failed = true;
                return outcome;
            }
        };
        outcome.price = Some(price);

        if let Err(e) = self.store.append(&product.url, price, checked_at).await {
            // In-memory state still reflects this observation; the next
            // cycle re-appends naturally.
            error!(url = %product.url, stage = "persist", error = %e, "failed to record price observation");
        }

        if price <= product.threshold {
            let name = outcome
                .title
                .clone()
                .or_else(|| product.name.clone())
                .unwrap_or_else(|| product.url.clone());
            let event = PriceDropEvent {
                product_url: product.url.clone(),
                product_name: name,
                observed_price: price,
                threshold: product.threshold,
            };
            match self.alerts.notify(&event).await {
                Ok(()) => outcome.alerted = true,
                Err(e) => {
                    warn!(url = %product.url, stage = "alert", error = %e, "alert delivery failed");
                }
            }
        }

        outcome
    }
}
