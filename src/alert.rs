use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Emitted when an observed price is at or below a product's threshold. How
/// the event is displayed is the sink's business, not the tracking engine's.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceDropEvent {
    pub product_url: String,
    pub product_name: String,
    pub observed_price: f64,
    pub threshold: f64,
}

impl PriceDropEvent {
    pub fn savings(&self) -> f64 {
        self.threshold - self.observed_price
    }
}

/// Receives price-drop events. Implementations must tolerate being called
/// concurrently from multiple in-flight product checks.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, event: &PriceDropEvent) -> anyhow::Result<()>;
}

/// Default sink: a structured log line per event.
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, event: &PriceDropEvent) -> anyhow::Result<()> {
        tracing::info!(
            product = %event.product_name,
            url = %event.product_url,
            observed_price = event.observed_price,
            threshold = event.threshold,
            savings = event.savings(),
            "price drop"
        );
        Ok(())
    }
}

/// Posts each event as JSON to a configured webhook endpoint.
pub struct WebhookAlertSink {
    client: Client,
    webhook_url: String,
}

impl WebhookAlertSink {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn notify(&self, event: &PriceDropEvent) -> anyhow::Result<()> {
        let payload = json!({
            "text": format!(
                "Price drop: {} is now {:.2} TL (target {:.2} TL, saving {:.2} TL)\n{}",
                event.product_name,
                event.observed_price,
                event.threshold,
                event.savings(),
                event.product_url,
            ),
            "event": event,
        });

        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
