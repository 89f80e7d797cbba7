use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One product being tracked. The URL is the unique key within the tracked
/// set; `name` is filled in from the page title on the first successful fetch
/// and refreshed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackedProduct {
    pub url: String,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl TrackedProduct {
    pub fn new(url: impl Into<String>, threshold: f64) -> Self {
        Self {
            url: url.into(),
            threshold,
            name: None,
            last_price: None,
            last_checked_at: None,
        }
    }

    /// Human-readable label; falls back to the URL before the first
    /// successful title extraction.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }
}
