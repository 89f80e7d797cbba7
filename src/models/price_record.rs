use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One immutable price observation. Records are append-only; they are removed
/// only when the owning tracked product is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PriceRecord {
    pub url: String,
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_rfc3339_timestamp() {
        let record = PriceRecord {
            url: "https://www.amazon.com.tr/dp/B0CNTW2G2F".to_string(),
            price: 1299.99,
            observed_at: Utc::now(),
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: PriceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
