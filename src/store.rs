use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::models::{generate_id, PriceRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

const CREATE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS price_history (
    id          TEXT PRIMARY KEY,
    url         TEXT NOT NULL,
    price       REAL NOT NULL,
    observed_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_price_history_url_time ON price_history (url, observed_at)";

/// Append-only persistence for price observations. Each append is a single
/// atomic insert, so concurrent product checks cannot interleave within one
/// record. Nothing updates or deletes rows except the cascade when a tracked
/// product is removed.
#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_INDEX).execute(&pool).await?;
        Ok(Self { pool })
    }

    /// Durable write of one observation. Callers do not retry on failure; the
    /// next scheduled cycle re-attempts naturally.
    pub async fn append(
        &self,
        url: &str,
        price: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO price_history (id, url, price, observed_at) VALUES (?, ?, ?, ?)")
            .bind(generate_id())
            .bind(url)
            .bind(price)
            .bind(observed_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All observations for a URL, ascending by timestamp. Rowid breaks ties
    /// between same-timestamp inserts so retrieval reflects insertion order.
    pub async fn history_for(&self, url: &str) -> Result<Vec<PriceRecord>, StoreError> {
        let records = sqlx::query_as::<_, PriceRecord>(
            "SELECT url, price, observed_at FROM price_history \
             WHERE url = ? ORDER BY observed_at ASC, rowid ASC",
        )
        .bind(url)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Cascade used only when a tracked product is removed. Returns the
    /// number of records deleted.
    pub async fn remove_url(&self, url: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM price_history WHERE url = ?")
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
