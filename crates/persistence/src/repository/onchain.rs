//! On-chain fill repository — optional dataset
//!
//! All of these views may be empty (on-chain collection is optional);
//! callers degrade to an "unavailable" result instead of erroring.

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// One matched OrderFilled event with the wallet's role
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OnchainFillRow {
    pub transaction_hash: String,
    pub log_index: i64,
    pub condition_id: Option<String>,
    pub counterparty: Option<String>,
    pub bot_role: String,
    pub side: Option<String>,
    pub usdc_value: f64,
    pub fee: f64,
    pub timestamp: i64,
}

/// Fill/volume aggregate per counterparty address
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CounterpartyRow {
    pub counterparty: String,
    pub fills: i64,
    pub volume: f64,
    pub markets: i64,
    pub first_seen: i64,
    pub last_seen: i64,
}

/// Maker/taker fill counts per market
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MakerTakerRow {
    pub condition_id: String,
    pub maker_fills: i64,
    pub taker_fills: i64,
}

pub struct OnchainRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OnchainRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn onchain_fill_count(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM onchain_fills")
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }

    /// Per-counterparty fill/volume aggregates
    pub async fn counterparty_summary(&self) -> DbResult<Vec<CounterpartyRow>> {
        let rows = sqlx::query_as::<_, CounterpartyRow>(
            r#"SELECT counterparty,
                 COUNT(*) AS fills,
                 SUM(usdc_value) AS volume,
                 COUNT(DISTINCT condition_id) AS markets,
                 MIN(timestamp) AS first_seen,
                 MAX(timestamp) AS last_seen
               FROM onchain_fills
               WHERE counterparty IS NOT NULL AND counterparty != ''
               GROUP BY counterparty
               ORDER BY volume DESC"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn fee_total(&self) -> DbResult<f64> {
        let row: (Option<f64>,) = sqlx::query_as("SELECT SUM(fee) FROM onchain_fills")
            .fetch_one(self.pool)
            .await?;

        Ok(row.0.unwrap_or(0.0))
    }

    /// Maker/taker fill counts per market
    pub async fn maker_taker_summary(&self) -> DbResult<Vec<MakerTakerRow>> {
        let rows = sqlx::query_as::<_, MakerTakerRow>(
            r#"SELECT condition_id,
                 SUM(CASE WHEN bot_role='maker' THEN 1 ELSE 0 END) AS maker_fills,
                 SUM(CASE WHEN bot_role='taker' THEN 1 ELSE 0 END) AS taker_fills
               FROM onchain_fills
               WHERE condition_id IS NOT NULL
               GROUP BY condition_id
               ORDER BY condition_id"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}
