//! Market metadata repository

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Market catalog entry. The question text encodes the underlying
/// asset and the market duration (parsed by the engine).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MarketRow {
    pub condition_id: String,
    pub question: Option<String>,
    pub slug: Option<String>,
    pub end_ts: Option<i64>,
    pub volume: Option<f64>,
    pub liquidity: Option<f64>,
    pub neg_risk: Option<i64>,
}

pub struct MarketRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MarketRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn load_markets(&self) -> DbResult<Vec<MarketRow>> {
        let rows =
            sqlx::query_as::<_, MarketRow>("SELECT * FROM markets ORDER BY condition_id")
                .fetch_all(self.pool)
                .await?;

        Ok(rows)
    }

    pub async fn market_count(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM markets")
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }
}
