//! Position repository — ground-truth position records
//!
//! Position P&L is cross-check data, never the primary P&L source:
//! the trade-derived numbers are primary, with a known methodology gap
//! against the position API's avg_price accounting.

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// One position per (condition, outcome) token
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PositionRow {
    pub asset: String,
    pub condition_id: String,
    pub outcome: String,
    pub total_bought: f64,
    pub avg_price: f64,
    pub realized_pnl: f64,
    pub cur_price: f64,
    pub close_timestamp: i64,
    pub is_closed: i64,
}

/// Realized P&L rolled up per market
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PositionPnlRow {
    pub condition_id: String,
    pub position_pnl: f64,
    pub total_bought: f64,
    pub close_ts: i64,
}

pub struct PositionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PositionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn load_positions(&self, closed_only: bool) -> DbResult<Vec<PositionRow>> {
        let query = if closed_only {
            "SELECT * FROM positions WHERE is_closed = 1 ORDER BY condition_id, outcome"
        } else {
            "SELECT * FROM positions ORDER BY condition_id, outcome"
        };
        let rows = sqlx::query_as::<_, PositionRow>(query)
            .fetch_all(self.pool)
            .await?;

        Ok(rows)
    }

    /// Realized P&L per market over closed positions, with the latest
    /// close timestamp across the two outcome tokens.
    pub async fn position_pnl_by_condition(&self) -> DbResult<Vec<PositionPnlRow>> {
        let rows = sqlx::query_as::<_, PositionPnlRow>(
            r#"SELECT condition_id,
                 SUM(realized_pnl) AS position_pnl,
                 SUM(total_bought) AS total_bought,
                 MAX(close_timestamp) AS close_ts
               FROM positions
               WHERE is_closed = 1
               GROUP BY condition_id
               ORDER BY condition_id"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn position_count(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM positions")
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }
}
