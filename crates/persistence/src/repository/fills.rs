//! Fill aggregation repository — per-market rollups over the trades table
//!
//! Every query filters to activity_type='TRADE' so maker-rebate credits
//! never leak into cost or share totals, and orders deterministically
//! (condition_id, or timestamp for positional windows).

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// One row per distinct market: buy/sell cost and share totals per
/// outcome side, fill counts, first/last fill timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PerMarketSummaryRow {
    pub condition_id: String,
    pub buy_up_cost: f64,
    pub buy_up_shares: f64,
    pub buy_down_cost: f64,
    pub buy_down_shares: f64,
    pub sell_up_proceeds: f64,
    pub sell_up_shares: f64,
    pub sell_down_proceeds: f64,
    pub sell_down_shares: f64,
    pub total_fills: i64,
    pub buy_fills: i64,
    pub sell_fills: i64,
    pub first_fill_ts: i64,
    pub last_fill_ts: i64,
}

/// Per-(side, outcome) timing detail, one row per market
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExecutionDetailRow {
    pub condition_id: String,
    pub first_buy_up_ts: Option<i64>,
    pub first_buy_down_ts: Option<i64>,
    pub first_sell_ts: Option<i64>,
    pub sell_up_fills: i64,
    pub sell_down_fills: i64,
}

/// First-5 / last-5 average buy price per (market, outcome)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceTrajectoryRow {
    pub condition_id: String,
    pub outcome: String,
    pub first_5_avg: Option<f64>,
    pub last_5_avg: Option<f64>,
    pub min_price: f64,
    pub max_price: f64,
    pub buy_fills: i64,
}

/// Fill/volume totals per UTC hour of day
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HourlyActivityRow {
    pub hour_utc: i64,
    pub fills: i64,
    pub volume: f64,
    pub markets: i64,
}

/// Fill/volume totals per day of week (0 = Sunday, SQLite convention)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DayOfWeekRow {
    pub dow: i64,
    pub fills: i64,
    pub volume: f64,
    pub markets: i64,
}

/// Buy/sell volume per calendar day
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailySummaryRow {
    pub day: String,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub markets: i64,
}

/// Per-(market, outcome) sell event detail
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SellDetailRow {
    pub condition_id: String,
    pub outcome: String,
    pub first_sell_price: f64,
    pub avg_sell_price: f64,
    pub first_sell_ts: i64,
    pub sell_fills: i64,
}

/// Read-only aggregation queries over the trades table
pub struct FillRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FillRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// One summary row per distinct market id. Markets with zero fills
    /// are absent, never zero-filled.
    pub async fn per_market_summary(&self) -> DbResult<Vec<PerMarketSummaryRow>> {
        let rows = sqlx::query_as::<_, PerMarketSummaryRow>(
            r#"SELECT condition_id,
                 SUM(CASE WHEN side='BUY'  AND outcome='Up'   THEN usdc_value ELSE 0.0 END) AS buy_up_cost,
                 SUM(CASE WHEN side='BUY'  AND outcome='Up'   THEN size       ELSE 0.0 END) AS buy_up_shares,
                 SUM(CASE WHEN side='BUY'  AND outcome='Down' THEN usdc_value ELSE 0.0 END) AS buy_down_cost,
                 SUM(CASE WHEN side='BUY'  AND outcome='Down' THEN size       ELSE 0.0 END) AS buy_down_shares,
                 SUM(CASE WHEN side='SELL' AND outcome='Up'   THEN usdc_value ELSE 0.0 END) AS sell_up_proceeds,
                 SUM(CASE WHEN side='SELL' AND outcome='Up'   THEN size       ELSE 0.0 END) AS sell_up_shares,
                 SUM(CASE WHEN side='SELL' AND outcome='Down' THEN usdc_value ELSE 0.0 END) AS sell_down_proceeds,
                 SUM(CASE WHEN side='SELL' AND outcome='Down' THEN size       ELSE 0.0 END) AS sell_down_shares,
                 COUNT(*) AS total_fills,
                 SUM(CASE WHEN side='BUY'  THEN 1 ELSE 0 END) AS buy_fills,
                 SUM(CASE WHEN side='SELL' THEN 1 ELSE 0 END) AS sell_fills,
                 MIN(timestamp) AS first_fill_ts,
                 MAX(timestamp) AS last_fill_ts
               FROM trades
               WHERE activity_type='TRADE'
               GROUP BY condition_id
               ORDER BY condition_id"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Companion timing view for sequencing analysis — kept separate
    /// from the main summary since most stages don't need it.
    pub async fn per_market_execution_detail(&self) -> DbResult<Vec<ExecutionDetailRow>> {
        let rows = sqlx::query_as::<_, ExecutionDetailRow>(
            r#"SELECT condition_id,
                 MIN(CASE WHEN side='BUY'  AND outcome='Up'   THEN timestamp END) AS first_buy_up_ts,
                 MIN(CASE WHEN side='BUY'  AND outcome='Down' THEN timestamp END) AS first_buy_down_ts,
                 MIN(CASE WHEN side='SELL'                    THEN timestamp END) AS first_sell_ts,
                 SUM(CASE WHEN side='SELL' AND outcome='Up'   THEN 1 ELSE 0 END) AS sell_up_fills,
                 SUM(CASE WHEN side='SELL' AND outcome='Down' THEN 1 ELSE 0 END) AS sell_down_fills
               FROM trades
               WHERE activity_type='TRADE'
               GROUP BY condition_id
               ORDER BY condition_id"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// First-5/last-5 average buy price per (market, outcome).
    /// Window ordering is (timestamp, transaction_hash) so recomputation
    /// is deterministic even with same-second fills.
    pub async fn price_trajectory_summary(&self) -> DbResult<Vec<PriceTrajectoryRow>> {
        let rows = sqlx::query_as::<_, PriceTrajectoryRow>(
            r#"WITH buys AS (
                 SELECT condition_id, outcome, price,
                   ROW_NUMBER() OVER (
                     PARTITION BY condition_id, outcome
                     ORDER BY timestamp, transaction_hash) AS rn_asc,
                   ROW_NUMBER() OVER (
                     PARTITION BY condition_id, outcome
                     ORDER BY timestamp DESC, transaction_hash DESC) AS rn_desc
                 FROM trades
                 WHERE activity_type='TRADE' AND side='BUY'
               )
               SELECT condition_id, outcome,
                 AVG(CASE WHEN rn_asc  <= 5 THEN price END) AS first_5_avg,
                 AVG(CASE WHEN rn_desc <= 5 THEN price END) AS last_5_avg,
                 MIN(price) AS min_price,
                 MAX(price) AS max_price,
                 COUNT(*) AS buy_fills
               FROM buys
               GROUP BY condition_id, outcome
               ORDER BY condition_id, outcome"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Fill/volume/market counts per UTC hour of day
    pub async fn hourly_activity(&self) -> DbResult<Vec<HourlyActivityRow>> {
        let rows = sqlx::query_as::<_, HourlyActivityRow>(
            r#"SELECT CAST(strftime('%H', timestamp, 'unixepoch') AS INTEGER) AS hour_utc,
                 COUNT(*) AS fills,
                 SUM(usdc_value) AS volume,
                 COUNT(DISTINCT condition_id) AS markets
               FROM trades
               WHERE activity_type='TRADE'
               GROUP BY hour_utc
               ORDER BY hour_utc"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Fill/volume/market counts per day of week (0 = Sunday)
    pub async fn day_of_week_activity(&self) -> DbResult<Vec<DayOfWeekRow>> {
        let rows = sqlx::query_as::<_, DayOfWeekRow>(
            r#"SELECT CAST(strftime('%w', timestamp, 'unixepoch') AS INTEGER) AS dow,
                 COUNT(*) AS fills,
                 SUM(usdc_value) AS volume,
                 COUNT(DISTINCT condition_id) AS markets
               FROM trades
               WHERE activity_type='TRADE'
               GROUP BY dow
               ORDER BY dow"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Buy/sell volume and market count per calendar day (UTC)
    pub async fn daily_summary(&self) -> DbResult<Vec<DailySummaryRow>> {
        let rows = sqlx::query_as::<_, DailySummaryRow>(
            r#"SELECT date(timestamp, 'unixepoch') AS day,
                 SUM(CASE WHEN side='BUY'  THEN usdc_value ELSE 0.0 END) AS buy_volume,
                 SUM(CASE WHEN side='SELL' THEN usdc_value ELSE 0.0 END) AS sell_volume,
                 COUNT(DISTINCT condition_id) AS markets
               FROM trades
               WHERE activity_type='TRADE'
               GROUP BY day
               ORDER BY day"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// First/average sell price per (market, outcome) sell event
    pub async fn sell_detail_by_market(&self) -> DbResult<Vec<SellDetailRow>> {
        let rows = sqlx::query_as::<_, SellDetailRow>(
            r#"WITH sells AS (
                 SELECT condition_id, outcome, price, timestamp,
                   ROW_NUMBER() OVER (
                     PARTITION BY condition_id, outcome
                     ORDER BY timestamp, transaction_hash) AS rn
                 FROM trades
                 WHERE activity_type='TRADE' AND side='SELL'
               )
               SELECT condition_id, outcome,
                 MAX(CASE WHEN rn=1 THEN price END) AS first_sell_price,
                 AVG(price) AS avg_sell_price,
                 MIN(timestamp) AS first_sell_ts,
                 COUNT(*) AS sell_fills
               FROM sells
               GROUP BY condition_id, outcome
               ORDER BY condition_id, outcome"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Total maker-rebate credits (kept outside per-market trade P&L)
    pub async fn maker_rebate_total(&self) -> DbResult<f64> {
        let row: (f64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(usdc_value), 0.0) FROM trades WHERE activity_type='MAKER_REBATE'",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(row.0)
    }

    /// Count of real fills (activity_type='TRADE')
    pub async fn trade_count(&self) -> DbResult<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM trades WHERE activity_type='TRADE'")
                .fetch_one(self.pool)
                .await?;

        Ok(row.0)
    }
}
