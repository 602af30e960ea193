//! Ingest repository — upserts for collector output
//!
//! The HTTP/RPC collectors live outside this workspace; they hand the
//! CLI batches of records which land here. Natural keys make re-runs
//! idempotent: (transaction_hash, asset) for trades, asset for
//! positions, condition_id for markets.

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use super::markets::MarketRow;
use super::onchain::OnchainFillRow;
use super::positions::PositionRow;

/// A single fill-level trade record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub transaction_hash: String,
    pub asset: String,
    pub side: String,
    pub outcome: String,
    pub size: f64,
    pub price: f64,
    pub usdc_value: f64,
    pub timestamp: i64,
    pub condition_id: String,
    pub fee: f64,
    pub activity_type: String,
}

pub struct IngestRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> IngestRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_trades(&self, trades: &[TradeRecord]) -> DbResult<()> {
        for t in trades {
            sqlx::query(
                r#"INSERT OR REPLACE INTO trades
                    (transaction_hash, asset, side, outcome, size, price,
                     usdc_value, timestamp, condition_id, fee, activity_type)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            )
            .bind(&t.transaction_hash)
            .bind(&t.asset)
            .bind(&t.side)
            .bind(&t.outcome)
            .bind(t.size)
            .bind(t.price)
            .bind(t.usdc_value)
            .bind(t.timestamp)
            .bind(&t.condition_id)
            .bind(t.fee)
            .bind(&t.activity_type)
            .execute(self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn upsert_markets(&self, markets: &[MarketRow]) -> DbResult<()> {
        for m in markets {
            sqlx::query(
                r#"INSERT OR REPLACE INTO markets
                    (condition_id, question, slug, end_ts, volume, liquidity, neg_risk)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            )
            .bind(&m.condition_id)
            .bind(&m.question)
            .bind(&m.slug)
            .bind(m.end_ts)
            .bind(m.volume)
            .bind(m.liquidity)
            .bind(m.neg_risk)
            .execute(self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn upsert_positions(&self, positions: &[PositionRow]) -> DbResult<()> {
        for p in positions {
            sqlx::query(
                r#"INSERT OR REPLACE INTO positions
                    (asset, condition_id, outcome, total_bought, avg_price,
                     realized_pnl, cur_price, close_timestamp, is_closed)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            )
            .bind(&p.asset)
            .bind(&p.condition_id)
            .bind(&p.outcome)
            .bind(p.total_bought)
            .bind(p.avg_price)
            .bind(p.realized_pnl)
            .bind(p.cur_price)
            .bind(p.close_timestamp)
            .bind(p.is_closed)
            .execute(self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn upsert_onchain_fills(&self, fills: &[OnchainFillRow]) -> DbResult<()> {
        for f in fills {
            sqlx::query(
                r#"INSERT OR REPLACE INTO onchain_fills
                    (transaction_hash, log_index, condition_id, counterparty,
                     bot_role, side, usdc_value, fee, timestamp)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            )
            .bind(&f.transaction_hash)
            .bind(f.log_index)
            .bind(&f.condition_id)
            .bind(&f.counterparty)
            .bind(&f.bot_role)
            .bind(&f.side)
            .bind(f.usdc_value)
            .bind(f.fee)
            .bind(f.timestamp)
            .execute(self.pool)
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fills::FillRepository;
    use crate::repository::markets::MarketRepository;
    use crate::repository::onchain::OnchainRepository;
    use crate::Database;

    fn fill(tx: &str, side: &str, outcome: &str, size: f64, price: f64, ts: i64) -> TradeRecord {
        TradeRecord {
            transaction_hash: tx.to_string(),
            asset: format!("tok-{outcome}"),
            side: side.to_string(),
            outcome: outcome.to_string(),
            size,
            price,
            usdc_value: size * price,
            timestamp: ts,
            condition_id: "mkt-1".to_string(),
            fee: 0.0,
            activity_type: "TRADE".to_string(),
        }
    }

    #[tokio::test]
    async fn per_market_summary_aggregates_per_side() {
        let db = Database::in_memory().await.unwrap();
        let ingest = IngestRepository::new(db.pool());

        ingest
            .upsert_trades(&[
                fill("0x1", "BUY", "Up", 100.0, 0.40, 1_000),
                fill("0x2", "BUY", "Down", 100.0, 0.45, 1_010),
                fill("0x3", "SELL", "Up", 20.0, 0.55, 1_100),
            ])
            .await
            .unwrap();

        let rows = FillRepository::new(db.pool())
            .per_market_summary()
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.condition_id, "mkt-1");
        assert!((r.buy_up_cost - 40.0).abs() < 1e-9);
        assert!((r.buy_down_cost - 45.0).abs() < 1e-9);
        assert!((r.buy_up_shares - 100.0).abs() < 1e-9);
        assert!((r.sell_up_proceeds - 11.0).abs() < 1e-9);
        assert_eq!(r.total_fills, 3);
        assert_eq!(r.buy_fills, 2);
        assert_eq!(r.sell_fills, 1);
        assert_eq!(r.first_fill_ts, 1_000);
        assert_eq!(r.last_fill_ts, 1_100);
    }

    #[tokio::test]
    async fn maker_rebates_excluded_from_summary() {
        let db = Database::in_memory().await.unwrap();
        let ingest = IngestRepository::new(db.pool());

        let mut rebate = fill("0xr", "BUY", "Up", 0.0, 0.0, 2_000);
        rebate.usdc_value = 12.5;
        rebate.activity_type = "MAKER_REBATE".to_string();

        ingest
            .upsert_trades(&[fill("0x1", "BUY", "Up", 10.0, 0.50, 1_000), rebate])
            .await
            .unwrap();

        let fills = FillRepository::new(db.pool());
        let rows = fills.per_market_summary().await.unwrap();
        assert_eq!(rows[0].total_fills, 1);
        assert!((rows[0].buy_up_cost - 5.0).abs() < 1e-9);

        let rebates = fills.maker_rebate_total().await.unwrap();
        assert!((rebates - 12.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn price_trajectory_windows_are_ordered() {
        let db = Database::in_memory().await.unwrap();
        let ingest = IngestRepository::new(db.pool());

        // 12 buy fills with strictly increasing price over time
        let trades: Vec<TradeRecord> = (0..12)
            .map(|i| fill(&format!("0x{i}"), "BUY", "Up", 10.0, 0.30 + i as f64 * 0.01, 1_000 + i))
            .collect();
        ingest.upsert_trades(&trades).await.unwrap();

        let rows = FillRepository::new(db.pool())
            .price_trajectory_summary()
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        let r = &rows[0];
        assert_eq!(r.buy_fills, 12);
        // first 5: 0.30..0.34 → 0.32; last 5: 0.37..0.41 → 0.39
        assert!((r.first_5_avg.unwrap() - 0.32).abs() < 1e-9);
        assert!((r.last_5_avg.unwrap() - 0.39).abs() < 1e-9);
        assert!((r.min_price - 0.30).abs() < 1e-9);
        assert!((r.max_price - 0.41).abs() < 1e-9);
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let ingest = IngestRepository::new(db.pool());

        let t = fill("0x1", "BUY", "Up", 10.0, 0.50, 1_000);
        ingest.upsert_trades(&[t.clone()]).await.unwrap();
        ingest.upsert_trades(&[t]).await.unwrap();

        let count = FillRepository::new(db.pool()).trade_count().await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn market_upsert_round_trips() {
        let db = Database::in_memory().await.unwrap();
        let ingest = IngestRepository::new(db.pool());

        let market = MarketRow {
            condition_id: "mkt-1".to_string(),
            question: Some("Ethereum Up or Down - June 1, 3AM ET".to_string()),
            slug: Some("ethereum-up-or-down-june-1-3am-et".to_string()),
            end_ts: Some(1_748_761_200),
            volume: Some(12_500.0),
            liquidity: Some(800.0),
            neg_risk: Some(1),
        };
        ingest.upsert_markets(&[market.clone()]).await.unwrap();
        ingest.upsert_markets(&[market]).await.unwrap();

        let markets = MarketRepository::new(db.pool());
        assert_eq!(markets.market_count().await.unwrap(), 1);

        let rows = markets.load_markets().await.unwrap();
        let m = &rows[0];
        assert_eq!(m.condition_id, "mkt-1");
        assert_eq!(m.question.as_deref(), Some("Ethereum Up or Down - June 1, 3AM ET"));
        assert_eq!(m.end_ts, Some(1_748_761_200));
        assert_eq!(m.neg_risk, Some(1));
    }

    #[tokio::test]
    async fn onchain_fill_upsert_round_trips() {
        let db = Database::in_memory().await.unwrap();
        let ingest = IngestRepository::new(db.pool());

        let event = |tx: &str, log_index: i64, counterparty: &str, usdc: f64| OnchainFillRow {
            transaction_hash: tx.to_string(),
            log_index,
            condition_id: Some("mkt-1".to_string()),
            counterparty: Some(counterparty.to_string()),
            bot_role: "maker".to_string(),
            side: Some("BUY".to_string()),
            usdc_value: usdc,
            fee: 0.1,
            timestamp: 1_000,
        };

        let fills = vec![
            event("0xa", 0, "0xcp1", 40.0),
            event("0xa", 1, "0xcp2", 60.0),
        ];
        ingest.upsert_onchain_fills(&fills).await.unwrap();
        // re-run replaces on (transaction_hash, log_index)
        ingest.upsert_onchain_fills(&fills).await.unwrap();

        let onchain = OnchainRepository::new(db.pool());
        assert_eq!(onchain.onchain_fill_count().await.unwrap(), 2);

        let summary = onchain.counterparty_summary().await.unwrap();
        assert_eq!(summary.len(), 2);
        // ordered by volume descending
        assert_eq!(summary[0].counterparty, "0xcp2");
        assert!((summary[0].volume - 60.0).abs() < 1e-9);
        assert_eq!(summary[1].fills, 1);
    }
}
