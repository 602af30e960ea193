//! Full analysis pipeline
//!
//! Stages run strictly in sequence, each consuming immutable output
//! of the ones before it. The heavy lifting (per-market aggregation,
//! window functions) happens inside SQLite; the stages themselves are
//! cheap in-memory passes.

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use persistence::repository::{
    FillRepository, MarketRepository, OnchainRepository, PositionRepository,
};
use persistence::Database;

use crate::completeness::{self, CompletenessReport};
use crate::counterparty::{self, CounterpartyReport};
use crate::execution::{self, ExecutionReport};
use crate::markets;
use crate::pnl::{self, PnlReport, Reconciliation};
use crate::prediction::{self, PredictionReport};
use crate::resolution;
use crate::risk::{self, RiskReport};
use crate::sizing::{self, SizingReport};
use crate::synthesis::{self, SynthesisInputs, SynthesisReport};
use crate::temporal::{self, TemporalReport};
use crate::types::{AnalysisConfig, AnalysisResult};

#[derive(Debug, Clone, Serialize)]
pub struct DataCounts {
    pub trades: i64,
    pub markets: i64,
    pub positions: i64,
    pub onchain_fills: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionSummary {
    pub resolved_markets: usize,
    pub conflicting_markets: usize,
    pub pending_positions: usize,
}

/// Output of a full pipeline run, one sub-report per stage.
#[derive(Debug, Clone, Serialize)]
pub struct FullReport {
    pub wallet: String,
    pub generated_at: String,
    pub counts: DataCounts,
    pub asset_breakdown: Vec<(String, usize)>,
    pub completeness: CompletenessReport,
    pub resolution: ResolutionSummary,
    pub pnl: PnlReport,
    pub reconciliation: Reconciliation,
    pub prediction: PredictionReport,
    pub execution: ExecutionReport,
    pub sizing: SizingReport,
    pub risk: RiskReport,
    pub temporal: TemporalReport,
    pub counterparty: CounterpartyReport,
    pub synthesis: SynthesisReport,
}

pub async fn run(db: &Database, config: &AnalysisConfig) -> AnalysisResult<FullReport> {
    let pool = db.pool();
    let fills = FillRepository::new(pool);
    let positions_repo = PositionRepository::new(pool);
    let markets_repo = MarketRepository::new(pool);
    let onchain = OnchainRepository::new(pool);

    let counts = DataCounts {
        trades: fills.trade_count().await?,
        markets: markets_repo.market_count().await?,
        positions: positions_repo.position_count().await?,
        onchain_fills: onchain.onchain_fill_count().await?,
    };
    info!(
        trades = counts.trades,
        markets = counts.markets,
        positions = counts.positions,
        "starting analysis run"
    );

    let summaries = fills.per_market_summary().await?;
    let completeness = completeness::analyze(&summaries)?;

    let closed_positions = positions_repo.load_positions(true).await?;
    let resolutions = resolution::link_resolutions(&closed_positions);
    let resolution_summary = ResolutionSummary {
        resolved_markets: resolutions.winners.len(),
        conflicting_markets: resolutions.conflicts.len(),
        pending_positions: resolutions.pending_positions,
    };

    let pnl = pnl::analyze(&completeness.records, &resolutions)?;
    let position_pnl = positions_repo.position_pnl_by_condition().await?;
    let reconciliation = pnl::reconcile(&pnl, &position_pnl);

    let prediction = prediction::analyze(&completeness.records, &resolutions, config)?;

    let market_rows = markets_repo.load_markets().await?;
    let market_info = markets::build_market_info(&market_rows);
    let asset_breakdown = markets::asset_breakdown(&market_info);

    let details = fills.per_market_execution_detail().await?;
    let trajectories = fills.price_trajectory_summary().await?;
    let execution = execution::analyze(
        &completeness.records,
        &details,
        &trajectories,
        &market_info,
    );

    let daily = fills.daily_summary().await?;
    let sizing = sizing::analyze(&completeness.records, &pnl.markets, &daily);
    let risk = risk::analyze(&position_pnl, &pnl.markets, sizing.exposure.peak_exposure)?;

    let hourly = fills.hourly_activity().await?;
    let day_of_week = fills.day_of_week_activity().await?;
    let sells = fills.sell_detail_by_market().await?;
    let temporal = temporal::analyze(&hourly, &day_of_week, &sells, &completeness.records, config);

    let counterparties = onchain.counterparty_summary().await?;
    let maker_taker = onchain.maker_taker_summary().await?;
    let total_fees = onchain.fee_total().await?;
    let maker_rebates = fills.maker_rebate_total().await?;
    let counterparty = counterparty::analyze(
        &counterparties,
        &maker_taker,
        total_fees,
        maker_rebates,
        config,
    );

    let synthesis = synthesis::synthesize(&SynthesisInputs {
        completeness: &completeness,
        pnl: &pnl,
        resolutions: &resolutions,
        reconciliation: &reconciliation,
        prediction: &prediction,
        execution: &execution,
        sizing: &sizing,
        risk: &risk,
        temporal: &temporal,
        counterparty: &counterparty,
        market_info: &market_info,
    });

    Ok(FullReport {
        wallet: config.wallet.clone(),
        generated_at: Utc::now().to_rfc3339(),
        counts,
        asset_breakdown,
        completeness,
        resolution: resolution_summary,
        pnl,
        reconciliation,
        prediction,
        execution,
        sizing,
        risk,
        temporal,
        counterparty,
        synthesis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::repository::{IngestRepository, TradeRecord};

    fn trade(
        tx: &str,
        asset: &str,
        condition_id: &str,
        side: &str,
        outcome: &str,
        size: f64,
        price: f64,
        timestamp: i64,
    ) -> TradeRecord {
        TradeRecord {
            transaction_hash: tx.to_string(),
            asset: asset.to_string(),
            side: side.to_string(),
            outcome: outcome.to_string(),
            size,
            price,
            usdc_value: size * price,
            timestamp,
            condition_id: condition_id.to_string(),
            fee: 0.0,
            activity_type: "TRADE".to_string(),
        }
    }

    async fn seeded_db() -> Database {
        let db = Database::in_memory().await.unwrap();
        let ingest = IngestRepository::new(db.pool());

        let mut trades = Vec::new();
        // 3 balanced markets, each 100 Up @ .40 and 100 Down @ .45
        for (i, cid) in ["c1", "c2", "c3"].iter().enumerate() {
            let base = 1_700_000_000 + i as i64 * 7200;
            trades.push(trade(
                &format!("{cid}-u"),
                &format!("{cid}-asset-up"),
                cid,
                "BUY",
                "Up",
                100.0,
                0.40,
                base,
            ));
            trades.push(trade(
                &format!("{cid}-d"),
                &format!("{cid}-asset-down"),
                cid,
                "BUY",
                "Down",
                100.0,
                0.45,
                base + 5,
            ));
        }
        ingest.upsert_trades(&trades).await.unwrap();

        // Close each market with Up winning
        let positions: Vec<persistence::repository::PositionRow> = ["c1", "c2", "c3"]
            .iter()
            .enumerate()
            .map(|(i, cid)| persistence::repository::PositionRow {
                asset: format!("{cid}-asset-up"),
                condition_id: cid.to_string(),
                outcome: "Up".to_string(),
                total_bought: 100.0,
                avg_price: 0.40,
                realized_pnl: 15.0,
                cur_price: 1.0,
                close_timestamp: 1_700_000_000 + i as i64 * 7200 + 3600,
                is_closed: 1,
            })
            .collect();
        ingest.upsert_positions(&positions).await.unwrap();
        db
    }

    #[tokio::test]
    async fn full_run_over_seeded_database() {
        let db = seeded_db().await;
        let config = AnalysisConfig::default();
        let report = run(&db, &config).await.unwrap();

        assert_eq!(report.counts.trades, 6);
        assert_eq!(report.completeness.summary.markets_both_sided, 3);
        assert_eq!(report.resolution.resolved_markets, 3);
        assert_eq!(report.pnl.summary.resolved_markets, 3);
        assert!((report.pnl.summary.total_trade_pnl - 45.0).abs() < 1e-6);
        assert_eq!(report.pnl.summary.identity_violations, 0);
        // On-chain data was never collected
        assert!(!report.counterparty.available);
        // Markets do not overlap in time, so exposure never stacks
        assert!((report.sizing.exposure.peak_exposure - 85.0).abs() < 1e-6);
        assert_eq!(report.sizing.exposure.peak_concurrent_markets, 1);
    }

    #[tokio::test]
    async fn rerun_is_deterministic() {
        let db = seeded_db().await;
        let config = AnalysisConfig::default();
        let a = run(&db, &config).await.unwrap();
        let b = run(&db, &config).await.unwrap();
        assert_eq!(
            serde_json::to_string(&a.completeness.records).unwrap(),
            serde_json::to_string(&b.completeness.records).unwrap()
        );
        assert_eq!(a.prediction.permutation.p_value, b.prediction.permutation.p_value);
    }
}
