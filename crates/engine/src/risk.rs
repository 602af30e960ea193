//! Risk metrics over the settled history
//!
//! The daily series is built from position close timestamps rather
//! than trade timestamps: fills stop when collection stops, but the
//! positions feed covers every settled market, so closes give the
//! full history. Streaks come from a chronological per-market scan,
//! not the daily series, since a single bad day can hide several
//! consecutive losing markets.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use serde::Serialize;
use tracing::debug;

use persistence::repository::PositionPnlRow;

use crate::pnl::ResolvedMarket;
use crate::types::{AnalysisError, AnalysisResult};

/// Markets run every day of the week, so annualization uses calendar
/// days, not trading days.
const ANNUALIZATION_DAYS: f64 = 365.0;

#[derive(Debug, Clone, Serialize)]
pub struct DailyPnl {
    pub day: String,
    pub pnl: f64,
    pub cumulative: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PnlPercentiles {
    pub p1: f64,
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub days: usize,
    pub total_pnl: f64,
    pub mean_daily_pnl: f64,
    pub std_daily_pnl: f64,
    pub sharpe_annualized: f64,
    pub max_drawdown: f64,
    pub calmar: Option<f64>,
    /// Max drawdown as a fraction of peak concurrent exposure.
    pub drawdown_to_peak_exposure: Option<f64>,
    pub max_win_streak: usize,
    pub max_loss_streak: usize,
    pub market_pnl_percentiles: PnlPercentiles,
    pub daily: Vec<DailyPnl>,
}

pub fn analyze(
    position_pnl: &[PositionPnlRow],
    resolved: &[ResolvedMarket],
    peak_exposure: f64,
) -> AnalysisResult<RiskReport> {
    if position_pnl.is_empty() {
        return Err(AnalysisError::EmptyInput("no settled positions"));
    }

    let daily = daily_series(position_pnl);
    let pnls: Vec<f64> = daily.iter().map(|d| d.pnl).collect();
    let total_pnl: f64 = pnls.iter().sum();
    let mean = crate::stats::mean(&pnls);
    let std = crate::stats::std_dev(&pnls);
    let sharpe = if std > 0.0 {
        mean / std * ANNUALIZATION_DAYS.sqrt()
    } else {
        0.0
    };

    let max_drawdown = max_drawdown(&daily);
    let days = daily.len();
    let calmar = if max_drawdown > 0.0 && days > 0 {
        let annualized_return = total_pnl * ANNUALIZATION_DAYS / days as f64;
        Some(annualized_return / max_drawdown)
    } else {
        None
    };

    let (max_win_streak, max_loss_streak) = streaks(resolved);
    let market_pnls: Vec<f64> = resolved.iter().map(|m| m.trade_pnl).collect();
    let pct = |p: f64| crate::stats::percentile(&market_pnls, p).unwrap_or(0.0);

    debug!(days, sharpe, max_drawdown, "risk metrics complete");
    Ok(RiskReport {
        days,
        total_pnl,
        mean_daily_pnl: mean,
        std_daily_pnl: std,
        sharpe_annualized: sharpe,
        max_drawdown,
        calmar,
        drawdown_to_peak_exposure: if peak_exposure > 0.0 {
            Some(max_drawdown / peak_exposure)
        } else {
            None
        },
        max_win_streak,
        max_loss_streak,
        market_pnl_percentiles: PnlPercentiles {
            p1: pct(0.01),
            p5: pct(0.05),
            p25: pct(0.25),
            p50: pct(0.50),
            p75: pct(0.75),
            p95: pct(0.95),
            p99: pct(0.99),
        },
        daily,
    })
}

fn daily_series(position_pnl: &[PositionPnlRow]) -> Vec<DailyPnl> {
    let mut by_day: BTreeMap<String, f64> = BTreeMap::new();
    for row in position_pnl {
        let day = match Utc.timestamp_opt(row.close_ts, 0).single() {
            Some(dt) => dt.format("%Y-%m-%d").to_string(),
            None => continue,
        };
        *by_day.entry(day).or_default() += row.position_pnl;
    }
    let mut cumulative = 0.0;
    by_day
        .into_iter()
        .map(|(day, pnl)| {
            cumulative += pnl;
            DailyPnl {
                day,
                pnl,
                cumulative,
            }
        })
        .collect()
}

/// Peak-to-trough fall of the cumulative series, as a magnitude.
fn max_drawdown(daily: &[DailyPnl]) -> f64 {
    let mut peak = 0.0f64;
    let mut worst = 0.0f64;
    for d in daily {
        peak = peak.max(d.cumulative);
        worst = worst.max(peak - d.cumulative);
    }
    worst
}

fn streaks(resolved: &[ResolvedMarket]) -> (usize, usize) {
    let mut ordered: Vec<&ResolvedMarket> = resolved.iter().collect();
    ordered.sort_by_key(|m| (m.first_fill_ts, m.condition_id.clone()));
    let wins = crate::stats::longest_run(ordered.iter().map(|m| m.trade_pnl > 0.0));
    let losses = crate::stats::longest_run(ordered.iter().map(|m| m.trade_pnl < 0.0));
    (wins, losses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BalanceTier, Outcome};

    fn position(id: &str, pnl: f64, close_ts: i64) -> PositionPnlRow {
        PositionPnlRow {
            condition_id: id.to_string(),
            position_pnl: pnl,
            total_bought: 100.0,
            close_ts,
        }
    }

    fn market(id: &str, pnl: f64, first_fill_ts: i64) -> ResolvedMarket {
        ResolvedMarket {
            condition_id: id.to_string(),
            winner: Outcome::Up,
            close_ts: first_fill_ts + 3600,
            tier: BalanceTier::WellBalanced,
            spread: 0.1,
            matched_pairs: 100.0,
            unmatched: 0.0,
            excess_side: Outcome::Up,
            excess_won: true,
            payout: 100.0,
            total_buy_cost: 90.0,
            total_sell_proceeds: 0.0,
            trade_pnl: pnl,
            completeness_spread_pnl: pnl,
            directional_drag: 0.0,
            sell_pnl: 0.0,
            identity_residual: 0.0,
            hold_pnl: pnl,
            sell_discipline_value: 0.0,
            sell_winning_shares: 0.0,
            sell_losing_shares: 0.0,
            first_fill_ts,
        }
    }

    const DAY: i64 = 86_400;

    #[test]
    fn daily_series_groups_by_close_date() {
        let rows = vec![
            position("a", 10.0, 1_700_000_000),
            position("b", 5.0, 1_700_000_100),
            position("c", -3.0, 1_700_000_000 + DAY),
        ];
        let daily = daily_series(&rows);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].pnl, 15.0);
        assert_eq!(daily[1].pnl, -3.0);
        assert_eq!(daily[1].cumulative, 12.0);
    }

    #[test]
    fn drawdown_is_peak_to_trough() {
        let rows = vec![
            position("a", 10.0, 1_700_000_000),
            position("b", -4.0, 1_700_000_000 + DAY),
            position("c", -3.0, 1_700_000_000 + 2 * DAY),
            position("d", 20.0, 1_700_000_000 + 3 * DAY),
        ];
        let daily = daily_series(&rows);
        assert_eq!(max_drawdown(&daily), 7.0);
    }

    #[test]
    fn streaks_scan_markets_chronologically() {
        let markets = vec![
            market("a", 1.0, 100),
            market("b", 1.0, 200),
            market("c", -1.0, 300),
            market("d", -1.0, 400),
            market("e", -1.0, 500),
            market("f", 1.0, 600),
        ];
        let (wins, losses) = streaks(&markets);
        assert_eq!(wins, 2);
        assert_eq!(losses, 3);
    }

    #[test]
    fn zero_variance_sharpe_is_zero() {
        let rows = vec![
            position("a", 5.0, 1_700_000_000),
            position("b", 5.0, 1_700_000_000 + DAY),
        ];
        let report = analyze(&rows, &[market("a", 5.0, 1)], 0.0).unwrap();
        assert_eq!(report.sharpe_annualized, 0.0);
        assert!(report.drawdown_to_peak_exposure.is_none());
    }
}
