//! Position sizing and capital exposure
//!
//! Net capital per market is what the wallet actually had at risk
//! (buys minus sell proceeds). Because markets overlap in time, peak
//! exposure cannot be read off any single market or daily sum; it
//! needs a sweep over open/close events with a running total.

use serde::Serialize;
use tracing::debug;

use persistence::repository::DailySummaryRow;

use crate::completeness::CompletenessRecord;
use crate::pnl::ResolvedMarket;

/// Edge-capture ratios are clipped here; tiny guaranteed-profit
/// denominators otherwise produce absurd outliers.
const EDGE_CAPTURE_CLIP: f64 = 5.0;
const EDGE_CAPTURE_MIN_GUARANTEED: f64 = 0.01;

#[derive(Debug, Clone, Serialize)]
pub struct CapitalSummary {
    pub markets: usize,
    pub total_net_capital: f64,
    pub mean_net_capital: f64,
    pub median_net_capital: f64,
    pub p90_net_capital: f64,
    /// min(buy dollars)/max(buy dollars) across sides, averaged.
    pub mean_dollar_balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeCapture {
    pub markets: usize,
    pub mean_ratio: f64,
    pub median_ratio: f64,
    /// Fraction of markets that realized at least their locked spread.
    pub full_capture_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExposureReport {
    pub markets: usize,
    pub peak_exposure: f64,
    pub mean_exposure: f64,
    pub peak_concurrent_markets: usize,
}

/// Deployment rhythm from the calendar-day buy/sell volumes.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub days: usize,
    pub mean_daily_buy_volume: f64,
    pub peak_daily_buy_volume: f64,
    pub mean_daily_sell_recovery: f64,
    pub mean_daily_markets: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SizingReport {
    pub capital: CapitalSummary,
    pub edge_capture: EdgeCapture,
    pub exposure: ExposureReport,
    pub deployment: DeploymentReport,
}

pub fn analyze(
    records: &[CompletenessRecord],
    resolved: &[ResolvedMarket],
    daily: &[DailySummaryRow],
) -> SizingReport {
    let report = SizingReport {
        capital: capital_summary(records),
        edge_capture: edge_capture(resolved),
        exposure: exposure(resolved),
        deployment: deployment(daily),
    };
    debug!(
        peak_exposure = report.exposure.peak_exposure,
        peak_concurrent = report.exposure.peak_concurrent_markets,
        "sizing analytics complete"
    );
    report
}

pub fn net_capital(rec: &CompletenessRecord) -> f64 {
    (rec.buy_up_cost + rec.buy_down_cost)
        - (rec.sell_up_proceeds + rec.sell_down_proceeds)
}

fn capital_summary(records: &[CompletenessRecord]) -> CapitalSummary {
    let capitals: Vec<f64> = records.iter().map(net_capital).collect();
    let balances: Vec<f64> = records
        .iter()
        .map(|r| {
            let max = r.buy_up_cost.max(r.buy_down_cost);
            if max > 0.0 {
                r.buy_up_cost.min(r.buy_down_cost) / max
            } else {
                0.0
            }
        })
        .collect();
    CapitalSummary {
        markets: capitals.len(),
        total_net_capital: capitals.iter().sum(),
        mean_net_capital: crate::stats::mean(&capitals),
        median_net_capital: crate::stats::median(&capitals).unwrap_or(0.0),
        p90_net_capital: crate::stats::percentile(&capitals, 0.9).unwrap_or(0.0),
        mean_dollar_balance: crate::stats::mean(&balances),
    }
}

fn edge_capture(resolved: &[ResolvedMarket]) -> EdgeCapture {
    let ratios: Vec<f64> = resolved
        .iter()
        .filter(|m| m.completeness_spread_pnl > EDGE_CAPTURE_MIN_GUARANTEED)
        .map(|m| {
            (m.trade_pnl / m.completeness_spread_pnl).clamp(-EDGE_CAPTURE_CLIP, EDGE_CAPTURE_CLIP)
        })
        .collect();
    EdgeCapture {
        markets: ratios.len(),
        mean_ratio: crate::stats::mean(&ratios),
        median_ratio: crate::stats::median(&ratios).unwrap_or(0.0),
        full_capture_rate: if ratios.is_empty() {
            0.0
        } else {
            ratios.iter().filter(|r| **r >= 1.0).count() as f64 / ratios.len() as f64
        },
    }
}

/// Sweep-line over (+capital at first fill, -capital at close) events.
/// Opens are emitted before closes so same-timestamp handoffs count
/// as overlapping, which is the conservative reading for risk.
fn exposure(resolved: &[ResolvedMarket]) -> ExposureReport {
    let mut events: Vec<(i64, f64, i64)> = Vec::with_capacity(resolved.len() * 2);
    for m in resolved {
        let cap = m.total_buy_cost - m.total_sell_proceeds;
        events.push((m.first_fill_ts, cap, 1));
    }
    for m in resolved {
        let cap = m.total_buy_cost - m.total_sell_proceeds;
        events.push((m.close_ts, -cap, -1));
    }
    events.sort_by_key(|(ts, _, _)| *ts);

    let mut running = 0.0;
    let mut running_count = 0i64;
    let mut peak = 0.0f64;
    let mut peak_count = 0i64;
    let mut samples = Vec::with_capacity(events.len());
    for (_, delta, count_delta) in events {
        running += delta;
        running_count += count_delta;
        peak = peak.max(running);
        peak_count = peak_count.max(running_count);
        samples.push(running);
    }

    ExposureReport {
        markets: resolved.len(),
        peak_exposure: peak,
        mean_exposure: crate::stats::mean(&samples),
        peak_concurrent_markets: peak_count.max(0) as usize,
    }
}

fn deployment(daily: &[DailySummaryRow]) -> DeploymentReport {
    let buys: Vec<f64> = daily.iter().map(|d| d.buy_volume).collect();
    let sells: Vec<f64> = daily.iter().map(|d| d.sell_volume).collect();
    let markets: Vec<f64> = daily.iter().map(|d| d.markets as f64).collect();
    DeploymentReport {
        days: daily.len(),
        mean_daily_buy_volume: crate::stats::mean(&buys),
        peak_daily_buy_volume: buys.iter().cloned().fold(0.0, f64::max),
        mean_daily_sell_recovery: crate::stats::mean(&sells),
        mean_daily_markets: crate::stats::mean(&markets),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BalanceTier, Outcome};

    fn resolved(id: &str, capital: f64, open_ts: i64, close_ts: i64) -> ResolvedMarket {
        ResolvedMarket {
            condition_id: id.to_string(),
            winner: Outcome::Up,
            close_ts,
            tier: BalanceTier::WellBalanced,
            spread: 0.15,
            matched_pairs: 100.0,
            unmatched: 0.0,
            excess_side: Outcome::Up,
            excess_won: true,
            payout: 100.0,
            total_buy_cost: capital,
            total_sell_proceeds: 0.0,
            trade_pnl: 15.0,
            completeness_spread_pnl: 15.0,
            directional_drag: 0.0,
            sell_pnl: 0.0,
            identity_residual: 0.0,
            hold_pnl: 15.0,
            sell_discipline_value: 0.0,
            sell_winning_shares: 0.0,
            sell_losing_shares: 0.0,
            first_fill_ts: open_ts,
        }
    }

    #[test]
    fn non_overlapping_markets_never_stack() {
        let markets = vec![
            resolved("a", 100.0, 1_000, 2_000),
            resolved("b", 200.0, 3_000, 4_000),
        ];
        let exp = exposure(&markets);
        assert_eq!(exp.peak_exposure, 200.0);
        assert_eq!(exp.peak_concurrent_markets, 1);
    }

    #[test]
    fn overlapping_markets_stack() {
        let markets = vec![
            resolved("a", 100.0, 1_000, 4_000),
            resolved("b", 200.0, 2_000, 3_000),
        ];
        let exp = exposure(&markets);
        assert_eq!(exp.peak_exposure, 300.0);
        assert_eq!(exp.peak_concurrent_markets, 2);
    }

    #[test]
    fn edge_capture_ignores_near_zero_spreads() {
        let mut tiny = resolved("tiny", 85.0, 1, 2);
        tiny.completeness_spread_pnl = 0.001;
        tiny.trade_pnl = 50.0;
        let mut clipped = resolved("clipped", 85.0, 1, 2);
        clipped.completeness_spread_pnl = 1.0;
        clipped.trade_pnl = 100.0;
        let full = resolved("full", 85.0, 1, 2);

        let ec = edge_capture(&[tiny, clipped, full]);
        assert_eq!(ec.markets, 2);
        // clipped market capped at +5, full market exactly 1.0
        assert!((ec.mean_ratio - 3.0).abs() < 1e-9);
        assert_eq!(ec.full_capture_rate, 1.0);
    }

    #[test]
    fn deployment_averages_days() {
        let daily = vec![
            DailySummaryRow {
                day: "2025-01-01".into(),
                buy_volume: 100.0,
                sell_volume: 10.0,
                markets: 2,
            },
            DailySummaryRow {
                day: "2025-01-02".into(),
                buy_volume: 300.0,
                sell_volume: 30.0,
                markets: 4,
            },
        ];
        let dep = deployment(&daily);
        assert_eq!(dep.days, 2);
        assert_eq!(dep.mean_daily_buy_volume, 200.0);
        assert_eq!(dep.peak_daily_buy_volume, 300.0);
        assert_eq!(dep.mean_daily_sell_recovery, 20.0);
        assert_eq!(dep.mean_daily_markets, 3.0);
    }
}
