//! Execution analytics: sequencing, entry speed, self-impact, sells
//!
//! These stages characterize HOW the wallet trades rather than what
//! it earns. Sequencing measures whether the two legs of a pair are
//! placed together or staggered; the self-impact test asks whether
//! the wallet's own buying moves the price it pays.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use persistence::repository::{ExecutionDetailRow, PriceTrajectoryRow};

use crate::completeness::CompletenessRecord;
use crate::markets::MarketInfo;
use crate::types::Outcome;

/// Entry-speed filter bounds, seconds relative to market open. Small
/// negative values absorb clock skew between feeds; anything past 30
/// minutes is a re-entry, not an opening trade.
const ENTRY_SPEED_MIN_SECS: i64 = -10;
const ENTRY_SPEED_MAX_SECS: i64 = 1800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactVerdict {
    /// Drift per fill grows with fill count: the wallet moves its own price.
    Increasing,
    /// Drift per fill shrinks with fill count: consistent with a random walk.
    Decreasing,
    Flat,
}

#[derive(Debug, Clone, Serialize)]
pub struct SequencingReport {
    pub markets: usize,
    pub mean_gap_secs: f64,
    pub median_gap_secs: f64,
    pub within_60s_rate: f64,
    /// Rank correlation of leg gap against balance ratio. Both are
    /// heavily skewed, so Pearson would be misleading here.
    pub gap_vs_balance_rho: Option<f64>,
    pub gap_vs_balance_p: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntrySpeedReport {
    pub markets: usize,
    pub mean_secs: f64,
    pub median_secs: f64,
    pub within_60s_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DurationReport {
    pub mean_secs: f64,
    pub median_secs: f64,
    pub p90_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactTercile {
    pub tercile: usize,
    pub markets: usize,
    pub mean_fills: f64,
    pub mean_abs_drift_per_fill: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelfImpactReport {
    pub terciles: Vec<ImpactTercile>,
    pub high_low_ratio: Option<f64>,
    pub verdict: ImpactVerdict,
}

#[derive(Debug, Clone, Serialize)]
pub struct SellPatternReport {
    pub markets_with_sells: usize,
    /// Balance ratio over gross bought shares, before any sells.
    pub mean_gross_balance: f64,
    /// Balance ratio over net shares, after sells.
    pub mean_net_balance: f64,
    /// Of markets with sells, fraction selling more shares on the
    /// side that ended up in excess. High values mean sells trim the
    /// heavy leg back toward balance.
    pub sells_on_excess_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub sequencing: SequencingReport,
    pub entry_speed: EntrySpeedReport,
    pub duration: DurationReport,
    pub self_impact: SelfImpactReport,
    pub sell_patterns: SellPatternReport,
}

pub fn analyze(
    records: &[CompletenessRecord],
    details: &[ExecutionDetailRow],
    trajectories: &[PriceTrajectoryRow],
    market_info: &HashMap<String, MarketInfo>,
) -> ExecutionReport {
    let detail_by_market: HashMap<&str, &ExecutionDetailRow> = details
        .iter()
        .map(|d| (d.condition_id.as_str(), d))
        .collect();

    let report = ExecutionReport {
        sequencing: sequencing(records, &detail_by_market),
        entry_speed: entry_speed(records, market_info),
        duration: duration(records),
        self_impact: self_impact(trajectories),
        sell_patterns: sell_patterns(records),
    };
    debug!(
        sequenced = report.sequencing.markets,
        timed = report.entry_speed.markets,
        "execution analytics complete"
    );
    report
}

fn sequencing(
    records: &[CompletenessRecord],
    details: &HashMap<&str, &ExecutionDetailRow>,
) -> SequencingReport {
    let mut gaps = Vec::new();
    let mut balances = Vec::new();
    for rec in records {
        let Some(detail) = details.get(rec.condition_id.as_str()) else {
            continue;
        };
        let (Some(up_ts), Some(down_ts)) = (detail.first_buy_up_ts, detail.first_buy_down_ts)
        else {
            continue;
        };
        gaps.push((up_ts - down_ts).abs() as f64);
        balances.push(rec.balance_ratio);
    }

    let spearman = crate::stats::spearman(&gaps, &balances);
    SequencingReport {
        markets: gaps.len(),
        mean_gap_secs: crate::stats::mean(&gaps),
        median_gap_secs: crate::stats::median(&gaps).unwrap_or(0.0),
        within_60s_rate: rate(&gaps, |g| *g <= 60.0),
        gap_vs_balance_rho: spearman.map(|(r, _)| r),
        gap_vs_balance_p: spearman.map(|(_, p)| p),
    }
}

fn entry_speed(
    records: &[CompletenessRecord],
    market_info: &HashMap<String, MarketInfo>,
) -> EntrySpeedReport {
    let mut delays = Vec::new();
    for rec in records {
        let Some(open_ts) = market_info.get(&rec.condition_id).and_then(|m| m.open_ts) else {
            continue;
        };
        let delay = rec.first_fill_ts - open_ts;
        if (ENTRY_SPEED_MIN_SECS..ENTRY_SPEED_MAX_SECS).contains(&delay) {
            delays.push(delay as f64);
        }
    }
    EntrySpeedReport {
        markets: delays.len(),
        mean_secs: crate::stats::mean(&delays),
        median_secs: crate::stats::median(&delays).unwrap_or(0.0),
        within_60s_rate: rate(&delays, |d| *d <= 60.0),
    }
}

fn duration(records: &[CompletenessRecord]) -> DurationReport {
    let spans: Vec<f64> = records
        .iter()
        .map(|r| (r.last_fill_ts - r.first_fill_ts) as f64)
        .collect();
    DurationReport {
        mean_secs: crate::stats::mean(&spans),
        median_secs: crate::stats::median(&spans).unwrap_or(0.0),
        p90_secs: crate::stats::percentile(&spans, 0.9).unwrap_or(0.0),
    }
}

/// Bucket (market, outcome) trajectories into fill-count terciles and
/// compare absolute price drift per fill between the heaviest and
/// lightest buckets.
fn self_impact(trajectories: &[PriceTrajectoryRow]) -> SelfImpactReport {
    let mut rows: Vec<(f64, f64)> = trajectories
        .iter()
        .filter(|t| t.buy_fills > 0)
        .filter_map(|t| {
            let drift = (t.last_5_avg? - t.first_5_avg?).abs();
            Some((t.buy_fills as f64, drift / t.buy_fills as f64))
        })
        .collect();
    rows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let n = rows.len();
    let mut buckets: [Vec<(f64, f64)>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for (rank, row) in rows.into_iter().enumerate() {
        buckets[crate::stats::tercile_of(rank, n)].push(row);
    }

    let terciles: Vec<ImpactTercile> = buckets
        .iter()
        .enumerate()
        .map(|(i, bucket)| {
            let fills: Vec<f64> = bucket.iter().map(|(f, _)| *f).collect();
            let drifts: Vec<f64> = bucket.iter().map(|(_, d)| *d).collect();
            ImpactTercile {
                tercile: i,
                markets: bucket.len(),
                mean_fills: crate::stats::mean(&fills),
                mean_abs_drift_per_fill: crate::stats::mean(&drifts),
            }
        })
        .collect();

    let low = terciles.first().map(|t| t.mean_abs_drift_per_fill);
    let high = terciles.last().map(|t| t.mean_abs_drift_per_fill);
    let high_low_ratio = match (low, high) {
        (Some(l), Some(h)) if l > 0.0 => Some(h / l),
        _ => None,
    };
    let verdict = match high_low_ratio {
        Some(r) if r > 1.1 => ImpactVerdict::Increasing,
        Some(r) if r < 0.9 => ImpactVerdict::Decreasing,
        _ => ImpactVerdict::Flat,
    };
    SelfImpactReport {
        terciles,
        high_low_ratio,
        verdict,
    }
}

fn sell_patterns(records: &[CompletenessRecord]) -> SellPatternReport {
    let gross: Vec<f64> = records
        .iter()
        .map(|r| {
            let max = r.buy_up_shares.max(r.buy_down_shares);
            if max > 0.0 {
                r.buy_up_shares.min(r.buy_down_shares) / max
            } else {
                0.0
            }
        })
        .collect();
    let net: Vec<f64> = records.iter().map(|r| r.balance_ratio).collect();

    let with_sells: Vec<&CompletenessRecord> = records
        .iter()
        .filter(|r| r.sell_up_shares > 0.0 || r.sell_down_shares > 0.0)
        .collect();
    // "Excess" here is the side bought heavier gross, since sells are
    // judged against what they were trimming.
    let on_excess = with_sells
        .iter()
        .filter(|r| {
            let heavy = if r.buy_up_shares >= r.buy_down_shares {
                Outcome::Up
            } else {
                Outcome::Down
            };
            match heavy {
                Outcome::Up => r.sell_up_shares > r.sell_down_shares,
                Outcome::Down => r.sell_down_shares > r.sell_up_shares,
            }
        })
        .count();

    SellPatternReport {
        markets_with_sells: with_sells.len(),
        mean_gross_balance: crate::stats::mean(&gross),
        mean_net_balance: crate::stats::mean(&net),
        sells_on_excess_rate: if with_sells.is_empty() {
            0.0
        } else {
            on_excess as f64 / with_sells.len() as f64
        },
    }
}

fn rate(values: &[f64], pred: impl Fn(&f64) -> bool) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| pred(v)).count() as f64 / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::repository::PerMarketSummaryRow;

    fn record(id: &str, first_ts: i64, last_ts: i64) -> CompletenessRecord {
        let row = PerMarketSummaryRow {
            condition_id: id.to_string(),
            buy_up_cost: 40.0,
            buy_up_shares: 100.0,
            buy_down_cost: 45.0,
            buy_down_shares: 100.0,
            sell_up_proceeds: 0.0,
            sell_up_shares: 0.0,
            sell_down_proceeds: 0.0,
            sell_down_shares: 0.0,
            total_fills: 4,
            buy_fills: 4,
            sell_fills: 0,
            first_fill_ts: first_ts,
            last_fill_ts: last_ts,
        };
        CompletenessRecord::from_row(&row).unwrap()
    }

    fn trajectory(id: &str, fills: i64, first: f64, last: f64) -> PriceTrajectoryRow {
        PriceTrajectoryRow {
            condition_id: id.to_string(),
            outcome: "Up".to_string(),
            first_5_avg: Some(first),
            last_5_avg: Some(last),
            min_price: first.min(last),
            max_price: first.max(last),
            buy_fills: fills,
        }
    }

    #[test]
    fn entry_speed_filters_out_of_band_delays() {
        let mut info = HashMap::new();
        for (id, open) in [("fast", 1_000), ("late", 1_000), ("early", 1_000)] {
            info.insert(
                id.to_string(),
                MarketInfo {
                    condition_id: id.to_string(),
                    asset: None,
                    duration_secs: 3600,
                    open_ts: Some(open),
                    end_ts: Some(open + 3600),
                },
            );
        }
        let records = vec![
            record("fast", 1_030, 1_100),   // +30s, kept
            record("late", 3_000, 3_100),   // +2000s, dropped
            record("early", 950, 1_000),    // -50s, dropped
        ];
        let speed = entry_speed(&records, &info);
        assert_eq!(speed.markets, 1);
        assert_eq!(speed.mean_secs, 30.0);
        assert_eq!(speed.within_60s_rate, 1.0);
    }

    #[test]
    fn self_impact_increasing_drift_is_flagged() {
        // Drift per fill grows with fill count
        let trajectories: Vec<PriceTrajectoryRow> = (0..30)
            .map(|i| {
                let fills = 5 + i;
                let drift = 0.001 * fills as f64 * fills as f64;
                trajectory(&format!("c{i}"), fills, 0.40, 0.40 + drift)
            })
            .collect();
        let report = self_impact(&trajectories);
        assert_eq!(report.verdict, ImpactVerdict::Increasing);
        assert!(report.high_low_ratio.unwrap() > 1.1);
    }

    #[test]
    fn self_impact_constant_total_drift_decreases_per_fill() {
        let trajectories: Vec<PriceTrajectoryRow> = (0..30)
            .map(|i| trajectory(&format!("c{i}"), 5 + i, 0.40, 0.42))
            .collect();
        let report = self_impact(&trajectories);
        assert_eq!(report.verdict, ImpactVerdict::Decreasing);
    }

    #[test]
    fn sequencing_pairs_gap_with_balance() {
        let records = vec![record("c1", 100, 200), record("c2", 100, 200)];
        let details = vec![
            ExecutionDetailRow {
                condition_id: "c1".to_string(),
                first_buy_up_ts: Some(100),
                first_buy_down_ts: Some(110),
                first_sell_ts: None,
                sell_up_fills: 0,
                sell_down_fills: 0,
            },
            ExecutionDetailRow {
                condition_id: "c2".to_string(),
                first_buy_up_ts: Some(500),
                first_buy_down_ts: None,
                first_sell_ts: None,
                sell_up_fills: 0,
                sell_down_fills: 0,
            },
        ];
        let map: HashMap<&str, &ExecutionDetailRow> =
            details.iter().map(|d| (d.condition_id.as_str(), d)).collect();
        let seq = sequencing(&records, &map);
        assert_eq!(seq.markets, 1);
        assert_eq!(seq.mean_gap_secs, 10.0);
        assert_eq!(seq.within_60s_rate, 1.0);
    }

    #[test]
    fn sells_on_excess_rate_counts_trimming() {
        let mut trimming = record("c1", 100, 200);
        trimming.buy_up_shares = 120.0;
        trimming.sell_up_shares = 20.0;
        let mut other = record("c2", 100, 200);
        other.buy_up_shares = 120.0;
        other.sell_down_shares = 20.0;
        let report = sell_patterns(&[trimming, other]);
        assert_eq!(report.markets_with_sells, 2);
        assert_eq!(report.sells_on_excess_rate, 0.5);
    }
}
