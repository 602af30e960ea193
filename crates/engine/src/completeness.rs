//! Completeness-arbitrage reconstruction
//!
//! For every market the wallet traded, measure how close it came to
//! holding a complete Up+Down pair and what that pair cost. A pair
//! bought for less than $1.00 pays out $1.00 at resolution regardless
//! of direction, so the per-market spread (1 - vwap_up - vwap_down)
//! is the locked-in edge and matched pairs times spread is the profit
//! guaranteed at entry.

use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeZone, Utc};
use serde::Serialize;
use tracing::debug;

use persistence::repository::PerMarketSummaryRow;

use crate::types::{AnalysisError, AnalysisResult, BalanceTier, Outcome};

/// One market where the wallet bought both sides.
#[derive(Debug, Clone, Serialize)]
pub struct CompletenessRecord {
    pub condition_id: String,
    pub vwap_up: f64,
    pub vwap_down: f64,
    /// 1 - vwap_up - vwap_down; positive means the pair was bought
    /// below parity.
    pub spread: f64,
    pub net_up: f64,
    pub net_down: f64,
    /// min(net_up, net_down): shares held as complete pairs.
    pub matched_pairs: f64,
    /// |net_up - net_down|: directional residue.
    pub unmatched: f64,
    pub excess_side: Outcome,
    /// min(net) / max(net), 0 when nothing is held net.
    pub balance_ratio: f64,
    pub tier: BalanceTier,
    pub guaranteed_profit: f64,
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

/// Market where only one side was ever bought. Excluded from the
/// completeness model but reported so the exclusion is visible.
#[derive(Debug, Clone, Serialize)]
pub struct OneSidedRecord {
    pub condition_id: String,
    pub side: Outcome,
    pub buy_cost: f64,
    pub buy_shares: f64,
    pub vwap: f64,
    pub total_fills: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierSummary {
    pub tier: BalanceTier,
    pub markets: usize,
    pub share_of_markets: f64,
    pub mean_spread: f64,
    pub mean_balance_ratio: f64,
    pub guaranteed_profit: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailySpread {
    pub day: String,
    pub markets: usize,
    pub mean_spread: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpreadBucket {
    pub label: String,
    pub markets: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletenessSummary {
    pub markets_total: usize,
    pub markets_both_sided: usize,
    pub markets_one_sided: usize,
    pub mean_spread: f64,
    pub median_spread: f64,
    pub negative_spread_markets: usize,
    pub mean_balance_ratio: f64,
    pub total_matched_pairs: f64,
    pub total_guaranteed_profit: f64,
    /// Mean spread over the first and last seven trading days; shows
    /// whether the edge widened or decayed over the sample.
    pub first_week_mean_spread: Option<f64>,
    pub last_week_mean_spread: Option<f64>,
    /// Sell proceeds over the buy-VWAP cost basis of the sold shares.
    /// None when the wallet never sold.
    pub sell_recovery_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletenessReport {
    pub records: Vec<CompletenessRecord>,
    pub one_sided: Vec<OneSidedRecord>,
    pub tiers: Vec<TierSummary>,
    pub daily_spread: Vec<DailySpread>,
    pub spread_histogram: Vec<SpreadBucket>,
    pub summary: CompletenessSummary,
}

impl CompletenessRecord {
    /// Build from a per-market aggregate. Returns None when either
    /// side has zero bought shares, in which case the market is
    /// one-sided and has no pair economics.
    pub fn from_row(row: &PerMarketSummaryRow) -> Option<Self> {
        if row.buy_up_shares <= 0.0 || row.buy_down_shares <= 0.0 {
            return None;
        }
        let vwap_up = row.buy_up_cost / row.buy_up_shares;
        let vwap_down = row.buy_down_cost / row.buy_down_shares;
        let spread = 1.0 - vwap_up - vwap_down;

        let net_up = (row.buy_up_shares - row.sell_up_shares).max(0.0);
        let net_down = (row.buy_down_shares - row.sell_down_shares).max(0.0);
        let matched_pairs = net_up.min(net_down);
        let unmatched = net_up.max(net_down) - matched_pairs;
        let excess_side = if net_up >= net_down {
            Outcome::Up
        } else {
            Outcome::Down
        };
        let max_net = net_up.max(net_down);
        let balance_ratio = if max_net > 0.0 {
            matched_pairs / max_net
        } else {
            0.0
        };

        Some(Self {
            condition_id: row.condition_id.clone(),
            vwap_up,
            vwap_down,
            spread,
            net_up,
            net_down,
            matched_pairs,
            unmatched,
            excess_side,
            balance_ratio,
            tier: BalanceTier::from_ratio(balance_ratio),
            guaranteed_profit: matched_pairs * spread,
            buy_up_cost: row.buy_up_cost,
            buy_up_shares: row.buy_up_shares,
            buy_down_cost: row.buy_down_cost,
            buy_down_shares: row.buy_down_shares,
            sell_up_proceeds: row.sell_up_proceeds,
            sell_up_shares: row.sell_up_shares,
            sell_down_proceeds: row.sell_down_proceeds,
            sell_down_shares: row.sell_down_shares,
            total_fills: row.total_fills,
            buy_fills: row.buy_fills,
            sell_fills: row.sell_fills,
            first_fill_ts: row.first_fill_ts,
            last_fill_ts: row.last_fill_ts,
        })
    }
}

fn one_sided_record(row: &PerMarketSummaryRow) -> Option<OneSidedRecord> {
    let (side, cost, shares) = if row.buy_up_shares > 0.0 && row.buy_down_shares <= 0.0 {
        (Outcome::Up, row.buy_up_cost, row.buy_up_shares)
    } else if row.buy_down_shares > 0.0 && row.buy_up_shares <= 0.0 {
        (Outcome::Down, row.buy_down_cost, row.buy_down_shares)
    } else {
        return None;
    };
    Some(OneSidedRecord {
        condition_id: row.condition_id.clone(),
        side,
        buy_cost: cost,
        buy_shares: shares,
        vwap: cost / shares,
        total_fills: row.total_fills,
    })
}

pub fn analyze(rows: &[PerMarketSummaryRow]) -> AnalysisResult<CompletenessReport> {
    if rows.is_empty() {
        return Err(AnalysisError::EmptyInput("no per-market fill summaries"));
    }

    let mut records = Vec::new();
    let mut one_sided = Vec::new();
    for row in rows {
        match CompletenessRecord::from_row(row) {
            Some(rec) => records.push(rec),
            None => {
                if let Some(rec) = one_sided_record(row) {
                    one_sided.push(rec);
                }
            }
        }
    }
    debug!(
        both_sided = records.len(),
        one_sided = one_sided.len(),
        "built completeness records"
    );

    let spreads: Vec<f64> = records.iter().map(|r| r.spread).collect();
    let ratios: Vec<f64> = records.iter().map(|r| r.balance_ratio).collect();
    let daily_spread = daily_spreads(&records);

    let day_of = |d: &DailySpread| NaiveDate::parse_from_str(&d.day, "%Y-%m-%d").ok();
    let first_week = daily_spread.first().and_then(|d| day_of(d)).map(|start| {
        let spreads: Vec<f64> = daily_spread
            .iter()
            .filter(|d| day_of(d).is_some_and(|nd| (nd - start).num_days() < 7))
            .map(|d| d.mean_spread)
            .collect();
        crate::stats::mean(&spreads)
    });
    let last_week = daily_spread.last().and_then(|d| day_of(d)).map(|end| {
        let spreads: Vec<f64> = daily_spread
            .iter()
            .filter(|d| day_of(d).is_some_and(|nd| (end - nd).num_days() < 7))
            .map(|d| d.mean_spread)
            .collect();
        crate::stats::mean(&spreads)
    });

    let sold_basis: f64 = records
        .iter()
        .map(|r| r.sell_up_shares * r.vwap_up + r.sell_down_shares * r.vwap_down)
        .sum();
    let sold_proceeds: f64 = records
        .iter()
        .map(|r| r.sell_up_proceeds + r.sell_down_proceeds)
        .sum();

    let summary = CompletenessSummary {
        markets_total: rows.len(),
        markets_both_sided: records.len(),
        markets_one_sided: one_sided.len(),
        mean_spread: crate::stats::mean(&spreads),
        median_spread: crate::stats::median(&spreads).unwrap_or(0.0),
        negative_spread_markets: spreads.iter().filter(|s| **s < 0.0).count(),
        mean_balance_ratio: crate::stats::mean(&ratios),
        total_matched_pairs: records.iter().map(|r| r.matched_pairs).sum(),
        total_guaranteed_profit: records.iter().map(|r| r.guaranteed_profit).sum(),
        first_week_mean_spread: first_week,
        last_week_mean_spread: last_week,
        sell_recovery_rate: if sold_basis > 0.0 {
            Some(sold_proceeds / sold_basis)
        } else {
            None
        },
    };

    Ok(CompletenessReport {
        tiers: tier_summaries(&records),
        daily_spread,
        spread_histogram: spread_histogram(&spreads),
        records,
        one_sided,
        summary,
    })
}

fn tier_summaries(records: &[CompletenessRecord]) -> Vec<TierSummary> {
    let total = records.len();
    BalanceTier::ORDERED
        .iter()
        .map(|tier| {
            let members: Vec<&CompletenessRecord> =
                records.iter().filter(|r| r.tier == *tier).collect();
            let spreads: Vec<f64> = members.iter().map(|r| r.spread).collect();
            let ratios: Vec<f64> = members.iter().map(|r| r.balance_ratio).collect();
            TierSummary {
                tier: *tier,
                markets: members.len(),
                share_of_markets: if total > 0 {
                    members.len() as f64 / total as f64
                } else {
                    0.0
                },
                mean_spread: crate::stats::mean(&spreads),
                mean_balance_ratio: crate::stats::mean(&ratios),
                guaranteed_profit: members.iter().map(|r| r.guaranteed_profit).sum(),
            }
        })
        .collect()
}

fn daily_spreads(records: &[CompletenessRecord]) -> Vec<DailySpread> {
    let mut by_day: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for rec in records {
        let day = match Utc.timestamp_opt(rec.first_fill_ts, 0).single() {
            Some(dt) => dt.format("%Y-%m-%d").to_string(),
            None => continue,
        };
        by_day.entry(day).or_default().push(rec.spread);
    }
    by_day
        .into_iter()
        .map(|(day, spreads)| DailySpread {
            markets: spreads.len(),
            mean_spread: crate::stats::mean(&spreads),
            day,
        })
        .collect()
}

fn spread_histogram(spreads: &[f64]) -> Vec<SpreadBucket> {
    const EDGES: [(f64, f64, &str); 6] = [
        (f64::NEG_INFINITY, 0.0, "< 0.00"),
        (0.0, 0.05, "0.00-0.05"),
        (0.05, 0.10, "0.05-0.10"),
        (0.10, 0.15, "0.10-0.15"),
        (0.15, 0.20, "0.15-0.20"),
        (0.20, f64::INFINITY, ">= 0.20"),
    ];
    EDGES
        .iter()
        .map(|(lo, hi, label)| SpreadBucket {
            label: (*label).to_string(),
            markets: spreads.iter().filter(|s| **s >= *lo && **s < *hi).count(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(condition_id: &str) -> PerMarketSummaryRow {
        PerMarketSummaryRow {
            condition_id: condition_id.to_string(),
            buy_up_cost: 0.0,
            buy_up_shares: 0.0,
            buy_down_cost: 0.0,
            buy_down_shares: 0.0,
            sell_up_proceeds: 0.0,
            sell_up_shares: 0.0,
            sell_down_proceeds: 0.0,
            sell_down_shares: 0.0,
            total_fills: 2,
            buy_fills: 2,
            sell_fills: 0,
            first_fill_ts: 1_700_000_000,
            last_fill_ts: 1_700_000_100,
        }
    }

    fn balanced_row() -> PerMarketSummaryRow {
        let mut r = row("c1");
        r.buy_up_cost = 40.0;
        r.buy_up_shares = 100.0;
        r.buy_down_cost = 45.0;
        r.buy_down_shares = 100.0;
        r
    }

    #[test]
    fn balanced_market_locks_the_spread() {
        let rec = CompletenessRecord::from_row(&balanced_row()).unwrap();
        assert!((rec.vwap_up - 0.40).abs() < 1e-12);
        assert!((rec.vwap_down - 0.45).abs() < 1e-12);
        assert!((rec.spread - 0.15).abs() < 1e-12);
        assert_eq!(rec.matched_pairs, 100.0);
        assert_eq!(rec.unmatched, 0.0);
        assert_eq!(rec.balance_ratio, 1.0);
        assert_eq!(rec.tier, BalanceTier::WellBalanced);
        assert!((rec.guaranteed_profit - 15.0).abs() < 1e-9);
    }

    #[test]
    fn matched_plus_unmatched_equals_max_net() {
        let mut r = balanced_row();
        r.buy_down_shares = 60.0;
        r.buy_down_cost = 27.0;
        let rec = CompletenessRecord::from_row(&r).unwrap();
        assert_eq!(rec.matched_pairs + rec.unmatched, rec.net_up.max(rec.net_down));
        assert_eq!(rec.excess_side, Outcome::Up);
        assert!((rec.balance_ratio - 0.6).abs() < 1e-12);
        assert_eq!(rec.tier, BalanceTier::Moderate);
    }

    #[test]
    fn sells_reduce_net_exposure() {
        let mut r = balanced_row();
        r.sell_up_shares = 30.0;
        r.sell_up_proceeds = 15.0;
        let rec = CompletenessRecord::from_row(&r).unwrap();
        assert_eq!(rec.net_up, 70.0);
        assert_eq!(rec.net_down, 100.0);
        assert_eq!(rec.excess_side, Outcome::Down);
        assert_eq!(rec.matched_pairs, 70.0);
    }

    #[test]
    fn one_sided_market_is_excluded() {
        let mut r = row("solo");
        r.buy_up_cost = 50.0;
        r.buy_up_shares = 100.0;
        assert!(CompletenessRecord::from_row(&r).is_none());

        let report = analyze(&[balanced_row(), r]).unwrap();
        assert_eq!(report.summary.markets_both_sided, 1);
        assert_eq!(report.summary.markets_one_sided, 1);
        assert_eq!(report.one_sided[0].side, Outcome::Up);
        assert!((report.one_sided[0].vwap - 0.50).abs() < 1e-12);
    }

    #[test]
    fn sell_recovery_marks_sold_shares_at_vwap() {
        let mut r = balanced_row();
        // 30 Up shares bought at 0.40 sold for $15: recovery 15/12
        r.sell_up_shares = 30.0;
        r.sell_up_proceeds = 15.0;
        let report = analyze(&[r]).unwrap();
        let recovery = report.summary.sell_recovery_rate.unwrap();
        assert!((recovery - 15.0 / 12.0).abs() < 1e-12);

        let no_sells = analyze(&[balanced_row()]).unwrap();
        assert!(no_sells.summary.sell_recovery_rate.is_none());
    }

    #[test]
    fn weekly_spread_trend_uses_calendar_days() {
        let mut early = balanced_row();
        early.first_fill_ts = 1_700_000_000;
        let mut late = balanced_row();
        late.condition_id = "c2".to_string();
        // nine days later, bought tighter
        late.first_fill_ts = 1_700_000_000 + 9 * 86_400;
        late.buy_down_cost = 55.0;
        let report = analyze(&[early, late]).unwrap();
        assert!((report.summary.first_week_mean_spread.unwrap() - 0.15).abs() < 1e-12);
        assert!((report.summary.last_week_mean_spread.unwrap() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            analyze(&[]),
            Err(AnalysisError::EmptyInput(_))
        ));
    }

    #[test]
    fn tier_summaries_cover_all_records() {
        let mut imbalanced = balanced_row();
        imbalanced.condition_id = "c2".to_string();
        imbalanced.buy_down_shares = 10.0;
        imbalanced.buy_down_cost = 4.5;
        let report = analyze(&[balanced_row(), imbalanced]).unwrap();
        let tier_total: usize = report.tiers.iter().map(|t| t.markets).sum();
        assert_eq!(tier_total, 2);
    }
}
