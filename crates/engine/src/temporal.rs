//! Temporal activity profiles and sell-trigger classification
//!
//! The schedule classifier asks what drives the activity clock:
//! chasing hours where spreads are wide, a human operator's waking
//! hours, or a fixed cadence. The comparison is fill counts in the 6
//! widest-spread hours against the 6 tightest; anything inside a
//! +-20% band reads as cadence-driven, the default finding.

use std::collections::HashMap;

use chrono::{TimeZone, Timelike, Utc};
use serde::Serialize;
use tracing::debug;

use persistence::repository::{DayOfWeekRow, HourlyActivityRow, SellDetailRow};

use crate::completeness::CompletenessRecord;
use crate::types::{AnalysisConfig, Outcome};

const SCHEDULE_HOURS: usize = 6;
const SCHEDULE_FLAT_BAND: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleVerdict {
    SpreadSeeking,
    ScheduleDriven,
    CadenceDriven,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourProfile {
    pub hour_utc: i64,
    pub fills: i64,
    pub volume: f64,
    pub markets: i64,
    pub mean_spread: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleReport {
    pub wide_hours: Vec<i64>,
    pub tight_hours: Vec<i64>,
    pub mean_fills_wide: f64,
    pub mean_fills_tight: f64,
    pub wide_tight_ratio: Option<f64>,
    pub verdict: ScheduleVerdict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SellTrigger {
    LossCutting,
    Rebalancing,
}

impl SellTrigger {
    /// A sell below the break ratio realized a loss against entry VWAP.
    fn classify(price_to_vwap: f64, break_ratio: f64) -> Self {
        if price_to_vwap < break_ratio {
            SellTrigger::LossCutting
        } else {
            SellTrigger::Rebalancing
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SellTriggerReport {
    pub sell_events: usize,
    pub loss_cutting: usize,
    pub rebalancing: usize,
    pub loss_cutting_rate: f64,
    pub mean_price_to_vwap: f64,
    /// Sell events bucketed by first-sell-price over entry VWAP.
    pub ratio_brackets: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemporalReport {
    pub hourly: Vec<HourProfile>,
    pub day_of_week: Vec<DayOfWeekRow>,
    /// Mean per-day volume on weekends over weekdays.
    pub weekend_weekday_ratio: Option<f64>,
    pub schedule: ScheduleReport,
    pub sell_trigger: SellTriggerReport,
}

pub fn analyze(
    hourly: &[HourlyActivityRow],
    day_of_week: &[DayOfWeekRow],
    sells: &[SellDetailRow],
    records: &[CompletenessRecord],
    config: &AnalysisConfig,
) -> TemporalReport {
    let spread_by_hour = spread_by_hour(records);
    let profiles: Vec<HourProfile> = hourly
        .iter()
        .map(|h| HourProfile {
            hour_utc: h.hour_utc,
            fills: h.fills,
            volume: h.volume,
            markets: h.markets,
            mean_spread: spread_by_hour.get(&h.hour_utc).copied(),
        })
        .collect();

    let report = TemporalReport {
        schedule: schedule(&profiles),
        weekend_weekday_ratio: weekend_ratio(day_of_week),
        sell_trigger: sell_trigger(sells, records, config),
        hourly: profiles,
        day_of_week: day_of_week.to_vec(),
    };
    debug!(
        verdict = ?report.schedule.verdict,
        sells = report.sell_trigger.sell_events,
        "temporal analytics complete"
    );
    report
}

fn spread_by_hour(records: &[CompletenessRecord]) -> HashMap<i64, f64> {
    let mut sums: HashMap<i64, (f64, usize)> = HashMap::new();
    for rec in records {
        if let Some(dt) = Utc.timestamp_opt(rec.first_fill_ts, 0).single() {
            let entry = sums.entry(dt.hour() as i64).or_insert((0.0, 0));
            entry.0 += rec.spread;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(h, (sum, n))| (h, sum / n as f64))
        .collect()
}

fn schedule(profiles: &[HourProfile]) -> ScheduleReport {
    let mut with_spread: Vec<&HourProfile> =
        profiles.iter().filter(|p| p.mean_spread.is_some()).collect();
    with_spread.sort_by(|a, b| {
        b.mean_spread
            .partial_cmp(&a.mean_spread)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.hour_utc.cmp(&b.hour_utc))
    });

    if with_spread.len() < 2 * SCHEDULE_HOURS {
        return ScheduleReport {
            wide_hours: Vec::new(),
            tight_hours: Vec::new(),
            mean_fills_wide: 0.0,
            mean_fills_tight: 0.0,
            wide_tight_ratio: None,
            verdict: ScheduleVerdict::CadenceDriven,
        };
    }

    let wide: Vec<&HourProfile> = with_spread[..SCHEDULE_HOURS].to_vec();
    let tight: Vec<&HourProfile> = with_spread[with_spread.len() - SCHEDULE_HOURS..].to_vec();
    let mean_fills = |hours: &[&HourProfile]| {
        hours.iter().map(|h| h.fills as f64).sum::<f64>() / hours.len() as f64
    };
    let mean_fills_wide = mean_fills(&wide);
    let mean_fills_tight = mean_fills(&tight);
    let ratio = if mean_fills_tight > 0.0 {
        Some(mean_fills_wide / mean_fills_tight)
    } else {
        None
    };
    let verdict = match ratio {
        Some(r) if r > 1.0 + SCHEDULE_FLAT_BAND => ScheduleVerdict::SpreadSeeking,
        Some(r) if r < 1.0 - SCHEDULE_FLAT_BAND => ScheduleVerdict::ScheduleDriven,
        _ => ScheduleVerdict::CadenceDriven,
    };
    ScheduleReport {
        wide_hours: wide.iter().map(|h| h.hour_utc).collect(),
        tight_hours: tight.iter().map(|h| h.hour_utc).collect(),
        mean_fills_wide,
        mean_fills_tight,
        wide_tight_ratio: ratio,
        verdict,
    }
}

/// Weekend is SQLite dow 0 (Sunday) and 6 (Saturday).
fn weekend_ratio(rows: &[DayOfWeekRow]) -> Option<f64> {
    let (mut weekend, mut weekend_days) = (0.0, 0usize);
    let (mut weekday, mut weekday_days) = (0.0, 0usize);
    for row in rows {
        if row.dow == 0 || row.dow == 6 {
            weekend += row.volume;
            weekend_days += 1;
        } else {
            weekday += row.volume;
            weekday_days += 1;
        }
    }
    if weekend_days == 0 || weekday_days == 0 || weekday <= 0.0 {
        return None;
    }
    Some((weekend / weekend_days as f64) / (weekday / weekday_days as f64))
}

fn sell_trigger(
    sells: &[SellDetailRow],
    records: &[CompletenessRecord],
    config: &AnalysisConfig,
) -> SellTriggerReport {
    let vwaps: HashMap<(&str, Outcome), f64> = records
        .iter()
        .flat_map(|r| {
            [
                ((r.condition_id.as_str(), Outcome::Up), r.vwap_up),
                ((r.condition_id.as_str(), Outcome::Down), r.vwap_down),
            ]
        })
        .collect();

    let mut ratios = Vec::new();
    for sell in sells {
        let Some(outcome) = Outcome::parse(&sell.outcome) else {
            continue;
        };
        let Some(vwap) = vwaps.get(&(sell.condition_id.as_str(), outcome)) else {
            continue;
        };
        if *vwap > 0.0 {
            ratios.push(sell.first_sell_price / vwap);
        }
    }

    let loss_cutting = ratios
        .iter()
        .filter(|r| SellTrigger::classify(**r, config.sell_trigger_break) == SellTrigger::LossCutting)
        .count();
    let brackets: [(f64, f64, &str); 5] = [
        (f64::NEG_INFINITY, 0.5, "< 0.5"),
        (0.5, 0.8, "0.5-0.8"),
        (0.8, 1.0, "0.8-1.0"),
        (1.0, 1.2, "1.0-1.2"),
        (1.2, f64::INFINITY, ">= 1.2"),
    ];
    SellTriggerReport {
        sell_events: ratios.len(),
        loss_cutting,
        rebalancing: ratios.len() - loss_cutting,
        loss_cutting_rate: if ratios.is_empty() {
            0.0
        } else {
            loss_cutting as f64 / ratios.len() as f64
        },
        mean_price_to_vwap: crate::stats::mean(&ratios),
        ratio_brackets: brackets
            .iter()
            .map(|(lo, hi, label)| {
                (
                    (*label).to_string(),
                    ratios.iter().filter(|r| **r >= *lo && **r < *hi).count(),
                )
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::repository::PerMarketSummaryRow;

    fn record(id: &str, first_fill_ts: i64, spread_target: f64) -> CompletenessRecord {
        // Pick symmetric VWAPs that produce the requested spread
        let vwap = (1.0 - spread_target) / 2.0;
        let row = PerMarketSummaryRow {
            condition_id: id.to_string(),
            buy_up_cost: vwap * 100.0,
            buy_up_shares: 100.0,
            buy_down_cost: vwap * 100.0,
            buy_down_shares: 100.0,
            sell_up_proceeds: 0.0,
            sell_up_shares: 0.0,
            sell_down_proceeds: 0.0,
            sell_down_shares: 0.0,
            total_fills: 2,
            buy_fills: 2,
            sell_fills: 0,
            first_fill_ts,
            last_fill_ts: first_fill_ts + 60,
        };
        CompletenessRecord::from_row(&row).unwrap()
    }

    fn hour_row(hour_utc: i64, fills: i64) -> HourlyActivityRow {
        HourlyActivityRow {
            hour_utc,
            fills,
            volume: fills as f64 * 10.0,
            markets: fills,
        }
    }

    #[test]
    fn schedule_flat_band_reads_as_cadence() {
        // 12 hours, spread decreasing with hour, identical fill counts
        let records: Vec<CompletenessRecord> = (0..12)
            .map(|h| record(&format!("c{h}"), h * 3600, 0.20 - h as f64 * 0.01))
            .collect();
        let hourly: Vec<HourlyActivityRow> = (0..12).map(|h| hour_row(h, 100)).collect();
        let report = analyze(&hourly, &[], &[], &records, &AnalysisConfig::default());
        assert_eq!(report.schedule.verdict, ScheduleVerdict::CadenceDriven);
        assert_eq!(report.schedule.wide_tight_ratio, Some(1.0));
    }

    #[test]
    fn spread_seeking_when_wide_hours_dominate() {
        let records: Vec<CompletenessRecord> = (0..12)
            .map(|h| record(&format!("c{h}"), h * 3600, 0.20 - h as f64 * 0.01))
            .collect();
        // Twice the fills in the 6 widest-spread hours (0..6)
        let hourly: Vec<HourlyActivityRow> = (0..12)
            .map(|h| hour_row(h, if h < 6 { 200 } else { 100 }))
            .collect();
        let report = analyze(&hourly, &[], &[], &records, &AnalysisConfig::default());
        assert_eq!(report.schedule.verdict, ScheduleVerdict::SpreadSeeking);
    }

    #[test]
    fn sell_below_entry_is_loss_cutting() {
        let records = vec![record("c1", 0, 0.10)];
        // vwap = 0.45 on both sides
        let sells = vec![
            SellDetailRow {
                condition_id: "c1".to_string(),
                outcome: "Up".to_string(),
                first_sell_price: 0.30,
                avg_sell_price: 0.30,
                first_sell_ts: 100,
                sell_fills: 1,
            },
            SellDetailRow {
                condition_id: "c1".to_string(),
                outcome: "Down".to_string(),
                first_sell_price: 0.50,
                avg_sell_price: 0.50,
                first_sell_ts: 200,
                sell_fills: 1,
            },
        ];
        let report = sell_trigger(&sells, &records, &AnalysisConfig::default());
        assert_eq!(report.sell_events, 2);
        assert_eq!(report.loss_cutting, 1);
        assert_eq!(report.rebalancing, 1);
        assert_eq!(report.loss_cutting_rate, 0.5);
    }

    #[test]
    fn weekend_ratio_compares_per_day_volume() {
        let rows = vec![
            DayOfWeekRow { dow: 0, fills: 10, volume: 100.0, markets: 5 },
            DayOfWeekRow { dow: 6, fills: 10, volume: 100.0, markets: 5 },
            DayOfWeekRow { dow: 1, fills: 10, volume: 200.0, markets: 5 },
            DayOfWeekRow { dow: 2, fills: 10, volume: 200.0, markets: 5 },
        ];
        assert_eq!(weekend_ratio(&rows), Some(0.5));
    }
}
