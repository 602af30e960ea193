//! Counterparty concentration from on-chain fills
//!
//! This stage is optional: on-chain collection may never have run for
//! a wallet, in which case the report says so and nothing downstream
//! treats it as an error. Exchange-contract addresses are filtered
//! out first, since fills routed through the exchange operator are
//! plumbing, not counterparties.

use serde::Serialize;
use tracing::debug;

use persistence::repository::{CounterpartyRow, MakerTakerRow};

use crate::types::AnalysisConfig;

#[derive(Debug, Clone, Serialize)]
pub struct LikelyBot {
    pub address: String,
    pub fills: i64,
    pub volume: f64,
    pub fills_per_hour: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConcentrationReport {
    pub counterparties: usize,
    pub total_volume: f64,
    /// Herfindahl-Hirschman Index over volume shares.
    pub hhi: f64,
    /// HHI rescaled to [0, 1] against the equal-share floor 1/n.
    pub hhi_normalized: f64,
    pub gini: f64,
    pub top1_share: f64,
    pub top10_share: f64,
    pub top50_share: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MakerTakerReport {
    pub maker_fills: i64,
    pub taker_fills: i64,
    pub maker_share: f64,
    pub total_fees: f64,
    pub maker_rebates: f64,
    pub net_fees: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CounterpartyReport {
    pub available: bool,
    pub excluded_exchange_addresses: usize,
    pub concentration: Option<ConcentrationReport>,
    pub maker_taker: Option<MakerTakerReport>,
    pub likely_bots: Vec<LikelyBot>,
}

impl CounterpartyReport {
    pub fn unavailable() -> Self {
        Self {
            available: false,
            excluded_exchange_addresses: 0,
            concentration: None,
            maker_taker: None,
            likely_bots: Vec::new(),
        }
    }
}

pub fn analyze(
    counterparties: &[CounterpartyRow],
    maker_taker: &[MakerTakerRow],
    total_fees: f64,
    maker_rebates: f64,
    config: &AnalysisConfig,
) -> CounterpartyReport {
    if counterparties.is_empty() {
        debug!("no on-chain fills collected, counterparty analysis unavailable");
        return CounterpartyReport::unavailable();
    }

    let is_exchange = |addr: &str| {
        config
            .exchange_addresses
            .iter()
            .any(|e| e.eq_ignore_ascii_case(addr))
    };
    let excluded = counterparties
        .iter()
        .filter(|c| is_exchange(&c.counterparty))
        .count();
    let external: Vec<&CounterpartyRow> = counterparties
        .iter()
        .filter(|c| !is_exchange(&c.counterparty))
        .collect();

    let concentration = concentration(&external);
    let likely_bots = likely_bots(&external, config);

    let maker_fills: i64 = maker_taker.iter().map(|m| m.maker_fills).sum();
    let taker_fills: i64 = maker_taker.iter().map(|m| m.taker_fills).sum();
    let total_role_fills = maker_fills + taker_fills;
    let maker_taker = MakerTakerReport {
        maker_fills,
        taker_fills,
        maker_share: if total_role_fills > 0 {
            maker_fills as f64 / total_role_fills as f64
        } else {
            0.0
        },
        total_fees,
        maker_rebates,
        net_fees: total_fees - maker_rebates,
    };

    CounterpartyReport {
        available: true,
        excluded_exchange_addresses: excluded,
        concentration,
        maker_taker: Some(maker_taker),
        likely_bots,
    }
}

fn concentration(external: &[&CounterpartyRow]) -> Option<ConcentrationReport> {
    if external.is_empty() {
        return None;
    }
    let total_volume: f64 = external.iter().map(|c| c.volume).sum();
    if total_volume <= 0.0 {
        return None;
    }

    let mut volumes: Vec<f64> = external.iter().map(|c| c.volume).collect();
    volumes.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let hhi: f64 = volumes
        .iter()
        .map(|v| {
            let s = v / total_volume;
            s * s
        })
        .sum();
    let n = volumes.len() as f64;
    let hhi_normalized = if volumes.len() > 1 {
        (hhi - 1.0 / n) / (1.0 - 1.0 / n)
    } else {
        1.0
    };
    let top_share =
        |k: usize| volumes.iter().take(k).sum::<f64>() / total_volume;

    Some(ConcentrationReport {
        counterparties: volumes.len(),
        total_volume,
        hhi,
        hhi_normalized,
        gini: crate::stats::gini(&volumes),
        top1_share: top_share(1),
        top10_share: top_share(10),
        top50_share: top_share(50),
    })
}

/// Heuristic flag, not an identification: very high fill counts or
/// sustained fill rates are incompatible with manual trading.
fn likely_bots(external: &[&CounterpartyRow], config: &AnalysisConfig) -> Vec<LikelyBot> {
    let mut bots: Vec<LikelyBot> = external
        .iter()
        .filter_map(|c| {
            let active_hours = ((c.last_seen - c.first_seen).max(0) as f64 / 3600.0).max(1.0);
            let fills_per_hour = c.fills as f64 / active_hours;
            if c.fills > config.bot_fill_threshold || fills_per_hour > config.bot_fills_per_hour {
                Some(LikelyBot {
                    address: c.counterparty.clone(),
                    fills: c.fills,
                    volume: c.volume,
                    fills_per_hour,
                })
            } else {
                None
            }
        })
        .collect();
    bots.sort_by(|a, b| {
        b.fills
            .cmp(&a.fills)
            .then_with(|| a.address.cmp(&b.address))
    });
    bots
}
