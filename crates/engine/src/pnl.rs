//! Settlement P&L and its exact decomposition
//!
//! For every resolved both-sided market, realized trade P&L
//! (payout + sell proceeds - buy cost) splits into exactly three
//! terms:
//!
//!   completeness_spread = matched_pairs * spread
//!   directional_drag    = unmatched * (excess_won - excess_vwap)
//!   sell_pnl            = sum over sides of proceeds - shares * vwap
//!
//! The identity holds to float tolerance whenever sells never exceed
//! buys on a side, which is how these wallets trade. Sells are costed
//! at the side's buy VWAP (average cost), so sell_pnl is the edge of
//! the exit price over the average entry.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use persistence::repository::PositionPnlRow;

use crate::completeness::CompletenessRecord;
use crate::resolution::ResolutionMap;
use crate::types::{AnalysisError, AnalysisResult, BalanceTier, Outcome};

/// Residuals above this are reported as identity violations.
pub const IDENTITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedMarket {
    pub condition_id: String,
    pub winner: Outcome,
    pub close_ts: i64,
    pub tier: BalanceTier,
    pub spread: f64,
    pub matched_pairs: f64,
    pub unmatched: f64,
    pub excess_side: Outcome,
    pub excess_won: bool,
    pub payout: f64,
    pub total_buy_cost: f64,
    pub total_sell_proceeds: f64,
    pub trade_pnl: f64,
    pub completeness_spread_pnl: f64,
    pub directional_drag: f64,
    pub sell_pnl: f64,
    /// trade_pnl - (spread + drag + sell); diagnostic, ~0.
    pub identity_residual: f64,
    /// P&L had every bought share been held to settlement.
    pub hold_pnl: f64,
    /// trade_pnl - hold_pnl; positive means selling helped.
    pub sell_discipline_value: f64,
    pub sell_winning_shares: f64,
    pub sell_losing_shares: f64,
    pub first_fill_ts: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierPnl {
    pub tier: BalanceTier,
    pub markets: usize,
    pub trade_pnl: f64,
    pub completeness_spread_pnl: f64,
    pub directional_drag: f64,
    pub sell_pnl: f64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PnlSummary {
    pub resolved_markets: usize,
    pub unresolved_markets: usize,
    pub total_trade_pnl: f64,
    pub total_completeness_spread_pnl: f64,
    pub total_directional_drag: f64,
    pub total_sell_pnl: f64,
    pub total_hold_pnl: f64,
    pub total_sell_discipline_value: f64,
    pub winning_markets: usize,
    pub losing_markets: usize,
    pub win_rate: f64,
    /// Gross wins over gross losses; None when there were no losses.
    pub profit_factor: Option<f64>,
    /// Mean trade P&L per resolved market.
    pub expectancy: f64,
    pub excess_side_win_rate: f64,
    pub max_identity_residual: f64,
    pub identity_violations: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PnlReport {
    pub markets: Vec<ResolvedMarket>,
    pub by_tier: Vec<TierPnl>,
    pub summary: PnlSummary,
}

/// Cross-check of the reconstructed trade P&L against the realized
/// P&L the positions feed reports for the same markets.
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub markets_compared: usize,
    pub markets_within_cent: usize,
    pub agreement_rate: f64,
    pub mean_abs_diff: f64,
    pub worst_diff: f64,
}

impl ResolvedMarket {
    pub fn new(rec: &CompletenessRecord, winner: Outcome, close_ts: i64) -> Self {
        let payout = match winner {
            Outcome::Up => rec.net_up,
            Outcome::Down => rec.net_down,
        };
        let total_buy_cost = rec.buy_up_cost + rec.buy_down_cost;
        let total_sell_proceeds = rec.sell_up_proceeds + rec.sell_down_proceeds;
        let trade_pnl = payout + total_sell_proceeds - total_buy_cost;

        let excess_won = rec.excess_side == winner;
        let excess_vwap = match rec.excess_side {
            Outcome::Up => rec.vwap_up,
            Outcome::Down => rec.vwap_down,
        };
        let completeness_spread_pnl = rec.matched_pairs * rec.spread;
        let directional_drag =
            rec.unmatched * (if excess_won { 1.0 } else { 0.0 } - excess_vwap);
        let sell_pnl = (rec.sell_up_proceeds - rec.sell_up_shares * rec.vwap_up)
            + (rec.sell_down_proceeds - rec.sell_down_shares * rec.vwap_down);
        let identity_residual =
            trade_pnl - (completeness_spread_pnl + directional_drag + sell_pnl);

        let winner_buy_shares = match winner {
            Outcome::Up => rec.buy_up_shares,
            Outcome::Down => rec.buy_down_shares,
        };
        let hold_pnl = winner_buy_shares - total_buy_cost;

        let (sell_winning_shares, sell_losing_shares) = match winner {
            Outcome::Up => (rec.sell_up_shares, rec.sell_down_shares),
            Outcome::Down => (rec.sell_down_shares, rec.sell_up_shares),
        };

        Self {
            condition_id: rec.condition_id.clone(),
            winner,
            close_ts,
            tier: rec.tier,
            spread: rec.spread,
            matched_pairs: rec.matched_pairs,
            unmatched: rec.unmatched,
            excess_side: rec.excess_side,
            excess_won,
            payout,
            total_buy_cost,
            total_sell_proceeds,
            trade_pnl,
            completeness_spread_pnl,
            directional_drag,
            sell_pnl,
            identity_residual,
            hold_pnl,
            sell_discipline_value: trade_pnl - hold_pnl,
            sell_winning_shares,
            sell_losing_shares,
            first_fill_ts: rec.first_fill_ts,
        }
    }
}

pub fn analyze(
    records: &[CompletenessRecord],
    resolutions: &ResolutionMap,
) -> AnalysisResult<PnlReport> {
    let mut markets = Vec::new();
    let mut unresolved = 0usize;
    for rec in records {
        match resolutions.winners.get(&rec.condition_id) {
            Some(res) => markets.push(ResolvedMarket::new(rec, res.winner, res.close_ts)),
            None => unresolved += 1,
        }
    }
    if markets.is_empty() {
        return Err(AnalysisError::EmptyInput("no resolved both-sided markets"));
    }

    let identity_violations = markets
        .iter()
        .filter(|m| m.identity_residual.abs() > IDENTITY_TOLERANCE)
        .count();
    if identity_violations > 0 {
        warn!(
            identity_violations,
            "decomposition residual above tolerance; sells likely exceed buys somewhere"
        );
    }

    let excess_resolved = markets.len();
    let summary = PnlSummary {
        resolved_markets: markets.len(),
        unresolved_markets: unresolved,
        total_trade_pnl: markets.iter().map(|m| m.trade_pnl).sum(),
        total_completeness_spread_pnl: markets
            .iter()
            .map(|m| m.completeness_spread_pnl)
            .sum(),
        total_directional_drag: markets.iter().map(|m| m.directional_drag).sum(),
        total_sell_pnl: markets.iter().map(|m| m.sell_pnl).sum(),
        total_hold_pnl: markets.iter().map(|m| m.hold_pnl).sum(),
        total_sell_discipline_value: markets
            .iter()
            .map(|m| m.sell_discipline_value)
            .sum(),
        winning_markets: markets.iter().filter(|m| m.trade_pnl > 0.0).count(),
        losing_markets: markets.iter().filter(|m| m.trade_pnl < 0.0).count(),
        win_rate: markets.iter().filter(|m| m.trade_pnl > 0.0).count() as f64
            / markets.len() as f64,
        profit_factor: {
            let gross_wins: f64 = markets.iter().map(|m| m.trade_pnl.max(0.0)).sum();
            let gross_losses: f64 = markets.iter().map(|m| (-m.trade_pnl).max(0.0)).sum();
            if gross_losses > 0.0 {
                Some(gross_wins / gross_losses)
            } else {
                None
            }
        },
        expectancy: markets.iter().map(|m| m.trade_pnl).sum::<f64>() / markets.len() as f64,
        excess_side_win_rate: markets.iter().filter(|m| m.excess_won).count() as f64
            / excess_resolved as f64,
        max_identity_residual: markets
            .iter()
            .map(|m| m.identity_residual.abs())
            .fold(0.0, f64::max),
        identity_violations,
    };
    debug!(
        resolved = summary.resolved_markets,
        unresolved, "settled P&L decomposition"
    );

    Ok(PnlReport {
        by_tier: tier_pnl(&markets),
        markets,
        summary,
    })
}

fn tier_pnl(markets: &[ResolvedMarket]) -> Vec<TierPnl> {
    BalanceTier::ORDERED
        .iter()
        .map(|tier| {
            let members: Vec<&ResolvedMarket> =
                markets.iter().filter(|m| m.tier == *tier).collect();
            TierPnl {
                tier: *tier,
                markets: members.len(),
                trade_pnl: members.iter().map(|m| m.trade_pnl).sum(),
                completeness_spread_pnl: members
                    .iter()
                    .map(|m| m.completeness_spread_pnl)
                    .sum(),
                directional_drag: members.iter().map(|m| m.directional_drag).sum(),
                sell_pnl: members.iter().map(|m| m.sell_pnl).sum(),
                win_rate: if members.is_empty() {
                    0.0
                } else {
                    members.iter().filter(|m| m.trade_pnl > 0.0).count() as f64
                        / members.len() as f64
                },
            }
        })
        .collect()
}

pub fn reconcile(report: &PnlReport, position_pnl: &[PositionPnlRow]) -> Reconciliation {
    let by_condition: HashMap<&str, f64> = position_pnl
        .iter()
        .map(|p| (p.condition_id.as_str(), p.position_pnl))
        .collect();

    let mut diffs = Vec::new();
    for market in &report.markets {
        if let Some(feed_pnl) = by_condition.get(market.condition_id.as_str()) {
            diffs.push((market.trade_pnl - feed_pnl).abs());
        }
    }
    let within = diffs.iter().filter(|d| **d <= 0.01).count();
    Reconciliation {
        markets_compared: diffs.len(),
        markets_within_cent: within,
        agreement_rate: if diffs.is_empty() {
            0.0
        } else {
            within as f64 / diffs.len() as f64
        },
        mean_abs_diff: crate::stats::mean(&diffs),
        worst_diff: diffs.iter().copied().fold(0.0, f64::max),
    }
}
