//! Strategy synthesis
//!
//! No new measurement happens here. The stage folds the per-phase
//! reports into one report-friendly structure: a strategy
//! classification with its supporting evidence, headline economics,
//! an operational fingerprint, and what replicating the operation
//! would take.

use std::collections::HashMap;

use serde::Serialize;
use tracing::info;

use crate::completeness::CompletenessReport;
use crate::counterparty::CounterpartyReport;
use crate::execution::ExecutionReport;
use crate::markets::MarketInfo;
use crate::pnl::{PnlReport, Reconciliation};
use crate::prediction::{PredictionConclusion, PredictionReport};
use crate::resolution::ResolutionMap;
use crate::risk::RiskReport;
use crate::sizing::SizingReport;
use crate::temporal::TemporalReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    CompletenessArbitrage,
    DirectionalTrading,
    Mixed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyClassification {
    pub strategy_type: StrategyType,
    pub label: String,
    pub symmetric_z: f64,
    pub permutation_p: f64,
    pub mean_balance_ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Headline {
    pub position_pnl_agreement_rate: f64,
    pub trade_pnl: f64,
    pub theoretical_edge: f64,
    pub capture_rate: f64,
    pub directional_drag: f64,
    pub sell_pnl: f64,
    pub sell_discipline_value: f64,
    pub markets_traded: usize,
    pub both_sided: usize,
    pub one_sided: usize,
    /// How often the single bought side of a one-sided market won.
    /// None when no one-sided market resolved.
    pub one_sided_winner_rate: Option<f64>,
    pub mean_spread: f64,
    pub win_rate: f64,
    pub profit_factor: Option<f64>,
    pub expectancy: f64,
    pub sharpe_annualized: f64,
    pub max_drawdown: f64,
    pub calmar: Option<f64>,
    pub max_win_streak: usize,
    pub max_loss_streak: usize,
    pub positive_days: usize,
    pub trading_days: usize,
    pub hourly_markets: usize,
    pub quarter_hour_markets: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Fingerprint {
    pub entry_speed_median_secs: f64,
    pub exec_duration_median_secs: f64,
    pub leg_gap_median_secs: f64,
    pub mean_net_capital: f64,
    pub peak_exposure: f64,
    pub mean_exposure: f64,
    pub peak_concurrent_markets: usize,
    pub peak_hour_utc: Option<i64>,
    pub weekend_weekday_ratio: Option<f64>,
    pub schedule_verdict: crate::temporal::ScheduleVerdict,
    pub loss_cutting_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Replication {
    pub capital_required: f64,
    /// Theoretical edge over realized P&L: the upside of perfect
    /// balance and execution.
    pub improvement_potential: Option<f64>,
    pub directional_model_required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthesisReport {
    pub classification: StrategyClassification,
    pub headline: Headline,
    pub fingerprint: Fingerprint,
    pub replication: Replication,
    pub limitations: Vec<String>,
}

pub struct SynthesisInputs<'a> {
    pub completeness: &'a CompletenessReport,
    pub pnl: &'a PnlReport,
    pub resolutions: &'a ResolutionMap,
    pub reconciliation: &'a Reconciliation,
    pub prediction: &'a PredictionReport,
    pub execution: &'a ExecutionReport,
    pub sizing: &'a SizingReport,
    pub risk: &'a RiskReport,
    pub temporal: &'a TemporalReport,
    pub counterparty: &'a CounterpartyReport,
    pub market_info: &'a HashMap<String, MarketInfo>,
}

pub fn synthesize(inputs: &SynthesisInputs<'_>) -> SynthesisReport {
    let classification = classify(inputs);
    let headline = headline(inputs);
    let fingerprint = fingerprint(inputs);

    let improvement_potential = if headline.trade_pnl > 0.0 {
        Some(headline.theoretical_edge / headline.trade_pnl)
    } else {
        None
    };
    let replication = Replication {
        capital_required: inputs.sizing.exposure.peak_exposure,
        improvement_potential,
        directional_model_required: classification.strategy_type
            != StrategyType::CompletenessArbitrage,
    };

    let report = SynthesisReport {
        limitations: limitations(inputs),
        classification,
        headline,
        fingerprint,
        replication,
    };
    info!(
        label = %report.classification.label,
        trade_pnl = report.headline.trade_pnl,
        capture_rate = report.headline.capture_rate,
        "strategy synthesis complete"
    );
    report
}

fn classify(inputs: &SynthesisInputs<'_>) -> StrategyClassification {
    let balanced = inputs.completeness.summary.mean_balance_ratio;
    let strategy_type = match inputs.prediction.conclusion {
        PredictionConclusion::EvidenceOfPrediction => {
            if balanced >= 0.5 {
                StrategyType::Mixed
            } else {
                StrategyType::DirectionalTrading
            }
        }
        _ => {
            if balanced >= 0.5 {
                StrategyType::CompletenessArbitrage
            } else {
                StrategyType::DirectionalTrading
            }
        }
    };
    let label = match strategy_type {
        StrategyType::CompletenessArbitrage => {
            "Completeness arbitrage: both sides bought below parity, no directional model"
        }
        StrategyType::DirectionalTrading => "Directional trading: unbalanced one-way exposure",
        StrategyType::Mixed => "Completeness base with a directional overlay",
    };
    StrategyClassification {
        strategy_type,
        label: label.to_string(),
        symmetric_z: inputs.prediction.symmetric.z,
        permutation_p: inputs.prediction.permutation.p_value,
        mean_balance_ratio: balanced,
    }
}

fn headline(inputs: &SynthesisInputs<'_>) -> Headline {
    let ps = &inputs.pnl.summary;
    let cs = &inputs.completeness.summary;

    let theoretical = ps.total_completeness_spread_pnl;

    let mut one_sided_resolved = 0usize;
    let mut one_sided_won = 0usize;
    for rec in &inputs.completeness.one_sided {
        if let Some(res) = inputs.resolutions.winners.get(&rec.condition_id) {
            one_sided_resolved += 1;
            if res.winner == rec.side {
                one_sided_won += 1;
            }
        }
    }

    let (mut hourly, mut quarter) = (0usize, 0usize);
    for rec in &inputs.completeness.records {
        match inputs
            .market_info
            .get(&rec.condition_id)
            .map(|m| m.duration_secs)
        {
            Some(900) => quarter += 1,
            Some(_) => hourly += 1,
            None => {}
        }
    }

    Headline {
        position_pnl_agreement_rate: inputs.reconciliation.agreement_rate,
        trade_pnl: ps.total_trade_pnl,
        theoretical_edge: theoretical,
        capture_rate: if theoretical > 0.0 {
            ps.total_trade_pnl / theoretical
        } else {
            0.0
        },
        directional_drag: ps.total_directional_drag,
        sell_pnl: ps.total_sell_pnl,
        sell_discipline_value: ps.total_sell_discipline_value,
        markets_traded: cs.markets_total,
        both_sided: cs.markets_both_sided,
        one_sided: cs.markets_one_sided,
        one_sided_winner_rate: if one_sided_resolved > 0 {
            Some(one_sided_won as f64 / one_sided_resolved as f64)
        } else {
            None
        },
        mean_spread: cs.mean_spread,
        win_rate: ps.win_rate,
        profit_factor: ps.profit_factor,
        expectancy: ps.expectancy,
        sharpe_annualized: inputs.risk.sharpe_annualized,
        max_drawdown: inputs.risk.max_drawdown,
        calmar: inputs.risk.calmar,
        max_win_streak: inputs.risk.max_win_streak,
        max_loss_streak: inputs.risk.max_loss_streak,
        positive_days: inputs.risk.daily.iter().filter(|d| d.pnl > 0.0).count(),
        trading_days: inputs.risk.days,
        hourly_markets: hourly,
        quarter_hour_markets: quarter,
    }
}

fn fingerprint(inputs: &SynthesisInputs<'_>) -> Fingerprint {
    let peak_hour = inputs
        .temporal
        .hourly
        .iter()
        .max_by_key(|h| h.fills)
        .map(|h| h.hour_utc);
    Fingerprint {
        entry_speed_median_secs: inputs.execution.entry_speed.median_secs,
        exec_duration_median_secs: inputs.execution.duration.median_secs,
        leg_gap_median_secs: inputs.execution.sequencing.median_gap_secs,
        mean_net_capital: inputs.sizing.capital.mean_net_capital,
        peak_exposure: inputs.sizing.exposure.peak_exposure,
        mean_exposure: inputs.sizing.exposure.mean_exposure,
        peak_concurrent_markets: inputs.sizing.exposure.peak_concurrent_markets,
        peak_hour_utc: peak_hour,
        weekend_weekday_ratio: inputs.temporal.weekend_weekday_ratio,
        schedule_verdict: inputs.temporal.schedule.verdict,
        loss_cutting_rate: inputs.temporal.sell_trigger.loss_cutting_rate,
    }
}

fn limitations(inputs: &SynthesisInputs<'_>) -> Vec<String> {
    let mut out = Vec::new();
    if !inputs.counterparty.available {
        out.push(
            "No on-chain fills collected; counterparty landscape not assessable".to_string(),
        );
    }
    if inputs.pnl.summary.unresolved_markets > 0 {
        out.push(format!(
            "{} both-sided markets lack a linked resolution and are excluded from settled P&L",
            inputs.pnl.summary.unresolved_markets
        ));
    }
    if inputs.pnl.summary.identity_violations > 0 {
        out.push(format!(
            "{} markets exceed the decomposition tolerance, likely sells above bought size",
            inputs.pnl.summary.identity_violations
        ));
    }
    if inputs.reconciliation.agreement_rate < 0.95 && inputs.reconciliation.markets_compared > 0 {
        out.push(format!(
            "Trade-derived P&L agrees with the positions feed on only {:.0}% of markets",
            inputs.reconciliation.agreement_rate * 100.0
        ));
    }
    if inputs.prediction.symmetric.inconclusive {
        out.push(
            "Symmetric subset below minimum size; prediction tests inconclusive".to_string(),
        );
    }
    out
}
