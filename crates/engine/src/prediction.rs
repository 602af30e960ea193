//! Directional-prediction tests
//!
//! Naive "did the heavier side win" measures are confounded by price:
//! the cheaper side mechanically yields more shares per dollar, and
//! the pricier side mechanically absorbs more dollars. The raw tilts
//! are reported with their known bias direction, and the overall
//! verdict comes only from the corrected tests:
//!
//!   1. analytical null: the cheaper side's win rate is what a
//!      non-predictive equal-dollar buyer scores by construction
//!   2. symmetric subset: markets where the two VWAPs nearly match,
//!      so allocation bias is small; one-tailed z against the
//!      subset's own null
//!   3. allocation gap: dollars actually placed on the winner beyond
//!      what VWAPs alone imply
//!   4. permutation test: reshuffle winners across markets with a
//!      fixed seed and rank the observed residual accuracy

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::debug;

use crate::completeness::CompletenessRecord;
use crate::resolution::ResolutionMap;
use crate::types::{AnalysisConfig, AnalysisError, AnalysisResult, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionConclusion {
    NoPrediction,
    Inconclusive,
    EvidenceOfPrediction,
}

/// Raw tilt accuracies. Each carries a known bias and none supports
/// a skill claim on its own.
#[derive(Debug, Clone, Serialize)]
pub struct RawTilts {
    /// Share-weighted: biased down, the cheaper side gets more shares.
    pub share_tilt_accuracy: f64,
    /// Dollar-weighted: biased up, the pricier side costs more.
    pub dollar_tilt_accuracy: f64,
    /// Price-residual: allocation beyond what VWAPs imply.
    pub residual_tilt_accuracy: f64,
    pub markets: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymmetricSubsetTest {
    pub n: usize,
    pub observed_accuracy: f64,
    pub null_rate: f64,
    pub z: f64,
    pub significant: bool,
    pub inconclusive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationGapTest {
    pub mean_signed_gap: f64,
    pub material: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermutationTest {
    pub iterations: usize,
    pub seed: u64,
    pub observed_accuracy: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub raw: RawTilts,
    pub cheaper_side_null_rate: f64,
    pub symmetric: SymmetricSubsetTest,
    pub allocation_gap: AllocationGapTest,
    pub permutation: PermutationTest,
    pub conclusion: PredictionConclusion,
}

struct ResolvedTilt {
    vwap_up: f64,
    vwap_down: f64,
    buy_up_cost: f64,
    buy_down_cost: f64,
    share_excess: Outcome,
    winner: Outcome,
}

impl ResolvedTilt {
    fn dollar_excess(&self) -> Outcome {
        if self.buy_up_cost >= self.buy_down_cost {
            Outcome::Up
        } else {
            Outcome::Down
        }
    }

    fn implied_up_frac(&self) -> f64 {
        self.vwap_up / (self.vwap_up + self.vwap_down)
    }

    fn actual_up_frac(&self) -> f64 {
        self.buy_up_cost / (self.buy_up_cost + self.buy_down_cost)
    }

    fn residual_excess(&self) -> Outcome {
        if self.actual_up_frac() >= self.implied_up_frac() {
            Outcome::Up
        } else {
            Outcome::Down
        }
    }

    fn cheaper_side(&self) -> Outcome {
        if self.vwap_up <= self.vwap_down {
            Outcome::Up
        } else {
            Outcome::Down
        }
    }
}

pub fn analyze(
    records: &[CompletenessRecord],
    resolutions: &ResolutionMap,
    config: &AnalysisConfig,
) -> AnalysisResult<PredictionReport> {
    let mut tilts = Vec::new();
    // Records arrive ordered by condition_id, which keeps every
    // positional step below (and the permutation draw) reproducible.
    for rec in records {
        if let Some(res) = resolutions.winners.get(&rec.condition_id) {
            tilts.push(ResolvedTilt {
                vwap_up: rec.vwap_up,
                vwap_down: rec.vwap_down,
                buy_up_cost: rec.buy_up_cost,
                buy_down_cost: rec.buy_down_cost,
                share_excess: rec.excess_side,
                winner: res.winner,
            });
        }
    }
    if tilts.is_empty() {
        return Err(AnalysisError::EmptyInput(
            "no resolved both-sided markets for tilt tests",
        ));
    }
    let n = tilts.len();

    let rate = |pred: &dyn Fn(&ResolvedTilt) -> bool| {
        tilts.iter().filter(|t| pred(t)).count() as f64 / n as f64
    };
    let raw = RawTilts {
        share_tilt_accuracy: rate(&|t| t.share_excess == t.winner),
        dollar_tilt_accuracy: rate(&|t| t.dollar_excess() == t.winner),
        residual_tilt_accuracy: rate(&|t| t.residual_excess() == t.winner),
        markets: n,
    };
    let cheaper_side_null_rate = rate(&|t| t.cheaper_side() == t.winner);

    let symmetric = symmetric_subset_test(&tilts, config);
    let allocation_gap = allocation_gap_test(&tilts, config);
    let permutation = permutation_test(&tilts, raw.residual_tilt_accuracy, config);

    // Verdict from the corrected tests only. Conjunction: every
    // corrected test must point at skill before we call it evidence.
    let conclusion = if symmetric.inconclusive {
        PredictionConclusion::Inconclusive
    } else if symmetric.significant && allocation_gap.material && permutation.p_value < 0.05 {
        PredictionConclusion::EvidenceOfPrediction
    } else {
        PredictionConclusion::NoPrediction
    };
    debug!(markets = n, ?conclusion, "prediction tests complete");

    Ok(PredictionReport {
        raw,
        cheaper_side_null_rate,
        symmetric,
        allocation_gap,
        permutation,
        conclusion,
    })
}

fn symmetric_subset_test(tilts: &[ResolvedTilt], config: &AnalysisConfig) -> SymmetricSubsetTest {
    let subset: Vec<&ResolvedTilt> = tilts
        .iter()
        .filter(|t| (t.vwap_up - t.vwap_down).abs() < config.symmetric_tolerance)
        .collect();
    let n = subset.len();
    if n == 0 {
        return SymmetricSubsetTest {
            n: 0,
            observed_accuracy: 0.0,
            null_rate: 0.5,
            z: 0.0,
            significant: false,
            inconclusive: true,
        };
    }
    let observed = subset
        .iter()
        .filter(|t| t.residual_excess() == t.winner)
        .count() as f64
        / n as f64;
    let null_rate = subset
        .iter()
        .filter(|t| t.cheaper_side() == t.winner)
        .count() as f64
        / n as f64;
    let z = crate::stats::proportion_z(observed, null_rate, n);
    let inconclusive = n < config.min_symmetric_n;
    SymmetricSubsetTest {
        n,
        observed_accuracy: observed,
        null_rate,
        z,
        significant: !inconclusive && z > config.z_critical,
        inconclusive,
    }
}

fn allocation_gap_test(tilts: &[ResolvedTilt], config: &AnalysisConfig) -> AllocationGapTest {
    let gaps: Vec<f64> = tilts
        .iter()
        .map(|t| {
            let gap = t.actual_up_frac() - t.implied_up_frac();
            match t.winner {
                Outcome::Up => gap,
                Outcome::Down => -gap,
            }
        })
        .collect();
    let mean_signed_gap = crate::stats::mean(&gaps);
    AllocationGapTest {
        mean_signed_gap,
        material: mean_signed_gap > config.allocation_gap_threshold,
    }
}

/// Shuffle the winner labels over the fixed market order and count
/// how often a non-informative assignment matches or beats the
/// observed residual accuracy.
fn permutation_test(
    tilts: &[ResolvedTilt],
    observed: f64,
    config: &AnalysisConfig,
) -> PermutationTest {
    let mut rng = StdRng::seed_from_u64(config.permutation_seed);
    let mut winners: Vec<Outcome> = tilts.iter().map(|t| t.winner).collect();
    let n = tilts.len();

    let mut at_least = 0usize;
    for _ in 0..config.permutation_iters {
        winners.shuffle(&mut rng);
        let acc = tilts
            .iter()
            .zip(&winners)
            .filter(|(t, w)| t.residual_excess() == **w)
            .count() as f64
            / n as f64;
        if acc >= observed {
            at_least += 1;
        }
    }
    PermutationTest {
        iterations: config.permutation_iters,
        seed: config.permutation_seed,
        observed_accuracy: observed,
        p_value: (at_least as f64 + 1.0) / (config.permutation_iters as f64 + 1.0),
    }
}
