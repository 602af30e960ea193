//! Shared types for the analysis engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Binary market outcome side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Up,
    Down,
}

impl Outcome {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Up => "Up",
            Self::Down => "Down",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Up" => Some(Self::Up),
            "Down" => Some(Self::Down),
            _ => None,
        }
    }
}

/// Balance tier over the net-share balance ratio.
/// Bins are closed-open: [0, 0.33) / [0.33, 0.50) / [0.50, 0.80) / [0.80, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BalanceTier {
    VeryImbalanced,
    Imbalanced,
    Moderate,
    WellBalanced,
}

impl BalanceTier {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < 0.33 {
            Self::VeryImbalanced
        } else if ratio < 0.50 {
            Self::Imbalanced
        } else if ratio < 0.80 {
            Self::Moderate
        } else {
            Self::WellBalanced
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::VeryImbalanced => "very_imbalanced",
            Self::Imbalanced => "imbalanced",
            Self::Moderate => "moderate",
            Self::WellBalanced => "well_balanced",
        }
    }

    /// Tiers from most to least balanced (reporting order)
    pub const ORDERED: [BalanceTier; 4] = [
        Self::WellBalanced,
        Self::Moderate,
        Self::Imbalanced,
        Self::VeryImbalanced,
    ];
}

/// Tunable analysis parameters. Passed by reference into every stage;
/// never ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Wallet under analysis (informational, used in report headers)
    pub wallet: String,
    /// Max |vwap_up - vwap_down| for the symmetric tilt subset
    pub symmetric_tolerance: f64,
    /// One-tailed z critical value for the symmetric subset test
    pub z_critical: f64,
    /// Minimum symmetric subset size below which the test is inconclusive
    pub min_symmetric_n: usize,
    /// Materiality threshold for the dollar-allocation gap
    pub allocation_gap_threshold: f64,
    /// Permutation test iterations
    pub permutation_iters: usize,
    /// Permutation test RNG seed (fixed for reproducibility)
    pub permutation_seed: u64,
    /// Sell ratio at which a first sell counts as rebalancing vs loss-cutting
    pub sell_trigger_break: f64,
    /// Counterparty bot heuristic: total fill threshold
    pub bot_fill_threshold: i64,
    /// Counterparty bot heuristic: fills-per-hour threshold
    pub bot_fills_per_hour: f64,
    /// Exchange contract addresses to exclude from counterparty stats
    pub exchange_addresses: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            wallet: String::new(),
            symmetric_tolerance: 0.05,
            z_critical: 1.96,
            min_symmetric_n: 100,
            allocation_gap_threshold: 0.01,
            permutation_iters: 1000,
            permutation_seed: 42,
            sell_trigger_break: 1.0,
            bot_fill_threshold: 1000,
            bot_fills_per_hour: 10.0,
            exchange_addresses: vec![
                // CTF Exchange + NegRisk CTF Exchange on Polygon
                "0x4bfb41d5b3570defd03c39a9a4d8de6bd8b8982e".to_string(),
                "0xc5d563a36ae78145c45a50134d48a1215220f80a".to_string(),
            ],
        }
    }
}

/// Errors raised by the analysis core. Degraded results (missing
/// optional data, undefined ratios, inconclusive tests) are encoded in
/// result types instead; only structural failures surface here.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("required input is empty: {0}")]
    EmptyInput(&'static str),

    #[error(transparent)]
    Db(#[from] persistence::DbError),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
