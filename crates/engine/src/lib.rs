//! Strategy-reconstruction engine
//!
//! Rebuilds a prediction-market wallet's strategy from its fill
//! history: per-market completeness economics, settlement P&L and its
//! exact decomposition, bias-corrected prediction tests, and the
//! execution, sizing, risk, and temporal profiles that together
//! fingerprint the operation. [`pipeline::run`] wires the stages over
//! a collected database.

pub mod completeness;
pub mod counterparty;
pub mod execution;
pub mod markets;
pub mod pipeline;
pub mod pnl;
pub mod prediction;
pub mod resolution;
pub mod risk;
pub mod sizing;
pub mod stats;
pub mod synthesis;
pub mod temporal;
pub mod types;

pub use pipeline::{run, FullReport};
pub use types::{AnalysisConfig, AnalysisError, AnalysisResult, BalanceTier, Outcome};
