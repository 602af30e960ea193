//! Resolution linking
//!
//! The positions feed marks a resolved outcome token with a terminal
//! price of exactly 1.0 (won) or 0.0 (lost). Either one pins down the
//! market winner, since binary outcomes are complementary. Markets
//! with no terminal-priced closed position stay pending and are left
//! out of every settlement-dependent stage.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use persistence::repository::PositionRow;

use crate::types::Outcome;

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub condition_id: String,
    pub winner: Outcome,
    pub close_ts: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionMap {
    pub winners: HashMap<String, Resolution>,
    /// Markets where two closed positions implied different winners.
    /// The first observed wins; these are flagged, not dropped.
    pub conflicts: Vec<String>,
    pub pending_positions: usize,
}

pub fn link_resolutions(positions: &[PositionRow]) -> ResolutionMap {
    let mut winners: HashMap<String, Resolution> = HashMap::new();
    let mut conflicts = Vec::new();
    let mut pending = 0usize;

    for pos in positions {
        if pos.is_closed == 0 {
            pending += 1;
            continue;
        }
        let outcome = match Outcome::parse(&pos.outcome) {
            Some(o) => o,
            None => continue,
        };
        let winner = if pos.cur_price == 1.0 {
            outcome
        } else if pos.cur_price == 0.0 {
            outcome.opposite()
        } else {
            // Closed but not at a terminal price; cannot infer.
            pending += 1;
            continue;
        };

        match winners.get(&pos.condition_id) {
            None => {
                winners.insert(
                    pos.condition_id.clone(),
                    Resolution {
                        condition_id: pos.condition_id.clone(),
                        winner,
                        close_ts: pos.close_timestamp,
                    },
                );
            }
            Some(existing) if existing.winner != winner => {
                warn!(
                    condition_id = %pos.condition_id,
                    "conflicting resolution implied by positions"
                );
                conflicts.push(pos.condition_id.clone());
            }
            Some(_) => {}
        }
    }

    debug!(
        resolved = winners.len(),
        conflicts = conflicts.len(),
        pending,
        "linked resolutions"
    );
    ResolutionMap {
        winners,
        conflicts,
        pending_positions: pending,
    }
}
