//! Termination policy evaluation.
//!
//! Policies are checked after every merged round, in order; the first match
//! wins. Failure and cancellation are handled by the orchestrator directly
//! and never reach this evaluator.

use crate::config::TerminationConfig;
use crate::model::{BattleState, BattleStatus};

/// Evaluate the termination policy against the state after a round close.
///
/// Returns the terminal status to transition to, or `None` to keep fighting.
pub fn evaluate(config: &TerminationConfig, state: &BattleState) -> Option<BattleStatus> {
    if state.current_round >= config.max_rounds {
        return Some(BattleStatus::Completed);
    }

    let null_window = state.last_rounds(config.null_round_threshold as usize);
    if null_window.len() == config.null_round_threshold as usize
        && null_window.iter().all(|r| r.is_null())
    {
        return Some(BattleStatus::TerminatedNull);
    }

    // Per-round scores are exactly the deltas to the running totals.
    let stable_window = state.last_rounds(config.stable_round_threshold as usize);
    if stable_window.len() == config.stable_round_threshold as usize
        && stable_window
            .iter()
            .all(|r| r.red_score.abs() < config.stable_epsilon
                && r.blue_score.abs() < config.stable_epsilon)
    {
        return Some(BattleStatus::TerminatedStable);
    }

    None
}
