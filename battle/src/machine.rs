//! Battle state machine: explicit statuses and legal transition guards.
//!
//! Provides a typed lifecycle model for the round loop so that:
//! 1. Every status transition is auditable and logged.
//! 2. Illegal transitions are rejected with a typed error.
//! 3. Offline replay can reconstruct the exact lifecycle sequence.
//!
//! The orchestrator calls `advance()` to move between statuses. `Running`
//! self-loops once per round; terminal statuses absorb.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::model::BattleStatus;

/// Legal transitions between battle statuses.
///
/// ```text
/// Pending → Running | Failed | Cancelled
/// Running → Running (per-round re-entry)
/// Running → Completed | TerminatedNull | TerminatedStable | Failed | Cancelled
/// ```
fn is_legal_transition(from: BattleStatus, to: BattleStatus) -> bool {
    use BattleStatus::*;

    match from {
        // A battle can fail or be cancelled before its first round.
        Pending => matches!(to, Running | Failed | Cancelled),
        Running => matches!(
            to,
            Running | Completed | TerminatedNull | TerminatedStable | Failed | Cancelled
        ),
        // Terminal statuses absorb.
        _ => false,
    }
}

/// A single recorded status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// The status transitioned from.
    pub from: BattleStatus,
    /// The status transitioned to.
    pub to: BattleStatus,
    /// Round number at the time of transition (0 before round 1 closes).
    pub round: u32,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    /// Optional context about why this transition happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone)]
pub struct IllegalTransition {
    pub from: BattleStatus,
    pub to: BattleStatus,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal battle transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// The battle lifecycle state machine.
///
/// Tracks the current status, enforces legal transitions, and keeps a
/// complete transition log for replay and diagnostics.
pub struct BattleMachine {
    current: BattleStatus,
    round: u32,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl BattleMachine {
    /// Create a new machine starting at `Pending`.
    pub fn new() -> Self {
        Self {
            current: BattleStatus::Pending,
            round: 0,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    /// Create a machine already in `Running`, for checkpoint resume.
    pub fn resumed(round: u32) -> Self {
        Self {
            current: BattleStatus::Running,
            round,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    /// Get the current status.
    pub fn current(&self) -> BattleStatus {
        self.current
    }

    /// Set the round counter (called by the orchestrator loop).
    pub fn set_round(&mut self, round: u32) {
        self.round = round;
    }

    /// Attempt to advance to the next status.
    pub fn advance(
        &mut self,
        to: BattleStatus,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            round: self.round,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        };

        tracing::debug!(
            from = %self.current,
            to = %to,
            round = self.round,
            "battle transition"
        );

        self.transitions.push(record);
        self.current = to;
        Ok(())
    }

    /// Whether the machine is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    /// Get the full transition log.
    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// A one-line summary of the lifecycle so far.
    pub fn summary(&self) -> String {
        format!(
            "{} after {} rounds ({} transitions, {}ms)",
            self.current,
            self.round,
            self.transitions.len(),
            self.created_at.elapsed().as_millis(),
        )
    }
}

impl Default for BattleMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status() {
        let machine = BattleMachine::new();
        assert_eq!(machine.current(), BattleStatus::Pending);
        assert!(!machine.is_terminal());
        assert!(machine.transitions().is_empty());
    }

    #[test]
    fn test_full_battle_lifecycle() {
        let mut machine = BattleMachine::new();
        machine.advance(BattleStatus::Running, None).unwrap();
        for round in 1..=3 {
            machine.set_round(round);
            machine
                .advance(BattleStatus::Running, Some("round closed"))
                .unwrap();
        }
        machine
            .advance(BattleStatus::Completed, Some("max rounds reached"))
            .unwrap();

        assert!(machine.is_terminal());
        assert_eq!(machine.transitions().len(), 5);
        assert_eq!(machine.transitions().last().unwrap().round, 3);
    }

    #[test]
    fn test_running_self_loop_is_legal() {
        let mut machine = BattleMachine::new();
        machine.advance(BattleStatus::Running, None).unwrap();
        machine.advance(BattleStatus::Running, None).unwrap();
        assert_eq!(machine.current(), BattleStatus::Running);
    }

    #[test]
    fn test_pending_can_fail_or_cancel() {
        let mut machine = BattleMachine::new();
        machine
            .advance(BattleStatus::Failed, Some("twin unreachable at start"))
            .unwrap();
        assert!(machine.is_terminal());

        let mut machine = BattleMachine::new();
        machine.advance(BattleStatus::Cancelled, None).unwrap();
        assert!(machine.is_terminal());
    }

    #[test]
    fn test_pending_cannot_skip_to_completed() {
        let mut machine = BattleMachine::new();
        let err = machine.advance(BattleStatus::Completed, None).unwrap_err();
        assert_eq!(err.from, BattleStatus::Pending);
        assert_eq!(err.to, BattleStatus::Completed);
    }

    #[test]
    fn test_terminal_statuses_absorb() {
        for terminal in [
            BattleStatus::Completed,
            BattleStatus::TerminatedNull,
            BattleStatus::TerminatedStable,
            BattleStatus::Failed,
            BattleStatus::Cancelled,
        ] {
            let mut machine = BattleMachine::new();
            machine.advance(BattleStatus::Running, None).unwrap();
            machine.advance(terminal, None).unwrap();
            assert!(machine.advance(BattleStatus::Running, None).is_err());
            assert!(machine.advance(BattleStatus::Failed, None).is_err());
        }
    }

    #[test]
    fn test_resumed_machine_starts_running() {
        let machine = BattleMachine::resumed(42);
        assert_eq!(machine.current(), BattleStatus::Running);
        assert!(machine.transitions().is_empty());
    }

    #[test]
    fn test_transition_record_serde_roundtrip() {
        let record = TransitionRecord {
            from: BattleStatus::Running,
            to: BattleStatus::TerminatedStable,
            round: 12,
            elapsed_ms: 98765,
            reason: Some("scores converged".into()),
        };
        let json = serde_json::to_string(&record).unwrap();
        let restored: TransitionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.from, BattleStatus::Running);
        assert_eq!(restored.to, BattleStatus::TerminatedStable);
        assert_eq!(restored.round, 12);
        assert_eq!(restored.reason.as_deref(), Some("scores converged"));
    }
}
