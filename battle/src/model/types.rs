//! Typed battle data model.
//!
//! `Finding`, `Patch`, and `RoundResult` are immutable value objects produced
//! during a round and owned by `BattleState` once merged. `BattleState` is the
//! aggregate root: it is created at battle start, mutated exclusively by the
//! orchestrator (single writer), and persisted as a JSON checkpoint.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a reported vulnerability.
///
/// Variant order defines severity rank: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// A vulnerability discovered by the attacking side.
///
/// Immutable after the round that produced it closes. `round_discovered` is
/// stamped by the orchestrator during the merge, not by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Unique finding identifier.
    pub id: String,
    /// Severity as classified by the attacker.
    pub severity: Severity,
    /// Vulnerability class (e.g. "buffer-overflow", "auth-bypass").
    pub vuln_type: String,
    /// Whether a working exploit was demonstrated against the digital twin.
    pub exploit_proof: bool,
    /// Round in which the finding was reported (1-based).
    pub round_discovered: u32,
}

/// A proposed remediation for a `Finding`, reported by the defending side.
///
/// `finding_id` is a reference, never ownership: a patch must not outlive
/// the finding it targets. Immutable after its round closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Unique patch identifier.
    pub id: String,
    /// The finding this patch claims to remediate.
    pub finding_id: String,
    /// Whether the patch passed the automated re-exploitation check.
    pub verified: bool,
    /// Whether existing functionality still passes after the patch.
    pub functionality_preserved: bool,
    /// Round in which the patch was applied (1-based).
    pub round_applied: u32,
}

/// Outcome of a single battle round. Created once by the orchestrator when
/// the round closes; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    /// 1-based, strictly increasing round number.
    pub round_number: u32,
    /// Findings reported by the red side this round.
    pub red_findings: Vec<Finding>,
    /// Patches reported by the blue side this round.
    pub blue_patches: Vec<Patch>,
    /// Red's score for this round.
    pub red_score: f64,
    /// Blue's score for this round.
    pub blue_score: f64,
}

impl RoundResult {
    /// Whether neither side produced any output this round.
    pub fn is_null(&self) -> bool {
        self.red_findings.is_empty() && self.blue_patches.is_empty()
    }
}

/// Aggregate defense/attack metrics, recomputed after every round.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BattleMetrics {
    /// True Defense Success Rate: verified-and-functional patches / findings.
    pub tdsr: f64,
    /// Fake Defense Success Rate: verified-but-broken patches / findings.
    pub fdsr: f64,
    /// Attack Success Count: total findings reported.
    pub asc: usize,
}

/// Battle lifecycle status.
///
/// `Pending → Running → {Completed, TerminatedNull, TerminatedStable,
/// Failed, Cancelled}`. `Running` is re-entered once per round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleStatus {
    /// Created, no round started yet.
    Pending,
    /// Round loop in progress.
    Running,
    /// Reached the configured maximum number of rounds.
    Completed,
    /// Neither side made progress for the null-round threshold.
    TerminatedNull,
    /// Scores converged for the stable-round threshold.
    TerminatedStable,
    /// Unrecoverable adapter failure; partial state preserved.
    Failed,
    /// Externally cancelled between rounds; partial state preserved.
    Cancelled,
}

impl BattleStatus {
    /// Whether this is a terminal status (no further rounds).
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for BattleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::TerminatedNull => write!(f, "terminated_null"),
            Self::TerminatedStable => write!(f, "terminated_stable"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The aggregate root: every closed round, running totals, and derived
/// metrics for one battle.
///
/// Invariants maintained by the orchestrator:
/// - `red_total_score == Σ rounds.red_score` (likewise blue)
/// - `rounds.len() == current_round` once a round closes
/// - `rounds[i].round_number == i + 1` (no skips, no reordering)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleState {
    /// Unique battle identifier.
    pub battle_id: String,
    /// Current lifecycle status.
    pub status: BattleStatus,
    /// Number of the last closed round (0 before round 1 closes).
    pub current_round: u32,
    /// Running total of red round scores.
    pub red_total_score: f64,
    /// Running total of blue round scores.
    pub blue_total_score: f64,
    /// All closed rounds, append-only, ordered by round number.
    pub rounds: Vec<RoundResult>,
    /// Union of findings across all closed rounds.
    pub all_findings: Vec<Finding>,
    /// Union of patches across all closed rounds.
    pub all_patches: Vec<Patch>,
    /// Derived metrics, recomputed after every round.
    pub metrics: BattleMetrics,
    /// When the battle was created.
    pub started_at: DateTime<Utc>,
    /// When the battle reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl BattleState {
    /// Create a fresh battle in `Pending` status.
    pub fn new(battle_id: impl Into<String>) -> Self {
        Self {
            battle_id: battle_id.into(),
            status: BattleStatus::Pending,
            current_round: 0,
            red_total_score: 0.0,
            blue_total_score: 0.0,
            rounds: Vec::new(),
            all_findings: Vec::new(),
            all_patches: Vec::new(),
            metrics: BattleMetrics::default(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Merge a closed round into the aggregate: append the round, extend the
    /// finding/patch unions, and update running totals.
    ///
    /// This is the single mutation point of the battle; callers must hold the
    /// write side of the state lock. The round number must be exactly
    /// `current_round + 1`.
    pub fn apply_round(&mut self, round: RoundResult) {
        debug_assert_eq!(round.round_number, self.current_round + 1);

        self.red_total_score += round.red_score;
        self.blue_total_score += round.blue_score;
        self.all_findings.extend(round.red_findings.iter().cloned());
        self.all_patches.extend(round.blue_patches.iter().cloned());
        self.current_round = round.round_number;
        self.rounds.push(round);
    }

    /// Transition into a terminal status and stamp `completed_at`.
    pub fn close(&mut self, status: BattleStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    /// Look up a finding anywhere in the battle by id.
    pub fn finding(&self, id: &str) -> Option<&Finding> {
        self.all_findings.iter().find(|f| f.id == id)
    }

    /// The last `n` closed rounds (fewer if the battle is younger).
    pub fn last_rounds(&self, n: usize) -> &[RoundResult] {
        let start = self.rounds.len().saturating_sub(n);
        &self.rounds[start..]
    }

    /// Seconds elapsed since battle start (until completion, if terminal).
    pub fn elapsed_seconds(&self) -> f64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
