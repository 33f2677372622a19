//! Battle configuration.
//!
//! All tunables live in explicit immutable config structs passed to the
//! scorer and orchestrator at construction time, so multiple battles can run
//! with different tunings in the same process.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::Severity;

/// How to score a patch whose `finding_id` matches no known finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPatchPolicy {
    /// Unmatched patches earn nothing (logged at warn).
    #[default]
    ScoreZero,
    /// Legacy behavior: score against the first finding in the match pool.
    FirstFinding,
}

/// Whether Blue's turn for round N sees Red's findings from the same round
/// or only from rounds before N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CouplingMode {
    /// Both turns run fully concurrently; Blue sees only closed rounds.
    #[default]
    PriorRound,
    /// Red completes first; Blue's snapshot includes Red's round-N findings.
    SameRound,
}

/// Scoring rubric: base scores, severity weighting, and time decay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Base score for reporting a vulnerability.
    pub vuln_discovery_score: f64,
    /// Bonus added when a working exploit was demonstrated.
    pub exploit_proof_score: f64,
    /// Base score for a verified patch, before severity weighting.
    pub successful_patch_score: f64,
    /// Multiplier applied when a verified patch also preserves functionality.
    pub functionality_bonus: f64,
    /// Time-decay factor: score is multiplied by `1 / (1 + factor * round)`.
    pub time_decay_factor: f64,
    /// Severity multiplier for critical findings.
    pub critical_multiplier: f64,
    /// Severity multiplier for high findings.
    pub high_multiplier: f64,
    /// Severity multiplier for medium findings.
    pub medium_multiplier: f64,
    /// Severity multiplier for low findings.
    pub low_multiplier: f64,
    /// Behavior for patches referencing an unknown finding.
    pub unmatched_patch_policy: UnmatchedPatchPolicy,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            vuln_discovery_score: 1.0,
            exploit_proof_score: 0.5,
            successful_patch_score: 3.0,
            functionality_bonus: 1.2,
            time_decay_factor: 0.1,
            critical_multiplier: 2.0,
            high_multiplier: 1.5,
            medium_multiplier: 1.0,
            low_multiplier: 0.5,
            unmatched_patch_policy: UnmatchedPatchPolicy::default(),
        }
    }
}

impl ScoringConfig {
    /// The multiplier for a given severity.
    pub fn severity_multiplier(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.critical_multiplier,
            Severity::High => self.high_multiplier,
            Severity::Medium => self.medium_multiplier,
            Severity::Low => self.low_multiplier,
        }
    }
}

/// When a battle stops. Policies are evaluated in declaration order;
/// first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationConfig {
    /// Hard cap on rounds; reaching it is a `Completed` battle.
    pub max_rounds: u32,
    /// Consecutive rounds with zero findings and zero patches before
    /// `TerminatedNull`.
    pub null_round_threshold: u32,
    /// Consecutive rounds with both score deltas below `stable_epsilon`
    /// before `TerminatedStable`.
    pub stable_round_threshold: u32,
    /// Score-delta threshold for stability detection.
    pub stable_epsilon: f64,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 100,
            null_round_threshold: 3,
            stable_round_threshold: 5,
            stable_epsilon: 1e-6,
        }
    }
}

/// Top-level battle configuration.
#[derive(Debug, Clone)]
pub struct BattleConfig {
    /// Scoring rubric.
    pub scoring: ScoringConfig,
    /// Termination policy thresholds.
    pub termination: TerminationConfig,
    /// Red/Blue intra-round coupling policy.
    pub coupling: CouplingMode,
    /// Deadline for a red turn; exceeding it yields an empty red round.
    pub red_turn_timeout: Duration,
    /// Deadline for a blue turn; exceeding it yields an empty blue round.
    pub blue_turn_timeout: Duration,
    /// Maximum concurrent digital-twin executions (the sandbox is scarce).
    pub twin_concurrency: usize,
    /// Consecutive rounds with twin failures before the battle is `Failed`.
    pub max_twin_failures: u32,
    /// Persist a checkpoint every this many rounds.
    pub checkpoint_interval: u32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            termination: TerminationConfig::default(),
            coupling: CouplingMode::default(),
            red_turn_timeout: Duration::from_secs(300),
            blue_turn_timeout: Duration::from_secs(300),
            twin_concurrency: 2,
            max_twin_failures: 3,
            checkpoint_interval: 10,
        }
    }
}

impl BattleConfig {
    /// Tuning for long unattended runs: a 1000-round cap with sparse
    /// checkpoints.
    pub fn overnight(mut self) -> Self {
        self.termination.max_rounds = 1000;
        self.checkpoint_interval = 50;
        self
    }
}
