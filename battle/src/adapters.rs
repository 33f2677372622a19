//! External collaborator contracts.
//!
//! The orchestrator consumes agents and the digital twin exclusively through
//! these traits. Implementations are free (LLM-backed, rule-based, scripted,
//! human-in-the-loop); the orchestrator only requires the timeout/error
//! contract: an error or overrun is recovered as an empty turn, and twin
//! errors count toward the consecutive-failure threshold.

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{BattleState, Finding, Patch};

/// The attacking side: analyzes the target and reports vulnerabilities.
///
/// Receives an immutable snapshot of the battle so far; must never mutate
/// shared state. Results flow back to the orchestrator as the return value.
#[async_trait]
pub trait AttackAgent: Send + Sync {
    /// Run one red turn. `exploit_proof` and `round_discovered` on returned
    /// findings are overwritten by the orchestrator after twin verification.
    async fn run_red_turn(&self, snapshot: &BattleState) -> Result<Vec<Finding>>;
}

/// The defending side: proposes patches for known findings.
#[async_trait]
pub trait DefenseAgent: Send + Sync {
    /// Run one blue turn. `verified`, `functionality_preserved`, and
    /// `round_applied` on returned patches are overwritten by the
    /// orchestrator after twin verification.
    async fn run_blue_turn(&self, snapshot: &BattleState) -> Result<Vec<Patch>>;
}

/// Verdict from applying a patch to the twin and re-running checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchVerdict {
    /// The exploit no longer reproduces after the patch.
    pub verified: bool,
    /// Existing tests/behavior still pass after the patch.
    pub functionality_preserved: bool,
}

/// The sandboxed execution backend exploits and patches are verified
/// against. May be an emulator (firmware targets) or an isolated checkout
/// (source targets); the orchestrator is agnostic, provided calls complete
/// within the per-turn timeout.
#[async_trait]
pub trait DigitalTwin: Send + Sync {
    /// Attempt to demonstrate a working exploit for a finding.
    async fn attempt_exploit(&self, finding: &Finding) -> Result<bool>;

    /// Apply a patch and re-run the exploit and functionality checks.
    async fn apply_and_verify(&self, patch: &Patch) -> Result<PatchVerdict>;
}
