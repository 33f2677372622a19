//! Turn execution against the digital twin.
//!
//! A turn is: run the agent on an immutable snapshot, then verify each of
//! its results against the twin under the concurrency gate. The whole
//! pipeline runs under the side's timeout; an overrun or agent error yields
//! an empty side for the round, while twin errors are reported separately so
//! the orchestrator can track consecutive failures.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::adapters::{AttackAgent, DefenseAgent, DigitalTwin};
use crate::model::{BattleState, Finding, Patch};

/// Outcome of one side's turn.
#[derive(Debug)]
pub(crate) enum TurnOutcome<T> {
    /// The turn completed; results are twin-verified and round-stamped.
    Output(T),
    /// The turn exceeded its deadline.
    TimedOut,
    /// The agent adapter returned an error.
    AgentFailed(String),
    /// The digital twin returned an error mid-verification.
    TwinFailed(String),
}

/// Run one red turn: collect findings, then attempt each exploit on the twin.
pub(crate) async fn run_red_turn(
    agent: Arc<dyn AttackAgent>,
    twin: Arc<dyn DigitalTwin>,
    gate: Arc<Semaphore>,
    snapshot: Arc<BattleState>,
    round_number: u32,
    deadline: Duration,
) -> TurnOutcome<Vec<Finding>> {
    let turn = async move {
        let raw = match agent.run_red_turn(&snapshot).await {
            Ok(findings) => findings,
            Err(e) => return TurnOutcome::AgentFailed(e.to_string()),
        };

        let mut findings = Vec::with_capacity(raw.len());
        for mut finding in raw {
            let _permit = match gate.acquire().await {
                Ok(permit) => permit,
                Err(_) => return TurnOutcome::TwinFailed("twin gate closed".into()),
            };
            let proof = match twin.attempt_exploit(&finding).await {
                Ok(proof) => proof,
                Err(e) => return TurnOutcome::TwinFailed(e.to_string()),
            };
            finding.exploit_proof = proof;
            finding.round_discovered = round_number;
            findings.push(finding);
        }
        TurnOutcome::Output(findings)
    };

    match timeout(deadline, turn).await {
        Ok(outcome) => outcome,
        Err(_) => TurnOutcome::TimedOut,
    }
}

/// Run one blue turn: collect patches, then apply-and-verify each on the twin.
pub(crate) async fn run_blue_turn(
    agent: Arc<dyn DefenseAgent>,
    twin: Arc<dyn DigitalTwin>,
    gate: Arc<Semaphore>,
    snapshot: Arc<BattleState>,
    round_number: u32,
    deadline: Duration,
) -> TurnOutcome<Vec<Patch>> {
    let turn = async move {
        let raw = match agent.run_blue_turn(&snapshot).await {
            Ok(patches) => patches,
            Err(e) => return TurnOutcome::AgentFailed(e.to_string()),
        };

        let mut patches = Vec::with_capacity(raw.len());
        for mut patch in raw {
            let _permit = match gate.acquire().await {
                Ok(permit) => permit,
                Err(_) => return TurnOutcome::TwinFailed("twin gate closed".into()),
            };
            let verdict = match twin.apply_and_verify(&patch).await {
                Ok(verdict) => verdict,
                Err(e) => return TurnOutcome::TwinFailed(e.to_string()),
            };
            patch.verified = verdict.verified;
            patch.functionality_preserved = verdict.functionality_preserved;
            patch.round_applied = round_number;
            patches.push(patch);
        }
        TurnOutcome::Output(patches)
    };

    match timeout(deadline, turn).await {
        Ok(outcome) => outcome,
        Err(_) => TurnOutcome::TimedOut,
    }
}
