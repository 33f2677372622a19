//! Battle orchestration loop.
//!
//! The orchestrator is the single writer of `BattleState`. Each round it
//! takes an immutable snapshot, dispatches the red and blue turns (outside
//! any lock), merges the verified results under a short write lock, scores
//! the round, evaluates the termination policy, and checkpoints on the
//! configured interval. Agents and the twin are consumed strictly through
//! their adapter traits; results flow back as task return values, never by
//! direct mutation.

mod turns;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{RwLock, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::{AttackAgent, DefenseAgent, DigitalTwin};
use crate::checkpoint::CheckpointStore;
use crate::config::{BattleConfig, CouplingMode};
use crate::error::BattleError;
use crate::machine::BattleMachine;
use crate::model::{BattleState, BattleStatus, Finding, Patch, RoundResult};
use crate::monitor::{LogMonitor, ProgressUpdate, TaskMonitor};
use crate::scoring::Scorer;
use crate::termination;

use turns::TurnOutcome;

/// Cooperative cancellation flag, checked at the top of each round.
///
/// Clone freely; all clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a new, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The battle stops before its next round.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The round-scheduling state machine driving one battle.
pub struct BattleOrchestrator {
    config: BattleConfig,
    scorer: Scorer,
    state: Arc<RwLock<BattleState>>,
    machine: BattleMachine,
    red: Arc<dyn AttackAgent>,
    blue: Arc<dyn DefenseAgent>,
    twin: Arc<dyn DigitalTwin>,
    monitor: Arc<dyn TaskMonitor>,
    checkpoints: Option<CheckpointStore>,
    cancel: CancelFlag,
    twin_gate: Arc<Semaphore>,
    consecutive_twin_failures: u32,
}

impl BattleOrchestrator {
    /// Create an orchestrator for a fresh battle with a generated id.
    pub fn new(
        config: BattleConfig,
        red: Arc<dyn AttackAgent>,
        blue: Arc<dyn DefenseAgent>,
        twin: Arc<dyn DigitalTwin>,
    ) -> Self {
        let battle_id = Uuid::new_v4().to_string();
        let state = BattleState::new(battle_id);
        Self::from_parts(config, state, BattleMachine::new(), red, blue, twin)
    }

    /// Create an orchestrator resuming a battle from a loaded checkpoint.
    ///
    /// Nothing is recomputed (all fields are already persisted); the loop
    /// continues at `current_round + 1`.
    pub fn resume(
        config: BattleConfig,
        state: BattleState,
        red: Arc<dyn AttackAgent>,
        blue: Arc<dyn DefenseAgent>,
        twin: Arc<dyn DigitalTwin>,
    ) -> Self {
        let machine = BattleMachine::resumed(state.current_round);
        info!(
            battle_id = %state.battle_id,
            resume_round = state.current_round + 1,
            "resuming battle from checkpoint"
        );
        Self::from_parts(config, state, machine, red, blue, twin)
    }

    fn from_parts(
        config: BattleConfig,
        state: BattleState,
        machine: BattleMachine,
        red: Arc<dyn AttackAgent>,
        blue: Arc<dyn DefenseAgent>,
        twin: Arc<dyn DigitalTwin>,
    ) -> Self {
        let twin_gate = Arc::new(Semaphore::new(config.twin_concurrency.max(1)));
        let scorer = Scorer::new(config.scoring.clone());
        Self {
            config,
            scorer,
            state: Arc::new(RwLock::new(state)),
            machine,
            red,
            blue,
            twin,
            monitor: Arc::new(LogMonitor),
            checkpoints: None,
            cancel: CancelFlag::new(),
            twin_gate,
            consecutive_twin_failures: 0,
        }
    }

    /// Replace the default log monitor.
    pub fn with_monitor(mut self, monitor: Arc<dyn TaskMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Enable checkpoint persistence.
    pub fn with_checkpoints(mut self, store: CheckpointStore) -> Self {
        self.checkpoints = Some(store);
        self
    }

    /// A handle for cancelling this battle between rounds.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// A point-in-time copy of the battle state.
    pub async fn snapshot(&self) -> BattleState {
        self.state.read().await.clone()
    }

    /// Run the battle to a terminal status.
    ///
    /// Always returns the final `BattleState`. On `Failed` or `Cancelled`
    /// the state is partial but intact, so callers can still report on it.
    pub async fn run(&mut self) -> BattleState {
        if self.machine.current() == BattleStatus::Pending {
            if let Err(e) = self.machine.advance(BattleStatus::Running, Some("battle started")) {
                error!("battle could not start: {e}");
                return self.snapshot().await;
            }
            self.state.write().await.status = BattleStatus::Running;
        }

        {
            let st = self.state.read().await;
            info!(
                battle_id = %st.battle_id,
                max_rounds = self.config.termination.max_rounds,
                coupling = ?self.config.coupling,
                first_round = st.current_round + 1,
                "battle running"
            );
        }

        loop {
            if self.cancel.is_cancelled() {
                self.finish(BattleStatus::Cancelled, "external cancellation")
                    .await;
                break;
            }

            let snapshot = Arc::new(self.snapshot().await);
            let round_number = snapshot.current_round + 1;
            self.machine.set_round(round_number);

            let (red_outcome, blue_outcome) =
                self.execute_turns(round_number, snapshot.clone()).await;

            let mut twin_error: Option<String> = None;
            let red_findings =
                resolve_outcome(red_outcome, "red", round_number, &mut twin_error);
            let blue_patches =
                resolve_outcome(blue_outcome, "blue", round_number, &mut twin_error);

            if let Some(err) = twin_error {
                self.consecutive_twin_failures += 1;
                warn!(
                    round = round_number,
                    consecutive = self.consecutive_twin_failures,
                    threshold = self.config.max_twin_failures,
                    "digital twin failed this round: {err}"
                );
                if self.consecutive_twin_failures >= self.config.max_twin_failures {
                    let failure = BattleError::TwinUnavailable {
                        failures: self.consecutive_twin_failures,
                        last_error: err,
                    };
                    error!(%failure, "battle halting");
                    self.finish(BattleStatus::Failed, &failure.to_string()).await;
                    break;
                }
            } else {
                self.consecutive_twin_failures = 0;
            }

            // Merge: the one true mutation point. The write lock is held
            // only here, never across agent or twin execution.
            let (red_score, blue_score) = {
                let mut st = self.state.write().await;
                let (red_score, blue_score) = self.scorer.score_round(
                    &red_findings,
                    &blue_patches,
                    &st.all_findings,
                    round_number,
                );
                st.apply_round(RoundResult {
                    round_number,
                    red_findings,
                    blue_patches,
                    red_score,
                    blue_score,
                });
                st.metrics = Scorer::calculate_metrics(&st.all_findings, &st.all_patches);
                (red_score, blue_score)
            };
            if let Err(e) = self
                .machine
                .advance(BattleStatus::Running, Some("round closed"))
            {
                error!(round = round_number, "round transition rejected: {e}");
            }

            info!(
                round = round_number,
                red_score, blue_score, "round closed"
            );

            let verdict = {
                let st = self.state.read().await;
                termination::evaluate(&self.config.termination, &st)
            };

            // Round-close sequence: checkpoint, then notify, then loop/stop.
            if verdict.is_none()
                && self.config.checkpoint_interval > 0
                && round_number % self.config.checkpoint_interval == 0
            {
                self.write_checkpoint().await;
            }
            self.publish_progress(format!(
                "round {round_number}: red +{red_score:.3}, blue +{blue_score:.3}"
            ))
            .await;

            if let Some(status) = verdict {
                let reason = match status {
                    BattleStatus::Completed => "max rounds reached",
                    BattleStatus::TerminatedNull => "no progress from either side",
                    BattleStatus::TerminatedStable => "scores converged",
                    _ => "termination policy",
                };
                self.finish(status, reason).await;
                break;
            }
        }

        self.snapshot().await
    }

    /// Dispatch both turns for a round according to the coupling mode.
    async fn execute_turns(
        &self,
        round_number: u32,
        snapshot: Arc<BattleState>,
    ) -> (TurnOutcome<Vec<Finding>>, TurnOutcome<Vec<Patch>>) {
        match self.config.coupling {
            // Fully concurrent: Blue only sees closed rounds.
            CouplingMode::PriorRound => {
                let red_task = tokio::spawn(turns::run_red_turn(
                    self.red.clone(),
                    self.twin.clone(),
                    self.twin_gate.clone(),
                    snapshot.clone(),
                    round_number,
                    self.config.red_turn_timeout,
                ));
                let blue_task = tokio::spawn(turns::run_blue_turn(
                    self.blue.clone(),
                    self.twin.clone(),
                    self.twin_gate.clone(),
                    snapshot,
                    round_number,
                    self.config.blue_turn_timeout,
                ));

                let (red_joined, blue_joined) =
                    futures::future::join(red_task, blue_task).await;
                let red = red_joined.unwrap_or_else(|e| {
                    TurnOutcome::AgentFailed(format!("red turn task died: {e}"))
                });
                let blue = blue_joined.unwrap_or_else(|e| {
                    TurnOutcome::AgentFailed(format!("blue turn task died: {e}"))
                });
                (red, blue)
            }
            // Sequential within the round: Blue's snapshot additionally
            // carries Red's fresh findings.
            CouplingMode::SameRound => {
                let red = turns::run_red_turn(
                    self.red.clone(),
                    self.twin.clone(),
                    self.twin_gate.clone(),
                    snapshot.clone(),
                    round_number,
                    self.config.red_turn_timeout,
                )
                .await;

                let blue_snapshot = if let TurnOutcome::Output(findings) = &red {
                    let mut augmented = (*snapshot).clone();
                    augmented.all_findings.extend(findings.iter().cloned());
                    Arc::new(augmented)
                } else {
                    snapshot
                };

                let blue = turns::run_blue_turn(
                    self.blue.clone(),
                    self.twin.clone(),
                    self.twin_gate.clone(),
                    blue_snapshot,
                    round_number,
                    self.config.blue_turn_timeout,
                )
                .await;
                (red, blue)
            }
        }
    }

    /// Enter a terminal status: stamp `completed_at`, force a final
    /// checkpoint, archive it, and push a last progress update.
    async fn finish(&mut self, status: BattleStatus, reason: &str) {
        if let Err(e) = self.machine.advance(status, Some(reason)) {
            error!("terminal transition rejected: {e}");
        }
        {
            let mut st = self.state.write().await;
            st.close(status);
        }

        let battle_id = {
            let st = self.state.read().await;
            info!(
                battle_id = %st.battle_id,
                status = %status,
                reason,
                rounds = st.current_round,
                red_total = st.red_total_score,
                blue_total = st.blue_total_score,
                "battle finished"
            );
            st.battle_id.clone()
        };

        self.write_checkpoint().await;
        if let Some(store) = &self.checkpoints {
            if let Err(e) = store.archive(&battle_id) {
                warn!(battle_id = %battle_id, "archive failed: {e}");
            }
        }

        self.publish_progress(format!("battle finished: {status} ({reason})"))
            .await;
    }

    /// Persist the current state. Write failures are logged and swallowed;
    /// losing a checkpoint risks replaying one round, never the battle.
    async fn write_checkpoint(&self) {
        let Some(store) = &self.checkpoints else {
            return;
        };
        let st = self.snapshot().await;
        if let Err(e) = store.save(&st) {
            warn!(battle_id = %st.battle_id, "checkpoint write failed: {e}");
        }
    }

    /// Best-effort progress push; the monitor swallows its own failures.
    async fn publish_progress(&self, message: String) {
        let update = {
            let st = self.state.read().await;
            ProgressUpdate {
                name: st.battle_id.clone(),
                status: st.status.to_string(),
                progress: u64::from(st.current_round),
                total: u64::from(self.config.termination.max_rounds),
                message,
                elapsed_seconds: st.elapsed_seconds(),
                updated_at: Utc::now(),
            }
        };
        self.monitor.push(update).await;
    }
}

/// Collapse a turn outcome into that side's results for the round.
///
/// Timeouts and agent errors recover as an empty side; twin errors also
/// empty the side but are surfaced to the caller for consecutive-failure
/// tracking.
fn resolve_outcome<T>(
    outcome: TurnOutcome<Vec<T>>,
    side: &str,
    round_number: u32,
    twin_error: &mut Option<String>,
) -> Vec<T> {
    match outcome {
        TurnOutcome::Output(results) => results,
        TurnOutcome::TimedOut => {
            warn!(side, round = round_number, "turn timed out; scoring empty");
            Vec::new()
        }
        TurnOutcome::AgentFailed(e) => {
            warn!(side, round = round_number, "agent failed; scoring empty: {e}");
            Vec::new()
        }
        TurnOutcome::TwinFailed(e) => {
            warn!(side, round = round_number, "twin failed during turn: {e}");
            *twin_error = Some(e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_is_shared_across_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_resolve_outcome_empties_failed_sides() {
        let mut twin_error = None;
        let ok: Vec<u32> = resolve_outcome(
            TurnOutcome::Output(vec![1, 2]),
            "red",
            1,
            &mut twin_error,
        );
        assert_eq!(ok, vec![1, 2]);
        assert!(twin_error.is_none());

        let timed: Vec<u32> = resolve_outcome(TurnOutcome::TimedOut, "red", 1, &mut twin_error);
        assert!(timed.is_empty());
        assert!(twin_error.is_none());

        let failed: Vec<u32> = resolve_outcome(
            TurnOutcome::TwinFailed("emulator crashed".into()),
            "blue",
            1,
            &mut twin_error,
        );
        assert!(failed.is_empty());
        assert_eq!(twin_error.as_deref(), Some("emulator crashed"));
    }
}
