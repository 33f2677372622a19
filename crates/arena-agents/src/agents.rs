//! Scripted replay agents.
//!
//! Both sides derive their output purely from the snapshot's round position,
//! so a resumed battle replays identically to an uninterrupted one.

use anyhow::Result;
use async_trait::async_trait;

use battle::{AttackAgent, BattleState, DefenseAgent, Finding, Patch};

use crate::scenario::Scenario;

/// Red side replaying scripted findings.
pub struct ScriptedAttacker {
    scenario: Scenario,
}

impl ScriptedAttacker {
    pub fn new(scenario: Scenario) -> Self {
        Self { scenario }
    }
}

#[async_trait]
impl AttackAgent for ScriptedAttacker {
    async fn run_red_turn(&self, snapshot: &BattleState) -> Result<Vec<Finding>> {
        let round_number = snapshot.current_round + 1;
        let findings = self
            .scenario
            .round(round_number)
            .map(|script| {
                script
                    .findings
                    .iter()
                    .map(|f| Finding {
                        id: f.id.clone(),
                        severity: f.severity,
                        vuln_type: f.vuln_type.clone(),
                        // Set by the orchestrator after twin verification.
                        exploit_proof: false,
                        round_discovered: round_number,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(findings)
    }
}

/// Blue side replaying scripted patches.
pub struct ScriptedDefender {
    scenario: Scenario,
}

impl ScriptedDefender {
    pub fn new(scenario: Scenario) -> Self {
        Self { scenario }
    }
}

#[async_trait]
impl DefenseAgent for ScriptedDefender {
    async fn run_blue_turn(&self, snapshot: &BattleState) -> Result<Vec<Patch>> {
        let round_number = snapshot.current_round + 1;
        let patches = self
            .scenario
            .round(round_number)
            .map(|script| {
                script
                    .patches
                    .iter()
                    .map(|p| Patch {
                        id: p.id.clone(),
                        finding_id: p.finding_id.clone(),
                        // Set by the orchestrator after twin verification.
                        verified: false,
                        functionality_preserved: false,
                        round_applied: round_number,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(patches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle::Severity;

    fn scenario() -> Scenario {
        Scenario::from_yaml(
            r#"
name: replay
rounds:
  - findings:
      - { id: f-1, severity: high, vuln_type: rce, exploitable: true }
  - patches:
      - { id: p-1, finding_id: f-1 }
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_attacker_replays_round_script() {
        let attacker = ScriptedAttacker::new(scenario());
        let state = BattleState::new("b");

        let round1 = attacker.run_red_turn(&state).await.unwrap();
        assert_eq!(round1.len(), 1);
        assert_eq!(round1[0].id, "f-1");
        assert_eq!(round1[0].severity, Severity::High);
        assert_eq!(round1[0].round_discovered, 1);
        // Proof comes from the twin, never from the script directly.
        assert!(!round1[0].exploit_proof);
    }

    #[tokio::test]
    async fn test_sides_go_quiet_past_the_script() {
        let attacker = ScriptedAttacker::new(scenario());
        let defender = ScriptedDefender::new(scenario());

        let mut state = BattleState::new("b");
        state.current_round = 7;

        assert!(attacker.run_red_turn(&state).await.unwrap().is_empty());
        assert!(defender.run_blue_turn(&state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_defender_stamps_round_applied() {
        let defender = ScriptedDefender::new(scenario());
        let mut state = BattleState::new("b");
        state.current_round = 1;

        let patches = defender.run_blue_turn(&state).await.unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].round_applied, 2);
        assert!(!patches[0].verified);
    }
}
