//! Digital twin implementations.
//!
//! `ScriptedTwin` replays verdicts straight from a scenario, deterministic
//! and instant. `CheckoutTwin` verifies against a real working copy by
//! running operator-configured commands; exit status is the verdict.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use battle::{DigitalTwin, Finding, Patch, PatchVerdict};

use crate::scenario::Scenario;

/// Twin replaying scenario-scripted verdicts.
///
/// Findings and patches the script does not know are treated as failures:
/// no exploit demonstrated, patch unverified.
pub struct ScriptedTwin {
    exploits: HashMap<String, bool>,
    verdicts: HashMap<String, PatchVerdict>,
}

impl ScriptedTwin {
    /// Build verdict tables from a scenario.
    pub fn new(scenario: &Scenario) -> Self {
        let mut exploits = HashMap::new();
        let mut verdicts = HashMap::new();
        for round in &scenario.rounds {
            for finding in &round.findings {
                exploits.insert(finding.id.clone(), finding.exploitable);
            }
            for patch in &round.patches {
                verdicts.insert(
                    patch.id.clone(),
                    PatchVerdict {
                        verified: patch.verified,
                        functionality_preserved: patch.functionality_preserved,
                    },
                );
            }
        }
        Self { exploits, verdicts }
    }
}

#[async_trait]
impl DigitalTwin for ScriptedTwin {
    async fn attempt_exploit(&self, finding: &Finding) -> Result<bool> {
        Ok(self.exploits.get(&finding.id).copied().unwrap_or(false))
    }

    async fn apply_and_verify(&self, patch: &Patch) -> Result<PatchVerdict> {
        Ok(self.verdicts.get(&patch.id).copied().unwrap_or(PatchVerdict {
            verified: false,
            functionality_preserved: false,
        }))
    }
}

/// Twin backed by an isolated checkout of the target artifact.
///
/// Each probe runs a configured command in the checkout directory with the
/// finding/patch id exposed through the environment:
/// - `exploit_command`: exit 0 means the exploit reproduced.
/// - `verify_command`: exit 0 means the exploit no longer reproduces after
///   the patch.
/// - `check_command`: exit 0 means existing functionality still passes.
///
/// Wall-clock bounding comes from the orchestrator's per-turn timeout.
pub struct CheckoutTwin {
    root: PathBuf,
    exploit_command: Vec<String>,
    verify_command: Vec<String>,
    check_command: Vec<String>,
}

impl CheckoutTwin {
    pub fn new(
        root: impl Into<PathBuf>,
        exploit_command: Vec<String>,
        verify_command: Vec<String>,
        check_command: Vec<String>,
    ) -> Self {
        Self {
            root: root.into(),
            exploit_command,
            verify_command,
            check_command,
        }
    }

    async fn run(&self, command: &[String], envs: &[(&str, &str)]) -> Result<bool> {
        let (program, args) = match command.split_first() {
            Some(split) => split,
            None => bail!("twin command is empty"),
        };

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args).current_dir(&self.root);
        for (key, value) in envs {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .await
            .with_context(|| format!("failed to run twin command {program}"))?;

        debug!(
            program,
            status = %output.status,
            "twin command finished"
        );
        Ok(output.status.success())
    }
}

#[async_trait]
impl DigitalTwin for CheckoutTwin {
    async fn attempt_exploit(&self, finding: &Finding) -> Result<bool> {
        self.run(&self.exploit_command, &[("FINDING_ID", finding.id.as_str())])
            .await
    }

    async fn apply_and_verify(&self, patch: &Patch) -> Result<PatchVerdict> {
        let envs = [
            ("PATCH_ID", patch.id.as_str()),
            ("FINDING_ID", patch.finding_id.as_str()),
        ];
        let verified = self.run(&self.verify_command, &envs).await?;
        // An unverified patch scores nothing anyway; skip the
        // functionality check.
        let functionality_preserved = if verified {
            self.run(&self.check_command, &envs).await?
        } else {
            false
        };
        Ok(PatchVerdict {
            verified,
            functionality_preserved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Scenario;
    use battle::Severity;

    fn finding(id: &str) -> Finding {
        Finding {
            id: id.into(),
            severity: Severity::High,
            vuln_type: "rce".into(),
            exploit_proof: false,
            round_discovered: 1,
        }
    }

    fn patch(id: &str, finding_id: &str) -> Patch {
        Patch {
            id: id.into(),
            finding_id: finding_id.into(),
            verified: false,
            functionality_preserved: false,
            round_applied: 1,
        }
    }

    fn scenario() -> Scenario {
        Scenario::from_yaml(
            r#"
name: verdicts
rounds:
  - findings:
      - { id: f-1, severity: high, vuln_type: rce, exploitable: true }
      - { id: f-2, severity: low, vuln_type: xss }
  - patches:
      - { id: p-1, finding_id: f-1, verified: true, functionality_preserved: false }
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_scripted_twin_replays_verdicts() {
        let twin = ScriptedTwin::new(&scenario());

        assert!(twin.attempt_exploit(&finding("f-1")).await.unwrap());
        assert!(!twin.attempt_exploit(&finding("f-2")).await.unwrap());
        // Unknown findings never get a proof.
        assert!(!twin.attempt_exploit(&finding("f-ghost")).await.unwrap());

        let verdict = twin.apply_and_verify(&patch("p-1", "f-1")).await.unwrap();
        assert!(verdict.verified);
        assert!(!verdict.functionality_preserved);

        let unknown = twin.apply_and_verify(&patch("p-ghost", "f-1")).await.unwrap();
        assert!(!unknown.verified);
    }

    #[tokio::test]
    async fn test_checkout_twin_exit_status_is_the_verdict() {
        let twin = CheckoutTwin::new(
            std::env::temp_dir(),
            vec!["true".into()],
            vec!["true".into()],
            vec!["false".into()],
        );

        assert!(twin.attempt_exploit(&finding("f-1")).await.unwrap());
        let verdict = twin.apply_and_verify(&patch("p-1", "f-1")).await.unwrap();
        assert!(verdict.verified);
        assert!(!verdict.functionality_preserved);
    }

    #[tokio::test]
    async fn test_checkout_twin_skips_check_when_unverified() {
        // verify fails; the check command would error if it ever ran.
        let twin = CheckoutTwin::new(
            std::env::temp_dir(),
            vec!["true".into()],
            vec!["false".into()],
            vec!["/nonexistent-command".into()],
        );

        let verdict = twin.apply_and_verify(&patch("p-1", "f-1")).await.unwrap();
        assert!(!verdict.verified);
        assert!(!verdict.functionality_preserved);
    }

    #[tokio::test]
    async fn test_checkout_twin_missing_binary_is_an_error() {
        let twin = CheckoutTwin::new(
            std::env::temp_dir(),
            vec!["/nonexistent-command".into()],
            vec!["true".into()],
            vec!["true".into()],
        );
        assert!(twin.attempt_exploit(&finding("f-1")).await.is_err());
    }

    #[tokio::test]
    async fn test_checkout_twin_empty_command_is_an_error() {
        let twin = CheckoutTwin::new(std::env::temp_dir(), vec![], vec![], vec![]);
        assert!(twin.attempt_exploit(&finding("f-1")).await.is_err());
    }
}
