//! YAML battle scenarios.
//!
//! A scenario scripts what each side reports round by round, plus the twin
//! verdicts for every finding and patch. Scripted battles are fully
//! deterministic, which is what the resume-equivalence guarantee is tested
//! against.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use battle::Severity;

/// One finding as scripted in a scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedFinding {
    pub id: String,
    pub severity: Severity,
    pub vuln_type: String,
    /// Whether the twin will confirm a working exploit for this finding.
    #[serde(default)]
    pub exploitable: bool,
}

/// One patch as scripted in a scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedPatch {
    pub id: String,
    pub finding_id: String,
    /// Whether the twin will confirm the exploit no longer reproduces.
    #[serde(default = "default_true")]
    pub verified: bool,
    /// Whether the twin will confirm functionality is preserved.
    #[serde(default = "default_true")]
    pub functionality_preserved: bool,
}

fn default_true() -> bool {
    true
}

/// What each side reports in one round.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundScript {
    #[serde(default)]
    pub findings: Vec<ScriptedFinding>,
    #[serde(default)]
    pub patches: Vec<ScriptedPatch>,
}

/// A complete scripted battle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Round scripts, in order; rounds beyond the script are empty.
    pub rounds: Vec<RoundScript>,
}

impl Scenario {
    /// Load and validate a scenario from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        let scenario: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse scenario {}", path.display()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Parse and validate a scenario from a YAML string.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let scenario: Self = serde_yaml::from_str(text).context("failed to parse scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Boundary validation: ids must be unique, and every scripted patch
    /// must target a finding the script actually produces.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("scenario name is empty");
        }

        let mut finding_ids = HashSet::new();
        let mut patch_ids = HashSet::new();
        for (idx, round) in self.rounds.iter().enumerate() {
            for finding in &round.findings {
                if !finding_ids.insert(finding.id.as_str()) {
                    bail!("duplicate finding id {} in round {}", finding.id, idx + 1);
                }
            }
            for patch in &round.patches {
                if !patch_ids.insert(patch.id.as_str()) {
                    bail!("duplicate patch id {} in round {}", patch.id, idx + 1);
                }
            }
        }

        for (idx, round) in self.rounds.iter().enumerate() {
            for patch in &round.patches {
                if !finding_ids.contains(patch.finding_id.as_str()) {
                    bail!(
                        "patch {} in round {} targets unknown finding {}",
                        patch.id,
                        idx + 1,
                        patch.finding_id
                    );
                }
            }
        }

        Ok(())
    }

    /// The scripted round for a 1-based round number, if any.
    pub fn round(&self, round_number: u32) -> Option<&RoundScript> {
        round_number
            .checked_sub(1)
            .and_then(|idx| self.rounds.get(idx as usize))
    }

    /// Total scripted rounds.
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    /// Whether the scenario scripts no rounds at all.
    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }
}
