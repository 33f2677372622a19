//! Decay-weighted round scoring.
//!
//! The scorer is pure and stateless: given the same inputs and config it
//! always produces the same scores, which is what makes checkpoint/resume
//! reproducible. Time decay makes earlier discoveries and faster patches
//! worth strictly more; unverified patches earn nothing.

use tracing::warn;

use crate::config::{ScoringConfig, UnmatchedPatchPolicy};
use crate::model::{BattleMetrics, Finding, Patch};

/// Pure scoring engine for findings, patches, and whole rounds.
#[derive(Debug, Clone)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    /// Create a scorer with the given rubric.
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// The configured rubric.
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Time-decay multiplier for a round: `1 / (1 + factor * round_number)`.
    ///
    /// Monotonically non-increasing in `round_number`.
    fn decay(&self, round_number: u32) -> f64 {
        1.0 / (1.0 + self.config.time_decay_factor * f64::from(round_number))
    }

    /// Score a single finding discovered in `round_number`.
    ///
    /// `base * severity multiplier * time decay`, where base includes the
    /// exploit-proof bonus when a working exploit was demonstrated.
    pub fn score_finding(&self, finding: &Finding, round_number: u32) -> f64 {
        let mut base = self.config.vuln_discovery_score;
        if finding.exploit_proof {
            base += self.config.exploit_proof_score;
        }
        base * self.config.severity_multiplier(finding.severity) * self.decay(round_number)
    }

    /// Score a single patch against the finding it remediates.
    ///
    /// Unverified patches earn exactly `0.0` regardless of any other field.
    /// Verified patches are weighted by the *finding's*
    /// severity, earn the functionality bonus only when behavior is
    /// preserved, and decay on the round they were applied.
    pub fn score_patch(&self, patch: &Patch, finding: &Finding, round_number: u32) -> f64 {
        if !patch.verified {
            return 0.0;
        }
        let mut score =
            self.config.successful_patch_score * self.config.severity_multiplier(finding.severity);
        if patch.functionality_preserved {
            score *= self.config.functionality_bonus;
        }
        score * self.decay(round_number)
    }

    /// Score one round.
    ///
    /// `red_findings` are the findings reported this round;
    /// `prior_findings` are the findings from rounds before it. Patches are
    /// matched by `finding_id` against this round's findings first, then the
    /// prior ones; under prior-round coupling Blue legitimately patches
    /// findings from earlier rounds.
    ///
    /// A patch whose `finding_id` matches nothing is scored per the
    /// configured `UnmatchedPatchPolicy`.
    pub fn score_round(
        &self,
        red_findings: &[Finding],
        blue_patches: &[Patch],
        prior_findings: &[Finding],
        round_number: u32,
    ) -> (f64, f64) {
        let red_score = red_findings
            .iter()
            .map(|f| self.score_finding(f, round_number))
            .sum();

        let mut blue_score = 0.0;
        for patch in blue_patches {
            let matched = red_findings
                .iter()
                .chain(prior_findings.iter())
                .find(|f| f.id == patch.finding_id);
            let finding = match (matched, self.config.unmatched_patch_policy) {
                (Some(f), _) => f,
                (None, UnmatchedPatchPolicy::FirstFinding) => {
                    match red_findings.first().or_else(|| prior_findings.first()) {
                        Some(f) => f,
                        None => continue,
                    }
                }
                (None, UnmatchedPatchPolicy::ScoreZero) => {
                    warn!(
                        patch_id = %patch.id,
                        finding_id = %patch.finding_id,
                        round_number,
                        "patch references unknown finding; scored 0.0"
                    );
                    continue;
                }
            };
            blue_score += self.score_patch(patch, finding, round_number);
        }

        (red_score, blue_score)
    }

    /// Aggregate battle metrics over all findings and patches so far.
    ///
    /// Both rates are `0.0` when there are no findings.
    pub fn calculate_metrics(findings: &[Finding], patches: &[Patch]) -> BattleMetrics {
        let asc = findings.len();
        if asc == 0 {
            return BattleMetrics {
                tdsr: 0.0,
                fdsr: 0.0,
                asc: 0,
            };
        }

        let true_defenses = patches
            .iter()
            .filter(|p| p.verified && p.functionality_preserved)
            .count();
        let fake_defenses = patches
            .iter()
            .filter(|p| p.verified && !p.functionality_preserved)
            .count();

        BattleMetrics {
            tdsr: true_defenses as f64 / asc as f64,
            fdsr: fake_defenses as f64 / asc as f64,
            asc,
        }
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;

    fn finding(id: &str, severity: Severity, exploit_proof: bool) -> Finding {
        Finding {
            id: id.into(),
            severity,
            vuln_type: "injection".into(),
            exploit_proof,
            round_discovered: 1,
        }
    }

    fn patch(id: &str, finding_id: &str, verified: bool, functional: bool) -> Patch {
        Patch {
            id: id.into(),
            finding_id: finding_id.into(),
            verified,
            functionality_preserved: functional,
            round_applied: 1,
        }
    }

    #[test]
    fn test_critical_proven_finding_at_round_zero() {
        let scorer = Scorer::default();
        let f = finding("f-1", Severity::Critical, true);
        // (1.0 + 0.5) * 2.0 * 1.0
        assert!((scorer.score_finding(&f, 0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_decay_at_round_nine() {
        let scorer = Scorer::default();
        let f = finding("f-1", Severity::Medium, false);
        // 1.0 * 1.0 * 1/(1 + 0.9)
        let expected = 1.0 / 1.9;
        assert!((scorer.score_finding(&f, 9) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_finding_score_strictly_decreasing_in_round() {
        let scorer = Scorer::default();
        let f = finding("f-1", Severity::High, true);
        let mut prev = f64::INFINITY;
        for round in 0..50 {
            let score = scorer.score_finding(&f, round);
            assert!(score < prev, "round {round}: {score} !< {prev}");
            prev = score;
        }
    }

    #[test]
    fn test_finding_score_strictly_increasing_in_severity() {
        let scorer = Scorer::default();
        let severities = [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ];
        let scores: Vec<f64> = severities
            .iter()
            .map(|&s| scorer.score_finding(&finding("f", s, true), 3))
            .collect();
        for pair in scores.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_unverified_patch_scores_exactly_zero() {
        let scorer = Scorer::default();
        let f = finding("f-1", Severity::Critical, true);
        // Even with functionality preserved and a critical target.
        let p = patch("p-1", "f-1", false, true);
        assert_eq!(scorer.score_patch(&p, &f, 0), 0.0);
    }

    #[test]
    fn test_functionality_bonus() {
        let scorer = Scorer::default();
        let f = finding("f-1", Severity::Medium, false);
        let real = scorer.score_patch(&patch("p-1", "f-1", true, true), &f, 0);
        let fake = scorer.score_patch(&patch("p-2", "f-1", true, false), &f, 0);
        assert!((real - 3.6).abs() < 1e-12);
        assert!((fake - 3.0).abs() < 1e-12);
        assert!(real > fake);
    }

    #[test]
    fn test_score_round_sums_both_sides() {
        let scorer = Scorer::default();
        let findings = vec![
            finding("f-1", Severity::Critical, true),
            finding("f-2", Severity::Low, false),
        ];
        let patches = vec![patch("p-1", "f-1", true, true)];
        let (red, blue) = scorer.score_round(&findings, &patches, &[], 0);

        let expected_red =
            scorer.score_finding(&findings[0], 0) + scorer.score_finding(&findings[1], 0);
        let expected_blue = scorer.score_patch(&patches[0], &findings[0], 0);
        assert!((red - expected_red).abs() < 1e-12);
        assert!((blue - expected_blue).abs() < 1e-12);
    }

    #[test]
    fn test_unmatched_patch_scores_zero_by_default() {
        let scorer = Scorer::default();
        let findings = vec![finding("f-1", Severity::Critical, true)];
        let patches = vec![patch("p-1", "f-missing", true, true)];
        let (_, blue) = scorer.score_round(&findings, &patches, &[], 0);
        assert_eq!(blue, 0.0);
    }

    #[test]
    fn test_unmatched_patch_legacy_fallback() {
        let scorer = Scorer::new(ScoringConfig {
            unmatched_patch_policy: UnmatchedPatchPolicy::FirstFinding,
            ..ScoringConfig::default()
        });
        let findings = vec![finding("f-1", Severity::Critical, true)];
        let patches = vec![patch("p-1", "f-missing", true, true)];
        let (_, blue) = scorer.score_round(&findings, &patches, &[], 0);
        // Scored against f-1, the first available finding.
        let expected = scorer.score_patch(&patches[0], &findings[0], 0);
        assert!((blue - expected).abs() < 1e-12);
        assert!(blue > 0.0);
    }

    #[test]
    fn test_unmatched_patch_legacy_fallback_empty_pool() {
        let scorer = Scorer::new(ScoringConfig {
            unmatched_patch_policy: UnmatchedPatchPolicy::FirstFinding,
            ..ScoringConfig::default()
        });
        let patches = vec![patch("p-1", "f-missing", true, true)];
        let (red, blue) = scorer.score_round(&[], &patches, &[], 0);
        assert_eq!(red, 0.0);
        assert_eq!(blue, 0.0);
    }

    #[test]
    fn test_patch_matches_prior_round_finding() {
        let scorer = Scorer::default();
        let prior = vec![finding("f-old", Severity::High, true)];
        let patches = vec![patch("p-1", "f-old", true, true)];
        // Round 2: no new findings, but the prior pool carries round 1's.
        let (red, blue) = scorer.score_round(&[], &patches, &prior, 2);
        assert_eq!(red, 0.0);
        assert!((blue - scorer.score_patch(&patches[0], &prior[0], 2)).abs() < 1e-12);
    }

    #[test]
    fn test_current_round_findings_shadow_prior_on_match() {
        // Same id in both pools: the current round's entry wins the match.
        let scorer = Scorer::default();
        let current = vec![finding("f-1", Severity::Critical, true)];
        let prior = vec![finding("f-1", Severity::Low, false)];
        let patches = vec![patch("p-1", "f-1", true, true)];
        let (_, blue) = scorer.score_round(&current, &patches, &prior, 0);
        let expected = scorer.score_patch(&patches[0], &current[0], 0);
        assert!((blue - expected).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_zero_findings_no_division() {
        let m = Scorer::calculate_metrics(&[], &[patch("p-1", "f-1", true, true)]);
        assert_eq!(m.tdsr, 0.0);
        assert_eq!(m.fdsr, 0.0);
        assert_eq!(m.asc, 0);
    }

    #[test]
    fn test_metrics_rates() {
        let findings = vec![
            finding("f-1", Severity::High, true),
            finding("f-2", Severity::Low, false),
            finding("f-3", Severity::Medium, false),
            finding("f-4", Severity::Critical, true),
        ];
        let patches = vec![
            patch("p-1", "f-1", true, true),  // true defense
            patch("p-2", "f-2", true, false), // fake defense
            patch("p-3", "f-3", false, true), // unverified: counts nowhere
        ];
        let m = Scorer::calculate_metrics(&findings, &patches);
        assert!((m.tdsr - 0.25).abs() < 1e-12);
        assert!((m.fdsr - 0.25).abs() < 1e-12);
        assert_eq!(m.asc, 4);
    }
}
