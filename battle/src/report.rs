//! Battle reports: pure formatting over `BattleState`.

use crate::model::BattleState;

/// Render a full markdown report for a battle.
pub fn generate_report(state: &BattleState) -> String {
    let mut report = String::new();

    report.push_str(&format!("# Battle Report: {}\n\n", state.battle_id));

    report.push_str("## Summary\n\n");
    report.push_str(&format!(
        "| Metric | Value |\n\
         |--------|-------|\n\
         | Status | {} |\n\
         | Rounds | {} |\n\
         | Red Total | {:.3} |\n\
         | Blue Total | {:.3} |\n\
         | Findings (ASC) | {} |\n\
         | TDSR | {:.1}% |\n\
         | FDSR | {:.1}% |\n\
         | Elapsed | {:.1}s |\n\n",
        state.status,
        state.current_round,
        state.red_total_score,
        state.blue_total_score,
        state.metrics.asc,
        state.metrics.tdsr * 100.0,
        state.metrics.fdsr * 100.0,
        state.elapsed_seconds(),
    ));

    if !state.rounds.is_empty() {
        report.push_str("## Rounds\n\n");
        report.push_str("| Round | Findings | Patches | Red | Blue |\n");
        report.push_str("|-------|----------|---------|-----|------|\n");
        for round in &state.rounds {
            report.push_str(&format!(
                "| {} | {} | {} | {:.3} | {:.3} |\n",
                round.round_number,
                round.red_findings.len(),
                round.blue_patches.len(),
                round.red_score,
                round.blue_score,
            ));
        }
        report.push('\n');
    }

    if !state.all_findings.is_empty() {
        report.push_str("## Findings\n\n");
        report.push_str("| Id | Severity | Type | Exploit Proven | Round |\n");
        report.push_str("|----|----------|------|----------------|-------|\n");
        for f in &state.all_findings {
            report.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                f.id,
                f.severity,
                f.vuln_type,
                if f.exploit_proof { "yes" } else { "no" },
                f.round_discovered,
            ));
        }
        report.push('\n');
    }

    if !state.all_patches.is_empty() {
        report.push_str("## Patches\n\n");
        report.push_str("| Id | Finding | Verified | Functional | Round |\n");
        report.push_str("|----|---------|----------|------------|-------|\n");
        for p in &state.all_patches {
            report.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                p.id,
                p.finding_id,
                if p.verified { "yes" } else { "no" },
                if p.functionality_preserved { "yes" } else { "no" },
                p.round_applied,
            ));
        }
        report.push('\n');
    }

    report
}

/// Render a short plain-text summary: outcome, totals, and the winner.
pub fn generate_summary(state: &BattleState) -> String {
    let winner = if state.red_total_score > state.blue_total_score {
        "red"
    } else if state.blue_total_score > state.red_total_score {
        "blue"
    } else {
        "draw"
    };

    let mut summary = format!(
        "Battle {}: {} after {} rounds, red {:.3} vs blue {:.3} ({winner})\n",
        state.battle_id,
        state.status,
        state.current_round,
        state.red_total_score,
        state.blue_total_score,
    );
    summary.push_str(&format!(
        "{} findings, TDSR {:.1}%, FDSR {:.1}%\n",
        state.metrics.asc,
        state.metrics.tdsr * 100.0,
        state.metrics.fdsr * 100.0,
    ));
    summary
}
