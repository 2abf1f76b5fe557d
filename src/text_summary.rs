//! Text summary builder for CLI output.
//!
//! Formats the terminal result snapshot into human-readable lines. Scores are
//! printed as received from the pipeline.

use crate::metrics;
use crate::model::ResultSnapshot;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from the final snapshot.
pub(crate) fn build_text_summary(snap: &ResultSnapshot) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!("Run: {} ({})", snap.run_id, snap.status));
    if let Some(repo) = snap.repo_url.as_deref().filter(|r| !r.is_empty()) {
        lines.push(format!("Repository: {repo}"));
    }
    if !snap.branch_name.is_empty() {
        lines.push(format!("Branch: {}", snap.branch_name));
    }
    if !snap.commit_sha.is_empty() {
        lines.push(format!("Commit: {}", snap.commit_sha));
    }
    if let Some(pr) = snap.pr_url.as_deref() {
        lines.push(format!("Pull request: {pr}"));
    }
    let retries = match snap.retry_limit {
        Some(limit) => format!("{}/{}", snap.retry_count, limit),
        None => snap.retry_count.to_string(),
    };
    lines.push(format!(
        "Duration: {:.1}s  Retries: {retries}",
        snap.duration_seconds
    ));
    if let Some(ci) = snap.cicd_status.as_deref() {
        lines.push(format!("CI/CD: {ci}"));
    }

    let t = snap.tests();
    lines.push(format!(
        "Tests: {} passed, {} failed, {} total",
        t.tests_passed, t.tests_failed, t.total_tests
    ));

    let counts = metrics::fix_counts(&snap.fixes);
    lines.push(format!(
        "Fixes: {} applied, {} failed",
        counts.applied, counts.failed
    ));
    let breakdown = metrics::bug_type_breakdown(&snap.fixes);
    if !breakdown.is_empty() {
        let parts: Vec<String> = breakdown
            .iter()
            .map(|(label, n)| format!("{label} {n}"))
            .collect();
        lines.push(format!("  by type: {}", parts.join(", ")));
    }
    for line in snap.formatted_fixes() {
        lines.push(format!("  {line}"));
    }

    let s = &snap.score;
    lines.push(format!(
        "Score: {:.1} (base {:.1}, speed +{:.1}, efficiency -{:.1})",
        s.total_score, s.base_score, s.speed_bonus, s.efficiency_penalty
    ));
    lines.push(format!(
        "  tests passed {:.1}%  fix quality {:.1}  CI bonus {:.1}  fixes applied {}",
        s.tests_passed_pct, s.fix_quality_score, s.ci_success_bonus, s.fixes_applied
    ));

    if let Some(err) = snap.error_message.as_deref().filter(|e| !e.is_empty()) {
        lines.push(format!("Pipeline error: {err}"));
    }

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_renders_counts_and_remote_score() {
        let snap: ResultSnapshot = serde_json::from_value(serde_json::json!({
            "run_id": "r-9",
            "status": "partial",
            "branch_name": "ACME_ORG_J_DOE_AI_Fix",
            "commit_sha": "deadbeef",
            "pr_url": "https://github.com/a/b/pull/4",
            "retry_count": 2,
            "retry_limit": 5,
            "duration_seconds": 120.5,
            "test_summary": {"total_tests": 10, "tests_passed": 9, "tests_failed": 1},
            "fixes": [
                {"bug_type": "SYNTAX", "file": "a.py", "line": 4, "fix_description": "add colon", "status": "applied"},
                {"bug_type": "LOGIC", "file": "b.py", "line": 7, "fix_description": "fix bound", "status": "failed"}
            ],
            "fixes_formatted_output": ["SYNTAX error in a.py line 4 → Fix: add colon"],
            "score": {"total_score": 97.5, "base_score": 87.5, "speed_bonus": 10.0}
        }))
        .unwrap();

        let lines = build_text_summary(&snap).lines;
        assert_eq!(lines[0], "Run: r-9 (partial)");
        assert!(lines.contains(&"Pull request: https://github.com/a/b/pull/4".to_string()));
        assert!(lines.contains(&"Duration: 120.5s  Retries: 2/5".to_string()));
        assert!(lines.contains(&"Tests: 9 passed, 1 failed, 10 total".to_string()));
        assert!(lines.contains(&"Fixes: 1 applied, 1 failed".to_string()));
        assert!(lines.contains(&"  SYNTAX error in a.py line 4 → Fix: add colon".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("Score: 97.5 (base 87.5, speed +10.0")));
    }
}
