//! Rendering a Run (or a diff outcome) for humans and machines.

use crate::diff::DiffOutcome;
use crate::report::{ResultKind, Run};
use anyhow::Result;
use colored::Colorize;
use std::fmt::Write;

/// Serialize a Run as pretty-printed JSON, the machine-consumption format.
pub fn render_json(run: &Run) -> Result<String> {
    Ok(serde_json::to_string_pretty(run)?)
}

/// Human-readable rendering: one line per result, verdict colored, summary
/// footer.
pub fn render_terminal(run: &Run) -> String {
    let mut out = String::new();

    for result in &run.results {
        let verdict = match &result.kind {
            ResultKind::Pass => "PASS".green().bold(),
            ResultKind::Fail { .. } => "FAIL".red().bold(),
            ResultKind::NotApplicable { .. } => "SKIP".dimmed(),
            ResultKind::Error => "ERROR".yellow().bold(),
        };
        let _ = writeln!(out, "{verdict} [{}] {}", result.rule_id, result.message);
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{}: {} pass, {} fail, {} skipped, {} error",
        "summary".bold(),
        run.summary.pass,
        run.summary.fail,
        run.summary.not_applicable,
        run.summary.error
    );
    out
}

/// Human-readable diff rendering: both directions always shown, so the
/// reader can tell which side regressed.
pub fn render_diff(outcome: &DiffOutcome) -> String {
    let mut out = String::new();

    if outcome.is_match() {
        let _ = writeln!(
            out,
            "{} {} result(s) matched the baseline",
            "ok:".green().bold(),
            outcome.matched.len()
        );
        return out;
    }

    if !outcome.missing.is_empty() {
        let _ = writeln!(out, "{} (in baseline, absent from actual):", "missing".red().bold());
        for key in &outcome.missing {
            let _ = writeln!(out, "  - [{}] {} {}: {}", key.rule_id, key.kind, key.target, key.message);
        }
    }
    if !outcome.unexpected.is_empty() {
        let _ = writeln!(out, "{} (in actual, absent from baseline):", "unexpected".yellow().bold());
        for key in &outcome.unexpected {
            let _ = writeln!(out, "  + [{}] {} {}: {}", key.rule_id, key.kind, key.target, key.message);
        }
    }
    let _ = writeln!(
        out,
        "{} matched, {} missing, {} unexpected",
        outcome.matched.len(),
        outcome.missing.len(),
        outcome.unexpected.len()
    );
    out
}
