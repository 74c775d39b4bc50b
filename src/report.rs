//! Result and Run records: the structured log a run produces, plus the
//! normalization pass used before any baseline comparison.

use crate::rules::SkipReason;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// How bad a failed check is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Terminal verdict for one (target, rule) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResultKind {
    Pass,
    Fail { severity: Severity },
    NotApplicable { reason: SkipReason },
    Error,
}

impl ResultKind {
    /// Stable label used in classification keys and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            ResultKind::Pass => "pass",
            ResultKind::Fail { .. } => "fail",
            ResultKind::NotApplicable { .. } => "notApplicable",
            ResultKind::Error => "error",
        }
    }
}

/// One immutable finding. Created only by rule analysis (or by the driver
/// for load errors); never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleResult {
    pub rule_id: String,
    /// Target identity as given to the driver.
    pub target: String,
    #[serde(flatten)]
    pub kind: ResultKind,
    pub message: String,
    /// Emission time. Non-deterministic; excluded from comparisons.
    pub timestamp: DateTime<Utc>,
    /// Content digest of the target, when it was readable. Stable across
    /// runs, so it participates in comparisons.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl RuleResult {
    pub fn new(
        rule_id: impl Into<String>,
        target: impl Into<String>,
        kind: ResultKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            target: target.into(),
            kind,
            message: message.into(),
            timestamp: Utc::now(),
            sha256: None,
        }
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }
}

/// Identity of the producing tool, recorded in every Run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolMetadata {
    pub name: String,
    pub version: String,
}

impl Default for ToolMetadata {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Per-kind result counts for quick triage.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub pass: usize,
    pub fail: usize,
    pub not_applicable: usize,
    pub error: usize,
}

impl RunSummary {
    pub fn tally(results: &[RuleResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.kind {
                ResultKind::Pass => summary.pass += 1,
                ResultKind::Fail { .. } => summary.fail += 1,
                ResultKind::NotApplicable { .. } => summary.not_applicable += 1,
                ResultKind::Error => summary.error += 1,
            }
        }
        summary
    }
}

/// The complete output of one driver invocation. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Run {
    pub schema_version: String,
    pub tool: ToolMetadata,
    pub started: DateTime<Utc>,
    pub results: Vec<RuleResult>,
    pub summary: RunSummary,
}

impl Run {
    pub fn new(results: Vec<RuleResult>) -> Self {
        Self {
            schema_version: "1.0".to_string(),
            tool: ToolMetadata::default(),
            started: Utc::now(),
            summary: RunSummary::tally(&results),
            results,
        }
    }

    /// Process exit code for this run: the worst kind observed wins.
    pub fn exit_code(&self) -> i32 {
        if self.summary.error > 0 {
            2
        } else if self.summary.fail > 0 {
            1
        } else {
            0
        }
    }
}

/// The fields treated as non-deterministic for comparison purposes. This is
/// an explicit allow-list: a field not named here is compared verbatim.
///
/// 1. per-result `timestamp`
/// 2. run `started` timestamp
/// 3. tool `version`
/// 4. the absolute root prefix of target paths (in `target` and `message`)
pub const PLACEHOLDER_ROOT: &str = "<ROOT>";
pub const PLACEHOLDER_VERSION: &str = "<VERSION>";

fn fixed_epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_default()
}

fn rewrite_root(text: &str, root: Option<&str>) -> String {
    match root {
        Some(root) if !root.is_empty() => text.replace(root, PLACEHOLDER_ROOT),
        _ => text.to_string(),
    }
}

/// Rewrite one result's non-deterministic fields to fixed placeholders.
pub fn normalize_result(result: &RuleResult, root: Option<&str>) -> RuleResult {
    RuleResult {
        rule_id: result.rule_id.clone(),
        target: rewrite_root(&result.target, root),
        kind: result.kind.clone(),
        message: rewrite_root(&result.message, root),
        timestamp: fixed_epoch(),
        sha256: result.sha256.clone(),
    }
}

/// Normalized copy of a Run, suitable for golden-output comparison and for
/// the differ. `root` is the absolute prefix to mask out of paths.
pub fn normalize_run(run: &Run, root: Option<&str>) -> Run {
    let results: Vec<RuleResult> = run
        .results
        .iter()
        .map(|r| normalize_result(r, root))
        .collect();
    Run {
        schema_version: run.schema_version.clone(),
        tool: ToolMetadata {
            name: run.tool.name.clone(),
            version: PLACEHOLDER_VERSION.to_string(),
        },
        started: fixed_epoch(),
        summary: RunSummary::tally(&results),
        results,
    }
}
