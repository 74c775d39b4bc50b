//! Baseline differ: classifies an actual result set against an expected
//! one as Matched / Missing / Unexpected.
//!
//! A pure function over two immutable snapshots; no shared collections
//! are mutated while iterating. Comparison is order-independent and keyed
//! on the stable identity of a result; timestamps never participate
//! because they are not part of the key, and callers mask host-specific
//! path prefixes with [`crate::report::normalize_run`] first.

use crate::report::{ResultKind, RuleResult, Run};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonical classification key for one result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiffKey {
    pub target: String,
    pub rule_id: String,
    /// Kind label plus discriminating detail, stable across runs.
    pub kind: String,
    pub message: String,
}

impl DiffKey {
    pub fn of(result: &RuleResult) -> Self {
        let kind = match &result.kind {
            ResultKind::Pass => "pass".to_string(),
            ResultKind::Fail { severity } => format!("fail:{severity:?}").to_lowercase(),
            ResultKind::NotApplicable { reason } => format!("notApplicable:{reason}"),
            ResultKind::Error => "error".to_string(),
        };
        Self {
            target: result.target.clone(),
            rule_id: result.rule_id.clone(),
            kind,
            message: result.message.clone(),
        }
    }
}

/// Outcome of a baseline comparison. The comparison passes iff both the
/// missing and unexpected sets are empty; both are always reported so a
/// regression's direction is diagnosable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffOutcome {
    pub matched: Vec<DiffKey>,
    pub missing: Vec<DiffKey>,
    pub unexpected: Vec<DiffKey>,
}

impl DiffOutcome {
    pub fn is_match(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Classify `actual` against `expected`.
///
/// Each expected entry is satisfied by at most one actual entry with the
/// same key: duplicates on either side do not cross-satisfy. Output vecs
/// are sorted for stable reporting.
pub fn diff(expected: &[RuleResult], actual: &[RuleResult]) -> DiffOutcome {
    let mut wanted: HashMap<DiffKey, usize> = HashMap::new();
    for result in expected {
        *wanted.entry(DiffKey::of(result)).or_insert(0) += 1;
    }

    let mut outcome = DiffOutcome::default();
    for result in actual {
        let key = DiffKey::of(result);
        match wanted.get_mut(&key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                outcome.matched.push(key);
            }
            _ => outcome.unexpected.push(key),
        }
    }

    for (key, remaining) in wanted {
        for _ in 0..remaining {
            outcome.missing.push(key.clone());
        }
    }

    outcome.matched.sort_unstable();
    outcome.missing.sort_unstable();
    outcome.unexpected.sort_unstable();
    outcome
}

/// Convenience wrapper for whole-Run comparison.
pub fn diff_runs(expected: &Run, actual: &Run) -> DiffOutcome {
    diff(&expected.results, &actual.results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Severity;

    fn result(target: &str, rule: &str, kind: ResultKind, message: &str) -> RuleResult {
        RuleResult::new(rule, target, kind, message)
    }

    fn pass(target: &str) -> RuleResult {
        result(target, "BV2001", ResultKind::Pass, "ok")
    }

    #[test]
    fn identical_sets_match() {
        let expected = vec![
            pass("a.exe"),
            result("b.exe", "BV2002", ResultKind::Fail { severity: Severity::Error }, "bad"),
        ];
        let outcome = diff(&expected, &expected);
        assert!(outcome.is_match());
        assert_eq!(outcome.matched.len(), 2);
    }

    #[test]
    fn timestamps_do_not_affect_the_key() {
        let mut late = pass("a.exe");
        late.timestamp = chrono::Utc::now() + chrono::Duration::hours(1);
        let outcome = diff(&[pass("a.exe")], &[late]);
        assert!(outcome.is_match());
    }

    #[test]
    fn missing_and_unexpected_both_reported() {
        let expected = vec![pass("a.exe"), pass("b.exe")];
        let actual = vec![pass("b.exe"), pass("c.exe")];
        let outcome = diff(&expected, &actual);
        assert!(!outcome.is_match());
        assert_eq!(outcome.matched.len(), 1);
        assert_eq!(outcome.missing.len(), 1);
        assert_eq!(outcome.missing[0].target, "a.exe");
        assert_eq!(outcome.unexpected.len(), 1);
        assert_eq!(outcome.unexpected[0].target, "c.exe");
    }

    #[test]
    fn duplicate_actual_consumes_expected_once() {
        let expected = vec![pass("a.exe")];
        let actual = vec![pass("a.exe"), pass("a.exe")];
        let outcome = diff(&expected, &actual);
        assert_eq!(outcome.matched.len(), 1);
        assert_eq!(outcome.unexpected.len(), 1);
        assert!(outcome.missing.is_empty());
    }

    #[test]
    fn duplicate_expected_requires_duplicate_actual() {
        let expected = vec![pass("a.exe"), pass("a.exe")];
        let actual = vec![pass("a.exe")];
        let outcome = diff(&expected, &actual);
        assert_eq!(outcome.matched.len(), 1);
        assert_eq!(outcome.missing.len(), 1);
    }

    #[test]
    fn kind_differences_are_not_matches() {
        let expected = vec![pass("a.exe")];
        let actual = vec![result(
            "a.exe",
            "BV2001",
            ResultKind::Fail { severity: Severity::Error },
            "ok",
        )];
        let outcome = diff(&expected, &actual);
        assert_eq!(outcome.missing.len(), 1);
        assert_eq!(outcome.unexpected.len(), 1);
    }
}
