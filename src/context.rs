//! Per-(target, rule) analysis context and the result sink rules emit into.

use crate::binary::Binary;
use crate::policy::PolicyValue;
use crate::report::{ResultKind, RuleResult, Severity};
use std::collections::BTreeMap;

/// Everything a rule sees while analyzing one target: the loaded binary,
/// the policy values resolved for this rule, and the target identity.
/// Created just before the rule runs and discarded after; never shared
/// across threads.
pub struct AnalysisContext<'a> {
    pub target: &'a str,
    pub binary: &'a Binary,
    resolved: BTreeMap<String, PolicyValue>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        target: &'a str,
        binary: &'a Binary,
        resolved: BTreeMap<String, PolicyValue>,
    ) -> Self {
        Self { target, binary, resolved }
    }

    /// Resolved policy value for one of this rule's declared options.
    /// Present for every declared option (defaults are pre-seeded).
    pub fn option(&self, name: &str) -> Option<&PolicyValue> {
        self.resolved.get(name)
    }
}

/// Accumulates the results of one (target, rule) invocation, preserving
/// emission order. Exactly one terminal verdict (pass/fail/error) is the
/// contract; the driver enforces it after the rule returns.
pub struct ResultSink {
    rule_id: String,
    target: String,
    sha256: Option<String>,
    results: Vec<RuleResult>,
}

impl ResultSink {
    pub fn new(rule_id: &str, target: &str, sha256: Option<&str>) -> Self {
        Self {
            rule_id: rule_id.to_string(),
            target: target.to_string(),
            sha256: sha256.map(str::to_string),
            results: Vec::new(),
        }
    }

    fn emit(&mut self, kind: ResultKind, message: String) {
        let mut result = RuleResult::new(&self.rule_id, &self.target, kind, message);
        if let Some(sha256) = &self.sha256 {
            result = result.with_sha256(sha256.clone());
        }
        self.results.push(result);
    }

    pub fn pass(&mut self, message: impl Into<String>) {
        self.emit(ResultKind::Pass, message.into());
    }

    pub fn fail(&mut self, severity: Severity, message: impl Into<String>) {
        self.emit(ResultKind::Fail { severity }, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.emit(ResultKind::Error, message.into());
    }

    /// Number of terminal verdicts emitted so far.
    pub fn verdicts(&self) -> usize {
        self.results
            .iter()
            .filter(|r| {
                matches!(
                    r.kind,
                    ResultKind::Pass | ResultKind::Fail { .. } | ResultKind::Error
                )
            })
            .count()
    }

    pub fn into_results(self) -> Vec<RuleResult> {
        self.results
    }
}
