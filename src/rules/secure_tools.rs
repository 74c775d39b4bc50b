//! BV2006: binaries should be built with a sufficiently recent toolchain.
//!
//! Compares each object module's back-end compiler version against a
//! per-language minimum declared as policy. The minimum map is this rule's
//! one option; a policy override replaces the shipped defaults wholesale.

use crate::binary::{Language, ObjectModuleDetails, ToolVersion};
use crate::context::{AnalysisContext, ResultSink};
use crate::policy::{PolicyOption, PolicyValue};
use crate::report::Severity;
use crate::rules::{gate_user_mode_image, Applicability, Rule, SkipReason};
use std::collections::BTreeMap;

pub const OPT_MINIMUM_TOOL_VERSIONS: &str = "MinimumToolVersions";

/// Shipped minimums: the VS2015 Update 3 compilers, the first with
/// fully-supported /guard:cf and current /GS analysis.
fn default_minimums() -> BTreeMap<Language, ToolVersion> {
    let mut map = BTreeMap::new();
    map.insert(Language::C, ToolVersion::new(19, 0, 24215, 1));
    map.insert(Language::Cxx, ToolVersion::new(19, 0, 24215, 1));
    map
}

pub struct SecureToolsRule;

impl SecureToolsRule {
    /// Minimum required version for a language, from resolved policy.
    /// Languages absent from the map carry no requirement.
    fn minimum_for(ctx: &AnalysisContext, language: Language) -> Option<ToolVersion> {
        ctx.option(OPT_MINIMUM_TOOL_VERSIONS)
            .and_then(PolicyValue::as_version_map)
            .and_then(|map| map.get(&language).copied())
    }
}

impl Rule for SecureToolsRule {
    fn id(&self) -> &'static str {
        "BV2006"
    }

    fn name(&self) -> &'static str {
        "BuildWithSecureTools"
    }

    fn description(&self) -> &'static str {
        "Application code should be compiled with the most up-to-date toolsets \
         possible to take advantage of current compiler security mitigations."
    }

    fn options(&self) -> Vec<PolicyOption> {
        vec![PolicyOption::new(
            OPT_MINIMUM_TOOL_VERSIONS,
            PolicyValue::VersionMap(default_minimums()),
        )]
    }

    fn can_analyze(&self, ctx: &AnalysisContext) -> Applicability {
        if let Some(reason) = gate_user_mode_image(ctx) {
            return Applicability::NotApplicable(reason);
        }
        if ctx.binary.object_modules().is_empty() {
            return Applicability::NotApplicable(SkipReason::NoToolchainMetadata);
        }
        Applicability::Applicable
    }

    fn analyze(&self, ctx: &AnalysisContext, sink: &mut ResultSink) -> anyhow::Result<()> {
        let mut bad_modules: BTreeMap<Language, Vec<&ObjectModuleDetails>> = BTreeMap::new();

        for module in ctx.binary.object_modules() {
            let Some(minimum) = Self::minimum_for(ctx, module.language) else {
                continue;
            };
            if module.back_end_version < minimum {
                bad_modules.entry(module.language).or_default().push(module);
            }
        }

        if bad_modules.is_empty() {
            sink.pass(format!(
                "'{}' was compiled with toolchains that satisfy the configured minimum versions.",
                ctx.target
            ));
            return Ok(());
        }

        let mut details = Vec::new();
        for (language, modules) in &bad_modules {
            // One line per language, oldest offender first.
            let mut versions: Vec<ToolVersion> =
                modules.iter().map(|m| m.back_end_version).collect();
            versions.sort_unstable();
            let minimum = Self::minimum_for(ctx, *language).unwrap_or_default();
            details.push(format!(
                "{language}: {count} module(s) built with {oldest} < required {minimum}",
                count = modules.len(),
                oldest = versions[0],
            ));
        }

        sink.fail(
            Severity::Error,
            format!(
                "'{}' was compiled with one or more outdated toolsets ({}). Rebuild with \
                 compilers that meet the configured minimum versions.",
                ctx.target,
                details.join("; ")
            ),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::{Binary, Bits};
    use crate::policy::Policy;
    use crate::report::ResultKind;
    use crate::rules::testutil::{self, HARDENED};

    fn binary_with_modules(modules: Vec<ObjectModuleDetails>) -> Binary {
        let mut model = testutil::pe_model(Bits::Bits64, 0x1_4000_0000, HARDENED);
        model.object_modules = modules;
        Binary::from_pe(model, 4096)
    }

    fn module(language: Language, version: ToolVersion) -> ObjectModuleDetails {
        ObjectModuleDetails::from_toolchain("MSVC", version, language)
    }

    #[test]
    fn not_applicable_without_toolchain_metadata() {
        let rule = SecureToolsRule;
        let binary = binary_with_modules(Vec::new());
        assert_eq!(
            rule.can_analyze(&testutil::ctx(&rule, &binary)),
            Applicability::NotApplicable(SkipReason::NoToolchainMetadata)
        );
    }

    #[test]
    fn modern_toolchain_passes_with_defaults() {
        let rule = SecureToolsRule;
        let binary = binary_with_modules(vec![
            module(Language::Cxx, ToolVersion::new(19, 16, 27034, 0)),
            module(Language::Link, ToolVersion::new(14, 16, 27034, 0)),
        ]);
        let ctx = testutil::ctx(&rule, &binary);
        assert_eq!(rule.can_analyze(&ctx), Applicability::Applicable);
        let mut sink = ResultSink::new(rule.id(), ctx.target, None);
        rule.analyze(&ctx, &mut sink).unwrap();
        let results = sink.into_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, ResultKind::Pass);
    }

    #[test]
    fn outdated_module_fails_and_names_language() {
        let rule = SecureToolsRule;
        let binary = binary_with_modules(vec![
            module(Language::C, ToolVersion::new(18, 0, 21005, 1)),
            module(Language::Cxx, ToolVersion::new(19, 16, 27034, 0)),
        ]);
        let ctx = testutil::ctx(&rule, &binary);
        let mut sink = ResultSink::new(rule.id(), ctx.target, None);
        rule.analyze(&ctx, &mut sink).unwrap();
        let results = sink.into_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, ResultKind::Fail { severity: Severity::Error });
        assert!(results[0].message.contains("C:"));
        assert!(results[0].message.contains("18.0.21005.1"));
    }

    #[test]
    fn policy_override_replaces_default_minimums() {
        let rule = SecureToolsRule;
        // Old compiler, but the override demands even less.
        let binary = binary_with_modules(vec![module(
            Language::C,
            ToolVersion::new(18, 0, 21005, 1),
        )]);

        let mut relaxed = BTreeMap::new();
        relaxed.insert(Language::C, ToolVersion::new(17, 0, 0, 0));
        let mut policy = Policy::empty();
        policy.set(rule.id(), OPT_MINIMUM_TOOL_VERSIONS, PolicyValue::VersionMap(relaxed));

        let ctx = testutil::ctx_with_policy(&rule, &binary, &policy);
        let mut sink = ResultSink::new(rule.id(), ctx.target, None);
        rule.analyze(&ctx, &mut sink).unwrap();
        assert_eq!(sink.into_results()[0].kind, ResultKind::Pass);
    }

    #[test]
    fn mismatched_override_type_keeps_default_minimums() {
        let rule = SecureToolsRule;
        // Below the shipped 19.0.24215.1 minimum for C.
        let binary = binary_with_modules(vec![module(
            Language::C,
            ToolVersion::new(18, 0, 21005, 1),
        )]);

        let mut policy = Policy::empty();
        policy.set(rule.id(), OPT_MINIMUM_TOOL_VERSIONS, PolicyValue::Bool(true));

        let ctx = testutil::ctx_with_policy(&rule, &binary, &policy);
        let mut sink = ResultSink::new(rule.id(), ctx.target, None);
        rule.analyze(&ctx, &mut sink).unwrap();
        let results = sink.into_results();
        assert_eq!(results.len(), 1);
        // The defaults still apply; the rule must not pass unconstrained.
        assert_eq!(results[0].kind, ResultKind::Fail { severity: Severity::Error });
    }

    #[test]
    fn languages_without_configured_minimum_are_ignored() {
        let rule = SecureToolsRule;
        // Ancient assembler, but defaults only constrain C and C++.
        let binary = binary_with_modules(vec![module(
            Language::Masm,
            ToolVersion::new(8, 0, 0, 0),
        )]);
        let ctx = testutil::ctx(&rule, &binary);
        let mut sink = ResultSink::new(rule.id(), ctx.target, None);
        rule.analyze(&ctx, &mut sink).unwrap();
        assert_eq!(sink.into_results()[0].kind, ResultKind::Pass);
    }
}
