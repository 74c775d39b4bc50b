//! End-to-end driver runs over synthesized PE images, checking that each
//! built-in rule reaches the verdict the image's headers call for.

mod common;

use binvet::diff::DiffKey;
use binvet::driver::{Driver, LOADER_ID};
use binvet::policy::Policy;
use binvet::report::{ResultKind, RuleResult, Severity};
use binvet::rules::{builtin_rules, SkipReason};
use common::{PeSpec, ANCIENT_CPP, LINKER};
use std::fs;
use std::path::Path;

fn run_over(dir: &Path) -> Vec<RuleResult> {
    let driver = Driver::new(builtin_rules(), Policy::empty());
    driver.run(&[dir.to_path_buf()]).unwrap().results
}

fn results_for<'a>(results: &'a [RuleResult], name: &str, rule: &str) -> Vec<&'a RuleResult> {
    results
        .iter()
        .filter(|r| r.target.ends_with(name) && r.rule_id == rule)
        .collect()
}

#[test]
fn hardened_image_passes_every_rule() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pe(dir.path(), "good.exe", &PeSpec::default());

    let results = run_over(dir.path());
    for rule in ["BV2001", "BV2002", "BV2004", "BV2006"] {
        let found = results_for(&results, "good.exe", rule);
        assert_eq!(found.len(), 1, "one result for {rule}");
        assert_eq!(found[0].kind, ResultKind::Pass, "{rule} should pass");
        assert!(found[0].sha256.is_some());
    }
}

#[test]
fn base_below_four_gigabytes_fails_base_address_rule() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pe(
        dir.path(),
        "low.exe",
        &PeSpec::default().with_base(0x0000_0000_FFFF_FFFF),
    );

    let results = run_over(dir.path());
    let found = results_for(&results, "low.exe", "BV2001");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ResultKind::Fail { severity: Severity::Error });
}

#[test]
fn base_at_four_gigabytes_passes_base_address_rule() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pe(
        dir.path(),
        "high.exe",
        &PeSpec::default().with_base(0x0000_0001_4000_0000),
    );

    let results = run_over(dir.path());
    let found = results_for(&results, "high.exe", "BV2001");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, ResultKind::Pass);
}

#[test]
fn thirty_two_bit_image_skips_base_address_but_not_mitigations() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pe(dir.path(), "legacy.exe", &PeSpec::default().bits32());

    let results = run_over(dir.path());
    let base = results_for(&results, "legacy.exe", "BV2001");
    assert_eq!(
        base[0].kind,
        ResultKind::NotApplicable { reason: SkipReason::Not64Bit }
    );
    // DEP and ASLR apply to 32-bit images too.
    assert_eq!(results_for(&results, "legacy.exe", "BV2002")[0].kind, ResultKind::Pass);
    assert_eq!(results_for(&results, "legacy.exe", "BV2004")[0].kind, ResultKind::Pass);
}

#[test]
fn kernel_mode_image_is_skipped_by_all_rules() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pe(dir.path(), "driver.sys", &PeSpec::default().kernel_mode());

    let results = run_over(dir.path());
    for rule in ["BV2001", "BV2002", "BV2004", "BV2006"] {
        let found = results_for(&results, "driver.sys", rule);
        assert_eq!(
            found[0].kind,
            ResultKind::NotApplicable { reason: SkipReason::KernelMode },
            "{rule} should skip kernel-mode images"
        );
    }
}

#[test]
fn resource_only_dll_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pe(dir.path(), "strings.dll", &PeSpec::default().resource_only());

    let results = run_over(dir.path());
    let found = results_for(&results, "strings.dll", "BV2001");
    assert_eq!(
        found[0].kind,
        ResultKind::NotApplicable { reason: SkipReason::ResourceOnly }
    );
}

#[test]
fn missing_mitigation_flags_fail_their_rules() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pe(
        dir.path(),
        "soft.exe",
        &PeSpec::default().characteristics(0),
    );

    let results = run_over(dir.path());
    for rule in ["BV2002", "BV2004"] {
        let found = results_for(&results, "soft.exe", rule);
        assert_eq!(found[0].kind, ResultKind::Fail { severity: Severity::Error });
    }
}

#[test]
fn old_toolchain_fails_secure_tools_rule() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pe(
        dir.path(),
        "stale.exe",
        &PeSpec::default().rich(vec![ANCIENT_CPP, LINKER]),
    );

    let results = run_over(dir.path());
    let found = results_for(&results, "stale.exe", "BV2006");
    assert_eq!(found[0].kind, ResultKind::Fail { severity: Severity::Error });
    assert!(found[0].message.contains("C++"));
}

#[test]
fn image_without_toolchain_metadata_skips_secure_tools() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pe(dir.path(), "bare.exe", &PeSpec::default().rich(vec![]));

    let results = run_over(dir.path());
    let found = results_for(&results, "bare.exe", "BV2006");
    assert_eq!(
        found[0].kind,
        ResultKind::NotApplicable { reason: SkipReason::NoToolchainMetadata }
    );
    // The flag rules still run.
    assert_eq!(results_for(&results, "bare.exe", "BV2002")[0].kind, ResultKind::Pass);
}

#[test]
fn malformed_and_non_binary_targets_yield_loader_errors() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pe(dir.path(), "good.exe", &PeSpec::default());
    common::write_truncated_pe(dir.path(), "broken.exe");
    fs::write(dir.path().join("readme.txt"), "not a binary").unwrap();

    let results = run_over(dir.path());

    let broken = results_for(&results, "broken.exe", LOADER_ID);
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].kind, ResultKind::Error);

    let readme = results_for(&results, "readme.txt", LOADER_ID);
    assert_eq!(readme.len(), 1);
    assert_eq!(readme[0].kind, ResultKind::Error);

    // The healthy target was still fully analyzed.
    assert_eq!(results_for(&results, "good.exe", "BV2001")[0].kind, ResultKind::Pass);
}

#[test]
fn every_target_rule_pair_yields_exactly_one_result() {
    let dir = tempfile::tempdir().unwrap();
    common::write_pe(dir.path(), "a.exe", &PeSpec::default());
    common::write_pe(dir.path(), "b.exe", &PeSpec::default().bits32());
    common::write_pe(dir.path(), "c.sys", &PeSpec::default().kernel_mode());

    let results = run_over(dir.path());
    // 3 targets x 4 rules, no loader failures.
    assert_eq!(results.len(), 12);
    for result in &results {
        let key = DiffKey::of(result);
        let same: Vec<_> = results
            .iter()
            .filter(|r| r.target == key.target && r.rule_id == key.rule_id)
            .collect();
        assert_eq!(same.len(), 1, "{}/{} duplicated", key.target, key.rule_id);
    }
}
