//! The rule (skimmer) contract and the builtin registry.
//!
//! A rule is a pluggable hardening check over a loaded binary: a pure
//! applicability predicate plus an analysis step that emits exactly one
//! terminal verdict through the sink. Rules are stateless with respect to
//! any single target; per-run state lives in the analysis context. The
//! registry is an explicit immutable list built once at process start;
//! adding a rule means adding it to [`builtin_rules`], nothing else.

pub mod base_address;
pub mod dynamic_base;
pub mod nx_compat;
pub mod secure_tools;

use crate::context::{AnalysisContext, ResultSink};
use crate::policy::PolicyOption;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Standardized causes for a rule declining a target, shared across the
/// whole catalog so skips are reported uniformly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    NotPortableExecutable,
    Not64Bit,
    KernelMode,
    ResourceOnly,
    HeaderUnparseable,
    NoToolchainMetadata,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::NotPortableExecutable => "image is not a portable executable",
            SkipReason::Not64Bit => "image is not a 64-bit binary",
            SkipReason::KernelMode => "image is a kernel-mode binary",
            SkipReason::ResourceOnly => "image is a resource-only binary",
            SkipReason::HeaderUnparseable => "image header could not be parsed",
            SkipReason::NoToolchainMetadata => "image carries no toolchain metadata",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Outcome of the applicability pass for one (target, rule) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    Applicable,
    NotApplicable(SkipReason),
}

/// The check contract every rule implements.
pub trait Rule: Send + Sync {
    /// Stable identity, referenced by results and policy (e.g. "BV2001").
    fn id(&self) -> &'static str;

    /// Short PascalCase name (e.g. "LoadImageAboveFourGigabyteAddress").
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Declared configuration surface: ordered (name, default) pairs.
    /// Policy seeds defaults from this list.
    fn options(&self) -> Vec<PolicyOption> {
        Vec::new()
    }

    /// Pure, side-effect-free predicate over the binary model. Must be
    /// evaluated (and return Applicable) before `analyze` is invoked.
    fn can_analyze(&self, ctx: &AnalysisContext) -> Applicability;

    /// Run the check, emitting exactly one terminal result via the sink.
    /// Unparseable-but-loaded state must map to an Error verdict, never a
    /// propagated fault.
    fn analyze(&self, ctx: &AnalysisContext, sink: &mut ResultSink) -> anyhow::Result<()>;
}

/// Shared gate used by the image-hardening rules: headers must have parsed
/// and the image must be neither kernel-mode nor resource-only.
pub(crate) fn gate_user_mode_image(ctx: &AnalysisContext) -> Option<SkipReason> {
    let Some(pe) = ctx.binary.pe() else {
        return Some(SkipReason::NotPortableExecutable);
    };
    if pe.header_unparseable {
        return Some(SkipReason::HeaderUnparseable);
    }
    if pe.is_kernel_mode() {
        return Some(SkipReason::KernelMode);
    }
    if pe.is_resource_only() {
        return Some(SkipReason::ResourceOnly);
    }
    None
}

/// The complete, immutable builtin rule set, available before the first
/// applicability check.
pub fn builtin_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(base_address::BaseAddressRule),
        Box::new(nx_compat::NxCompatRule),
        Box::new(dynamic_base::DynamicBaseRule),
        Box::new(secure_tools::SecureToolsRule),
    ]
}
