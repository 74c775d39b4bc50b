//! binvet - static hardening verification for compiled binaries.
//!
//! Checks binary artifacts (PE today; ELF/Mach-O recognized) against a
//! catalog of security-hardening rules (ASLR base-address placement,
//! NX/DEP opt-in, toolchain provenance) and emits a structured Run log.
//! A baseline differ classifies a run against an expected one for
//! regression gating in CI.
//!
//! # Example
//!
//! ```no_run
//! use binvet::driver::Driver;
//! use binvet::policy::Policy;
//! use binvet::rules::builtin_rules;
//! use std::path::PathBuf;
//!
//! let driver = Driver::new(builtin_rules(), Policy::empty()).threads(1);
//! let run = driver.run(&[PathBuf::from("target.exe")]).unwrap();
//! for result in &run.results {
//!     println!("{} {}: {}", result.rule_id, result.kind.label(), result.message);
//! }
//! ```

pub mod binary;
pub mod cli;
pub mod context;
pub mod diff;
pub mod driver;
pub mod error;
pub mod output;
pub mod policy;
pub mod report;
pub mod rules;

// Commonly used types at crate root.
pub use binary::{Binary, BinaryFormat, Language, ObjectModuleDetails, ToolVersion};
pub use context::{AnalysisContext, ResultSink};
pub use diff::{diff, diff_runs, DiffOutcome};
pub use driver::Driver;
pub use error::{LoadError, VetError};
pub use policy::{Policy, PolicyOption, PolicyValue};
pub use report::{ResultKind, Run, RuleResult, Severity};
pub use rules::{builtin_rules, Applicability, Rule, SkipReason};
