//! Analysis driver: resolves targets, gates rules by applicability,
//! schedules execution across a bounded worker pool, and assembles the Run.
//!
//! Partial-failure isolation is a hard requirement here, not an
//! optimization: the corpus routinely includes intentionally malformed
//! binaries, so a fault in one (target, rule) pair is converted into an
//! Error-kind result and the run continues.

use crate::binary::Binary;
use crate::context::{AnalysisContext, ResultSink};
use crate::error::{LoadError, Result, VetError};
use crate::policy::{Policy, PolicyOption};
use crate::report::{ResultKind, RuleResult, Run};
use crate::rules::{Applicability, Rule};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Pseudo-rule id under which target load failures are reported.
///
/// The loader is not a [`Rule`] and does not appear in
/// [`crate::rules::builtin_rules`]: it has no applicability predicate or
/// policy surface, and it runs before any rule can. Its id is reserved
/// below the rule id range so results attributed to it are unambiguous;
/// it is the one id a result may carry that has no registered descriptor.
pub const LOADER_ID: &str = "BV0000";

/// One resolved target: identity plus the memoized load outcome.
struct Target {
    path: String,
    binary: Option<Binary>,
    sha256: Option<String>,
    load_error: Option<LoadError>,
}

impl Target {
    fn load(path: &Path) -> Self {
        let identity = path.display().to_string();
        if !path.is_file() {
            return Self {
                path: identity,
                binary: None,
                sha256: None,
                load_error: Some(LoadError::NotAFile(path.to_path_buf())),
            };
        }
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                return Self {
                    path: identity,
                    binary: None,
                    sha256: None,
                    load_error: Some(LoadError::Unreadable {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    }),
                };
            }
        };
        let sha256 = hex::encode(Sha256::digest(&data));
        match Binary::from_bytes(&data) {
            Ok(binary) => Self {
                path: identity,
                binary: Some(binary),
                sha256: Some(sha256),
                load_error: None,
            },
            Err(e) => Self {
                path: identity,
                binary: None,
                sha256: Some(sha256),
                load_error: Some(e),
            },
        }
    }
}

/// Orchestrates a full run over N targets and M registered rules.
pub struct Driver {
    rules: Vec<Box<dyn Rule>>,
    policy: Policy,
    threads: usize,
    recurse: bool,
    stop: Arc<AtomicBool>,
}

impl Driver {
    /// `rules` is the complete, immutable registry for this run.
    pub fn new(rules: Vec<Box<dyn Rule>>, policy: Policy) -> Self {
        Self {
            rules,
            policy,
            threads: 1,
            recurse: false,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Worker count. 1 selects the strictly sequential deterministic mode;
    /// 0 means one worker per available core.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    /// External stop signal, honored between (target, rule) work units.
    pub fn stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        } else {
            self.threads
        }
    }

    /// Validate configured policy against the registry. Runs once, before
    /// any target is touched; failure aborts the run.
    fn validate_policy(&self) -> Result<()> {
        let known: BTreeMap<&str, Vec<PolicyOption>> = self
            .rules
            .iter()
            .map(|rule| (rule.id(), rule.options()))
            .collect();
        self.policy.validate(&known)
    }

    /// Expand the given specifiers into a sorted, deduplicated file list.
    /// Directories are walked one level deep, or fully with `recurse`.
    fn expand_paths(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for path in paths {
            if path.is_dir() {
                let max_depth = if self.recurse { usize::MAX } else { 1 };
                for entry in WalkDir::new(path)
                    .max_depth(max_depth)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                {
                    if entry.file_type().is_file() {
                        files.push(entry.into_path());
                    }
                }
            } else {
                // Nonexistent paths stay in the list: they become
                // load-error results rather than silent omissions.
                files.push(path.clone());
            }
        }
        files.sort();
        files.dedup();
        files
    }

    /// Execute a full run. The returned Run is ordered target-major,
    /// rule-minor regardless of worker count, so single- and multi-worker
    /// runs produce identical output.
    pub fn run(&self, paths: &[PathBuf]) -> Result<Run> {
        self.validate_policy()?;

        let files = self.expand_paths(paths);
        info!(targets = files.len(), rules = self.rules.len(), "starting run");

        let targets: Vec<Target> = files.iter().map(|p| Target::load(p)).collect();

        // Applicability pass plus work-list construction, target-major
        // rule-minor. Pure reads over immutable models.
        let mut ordered: Vec<PairOutcome> = Vec::new();
        let mut jobs: Vec<(usize, usize)> = Vec::new();
        for (t_idx, target) in targets.iter().enumerate() {
            if let Some(load_error) = &target.load_error {
                warn!(target = %target.path, error = %load_error, "target failed to load");
                let mut result = RuleResult::new(
                    LOADER_ID,
                    &target.path,
                    ResultKind::Error,
                    format!("'{}' could not be analyzed: {load_error}", target.path),
                );
                if let Some(sha256) = &target.sha256 {
                    result = result.with_sha256(sha256.clone());
                }
                ordered.push(PairOutcome::Ready(vec![result]));
                continue;
            }
            for (r_idx, rule) in self.rules.iter().enumerate() {
                let ctx = self.context_for(target, rule.as_ref());
                match rule.can_analyze(&ctx) {
                    Applicability::Applicable => {
                        ordered.push(PairOutcome::Pending(jobs.len()));
                        jobs.push((t_idx, r_idx));
                    }
                    Applicability::NotApplicable(reason) => {
                        debug!(target = %target.path, rule = rule.id(), %reason, "skipped");
                        let mut result = RuleResult::new(
                            rule.id(),
                            &target.path,
                            ResultKind::NotApplicable { reason },
                            format!("'{}' was not evaluated: {reason}", target.path),
                        );
                        if let Some(sha256) = &target.sha256 {
                            result = result.with_sha256(sha256.clone());
                        }
                        ordered.push(PairOutcome::Ready(vec![result]));
                    }
                }
            }
        }

        let threads = self.effective_threads();
        debug!(jobs = jobs.len(), threads, "applicability pass complete");

        // Execute applicable pairs. Both modes produce results in job
        // order; parallel mode only changes wall-clock behavior.
        let executed: Vec<Vec<RuleResult>> = if threads <= 1 {
            jobs.iter()
                .map(|&(t_idx, r_idx)| self.run_pair(&targets[t_idx], self.rules[r_idx].as_ref()))
                .collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| VetError::configuration(format!("worker pool: {e}")))?;
            pool.install(|| {
                use rayon::prelude::*;
                jobs.par_iter()
                    .map(|&(t_idx, r_idx)| {
                        self.run_pair(&targets[t_idx], self.rules[r_idx].as_ref())
                    })
                    .collect()
            })
        };

        let mut results = Vec::new();
        for outcome in ordered {
            match outcome {
                PairOutcome::Ready(batch) => results.extend(batch),
                PairOutcome::Pending(job_idx) => results.extend(executed[job_idx].iter().cloned()),
            }
        }

        let run = Run::new(results);
        info!(
            pass = run.summary.pass,
            fail = run.summary.fail,
            not_applicable = run.summary.not_applicable,
            error = run.summary.error,
            "run complete"
        );
        Ok(run)
    }

    fn context_for<'a>(&self, target: &'a Target, rule: &dyn Rule) -> AnalysisContext<'a> {
        // Load-error targets never reach rule analysis, so the binary is
        // always present here.
        let binary = target
            .binary
            .as_ref()
            .unwrap_or_else(|| unreachable!("context for unloaded target"));
        AnalysisContext::new(
            &target.path,
            binary,
            self.policy.resolve(rule.id(), &rule.options()),
        )
    }

    /// Run one applicable (target, rule) pair with fault isolation.
    fn run_pair(&self, target: &Target, rule: &dyn Rule) -> Vec<RuleResult> {
        if self.stop.load(Ordering::Relaxed) {
            debug!(target = %target.path, rule = rule.id(), "stop requested; skipping");
            return Vec::new();
        }

        let ctx = self.context_for(target, rule);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut sink = ResultSink::new(rule.id(), &target.path, target.sha256.as_deref());
            rule.analyze(&ctx, &mut sink).map(|()| sink)
        }));

        let error_result = |description: String| {
            let mut result = RuleResult::new(
                rule.id(),
                &target.path,
                ResultKind::Error,
                format!("'{}': rule {} faulted: {description}", target.path, rule.id()),
            );
            if let Some(sha256) = &target.sha256 {
                result = result.with_sha256(sha256.clone());
            }
            vec![result]
        };

        match outcome {
            Ok(Ok(sink)) => {
                let verdicts = sink.verdicts();
                let results = sink.into_results();
                match verdicts {
                    1 => results,
                    0 => {
                        warn!(rule = rule.id(), target = %target.path, "no verdict emitted");
                        error_result("analysis completed without emitting a verdict".to_string())
                    }
                    n => {
                        warn!(rule = rule.id(), target = %target.path, verdicts = n, "multiple verdicts");
                        error_result(format!("analysis emitted {n} terminal verdicts"))
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(rule = rule.id(), target = %target.path, error = %e, "rule error");
                error_result(e.to_string())
            }
            Err(payload) => {
                let description = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                warn!(rule = rule.id(), target = %target.path, panic = %description, "rule panicked");
                error_result(description)
            }
        }
    }
}

enum PairOutcome {
    /// Result produced during the applicability/load pass.
    Ready(Vec<RuleResult>),
    /// Index into the executed-jobs vector.
    Pending(usize),
}
