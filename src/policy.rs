//! Policy: named, defaulted, overridable option values keyed by rule
//! identity.
//!
//! A rule declares its options (with defaults) via
//! [`crate::rules::Rule::options`]; external configuration may override any
//! of them. Resolution never fails: an absent explicit value falls back to
//! the declared default. Values are typed; interpretation is left to the
//! rule that declared the option.

use crate::binary::{Language, ToolVersion};
use crate::error::{Result, VetError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::mem;
use std::path::Path;
use tracing::{debug, warn};

/// A typed policy value. Deserializes from the natural JSON shape of each
/// variant (bool, integer, `{language: "maj.min.patch.build"}`, string).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PolicyValue {
    Bool(bool),
    Integer(u64),
    VersionMap(BTreeMap<Language, ToolVersion>),
    Text(String),
}

impl PolicyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PolicyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<u64> {
        match self {
            PolicyValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_version_map(&self) -> Option<&BTreeMap<Language, ToolVersion>> {
        match self {
            PolicyValue::VersionMap(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PolicyValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// One declared configuration option: its name and default value.
#[derive(Debug, Clone)]
pub struct PolicyOption {
    pub name: &'static str,
    pub default: PolicyValue,
}

impl PolicyOption {
    pub fn new(name: &'static str, default: PolicyValue) -> Self {
        Self { name, default }
    }
}

/// Nested rule → option → value configuration. Read-only once a run
/// starts; loaded exactly once at run configuration time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Policy {
    values: BTreeMap<String, BTreeMap<String, PolicyValue>>,
}

impl Policy {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a policy document. Malformed input is a configuration error,
    /// the one class that aborts a run.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| VetError::configuration(format!("malformed policy: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            VetError::configuration(format!("cannot read policy {}: {e}", path.display()))
        })?;
        let policy = Self::from_json(&text)?;
        debug!(rules = policy.values.len(), "loaded policy overrides");
        Ok(policy)
    }

    /// Explicit override for one (rule, option), shadowing the default.
    pub fn set(
        &mut self,
        rule_id: impl Into<String>,
        option: impl Into<String>,
        value: PolicyValue,
    ) {
        self.values
            .entry(rule_id.into())
            .or_default()
            .insert(option.into(), value);
    }

    /// The explicit value for (rule, option), if one was configured.
    pub fn explicit(&self, rule_id: &str, option: &str) -> Option<&PolicyValue> {
        self.values.get(rule_id).and_then(|opts| opts.get(option))
    }

    /// Resolve the full option set for one rule: every declared option is
    /// present, explicit values win over declared defaults. Lookup never
    /// fails. An explicit value whose type differs from the declared
    /// default must not weaken the rule, so it is discarded in favor of
    /// the default.
    pub fn resolve(
        &self,
        rule_id: &str,
        declared: &[PolicyOption],
    ) -> BTreeMap<String, PolicyValue> {
        declared
            .iter()
            .map(|opt| {
                let value = match self.explicit(rule_id, opt.name) {
                    Some(v) if mem::discriminant(v) == mem::discriminant(&opt.default) => {
                        v.clone()
                    }
                    Some(_) => {
                        warn!(
                            rule = rule_id,
                            option = opt.name,
                            "policy override has the wrong type; using the declared default"
                        );
                        opt.default.clone()
                    }
                    None => opt.default.clone(),
                };
                (opt.name.to_string(), value)
            })
            .collect()
    }

    /// Reject overrides that name no registered rule or no declared option.
    /// `known` maps rule id → declared options.
    pub fn validate(&self, known: &BTreeMap<&str, Vec<PolicyOption>>) -> Result<()> {
        for (rule_id, options) in &self.values {
            let Some(declared) = known.get(rule_id.as_str()) else {
                return Err(VetError::configuration(format!(
                    "policy references unknown rule '{rule_id}'"
                )));
            };
            for option in options.keys() {
                if !declared.iter().any(|d| d.name == option) {
                    return Err(VetError::policy_value(
                        rule_id.clone(),
                        option.clone(),
                        "not a declared option",
                    ));
                }
            }
        }
        Ok(())
    }
}
