use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading a target into a binary model.
///
/// Load errors are data, not control flow: the driver records one
/// Error-kind result for the target and keeps going.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("unreadable: {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("unrecognized binary format")]
    UnrecognizedFormat,

    #[error("corrupt image: {0}")]
    Corrupt(String),
}

/// binvet's error taxonomy.
#[derive(Debug, Error)]
pub enum VetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("policy option {option} for rule {rule}: {reason}")]
    PolicyValue {
        rule: String,
        option: String,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VetError>;

impl VetError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn policy_value<S1, S2, S3>(rule: S1, option: S2, reason: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::PolicyValue {
            rule: rule.into(),
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Configuration errors are the one class that aborts a run before any
    /// target is processed; everything else is recorded in the Run and the
    /// driver continues.
    pub fn aborts_run(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::PolicyValue { .. }
        )
    }
}
