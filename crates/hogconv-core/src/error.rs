//! Error taxonomy and the structured issue log.
//!
//! Hard failures of the library surface as [`ConvertError`]. Everything that goes wrong
//! with an individual submission is recovered at the submission boundary and recorded as
//! a [`ConversionIssue`] instead, so a batch always completes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Library-level errors (configuration, persistence, I/O outside a submission).
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("cannot access {path}: {source}")]
    PathAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache error: {message}")]
    Cache { message: String },

    #[error("store error: {message}")]
    Store { message: String },

    #[error("malformed strategy file {path}: {message}")]
    Format { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ConvertResult<T> = Result<T, ConvertError>;

impl ConvertError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn path_access(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::PathAccess {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// How an issue affected its submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// No matrix was produced.
    Skip,
    /// A matrix was produced; something about its identity was repaired.
    Warning,
    /// A matrix was produced but some cells fell back to the default roll.
    PartialFailure,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Skip => "Skipped",
            Severity::Warning => "Warning",
            Severity::PartialFailure => "Partial failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    LoadError,
    MissingEntryPoint,
    Timeout,
    CellValidation,
    DuplicateIdentity,
    DuplicateIdentifier,
    EmptyIdentity,
    NameTruncated,
    NameUnencodable,
    PathAccess,
}

impl IssueKind {
    pub fn severity(self) -> Severity {
        match self {
            IssueKind::LoadError
            | IssueKind::MissingEntryPoint
            | IssueKind::Timeout
            | IssueKind::PathAccess => Severity::Skip,
            IssueKind::CellValidation => Severity::PartialFailure,
            IssueKind::DuplicateIdentity
            | IssueKind::DuplicateIdentifier
            | IssueKind::EmptyIdentity
            | IssueKind::NameTruncated
            | IssueKind::NameUnencodable => Severity::Warning,
        }
    }
}

/// One entry of a batch's error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionIssue {
    pub path: PathBuf,
    pub severity: Severity,
    pub kind: IssueKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_hint: Option<String>,
}

impl ConversionIssue {
    pub fn new(kind: IssueKind, path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            severity: kind.severity(),
            kind,
            message: message.into(),
            identity_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.identity_hint = Some(hint.into());
        self
    }

    /// Issues recorded before the path is known (identity resolution) get it attached here.
    pub(crate) fn at(mut self, path: &Path) -> Self {
        self.path = path.to_path_buf();
        self
    }
}

impl fmt::Display for ConversionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity.label(), self.message)
    }
}

/// Why a submission could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadFailure {
    #[error("load error: {0}")]
    Load(String),

    #[error("missing entry point `{0}`")]
    MissingEntryPoint(String),
}

/// Error raised by a single entry-point call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The submission's own code raised.
    #[error("{0}")]
    Raised(String),

    /// The channel to the submission broke (process exited, garbled reply).
    #[error("transport: {0}")]
    Transport(String),
}
