//! Turning a submission file into something that can be called.
//!
//! A loaded submission exposes one [`EntryPoint`] plus a raw display-name candidate.
//! The structural contract is the [`Manifest`]: whether the entry point exists and
//! which name fields were set. [`ProcessLoader`] obtains it from a child process.

mod process;

pub use process::{ProcessEntryPoint, ProcessLoader};

use crate::error::{CallError, ConvertError, ConvertResult, LoadFailure};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One submission as read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub path: PathBuf,
    pub content: String,
    /// Directory-derived identifier (see [`derive_identifier`]).
    pub identifier: String,
}

impl Submission {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let path = path.into();
        let identifier = derive_identifier(&path);
        Self {
            path,
            content: content.into(),
            identifier,
        }
    }

    pub async fn read(path: &Path) -> ConvertResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConvertError::path_access(path, e))?;
        Ok(Self::new(path, content))
    }
}

/// Name of the submission's parent directory, or its file stem when the parent has no
/// usable name.
pub fn derive_identifier(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "submission".to_string())
}

/// The two-argument strategy function of a loaded submission.
#[async_trait]
pub trait EntryPoint: Send {
    /// Evaluate one cell. The raw value is validated by the caller.
    async fn call(&mut self, own: u32, opponent: u32) -> Result<Value, CallError>;

    /// Release whatever backs the entry point.
    async fn close(&mut self) {}
}

pub struct LoadedSubmission {
    pub entry_point: Box<dyn EntryPoint>,
    /// First non-empty recognized name field, or empty.
    pub name_candidate: String,
}

impl std::fmt::Debug for LoadedSubmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedSubmission")
            .field("name_candidate", &self.name_candidate)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait SubmissionLoader: Send + Sync {
    async fn load(&self, submission: &Submission) -> Result<LoadedSubmission, LoadFailure>;
}

/// First line a submission process prints.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Manifest {
    #[serde(default)]
    pub entry_point: bool,
    #[serde(default)]
    pub names: BTreeMap<String, Value>,
    /// Set when loading the unit failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl Manifest {
    pub fn parse(line: &str) -> Result<Self, LoadFailure> {
        serde_json::from_str(line.trim())
            .map_err(|e| LoadFailure::Load(format!("malformed manifest: {e}")))
    }

    /// Check the manifest against the expected contract.
    pub fn validate(&self, entry_point: &str) -> Result<(), LoadFailure> {
        if let Some(err) = &self.error {
            return Err(LoadFailure::Load(err.clone()));
        }
        if !self.entry_point {
            return Err(LoadFailure::MissingEntryPoint(entry_point.to_string()));
        }
        Ok(())
    }

    /// First field, in priority order, whose value renders to a non-empty string.
    pub fn display_name(&self, fields: &[String]) -> String {
        fields
            .iter()
            .filter_map(|f| self.names.get(f))
            .map(render_name)
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }
}

fn render_name(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
