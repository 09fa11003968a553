//! Conversion of untrusted Hog strategy submissions into validated strategy matrices.
//!
//! Each submission defines a two-argument strategy function. The pipeline:
//!
//! - discovers submission files under the given paths
//! - runs every submission in an isolated child process under a hard deadline
//! - evaluates the function over the full `goal x goal` score grid, replacing invalid cells
//! - resolves a unique, sanitized display name per submission
//! - skips submissions whose content is unchanged since the previous run
//!
//! # Quick Start
//!
//! ```no_run
//! use hogconv_core::{BatchOrchestrator, ConvertConfig, MemoryStore};
//! use std::path::PathBuf;
//!
//! # async fn example() -> hogconv_core::ConvertResult<()> {
//! let orchestrator = BatchOrchestrator::with_process_loader(ConvertConfig::default())?;
//! let mut store = MemoryStore::new();
//! let result = orchestrator
//!     .sync(&[PathBuf::from("submissions")], &mut store, &[])
//!     .await?;
//! print!("{}", hogconv_core::render_issues(&result.issues));
//! println!("{}", result.summary.line());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod deadline;
pub mod error;
pub mod evaluate;
pub mod fingerprint;
pub mod identity;
pub mod loader;
pub mod matrix;
pub mod orchestrator;
pub mod report;
pub mod validate;

pub use cache::{CacheDecision, CacheDiff, CacheRecord, JsonFileStore, KeyValueStore, MemoryStore};
pub use config::{ConvertConfig, RunnerConfig};
pub use deadline::{DeadlineError, DeadlineExecutor};
pub use error::{
    CallError, ConversionIssue, ConvertError, ConvertResult, IssueKind, LoadFailure, Severity,
};
pub use identity::{IdentityResolver, NameRegistry};
pub use loader::{EntryPoint, LoadedSubmission, ProcessLoader, Submission, SubmissionLoader};
pub use matrix::{Roll, StrategyMatrix};
pub use orchestrator::{convert, discover, BatchOrchestrator, BatchResult};
pub use report::{render_issues, BatchSummary};
pub use validate::CellValidator;
