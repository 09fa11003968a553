//! Batch conversion: discovery, per-submission isolation, and result accumulation.

use crate::cache::{CacheDecision, CacheDiff, CacheRecord, KeyValueStore};
use crate::config::ConvertConfig;
use crate::deadline::{DeadlineError, DeadlineExecutor};
use crate::error::{ConversionIssue, ConvertResult, IssueKind, LoadFailure, Severity};
use crate::evaluate::evaluate_grid;
use crate::fingerprint::config_fingerprint;
use crate::identity::{identity_hint, IdentityResolver, NameRegistry};
use crate::loader::{ProcessLoader, Submission, SubmissionLoader};
use crate::matrix::StrategyMatrix;
use crate::report::BatchSummary;
use crate::validate::CellValidator;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything one batch run produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    /// In processing order.
    pub matrices: Vec<StrategyMatrix>,
    pub issues: Vec<ConversionIssue>,
    /// Record to persist for the next run.
    #[serde(skip)]
    pub cache: CacheRecord,
    pub summary: BatchSummary,
}

/// Mutable state of one run. Owned by a single `run` call and never shared.
struct BatchContext<'p> {
    registry: NameRegistry,
    identifiers: HashSet<String>,
    issues: Vec<ConversionIssue>,
    matrices: Vec<StrategyMatrix>,
    summary: BatchSummary,
    cache: CacheDiff,
    prior: HashMap<&'p str, &'p StrategyMatrix>,
}

impl<'p> BatchContext<'p> {
    fn push(&mut self, issue: ConversionIssue) {
        match issue.severity {
            Severity::Skip => tracing::error!(path = %issue.path.display(), "{issue}"),
            Severity::PartialFailure | Severity::Warning => {
                tracing::warn!(path = %issue.path.display(), "{issue}")
            }
        }
        self.summary.count_issue(&issue);
        self.issues.push(issue);
    }

    /// Make `base` unique within the batch, warning when it had to change.
    fn unique_identifier(&mut self, base: &str, path: &Path) -> String {
        if self.identifiers.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}-{n}");
            if self.identifiers.insert(candidate.clone()) {
                self.push(
                    ConversionIssue::new(
                        IssueKind::DuplicateIdentifier,
                        path,
                        format!("Identifier {base} already used, renamed to {candidate}"),
                    )
                    .with_hint(identity_hint(base)),
                );
                return candidate;
            }
            n += 1;
        }
    }

    async fn read(&mut self, path: &Path) -> Option<Submission> {
        match Submission::read(path).await {
            Ok(mut submission) => {
                submission.identifier = self.unique_identifier(&submission.identifier, path);
                Some(submission)
            }
            Err(e) => {
                self.push(ConversionIssue::new(
                    IssueKind::LoadError,
                    path,
                    format!("Cannot read submission: {e}"),
                ));
                None
            }
        }
    }

    /// Previous matrix to carry over unchanged, with its name reserved in the registry.
    fn plan_reuse(&mut self, submission: &Submission, goal: u32) -> Option<StrategyMatrix> {
        if self.cache.decide(submission) != CacheDecision::Unchanged {
            return None;
        }
        let id = submission.identifier.as_str();
        match self.prior.get(id).copied() {
            Some(prev) if prev.goal == goal && !self.registry.contains(&prev.name) => {
                self.registry.reserve(&prev.name);
                Some(prev.clone())
            }
            Some(prev) if prev.goal == goal => {
                tracing::debug!(
                    id,
                    name = %prev.name,
                    "previous name already taken, reprocessing"
                );
                None
            }
            _ => {
                tracing::debug!(id, "unchanged but no previous matrix, reprocessing");
                None
            }
        }
    }

    fn reuse(&mut self, submission: &Submission, matrix: StrategyMatrix) {
        tracing::info!(
            id = %submission.identifier,
            name = %matrix.name,
            "unchanged, reusing previous matrix"
        );
        self.cache.record(&submission.identifier, &submission.content);
        self.summary.reused += 1;
        self.matrices.push(matrix);
    }
}

pub struct BatchOrchestrator {
    config: ConvertConfig,
    loader: Arc<dyn SubmissionLoader>,
    executor: DeadlineExecutor,
    validator: CellValidator,
    resolver: IdentityResolver,
    fingerprint: String,
}

impl BatchOrchestrator {
    pub fn new(config: ConvertConfig, loader: Arc<dyn SubmissionLoader>) -> ConvertResult<Self> {
        config.validate()?;
        Ok(Self {
            executor: DeadlineExecutor::new(config.timeout()),
            validator: CellValidator::from_config(&config),
            resolver: IdentityResolver::from_config(&config),
            fingerprint: config_fingerprint(&config),
            loader,
            config,
        })
    }

    /// Orchestrator running every submission in a child process.
    pub fn with_process_loader(config: ConvertConfig) -> ConvertResult<Self> {
        let loader = ProcessLoader::new(&config)?;
        Self::new(config, Arc::new(loader))
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Convert every submission under `paths`.
    ///
    /// Submissions whose content matches `prior_cache` reuse their matrix from `prior`
    /// instead of being executed again. Never fails: every problem ends up in
    /// [`BatchResult::issues`].
    pub async fn run(
        &self,
        paths: &[PathBuf],
        prior_cache: Option<CacheRecord>,
        prior: &[StrategyMatrix],
    ) -> BatchResult {
        let mut ctx = BatchContext {
            registry: NameRegistry::new(),
            identifiers: HashSet::new(),
            issues: Vec::new(),
            matrices: Vec::new(),
            summary: BatchSummary::default(),
            cache: CacheDiff::new(prior_cache, &self.fingerprint),
            prior: prior.iter().map(|m| (m.id.as_str(), m)).collect(),
        };

        let (files, path_issues) =
            discover(paths, &self.config.source_suffix, self.config.recursive);
        for issue in path_issues {
            ctx.push(issue);
        }
        ctx.summary.discovered = files.len();
        tracing::info!(submissions = files.len(), "starting conversion batch");

        // Every reused name is reserved before any fresh submission claims one.
        let mut queue = Vec::with_capacity(files.len());
        for file in &files {
            if let Some(submission) = ctx.read(file).await {
                let reuse = ctx.plan_reuse(&submission, self.config.goal);
                queue.push((submission, reuse));
            }
        }

        for (submission, reuse) in queue {
            match reuse {
                Some(matrix) => ctx.reuse(&submission, matrix),
                None => self.process(submission, &mut ctx).await,
            }
        }

        tracing::info!(
            converted = ctx.summary.converted,
            reused = ctx.summary.reused,
            skipped = ctx.summary.skipped,
            "{}",
            ctx.summary.line()
        );

        BatchResult {
            matrices: ctx.matrices,
            issues: ctx.issues,
            cache: ctx.cache.finish(),
            summary: ctx.summary,
        }
    }

    /// [`run`](Self::run) with the cache record read from and written back to `store`.
    pub async fn sync(
        &self,
        paths: &[PathBuf],
        store: &mut dyn KeyValueStore,
        prior: &[StrategyMatrix],
    ) -> ConvertResult<BatchResult> {
        let record = CacheRecord::load(store);
        let result = self.run(paths, record, prior).await;
        result.cache.save(store)?;
        Ok(result)
    }

    async fn process(&self, submission: Submission, ctx: &mut BatchContext<'_>) {
        let path = submission.path.as_path();
        let id = submission.identifier.clone();
        let hint = identity_hint(&id);

        let loader = Arc::clone(&self.loader);
        let validator = self.validator;
        let goal = self.config.goal;
        let unit = submission.clone();
        let outcome = self
            .executor
            .run(async move {
                let mut loaded = loader.load(&unit).await?;
                let grid = evaluate_grid(loaded.entry_point.as_mut(), goal, &validator).await;
                Ok::<_, LoadFailure>((loaded.name_candidate, grid))
            })
            .await;

        let (candidate, grid) = match outcome {
            Ok(Ok(done)) => done,
            Ok(Err(LoadFailure::Load(msg))) => {
                ctx.push(
                    ConversionIssue::new(IssueKind::LoadError, path, msg).with_hint(hint),
                );
                return;
            }
            Ok(Err(LoadFailure::MissingEntryPoint(name))) => {
                ctx.push(
                    ConversionIssue::new(
                        IssueKind::MissingEntryPoint,
                        path,
                        format!("Missing {name}"),
                    )
                    .with_hint(hint),
                );
                return;
            }
            Err(DeadlineError::Exceeded { budget }) => {
                ctx.push(
                    ConversionIssue::new(
                        IssueKind::Timeout,
                        path,
                        format!("Conversion timed out (> {} s)", budget.as_secs_f64()),
                    )
                    .with_hint(hint),
                );
                return;
            }
            Err(DeadlineError::Panicked(msg)) => {
                ctx.push(
                    ConversionIssue::new(
                        IssueKind::LoadError,
                        path,
                        format!("Conversion crashed: {msg}"),
                    )
                    .with_hint(hint),
                );
                return;
            }
        };

        let resolution = self.resolver.resolve(&candidate, &id, &mut ctx.registry);
        for issue in resolution.issues {
            ctx.push(issue.at(path));
        }
        let name = resolution.name;

        if grid.stats.errors > 0 {
            let last = grid.stats.last_error.as_deref().unwrap_or("unknown error");
            ctx.push(
                ConversionIssue::new(
                    IssueKind::CellValidation,
                    path,
                    format!(
                        "{} error(s) while running {}: {last}",
                        grid.stats.errors, self.config.entry_point
                    ),
                )
                .with_hint(name.clone()),
            );
        }

        match StrategyMatrix::from_cells(id.clone(), name, goal, grid.cells) {
            Ok(matrix) => {
                tracing::info!(id = %id, name = %matrix.name, "converted strategy");
                ctx.cache.record(&id, &submission.content);
                ctx.summary.converted += 1;
                ctx.matrices.push(matrix);
            }
            // evaluate_grid always yields goal² cells.
            Err(e) => tracing::error!(id = %id, error = %e, "discarding malformed grid"),
        }
    }
}

/// Expand `paths` into submission files.
///
/// Files given directly are always included. Directories are listed in name order and
/// contribute files ending in `suffix`; subdirectories are walked when `recursive`.
/// Paths that cannot be accessed become [`IssueKind::PathAccess`] issues.
pub fn discover(
    paths: &[PathBuf],
    suffix: &str,
    recursive: bool,
) -> (Vec<PathBuf>, Vec<ConversionIssue>) {
    let mut files = Vec::new();
    let mut issues = Vec::new();
    for path in paths {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => walk_dir(path, suffix, recursive, &mut files, &mut issues),
            Ok(_) => files.push(path.clone()),
            Err(e) => issues.push(ConversionIssue::new(
                IssueKind::PathAccess,
                path,
                format!("can't access {}: {e}", path.display()),
            )),
        }
    }
    (files, issues)
}

fn walk_dir(
    dir: &Path,
    suffix: &str,
    recursive: bool,
    files: &mut Vec<PathBuf>,
    issues: &mut Vec<ConversionIssue>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            issues.push(ConversionIssue::new(
                IssueKind::PathAccess,
                dir,
                format!("can't access {}: {e}", dir.display()),
            ));
            return;
        }
    };
    let mut entries: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            if recursive {
                walk_dir(&entry, suffix, recursive, files, issues);
            }
        } else if entry
            .file_name()
            .is_some_and(|n| n.to_string_lossy().ends_with(suffix))
        {
            files.push(entry);
        }
    }
}

/// One-shot conversion with the process loader and no cache.
pub async fn convert(config: ConvertConfig, paths: &[PathBuf]) -> ConvertResult<BatchResult> {
    let orchestrator = BatchOrchestrator::with_process_loader(config)?;
    Ok(orchestrator.run(paths, None, &[]).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn discover_filters_by_suffix_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b@x/hog_contest.py"));
        touch(&root.join("a@x/hog_contest.py"));
        touch(&root.join("a@x/notes.txt"));
        touch(&root.join("deep/c@x/hog_contest.py"));

        let (files, issues) = discover(&[root.to_path_buf()], "hog_contest.py", true);
        assert!(issues.is_empty());
        let rel: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            rel,
            vec![
                PathBuf::from("a@x/hog_contest.py"),
                PathBuf::from("b@x/hog_contest.py"),
                PathBuf::from("deep/c@x/hog_contest.py"),
            ]
        );
    }

    #[test]
    fn discover_without_recursion_stays_flat() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("top_hog_contest.py"));
        touch(&dir.path().join("sub/hog_contest.py"));
        let (files, _) = discover(&[dir.path().to_path_buf()], "hog_contest.py", false);
        assert_eq!(files, vec![dir.path().join("top_hog_contest.py")]);
    }

    #[test]
    fn explicit_files_ignore_suffix_and_missing_paths_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("strategy.py");
        touch(&file);
        let missing = dir.path().join("missing");
        let (files, issues) = discover(&[file.clone(), missing.clone()], "hog_contest.py", true);
        assert_eq!(files, vec![file]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::PathAccess);
        assert_eq!(issues[0].path, missing);
    }
}
