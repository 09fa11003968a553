use super::load_config;
use crate::cli::args::ConvertArgs;
use crate::exit_codes::{EXIT_CONFIG_ERROR, EXIT_SKIPPED, EXIT_SUCCESS};
use anyhow::{Context, Result};
use hogconv_core::{
    render_issues, BatchOrchestrator, BatchResult, BatchSummary, ConversionIssue,
    JsonFileStore, StrategyMatrix,
};
use serde::Serialize;
use std::fs;
use std::path::Path;

const STORE_FILE: &str = "config.json";
const STRATEGIES_FILE: &str = "strategies.json";

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a BatchSummary,
    issues: &'a [ConversionIssue],
}

pub async fn run(args: ConvertArgs) -> Result<i32> {
    let cfg = match load_config(&args.overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Config error: {e:#}");
            return Ok(EXIT_CONFIG_ERROR);
        }
    };
    let entry_point = cfg.entry_point.clone();

    fs::create_dir_all(&args.session)
        .with_context(|| format!("failed to create session dir {}", args.session.display()))?;
    let mut store = JsonFileStore::open(args.session.join(STORE_FILE))
        .context("failed to open session store")?;
    let strategies_path = args.session.join(STRATEGIES_FILE);
    let prior = read_strategies(&strategies_path)?;

    let orchestrator = BatchOrchestrator::with_process_loader(cfg)
        .context("failed to prepare submission runner")?;
    tracing::debug!(fingerprint = orchestrator.fingerprint(), "config fingerprint");

    let result = if args.no_cache {
        let result = orchestrator.run(&args.paths, None, &prior).await;
        result.cache.save(&mut store).context("failed to save cache")?;
        result
    } else {
        orchestrator
            .sync(&args.paths, &mut store, &prior)
            .await
            .context("failed to save cache")?
    };

    let raw = serde_json::to_string_pretty(&result.matrices)?;
    fs::write(&strategies_path, raw)
        .with_context(|| format!("failed to write {}", strategies_path.display()))?;

    if let Some(dir) = &args.export_legacy {
        export(dir, &result, "strat", |m| m.to_legacy())?;
    }
    if let Some(dir) = &args.export_python {
        export(dir, &result, "py", |m| m.to_python_source(&entry_point))?;
    }

    if args.json {
        let report = JsonReport {
            summary: &result.summary,
            issues: &result.issues,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_issues(&result.issues));
        println!("{}", result.summary.line());
    }

    if result.summary.skipped > 0 {
        Ok(EXIT_SKIPPED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Matrices from the previous run; none if the session is new.
fn read_strategies(path: &Path) -> Result<Vec<StrategyMatrix>> {
    match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("invalid strategies file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn export(
    dir: &Path,
    result: &BatchResult,
    ext: &str,
    render: impl Fn(&StrategyMatrix) -> String,
) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    for matrix in &result.matrices {
        let path = dir.join(format!("{}.{ext}", matrix.id));
        fs::write(&path, render(matrix))
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}
