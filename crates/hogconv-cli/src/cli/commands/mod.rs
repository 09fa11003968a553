pub mod config;
pub mod convert;

use super::args::{Cli, Command, ConfigOverrides};
use anyhow::{Context, Result};
use hogconv_core::ConvertConfig;

pub async fn dispatch(cli: Cli) -> Result<i32> {
    match cli.cmd {
        Command::Convert(args) => convert::run(args).await,
        Command::Config(args) => config::run(args),
    }
}

/// Config file (or defaults) with command-line overrides applied, validated.
pub fn load_config(overrides: &ConfigOverrides) -> Result<ConvertConfig> {
    let mut cfg = match &overrides.config {
        Some(path) => ConvertConfig::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ConvertConfig::default(),
    };
    if let Some(secs) = overrides.timeout {
        cfg.timeout_secs = secs;
    }
    if let Some(suffix) = &overrides.suffix {
        cfg.source_suffix = suffix.clone();
    }
    if overrides.no_recursive {
        cfg.recursive = false;
    }
    if let Some(program) = &overrides.runner {
        cfg.runner.program = program.clone();
    }
    cfg.validate().context("invalid configuration")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_on_top_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hogconv.yaml");
        std::fs::write(&path, "goal: 20\ntimeout_secs: 3\n").unwrap();

        let cfg = load_config(&ConfigOverrides {
            config: Some(path),
            timeout: Some(7),
            no_recursive: true,
            runner: Some("python3.12".into()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(cfg.goal, 20);
        assert_eq!(cfg.timeout_secs, 7);
        assert!(!cfg.recursive);
        assert_eq!(cfg.runner.program, "python3.12");
        assert_eq!(cfg.source_suffix, "hog_contest.py");
    }

    #[test]
    fn invalid_override_is_rejected() {
        let err = load_config(&ConfigOverrides {
            timeout: Some(0),
            ..Default::default()
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("invalid configuration"));
    }
}
