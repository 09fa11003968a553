use crate::error::{ConvertError, ConvertResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Conversion settings. Every field has a default, so a config file only needs to name
/// what it overrides.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    /// Side of the square input grid (the goal score).
    pub goal: u32,

    pub min_rolls: i64,
    pub max_rolls: i64,

    /// Roll count substituted for any cell whose evaluation failed.
    pub default_roll: i64,

    /// Wall-clock budget for loading and evaluating one submission.
    pub timeout_secs: u64,

    /// Files found while walking a directory must end with this.
    pub source_suffix: String,

    /// Descend into subdirectories while walking.
    pub recursive: bool,

    /// Name of the submission function evaluated on every cell.
    pub entry_point: String,

    /// Fields that may carry a display name, highest priority first.
    pub name_fields: Vec<String>,

    /// Longest display name kept verbatim. 0 disables the limit.
    pub max_name_len: usize,

    /// Name used when a submission gives none. `{}` receives a short id prefix.
    pub empty_name_template: String,

    pub runner: RunnerConfig,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            goal: 100,
            min_rolls: 0,
            max_rolls: 10,
            default_roll: 5,
            timeout_secs: 45,
            source_suffix: "hog_contest.py".to_string(),
            recursive: true,
            entry_point: "final_strategy".to_string(),
            name_fields: vec!["PLAYER_NAME".to_string(), "TEAM_NAME".to_string()],
            max_name_len: 100,
            empty_name_template: "no name given - id starts with {}".to_string(),
            runner: RunnerConfig::default(),
        }
    }
}

/// How a submission process is launched.
///
/// `args` may contain the placeholders `{submission}` (path of the submission file) and
/// `{harness}` (path of the bundled loader script).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    pub program: String,
    pub args: Vec<String>,

    /// Variables copied from the parent environment. Everything else is cleared.
    pub env_passthrough: Vec<String>,

    /// Cap on captured stderr used in load error messages.
    pub max_stderr_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec![
                "-I".to_string(),
                "{harness}".to_string(),
                "{submission}".to_string(),
            ],
            env_passthrough: vec!["PATH".to_string()],
            max_stderr_bytes: 4096,
        }
    }
}

impl RunnerConfig {
    pub fn uses_harness(&self) -> bool {
        self.args.iter().any(|a| a.contains("{harness}"))
    }
}

impl ConvertConfig {
    /// Load a YAML config file and validate it.
    pub fn from_path(path: &Path) -> ConvertResult<Self> {
        let raw =
            std::fs::read_to_string(path).map_err(|e| ConvertError::path_access(path, e))?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> ConvertResult<Self> {
        let cfg: Self = serde_yaml::from_str(raw)
            .map_err(|e| ConvertError::config(format!("invalid config YAML: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> ConvertResult<()> {
        if self.goal == 0 {
            return Err(ConvertError::config("goal must be > 0"));
        }
        if self.min_rolls > self.max_rolls {
            return Err(ConvertError::config(format!(
                "min_rolls ({}) exceeds max_rolls ({})",
                self.min_rolls, self.max_rolls
            )));
        }
        // Cells are stored as i8.
        if self.min_rolls < i64::from(i8::MIN) || self.max_rolls > i64::from(i8::MAX) {
            return Err(ConvertError::config(format!(
                "roll range [{}, {}] does not fit in a cell",
                self.min_rolls, self.max_rolls
            )));
        }
        if !(self.min_rolls..=self.max_rolls).contains(&self.default_roll) {
            return Err(ConvertError::config(format!(
                "default_roll {} outside [{}, {}]",
                self.default_roll, self.min_rolls, self.max_rolls
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConvertError::config("timeout_secs must be > 0"));
        }
        if self.entry_point.trim().is_empty() {
            return Err(ConvertError::config("entry_point cannot be empty"));
        }
        if self.max_name_len != 0 && self.max_name_len < 4 {
            return Err(ConvertError::config(
                "max_name_len must be 0 (unlimited) or at least 4",
            ));
        }
        if self.runner.program.trim().is_empty() {
            return Err(ConvertError::config("runner.program cannot be empty"));
        }
        if !self.runner.args.iter().any(|a| a.contains("{submission}")) {
            return Err(ConvertError::config(
                "runner.args must reference {submission}",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ConvertConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.goal, 100);
        assert_eq!(cfg.timeout(), Duration::from_secs(45));
        assert!(cfg.runner.uses_harness());
    }

    #[test]
    fn yaml_overrides_only_named_fields() {
        let cfg = ConvertConfig::from_yaml(
            "goal: 8\ntimeout_secs: 2\nrunner:\n  program: sh\n  args: ['{submission}']\n",
        )
        .unwrap();
        assert_eq!(cfg.goal, 8);
        assert_eq!(cfg.timeout_secs, 2);
        assert_eq!(cfg.runner.program, "sh");
        assert!(!cfg.runner.uses_harness());
        assert_eq!(cfg.max_rolls, 10);
        assert_eq!(cfg.runner.env_passthrough, vec!["PATH".to_string()]);
    }

    #[test]
    fn rejects_default_roll_out_of_range() {
        let err = ConvertConfig::from_yaml("default_roll: 11\n").unwrap_err();
        assert!(err.to_string().contains("default_roll 11"));
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(ConvertConfig::from_yaml("gaol: 3\n").is_err());
    }

    #[test]
    fn rejects_runner_without_submission_placeholder() {
        let err = ConvertConfig::from_yaml("runner:\n  args: ['x.py']\n").unwrap_err();
        assert!(err.to_string().contains("{submission}"));
    }
}
