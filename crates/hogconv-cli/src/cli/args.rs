use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "hogconv",
    version,
    about = "Convert untrusted Hog strategy submissions into validated strategy matrices"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Convert submissions and update a session directory
    Convert(ConvertArgs),
    /// Print the effective configuration and its fingerprint
    Config(ConfigArgs),
}

/// Settings shared by every command that needs a [`hogconv_core::ConvertConfig`].
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// YAML config file (defaults apply when omitted)
    #[arg(long, env = "HOGCONV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Per-submission time budget in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// File name suffix identifying submissions inside directories
    #[arg(long)]
    pub suffix: Option<String>,

    /// Only look at the top level of each directory
    #[arg(long)]
    pub no_recursive: bool,

    /// Program that runs a submission (replaces runner.program)
    #[arg(long, env = "HOGCONV_RUNNER")]
    pub runner: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Submission files or directories
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Session directory holding config.json (cache) and strategies.json
    #[arg(long)]
    pub session: PathBuf,

    /// Also write every matrix in the legacy `.strat` text format here
    #[arg(long)]
    pub export_legacy: Option<PathBuf>,

    /// Also regenerate a Python submission for every matrix here
    #[arg(long)]
    pub export_python: Option<PathBuf>,

    /// Ignore the previous cache record and convert everything
    #[arg(long)]
    pub no_cache: bool,

    /// Print summary and issues as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}
