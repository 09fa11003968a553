use super::load_config;
use crate::cli::args::ConfigArgs;
use crate::exit_codes::{EXIT_CONFIG_ERROR, EXIT_SUCCESS};
use anyhow::{Context, Result};
use hogconv_core::fingerprint::config_fingerprint;

pub fn run(args: ConfigArgs) -> Result<i32> {
    let cfg = match load_config(&args.overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Config error: {e:#}");
            return Ok(EXIT_CONFIG_ERROR);
        }
    };
    let yaml = serde_yaml::to_string(&cfg).context("failed to render config")?;
    print!("{yaml}");
    println!("# fingerprint: {}", config_fingerprint(&cfg));
    Ok(EXIT_SUCCESS)
}
