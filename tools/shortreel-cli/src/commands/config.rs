//! Show or write the effective configuration.

use std::process::ExitCode;

use shortreel_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, write: bool) -> anyhow::Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if write {
        config.save()?;
        eprintln!("Wrote {}", config_file_path().display());
    }

    Ok(ExitCode::SUCCESS)
}
