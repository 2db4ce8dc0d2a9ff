//! File logging setup, gated by the logging section of the config.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::LevelFilter;

/// Initialize file logging. A disabled config leaves the `log` macros as
/// no-ops.
pub fn init(enabled: bool) -> Result<()> {
    if !enabled {
        return Ok(());
    }

    let path = log_file_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Debug)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn)
        .chain(fern::log_file(&path).with_context(|| format!("Failed to open log file: {}", path.display()))?)
        .apply()
        .context("Logger already initialized")?;
    Ok(())
}

fn log_file_path() -> Result<PathBuf> {
    dirs::data_dir()
        .context("Could not determine data directory")
        .map(|dir| dir.join("dayplan").join("dayplan.log"))
}
