//! File-based logging using simplelog
//!
//! The TUI owns the terminal, so diagnostics (fetch failures, refresh timing)
//! go to a file under the cache directory, e.g. `~/.cache/gh-rr/` on Linux.

use anyhow::{Context, Result};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;
use std::path::{Path, PathBuf};

fn default_log_path() -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let filename = format!("gh-rr-{}.log", timestamp);

    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("gh-rr")
        .join(filename)
}

fn level_from_env() -> LevelFilter {
    std::env::var("RUST_LOG")
        .map(|v| match v.to_lowercase().as_str() {
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Info,
        })
        .unwrap_or(LevelFilter::Info)
}

/// Initialize file-based logging, returning the path being written.
pub fn init(path: Option<&Path>) -> Result<PathBuf> {
    let log_file = path.map(Path::to_path_buf).unwrap_or_else(default_log_path);
    if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_time_offset_to_local()
        .unwrap_or_else(|c| c)
        .build();

    let file = File::create(&log_file)
        .with_context(|| format!("Failed to create log file {}", log_file.display()))?;
    WriteLogger::init(level_from_env(), config, file).context("Failed to initialize logger")?;

    Ok(log_file)
}
