use crate::session::DEFAULT_REFRESH_INTERVAL;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MIN_REFRESH_SECS: u64 = 10;

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub base_dir: Option<String>,
    pub refresh_interval_secs: Option<u64>,
    pub exit_on_open: Option<bool>,
    pub limit: Option<u32>,
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gh-rr")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

pub fn load_config() -> Config {
    load_config_from(&config_path())
}

fn load_config_from(path: &Path) -> Config {
    if !path.exists() {
        return Config::default();
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()));
    match parsed {
        Ok(config) => config,
        Err(err) => {
            log::warn!("ignoring {}: {}", path.display(), err);
            Config::default()
        }
    }
}

/// Expand a leading `~` against `home`.
pub fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path.strip_prefix('~'), home) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(path),
    }
}

/// Pick the clone base directory: CLI flag, then `BASE_DIR`, then the config
/// file, then `~/workspace`.
pub fn resolve_base_dir(
    cli: Option<&str>,
    env: Option<&str>,
    config: &Config,
    home: Option<&Path>,
) -> PathBuf {
    let chosen = [cli, env, config.base_dir.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty());

    match chosen {
        Some(value) => expand_home(value, home),
        None => home
            .map(|h| h.join("workspace"))
            .unwrap_or_else(|| PathBuf::from("workspace")),
    }
}

pub fn refresh_interval(cli_secs: Option<u64>, config: &Config) -> Duration {
    cli_secs
        .or(config.refresh_interval_secs)
        .map(|secs| Duration::from_secs(secs.max(MIN_REFRESH_SECS)))
        .unwrap_or(DEFAULT_REFRESH_INTERVAL)
}
