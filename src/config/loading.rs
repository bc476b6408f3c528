//! Configuration loading.
//!
//! Handles locating `riegor.json`, parsing the raw document, and producing
//! a validated [`Config`]. Two entry points with different failure
//! contracts: [`load_or_default`] (startup) degrades to the safe-empty
//! config so the daemon always comes up, [`try_load`] (reload path) returns
//! the error so the caller can keep the previous config active.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use super::validation::{
    normalize_interval, normalize_policies, normalize_schedule, normalize_zones,
};
use super::{Backend, Config};
use crate::constants::*;

/// Global configuration directory override, set once at startup
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
/// This can only be called once, typically at startup.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// Get the configuration file path.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = CONFIG_DIR.get().and_then(|d| d.clone()) {
        return Ok(custom_dir.join(CONFIG_FILE));
    }

    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("riegor").join(CONFIG_FILE))
}

/// Raw schedule entry as written in the document. Lenient decoding happens
/// per entry so one malformed slot cannot take down its whole day.
#[derive(Debug, Deserialize)]
pub(crate) struct RawEntry {
    pub start: String,
    pub duration_min: i64,
    #[serde(default)]
    pub policy: Option<String>,
}

/// Raw policy as written in the document.
#[derive(Debug, Deserialize)]
pub(crate) struct RawPolicy {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub multipliers: Option<HashMap<String, f64>>,
}

/// Top-level document shape. The three main sections default to empty so a
/// settings-only file is valid; unknown top-level keys are ignored.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    zones: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    programed_times: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    policies: serde_json::Map<String, serde_json::Value>,

    #[serde(default)]
    poll_interval_s: Option<u64>,
    #[serde(default)]
    reload_interval_s: Option<u64>,
    #[serde(default)]
    weather_url: Option<String>,
    #[serde(default)]
    backend: Option<Backend>,
    #[serde(default)]
    active_low: Option<bool>,
    #[serde(default)]
    gpio_base: Option<String>,
}

/// Load the configuration, degrading to the safe-empty default on any
/// failure. This is the startup path: the daemon always comes up, even
/// with a corrupt document, and does nothing until the file is fixed.
///
/// Creates a starter config file if none exists yet.
pub fn load_or_default() -> Config {
    match get_config_path() {
        Ok(path) => {
            if !path.exists()
                && let Err(e) = create_default_config(&path)
            {
                log_warning!("Could not create starter config: {e}");
            }
            match try_load() {
                Ok(config) => config,
                Err(e) => {
                    log_pipe!();
                    log_error!("Configuration unusable: {e:#}");
                    log_indented!("Running with an empty schedule until the file is fixed");
                    Config::default()
                }
            }
        }
        Err(e) => {
            log_pipe!();
            log_error!("Could not locate configuration: {e:#}");
            log_indented!("Running with an empty schedule");
            Config::default()
        }
    }
}

/// Load and validate the configuration, propagating read/parse failures.
/// Used by the reload path, where a failure means "keep the previous
/// config", never "swap to empty".
pub fn try_load() -> Result<Config> {
    let path = get_config_path()?;
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let raw: RawConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    Ok(normalize(raw))
}

/// Turn the raw document into a validated [`Config`]. Per-entry problems
/// are dropped with warnings here; this function itself cannot fail.
fn normalize(raw: RawConfig) -> Config {
    let zones = normalize_zones(&raw.zones);
    let schedule = normalize_schedule(&raw.programed_times);
    let policies = normalize_policies(&raw.policies);

    let poll_interval = normalize_interval(
        "poll_interval_s",
        raw.poll_interval_s.unwrap_or(DEFAULT_POLL_INTERVAL),
        MINIMUM_POLL_INTERVAL,
        MAXIMUM_POLL_INTERVAL,
        DEFAULT_POLL_INTERVAL,
    );
    let reload_interval = normalize_interval(
        "reload_interval_s",
        raw.reload_interval_s.unwrap_or(DEFAULT_RELOAD_INTERVAL),
        MINIMUM_RELOAD_INTERVAL,
        MAXIMUM_RELOAD_INTERVAL,
        DEFAULT_RELOAD_INTERVAL,
    );

    Config {
        zones,
        schedule,
        policies,
        poll_interval,
        reload_interval,
        weather_url: raw.weather_url,
        backend: raw.backend.unwrap_or(DEFAULT_BACKEND),
        active_low: raw.active_low.unwrap_or(DEFAULT_ACTIVE_LOW),
        gpio_base: raw
            .gpio_base
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_GPIO_BASE)),
    }
}

/// Write a starter configuration with no zones and no schedule, so the
/// operator has a file to fill in rather than a path to guess.
pub fn create_default_config(path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }

    let starter = serde_json::json!({
        "zones": {},
        "programed_times": {},
        "policies": {},
        "poll_interval_s": DEFAULT_POLL_INTERVAL,
        "reload_interval_s": DEFAULT_RELOAD_INTERVAL,
        "backend": "gpio",
        "active_low": DEFAULT_ACTIVE_LOW
    });

    let content = serde_json::to_string_pretty(&starter).context("Failed to render starter config")?;
    fs::write(path, content + "\n")
        .with_context(|| format!("Failed to write starter config to {}", path.display()))?;

    log_block_start!("Created starter config at {}", path.display());
    log_indented!("Add zones and programed_times, the daemon picks changes up live");
    Ok(())
}
