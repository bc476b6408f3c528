//! Configuration system for riegor with lenient validation and hot reload.
//!
//! The configuration is a single JSON document, `riegor.json`, polled and
//! watched for changes while the daemon runs:
//!
//! ```json
//! {
//!   "zones": { "zona1": 4, "zona2": 5, "zona3": 18 },
//!   "programed_times": {
//!     "lunes":  [ { "start": "20:00", "duration_min": 10 } ],
//!     "jueves": [ { "start": "20:00", "duration_min": 10, "policy": "verano" },
//!                 { "start": "21:15", "duration_min": 5 } ],
//!     "all":    [ { "start": "06:30", "duration_min": 3 } ]
//!   },
//!   "policies": {
//!     "verano": { "mode": "multipliers", "multipliers": { "zona2": 2.0 } }
//!   },
//!   "poll_interval_s": 1,
//!   "reload_interval_s": 30,
//!   "weather_url": "http://192.168.0.105:8000/api/weather-multiplier",
//!   "backend": "gpio",
//!   "active_low": true
//! }
//! ```
//!
//! Weekday keys are Spanish day names (accented or not) or the literal
//! `"all"` meaning every day of the week.
//!
//! ## Validation philosophy
//!
//! A controller left running in a shed must not die because someone typoed
//! one schedule entry over the upload endpoint. Validation therefore drops
//! the offending item with a warning and keeps the rest: an unknown weekday
//! drops that day's block, a bad `"HH:MM"` or non-positive duration drops
//! the entry, an unknown policy mode falls back to uniform. An unreadable
//! or unparseable document degrades to the empty config: a daemon that
//! waters nothing, but keeps running and keeps watching for a fixed file.

pub mod loading;
pub mod validation;
pub mod watcher;

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::*;

// Re-export public API
pub use loading::{
    create_default_config, get_config_path, load_or_default, set_config_dir, try_load,
};
pub use watcher::start_config_watcher;

/// Relay backend selection.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Drive valves through sysfs GPIO pins.
    Gpio,
    /// Log transitions without touching hardware (dry runs, simulation).
    Noop,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gpio => "gpio",
            Backend::Noop => "noop",
        }
    }
}

/// One slot of the weekly program: a start time, how long to water, and an
/// optional named policy expanding the base duration per zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Minutes since local midnight (0–1439).
    pub start_minute: u16,
    /// Base watering duration. Always positive after validation.
    pub duration: Duration,
    /// Name of the policy applied at trigger time, if any.
    pub policy: Option<String>,
}

impl ScheduleEntry {
    /// `"HH:MM"` rendering of the start slot, for logs.
    pub fn start_display(&self) -> String {
        format!("{:02}:{:02}", self.start_minute / 60, self.start_minute % 60)
    }
}

/// The weekly program: per-weekday entry lists, each sorted ascending by
/// start minute. Index 0 = lunes (Monday) through 6 = domingo (Sunday),
/// matching `chrono::Weekday::num_days_from_monday`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WeekSchedule {
    days: [Vec<ScheduleEntry>; 7],
}

impl WeekSchedule {
    /// Entries for one weekday, ordered by start minute.
    pub fn day(&self, weekday: usize) -> &[ScheduleEntry] {
        &self.days[weekday % 7]
    }

    pub(crate) fn day_mut(&mut self, weekday: usize) -> &mut Vec<ScheduleEntry> {
        &mut self.days[weekday % 7]
    }

    /// Total number of entries across the week.
    pub fn len(&self) -> usize {
        self.days.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.iter().all(Vec::is_empty)
    }
}

/// One irrigation zone: a human-chosen name mapped to the actuator id (pin
/// number) that drives its valve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub name: String,
    pub actuator_id: u32,
}

/// All configured zones, in config document order. Replaced wholesale on
/// reload; a running plan keeps the snapshot it was dispatched with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ZoneMap(Vec<Zone>);

impl ZoneMap {
    pub(crate) fn new(zones: Vec<Zone>) -> Self {
        Self(zones)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.0.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Zone> {
        self.0.iter().find(|z| z.name == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How a policy expands a base duration into per-zone durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    /// Every selected zone waters for the base duration.
    Uniform,
    /// Like uniform; the policy exists only to carry an `include` set.
    RestrictedSet,
    /// Per-zone factors scale the base duration (missing factor = 1.0).
    Multipliers,
}

/// A named duration policy. Pure data, looked up by schedule entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    pub mode: PolicyMode,
    /// Zones participating in the plan; `None` means all configured zones.
    pub include: Option<Vec<String>>,
    /// Per-zone scale factors for [`PolicyMode::Multipliers`].
    pub multipliers: HashMap<String, f64>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            mode: PolicyMode::Uniform,
            include: None,
            multipliers: HashMap::new(),
        }
    }
}

/// The active configuration: the validated weekly program plus daemon
/// tuning. Compared by content on reload to decide whether to swap.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub zones: ZoneMap,
    pub schedule: WeekSchedule,
    pub policies: HashMap<String, Policy>,

    /// Scheduling loop tick interval.
    pub poll_interval: Duration,
    /// Interval between periodic reload checks.
    pub reload_interval: Duration,
    /// Weather multiplier endpoint; `None` pins the multiplier at 1.0.
    pub weather_url: Option<String>,
    pub backend: Backend,
    /// Whether relays energize on logic low.
    pub active_low: bool,
    /// sysfs GPIO mount point.
    pub gpio_base: PathBuf,
}

impl Default for Config {
    /// The safe-empty configuration: no zones, no schedule, no policies.
    /// Used when the document is unreadable, so the daemon degrades to doing
    /// nothing rather than exiting with valves in an unknown state.
    fn default() -> Self {
        Self {
            zones: ZoneMap::default(),
            schedule: WeekSchedule::default(),
            policies: HashMap::new(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL),
            reload_interval: Duration::from_secs(DEFAULT_RELOAD_INTERVAL),
            weather_url: None,
            backend: DEFAULT_BACKEND,
            active_low: DEFAULT_ACTIVE_LOW,
            gpio_base: PathBuf::from(DEFAULT_GPIO_BASE),
        }
    }
}

impl Config {
    /// Log the loaded configuration in the standard block format.
    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        log_indented!("Backend: {}", self.backend.as_str());

        if self.zones.is_empty() {
            log_indented!("Zones: none configured");
        } else {
            let names: Vec<&str> = self.zones.iter().map(|z| z.name.as_str()).collect();
            log_indented!("Zones: {}", names.join(", "));
        }

        if self.schedule.is_empty() {
            log_indented!("Schedule: empty (nothing will water)");
        } else {
            log_indented!("Schedule: {} entries", self.schedule.len());
            for weekday in 0..7 {
                let entries = self.schedule.day(weekday);
                if entries.is_empty() {
                    continue;
                }
                let slots: Vec<String> = entries
                    .iter()
                    .map(|e| {
                        let mins = e.duration.as_secs() / 60;
                        match &e.policy {
                            Some(p) => format!("{} ({} min, {})", e.start_display(), mins, p),
                            None => format!("{} ({} min)", e.start_display(), mins),
                        }
                    })
                    .collect();
                log_indented!("  {}: {}", validation::weekday_name(weekday), slots.join(", "));
            }
        }

        if !self.policies.is_empty() {
            let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
            names.sort_unstable();
            log_indented!("Policies: {}", names.join(", "));
        }

        log_indented!(
            "Poll every {}s, reload check every {}s",
            self.poll_interval.as_secs(),
            self.reload_interval.as_secs()
        );
        match &self.weather_url {
            Some(url) => log_indented!("Weather multiplier: {}", url),
            None => log_indented!("Weather multiplier: disabled (fixed 1.0)"),
        }
    }
}
