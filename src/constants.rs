//! Default values and validation bounds used across riegor.

/// Config file name inside the config directory.
pub const CONFIG_FILE: &str = "riegor.json";

/// Default poll interval for the scheduling loop, in seconds.
pub const DEFAULT_POLL_INTERVAL: u64 = 1;
/// Bounds for `poll_interval_s`.
pub const MINIMUM_POLL_INTERVAL: u64 = 1;
pub const MAXIMUM_POLL_INTERVAL: u64 = 60;

/// Default interval between periodic config reload checks, in seconds.
pub const DEFAULT_RELOAD_INTERVAL: u64 = 30;
/// Bounds for `reload_interval_s`.
pub const MINIMUM_RELOAD_INTERVAL: u64 = 5;
pub const MAXIMUM_RELOAD_INTERVAL: u64 = 3600;

/// Default relay backend when the config does not name one.
pub const DEFAULT_BACKEND: crate::config::Backend = crate::config::Backend::Gpio;

/// Relays in the reference wiring are driven with inverted pin logic:
/// writing 0 energizes the valve. `active_low` defaults accordingly.
pub const DEFAULT_ACTIVE_LOW: bool = true;

/// Default sysfs GPIO mount point.
pub const DEFAULT_GPIO_BASE: &str = "/sys/class/gpio";

/// Minutes per day; `start_minute` is always below this.
pub const MINUTES_PER_DAY: u16 = 1440;

/// Exit code for fatal startup errors.
pub const EXIT_FAILURE: i32 = 1;
