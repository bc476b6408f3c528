//! Time source abstraction supporting real and simulated time.
//!
//! The scheduling loop, the program runner and the logger all read the
//! clock through the global [`TimeSource`] instead of `Local::now()`, so a
//! whole week of watering can be dry-run in seconds with `riegor simulate`.
//! The simulated source supports linear acceleration (e.g. one simulated
//! minute per real second) and a fast-forward mode where sleeps advance the
//! clock instantly.

use chrono::{DateTime, Duration as ChronoDuration, Local};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Global time source instance, defaults to RealTimeSource
static TIME_SOURCE: OnceCell<Arc<dyn TimeSource>> = OnceCell::new();

/// Trait for abstracting time operations
pub trait TimeSource: Send + Sync {
    /// Get the current local time
    fn now(&self) -> DateTime<Local>;

    /// Sleep for the specified duration (or simulate it)
    fn sleep(&self, duration: StdDuration);

    /// Check if this is a simulated time source
    fn is_simulated(&self) -> bool;

    /// Check if simulation has ended (always false for real time)
    fn is_ended(&self) -> bool {
        false
    }
}

/// Real-time implementation that uses actual system time
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Simulated time source for dry runs and tests.
///
/// Time only advances through `sleep`: each simulated sleep adds its
/// duration to the clock and blocks for `duration / multiplier` of real
/// time. A multiplier of 0.0 selects fast-forward mode, where sleeps advance
/// the clock instantly. The clock is capped at `end_time`; once reached,
/// `is_ended` reports true and the main loop winds down.
pub struct SimulatedTimeSource {
    start_time: DateTime<Local>,
    end_time: DateTime<Local>,
    /// Acceleration factor (e.g. 60.0 = one simulated minute per real
    /// second). 0.0 means fast-forward.
    multiplier: f64,
    elapsed: std::sync::Mutex<ChronoDuration>,
}

impl SimulatedTimeSource {
    pub fn new(start_time: DateTime<Local>, end_time: DateTime<Local>, multiplier: f64) -> Self {
        Self {
            start_time,
            end_time,
            multiplier: if multiplier < 0.0 { 0.0 } else { multiplier },
            elapsed: std::sync::Mutex::new(ChronoDuration::zero()),
        }
    }

    fn current_time(&self) -> DateTime<Local> {
        let elapsed = match self.elapsed.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        let simulated = self.start_time + elapsed;
        simulated.min(self.end_time)
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> DateTime<Local> {
        self.current_time()
    }

    fn sleep(&self, duration: StdDuration) {
        {
            let mut elapsed = match self.elapsed.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *elapsed = *elapsed + ChronoDuration::milliseconds(duration.as_millis() as i64);
        }

        if self.multiplier == 0.0 {
            // Fast-forward: a token real sleep lets other threads run and
            // keeps log output ordered.
            std::thread::sleep(StdDuration::from_millis(1));
        } else {
            let real_secs = duration.as_secs_f64() / self.multiplier;
            if real_secs > 0.0 {
                std::thread::sleep(StdDuration::from_secs_f64(real_secs));
            }
        }
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn is_ended(&self) -> bool {
        self.current_time() >= self.end_time
    }
}

/// Initialize the global time source (call once at startup)
pub fn init_time_source(source: Arc<dyn TimeSource>) {
    TIME_SOURCE.set(source).ok();
}

/// Check if the time source has been initialized
pub fn is_initialized() -> bool {
    TIME_SOURCE.get().is_some()
}

/// Get the current time from the global time source
pub fn now() -> DateTime<Local> {
    TIME_SOURCE.get_or_init(|| Arc::new(RealTimeSource)).now()
}

/// Sleep for the specified duration using the global time source
pub fn sleep(duration: StdDuration) {
    TIME_SOURCE
        .get_or_init(|| Arc::new(RealTimeSource))
        .sleep(duration)
}

/// Check if we're running in simulation mode
pub fn is_simulated() -> bool {
    TIME_SOURCE
        .get_or_init(|| Arc::new(RealTimeSource))
        .is_simulated()
}

/// Check if simulation has reached its end time (always false for real time)
pub fn simulation_ended() -> bool {
    TIME_SOURCE
        .get_or_init(|| Arc::new(RealTimeSource))
        .is_ended()
}

/// Parse a datetime string in the format "YYYY-MM-DD HH:MM"
pub fn parse_datetime(s: &str) -> Result<DateTime<Local>, String> {
    use chrono::{NaiveDateTime, TimeZone};

    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .map(|naive| {
            Local
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| "Ambiguous or invalid local time".to_string())
        })
        .map_err(|e| format!("Invalid datetime format: {e}. Use YYYY-MM-DD HH:MM"))
        .and_then(|r| r)
}
