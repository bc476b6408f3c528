//! Zone actuation layer.
//!
//! [`ZoneActuator`] is the only component that mutates physical output
//! state. It owns one relay handle per configured actuator id, created at
//! construction and reused for the lifetime of the snapshot; handles are
//! never re-initialized mid-run, which would glitch the outputs. A config
//! reload builds a fresh `ZoneActuator`; plans already dispatched keep the
//! snapshot they were resolved against.
//!
//! The [`RelayBackend`] trait is the seam between scheduling logic and
//! hardware: sysfs GPIO in production, a no-op for dry runs, recording
//! fakes in tests. Backend failures are reported per call and handled by
//! the caller; one stuck valve driver must never abort a whole plan.

use anyhow::Result;
use std::sync::Mutex;

use crate::config::{Config, ZoneMap};

pub mod noop;
pub mod sysfs;

/// Trait for relay backends that can switch an actuator output.
pub trait RelayBackend: Send {
    /// Drive one actuator output on or off.
    fn set(&mut self, actuator_id: u32, on: bool) -> Result<()>;

    /// Human-readable backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Create the relay backend selected by the configuration.
pub fn create_backend(config: &Config) -> Box<dyn RelayBackend> {
    match config.backend {
        crate::config::Backend::Gpio => Box::new(sysfs::SysfsGpioBackend::new(
            &config.gpio_base,
            unique_actuator_ids(&config.zones),
            config.active_low,
        )),
        crate::config::Backend::Noop => Box::new(noop::NoopBackend::new()),
    }
}

fn unique_actuator_ids(zones: &ZoneMap) -> Vec<u32> {
    let mut ids: Vec<u32> = zones.iter().map(|z| z.actuator_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Registry of relay handles for one config snapshot.
pub struct ZoneActuator {
    backend: Mutex<Box<dyn RelayBackend>>,
    actuator_ids: Vec<u32>,
}

impl ZoneActuator {
    /// Build the registry from a config, creating the configured backend.
    pub fn from_config(config: &Config) -> Self {
        Self::new(unique_actuator_ids(&config.zones), create_backend(config))
    }

    /// Build the registry over an explicit backend (tests, simulation).
    pub fn new(actuator_ids: Vec<u32>, backend: Box<dyn RelayBackend>) -> Self {
        Self {
            backend: Mutex::new(backend),
            actuator_ids,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend.lock() {
            Ok(backend) => backend.backend_name(),
            Err(poisoned) => poisoned.into_inner().backend_name(),
        }
    }

    /// Turn one zone's valve on.
    pub fn zone_on(&self, actuator_id: u32) -> Result<()> {
        self.set(actuator_id, true)
    }

    /// Turn one zone's valve off.
    pub fn zone_off(&self, actuator_id: u32) -> Result<()> {
        self.set(actuator_id, false)
    }

    fn set(&self, actuator_id: u32, on: bool) -> Result<()> {
        let mut backend = match self.backend.lock() {
            Ok(backend) => backend,
            Err(poisoned) => poisoned.into_inner(),
        };
        backend.set(actuator_id, on)
    }

    /// Drive every known actuator off, best effort. Failures are logged
    /// per output and never propagated: this is the safety path and must
    /// attempt every valve regardless of earlier errors.
    pub fn all_off(&self) {
        for &id in &self.actuator_ids {
            if let Err(e) = self.set(id, false) {
                log_warning!("Failed to switch actuator {} off: {e:#}", id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRelay {
        off_calls: Arc<AtomicUsize>,
        fail_id: Option<u32>,
    }

    impl RelayBackend for CountingRelay {
        fn set(&mut self, actuator_id: u32, on: bool) -> Result<()> {
            if self.fail_id == Some(actuator_id) {
                anyhow::bail!("driver fault on {actuator_id}");
            }
            if !on {
                self.off_calls.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        fn backend_name(&self) -> &'static str {
            "counting"
        }
    }

    #[test]
    fn all_off_reaches_every_actuator_despite_failures() {
        let off_calls = Arc::new(AtomicUsize::new(0));
        let actuator = ZoneActuator::new(
            vec![4, 5, 18],
            Box::new(CountingRelay {
                off_calls: Arc::clone(&off_calls),
                fail_id: Some(5),
            }),
        );

        actuator.all_off();
        // 4 and 18 switched off even though 5 errored.
        assert_eq!(off_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn duplicate_actuator_ids_collapse_to_one_handle() {
        use crate::config::{Zone, ZoneMap};
        let zones = ZoneMap::new(vec![
            Zone {
                name: "front".into(),
                actuator_id: 4,
            },
            Zone {
                name: "front-alias".into(),
                actuator_id: 4,
            },
        ]);
        assert_eq!(unique_actuator_ids(&zones), vec![4]);
    }
}
