//! sysfs GPIO relay backend.
//!
//! Exports each configured pin under the sysfs GPIO base, sets it as an
//! output driven to the off level, and keeps the `value` file handle open
//! for the lifetime of the snapshot. With `active_low` (the default relay
//! wiring) the off level is logic high and energizing a valve writes 0.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::RelayBackend;

pub struct SysfsGpioBackend {
    base: PathBuf,
    active_low: bool,
    /// Open `value` file per exported pin, keyed by actuator id.
    handles: HashMap<u32, File>,
}

impl SysfsGpioBackend {
    /// Export `actuator_ids` and prepare their value handles. A pin that
    /// cannot be exported is logged and skipped; driving it later reports
    /// an actuation error instead of poisoning construction.
    pub fn new(base: &Path, actuator_ids: Vec<u32>, active_low: bool) -> Self {
        let mut backend = Self {
            base: base.to_path_buf(),
            active_low,
            handles: HashMap::with_capacity(actuator_ids.len()),
        };

        for id in actuator_ids {
            match backend.export_pin(id) {
                Ok(handle) => {
                    backend.handles.insert(id, handle);
                }
                Err(e) => {
                    log_warning!("GPIO {} unavailable: {e:#}", id);
                }
            }
        }

        // Start from a known-safe state: everything off.
        let ids: Vec<u32> = backend.handles.keys().copied().collect();
        for id in ids {
            if let Err(e) = backend.write_value(id, false) {
                log_warning!("Could not initialize GPIO {} to off: {e:#}", id);
            }
        }

        backend
    }

    fn export_pin(&self, id: u32) -> Result<File> {
        let pin_dir = self.base.join(format!("gpio{id}"));

        if !pin_dir.exists() {
            // Export is write-only and fails with EBUSY for pins already
            // exported by a previous run; the directory check above makes
            // that path unreachable, any other failure is real.
            std::fs::write(self.base.join("export"), id.to_string())
                .with_context(|| format!("Failed to export GPIO {id}"))?;
        }

        std::fs::write(pin_dir.join("direction"), "out")
            .with_context(|| format!("Failed to set GPIO {id} as output"))?;

        OpenOptions::new()
            .write(true)
            .open(pin_dir.join("value"))
            .with_context(|| format!("Failed to open GPIO {id} value"))
    }

    fn write_value(&mut self, id: u32, on: bool) -> Result<()> {
        let handle = self
            .handles
            .get_mut(&id)
            .with_context(|| format!("GPIO {id} has no exported handle"))?;

        let level = if on != self.active_low { b"1" } else { b"0" };
        handle.seek(SeekFrom::Start(0))?;
        handle.write_all(level)?;
        handle.flush()?;
        Ok(())
    }
}

impl RelayBackend for SysfsGpioBackend {
    fn set(&mut self, actuator_id: u32, on: bool) -> Result<()> {
        self.write_value(actuator_id, on)
    }

    fn backend_name(&self) -> &'static str {
        "gpio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Build a fake sysfs tree: base/export plus pre-created pin dirs,
    /// the way the kernel would leave them after export.
    fn fake_sysfs(ids: &[u32]) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("export"), "").unwrap();
        for id in ids {
            let pin = dir.path().join(format!("gpio{id}"));
            std::fs::create_dir(&pin).unwrap();
            std::fs::write(pin.join("direction"), "").unwrap();
            std::fs::write(pin.join("value"), "").unwrap();
        }
        dir
    }

    fn read_value(dir: &tempfile::TempDir, id: u32) -> String {
        std::fs::read_to_string(dir.path().join(format!("gpio{id}/value"))).unwrap()
    }

    #[test]
    fn active_low_inverts_levels() {
        let dir = fake_sysfs(&[4]);
        let mut backend = SysfsGpioBackend::new(dir.path(), vec![4], true);

        backend.set(4, true).unwrap();
        assert_eq!(read_value(&dir, 4), "0");
        backend.set(4, false).unwrap();
        assert_eq!(read_value(&dir, 4), "1");
    }

    #[test]
    fn active_high_is_direct() {
        let dir = fake_sysfs(&[7]);
        let mut backend = SysfsGpioBackend::new(dir.path(), vec![7], false);

        backend.set(7, true).unwrap();
        assert_eq!(read_value(&dir, 7), "1");
    }

    #[test]
    fn construction_drives_pins_off() {
        let dir = fake_sysfs(&[4]);
        let _backend = SysfsGpioBackend::new(dir.path(), vec![4], true);
        // Off under active-low wiring is logic high.
        assert_eq!(read_value(&dir, 4), "1");
    }

    #[test]
    fn missing_pin_reports_error_on_set_not_on_construction() {
        let dir = fake_sysfs(&[]);
        // Pin 9 cannot be exported (no kernel behind the fake tree).
        let mut backend = SysfsGpioBackend::new(dir.path(), vec![9], true);
        assert!(backend.set(9, true).is_err());
    }
}
