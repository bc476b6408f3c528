//! No-op relay backend.
//!
//! Logs every transition without touching hardware. Used by `riegor
//! simulate` and by dry-run configs (`"backend": "noop"`), so a weekly
//! program can be rehearsed on any machine.

use anyhow::Result;

use super::RelayBackend;

#[derive(Default)]
pub struct NoopBackend;

impl NoopBackend {
    pub fn new() -> Self {
        Self
    }
}

impl RelayBackend for NoopBackend {
    fn set(&mut self, actuator_id: u32, on: bool) -> Result<()> {
        log_indented!(
            "(noop) actuator {} -> {}",
            actuator_id,
            if on { "on" } else { "off" }
        );
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "noop"
    }
}
