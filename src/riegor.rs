//! Application coordinator managing the complete lifecycle of riegor.
//!
//! Handles resource acquisition and orchestration around the core loop:
//! configuration loading, single-instance lock, signal handler setup and
//! the config file watcher. The `Riegor` builder supports the different
//! startup contexts:
//! - Normal daemon: `Riegor::new(debug_enabled).run()`
//! - Simulation: `Riegor::new(debug).without_lock().with_noop_backend().run()`

use anyhow::Result;

use crate::{
    config,
    constants::EXIT_FAILURE,
    core::{Core, CoreParams},
    lock,
    signals::setup_signal_handler,
};

/// Builder for configuring and running the riegor daemon.
pub struct Riegor {
    debug_enabled: bool,
    create_lock: bool,
    show_headers: bool,
    force_noop: bool,
}

impl Riegor {
    /// Create a runner with defaults matching a normal daemon start.
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            create_lock: true,
            show_headers: true,
            force_noop: false,
        }
    }

    /// Skip single-instance lock creation (simulation mode).
    pub fn without_lock(mut self) -> Self {
        self.create_lock = false;
        self
    }

    /// Skip the version header (embedding, tests).
    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }

    /// Force the no-op relay backend regardless of config (dry runs).
    pub fn with_noop_backend(mut self) -> Self {
        self.force_noop = true;
        self
    }

    /// Execute the daemon with the configured settings: load config, take
    /// the lock, install signal handling and the file watcher, then hand
    /// over to the core loop. Returns after graceful shutdown.
    pub fn run(self) -> Result<()> {
        if self.show_headers {
            log_version!();
        }

        // A broken config must not keep the controller down; load degrades
        // to the empty schedule and the watcher picks up the fixed file.
        let config = config::load_or_default();

        let _lock = if self.create_lock {
            match lock::acquire()? {
                Some(lock) => Some(lock),
                None => {
                    log_error_exit!(
                        "Another riegor instance is already running (lock at {})",
                        lock::lock_path().display()
                    );
                    std::process::exit(EXIT_FAILURE);
                }
            }
        } else {
            None
        };

        let signal_state = setup_signal_handler()?;

        // Hot reload is best effort: without a watcher the periodic check
        // and SIGUSR2 still work.
        if let Err(e) = config::start_config_watcher(signal_state.signal_sender.clone()) {
            log_pipe!();
            log_warning!("Config file watching unavailable: {e:#}");
            log_indented!("Relying on periodic reload checks and SIGUSR2");
        }

        config.log_config();

        let core = Core::new(CoreParams {
            config,
            signal_state,
            debug_enabled: self.debug_enabled,
            force_noop: self.force_noop,
        });
        let result = core.execute();

        log_end!();
        result
    }
}
