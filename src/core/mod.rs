//! Core scheduling loop and state management.
//!
//! `Core` owns the active configuration snapshot, the event scheduler, the
//! actuator registry and the program runner, and drives them from a single
//! polling thread. One tick:
//!
//! 1. Drain and log run events reported by the runner thread.
//! 2. Evaluate the schedule; dispatch a resolved plan for every entry that
//!    became due (dispatching only enqueues, so a long watering cycle never
//!    delays detection of the next slot).
//! 3. Periodically re-read the config and swap it in if its content
//!    changed.
//! 4. Report the next-event countdown when it changed.
//! 5. Sleep the poll interval, signal-aware: SIGUSR2 or a file-watcher
//!    nudge interrupts the sleep and reloads immediately.
//!
//! The trigger-key set and the active snapshot are only touched from this
//! thread, so a reload swaps schedule, zones, actuator and scheduler state
//! as one step with nothing observing a half-swapped state.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use crate::{
    actuator::ZoneActuator,
    config::{self, Config},
    plan,
    runner::{ProgramRunner, RunEvent, RunJob},
    scheduler::{DueEvent, EventScheduler, NextEvent},
    signals::{SignalMessage, SignalState},
    weather::WeatherClient,
};

/// Parameters for creating a Core instance.
pub(crate) struct CoreParams {
    pub config: Config,
    pub signal_state: SignalState,
    pub debug_enabled: bool,
    /// Force the no-op relay backend regardless of config (simulation).
    pub force_noop: bool,
}

/// State machine for the main scheduling loop.
pub(crate) struct Core {
    config: Config,
    scheduler: EventScheduler,
    actuator: Arc<ZoneActuator>,
    runner: ProgramRunner,
    run_events: Receiver<RunEvent>,
    signal_state: SignalState,
    debug_enabled: bool,
    force_noop: bool,
    /// Cleared whenever the upcoming-event situation changed (firing, new
    /// day, reload), so the countdown is logged again exactly once.
    next_event_reported: bool,
}

impl Core {
    pub fn new(params: CoreParams) -> Self {
        let mut config = params.config;
        if params.force_noop {
            config.backend = crate::config::Backend::Noop;
        }

        let actuator = Arc::new(ZoneActuator::from_config(&config));
        let (event_sender, run_events) = std::sync::mpsc::channel();
        let runner = ProgramRunner::spawn(event_sender);

        Self {
            config,
            scheduler: EventScheduler::new(),
            actuator,
            runner,
            run_events,
            signal_state: params.signal_state,
            debug_enabled: params.debug_enabled,
            force_noop: params.force_noop,
            next_event_reported: false,
        }
    }

    /// Run the scheduling loop until shutdown (or simulation end).
    pub fn execute(mut self) -> anyhow::Result<()> {
        log_block_start!("Relay backend: {}", self.actuator.backend_name());
        self.main_loop();

        log_block_start!("Shutting down riegor...");
        // Safety sweep: whatever state a watering cycle was in, leave the
        // field with every valve closed.
        self.actuator.all_off();
        log_decorated!("All zones driven off");

        Ok(())
    }

    fn main_loop(&mut self) {
        let mut ticks_since_reload: u32 = 0;

        while self.signal_state.running.load(Ordering::SeqCst)
            && !crate::time_source::simulation_ended()
        {
            self.drain_run_events();

            let now = crate::time_source::now();
            let outcome = self.scheduler.tick(&self.config.schedule, now);

            if outcome.new_day {
                log_block_start!("New day: {}", now.format("%A %Y-%m-%d"));
                self.next_event_reported = false;
            }

            for due in outcome.due {
                self.dispatch(due);
            }

            // Periodic reload check, spaced in ticks so a reconfigured
            // poll interval rescales it naturally.
            ticks_since_reload += 1;
            if self.config.poll_interval * ticks_since_reload >= self.config.reload_interval {
                ticks_since_reload = 0;
                self.check_reload();
            }

            self.report_next_event(now);

            match self.sleep_one_tick() {
                Ok(SignalMessage::Reload) => {
                    log_block_start!("Reload requested");
                    self.check_reload();
                    ticks_since_reload = 0;
                }
                Ok(SignalMessage::Shutdown) => break,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if self.signal_state.running.load(Ordering::SeqCst) {
                        log_pipe!();
                        log_error!("Signal handler disconnected unexpectedly");
                        log_indented!("Continuing without signal support");
                    } else {
                        break;
                    }
                }
            }
        }
    }

    /// Sleep one poll interval, waking early for a signal message. Under
    /// simulated time the simulated clock has to advance through
    /// `time_source::sleep`, so the sleep runs on a helper thread while
    /// this thread keeps polling for signals.
    fn sleep_one_tick(&self) -> Result<SignalMessage, RecvTimeoutError> {
        let interval = self.config.poll_interval;

        if crate::time_source::is_simulated() {
            let sleep_handle = std::thread::spawn(move || {
                crate::time_source::sleep(interval);
            });
            loop {
                match self
                    .signal_state
                    .signal_receiver
                    .recv_timeout(Duration::from_millis(1))
                {
                    Ok(msg) => return Ok(msg),
                    Err(RecvTimeoutError::Timeout) => {
                        if sleep_handle.is_finished() {
                            return Err(RecvTimeoutError::Timeout);
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
        } else {
            self.signal_state.signal_receiver.recv_timeout(interval)
        }
    }

    /// Resolve a due entry into a plan and hand it to the runner.
    fn dispatch(&mut self, due: DueEvent) {
        let label = format!(
            "{} {}",
            config::validation::weekday_name(due.weekday),
            due.entry.start_display()
        );

        let policy = match &due.entry.policy {
            None => std::borrow::Cow::Owned(crate::config::Policy::default()),
            Some(name) => match self.config.policies.get(name) {
                Some(policy) => std::borrow::Cow::Borrowed(policy),
                None => {
                    log_warning!(
                        "Entry {} names unknown policy '{}', using uniform",
                        label,
                        name
                    );
                    std::borrow::Cow::Owned(crate::config::Policy::default())
                }
            },
        };

        let resolved = plan::resolve(&policy, &self.config.zones, due.entry.duration);
        if resolved.is_empty() {
            log_block_start!("Program due: {}, but no zones to water, skipping", label);
            return;
        }

        log_block_start!(
            "Program due: {} ({} zones, {} min base)",
            label,
            resolved.len(),
            due.entry.duration.as_secs() / 60
        );

        let dispatched = self.runner.dispatch(RunJob {
            label: label.clone(),
            plan: resolved,
            actuator: Arc::clone(&self.actuator),
            weather: WeatherClient::new(self.config.weather_url.clone()),
        });
        if !dispatched {
            log_pipe!();
            log_critical!("Runner thread is gone, could not start program {}", label);
        }

        // A firing changes what "next" means; report it again.
        self.next_event_reported = false;
    }

    /// Log progress and failures reported by the runner thread.
    fn drain_run_events(&mut self) {
        while let Ok(event) = self.run_events.try_recv() {
            match event {
                RunEvent::Started {
                    label,
                    multiplier,
                    zones,
                } => {
                    if zones == 0 {
                        log_block_start!(
                            "Watering {}: nothing to do (weather multiplier {})",
                            label,
                            multiplier
                        );
                    } else {
                        log_block_start!(
                            "Watering {}: {} zones, weather multiplier {}",
                            label,
                            zones,
                            multiplier
                        );
                    }
                }
                RunEvent::ZoneFailed { label, zone, error } => {
                    log_pipe!();
                    log_error!("Zone '{}' failed during {}: {}", zone, label, error);
                    log_indented!("Continuing with the remaining zones");
                }
                RunEvent::Finished {
                    label,
                    watered,
                    failed,
                } => {
                    if failed == 0 {
                        log_decorated!("Watering {} finished: {} zones", label, watered);
                    } else {
                        log_decorated!(
                            "Watering {} finished: {} zones ok, {} failed",
                            label,
                            watered,
                            failed
                        );
                    }
                }
            }
        }
    }

    /// Log the countdown to the next slot, once per change of situation.
    fn report_next_event(&mut self, now: chrono::DateTime<chrono::Local>) {
        if self.next_event_reported {
            return;
        }
        self.next_event_reported = true;

        match self.scheduler.next_event(&self.config.schedule, now) {
            Some(NextEvent {
                seconds_until,
                weekday,
                entry,
            }) => {
                log_block_start!(
                    "Next watering: {} {} in {}",
                    config::validation::weekday_name(weekday),
                    entry.start_display(),
                    format_countdown(seconds_until)
                );
            }
            None => {
                log_block_start!("No watering programmed");
            }
        }
    }

    /// Re-read the config document and swap it in if its content changed.
    /// Any failure keeps the previous config active.
    fn check_reload(&mut self) {
        match config::try_load() {
            Ok(mut new_config) => {
                if self.force_noop {
                    new_config.backend = crate::config::Backend::Noop;
                }
                if new_config == self.config {
                    if self.debug_enabled {
                        log_pipe!();
                        log_debug!("Config unchanged");
                    }
                    return;
                }
                self.apply_config(new_config);
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Config reload failed: {e:#}");
                log_indented!("Keeping previous configuration active");
            }
        }
    }

    /// Swap in a new snapshot: config, actuator handles and scheduler
    /// state change together. In-flight runs keep the snapshot captured at
    /// dispatch; only future trigger evaluation sees the new one.
    fn apply_config(&mut self, new_config: Config) {
        self.config = new_config;
        self.actuator = Arc::new(ZoneActuator::from_config(&self.config));
        self.scheduler.reset();
        self.next_event_reported = false;

        log_pipe!();
        log_info!("Configuration reloaded");
        self.config.log_config();
    }
}

/// Render a countdown as `"Xh Ym Zs"`, dropping empty leading units.
fn format_countdown(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_formatting() {
        assert_eq!(format_countdown(45), "45s");
        assert_eq!(format_countdown(75 * 60 - 30), "1h 14m 30s");
        assert_eq!(format_countdown(130), "2m 10s");
    }
}
