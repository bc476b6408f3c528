//! Signal handling for riegor.
//!
//! SIGINT/SIGTERM/SIGHUP request shutdown, SIGUSR2 requests a config
//! reload. Signals are translated into [`SignalMessage`]s on an mpsc
//! channel the main loop sleeps on, so a signal interrupts the poll sleep
//! immediately instead of waiting out the tick. The config watcher and the
//! periodic reload check feed the same channel.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR2},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

/// Messages that wake the main loop between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMessage {
    /// Re-read the config now (SIGUSR2, file watcher).
    Reload,
    /// Stop the daemon (SIGINT, SIGTERM, SIGHUP).
    Shutdown,
}

/// Signal handling state shared between threads.
pub struct SignalState {
    /// Cleared when the daemon should stop.
    pub running: Arc<AtomicBool>,
    /// Receiver the main loop sleeps on.
    pub signal_receiver: std::sync::mpsc::Receiver<SignalMessage>,
    /// Sender handed to the watcher and kept for the signal thread.
    pub signal_sender: std::sync::mpsc::Sender<SignalMessage>,
}

/// Install the signal handler thread and return the shared state.
pub fn setup_signal_handler() -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (signal_sender, signal_receiver) = std::sync::mpsc::channel();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR2])
        .context("Failed to install signal handlers")?;

    let thread_running = Arc::clone(&running);
    let thread_sender = signal_sender.clone();
    thread::spawn(move || {
        for signal in signals.forever() {
            match signal {
                SIGUSR2 => {
                    if thread_sender.send(SignalMessage::Reload).is_err() {
                        break;
                    }
                }
                SIGINT | SIGTERM | SIGHUP => {
                    thread_running.store(false, Ordering::SeqCst);
                    let _ = thread_sender.send(SignalMessage::Shutdown);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(SignalState {
        running,
        signal_receiver,
        signal_sender,
    })
}
