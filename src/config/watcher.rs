//! File watching for hot config reload.
//!
//! Watches the directory containing `riegor.json` and nudges the main loop
//! with a reload message when the file changes. This complements the
//! periodic reload check: the watcher gives near-instant pickup when the
//! file is edited or re-uploaded, the periodic check covers filesystems
//! where inotify events are unreliable.

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use crate::signals::SignalMessage;

/// Debounce duration for file change events (in milliseconds).
/// Editors and upload endpoints write files in multiple steps; without this
/// every save would trigger several reloads.
const DEBOUNCE_MS: u64 = 500;

/// Start the configuration file watcher.
///
/// Spawns a background thread that monitors the config file and sends
/// [`SignalMessage::Reload`] to the main loop when it changes. Failures to
/// set up the watcher are returned so the caller can degrade to periodic
/// reloads only.
pub fn start_config_watcher(signal_sender: Sender<SignalMessage>) -> Result<()> {
    let config_path = super::get_config_path()?;
    let watch_dir = config_path
        .parent()
        .context("Config path has no parent directory")?
        .to_path_buf();

    if !watch_dir.exists() {
        anyhow::bail!("Config directory {} does not exist", watch_dir.display());
    }

    let file_name = config_path
        .file_name()
        .context("Config path has no file name")?
        .to_os_string();

    let (tx, rx) = std::sync::mpsc::channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                        let _ = tx.send(event);
                    }
                    _ => {}
                }
            }
        },
        NotifyConfig::default(),
    )
    .context("Failed to create file watcher")?;

    // Watch the parent directory rather than the file itself: editors
    // commonly replace the file, which would orphan a direct watch.
    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch directory {}", watch_dir.display()))?;

    thread::spawn(move || {
        // Keep the watcher alive by moving it into the thread.
        let _watcher = watcher;
        let mut last_reload_time = std::time::Instant::now() - Duration::from_millis(DEBOUNCE_MS);

        for event in rx {
            let affects_config = event
                .paths
                .iter()
                .any(|path| path.file_name() == Some(file_name.as_os_str()));
            if !affects_config {
                continue;
            }

            if last_reload_time.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
                continue;
            }

            match signal_sender.send(SignalMessage::Reload) {
                Ok(()) => {
                    last_reload_time = std::time::Instant::now();
                }
                Err(_) => {
                    // Main loop is gone, nothing left to notify.
                    break;
                }
            }
        }
    });

    Ok(())
}
