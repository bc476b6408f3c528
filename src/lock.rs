//! Single-instance enforcement.
//!
//! Two riegor daemons polling the same schedule would double-fire every
//! slot and fight over the relays, so the process takes an advisory file
//! lock before touching anything. The lock lives in the user runtime
//! directory and holds the owning PID for diagnostics.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

pub struct LockFile {
    file: File,
    path: PathBuf,
}

/// Path of the lock file.
pub fn lock_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("riegor.lock")
}

/// Try to take the instance lock. Returns `None` when another process
/// already holds it.
pub fn acquire() -> Result<Option<LockFile>> {
    let path = lock_path();
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("Failed to open lock file {}", path.display()))?;

    if file.try_lock_exclusive().is_err() {
        return Ok(None);
    }

    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    file.flush()?;

    Ok(Some(LockFile { file, path }))
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}
