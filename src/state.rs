//! Durable process-wide state: small files backing the failure counter, the
//! maintenance counter, and the remediation cooldown timestamp.
//!
//! These values are the single source of truth (never reconstructed from the
//! sample history) and must survive restarts. A missing, unreadable, or
//! corrupt file degrades to the zero value with a warning; it never crashes
//! the monitoring loop.

use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A durable `u32` counter stored in its own file.
#[derive(Debug)]
pub struct CounterFile {
    path: PathBuf,
}

impl CounterFile {
    pub fn new<P: AsRef<Path>>(dir: P, name: &str) -> Self {
        Self {
            path: dir.as_ref().join(name),
        }
    }

    /// Read the current value. Corrupt or missing content reads as 0.
    pub fn load(&self) -> u32 {
        match fs::read_to_string(&self.path) {
            Ok(s) => match s.trim().parse() {
                Ok(v) => v,
                Err(_) => {
                    tracing::warn!(
                        "Counter file {} is corrupt, treating as 0",
                        self.path.display()
                    );
                    0
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => {
                tracing::warn!(
                    "Counter file {} unreadable ({}), treating as 0",
                    self.path.display(),
                    e
                );
                0
            }
        }
    }

    /// Durably store a new value.
    pub fn store(&self, value: u32) -> io::Result<()> {
        write_atomic(&self.path, value.to_string().as_bytes())
    }
}

/// Durable `last_remediation_timestamp`, stored as unix seconds.
///
/// Shared by the automatic and manual trigger paths; the controller guards
/// its read-decide-write with a mutex so at most one remediation fires per
/// cooldown window.
#[derive(Debug)]
pub struct CooldownFile {
    path: PathBuf,
}

impl CooldownFile {
    pub fn new<P: AsRef<Path>>(dir: P, name: &str) -> Self {
        Self {
            path: dir.as_ref().join(name),
        }
    }

    /// Read the last remediation time. Corrupt or missing reads as absent.
    pub fn load(&self) -> Option<DateTime<Utc>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(
                    "Cooldown file {} unreadable ({}), treating as absent",
                    self.path.display(),
                    e
                );
                return None;
            }
        };

        match raw.trim().parse::<i64>() {
            Ok(secs) => DateTime::from_timestamp(secs, 0),
            Err(_) => {
                tracing::warn!(
                    "Cooldown file {} is corrupt, treating as absent",
                    self.path.display()
                );
                None
            }
        }
    }

    /// Durably record a remediation time.
    pub fn store(&self, at: DateTime<Utc>) -> io::Result<()> {
        write_atomic(&self.path, at.timestamp().to_string().as_bytes())
    }
}

/// Write via a temp file and rename so a crash mid-write never leaves a
/// half-written value behind.
fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
