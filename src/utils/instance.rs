// src/utils/instance.rs
//! Single-instance guard
//!
//! A mining run records its PID in a file. A later start that finds a live
//! process behind that PID refuses to run; a file left behind by a dead
//! process (or one that does not hold a PID at all) is replaced.

use crate::utils::error::MinerError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// PID file held for the lifetime of a mining run
///
/// Dropping the lock removes the file, unless another process has since
/// written its own PID there.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    pid: u32,
}

impl InstanceLock {
    /// Claims `path` for the current process
    ///
    /// # Errors
    /// * `MinerError::AlreadyRunning` if the file names another live process
    /// * `MinerError::IoError` if the file cannot be read or written
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let own = std::process::id();

        match fs::read_to_string(&path) {
            Ok(contents) => match contents.trim().parse::<u32>() {
                Ok(pid) if pid != own && is_alive(pid) => {
                    log::error!(
                        "Another miner is already running with PID {} ({})",
                        pid,
                        path.display()
                    );
                    return Err(MinerError::AlreadyRunning { pid, path });
                }
                Ok(pid) => log::warn!(
                    "Stale PID file {} (PID {}), taking it over",
                    path.display(),
                    pid
                ),
                Err(_) => log::warn!(
                    "PID file {} does not hold a PID, taking it over",
                    path.display()
                ),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, own.to_string())?;
        log::info!("Acquired single-instance lock {} (PID {})", path.display(), own);

        Ok(Self { path, pid: own })
    }

    /// Location of the PID file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let ours = fs::read_to_string(&self.path)
            .map(|contents| contents.trim() == self.pid.to_string())
            .unwrap_or(false);
        if !ours {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => log::info!("Released single-instance lock {}", self.path.display()),
            Err(e) => log::error!("Failed to remove PID file {}: {}", self.path.display(), e),
        }
    }
}

fn is_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system.process(pid).is_some()
}
