//! Statistics collection and resource governance
//!
//! This module provides:
//! - Hash rate and job/submission counters ([`StatsReporter`])
//! - CPU throttling and memory warnings ([`ResourceGovernor`])
//! - A small helper for stoppable background threads

/// Submodule containing the statistics reporter implementation
pub mod reporter;

/// CPU/memory sampling and worker throttling
pub mod governor;

pub use governor::{HardwareStats, ResourceGovernor, Throttle};
pub use reporter::{MiningStats, StatsReporter};

use crossbeam_channel::{Receiver, Sender};
use std::thread::JoinHandle;

/// A background thread that runs until its stop channel disconnects
///
/// The closure receives the stop receiver; it should select on it next to
/// its own ticker and return once it fires.
pub struct BackgroundTask {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    /// Spawns `body` on a named thread
    pub fn spawn<F>(name: &str, body: F) -> Self
    where
        F: FnOnce(Receiver<()>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(0);
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(stop_rx))
            .map_err(|e| log::error!("Failed to start {} thread: {}", name, e))
            .ok();

        BackgroundTask {
            stop: Some(stop_tx),
            handle,
        }
    }

    /// Signals the thread to stop and waits for it
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Background thread panicked");
            }
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
