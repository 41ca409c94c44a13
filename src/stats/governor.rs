// src/stats/governor.rs
//! Resource governor
//!
//! Samples CPU and memory usage periodically. CPU usage above the limit
//! publishes a pause that every worker takes between batches; memory
//! usage above the limit is only ever logged.

use crate::stats::BackgroundTask;
use arc_swap::ArcSwap;
use crossbeam_channel::{select, tick};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use sysinfo::{ProcessesToUpdate, System};

/// Pause added per percentage point of CPU usage above the limit
const PAUSE_PER_PERCENT: Duration = Duration::from_millis(2);

/// Upper bound on the per-batch pause so mining never stalls completely
const MAX_PAUSE: Duration = Duration::from_millis(100);

/// Shared per-batch pause, read by every worker
///
/// Cloning shares the same underlying value.
#[derive(Debug, Clone, Default)]
pub struct Throttle {
    micros: Arc<AtomicU64>,
}

impl Throttle {
    /// Sets the pause workers take after each batch
    pub fn set(&self, pause: Duration) {
        self.micros
            .store(pause.as_micros().min(u64::MAX as u128) as u64, Ordering::Relaxed);
    }

    /// Current per-batch pause
    pub fn current(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::Relaxed))
    }

    /// Sleeps for the current pause, if any
    pub fn pause(&self) {
        let pause = self.current();
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }
}

/// Statistics related to hardware usage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HardwareStats {
    /// Average CPU usage across all cores (0-100)
    pub cpu_usage: f32,
    /// Memory used by this process, in bytes
    pub memory_used: u64,
}

/// What the governor decided for one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GovernorDecision {
    /// Pause now applied between batches
    pub pause: Duration,
    /// Whether memory usage exceeded the advisory limit
    pub memory_warning: bool,
}

/// Pause proportional to how far `cpu_usage` is above `cpu_limit`
pub fn throttle_for(cpu_usage: f32, cpu_limit: f32) -> Duration {
    if !cpu_usage.is_finite() || cpu_usage <= cpu_limit {
        return Duration::ZERO;
    }
    PAUSE_PER_PERCENT.mul_f32(cpu_usage - cpu_limit).min(MAX_PAUSE)
}

/// Advisory CPU/memory governor
pub struct ResourceGovernor {
    cpu_limit: f32,
    memory_limit_bytes: u64,
    throttle: Throttle,
    latest: ArcSwap<HardwareStats>,
}

impl ResourceGovernor {
    /// Creates a governor
    ///
    /// # Arguments
    /// * `cpu_limit` - CPU usage ceiling in percent (1-100)
    /// * `memory_limit_mb` - Advisory process memory ceiling in megabytes
    pub fn new(cpu_limit: u8, memory_limit_mb: u64) -> Self {
        ResourceGovernor {
            cpu_limit: f32::from(cpu_limit),
            memory_limit_bytes: memory_limit_mb.saturating_mul(1024 * 1024),
            throttle: Throttle::default(),
            latest: ArcSwap::from_pointee(HardwareStats::default()),
        }
    }

    /// Handle workers use to honour the published pause
    pub fn throttle(&self) -> Throttle {
        self.throttle.clone()
    }

    /// Most recent hardware sample
    pub fn latest(&self) -> HardwareStats {
        **self.latest.load()
    }

    /// Applies one sample: updates the pause and logs throttling events
    pub fn apply_sample(&self, sample: HardwareStats) -> GovernorDecision {
        self.latest.store(Arc::new(sample));

        let previous = self.throttle.current();
        let pause = throttle_for(sample.cpu_usage, self.cpu_limit);
        self.throttle.set(pause);

        if !pause.is_zero() && pause != previous {
            log::warn!(
                "High CPU usage ({:.1}% > {:.0}%), throttling workers by {:?} per batch",
                sample.cpu_usage,
                self.cpu_limit,
                pause
            );
        } else if pause.is_zero() && !previous.is_zero() {
            log::info!(
                "CPU usage back to {:.1}%, throttling lifted",
                sample.cpu_usage
            );
        }

        let memory_warning = sample.memory_used > self.memory_limit_bytes;
        if memory_warning {
            log::warn!(
                "High memory usage ({} MB > {} MB limit)",
                sample.memory_used / (1024 * 1024),
                self.memory_limit_bytes / (1024 * 1024)
            );
        }

        GovernorDecision {
            pause,
            memory_warning,
        }
    }

    /// Starts sampling on a background thread every `interval`
    pub fn start(self: &Arc<Self>, interval: Duration) -> BackgroundTask {
        let governor = Arc::clone(self);
        BackgroundTask::spawn("resource-governor", move |stop| {
            let mut system = System::new();
            let pid = sysinfo::get_current_pid().ok();
            let ticker = tick(interval);

            loop {
                select! {
                    recv(ticker) -> _ => {
                        governor.apply_sample(sample(&mut system, pid));
                    }
                    recv(stop) -> _ => break,
                }
            }
        })
    }
}

fn sample(system: &mut System, pid: Option<sysinfo::Pid>) -> HardwareStats {
    system.refresh_cpu_all();
    let cpus = system.cpus();
    let cpu_usage = if cpus.is_empty() {
        0.0
    } else {
        cpus.iter().map(|c| c.cpu_usage()).sum::<f32>() / cpus.len() as f32
    };

    let memory_used = match pid {
        Some(pid) => {
            system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            system.process(pid).map(|p| p.memory()).unwrap_or(0)
        }
        None => 0,
    };

    HardwareStats {
        cpu_usage,
        memory_used,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_pause_at_or_below_limit() {
        assert_eq!(throttle_for(10.0, 80.0), Duration::ZERO);
        assert_eq!(throttle_for(80.0, 80.0), Duration::ZERO);
        assert_eq!(throttle_for(f32::NAN, 80.0), Duration::ZERO);
    }

    #[test]
    fn pause_grows_with_overage_and_is_capped() {
        let small = throttle_for(85.0, 80.0);
        let large = throttle_for(95.0, 80.0);
        assert!(!small.is_zero());
        assert!(large > small);
        assert_eq!(throttle_for(100.0, 1.0), MAX_PAUSE);
    }

    #[test]
    fn sample_above_limit_sets_shared_throttle() {
        let governor = ResourceGovernor::new(50, 1024);
        let throttle = governor.throttle();

        let decision = governor.apply_sample(HardwareStats {
            cpu_usage: 90.0,
            memory_used: 0,
        });
        assert_eq!(throttle.current(), decision.pause);
        assert!(!throttle.current().is_zero());

        governor.apply_sample(HardwareStats {
            cpu_usage: 20.0,
            memory_used: 0,
        });
        assert!(throttle.current().is_zero());
    }

    #[test]
    fn memory_over_limit_only_warns() {
        let governor = ResourceGovernor::new(100, 1);
        let decision = governor.apply_sample(HardwareStats {
            cpu_usage: 10.0,
            memory_used: 2 * 1024 * 1024,
        });
        assert!(decision.memory_warning);
        assert!(decision.pause.is_zero());
        assert_eq!(governor.latest().memory_used, 2 * 1024 * 1024);
    }

    #[test]
    fn background_sampler_stops_on_shutdown() {
        let governor = Arc::new(ResourceGovernor::new(80, 1024));
        let task = governor.start(Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(30));
        task.shutdown();
    }
}
