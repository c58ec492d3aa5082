#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

//! Resource target schedule: what a worker should be consuming at a given
//! instant of the run.
//!
//! Two modes. Without batch parameters both targets ramp linearly over the
//! whole run (CPU 0.6 -> 0.9, memory 1 GB -> max). With batch parameters the
//! run alternates between active sub-intervals, placed at a per-window seeded
//! random offset, and an idle baseline.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Range;
use std::time::Duration;

use crate::domain::{BatchWindow, SimulationConfig};

pub const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

const ACTIVE_CPU: (f64, f64) = (0.6, 0.9);
const IDLE_CPU: (f64, f64) = (0.0, 0.1);
// fractions of max memory
const ACTIVE_MEMORY: (f64, f64) = (0.5, 1.0);
const IDLE_MEMORY: (f64, f64) = (0.1, 0.3);
const RAMP_START_MEMORY_GB: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduleSample {
    pub elapsed: Duration,
    pub is_active_window: bool,
    pub cpu_intensity: f64,
    /// Process-wide target, summed over all workers.
    pub target_memory_bytes: u64,
}

impl ScheduleSample {
    pub fn target_memory_gb(&self) -> f64 {
        self.target_memory_bytes as f64 / GIB
    }

    /// Even share of the memory target for one of `workers` workers.
    pub fn per_worker_target(&self, workers: usize) -> u64 {
        self.target_memory_bytes / workers.max(1) as u64
    }
}

impl BatchWindow {
    pub fn window_number(&self, elapsed: Duration) -> u64 {
        elapsed.as_secs() / self.window_minutes.saturating_mul(60).max(1)
    }

    /// Start offset of the active sub-interval inside window `window_number`.
    ///
    /// Seeded by the window number alone: the same window always yields the
    /// same offset.
    pub fn offset_minutes(&self, window_number: u64) -> u64 {
        let span = self.window_minutes.saturating_sub(self.sim_minutes);
        if span == 0 {
            return 0;
        }
        let mut rng = StdRng::seed_from_u64(window_number);
        rng.gen_range(0..span)
    }

    /// Active sub-interval of window `window_number`, as elapsed time since
    /// the start of the run.
    pub fn active_interval(&self, window_number: u64) -> Range<Duration> {
        let start_minutes = window_number
            .saturating_mul(self.window_minutes)
            .saturating_add(self.offset_minutes(window_number));
        let start = minutes(start_minutes);
        start..start.saturating_add(minutes(self.sim_minutes))
    }

    pub fn is_active(&self, elapsed: Duration) -> bool {
        if elapsed < minutes(self.first_minutes) {
            return true;
        }
        self.active_interval(self.window_number(elapsed))
            .contains(&elapsed)
    }
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}

#[derive(Clone, Copy, Debug)]
pub struct ResourceScheduler {
    duration: Duration,
    max_cpu: f64,
    max_memory_gb: f64,
    batch: Option<BatchWindow>,
}

impl ResourceScheduler {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            duration: config.duration,
            max_cpu: config.max_cpu_fraction(),
            max_memory_gb: config.max_memory_gb,
            batch: config.batch,
        }
    }

    pub fn is_batched(&self) -> bool {
        self.batch.is_some()
    }

    pub fn sample(&self, elapsed: Duration) -> ScheduleSample {
        let progress = (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0);
        let ramp = |(from, to): (f64, f64)| from + (to - from) * progress;

        let (is_active_window, cpu, memory_gb) = match &self.batch {
            None => (
                true,
                ramp(ACTIVE_CPU),
                ramp((RAMP_START_MEMORY_GB, self.max_memory_gb)),
            ),
            Some(batch) => {
                let active = batch.is_active(elapsed);
                let (cpu, memory) = if active {
                    (ACTIVE_CPU, ACTIVE_MEMORY)
                } else {
                    (IDLE_CPU, IDLE_MEMORY)
                };
                (active, ramp(cpu), ramp(memory) * self.max_memory_gb)
            }
        };

        let memory_gb = memory_gb.clamp(0.0, self.max_memory_gb);
        ScheduleSample {
            elapsed,
            is_active_window,
            cpu_intensity: cpu.clamp(0.0, self.max_cpu),
            target_memory_bytes: (memory_gb * GIB) as u64,
        }
    }
}
