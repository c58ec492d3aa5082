#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::{bail, Result as AnyResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::validation::validate_simulate;

pub const DEFAULT_BATCH_FIRST_MINUTES: i64 = 5;
pub const DEFAULT_BATCH_WINDOW_MINUTES: i64 = 20;
pub const DEFAULT_BATCH_SIM_MINUTES: i64 = 5;

/// Raw simulation parameters, as read from a config file and/or flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulateRequest {
    pub high: Vec<String>,
    pub duration_seconds: u64,
    pub frequency: String,
    pub max_cpu_percent: u32,
    pub max_memory_gb: f64,
    pub crash_after_seconds: u64,
    pub simulate_io: bool,
    pub batch_first_minutes: Option<i64>,
    pub batch_window_minutes: Option<i64>,
    pub batch_sim_minutes: Option<i64>,
    pub initial_mb_per_worker: Option<u64>,
    pub workers: Option<usize>,
}

impl Default for SimulateRequest {
    fn default() -> Self {
        Self {
            high: vec!["cpu".to_string()],
            duration_seconds: 10,
            frequency: "constant".to_string(),
            max_cpu_percent: 100,
            max_memory_gb: 10.0,
            crash_after_seconds: 0,
            simulate_io: false,
            batch_first_minutes: None,
            batch_window_minutes: None,
            batch_sim_minutes: None,
            initial_mb_per_worker: None,
            workers: None,
        }
    }
}

impl SimulateRequest {
    /// `(first, window, sim)` in minutes, or `None` when no batch flag was
    /// supplied. Missing values fall back to the defaults.
    pub fn batch_minutes(&self) -> Option<(i64, i64, i64)> {
        if self.batch_first_minutes.is_none()
            && self.batch_window_minutes.is_none()
            && self.batch_sim_minutes.is_none()
        {
            return None;
        }
        Some((
            self.batch_first_minutes
                .unwrap_or(DEFAULT_BATCH_FIRST_MINUTES),
            self.batch_window_minutes
                .unwrap_or(DEFAULT_BATCH_WINDOW_MINUTES),
            self.batch_sim_minutes.unwrap_or(DEFAULT_BATCH_SIM_MINUTES),
        ))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Cpu,
    Memory,
    Io,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Cpu => f.write_str("cpu"),
            ResourceKind::Memory => f.write_str("memory"),
            ResourceKind::Io => f.write_str("io"),
        }
    }
}

impl FromStr for ResourceKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> AnyResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "memory" => Ok(Self::Memory),
            "io" => Ok(Self::Io),
            other => bail!(format!("unsupported resource: {other}")),
        }
    }
}

/// Accepted and reported, but does not change the schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyMode {
    #[default]
    Constant,
    Random,
}

impl std::fmt::Display for FrequencyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrequencyMode::Constant => f.write_str("constant"),
            FrequencyMode::Random => f.write_str("random"),
        }
    }
}

impl FromStr for FrequencyMode {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> AnyResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "constant" => Ok(Self::Constant),
            "random" => Ok(Self::Random),
            other => bail!(format!("unsupported frequency: {other}")),
        }
    }
}

/// Recurring batch pattern, all values in minutes.
///
/// `sim_minutes <= window_minutes` always holds for a built config.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWindow {
    pub first_minutes: u64,
    pub window_minutes: u64,
    pub sim_minutes: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SimulationConfig {
    pub duration: Duration,
    pub frequency: FrequencyMode,
    pub resources: BTreeSet<ResourceKind>,
    pub max_cpu_percent: u32,
    pub max_memory_gb: f64,
    pub crash_after: Option<Duration>,
    pub simulate_io: bool,
    pub batch: Option<BatchWindow>,
    pub initial_mb_per_worker: Option<u64>,
    pub workers: Option<usize>,
}

impl SimulationConfig {
    pub fn stresses(&self, kind: ResourceKind) -> bool {
        self.resources.contains(&kind)
    }

    pub fn max_cpu_fraction(&self) -> f64 {
        f64::from(self.max_cpu_percent) / 100.0
    }

    pub fn resources_label(&self) -> String {
        self.resources
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

pub fn build_config(req: &SimulateRequest) -> AnyResult<SimulationConfig> {
    validate_simulate(req)?;
    let mut resources = req
        .high
        .iter()
        .map(|r| r.parse::<ResourceKind>())
        .collect::<AnyResult<BTreeSet<_>>>()?;
    if req.simulate_io {
        resources.insert(ResourceKind::Io);
    }
    let simulate_io = resources.contains(&ResourceKind::Io);
    let batch = req.batch_minutes().map(|(first, window, sim)| {
        // validation guarantees all three are positive
        let (first, window, sim) = (
            first.unsigned_abs(),
            window.unsigned_abs(),
            sim.unsigned_abs(),
        );
        let sim = if sim > window {
            warn!(
                sim_minutes = sim,
                window_minutes = window,
                "batch simulation duration exceeds window size, clamping to window size"
            );
            window
        } else {
            sim
        };
        BatchWindow {
            first_minutes: first,
            window_minutes: window,
            sim_minutes: sim,
        }
    });
    Ok(SimulationConfig {
        duration: Duration::from_secs(req.duration_seconds),
        frequency: FrequencyMode::from_str(&req.frequency)?,
        resources,
        max_cpu_percent: req.max_cpu_percent,
        max_memory_gb: req.max_memory_gb,
        crash_after: (req.crash_after_seconds > 0)
            .then(|| Duration::from_secs(req.crash_after_seconds)),
        simulate_io,
        batch,
        initial_mb_per_worker: req.initial_mb_per_worker,
        workers: req.workers,
    })
}

/// Process-wide total of bytes held by all workers.
///
/// Reporting only: no worker reads it to decide its own allocation.
#[derive(Clone, Debug, Default)]
pub struct MemoryLedger {
    total: Arc<Mutex<i64>>,
}

impl MemoryLedger {
    /// Adds `delta` (negative on release) and returns the new total.
    pub fn add(&self, delta: i64) -> i64 {
        let mut total = self.total.lock();
        *total += delta;
        *total
    }

    pub fn total(&self) -> i64 {
        *self.total.lock()
    }
}
