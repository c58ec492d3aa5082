#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result as AnyResult};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::domain::SimulateRequest;

/// Drive CPU, memory and disk I/O toward a time-varying target load
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one bounded simulation and exit
    Simulate(SimulateArgs),
}

/// Every flag overrides the value read from `--config`, which itself
/// overrides the built-in defaults.
#[derive(Args, Debug, Default)]
pub struct SimulateArgs {
    /// JSON file with simulation parameters
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Resources to stress: cpu, memory, io (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub high: Option<Vec<String>>,

    /// Duration in seconds
    #[arg(long = "time")]
    pub duration_seconds: Option<u64>,

    /// Load frequency: constant or random
    #[arg(long)]
    pub frequency: Option<String>,

    /// CPU intensity ceiling, in percent
    #[arg(long = "max-cpu")]
    pub max_cpu_percent: Option<u32>,

    /// Total memory ceiling, in GB
    #[arg(long)]
    pub max_memory_gb: Option<f64>,

    /// Abort the process after this many seconds (0 disables)
    #[arg(long = "crash-after")]
    pub crash_after_seconds: Option<u64>,

    /// Also run the disk I/O stress task
    #[arg(long = "io")]
    pub simulate_io: bool,

    /// Length of the initial, always active batch, in minutes
    #[arg(long, allow_negative_numbers = true)]
    pub batch_first_minutes: Option<i64>,

    /// Batch window size, in minutes
    #[arg(long, allow_negative_numbers = true)]
    pub batch_window_minutes: Option<i64>,

    /// Active duration inside each batch window, in minutes
    #[arg(long, allow_negative_numbers = true)]
    pub batch_sim_minutes: Option<i64>,

    /// Fixed memory baseline per worker, in MB
    #[arg(long)]
    pub initial_mb_per_worker: Option<u64>,

    /// Number of workers (default: half the available cores)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Write prometheus text metrics here once the run is over
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,
}

impl SimulateArgs {
    pub fn load_request(&self) -> AnyResult<SimulateRequest> {
        let base = match &self.config {
            Some(path) => load_request_file(path)?,
            None => SimulateRequest::default(),
        };
        Ok(self.apply(base))
    }

    pub fn apply(&self, mut req: SimulateRequest) -> SimulateRequest {
        if let Some(high) = &self.high {
            req.high.clone_from(high);
        }
        if let Some(v) = self.duration_seconds { req.duration_seconds = v; }
        if let Some(v) = &self.frequency { req.frequency.clone_from(v); }
        if let Some(v) = self.max_cpu_percent { req.max_cpu_percent = v; }
        if let Some(v) = self.max_memory_gb { req.max_memory_gb = v; }
        if let Some(v) = self.crash_after_seconds { req.crash_after_seconds = v; }
        req.simulate_io |= self.simulate_io;
        if self.batch_first_minutes.is_some() { req.batch_first_minutes = self.batch_first_minutes; }
        if self.batch_window_minutes.is_some() { req.batch_window_minutes = self.batch_window_minutes; }
        if self.batch_sim_minutes.is_some() { req.batch_sim_minutes = self.batch_sim_minutes; }
        if self.initial_mb_per_worker.is_some() { req.initial_mb_per_worker = self.initial_mb_per_worker; }
        if self.workers.is_some() { req.workers = self.workers; }
        req
    }
}

pub fn load_request_file(path: &Path) -> AnyResult<SimulateRequest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse config {}", path.display()))
}
