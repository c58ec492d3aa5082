#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result as AnyResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, RefreshKind, System};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::crash::arm_crash;
use crate::domain::{MemoryLedger, ResourceKind, SimulationConfig};
use crate::lib_cpu::{burst_pause, cpu_burst, CPU_ONLY_OPS_SCALE, MEMORY_OPS_SCALE};
use crate::lib_io::{io_load, IoPlan, IoStats};
use crate::lib_mem::{pattern_buffer, WorkerMemory, MIB};
use crate::metrics::Metrics;
use crate::scheduler::{ResourceScheduler, GIB};
use crate::validation::MAX_DURATION_SECONDS;

/// Half the available cores, at least one.
pub fn reserved_workers() -> usize {
    (num_cpus::get() / 2).max(1)
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct WorkerSummary {
    pub id: usize,
    pub ticks: u64,
    pub peak_allocated_bytes: usize,
    pub final_allocated_bytes: usize,
    pub chunks_allocated: u64,
    pub chunks_evicted: u64,
    pub io: IoStats,
}

#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    pub workers: usize,
    pub started_ts_seconds: i64,
    pub ended_ts_seconds: i64,
    pub worker_summaries: Vec<WorkerSummary>,
    pub io: IoStats,
    /// Resident set size of this process once every worker has released its
    /// chunks. `None` when the platform does not expose it.
    pub final_resident_bytes: Option<u64>,
}

impl SimulationReport {
    pub fn final_resident_gb(&self) -> f64 {
        self.final_resident_bytes.map_or(0.0, |b| b as f64 / GIB)
    }
}

/// Coordinates one stress worker per reserved core.
#[derive(Clone)]
pub struct SimulationRunner {
    config: Arc<SimulationConfig>,
    metrics: Metrics,
    ledger: MemoryLedger,
    workers: usize,
    io_plan: IoPlan,
}

impl SimulationRunner {
    pub fn new(config: SimulationConfig, metrics: Metrics) -> Self {
        let workers = config.workers.unwrap_or_else(reserved_workers).max(1);
        Self {
            config: Arc::new(config),
            metrics,
            ledger: MemoryLedger::default(),
            workers,
            io_plan: IoPlan::default(),
        }
    }

    #[must_use]
    pub fn with_io_plan(mut self, io_plan: IoPlan) -> Self {
        self.io_plan = io_plan;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn ledger(&self) -> MemoryLedger {
        self.ledger.clone()
    }

    /// Per-worker memory ceiling in bytes.
    pub fn worker_cap(&self) -> usize {
        (self.config.max_memory_gb * GIB / self.workers as f64) as usize
    }

    /// Bytes each worker allocates before its timed loop starts.
    pub fn initial_fill_bytes(&self) -> usize {
        let baseline = match self.config.initial_mb_per_worker {
            Some(mb) => usize::try_from(mb).unwrap_or(usize::MAX / MIB).saturating_mul(MIB),
            None => (GIB.min(self.config.max_memory_gb * GIB) / self.workers as f64) as usize,
        };
        baseline.min(self.worker_cap())
    }

    pub async fn run(&self) -> AnyResult<SimulationReport> {
        let started_ts_seconds = chrono::Utc::now().timestamp();
        info!(
            workers = self.workers,
            resources = %self.config.resources_label(),
            duration_seconds = self.config.duration.as_secs(),
            frequency = %self.config.frequency,
            "starting simulation"
        );

        let io_dir = if self.config.simulate_io {
            Some(
                tempfile::Builder::new()
                    .prefix("io-simulation")
                    .tempdir()
                    .context("create io simulation directory")?,
            )
        } else {
            None
        };
        let crash = self.config.crash_after.map(arm_crash);

        self.metrics
            .mark_started(self.config.duration.as_secs(), self.workers);
        let scheduler = ResourceScheduler::new(&self.config);
        let pattern = Arc::new(pattern_buffer());
        let mut handles = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let worker = Worker {
                id,
                config: Arc::clone(&self.config),
                scheduler,
                workers: self.workers,
                cap: self.worker_cap(),
                baseline: self.initial_fill_bytes(),
                pattern: Arc::clone(&pattern),
                ledger: self.ledger.clone(),
                metrics: self.metrics.clone(),
                io: io_dir
                    .as_ref()
                    .map(|dir| (dir.path().to_path_buf(), self.io_plan)),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        let mut worker_summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            worker_summaries.push(handle.await.context("worker task failed")?);
        }

        if let Some(crash) = crash {
            debug!("run completed before crash simulation fired");
            crash.abort();
        }
        if let Some(dir) = io_dir {
            dir.close().context("remove io simulation directory")?;
        }
        self.metrics.mark_finished();
        self.metrics
            .memory_allocated_bytes
            .set(self.ledger.total());

        let io = worker_summaries.iter().fold(IoStats::default(), |acc, s| IoStats {
            iterations: acc.iterations + s.io.iterations,
            errors: acc.errors + s.io.errors,
        });
        let report = SimulationReport {
            workers: self.workers,
            started_ts_seconds,
            ended_ts_seconds: chrono::Utc::now().timestamp(),
            worker_summaries,
            io,
            final_resident_bytes: resident_memory_bytes(),
        };
        info!(
            final_resident_bytes = report.final_resident_bytes,
            io_iterations = io.iterations,
            io_errors = io.errors,
            "simulation complete"
        );
        Ok(report)
    }
}

/// Resident set size of the current process.
pub fn resident_memory_bytes() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let sys = System::new_with_specifics(
        RefreshKind::new().with_processes(ProcessRefreshKind::new().with_memory()),
    );
    sys.process(pid).map(sysinfo::Process::memory)
}

pub fn progress_line(id: usize, current_bytes: i64, target_bytes: u64, intensity: f64) -> String {
    format!(
        "Core {id}: Memory: {:.2} GB / {:.2} GB, CPU: {:.1}%",
        current_bytes as f64 / GIB,
        target_bytes as f64 / GIB,
        intensity * 100.0
    )
}

/// Rewrites the current line of `out` with `line`.
pub fn write_progress(out: &mut impl Write, line: &str) -> std::io::Result<()> {
    write!(out, "\r{line}")?;
    out.flush()
}

fn print_progress(line: &str) {
    // a closed stderr must not stop the workers
    write_progress(&mut std::io::stderr().lock(), line).ok();
}

/// Run deadline, clamped so an oversized duration cannot overflow `Instant`.
pub fn run_deadline(start: Instant, duration: Duration) -> Instant {
    let duration = duration.min(Duration::from_secs(MAX_DURATION_SECONDS));
    start.checked_add(duration).unwrap_or(start)
}

struct Worker {
    id: usize,
    config: Arc<SimulationConfig>,
    scheduler: ResourceScheduler,
    workers: usize,
    cap: usize,
    baseline: usize,
    pattern: Arc<Vec<u8>>,
    ledger: MemoryLedger,
    metrics: Metrics,
    io: Option<(PathBuf, IoPlan)>,
}

impl Worker {
    async fn run(self) -> WorkerSummary {
        let start = Instant::now();
        let deadline = run_deadline(start, self.config.duration);
        let stress_memory = self.config.stresses(ResourceKind::Memory);
        let stress_cpu = self.config.stresses(ResourceKind::Cpu);
        let mut rng = StdRng::from_entropy();
        let mut memory = WorkerMemory::new(self.ledger.clone());
        let mut summary = WorkerSummary {
            id: self.id,
            ..WorkerSummary::default()
        };

        if stress_memory {
            memory.initial_fill(self.baseline, &self.pattern, |total| {
                self.metrics.memory_allocated_bytes.set(total);
                print_progress(&format!(
                    "Core {}: Initial Memory: {:.2} GB",
                    self.id,
                    total as f64 / GIB
                ));
            });
            summary.chunks_allocated = memory.chunk_count() as u64;
            summary.peak_allocated_bytes = memory.allocated();
            debug!(worker = self.id, bytes = memory.allocated(), "initial fill done");
        }

        let io = self.io.clone().map(|(dir, plan)| {
            tokio::spawn(io_load(self.id, dir, deadline, plan, self.metrics.clone()))
        });

        let ops_scale = if stress_memory {
            MEMORY_OPS_SCALE
        } else {
            CPU_ONLY_OPS_SCALE
        };
        while Instant::now() < deadline {
            let sample = self.scheduler.sample(start.elapsed());
            self.metrics
                .memory_target_bytes
                .set(i64::try_from(sample.target_memory_bytes).unwrap_or(i64::MAX));
            self.metrics.active_window.set(i64::from(sample.is_active_window));

            if stress_memory {
                let target = usize::try_from(sample.per_worker_target(self.workers))
                    .unwrap_or(usize::MAX)
                    .min(self.cap);
                if let Some(size) = memory.grow_toward(target, &mut rng) {
                    summary.chunks_allocated += 1;
                    self.metrics.chunks_allocated_total.inc();
                    let total = self.ledger.total();
                    self.metrics.memory_allocated_bytes.set(total);
                    debug!(worker = self.id, size, target, "chunk allocated");
                    print_progress(&progress_line(
                        self.id,
                        total,
                        sample.target_memory_bytes,
                        sample.cpu_intensity,
                    ));
                } else if self.scheduler.is_batched() {
                    let evicted = memory.shrink_toward(target);
                    if evicted > 0 {
                        summary.chunks_evicted += evicted as u64;
                        self.metrics.chunks_evicted_total.inc_by(evicted as u64);
                        self.metrics.memory_allocated_bytes.set(self.ledger.total());
                        debug!(worker = self.id, evicted, target, "chunks released");
                    }
                }
                summary.peak_allocated_bytes = summary.peak_allocated_bytes.max(memory.allocated());
            }

            let intensity = if stress_cpu {
                self.metrics.cpu_intensity.set(sample.cpu_intensity);
                cpu_burst(sample.cpu_intensity, ops_scale, memory.chunks_mut(), &mut rng);
                sample.cpu_intensity
            } else {
                0.0
            };

            let pause = burst_pause(intensity);
            if pause.is_zero() {
                tokio::task::yield_now().await;
            } else {
                sleep(pause).await;
            }
            summary.ticks += 1;
            self.metrics.simulation_remaining_seconds.set(
                i64::try_from(deadline.saturating_duration_since(Instant::now()).as_secs())
                    .unwrap_or(i64::MAX),
            );
        }

        if let Some(handle) = io {
            summary.io = handle.await.unwrap_or_else(|e| {
                warn!(worker = self.id, error = %e, "io task failed");
                IoStats::default()
            });
        }
        summary.final_allocated_bytes = memory.allocated();
        debug!(worker = self.id, ticks = summary.ticks, "worker finished");
        summary
    }
}
