#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result as AnyResult};
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,
    pub workers_active: IntGauge,
    pub memory_allocated_bytes: IntGauge,
    pub memory_target_bytes: IntGauge,
    pub cpu_intensity: Gauge,
    pub active_window: IntGauge,
    pub chunks_allocated_total: IntCounter,
    pub chunks_evicted_total: IntCounter,
    pub io_iterations_total: IntCounter,
    pub io_errors_total: IntCounter,
    pub simulation_total_seconds: IntGauge,
    pub simulation_remaining_seconds: IntGauge,
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> AnyResult<IntGauge> {
    let gauge = IntGauge::with_opts(Opts::new(name, help)).with_context(|| format!("create {name}"))?;
    registry
        .register(Box::new(gauge.clone()))
        .with_context(|| format!("register {name}"))?;
    Ok(gauge)
}

fn int_counter(registry: &Registry, name: &str, help: &str) -> AnyResult<IntCounter> {
    let counter =
        IntCounter::with_opts(Opts::new(name, help)).with_context(|| format!("create {name}"))?;
    registry
        .register(Box::new(counter.clone()))
        .with_context(|| format!("register {name}"))?;
    Ok(counter)
}

impl Metrics {
    pub fn new() -> AnyResult<Self> {
        let registry = Registry::new();
        let cpu_intensity = Gauge::with_opts(Opts::new(
            "loadsim_cpu_intensity",
            "scheduled cpu intensity (0..1)",
        ))
        .context("create cpu_intensity")?;
        registry
            .register(Box::new(cpu_intensity.clone()))
            .context("register cpu_intensity")?;
        Ok(Self {
            workers_active: int_gauge(&registry, "loadsim_workers_active", "running workers")?,
            memory_allocated_bytes: int_gauge(
                &registry,
                "loadsim_memory_allocated_bytes",
                "bytes held by all workers",
            )?,
            memory_target_bytes: int_gauge(
                &registry,
                "loadsim_memory_target_bytes",
                "scheduled memory target for all workers",
            )?,
            cpu_intensity,
            active_window: int_gauge(
                &registry,
                "loadsim_active_window",
                "1 while inside an active batch window",
            )?,
            chunks_allocated_total: int_counter(
                &registry,
                "loadsim_chunks_allocated_total",
                "chunks allocated",
            )?,
            chunks_evicted_total: int_counter(
                &registry,
                "loadsim_chunks_evicted_total",
                "chunks released by shrinking",
            )?,
            io_iterations_total: int_counter(
                &registry,
                "loadsim_io_iterations_total",
                "completed io passes",
            )?,
            io_errors_total: int_counter(&registry, "loadsim_io_errors_total", "failed io passes")?,
            simulation_total_seconds: int_gauge(
                &registry,
                "loadsim_simulation_total_seconds",
                "configured total seconds",
            )?,
            simulation_remaining_seconds: int_gauge(
                &registry,
                "loadsim_simulation_remaining_seconds",
                "remaining seconds",
            )?,
            registry,
        })
    }

    pub fn mark_started(&self, total_seconds: u64, workers: usize) {
        self.simulation_total_seconds.set(saturating_i64(total_seconds));
        self.simulation_remaining_seconds.set(saturating_i64(total_seconds));
        self.workers_active.set(saturating_i64(workers as u64));
    }

    pub fn mark_finished(&self) {
        self.simulation_remaining_seconds.set(0);
        self.workers_active.set(0);
        self.active_window.set(0);
        self.cpu_intensity.set(0.0);
    }

    pub fn encode_text(&self) -> AnyResult<Vec<u8>> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf).context("encode metrics")?;
        Ok(buf)
    }
}

fn saturating_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
