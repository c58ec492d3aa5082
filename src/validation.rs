#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::{bail, Result as AnyResult};
use std::str::FromStr;

use crate::domain::{FrequencyMode, ResourceKind, SimulateRequest};

/// Ten years. Keeps deadlines and minute-to-second conversions in range.
pub const MAX_DURATION_SECONDS: u64 = 10 * 365 * 24 * 3600;
pub const MAX_BATCH_MINUTES: i64 = 10 * 365 * 24 * 60;

pub fn validate_simulate(req: &SimulateRequest) -> AnyResult<()> {
    if req.duration_seconds == 0 { bail!("duration_seconds must be > 0"); }
    if req.duration_seconds > MAX_DURATION_SECONDS {
        bail!("duration_seconds must be <= {MAX_DURATION_SECONDS}");
    }
    if req.crash_after_seconds > MAX_DURATION_SECONDS {
        bail!("crash_after_seconds must be <= {MAX_DURATION_SECONDS}");
    }
    if req.high.is_empty() { bail!("resource set is empty"); }
    for r in &req.high {
        ResourceKind::from_str(r)?;
    }
    FrequencyMode::from_str(&req.frequency)?;
    if !(1..=100).contains(&req.max_cpu_percent) { bail!("max_cpu_percent must be 1..=100"); }
    if !req.max_memory_gb.is_finite() || req.max_memory_gb <= 0.0 {
        bail!("max_memory_gb must be > 0");
    }
    if let Some((first, window, sim)) = req.batch_minutes() {
        if first <= 0 { bail!("batch_first_minutes must be > 0"); }
        if window <= 0 { bail!("batch_window_minutes must be > 0"); }
        if sim <= 0 { bail!("batch_sim_minutes must be > 0"); }
        let fields = [
            ("batch_first_minutes", first),
            ("batch_window_minutes", window),
            ("batch_sim_minutes", sim),
        ];
        for (name, v) in fields {
            if v > MAX_BATCH_MINUTES { bail!("{name} must be <= {MAX_BATCH_MINUTES}"); }
        }
    }
    if req.initial_mb_per_worker == Some(0) { bail!("initial_mb_per_worker must be > 0"); }
    if req.workers == Some(0) { bail!("workers must be > 0"); }
    Ok(())
}
