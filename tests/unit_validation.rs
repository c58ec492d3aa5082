#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use resource_load_sim::domain::SimulateRequest;
use resource_load_sim::validation::{validate_simulate, MAX_BATCH_MINUTES, MAX_DURATION_SECONDS};

fn req() -> SimulateRequest {
    SimulateRequest {
        high: vec!["cpu".into(), "memory".into()],
        duration_seconds: 5,
        max_cpu_percent: 60,
        max_memory_gb: 2.0,
        ..SimulateRequest::default()
    }
}

#[test]
fn ok_defaults() {
    assert!(validate_simulate(&SimulateRequest::default()).is_ok());
    assert!(validate_simulate(&req()).is_ok());
}

#[test]
fn ok_batch() {
    let r = SimulateRequest { batch_first_minutes: Some(5), batch_window_minutes: Some(20), batch_sim_minutes: Some(5), ..req() };
    assert!(validate_simulate(&r).is_ok());
}

#[test]
fn err_zero_duration() {
    let r = SimulateRequest { duration_seconds: 0, ..req() };
    assert!(validate_simulate(&r).is_err());
}

#[test]
fn err_cpu_percent_range() {
    let r1 = SimulateRequest { max_cpu_percent: 0, ..req() };
    assert!(validate_simulate(&r1).is_err());
    let r2 = SimulateRequest { max_cpu_percent: 101, ..req() };
    assert!(validate_simulate(&r2).is_err());
}

#[test]
fn err_memory_ceiling() {
    for gb in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        let r = SimulateRequest { max_memory_gb: gb, ..req() };
        assert!(validate_simulate(&r).is_err(), "{gb}");
    }
}

#[test]
fn err_resource_unsupported() {
    let r = SimulateRequest { high: vec!["cpu".into(), "net".into()], ..req() };
    assert!(validate_simulate(&r).is_err());
    let r = SimulateRequest { high: Vec::new(), ..req() };
    assert!(validate_simulate(&r).is_err());
}

#[test]
fn err_frequency_unsupported() {
    let r = SimulateRequest { frequency: "sometimes".into(), ..req() };
    assert!(validate_simulate(&r).is_err());
}

#[test]
fn err_batch_non_positive() {
    let r = SimulateRequest { batch_window_minutes: Some(0), ..req() };
    assert!(validate_simulate(&r).is_err());
    let r = SimulateRequest { batch_sim_minutes: Some(-2), ..req() };
    assert!(validate_simulate(&r).is_err());
    let r = SimulateRequest { batch_first_minutes: Some(0), ..req() };
    assert!(validate_simulate(&r).is_err());
}

#[test]
fn sim_above_window_is_not_an_error() {
    let r = SimulateRequest { batch_window_minutes: Some(10), batch_sim_minutes: Some(30), ..req() };
    assert!(validate_simulate(&r).is_ok());
}

#[test]
fn err_zero_sizes() {
    let r = SimulateRequest { initial_mb_per_worker: Some(0), ..req() };
    assert!(validate_simulate(&r).is_err());
    let r = SimulateRequest { workers: Some(0), ..req() };
    assert!(validate_simulate(&r).is_err());
}

#[test]
fn err_durations_beyond_ten_years() {
    let r = SimulateRequest { duration_seconds: MAX_DURATION_SECONDS, ..req() };
    assert!(validate_simulate(&r).is_ok());
    let r = SimulateRequest { duration_seconds: u64::MAX, ..req() };
    assert!(validate_simulate(&r).is_err());
    let r = SimulateRequest { crash_after_seconds: u64::MAX, ..req() };
    assert!(validate_simulate(&r).is_err());
}

#[test]
fn err_batch_minutes_beyond_ten_years() {
    let r = SimulateRequest { batch_window_minutes: Some(MAX_BATCH_MINUTES), ..req() };
    assert!(validate_simulate(&r).is_ok());
    for huge in [1_i64 << 62, i64::MAX] {
        let r = SimulateRequest { batch_first_minutes: Some(huge), ..req() };
        assert!(validate_simulate(&r).is_err(), "{huge}");
        let r = SimulateRequest { batch_window_minutes: Some(huge), ..req() };
        assert!(validate_simulate(&r).is_err(), "{huge}");
        let r = SimulateRequest { batch_sim_minutes: Some(huge), ..req() };
        assert!(validate_simulate(&r).is_err(), "{huge}");
    }
}
