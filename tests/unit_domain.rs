#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use resource_load_sim::domain::{
    build_config, BatchWindow, FrequencyMode, MemoryLedger, ResourceKind, SimulateRequest,
};
use std::str::FromStr;
use std::time::Duration;

#[test]
fn defaults_build() {
    let c = build_config(&SimulateRequest::default()).expect("ok");
    assert_eq!(c.duration, Duration::from_secs(10));
    assert!(c.stresses(ResourceKind::Cpu));
    assert!(!c.stresses(ResourceKind::Memory));
    assert!(!c.simulate_io);
    assert!(c.batch.is_none());
    assert!(c.crash_after.is_none());
    assert_eq!(c.frequency, FrequencyMode::Constant);
}

#[test]
fn io_flag_joins_resource_set() {
    let c = build_config(&SimulateRequest {
        high: vec!["cpu".into(), "memory".into()],
        simulate_io: true,
        ..SimulateRequest::default()
    })
    .expect("ok");
    assert!(c.simulate_io);
    assert_eq!(c.resources_label(), "cpu,memory,io");

    let c = build_config(&SimulateRequest {
        high: vec!["io".into()],
        ..SimulateRequest::default()
    })
    .expect("ok");
    assert!(c.simulate_io);
}

#[test]
fn sim_longer_than_window_is_clamped() {
    let c = build_config(&SimulateRequest {
        batch_window_minutes: Some(10),
        batch_sim_minutes: Some(25),
        ..SimulateRequest::default()
    })
    .expect("ok");
    assert_eq!(
        c.batch,
        Some(BatchWindow {
            first_minutes: 5,
            window_minutes: 10,
            sim_minutes: 10,
        })
    );
}

#[test]
fn partial_batch_flags_use_defaults() {
    let req = SimulateRequest {
        batch_sim_minutes: Some(3),
        ..SimulateRequest::default()
    };
    assert_eq!(req.batch_minutes(), Some((5, 20, 3)));
    assert_eq!(SimulateRequest::default().batch_minutes(), None);
}

#[test]
fn crash_delay_zero_disables() {
    let c = build_config(&SimulateRequest {
        crash_after_seconds: 3,
        ..SimulateRequest::default()
    })
    .expect("ok");
    assert_eq!(c.crash_after, Some(Duration::from_secs(3)));
}

#[test]
fn kinds_parse_and_display() {
    assert_eq!(ResourceKind::from_str(" Memory ").expect("ok"), ResourceKind::Memory);
    assert_eq!(ResourceKind::Io.to_string(), "io");
    assert!(ResourceKind::from_str("net").is_err());
    assert_eq!(FrequencyMode::from_str("random").expect("ok"), FrequencyMode::Random);
    assert!(FrequencyMode::from_str("bursty").is_err());
}

#[test]
fn ledger_sums_across_threads() {
    let ledger = MemoryLedger::default();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let l = ledger.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    l.add(3);
                }
                l.add(-1000);
            })
        })
        .collect();
    for h in handles {
        h.join().expect("join");
    }
    assert_eq!(ledger.total(), 8 * 2000);
}
