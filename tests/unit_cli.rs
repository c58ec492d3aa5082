#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use clap::Parser;
use resource_load_sim::cli::{load_request_file, Cli, Command, SimulateArgs};
use resource_load_sim::domain::{build_config, SimulateRequest};
use std::io::Write;

fn parse(args: &[&str]) -> SimulateArgs {
    let cli = Cli::try_parse_from(args).expect("parse");
    let Command::Simulate(a) = cli.command;
    a
}

#[test]
fn trigger_subcommand_is_required() {
    assert!(Cli::try_parse_from(["resource_load_sim"]).is_err());
    assert!(Cli::try_parse_from(["resource_load_sim", "--time", "5"]).is_err());
    assert!(Cli::try_parse_from(["resource_load_sim", "stress"]).is_err());
}

#[test]
fn flags_override_defaults() {
    let args = parse(&[
        "resource_load_sim",
        "simulate",
        "--high",
        "cpu,memory",
        "--time",
        "5",
        "--max-cpu",
        "60",
        "--max-memory-gb",
        "2",
        "--frequency",
        "random",
        "--crash-after",
        "3",
        "--io",
    ]);
    let req = args.load_request().expect("request");
    assert_eq!(req.high, vec!["cpu".to_string(), "memory".to_string()]);
    assert_eq!(req.duration_seconds, 5);
    assert_eq!(req.max_cpu_percent, 60);
    assert!((req.max_memory_gb - 2.0).abs() < f64::EPSILON);
    assert_eq!(req.frequency, "random");
    assert_eq!(req.crash_after_seconds, 3);
    assert!(req.simulate_io);
    assert_eq!(req.batch_minutes(), None);
}

#[test]
fn no_flags_means_defaults() {
    let req = parse(&["resource_load_sim", "simulate"])
        .load_request()
        .expect("request");
    assert_eq!(req, SimulateRequest::default());
}

#[test]
fn negative_batch_values_parse_then_fail_validation() {
    let args = parse(&[
        "resource_load_sim",
        "simulate",
        "--batch-window-minutes",
        "-5",
    ]);
    let req = args.load_request().expect("request");
    assert_eq!(req.batch_window_minutes, Some(-5));
    assert!(build_config(&req).is_err());
}

#[test]
fn config_file_then_flags() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(
        file,
        r#"{{"high": ["memory"], "duration_seconds": 42, "max_memory_gb": 3.5, "batch_window_minutes": 30}}"#
    )
    .expect("write");
    let path = file.path().to_str().expect("utf8 path").to_string();

    let from_file = load_request_file(file.path()).expect("load");
    assert_eq!(from_file.duration_seconds, 42);
    assert_eq!(from_file.max_cpu_percent, 100);

    let req = parse(&["resource_load_sim", "simulate", "--config", &path, "--time", "7"])
        .load_request()
        .expect("request");
    assert_eq!(req.high, vec!["memory".to_string()]);
    assert_eq!(req.duration_seconds, 7);
    assert!((req.max_memory_gb - 3.5).abs() < f64::EPSILON);
    assert_eq!(req.batch_minutes(), Some((5, 30, 5)));
}

#[test]
fn config_file_rejects_unknown_fields() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(file, r#"{{"duration": 5}}"#).expect("write");
    assert!(load_request_file(file.path()).is_err());
}
