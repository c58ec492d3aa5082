#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

pub mod cli;
pub mod crash;
pub mod domain;
pub mod lib_cpu;
pub mod lib_io;
pub mod lib_mem;
pub mod metrics;
pub mod scheduler;
pub mod service;
pub mod validation;

pub use domain::{build_config, MemoryLedger, SimulateRequest, SimulationConfig};
pub use metrics::Metrics;
pub use scheduler::{ResourceScheduler, ScheduleSample};
pub use service::{SimulationReport, SimulationRunner};
pub use validation::validate_simulate;
