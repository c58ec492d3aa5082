#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use anyhow::{Context, Result as AnyResult};
use clap::Parser;
use resource_load_sim::cli::{Cli, Command, SimulateArgs};
use resource_load_sim::{build_config, Metrics, SimulationRunner};
use std::process::ExitCode;
use tracing::{error, info};

fn init_tracing() {
    let fmt = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    fmt.json().init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let Command::Simulate(args) = Cli::parse().command;

    let config = match args.load_request().and_then(|req| build_config(&req)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e:#}");
            return ExitCode::from(2);
        }
    };

    println!(
        "Simulating high {} for {} seconds with {} frequency...",
        config.resources_label(),
        config.duration.as_secs(),
        config.frequency
    );
    match simulate(config, &args).await {
        Ok(()) => {
            println!("\nSimulation complete.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error=%format!("{e:#}"), "simulation failed");
            eprintln!("simulation failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn simulate(config: resource_load_sim::SimulationConfig, args: &SimulateArgs) -> AnyResult<()> {
    let metrics = Metrics::new()?;
    let runner = SimulationRunner::new(config, metrics.clone());
    println!("Starting simulation using {} workers...", runner.workers());
    let report = runner.run().await?;
    println!("\nFinal Memory Usage: {:.2} GB", report.final_resident_gb());
    let encoded = serde_json::to_string(&report).context("encode report")?;
    info!(report = %encoded, "final report");
    if let Some(path) = &args.metrics_file {
        let text = metrics.encode_text()?;
        std::fs::write(path, text).with_context(|| format!("write metrics to {}", path.display()))?;
    }
    Ok(())
}
