mod client;
mod runner;

use anyhow::{Context, Result};
use client::PredictClient;
use common::{BenchmarkConfig, InfoResponse};
use runner::{Runner, ScenarioReport};
use serde::Serialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct BenchmarkRun {
    server_url: String,
    server_info: InfoResponse,
    reference_predictions: Vec<Option<f64>>,
    scenarios: Vec<ScenarioReport>,
    timestamp: String,
}

fn main() -> Result<()> {
    println!("========================================================================");
    println!("Ridge FWI Benchmark Client");
    println!("========================================================================");

    let server_url = env::var("SERVER_URL").unwrap_or_else(|_| "http://localhost:5000".to_string());
    let config_path =
        env::var("BENCHMARK_CONFIG").unwrap_or_else(|_| "config/benchmark.yaml".to_string());
    let results_dir = PathBuf::from(env::var("RESULTS_DIR").unwrap_or_else(|_| "results".to_string()));

    println!("Server URL: {}", server_url);
    println!("Config: {}", config_path);

    let config = BenchmarkConfig::load(&config_path)
        .context("Failed to load benchmark configuration")?;

    let client = PredictClient::new(server_url)?;
    client.wait_until_healthy(Duration::from_secs(120))?;

    let server_info = client.info()?;
    println!("\nServer Info:");
    println!("{}", serde_json::to_string_pretty(&server_info)?);

    let runner = Runner::new(&client);
    if runner.reference().iter().any(Option::is_none) {
        println!("⚠ Warning: some sample rows got no prediction in the reference pass");
    }

    if config.warmup.enabled {
        runner.warmup(config.warmup.num_requests);
    }

    let mut scenarios = Vec::with_capacity(config.scenarios.len());
    for scenario in &config.scenarios {
        let report = runner.run(scenario)?;
        report.print();
        scenarios.push(report);
    }

    let now = chrono::Utc::now();
    let run = BenchmarkRun {
        server_url: client.base_url().to_string(),
        server_info,
        reference_predictions: runner.reference().to_vec(),
        scenarios,
        timestamp: now.to_rfc3339(),
    };

    fs::create_dir_all(&results_dir)
        .with_context(|| format!("Failed to create {}", results_dir.display()))?;
    let output_path = results_dir.join(format!("ridge-server-{}.json", now.format("%Y%m%dT%H%M%SZ")));
    fs::write(&output_path, serde_json::to_string_pretty(&run)?)?;

    println!("\n========================================================================");
    println!("Benchmark complete!");
    println!("Results saved to: {}", output_path.display());
    println!("========================================================================");

    Ok(())
}
