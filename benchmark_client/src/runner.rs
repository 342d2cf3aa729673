use crate::client::{Outcome, PredictClient, Row};
use anyhow::{Context, Result};
use common::{LatencyStats, ScenarioConfig};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Instant;

/// Observations cycled through by every scenario, in feature order.
pub const SAMPLE_ROWS: [Row; 6] = [
    [29.0, 57.0, 18.0, 0.0, 65.7, 3.4, 1.3, 0.0, 0.0],
    [32.0, 71.0, 12.0, 0.7, 57.1, 2.5, 1.1, 0.0, 0.0],
    [35.0, 47.0, 14.0, 0.0, 89.4, 21.6, 8.9, 1.0, 0.0],
    [26.0, 82.0, 22.0, 13.1, 47.1, 2.5, 0.5, 0.0, 1.0],
    [37.0, 36.0, 13.0, 0.0, 92.5, 27.2, 11.7, 1.0, 1.0],
    [31.0, 65.0, 19.0, 0.2, 84.6, 10.5, 5.8, 1.0, 1.0],
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub concurrency: usize,
    pub num_requests: usize,
    pub latency_ms: LatencyStats,
    pub throughput_qps: f64,
    pub duration_sec: f64,
    pub rejected: usize,
    pub failed: usize,
    /// Predictions that differ from the reference pass for the same row.
    pub inconsistent: usize,
    /// `/info` request counter delta across the scenario.
    pub server_requests: Option<u64>,
}

impl ScenarioReport {
    pub fn error_rate(&self) -> f64 {
        if self.num_requests == 0 {
            return 0.0;
        }
        (self.rejected + self.failed) as f64 / self.num_requests as f64
    }

    pub fn print(&self) {
        println!("\nResults:");
        println!("  Duration: {:.2}s", self.duration_sec);
        println!("  Throughput: {:.2} req/s", self.throughput_qps);
        println!("  Latency: {}", self.latency_ms);
        println!(
            "  Rejected: {}  Failed: {}  Inconsistent: {}",
            self.rejected, self.failed, self.inconsistent
        );
        println!("  Error rate: {:.2}%", self.error_rate() * 100.0);
        if let Some(seen) = self.server_requests {
            println!("  Server counted: {} requests", seen);
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    latencies_ms: Vec<f64>,
    rejected: usize,
    failed: usize,
    inconsistent: usize,
}

impl Tally {
    fn record(&mut self, outcome: Outcome, expected: Option<f64>, latency_ms: f64) {
        match outcome {
            Outcome::Predicted(value) => {
                self.latencies_ms.push(latency_ms);
                // Bitwise, so a NaN reference matches a NaN prediction.
                if expected.is_some_and(|e| e.to_bits() != value.to_bits()) {
                    self.inconsistent += 1;
                }
            }
            Outcome::Rejected(_) => self.rejected += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb.set_message(message);
    pb
}

pub struct Runner<'a> {
    client: &'a PredictClient,
    /// Prediction for each of `SAMPLE_ROWS`, from a sequential first pass.
    reference: Vec<Option<f64>>,
}

impl<'a> Runner<'a> {
    pub fn new(client: &'a PredictClient) -> Self {
        let reference = SAMPLE_ROWS
            .iter()
            .map(|row| match client.predict(row) {
                Outcome::Predicted(value) => Some(value),
                _ => None,
            })
            .collect();
        Self { client, reference }
    }

    pub fn reference(&self) -> &[Option<f64>] {
        &self.reference
    }

    pub fn warmup(&self, num_requests: usize) {
        println!("\nWarming up server ({} requests)...", num_requests);

        let pb = progress_bar(num_requests, "Warmup");
        let failures = SAMPLE_ROWS
            .iter()
            .cycle()
            .take(num_requests)
            .filter(|row| {
                let ok = matches!(self.client.predict(row), Outcome::Predicted(_));
                pb.inc(1);
                !ok
            })
            .count();
        pb.finish_with_message("✓ Warmup complete");

        if failures > 0 {
            println!("⚠ Warning: {}/{} warmup requests failed", failures, num_requests);
        }
    }

    pub fn run(&self, scenario: &ScenarioConfig) -> Result<ScenarioReport> {
        println!("\n{}", "=".repeat(70));
        println!("Scenario: {} ({})", scenario.name, scenario.description);
        println!(
            "  {} requests, {} concurrent",
            scenario.num_requests, scenario.concurrency
        );
        println!("{}", "=".repeat(70));

        let before = self.client.info().ok().map(|i| i.total_requests);

        let tally = Mutex::new(Tally::default());
        let pb = progress_bar(scenario.num_requests, "Running");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(scenario.concurrency.max(1))
            .build()
            .context("Failed to build request pool")?;

        let start_time = Instant::now();
        pool.install(|| {
            (0..scenario.num_requests).into_par_iter().for_each(|i| {
                let idx = i % SAMPLE_ROWS.len();
                let sent = Instant::now();
                let outcome = self.client.predict(&SAMPLE_ROWS[idx]);
                let latency_ms = sent.elapsed().as_secs_f64() * 1000.0;

                if let Ok(mut tally) = tally.lock() {
                    tally.record(outcome, self.reference[idx], latency_ms);
                }
                pb.inc(1);
            });
        });
        let duration_sec = start_time.elapsed().as_secs_f64();
        pb.finish_with_message("✓ Complete");

        let after = self.client.info().ok().map(|i| i.total_requests);
        let tally = tally
            .into_inner()
            .map_err(|_| anyhow::anyhow!("Result collector poisoned"))?;

        Ok(ScenarioReport {
            name: scenario.name.clone(),
            concurrency: scenario.concurrency,
            num_requests: scenario.num_requests,
            throughput_qps: tally.latencies_ms.len() as f64 / duration_sec,
            latency_ms: LatencyStats::from_samples(&tally.latencies_ms),
            duration_sec,
            rejected: tally.rejected,
            failed: tally.failed,
            inconsistent: tally.inconsistent,
            server_requests: before.zip(after).map(|(b, a)| a.saturating_sub(b)),
        })
    }
}
