//! Blocking HTTP client for the prediction form endpoint.

use anyhow::{Context, Result};
use common::{InfoResponse, FEATURE_NAMES, NUM_FEATURES};
use std::time::{Duration, Instant};

const PREDICTION_PREFIX: &str = "Predicted Output: ";

/// One observation in feature order.
pub type Row = [f64; NUM_FEATURES];

/// What a single `POST /predictdata` came back with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Predicted(f64),
    /// Non-2xx status, e.g. a 400 validation page.
    Rejected(u16),
    /// Connection failure, timeout, or a 200 page without a prediction.
    Failed,
}

pub struct PredictClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl PredictClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Poll `/health` every two seconds until it answers 2xx.
    pub fn wait_until_healthy(&self, timeout: Duration) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let deadline = Instant::now() + timeout;

        println!("Waiting for server at {}...", self.base_url);
        while Instant::now() < deadline {
            let healthy = self
                .http
                .get(&url)
                .send()
                .map(|r| r.status().is_success())
                .unwrap_or(false);
            if healthy {
                println!("✓ Server is healthy");
                return Ok(());
            }
            std::thread::sleep(Duration::from_secs(2));
        }

        anyhow::bail!("✗ No healthy response from {} within {:?}", url, timeout)
    }

    pub fn info(&self) -> Result<InfoResponse> {
        self.http
            .get(format!("{}/info", self.base_url))
            .send()
            .and_then(|r| r.error_for_status())
            .context("Failed to query /info")?
            .json()
            .context("Malformed /info body")
    }

    pub fn predict(&self, row: &Row) -> Outcome {
        let response = match self
            .http
            .post(format!("{}/predictdata", self.base_url))
            .form(&form_fields(row))
            .send()
        {
            Ok(response) => response,
            Err(_) => return Outcome::Failed,
        };

        let status = response.status();
        if !status.is_success() {
            return Outcome::Rejected(status.as_u16());
        }

        response
            .text()
            .ok()
            .and_then(|page| parse_prediction(&page))
            .map_or(Outcome::Failed, Outcome::Predicted)
    }
}

pub fn form_fields(row: &Row) -> Vec<(&'static str, String)> {
    FEATURE_NAMES
        .iter()
        .zip(row.iter())
        .map(|(name, value)| (*name, value.to_string()))
        .collect()
}

/// Pull the predicted value out of the rendered form page.
pub fn parse_prediction(page: &str) -> Option<f64> {
    let start = page.find(PREDICTION_PREFIX)? + PREDICTION_PREFIX.len();
    let rest = &page[start..];
    let end = rest.find('<').unwrap_or(rest.len());
    rest[..end].trim().parse().ok()
}
