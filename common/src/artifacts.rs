//! Fitted scaler and ridge regressor, loaded once at startup.
//!
//! Both artifacts are JSON exports of the fitted parameters. Loading checks
//! the vector lengths and, when present, the exported column names, so a
//! model fit on a different column order never reaches the request path.

use crate::features::{FeatureVector, FEATURE_NAMES, NUM_FEATURES};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_SCALER_FILE: &str = "scaler.json";
pub const DEFAULT_MODEL_FILE: &str = "ridge.json";

pub type ArtifactResult<T> = Result<T, ArtifactError>;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{artifact}: expected {expected} values, found {actual}")]
    Shape {
        artifact: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{artifact}: fitted on columns {found:?}, expected {:?}", FEATURE_NAMES)]
    FeatureOrder {
        artifact: &'static str,
        found: Vec<String>,
    },
}

/// Normalizes a raw feature vector with parameters fixed at training time.
pub trait Scaler: Send + Sync {
    fn transform(&self, features: &FeatureVector) -> Array1<f64>;
}

/// Maps a normalized feature vector to a single continuous output.
pub trait Regressor: Send + Sync {
    fn predict(&self, normalized: &Array1<f64>) -> f64;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerFile {
    mean: Vec<f64>,
    scale: Vec<f64>,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RidgeFile {
    coef: Vec<f64>,
    intercept: f64,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
}

/// `(x - mean) / scale`, column-wise.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> ArtifactResult<Self> {
        check_len("scaler.mean", &mean)?;
        check_len("scaler.scale", &scale)?;
        // Constant columns are exported with a zero scale; leave them unscaled.
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect::<Vec<_>>();
        Ok(Self {
            mean: Array1::from(mean),
            scale: Array1::from(scale),
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> ArtifactResult<Self> {
        let file: ScalerFile = read_json(path.as_ref())?;
        check_feature_names("scaler", file.feature_names.as_deref())?;
        Self::new(file.mean, file.scale)
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, features: &FeatureVector) -> Array1<f64> {
        let raw = Array1::from(features.to_vec());
        (raw - &self.mean) / &self.scale
    }
}

/// Linear model with L2-regularized coefficients: `coef . x + intercept`.
#[derive(Debug, Clone)]
pub struct RidgeRegressor {
    coef: Array1<f64>,
    intercept: f64,
}

impl RidgeRegressor {
    pub fn new(coef: Vec<f64>, intercept: f64) -> ArtifactResult<Self> {
        check_len("ridge.coef", &coef)?;
        Ok(Self {
            coef: Array1::from(coef),
            intercept,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> ArtifactResult<Self> {
        let file: RidgeFile = read_json(path.as_ref())?;
        check_feature_names("ridge", file.feature_names.as_deref())?;
        Self::new(file.coef, file.intercept)
    }
}

impl Regressor for RidgeRegressor {
    fn predict(&self, normalized: &Array1<f64>) -> f64 {
        self.coef.dot(normalized) + self.intercept
    }
}

/// Scaler and model applied in sequence.
pub struct Predictor {
    scaler: Box<dyn Scaler>,
    model: Box<dyn Regressor>,
}

impl Predictor {
    pub fn new(scaler: Box<dyn Scaler>, model: Box<dyn Regressor>) -> Self {
        Self { scaler, model }
    }

    pub fn predict(&self, features: &FeatureVector) -> f64 {
        let normalized = self.scaler.transform(features);
        debug!(?normalized, "features scaled");
        self.model.predict(&normalized)
    }
}

/// Everything the server needs from the models directory.
pub struct Artifacts {
    pub predictor: Predictor,
    pub scaler_path: PathBuf,
    pub model_path: PathBuf,
    pub load_time_ms: f64,
}

impl Artifacts {
    /// Load `scaler.json` and `ridge.json` from `models_dir`.
    pub fn load<P: AsRef<Path>>(models_dir: P) -> ArtifactResult<Self> {
        Self::load_files(models_dir, DEFAULT_SCALER_FILE, DEFAULT_MODEL_FILE)
    }

    pub fn load_files<P: AsRef<Path>>(
        models_dir: P,
        scaler_file: &str,
        model_file: &str,
    ) -> ArtifactResult<Self> {
        let start_time = Instant::now();
        let scaler_path = models_dir.as_ref().join(scaler_file);
        let model_path = models_dir.as_ref().join(model_file);

        let scaler = StandardScaler::load(&scaler_path)?;
        info!("✓ Scaler loaded from {}", scaler_path.display());
        let model = RidgeRegressor::load(&model_path)?;
        info!("✓ Model loaded from {}", model_path.display());

        Ok(Self {
            predictor: Predictor::new(Box::new(scaler), Box::new(model)),
            scaler_path,
            model_path,
            load_time_ms: start_time.elapsed().as_secs_f64() * 1000.0,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> ArtifactResult<T> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    serde_json::from_str(&contents).map_err(|source| ArtifactError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn check_len(artifact: &'static str, values: &[f64]) -> ArtifactResult<()> {
    if values.len() != NUM_FEATURES {
        return Err(ArtifactError::Shape {
            artifact,
            expected: NUM_FEATURES,
            actual: values.len(),
        });
    }
    Ok(())
}

fn check_feature_names(artifact: &'static str, names: Option<&[String]>) -> ArtifactResult<()> {
    match names {
        Some(names) if !names.iter().map(String::as_str).eq(FEATURE_NAMES) => {
            Err(ArtifactError::FeatureOrder {
                artifact,
                found: names.to_vec(),
            })
        }
        _ => Ok(()),
    }
}
