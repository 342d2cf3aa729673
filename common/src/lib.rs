pub mod artifacts;
pub mod config;
pub mod features;
pub mod http;
pub mod stats;

pub use artifacts::{ArtifactError, Artifacts, Predictor, Regressor, RidgeRegressor, Scaler, StandardScaler};
pub use config::{BenchmarkConfig, ScenarioConfig, ServerConfig};
pub use features::{FeatureVector, FormError, PredictForm, FEATURE_NAMES, NUM_FEATURES};
pub use http::{HealthResponse, InfoResponse};
pub use stats::LatencyStats;
