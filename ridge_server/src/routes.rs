use crate::error::AppError;
use crate::pages;
use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header,
    response::{Html, Json},
    routing::get,
    Form, Router,
};
use common::{Artifacts, HealthResponse, InfoResponse, PredictForm, Predictor, FEATURE_NAMES};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};
use sysinfo::System;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

// Application state
pub struct AppState {
    predictor: Predictor,
    scaler_path: String,
    model_path: String,
    model_load_time_ms: f64,
    total_requests: AtomicU64,
    system: tokio::sync::Mutex<System>,
}

impl AppState {
    pub fn new(artifacts: Artifacts) -> Self {
        Self {
            predictor: artifacts.predictor,
            scaler_path: artifacts.scaler_path.display().to_string(),
            model_path: artifacts.model_path.display().to_string(),
            model_load_time_ms: artifacts.load_time_ms,
            total_requests: AtomicU64::new(0),
            system: tokio::sync::Mutex::new(System::new()),
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predictdata", get(predict_form).post(predict))
        .route("/health", get(health))
        .route("/info", get(info_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(pages::index())
}

async fn predict_form() -> Html<String> {
    Html(pages::home(None))
}

/// Decoded `(name, value)` pairs of a urlencoded or multipart body.
///
/// A body that cannot be read as a form yields no pairs, so every field is
/// reported missing instead of the request being rejected outright. File
/// parts of a multipart body are skipped.
async fn form_pairs(request: Request) -> Vec<(String, String)> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"));

    if !is_multipart {
        return match Form::<Vec<(String, String)>>::from_request(request, &()).await {
            Ok(Form(pairs)) => pairs,
            Err(rejection) => {
                debug!(%rejection, "unreadable form body");
                Vec::new()
            }
        };
    }

    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!(%rejection, "unreadable multipart body");
            return Vec::new();
        }
    };

    let mut pairs = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match field.text().await {
            Ok(value) => pairs.push((name, value)),
            Err(err) => {
                debug!(%err, "truncated multipart body");
                break;
            }
        }
    }
    pairs
}

async fn predict(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Html<String>, AppError> {
    state.total_requests.fetch_add(1, Ordering::Relaxed);

    let form = PredictForm::from_pairs(form_pairs(request).await);
    let features = form.validate().map_err(|err| {
        warn!(missing = ?err.missing, invalid = ?err.invalid, "rejected prediction request");
        err
    })?;

    let start_time = Instant::now();
    let prediction = state.predictor.predict(&features);
    debug!(
        prediction,
        elapsed_us = start_time.elapsed().as_micros() as u64,
        "prediction served"
    );

    Ok(Html(pages::home(Some(&format!("Predicted Output: {prediction}")))))
}

async fn health(State(_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: true,
    })
}

async fn info_handler(State(state): State<Arc<AppState>>) -> Result<Json<InfoResponse>, AppError> {
    let pid = sysinfo::get_current_pid().map_err(|e| AppError::Internal(e.to_string()))?;

    let (memory_rss_mb, cpu_percent) = {
        let mut system = state.system.lock().await;
        system.refresh_process(pid);
        system
            .process(pid)
            .map(|p| (p.memory() as f64 / 1024.0 / 1024.0, p.cpu_usage()))
            .unwrap_or((0.0, 0.0))
    };

    let cpu_count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    Ok(Json(InfoResponse {
        service: "ridge-server".to_string(),
        feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
        scaler_path: state.scaler_path.clone(),
        model_path: state.model_path.clone(),
        model_load_time_ms: state.model_load_time_ms,
        total_requests: state.total_requests.load(Ordering::Relaxed),
        cpu_count,
        memory_rss_mb,
        cpu_percent,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use common::{FeatureVector, Regressor, RidgeRegressor, Scaler, StandardScaler};
    use http_body_util::BodyExt;
    use ndarray::Array1;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use tower::ServiceExt;

    const EXAMPLE: &str =
        "Temperature=29&RH=57&Ws=18&Rain=0&FFMC=65.7&DMC=3.4&ISI=1.3&Classes=0&Region=0";

    struct CountingScaler(Arc<AtomicUsize>);

    impl Scaler for CountingScaler {
        fn transform(&self, features: &FeatureVector) -> Array1<f64> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Array1::from(features.to_vec())
        }
    }

    struct CountingModel(Arc<AtomicUsize>);

    impl Regressor for CountingModel {
        fn predict(&self, normalized: &Array1<f64>) -> f64 {
            self.0.fetch_add(1, Ordering::SeqCst);
            normalized.sum()
        }
    }

    fn state_with(predictor: Predictor) -> Arc<AppState> {
        Arc::new(AppState::new(Artifacts {
            predictor,
            scaler_path: PathBuf::from("models/scaler.json"),
            model_path: PathBuf::from("models/ridge.json"),
            load_time_ms: 1.0,
        }))
    }

    fn counting_app() -> (Router, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let scaler_calls = Arc::new(AtomicUsize::new(0));
        let model_calls = Arc::new(AtomicUsize::new(0));
        let predictor = Predictor::new(
            Box::new(CountingScaler(scaler_calls.clone())),
            Box::new(CountingModel(model_calls.clone())),
        );
        (router(state_with(predictor)), scaler_calls, model_calls)
    }

    fn ridge_app() -> Router {
        let scaler = StandardScaler::new(
            vec![32.0, 62.0, 15.5, 0.8, 77.8, 14.7, 4.8, 0.56, 0.5],
            vec![3.6, 14.8, 2.8, 2.0, 14.3, 12.4, 4.2, 0.5, 0.5],
        )
        .unwrap();
        let model = RidgeRegressor::new(
            vec![0.12, -0.05, 0.03, -0.02, -0.81, 0.37, 4.98, 0.41, -0.22],
            7.04,
        )
        .unwrap();
        router(state_with(Predictor::new(Box::new(scaler), Box::new(model))))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn post_form(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predictdata")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn results(page: &str) -> &str {
        let start = page.find(r#"<h2 id="results">"#).unwrap() + r#"<h2 id="results">"#.len();
        let end = start + page[start..].find("</h2>").unwrap();
        &page[start..end]
    }

    fn predicted_value(page: &str) -> f64 {
        results(page)
            .strip_prefix("Predicted Output: ")
            .unwrap()
            .parse()
            .unwrap()
    }

    #[tokio::test]
    async fn test_example_request_predicts() {
        let (status, page) = send(ridge_app(), post_form(EXAMPLE)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(predicted_value(&page).is_finite());
    }

    #[tokio::test]
    async fn test_prediction_runs_scaler_then_model_once() {
        let (app, scaler_calls, model_calls) = counting_app();
        let (status, page) = send(app, post_form(EXAMPLE)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(scaler_calls.load(Ordering::SeqCst), 1);
        assert_eq!(model_calls.load(Ordering::SeqCst), 1);
        let expected: f64 = [29.0, 57.0, 18.0, 0.0, 65.7, 3.4, 1.3, 0.0, 0.0].iter().sum();
        assert_eq!(predicted_value(&page), expected);
    }

    #[tokio::test]
    async fn test_missing_rain_is_bad_request() {
        let (app, scaler_calls, model_calls) = counting_app();
        let body = EXAMPLE.replace("&Rain=0", "");
        let (status, page) = send(app, post_form(&body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = results(&page);
        assert!(message.contains("Rain"));
        for name in FEATURE_NAMES.iter().filter(|n| **n != "Rain") {
            assert!(!message.contains(name), "unexpected {name} in {message}");
        }
        assert_eq!(scaler_calls.load(Ordering::SeqCst), 0);
        assert_eq!(model_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_fields_listed_in_fixed_order() {
        let (app, _, model_calls) = counting_app();
        // Region omitted entirely, RH and ISI sent empty.
        let body = "ISI=&Temperature=29&RH=&Ws=18&Rain=0&FFMC=65.7&DMC=3.4&Classes=0";
        let (status, page) = send(app, post_form(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            results(&page),
            "Error: Missing or empty fields: RH, ISI, Region. Please provide all required numerical inputs."
        );
        assert_eq!(model_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_numeric_is_bad_request() {
        let (app, _, model_calls) = counting_app();
        let body = EXAMPLE.replace("Ws=18", "Ws=gusty");
        let (status, page) = send(app, post_form(&body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(results(&page).contains("Non-numeric fields: Ws."));
        assert_eq!(model_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bare_post_lists_every_field() {
        let (app, _, model_calls) = counting_app();
        let request = Request::builder()
            .method("POST")
            .uri("/predictdata")
            .body(Body::empty())
            .unwrap();
        let (status, page) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            results(&page),
            format!(
                "Error: Missing or empty fields: {}. Please provide all required numerical inputs.",
                FEATURE_NAMES.join(", ")
            )
        );
        assert_eq!(model_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_json_body_is_treated_as_empty_form() {
        let (app, _, _) = counting_app();
        let request = Request::builder()
            .method("POST")
            .uri("/predictdata")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"Temperature": 29}"#))
            .unwrap();
        let (status, page) = send(app, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(results(&page).starts_with("Error: Missing or empty fields: Temperature, RH,"));
    }

    fn multipart(fields: &[(&str, &str)]) -> Request<Body> {
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--XBOUNDARY\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str("--XBOUNDARY--\r\n");

        Request::builder()
            .method("POST")
            .uri("/predictdata")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_multipart_with_one_field_lists_the_rest() {
        let (app, _, model_calls) = counting_app();
        let (status, page) = send(app, multipart(&[("Temperature", "29")])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            results(&page),
            "Error: Missing or empty fields: RH, Ws, Rain, FFMC, DMC, ISI, Classes, Region. Please provide all required numerical inputs."
        );
        assert_eq!(model_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_multipart_full_form_predicts() {
        let (app, _, model_calls) = counting_app();
        let fields: Vec<(&str, &str)> = EXAMPLE
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .collect();
        let (status, page) = send(app, multipart(&fields)).await;

        assert_eq!(status, StatusCode::OK);
        let expected: f64 = [29.0, 57.0, 18.0, 0.0, 65.7, 3.4, 1.3, 0.0, 0.0].iter().sum();
        assert_eq!(predicted_value(&page), expected);
        assert_eq!(model_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repeated_field_uses_first_value() {
        let (app, _, _) = counting_app();
        let body = format!("{EXAMPLE}&Temperature=1000");
        let (status, page) = send(app, post_form(&body)).await;

        assert_eq!(status, StatusCode::OK);
        let expected: f64 = [29.0, 57.0, 18.0, 0.0, 65.7, 3.4, 1.3, 0.0, 0.0].iter().sum();
        assert_eq!(predicted_value(&page), expected);
    }

    #[tokio::test]
    async fn test_swapping_two_fields_changes_prediction() {
        let swapped = EXAMPLE
            .replace("Temperature=29", "Temperature=57")
            .replace("RH=57", "RH=29");

        let (_, original) = send(ridge_app(), post_form(EXAMPLE)).await;
        let (_, reordered) = send(ridge_app(), post_form(&swapped)).await;

        assert_ne!(predicted_value(&original), predicted_value(&reordered));
    }

    #[tokio::test]
    async fn test_pages_never_touch_the_model() {
        let (app, scaler_calls, model_calls) = counting_app();

        let (status, page) = send(app.clone(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("/predictdata"));

        let (status, page) = send(app, get("/predictdata")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(results(&page), "");

        assert_eq!(scaler_calls.load(Ordering::SeqCst), 0);
        assert_eq!(model_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_health_and_info() {
        let (app, _, model_calls) = counting_app();
        send(app.clone(), post_form(EXAMPLE)).await;

        let (status, body) = send(app.clone(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_str(&body).unwrap();
        assert!(health.model_loaded);

        let (status, body) = send(app, get("/info")).await;
        assert_eq!(status, StatusCode::OK);
        let info: InfoResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(info.total_requests, 1);
        assert_eq!(info.feature_names, FEATURE_NAMES.to_vec());
        assert_eq!(info.model_path, "models/ridge.json");
        assert_eq!(model_calls.load(Ordering::SeqCst), 1);
    }
}
