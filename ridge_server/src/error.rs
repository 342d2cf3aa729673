use crate::pages;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use serde_json::json;

pub enum AppError {
    /// Rejected form input; rendered back into the form page.
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Html(pages::home(Some(&message)))).into_response()
            }
            AppError::Internal(message) => {
                let body = Json(json!({
                    "error": message,
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}

impl From<common::FormError> for AppError {
    fn from(err: common::FormError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
