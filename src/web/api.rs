use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use super::AppState;
use crate::prediction::PredictionError;

// === Root ===

pub async fn get_version(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "version": state.settings.app_version }))
}

// === Health Check ===

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub models_loaded: usize,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: state.settings.app_version.clone(),
        models_loaded: state.predictor.models().loaded_count().await,
    })
}

// === Prediction ===

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    pub from_date: String,
    pub to_date: String,
}

pub async fn get_polynomial_regression(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    query: Result<Query<PredictQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            warn!("Rejected prediction request for {}: {}", symbol, rejection);
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": "Missing or invalid query parameters"})),
            )
                .into_response();
        }
    };

    match state
        .predictor
        .predict(&symbol, &query.from_date, &query.to_date)
        .await
    {
        Ok(forecast) => {
            info!(
                "Served {} predictions for {} ({} to {}), start index {}",
                forecast.predictions.len(),
                symbol,
                query.from_date,
                query.to_date,
                forecast.start_index
            );
            (StatusCode::OK, Json(json!({"prediction": forecast.predictions}))).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Maps prediction failures to status codes without leaking internals
pub struct ApiError(pub PredictionError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            PredictionError::InvalidDate { .. } => (StatusCode::BAD_REQUEST, "Invalid date"),
            PredictionError::InvalidDateRange { .. } => (StatusCode::BAD_REQUEST, "Invalid date range"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "unknown server error"),
        };

        if self.0.is_client_error() {
            warn!("{}", self.0);
        } else {
            error!("Prediction failed: {}", error_report(self.0));
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<PredictionError> for ApiError {
    fn from(e: PredictionError) -> Self {
        Self(e)
    }
}

/// The error and its causes on one line
fn error_report(err: PredictionError) -> String {
    format!("{:#}", anyhow::Error::from(err))
}
