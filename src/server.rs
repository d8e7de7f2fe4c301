use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::{Predictor, WeatherSummary};
use crate::error::UpstreamError;
use crate::report::PredictionJson;
use crate::sources::NewsArticle;

/// Failures of the signal endpoints. Predictions never produce one.
pub enum ApiError {
    NotFound(String),
    Upstream(UpstreamError),
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        ApiError::Upstream(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            ApiError::Upstream(err) => {
                warn!(error = %err, "Signal endpoint failed");
                let status = match err {
                    UpstreamError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
                    UpstreamError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, err.to_string())
            }
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    predictor: Arc<Predictor>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictionRequest {
    #[serde(default)]
    pub area: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: PredictionJson,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SocialSummary {
    #[serde(rename = "TwitterSummary")]
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub message: String,
}

pub fn build_router(predictor: Arc<Predictor>) -> Router {
    Router::new()
        .route("/prediction", post(prediction))
        .route("/healthcheck", get(healthcheck))
        .route("/weather/summary/{query}", get(weather_summary))
        .route("/news/summary", get(news_summary))
        .route("/twitter/summary", get(social_summary))
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
        .with_state(AppState { predictor })
}

pub async fn serve(predictor: Arc<Predictor>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Civic forecast API listening on {addr}");
    axum::serve(listener, build_router(predictor)).await?;
    Ok(())
}

/// An empty or unreadable body is a city-wide request; the endpoint never
/// rejects a caller.
fn parse_request(body: &[u8]) -> PredictionRequest {
    if body.iter().all(u8::is_ascii_whitespace) {
        return PredictionRequest::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|err| {
        warn!(error = %err, "Unreadable prediction request, predicting city-wide");
        PredictionRequest::default()
    })
}

async fn prediction(State(state): State<AppState>, body: Bytes) -> Json<PredictionResponse> {
    let request = parse_request(&body);
    let forecast = match request.area.as_deref() {
        Some(area) if !area.trim().is_empty() => state.predictor.predict_area(area).await,
        _ => state.predictor.predict_city().await,
    };
    Json(PredictionResponse {
        prediction: PredictionJson::from_forecast(&forecast),
    })
}

async fn weather_summary(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> Result<Json<WeatherSummary>, ApiError> {
    Ok(Json(state.predictor.weather_summary(&query).await?))
}

async fn news_summary(State(state): State<AppState>) -> Result<Json<Vec<NewsArticle>>, ApiError> {
    let articles = state.predictor.recent_news().await?;
    if articles.is_empty() {
        return Err(ApiError::NotFound("No news articles found".to_string()));
    }
    Ok(Json(articles))
}

async fn social_summary(State(state): State<AppState>) -> Result<Json<SocialSummary>, ApiError> {
    let summary = state.predictor.social_summary().await?;
    Ok(Json(SocialSummary { summary }))
}

async fn healthcheck() -> Json<Health> {
    Json(Health {
        status: "success".to_string(),
        message: "API is running".to_string(),
    })
}
