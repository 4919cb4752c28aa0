//! HTTP transport: `POST /predict`, a health check, and the static frontend.

use std::path::Path;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::error::error_chain;
use crate::predict::{Prediction, Predictor};

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub predictor: Predictor,
}

impl AppState {
    pub fn new(predictor: Predictor) -> Self {
        Self { predictor }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    /// Base64 image, optionally prefixed with a `data:` URI header
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Uniform failure body: every error becomes a 500 carrying its message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Classifies one image and returns the top ranked labels
pub async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ErrorResponse> {
    let predictor = state.predictor.clone();
    let outcome = tokio::task::spawn_blocking(move || predictor.predict_payload(&request.image)).await;

    match outcome {
        Ok(Ok(predictions)) => Ok(Json(PredictResponse { predictions })),
        Ok(Err(e)) => {
            error!("Prediction failed ({} error): {}", e.kind(), error_chain(&e));
            Err(ErrorResponse { detail: e.to_string() })
        }
        Err(e) => {
            error!("Prediction task aborted: {}", e);
            Err(ErrorResponse { detail: e.to_string() })
        }
    }
}

/// Build the router. Paths other than the API are served from `frontend_dir` when given.
pub fn build_router(state: AppState, frontend_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health_check));

    let router = match frontend_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true)),
        None => router,
    };

    router
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve `app` on an already bound listener until the process stops.
pub async fn serve(listener: TcpListener, app: Router) -> Result<(), std::io::Error> {
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}

/// Bind `addr` and start the server
pub async fn start_server(addr: &str, state: AppState, frontend_dir: Option<&Path>) -> Result<(), std::io::Error> {
    info!("Starting glyphcast server on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    serve(listener, build_router(state, frontend_dir)).await
}
