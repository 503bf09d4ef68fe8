mod catalog;
mod http;
mod metrics;
mod models;
mod pipeline;
#[cfg(test)]
mod testing;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use catalog::CategoryDescriptor;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{ApiError, PipelineRequest, ProductsResponse};
use pipeline::{Pipeline, PipelineError, PipelineErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "wb.api", "server crashed: {err}");
    }
}

async fn run() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;
    let state = AppState {
        pipeline: Pipeline::from_env(),
        prometheus_handle,
    };
    let app = build_router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "wb.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
    prometheus_handle: PrometheusHandle,
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/products", post(collect_products))
        .route("/stages/resolve_category", post(stage_resolve_category))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit_from_env()))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "wb-catalog-api",
    }))
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64 * 1024)
}

async fn metrics_endpoint(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Response {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        state.prometheus_handle.render(),
    )
        .into_response()
}

/// Collect every listing of a catalog section within a price band.
///
/// - Method: `POST`
/// - Path: `/products`
/// - Body: `PipelineRequest` (`url`, optional `low_price`, `top_price`, `discount`)
/// - Response: `ProductsResponse`; `total == 0` means nothing matched
async fn collect_products(
    State(state): State<AppState>,
    payload: Result<Json<PipelineRequest>, JsonRejection>,
) -> Result<Json<ProductsResponse>, AppError> {
    crate::metrics::inc_requests("/products");
    let Json(payload) = payload?;
    info!(target = "wb.api", url = %payload.url, "catalog run invoked");
    let response = state.pipeline.run(&payload).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ResolveCategoryRequest {
    url: String,
}

#[derive(Debug, Serialize)]
struct ResolveCategoryResponse {
    category: CategoryDescriptor,
    catalog_size: usize,
}

async fn stage_resolve_category(
    State(state): State<AppState>,
    req: Result<Json<ResolveCategoryRequest>, JsonRejection>,
) -> Result<Json<ResolveCategoryResponse>, AppError> {
    crate::metrics::inc_requests("/stages/resolve_category");
    let Json(req) = req?;
    if req.url.trim().is_empty() {
        return Err(PipelineError::invalid_request("resolve_category", "url_missing").into());
    }
    let (category, catalog_size) = state.pipeline.resolve_category(&req.url).await?;
    Ok(Json(ResolveCategoryResponse {
        category,
        catalog_size,
    }))
}

#[derive(Debug)]
enum AppError {
    Pipeline(PipelineError),
}

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Pipeline(PipelineError::invalid_request(
            "parse_request",
            rejection.body_text(),
        ))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Pipeline(err) => {
                let status = match err.kind() {
                    PipelineErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
                    PipelineErrorKind::CategoryNotFound => StatusCode::NOT_FOUND,
                    PipelineErrorKind::CategoryMalformed => StatusCode::UNPROCESSABLE_ENTITY,
                    PipelineErrorKind::TaxonomyUnavailable
                    | PipelineErrorKind::UpstreamRequestFailed => StatusCode::BAD_GATEWAY,
                    PipelineErrorKind::ResultWriteConflict => StatusCode::CONFLICT,
                    PipelineErrorKind::Unclassified => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!(target = "wb.api", stage = err.stage(), error = %err, "catalog run failed");
                }
                let payload = ApiError {
                    error: err.stage().to_string(),
                    kind: Some(err.kind().as_str().to_string()),
                    detail: Some(err.detail().to_string()),
                };
                (status, Json(payload)).into_response()
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
