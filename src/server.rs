//! HTTP API serving the quotes
//!
//! Each route maps to one source pipeline. Successful lookups return the
//! quote as JSON; a failure with nothing cached returns a 500 envelope
//! naming the source.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::data::{SourceId, UpstreamError};
use crate::pipeline::QuoteService;

/// Body of a failed quote request
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: &'static str,
    message: String,
    source: &'static str,
}

/// A quote request that failed with nothing cached
#[derive(Debug)]
struct QuoteFailure {
    source: SourceId,
    cause: UpstreamError,
}

impl IntoResponse for QuoteFailure {
    fn into_response(self) -> Response {
        let error = match self.source {
            SourceId::Gold => "Failed to fetch gold price",
            SourceId::Silver => "Failed to fetch silver price",
        };
        let body = ErrorEnvelope {
            error,
            message: self.cause.to_string(),
            source: self.source.host(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Build the axum Router with all endpoints
pub fn router(service: Arc<QuoteService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/gold-price", get(gold_price))
        .route("/api/silver-price", get(silver_price))
        .layer(cors)
        .with_state(service)
}

/// Start the HTTP server on the given address and run until it fails
pub async fn serve(addr: SocketAddr, service: Arc<QuoteService>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(service)).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn gold_price(State(service): State<Arc<QuoteService>>) -> Response {
    quote_response(&service, SourceId::Gold).await
}

async fn silver_price(State(service): State<Arc<QuoteService>>) -> Response {
    quote_response(&service, SourceId::Silver).await
}

async fn quote_response(service: &QuoteService, source: SourceId) -> Response {
    match service.get_quote(source).await {
        Ok(quote) => Json(quote).into_response(),
        Err(cause) => {
            error!(%source, error = %cause, "quote request failed");
            QuoteFailure { source, cause }.into_response()
        }
    }
}
