//! HTTP route handlers.
//!
//! Allocation failures are reported as `{"error": "..."}` with a 200 status;
//! existing clients inspect the body, not the status line.
//!
//! Requests are matched on method alone and the id is read from the last path
//! segment, so the service answers under any base path.

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::generator::Generator;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

fn render_error(error: impl std::fmt::Display) -> Response {
    tracing::warn!(error = %error, "Lease request failed");
    Json(ErrorResponse {
        error: error.to_string(),
    })
    .into_response()
}

fn parse_id(uri: &Uri) -> Result<i64, String> {
    let raw = uri.path().rsplit('/').next().unwrap_or_default();
    raw.parse::<i64>()
        .map_err(|e| format!("invalid id {:?}: {}", raw, e))
}

async fn create_lease(generator: &dyn Generator) -> Response {
    match generator.acquire().await {
        Ok(record) => {
            tracing::info!(id = record.id, expire_at = %record.expire_at, "Lease granted");
            Json(record).into_response()
        }
        Err(e) => render_error(e),
    }
}

async fn renew_lease(generator: &dyn Generator, id: i64) -> Response {
    match generator.renew(id).await {
        Ok(record) => {
            tracing::debug!(id = record.id, expire_at = %record.expire_at, "Lease renewed");
            Json(record).into_response()
        }
        Err(e) => render_error(e),
    }
}

async fn release_lease(generator: &dyn Generator, id: i64) -> Response {
    match generator.release(id).await {
        Ok(()) => {
            tracing::info!(id, "Lease released");
            Json(DeletedResponse { deleted: true }).into_response()
        }
        Err(e) => render_error(e),
    }
}

async fn dispatch(
    State(generator): State<Arc<dyn Generator>>,
    method: Method,
    uri: Uri,
) -> Response {
    let generator = generator.as_ref();
    match method {
        Method::POST => create_lease(generator).await,
        Method::PUT => match parse_id(&uri) {
            Ok(id) => renew_lease(generator, id).await,
            Err(e) => render_error(e),
        },
        Method::DELETE => match parse_id(&uri) {
            Ok(id) => release_lease(generator, id).await,
            Err(e) => render_error(e),
        },
        other => {
            tracing::debug!(method = %other, path = uri.path(), "Unsupported method");
            (
                StatusCode::METHOD_NOT_ALLOWED,
                Json(ErrorResponse {
                    error: format!("method {other} not allowed"),
                }),
            )
                .into_response()
        }
    }
}

pub fn routes(generator: Arc<dyn Generator>) -> Router {
    Router::new().fallback(dispatch).with_state(generator)
}
