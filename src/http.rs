//! HTTP surface
//!
//! Thin request/response plumbing over the orchestrator. Payload validation
//! is done by hand against a raw body so the 400 contract (exact messages,
//! no backend launched, no temp files allocated) holds for malformed JSON
//! and wrong content types alike.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::render::RenderService;

const ERROR_NOT_JSON: &str = "Se requiere JSON con clave 'html'";
const ERROR_MISSING_HTML: &str = "Falta la clave 'html' en el JSON";
const ERROR_EMPTY_HTML: &str = "La clave 'html' no puede estar vacía";

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub render: Arc<RenderService>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/render", post(render))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "htmltoimg" }))
}

async fn render(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request_id = short_request_id();
    let span = info_span!("render_request", request_id = %request_id);

    async move {
        info!(
            content_type = content_type(&headers).unwrap_or("<none>"),
            body_length = body.len(),
            "received render request"
        );

        let html = match validate(&headers, &body) {
            Ok(html) => html,
            Err(message) => {
                warn!(error = message, "invalid render request");
                return error_response(StatusCode::BAD_REQUEST, message);
            }
        };

        match state.render.render(&html).await {
            Ok(result) => {
                info!(url = %result.url, "render request completed");
                Json(json!({ "success": true, "url": result.url })).into_response()
            }
            Err(err) => {
                warn!(error = %err, "render request failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
            }
        }
    }
    .instrument(span)
    .await
}

/// Extract the `html` payload, enforcing the client-error contract: no
/// backend is launched and no resources are allocated past this parse.
fn validate(headers: &HeaderMap, body: &Bytes) -> Result<String, &'static str> {
    if !is_json_content_type(headers) {
        return Err(ERROR_NOT_JSON);
    }

    let payload: Value = serde_json::from_slice(body).map_err(|_| ERROR_NOT_JSON)?;

    let html = payload
        .get("html")
        .and_then(Value::as_str)
        .ok_or(ERROR_MISSING_HTML)?;

    if html.is_empty() {
        return Err(ERROR_EMPTY_HTML);
    }

    Ok(html.to_string())
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::CONTENT_TYPE)?.to_str().ok()
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    match content_type(headers) {
        Some(value) => {
            let mime = value.split(';').next().unwrap_or("").trim();
            mime.eq_ignore_ascii_case("application/json") || mime.ends_with("+json")
        }
        None => false,
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn short_request_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}
