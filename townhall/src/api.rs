//! HTTP JSON API.
//!
//! | Method | Path               | Response                  |
//! |--------|--------------------|---------------------------|
//! | GET    | `/api/{kind}`      | array of records          |
//! | POST   | `/api/{kind}`      | the created record        |
//! | DELETE | `/api/{kind}/{id}` | `{"success": true}`       |
//!
//! A POST body is only read as JSON when it is declared `application/json`. Any other body, and
//! an empty one, counts as `{}`.

use crate::common::Error;
use crate::service::MutationService;
use axum::body::Bytes;
use axum::extract::{self, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use log::warn;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use townhall_base::{Fields, Kind, Record, UnknownKind};

pub enum ApiError {
    UnknownKind(UnknownKind),
    BadRequest(String),
    Service(Error),
}

impl From<UnknownKind> for ApiError {
    fn from(value: UnknownKind) -> Self {
        ApiError::UnknownKind(value)
    }
}

impl From<Error> for ApiError {
    fn from(value: Error) -> Self {
        ApiError::Service(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownKind(e) => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Service(e) => {
                warn!("request failed: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// API routes, with `public_dir` served for everything else when given.
pub fn router(service: Arc<MutationService>, public_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/api/:kind", get(list).post(create))
        .route("/api/:kind/:id", delete(remove))
        .with_state(service);
    match public_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    }
}

async fn list(
    State(service): State<Arc<MutationService>>,
    extract::Path(kind): extract::Path<String>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let kind: Kind = kind.parse()?;
    Ok(Json(service.list(kind).await))
}

async fn create(
    State(service): State<Arc<MutationService>>,
    extract::Path(kind): extract::Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Record>, ApiError> {
    let kind: Kind = kind.parse()?;
    let fields = fields_from_body(&headers, &body)?;
    let record = service.create(kind, fields).await?;
    Ok(Json(record))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

fn fields_from_body(headers: &HeaderMap, body: &[u8]) -> Result<Fields, ApiError> {
    if !is_json(headers) || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Fields::new());
    }
    match serde_json::from_slice(body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(ApiError::BadRequest("body must be a JSON object".into())),
        Err(e) => Err(ApiError::BadRequest(format!("invalid JSON body: {e}"))),
    }
}

async fn remove(
    State(service): State<Arc<MutationService>>,
    extract::Path((kind, id)): extract::Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let kind: Kind = kind.parse()?;
    service.delete(kind, &id).await?;
    Ok(Json(json!({ "success": true })))
}
