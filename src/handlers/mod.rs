// HTTP request handlers
// Thin glue over the session core: request parsing, cookie handling, and
// error-to-status mapping live here and nowhere deeper

pub mod health;
pub mod session;
pub mod upload;

use crate::session::{SessionError, SessionManager, StoreError};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use chrono::Duration;
use serde_json::{json, Value};
use std::sync::Arc;

/// Cookie carrying the signed session token.
pub const COOKIE_NAME: &str = "file_upload";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
}

/// Extract the session token from the request's cookie header, if present.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == COOKIE_NAME).then(|| value.to_string())
    })
}

/// Build the `Set-Cookie` value attaching a session token.
pub fn set_cookie_value(token: &str, max_age: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        COOKIE_NAME,
        token,
        max_age.num_seconds()
    )
}

/// Map a session-core failure to an HTTP response. A store outage is a
/// service error, not a silently-empty session.
pub(crate) fn error_response(e: &SessionError) -> (StatusCode, Json<Value>) {
    let status = match e {
        SessionError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}
