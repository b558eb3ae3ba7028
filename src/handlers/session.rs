// Session query handlers

use super::{error_response, session_cookie, AppState};
use crate::session::SessionRecord;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

fn no_session() -> (StatusCode, Json<Value>) {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "invalid session" })),
    )
}

/// Return the caller's stored session record.
pub async fn get_sum(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SessionRecord>, (StatusCode, Json<Value>)> {
    let token = session_cookie(&headers).ok_or_else(no_session)?;

    let id = state.manager.verify_token(&token).map_err(|e| {
        debug!("Rejected session credential: {}", e);
        no_session()
    })?;

    match state.manager.get(id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(no_session()),
        Err(e) => Err(error_response(&e)),
    }
}

/// Diagnostic enumeration of every stored session.
pub async fn get_all_sessions(
    State(state): State<AppState>,
) -> Result<Json<HashMap<Uuid, SessionRecord>>, (StatusCode, Json<Value>)> {
    match state.manager.get_all().await {
        Ok(all) => Ok(Json(all)),
        Err(e) => Err(error_response(&e)),
    }
}
