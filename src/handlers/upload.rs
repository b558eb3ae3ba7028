// Upload handlers
// Parse the uploaded JSON document, compute the array sum, and hand the
// result to the session manager

use super::{error_response, set_cookie_value, session_cookie, AppState};
use crate::session::FileRecord;
use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

/// Sum the numbers in an uploaded `{"array": [...]}` document.
///
/// Null elements are skipped; integers and numeric strings are accepted,
/// anything else rejects the upload.
pub fn sum_uploaded_array(bytes: &[u8]) -> Result<i64, String> {
    let document: Value =
        serde_json::from_slice(bytes).map_err(|e| format!("invalid JSON: {}", e))?;
    let array = document
        .get("array")
        .and_then(Value::as_array)
        .ok_or_else(|| "document has no \"array\" field".to_string())?;

    let mut sum: i64 = 0;
    for value in array {
        match value {
            Value::Null => {}
            Value::Number(n) => {
                sum += n
                    .as_i64()
                    .ok_or_else(|| format!("not an integer: {}", n))?;
            }
            Value::String(s) => {
                sum += s
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| format!("not an integer: {:?}", s))?;
            }
            other => return Err(format!("not an integer: {}", other)),
        }
    }
    Ok(sum)
}

async fn read_upload(multipart: &mut Multipart) -> Result<(String, Bytes), String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("malformed multipart body: {}", e))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| format!("failed to read upload: {}", e))?;
            return Ok((filename, bytes));
        }
    }
    Err("request has no \"file\" field".to_string())
}

fn bad_request(message: String) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

/// Stateless sum of the numbers in the uploaded file.
pub async fn upload_sum(
    mut multipart: Multipart,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let (filename, bytes) = read_upload(&mut multipart).await.map_err(bad_request)?;
    let sum = sum_uploaded_array(&bytes).map_err(bad_request)?;

    debug!("Summed {} without a session: {}", filename, sum);
    Ok(Json(json!({ "sum": sum })))
}

/// Sum the uploaded file and record it under the caller's session, creating
/// one when the request carries no usable credential. The session token is
/// attached to the response as a cookie.
pub async fn upload_with_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, [(HeaderName, String); 1], Json<Value>), (StatusCode, Json<Value>)> {
    let (filename, bytes) = read_upload(&mut multipart).await.map_err(bad_request)?;
    let sum = sum_uploaded_array(&bytes).map_err(bad_request)?;

    let incoming = session_cookie(&headers);
    let outcome = state
        .manager
        .process_upload(incoming.as_deref(), FileRecord { filename, sum })
        .await
        .map_err(|e| error_response(&e))?;

    let cookie = set_cookie_value(&outcome.token, state.manager.max_token_age());
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!(outcome.record)),
    ))
}
