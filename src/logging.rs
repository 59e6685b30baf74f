//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// Bodies longer than this many characters are truncated in `info` level logs.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// JSON fields whose values are never written to the logs.
const REDACTED_FIELDS: [&str; 3] = ["password", "current_password", "new_password"];

const REDACTED: &str = "********";

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] characters, it is
/// truncated and the full body is logged at the `debug` level.
/// Password fields in JSON request bodies are redacted.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read request body: {error}");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    let body_text = String::from_utf8_lossy(&body_bytes);
    let display_text = if is_json {
        redact_json_passwords(&body_text)
    } else {
        body_text.to_string()
    };
    log_body(
        &format!("Received request: {} {}", parts.method, parts.uri),
        &display_text,
    );

    let request = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read response body: {error}");
            Bytes::new()
        }
    };
    log_body(
        &format!("Sending response: {}", parts.status),
        &String::from_utf8_lossy(&body_bytes),
    );

    Response::from_parts(parts, Body::from(body_bytes))
}

/// Replace the values of password fields anywhere in a JSON document.
///
/// Text that is not valid JSON is returned unchanged.
fn redact_json_passwords(body_text: &str) -> String {
    let Ok(mut json) = serde_json::from_str::<Value>(body_text) else {
        return body_text.to_owned();
    };

    redact_value(&mut json);

    json.to_string()
}

fn redact_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&key.as_str()) {
                    *field = Value::String(REDACTED.to_owned());
                } else {
                    redact_value(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_value),
        _ => {}
    }
}

fn log_body(message: &str, body: &str) {
    match body.char_indices().nth(LOG_BODY_LENGTH_LIMIT) {
        Some((cutoff, _)) => {
            tracing::info!("{message}\nbody: {}...", &body[..cutoff]);
            tracing::debug!("Full body: {body:?}");
        }
        None => tracing::info!("{message}\nbody: {body:?}"),
    }
}
