use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::async_trait;
use axum::extract::{rejection::JsonRejection, FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use regex::Regex;

use crate::state::{ErrorResponse, MessageResponse};

pub fn json_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            message: message.into(),
        }),
    )
}

pub fn json_error_response(status: StatusCode, message: impl Into<String>) -> Response {
    json_error(status, message).into_response()
}

pub fn json_message(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(MessageResponse {
            message: message.into(),
        }),
    )
        .into_response()
}

pub fn url_escape(input: &str) -> String {
    let mut out = String::new();
    for byte in input.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*byte as char)
            }
            b' ' => out.push_str("%20"),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Drops the markdown fences models like to wrap JSON in.
pub fn strip_code_fences(reply: &str) -> String {
    reply.replace("```json", "").replace("```", "").trim().to_string()
}

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("object pattern compiles"));
static JSON_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("array pattern compiles"));

/// Widest `{...}` span in a model reply.
pub fn first_json_object(text: &str) -> Option<&str> {
    JSON_OBJECT.find(text).map(|found| found.as_str())
}

/// Widest `[...]` span in a model reply.
pub fn first_json_array(text: &str) -> Option<&str> {
    JSON_ARRAY.find(text).map(|found| found.as_str())
}

/// `Json` extractor whose rejections use the `{message}` error body.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| json_error(rejection.status(), rejection.body_text()))?;
        Ok(JsonBody(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_escape_encodes_reserved_bytes() {
        assert_eq!(url_escape("AC/DC & Co"), "AC%2FDC%20%26%20Co");
        assert_eq!(url_escape("Beyoncé"), "Beyonc%C3%A9");
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
    }

    #[test]
    fn finds_json_spans_across_lines() {
        let reply = "Sure!\n{\n  \"artist\": \"A\"\n}\nHope that helps";
        assert_eq!(first_json_object(reply), Some("{\n  \"artist\": \"A\"\n}"));
        assert_eq!(first_json_array("ids: [3,\n 1] done"), Some("[3,\n 1]"));
        assert_eq!(first_json_array("none"), None);
    }
}
