// 统一错误响应：JSON 错误体 + x-trace-id / x-error-code 响应头。
use crate::services::doc2md::{ConvertError, ErrorKind};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, warn};
use uuid::Uuid;

pub(crate) const TRACE_HEADER: &str = "x-trace-id";
pub(crate) const ERROR_CODE_HEADER: &str = "x-error-code";

#[derive(Debug, Clone)]
pub(crate) struct ErrorMeta {
    pub code: String,
    pub message: String,
    pub status: u16,
    pub hint: String,
    pub trace_id: String,
    pub timestamp: f64,
}

impl ErrorMeta {
    pub(crate) fn to_value(&self) -> Value {
        json!({
            "code": self.code,
            "message": self.message,
            "status": self.status,
            "hint": self.hint,
            "trace_id": self.trace_id,
            "timestamp": self.timestamp,
        })
    }
}

pub(crate) fn build_error_meta(
    status: StatusCode,
    code: Option<&str>,
    message: impl Into<String>,
    hint: Option<&str>,
) -> ErrorMeta {
    let message = message.into();
    let code = code
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default_error_code(status))
        .to_string();
    let hint = hint
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default_hint(status))
        .to_string();
    ErrorMeta {
        code,
        message,
        status: status.as_u16(),
        hint,
        trace_id: format!("err_{}", Uuid::new_v4().simple()),
        timestamp: now_unix_seconds(),
    }
}

pub(crate) fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NoFileProvided | ErrorKind::EmptyFilename | ErrorKind::UnsupportedFormat => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::ExtractionFailure | ErrorKind::InternalFailure => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub(crate) fn hint_for_kind(kind: ErrorKind) -> Option<&'static str> {
    match kind {
        ErrorKind::NoFileProvided => Some("Send a multipart form with a `file` field."),
        ErrorKind::EmptyFilename => Some("Select a file before submitting the form."),
        ErrorKind::UnsupportedFormat => {
            Some("Upload one of .doc, .docx, .pdf, .xls or .xlsx (see GET /formats).")
        }
        ErrorKind::FileTooLarge => Some("Reduce the file size or raise upload.max_bytes."),
        ErrorKind::ExtractionFailure => {
            Some("The document may be corrupt or password protected.")
        }
        ErrorKind::InternalFailure => None,
    }
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    error_response_with_detail(status, None, message, None, None)
}

pub fn error_response_with_detail(
    status: StatusCode,
    code: Option<&str>,
    message: impl Into<String>,
    hint: Option<&str>,
    detail: Option<Value>,
) -> Response {
    let meta = build_error_meta(status, code, message, hint);
    let detail = build_detail_payload(&meta.message, detail);
    let payload = json!({
        "ok": false,
        "error": meta.to_value(),
        "detail": detail,
    });

    let mut response = (status, Json(payload)).into_response();
    if let Ok(value) = HeaderValue::from_str(&meta.trace_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(TRACE_HEADER), value);
    }
    if let Ok(value) = HeaderValue::from_str(&meta.code) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(ERROR_CODE_HEADER), value);
    }
    response
}

/// 内部错误完整记录到日志，响应里只给通用提示。
pub fn convert_error_response(err: &ConvertError) -> Response {
    match err.kind() {
        ErrorKind::InternalFailure => error!("conversion internal failure: {err}"),
        ErrorKind::ExtractionFailure => warn!("conversion failed: {err}"),
        _ => {}
    }
    error_response_with_detail(
        status_for_kind(err.kind()),
        Some(err.code()),
        err.public_message(),
        hint_for_kind(err.kind()),
        None,
    )
}

impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        convert_error_response(&self)
    }
}

fn build_detail_payload(message: &str, detail: Option<Value>) -> Value {
    match detail {
        Some(Value::Object(mut map)) => {
            map.entry("message".to_string())
                .or_insert_with(|| Value::String(message.to_string()));
            Value::Object(map)
        }
        Some(value) => json!({
            "message": message,
            "detail": value,
        }),
        None => json!({
            "message": message,
        }),
    }
}

fn default_error_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "BAD_REQUEST",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
        _ if status.is_server_error() => "INTERNAL_ERROR",
        _ => "REQUEST_ERROR",
    }
}

fn default_hint(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "Verify request parameters and payload format.",
        StatusCode::NOT_FOUND => "Verify requested resource path.",
        _ if status.is_server_error() => "Retry later or contact support with trace_id.",
        _ => "Inspect request and try again.",
    }
}

fn now_unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs_f64())
        .unwrap_or(0.0)
}
