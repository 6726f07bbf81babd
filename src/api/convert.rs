// 转换接口：接收 multipart 上传，落盘到请求级临时目录后转换并评分。
use crate::api::errors::error_response;
use crate::core::state::AppState;
use crate::services::doc2md::{
    convert, file_extension, supported_extensions, ConversionReport, ConvertError, DocumentFormat,
};
use crate::services::scratch::ScratchSpace;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// multipart 边界与表单头的额外开销。
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(state: &AppState) -> Router<Arc<AppState>> {
    let body_limit = state
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    Router::new()
        .route("/convert", post(convert_json))
        .route("/convert/download", post(convert_download))
        .layer(DefaultBodyLimit::max(body_limit))
        .route("/formats", get(formats))
        .route("/health", get(health))
}

struct StagedUpload {
    filename: String,
    input: PathBuf,
    scratch: ScratchSpace,
}

struct FinishedConversion {
    filename: String,
    report: ConversionReport,
}

async fn convert_json(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<Value>, ConvertError> {
    let finished = run_conversion(&state, multipart).await?;
    Ok(Json(conversion_payload(&finished)))
}

async fn convert_download(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ConvertError> {
    let finished = run_conversion(&state, multipart).await?;
    let report = &finished.report;
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/markdown; charset=utf-8"),
    );
    insert_header(
        &mut headers,
        CONTENT_DISPOSITION,
        &content_disposition(&report.output_filename),
    );
    insert_header(
        &mut headers,
        HeaderName::from_static("x-quality-score"),
        &report.quality.score.to_string(),
    );
    insert_header(
        &mut headers,
        HeaderName::from_static("x-quality-issues"),
        &report.quality.issues.join("; "),
    );
    insert_header(
        &mut headers,
        HeaderName::from_static("x-ai-score"),
        &report.training.score.to_string(),
    );
    insert_header(
        &mut headers,
        HeaderName::from_static("x-ai-feedback"),
        &report.training.messages().join("; "),
    );
    Ok((StatusCode::OK, headers, finished.report.markdown).into_response())
}

async fn formats() -> Json<Value> {
    Json(json!({ "ok": true, "extensions": supported_extensions() }))
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub(crate) async fn fallback_not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn run_conversion(
    state: &AppState,
    multipart: Multipart,
) -> Result<FinishedConversion, ConvertError> {
    let staged = stage_upload(state, multipart).await?;
    let data = tokio::fs::read(&staged.input).await?;
    let settings = state.settings.clone();
    let filename = staged.filename.clone();
    let task = tokio::task::spawn_blocking(move || convert(&data, &filename, &settings));
    let joined = match state.convert_timeout() {
        Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
            ConvertError::internal(format!(
                "conversion of {} exceeded {}s",
                staged.filename,
                limit.as_secs()
            ))
        })?,
        None => task.await,
    };
    let report =
        joined.map_err(|err| ConvertError::internal(format!("conversion task failed: {err}")))??;

    staged.scratch.remove().await;
    info!(
        "served {} -> {} (quality {}, ai {})",
        staged.filename, report.output_filename, report.quality.score, report.training.score
    );
    Ok(FinishedConversion {
        filename: staged.filename,
        report,
    })
}

/// 只处理第一个文件字段，其它字段忽略。
async fn stage_upload(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<StagedUpload, ConvertError> {
    let limit = state.max_upload_bytes();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(err, limit))?
    {
        let field_name = field.name().unwrap_or("");
        if field.file_name().is_none() && field_name != "file" {
            continue;
        }
        return stage_field(state, field).await;
    }
    Err(ConvertError::no_file())
}

async fn stage_field(state: &AppState, field: Field<'_>) -> Result<StagedUpload, ConvertError> {
    let filename = field.file_name().unwrap_or("").trim().to_string();
    if filename.is_empty() {
        return Err(ConvertError::empty_filename());
    }
    let extension = file_extension(&filename);
    if DocumentFormat::from_extension(&extension).is_none() {
        return Err(ConvertError::unsupported(&extension));
    }
    let scratch = ScratchSpace::create(state.scratch_root()).await?;
    let input = scratch.input_path(&extension);
    save_field(field, &input, state.max_upload_bytes()).await?;
    Ok(StagedUpload {
        filename,
        input,
        scratch,
    })
}

async fn save_field(mut field: Field<'_>, target: &Path, limit: usize) -> Result<(), ConvertError> {
    let mut file = tokio::fs::File::create(target).await?;
    let mut written = 0usize;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|err| multipart_error(err, limit))?
    {
        written = written.saturating_add(chunk.len());
        if written > limit {
            return Err(ConvertError::too_large(limit));
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

fn multipart_error(err: MultipartError, limit: usize) -> ConvertError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ConvertError::too_large(limit)
    } else {
        ConvertError::invalid_upload(err.body_text())
    }
}

fn conversion_payload(finished: &FinishedConversion) -> Value {
    let report = &finished.report;
    json!({
        "ok": true,
        "filename": finished.filename,
        "output_filename": report.output_filename,
        "format": report.format,
        "markdown": report.markdown,
        "quality_score": report.quality.score,
        "quality_issues": report.quality.issues,
        "ai_score": report.training.score,
        "ai_feedback": report.training.feedback,
        "warnings": report.warnings,
    })
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(&ascii_header_value(value)) {
        headers.insert(name, value);
    }
}

/// 响应头只允许可见 ASCII，其它字符替换为 `?`。
fn ascii_header_value(value: &str) -> String {
    value
        .chars()
        .map(|ch| {
            if ch == ' ' || ch.is_ascii_graphic() {
                ch
            } else {
                '?'
            }
        })
        .collect()
}

fn content_disposition(filename: &str) -> String {
    let fallback = ascii_header_value(filename).replace(['"', '\\'], "_");
    let encoded = percent_encode(filename);
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

fn percent_encode(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                output.push(byte as char)
            }
            _ => output.push_str(&format!("%{byte:02X}")),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_values_are_ascii_only() {
        assert_eq!(ascii_header_value("No headers found; 短"), "No headers found; ?");
        assert_eq!(ascii_header_value("tab\there"), "tab?here");
    }

    #[test]
    fn disposition_keeps_utf8_name() {
        let value = content_disposition("报告.md");
        assert!(value.starts_with("attachment; filename=\"??.md\""));
        assert!(value.ends_with("filename*=UTF-8''%E6%8A%A5%E5%91%8A.md"));
    }

    #[test]
    fn disposition_for_plain_name() {
        assert_eq!(
            content_disposition("notes.md"),
            "attachment; filename=\"notes.md\"; filename*=UTF-8''notes.md"
        );
    }
}
