//! File API handlers.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, Response},
    Json,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use super::AppState;
use crate::file::{FileRecord, UploadRequest};
use crate::web::dto::ApiResponse;
use crate::web::error::ApiError;

/// Query parameters for downloads.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    /// Password for protected files.
    #[serde(default)]
    pub password: String,
}

/// Generate a safe Content-Disposition header value for file downloads.
///
/// Handles special characters and non-ASCII filenames:
/// - Uses RFC 5987 encoding (filename*=UTF-8'') for non-ASCII characters
/// - Escapes double quotes and backslashes in the fallback filename
/// - Removes control characters to prevent header injection
fn content_disposition_header(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            c => c,
        })
        .collect();

    if fallback == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

/// POST /api/upload - Upload a file.
///
/// Request body: multipart/form-data with a "file" field and optional
/// "duration" and "password" fields.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<FileRecord>>, ApiError> {
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;
    let mut duration = String::new();
    let mut password = String::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                filename = Some(field.file_name().unwrap_or("upload").to_string());
                content_type = field.content_type().map(|s| s.to_string());
                content = Some(field.bytes().await?.to_vec());
            }
            "duration" => duration = field.text().await?,
            "password" => password = field.text().await?,
            _ => {}
        }
    }

    let filename = filename.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let content = content.ok_or_else(|| ApiError::bad_request("No file provided"))?;

    let mut request = UploadRequest::new(filename, duration)
        .with_declared_size(content.len() as u64)
        .with_password(password);
    if let Some(ct) = content_type {
        request = request.with_content_type(ct);
    }

    let record = state
        .files
        .upload(request, Box::new(std::io::Cursor::new(content)))
        .await?;

    Ok(Json(ApiResponse::new(record)))
}

/// GET /api/files - List files.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<FileRecord>>>, ApiError> {
    let files = state.files.list().await?;
    Ok(Json(ApiResponse::new(files)))
}

/// GET /api/files/:id - Download a file.
///
/// Unknown, expired and password failures all answer 404 with the same body.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response<Body>, ApiError> {
    let download = state.files.retrieve(&id, &query.password).await?;
    let record = download.record;

    Response::builder()
        .header(header::CONTENT_TYPE, &record.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&record.name),
        )
        .header(header::CONTENT_LENGTH, record.size)
        .body(Body::from_stream(ReaderStream::new(download.reader)))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

/// DELETE /api/files/:id - Delete a file.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.files.delete(&id).await?;
    Ok(Json(ApiResponse::new(())))
}
