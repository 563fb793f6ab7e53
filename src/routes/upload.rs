//! Upload endpoint
//!
//! Accepts one document (`pdf_file`) and any number of stamp images
//! (`stamp_files`) in a single multipart request and opens a session
//! for them.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;

use super::{stamp_summary, PdfInfo, StampSummary};
use crate::document::{DocumentError, DocumentFormat};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Stamp image extensions accepted at upload
const STAMP_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

#[derive(Serialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub pdf_info: PdfInfo,
    pub stamps: Vec<StampSummary>,
}

struct UploadedFile {
    filename: String,
    data: Vec<u8>,
}

/// Lower-cased extension of a file name
fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Reduce a client-supplied file name to a safe display name
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

fn is_document(filename: &str) -> bool {
    extension(filename)
        .and_then(|ext| DocumentFormat::from_extension(&ext))
        .is_some()
}

fn is_stamp_image(filename: &str) -> bool {
    extension(filename)
        .map(|ext| STAMP_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Upload a document and its stamps
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut document: Option<UploadedFile> = None;
    let mut stamps: Vec<(u32, UploadedFile)> = Vec::new();
    let mut stamp_position: u32 = 0;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read upload: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();
        let filename = field.file_name().map(sanitize_filename);

        match name.as_str() {
            "pdf_file" => {
                let filename = filename.ok_or_else(|| {
                    AppError::BadRequest("pdf_file has no file name".to_string())
                })?;
                if !is_document(&filename) {
                    return Err(DocumentError::UnsupportedFormat(filename).into());
                }
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read document: {}", e)))?;
                document = Some(UploadedFile { filename, data: data.to_vec() });
            }
            "stamp_files" => {
                let index = stamp_position;
                stamp_position += 1;

                let Some(filename) = filename.filter(|f| is_stamp_image(f)) else {
                    tracing::warn!(stamp_index = index, "Skipping stamp with unsupported file type");
                    continue;
                };
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read stamp: {}", e)))?;
                stamps.push((index, UploadedFile { filename, data: data.to_vec() }));
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown upload field");
            }
        }
    }

    let document = document
        .ok_or_else(|| AppError::BadRequest("No document provided. Use field name 'pdf_file'".to_string()))?;

    // Reject undecodable documents before a session exists
    let geometry = state.geometry().clone();
    let (pages, data) = tokio::task::spawn_blocking(move || {
        geometry
            .page_sizes(&document.data)
            .map(|pages| (pages, document.data))
    })
    .await
    .map_err(|e| AppError::Internal(format!("Page geometry task failed: {}", e)))??;

    let store = state.store();
    let session = store.create_session().await;
    store.store_document(session, &document.filename, data).await?;

    let mut summaries = Vec::with_capacity(stamps.len());
    for (index, stamp) in stamps {
        match store
            .store_stamp_image(session, index, &stamp.filename, stamp.data)
            .await
        {
            Ok(handle) => summaries.push(stamp_summary(session, &handle)),
            Err(DocumentError::DecodeFailure(e)) => {
                tracing::warn!(
                    session_id = %session,
                    stamp_index = index,
                    error = %e,
                    "Skipping unreadable stamp image"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        session_id = %session,
        filename = %document.filename,
        pages = pages.len(),
        stamps = summaries.len(),
        "Upload complete"
    );

    Ok(Json(UploadResponse {
        session_id: session.to_string(),
        pdf_info: PdfInfo::new(pages),
        stamps: summaries,
    }))
}
