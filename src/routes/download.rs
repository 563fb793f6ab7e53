//! Result download endpoint

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::document::DocumentFormat;
use crate::error::Result;
use crate::session::SessionId;
use crate::state::AppState;

/// Serve the canonical stamped document as an attachment
pub async fn download(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response> {
    let session = SessionId::parse(&session_id)?;
    let export = state.export();
    let data = export.get_result_bytes(session).await?;

    let filename = export.download_file_name();
    let disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        filename,
        urlencoding::encode(filename)
    );

    tracing::info!(session_id = %session, size = data.len(), "Serving stamped document");

    let body = Arc::try_unwrap(data).unwrap_or_else(|shared| (*shared).clone());
    Ok((
        [
            (header::CONTENT_TYPE, DocumentFormat::Pdf.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(body),
    )
        .into_response())
}
