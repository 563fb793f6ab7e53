//! Document geometry and page preview endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use super::PdfInfo;
use crate::error::{AppError, Result};
use crate::session::SessionId;
use crate::state::AppState;

/// Which copy of a session's document to read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSource {
    /// The uploaded document
    #[default]
    Original,
    /// The preview copy of the last stamped result
    Preview,
}

#[derive(Debug, Default, Deserialize)]
pub struct SourceQuery {
    #[serde(default)]
    pub source: DocumentSource,
}

#[derive(Serialize)]
pub struct PageImageResponse {
    /// `data:image/png;base64,...`
    pub image: String,
    /// Raster size in pixels
    pub width: u32,
    pub height: u32,
    /// Native page size in points
    pub page_width: f32,
    pub page_height: f32,
}

async fn load_source(
    state: &AppState,
    session: SessionId,
    source: DocumentSource,
) -> Result<Arc<Vec<u8>>> {
    let data = match source {
        DocumentSource::Original => state.store().get_document(session).await?.data,
        DocumentSource::Preview => state.export().get_preview_bytes(session).await?,
    };
    Ok(data)
}

/// Page count and native page sizes
pub async fn document_info(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<SourceQuery>,
) -> Result<Json<PdfInfo>> {
    let session = SessionId::parse(&session_id)?;
    let data = load_source(&state, session, query.source).await?;

    let geometry = state.geometry().clone();
    let pages = tokio::task::spawn_blocking(move || geometry.page_sizes(&data))
        .await
        .map_err(|e| AppError::Internal(format!("Page geometry task failed: {}", e)))??;

    Ok(Json(PdfInfo::new(pages)))
}

/// Render one page (1-based) as a PNG data URL
pub async fn render_page(
    State(state): State<AppState>,
    Path((session_id, page_num)): Path<(String, usize)>,
    Query(query): Query<SourceQuery>,
) -> Result<Json<PageImageResponse>> {
    let session = SessionId::parse(&session_id)?;
    let data = load_source(&state, session, query.source).await?;

    let page = state.geometry().render_page(data, page_num).await?;

    tracing::debug!(
        session_id = %session,
        page = page_num,
        source = ?query.source,
        bytes = page.data.len(),
        "Served page preview"
    );

    Ok(Json(PageImageResponse {
        image: format!("data:{};base64,{}", page.content_type(), BASE64.encode(&page.data)),
        width: page.width,
        height: page.height,
        page_width: page.native.width,
        page_height: page.native.height,
    }))
}
