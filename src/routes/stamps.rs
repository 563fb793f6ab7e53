//! Stamp listing, stamp image and apply endpoints

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{stamp_summary, StampSummary};
use crate::error::Result;
use crate::session::SessionId;
use crate::stamp::{ApplyMode, ApplyReport, ApplyRequest, PlacementInstruction};
use crate::state::AppState;

#[derive(Serialize)]
pub struct StampListResponse {
    pub stamps: Vec<StampSummary>,
}

/// Reference to a stamp: `"stamp_3"`, `"3"` or `3`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StampRef {
    Index(u32),
    Label(String),
}

impl StampRef {
    pub fn index(&self) -> Option<u32> {
        match self {
            StampRef::Index(index) => Some(*index),
            StampRef::Label(label) => label
                .strip_prefix("stamp_")
                .unwrap_or(label)
                .parse()
                .ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StampPlacementBody {
    pub stamp_id: StampRef,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub rotation: f32,
}

#[derive(Debug, Deserialize)]
pub struct ApplyStampsBody {
    pub session_id: String,
    #[serde(default)]
    pub stamps: Vec<StampPlacementBody>,
    #[serde(default)]
    pub apply_mode: ApplyMode,
    #[serde(default = "default_page")]
    pub current_page: usize,
    #[serde(default)]
    pub random_variation: bool,
}

fn default_page() -> usize {
    1
}

#[derive(Serialize)]
pub struct ApplyStampsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: ApplyReport,
    pub download_url: String,
    pub preview_url: String,
}

/// Stamps of a session, ordered by index
pub async fn list_stamps(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<StampListResponse>> {
    let session = SessionId::parse(&session_id)?;
    let stamps = state
        .store()
        .list_stamps(session)
        .await?
        .iter()
        .map(|handle| stamp_summary(session, handle))
        .collect();

    Ok(Json(StampListResponse { stamps }))
}

/// Raw stamp image bytes
pub async fn get_stamp_image(
    State(state): State<AppState>,
    Path((session_id, stamp_index)): Path<(String, u32)>,
) -> Result<Response> {
    let session = SessionId::parse(&session_id)?;
    let (handle, data) = state.store().get_stamp(session, stamp_index).await?;

    let content_type = mime_guess::from_path(&handle.filename)
        .first_or_octet_stream()
        .to_string();
    let body = std::sync::Arc::try_unwrap(data).unwrap_or_else(|shared| (*shared).clone());

    Ok((
        [(header::CONTENT_TYPE, content_type)],
        Body::from(body),
    )
        .into_response())
}

/// Apply placement instructions and commit the stamped document
pub async fn apply_stamps(
    State(state): State<AppState>,
    Json(body): Json<ApplyStampsBody>,
) -> Result<Json<ApplyStampsResponse>> {
    let session = SessionId::parse(&body.session_id)?;

    let mut unresolved = 0;
    let mut instructions = Vec::with_capacity(body.stamps.len());
    for placement in &body.stamps {
        match placement.stamp_id.index() {
            Some(stamp_index) => instructions.push(PlacementInstruction {
                stamp_index,
                x: placement.x,
                y: placement.y,
                width: placement.width,
                height: placement.height,
                rotation: placement.rotation,
            }),
            None => {
                unresolved += 1;
                tracing::warn!(
                    session_id = %session,
                    stamp_id = ?placement.stamp_id,
                    "Unrecognised stamp id, skipping"
                );
            }
        }
    }

    let request = ApplyRequest {
        session_id: session,
        instructions,
        mode: body.apply_mode,
        target_page: body.current_page,
        jitter: body.random_variation,
    };

    let mut report = state
        .stamper()
        .apply_stamps(&request, StdRng::from_entropy())
        .await?;
    report.skipped_missing += unresolved * report.pages_processed;

    Ok(Json(ApplyStampsResponse {
        success: true,
        report,
        download_url: format!("/download/{}", session),
        preview_url: format!("/api/pdf/{}/info?source=preview", session),
    }))
}
