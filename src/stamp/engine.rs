//! Stamp Placement Engine
//!
//! Orchestrates one apply call: loads the session's document and stamps,
//! plans the draws, composites them on the blocking pool and commits the
//! result as a canonical/preview pair.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::Rng;

use super::jitter::JitterPolicy;
use super::planner::{plan_placements, resolve_target_pages};
use super::types::{ApplyReport, ApplyRequest};
use crate::document::{DocumentEngine, DocumentError, DocumentResult, EditableDocument, StampImage};
use crate::session::SessionStore;

/// Applies placement instructions to session documents
pub struct StampEngine<E: DocumentEngine> {
    store: SessionStore,
    engine: Arc<E>,
    policy: JitterPolicy,
}

impl<E: DocumentEngine> Clone for StampEngine<E> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            engine: Arc::clone(&self.engine),
            policy: self.policy,
        }
    }
}

impl<E: DocumentEngine> StampEngine<E> {
    pub fn new(store: SessionStore, engine: Arc<E>) -> Self {
        Self {
            store,
            engine,
            policy: JitterPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: JitterPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Apply `request` and commit the stamped document
    ///
    /// Fails only when the session or document is missing or undecodable,
    /// or the target page is invalid; nothing is committed in those cases.
    /// Missing stamps and draw failures are skipped and counted. `rng` is
    /// owned by this call, so concurrent calls never share generator state.
    pub async fn apply_stamps<R>(&self, request: &ApplyRequest, rng: R) -> DocumentResult<ApplyReport>
    where
        R: Rng + Send + 'static,
    {
        let session = request.session_id;
        let document = self.store.get_document(session).await?;
        let stamps = self.load_stamps(request).await?;

        let engine = Arc::clone(&self.engine);
        let policy = self.policy;
        let request = request.clone();

        let (bytes, report) = tokio::task::spawn_blocking(move || {
            composite(engine.as_ref(), &document.data, &request, &stamps, &policy, rng)
        })
        .await
        .map_err(|e| DocumentError::Storage(format!("Compositing task failed: {}", e)))??;

        self.store.store_result(session, bytes).await?;

        tracing::info!(
            session_id = %session,
            mode = ?report.mode,
            pages = report.pages_processed,
            drawn = report.stamps_drawn,
            skipped_missing = report.skipped_missing,
            draw_failures = report.draw_failures,
            "Applied stamps"
        );

        Ok(report)
    }

    /// Fetch every distinct stamp the request references
    async fn load_stamps(&self, request: &ApplyRequest) -> DocumentResult<HashMap<u32, StampImage>> {
        let mut stamps = HashMap::new();
        for instruction in &request.instructions {
            let index = instruction.stamp_index;
            if stamps.contains_key(&index) {
                continue;
            }

            match self.store.get_stamp(request.session_id, index).await {
                Ok((_, data)) => {
                    stamps.insert(index, StampImage { index, data });
                }
                Err(DocumentError::NotFound(_)) => {
                    tracing::warn!(
                        session_id = %request.session_id,
                        stamp_index = index,
                        "Stamp not found, skipping its instructions"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(stamps)
    }
}

/// Open, draw and serialise; the document handle is dropped on every path
fn composite<E: DocumentEngine, R: Rng>(
    engine: &E,
    data: &[u8],
    request: &ApplyRequest,
    stamps: &HashMap<u32, StampImage>,
    policy: &JitterPolicy,
    mut rng: R,
) -> DocumentResult<(Vec<u8>, ApplyReport)> {
    let mut doc = engine.open(data)?;
    let pages = resolve_target_pages(request.mode, request.target_page, doc.page_count())?;

    let available: HashSet<u32> = stamps.keys().copied().collect();
    let plan = plan_placements(
        &pages,
        &request.instructions,
        &available,
        request.mode,
        request.jitter,
        policy,
        &mut rng,
    );

    let mut stamps_drawn = 0;
    let mut draw_failures = 0;
    for placement in &plan.placements {
        let Some(image) = stamps.get(&placement.stamp_index) else {
            continue;
        };

        match doc.draw_image(placement.page_index, &placement.rect, placement.rotation, image) {
            Ok(()) => stamps_drawn += 1,
            Err(e) if e.is_recoverable() => {
                draw_failures += 1;
                tracing::warn!(
                    session_id = %request.session_id,
                    page = placement.page_index + 1,
                    stamp_index = placement.stamp_index,
                    error = %e,
                    "Failed to draw stamp, skipping"
                );
            }
            Err(e) => return Err(e),
        }
    }

    let bytes = doc.save()?;

    Ok((
        bytes,
        ApplyReport {
            session_id: request.session_id,
            mode: request.mode,
            pages_processed: pages.len(),
            stamps_drawn,
            skipped_missing: plan.skipped_missing,
            draw_failures,
        },
    ))
}
