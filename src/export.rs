//! Document Export
//!
//! Read-only access to the last committed result. Nothing is transformed
//! at export time.

use std::sync::Arc;

use crate::document::DocumentResult;
use crate::session::{SessionId, SessionStore};

/// Suggested name for downloaded results
pub const DOWNLOAD_FILE_NAME: &str = "signed_document.pdf";

#[derive(Clone)]
pub struct DocumentExport {
    store: SessionStore,
}

impl DocumentExport {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    /// Canonical result bytes, `NotFound` until an apply has succeeded
    pub async fn get_result_bytes(&self, session: SessionId) -> DocumentResult<Arc<Vec<u8>>> {
        self.store.get_result(session).await
    }

    /// Preview copy of the result
    pub async fn get_preview_bytes(&self, session: SessionId) -> DocumentResult<Arc<Vec<u8>>> {
        self.store.get_preview(session).await
    }

    pub fn download_file_name(&self) -> &'static str {
        DOWNLOAD_FILE_NAME
    }
}
