//! Thread-safe document wrapper for MuPDF
//!
//! # Design
//!
//! MuPDF documents are not thread-safe. This wrapper:
//!
//! 1. Stores the document bytes behind an `Arc`
//! 2. Opens a fresh document for each operation
//! 3. Uses `parking_lot::Mutex` to serialize access
//!
//! No MuPDF handle outlives the closure it was opened for, so every
//! exit path (including errors) releases it.

use std::sync::Arc;

use mupdf::{Document, Page};
use parking_lot::Mutex;

use crate::document::{DocumentError, DocumentFormat, DocumentResult};

/// Thread-safe document wrapper
pub struct SafeDocument {
    /// Document bytes
    data: Arc<Vec<u8>>,
    /// Mutex for serializing access
    _lock: Mutex<()>,
}

// SAFETY: SafeDocument only owns `Arc<Vec<u8>>` and a
// `parking_lot::Mutex<()>`. MuPDF handles are created inside `with_doc`
// while the mutex is held and dropped before it is released, so no
// MuPDF state is ever shared between threads.
unsafe impl Send for SafeDocument {}
unsafe impl Sync for SafeDocument {}

impl SafeDocument {
    /// Wrap PDF bytes after a header check
    ///
    /// The bytes are shared, not copied. MuPDF only parses them inside
    /// [`with_doc`](Self::with_doc), so a broken body surfaces there.
    pub fn from_bytes(data: Arc<Vec<u8>>) -> DocumentResult<Self> {
        if DocumentFormat::from_magic_bytes(&data) != Some(DocumentFormat::Pdf) {
            return Err(DocumentError::DecodeFailure(
                "missing %PDF header".to_string(),
            ));
        }

        Ok(Self {
            data,
            _lock: Mutex::new(()),
        })
    }

    /// Open a fresh document instance for an operation
    fn open_document(&self) -> DocumentResult<Document> {
        Document::from_bytes(&self.data, DocumentFormat::Pdf.mime_type()).map_err(Into::into)
    }

    /// Execute a closure with access to the document
    ///
    /// This opens a fresh document, executes the closure, and ensures
    /// the document is dropped afterward. Access is serialized via mutex.
    pub fn with_doc<F, R>(&self, f: F) -> DocumentResult<R>
    where
        F: FnOnce(&Document) -> DocumentResult<R>,
    {
        let _guard = self._lock.lock();
        let doc = self.open_document()?;
        f(&doc)
    }

    /// Execute a closure with one loaded page (0-based)
    pub fn with_page<F, R>(&self, page_index: usize, f: F) -> DocumentResult<R>
    where
        F: FnOnce(&Page) -> DocumentResult<R>,
    {
        self.with_doc(|doc| {
            let page_count = doc.page_count()? as usize;
            if page_index >= page_count {
                return Err(DocumentError::InvalidPage {
                    page: page_index + 1,
                    page_count,
                });
            }

            let page = doc.load_page(page_index as i32)?;
            f(&page)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_pdf_bytes() {
        let result = SafeDocument::from_bytes(Arc::new(b"GIF89a not a pdf".to_vec()));
        assert!(matches!(result, Err(DocumentError::DecodeFailure(_))));
    }

    #[test]
    fn test_rejects_empty_bytes() {
        let result = SafeDocument::from_bytes(Arc::new(Vec::new()));
        assert!(matches!(result, Err(DocumentError::DecodeFailure(_))));
    }
}
