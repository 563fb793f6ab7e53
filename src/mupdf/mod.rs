//! Low-level MuPDF Wrapper
//!
//! MuPDF's `fz_context` is **NOT thread-safe**. `SafeDocument` keeps the
//! source bytes and opens a fresh MuPDF document for every operation,
//! serialising access through a mutex. Callers run these operations on
//! blocking threads.
//!
//! # Usage
//!
//! ```rust,ignore
//! let doc = SafeDocument::from_bytes(pdf_bytes)?;
//! let bounds = doc.with_page(0, |page| Ok(page.bounds()?))?;
//! ```

mod safe;

pub use safe::SafeDocument;
