//! Session Resource Store
//!
//! A session groups one source document, its stamp images and the
//! stamped result. Artifacts are addressed by a structured
//! [`ArtifactKey`] rather than by parsing file names.

mod store;
mod types;

pub use store::{ArtifactStorage, LocalArtifactStorage, MemoryArtifactStorage, SessionStore};
pub use types::{
    ArtifactKey, ArtifactKind, ArtifactMeta, DocumentHandle, SessionId, StampHandle,
};
