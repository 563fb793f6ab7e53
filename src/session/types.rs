//! Session store types

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{DocumentError, DocumentResult};

// ============================================================================
// Identity
// ============================================================================

/// Opaque, URL-safe session token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an externally supplied token; malformed tokens name no session
    pub fn parse(value: &str) -> DocumentResult<Self> {
        value
            .parse()
            .map_err(|_| DocumentError::NotFound(format!("session {}", value)))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ============================================================================
// Artifact Keys
// ============================================================================

/// Kind of artifact stored under a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Uploaded source document
    Document,
    /// Uploaded stamp image
    Stamp,
    /// Canonical stamped result
    Result,
    /// Preview copy of the stamped result
    Preview,
}

impl ArtifactKind {
    /// Storage area for this kind
    pub fn area(&self) -> &'static str {
        match self {
            ArtifactKind::Document => "documents",
            ArtifactKind::Stamp => "stamps",
            ArtifactKind::Result => "results",
            ArtifactKind::Preview => "previews",
        }
    }
}

/// Structured storage key `{session, kind, index}`
///
/// Only stamps carry an index; every other kind has at most one artifact
/// per session. Ordering is by session, then kind, then index, so a range
/// scan over one session's stamps comes back sorted by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    pub session: SessionId,
    pub kind: ArtifactKind,
    pub index: Option<u32>,
}

impl ArtifactKey {
    pub fn document(session: SessionId) -> Self {
        Self { session, kind: ArtifactKind::Document, index: None }
    }

    pub fn stamp(session: SessionId, index: u32) -> Self {
        Self { session, kind: ArtifactKind::Stamp, index: Some(index) }
    }

    pub fn result(session: SessionId) -> Self {
        Self { session, kind: ArtifactKind::Result, index: None }
    }

    pub fn preview(session: SessionId) -> Self {
        Self { session, kind: ArtifactKind::Preview, index: None }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}/{}/{}", self.kind.area(), self.session, index),
            None => write!(f, "{}/{}", self.kind.area(), self.session),
        }
    }
}

// ============================================================================
// Metadata & Handles
// ============================================================================

/// Metadata persisted next to every artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Display filename (never used for addressing)
    pub filename: String,

    /// Size in bytes
    pub size: usize,

    /// Pixel dimensions, for raster artifacts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<(u32, u32)>,

    pub stored_at: DateTime<Utc>,
}

impl ArtifactMeta {
    pub fn new(filename: impl Into<String>, size: usize) -> Self {
        Self {
            filename: filename.into(),
            size,
            dimensions: None,
            stored_at: Utc::now(),
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }
}

/// A session's source document
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    pub session_id: SessionId,
    pub filename: String,
    pub data: Arc<Vec<u8>>,
}

/// A stamp image's descriptor (bytes are fetched separately)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampHandle {
    pub index: u32,
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

impl StampHandle {
    pub(crate) fn from_meta(index: u32, meta: &ArtifactMeta) -> Self {
        let (width, height) = meta.dimensions.unwrap_or((0, 0));
        Self {
            index,
            filename: meta.filename.clone(),
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_round_trip() {
        let id = SessionId::new();
        let parsed = SessionId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_malformed_session_id_is_not_found() {
        assert!(matches!(
            SessionId::parse("../../etc/passwd"),
            Err(DocumentError::NotFound(_))
        ));
    }

    #[test]
    fn test_stamp_keys_sort_by_index() {
        let session = SessionId::new();
        let mut keys = vec![
            ArtifactKey::stamp(session, 10),
            ArtifactKey::stamp(session, 2),
            ArtifactKey::stamp(session, 0),
        ];
        keys.sort();
        let indices: Vec<_> = keys.iter().filter_map(|k| k.index).collect();
        assert_eq!(indices, vec![0, 2, 10]);
    }

    #[test]
    fn test_key_display_is_session_prefixed_per_area() {
        let session = SessionId::new();
        assert_eq!(
            ArtifactKey::stamp(session, 3).to_string(),
            format!("stamps/{}/3", session)
        );
        assert_eq!(
            ArtifactKey::result(session).to_string(),
            format!("results/{}", session)
        );
    }
}
