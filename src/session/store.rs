//! Session Resource Store
//!
//! Maps a session id to the artifacts persisted for it (source document,
//! stamp images, canonical result, preview copy). Storage is pluggable:
//! local filesystem in production, in-memory for tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::types::{
    ArtifactKey, ArtifactKind, ArtifactMeta, DocumentHandle, SessionId, StampHandle,
};
use crate::document::{DocumentError, DocumentResult};

// ============================================================================
// Storage Trait
// ============================================================================

/// Trait for artifact storage backends
#[async_trait::async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Store (or atomically replace) an artifact
    async fn put(&self, key: &ArtifactKey, meta: &ArtifactMeta, data: &[u8]) -> DocumentResult<()>;

    /// Fetch an artifact, `NotFound` if absent
    async fn get(&self, key: &ArtifactKey) -> DocumentResult<(ArtifactMeta, Arc<Vec<u8>>)>;

    /// All artifacts of one kind under a session, sorted by key
    async fn list(
        &self,
        session: SessionId,
        kind: ArtifactKind,
    ) -> DocumentResult<Vec<(ArtifactKey, ArtifactMeta)>>;

    /// Check whether an artifact exists
    async fn exists(&self, key: &ArtifactKey) -> bool;
}

// ============================================================================
// Session Store (Main Implementation)
// ============================================================================

/// Session-scoped artifact store with a pluggable backend
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    /// Storage backend
    backend: Box<dyn ArtifactStorage>,

    /// Sessions created in this process that have no stored document yet
    sessions: RwLock<HashSet<SessionId>>,

    /// Per-session lock serialising result commits and reads; an entry
    /// lives only while some task holds or waits on it
    commit_locks: parking_lot::Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionStore {
    /// Create with an explicit backend
    pub fn with_backend(backend: Box<dyn ArtifactStorage>) -> Self {
        Self {
            inner: Arc::new(SessionStoreInner {
                backend,
                sessions: RwLock::new(HashSet::new()),
                commit_locks: parking_lot::Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Create with local filesystem storage
    pub fn with_local_storage(base_path: PathBuf) -> Self {
        Self::with_backend(Box::new(LocalArtifactStorage::new(base_path)))
    }

    /// Create with in-memory storage
    pub fn in_memory() -> Self {
        Self::with_backend(Box::new(MemoryArtifactStorage::default()))
    }

    // ========================================================================
    // Session Lifecycle
    // ========================================================================

    /// Create a new, empty session
    pub async fn create_session(&self) -> SessionId {
        let id = SessionId::new();
        self.inner.sessions.write().await.insert(id);
        tracing::info!(session_id = %id, "Created session");
        id
    }

    /// Fail with `NotFound` unless the session exists
    ///
    /// Once its document is stored a session is recognised by that
    /// document, including sessions created by an earlier process.
    pub async fn ensure_session(&self, session: SessionId) -> DocumentResult<()> {
        if self.inner.sessions.read().await.contains(&session) {
            return Ok(());
        }

        if self.inner.backend.exists(&ArtifactKey::document(session)).await {
            return Ok(());
        }

        Err(DocumentError::NotFound(format!("session {}", session)))
    }

    async fn commit_lock(&self, session: SessionId) -> CommitGuard<'_> {
        let lock = self
            .inner
            .commit_locks
            .lock()
            .entry(session)
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;

        CommitGuard {
            locks: &self.inner.commit_locks,
            session,
            guard: Some(guard),
        }
    }

    // ========================================================================
    // Source Document
    // ========================================================================

    pub async fn store_document(
        &self,
        session: SessionId,
        filename: &str,
        data: Vec<u8>,
    ) -> DocumentResult<DocumentHandle> {
        self.ensure_session(session).await?;

        let meta = ArtifactMeta::new(filename, data.len());
        self.inner
            .backend
            .put(&ArtifactKey::document(session), &meta, &data)
            .await?;
        self.inner.sessions.write().await.remove(&session);

        tracing::info!(
            session_id = %session,
            filename = %filename,
            size = data.len(),
            "Stored source document"
        );

        Ok(DocumentHandle {
            session_id: session,
            filename: meta.filename,
            data: Arc::new(data),
        })
    }

    pub async fn get_document(&self, session: SessionId) -> DocumentResult<DocumentHandle> {
        self.ensure_session(session).await?;

        let (meta, data) = self
            .inner
            .backend
            .get(&ArtifactKey::document(session))
            .await?;

        Ok(DocumentHandle {
            session_id: session,
            filename: meta.filename,
            data,
        })
    }

    // ========================================================================
    // Stamp Images
    // ========================================================================

    /// Store a stamp image; the bytes must be a readable raster
    pub async fn store_stamp_image(
        &self,
        session: SessionId,
        index: u32,
        filename: &str,
        data: Vec<u8>,
    ) -> DocumentResult<StampHandle> {
        self.ensure_session(session).await?;

        let (width, height) = image::ImageReader::new(Cursor::new(&data))
            .with_guessed_format()?
            .into_dimensions()?;

        let meta = ArtifactMeta::new(filename, data.len()).with_dimensions(width, height);
        self.inner
            .backend
            .put(&ArtifactKey::stamp(session, index), &meta, &data)
            .await?;

        tracing::debug!(
            session_id = %session,
            stamp_index = index,
            filename = %filename,
            width,
            height,
            "Stored stamp image"
        );

        Ok(StampHandle::from_meta(index, &meta))
    }

    /// Stamps of a session, ascending by index
    pub async fn list_stamps(&self, session: SessionId) -> DocumentResult<Vec<StampHandle>> {
        self.ensure_session(session).await?;

        let mut stamps: Vec<StampHandle> = self
            .inner
            .backend
            .list(session, ArtifactKind::Stamp)
            .await?
            .into_iter()
            .filter_map(|(key, meta)| key.index.map(|index| StampHandle::from_meta(index, &meta)))
            .collect();

        stamps.sort_by_key(|stamp| stamp.index);
        Ok(stamps)
    }

    pub async fn get_stamp(
        &self,
        session: SessionId,
        index: u32,
    ) -> DocumentResult<(StampHandle, Arc<Vec<u8>>)> {
        self.ensure_session(session).await?;

        let (meta, data) = self
            .inner
            .backend
            .get(&ArtifactKey::stamp(session, index))
            .await?;

        Ok((StampHandle::from_meta(index, &meta), data))
    }

    // ========================================================================
    // Results
    // ========================================================================

    /// Commit a composited document as both canonical result and preview
    ///
    /// Both artifacts are written from the same buffer while the session's
    /// commit lock is held, so concurrent commits resolve last-writer-wins
    /// and the pair always matches.
    pub async fn store_result(&self, session: SessionId, data: Vec<u8>) -> DocumentResult<()> {
        self.ensure_session(session).await?;

        let _guard = self.commit_lock(session).await;

        let meta = ArtifactMeta::new(format!("{}_signed.pdf", session), data.len());
        self.inner
            .backend
            .put(&ArtifactKey::result(session), &meta, &data)
            .await?;

        let preview_meta = ArtifactMeta::new(format!("{}_signed_preview.pdf", session), data.len());
        self.inner
            .backend
            .put(&ArtifactKey::preview(session), &preview_meta, &data)
            .await?;

        tracing::info!(session_id = %session, size = data.len(), "Committed stamped result");
        Ok(())
    }

    /// Canonical result, `NotFound` until an apply has succeeded
    pub async fn get_result(&self, session: SessionId) -> DocumentResult<Arc<Vec<u8>>> {
        self.read_committed(ArtifactKey::result(session)).await
    }

    /// Preview copy of the result
    pub async fn get_preview(&self, session: SessionId) -> DocumentResult<Arc<Vec<u8>>> {
        self.read_committed(ArtifactKey::preview(session)).await
    }

    async fn read_committed(&self, key: ArtifactKey) -> DocumentResult<Arc<Vec<u8>>> {
        self.ensure_session(key.session).await?;

        let _guard = self.commit_lock(key.session).await;

        let (_, data) = self.inner.backend.get(&key).await?;
        Ok(data)
    }
}

/// Held commit lock; the map entry goes away with its last user
struct CommitGuard<'a> {
    locks: &'a parking_lot::Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
    session: SessionId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        // Clones are only taken under the map lock, so a count of one
        // here means no other task holds or waits on this entry
        let mut locks = self.locks.lock();
        self.guard.take();
        if locks
            .get(&self.session)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.session);
        }
    }
}

// ============================================================================
// Local Filesystem Storage
// ============================================================================

/// Filesystem storage: `<root>/<area>/<session>/<name>` plus a JSON sidecar
pub struct LocalArtifactStorage {
    base_path: PathBuf,
}

const META_SUFFIX: &str = ".meta.json";

impl LocalArtifactStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn session_dir(&self, session: SessionId, kind: ArtifactKind) -> PathBuf {
        self.base_path.join(kind.area()).join(session.to_string())
    }

    fn data_path(&self, key: &ArtifactKey) -> PathBuf {
        let name = match key.index {
            Some(index) => index.to_string(),
            None => "content".to_string(),
        };
        self.session_dir(key.session, key.kind).join(name)
    }

    fn meta_path(&self, key: &ArtifactKey) -> PathBuf {
        let mut path = self.data_path(key).into_os_string();
        path.push(META_SUFFIX);
        PathBuf::from(path)
    }
}

/// Write to a temporary sibling and rename into place
async fn write_atomic(path: &Path, data: &[u8]) -> DocumentResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| DocumentError::Storage(format!("no parent for {}", path.display())))?;
    tokio::fs::create_dir_all(parent).await?;

    let tmp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
    tokio::fs::write(&tmp, data).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

fn not_found_or_io(key: &ArtifactKey, err: std::io::Error) -> DocumentError {
    if err.kind() == std::io::ErrorKind::NotFound {
        DocumentError::NotFound(key.to_string())
    } else {
        DocumentError::Io(err)
    }
}

#[async_trait::async_trait]
impl ArtifactStorage for LocalArtifactStorage {
    async fn put(&self, key: &ArtifactKey, meta: &ArtifactMeta, data: &[u8]) -> DocumentResult<()> {
        let meta_json = serde_json::to_vec(meta)
            .map_err(|e| DocumentError::Storage(format!("Failed to encode metadata: {}", e)))?;

        write_atomic(&self.data_path(key), data).await?;
        write_atomic(&self.meta_path(key), &meta_json).await
    }

    async fn get(&self, key: &ArtifactKey) -> DocumentResult<(ArtifactMeta, Arc<Vec<u8>>)> {
        let meta_json = tokio::fs::read(self.meta_path(key))
            .await
            .map_err(|e| not_found_or_io(key, e))?;
        let meta: ArtifactMeta = serde_json::from_slice(&meta_json)
            .map_err(|e| DocumentError::Storage(format!("Corrupt metadata for {}: {}", key, e)))?;

        let data = tokio::fs::read(self.data_path(key))
            .await
            .map_err(|e| not_found_or_io(key, e))?;

        Ok((meta, Arc::new(data)))
    }

    async fn list(
        &self,
        session: SessionId,
        kind: ArtifactKind,
    ) -> DocumentResult<Vec<(ArtifactKey, ArtifactMeta)>> {
        let dir = self.session_dir(session, kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(stem) = file_name.to_str().and_then(|n| n.strip_suffix(META_SUFFIX)) else {
                continue;
            };

            let key = match kind {
                ArtifactKind::Stamp => match stem.parse::<u32>() {
                    Ok(index) => ArtifactKey::stamp(session, index),
                    Err(_) => continue,
                },
                _ => ArtifactKey { session, kind, index: None },
            };

            let meta_json = tokio::fs::read(entry.path()).await?;
            match serde_json::from_slice::<ArtifactMeta>(&meta_json) {
                Ok(meta) => found.push((key, meta)),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping artifact with corrupt metadata");
                }
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    async fn exists(&self, key: &ArtifactKey) -> bool {
        tokio::fs::try_exists(self.meta_path(key)).await.unwrap_or(false)
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// In-memory storage
#[derive(Default)]
pub struct MemoryArtifactStorage {
    artifacts: RwLock<BTreeMap<ArtifactKey, (ArtifactMeta, Arc<Vec<u8>>)>>,
}

#[async_trait::async_trait]
impl ArtifactStorage for MemoryArtifactStorage {
    async fn put(&self, key: &ArtifactKey, meta: &ArtifactMeta, data: &[u8]) -> DocumentResult<()> {
        self.artifacts
            .write()
            .await
            .insert(*key, (meta.clone(), Arc::new(data.to_vec())));
        Ok(())
    }

    async fn get(&self, key: &ArtifactKey) -> DocumentResult<(ArtifactMeta, Arc<Vec<u8>>)> {
        self.artifacts
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| DocumentError::NotFound(key.to_string()))
    }

    async fn list(
        &self,
        session: SessionId,
        kind: ArtifactKind,
    ) -> DocumentResult<Vec<(ArtifactKey, ArtifactMeta)>> {
        let start = ArtifactKey { session, kind, index: None };
        let end = ArtifactKey { session, kind, index: Some(u32::MAX) };

        Ok(self
            .artifacts
            .read()
            .await
            .range(start..=end)
            .map(|(key, (meta, _))| (*key, meta.clone()))
            .collect())
    }

    async fn exists(&self, key: &ArtifactKey) -> bool {
        self.artifacts.read().await.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::pdf::fixtures;
    use tempfile::TempDir;

    async fn exercise_stamp_ordering(store: SessionStore) {
        let session = store.create_session().await;
        for index in [10u32, 2, 0, 1] {
            store
                .store_stamp_image(session, index, &format!("s{}.png", index), fixtures::red_stamp())
                .await
                .unwrap();
        }

        let stamps = store.list_stamps(session).await.unwrap();
        let indices: Vec<u32> = stamps.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 10]);
        assert_eq!((stamps[0].width, stamps[0].height), (40, 16));
        assert_eq!(stamps[3].filename, "s10.png");
    }

    #[tokio::test]
    async fn test_stamps_sorted_by_index_memory() {
        exercise_stamp_ordering(SessionStore::in_memory()).await;
    }

    #[tokio::test]
    async fn test_stamps_sorted_by_index_local() {
        let dir = TempDir::new().unwrap();
        exercise_stamp_ordering(SessionStore::with_local_storage(dir.path().to_path_buf())).await;
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let store = SessionStore::in_memory();
        let unknown = SessionId::new();
        assert!(matches!(store.get_document(unknown).await, Err(DocumentError::NotFound(_))));
        assert!(matches!(store.list_stamps(unknown).await, Err(DocumentError::NotFound(_))));
        assert!(matches!(
            store.store_result(unknown, vec![1]).await,
            Err(DocumentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_artifacts_are_not_found() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::with_local_storage(dir.path().to_path_buf());
        let session = store.create_session().await;

        assert!(matches!(store.get_document(session).await, Err(DocumentError::NotFound(_))));
        assert!(matches!(store.get_stamp(session, 0).await, Err(DocumentError::NotFound(_))));
        assert!(matches!(store.get_result(session).await, Err(DocumentError::NotFound(_))));
        assert!(store.list_stamps(session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_unreadable_stamp() {
        let store = SessionStore::in_memory();
        let session = store.create_session().await;
        let result = store
            .store_stamp_image(session, 0, "bad.png", b"definitely not an image".to_vec())
            .await;
        assert!(matches!(result, Err(DocumentError::DecodeFailure(_))));
    }

    #[tokio::test]
    async fn test_session_survives_restart() {
        let dir = TempDir::new().unwrap();
        let session = {
            let store = SessionStore::with_local_storage(dir.path().to_path_buf());
            let session = store.create_session().await;
            store
                .store_document(session, "contract.pdf", fixtures::three_page_pdf())
                .await
                .unwrap();
            store
                .store_stamp_image(session, 1, "sig.png", fixtures::red_stamp())
                .await
                .unwrap();
            session
        };

        let reopened = SessionStore::with_local_storage(dir.path().to_path_buf());
        let document = reopened.get_document(session).await.unwrap();
        assert_eq!(document.filename, "contract.pdf");
        assert_eq!(*document.data, fixtures::three_page_pdf());
        assert_eq!(reopened.list_stamps(session).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_result_replaced_and_mirrored() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::with_local_storage(dir.path().to_path_buf());
        let session = store.create_session().await;

        store.store_result(session, b"first".to_vec()).await.unwrap();
        store.store_result(session, b"second".to_vec()).await.unwrap();

        assert_eq!(*store.get_result(session).await.unwrap(), b"second".to_vec());
        assert_eq!(*store.get_preview(session).await.unwrap(), b"second".to_vec());

        // No temporary files left behind
        let results_dir = dir.path().join("results").join(session.to_string());
        let mut entries = std::fs::read_dir(results_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        entries.sort();
        assert_eq!(entries, vec!["content".to_string(), "content.meta.json".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_commits_keep_pair_consistent() {
        let store = SessionStore::in_memory();
        let session = store.create_session().await;

        let mut tasks = Vec::new();
        for i in 0..16u8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.store_result(session, vec![i; 64]).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let result = store.get_result(session).await.unwrap();
        let preview = store.get_preview(session).await.unwrap();
        assert_eq!(result, preview);
    }

    #[tokio::test]
    async fn test_commit_locks_released_after_use() {
        let store = SessionStore::in_memory();
        let session = store.create_session().await;

        let mut tasks = Vec::new();
        for i in 0..8u8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.store_result(session, vec![i; 16]).await.unwrap();
                store.get_preview(session).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        store.get_result(session).await.unwrap();

        assert!(store.inner.commit_locks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_stored_document_replaces_session_entry() {
        let store = SessionStore::in_memory();
        let session = store.create_session().await;
        assert!(store.inner.sessions.read().await.contains(&session));

        store
            .store_document(session, "contract.pdf", fixtures::three_page_pdf())
            .await
            .unwrap();

        assert!(store.inner.sessions.read().await.is_empty());
        store.ensure_session(session).await.unwrap();
        assert_eq!(store.get_document(session).await.unwrap().filename, "contract.pdf");
    }
}
