//! Application state management

use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::export::DocumentExport;
use crate::formats::pdf::PdfEngine;
use crate::geometry::GeometryMapper;
use crate::session::SessionStore;
use crate::stamp::StampEngine;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: SessionStore,
    geometry: GeometryMapper<PdfEngine>,
    stamper: StampEngine<PdfEngine>,
    export: DocumentExport,
}

impl AppState {
    /// Create state with the storage backend named in `config`
    pub fn new(config: Config) -> Self {
        let store = match config.storage.backend {
            StorageBackend::Local => SessionStore::with_local_storage(config.storage.upload_dir.clone()),
            StorageBackend::Memory => SessionStore::in_memory(),
        };
        Self::with_store(config, store)
    }

    /// Create state around an existing store
    pub fn with_store(config: Config, store: SessionStore) -> Self {
        let engine = Arc::new(PdfEngine::new());

        Self {
            inner: Arc::new(AppStateInner {
                geometry: GeometryMapper::new(Arc::clone(&engine)),
                stamper: StampEngine::new(store.clone(), engine),
                export: DocumentExport::new(store.clone()),
                store,
                config,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the session store
    pub fn store(&self) -> &SessionStore {
        &self.inner.store
    }

    pub fn geometry(&self) -> &GeometryMapper<PdfEngine> {
        &self.inner.geometry
    }

    pub fn stamper(&self) -> &StampEngine<PdfEngine> {
        &self.inner.stamper
    }

    pub fn export(&self) -> &DocumentExport {
        &self.inner.export
    }
}
