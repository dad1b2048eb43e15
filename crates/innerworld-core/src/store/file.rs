//! File-backed document store for native platforms.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{
    BoxFuture, Document, DocumentStore, Fields, MemoryStore, Query, StoreError, StoreResult,
    Subscription,
};

/// File-backed store.
///
/// Each collection is kept as a JSON array in `<collection>.json` under
/// the base directory. Every write is flushed to disk before it becomes
/// visible in memory, so a failed write leaves no trace. Live queries are
/// served from memory.
pub struct FileStore {
    /// Base directory for collection files.
    base_path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open (or create) a store rooted at the given directory.
    pub fn open(base_path: PathBuf) -> StoreResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StoreError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }

        let entries = fs::read_dir(&base_path)
            .map_err(|e| StoreError::Io(format!("Failed to read {}: {}", base_path.display(), e)))?;

        let mut collections = HashMap::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::Io(e.to_string()))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let json = fs::read_to_string(&path)
                .map_err(|e| StoreError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
            let docs: Vec<Document> = serde_json::from_str(&json)
                .map_err(|e| StoreError::Serialization(format!("{}: {}", path.display(), e)))?;
            log::debug!("Loaded {} documents from {}", docs.len(), path.display());
            collections.insert(name.to_string(), docs);
        }

        Ok(Self {
            base_path,
            inner: MemoryStore::with_collections(collections),
        })
    }

    /// Open the store in the default location.
    ///
    /// On Unix: `~/.local/share/innerworld/store/`
    /// On Windows: `%LOCALAPPDATA%\innerworld\store\`
    pub fn default_location() -> StoreResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StoreError::Io("Could not determine home directory".to_string()))?;
        Self::open(base.join("innerworld").join("store"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get the file path for a collection.
    fn collection_path(&self, collection: &str) -> PathBuf {
        let safe: String = collection
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", safe))
    }

    fn persist(&self, collection: &str, docs: &[Document]) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(docs)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let path = self.collection_path(collection);
        fs::write(&path, json)
            .map_err(|e| StoreError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }
}

impl DocumentStore for FileStore {
    fn create(&self, collection: &str, fields: Fields) -> BoxFuture<'_, StoreResult<String>> {
        let collection = collection.to_string();
        Box::pin(async move {
            let persist = |name: &str, docs: &[Document]| self.persist(name, docs);
            self.inner.create_now(&collection, fields, &persist)
        })
    }

    fn get(&self, collection: &str, id: &str) -> BoxFuture<'_, StoreResult<Document>> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move { self.inner.get_now(&collection, &id) })
    }

    fn update(&self, collection: &str, id: &str, fields: Fields) -> BoxFuture<'_, StoreResult<()>> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            let persist = |name: &str, docs: &[Document]| self.persist(name, docs);
            self.inner.update_now(&collection, &id, fields, &persist)
        })
    }

    fn delete(&self, collection: &str, id: &str) -> BoxFuture<'_, StoreResult<()>> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move {
            let persist = |name: &str, docs: &[Document]| self.persist(name, docs);
            self.inner.delete_now(&collection, &id, &persist)
        })
    }

    fn query(&self, collection: &str, query: &Query) -> BoxFuture<'_, StoreResult<Vec<Document>>> {
        let collection = collection.to_string();
        let query = query.clone();
        Box::pin(async move { self.inner.query_now(&collection, &query) })
    }

    fn subscribe(&self, collection: &str, query: Query) -> StoreResult<Subscription> {
        self.inner.subscribe_now(collection, query)
    }
}
