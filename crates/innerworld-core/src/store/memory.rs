//! In-memory document store with live queries.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockWriteGuard};
use uuid::Uuid;

use super::subscription::Subscriber;
use super::{
    BoxFuture, Document, DocumentStore, Fields, OWNER_FIELD, Query, StoreError, StoreResult,
    Subscription,
};

/// Durability hook run before a write becomes visible.
pub(crate) type Persist<'a> = &'a dyn Fn(&str, &[Document]) -> StoreResult<()>;

fn in_memory(_collection: &str, _docs: &[Document]) -> StoreResult<()> {
    Ok(())
}

#[derive(Default)]
struct MemoryState {
    /// Documents per collection, in insertion order.
    collections: HashMap<String, Vec<Document>>,
    subscribers: Vec<Subscriber>,
    revoked: HashSet<String>,
    offline: bool,
}

impl MemoryState {
    fn docs(&self, collection: &str) -> &[Document] {
        self.collections.get(collection).map(Vec::as_slice).unwrap_or(&[])
    }

    fn is_revoked(&self, owner: Option<&Value>) -> bool {
        matches!(owner, Some(Value::String(owner)) if self.revoked.contains(owner))
    }

    fn check_query(&self, query: &Query) -> StoreResult<()> {
        if self.is_revoked(query.required_value(OWNER_FIELD)) {
            return Err(StoreError::PermissionDenied("owner access revoked".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self, owner: Option<&Value>) -> StoreResult<()> {
        if self.offline {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        if self.is_revoked(owner) {
            return Err(StoreError::PermissionDenied("owner access revoked".to_string()));
        }
        Ok(())
    }

    /// Install a collection's new contents once `persist` accepts them,
    /// then notify live queries. Nothing changes if `persist` fails.
    fn commit(
        &mut self,
        collection: &str,
        docs: Vec<Document>,
        persist: Persist<'_>,
    ) -> StoreResult<()> {
        persist(collection, &docs)?;
        self.collections.insert(collection.to_string(), docs);
        self.notify(collection);
        Ok(())
    }

    /// Push fresh results to every live query on the collection.
    fn notify(&mut self, collection: &str) {
        let docs = self.collections.get(collection).cloned().unwrap_or_default();
        self.subscribers.retain_mut(|subscriber| {
            if subscriber.collection != collection {
                return true;
            }
            let results = subscriber.query.apply(&docs);
            subscriber.deliver(results)
        });
    }
}

/// In-memory store for testing and ephemeral use.
///
/// Also the engine behind [`super::FileStore`].
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with documents.
    pub fn with_collections(collections: HashMap<String, Vec<Document>>) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                collections,
                ..MemoryState::default()
            }),
        }
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|e| StoreError::Other(format!("Lock error: {}", e)))
    }

    /// Simulate loss of connectivity: every write fails while offline.
    pub fn set_offline(&self, offline: bool) -> StoreResult<()> {
        self.write()?.offline = offline;
        Ok(())
    }

    /// Revoke an account's access. Live queries scoped to that owner
    /// receive a permission error and stop.
    pub fn revoke_owner(&self, owner_system_id: &str) -> StoreResult<()> {
        let mut state = self.write()?;
        state.revoked.insert(owner_system_id.to_string());
        let owner = Value::String(owner_system_id.to_string());
        state.subscribers.retain(|subscriber| {
            if subscriber.query.required_value(OWNER_FIELD) == Some(&owner) {
                subscriber.fail(StoreError::PermissionDenied(format!(
                    "access revoked for {}",
                    owner_system_id
                )));
                false
            } else {
                true
            }
        });
        Ok(())
    }

    pub fn restore_owner(&self, owner_system_id: &str) -> StoreResult<()> {
        self.write()?.revoked.remove(owner_system_id);
        Ok(())
    }

    /// All documents of a collection, in insertion order.
    pub fn documents(&self, collection: &str) -> StoreResult<Vec<Document>> {
        let state = self
            .state
            .read()
            .map_err(|e| StoreError::Other(format!("Lock error: {}", e)))?;
        Ok(state.docs(collection).to_vec())
    }

    pub fn count(&self, collection: &str) -> usize {
        self.documents(collection).map(|docs| docs.len()).unwrap_or(0)
    }

    pub(crate) fn create_now(
        &self,
        collection: &str,
        mut fields: Fields,
        persist: Persist<'_>,
    ) -> StoreResult<String> {
        let mut state = self.write()?;
        state.check_writable(fields.get(OWNER_FIELD))?;
        fields.remove("id");
        let id = Uuid::new_v4().to_string();
        let mut docs = state.docs(collection).to_vec();
        docs.push(Document::new(id.clone(), fields));
        state.commit(collection, docs, persist)?;
        Ok(id)
    }

    pub(crate) fn get_now(&self, collection: &str, id: &str) -> StoreResult<Document> {
        let state = self
            .state
            .read()
            .map_err(|e| StoreError::Other(format!("Lock error: {}", e)))?;
        let doc = state
            .docs(collection)
            .iter()
            .find(|doc| doc.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;
        if state.is_revoked(doc.fields.get(OWNER_FIELD)) {
            return Err(StoreError::PermissionDenied(format!("{}/{}", collection, id)));
        }
        Ok(doc)
    }

    pub(crate) fn update_now(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        persist: Persist<'_>,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        let owner = state
            .docs(collection)
            .iter()
            .find(|doc| doc.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?
            .fields
            .get(OWNER_FIELD)
            .cloned();
        state.check_writable(owner.as_ref())?;

        let mut docs = state.docs(collection).to_vec();
        if let Some(doc) = docs.iter_mut().find(|doc| doc.id == id) {
            for (key, value) in fields {
                if key == "id" {
                    continue;
                }
                if value.is_null() {
                    doc.fields.remove(&key);
                } else {
                    doc.fields.insert(key, value);
                }
            }
        }
        state.commit(collection, docs, persist)
    }

    pub(crate) fn delete_now(
        &self,
        collection: &str,
        id: &str,
        persist: Persist<'_>,
    ) -> StoreResult<()> {
        let mut state = self.write()?;
        let owner = state
            .docs(collection)
            .iter()
            .find(|doc| doc.id == id)
            .and_then(|doc| doc.fields.get(OWNER_FIELD).cloned());
        state.check_writable(owner.as_ref())?;

        let mut docs = state.docs(collection).to_vec();
        let before = docs.len();
        docs.retain(|doc| doc.id != id);
        if docs.len() == before {
            return Ok(());
        }
        state.commit(collection, docs, persist)
    }

    pub(crate) fn query_now(&self, collection: &str, query: &Query) -> StoreResult<Vec<Document>> {
        let state = self
            .state
            .read()
            .map_err(|e| StoreError::Other(format!("Lock error: {}", e)))?;
        state.check_query(query)?;
        Ok(query.apply(state.docs(collection)))
    }

    pub(crate) fn subscribe_now(
        &self,
        collection: &str,
        query: Query,
    ) -> StoreResult<Subscription> {
        let mut state = self.write()?;
        state.check_query(&query)?;
        let initial = query.apply(state.docs(collection));
        let (mut subscriber, subscription) = Subscriber::open(collection, query);
        subscriber.deliver(initial);
        state.subscribers.push(subscriber);
        Ok(subscription)
    }
}

impl DocumentStore for MemoryStore {
    fn create(&self, collection: &str, fields: Fields) -> BoxFuture<'_, StoreResult<String>> {
        let collection = collection.to_string();
        Box::pin(async move { self.create_now(&collection, fields, &in_memory) })
    }

    fn get(&self, collection: &str, id: &str) -> BoxFuture<'_, StoreResult<Document>> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move { self.get_now(&collection, &id) })
    }

    fn update(&self, collection: &str, id: &str, fields: Fields) -> BoxFuture<'_, StoreResult<()>> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move { self.update_now(&collection, &id, fields, &in_memory) })
    }

    fn delete(&self, collection: &str, id: &str) -> BoxFuture<'_, StoreResult<()>> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move { self.delete_now(&collection, &id, &in_memory) })
    }

    fn query(&self, collection: &str, query: &Query) -> BoxFuture<'_, StoreResult<Vec<Document>>> {
        let collection = collection.to_string();
        let query = query.clone();
        Box::pin(async move { self.query_now(&collection, &query) })
    }

    fn subscribe(&self, collection: &str, query: Query) -> StoreResult<Subscription> {
        self.subscribe_now(collection, query)
    }
}
