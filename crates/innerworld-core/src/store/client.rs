//! Scene store client: typed world/shape access over a [`DocumentStore`].

use serde_json::Value;
use std::sync::Arc;

use super::{
    Direction, Document, DocumentStore, Fields, OWNER_FIELD, Query, StoreError, StoreResult,
    Subscription, encode_fields,
};
use crate::model::{
    OwnerIdentity, Shape, ShapeDraft, ShapeId, ShapePatch, Timestamp, World, WorldDraft, WorldId,
};

pub const WORLDS_COLLECTION: &str = "inner_worlds";
pub const SHAPES_COLLECTION: &str = "inner_world_shapes";

fn timestamp_fields(field_names: &[&str]) -> Fields {
    let now = Value::from(Timestamp::now().as_millis());
    field_names
        .iter()
        .map(|name| (name.to_string(), now.clone()))
        .collect()
}

fn decode_shapes(docs: &[Document]) -> Vec<Shape> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<Shape>() {
            Ok(shape) => Some(shape),
            Err(e) => {
                log::warn!("Skipping malformed shape document: {}", e);
                None
            }
        })
        .collect()
}

/// Typed CRUD and live queries for worlds and shapes.
///
/// Every shape mutation also bumps the parent world's `updated_at`.
#[derive(Clone)]
pub struct SceneStoreClient {
    store: Arc<dyn DocumentStore>,
}

impl SceneStoreClient {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a world. Always creates a fresh entity.
    pub async fn create_world(&self, draft: &WorldDraft) -> StoreResult<WorldId> {
        let mut fields = encode_fields(draft)?;
        fields.extend(timestamp_fields(&["created_at", "updated_at"]));
        let id = self.store.create(WORLDS_COLLECTION, fields).await?;
        log::info!("Created world {} ({})", id, draft.name);
        Ok(id)
    }

    pub async fn get_world(&self, world_id: &str) -> StoreResult<World> {
        self.store.get(WORLDS_COLLECTION, world_id).await?.decode()
    }

    /// Worlds of one persona, most recently edited first.
    pub async fn list_worlds(&self, owner: &OwnerIdentity) -> StoreResult<Vec<World>> {
        let query = Query::new()
            .where_eq(OWNER_FIELD, owner.system_id.as_str())
            .where_eq("owner_persona_id", owner.persona_id.as_str())
            .order_by("updated_at", Direction::Descending);
        let docs = self.store.query(WORLDS_COLLECTION, &query).await?;
        docs.iter().map(Document::decode::<World>).collect()
    }

    /// Delete a world and, best-effort, every shape in it.
    pub async fn delete_world(&self, world_id: &str) -> StoreResult<()> {
        let query = Query::new().where_eq("world_id", world_id);
        let shapes = self.store.query(SHAPES_COLLECTION, &query).await?;
        for shape in &shapes {
            if let Err(e) = self.store.delete(SHAPES_COLLECTION, &shape.id).await {
                log::warn!("Failed to delete shape {} of world {}: {}", shape.id, world_id, e);
            }
        }
        self.store.delete(WORLDS_COLLECTION, world_id).await?;
        log::info!("Deleted world {} ({} shapes)", world_id, shapes.len());
        Ok(())
    }

    /// Store a new shape owned by `owner_system_id`.
    pub async fn add_shape(
        &self,
        draft: &ShapeDraft,
        owner_system_id: &str,
    ) -> StoreResult<ShapeId> {
        if !draft.has_valid_size() {
            return Err(StoreError::InvalidData(format!(
                "shape size must be positive, got {}x{}",
                draft.width, draft.height
            )));
        }
        let mut fields = encode_fields(draft)?;
        fields.insert(OWNER_FIELD.to_string(), Value::String(owner_system_id.to_string()));
        fields.extend(timestamp_fields(&["created_at"]));

        let id = self.store.create(SHAPES_COLLECTION, fields).await?;
        self.touch_world(&draft.world_id).await?;
        log::debug!("Added shape {} to world {}", id, draft.world_id);
        Ok(id)
    }

    /// Merge a partial update into a shape.
    pub async fn update_shape(
        &self,
        shape_id: &str,
        world_id: &str,
        patch: &ShapePatch,
    ) -> StoreResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let invalid = [patch.width, patch.height]
            .into_iter()
            .flatten()
            .any(|v| !v.is_finite() || v <= 0.0);
        if invalid {
            return Err(StoreError::InvalidData("shape size must be positive".to_string()));
        }
        if let Some(link) = &patch.linked_world_id {
            let current = self.store.get(SHAPES_COLLECTION, shape_id).await?;
            if let Some(Value::String(existing)) = current.get("linked_world_id") {
                if &existing != link {
                    return Err(StoreError::InvalidData(format!(
                        "shape {} is already linked to {}",
                        shape_id, existing
                    )));
                }
            }
        }
        let fields = encode_fields(patch)?;
        self.store.update(SHAPES_COLLECTION, shape_id, fields).await?;
        self.touch_world(world_id).await?;
        log::debug!("Updated shape {} in world {}", shape_id, world_id);
        Ok(())
    }

    pub async fn delete_shape(&self, shape_id: &str, world_id: &str) -> StoreResult<()> {
        self.store.delete(SHAPES_COLLECTION, shape_id).await?;
        self.touch_world(world_id).await?;
        log::debug!("Deleted shape {} from world {}", shape_id, world_id);
        Ok(())
    }

    /// Live query of a world's shapes, oldest first.
    pub fn subscribe_shapes(
        &self,
        world_id: &str,
        owner_system_id: &str,
    ) -> StoreResult<ShapeSubscription> {
        let query = Query::new()
            .where_eq(OWNER_FIELD, owner_system_id)
            .where_eq("world_id", world_id)
            .order_by("created_at", Direction::Ascending);
        let inner = self.store.subscribe(SHAPES_COLLECTION, query)?;
        log::info!("Subscribed to shapes of world {}", world_id);
        Ok(ShapeSubscription { inner })
    }

    async fn touch_world(&self, world_id: &str) -> StoreResult<()> {
        self.store
            .update(WORLDS_COLLECTION, world_id, timestamp_fields(&["updated_at"]))
            .await
    }
}

/// Live, typed stream of a world's shapes.
pub struct ShapeSubscription {
    inner: Subscription,
}

impl ShapeSubscription {
    /// Newest pending snapshot, if any. Malformed documents are skipped.
    pub fn latest(&mut self) -> Option<StoreResult<Vec<Shape>>> {
        self.inner
            .latest()
            .map(|delivery| delivery.map(|docs| decode_shapes(&docs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ShapeKind;
    use crate::store::MemoryStore;
    use kurbo::Point;
    use pollster::block_on;

    fn setup() -> (Arc<MemoryStore>, SceneStoreClient, OwnerIdentity) {
        let store = Arc::new(MemoryStore::new());
        let client = SceneStoreClient::new(store.clone());
        (store, client, OwnerIdentity::new("sys", "alter-1"))
    }

    fn draft(world_id: &str) -> ShapeDraft {
        ShapeDraft {
            world_id: world_id.to_string(),
            kind: ShapeKind::Sticker,
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            rotation: 0.0,
            name: "House".to_string(),
            icon: Some("home".to_string()),
            font_size: None,
            color: None,
            emotion: None,
            intention: None,
            image_url: None,
            border_radius: None,
        }
    }

    #[test]
    fn test_create_world_never_dedups() {
        let (store, client, owner) = setup();
        let world_draft = WorldDraft::new(&owner, "Refuge", "#E3F2FD");
        let a = block_on(client.create_world(&world_draft)).unwrap();
        let b = block_on(client.create_world(&world_draft)).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.count(WORLDS_COLLECTION), 2);

        let world = block_on(client.get_world(&a)).unwrap();
        assert_eq!(world.name, "Refuge");
        assert_eq!(world.created_at, world.updated_at);
    }

    #[test]
    fn test_shape_writes_bump_world_updated_at() {
        let (_store, client, owner) = setup();
        let world_draft = WorldDraft::new(&owner, "Refuge", "#E3F2FD");
        let world_id = block_on(client.create_world(&world_draft)).unwrap();
        let mut last = block_on(client.get_world(&world_id)).unwrap().updated_at;

        let shape_id = block_on(client.add_shape(&draft(&world_id), "sys")).unwrap();
        let after_add = block_on(client.get_world(&world_id)).unwrap().updated_at;
        assert!(after_add > last);
        last = after_add;

        let patch = ShapePatch::position(Point::new(1.0, 2.0));
        block_on(client.update_shape(&shape_id, &world_id, &patch)).unwrap();
        let after_update = block_on(client.get_world(&world_id)).unwrap().updated_at;
        assert!(after_update > last);
        last = after_update;

        block_on(client.delete_shape(&shape_id, &world_id)).unwrap();
        let after_delete = block_on(client.get_world(&world_id)).unwrap().updated_at;
        assert!(after_delete > last);
    }

    #[test]
    fn test_add_shape_rejects_non_positive_size() {
        let (_store, client, owner) = setup();
        let world_draft = WorldDraft::new(&owner, "W", "#FFFFFF");
        let world_id = block_on(client.create_world(&world_draft)).unwrap();
        let mut bad = draft(&world_id);
        bad.width = 0.0;
        assert!(matches!(block_on(client.add_shape(&bad, "sys")), Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_add_shape_to_missing_world_fails() {
        let (_store, client, _owner) = setup();
        let result = block_on(client.add_shape(&draft("missing"), "sys"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_subscription_orders_by_creation() {
        let (_store, client, owner) = setup();
        let world_draft = WorldDraft::new(&owner, "W", "#FFFFFF");
        let world_id = block_on(client.create_world(&world_draft)).unwrap();
        let mut sub = client.subscribe_shapes(&world_id, "sys").unwrap();

        let mut first = draft(&world_id);
        first.name = "first".to_string();
        let mut second = draft(&world_id);
        second.name = "second".to_string();
        block_on(client.add_shape(&first, "sys")).unwrap();
        block_on(client.add_shape(&second, "sys")).unwrap();

        let shapes = sub.latest().unwrap().unwrap();
        let names: Vec<_> = shapes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(shapes[0].owner_system_id, "sys");
    }

    #[test]
    fn test_link_is_set_once() {
        let (_store, client, owner) = setup();
        let world_draft = WorldDraft::new(&owner, "W", "#FFFFFF");
        let world_id = block_on(client.create_world(&world_draft)).unwrap();
        let shape_id = block_on(client.add_shape(&draft(&world_id), "sys")).unwrap();

        block_on(client.update_shape(&shape_id, &world_id, &ShapePatch::link("child"))).unwrap();
        block_on(client.update_shape(&shape_id, &world_id, &ShapePatch::link("child"))).unwrap();
        let other = ShapePatch::link("other");
        let relink = block_on(client.update_shape(&shape_id, &world_id, &other));
        assert!(matches!(relink, Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn test_list_worlds_most_recent_first() {
        let (_store, client, owner) = setup();
        let world_draft = WorldDraft::new(&owner, "Older", "#FFFFFF");
        let older = block_on(client.create_world(&world_draft)).unwrap();
        let world_draft = WorldDraft::new(&owner, "Newer", "#FFFFFF");
        let newer = block_on(client.create_world(&world_draft)).unwrap();
        let other = OwnerIdentity::new("sys", "alter-2");
        block_on(client.create_world(&WorldDraft::new(&other, "Elsewhere", "#FFFFFF"))).unwrap();

        // Editing the older world moves it to the front.
        block_on(client.add_shape(&draft(&older), "sys")).unwrap();

        let worlds = block_on(client.list_worlds(&owner)).unwrap();
        let ids: Vec<_> = worlds.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec![older.as_str(), newer.as_str()]);
    }

    #[test]
    fn test_delete_world_cascades_shapes() {
        let (store, client, owner) = setup();
        let world_draft = WorldDraft::new(&owner, "W", "#FFFFFF");
        let world_id = block_on(client.create_world(&world_draft)).unwrap();
        block_on(client.add_shape(&draft(&world_id), "sys")).unwrap();
        block_on(client.add_shape(&draft(&world_id), "sys")).unwrap();

        block_on(client.delete_world(&world_id)).unwrap();

        assert_eq!(store.count(SHAPES_COLLECTION), 0);
        assert!(matches!(block_on(client.get_world(&world_id)), Err(StoreError::NotFound(_))));
    }
}
