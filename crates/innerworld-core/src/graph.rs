//! Arena scene graph of worlds and shapes.
//!
//! Worlds own shapes; a shape's `linked_world_id` is a directed edge to a
//! child world. Edges are set at most once. Cycles are possible and are
//! reported, never prevented.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::model::{Shape, ShapeId, World, WorldId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("Unknown world: {0}")]
    UnknownWorld(WorldId),
    #[error("Unknown shape: {0}")]
    UnknownShape(ShapeId),
    #[error("Shape {shape_id} is already linked to {world_id}")]
    AlreadyLinked { shape_id: ShapeId, world_id: WorldId },
}

#[derive(Debug, Clone)]
struct WorldNode {
    world: World,
    shapes: Vec<ShapeId>,
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    worlds: HashMap<WorldId, WorldNode>,
    shapes: HashMap<ShapeId, Shape>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a world, keeping its known shapes.
    pub fn insert_world(&mut self, world: World) {
        self.worlds
            .entry(world.id.clone())
            .and_modify(|node| node.world = world.clone())
            .or_insert(WorldNode { world, shapes: Vec::new() });
    }

    pub fn world(&self, world_id: &str) -> Option<&World> {
        self.worlds.get(world_id).map(|node| &node.world)
    }

    pub fn shape(&self, shape_id: &str) -> Option<&Shape> {
        self.shapes.get(shape_id)
    }

    /// Replace the shapes of a world with a snapshot.
    ///
    /// A link already recorded in the graph survives a snapshot that
    /// lacks it, since links never go away.
    pub fn replace_world_shapes(
        &mut self,
        world_id: &str,
        shapes: &[Shape],
    ) -> Result<(), GraphError> {
        let node = self
            .worlds
            .get_mut(world_id)
            .ok_or_else(|| GraphError::UnknownWorld(world_id.to_string()))?;

        for old in node.shapes.drain(..) {
            if !shapes.iter().any(|s| s.id == old) {
                self.shapes.remove(&old);
            }
        }
        for shape in shapes {
            let mut shape = shape.clone();
            if shape.linked_world_id.is_none() {
                shape.linked_world_id =
                    self.shapes.get(&shape.id).and_then(|s| s.linked_world_id.clone());
            }
            node.shapes.push(shape.id.clone());
            self.shapes.insert(shape.id.clone(), shape);
        }
        Ok(())
    }

    /// Record a shape → child world edge.
    pub fn link(&mut self, shape_id: &str, world_id: &str) -> Result<(), GraphError> {
        if !self.worlds.contains_key(world_id) {
            return Err(GraphError::UnknownWorld(world_id.to_string()));
        }
        let shape = self
            .shapes
            .get_mut(shape_id)
            .ok_or_else(|| GraphError::UnknownShape(shape_id.to_string()))?;
        match &shape.linked_world_id {
            Some(existing) if existing == world_id => Ok(()),
            Some(existing) => Err(GraphError::AlreadyLinked {
                shape_id: shape_id.to_string(),
                world_id: existing.clone(),
            }),
            None => {
                shape.linked_world_id = Some(world_id.to_string());
                Ok(())
            }
        }
    }

    /// Child worlds reachable in one step, in shape order.
    pub fn children(&self, world_id: &str) -> Vec<&WorldId> {
        self.worlds
            .get(world_id)
            .map(|node| {
                node.shapes
                    .iter()
                    .filter_map(|id| self.shapes.get(id)?.linked_world_id.as_ref())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The shape that links to this world, if any.
    pub fn parent_of(&self, world_id: &str) -> Option<&Shape> {
        self.shapes
            .values()
            .find(|shape| shape.linked_world_id.as_deref() == Some(world_id))
    }

    /// Worlds above this one, nearest first. Stops at a cycle.
    pub fn ancestors(&self, world_id: &str) -> Vec<WorldId> {
        let mut result = Vec::new();
        let mut seen = HashSet::from([world_id.to_string()]);
        let mut current = world_id.to_string();
        while let Some(parent) = self.parent_of(&current) {
            if !seen.insert(parent.world_id.clone()) {
                break;
            }
            result.push(parent.world_id.clone());
            current = parent.world_id.clone();
        }
        result
    }

    /// Find a world that can reach itself through linked shapes.
    ///
    /// Returns the cycle as a path of world ids starting and ending at
    /// the same world.
    pub fn find_link_cycle(&self) -> Option<Vec<WorldId>> {
        let mut ids: Vec<&WorldId> = self.worlds.keys().collect();
        ids.sort();
        let mut finished = HashSet::new();
        for start in ids {
            let mut path = Vec::new();
            if let Some(cycle) = self.visit(start, &mut path, &mut finished) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit(
        &self,
        world_id: &WorldId,
        path: &mut Vec<WorldId>,
        finished: &mut HashSet<WorldId>,
    ) -> Option<Vec<WorldId>> {
        if let Some(pos) = path.iter().position(|id| id == world_id) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(world_id.clone());
            return Some(cycle);
        }
        if finished.contains(world_id) {
            return None;
        }
        path.push(world_id.clone());
        for child in self.children(world_id) {
            if let Some(cycle) = self.visit(child, path, finished) {
                return Some(cycle);
            }
        }
        path.pop();
        finished.insert(world_id.clone());
        None
    }

    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::sample_shape;
    use crate::model::{ShapeKind, Timestamp};

    fn world(id: &str) -> World {
        World {
            id: id.to_string(),
            owner_system_id: "sys".to_string(),
            owner_persona_id: "alter".to_string(),
            name: id.to_string(),
            background_color: "#FFFFFF".to_string(),
            description: None,
            created_at: Timestamp(1),
            updated_at: Timestamp(1),
        }
    }

    fn shape_in(id: &str, world_id: &str) -> Shape {
        let mut shape = sample_shape(id, ShapeKind::Sticker);
        shape.world_id = world_id.to_string();
        shape
    }

    fn graph() -> SceneGraph {
        let mut graph = SceneGraph::new();
        for id in ["root", "child", "grandchild"] {
            graph.insert_world(world(id));
        }
        graph.replace_world_shapes("root", &[shape_in("door", "root")]).unwrap();
        graph.replace_world_shapes("child", &[shape_in("tree", "child")]).unwrap();
        graph.replace_world_shapes("grandchild", &[shape_in("stone", "grandchild")]).unwrap();
        graph.link("door", "child").unwrap();
        graph.link("tree", "grandchild").unwrap();
        graph
    }

    #[test]
    fn test_link_at_most_once() {
        let mut graph = graph();
        assert!(graph.link("door", "child").is_ok());
        assert!(matches!(
            graph.link("door", "grandchild"),
            Err(GraphError::AlreadyLinked { .. })
        ));
        assert!(matches!(graph.link("ghost", "child"), Err(GraphError::UnknownShape(_))));
        assert!(matches!(graph.link("stone", "nowhere"), Err(GraphError::UnknownWorld(_))));
    }

    #[test]
    fn test_children_and_ancestors() {
        let graph = graph();
        assert_eq!(graph.children("root"), vec!["child"]);
        assert_eq!(graph.parent_of("grandchild").map(|s| s.id.as_str()), Some("tree"));
        assert_eq!(graph.ancestors("grandchild"), vec!["child".to_string(), "root".to_string()]);
        assert!(graph.ancestors("root").is_empty());
    }

    #[test]
    fn test_snapshot_keeps_known_link() {
        let mut graph = graph();
        graph.replace_world_shapes("root", &[shape_in("door", "root")]).unwrap();
        assert_eq!(graph.children("root"), vec!["child"]);
    }

    #[test]
    fn test_snapshot_drops_removed_shapes() {
        let mut graph = graph();
        graph.replace_world_shapes("root", &[]).unwrap();
        assert!(graph.shape("door").is_none());
        assert!(graph.children("root").is_empty());
    }

    #[test]
    fn test_no_cycle_in_tree() {
        assert!(graph().find_link_cycle().is_none());
    }

    #[test]
    fn test_cycle_is_reported_not_blocked() {
        let mut graph = graph();
        graph.link("stone", "root").unwrap();

        let cycle = graph.find_link_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
        assert_eq!(graph.world_count(), 3);
    }
}
