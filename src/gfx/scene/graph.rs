//! # Scene Graph
//!
//! Every placeable thing in the scene (game objects, cameras, the animated
//! actor) is a [`SceneObject`] node stored in one [`SceneGraph`] table and
//! addressed by [`NodeId`]. A node may be attached to a parent node; the
//! parent edge is a plain index, so the table alone owns node lifetime.
//!
//! World-space queries walk the parent chain on every call. Chains are
//! short (two levels in practice) so nothing is cached.
//!
//! ## Composition rules
//!
//! - world location = relative location + parent world location
//! - world rotation = parent world rotation * relative rotation
//! - world transform = parent world transform * relative transform
//!   (see [`Transform`] for the non-matrix composition)
//! - world model matrix = parent world model matrix * relative matrix
//!
//! Attachment is immediate: the child's relative transform is kept as is,
//! so its world pose jumps to "relative to the new parent".
//!
//! The basis vectors ([`SceneGraph::front_vector`] and friends) read the
//! relative rotation only. A camera riding an attached node keeps its own
//! heading while the parent turns underneath it.

use cgmath::{InnerSpace, Matrix4, Quaternion, Rotation, Vector3};

use crate::error::SceneError;
use crate::gfx::transform::Transform;

/// Handle of a node in the [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A named node with a transform relative to its parent (or to the world).
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    relative: Transform,
    parent: Option<NodeId>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, relative: Transform) -> Self {
        Self {
            name: name.into(),
            relative,
            parent: None,
        }
    }

    pub fn relative_transform(&self) -> Transform {
        self.relative
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// Owner of all scene nodes.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneObject>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: SceneObject) -> NodeId {
        self.nodes.push(object);
        NodeId(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneObject> {
        self.nodes.get(id.0)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Node name, or an empty string for an unknown handle.
    pub fn name(&self, id: NodeId) -> &str {
        self.nodes.get(id.0).map(|n| n.name.as_str()).unwrap_or("")
    }

    /// First node whose name starts with `prefix`.
    pub fn find_by_name(&self, prefix: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name.starts_with(prefix))
            .map(NodeId)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    /// Attaches `child` to `parent` without touching the child's relative
    /// transform. Rejects unknown handles and edges that would close a cycle.
    pub fn attach(&mut self, child: NodeId, parent: NodeId) -> Result<(), SceneError> {
        if !self.contains(child) {
            return Err(SceneError::UnknownNode(child));
        }
        if !self.contains(parent) {
            return Err(SceneError::UnknownNode(parent));
        }

        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(SceneError::AttachCycle { child, parent });
            }
            cursor = self.nodes[id.0].parent;
        }

        self.nodes[child.0].parent = Some(parent);
        log::debug!(
            "Attached '{}' to '{}'",
            self.nodes[child.0].name,
            self.nodes[parent.0].name
        );
        Ok(())
    }

    pub fn relative_transform(&self, id: NodeId) -> Transform {
        self.nodes
            .get(id.0)
            .map(|n| n.relative)
            .unwrap_or_default()
    }

    pub fn relative_model_matrix(&self, id: NodeId) -> Matrix4<f32> {
        self.relative_transform(id).to_matrix()
    }

    pub fn world_transform(&self, id: NodeId) -> Transform {
        let relative = self.relative_transform(id);
        match self.parent(id) {
            Some(parent) => self.world_transform(parent) * relative,
            None => relative,
        }
    }

    pub fn world_location(&self, id: NodeId) -> Vector3<f32> {
        let relative = self.relative_transform(id).location;
        match self.parent(id) {
            Some(parent) => relative + self.world_location(parent),
            None => relative,
        }
    }

    pub fn world_rotation(&self, id: NodeId) -> Quaternion<f32> {
        let relative = self.relative_transform(id).rotation;
        match self.parent(id) {
            Some(parent) => (self.world_rotation(parent) * relative).normalize(),
            None => relative,
        }
    }

    pub fn world_model_matrix(&self, id: NodeId) -> Matrix4<f32> {
        let relative = self.relative_model_matrix(id);
        match self.parent(id) {
            Some(parent) => self.world_model_matrix(parent) * relative,
            None => relative,
        }
    }

    /// Stores the relative transform that makes `world_transform(id)` equal
    /// `transform` under the current parent state. Parent scale is divided
    /// out component-wise.
    pub fn set_world_transform(&mut self, id: NodeId, transform: Transform) {
        let relative = match self.parent(id) {
            Some(parent) => {
                let parent_world = self.world_transform(parent);
                let mut relative = parent_world.inverse() * transform;
                relative.scale = Vector3::new(
                    transform.scale.x / parent_world.scale.x,
                    transform.scale.y / parent_world.scale.y,
                    transform.scale.z / parent_world.scale.z,
                );
                relative
            }
            None => transform,
        };
        self.set_relative_transform(id, relative);
    }

    pub fn set_world_location(&mut self, id: NodeId, location: Vector3<f32>) {
        let relative = match self.parent(id) {
            Some(parent) => location - self.world_location(parent),
            None => location,
        };
        self.set_relative_location(id, relative);
    }

    pub fn set_world_rotation(&mut self, id: NodeId, rotation: Quaternion<f32>) {
        let relative = match self.parent(id) {
            Some(parent) => self.world_rotation(parent).conjugate() * rotation,
            None => rotation,
        };
        self.set_relative_rotation(id, relative);
    }

    pub fn set_relative_transform(&mut self, id: NodeId, transform: Transform) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.relative = Transform::new(transform.location, transform.rotation, transform.scale);
        }
    }

    pub fn set_relative_location(&mut self, id: NodeId, location: Vector3<f32>) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.relative.location = location;
        }
    }

    pub fn set_relative_rotation(&mut self, id: NodeId, rotation: Quaternion<f32>) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.relative.rotation = rotation.normalize();
        }
    }

    /// Local-space accumulation; ignores the parent.
    pub fn add_delta_location(&mut self, id: NodeId, delta: Vector3<f32>) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.relative.location += delta;
        }
    }

    /// Pre-multiplies the relative rotation by Euler angles in radians.
    pub fn add_delta_rotation(&mut self, id: NodeId, delta: Vector3<f32>) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            let delta = crate::gfx::transform::quat_from_euler(delta);
            node.relative.rotation = (delta * node.relative.rotation).normalize();
        }
    }

    /// Canonical +Z rotated by the node's relative rotation.
    pub fn front_vector(&self, id: NodeId) -> Vector3<f32> {
        self.relative_transform(id).rotation.rotate_vector(Vector3::unit_z())
    }

    /// Canonical +Y rotated by the node's relative rotation.
    pub fn up_vector(&self, id: NodeId) -> Vector3<f32> {
        self.relative_transform(id).rotation.rotate_vector(Vector3::unit_y())
    }

    /// Canonical +X rotated by the node's relative rotation.
    pub fn left_vector(&self, id: NodeId) -> Vector3<f32> {
        self.relative_transform(id).rotation.rotate_vector(Vector3::unit_x())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::transform::quat_from_euler_degrees;

    const EPSILON: f32 = 1e-4;

    fn approx_eq_vec3(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).magnitude() < EPSILON
    }

    fn same_rotation(a: Quaternion<f32>, b: Quaternion<f32>) -> bool {
        a.dot(b).abs() > 1.0 - EPSILON
    }

    fn graph_with_parent() -> (SceneGraph, NodeId, NodeId) {
        let mut graph = SceneGraph::new();
        let parent = graph.insert(SceneObject::new(
            "Parent",
            Transform::from_euler_degrees(
                Vector3::new(1.0, 2.0, 3.0),
                Vector3::new(0.0, 90.0, 0.0),
                Vector3::new(2.0, 2.0, 2.0),
            ),
        ));
        let child = graph.insert(SceneObject::new(
            "Child",
            Transform::from_euler_degrees(
                Vector3::new(0.5, 0.0, -1.0),
                Vector3::new(10.0, 0.0, 0.0),
                Vector3::new(1.0, 0.5, 1.0),
            ),
        ));
        graph.attach(child, parent).unwrap();
        (graph, parent, child)
    }

    #[test]
    fn test_world_equals_relative_without_parent() {
        let mut graph = SceneGraph::new();
        let t = Transform::from_location(Vector3::new(4.0, 5.0, 6.0));
        let id = graph.insert(SceneObject::new("Solo", t));

        assert_eq!(graph.world_transform(id), t);
        assert_eq!(graph.world_location(id), t.location);
        assert_eq!(graph.world_model_matrix(id), t.to_matrix());
    }

    #[test]
    fn test_world_location_sums_parent_chain() {
        let (graph, _, child) = graph_with_parent();
        assert!(approx_eq_vec3(
            graph.world_location(child),
            Vector3::new(1.5, 2.0, 2.0)
        ));
        assert!(approx_eq_vec3(
            graph.world_transform(child).location,
            graph.world_location(child)
        ));
    }

    #[test]
    fn test_set_world_location_round_trip() {
        let (mut graph, _, child) = graph_with_parent();
        let before = graph.relative_transform(child);
        let world = graph.world_location(child);
        graph.set_world_location(child, world);
        assert!(approx_eq_vec3(graph.relative_transform(child).location, before.location));
        assert!(approx_eq_vec3(graph.world_location(child), world));
    }

    #[test]
    fn test_set_world_rotation_round_trip() {
        let (mut graph, _, child) = graph_with_parent();
        let before = graph.relative_transform(child).rotation;
        let world = graph.world_rotation(child);
        graph.set_world_rotation(child, world);
        assert!(same_rotation(graph.relative_transform(child).rotation, before));
        assert!(same_rotation(graph.world_rotation(child), world));
    }

    #[test]
    fn test_set_world_transform_round_trip() {
        let (mut graph, _, child) = graph_with_parent();
        let before = graph.relative_transform(child);
        let world = graph.world_transform(child);
        graph.set_world_transform(child, world);

        let after = graph.relative_transform(child);
        assert!(approx_eq_vec3(after.location, before.location));
        assert!(same_rotation(after.rotation, before.rotation));
        assert!(approx_eq_vec3(after.scale, before.scale));
    }

    #[test]
    fn test_set_world_transform_hits_target() {
        let (mut graph, _, child) = graph_with_parent();
        let target = Transform::from_euler_degrees(
            Vector3::new(-3.0, 1.0, 7.0),
            Vector3::new(0.0, -45.0, 20.0),
            Vector3::new(3.0, 3.0, 3.0),
        );
        graph.set_world_transform(child, target);

        let world = graph.world_transform(child);
        assert!(approx_eq_vec3(world.location, target.location));
        assert!(same_rotation(world.rotation, target.rotation));
        assert!(approx_eq_vec3(world.scale, target.scale));
    }

    #[test]
    fn test_attached_child_follows_parent() {
        let mut graph = SceneGraph::new();
        let a = graph.insert(SceneObject::new(
            "A",
            Transform::from_location(Vector3::new(1.0, 0.0, 0.0)),
        ));
        let b = graph.insert(SceneObject::new(
            "B",
            Transform::from_location(Vector3::new(0.0, 3.0, 0.0)),
        ));
        graph.attach(b, a).unwrap();

        let offset = graph.world_location(b) - graph.world_location(a);
        graph.add_delta_location(a, Vector3::new(5.0, -2.0, 1.0));
        graph.set_world_rotation(a, quat_from_euler_degrees(Vector3::new(0.0, 70.0, 0.0)));

        let offset_after = graph.world_location(b) - graph.world_location(a);
        assert!(approx_eq_vec3(offset, offset_after));
    }

    #[test]
    fn test_attach_keeps_relative_transform() {
        let mut graph = SceneGraph::new();
        let a = graph.insert(SceneObject::new(
            "A",
            Transform::from_location(Vector3::new(10.0, 0.0, 0.0)),
        ));
        let b = graph.insert(SceneObject::new(
            "B",
            Transform::from_location(Vector3::new(1.0, 0.0, 0.0)),
        ));
        graph.attach(b, a).unwrap();

        assert_eq!(graph.relative_transform(b).location, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(graph.world_location(b), Vector3::new(11.0, 0.0, 0.0));
    }

    #[test]
    fn test_attach_rejects_cycles() {
        let mut graph = SceneGraph::new();
        let a = graph.insert(SceneObject::new("A", Transform::default()));
        let b = graph.insert(SceneObject::new("B", Transform::default()));
        let c = graph.insert(SceneObject::new("C", Transform::default()));
        graph.attach(b, a).unwrap();
        graph.attach(c, b).unwrap();

        assert_eq!(
            graph.attach(a, c),
            Err(SceneError::AttachCycle { child: a, parent: c })
        );
        assert_eq!(
            graph.attach(a, a),
            Err(SceneError::AttachCycle { child: a, parent: a })
        );
        assert_eq!(graph.parent(a), None);
    }

    #[test]
    fn test_attach_rejects_unknown_node() {
        let mut graph = SceneGraph::new();
        let a = graph.insert(SceneObject::new("A", Transform::default()));
        let ghost = NodeId(42);
        assert_eq!(graph.attach(a, ghost), Err(SceneError::UnknownNode(ghost)));
    }

    #[test]
    fn test_add_delta_ignores_parent() {
        let (mut graph, _, child) = graph_with_parent();
        let before = graph.relative_transform(child).location;
        graph.add_delta_location(child, Vector3::new(1.0, 1.0, 1.0));
        assert!(approx_eq_vec3(
            graph.relative_transform(child).location,
            before + Vector3::new(1.0, 1.0, 1.0)
        ));
    }

    #[test]
    fn test_basis_vectors_use_positive_z_front() {
        let mut graph = SceneGraph::new();
        let id = graph.insert(SceneObject::new("Node", Transform::default()));
        assert!(approx_eq_vec3(graph.front_vector(id), Vector3::unit_z()));
        assert!(approx_eq_vec3(graph.up_vector(id), Vector3::unit_y()));
        assert!(approx_eq_vec3(graph.left_vector(id), Vector3::unit_x()));

        graph.set_world_rotation(id, quat_from_euler_degrees(Vector3::new(0.0, 90.0, 0.0)));
        assert!(approx_eq_vec3(graph.front_vector(id), Vector3::unit_x()));
        assert!(approx_eq_vec3(graph.left_vector(id), -Vector3::unit_z()));
    }

    #[test]
    fn test_basis_vectors_ignore_parent_rotation() {
        let (mut graph, parent, child) = graph_with_parent();
        let front = graph.front_vector(child);
        assert!(approx_eq_vec3(
            front,
            graph.relative_transform(child).rotation.rotate_vector(Vector3::unit_z())
        ));

        graph.set_relative_rotation(parent, quat_from_euler_degrees(Vector3::new(0.0, -45.0, 0.0)));
        assert!(approx_eq_vec3(graph.front_vector(child), front));
    }

    #[test]
    fn test_find_by_name_matches_prefix() {
        let mut graph = SceneGraph::new();
        graph.insert(SceneObject::new("House_01", Transform::default()));
        let chest = graph.insert(SceneObject::new("Chest_Top", Transform::default()));
        assert_eq!(graph.find_by_name("Chest"), Some(chest));
        assert_eq!(graph.find_by_name("Barn"), None);
    }
}
