//! # Animated Actor
//!
//! A keyframe-animated mesh (the eagle) that circles a fixed point at a
//! constant angular speed. Two things advance every update:
//!
//! - the path angle, which places the node on a horizontal circle and turns
//!   its +Z axis along the circle tangent
//! - the keyframe pair `(current, next)` and the blend factor between them,
//!   driven by wall time against a fixed frame length

use cgmath::{InnerSpace, Quaternion, Rotation, Vector3};

use crate::gfx::scene::graph::{NodeId, SceneGraph, SceneObject};
use crate::gfx::transform::Transform;

pub const FRAME_LENGTH: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CirclePath {
    pub center: Vector3<f32>,
    pub radius: f32,
    /// Degrees per second.
    pub speed: f32,
}

impl Default for CirclePath {
    fn default() -> Self {
        Self {
            center: Vector3::new(2.0, 7.0, 0.0),
            radius: 4.0,
            speed: 12.0,
        }
    }
}

impl CirclePath {
    pub fn point_at(&self, angle_degrees: f32) -> Vector3<f32> {
        let angle = angle_degrees.to_radians();
        self.center + Vector3::new(self.radius * angle.cos(), 0.0, self.radius * angle.sin())
    }
}

#[derive(Debug, Clone)]
pub struct AnimatedActor {
    pub node: NodeId,
    path: CirclePath,
    angle: f32,
    frame_count: usize,
    current_frame: usize,
    next_frame: usize,
    alpha: f32,
    frame_length: f32,
    frame_start: f32,
}

impl AnimatedActor {
    /// Inserts the actor node at its start pose. `now` starts the first
    /// keyframe.
    pub fn new(graph: &mut SceneGraph, name: &str, frame_count: usize, now: f32) -> Self {
        let start = Transform {
            location: Vector3::new(0.0, 5.0, 0.0),
            scale: Vector3::new(0.2, 0.2, 0.2),
            ..Transform::default()
        };
        let node = graph.insert(SceneObject::new(name, Transform::default()));
        graph.set_world_transform(node, start);

        let frame_count = frame_count.max(1);
        Self {
            node,
            path: CirclePath::default(),
            angle: 0.0,
            frame_count,
            current_frame: 0,
            next_frame: 1 % frame_count,
            alpha: 0.0,
            frame_length: FRAME_LENGTH,
            frame_start: now,
        }
    }

    pub fn with_path(mut self, path: CirclePath) -> Self {
        self.path = path;
        self
    }

    pub fn path(&self) -> &CirclePath {
        &self.path
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn next_frame(&self) -> usize {
        self.next_frame
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn update(&mut self, graph: &mut SceneGraph, dt: f32, now: f32) {
        self.advance_path(graph, dt);
        self.advance_frames(now);
    }

    fn advance_path(&mut self, graph: &mut SceneGraph, dt: f32) {
        self.angle = (self.angle + self.path.speed * dt).rem_euclid(360.0);

        let position = self.path.point_at(self.angle);
        let radial = position - self.path.center;
        // Perpendicular of (x, z) in the horizontal plane is (-z, x).
        let tangent = Vector3::new(-radial.z, 0.0, radial.x);
        if tangent.magnitude2() > f32::EPSILON {
            let rotation = Quaternion::from_arc(
                Vector3::unit_z(),
                tangent.normalize(),
                Some(Vector3::unit_y()),
            );
            graph.set_world_rotation(self.node, rotation);
        }
        graph.set_world_location(self.node, position);
    }

    fn advance_frames(&mut self, now: f32) {
        let elapsed = now - self.frame_start;
        if elapsed >= self.frame_length {
            self.current_frame = (self.current_frame + 1) % self.frame_count;
            self.next_frame = (self.next_frame + 1) % self.frame_count;
            self.alpha = 0.0;
            self.frame_start = now;
            return;
        }
        self.alpha = (elapsed / self.frame_length).clamp(0.0, 1.0);
    }

    /// Tangent direction the node currently faces.
    pub fn heading(&self, graph: &SceneGraph) -> Vector3<f32> {
        graph.world_rotation(self.node).rotate_vector(Vector3::unit_z())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx_eq_vec3(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).magnitude() < EPSILON
    }

    #[test]
    fn test_start_pose() {
        let mut graph = SceneGraph::new();
        let actor = AnimatedActor::new(&mut graph, "Eagle", 7, 0.0);
        assert_eq!(graph.world_location(actor.node), Vector3::new(0.0, 5.0, 0.0));
        assert_eq!(graph.world_transform(actor.node).scale, Vector3::new(0.2, 0.2, 0.2));
        assert_eq!((actor.current_frame(), actor.next_frame()), (0, 1));
    }

    #[test]
    fn test_follows_circle() {
        let mut graph = SceneGraph::new();
        let mut actor = AnimatedActor::new(&mut graph, "Eagle", 7, 0.0);

        actor.update(&mut graph, 7.5, 0.0);
        assert!((actor.angle() - 90.0).abs() < EPSILON);
        assert!(approx_eq_vec3(
            graph.world_location(actor.node),
            Vector3::new(2.0, 7.0, 4.0)
        ));
    }

    #[test]
    fn test_faces_along_tangent() {
        let mut graph = SceneGraph::new();
        let mut actor = AnimatedActor::new(&mut graph, "Eagle", 7, 0.0);

        for step in 0..40 {
            actor.update(&mut graph, 0.7, step as f32 * 0.01);
            let radial = graph.world_location(actor.node) - actor.path().center;
            let heading = actor.heading(&graph);
            assert!(heading.dot(radial).abs() < 1e-3, "heading not tangent");
            assert!(heading.y.abs() < EPSILON);
            assert!((heading.magnitude() - 1.0).abs() < EPSILON);
        }
    }

    #[test]
    fn test_angle_wraps() {
        let mut graph = SceneGraph::new();
        let mut actor = AnimatedActor::new(&mut graph, "Eagle", 7, 0.0);
        actor.update(&mut graph, 31.0, 0.0);
        assert!((actor.angle() - 12.0).abs() < 1e-3);
        assert!(actor.angle() < 360.0);
    }

    #[test]
    fn test_frames_advance_and_wrap() {
        let mut graph = SceneGraph::new();
        let mut actor = AnimatedActor::new(&mut graph, "Eagle", 3, 0.0);

        actor.update(&mut graph, 0.0, 0.15);
        assert!((actor.alpha() - 0.5).abs() < EPSILON);
        assert_eq!((actor.current_frame(), actor.next_frame()), (0, 1));

        actor.update(&mut graph, 0.0, 0.3);
        assert_eq!((actor.current_frame(), actor.next_frame()), (1, 2));
        assert_eq!(actor.alpha(), 0.0);

        actor.update(&mut graph, 0.0, 0.7);
        assert_eq!((actor.current_frame(), actor.next_frame()), (2, 0));
        actor.update(&mut graph, 0.0, 1.1);
        assert_eq!((actor.current_frame(), actor.next_frame()), (0, 1));
    }

    #[test]
    fn test_frame_invariants_hold() {
        let mut graph = SceneGraph::new();
        let mut actor = AnimatedActor::new(&mut graph, "Eagle", 7, 0.0);
        let mut now = 0.0;
        for i in 0..500 {
            now += 0.013 * ((i % 7) as f32 + 1.0);
            actor.update(&mut graph, 0.016, now);
            assert!(actor.current_frame() < actor.frame_count());
            assert_eq!(actor.next_frame(), (actor.current_frame() + 1) % actor.frame_count());
            assert!((0.0..=1.0).contains(&actor.alpha()));
        }
    }

    #[test]
    fn test_single_frame_mesh() {
        let mut graph = SceneGraph::new();
        let mut actor = AnimatedActor::new(&mut graph, "Eagle", 1, 0.0);
        actor.update(&mut graph, 0.0, 1.0);
        assert_eq!((actor.current_frame(), actor.next_frame()), (0, 0));
    }
}
