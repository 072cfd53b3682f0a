use cgmath::{perspective, Deg, EuclideanSpace, Matrix4, Point3, Vector2, Vector3};

use crate::gfx::scene::graph::{NodeId, SceneGraph, SceneObject};
use crate::gfx::transform::{quat_from_euler_degrees, Transform};

pub const DEFAULT_SPEED: f32 = 4.0;
pub const DEFAULT_SENSITIVITY: f32 = 1.0;
pub const PITCH_LIMIT: f32 = 89.0;

/// First-person camera living in the scene graph.
///
/// Orientation is kept as pitch/yaw in degrees and written to the node as a
/// world rotation, so an attached camera keeps looking the same way no matter
/// how its parent turns. The projection is cached and only rebuilt by
/// [`Camera::set_aspect_ratio`].
#[derive(Debug, Clone)]
pub struct Camera {
    pub node: NodeId,
    pitch: f32,
    yaw: f32,
    pub movable: bool,
    speed: f32,
    sensitivity: f32,
    fovy: Deg<f32>,
    aspect: f32,
    znear: f32,
    zfar: f32,
    projection: Matrix4<f32>,
}

impl Camera {
    /// Inserts a camera node at `location` looking along Euler(pitch, yaw, 0).
    pub fn new(
        graph: &mut SceneGraph,
        name: &str,
        location: Vector3<f32>,
        pitch: f32,
        yaw: f32,
    ) -> Self {
        let node = graph.insert(SceneObject::new(name, Transform::from_location(location)));
        let aspect = 800.0 / 600.0;
        let mut camera = Self {
            node,
            pitch: pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            yaw,
            movable: true,
            speed: DEFAULT_SPEED,
            sensitivity: DEFAULT_SENSITIVITY,
            fovy: Deg(45.0),
            aspect,
            znear: 0.1,
            zfar: 1500.0,
            projection: Matrix4::from_scale(1.0),
        };
        camera.rebuild_projection();
        camera.apply_rotation(graph);
        camera
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect
    }

    /// Mouse offset in pixels (already scaled by frame time by the caller).
    /// Positive x decreases yaw, positive y raises pitch.
    pub fn process_mouse_movement(&mut self, graph: &mut SceneGraph, offset: Vector2<f32>) {
        self.yaw += offset.x * self.sensitivity * -1.0;
        self.pitch = (self.pitch + offset.y * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.apply_rotation(graph);
    }

    /// Writes Euler(pitch, yaw, 0) to the node as a world rotation.
    pub fn apply_rotation(&self, graph: &mut SceneGraph) {
        let rotation = quat_from_euler_degrees(Vector3::new(self.pitch, self.yaw, 0.0));
        graph.set_world_rotation(self.node, rotation);
    }

    pub fn view_matrix(&self, graph: &SceneGraph) -> Matrix4<f32> {
        let eye = graph.world_location(self.node);
        let front = graph.front_vector(self.node);
        let up = graph.up_vector(self.node);
        Matrix4::look_at_rh(Point3::from_vec(eye), Point3::from_vec(eye + front), up)
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection
    }

    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.rebuild_projection();
    }

    fn rebuild_projection(&mut self) {
        self.projection = perspective(self.fovy, self.aspect, self.znear, self.zfar);
    }
}
