//! # Transform
//!
//! A 3D pose made of location, rotation and scale.
//!
//! Composition (`a * b`) sums locations, multiplies rotations (a then b) and
//! multiplies scales component-wise. Locations are *not* rotated by the left
//! operand, so this is not a matrix product. [`Transform::inverse`] is the
//! matching approximate inverse: location negated, rotation inverted, scale
//! kept.
//!
//! ```
//! use cgmath::Vector3;
//! use diorama::gfx::transform::Transform;
//!
//! let parent = Transform::from_location(Vector3::new(1.0, 0.0, 0.0));
//! let child = Transform::from_location(Vector3::new(0.0, 2.0, 0.0));
//! assert_eq!((parent * child).location, Vector3::new(1.0, 2.0, 0.0));
//! ```

use std::ops::Mul;

use cgmath::{Deg, InnerSpace, Matrix4, One, Quaternion, Rad, Rotation3, Vector3};

/// Location, rotation and scale. `rotation` is kept normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub location: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            location: Vector3::new(0.0, 0.0, 0.0),
            rotation: Quaternion::one(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    pub fn new(location: Vector3<f32>, rotation: Quaternion<f32>, scale: Vector3<f32>) -> Self {
        Self {
            location,
            rotation: rotation.normalize(),
            scale,
        }
    }

    /// Builds a transform from Euler angles given in degrees (pitch, yaw, roll).
    pub fn from_euler_degrees(
        location: Vector3<f32>,
        rotation_degrees: Vector3<f32>,
        scale: Vector3<f32>,
    ) -> Self {
        Self::new(location, quat_from_euler_degrees(rotation_degrees), scale)
    }

    pub fn from_location(location: Vector3<f32>) -> Self {
        Self {
            location,
            ..Self::default()
        }
    }

    /// Translate * rotate * scale.
    pub fn to_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.location)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Negated location, inverted rotation, unchanged scale.
    pub fn inverse(&self) -> Self {
        Self {
            location: -self.location,
            rotation: self.rotation.conjugate(),
            scale: self.scale,
        }
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        Transform {
            location: self.location + rhs.location,
            rotation: (self.rotation * rhs.rotation).normalize(),
            scale: Vector3::new(
                self.scale.x * rhs.scale.x,
                self.scale.y * rhs.scale.y,
                self.scale.z * rhs.scale.z,
            ),
        }
    }
}

/// Euler angles in radians to a quaternion, applied X then Y then Z
/// (`q = qz * qy * qx`).
pub fn quat_from_euler(angles: Vector3<f32>) -> Quaternion<f32> {
    Quaternion::from_angle_z(Rad(angles.z))
        * Quaternion::from_angle_y(Rad(angles.y))
        * Quaternion::from_angle_x(Rad(angles.x))
}

pub fn quat_from_euler_degrees(degrees: Vector3<f32>) -> Quaternion<f32> {
    quat_from_euler(Vector3::new(
        Rad::from(Deg(degrees.x)).0,
        Rad::from(Deg(degrees.y)).0,
        Rad::from(Deg(degrees.z)).0,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Rotation, SquareMatrix, Transform as _};

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_eq_vec3(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    #[test]
    fn test_transform_default() {
        let t = Transform::default();
        assert_eq!(t.location, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(t.rotation, Quaternion::one());
        assert_eq!(t.scale, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(t.to_matrix(), Matrix4::identity());
    }

    #[test]
    fn test_to_matrix_scales_then_rotates_then_translates() {
        let t = Transform::from_euler_degrees(
            Vector3::new(10.0, 0.0, 0.0),
            Vector3::new(0.0, 90.0, 0.0),
            Vector3::new(2.0, 2.0, 2.0),
        );
        let p = t.to_matrix().transform_point(cgmath::Point3::new(1.0, 0.0, 0.0));

        // (1,0,0) scaled to (2,0,0), yawed +90 deg to (0,0,-2), then moved
        assert!(approx_eq(p.x, 10.0), "got {:?}", p);
        assert!(approx_eq(p.y, 0.0), "got {:?}", p);
        assert!(approx_eq(p.z, -2.0), "got {:?}", p);
    }

    #[test]
    fn test_composition_does_not_rotate_child_location() {
        // Composition sums locations even when the parent is rotated. This
        // differs from a matrix product and is relied on by the scene graph.
        let parent = Transform::from_euler_degrees(
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 90.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
        );
        let child = Transform::from_location(Vector3::new(0.0, 0.0, 1.0));

        let composed = parent * child;
        assert!(approx_eq_vec3(composed.location, Vector3::new(1.0, 0.0, 1.0)));

        let matrix_location = (parent.to_matrix() * child.to_matrix())
            .transform_point(cgmath::Point3::new(0.0, 0.0, 0.0));
        assert!(!approx_eq(matrix_location.x, composed.location.x));
    }

    #[test]
    fn test_composition_multiplies_scale_and_rotation() {
        let a = Transform::new(
            Vector3::new(0.0, 0.0, 0.0),
            Quaternion::from_angle_y(Deg(30.0)),
            Vector3::new(2.0, 3.0, 4.0),
        );
        let b = Transform::new(
            Vector3::new(0.0, 0.0, 0.0),
            Quaternion::from_angle_y(Deg(60.0)),
            Vector3::new(0.5, 2.0, 1.0),
        );
        let c = a * b;
        assert!(approx_eq_vec3(c.scale, Vector3::new(1.0, 6.0, 4.0)));

        let dir = c.rotation.rotate_vector(Vector3::unit_z());
        assert!(approx_eq_vec3(dir, Vector3::unit_x()), "got {:?}", dir);
    }

    #[test]
    fn test_inverse_keeps_scale() {
        let t = Transform::from_euler_degrees(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(10.0, 20.0, 30.0),
            Vector3::new(2.0, 2.0, 2.0),
        );
        let inv = t.inverse();
        assert_eq!(inv.location, Vector3::new(-1.0, -2.0, -3.0));
        assert_eq!(inv.scale, t.scale);

        let round = inv * t;
        assert!(approx_eq_vec3(round.location, Vector3::new(0.0, 0.0, 0.0)));
        assert!(approx_eq(round.rotation.s.abs(), 1.0));
    }

    #[test]
    fn test_euler_order_matches_pitch_then_yaw() {
        // Pitch 90 deg about X turns +Z into -Y; yaw about Y leaves that alone.
        let q = quat_from_euler_degrees(Vector3::new(90.0, 45.0, 0.0));
        let front = q.rotate_vector(Vector3::unit_z());
        assert!(approx_eq_vec3(front, Vector3::new(0.0, -1.0, 0.0)), "got {:?}", front);
    }

    #[test]
    fn test_new_normalizes_rotation() {
        let t = Transform::new(
            Vector3::new(0.0, 0.0, 0.0),
            Quaternion::new(2.0, 0.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
        );
        assert!(approx_eq(t.rotation.magnitude(), 1.0));
    }
}
