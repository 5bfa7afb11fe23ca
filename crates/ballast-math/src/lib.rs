#![warn(missing_docs)]

//! Math types for the ballast physics layer.
//!
//! Thin wrappers around nalgebra providing the vector algebra the rigid
//! body wrapper speaks: points, vectors, rotations, 4x4 homogeneous
//! transforms, bounding boxes and the global/local coordinate switch.
//! Scalars are `f32` to match rapier3d's default build.

use nalgebra::{Isometry3, Matrix4, Rotation3, Translation3, Vector3, Vector4};

/// Scalar type used throughout ballast.
pub type Real = f32;

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<Real>;

/// A vector in 3D space.
pub type Vec3 = Vector3<Real>;

/// A unit quaternion rotation.
pub type Quat = nalgebra::UnitQuaternion<Real>;

/// Frame in which a vector argument is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordSys {
    /// World space.
    #[default]
    Global,
    /// The body's own rotated frame.
    Local,
}

/// A 4x4 homogeneous transformation matrix (rotation + translation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<Real>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `offset`.
    pub fn from_translation(offset: &Vec3) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = offset.x;
        m[(1, 3)] = offset.y;
        m[(2, 3)] = offset.z;
        Self { matrix: m }
    }

    /// Rotation followed by translation.
    pub fn from_parts(translation: &Vec3, rotation: &Quat) -> Self {
        let mut t = Self::identity();
        t.set_rotation(rotation);
        t.set_translation(translation);
        t
    }

    /// Rotation about the X axis by `angle` radians.
    pub fn rotation_x(angle: Real) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(1, 1)] = c;
        m[(1, 2)] = -s;
        m[(2, 1)] = s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Y axis by `angle` radians.
    pub fn rotation_y(angle: Real) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 2)] = s;
        m[(2, 0)] = -s;
        m[(2, 2)] = c;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: Real) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Build from 16 column-major values, the layout engines hand back.
    pub fn from_column_slice(values: &[Real; 16]) -> Self {
        Self {
            matrix: Matrix4::from_column_slice(values),
        }
    }

    /// Build from a rigid isometry.
    pub fn from_isometry(iso: &Isometry3<Real>) -> Self {
        Self {
            matrix: iso.to_homogeneous(),
        }
    }

    /// Rigid isometry equivalent of this transform.
    ///
    /// Assumes the upper-left 3x3 block is a pure rotation.
    pub fn to_isometry(&self) -> Isometry3<Real> {
        Isometry3::from_parts(Translation3::from(self.translation()), self.rotation())
    }

    /// Translation component.
    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.matrix[(0, 3)], self.matrix[(1, 3)], self.matrix[(2, 3)])
    }

    /// Rotation component, extracted from the upper-left 3x3 block.
    pub fn rotation(&self) -> Quat {
        let m3 = self.matrix.fixed_view::<3, 3>(0, 0).into_owned();
        Quat::from_rotation_matrix(&Rotation3::from_matrix_unchecked(m3))
    }

    /// Replace the translation component, keeping the rotation.
    pub fn set_translation(&mut self, translation: &Vec3) {
        self.matrix[(0, 3)] = translation.x;
        self.matrix[(1, 3)] = translation.y;
        self.matrix[(2, 3)] = translation.z;
    }

    /// Replace the rotation component, keeping the translation.
    pub fn set_rotation(&mut self, rotation: &Quat) {
        let r = rotation.to_rotation_matrix();
        self.matrix
            .fixed_view_mut::<3, 3>(0, 0)
            .copy_from(r.matrix());
    }

    /// Compose: `self` then `other` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point (w = 1).
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (w = 0, ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb {
    /// Box spanning `min` to `max`.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Degenerate box around a single point.
    pub fn from_point(p: Point3) -> Self {
        Self { min: p, max: p }
    }

    /// Center of the box.
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Half of the box size along each axis.
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) / 2.0
    }

    /// Whether `p` lies inside or on the boundary.
    pub fn contains(&self, p: &Point3) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}

/// Tolerance constants for float comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Absolute tolerance for scalars.
    pub linear: Real,
}

impl Tolerance {
    /// Machine epsilon for `f32`.
    pub const DEFAULT: Self = Self {
        linear: Real::EPSILON,
    };

    /// Check if a scalar is effectively zero.
    pub fn is_zero(&self, d: Real) -> bool {
        d.abs() < self.linear
    }

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}
