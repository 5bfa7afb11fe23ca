//! Shared collision geometry.

use std::fmt;
use std::sync::{Arc, OnceLock};

use ballast_math::{Point3, Real, Vec3};
use nalgebra::Isometry3;
use parry3d::shape::{SharedShape, TriMesh};
use tracing::warn;

use crate::error::PhysicsError;

/// Strategy for generating collision shapes from triangle meshes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColliderStrategy {
    /// Use convex hull (fast, approximate).
    #[default]
    ConvexHull,
    /// Use triangle mesh (accurate, slower).
    TriMesh,
    /// Use axis-aligned bounding box (fastest, rough).
    Aabb,
}

/// Indexed triangle mesh with flat `[x, y, z, ...]` vertex storage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions, three values per vertex.
    pub vertices: Vec<Real>,
    /// Triangle indices, three per triangle.
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    fn points(&self) -> Vec<Point3> {
        self.vertices
            .chunks_exact(3)
            .map(|v| Point3::new(v[0], v[1], v[2]))
            .collect()
    }
}

/// A reference-counted collision shape shared between bodies.
///
/// Clones share the same allocation and compare equal; two geometries
/// built separately never compare equal, even with identical shapes.
#[derive(Clone)]
pub struct Geometry {
    inner: Arc<Option<SharedShape>>,
}

impl Geometry {
    /// The "no geometry" placeholder. Every call returns the same instance.
    pub fn null() -> Self {
        static NULL: OnceLock<Geometry> = OnceLock::new();
        NULL.get_or_init(|| Geometry {
            inner: Arc::new(None),
        })
        .clone()
    }

    /// Wrap an existing parry shape.
    pub fn from_shape(shape: SharedShape) -> Self {
        Self {
            inner: Arc::new(Some(shape)),
        }
    }

    /// Sphere centered on the body origin.
    pub fn ball(radius: Real) -> Self {
        Self::from_shape(SharedShape::ball(radius))
    }

    /// Box with the given half extents.
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::from_shape(SharedShape::cuboid(
            half_extents.x,
            half_extents.y,
            half_extents.z,
        ))
    }

    /// Capsule along the Y axis.
    pub fn capsule(half_height: Real, radius: Real) -> Self {
        Self::from_shape(SharedShape::capsule_y(half_height, radius))
    }

    /// Cylinder along the Y axis.
    pub fn cylinder(half_height: Real, radius: Real) -> Self {
        Self::from_shape(SharedShape::cylinder(half_height, radius))
    }

    /// Cone along the Y axis.
    pub fn cone(half_height: Real, radius: Real) -> Self {
        Self::from_shape(SharedShape::cone(half_height, radius))
    }

    /// Convex hull of a point cloud.
    ///
    /// Falls back to the bounding box when the hull is degenerate.
    pub fn convex_hull(points: &[Point3], name: &str) -> Result<Self, PhysicsError> {
        if points.len() < 4 {
            return Err(PhysicsError::CollisionShape {
                name: name.to_string(),
                reason: "Need at least 4 points for convex hull".to_string(),
            });
        }

        match SharedShape::convex_hull(points) {
            Some(hull) => Ok(Self::from_shape(hull)),
            None => {
                warn!(name, "degenerate convex hull, falling back to bounding box");
                Ok(Self::from_shape(bounding_cuboid(points)))
            }
        }
    }

    /// Generate a collision shape from a triangle mesh.
    pub fn from_mesh(
        mesh: &TriangleMesh,
        strategy: ColliderStrategy,
        name: &str,
    ) -> Result<Self, PhysicsError> {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(PhysicsError::CollisionShape {
                name: name.to_string(),
                reason: "Empty mesh".to_string(),
            });
        }

        let points = mesh.points();
        match strategy {
            ColliderStrategy::ConvexHull => Self::convex_hull(&points, name),
            ColliderStrategy::TriMesh => create_trimesh(mesh, points, name),
            ColliderStrategy::Aabb => Ok(Self::from_shape(bounding_cuboid(&points))),
        }
    }

    /// Whether this is the "no geometry" placeholder (or wraps no shape).
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Shape handed to the simulation engine, `None` for no collision.
    ///
    /// parry shapes are world-independent, so every world uses this one.
    pub fn shape(&self) -> Option<&SharedShape> {
        (*self.inner).as_ref()
    }

    /// Inertia per unit mass and the local origin of the center of mass.
    ///
    /// Shapes without volume (including the placeholder) report a unit
    /// inertia centered on the body origin.
    pub fn compute_inertial_matrix(&self) -> (Vec3, Point3) {
        let Some(shape) = self.shape() else {
            return (Vec3::repeat(1.0), Point3::origin());
        };

        let props = shape.mass_properties(1.0);
        let volume = props.mass();
        if volume <= Real::EPSILON {
            return (Vec3::repeat(1.0), props.local_com);
        }

        (props.principal_inertia() / volume, props.local_com)
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::null()
    }
}

impl PartialEq for Geometry {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Geometry {}

impl fmt::Debug for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape() {
            Some(shape) => write!(f, "Geometry({:?})", shape.shape_type()),
            None => write!(f, "Geometry(Null)"),
        }
    }
}

fn create_trimesh(
    mesh: &TriangleMesh,
    vertices: Vec<Point3>,
    name: &str,
) -> Result<Geometry, PhysicsError> {
    let indices: Vec<[u32; 3]> = mesh
        .indices
        .chunks_exact(3)
        .map(|i| [i[0], i[1], i[2]])
        .collect();

    if indices.is_empty() {
        return Err(PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: "No triangles in mesh".to_string(),
        });
    }

    match TriMesh::new(vertices, indices) {
        Ok(trimesh) => Ok(Geometry::from_shape(SharedShape::new(trimesh))),
        Err(e) => Err(PhysicsError::CollisionShape {
            name: name.to_string(),
            reason: format!("Failed to create trimesh: {:?}", e),
        }),
    }
}

/// Box enclosing `points`, placed at their bounds in body space.
fn bounding_cuboid(points: &[Point3]) -> SharedShape {
    let mut min = Vec3::repeat(Real::INFINITY);
    let mut max = Vec3::repeat(Real::NEG_INFINITY);

    for p in points {
        min = min.inf(&p.coords);
        max = max.sup(&p.coords);
    }

    let half_extents = (max - min) / 2.0;
    let center = (max + min) / 2.0;
    let cuboid = SharedShape::cuboid(half_extents.x, half_extents.y, half_extents.z);

    SharedShape::compound(vec![(
        Isometry3::translation(center.x, center.y, center.z),
        cuboid,
    )])
}
