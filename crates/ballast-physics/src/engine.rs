//! Contract between rigid bodies and the simulation engine that integrates them.

use std::fmt::Debug;
use std::hash::Hash;

use ballast_math::{Aabb, Point3, Real, Transform, Vec3};
use nalgebra::Matrix4;
use parry3d::shape::SharedShape;

/// Mass and principal inertia of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassMatrix {
    /// Mass in kg. Zero means immovable.
    pub mass: Real,
    /// Principal inertia (Ixx, Iyy, Izz).
    pub inertia: Vec3,
}

impl MassMatrix {
    /// Immovable body.
    pub fn zero() -> Self {
        Self {
            mass: 0.0,
            inertia: Vec3::zeros(),
        }
    }
}

/// Force and torque registers for one body during one engine step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepForces {
    /// World-space force applied for the step.
    pub force: Vec3,
    /// World-space torque applied for the step.
    pub torque: Vec3,
}

/// Called once per step, before integration, for each awake dynamic body.
///
/// Arguments are the body's force registers, the step size and the index
/// of the engine thread running the callback.
pub type ForceTorqueCallback = Box<dyn FnMut(&mut StepForces, Real, usize)>;

/// Called after integration with the new column-major pose of the body.
pub type TransformCallback = Box<dyn FnMut(&Matrix4<Real>, usize)>;

/// Capabilities a simulation engine provides to [`RigidBody`](crate::RigidBody).
///
/// Calls with a handle the engine no longer knows are ignored; getters
/// return neutral values for them.
pub trait SimulationEngine {
    /// Opaque per-body handle.
    type BodyHandle: Copy + Eq + Hash + Debug;

    /// Create a static body with the given collision shape (`None` for no
    /// collision) at `transform`.
    fn create_body(&mut self, shape: Option<&SharedShape>, transform: &Transform)
        -> Self::BodyHandle;

    /// Remove a body and its callbacks. No callback fires for it afterwards.
    fn destroy_body(&mut self, body: Self::BodyHandle);

    /// Teleport a body.
    fn set_body_transform(&mut self, body: Self::BodyHandle, transform: &Transform);

    /// Current mass matrix.
    fn body_mass_matrix(&self, body: Self::BodyHandle) -> MassMatrix;

    /// Replace the mass matrix. A zero mass makes the body immovable.
    fn set_body_mass_matrix(&mut self, body: Self::BodyHandle, mass: MassMatrix);

    /// Center of mass in body-local coordinates.
    fn body_center_of_mass(&self, body: Self::BodyHandle) -> Point3;

    /// Move the center of mass (body-local coordinates).
    fn set_body_center_of_mass(&mut self, body: Self::BodyHandle, center: &Point3);

    /// Linear velocity in world space.
    fn body_velocity(&self, body: Self::BodyHandle) -> Vec3;

    /// Set linear velocity in world space.
    fn set_body_velocity(&mut self, body: Self::BodyHandle, velocity: &Vec3);

    /// Angular velocity in world space.
    fn body_omega(&self, body: Self::BodyHandle) -> Vec3;

    /// Set angular velocity in world space.
    fn set_body_omega(&mut self, body: Self::BodyHandle, omega: &Vec3);

    /// Swap the collision shape.
    fn set_body_collision_shape(&mut self, body: Self::BodyHandle, shape: Option<&SharedShape>);

    /// Whether the body is asleep.
    fn body_sleep_state(&self, body: Self::BodyHandle) -> bool;

    /// Put the body to sleep (`true`) or wake it (`false`).
    fn set_body_sleep_state(&mut self, body: Self::BodyHandle, sleeping: bool);

    /// Whether the engine may put the body to sleep on its own.
    fn body_auto_sleep(&self, body: Self::BodyHandle) -> bool;

    /// Allow or forbid automatic sleeping.
    fn set_body_auto_sleep(&mut self, body: Self::BodyHandle, auto_sleep: bool);

    /// Install the per-step force callback, replacing any previous one.
    fn set_force_torque_callback(&mut self, body: Self::BodyHandle, callback: ForceTorqueCallback);

    /// Install the post-integration transform callback, replacing any previous one.
    fn set_transform_callback(&mut self, body: Self::BodyHandle, callback: TransformCallback);

    /// World-space bounding box.
    fn body_aabb(&self, body: Self::BodyHandle) -> Aabb;

    /// Advance the simulation by `time_step` seconds.
    fn step(&mut self, time_step: Real);

    /// Adjust solver iterations. Engines without the notion ignore it.
    fn set_solver_iterations(&mut self, _iterations: u32) {}
}
