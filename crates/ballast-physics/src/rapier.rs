//! [`SimulationEngine`] backed by Rapier3d.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use ballast_math::{Aabb, Point3, Real, Transform, Vec3};
use nalgebra::Vector3;
use parry3d::shape::SharedShape;
use rapier3d::dynamics::{
    CCDSolver, ImpulseJointSet, IntegrationParameters, IslandManager, MassProperties,
    MultibodyJointSet, RigidBodyActivation, RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
    RigidBodyType,
};
use rapier3d::geometry::{
    BroadPhaseMultiSap, ColliderBuilder, ColliderHandle, ColliderSet, NarrowPhase,
};
use rapier3d::pipeline::{PhysicsPipeline, QueryPipeline};
use tracing::trace;

use crate::engine::{
    ForceTorqueCallback, MassMatrix, SimulationEngine, StepForces, TransformCallback,
};

/// Engine-side bookkeeping Rapier has no slot for.
struct BodyRecord {
    collider: Option<ColliderHandle>,
    mass: MassMatrix,
    center_of_mass: Point3,
    auto_sleep: bool,
    force_torque: Option<ForceTorqueCallback>,
    transform: Option<TransformCallback>,
}

impl BodyRecord {
    fn new(collider: Option<ColliderHandle>) -> Self {
        Self {
            collider,
            mass: MassMatrix::zero(),
            center_of_mass: Point3::origin(),
            auto_sleep: true,
            force_torque: None,
            transform: None,
        }
    }
}

/// Rapier3d simulation engine.
///
/// Bodies start fixed; a positive mass matrix turns them dynamic. Mass
/// comes only from [`SimulationEngine::set_body_mass_matrix`]: colliders
/// are created with zero density. The pipeline runs without gravity since
/// bodies receive gravity through their force callbacks.
pub struct RapierEngine {
    // Rapier components
    pipeline: PhysicsPipeline,
    integration_params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,

    records: HashMap<RigidBodyHandle, BodyRecord>,
}

impl RapierEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            integration_params: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            records: HashMap::new(),
        }
    }

    /// Number of live bodies.
    pub fn body_count(&self) -> usize {
        self.records.len()
    }

    /// Whether `body` is still registered.
    pub fn contains(&self, body: RigidBodyHandle) -> bool {
        self.records.contains_key(&body)
    }

    /// Whether `body` currently has a collider attached.
    pub fn has_collider(&self, body: RigidBodyHandle) -> bool {
        self.records
            .get(&body)
            .is_some_and(|record| record.collider.is_some())
    }

    /// Whether the per-step callbacks of `body` are installed.
    pub fn has_callbacks(&self, body: RigidBodyHandle) -> bool {
        self.records
            .get(&body)
            .is_some_and(|record| record.force_torque.is_some() && record.transform.is_some())
    }

    /// Force registered for `body` by its last force callback.
    pub fn applied_force(&self, body: RigidBodyHandle) -> Vec3 {
        self.bodies
            .get(body)
            .map(|rb| rb.user_force())
            .unwrap_or_else(Vec3::zeros)
    }

    /// Torque registered for `body` by its last force callback.
    pub fn applied_torque(&self, body: RigidBodyHandle) -> Vec3 {
        self.bodies
            .get(body)
            .map(|rb| rb.user_torque())
            .unwrap_or_else(Vec3::zeros)
    }

    fn push_mass_properties(&mut self, body: RigidBodyHandle) {
        let (Some(record), Some(rb)) = (self.records.get(&body), self.bodies.get_mut(body)) else {
            return;
        };

        if record.mass.mass > 0.0 {
            if rb.body_type() != RigidBodyType::Dynamic {
                rb.set_body_type(RigidBodyType::Dynamic, true);
            }
            rb.set_additional_mass_properties(
                MassProperties::new(record.center_of_mass, record.mass.mass, record.mass.inertia),
                false,
            );
        } else {
            rb.set_additional_mass_properties(
                MassProperties::new(Point3::origin(), 0.0, Vector3::zeros()),
                false,
            );
            rb.set_body_type(RigidBodyType::Fixed, false);
        }
    }
}

impl Default for RapierEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn attach_collider(
    colliders: &mut ColliderSet,
    bodies: &mut RigidBodySet,
    body: RigidBodyHandle,
    shape: &SharedShape,
) -> ColliderHandle {
    let collider = ColliderBuilder::new(shape.clone())
        .density(0.0)
        .friction(0.5)
        .restitution(0.1)
        .build();
    colliders.insert_with_parent(collider, body, bodies)
}

impl SimulationEngine for RapierEngine {
    type BodyHandle = RigidBodyHandle;

    fn create_body(
        &mut self,
        shape: Option<&SharedShape>,
        transform: &Transform,
    ) -> RigidBodyHandle {
        let rigid_body = RigidBodyBuilder::fixed()
            .position(transform.to_isometry())
            .gravity_scale(0.0)
            .build();
        let handle = self.bodies.insert(rigid_body);

        let collider = shape
            .map(|shape| attach_collider(&mut self.colliders, &mut self.bodies, handle, shape));
        self.records.insert(handle, BodyRecord::new(collider));

        handle
    }

    fn destroy_body(&mut self, body: RigidBodyHandle) {
        self.records.remove(&body);
        self.bodies.remove(
            body,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    fn set_body_transform(&mut self, body: RigidBodyHandle, transform: &Transform) {
        if let Some(rb) = self.bodies.get_mut(body) {
            rb.set_position(transform.to_isometry(), false);
        }
    }

    fn body_mass_matrix(&self, body: RigidBodyHandle) -> MassMatrix {
        self.records
            .get(&body)
            .map(|record| record.mass)
            .unwrap_or_else(MassMatrix::zero)
    }

    fn set_body_mass_matrix(&mut self, body: RigidBodyHandle, mass: MassMatrix) {
        if let Some(record) = self.records.get_mut(&body) {
            record.mass = MassMatrix {
                mass: mass.mass.max(0.0),
                inertia: mass.inertia,
            };
            self.push_mass_properties(body);
        }
    }

    fn body_center_of_mass(&self, body: RigidBodyHandle) -> Point3 {
        self.records
            .get(&body)
            .map(|record| record.center_of_mass)
            .unwrap_or_else(Point3::origin)
    }

    fn set_body_center_of_mass(&mut self, body: RigidBodyHandle, center: &Point3) {
        if let Some(record) = self.records.get_mut(&body) {
            record.center_of_mass = *center;
            self.push_mass_properties(body);
        }
    }

    fn body_velocity(&self, body: RigidBodyHandle) -> Vec3 {
        self.bodies
            .get(body)
            .map(|rb| *rb.linvel())
            .unwrap_or_else(Vec3::zeros)
    }

    fn set_body_velocity(&mut self, body: RigidBodyHandle, velocity: &Vec3) {
        if let Some(rb) = self.bodies.get_mut(body) {
            rb.set_linvel(*velocity, true);
        }
    }

    fn body_omega(&self, body: RigidBodyHandle) -> Vec3 {
        self.bodies
            .get(body)
            .map(|rb| *rb.angvel())
            .unwrap_or_else(Vec3::zeros)
    }

    fn set_body_omega(&mut self, body: RigidBodyHandle, omega: &Vec3) {
        if let Some(rb) = self.bodies.get_mut(body) {
            rb.set_angvel(*omega, true);
        }
    }

    fn set_body_collision_shape(&mut self, body: RigidBodyHandle, shape: Option<&SharedShape>) {
        let Some(record) = self.records.get_mut(&body) else {
            return;
        };

        match (record.collider, shape) {
            (Some(collider), Some(shape)) => {
                if let Some(collider) = self.colliders.get_mut(collider) {
                    collider.set_shape(shape.clone());
                }
            }
            (Some(collider), None) => {
                self.colliders
                    .remove(collider, &mut self.islands, &mut self.bodies, true);
                record.collider = None;
            }
            (None, Some(shape)) => {
                record.collider = Some(attach_collider(
                    &mut self.colliders,
                    &mut self.bodies,
                    body,
                    shape,
                ));
            }
            (None, None) => {}
        }
    }

    fn body_sleep_state(&self, body: RigidBodyHandle) -> bool {
        self.bodies.get(body).is_some_and(|rb| rb.is_sleeping())
    }

    fn set_body_sleep_state(&mut self, body: RigidBodyHandle, sleeping: bool) {
        if let Some(rb) = self.bodies.get_mut(body) {
            if sleeping {
                rb.sleep();
            } else {
                rb.wake_up(true);
            }
        }
    }

    fn body_auto_sleep(&self, body: RigidBodyHandle) -> bool {
        self.records
            .get(&body)
            .is_some_and(|record| record.auto_sleep)
    }

    fn set_body_auto_sleep(&mut self, body: RigidBodyHandle, auto_sleep: bool) {
        let (Some(record), Some(rb)) = (self.records.get_mut(&body), self.bodies.get_mut(body))
        else {
            return;
        };

        record.auto_sleep = auto_sleep;
        *rb.activation_mut() = if auto_sleep {
            RigidBodyActivation::active()
        } else {
            RigidBodyActivation::cannot_sleep()
        };
    }

    fn set_force_torque_callback(&mut self, body: RigidBodyHandle, callback: ForceTorqueCallback) {
        if let Some(record) = self.records.get_mut(&body) {
            record.force_torque = Some(callback);
        }
    }

    fn set_transform_callback(&mut self, body: RigidBodyHandle, callback: TransformCallback) {
        if let Some(record) = self.records.get_mut(&body) {
            record.transform = Some(callback);
        }
    }

    fn body_aabb(&self, body: RigidBodyHandle) -> Aabb {
        let Some(rb) = self.bodies.get(body) else {
            return Aabb::from_point(Point3::origin());
        };

        let collider = self
            .records
            .get(&body)
            .and_then(|record| record.collider)
            .and_then(|collider| self.colliders.get(collider));

        match collider {
            Some(collider) => {
                let aabb = collider.shape().compute_aabb(rb.position());
                Aabb::new(aabb.mins, aabb.maxs)
            }
            None => Aabb::from_point(Point3::from(*rb.translation())),
        }
    }

    fn step(&mut self, time_step: Real) {
        self.integration_params.dt = time_step;

        let mut forced = 0usize;
        for (handle, record) in self.records.iter_mut() {
            let Some(rb) = self.bodies.get_mut(*handle) else {
                continue;
            };
            if !rb.is_dynamic() {
                continue;
            }

            // a contact may wake a sleeper mid-step: it must not reuse stale forces
            let callback = match record.force_torque.as_mut() {
                Some(callback) if !rb.is_sleeping() => callback,
                _ => {
                    rb.reset_forces(false);
                    rb.reset_torques(false);
                    continue;
                }
            };

            let mut forces = StepForces::default();
            callback(&mut forces, time_step, 0);

            rb.reset_forces(false);
            rb.reset_torques(false);
            rb.add_force(forces.force, false);
            rb.add_torque(forces.torque, false);
            forced += 1;
        }

        self.pipeline.step(
            &Vector3::zeros(),
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );

        let mut moved = 0usize;
        for (handle, record) in self.records.iter_mut() {
            let Some(callback) = record.transform.as_mut() else {
                continue;
            };
            let Some(rb) = self.bodies.get(*handle) else {
                continue;
            };
            if !rb.is_dynamic() || rb.is_sleeping() {
                continue;
            }

            callback(&rb.position().to_homogeneous(), 0);
            moved += 1;
        }

        trace!(dt = time_step, forced, moved, "rapier step");
    }

    fn set_solver_iterations(&mut self, iterations: u32) {
        if let Some(iterations) = NonZeroUsize::new(iterations as usize) {
            self.integration_params.num_solver_iterations = iterations;
        }
    }
}
