//! Rigid bodies: authoritative pose, mass and pending forces of one engine body.
//!
//! A [`RigidBody`] keeps its own copy of the body transform. Application
//! writes (`set_position`, `set_rotation`) go to the engine immediately;
//! forces and torques are summed locally and handed to the engine once
//! per step by the force callback, which then clears them. After
//! integration the engine reports the new pose through the transform
//! callback.
//!
//! Both callbacks are installed the first time the body receives a
//! positive mass. They capture a weak reference to the body state, so a
//! body can be moved freely while its engine body keeps running.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ballast_math::{Aabb, CoordSys, Point3, Quat, Real, Tolerance, Transform, Vec3};
use nalgebra::Matrix4;
use tracing::{debug, trace};

use crate::engine::{
    ForceTorqueCallback, MassMatrix, SimulationEngine, StepForces, TransformCallback,
};
use crate::geometry::Geometry;
use crate::rapier::RapierEngine;
use crate::world::PhysWorld;

/// Whether the engine integrates the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    /// Non-positive mass. Never integrated.
    Static,
    /// Positive mass. Callbacks installed.
    Dynamic,
}

/// State shared with the engine callbacks.
#[derive(Debug, Clone)]
struct BodyState {
    transform: Transform,
    force: Vec3,
    torque: Vec3,
    gravity_factor: Real,
    mass: Real,
}

impl BodyState {
    fn new(transform: Transform) -> Self {
        Self {
            transform,
            force: Vec3::zeros(),
            torque: Vec3::zeros(),
            gravity_factor: 1.0,
            mass: 0.0,
        }
    }

    /// Add gravity, hand the accumulators to the engine and clear them.
    fn consume(&mut self, gravity: Vec3, forces: &mut StepForces) {
        if !Tolerance::DEFAULT.is_zero(self.gravity_factor) {
            self.force += gravity * self.gravity_factor * self.mass;
        }

        forces.force = self.force;
        forces.torque = self.torque;

        self.force = Vec3::zeros();
        self.torque = Vec3::zeros();
    }
}

/// A rigid body living in a [`PhysWorld`].
///
/// The body owns its engine handle exclusively and removes it from the
/// engine when dropped. Cloning creates a new engine body at rest with
/// the same geometry, pose, mass and gravity factor.
pub struct RigidBody<'w, E: SimulationEngine = RapierEngine> {
    world: &'w PhysWorld<E>,
    handle: E::BodyHandle,
    geometry: Geometry,
    state: Rc<RefCell<BodyState>>,
    motion: Motion,
}

impl<'w, E: SimulationEngine> RigidBody<'w, E> {
    /// Create a static body. `None` geometry means no collision.
    pub fn new(world: &'w PhysWorld<E>, geometry: Option<Geometry>, transform: Transform) -> Self {
        let geometry = geometry.unwrap_or_else(Geometry::null);
        let handle = world.engine_mut().create_body(geometry.shape(), &transform);
        debug!(?handle, ?geometry, "created rigid body");

        Self {
            world,
            handle,
            geometry,
            state: Rc::new(RefCell::new(BodyState::new(transform))),
            motion: Motion::Static,
        }
    }

    /// Create a static body without collision geometry.
    pub fn with_transform(world: &'w PhysWorld<E>, transform: Transform) -> Self {
        Self::new(world, None, transform)
    }

    /// Accumulate a force for the next step.
    pub fn add_force(&mut self, force: &Vec3, coord: CoordSys) {
        {
            let mut state = self.state.borrow_mut();
            let force = match coord {
                CoordSys::Global => *force,
                CoordSys::Local => state.transform.apply_vec(force),
            };
            state.force += force;
        }

        self.wake_up();
    }

    /// Accumulate a force applied at `point`, which also produces a torque
    /// around the center of mass.
    pub fn add_force_at_point(&mut self, force: &Vec3, point: &Point3, coord: CoordSys) {
        match coord {
            CoordSys::Global => {
                let center = self.mass_center(CoordSys::Global);
                {
                    let mut state = self.state.borrow_mut();
                    state.force += *force;
                    state.torque += (*point - center).cross(force);
                }
                self.wake_up();
            }
            CoordSys::Local => {
                let (force, point) = {
                    let state = self.state.borrow();
                    (
                        state.transform.apply_vec(force),
                        state.transform.apply_point(point),
                    )
                };
                self.add_force_at_point(&force, &point, CoordSys::Global);
            }
        }
    }

    /// Accumulate a torque for the next step.
    pub fn add_torque(&mut self, torque: &Vec3, coord: CoordSys) {
        {
            let mut state = self.state.borrow_mut();
            let torque = match coord {
                CoordSys::Global => *torque,
                CoordSys::Local => state.transform.apply_vec(torque),
            };
            state.torque += torque;
        }

        self.wake_up();
    }

    /// Force waiting for the next step, in world space.
    pub fn accumulated_force(&self) -> Vec3 {
        self.state.borrow().force
    }

    /// Torque waiting for the next step, in world space.
    pub fn accumulated_torque(&self) -> Vec3 {
        self.state.borrow().torque
    }

    /// Let the engine put the body to sleep when it comes to rest.
    pub fn enable_auto_sleep(&mut self, auto_sleep: bool) {
        self.world
            .engine_mut()
            .set_body_auto_sleep(self.handle, auto_sleep);
    }

    /// World-space bounding box.
    pub fn aabb(&self) -> Aabb {
        self.world.engine().body_aabb(self.handle)
    }

    /// Angular velocity in world space.
    pub fn angular_velocity(&self) -> Vec3 {
        self.world.engine().body_omega(self.handle)
    }

    /// Collision geometry.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Multiplier applied to world gravity. 0 disables gravity.
    pub fn gravity_factor(&self) -> Real {
        self.state.borrow().gravity_factor
    }

    /// Engine handle of this body.
    pub fn handle(&self) -> E::BodyHandle {
        self.handle
    }

    /// Last mass passed to [`set_mass`](Self::set_mass).
    pub fn mass(&self) -> Real {
        self.state.borrow().mass
    }

    /// Mass and inertia as the engine currently holds them.
    pub fn mass_matrix(&self) -> MassMatrix {
        self.world.engine().body_mass_matrix(self.handle)
    }

    /// Center of mass, body-local or transformed into world space.
    pub fn mass_center(&self, coord: CoordSys) -> Point3 {
        let center = self.world.engine().body_center_of_mass(self.handle);

        match coord {
            CoordSys::Global => self.state.borrow().transform.apply_point(&center),
            CoordSys::Local => center,
        }
    }

    /// Current transform.
    pub fn transform(&self) -> Transform {
        self.state.borrow().transform
    }

    /// Translation part of the current transform.
    pub fn position(&self) -> Vec3 {
        self.state.borrow().transform.translation()
    }

    /// Rotation part of the current transform.
    pub fn rotation(&self) -> Quat {
        self.state.borrow().transform.rotation()
    }

    /// Linear velocity in world space.
    pub fn velocity(&self) -> Vec3 {
        self.world.engine().body_velocity(self.handle)
    }

    /// Whether the engine may put this body to sleep.
    pub fn is_auto_sleep_enabled(&self) -> bool {
        self.world.engine().body_auto_sleep(self.handle)
    }

    /// True iff the last mass set was strictly positive.
    pub fn is_moveable(&self) -> bool {
        self.mass() > 0.0
    }

    /// Whether the engine has put this body to sleep.
    pub fn is_sleeping(&self) -> bool {
        self.world.engine().body_sleep_state(self.handle)
    }

    /// Static or dynamic, as last pushed to the engine.
    pub fn motion(&self) -> Motion {
        self.motion
    }

    /// The world this body lives in.
    pub fn world(&self) -> &'w PhysWorld<E> {
        self.world
    }

    /// Set angular velocity in world space.
    pub fn set_angular_velocity(&mut self, angular_velocity: &Vec3) {
        self.world
            .engine_mut()
            .set_body_omega(self.handle, angular_velocity);
    }

    /// Replace the collision geometry. `None` removes collision.
    ///
    /// Inertia is not recomputed; it follows the geometry only when the
    /// body next goes from static to dynamic.
    pub fn set_geometry(&mut self, geometry: Option<Geometry>) {
        let geometry = geometry.unwrap_or_else(Geometry::null);
        if self.geometry == geometry {
            return;
        }

        self.geometry = geometry;
        self.world
            .engine_mut()
            .set_body_collision_shape(self.handle, self.geometry.shape());
    }

    /// Set the gravity multiplier.
    pub fn set_gravity_factor(&mut self, gravity_factor: Real) {
        self.state.borrow_mut().gravity_factor = gravity_factor;
    }

    /// Set the mass. Zero or negative makes the body static.
    ///
    /// Going from static to dynamic derives inertia and center of mass
    /// from the geometry and installs the step callbacks. Changing between
    /// two positive masses scales the existing inertia. Going back to
    /// static drops any pending forces and torques.
    pub fn set_mass(&mut self, mass: Real) {
        match (self.motion, mass > 0.0) {
            (Motion::Dynamic, true) => self.rescale_mass(mass),
            (Motion::Static, true) => self.become_dynamic(mass),
            (Motion::Dynamic, false) => self.become_static(),
            (Motion::Static, false) => {}
        }

        self.state.borrow_mut().mass = mass;
    }

    /// Move the center of mass (body-local). Ignored while static.
    pub fn set_mass_center(&mut self, center: &Point3) {
        if self.is_moveable() {
            self.world
                .engine_mut()
                .set_body_center_of_mass(self.handle, center);
        }
    }

    /// Teleport to `position`, keeping the rotation.
    pub fn set_position(&mut self, position: &Vec3) {
        self.state
            .borrow_mut()
            .transform
            .set_translation(position);
        self.update_body();
    }

    /// Rotate to `rotation`, keeping the position.
    pub fn set_rotation(&mut self, rotation: &Quat) {
        self.state.borrow_mut().transform.set_rotation(rotation);
        self.update_body();
    }

    /// Replace the whole transform.
    pub fn set_transform(&mut self, transform: Transform) {
        self.state.borrow_mut().transform = transform;
        self.update_body();
    }

    /// Set linear velocity in world space.
    pub fn set_velocity(&mut self, velocity: &Vec3) {
        self.world
            .engine_mut()
            .set_body_velocity(self.handle, velocity);
    }

    fn update_body(&self) {
        let transform = self.state.borrow().transform;
        self.world
            .engine_mut()
            .set_body_transform(self.handle, &transform);
    }

    fn wake_up(&self) {
        self.world
            .engine_mut()
            .set_body_sleep_state(self.handle, false);
    }

    fn rescale_mass(&mut self, mass: Real) {
        let mut engine = self.world.engine_mut();
        let current = engine.body_mass_matrix(self.handle);
        if current.mass <= 0.0 {
            drop(engine);
            self.become_dynamic(mass);
            return;
        }

        let scale = mass / current.mass;
        engine.set_body_mass_matrix(
            self.handle,
            MassMatrix {
                mass,
                inertia: current.inertia * scale,
            },
        );
        debug!(handle = ?self.handle, from = current.mass, to = mass, "rescaled mass");
    }

    fn become_dynamic(&mut self, mass: Real) {
        let (inertia, origin) = self.geometry.compute_inertial_matrix();

        let mut engine = self.world.engine_mut();
        engine.set_body_center_of_mass(self.handle, &origin);
        engine.set_body_mass_matrix(
            self.handle,
            MassMatrix {
                mass,
                inertia: inertia * mass,
            },
        );
        engine.set_force_torque_callback(self.handle, self.force_torque_callback());
        engine.set_transform_callback(self.handle, self.transform_callback());

        self.motion = Motion::Dynamic;
        debug!(handle = ?self.handle, mass, "body became dynamic");
    }

    fn become_static(&mut self) {
        self.world
            .engine_mut()
            .set_body_mass_matrix(self.handle, MassMatrix::zero());

        let mut state = self.state.borrow_mut();
        state.force = Vec3::zeros();
        state.torque = Vec3::zeros();

        self.motion = Motion::Static;
        debug!(handle = ?self.handle, "body became static");
    }

    fn force_torque_callback(&self) -> ForceTorqueCallback {
        let state: Weak<RefCell<BodyState>> = Rc::downgrade(&self.state);
        let gravity = self.world.gravity_source();

        Box::new(
            move |forces: &mut StepForces, time_step: Real, thread_index: usize| {
                let Some(shared) = state.upgrade() else {
                    return;
                };
                shared.borrow_mut().consume(gravity.get(), forces);
                trace!(
                    force = ?forces.force,
                    torque = ?forces.torque,
                    time_step,
                    thread_index,
                    "applied accumulated forces"
                );
            },
        )
    }

    fn transform_callback(&self) -> TransformCallback {
        let state: Weak<RefCell<BodyState>> = Rc::downgrade(&self.state);

        Box::new(move |matrix: &Matrix4<Real>, _thread_index: usize| {
            if let Some(shared) = state.upgrade() {
                shared.borrow_mut().transform = Transform { matrix: *matrix };
            }
        })
    }
}

impl<E: SimulationEngine> Clone for RigidBody<'_, E> {
    fn clone(&self) -> Self {
        let (transform, gravity_factor, mass) = {
            let state = self.state.borrow();
            (state.transform, state.gravity_factor, state.mass)
        };

        let mut body = Self::new(self.world, Some(self.geometry.clone()), transform);
        body.set_gravity_factor(gravity_factor);
        body.set_mass(mass);
        body
    }
}

impl<E: SimulationEngine> Drop for RigidBody<'_, E> {
    fn drop(&mut self) {
        self.world.engine_mut().destroy_body(self.handle);
        debug!(handle = ?self.handle, "destroyed rigid body");
    }
}

impl<E: SimulationEngine> fmt::Debug for RigidBody<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("RigidBody")
            .field("handle", &self.handle)
            .field("geometry", &self.geometry)
            .field("motion", &self.motion)
            .field("mass", &state.mass)
            .field("position", &state.transform.translation())
            .finish()
    }
}
