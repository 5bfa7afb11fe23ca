//! Checks what a body asks of its engine, using an engine that records calls.

use std::cell::Cell;
use std::collections::HashMap;

use approx::assert_relative_eq;
use ballast_physics::math::{Aabb, CoordSys, Point3, Quat, Real, Transform, Vec3};
use ballast_physics::{
    ForceTorqueCallback, Geometry, MassMatrix, Motion, PhysWorld, RigidBody, SimulationEngine,
    StepForces, TransformCallback, WorldConfig,
};
use nalgebra::Matrix4;
use parry3d::shape::SharedShape;

struct Record {
    transform: Transform,
    mass: MassMatrix,
    center_of_mass: Point3,
    velocity: Vec3,
    omega: Vec3,
    has_shape: bool,
    sleeping: bool,
    auto_sleep: bool,
    force_torque: Option<ForceTorqueCallback>,
    transform_cb: Option<TransformCallback>,
    applied: StepForces,
    force_calls: usize,
}

impl Record {
    fn new(transform: Transform, has_shape: bool) -> Self {
        Self {
            transform,
            mass: MassMatrix::zero(),
            center_of_mass: Point3::origin(),
            velocity: Vec3::zeros(),
            omega: Vec3::zeros(),
            has_shape,
            sleeping: false,
            auto_sleep: true,
            force_torque: None,
            transform_cb: None,
            applied: StepForces::default(),
            force_calls: 0,
        }
    }
}

/// Engine double: integrates nothing, reports a scripted pose if one is set.
#[derive(Default)]
struct RecordingEngine {
    next_id: u32,
    bodies: HashMap<u32, Record>,
    wake_calls: usize,
    shape_updates: usize,
    scripted_pose: Cell<Option<Matrix4<Real>>>,
}

impl RecordingEngine {
    fn record(&self, body: u32) -> &Record {
        &self.bodies[&body]
    }

    fn has_callbacks(&self, body: u32) -> bool {
        let record = self.record(body);
        record.force_torque.is_some() && record.transform_cb.is_some()
    }

    fn script_pose(&self, pose: Matrix4<Real>) {
        self.scripted_pose.set(Some(pose));
    }
}

impl SimulationEngine for RecordingEngine {
    type BodyHandle = u32;

    fn create_body(&mut self, shape: Option<&SharedShape>, transform: &Transform) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.bodies.insert(id, Record::new(*transform, shape.is_some()));
        id
    }

    fn destroy_body(&mut self, body: u32) {
        self.bodies.remove(&body);
    }

    fn set_body_transform(&mut self, body: u32, transform: &Transform) {
        if let Some(record) = self.bodies.get_mut(&body) {
            record.transform = *transform;
        }
    }

    fn body_mass_matrix(&self, body: u32) -> MassMatrix {
        self.bodies
            .get(&body)
            .map(|r| r.mass)
            .unwrap_or_else(MassMatrix::zero)
    }

    fn set_body_mass_matrix(&mut self, body: u32, mass: MassMatrix) {
        if let Some(record) = self.bodies.get_mut(&body) {
            record.mass = mass;
        }
    }

    fn body_center_of_mass(&self, body: u32) -> Point3 {
        self.bodies
            .get(&body)
            .map(|r| r.center_of_mass)
            .unwrap_or_else(Point3::origin)
    }

    fn set_body_center_of_mass(&mut self, body: u32, center: &Point3) {
        if let Some(record) = self.bodies.get_mut(&body) {
            record.center_of_mass = *center;
        }
    }

    fn body_velocity(&self, body: u32) -> Vec3 {
        self.bodies.get(&body).map(|r| r.velocity).unwrap_or_else(Vec3::zeros)
    }

    fn set_body_velocity(&mut self, body: u32, velocity: &Vec3) {
        if let Some(record) = self.bodies.get_mut(&body) {
            record.velocity = *velocity;
        }
    }

    fn body_omega(&self, body: u32) -> Vec3 {
        self.bodies.get(&body).map(|r| r.omega).unwrap_or_else(Vec3::zeros)
    }

    fn set_body_omega(&mut self, body: u32, omega: &Vec3) {
        if let Some(record) = self.bodies.get_mut(&body) {
            record.omega = *omega;
        }
    }

    fn set_body_collision_shape(&mut self, body: u32, shape: Option<&SharedShape>) {
        if let Some(record) = self.bodies.get_mut(&body) {
            record.has_shape = shape.is_some();
            self.shape_updates += 1;
        }
    }

    fn body_sleep_state(&self, body: u32) -> bool {
        self.bodies.get(&body).is_some_and(|r| r.sleeping)
    }

    fn set_body_sleep_state(&mut self, body: u32, sleeping: bool) {
        if let Some(record) = self.bodies.get_mut(&body) {
            record.sleeping = sleeping;
            if !sleeping {
                self.wake_calls += 1;
            }
        }
    }

    fn body_auto_sleep(&self, body: u32) -> bool {
        self.bodies.get(&body).is_some_and(|r| r.auto_sleep)
    }

    fn set_body_auto_sleep(&mut self, body: u32, auto_sleep: bool) {
        if let Some(record) = self.bodies.get_mut(&body) {
            record.auto_sleep = auto_sleep;
        }
    }

    fn set_force_torque_callback(&mut self, body: u32, callback: ForceTorqueCallback) {
        if let Some(record) = self.bodies.get_mut(&body) {
            record.force_torque = Some(callback);
        }
    }

    fn set_transform_callback(&mut self, body: u32, callback: TransformCallback) {
        if let Some(record) = self.bodies.get_mut(&body) {
            record.transform_cb = Some(callback);
        }
    }

    fn body_aabb(&self, body: u32) -> Aabb {
        let p = self
            .bodies
            .get(&body)
            .map(|r| Point3::from(r.transform.translation()))
            .unwrap_or_else(Point3::origin);
        Aabb::from_point(p)
    }

    fn step(&mut self, time_step: Real) {
        let scripted = self.scripted_pose.take();
        for record in self.bodies.values_mut() {
            if record.mass.mass <= 0.0 || record.sleeping {
                continue;
            }

            if let Some(callback) = record.force_torque.as_mut() {
                let mut forces = StepForces::default();
                callback(&mut forces, time_step, 0);
                record.applied = forces;
                record.force_calls += 1;
            }

            let pose = scripted.unwrap_or(record.transform.matrix);
            record.transform = Transform { matrix: pose };
            if let Some(callback) = record.transform_cb.as_mut() {
                callback(&pose, 0);
            }
        }
    }
}

fn world() -> PhysWorld<RecordingEngine> {
    let config = WorldConfig {
        gravity: [0.0, -9.8, 0.0],
        step_size: 0.5,
        ..WorldConfig::default()
    };
    PhysWorld::with_engine(RecordingEngine::default(), &config).unwrap()
}

#[test]
fn test_scenario_gravity_plus_force() {
    let world = world();
    let mut body = RigidBody::with_transform(&world, Transform::identity());
    body.set_mass(10.0);
    body.add_force(&Vec3::new(0.0, 10.0, 0.0), CoordSys::Global);

    assert_eq!(world.step(0.5), 1);

    let engine = world.engine();
    let record = engine.record(body.handle());
    assert_relative_eq!(record.applied.force, Vec3::new(0.0, -88.0, 0.0), epsilon = 1e-4);
    assert_relative_eq!(record.applied.torque, Vec3::zeros());
    drop(engine);
    assert_eq!(body.accumulated_force(), Vec3::zeros());
    assert_eq!(body.accumulated_torque(), Vec3::zeros());
}

#[test]
fn test_callbacks_installed_lazily() {
    let world = world();
    let mut body = RigidBody::with_transform(&world, Transform::identity());
    assert!(!world.engine().has_callbacks(body.handle()));

    body.set_mass(0.0);
    assert!(!world.engine().has_callbacks(body.handle()));

    body.set_mass(1.0);
    assert!(world.engine().has_callbacks(body.handle()));
    assert_eq!(body.motion(), Motion::Dynamic);
}

#[test]
fn test_static_bodies_are_not_stepped() {
    let world = world();
    let mut body = RigidBody::with_transform(&world, Transform::identity());
    body.set_mass(2.0);
    body.set_mass(0.0);
    body.add_force(&Vec3::new(1.0, 0.0, 0.0), CoordSys::Global);

    world.step(0.5);
    assert_eq!(world.engine().record(body.handle()).force_calls, 0);
    assert_eq!(world.engine().body_mass_matrix(body.handle()), MassMatrix::zero());
    // nothing consumed the force while static
    assert_eq!(body.accumulated_force(), Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn test_every_add_wakes_the_body() {
    let world = world();
    let mut body = RigidBody::with_transform(&world, Transform::identity());

    body.add_force(&Vec3::zeros(), CoordSys::Global);
    body.add_torque(&Vec3::zeros(), CoordSys::Local);
    body.add_force_at_point(&Vec3::zeros(), &Point3::origin(), CoordSys::Global);
    // the local variant re-dispatches to the global one: one wake
    body.add_force_at_point(&Vec3::zeros(), &Point3::origin(), CoordSys::Local);

    assert_eq!(world.engine().wake_calls, 4);
}

#[test]
fn test_gravity_factor_zero_passes_force_through() {
    let world = world();
    let mut body = RigidBody::with_transform(&world, Transform::identity());
    body.set_mass(1.0);
    body.set_gravity_factor(0.0);
    body.add_force(&Vec3::new(0.0, 3.0, 0.0), CoordSys::Global);

    world.step(0.5);
    assert_relative_eq!(
        world.engine().record(body.handle()).applied.force,
        Vec3::new(0.0, 3.0, 0.0)
    );
}

#[test]
fn test_transform_callback_overwrites_pose() {
    let world = world();
    let mut body = RigidBody::with_transform(&world, Transform::identity());
    body.set_mass(1.0);
    body.set_position(&Vec3::new(9.0, 9.0, 9.0));

    let rotation = Quat::from_axis_angle(&Vec3::y_axis(), 0.7);
    let pose = Transform::from_parts(&Vec3::new(1.0, 2.0, 3.0), &rotation);
    world.engine().script_pose(pose.matrix);
    world.step(0.5);

    assert_relative_eq!(body.position(), Vec3::new(1.0, 2.0, 3.0), epsilon = 1e-6);
    assert!(body.rotation().angle_to(&rotation) < 1e-5);
}

#[test]
fn test_set_position_pushes_immediately() {
    let world = world();
    let mut body = RigidBody::with_transform(&world, Transform::identity());
    body.set_position(&Vec3::new(4.0, 5.0, 6.0));

    assert_relative_eq!(
        world.engine().record(body.handle()).transform.translation(),
        Vec3::new(4.0, 5.0, 6.0)
    );
}

#[test]
fn test_geometry_update_only_on_identity_change() {
    let world = world();
    let ball = Geometry::ball(1.0);
    let mut body = RigidBody::new(&world, Some(ball.clone()), Transform::identity());

    body.set_geometry(Some(ball.clone()));
    assert_eq!(world.engine().shape_updates, 0);

    body.set_geometry(Some(Geometry::ball(1.0)));
    assert_eq!(world.engine().shape_updates, 1);

    body.set_geometry(None);
    body.set_geometry(None);
    assert_eq!(world.engine().shape_updates, 2);
    assert!(!world.engine().record(body.handle()).has_shape);
}

#[test]
fn test_drop_releases_handle_once() {
    let world = world();
    let body = RigidBody::with_transform(&world, Transform::identity());
    let handle = body.handle();
    let moved = body;
    assert!(world.engine().bodies.contains_key(&handle));

    drop(moved);
    assert!(world.engine().bodies.is_empty());
}

#[test]
fn test_clone_re_derives_mass() {
    let world = world();
    let mut body = RigidBody::new(&world, Some(Geometry::ball(1.0)), Transform::identity());
    body.set_mass(5.0);
    body.set_gravity_factor(0.5);
    body.add_force(&Vec3::new(1.0, 1.0, 1.0), CoordSys::Global);

    let copy = body.clone();
    assert_ne!(copy.handle(), body.handle());
    assert!(world.engine().has_callbacks(copy.handle()));
    assert_eq!(copy.accumulated_force(), Vec3::zeros());
    assert_eq!(copy.gravity_factor(), 0.5);

    let engine = world.engine();
    assert_relative_eq!(
        engine.body_mass_matrix(copy.handle()).inertia,
        engine.body_mass_matrix(body.handle()).inertia
    );
}
