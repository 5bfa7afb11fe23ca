#![warn(missing_docs)]

//! Rigid-body physics objects on top of an external simulation engine.
//!
//! A [`RigidBody`] owns the authoritative pose, mass and pending forces of
//! one engine body. Pose changes made by the application reach the engine
//! immediately; forces and torques are accumulated and handed over once
//! per step through engine callbacks, which also report the integrated
//! pose back.
//!
//! # Features
//!
//! - [`SimulationEngine`] contract with a Rapier3d implementation
//! - Shared, identity-compared collision [`Geometry`]
//! - Global or body-local forces, torques and forces at a point
//! - Fixed-step [`PhysWorld`] configured from TOML
//!
//! # Example
//!
//! ```no_run
//! use ballast_physics::math::{CoordSys, Transform, Vec3};
//! use ballast_physics::{Geometry, PhysWorld, RigidBody, WorldConfig};
//!
//! let world = PhysWorld::new(&WorldConfig::default()).unwrap();
//! let mut crate_body = RigidBody::new(&world, Some(Geometry::ball(0.5)), Transform::identity());
//! crate_body.set_mass(10.0);
//! crate_body.add_force(&Vec3::new(0.0, 50.0, 0.0), CoordSys::Global);
//!
//! world.step(1.0 / 60.0);
//! println!("{}", crate_body.position());
//! ```

mod body;
mod config;
mod engine;
mod error;
mod geometry;
mod rapier;
mod world;

pub use ballast_math as math;

pub use body::{Motion, RigidBody};
pub use config::WorldConfig;
pub use engine::{
    ForceTorqueCallback, MassMatrix, SimulationEngine, StepForces, TransformCallback,
};
pub use error::PhysicsError;
pub use geometry::{ColliderStrategy, Geometry, TriangleMesh};
pub use rapier::RapierEngine;
pub use world::PhysWorld;
