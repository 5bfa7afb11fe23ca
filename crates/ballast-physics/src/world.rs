//! Simulation world: owns the engine and the gravity every body falls under.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

use ballast_math::{Real, Vec3};
use tracing::debug;

use crate::config::WorldConfig;
use crate::engine::SimulationEngine;
use crate::error::PhysicsError;
use crate::rapier::RapierEngine;

/// Physics simulation world.
///
/// Bodies borrow the world for their whole life, so every method takes
/// `&self`; the engine sits behind a `RefCell` and is only borrowed for
/// the duration of a single call.
pub struct PhysWorld<E: SimulationEngine = RapierEngine> {
    engine: RefCell<E>,
    gravity: Rc<Cell<Vec3>>,
    step_size: Cell<Real>,
    max_steps_per_call: u32,
    time_accumulator: Cell<Real>,
}

impl PhysWorld<RapierEngine> {
    /// Create a Rapier-backed world.
    pub fn new(config: &WorldConfig) -> Result<Self, PhysicsError> {
        Self::with_engine(RapierEngine::new(), config)
    }
}

impl<E: SimulationEngine> PhysWorld<E> {
    /// Create a world around an existing engine.
    pub fn with_engine(mut engine: E, config: &WorldConfig) -> Result<Self, PhysicsError> {
        config.validate()?;
        engine.set_solver_iterations(config.solver_iterations);

        Ok(Self {
            engine: RefCell::new(engine),
            gravity: Rc::new(Cell::new(config.gravity_vector())),
            step_size: Cell::new(config.step_size),
            max_steps_per_call: config.max_steps_per_call,
            time_accumulator: Cell::new(0.0),
        })
    }

    /// World gravity.
    pub fn gravity(&self) -> Vec3 {
        self.gravity.get()
    }

    /// Change world gravity. Takes effect on the next engine step.
    pub fn set_gravity(&self, gravity: Vec3) {
        self.gravity.set(gravity);
    }

    /// Fixed engine step in seconds.
    pub fn step_size(&self) -> Real {
        self.step_size.get()
    }

    /// Change the fixed engine step. Non-positive values are ignored.
    pub fn set_step_size(&self, step_size: Real) {
        if step_size > 0.0 {
            self.step_size.set(step_size);
        }
    }

    /// Advance the simulation by `dt` seconds of wall time.
    ///
    /// Time is accumulated and consumed in fixed `step_size` chunks; the
    /// remainder carries over to the next call. Returns the number of
    /// engine steps run.
    pub fn step(&self, dt: Real) -> u32 {
        let step_size = self.step_size.get();
        let mut accumulated = self.time_accumulator.get() + dt.max(0.0);
        let mut steps = 0;

        while accumulated >= step_size && steps < self.max_steps_per_call {
            self.engine.borrow_mut().step(step_size);
            accumulated -= step_size;
            steps += 1;
        }

        if accumulated >= step_size {
            debug!(
                dropped = accumulated,
                max_steps = self.max_steps_per_call,
                "step budget exhausted, dropping simulation time"
            );
            accumulated %= step_size;
        }

        self.time_accumulator.set(accumulated);
        steps
    }

    /// Borrow the engine for inspection.
    ///
    /// The borrow must be released before the next call on a body of this
    /// world.
    pub fn engine(&self) -> Ref<'_, E> {
        self.engine.borrow()
    }

    pub(crate) fn engine_mut(&self) -> RefMut<'_, E> {
        self.engine.borrow_mut()
    }

    /// Gravity cell shared with force callbacks.
    pub(crate) fn gravity_source(&self) -> Rc<Cell<Vec3>> {
        Rc::clone(&self.gravity)
    }
}
