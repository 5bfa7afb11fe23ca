//! World configuration.

use std::path::Path;

use ballast_math::{Real, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::PhysicsError;

/// Tunables for a [`PhysWorld`](crate::PhysWorld).
///
/// Every field has a default, so a TOML file only needs the keys it
/// overrides:
///
/// ```toml
/// gravity = [0.0, -9.8, 0.0]
/// step_size = 0.008333
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World gravity in m/s².
    pub gravity: [Real; 3],
    /// Fixed engine step in seconds.
    pub step_size: Real,
    /// Upper bound on engine steps run by a single `PhysWorld::step` call.
    pub max_steps_per_call: u32,
    /// Solver iterations per engine step.
    pub solver_iterations: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            step_size: 1.0 / 60.0,
            max_steps_per_call: 8,
            solver_iterations: 4,
        }
    }
}

impl WorldConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, PhysicsError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PhysicsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check the values are usable by the engine.
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(PhysicsError::Config(format!(
                "step_size must be positive, got {}",
                self.step_size
            )));
        }
        if self.max_steps_per_call == 0 {
            return Err(PhysicsError::Config(
                "max_steps_per_call must be at least 1".to_string(),
            ));
        }
        if self.solver_iterations == 0 {
            return Err(PhysicsError::Config(
                "solver_iterations must be at least 1".to_string(),
            ));
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(PhysicsError::Config("gravity must be finite".to_string()));
        }
        Ok(())
    }

    /// Gravity as a vector.
    pub fn gravity_vector(&self) -> Vec3 {
        Vec3::from(self.gravity)
    }
}
