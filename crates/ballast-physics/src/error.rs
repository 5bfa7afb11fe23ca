//! Error types for the physics layer.

use thiserror::Error;

/// Errors that can occur while building worlds and geometry.
///
/// Body operations themselves are total: once a body exists every call on
/// it succeeds.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// Failed to create collision shape.
    #[error("Failed to create collision shape for {name}: {reason}")]
    CollisionShape {
        /// Geometry name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Invalid world configuration.
    #[error("Invalid world configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("Failed to parse world configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
