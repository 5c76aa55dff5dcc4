/// Terrain error types
///
/// One error enum for the whole crate. Subsystems add their own result aliases and
/// context traits on top of it (see `field::error` and `pipeline::error`).

use thiserror::Error;

/// Errors surfaced by the terrain core
#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("failed to parse terrain configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid field definition: {reason}")]
    InvalidField { reason: String },

    #[error("field codec error ({format}): {reason}")]
    Codec { format: String, reason: String },

    #[error("{resource} capacity exceeded: requested {requested}, capacity {capacity}")]
    CapacityExceeded {
        resource: String,
        requested: usize,
        capacity: usize,
    },

    #[error("position ({x}, {y}, {z}) lies outside the panning window")]
    OutOfWindow { x: i32, y: i32, z: i32 },

    #[error("worker pool error: {reason}")]
    WorkerPool { reason: String },

    #[error("chunk computation failed in {component}: {reason}")]
    ChunkFailed { component: String, reason: String },
}

/// Crate-wide result type
pub type TerrainResult<T> = Result<T, TerrainError>;

/// Build an `InvalidConfig` error
pub fn config_error(field: &str, reason: impl std::fmt::Display) -> TerrainError {
    TerrainError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Build a `CapacityExceeded` error
pub fn capacity_error(resource: &str, requested: usize, capacity: usize) -> TerrainError {
    TerrainError::CapacityExceeded {
        resource: resource.to_string(),
        requested,
        capacity,
    }
}
