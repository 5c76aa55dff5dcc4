/// Field System Error Handling
///
/// Result alias and context helpers for field definitions and their codecs.

use crate::error::{TerrainError, TerrainResult};

/// Field-specific result type
pub type FieldResult<T> = TerrainResult<T>;

/// Error context for field operations
pub trait FieldErrorContext<T> {
    fn field_context(self, context: &str) -> FieldResult<T>;
}

impl<T> FieldErrorContext<T> for Option<T> {
    fn field_context(self, context: &str) -> FieldResult<T> {
        self.ok_or_else(|| TerrainError::InvalidField {
            reason: context.to_string(),
        })
    }
}

impl<T, E> FieldErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn field_context(self, context: &str) -> FieldResult<T> {
        self.map_err(|e| TerrainError::Codec {
            format: context.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Reject a definition parameter
pub fn invalid_field(reason: impl std::fmt::Display) -> TerrainError {
    TerrainError::InvalidField {
        reason: reason.to_string(),
    }
}
