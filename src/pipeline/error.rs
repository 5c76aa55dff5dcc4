/// Pipeline Error Handling
///
/// Failures inside a background unit are converted into `ChunkFailed` errors tagged
/// with the stage that produced them.

use std::any::Any;

use crate::error::{TerrainError, TerrainResult};

/// Pipeline-specific result type
pub type PipelineResult<T> = TerrainResult<T>;

/// Error context for pipeline stages
pub trait PipelineErrorContext<T> {
    fn pipeline_context(self, component: &str) -> PipelineResult<T>;
}

impl<T, E> PipelineErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn pipeline_context(self, component: &str) -> PipelineResult<T> {
        self.map_err(|e| chunk_failed(component, e))
    }
}

impl<T> PipelineErrorContext<T> for Option<T> {
    fn pipeline_context(self, component: &str) -> PipelineResult<T> {
        self.ok_or_else(|| chunk_failed(component, "missing value"))
    }
}

pub fn chunk_failed(component: &str, reason: impl std::fmt::Display) -> TerrainError {
    TerrainError::ChunkFailed {
        component: component.to_string(),
        reason: reason.to_string(),
    }
}

/// Readable message from a caught panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
