/// Asynchronous Chunk Pipeline
///
/// Moves sampling and surface extraction off the main thread.
///
/// Key features:
/// - `rayon` worker pool at reduced priority
/// - Per-chunk tickets; superseded results are discarded, never applied
/// - Cooperative cancellation through shared tokens
/// - Completions delivered over a `crossbeam` channel and drained by `poll`
/// - Pooled sample blocks, shape builders and mesh buffers

pub mod async_chunk;
pub mod cancel;
pub mod error;
pub mod workers;

pub use async_chunk::{
    AsyncChunkPipeline, ChunkRequest, Completion, FillMode, PipelinePools, PipelineStats, Ticket,
    WorkOutcome,
};
pub use cancel::{CancellationToken, Cancelled};
pub use error::{PipelineErrorContext, PipelineResult};
pub use workers::{default_worker_count, WorkerPool};
