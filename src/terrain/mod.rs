/// Terrain Layer
///
/// Per-frame driver: pans each detail level's grid around the focus, schedules
/// dirty chunks on the pipeline and hands finished geometry to a `MeshSink`.
///
/// Key features:
/// - Coarser levels hollowed out where the finer level covers them
/// - Bounds culling cached per field version
/// - Nearest-first scheduling under a per-frame job budget
/// - Field replacement and full reconfiguration

pub mod layer;
pub mod sink;

pub use layer::{FrameStats, TerrainLayer};
pub use sink::{ChunkOutput, MeshSink, NullSink};
