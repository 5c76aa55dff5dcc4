/// Chunk addressing and per-chunk state

pub mod state;
pub mod coords;

pub use state::{Chunk, ChunkPhase, CullState};
pub use coords::{is_covered_by_finer, ChunkCoords, ChunkKey, SeamMargin};
