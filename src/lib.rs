pub mod chunk;
pub mod config;
pub mod constants;
pub mod error;
pub mod field;
pub mod grid;
pub mod mesh;
pub mod pipeline;
pub mod pool;
pub mod sample;
pub mod terrain;

pub use chunk::{Chunk, ChunkCoords, ChunkKey, ChunkPhase, SeamMargin};
pub use config::{PoolConfig, TerrainConfig};
pub use error::{TerrainError, TerrainResult};
pub use field::{Aabb, Bounds, DistanceField, FieldDef, FieldSnapshot, FieldSource};
pub use grid::PanningGrid;
pub use mesh::{MeshBuffer, MeshCapacity, Primitive, ShapeBuilder, SurfaceExtractor};
pub use pipeline::{AsyncChunkPipeline, CancellationToken, ChunkRequest, FillMode, Ticket};
pub use sample::{SampleBlock, SampleLayout};
pub use terrain::{ChunkOutput, FrameStats, MeshSink, NullSink, TerrainLayer};
