use crate::chunk::ChunkKey;
use crate::field::Aabb;
use crate::mesh::MeshBuffer;

/// A chunk result handed to the host
#[derive(Debug, Clone, Copy)]
pub struct ChunkOutput<'a> {
    pub key: ChunkKey,
    /// `None` when the chunk has no surface
    pub mesh: Option<&'a MeshBuffer>,
    /// World bounds of the chunk
    pub bounds: Aabb,
}

/// Receiver of finished chunk geometry, typically the host's renderer.
///
/// Buffers are only borrowed; a sink that keeps geometry copies it (or uploads it)
/// during the call.
pub trait MeshSink {
    /// New or replaced output for `output.key`
    fn chunk_ready(&mut self, output: ChunkOutput<'_>);

    /// The chunk's output should no longer be shown
    fn chunk_removed(&mut self, key: ChunkKey);

    /// Wireframe bounds of a chunk, sent when debug bounds are enabled
    fn chunk_debug(&mut self, _key: ChunkKey, _lines: &MeshBuffer) {}
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MeshSink for NullSink {
    fn chunk_ready(&mut self, _output: ChunkOutput<'_>) {}

    fn chunk_removed(&mut self, _key: ChunkKey) {}
}
