use super::coords::ChunkKey;
use crate::mesh::MeshBuffer;
use crate::pipeline::Ticket;

/// Where a chunk is in its compute cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPhase {
    Idle,
    Scheduled,
    Running,
    Completed,
    Cancelled,
}

/// Bounds-culling result cached for one field version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CullState {
    pub version: u64,
    pub may_contain_surface: bool,
}

/// One chunk of one detail level, owned by a panning grid cell
#[derive(Debug)]
pub struct Chunk {
    key: ChunkKey,
    pub dirty: bool,
    /// Covered by the next finer level, so not shown
    pub hollow: bool,
    pub phase: ChunkPhase,
    /// Ticket of the in-flight computation, if any
    pub ticket: Option<Ticket>,
    /// Field version the current result was computed against (0 = none)
    pub result_version: u64,
    /// The sink currently holds this chunk's output
    pub delivered: bool,
    pub cull: Option<CullState>,
    mesh: Option<MeshBuffer>,
}

impl Chunk {
    /// A fresh chunk that still needs its shape computed
    pub fn new(key: ChunkKey) -> Self {
        Self {
            key,
            dirty: true,
            hollow: false,
            phase: ChunkPhase::Idle,
            ticket: None,
            result_version: 0,
            delivered: false,
            cull: None,
            mesh: None,
        }
    }

    pub fn key(&self) -> ChunkKey {
        self.key
    }

    pub fn mesh(&self) -> Option<&MeshBuffer> {
        self.mesh.as_ref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.ticket.is_some()
    }

    /// Install a finished result, returning the mesh it replaces
    pub fn complete(&mut self, mesh: Option<MeshBuffer>, version: u64) -> Option<MeshBuffer> {
        self.ticket = None;
        self.dirty = false;
        self.result_version = version;
        self.phase = ChunkPhase::Completed;
        std::mem::replace(&mut self.mesh, mesh)
    }

    /// Drop any in-flight ticket and mark the chunk for recomputation
    pub fn mark_cancelled(&mut self) {
        self.ticket = None;
        self.dirty = true;
        self.phase = ChunkPhase::Cancelled;
    }

    /// Give up the mesh, e.g. on disposal
    pub fn take_mesh(&mut self) -> Option<MeshBuffer> {
        self.mesh.take()
    }

    /// Cached culling result, if it was computed for `version`
    pub fn cull_for(&self, version: u64) -> Option<bool> {
        self.cull
            .filter(|c| c.version == version)
            .map(|c| c.may_contain_surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshCapacity;
    use glam::IVec3;

    #[test]
    fn test_chunk_lifecycle() {
        let mut chunk = Chunk::new(ChunkKey::new(IVec3::new(1, 2, 3), 0));
        assert!(chunk.dirty);
        assert_eq!(chunk.phase, ChunkPhase::Idle);

        chunk.ticket = Some(Ticket(7));
        chunk.phase = ChunkPhase::Scheduled;
        assert!(chunk.is_in_flight());

        let old = chunk.complete(Some(MeshBuffer::new(MeshCapacity::for_counts(0, 0))), 3);
        assert!(old.is_none());
        assert!(!chunk.dirty);
        assert!(!chunk.is_in_flight());
        assert_eq!(chunk.result_version, 3);
        assert_eq!(chunk.phase, ChunkPhase::Completed);
        assert!(chunk.mesh().is_some());

        chunk.mark_cancelled();
        assert!(chunk.dirty);
        assert_eq!(chunk.phase, ChunkPhase::Cancelled);
        assert!(chunk.take_mesh().is_some());
    }

    #[test]
    fn test_cull_cache_is_per_version() {
        let mut chunk = Chunk::new(ChunkKey::new(IVec3::ZERO, 2));
        chunk.cull = Some(CullState {
            version: 4,
            may_contain_surface: false,
        });
        assert_eq!(chunk.cull_for(4), Some(false));
        assert_eq!(chunk.cull_for(5), None);
    }
}
