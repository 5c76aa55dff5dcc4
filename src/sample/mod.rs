/// Sample blocks
///
/// Dense lattices of field values for one chunk, the input of surface extraction.

mod block;

pub use block::SampleBlock;

use glam::DVec3;

use crate::field::Aabb;

/// Lattice geometry of one sample block
///
/// Sample `(x, y, z)` sits at `origin + (x, y, z) * spacing`. The chunk's own cells are
/// `[lead, lead + cells)` on every axis; the rest is seam margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleLayout {
    pub origin: DVec3,
    pub spacing: f64,
    pub cells: u32,
    pub lead: u32,
    pub trail: u32,
}

impl SampleLayout {
    pub fn corners_per_axis(&self) -> usize {
        self.cells as usize + 1 + self.lead as usize + self.trail as usize
    }

    pub fn cells_per_axis(&self) -> usize {
        self.corners_per_axis() - 1
    }

    pub fn sample_count(&self) -> usize {
        self.corners_per_axis().pow(3)
    }

    pub fn position(&self, x: usize, y: usize, z: usize) -> DVec3 {
        self.origin + DVec3::new(x as f64, y as f64, z as f64) * self.spacing
    }

    /// World position of the chunk's own minimum corner
    pub fn chunk_origin(&self) -> DVec3 {
        self.origin + DVec3::splat(self.lead as f64 * self.spacing)
    }

    /// World box covered by every sample, margins included
    pub fn bounds(&self) -> Aabb {
        let span = self.cells_per_axis() as f64 * self.spacing;
        Aabb::new(self.origin, self.origin + DVec3::splat(span))
    }

    /// Whether a cell index lies in the chunk's own (non-margin) range on one axis
    pub fn owns_cell(&self, index: usize) -> bool {
        let lead = self.lead as usize;
        index >= lead && index < lead + self.cells as usize
    }
}
