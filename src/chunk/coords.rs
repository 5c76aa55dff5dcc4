use glam::{DVec3, IVec3};
use serde::{Deserialize, Serialize};

use crate::constants::layout::{MAX_CHUNK_CELLS, MAX_LEVEL_EXPONENT, MIN_CHUNK_CELLS};
use crate::error::{config_error, TerrainResult};
use crate::field::Aabb;
use crate::sample::SampleLayout;

/// Identity of a chunk: its coordinate within a detail level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub coord: IVec3,
    pub level: u32,
}

impl ChunkKey {
    pub fn new(coord: IVec3, level: u32) -> Self {
        Self { coord, level }
    }

    /// Create a new key offset by the given amounts on the same level
    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.coord + IVec3::new(dx, dy, dz), self.level)
    }

    /// The chunk one level coarser that contains this one
    pub fn parent(&self) -> Self {
        Self::new(self.coord.div_euclid(IVec3::splat(2)), self.level + 1)
    }
}

impl std::fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "L{}({}, {}, {})",
            self.level, self.coord.x, self.coord.y, self.coord.z
        )
    }
}

/// Leading and trailing seam margin, in cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeamMargin {
    pub lead: u32,
    pub trail: u32,
}

/// Mapping between world space, chunk coordinates and detail levels.
///
/// Level `n` (counted from the finest) has block size
/// `base_cell_size * 2^(finest_level + n)`; a chunk is `cells` blocks wide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkCoords {
    base_cell_size: f64,
    cells: u32,
    finest_level: i32,
}

impl ChunkCoords {
    pub fn new(base_cell_size: f64, cells: u32, finest_level: i32) -> TerrainResult<Self> {
        if !(base_cell_size.is_finite() && base_cell_size > 0.0) {
            return Err(config_error(
                "base_cell_size",
                format!("must be positive and finite, got {}", base_cell_size),
            ));
        }
        if !(MIN_CHUNK_CELLS..=MAX_CHUNK_CELLS).contains(&cells) {
            return Err(config_error(
                "chunk_cells",
                format!(
                    "must be in {}..={}, got {}",
                    MIN_CHUNK_CELLS, MAX_CHUNK_CELLS, cells
                ),
            ));
        }
        if finest_level.abs() > MAX_LEVEL_EXPONENT {
            return Err(config_error(
                "finest_level",
                format!("must be within ±{}, got {}", MAX_LEVEL_EXPONENT, finest_level),
            ));
        }
        Ok(Self {
            base_cell_size,
            cells,
            finest_level,
        })
    }

    pub fn cells_per_chunk(&self) -> u32 {
        self.cells
    }

    /// World size of one sample block on `level`
    pub fn block_size(&self, level: u32) -> f64 {
        self.base_cell_size * 2f64.powi(self.finest_level + level as i32)
    }

    pub fn chunk_world_size(&self, level: u32) -> f64 {
        self.block_size(level) * self.cells as f64
    }

    pub fn chunk_world_origin(&self, coord: IVec3, level: u32) -> DVec3 {
        coord.as_dvec3() * self.chunk_world_size(level)
    }

    pub fn chunk_for_world_pos(&self, pos: DVec3, level: u32) -> IVec3 {
        (pos / self.chunk_world_size(level)).floor().as_ivec3()
    }

    pub fn chunk_bounds(&self, coord: IVec3, level: u32) -> Aabb {
        let size = self.chunk_world_size(level);
        let min = coord.as_dvec3() * size;
        Aabb::new(min, min + DVec3::splat(size))
    }

    /// Sample lattice for a chunk, widened by the seam margin
    pub fn sampling_layout(&self, coord: IVec3, level: u32, margin: SeamMargin) -> SampleLayout {
        let spacing = self.block_size(level);
        let origin =
            self.chunk_world_origin(coord, level) - DVec3::splat(margin.lead as f64 * spacing);
        SampleLayout {
            origin,
            spacing,
            cells: self.cells,
            lead: margin.lead,
            trail: margin.trail,
        }
    }

    /// Window corner for `level`: roughly centered on the focus chunk and aligned down
    /// to an even coordinate so the next coarser level's chunk faces coincide with this
    /// one's. The focus chunk is always inside the window.
    pub fn level_corner(&self, focus: DVec3, level: u32, grid_side: u32) -> IVec3 {
        let center = self.chunk_for_world_pos(focus, level);
        let corner = center - IVec3::splat(grid_side as i32 / 2 - 1);
        corner.div_euclid(IVec3::splat(2)) * 2
    }
}

/// True when the coarse chunk's footprint lies entirely inside the finer level's window
pub fn is_covered_by_finer(coarse: IVec3, finer_corner: IVec3, grid_side: u32) -> bool {
    let lo = coarse * 2;
    let hi = lo + IVec3::splat(2);
    lo.cmpge(finer_corner).all() && hi.cmple(finer_corner + IVec3::splat(grid_side as i32)).all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords() -> ChunkCoords {
        ChunkCoords::new(0.5, 8, 0).unwrap()
    }

    #[test]
    fn test_sizes_double_per_level() {
        let c = coords();
        assert_eq!(c.block_size(0), 0.5);
        assert_eq!(c.block_size(3), 4.0);
        assert_eq!(c.chunk_world_size(1), 8.0);
        assert_eq!(
            c.chunk_world_origin(IVec3::new(-1, 2, 0), 1),
            DVec3::new(-8.0, 16.0, 0.0)
        );
    }

    #[test]
    fn test_world_to_chunk_floors_negative_positions() {
        let c = coords();
        assert_eq!(
            c.chunk_for_world_pos(DVec3::new(-0.01, 3.99, 4.0), 0),
            IVec3::new(-1, 0, 1)
        );
        let bounds = c.chunk_bounds(IVec3::new(-1, 0, 1), 0);
        assert!(bounds.contains(DVec3::new(-0.01, 3.99, 4.0)));
    }

    #[test]
    fn test_sampling_layout_includes_margin() {
        let c = coords();
        let layout = c.sampling_layout(IVec3::new(1, 0, 0), 0, SeamMargin { lead: 1, trail: 2 });
        assert_eq!(layout.corners_per_axis(), 8 + 1 + 1 + 2);
        assert_eq!(layout.origin, DVec3::new(3.5, -0.5, -0.5));
        assert_eq!(layout.chunk_origin(), DVec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_level_corner_is_even() {
        let c = coords();
        for x in -40..40 {
            let focus = DVec3::new(x as f64 * 1.7, -3.0, 11.0);
            for level in 0..3 {
                for side in [2, 4, 6] {
                    let corner = c.level_corner(focus, level, side);
                    assert_eq!(corner.rem_euclid(IVec3::splat(2)), IVec3::ZERO);
                    let center = c.chunk_for_world_pos(focus, level);
                    // The focus chunk always sits inside the window
                    assert!(center.cmpge(corner).all());
                    assert!(center.cmplt(corner + IVec3::splat(side as i32)).all());
                }
            }
        }
    }

    #[test]
    fn test_covered_by_finer() {
        let corner = IVec3::new(-4, -4, -4);
        assert!(is_covered_by_finer(IVec3::new(-2, -2, -2), corner, 8));
        assert!(is_covered_by_finer(IVec3::new(1, 1, 1), corner, 8));
        assert!(!is_covered_by_finer(IVec3::new(2, 0, 0), corner, 8));
        assert!(!is_covered_by_finer(IVec3::new(-3, 0, 0), corner, 8));
    }

    #[test]
    fn test_invalid_layout_is_rejected() {
        assert!(ChunkCoords::new(0.0, 8, 0).is_err());
        assert!(ChunkCoords::new(1.0, 1, 0).is_err());
        assert!(ChunkCoords::new(1.0, u32::MAX, 0).is_err());
        assert!(ChunkCoords::new(1.0, 4, 99).is_err());
    }

    #[test]
    fn test_parent_key() {
        let key = ChunkKey::new(IVec3::new(-1, 2, 3), 0);
        assert_eq!(key.parent(), ChunkKey::new(IVec3::new(-1, 1, 1), 1));
        assert_eq!(key.offset(1, 0, 0).coord, IVec3::new(0, 2, 3));
    }
}
