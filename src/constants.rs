// Terrain constants - single source of default values.
//
// Config defaults, pool sizes and numeric guards all live here so the
// config layer and the algorithms agree on them.

/// Lattice and chunk layout defaults
pub mod layout {
    /// Number of detail levels (level 0 is the finest)
    pub const DETAIL_LEVELS: u32 = 4;

    /// Exponent of the finest level's block size
    pub const FINEST_LEVEL: i32 = 0;

    /// World size of one cell at level exponent 0
    pub const BASE_CELL_SIZE: f64 = 1.0;

    /// Cells along one chunk side
    pub const CHUNK_CELLS: u32 = 16;

    /// Smallest usable chunk side in cells
    pub const MIN_CHUNK_CELLS: u32 = 2;

    /// Largest chunk side in cells
    pub const MAX_CHUNK_CELLS: u32 = 256;

    /// Chunks along one panning grid side (must be even)
    pub const GRID_CHUNKS: u32 = 8;

    /// Largest panning grid side
    pub const MAX_GRID_CHUNKS: u32 = 64;

    /// Leading seam margin in cells
    pub const SEAM_LEAD: u32 = 1;

    /// Trailing seam margin in cells
    pub const SEAM_TRAIL: u32 = 0;

    /// Largest seam margin on either side
    pub const MAX_SEAM_MARGIN: u32 = 8;

    /// Highest level exponent accepted by the coordinate system
    pub const MAX_LEVEL_EXPONENT: i32 = 24;
}

/// Field evaluation defaults
pub mod field {
    /// Default smoothing radius for blended combinators without an explicit `k`
    pub const SMOOTHING_RADIUS: f64 = 2.0;

    /// Smoothing radii at or below this use the hard combinator
    pub const MIN_SMOOTHING: f64 = 1e-9;

    /// Default noise frequency for layered noise
    pub const NOISE_FREQUENCY: f64 = 0.01;

    /// Default octave count for layered noise
    pub const NOISE_OCTAVES: u32 = 4;

    /// Upper limit on octaves
    pub const MAX_OCTAVES: u32 = 16;

    /// Frequency multiplier between octaves
    pub const LACUNARITY: f64 = 2.0;

    /// Amplitude multiplier between octaves
    pub const PERSISTENCE: f64 = 0.5;
}

/// Surface extraction defaults
pub mod extraction {
    /// Gradient sample offset as a fraction of the cell size
    pub const NORMAL_OFFSET_CELLS: f64 = 0.5;

    /// Edge interpolation denominators below this snap to the edge midpoint
    pub const MIN_EDGE_DENOMINATOR: f64 = 1e-12;
}

/// Pool and scheduling defaults
pub mod pools {
    /// Maximum pooled sample blocks
    pub const MAX_SAMPLE_BLOCKS: usize = 32;

    /// Maximum pooled shape builders
    pub const MAX_SHAPE_BUILDERS: usize = 16;

    /// Maximum pooled mesh buffers
    pub const MAX_MESH_BUFFERS: usize = 256;

    /// Smallest mesh buffer bucket (vertices or indices)
    pub const MIN_MESH_BUCKET: usize = 64;

    /// Jobs submitted per frame
    pub const MAX_JOBS_PER_FRAME: usize = 32;
}
