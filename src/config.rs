/// Terrain configuration
///
/// Loaded from TOML (or built in code), validated eagerly. Every field has a default
/// taken from `constants`, so a config file only needs the values it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::chunk::{ChunkCoords, SeamMargin};
use crate::constants::{extraction, field, layout, pools};
use crate::error::{config_error, TerrainResult};
use crate::field::CompileOptions;

/// Upper bounds on idle pooled objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_sample_blocks: usize,
    pub max_shape_builders: usize,
    pub max_mesh_buffers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_sample_blocks: pools::MAX_SAMPLE_BLOCKS,
            max_shape_builders: pools::MAX_SHAPE_BUILDERS,
            max_mesh_buffers: pools::MAX_MESH_BUFFERS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Number of detail levels, finest first
    pub detail_levels: u32,
    /// Block size exponent of the finest level (`base_cell_size * 2^finest_level`)
    pub finest_level: i32,
    pub base_cell_size: f64,
    /// Cells along one chunk side
    pub chunk_cells: u32,
    /// Chunks along one side of each level's panning grid; must be even
    pub grid_chunks: u32,
    /// Seam margin before the chunk's own cells; at least one
    pub seam_lead: u32,
    /// Seam margin after the chunk's own cells
    pub seam_trail: u32,
    /// Default `k` for smooth combinators that leave it unset
    pub smoothing_radius: f64,
    /// Gradient offset for normals, in cells
    pub normal_offset: f64,
    /// Levels at or above this one fill by corner interpolation
    pub interpolate_from_level: Option<u32>,
    pub max_jobs_per_frame: usize,
    /// Worker threads; defaults to one less than the core count
    pub worker_threads: Option<usize>,
    /// Emit wireframe chunk bounds through the sink
    pub debug_bounds: bool,
    pub pools: PoolConfig,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            detail_levels: layout::DETAIL_LEVELS,
            finest_level: layout::FINEST_LEVEL,
            base_cell_size: layout::BASE_CELL_SIZE,
            chunk_cells: layout::CHUNK_CELLS,
            grid_chunks: layout::GRID_CHUNKS,
            seam_lead: layout::SEAM_LEAD,
            seam_trail: layout::SEAM_TRAIL,
            smoothing_radius: field::SMOOTHING_RADIUS,
            normal_offset: extraction::NORMAL_OFFSET_CELLS,
            interpolate_from_level: None,
            max_jobs_per_frame: pools::MAX_JOBS_PER_FRAME,
            worker_threads: None,
            debug_bounds: false,
            pools: PoolConfig::default(),
        }
    }
}

impl TerrainConfig {
    pub fn from_toml_str(text: &str) -> TerrainResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> TerrainResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded terrain config from {}", path.display());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> TerrainResult<String> {
        toml::to_string_pretty(self).map_err(|e| config_error("config", e))
    }

    pub fn validate(&self) -> TerrainResult<()> {
        if self.detail_levels == 0 {
            return Err(config_error("detail_levels", "must be at least 1"));
        }
        let top = self.finest_level as i64 + self.detail_levels as i64 - 1;
        if self.finest_level < -layout::MAX_LEVEL_EXPONENT
            || top > layout::MAX_LEVEL_EXPONENT as i64
        {
            return Err(config_error(
                "detail_levels",
                format!(
                    "levels {}..={} exceed the supported exponent range ±{}",
                    self.finest_level,
                    top,
                    layout::MAX_LEVEL_EXPONENT
                ),
            ));
        }
        if self.grid_chunks < 2
            || self.grid_chunks % 2 != 0
            || self.grid_chunks > layout::MAX_GRID_CHUNKS
        {
            return Err(config_error(
                "grid_chunks",
                format!(
                    "must be even and in 2..={}, got {}",
                    layout::MAX_GRID_CHUNKS,
                    self.grid_chunks
                ),
            ));
        }
        if self.seam_lead < 1 || self.seam_lead > layout::MAX_SEAM_MARGIN {
            return Err(config_error(
                "seam_lead",
                format!(
                    "must be in 1..={} so faces on the chunk's lower faces can be built, got {}",
                    layout::MAX_SEAM_MARGIN,
                    self.seam_lead
                ),
            ));
        }
        if self.seam_trail > layout::MAX_SEAM_MARGIN {
            return Err(config_error(
                "seam_trail",
                format!(
                    "must be at most {}, got {}",
                    layout::MAX_SEAM_MARGIN,
                    self.seam_trail
                ),
            ));
        }
        if !(self.smoothing_radius.is_finite() && self.smoothing_radius >= 0.0) {
            return Err(config_error(
                "smoothing_radius",
                format!("must be non-negative, got {}", self.smoothing_radius),
            ));
        }
        if !(self.normal_offset.is_finite() && self.normal_offset > 0.0) {
            return Err(config_error(
                "normal_offset",
                format!("must be positive, got {}", self.normal_offset),
            ));
        }
        if self.max_jobs_per_frame == 0 {
            return Err(config_error("max_jobs_per_frame", "must be at least 1"));
        }
        if self.worker_threads == Some(0) {
            return Err(config_error("worker_threads", "must be at least 1 when set"));
        }
        // Cell size and chunk size checks live with the coordinate system
        self.coords()?;
        Ok(())
    }

    pub fn coords(&self) -> TerrainResult<ChunkCoords> {
        ChunkCoords::new(self.base_cell_size, self.chunk_cells, self.finest_level)
    }

    pub fn seam_margin(&self) -> SeamMargin {
        SeamMargin {
            lead: self.seam_lead,
            trail: self.seam_trail,
        }
    }

    /// Samples per axis of every block
    pub fn sample_extent(&self) -> usize {
        self.chunk_cells as usize + 1 + self.seam_lead as usize + self.seam_trail as usize
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            default_smoothing: self.smoothing_radius,
        }
    }

    /// Whether `level` fills its blocks by corner interpolation
    pub fn interpolates(&self, level: u32) -> bool {
        self.interpolate_from_level.is_some_and(|from| level >= from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TerrainError;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = TerrainConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sample_extent(), 18);
        assert!(!config.interpolates(3));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TerrainConfig::from_toml_str(
            r#"
            chunk_cells = 8
            interpolate_from_level = 2

            [pools]
            max_mesh_buffers = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.chunk_cells, 8);
        assert_eq!(config.grid_chunks, layout::GRID_CHUNKS);
        assert_eq!(config.pools.max_mesh_buffers, 10);
        assert_eq!(config.pools.max_sample_blocks, pools::MAX_SAMPLE_BLOCKS);
        assert!(config.interpolates(2));
        assert!(!config.interpolates(1));
    }

    #[test]
    fn test_invalid_values_name_the_field() {
        let cases = [
            ("grid_chunks = 5", "grid_chunks"),
            ("grid_chunks = 2048", "grid_chunks"),
            ("seam_lead = 0", "seam_lead"),
            ("seam_lead = 4000000000", "seam_lead"),
            ("seam_trail = 4000000000", "seam_trail"),
            ("chunk_cells = 1", "chunk_cells"),
            ("chunk_cells = 4294967295", "chunk_cells"),
            ("base_cell_size = -1.0", "base_cell_size"),
            ("detail_levels = 0", "detail_levels"),
            ("worker_threads = 0", "worker_threads"),
        ];
        for (text, field) in cases {
            match TerrainConfig::from_toml_str(text) {
                Err(TerrainError::InvalidConfig { field: f, .. }) => assert_eq!(f, field),
                other => panic!("{} should be rejected, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "detail_levels = 2\ndebug_bounds = true").unwrap();

        let config = TerrainConfig::load(file.path()).unwrap();
        assert_eq!(config.detail_levels, 2);
        assert!(config.debug_bounds);

        let text = config.to_toml_string().unwrap();
        assert_eq!(TerrainConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        assert!(matches!(
            TerrainConfig::from_toml_str("chunk_cells = \"many\""),
            Err(TerrainError::ConfigParse(_))
        ));
        assert!(matches!(
            TerrainConfig::load("/definitely/not/here.toml"),
            Err(TerrainError::Io(_))
        ));
    }
}
