use std::sync::Arc;

use glam::{DVec3, IVec3};

use super::sink::{ChunkOutput, MeshSink};
use crate::chunk::{is_covered_by_finer, Chunk, ChunkCoords, ChunkKey, ChunkPhase, CullState};
use crate::config::TerrainConfig;
use crate::error::TerrainResult;
use crate::field::{Aabb, DistanceField, FieldDef, FieldSnapshot, FieldSource};
use crate::grid::PanningGrid;
use crate::mesh::{MeshCapacity, SurfaceExtractor};
use crate::pipeline::{AsyncChunkPipeline, ChunkRequest, Completion, FillMode, PipelineStats, WorkOutcome};

/// What happened during one `update`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub field_version: u64,
    /// Results installed this frame
    pub applied: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub scheduled: usize,
    /// Chunks completed as empty from bounds alone
    pub culled: usize,
    pub created: usize,
    pub disposed: usize,
    /// Dirty chunks left for a later frame (budget or visibility)
    pub deferred: usize,
    pub in_flight: usize,
}

/// Multi-level terrain around a moving focus
pub struct TerrainLayer {
    config: TerrainConfig,
    coords: ChunkCoords,
    source: Arc<FieldSource>,
    definition: Option<FieldDef>,
    pipeline: AsyncChunkPipeline,
    extractor: SurfaceExtractor,
    levels: Vec<PanningGrid<Chunk>>,
    frame: u64,
}

impl TerrainLayer {
    pub fn new(config: TerrainConfig, definition: FieldDef) -> TerrainResult<Self> {
        config.validate()?;
        let source = FieldSource::from_def(&definition, &config.compile_options())?;
        let mut layer = Self::with_source(config, Arc::new(source))?;
        layer.definition = Some(definition);
        Ok(layer)
    }

    /// Share an existing field source, e.g. with other consumers of the same terrain
    pub fn with_source(config: TerrainConfig, source: Arc<FieldSource>) -> TerrainResult<Self> {
        config.validate()?;
        let coords = config.coords()?;
        let pipeline = AsyncChunkPipeline::new(config.worker_threads, &config.pools)?;
        log::info!(
            "Terrain layer: {} levels of {}^3 chunks, {} cells each, {} workers",
            config.detail_levels,
            config.grid_chunks,
            config.chunk_cells,
            pipeline.worker_threads()
        );

        Ok(Self {
            levels: build_levels(&config)?,
            extractor: SurfaceExtractor::new(config.normal_offset),
            coords,
            source,
            definition: None,
            pipeline,
            config,
            frame: 0,
        })
    }

    /// Advance one frame: apply finished work, pan to `focus`, schedule dirty chunks.
    ///
    /// Chunks whose bounds miss `visible` are not scheduled this frame. Never blocks.
    pub fn update(
        &mut self,
        focus: DVec3,
        visible: Option<&Aabb>,
        sink: &mut dyn MeshSink,
    ) -> TerrainResult<FrameStats> {
        self.frame += 1;
        let snapshot = self.source.snapshot();
        let mut stats = FrameStats {
            frame: self.frame,
            field_version: snapshot.version,
            ..Default::default()
        };

        self.apply_completions(snapshot.version, sink, &mut stats);
        let corners = self.pan(focus, sink, &mut stats);
        self.refresh(snapshot.version, &corners, sink, &mut stats)?;
        self.schedule(focus, visible, &snapshot, sink, &mut stats)?;

        stats.in_flight = self.pipeline.in_flight_count();
        log::trace!("Terrain frame {:?}", stats);
        Ok(stats)
    }

    /// Compile and publish a new field; chunks rebuild over the following frames
    pub fn set_field(&mut self, definition: FieldDef) -> TerrainResult<u64> {
        let field = definition.compile(&self.config.compile_options())?;
        self.definition = Some(definition);
        Ok(self.replace_field(field))
    }

    /// Publish an already compiled field
    pub fn replace_field(&mut self, field: DistanceField) -> u64 {
        let version = self.source.replace(field);
        log::info!("Terrain field replaced (version {})", version);
        version
    }

    /// Apply a new configuration. All work is cancelled and drained, every chunk is
    /// disposed through `sink`, and the levels are rebuilt empty.
    pub fn reconfigure(&mut self, config: TerrainConfig, sink: &mut dyn MeshSink) -> TerrainResult<()> {
        config.validate()?;
        let coords = config.coords()?;
        let levels = build_levels(&config)?;

        // Recompile first so a bad definition leaves the layer untouched
        let recompiled = match &self.definition {
            Some(def) if config.smoothing_radius != self.config.smoothing_radius => {
                Some(def.compile(&config.compile_options())?)
            }
            _ => None,
        };

        self.shutdown(sink);
        if config.worker_threads != self.config.worker_threads || config.pools != self.config.pools {
            self.pipeline = AsyncChunkPipeline::new(config.worker_threads, &config.pools)?;
        } else {
            self.pipeline.set_sample_extent(config.sample_extent());
        }
        if let Some(field) = recompiled {
            self.replace_field(field);
        }

        self.levels = levels;
        self.extractor = SurfaceExtractor::new(config.normal_offset);
        self.coords = coords;
        self.config = config;
        log::info!("Terrain layer reconfigured");
        Ok(())
    }

    /// Cancel and drain all work and dispose every chunk through `sink`
    pub fn shutdown(&mut self, sink: &mut dyn MeshSink) {
        self.pipeline.cancel_all();
        self.pipeline.wait_idle();

        let Self {
            levels, pipeline, ..
        } = self;
        let mut disposed = 0;
        for grid in levels.iter_mut() {
            disposed += grid.clear(|_, chunk| dispose_chunk(pipeline, sink, chunk));
        }
        // Drop the results of everything just cancelled
        pipeline.poll();
        log::debug!("Terrain layer disposed {} chunks", disposed);
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn coords(&self) -> &ChunkCoords {
        &self.coords
    }

    pub fn field_source(&self) -> &Arc<FieldSource> {
        &self.source
    }

    pub fn field_version(&self) -> u64 {
        self.source.version()
    }

    pub fn pipeline_stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    /// Units running on workers
    pub fn in_flight(&self) -> usize {
        self.pipeline.in_flight_count()
    }

    pub fn chunk(&self, key: ChunkKey) -> Option<&Chunk> {
        self.levels
            .get(key.level as usize)?
            .get(key.coord)
            .ok()
            .flatten()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.levels.iter().flat_map(|grid| grid.iter().map(|(_, chunk)| chunk))
    }

    /// Window corner of `level`, in chunk coordinates
    pub fn level_corner(&self, level: u32) -> Option<IVec3> {
        self.levels.get(level as usize).map(PanningGrid::corner)
    }

    /// Block until all scheduled work has finished; results arrive on the next `update`
    pub fn wait_idle(&self) {
        self.pipeline.wait_idle();
    }

    fn apply_completions(&mut self, version: u64, sink: &mut dyn MeshSink, stats: &mut FrameStats) {
        for completion in self.pipeline.poll() {
            let Completion {
                key,
                ticket,
                version: computed,
                outcome,
            } = completion;

            let chunk = self
                .levels
                .get_mut(key.level as usize)
                .and_then(|grid| grid.get_mut(key.coord).ok().flatten())
                .filter(|chunk| chunk.ticket == Some(ticket));
            let Some(chunk) = chunk else {
                if let WorkOutcome::Done(Some(mesh)) = outcome {
                    self.pipeline.release_mesh(mesh);
                }
                continue;
            };

            let mesh = match outcome {
                WorkOutcome::Done(mesh) => {
                    stats.applied += 1;
                    mesh
                }
                WorkOutcome::Cancelled => {
                    chunk.mark_cancelled();
                    stats.cancelled += 1;
                    continue;
                }
                WorkOutcome::Failed(_) => {
                    // Shown as empty until the field changes
                    stats.failed += 1;
                    None
                }
            };

            if let Some(old) = chunk.complete(mesh, computed) {
                self.pipeline.release_mesh(old);
            }
            if computed != version {
                chunk.dirty = true;
            }
            if !chunk.hollow {
                deliver(&self.coords, self.config.debug_bounds, &self.pipeline, sink, chunk);
            }
        }
    }

    fn pan(&mut self, focus: DVec3, sink: &mut dyn MeshSink, stats: &mut FrameStats) -> Vec<IVec3> {
        let Self {
            levels,
            pipeline,
            coords,
            config,
            ..
        } = self;

        let mut corners = Vec::with_capacity(levels.len());
        for (level, grid) in levels.iter_mut().enumerate() {
            let corner = coords.level_corner(focus, level as u32, config.grid_chunks);
            let disposed = grid.set_focus(corner, |_, chunk| dispose_chunk(pipeline, sink, chunk));
            if disposed > 0 {
                log::debug!("Level {} panned to {:?}, disposed {} chunks", level, corner, disposed);
            }
            stats.disposed += disposed;
            corners.push(corner);
        }
        corners
    }

    /// Create chunks that scrolled in, re-dirty stale results and apply the hollow rule
    fn refresh(
        &mut self,
        version: u64,
        corners: &[IVec3],
        sink: &mut dyn MeshSink,
        stats: &mut FrameStats,
    ) -> TerrainResult<()> {
        let Self {
            levels,
            pipeline,
            coords,
            config,
            ..
        } = self;

        for (level, grid) in levels.iter_mut().enumerate() {
            let finer_corner = level.checked_sub(1).map(|finer| corners[finer]);
            let positions: Vec<IVec3> = grid.positions().collect();

            for pos in positions {
                let chunk = grid.get_or_compute(pos, |p| {
                    stats.created += 1;
                    Chunk::new(ChunkKey::new(p, level as u32))
                })?;

                if chunk.result_version != version {
                    chunk.dirty = true;
                }

                let hollow = finer_corner
                    .is_some_and(|corner| is_covered_by_finer(pos, corner, config.grid_chunks));
                if hollow == chunk.hollow {
                    continue;
                }
                chunk.hollow = hollow;
                if hollow {
                    if chunk.delivered {
                        sink.chunk_removed(chunk.key());
                        chunk.delivered = false;
                    }
                } else if chunk.result_version != 0 {
                    deliver(coords, config.debug_bounds, pipeline, sink, chunk);
                }
            }
        }
        Ok(())
    }

    fn schedule(
        &mut self,
        focus: DVec3,
        visible: Option<&Aabb>,
        snapshot: &FieldSnapshot,
        sink: &mut dyn MeshSink,
        stats: &mut FrameStats,
    ) -> TerrainResult<()> {
        let Self {
            levels,
            pipeline,
            coords,
            config,
            extractor,
            ..
        } = self;
        let version = snapshot.version;
        let margin = config.seam_margin();

        let mut candidates: Vec<(f64, usize, IVec3)> = Vec::new();
        for (level, grid) in levels.iter_mut().enumerate() {
            let level_u = level as u32;
            for (pos, chunk) in grid.iter_mut() {
                if chunk.is_in_flight() {
                    chunk.phase = pipeline.phase(chunk.key());
                    continue;
                }
                if !chunk.dirty || chunk.hollow {
                    continue;
                }

                let bounds = coords.chunk_bounds(pos, level_u);
                if visible.is_some_and(|v| !v.intersects(&bounds)) {
                    stats.deferred += 1;
                    continue;
                }

                let may_contain_surface = match chunk.cull_for(version) {
                    Some(cached) => cached,
                    None => {
                        let sampled = coords.sampling_layout(pos, level_u, margin).bounds();
                        let may = snapshot.field.may_contain_surface(&sampled);
                        chunk.cull = Some(CullState {
                            version,
                            may_contain_surface: may,
                        });
                        may
                    }
                };
                if !may_contain_surface {
                    if let Some(old) = chunk.complete(None, version) {
                        pipeline.release_mesh(old);
                    }
                    stats.culled += 1;
                    deliver(coords, config.debug_bounds, pipeline, sink, chunk);
                    continue;
                }

                candidates.push(((bounds.center() - focus).length_squared(), level, pos));
            }
        }

        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
        let budget = config.max_jobs_per_frame;
        stats.deferred += candidates.len().saturating_sub(budget);

        for (_, level, pos) in candidates.into_iter().take(budget) {
            let level_u = level as u32;
            let Some(chunk) = levels[level].get_mut(pos)? else {
                continue;
            };
            let fill = if config.interpolates(level_u) {
                FillMode::Interpolated
            } else {
                FillMode::Direct
            };
            let ticket = pipeline.schedule(ChunkRequest {
                key: chunk.key(),
                layout: coords.sampling_layout(pos, level_u, margin),
                field: snapshot.clone(),
                fill,
                extractor: *extractor,
            });
            chunk.ticket = Some(ticket);
            chunk.phase = ChunkPhase::Scheduled;
            stats.scheduled += 1;
        }
        Ok(())
    }
}

impl std::fmt::Debug for TerrainLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerrainLayer")
            .field("frame", &self.frame)
            .field("levels", &self.levels.len())
            .field("field_version", &self.source.version())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

fn build_levels(config: &TerrainConfig) -> TerrainResult<Vec<PanningGrid<Chunk>>> {
    (0..config.detail_levels)
        .map(|_| PanningGrid::new(config.grid_chunks, IVec3::ZERO))
        .collect()
}

/// Hand a chunk's current result to the sink
fn deliver(
    coords: &ChunkCoords,
    debug_bounds: bool,
    pipeline: &AsyncChunkPipeline,
    sink: &mut dyn MeshSink,
    chunk: &mut Chunk,
) {
    let key = chunk.key();
    let bounds = coords.chunk_bounds(key.coord, key.level);
    sink.chunk_ready(ChunkOutput {
        key,
        mesh: chunk.mesh(),
        bounds,
    });
    chunk.delivered = true;

    if debug_bounds {
        let mut lines = pipeline.obtain_mesh(MeshCapacity::for_counts(8, 24));
        match lines.write_box_lines(&bounds) {
            Ok(()) => sink.chunk_debug(key, &lines),
            Err(err) => log::warn!("Debug bounds for {} failed: {}", key, err),
        }
        pipeline.release_mesh(lines);
    }
}

/// Cancel a chunk's work, recycle its mesh and tell the sink it is gone
fn dispose_chunk(pipeline: &mut AsyncChunkPipeline, sink: &mut dyn MeshSink, mut chunk: Chunk) {
    if chunk.is_in_flight() {
        pipeline.cancel(chunk.key());
    }
    if let Some(mesh) = chunk.take_mesh() {
        pipeline.release_mesh(mesh);
    }
    if chunk.delivered {
        sink.chunk_removed(chunk.key());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TerrainError;
    use crate::terrain::NullSink;

    fn small_config() -> TerrainConfig {
        TerrainConfig {
            detail_levels: 2,
            chunk_cells: 4,
            grid_chunks: 4,
            worker_threads: Some(2),
            ..TerrainConfig::default()
        }
    }

    #[test]
    fn test_first_update_creates_every_level() {
        let mut layer = TerrainLayer::new(small_config(), FieldDef::constant(1.0)).unwrap();
        let stats = layer.update(DVec3::ZERO, None, &mut NullSink).unwrap();

        assert_eq!(stats.created, 2 * 64);
        // A constant field is culled everywhere without any sampling
        assert_eq!(stats.scheduled, 0);
        assert_eq!(stats.culled, 64 + 64 - 8);
        assert_eq!(layer.chunks().count(), 128);
    }

    #[test]
    fn test_coarse_centre_is_hollow() {
        let mut layer = TerrainLayer::new(small_config(), FieldDef::constant(1.0)).unwrap();
        layer.update(DVec3::new(0.5, 0.5, 0.5), None, &mut NullSink).unwrap();

        let finer = layer.level_corner(0).unwrap();
        let hollow: Vec<_> = layer.chunks().filter(|c| c.hollow).collect();
        assert_eq!(hollow.len(), 8);
        for chunk in hollow {
            assert_eq!(chunk.key().level, 1);
            assert!(is_covered_by_finer(chunk.key().coord, finer, 4));
        }
    }

    #[test]
    fn test_set_field_bumps_version_and_redirties() {
        let mut layer = TerrainLayer::new(small_config(), FieldDef::constant(1.0)).unwrap();
        layer.update(DVec3::ZERO, None, &mut NullSink).unwrap();
        assert!(layer.chunks().all(|c| c.hollow || !c.dirty));

        let version = layer.set_field(FieldDef::constant(-1.0)).unwrap();
        assert_eq!(version, 2);
        let stats = layer.update(DVec3::ZERO, None, &mut NullSink).unwrap();
        assert_eq!(stats.field_version, 2);
        assert_eq!(stats.culled, 120);
        assert!(layer.chunks().filter(|c| !c.hollow).all(|c| c.result_version == 2));
    }

    #[test]
    fn test_oversized_grid_is_a_config_error() {
        let config = TerrainConfig {
            grid_chunks: 2048,
            detail_levels: 1,
            ..small_config()
        };
        match TerrainLayer::new(config, FieldDef::constant(1.0)) {
            Err(TerrainError::InvalidConfig { field, .. }) => assert_eq!(field, "grid_chunks"),
            other => panic!("oversized grid accepted: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_invalid_reconfigure_leaves_layer_untouched() {
        let mut layer = TerrainLayer::new(small_config(), FieldDef::constant(1.0)).unwrap();
        layer.update(DVec3::ZERO, None, &mut NullSink).unwrap();

        let bad = TerrainConfig {
            grid_chunks: 3,
            ..small_config()
        };
        assert!(layer.reconfigure(bad, &mut NullSink).is_err());
        assert_eq!(layer.chunks().count(), 128);
        assert_eq!(layer.config().grid_chunks, 4);
    }
}
