//! End-to-end behaviour of the terrain layer: streaming, panning, field
//! replacement, debug output and reconfiguration against a recording sink.

use glam::DVec3;
use rustc_hash::FxHashMap;
use sdf_terrain::{
    Aabb, ChunkKey, ChunkOutput, FieldDef, MeshBuffer, MeshSink, Primitive, TerrainConfig,
    TerrainLayer,
};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Mirrors what a renderer would hold
#[derive(Default)]
struct RecordingSink {
    /// Shown chunks and the triangle count of their mesh, if any
    shown: FxHashMap<ChunkKey, Option<usize>>,
    heights: FxHashMap<ChunkKey, Vec<f32>>,
    removed: Vec<ChunkKey>,
    spurious_removals: usize,
    debug: Vec<(ChunkKey, Primitive, usize)>,
}

impl MeshSink for RecordingSink {
    fn chunk_ready(&mut self, output: ChunkOutput<'_>) {
        self.shown
            .insert(output.key, output.mesh.map(MeshBuffer::triangle_count));
        let heights = output
            .mesh
            .map(|mesh| mesh.positions().iter().map(|p| p[1]).collect())
            .unwrap_or_default();
        self.heights.insert(output.key, heights);
    }

    fn chunk_removed(&mut self, key: ChunkKey) {
        if self.shown.remove(&key).is_none() {
            self.spurious_removals += 1;
        }
        self.heights.remove(&key);
        self.removed.push(key);
    }

    fn chunk_debug(&mut self, key: ChunkKey, lines: &MeshBuffer) {
        self.debug.push((key, lines.primitive(), lines.index_count()));
    }
}

fn config() -> TerrainConfig {
    TerrainConfig {
        detail_levels: 2,
        chunk_cells: 4,
        grid_chunks: 4,
        base_cell_size: 1.0,
        worker_threads: Some(2),
        ..TerrainConfig::default()
    }
}

fn ground(height: f64) -> FieldDef {
    FieldDef::plane([0.0, 1.0, 0.0], -height)
}

/// Run frames until every visible chunk holds a result for the current field
fn settle(layer: &mut TerrainLayer, focus: DVec3, sink: &mut RecordingSink) {
    let deadline = Instant::now() + Duration::from_secs(20);
    loop {
        let stats = layer.update(focus, None, sink).unwrap();
        let settled = stats.in_flight == 0
            && layer
                .chunks()
                .filter(|c| !c.hollow)
                .all(|c| !c.dirty && !c.is_in_flight());
        if settled {
            return;
        }
        assert!(Instant::now() < deadline, "terrain did not settle: {:?}", stats);
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn visible_keys(layer: &TerrainLayer) -> BTreeSet<(u32, [i32; 3])> {
    layer
        .chunks()
        .filter(|c| !c.hollow)
        .map(|c| (c.key().level, c.key().coord.to_array()))
        .collect()
}

fn shown_keys(sink: &RecordingSink) -> BTreeSet<(u32, [i32; 3])> {
    sink.shown
        .keys()
        .map(|k| (k.level, k.coord.to_array()))
        .collect()
}

#[test]
fn test_streams_ground_around_focus() {
    let mut layer = TerrainLayer::new(config(), ground(1.5)).unwrap();
    let mut sink = RecordingSink::default();
    settle(&mut layer, DVec3::new(0.0, 1.5, 0.0), &mut sink);

    // 64 + 64 chunks, of which the 8 coarse ones under the fine window are hollow
    assert_eq!(layer.chunks().count(), 128);
    assert_eq!(sink.shown.len(), 120);
    assert_eq!(shown_keys(&sink), visible_keys(&layer));

    // One row of 4x4 chunks on the fine level, the coarse row minus its hollow middle
    let with_mesh: Vec<_> = sink.shown.iter().filter_map(|(k, t)| t.map(|t| (k, t))).collect();
    assert_eq!(with_mesh.len(), 16 + 12);
    for (key, triangles) in with_mesh {
        assert_eq!(key.coord.y, 0);
        assert_eq!(triangles, 4 * 4 * 2);
        for y in &sink.heights[key] {
            assert!((y - 1.5).abs() < 1e-4);
        }
    }
    assert_eq!(sink.spurious_removals, 0);
}

#[test]
fn test_coarse_levels_fill_by_interpolation() {
    let config = TerrainConfig {
        interpolate_from_level: Some(1),
        ..config()
    };
    let mut layer = TerrainLayer::new(config, ground(1.5)).unwrap();
    let mut sink = RecordingSink::default();
    settle(&mut layer, DVec3::new(0.0, 1.5, 0.0), &mut sink);

    assert_eq!(shown_keys(&sink), visible_keys(&layer));
    let coarse: Vec<_> = sink
        .shown
        .iter()
        .filter(|(k, t)| k.level == 1 && t.is_some())
        .collect();
    assert_eq!(coarse.len(), 12);
    for (key, triangles) in coarse {
        assert_eq!(*triangles, Some(4 * 4 * 2));
        assert!(sink.heights[key].iter().all(|y| (y - 1.5).abs() < 1e-4));
    }
    assert_eq!(layer.pipeline_stats().failed, 0);
}

#[test]
fn test_panning_removes_and_adds_chunks() {
    let mut layer = TerrainLayer::new(config(), ground(1.5)).unwrap();
    let mut sink = RecordingSink::default();
    settle(&mut layer, DVec3::new(0.0, 1.5, 0.0), &mut sink);
    let before = visible_keys(&layer);

    settle(&mut layer, DVec3::new(20.0, 1.5, 0.0), &mut sink);
    let after = visible_keys(&layer);

    assert_ne!(before, after);
    assert!(!sink.removed.is_empty());
    for key in &sink.removed {
        // Removed chunks left their window or were hollowed out by the finer level
        if let Some(chunk) = layer.chunk(*key) {
            assert!(chunk.hollow, "{} removed but still visible", key);
        }
    }
    assert_eq!(shown_keys(&sink), after);
    assert_eq!(sink.spurious_removals, 0);
    assert_eq!(layer.level_corner(0).unwrap().x, 4);
}

#[test]
fn test_field_replacement_rebuilds_every_chunk() {
    let mut layer = TerrainLayer::new(config(), ground(1.5)).unwrap();
    let mut sink = RecordingSink::default();
    let focus = DVec3::new(0.0, 1.5, 0.0);
    settle(&mut layer, focus, &mut sink);

    let version = layer.set_field(ground(5.5)).unwrap();
    assert_eq!(version, 2);
    settle(&mut layer, focus, &mut sink);

    assert!(layer
        .chunks()
        .filter(|c| !c.hollow)
        .all(|c| c.result_version == 2));
    let mut meshes = 0;
    for (key, heights) in &sink.heights {
        if heights.is_empty() {
            continue;
        }
        meshes += 1;
        assert_eq!(key.coord.y, if key.level == 0 { 1 } else { 0 });
        assert!(heights.iter().all(|y| (y - 5.5).abs() < 1e-4));
    }
    assert_eq!(meshes, 16 + 12);
    assert_eq!(shown_keys(&sink), visible_keys(&layer));
}

#[test]
fn test_debug_bounds_are_line_boxes() {
    let config = TerrainConfig {
        debug_bounds: true,
        ..config()
    };
    let mut layer = TerrainLayer::new(config, ground(1.5)).unwrap();
    let mut sink = RecordingSink::default();
    settle(&mut layer, DVec3::ZERO, &mut sink);

    assert!(sink.debug.len() >= sink.shown.len());
    for (key, primitive, indices) in &sink.debug {
        assert!(sink.shown.contains_key(key));
        assert_eq!(*primitive, Primitive::Lines);
        assert_eq!(*indices, 24);
    }
}

#[test]
fn test_visible_region_limits_scheduling() {
    let mut layer = TerrainLayer::new(config(), ground(1.5)).unwrap();
    let mut sink = RecordingSink::default();
    let visible = Aabb::new(DVec3::splat(1.0), DVec3::splat(2.0));

    let stats = layer
        .update(DVec3::new(0.0, 1.5, 0.0), Some(&visible), &mut sink)
        .unwrap();
    assert_eq!(stats.scheduled, 1);
    assert_eq!(stats.deferred, 120 - 1);
    assert!(sink.shown.is_empty());

    layer.wait_idle();
    let stats = layer
        .update(DVec3::new(0.0, 1.5, 0.0), Some(&visible), &mut sink)
        .unwrap();
    assert_eq!(stats.applied, 1);
    assert_eq!(sink.shown.len(), 1);
}

#[test]
fn test_reconfigure_disposes_and_rebuilds() {
    let mut layer = TerrainLayer::new(config(), ground(1.5)).unwrap();
    let mut sink = RecordingSink::default();
    let focus = DVec3::new(0.0, 1.5, 0.0);
    settle(&mut layer, focus, &mut sink);

    let smaller = TerrainConfig {
        grid_chunks: 2,
        ..config()
    };
    layer.reconfigure(smaller, &mut sink).unwrap();
    assert!(sink.shown.is_empty());
    assert_eq!(layer.chunks().count(), 0);
    assert_eq!(sink.spurious_removals, 0);

    settle(&mut layer, focus, &mut sink);
    assert_eq!(layer.chunks().count(), 16);
    assert_eq!(shown_keys(&sink), visible_keys(&layer));
    assert_eq!(layer.config().grid_chunks, 2);
}

#[test]
fn test_shutdown_clears_the_sink() {
    let mut layer = TerrainLayer::new(config(), ground(1.5)).unwrap();
    let mut sink = RecordingSink::default();
    settle(&mut layer, DVec3::ZERO, &mut sink);
    layer.shutdown(&mut sink);

    assert!(sink.shown.is_empty());
    assert_eq!(sink.spurious_removals, 0);
    assert_eq!(layer.in_flight(), 0);
}
