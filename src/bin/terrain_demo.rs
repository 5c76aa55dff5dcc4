// Streams rolling-hills terrain around a focus that walks along +X
//
// Usage: terrain_demo [config.toml]
use anyhow::{Context, Result};
use glam::DVec3;
use rustc_hash::FxHashMap;
use sdf_terrain::{
    ChunkKey, ChunkOutput, FieldDef, MeshBuffer, MeshSink, TerrainConfig, TerrainLayer,
};
use std::time::{Duration, Instant};

const FRAMES: u32 = 240;
const FRAME_TIME: Duration = Duration::from_millis(16);
const WALK_SPEED: f64 = 0.75;

/// Keeps triangle counts per chunk, standing in for a renderer
#[derive(Default)]
struct StatsSink {
    triangles: FxHashMap<ChunkKey, usize>,
    ready: usize,
    removed: usize,
    debug_lines: usize,
}

impl StatsSink {
    fn total_triangles(&self) -> usize {
        self.triangles.values().sum()
    }
}

impl MeshSink for StatsSink {
    fn chunk_ready(&mut self, output: ChunkOutput<'_>) {
        self.ready += 1;
        let triangles = output.mesh.map_or(0, MeshBuffer::triangle_count);
        self.triangles.insert(output.key, triangles);
    }

    fn chunk_removed(&mut self, key: ChunkKey) {
        self.removed += 1;
        self.triangles.remove(&key);
    }

    fn chunk_debug(&mut self, _key: ChunkKey, lines: &MeshBuffer) {
        self.debug_lines += lines.index_count() / 2;
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => TerrainConfig::load(&path)
            .with_context(|| format!("Failed to load terrain config from {}", path))?,
        None => TerrainConfig::default(),
    };
    println!("=== SDF Terrain Demo ===\n");
    println!("{}", config.to_toml_string()?);

    let hills = FieldDef::rolling_hills(7, 4.0, 6.0);
    let mut terrain = TerrainLayer::new(config, hills).context("Failed to create terrain")?;
    let mut sink = StatsSink::default();

    let start = Instant::now();
    let mut focus = DVec3::new(0.0, 4.0, 0.0);
    for frame in 0..FRAMES {
        let stats = terrain.update(focus, None, &mut sink)?;
        if frame % 30 == 0 {
            log::info!(
                "Frame {}: focus x={:.1}, scheduled {}, applied {}, culled {}, in flight {}",
                stats.frame,
                focus.x,
                stats.scheduled,
                stats.applied,
                stats.culled,
                stats.in_flight
            );
        }
        focus.x += WALK_SPEED;
        std::thread::sleep(FRAME_TIME);
    }

    // Let the last requests land
    loop {
        let stats = terrain.update(focus, None, &mut sink)?;
        if stats.in_flight == 0 && stats.scheduled == 0 && stats.applied == 0 && stats.deferred == 0 {
            break;
        }
        std::thread::sleep(FRAME_TIME);
    }

    // Swap to a smoother landscape and let it rebuild
    let version = terrain.set_field(FieldDef::rolling_hills(11, 2.0, 3.0))?;
    println!("Published field version {}", version);
    loop {
        let stats = terrain.update(focus, None, &mut sink)?;
        if stats.in_flight == 0 && stats.scheduled == 0 && stats.applied == 0 && stats.deferred == 0 {
            break;
        }
        std::thread::sleep(FRAME_TIME);
    }

    let pipeline = terrain.pipeline_stats();
    println!("\nFinished in {:.2?}", start.elapsed());
    println!("  chunks resident: {}", terrain.chunks().count());
    println!("  chunks shown:    {}", sink.triangles.len());
    println!("  triangles shown: {}", sink.total_triangles());
    println!("  ready / removed: {} / {}", sink.ready, sink.removed);
    println!(
        "  pipeline: scheduled {}, completed {}, cancelled {}, discarded {}, failed {}",
        pipeline.scheduled,
        pipeline.completed,
        pipeline.cancelled,
        pipeline.discarded,
        pipeline.failed
    );
    if sink.debug_lines > 0 {
        println!("  debug lines:     {}", sink.debug_lines);
    }

    terrain.shutdown(&mut sink);
    Ok(())
}
