// Sampling and surface extraction throughput per chunk size
//
// Compares direct field evaluation with corner interpolation and measures the
// extractor on its own over pre-filled blocks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::IVec3;
use sdf_terrain::field::CompileOptions;
use sdf_terrain::{
    CancellationToken, ChunkCoords, DistanceField, FieldDef, SampleBlock, SeamMargin,
    ShapeBuilder, SurfaceExtractor,
};
use std::time::Duration;

const CHUNK_CELLS: &[u32] = &[8, 16, 32];

fn hills() -> DistanceField {
    FieldDef::rolling_hills(3, 6.0, 5.0)
        .compile(&CompileOptions::default())
        .expect("bench field compiles")
}

fn filled_block(field: &DistanceField, cells: u32) -> SampleBlock {
    let coords = ChunkCoords::new(1.0, cells, 0).expect("valid layout");
    let layout = coords.sampling_layout(IVec3::ZERO, 0, SeamMargin { lead: 1, trail: 0 });
    let mut block = SampleBlock::for_layout(layout);
    block
        .fill_direct(field, &CancellationToken::new())
        .expect("not cancelled");
    block
}

fn bench_fill(c: &mut Criterion) {
    let field = hills();
    let token = CancellationToken::new();
    let mut group = c.benchmark_group("sample_fill");
    group.measurement_time(Duration::from_secs(5));

    for &cells in CHUNK_CELLS {
        let coords = ChunkCoords::new(1.0, cells, 0).expect("valid layout");
        let layout = coords.sampling_layout(IVec3::ZERO, 0, SeamMargin { lead: 1, trail: 0 });
        let corners = SampleBlock::corner_values(&field, &layout);
        let mut block = SampleBlock::for_layout(layout);

        group.bench_with_input(BenchmarkId::new("direct", cells), &cells, |b, _| {
            b.iter(|| {
                block.fill_direct(black_box(&field), &token).ok();
                black_box(block.min())
            });
        });
        group.bench_with_input(BenchmarkId::new("interpolated", cells), &cells, |b, _| {
            b.iter(|| {
                block.fill_interpolated(black_box(&corners), &token).ok();
                black_box(block.min())
            });
        });
    }
    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let field = hills();
    let token = CancellationToken::new();
    let extractor = SurfaceExtractor::default();
    let mut group = c.benchmark_group("surface_nets");

    for &cells in CHUNK_CELLS {
        let block = filled_block(&field, cells);
        let mut builder = ShapeBuilder::new();

        group.bench_with_input(BenchmarkId::new("field_normals", cells), &cells, |b, _| {
            b.iter(|| {
                extractor
                    .extract(black_box(&block), Some(&field), &mut builder, &token)
                    .ok();
                black_box(builder.triangle_count())
            });
        });
        group.bench_with_input(BenchmarkId::new("sample_normals", cells), &cells, |b, _| {
            b.iter(|| {
                extractor
                    .extract(black_box(&block), None, &mut builder, &token)
                    .ok();
                black_box(builder.triangle_count())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fill, bench_extract);
criterion_main!(benches);
