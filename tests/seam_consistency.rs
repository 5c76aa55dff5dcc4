//! Neighbouring chunks must stitch into exactly the surface a single large block
//! would produce: no gaps, no duplicated faces along shared chunk faces.

use glam::{DVec3, IVec3};
use sdf_terrain::field::DistanceField;
use sdf_terrain::{
    CancellationToken, ChunkCoords, FieldDef, SampleBlock, SampleLayout, SeamMargin,
    ShapeBuilder, SurfaceExtractor,
};

type Triangle = [[f32; 3]; 3];

const TOLERANCE: f32 = 1e-4;

fn extract(field: &DistanceField, layout: SampleLayout) -> Vec<Triangle> {
    let token = CancellationToken::new();
    let mut block = SampleBlock::for_layout(layout);
    block.fill_direct(field, &token).unwrap();

    let mut builder = ShapeBuilder::new();
    SurfaceExtractor::default()
        .extract(&block, Some(field), &mut builder, &token)
        .unwrap();

    let positions = builder.positions();
    builder
        .indices()
        .chunks_exact(3)
        .map(|t| [positions[t[0] as usize], positions[t[1] as usize], positions[t[2] as usize]])
        .collect()
}

/// Same corners in the same cyclic order, so winding must agree too
fn same_triangle(a: &Triangle, b: &Triangle) -> bool {
    let close = |p: &[f32; 3], q: &[f32; 3]| p.iter().zip(q).all(|(x, y)| (x - y).abs() < TOLERANCE);
    (0..3).any(|shift| (0..3).all(|i| close(&a[i], &b[(i + shift) % 3])))
}

/// Extract the 2x2x2 chunks at the origin one by one and as one block of twice the size
fn compare_with_combined(field: &DistanceField, margin: SeamMargin) {
    let cells = 8;
    let coords = ChunkCoords::new(1.0, cells, 0).unwrap();

    let mut pieces = Vec::new();
    for z in 0..2 {
        for y in 0..2 {
            for x in 0..2 {
                let layout = coords.sampling_layout(IVec3::new(x, y, z), 0, margin);
                pieces.extend(extract(field, layout));
            }
        }
    }

    let combined = extract(
        field,
        SampleLayout {
            origin: DVec3::splat(-1.0),
            spacing: 1.0,
            cells: 2 * cells,
            lead: 1,
            trail: 0,
        },
    );

    assert!(!combined.is_empty());
    assert_eq!(pieces.len(), combined.len());

    let mut unmatched = combined.clone();
    for triangle in &pieces {
        let found = unmatched.iter().position(|other| same_triangle(triangle, other));
        match found {
            Some(i) => {
                unmatched.swap_remove(i);
            }
            None => panic!("chunk triangle {:?} missing from the combined surface", triangle),
        }
    }
    assert!(unmatched.is_empty());
}

fn blob() -> DistanceField {
    FieldDef::smooth_union(
        FieldDef::sphere([8.2, 7.9, 8.1], 5.3),
        FieldDef::sphere([4.0, 11.0, 9.0], 2.6),
        Some(1.5),
    )
    .compile(&Default::default())
    .unwrap()
}

#[test]
fn test_chunks_stitch_into_the_combined_surface() {
    compare_with_combined(&blob(), SeamMargin { lead: 1, trail: 0 });
}

#[test]
fn test_wider_margins_add_no_faces() {
    compare_with_combined(&blob(), SeamMargin { lead: 2, trail: 2 });
}

#[test]
fn test_tilted_plane_across_chunk_faces() {
    let field = DistanceField::Plane {
        normal: DVec3::new(0.3, 1.0, 0.2).normalize(),
        offset: -7.7,
    };
    compare_with_combined(&field, SeamMargin { lead: 1, trail: 0 });
}
