use glam::{DVec3, Vec3};

use super::buffer::{MeshBuffer, MeshCapacity};
use super::tables::{CUBE_CORNERS, CUBE_EDGES, EDGE_TABLE};
use crate::constants::extraction::{MIN_EDGE_DENOMINATOR, NORMAL_OFFSET_CELLS};
use crate::error::TerrainResult;
use crate::field::DistanceField;
use crate::pipeline::cancel::{CancellationToken, Cancelled};
use crate::pool::{ObjectPool, Poolable};
use crate::sample::SampleBlock;

const NO_VERTEX: u32 = u32::MAX;

/// Reusable scratch space for one extraction
#[derive(Debug, Default)]
pub struct ShapeBuilder {
    /// Vertex index per cell, `NO_VERTEX` for inactive cells
    cell_vertex: Vec<u32>,
    cell_positions: Vec<DVec3>,
    cell_normals: Vec<Vec3>,
    faces: Vec<u32>,
    remap: Vec<u32>,

    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    indices: Vec<u32>,
}

impl ShapeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// World positions of the kept vertices
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    /// Counter-clockwise triangle list
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Copy the extracted geometry into a pooled buffer of the right bucket
    pub fn materialize(&self, pool: &ObjectPool<MeshBuffer>) -> TerrainResult<MeshBuffer> {
        let capacity = MeshCapacity::for_counts(self.positions.len(), self.indices.len());
        let mut mesh = pool.obtain(capacity, MeshBuffer::new);
        match self.write_into(&mut mesh) {
            Ok(()) => Ok(mesh),
            Err(err) => {
                pool.release(mesh);
                Err(err)
            }
        }
    }

    fn write_into(&self, mesh: &mut MeshBuffer) -> TerrainResult<()> {
        for (position, normal) in self.positions.iter().zip(&self.normals) {
            mesh.push_vertex(*position, *normal)?;
        }
        mesh.push_indices(&self.indices)
    }

    fn clear(&mut self) {
        self.cell_vertex.clear();
        self.cell_positions.clear();
        self.cell_normals.clear();
        self.faces.clear();
        self.remap.clear();
        self.positions.clear();
        self.normals.clear();
        self.indices.clear();
    }
}

impl Poolable for ShapeBuilder {
    type Key = ();

    fn pool_key(&self) {}

    fn reset(&mut self) {
        self.clear();
    }
}

/// Naive surface nets over a `SampleBlock`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceExtractor {
    /// Gradient offset for field normals, in cells
    pub normal_offset: f64,
}

impl Default for SurfaceExtractor {
    fn default() -> Self {
        Self {
            normal_offset: NORMAL_OFFSET_CELLS,
        }
    }
}

impl SurfaceExtractor {
    pub fn new(normal_offset: f64) -> Self {
        Self { normal_offset }
    }

    /// Extract the zero isosurface of `block` into `builder`.
    ///
    /// Faces are emitted only when their maximum cell lies in the chunk's own cell
    /// range, so neighbouring chunks produce complementary face sets. Normals come
    /// from `field` when given, otherwise from the trilinear gradient of the samples.
    pub fn extract(
        &self,
        block: &SampleBlock,
        field: Option<&DistanceField>,
        builder: &mut ShapeBuilder,
        token: &CancellationToken,
    ) -> Result<(), Cancelled> {
        builder.clear();
        let Some(layout) = block.layout().copied() else {
            return Ok(());
        };
        if !block.has_surface() {
            return Ok(());
        }

        let n = block.extent();
        let cells = n - 1;
        builder.cell_vertex.resize(cells * cells * cells, NO_VERTEX);
        let cell_index = |x: usize, y: usize, z: usize| x + cells * (y + cells * z);
        let normal_offset = self.normal_offset * layout.spacing;

        // Pass 1: one vertex per active cell
        for z in 0..cells {
            token.check()?;
            for y in 0..cells {
                for x in 0..cells {
                    let mut corners = [0.0f32; 8];
                    let mut mask = 0usize;
                    for (i, [dx, dy, dz]) in CUBE_CORNERS.iter().enumerate() {
                        let v = block.get(x + dx, y + dy, z + dz);
                        corners[i] = v;
                        if v > 0.0 {
                            mask |= 1 << i;
                        }
                    }
                    let edges = EDGE_TABLE[mask];
                    if edges == 0 {
                        continue;
                    }

                    let local = cell_centroid(&corners, edges);
                    let cell = DVec3::new(x as f64, y as f64, z as f64);
                    let world = layout.origin + (cell + local.as_dvec3()) * layout.spacing;
                    let normal = match field {
                        Some(field) => field.normal(world, normal_offset).as_vec3(),
                        None => sample_gradient(&corners, local).normalize_or_zero(),
                    };

                    builder.cell_vertex[cell_index(x, y, z)] = builder.cell_positions.len() as u32;
                    builder.cell_positions.push(world);
                    builder.cell_normals.push(normal);
                }
            }
        }

        // Pass 2: a quad for every crossed edge leaving a cell's minimum corner
        for z in 0..cells {
            token.check()?;
            if !layout.owns_cell(z) {
                continue;
            }
            for y in 0..cells {
                if !layout.owns_cell(y) {
                    continue;
                }
                for x in 0..cells {
                    if !layout.owns_cell(x) {
                        continue;
                    }
                    let c = [x, y, z];
                    let inside = block.get(x, y, z) <= 0.0;
                    for axis in 0..3 {
                        let mut far = c;
                        far[axis] += 1;
                        let outside_far = block.get(far[0], far[1], far[2]) > 0.0;
                        if inside != outside_far {
                            continue;
                        }

                        let u = (axis + 1) % 3;
                        let v = (axis + 2) % 3;
                        if c[u] == 0 || c[v] == 0 {
                            continue;
                        }
                        let mut cu = c;
                        cu[u] -= 1;
                        let mut cv = c;
                        cv[v] -= 1;
                        let mut cuv = cu;
                        cuv[v] -= 1;

                        let quad = [c, cu, cuv, cv]
                            .map(|[qx, qy, qz]| builder.cell_vertex[cell_index(qx, qy, qz)]);
                        if quad.contains(&NO_VERTEX) {
                            continue;
                        }
                        let [v0, v1, v2, v3] = quad;
                        if inside {
                            builder.faces.extend_from_slice(&[v0, v1, v2, v0, v2, v3]);
                        } else {
                            builder.faces.extend_from_slice(&[v0, v2, v1, v0, v3, v2]);
                        }
                    }
                }
            }
        }

        compact(builder);
        Ok(())
    }
}

/// Keep only the vertices referenced by faces, converting to output precision
fn compact(builder: &mut ShapeBuilder) {
    let ShapeBuilder {
        cell_positions,
        cell_normals,
        faces,
        remap,
        positions,
        normals,
        indices,
        ..
    } = builder;

    remap.resize(cell_positions.len(), NO_VERTEX);
    for &vertex in faces.iter() {
        let slot = &mut remap[vertex as usize];
        if *slot == NO_VERTEX {
            *slot = positions.len() as u32;
            positions.push(cell_positions[vertex as usize].as_vec3().to_array());
            normals.push(cell_normals[vertex as usize].to_array());
        }
        indices.push(*slot);
    }
}

/// Average of the edge crossings, in cell-local coordinates
fn cell_centroid(corners: &[f32; 8], edges: u16) -> Vec3 {
    let mut sum = Vec3::ZERO;
    let mut count = 0;
    for (e, [a, b]) in CUBE_EDGES.iter().enumerate() {
        if edges & (1 << e) == 0 {
            continue;
        }
        let g0 = corners[*a] as f64;
        let g1 = corners[*b] as f64;
        let den = g0 - g1;
        let t = if den.abs() < MIN_EDGE_DENOMINATOR {
            0.5
        } else {
            (g0 / den).clamp(0.0, 1.0)
        };
        let t = t as f32;
        let pa = corner_offset(*a);
        let pb = corner_offset(*b);
        sum += pa + (pb - pa) * t;
        count += 1;
    }
    sum / count as f32
}

fn corner_offset(corner: usize) -> Vec3 {
    let [x, y, z] = CUBE_CORNERS[corner];
    Vec3::new(x as f32, y as f32, z as f32)
}

/// Gradient of the trilinear interpolant of the cell corners at `p`
fn sample_gradient(c: &[f32; 8], p: Vec3) -> Vec3 {
    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

    let dx = lerp(
        lerp(c[1] - c[0], c[3] - c[2], p.y),
        lerp(c[5] - c[4], c[7] - c[6], p.y),
        p.z,
    );
    let dy = lerp(
        lerp(c[2] - c[0], c[3] - c[1], p.x),
        lerp(c[6] - c[4], c[7] - c[5], p.x),
        p.z,
    );
    let dz = lerp(
        lerp(c[4] - c[0], c[5] - c[1], p.x),
        lerp(c[6] - c[2], c[7] - c[3], p.x),
        p.y,
    );
    Vec3::new(dx, dy, dz)
}
