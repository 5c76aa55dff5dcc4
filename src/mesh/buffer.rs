use bytemuck::{Pod, Zeroable};

use crate::constants::pools::MIN_MESH_BUCKET;
use crate::error::{capacity_error, TerrainResult};
use crate::field::Aabb;
use crate::pool::Poolable;

/// How indices are assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    /// Debug wireframes
    Lines,
}

/// Capacity bucket of a mesh buffer; both counts are powers of two
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshCapacity {
    pub vertices: usize,
    pub indices: usize,
}

impl MeshCapacity {
    /// Smallest bucket holding the given counts
    pub fn for_counts(vertices: usize, indices: usize) -> Self {
        Self {
            vertices: vertices.max(MIN_MESH_BUCKET).next_power_of_two(),
            indices: indices.max(MIN_MESH_BUCKET).next_power_of_two(),
        }
    }
}

/// GPU-facing vertex header written next to the data
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshMetadata {
    pub vertex_count: u32,
    pub index_count: u32,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
}

/// Fixed-capacity geometry buffer
///
/// Positions and normals are parallel arrays; indices reference slots below
/// `vertex_count`. Triangles wind counter-clockwise seen from outside.
#[derive(Debug)]
pub struct MeshBuffer {
    capacity: MeshCapacity,
    primitive: Primitive,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    indices: Vec<u32>,
}

impl MeshBuffer {
    pub fn new(capacity: MeshCapacity) -> Self {
        Self {
            capacity,
            primitive: Primitive::Triangles,
            positions: Vec::with_capacity(capacity.vertices),
            normals: Vec::with_capacity(capacity.vertices),
            indices: Vec::with_capacity(capacity.indices),
        }
    }

    pub fn capacity(&self) -> MeshCapacity {
        self.capacity
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn set_primitive(&mut self, primitive: Primitive) {
        self.primitive = primitive;
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        match self.primitive {
            Primitive::Triangles => self.indices.len() / 3,
            Primitive::Lines => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Append a vertex, returning its index
    pub fn push_vertex(&mut self, position: [f32; 3], normal: [f32; 3]) -> TerrainResult<u32> {
        if self.positions.len() >= self.capacity.vertices {
            return Err(capacity_error(
                "mesh buffer vertices",
                self.positions.len() + 1,
                self.capacity.vertices,
            ));
        }
        self.positions.push(position);
        self.normals.push(normal);
        Ok(self.positions.len() as u32 - 1)
    }

    /// Append indices; every index must reference an existing vertex
    pub fn push_indices(&mut self, indices: &[u32]) -> TerrainResult<()> {
        let requested = self.indices.len() + indices.len();
        if requested > self.capacity.indices {
            return Err(capacity_error(
                "mesh buffer indices",
                requested,
                self.capacity.indices,
            ));
        }
        let vertices = self.positions.len();
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices) {
            return Err(capacity_error("mesh buffer vertex index", *bad as usize + 1, vertices));
        }
        self.indices.extend_from_slice(indices);
        Ok(())
    }

    /// Replace the contents with the twelve edges of `bounds`
    pub fn write_box_lines(&mut self, bounds: &Aabb) -> TerrainResult<()> {
        self.clear();
        self.primitive = Primitive::Lines;
        for corner in 0..8 {
            self.push_vertex(bounds.corner(corner).as_vec3().to_array(), [0.0; 3])?;
        }
        for axis in 0..3 {
            let bit = 1 << axis;
            for corner in 0..8u32 {
                if corner & bit == 0 {
                    self.push_indices(&[corner, corner | bit])?;
                }
            }
        }
        Ok(())
    }

    /// Axis-aligned bounds of the vertices, if any
    pub fn bounds(&self) -> Option<Aabb> {
        let first = glam::Vec3::from_array(*self.positions.first()?);
        let (min, max) = self
            .positions
            .iter()
            .map(|p| glam::Vec3::from_array(*p))
            .fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Aabb::new(min.as_dvec3(), max.as_dvec3()))
    }

    pub fn metadata(&self) -> MeshMetadata {
        let (bounds_min, bounds_max) = match self.bounds() {
            Some(b) => (b.min.as_vec3().to_array(), b.max.as_vec3().to_array()),
            None => ([0.0; 3], [0.0; 3]),
        };
        MeshMetadata {
            vertex_count: self.positions.len() as u32,
            index_count: self.indices.len() as u32,
            bounds_min,
            bounds_max,
        }
    }

    /// Raw bytes for upload
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.indices.clear();
    }
}

impl Poolable for MeshBuffer {
    type Key = MeshCapacity;

    fn pool_key(&self) -> MeshCapacity {
        self.capacity
    }

    fn reset(&mut self) {
        self.clear();
        self.primitive = Primitive::Triangles;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_capacity_buckets_round_up() {
        assert_eq!(
            MeshCapacity::for_counts(0, 10),
            MeshCapacity {
                vertices: 64,
                indices: 64
            }
        );
        assert_eq!(MeshCapacity::for_counts(65, 1000).vertices, 128);
        assert_eq!(MeshCapacity::for_counts(65, 1000).indices, 1024);
        assert_eq!(MeshCapacity::for_counts(128, 0).vertices, 128);
    }

    #[test]
    fn test_writes_beyond_capacity_fail() {
        let mut mesh = MeshBuffer::new(MeshCapacity::for_counts(64, 64));
        for _ in 0..64 {
            mesh.push_vertex([0.0; 3], [0.0, 1.0, 0.0]).unwrap();
        }
        assert!(mesh.push_vertex([0.0; 3], [0.0; 3]).is_err());
        assert!(mesh.push_indices(&[0; 65]).is_err());
        assert!(mesh.push_indices(&[64]).is_err());
        assert!(mesh.push_indices(&[0, 1, 2]).is_ok());
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn test_box_lines() {
        let mut mesh = MeshBuffer::new(MeshCapacity::for_counts(8, 24));
        let bounds = Aabb::new(DVec3::ZERO, DVec3::new(1.0, 2.0, 3.0));
        mesh.write_box_lines(&bounds).unwrap();

        assert_eq!(mesh.primitive(), Primitive::Lines);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.index_count(), 24);
        assert_eq!(mesh.triangle_count(), 0);
        assert_eq!(mesh.bounds(), Some(bounds));
        assert_eq!(mesh.index_bytes().len(), 24 * 4);

        mesh.reset();
        assert!(mesh.is_empty());
        assert_eq!(mesh.primitive(), Primitive::Triangles);
    }
}
