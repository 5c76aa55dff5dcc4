/// Surface Extraction
///
/// Turns sample blocks into triangle meshes with naive surface nets.
///
/// Key features:
/// - Global cube tables computed at compile time
/// - One averaged vertex per active cell, one quad per crossed lattice edge
/// - Seam-consistent faces across neighbouring chunks
/// - Pooled scratch builders and fixed-capacity mesh buffers

pub mod buffer;
pub mod surface_nets;
pub mod tables;

pub use buffer::{MeshBuffer, MeshCapacity, MeshMetadata, Primitive};
pub use surface_nets::{ShapeBuilder, SurfaceExtractor};
