/// Signed Distance Field Algebra
///
/// Terrain shape is a tree of scalar functions `f(p) -> distance`, negative inside
/// solid and positive in open space.
///
/// Key features:
/// - Primitives: constant, sphere, plane, layered noise, noise modulated by a field
/// - Combinators: add, scale, union, intersection, difference and their smoothed forms
/// - Domain warp through three-channel noise
/// - Conservative value bounds over boxes for culling
/// - Serializable definitions (JSON and bincode) compiled into an evaluable tree
/// - Versioned copy-on-write replacement of the active field

pub mod bounds;
pub mod combinator;
pub mod def;
pub mod distance_field;
pub mod error;
pub mod noise;

pub use bounds::{Aabb, Bounds, BoundsRule, Extreme};
pub use combinator::{smooth_difference, smooth_intersection, smooth_union, Combinator};
pub use def::{CompileOptions, FieldDef};
pub use distance_field::DistanceField;
pub use error::{FieldErrorContext, FieldResult};
pub use noise::{LayeredNoise, WarpNoise};

use std::sync::Arc;

use parking_lot::RwLock;

/// A compiled field together with the version it was published under
#[derive(Debug, Clone)]
pub struct FieldSnapshot {
    pub field: Arc<DistanceField>,
    pub version: u64,
}

/// Holder of the active field.
///
/// Workers take a snapshot (an `Arc` clone) and evaluate it without locking.
/// `replace` swaps in a new tree and bumps the version, so results computed against
/// an older version can be recognized and discarded.
#[derive(Debug)]
pub struct FieldSource {
    current: RwLock<FieldSnapshot>,
}

impl FieldSource {
    pub fn new(field: DistanceField) -> Self {
        Self {
            current: RwLock::new(FieldSnapshot {
                field: Arc::new(field),
                version: 1,
            }),
        }
    }

    /// Compile a definition and wrap it
    pub fn from_def(def: &FieldDef, options: &CompileOptions) -> FieldResult<Self> {
        Ok(Self::new(def.compile(options)?))
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        self.current.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Publish a new field, returning the new version
    pub fn replace(&self, field: DistanceField) -> u64 {
        let mut current = self.current.write();
        current.field = Arc::new(field);
        current.version += 1;
        log::debug!(
            "Published field version {} ({} nodes)",
            current.version,
            current.field.node_count()
        );
        current.version
    }
}
