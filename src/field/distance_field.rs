use glam::DVec3;

use super::bounds::{Aabb, Bounds};
use super::combinator::Combinator;
use super::noise::{LayeredNoise, WarpNoise};

/// Compiled distance field tree
///
/// Built from a `FieldDef` once, then shared read-only (behind an `Arc`) by every
/// worker. Evaluation is pure: the same point always yields the same value.
#[derive(Debug, Clone)]
pub enum DistanceField {
    Constant(f64),
    Sphere {
        center: DVec3,
        radius: f64,
    },
    /// `normal · p + offset` with a unit normal
    Plane {
        normal: DVec3,
        offset: f64,
    },
    /// Layered noise scaled by a constant amplitude
    Noise {
        noise: LayeredNoise,
        amplitude: f64,
    },
    /// Layered noise scaled by another field
    ModulatedNoise {
        noise: LayeredNoise,
        amplitude: Box<DistanceField>,
    },
    Scale {
        factor: f64,
        source: Box<DistanceField>,
    },
    /// Domain warp: `source(p + strength * warp(p))`
    Perturb {
        warp: WarpNoise,
        strength: f64,
        source: Box<DistanceField>,
    },
    Combine {
        op: Combinator,
        a: Box<DistanceField>,
        b: Box<DistanceField>,
    },
}

impl DistanceField {
    pub fn evaluate(&self, p: DVec3) -> f64 {
        match self {
            DistanceField::Constant(value) => *value,
            DistanceField::Sphere { center, radius } => (p - *center).length() - radius,
            DistanceField::Plane { normal, offset } => normal.dot(p) + offset,
            DistanceField::Noise { noise, amplitude } => noise.sample(p) * amplitude,
            DistanceField::ModulatedNoise { noise, amplitude } => {
                noise.sample(p) * amplitude.evaluate(p)
            }
            DistanceField::Scale { factor, source } => source.evaluate(p) * factor,
            DistanceField::Perturb {
                warp,
                strength,
                source,
            } => source.evaluate(p + warp.displacement(p) * *strength),
            DistanceField::Combine { op, a, b } => op.apply(a.evaluate(p), b.evaluate(p)),
        }
    }

    /// Conservative value range over `region`.
    ///
    /// A zero-extent region returns the exact value at that point.
    pub fn bounds_over(&self, region: &Aabb) -> Bounds {
        if region.is_point() {
            return Bounds::point(self.evaluate(region.min));
        }
        self.node_bounds(region)
    }

    fn node_bounds(&self, region: &Aabb) -> Bounds {
        match self {
            DistanceField::Constant(value) => Bounds::point(*value),
            DistanceField::Sphere { center, radius } => {
                let near = (region.closest_point(*center) - *center).length();
                let far = region.farthest_distance(*center);
                Bounds::new(near - radius, far - radius)
            }
            DistanceField::Plane { normal, offset } => {
                let mut lo = *offset;
                let mut hi = *offset;
                for axis in 0..3 {
                    let n = normal[axis];
                    if n >= 0.0 {
                        lo += n * region.min[axis];
                        hi += n * region.max[axis];
                    } else {
                        lo += n * region.max[axis];
                        hi += n * region.min[axis];
                    }
                }
                Bounds::new(lo, hi)
            }
            DistanceField::Noise { amplitude, .. } => Bounds::symmetric(*amplitude),
            DistanceField::ModulatedNoise { amplitude, .. } => {
                // Noise spans [-1, 1], so the product spans the amplitude's magnitude
                Bounds::symmetric(amplitude.node_bounds(region).magnitude())
            }
            DistanceField::Scale { factor, source } => source.node_bounds(region).scale(*factor),
            DistanceField::Perturb {
                strength, source, ..
            } => source.node_bounds(&region.grow(*strength)),
            DistanceField::Combine { op, a, b } => {
                op.combine_bounds(a.node_bounds(region), b.node_bounds(region))
            }
        }
    }

    /// True unless the field provably keeps one sign over `region`
    pub fn may_contain_surface(&self, region: &Aabb) -> bool {
        self.bounds_over(region).may_contain_surface()
    }

    /// Central-difference gradient with sample offset `h`
    pub fn gradient(&self, p: DVec3, h: f64) -> DVec3 {
        let h = h.abs().max(f64::EPSILON);
        let dx = DVec3::new(h, 0.0, 0.0);
        let dy = DVec3::new(0.0, h, 0.0);
        let dz = DVec3::new(0.0, 0.0, h);
        DVec3::new(
            self.evaluate(p + dx) - self.evaluate(p - dx),
            self.evaluate(p + dy) - self.evaluate(p - dy),
            self.evaluate(p + dz) - self.evaluate(p - dz),
        ) / (2.0 * h)
    }

    /// Outward unit normal, or zero where the gradient vanishes
    pub fn normal(&self, p: DVec3, h: f64) -> DVec3 {
        self.gradient(p, h).normalize_or_zero()
    }

    pub fn node_count(&self) -> usize {
        1 + match self {
            DistanceField::Constant(_)
            | DistanceField::Sphere { .. }
            | DistanceField::Plane { .. }
            | DistanceField::Noise { .. } => 0,
            DistanceField::ModulatedNoise { amplitude, .. } => amplitude.node_count(),
            DistanceField::Scale { source, .. } | DistanceField::Perturb { source, .. } => {
                source.node_count()
            }
            DistanceField::Combine { a, b, .. } => a.node_count() + b.node_count(),
        }
    }
}
