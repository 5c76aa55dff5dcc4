use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Create a box from two opposite corners in any order
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Zero-extent box at a single point
    pub fn point(p: DVec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn from_center_half_extents(center: DVec3, half: DVec3) -> Self {
        let half = half.abs();
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// True when the box collapses to a single point
    pub fn is_point(&self) -> bool {
        self.min == self.max
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Grow the box by `amount` on every side
    pub fn grow(&self, amount: f64) -> Self {
        let amount = DVec3::splat(amount.abs());
        Self {
            min: self.min - amount,
            max: self.max + amount,
        }
    }

    pub fn contains(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// Point of the box closest to `p`
    pub fn closest_point(&self, p: DVec3) -> DVec3 {
        p.clamp(self.min, self.max)
    }

    /// Distance from `p` to the farthest corner of the box
    pub fn farthest_distance(&self, p: DVec3) -> f64 {
        let dx = (p.x - self.min.x).abs().max((p.x - self.max.x).abs());
        let dy = (p.y - self.min.y).abs().max((p.y - self.max.y).abs());
        let dz = (p.z - self.min.z).abs().max((p.z - self.max.z).abs());
        DVec3::new(dx, dy, dz).length()
    }

    /// Corner `i` using bit 0 for x, bit 1 for y, bit 2 for z
    pub fn corner(&self, i: usize) -> DVec3 {
        DVec3::new(
            if i & 1 == 0 { self.min.x } else { self.max.x },
            if i & 2 == 0 { self.min.y } else { self.max.y },
            if i & 4 == 0 { self.min.z } else { self.max.z },
        )
    }
}

/// Which extreme of an operand's range feeds a combined bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Min,
    Max,
}

/// Per-operand declaration of where a binary combinator's bounds come from.
///
/// `lower[i]` names the extreme of operand `i` that produces the combination's
/// minimum, `upper[i]` the one that produces its maximum. Applying the combinator's
/// own scalar function to those extremes is exact for functions that are monotone
/// in each operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundsRule {
    pub lower: [Extreme; 2],
    pub upper: [Extreme; 2],
}

impl BoundsRule {
    /// Non-decreasing in both operands
    pub const INCREASING: Self = Self {
        lower: [Extreme::Min, Extreme::Min],
        upper: [Extreme::Max, Extreme::Max],
    };

    /// Non-increasing in the first operand, non-decreasing in the second
    pub const FIRST_NEGATED: Self = Self {
        lower: [Extreme::Max, Extreme::Min],
        upper: [Extreme::Min, Extreme::Max],
    };
}

/// Conservative range of field values over a region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        debug_assert!(min <= max, "bounds inverted: {} > {}", min, max);
        Self { min, max }
    }

    pub fn point(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Symmetric range `[-m, m]`
    pub fn symmetric(magnitude: f64) -> Self {
        let m = magnitude.abs();
        Self { min: -m, max: m }
    }

    pub fn pick(&self, extreme: Extreme) -> f64 {
        match extreme {
            Extreme::Min => self.min,
            Extreme::Max => self.max,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    /// Largest absolute value in the range
    pub fn magnitude(&self) -> f64 {
        self.min.abs().max(self.max.abs())
    }

    pub fn scale(&self, factor: f64) -> Self {
        if factor >= 0.0 {
            Self::new(self.min * factor, self.max * factor)
        } else {
            Self::new(self.max * factor, self.min * factor)
        }
    }

    /// The range straddles zero, so a surface may cross the region
    pub fn may_contain_surface(&self) -> bool {
        self.min <= 0.0 && self.max >= 0.0
    }
}
