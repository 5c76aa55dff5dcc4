/// Binary combinators of the distance field algebra
///
/// Each combinator carries its scalar function and a `BoundsRule`. Every combinator
/// here is monotone in each operand, so evaluating the function at the declared
/// extremes gives bounds that are both conservative and tight.

use super::bounds::{Bounds, BoundsRule};
use crate::constants::field::MIN_SMOOTHING;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Combinator {
    /// `a + b`
    Add,
    /// `min(a, b)`
    Union,
    /// `max(a, b)`
    Intersection,
    /// `max(-a, b)`: carve `a` out of `b`
    Difference,
    SmoothUnion { k: f64 },
    SmoothIntersection { k: f64 },
    SmoothDifference { k: f64 },
}

impl Combinator {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Combinator::Add => a + b,
            Combinator::Union => a.min(b),
            Combinator::Intersection => a.max(b),
            Combinator::Difference => (-a).max(b),
            Combinator::SmoothUnion { k } => smooth_union(a, b, k),
            Combinator::SmoothIntersection { k } => smooth_intersection(a, b, k),
            Combinator::SmoothDifference { k } => smooth_difference(a, b, k),
        }
    }

    pub fn bounds_rule(self) -> BoundsRule {
        match self {
            Combinator::Add
            | Combinator::Union
            | Combinator::Intersection
            | Combinator::SmoothUnion { .. }
            | Combinator::SmoothIntersection { .. } => BoundsRule::INCREASING,
            Combinator::Difference | Combinator::SmoothDifference { .. } => {
                BoundsRule::FIRST_NEGATED
            }
        }
    }

    /// Combine operand bounds through the declared rule
    pub fn combine_bounds(self, a: Bounds, b: Bounds) -> Bounds {
        let rule = self.bounds_rule();
        let lo = self.apply(a.pick(rule.lower[0]), b.pick(rule.lower[1]));
        let hi = self.apply(a.pick(rule.upper[0]), b.pick(rule.upper[1]));
        Bounds::new(lo, hi)
    }

    pub fn name(self) -> &'static str {
        match self {
            Combinator::Add => "add",
            Combinator::Union => "union",
            Combinator::Intersection => "intersection",
            Combinator::Difference => "difference",
            Combinator::SmoothUnion { .. } => "smooth_union",
            Combinator::SmoothIntersection { .. } => "smooth_intersection",
            Combinator::SmoothDifference { .. } => "smooth_difference",
        }
    }
}

/// Polynomial smooth minimum; falls back to `min` when `k` is effectively zero
pub fn smooth_union(a: f64, b: f64, k: f64) -> f64 {
    if k <= MIN_SMOOTHING {
        return a.min(b);
    }
    let h = (0.5 + 0.5 * (b - a) / k).clamp(0.0, 1.0);
    b * (1.0 - h) + a * h - k * h * (1.0 - h)
}

pub fn smooth_intersection(a: f64, b: f64, k: f64) -> f64 {
    -smooth_union(-a, -b, k)
}

pub fn smooth_difference(a: f64, b: f64, k: f64) -> f64 {
    smooth_intersection(-a, b, k)
}
