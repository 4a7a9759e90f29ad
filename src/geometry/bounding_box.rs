//! Axis-aligned bounding boxes.

use super::Point;
use itertools::iproduct;
use serde::{Deserialize, Serialize};

/// Axis-aligned box spanned by `min` and `max`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// Box spanned by two corners (components are sorted).
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// An inverted box that any union will overwrite.
    pub fn empty() -> Self {
        Self {
            min: Point::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Whether no point has been added yet.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Smallest box containing every point of `points`.
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.union_point(&p);
        }
        bbox
    }

    /// Grow the box to contain `p`.
    pub fn union_point(&mut self, p: &Point) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Grow the box to contain `other`.
    pub fn union_with(&mut self, other: &BoundingBox) {
        if other.is_empty() {
            return;
        }
        self.union_point(&other.min);
        self.union_point(&other.max);
    }

    /// The eight corners, ordered by (x, y, z) bit pattern.
    pub fn corners(&self) -> [Point; 8] {
        let mut out = [Point::origin(); 8];
        for (slot, (x, y, z)) in out
            .iter_mut()
            .zip(iproduct!([self.min.x, self.max.x], [self.min.y, self.max.y], [self.min.z, self.max.z]))
        {
            *slot = Point::new(x, y, z);
        }
        out
    }

    /// Expand each side by `factor` times the box extent along that axis.
    pub fn inflate(&mut self, factor: f64) {
        let delta = (self.max - self.min) * factor;
        self.min -= delta;
        self.max += delta;
    }

    /// Whether `p` lies inside the box (inclusive).
    pub fn contains(&self, p: &Point) -> bool {
        (0..3).all(|i| self.min[i] <= p[i] && p[i] <= self.max[i])
    }
}
