//! Axis-aligned bounding box arithmetic
//!
//! Used for meshgroup bounds, the scene bounds, and the light-space boxes
//! the cascade fitting works with.

use crate::foundation::math::{Vec3, Vec4, Mat4};

/// Axis-Aligned Bounding Box
///
/// A box is *empty* when `min > max` on any axis. [`BoundingBox::empty`] is
/// the identity for [`BoundingBox::combine_with`]; [`BoundingBox::intersect_with`]
/// can produce an empty box from disjoint inputs, which callers must check
/// with [`BoundingBox::is_empty`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl BoundingBox {
    /// Create a new box from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// An inverted box that contains nothing
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::MAX),
            max: Vec3::repeat(-f32::MAX),
        }
    }

    /// Create a box centered at a point with given half-size extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Build the hull of a point set, or an empty box when there are no points
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut bounds = Self::empty();
        bounds.calc_from_points(points);
        bounds
    }

    /// Expand to include a point or another box
    ///
    /// Per-axis min/max only, so it is idempotent, commutative and associative.
    pub fn combine_with(&mut self, other: impl Into<BoundingBox>) {
        let other = other.into();
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Reset this box to the hull of `points`
    ///
    /// Leaves the box untouched when `points` is empty.
    pub fn calc_from_points<'a>(&mut self, points: impl IntoIterator<Item = &'a Vec3>) {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return;
        };

        *self = Self::new(*first, *first);
        for p in points {
            self.combine_with(*p);
        }
    }

    /// Clip this box to `other`
    ///
    /// The result is inverted when the boxes are disjoint.
    pub fn intersect_with(&mut self, other: &BoundingBox) {
        self.max = self.max.inf(&other.max);
        self.min = self.min.sup(&other.min);
    }

    /// True when `min > max` on any axis
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Get the center of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the box
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Check if this box contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Corner `i` of the box in binary counting order
    ///
    /// Bit 0 selects `max.x`, bit 1 `max.y`, bit 2 `max.z`.
    pub fn corner(&self, i: usize) -> Vec3 {
        Vec3::new(
            if i & 1 != 0 { self.max.x } else { self.min.x },
            if i & 2 != 0 { self.max.y } else { self.min.y },
            if i & 4 != 0 { self.max.z } else { self.min.z },
        )
    }

    /// Transform the 8 corners by `m`
    ///
    /// Corners come out in [`BoundingBox::corner`] order. The near/far clipper
    /// tessellates the hexahedron from this order, so it must not change.
    pub fn transformed_points_v4(&self, m: &Mat4) -> [Vec4; 8] {
        std::array::from_fn(|i| m * self.corner(i).push(1.0))
    }

    /// Bounding box of this box after transforming it by an affine matrix
    pub fn transformed(&self, m: &Mat4) -> BoundingBox {
        let points = self.transformed_points_v4(m).map(|p| p.xyz());
        Self::from_points(&points)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec3> for BoundingBox {
    fn from(point: Vec3) -> Self {
        Self::new(point, point)
    }
}
