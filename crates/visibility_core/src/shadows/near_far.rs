//! Tight near/far fitting for a cascade's orthographic projection
//!
//! The eight light-space points of a box (in [`BoundingBox::corner`] order)
//! are tessellated into 12 triangles. Each triangle is clipped against the
//! four side planes of the cascade's XY footprint; whatever survives bounds
//! the depth range. This keeps the depth range tight to geometry that can
//! actually land in the shadow map instead of the whole light-space box.
//!
//! [`BoundingBox::corner`]: crate::scene::BoundingBox::corner

use crate::foundation::math::{Vec3, Vec4};
use crate::{CullError, CullResult};

/// Capacity of the clipper's working triangle list
///
/// Each of the four side planes can at most double the list, so one input
/// triangle ends as no more than 1 -> 2 -> 4 -> 8 -> 16 pieces. The capacity
/// is exactly that worst case.
pub const CLIP_TRIANGLE_CAPACITY: usize = 16;

/// Faces of the box hexahedron, two triangles each
const BOX_TRIANGLES: [[usize; 3]; 12] = [
    [0, 1, 2], [1, 2, 3], // min z
    [4, 5, 6], [5, 6, 7], // max z
    [0, 2, 4], [2, 4, 6], // min x
    [1, 3, 5], [3, 5, 7], // max x
    [0, 1, 4], [1, 4, 5], // min y
    [2, 3, 6], [3, 6, 7], // max y
];

/// Depth range in light view space, as distances along -Z
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearFar {
    /// Smallest distance reached by surviving geometry
    pub near: f32,
    /// Largest distance reached by surviving geometry
    pub far: f32,
}

impl NearFar {
    /// Sentinel range that any real depth replaces
    pub const UNSET: Self = Self {
        near: f32::MAX,
        far: -f32::MAX,
    };

    /// True while no geometry has contributed
    pub fn is_unset(&self) -> bool {
        self.near > self.far
    }

    fn include(&mut self, point: &Vec3) {
        let depth = -point.z;
        self.near = self.near.min(depth);
        self.far = self.far.max(depth);
    }
}

/// One of the four side planes of the footprint
#[derive(Debug, Clone, Copy)]
struct ClipEdge {
    axis: usize,
    value: f32,
    keep_greater: bool,
}

impl ClipEdge {
    fn is_inside(&self, p: &Vec3) -> bool {
        if self.keep_greater {
            p[self.axis] > self.value
        } else {
            p[self.axis] < self.value
        }
    }

    /// Point where segment `from -> to` crosses this edge
    fn crossing(&self, from: &Vec3, to: &Vec3) -> Vec3 {
        let t = (self.value - from[self.axis]) / (to[self.axis] - from[self.axis]);
        from + (to - from) * t
    }
}

type Triangle = [Vec3; 3];

/// Fixed-capacity working list for the clipper
struct TriangleArena {
    triangles: [Triangle; CLIP_TRIANGLE_CAPACITY],
    len: usize,
}

impl TriangleArena {
    fn new() -> Self {
        Self {
            triangles: [[Vec3::zeros(); 3]; CLIP_TRIANGLE_CAPACITY],
            len: 0,
        }
    }

    fn clear(&mut self) {
        self.len = 0;
    }

    fn push(&mut self, triangle: Triangle) -> CullResult<()> {
        if self.len == CLIP_TRIANGLE_CAPACITY {
            return Err(CullError::ClipCapacityExceeded {
                capacity: CLIP_TRIANGLE_CAPACITY,
            });
        }
        self.triangles[self.len] = triangle;
        self.len += 1;
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn as_slice(&self) -> &[Triangle] {
        &self.triangles[..self.len]
    }
}

/// Clip the box tessellation to the XY footprint and measure its depth
///
/// `points` are the eight light-space corners in binary counting order.
/// Returns [`NearFar::UNSET`] when nothing lies inside the footprint;
/// callers must check before building a projection from it.
///
/// # Errors
/// [`CullError::ClipCapacityExceeded`] if clipping ever needs more than
/// [`CLIP_TRIANGLE_CAPACITY`] triangles.
pub fn calc_near_far(light_min: &Vec3, light_max: &Vec3, points: &[Vec4; 8]) -> CullResult<NearFar> {
    let edges = [
        ClipEdge { axis: 0, value: light_min.x, keep_greater: true },
        ClipEdge { axis: 0, value: light_max.x, keep_greater: false },
        ClipEdge { axis: 1, value: light_min.y, keep_greater: true },
        ClipEdge { axis: 1, value: light_max.y, keep_greater: false },
    ];
    let points = points.map(|p| p.xyz());

    let mut result = NearFar::UNSET;
    let mut current = TriangleArena::new();
    let mut next = TriangleArena::new();

    for indices in &BOX_TRIANGLES {
        current.clear();
        current.push(indices.map(|i| points[i]))?;

        for edge in &edges {
            next.clear();
            for triangle in current.as_slice() {
                clip_triangle(triangle, edge, &mut next)?;
            }
            std::mem::swap(&mut current, &mut next);
            if current.is_empty() {
                break;
            }
        }

        for triangle in current.as_slice() {
            for vertex in triangle {
                result.include(vertex);
            }
        }
    }

    Ok(result)
}

/// Clip one triangle against one edge, pushing what survives into `out`
fn clip_triangle(triangle: &Triangle, edge: &ClipEdge, out: &mut TriangleArena) -> CullResult<()> {
    // Inside vertices first; stable so the winding of each class is kept
    let inside = triangle.map(|v| edge.is_inside(&v));
    let mut order = [0usize, 1, 2];
    order.sort_by_key(|&i| !inside[i]);
    let tri = order.map(|i| triangle[i]);

    match inside.iter().filter(|&&b| b).count() {
        0 => Ok(()),
        1 => {
            let a = edge.crossing(&tri[0], &tri[1]);
            let b = edge.crossing(&tri[0], &tri[2]);
            out.push([tri[0], a, b])
        }
        2 => {
            let a = edge.crossing(&tri[0], &tri[2]);
            let b = edge.crossing(&tri[1], &tri[2]);
            out.push([tri[0], tri[1], a])?;
            out.push([tri[1], b, a])
        }
        _ => out.push(*triangle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::scene::BoundingBox;
    use approx::assert_relative_eq;

    fn light_space_box(min: Vec3, max: Vec3) -> [Vec4; 8] {
        BoundingBox::new(min, max).transformed_points_v4(&Mat4::identity())
    }

    #[test]
    fn test_box_inside_footprint_keeps_full_depth() {
        let points = light_space_box(Vec3::new(-1.0, -1.0, -20.0), Vec3::new(1.0, 1.0, -5.0));
        let range = calc_near_far(&Vec3::new(-10.0, -10.0, 0.0), &Vec3::new(10.0, 10.0, 0.0), &points)
            .unwrap();

        assert_relative_eq!(range.near, 5.0);
        assert_relative_eq!(range.far, 20.0);
    }

    #[test]
    fn test_box_outside_footprint_leaves_sentinels() {
        let points = light_space_box(Vec3::new(50.0, 50.0, -20.0), Vec3::new(60.0, 60.0, -5.0));
        let range = calc_near_far(&Vec3::new(-10.0, -10.0, 0.0), &Vec3::new(10.0, 10.0, 0.0), &points)
            .unwrap();

        assert!(range.is_unset());
        assert_eq!(range, NearFar::UNSET);
    }

    #[test]
    fn test_tilted_box_is_clipped_to_footprint() {
        // A slab whose depth grows with x: z = -(10 + x)
        let shear = Mat4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            -1.0, 0.0, 1.0, -10.0,
            0.0, 0.0, 0.0, 1.0,
        );
        let points = BoundingBox::new(Vec3::new(-100.0, -1.0, 0.0), Vec3::new(100.0, 1.0, 0.0))
            .transformed_points_v4(&shear);

        let range = calc_near_far(&Vec3::new(-2.0, -5.0, 0.0), &Vec3::new(3.0, 5.0, 0.0), &points)
            .unwrap();

        // Only x in (-2, 3) survives, so depth spans 8..13 rather than -90..110
        assert_relative_eq!(range.near, 8.0, epsilon = 1e-4);
        assert_relative_eq!(range.far, 13.0, epsilon = 1e-4);
    }

    #[test]
    fn test_corner_clip_splits_stay_within_capacity() {
        // Rotated box so every triangle crosses several footprint edges
        let rotate = Mat4::from_axis_angle(&Vec3::z_axis(), 0.6)
            * Mat4::from_axis_angle(&Vec3::x_axis(), 0.4);
        let points = BoundingBox::new(Vec3::repeat(-4.0), Vec3::repeat(4.0)).transformed_points_v4(&rotate);

        let range = calc_near_far(&Vec3::new(-1.0, -1.5, 0.0), &Vec3::new(2.0, 1.0, 0.0), &points)
            .unwrap();

        assert!(!range.is_unset());
        assert!(range.near < range.far);
    }

    #[test]
    fn test_full_arena_rejects_push() {
        let mut arena = TriangleArena::new();
        let triangle = [Vec3::zeros(), Vec3::x(), Vec3::y()];
        for _ in 0..CLIP_TRIANGLE_CAPACITY {
            arena.push(triangle).unwrap();
        }
        assert_eq!(arena.as_slice().len(), CLIP_TRIANGLE_CAPACITY);

        let overflow = arena.push(triangle);
        assert!(matches!(overflow, Err(CullError::ClipCapacityExceeded { capacity: 16 })));
        assert_eq!(arena.as_slice().len(), CLIP_TRIANGLE_CAPACITY);

        arena.clear();
        assert!(arena.is_empty());
        assert!(arena.push(triangle).is_ok());
    }
}
