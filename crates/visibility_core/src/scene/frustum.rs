//! Frustum plane extraction and box classification
//!
//! Planes are pulled straight out of a combined projection × view matrix
//! (Gribb-Hartmann). They are left unnormalized: only the sign of the
//! signed distance is ever used.

use crate::foundation::math::{Vec3, Vec4, Mat4, Mat4Ext};
use crate::scene::BoundingBox;

/// Result of testing a box against a frustum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Entirely inside all six planes
    Inside,
    /// Straddles at least one plane; treated as visible
    Intersect,
    /// Entirely outside at least one plane
    Outside,
}

/// Half-space defined by a normal and a signed distance
///
/// A point is outside the plane when `dot(normal, p) + distance > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Plane normal (not normalized)
    pub normal: Vec3,
    /// Signed distance term
    pub distance: f32,
}

impl Plane {
    /// Create a plane from a normal and distance, keeping their magnitude
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Create a plane from packed `(normal.xyz, distance)`
    pub fn from_vec4(v: Vec4) -> Self {
        Self {
            normal: v.xyz(),
            distance: v.w,
        }
    }

    /// Signed distance scaled by the normal's length
    pub fn distance_to_point(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    /// Pack as `[nx, ny, nz, d]` for GPU upload
    pub fn to_array(&self) -> [f32; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.distance]
    }
}

/// Index of each plane in [`Frustum::planes`]
pub mod plane_index {
    /// Left plane
    pub const LEFT: usize = 0;
    /// Right plane
    pub const RIGHT: usize = 1;
    /// Bottom plane
    pub const BOTTOM: usize = 2;
    /// Top plane
    pub const TOP: usize = 3;
    /// Near plane
    pub const NEAR: usize = 4;
    /// Far plane
    pub const FAR: usize = 5;
}

/// Frustum for visibility culling
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Six planes in the order left, right, bottom, top, near, far
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Create a frustum from six planes
    pub fn new(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extract frustum planes from a projection × view matrix
    ///
    /// Expects OpenGL clip space (`-w <= x, y, z <= w`).
    pub fn from_matrix(view_projection: &Mat4) -> Self {
        let r0 = view_projection.row4(0);
        let r1 = view_projection.row4(1);
        let r2 = view_projection.row4(2);
        let r3 = view_projection.row4(3);

        Self {
            planes: [
                Plane::from_vec4(-(r3 + r0)),
                Plane::from_vec4(-(r3 - r0)),
                Plane::from_vec4(-(r3 + r1)),
                Plane::from_vec4(-(r3 - r1)),
                Plane::from_vec4(-(r3 + r2)),
                Plane::from_vec4(-(r3 - r2)),
            ],
        }
    }

    /// Classify an axis-aligned box against the frustum
    ///
    /// For each plane only two corners are tested: the one nearest the inside
    /// of the plane and the one furthest from it. The first plane that even
    /// the nearest corner violates ends the test with `Outside`.
    pub fn classify(&self, min: &Vec3, max: &Vec3) -> Classification {
        let mut result = Classification::Inside;

        for plane in &self.planes {
            let mut nearest = *min;
            let mut furthest = *max;
            for axis in 0..3 {
                if plane.normal[axis] < 0.0 {
                    nearest[axis] = max[axis];
                    furthest[axis] = min[axis];
                }
            }

            if plane.distance_to_point(&nearest) > 0.0 {
                return Classification::Outside;
            }
            if plane.distance_to_point(&furthest) > 0.0 {
                result = Classification::Intersect;
            }
        }

        result
    }

    /// Classify a [`BoundingBox`]
    pub fn classify_box(&self, bounds: &BoundingBox) -> Classification {
        self.classify(&bounds.min, &bounds.max)
    }

    /// True when the box is entirely outside the frustum
    pub fn can_cull(&self, bounds: &BoundingBox) -> bool {
        self.classify_box(bounds) == Classification::Outside
    }

    /// Planes packed for a compute shader uniform block
    pub fn planes_gpu(&self) -> [[f32; 4]; 6] {
        self.planes.map(|p| p.to_array())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Point3;

    fn camera_frustum() -> Frustum {
        // Camera at the origin looking down -Z, near 1, far 100
        let proj = Mat4::new_perspective(1.0, std::f32::consts::FRAC_PI_2, 1.0, 100.0);
        let view = Mat4::look_at_rh(&Point3::origin(), &Point3::new(0.0, 0.0, -1.0), &Vec3::y());
        Frustum::from_matrix(&(proj * view))
    }

    fn cube(center: Vec3, half: f32) -> BoundingBox {
        BoundingBox::from_center_extents(center, Vec3::repeat(half))
    }

    #[test]
    fn test_box_inside_frustum() {
        let frustum = camera_frustum();
        let bounds = cube(Vec3::new(0.0, 0.0, -10.0), 1.0);
        assert_eq!(frustum.classify_box(&bounds), Classification::Inside);
        assert!(!frustum.can_cull(&bounds));
    }

    #[test]
    fn test_box_outside_each_side() {
        let frustum = camera_frustum();
        let outside = [
            cube(Vec3::new(-50.0, 0.0, -10.0), 1.0), // left
            cube(Vec3::new(50.0, 0.0, -10.0), 1.0),  // right
            cube(Vec3::new(0.0, -50.0, -10.0), 1.0), // bottom
            cube(Vec3::new(0.0, 50.0, -10.0), 1.0),  // top
            cube(Vec3::new(0.0, 0.0, 5.0), 1.0),     // behind the near plane
            cube(Vec3::new(0.0, 0.0, -200.0), 1.0),  // past the far plane
        ];

        for bounds in &outside {
            assert_eq!(frustum.classify_box(bounds), Classification::Outside, "{:?}", bounds);
            assert!(frustum.can_cull(bounds));
        }
    }

    #[test]
    fn test_box_straddling_plane_intersects() {
        let frustum = camera_frustum();
        // Crosses the right plane (x = -z at this depth)
        let bounds = cube(Vec3::new(10.0, 0.0, -10.0), 1.0);
        assert_eq!(frustum.classify_box(&bounds), Classification::Intersect);
        assert!(!frustum.can_cull(&bounds));

        // Contains the whole frustum
        let huge = cube(Vec3::zeros(), 500.0);
        assert_eq!(frustum.classify_box(&huge), Classification::Intersect);
    }

    #[test]
    fn test_plane_order_and_sign() {
        let frustum = camera_frustum();
        let in_view = Vec3::new(0.0, 0.0, -10.0);
        for plane in &frustum.planes {
            assert!(plane.distance_to_point(&in_view) < 0.0);
        }

        let left_of_view = Vec3::new(-50.0, 0.0, -10.0);
        assert!(frustum.planes[plane_index::LEFT].distance_to_point(&left_of_view) > 0.0);
        assert!(frustum.planes[plane_index::RIGHT].distance_to_point(&left_of_view) < 0.0);

        let past_far = Vec3::new(0.0, 0.0, -150.0);
        assert!(frustum.planes[plane_index::FAR].distance_to_point(&past_far) > 0.0);
        assert!(frustum.planes[plane_index::NEAR].distance_to_point(&past_far) < 0.0);
    }

    #[test]
    fn test_planes_gpu_layout() {
        let frustum = camera_frustum();
        let packed = frustum.planes_gpu();
        assert_eq!(packed[plane_index::TOP], frustum.planes[plane_index::TOP].to_array());
    }
}
