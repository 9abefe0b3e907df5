//! Math utilities and types
//!
//! Provides the fundamental math types used by the culling and shadow code.
//! All matrices follow nalgebra's right-handed convention with OpenGL clip
//! space (`-w <= z <= w`), which is what the frustum plane extraction expects.

pub use nalgebra::{
    Vector3, Vector4,
    Matrix4,
};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Math utility functions
pub mod utils {
    use super::*;

    /// Linear interpolation between two points
    pub fn lerp_vec3(a: &Vec3, b: &Vec3, t: f32) -> Vec3 {
        a + (b - a) * t
    }

    /// Drop the w component of a homogeneous point after perspective division
    pub fn project_vec4(v: &Vec4) -> Vec3 {
        Vec3::new(v.x / v.w, v.y / v.w, v.z / v.w)
    }
}

/// Extension trait for Mat4 with the constructors the shadow code needs
pub trait Mat4Ext {
    /// Create a look-along view matrix centred at the origin
    ///
    /// The resulting view looks down its local -Z axis along `direction`.
    fn look_along(direction: &Vec3, up: &Vec3) -> Mat4;

    /// Create an off-centre orthographic projection
    ///
    /// `near` and `far` are distances along the view's -Z axis.
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Get row `i` of the matrix as a 4-vector
    fn row4(&self, i: usize) -> Vec4;
}

impl Mat4Ext for Mat4 {
    fn look_along(direction: &Vec3, up: &Vec3) -> Mat4 {
        let eye = Point3::origin();
        let target = Point3::from(direction.normalize());
        Mat4::look_at_rh(&eye, &target, up)
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_orthographic(left, right, bottom, top, near, far)
    }

    fn row4(&self, i: usize) -> Vec4 {
        Vec4::new(self[(i, 0)], self[(i, 1)], self[(i, 2)], self[(i, 3)])
    }
}
