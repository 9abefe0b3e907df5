//! Shared fixtures for the render tests

use crate::foundation::math::{Mat4, Point3, Vec3};
use crate::scene::{BoundingBox, Frustum, MeshgroupDesc, SceneGeometry, SceneGeometryBuilder, Transparency};

pub fn desc(material: u32, transparency: Transparency) -> MeshgroupDesc {
    MeshgroupDesc {
        bounds: BoundingBox::new(Vec3::repeat(-0.5), Vec3::repeat(0.5)),
        first_index: material * 36,
        index_count: 36,
        vertex_offset: material as i32 * 8,
        material,
        transparency,
    }
}

/// Camera at the origin looking down -Z, 90 degree fov, near 0.1, far 100
pub fn camera() -> (Mat4, Mat4) {
    let view = Mat4::look_at_rh(&Point3::origin(), &Point3::new(0.0, 0.0, -1.0), &Vec3::y());
    let proj = Mat4::new_perspective(1.0, std::f32::consts::FRAC_PI_2, 0.1, 100.0);
    (view, proj)
}

pub fn camera_frustum() -> Frustum {
    let (view, proj) = camera();
    Frustum::from_matrix(&(proj * view))
}

fn at(x: f32, z: f32) -> Mat4 {
    Mat4::new_translation(&Vec3::new(x, 0.0, z))
}

/// Two opaque and two transparent meshgroups, added interleaved
///
/// Instance ids and placement:
/// - 0: glass at (0, -10), visible
/// - 1: stone at (0, -5), visible
/// - 2: stone behind the camera
/// - 3: wood at (-60, -10), left of the view
/// - 4: stone at (3, -20), visible
/// - 5: glass past the far plane
/// - 6: water straddling the right plane at (10, -10)
///
/// Wood ends up with no visible instance.
pub fn mixed_scene() -> SceneGeometry {
    let mut builder = SceneGeometryBuilder::new();
    let glass = builder.add_meshgroup(desc(0, Transparency::Transparent));
    let stone = builder.add_meshgroup(desc(1, Transparency::Opaque));
    let water = builder.add_meshgroup(desc(2, Transparency::Transparent));
    let wood = builder.add_meshgroup(desc(3, Transparency::Opaque));

    builder.add_instance(glass, at(0.0, -10.0));
    builder.add_instance(stone, at(0.0, -5.0));
    builder.add_instance(stone, at(0.0, 5.0));
    builder.add_instance(wood, at(-60.0, -10.0));
    builder.add_instance(stone, at(3.0, -20.0));
    builder.add_instance(glass, at(0.0, -200.0));
    builder.add_instance(water, at(10.0, -10.0));
    builder.build()
}

/// Visible instance ids of [`mixed_scene`] under [`camera`]
pub const MIXED_VISIBLE: [u32; 4] = [0, 1, 4, 6];

/// A larger deterministic scene for CPU/GPU agreement checks
pub fn grid_scene(groups: u32, per_group: u32) -> SceneGeometry {
    let mut builder = SceneGeometryBuilder::new();
    for g in 0..groups {
        let transparency = if g % 3 == 2 { Transparency::Transparent } else { Transparency::Opaque };
        let group = builder.add_meshgroup(desc(g, transparency));
        for i in 0..per_group {
            let n = (g * per_group + i) as f32;
            let x = (n * 7.3) % 80.0 - 40.0;
            let z = (n * 3.1) % 120.0 - 110.0;
            builder.add_instance(group, at(x, z));
        }
    }
    builder.build()
}
