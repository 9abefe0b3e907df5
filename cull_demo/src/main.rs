//! Culling demo application
//!
//! Builds a procedural field of crates, rocks and glass panes, orbits a
//! camera over it while the sun slowly moves, and logs what every frustum
//! would draw. Frames cycle through the configured frame slots the way a
//! renderer with several frames in flight would.
//!
//! Usage: `cull_demo [settings.toml|settings.ron]`

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use visibility_core::prelude::*;

const FRAME_COUNT: usize = 12;
const FIELD_HALF_SIZE: f32 = 90.0;
const INSTANCES_PER_GROUP: usize = 120;

/// Meshgroup kinds placed in the field: (half extents, transparency)
const KINDS: [(f32, f32, f32, Transparency); 6] = [
    (1.0, 1.0, 1.0, Transparency::Opaque),      // crate
    (2.5, 1.5, 2.0, Transparency::Opaque),      // rock
    (0.5, 6.0, 0.5, Transparency::Opaque),      // pillar
    (8.0, 3.0, 8.0, Transparency::Opaque),      // hut
    (2.0, 2.0, 0.1, Transparency::Transparent), // glass pane
    (3.0, 0.2, 3.0, Transparency::Transparent), // water patch
];

fn build_scene(rng: &mut StdRng) -> SceneGeometry {
    let mut builder = SceneGeometryBuilder::new();
    let mut first_index = 0;

    for (material, (hx, hy, hz, transparency)) in KINDS.iter().enumerate() {
        let group = builder.add_meshgroup(MeshgroupDesc {
            bounds: BoundingBox::new(Vec3::new(-hx, 0.0, -hz), Vec3::new(*hx, 2.0 * hy, *hz)),
            first_index,
            index_count: 36,
            vertex_offset: 0,
            material: material as u32,
            transparency: *transparency,
        });
        first_index += 36;

        for _ in 0..INSTANCES_PER_GROUP {
            let position = Vec3::new(
                rng.gen_range(-FIELD_HALF_SIZE..FIELD_HALF_SIZE),
                0.0,
                rng.gen_range(-FIELD_HALF_SIZE..FIELD_HALF_SIZE),
            );
            let yaw = rng.gen_range(0.0..std::f32::consts::TAU);
            let model = Mat4::new_translation(&position) * Mat4::from_axis_angle(&Vec3::y_axis(), yaw);
            builder.add_instance(group, model);
        }
    }

    builder.build()
}

fn orbit_camera(frame: usize, config: &CullingConfig) -> (Mat4, Mat4) {
    let angle = frame as f32 * 0.35;
    let eye = Point3::new(40.0 * angle.cos(), 12.0, 40.0 * angle.sin());
    let view = Mat4::look_at_rh(&eye, &Point3::new(0.0, 2.0, 0.0), &Vec3::y());
    let projection = Mat4::new_perspective(
        16.0 / 9.0,
        60f32.to_radians(),
        config.camera_near,
        config.camera_far,
    );
    (view, projection)
}

fn sun_direction(frame: usize) -> Vec3 {
    // The sun moves every fourth frame
    let step = (frame / 4) as f32 * 0.2;
    Vec3::new(step.cos() * 0.4, -1.0, step.sin() * 0.4)
}

fn log_frame(frame: usize, slot: FrameSlot, sets: &visibility_core::render::FrameDrawnSets) {
    for (frustum, set) in sets.iter() {
        log::info!(
            "frame {:2} slot {} {:<12} {:3} opaque + {:2} transparent draws, {:4} instances",
            frame,
            slot.0,
            format!("{:?}", frustum),
            set.draw_count.opaque,
            set.draw_count.transparent,
            set.visible_instance_count()
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    visibility_core::foundation::logging::init();

    let config = match std::env::args().nth(1) {
        Some(path) => CullingConfig::load(&path)?,
        None => CullingConfig::default().with_camera_range(0.1, 250.0),
    };
    log::info!("Starting culling demo");

    let mut rng = StdRng::seed_from_u64(7);
    let scene = build_scene(&mut rng);
    log::info!(
        "Scene: {} meshgroups, {} instances, bounds {:?}..{:?}",
        scene.meshgroups().len(),
        scene.instances().len(),
        scene.bounds().min,
        scene.bounds().max
    );

    let mut frames = FrameVisibility::new(scene, &config);
    log::info!("Cascade split ends: {:?}", frames.cascade_config().active_ends());

    for frame in 0..FRAME_COUNT {
        let slot = FrameSlot(frame % frames.frames_in_flight());
        let (view, projection) = orbit_camera(frame, &config);
        frames.set_camera(view, projection);
        frames.set_light_direction(sun_direction(frame));

        let sets = frames.prepare_frame(slot)?;
        log_frame(frame, slot, sets);
    }

    for (i, cascade) in frames.cascades().iter().enumerate() {
        log::info!(
            "cascade {} depth bound {:.3}{}",
            i,
            cascade.depth_bound,
            if cascade.empty { " (empty)" } else { "" }
        );
    }

    log::info!("Culling demo finished");
    Ok(())
}
