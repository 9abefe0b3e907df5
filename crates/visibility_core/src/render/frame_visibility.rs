//! # Per-Frame Visibility
//!
//! Owns the scene geometry, the cascade calculator and one set of draw lists
//! per frame in flight. Input setters mark every slot stale; preparing a slot
//! rebuilds only what its stale inputs affect.
//!
//! ## Rebuild rules
//!
//! | Changed input       | Cascades | Main list | Cascade lists |
//! |---------------------|----------|-----------|---------------|
//! | camera              | yes      | yes       | yes           |
//! | light direction     | yes      | no        | yes           |
//! | extra point (scene) | yes      | no        | yes           |
//! | cascade config      | yes      | no        | yes           |
//!
//! A slot's new lists are built completely before they replace the old ones.
//! If anything fails the slot keeps its previous lists and stays stale.

use bitflags::bitflags;

use crate::core::config::CullingConfig;
use crate::foundation::math::{Mat4, Vec3};
use crate::render::drawn_set::{DrawnSet, FrameDrawnSets, FrameSlot, FramesInFlight, FrustumId};
use crate::render::gpu_cull::GpuCullMirror;
use crate::render::visibility::VisibilityDrawBuilder;
use crate::scene::{Frustum, SceneGeometry};
use crate::shadows::{Cascade, CascadeCalculator, CascadeConfig};
use crate::CullResult;

bitflags! {
    /// Culling inputs that changed since a slot was last prepared
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DirtyInputs: u32 {
        /// Camera view or projection
        const CAMERA = 1 << 0;
        /// Light direction
        const LIGHT = 1 << 1;
        /// Scene bounds used for cascade fitting
        const SCENE = 1 << 2;
        /// Cascade layout
        const CASCADE_CONFIG = 1 << 3;
    }
}

struct SlotState {
    sets: FrameDrawnSets,
    dirty: DirtyInputs,
}

/// Draw-list source for every frustum
enum CullBackend {
    Cpu,
    Gpu(GpuCullMirror),
}

/// Per-frame orchestrator of cascade fitting and draw-list building
pub struct FrameVisibility {
    scene: SceneGeometry,
    builder: VisibilityDrawBuilder,
    backend: CullBackend,
    calculator: CascadeCalculator,
    auto_calc_splits: bool,
    camera_view: Mat4,
    camera_projection: Mat4,
    light_dir: Vec3,
    extra_point: Option<Vec3>,
    cascades_stale: bool,
    slots: FramesInFlight<SlotState>,
}

impl FrameVisibility {
    /// Take ownership of the scene and allocate one slot per frame in flight
    ///
    /// Every slot starts stale. The camera defaults to identity matrices and
    /// the light to straight down until the setters are called.
    ///
    /// # Panics
    /// Panics when `config` fails [`CullingConfig::validate`].
    pub fn new(scene: SceneGeometry, config: &CullingConfig) -> Self {
        if let Err(message) = config.validate() {
            panic!("invalid culling configuration: {}", message);
        }

        let mut calculator = CascadeCalculator::new(config.cascades.clone());
        calculator.init(
            *scene.bounds(),
            config.camera_near,
            config.camera_far,
            config.shadow_map_size,
            config.cascades.num_cascades,
            config.auto_calc_splits,
        );

        let builder = VisibilityDrawBuilder::new(&scene);
        let backend = if config.use_gpu_culling {
            CullBackend::Gpu(GpuCullMirror::new(&scene))
        } else {
            CullBackend::Cpu
        };

        let num_cascades = config.cascades.num_cascades;
        let slots = FramesInFlight::new(config.frames_in_flight, |_| SlotState {
            sets: FrameDrawnSets::new(num_cascades),
            dirty: DirtyInputs::all(),
        });

        log::info!(
            "Frame visibility: {} frames in flight, {} cascades, {} culling",
            config.frames_in_flight,
            num_cascades,
            if config.use_gpu_culling { "GPU" } else { "CPU" }
        );

        Self {
            scene,
            builder,
            backend,
            calculator,
            auto_calc_splits: config.auto_calc_splits,
            camera_view: Mat4::identity(),
            camera_projection: Mat4::identity(),
            light_dir: Vec3::new(0.0, -1.0, 0.0),
            extra_point: None,
            cascades_stale: true,
            slots,
        }
    }

    /// Scene geometry being culled
    pub fn scene(&self) -> &SceneGeometry {
        &self.scene
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Cascades from the most recent fit
    pub fn cascades(&self) -> &[Cascade] {
        self.calculator.cascades()
    }

    /// Current cascade layout, including computed split ends
    pub fn cascade_config(&self) -> &CascadeConfig {
        self.calculator.config()
    }

    /// Stale inputs of a slot
    ///
    /// # Panics
    /// Panics when `slot` is out of range.
    pub fn dirty(&self, slot: FrameSlot) -> DirtyInputs {
        self.slots.get(slot).dirty
    }

    /// Set the camera view and projection
    pub fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        if view == self.camera_view && projection == self.camera_projection {
            return;
        }
        self.camera_view = view;
        self.camera_projection = projection;
        self.mark(DirtyInputs::CAMERA);
    }

    /// Set the direction light travels in
    pub fn set_light_direction(&mut self, direction: Vec3) {
        if direction == self.light_dir {
            return;
        }
        self.light_dir = direction;
        self.mark(DirtyInputs::LIGHT);
    }

    /// Widen the scene bounds used for cascade fitting by one point
    pub fn set_extra_point(&mut self, point: Option<Vec3>) {
        if point == self.extra_point {
            return;
        }
        self.extra_point = point;
        self.mark(DirtyInputs::SCENE);
    }

    /// Replace the cascade layout
    ///
    /// Split ends are recomputed when the frames were created with
    /// `auto_calc_splits`.
    ///
    /// # Panics
    /// Panics when the resulting layout fails [`CascadeConfig::validate`].
    pub fn set_cascade_config(&mut self, config: CascadeConfig) {
        let previous = self.calculator.config().clone();
        self.calculator.set_config(config, self.auto_calc_splits);
        if self.calculator.config() != &previous {
            self.mark(DirtyInputs::CASCADE_CONFIG);
        }
    }

    fn mark(&mut self, inputs: DirtyInputs) {
        self.cascades_stale = true;
        for slot in self.slots.iter_mut() {
            slot.dirty |= inputs;
        }
    }

    /// Bring a slot's draw lists up to date with the current inputs
    ///
    /// Returns the cached lists when nothing changed since the slot was last
    /// prepared.
    ///
    /// # Errors
    /// Cascade fitting or GPU culling errors. The slot keeps its previous
    /// lists and stays stale.
    ///
    /// # Panics
    /// Panics when `slot` is out of range.
    pub fn prepare_frame(&mut self, slot: FrameSlot) -> CullResult<&FrameDrawnSets> {
        let dirty = self.slots.get(slot).dirty;
        if dirty.is_empty() {
            return Ok(&self.slots.get(slot).sets);
        }

        if self.cascades_stale {
            self.calculator.calc(
                &self.light_dir,
                &self.camera_view,
                &self.camera_projection,
                self.extra_point.as_ref(),
            )?;
            self.cascades_stale = false;
        }

        let mut frusta: Vec<(FrustumId, Option<Frustum>)> = Vec::new();
        if dirty.contains(DirtyInputs::CAMERA) {
            let main = Frustum::from_matrix(&(self.camera_projection * self.camera_view));
            frusta.push((FrustumId::Main, Some(main)));
        }
        for (i, cascade) in self.calculator.cascades().iter().enumerate() {
            let frustum = (!cascade.empty).then(|| cascade.frustum());
            frusta.push((FrustumId::Cascade(i as u8), frustum));
        }

        let mut rebuilt = Vec::with_capacity(frusta.len());
        for (id, frustum) in frusta {
            let set = match frustum {
                Some(frustum) => self.cull(&frustum)?,
                None => DrawnSet::default(),
            };
            rebuilt.push((id, set));
        }

        let num_cascades = self.calculator.cascades().len();
        let state = self.slots.get_mut(slot);
        state.sets.resize_cascades(num_cascades);
        for (id, set) in rebuilt {
            if let Some(target) = state.sets.get_mut(id) {
                *target = set;
            }
        }
        state.dirty = DirtyInputs::empty();

        log::debug!(
            "Prepared frame slot {} ({:?}): main {} draws, {} cascades",
            slot.0,
            dirty,
            state.sets.main().draw_count.total(),
            num_cascades
        );
        Ok(&self.slots.get(slot).sets)
    }

    fn cull(&mut self, frustum: &Frustum) -> CullResult<DrawnSet> {
        match &mut self.backend {
            CullBackend::Cpu => Ok(self.builder.build_set(&self.scene, frustum)),
            CullBackend::Gpu(mirror) => mirror.dispatch(frustum),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_support::{camera, camera_frustum, mixed_scene, MIXED_VISIBLE};
    use crate::shadows::FitMode;
    use crate::CullError;

    fn frames(config: &CullingConfig) -> FrameVisibility {
        crate::foundation::logging::init_for_tests();
        let mut frames = FrameVisibility::new(mixed_scene(), config);
        let (view, proj) = camera();
        frames.set_camera(view, proj);
        frames.set_light_direction(Vec3::new(0.3, -1.0, 0.2));
        frames
    }

    #[test]
    fn test_first_prepare_builds_every_frustum() {
        let mut frames = frames(&CullingConfig::default());
        let sets = frames.prepare_frame(FrameSlot(0)).unwrap();

        assert_eq!(sets.num_cascades(), 3);
        assert_eq!(sets.main().visible_instances(), MIXED_VISIBLE.to_vec());
        assert!(frames.dirty(FrameSlot(0)).is_empty());
        assert_eq!(frames.cascades().len(), 3);
    }

    #[test]
    fn test_unchanged_inputs_return_cached_lists() {
        let mut frames = frames(&CullingConfig::default());
        let first = frames.prepare_frame(FrameSlot(0)).unwrap().clone();

        let (view, proj) = camera();
        frames.set_camera(view, proj);
        assert!(frames.dirty(FrameSlot(0)).is_empty());

        let second = frames.prepare_frame(FrameSlot(0)).unwrap();
        assert_eq!(&first, second);
    }

    #[test]
    fn test_light_change_keeps_main_list() {
        let mut frames = frames(&CullingConfig::default());
        let before = frames.prepare_frame(FrameSlot(0)).unwrap().main().clone();

        frames.set_light_direction(Vec3::new(-0.5, -1.0, 0.0));
        assert_eq!(frames.dirty(FrameSlot(0)), DirtyInputs::LIGHT);

        let after = frames.prepare_frame(FrameSlot(0)).unwrap();
        assert_eq!(after.main(), &before);
    }

    #[test]
    fn test_slots_are_independent() {
        let mut frames = frames(&CullingConfig::default());
        frames.prepare_frame(FrameSlot(0)).unwrap();
        assert_eq!(frames.dirty(FrameSlot(1)), DirtyInputs::all());

        // Look away from everything: slot 1 is rebuilt, slot 0 keeps its lists
        let (_, proj) = camera();
        let away = Mat4::look_at_rh(
            &crate::foundation::math::Point3::origin(),
            &crate::foundation::math::Point3::new(0.0, 1.0, 0.0),
            &Vec3::z(),
        );
        frames.set_camera(away, proj);
        assert!(frames.dirty(FrameSlot(0)).contains(DirtyInputs::CAMERA));

        let slot1 = frames.prepare_frame(FrameSlot(1)).unwrap().main().clone();
        assert!(slot1.is_empty());
        assert!(frames.dirty(FrameSlot(0)).contains(DirtyInputs::CAMERA));

        let slot0 = frames.prepare_frame(FrameSlot(0)).unwrap();
        assert!(slot0.main().is_empty());
    }

    #[test]
    fn test_failed_prepare_leaves_slot_stale() {
        let mut frames = frames(&CullingConfig::default());
        let good = frames.prepare_frame(FrameSlot(0)).unwrap().clone();

        let (view, proj) = camera();
        frames.set_camera(view, Mat4::zeros());
        let result = frames.prepare_frame(FrameSlot(0));
        assert!(matches!(result, Err(CullError::SingularCameraMatrix)));
        assert!(frames.dirty(FrameSlot(0)).contains(DirtyInputs::CAMERA));

        frames.set_camera(view, proj);
        let recovered = frames.prepare_frame(FrameSlot(0)).unwrap();
        assert_eq!(recovered.main(), good.main());
    }

    #[test]
    fn test_cascade_config_change_resizes_lists() {
        let mut frames = frames(&CullingConfig::default());
        frames.prepare_frame(FrameSlot(0)).unwrap();

        frames.set_cascade_config(
            CascadeConfig::default()
                .with_cascade_end(&[0.25, 1.0])
                .with_fit_mode(FitMode::FitScene),
        );
        assert_eq!(frames.dirty(FrameSlot(0)), DirtyInputs::CASCADE_CONFIG);

        let sets = frames.prepare_frame(FrameSlot(0)).unwrap();
        assert_eq!(sets.num_cascades(), 2);
        assert!(sets.get(FrustumId::Cascade(2)).is_none());
    }

    #[test]
    fn test_gpu_backend_matches_cpu_backend() {
        let mut cpu = frames(&CullingConfig::default());
        let mut gpu = frames(&CullingConfig::default().with_gpu_culling(true));

        let cpu_sets = cpu.prepare_frame(FrameSlot(1)).unwrap().clone();
        let gpu_sets = gpu.prepare_frame(FrameSlot(1)).unwrap();

        for ((id, expected), (_, actual)) in cpu_sets.iter().zip(gpu_sets.iter()) {
            assert_eq!(actual.visible_instances(), expected.visible_instances(), "{:?}", id);
            assert_eq!(actual.draw_count, expected.draw_count, "{:?}", id);
        }
        assert_eq!(gpu_sets.main().visible_instances(), camera_frustum_visible());
    }

    fn camera_frustum_visible() -> Vec<u32> {
        let scene = mixed_scene();
        VisibilityDrawBuilder::new(&scene)
            .build_set(&scene, &camera_frustum())
            .visible_instances()
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_prepare_rejects_bad_slot() {
        let mut frames = frames(&CullingConfig::default());
        let _ = frames.prepare_frame(FrameSlot(2));
    }

    #[test]
    fn test_auto_splits_build_any_cascade_count() {
        for n in [1, 2, 4] {
            let config = CullingConfig::default().with_cascades(CascadeConfig::default().with_num_cascades(n));
            let mut frames = frames(&config);
            let sets = frames.prepare_frame(FrameSlot(0)).unwrap();

            assert_eq!(sets.num_cascades(), n);
            assert_eq!(sets.main().visible_instances(), MIXED_VISIBLE.to_vec());
            assert_eq!(frames.cascade_config().active_ends().len(), n);
            assert_eq!(frames.cascades().len(), n);
        }
    }

    #[test]
    fn test_same_cascade_config_is_not_a_change() {
        let mut frames = frames(&CullingConfig::default());
        frames.prepare_frame(FrameSlot(0)).unwrap();

        frames.set_cascade_config(CascadeConfig::default());
        assert!(frames.dirty(FrameSlot(0)).is_empty());
    }
}
