//! # Cascaded Shadow Map Fitting
//!
//! Splits the camera depth range into up to [`MAX_CASCADES`] slices and fits
//! an orthographic light-space projection around each one.
//!
//! ## Pipeline
//!
//! ```text
//! light direction ──► light view (shared by every cascade)
//!                         │
//! camera VP ─► frustum corners ─► slice [begin, end] ─► light-space box
//!                                                          │
//!                             restrict to scene / texel snap / near-far fit
//!                                                          │
//!                                                 orthographic projection
//! ```
//!
//! Split positions use the practical split scheme, a 3:1 blend of the
//! logarithmic and uniform distributions.

use serde::{Serialize, Deserialize};

use crate::foundation::math::{Vec3, Vec4, Mat4, Mat4Ext, Point3};
use crate::foundation::math::utils::{lerp_vec3, project_vec4};
use crate::scene::{BoundingBox, Frustum};
use crate::shadows::near_far::{calc_near_far, NearFar};
use crate::{CullError, CullResult};

/// Maximum number of shadow cascades
pub const MAX_CASCADES: usize = 4;

/// Blend weight of the logarithmic split distribution
const SPLIT_LAMBDA: f32 = 0.75;

/// Light directions closer than this to the world up axis switch the up vector
const UP_PARALLEL_THRESHOLD: f32 = 0.999;

/// Smallest depth range handed to the orthographic projection
const MIN_DEPTH_RANGE: f32 = 1e-3;

/// How each cascade's camera slice begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FitMode {
    /// Cascade `i` covers `[end[i-1], end[i]]`
    #[default]
    FitCascade,
    /// Every cascade covers `[0, end[i]]`
    FitScene,
}

/// How each cascade's depth range is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NearFarFitMode {
    /// Depth range of the camera slice only
    FrustumOnly,
    /// Depth range of scene geometry clipped to the cascade footprint
    #[default]
    IntersectScene,
}

/// Cascade layout and fitting options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Active cascades, `1..=MAX_CASCADES`
    pub num_cascades: usize,
    /// Fractional camera-depth split ends; the first `num_cascades` are used
    pub cascade_end: [f32; MAX_CASCADES],
    /// Slice begin policy
    pub fit_mode: FitMode,
    /// Depth range policy
    pub near_far_fit_mode: NearFarFitMode,
    /// Quantize cascade bounds to shadow map texels (only under [`FitMode::FitCascade`])
    pub texel_snapping: bool,
    /// Intersect each cascade with the light-space scene bounds
    pub restrict_to_scene: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            num_cascades: 3,
            cascade_end: [0.1, 0.3, 1.0, 1.0],
            fit_mode: FitMode::default(),
            near_far_fit_mode: NearFarFitMode::default(),
            texel_snapping: true,
            restrict_to_scene: true,
        }
    }
}

impl CascadeConfig {
    /// Set explicit split ends, which also sets the cascade count
    pub fn with_cascade_end(mut self, ends: &[f32]) -> Self {
        self.num_cascades = ends.len();
        for (slot, end) in self.cascade_end.iter_mut().zip(ends) {
            *slot = *end;
        }
        self
    }

    /// Set the cascade count, leaving split ends to be computed
    pub fn with_num_cascades(mut self, num_cascades: usize) -> Self {
        self.num_cascades = num_cascades;
        self
    }

    /// Set the slice begin policy
    pub fn with_fit_mode(mut self, fit_mode: FitMode) -> Self {
        self.fit_mode = fit_mode;
        self
    }

    /// Set the depth range policy
    pub fn with_near_far_fit_mode(mut self, mode: NearFarFitMode) -> Self {
        self.near_far_fit_mode = mode;
        self
    }

    /// Enable or disable texel snapping
    pub fn with_texel_snapping(mut self, enabled: bool) -> Self {
        self.texel_snapping = enabled;
        self
    }

    /// Enable or disable clipping cascades to the scene
    pub fn with_restrict_to_scene(mut self, enabled: bool) -> Self {
        self.restrict_to_scene = enabled;
        self
    }

    /// Split ends of the active cascades
    pub fn active_ends(&self) -> &[f32] {
        &self.cascade_end[..self.num_cascades.min(MAX_CASCADES)]
    }

    /// Check only the cascade count, for layouts whose ends get computed
    pub fn validate_count(&self) -> Result<(), String> {
        if self.num_cascades == 0 || self.num_cascades > MAX_CASCADES {
            return Err(format!(
                "num_cascades must be in 1..={}, got {}",
                MAX_CASCADES, self.num_cascades
            ));
        }
        Ok(())
    }

    /// Check the layout for settings read from disk
    pub fn validate(&self) -> Result<(), String> {
        self.validate_count()?;

        let ends = self.active_ends();
        if ends[0] <= 0.0 {
            return Err(format!("cascade_end[0] must be positive, got {}", ends[0]));
        }
        for (i, pair) in ends.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(format!(
                    "cascade_end must be strictly increasing ({} at {} followed by {})",
                    pair[0], i, pair[1]
                ));
            }
        }

        let last = ends[ends.len() - 1];
        if last != 1.0 {
            return Err(format!("last cascade_end must be 1.0, got {}", last));
        }

        Ok(())
    }
}

/// Light-space matrices for one cascade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cascade {
    /// Light view, shared by every cascade of a frame
    pub view: Mat4,
    /// Orthographic projection fitted to the cascade
    pub projection: Mat4,
    /// `projection * view`
    pub view_projection: Mat4,
    /// Camera clip-space Z (before division) at the cascade's far split
    pub depth_bound: f32,
    /// True when the fitted box was empty; nothing can be drawn into it
    pub empty: bool,
}

impl Cascade {
    /// Culling frustum of this cascade
    pub fn frustum(&self) -> Frustum {
        Frustum::from_matrix(&self.view_projection)
    }
}

/// Computes per-cascade light matrices from the camera and light
#[derive(Debug, Clone)]
pub struct CascadeCalculator {
    config: CascadeConfig,
    scene_bounds: BoundingBox,
    camera_near: f32,
    camera_far: f32,
    texture_size: u32,
    cascades: Vec<Cascade>,
}

impl CascadeCalculator {
    /// Create a calculator with the given layout
    ///
    /// Split ends are checked by [`CascadeCalculator::init`], after they have
    /// had the chance to be computed.
    ///
    /// # Panics
    /// Panics when `config` fails [`CascadeConfig::validate_count`].
    pub fn new(config: CascadeConfig) -> Self {
        assert_valid_count(&config);
        Self {
            config,
            scene_bounds: BoundingBox::empty(),
            camera_near: 0.1,
            camera_far: 100.0,
            texture_size: 2048,
            cascades: Vec::with_capacity(MAX_CASCADES),
        }
    }

    /// Store the scene and camera inputs, optionally recomputing split ends
    ///
    /// # Panics
    /// Panics when `num_cascades` is outside `1..=MAX_CASCADES`, when the
    /// camera range is not `0 < near < far`, when `texture_size` is zero, or
    /// when the resulting split ends fail [`CascadeConfig::validate`].
    pub fn init(
        &mut self,
        scene_bounds: BoundingBox,
        camera_near: f32,
        camera_far: f32,
        texture_size: u32,
        num_cascades: usize,
        auto_calc_splits: bool,
    ) {
        assert!(
            (1..=MAX_CASCADES).contains(&num_cascades),
            "cascade count {} outside 1..={}",
            num_cascades,
            MAX_CASCADES
        );
        assert!(camera_near > 0.0 && camera_far > camera_near, "camera range must satisfy 0 < near < far");
        assert!(texture_size > 0, "shadow map size must be non-zero");

        self.scene_bounds = scene_bounds;
        self.camera_near = camera_near;
        self.camera_far = camera_far;
        self.texture_size = texture_size;
        self.config.num_cascades = num_cascades;

        if auto_calc_splits {
            self.compute_splits();
        }
        assert_valid(&self.config);

        log::debug!(
            "Cascades: {} over {}..{} at {}px, ends {:?}",
            num_cascades,
            camera_near,
            camera_far,
            texture_size,
            self.config.active_ends()
        );
    }

    /// Recompute split ends with the practical split scheme
    pub fn compute_splits(&mut self) {
        let n = self.config.num_cascades;
        let near = self.camera_near;
        let far = self.camera_far;
        let ratio = far / near;

        for i in 1..n {
            let fraction = i as f32 / n as f32;
            let log_split = near * ratio.powf(fraction);
            let uniform_split = near + fraction * (far - near);
            let z = SPLIT_LAMBDA * log_split + (1.0 - SPLIT_LAMBDA) * uniform_split;
            self.config.cascade_end[i - 1] = (z - near) / (far - near);
        }
        self.config.cascade_end[n - 1] = 1.0;
    }

    /// Replace the layout, keeping scene and camera inputs
    ///
    /// With `auto_calc_splits` the split ends of `config` are replaced by
    /// [`CascadeCalculator::compute_splits`] for its cascade count.
    ///
    /// # Panics
    /// Panics when the resulting layout fails [`CascadeConfig::validate`].
    pub fn set_config(&mut self, config: CascadeConfig, auto_calc_splits: bool) {
        assert_valid_count(&config);
        self.config = config;
        if auto_calc_splits {
            self.compute_splits();
        }
        assert_valid(&self.config);
    }

    /// Replace the scene bounds
    pub fn set_scene_bounds(&mut self, scene_bounds: BoundingBox) {
        self.scene_bounds = scene_bounds;
    }

    /// Current layout
    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Cascades produced by the last [`CascadeCalculator::calc`]
    pub fn cascades(&self) -> &[Cascade] {
        &self.cascades
    }

    /// Fit every active cascade to the camera and light
    ///
    /// `extra_point` widens the scene bounds, for casters outside the static
    /// scene such as the player.
    ///
    /// # Errors
    /// [`CullError::SingularCameraMatrix`] when the camera VP cannot be
    /// inverted, or [`CullError::ClipCapacityExceeded`] from near/far fitting.
    pub fn calc(
        &mut self,
        light_dir: &Vec3,
        camera_view: &Mat4,
        camera_projection: &Mat4,
        extra_point: Option<&Vec3>,
    ) -> CullResult<&[Cascade]> {
        let light_view = light_view_matrix(light_dir);

        let mut scene_bounds = self.scene_bounds;
        if let Some(point) = extra_point {
            scene_bounds.combine_with(*point);
        }
        // An empty scene has no corners worth transforming
        let scene_points = (!scene_bounds.is_empty()).then(|| scene_bounds.transformed_points_v4(&light_view));
        let light_scene_bounds = match &scene_points {
            Some(points) => BoundingBox::from_points(&points.map(|p| p.xyz())),
            None => {
                log::trace!("Scene bounds are empty, every cascade is empty");
                BoundingBox::empty()
            }
        };

        let corners = camera_frustum_corners(&(camera_projection * camera_view))?;

        let mut cascades = Vec::with_capacity(self.config.num_cascades);
        let mut begin = 0.0;
        for &end in self.config.active_ends() {
            let slice_begin = match self.config.fit_mode {
                FitMode::FitCascade => begin,
                FitMode::FitScene => 0.0,
            };
            let slice = frustum_slice(&corners, slice_begin, end);
            let light_slice = slice.map(|p| light_view.transform_point(&Point3::from(p)).coords);
            let mut bounds = BoundingBox::from_points(&light_slice);

            if self.config.restrict_to_scene {
                bounds.intersect_with(&light_scene_bounds);
            }
            let empty = scene_points.is_none() || bounds.is_empty();
            if empty {
                log::trace!("Cascade ending at {} does not overlap the scene", end);
                bounds = BoundingBox::from_points(&light_slice);
            }

            if self.config.texel_snapping && self.config.fit_mode == FitMode::FitCascade {
                snap_to_texels(&mut bounds, &slice, self.texture_size);
            }

            let depth = self.fit_depth(&bounds, scene_points.as_ref())?;
            let projection = Mat4::orthographic(
                bounds.min.x,
                bounds.max.x,
                bounds.min.y,
                bounds.max.y,
                depth.near,
                depth.far,
            );

            let split_depth = self.camera_near + end * (self.camera_far - self.camera_near);
            let depth_bound = (camera_projection * Vec4::new(0.0, 0.0, -split_depth, 1.0)).z;

            cascades.push(Cascade {
                view: light_view,
                projection,
                view_projection: projection * light_view,
                depth_bound,
                empty,
            });
            begin = end;
        }

        self.cascades = cascades;
        Ok(&self.cascades)
    }

    fn fit_depth(&self, bounds: &BoundingBox, scene_points: Option<&[Vec4; 8]>) -> CullResult<NearFar> {
        let box_range = NearFar {
            near: -bounds.max.z,
            far: -bounds.min.z,
        };

        let mut range = match (self.config.near_far_fit_mode, scene_points) {
            (NearFarFitMode::FrustumOnly, _) | (_, None) => box_range,
            (NearFarFitMode::IntersectScene, Some(scene_points)) => {
                let clipped = calc_near_far(&bounds.min, &bounds.max, scene_points)?;
                if clipped.is_unset() {
                    log::debug!("No scene geometry inside cascade footprint, using its own depth range");
                    box_range
                } else {
                    clipped
                }
            }
        };

        if range.far - range.near < MIN_DEPTH_RANGE {
            let center = (range.near + range.far) * 0.5;
            range.near = center - MIN_DEPTH_RANGE * 0.5;
            range.far = center + MIN_DEPTH_RANGE * 0.5;
        }
        Ok(range)
    }
}

fn assert_valid(config: &CascadeConfig) {
    if let Err(message) = config.validate() {
        panic!("invalid cascade layout: {}", message);
    }
}

fn assert_valid_count(config: &CascadeConfig) {
    if let Err(message) = config.validate_count() {
        panic!("invalid cascade layout: {}", message);
    }
}

/// Origin-centred light view looking along `light_dir`
fn light_view_matrix(light_dir: &Vec3) -> Mat4 {
    let direction = light_dir.normalize();
    let up = if Vec3::y().dot(&direction).abs() > UP_PARALLEL_THRESHOLD {
        Vec3::new(0.0, 0.0, -1.0)
    } else {
        Vec3::y()
    };
    Mat4::look_along(&direction, &up)
}

/// World-space camera frustum corners in binary order, near face first
fn camera_frustum_corners(view_projection: &Mat4) -> CullResult<[Vec3; 8]> {
    let inverse = view_projection
        .try_inverse()
        .ok_or(CullError::SingularCameraMatrix)?;

    Ok(std::array::from_fn(|i| {
        let ndc = Vec4::new(
            if i & 1 != 0 { 1.0 } else { -1.0 },
            if i & 2 != 0 { 1.0 } else { -1.0 },
            if i & 4 != 0 { 1.0 } else { -1.0 },
            1.0,
        );
        project_vec4(&(inverse * ndc))
    }))
}

/// Sub-frustum between fractional depths `begin` and `end`
fn frustum_slice(corners: &[Vec3; 8], begin: f32, end: f32) -> [Vec3; 8] {
    std::array::from_fn(|i| {
        let near = &corners[i & 3];
        let far = &corners[(i & 3) + 4];
        let t = if i < 4 { begin } else { end };
        lerp_vec3(near, far, t)
    })
}

/// Pad XY to the slice diagonal and align it to whole texels
///
/// The footprint is one texel wider than the diagonal so flooring `min` onto
/// the grid never pulls `max` back inside the original bounds.
fn snap_to_texels(bounds: &mut BoundingBox, slice: &[Vec3; 8], texture_size: u32) {
    let diagonal = (slice[0] - slice[7]).norm().max((slice[4] - slice[7]).norm());
    let texel = diagonal / texture_size.saturating_sub(1).max(1) as f32;
    if texel <= 0.0 {
        return;
    }

    for axis in 0..2 {
        let padding = (diagonal - (bounds.max[axis] - bounds.min[axis])).max(0.0) * 0.5;
        let min = bounds.min[axis] - padding;
        bounds.min[axis] = (min / texel).floor() * texel;
        bounds.max[axis] = bounds.min[axis] + texel * texture_size as f32;
    }
}
