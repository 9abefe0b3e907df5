//! # Visibility Core
//!
//! Visibility and draw-submission core for a multi-frame-in-flight Vulkan
//! renderer.
//!
//! ## Features
//!
//! - **Frustum Culling**: Plane extraction from view-projection matrices and
//!   conservative AABB classification
//! - **Cascaded Shadow Maps**: Practical split scheme, light-space fitting,
//!   texel snapping and tight near/far clipping
//! - **Indirect Draw Compaction**: Per-frustum draw command lists with
//!   opaque commands ahead of transparent ones
//! - **GPU Mirror**: Compute kernels that produce the same visible set, plus
//!   Vulkan command recording for the two dispatches
//! - **Frame Slots**: Independent per-frame-in-flight buffers, rebuilt only
//!   when their inputs change
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use visibility_core::prelude::*;
//!
//! let mut builder = SceneGeometryBuilder::new();
//! let crate_mesh = builder.add_meshgroup(MeshgroupDesc {
//!     bounds: BoundingBox::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0)),
//!     first_index: 0,
//!     index_count: 36,
//!     vertex_offset: 0,
//!     material: 0,
//!     transparency: Transparency::Opaque,
//! });
//! builder.add_instance(crate_mesh, Mat4::new_translation(&Vec3::new(0.0, 0.0, -5.0)));
//! let scene = builder.build();
//!
//! let config = CullingConfig::default();
//! let mut frames = FrameVisibility::new(scene, &config);
//! frames.set_camera(
//!     Mat4::look_at_rh(&Point3::new(0.0, 2.0, 5.0), &Point3::origin(), &Vec3::y()),
//!     Mat4::new_perspective(16.0 / 9.0, 1.0, 0.1, 100.0),
//! );
//! frames.set_light_direction(Vec3::new(-0.3, -1.0, -0.2));
//!
//! let sets = frames.prepare_frame(FrameSlot(0))?;
//! println!("main camera draws {} commands", sets.main().draw_commands.len());
//! # Ok::<(), visibility_core::CullError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod core;

pub mod foundation;
pub mod config;
pub mod scene;
pub mod shadows;
pub mod render;

mod error;

pub use error::{CullError, CullResult};

/// Common imports for renderer integration
pub mod prelude {
    pub use crate::{
        CullError, CullResult,
        foundation::math::{Vec3, Vec4, Mat4, Point3},
        scene::{
            BoundingBox, Frustum, Plane, Classification,
            SceneGeometry, SceneGeometryBuilder, MeshgroupDesc, MeshgroupId, Transparency,
        },
        shadows::{Cascade, CascadeCalculator, CascadeConfig, FitMode, NearFarFitMode},
        render::{
            DrawnSet, DrawCounts, FrameSlot, FrustumId, FrameVisibility,
            VisibilityDrawBuilder, GpuCullMirror,
        },
        core::config::CullingConfig,
        config::Config,
    };
}
