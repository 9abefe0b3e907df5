//! Scene data consumed by culling
//!
//! Provides the bounding volume and frustum primitives plus the static
//! meshgroup/instance layout built once at scene load.
//!
//! ## Architecture
//!
//! ```text
//! Scene import (external)
//!      ↓
//! SceneGeometryBuilder (load time)
//!      ↓
//! SceneGeometry (read-only, opaque groups first)
//!      ↓
//! VisibilityDrawBuilder / GpuCullMirror (per frame, per frustum)
//! ```

mod bounding_box;
mod frustum;
mod meshgroup;

pub use bounding_box::BoundingBox;
pub use frustum::{Frustum, Plane, Classification, plane_index};
pub use meshgroup::{
    Meshgroup, MeshgroupDesc, MeshgroupId, Instance, Transparency,
    SceneGeometry, SceneGeometryBuilder,
};
