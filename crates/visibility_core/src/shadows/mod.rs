//! Cascaded shadow map fitting
//!
//! [`CascadeCalculator`] turns the camera, light direction and scene bounds
//! into per-cascade light matrices; each cascade's view-projection then
//! becomes an extra culling frustum for the draw builders.

mod cascade;
mod near_far;

pub use cascade::{
    Cascade, CascadeCalculator, CascadeConfig, FitMode, NearFarFitMode, MAX_CASCADES,
};
pub use near_far::{calc_near_far, NearFar, CLIP_TRIANGLE_CAPACITY};
