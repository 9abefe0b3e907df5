//! # Draw Submission
//!
//! Turns scene geometry and frusta into compact indirect draw lists.
//!
//! ## Architecture
//!
//! ```text
//! FrameVisibility ── per frame slot ──┐
//!    │                                │
//!    ├─ CascadeCalculator (shadows)   │
//!    │                                ▼
//!    └─ VisibilityDrawBuilder (CPU) or GpuCullMirror (compute)
//!                                     │
//!                                     ▼
//!                  FrameDrawnSets: main + one DrawnSet per cascade
//! ```
//!
//! The compute path is also recorded for Vulkan by [`gpu_record`], using the
//! barriers in [`sync`].

mod draw_commands;
mod drawn_set;
mod frame_visibility;
pub mod gpu_cull;
pub mod gpu_record;
pub mod sync;
mod visibility;

#[cfg(test)]
mod test_support;

pub use draw_commands::{DrawnMeshgroup, IndirectDrawCommand};
pub use drawn_set::{DrawCounts, DrawnSet, FrameDrawnSets, FrameSlot, FramesInFlight, FrustumId};
pub use frame_visibility::{DirtyInputs, FrameVisibility};
pub use gpu_cull::{GpuCullMirror, InvocationOrder};
pub use visibility::VisibilityDrawBuilder;
