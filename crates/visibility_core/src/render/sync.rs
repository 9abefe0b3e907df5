//! Memory barriers between the culling passes
//!
//! The GPU culling path has three hazards, all read-after-write on buffers:
//!
//! ```text
//! fill counters ──► visibility dispatch ──► compaction dispatch ──► indirect draws
//!           (transfer→compute)     (compute→compute)       (compute→indirect/vertex)
//! ```
//!
//! Global memory barriers are enough because every buffer involved is
//! owned by the one queue that records the whole sequence.

use ash::vk;

/// Memory barrier builder for the culling sequence
pub struct MemoryBarrierBuilder;

impl MemoryBarrierBuilder {
    /// Transfer write → Compute read/write barrier (after the counter reset)
    ///
    /// The visibility pass both reads and atomically increments the cleared
    /// counters.
    pub fn buffer_transfer_to_compute() -> vk::MemoryBarrier {
        vk::MemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE)
            .build()
    }

    /// Compute write → Compute read/write barrier (between the two dispatches)
    ///
    /// Compaction reads the visibility buffer and per-meshgroup counts and
    /// bumps the global cursors.
    pub fn buffer_compute_to_compute() -> vk::MemoryBarrier {
        vk::MemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::SHADER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE)
            .build()
    }

    /// Compute write → Indirect command + vertex shader read barrier
    ///
    /// Draw commands and draw counts are consumed by the indirect draw; the
    /// attribute-index list and drawn meshgroup records by the vertex stage.
    pub fn buffer_compute_to_indirect_read() -> vk::MemoryBarrier {
        vk::MemoryBarrier::builder()
            .src_access_mask(vk::AccessFlags::SHADER_WRITE)
            .dst_access_mask(vk::AccessFlags::INDIRECT_COMMAND_READ | vk::AccessFlags::SHADER_READ)
            .build()
    }
}

/// The three barrier points of the culling sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullBarrier {
    /// After the counter reset, before visibility
    CountersCleared,
    /// After visibility, before compaction
    VisibilityWritten,
    /// After compaction, before draws consume the lists
    DrawListsWritten,
}

impl CullBarrier {
    /// Stage that produced the data
    pub fn src_stage(self) -> vk::PipelineStageFlags {
        match self {
            Self::CountersCleared => vk::PipelineStageFlags::TRANSFER,
            Self::VisibilityWritten | Self::DrawListsWritten => vk::PipelineStageFlags::COMPUTE_SHADER,
        }
    }

    /// Stages that consume the data
    pub fn dst_stage(self) -> vk::PipelineStageFlags {
        match self {
            Self::CountersCleared | Self::VisibilityWritten => vk::PipelineStageFlags::COMPUTE_SHADER,
            Self::DrawListsWritten => {
                vk::PipelineStageFlags::DRAW_INDIRECT | vk::PipelineStageFlags::VERTEX_SHADER
            }
        }
    }

    /// Access masks for this point
    pub fn memory_barrier(self) -> vk::MemoryBarrier {
        match self {
            Self::CountersCleared => MemoryBarrierBuilder::buffer_transfer_to_compute(),
            Self::VisibilityWritten => MemoryBarrierBuilder::buffer_compute_to_compute(),
            Self::DrawListsWritten => MemoryBarrierBuilder::buffer_compute_to_indirect_read(),
        }
    }

    /// Record the barrier into `command_buffer`
    ///
    /// # Safety
    /// `command_buffer` must be in the recording state and belong to `device`.
    pub unsafe fn record(self, device: &ash::Device, command_buffer: vk::CommandBuffer) {
        let barrier = self.memory_barrier();
        device.cmd_pipeline_barrier(
            command_buffer,
            self.src_stage(),
            self.dst_stage(),
            vk::DependencyFlags::empty(),
            std::slice::from_ref(&barrier),
            &[],
            &[],
        );
    }
}
