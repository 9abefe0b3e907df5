//! Vulkan recording of the culling sequence
//!
//! Pipelines, descriptor sets and buffers are created by the renderer; this
//! module only records [`CULL_SEQUENCE`] into a command buffer it is handed.

use ash::vk;

use crate::render::gpu_cull::{workgroup_count, CullStep, CullUniforms, GpuCounters, CULL_SEQUENCE};

/// Compute pipelines and bindings of the culling passes
#[derive(Debug, Clone, Copy)]
pub struct CullPipelines {
    /// Layout shared by both pipelines; push constant range is [`CullUniforms`]
    pub layout: vk::PipelineLayout,
    /// Kernel (a)
    pub visibility: vk::Pipeline,
    /// Kernel (b)
    pub compaction: vk::Pipeline,
    /// Scene and output buffers of the frame slot being culled
    pub descriptor_set: vk::DescriptorSet,
}

/// Counter buffers cleared at the start of the sequence
#[derive(Debug, Clone, Copy)]
pub struct CullCounterBuffers {
    /// One `u32` per meshgroup
    pub group_counters: vk::Buffer,
    /// Size of `group_counters` in bytes
    pub group_counters_size: vk::DeviceSize,
    /// A single [`GpuCounters`]; also the indirect count buffer
    pub draw_counters: vk::Buffer,
}

impl CullCounterBuffers {
    /// Byte offset of the opaque draw count inside `draw_counters`
    pub const OPAQUE_COUNT_OFFSET: vk::DeviceSize = 4;
    /// Byte offset of the transparent draw count inside `draw_counters`
    pub const TRANSPARENT_COUNT_OFFSET: vk::DeviceSize = 8;
}

/// Workgroups dispatched by each kernel for `uniforms`
pub fn dispatch_sizes(uniforms: &CullUniforms) -> (u32, u32) {
    (
        workgroup_count(uniforms.instance_count),
        workgroup_count(uniforms.meshgroup_count),
    )
}

/// Record counter reset, both dispatches and the three barriers
///
/// # Safety
/// `command_buffer` must be recording outside a render pass, and every
/// handle must belong to `device` and outlive the submission.
pub unsafe fn record_cull(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    pipelines: &CullPipelines,
    counters: &CullCounterBuffers,
    uniforms: &CullUniforms,
) {
    let (visibility_groups, compaction_groups) = dispatch_sizes(uniforms);

    for step in CULL_SEQUENCE {
        match step {
            CullStep::ResetCounters => {
                device.cmd_fill_buffer(command_buffer, counters.group_counters, 0, counters.group_counters_size, 0);
                device.cmd_fill_buffer(
                    command_buffer,
                    counters.draw_counters,
                    0,
                    std::mem::size_of::<GpuCounters>() as vk::DeviceSize,
                    0,
                );
            }
            CullStep::Barrier(barrier) => barrier.record(device, command_buffer),
            CullStep::DispatchVisibility => {
                bind_compute(device, command_buffer, pipelines, pipelines.visibility, uniforms);
                device.cmd_dispatch(command_buffer, visibility_groups, 1, 1);
            }
            CullStep::DispatchCompaction => {
                bind_compute(device, command_buffer, pipelines, pipelines.compaction, uniforms);
                device.cmd_dispatch(command_buffer, compaction_groups, 1, 1);
            }
        }
    }

    log::trace!(
        "Recorded cull: {} visibility + {} compaction workgroups",
        visibility_groups,
        compaction_groups
    );
}

unsafe fn bind_compute(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    pipelines: &CullPipelines,
    pipeline: vk::Pipeline,
    uniforms: &CullUniforms,
) {
    device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::COMPUTE, pipeline);
    device.cmd_bind_descriptor_sets(
        command_buffer,
        vk::PipelineBindPoint::COMPUTE,
        pipelines.layout,
        0,
        std::slice::from_ref(&pipelines.descriptor_set),
        &[],
    );
    device.cmd_push_constants(
        command_buffer,
        pipelines.layout,
        vk::ShaderStageFlags::COMPUTE,
        0,
        bytemuck::bytes_of(uniforms),
    );
}

/// Push constant range matching [`CullUniforms`]
pub fn push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange::builder()
        .stage_flags(vk::ShaderStageFlags::COMPUTE)
        .offset(0)
        .size(std::mem::size_of::<CullUniforms>() as u32)
        .build()
}
