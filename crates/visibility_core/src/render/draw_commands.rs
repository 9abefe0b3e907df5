//! GPU-layout draw records
//!
//! These are written by the CPU builder and by the compute mirror alike and
//! are uploaded as-is, so their layout must match the shader side.

use bytemuck::{Pod, Zeroable};

/// `VkDrawIndexedIndirectCommand`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct IndirectDrawCommand {
    /// Indices per instance
    pub index_count: u32,
    /// Visible instances of the meshgroup
    pub instance_count: u32,
    /// First index in the shared index buffer
    pub first_index: u32,
    /// Added to each index before fetching a vertex
    pub vertex_offset: i32,
    /// Offset of the meshgroup's first entry in the attribute-index list
    pub first_instance: u32,
}

impl IndirectDrawCommand {
    /// Size in bytes, the stride passed to `vkCmdDrawIndexedIndirect`
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;
}

/// Per-draw record the vertex stage reads through the draw id
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct DrawnMeshgroup {
    /// Meshgroup index in the scene geometry
    pub meshgroup: u32,
    /// Material slot
    pub material: u32,
    /// Offset of the first instance id in the attribute-index list
    pub attribute_offset: u32,
    /// Number of instance ids that follow
    pub instance_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indirect_command_matches_vulkan_layout() {
        assert_eq!(IndirectDrawCommand::STRIDE, 20);
        assert_eq!(std::mem::align_of::<IndirectDrawCommand>(), 4);

        let command = IndirectDrawCommand {
            index_count: 36,
            instance_count: 2,
            first_index: 72,
            vertex_offset: -4,
            first_instance: 9,
        };
        let words: &[u32] = bytemuck::cast_slice(std::slice::from_ref(&command));
        assert_eq!(words, &[36, 2, 72, (-4i32) as u32, 9]);
    }

    #[test]
    fn test_drawn_meshgroup_is_four_words() {
        assert_eq!(std::mem::size_of::<DrawnMeshgroup>(), 16);
    }
}
