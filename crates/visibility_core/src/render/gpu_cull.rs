//! # GPU Culling Mirror
//!
//! Two compute kernels that produce the same visible set as
//! [`VisibilityDrawBuilder`](crate::render::VisibilityDrawBuilder), written
//! over the exact buffer records the shaders bind.
//!
//! ## Passes
//!
//! ```text
//! (a) visibility, one invocation per instance
//!     world box vs 6 planes ─► visibility[i] ─► group_counters[mg] += 1
//!
//! (b) compaction, one invocation per meshgroup
//!     count = group_counters[mg]
//!     base  = attribute_cursor += count     (reserve a contiguous range)
//!     stream visible ids into attribute_indices[base..base + count]
//!     slot  = opaque_draws++                       (opaque)
//!           | opaque_meshgroup_count + transparent_draws++  (transparent)
//! ```
//!
//! Slot allocation order depends on scheduling, so the GPU lists may be
//! permuted relative to the CPU ones; the visible *set* is identical.
//! Transparent commands live at a fixed offset equal to the number of opaque
//! meshgroups so both indirect ranges can be drawn with a count buffer
//! without a prefix sum.
//!
//! [`GpuCullMirror`] runs the kernels on the host in [`CULL_SEQUENCE`]
//! order; [`record_cull`](crate::render::gpu_record::record_cull) records
//! the same sequence into a Vulkan command buffer.

use std::sync::atomic::{fence, AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};

use crate::render::draw_commands::{DrawnMeshgroup, IndirectDrawCommand};
use crate::render::drawn_set::{DrawCounts, DrawnSet};
use crate::render::sync::CullBarrier;
use crate::scene::{Frustum, SceneGeometry};
use crate::{CullError, CullResult};

/// Local size of both compute kernels
pub const WORKGROUP_SIZE: u32 = 64;

/// Number of workgroups covering `invocations`
pub fn workgroup_count(invocations: u32) -> u32 {
    (invocations + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE
}

/// Instance record, one per instance id
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuInstance {
    /// Column-major model matrix
    pub model: [[f32; 4]; 4],
    /// Meshgroup index
    pub meshgroup: u32,
    /// std430 padding
    pub _pad: [u32; 3],
}

/// Meshgroup record, one per meshgroup in scene order
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuMeshgroup {
    /// Untransformed bounds minimum
    pub bounds_min: [f32; 3],
    /// First index in the shared index buffer
    pub first_index: u32,
    /// Untransformed bounds maximum
    pub bounds_max: [f32; 3],
    /// Indices per instance
    pub index_count: u32,
    /// Added to each index before fetching a vertex
    pub vertex_offset: i32,
    /// Material slot
    pub material: u32,
    /// Offset of this meshgroup's ids in the group-instance list
    pub instance_offset: u32,
    /// Number of ids that follow
    pub instance_count: u32,
    /// Non-zero for transparent meshgroups
    pub transparent: u32,
    /// std430 padding
    pub _pad: [u32; 3],
}

/// Push constants shared by both kernels
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CullUniforms {
    /// Frustum planes, `(normal, distance)`, left/right/bottom/top/near/far
    pub frustum_planes: [[f32; 4]; 6],
    /// Instances to test
    pub instance_count: u32,
    /// Meshgroups to compact
    pub meshgroup_count: u32,
    /// First transparent command slot
    pub opaque_meshgroup_count: u32,
    /// Entries available in the attribute-index buffer
    pub attribute_capacity: u32,
}

/// Global counters after a dispatch
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct GpuCounters {
    /// Attribute entries reserved by compaction
    pub attribute_cursor: u32,
    /// Opaque command slots taken
    pub opaque_draws: u32,
    /// Transparent command slots taken
    pub transparent_draws: u32,
    /// std430 padding
    pub _pad: u32,
}

/// One step of the culling command sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullStep {
    /// Zero per-meshgroup and global counters
    ResetCounters,
    /// Memory barrier
    Barrier(CullBarrier),
    /// Kernel (a) over every instance
    DispatchVisibility,
    /// Kernel (b) over every meshgroup
    DispatchCompaction,
}

/// Order in which the culling sequence runs
pub const CULL_SEQUENCE: [CullStep; 6] = [
    CullStep::ResetCounters,
    CullStep::Barrier(CullBarrier::CountersCleared),
    CullStep::DispatchVisibility,
    CullStep::Barrier(CullBarrier::VisibilityWritten),
    CullStep::DispatchCompaction,
    CullStep::Barrier(CullBarrier::DrawListsWritten),
];

/// Read-only scene buffers
#[derive(Debug, Clone)]
pub struct GpuSceneBuffers {
    /// Instance records
    pub instances: Vec<GpuInstance>,
    /// Meshgroup records, opaque first
    pub meshgroups: Vec<GpuMeshgroup>,
    /// Instance ids of every meshgroup, concatenated
    pub group_instances: Vec<u32>,
}

impl GpuSceneBuffers {
    /// Pack a scene into buffer records
    pub fn from_scene(scene: &SceneGeometry) -> Self {
        let instances = scene
            .instances()
            .iter()
            .map(|instance| GpuInstance {
                model: instance.model.into(),
                meshgroup: instance.meshgroup.0,
                _pad: [0; 3],
            })
            .collect();

        let mut group_instances = Vec::with_capacity(scene.instances().len());
        let meshgroups = scene
            .meshgroups()
            .iter()
            .map(|group| {
                let instance_offset = group_instances.len() as u32;
                group_instances.extend_from_slice(&group.instances);
                GpuMeshgroup {
                    bounds_min: group.bounds.min.into(),
                    first_index: group.first_index,
                    bounds_max: group.bounds.max.into(),
                    index_count: group.index_count,
                    vertex_offset: group.vertex_offset,
                    material: group.material,
                    instance_offset,
                    instance_count: group.instances.len() as u32,
                    transparent: u32::from(group.is_transparent()),
                    _pad: [0; 3],
                }
            })
            .collect();

        Self {
            instances,
            meshgroups,
            group_instances,
        }
    }
}

/// Buffers written by the kernels
///
/// Shared counters are atomics, matching the shader's `atomicAdd` usage.
#[derive(Debug)]
pub struct GpuCullBuffers {
    /// Per-instance visibility, 0 or 1
    pub visibility: Vec<u32>,
    /// Visible instances per meshgroup
    pub group_counters: Vec<AtomicU32>,
    /// Next free attribute entry
    pub attribute_cursor: AtomicU32,
    /// Next opaque command slot
    pub opaque_draws: AtomicU32,
    /// Next transparent command slot, relative to the transparent offset
    pub transparent_draws: AtomicU32,
    /// Compacted instance ids
    pub attribute_indices: Vec<u32>,
    /// One slot per meshgroup; transparent slots start at the opaque count
    pub draw_commands: Vec<IndirectDrawCommand>,
    /// Parallel to `draw_commands`
    pub drawn_meshgroups: Vec<DrawnMeshgroup>,
}

impl GpuCullBuffers {
    /// Allocate buffers for a scene with the given attribute capacity
    pub fn new(instance_count: usize, meshgroup_count: usize, attribute_capacity: usize) -> Self {
        Self {
            visibility: vec![0; instance_count],
            group_counters: (0..meshgroup_count).map(|_| AtomicU32::new(0)).collect(),
            attribute_cursor: AtomicU32::new(0),
            opaque_draws: AtomicU32::new(0),
            transparent_draws: AtomicU32::new(0),
            attribute_indices: vec![0; attribute_capacity],
            draw_commands: vec![IndirectDrawCommand::default(); meshgroup_count],
            drawn_meshgroups: vec![DrawnMeshgroup::default(); meshgroup_count],
        }
    }

    /// Zero every counter
    pub fn reset_counters(&mut self) {
        for counter in &self.group_counters {
            counter.store(0, Ordering::Relaxed);
        }
        self.attribute_cursor.store(0, Ordering::Relaxed);
        self.opaque_draws.store(0, Ordering::Relaxed);
        self.transparent_draws.store(0, Ordering::Relaxed);
    }

    /// Snapshot of the global counters
    pub fn counters(&self) -> GpuCounters {
        GpuCounters {
            attribute_cursor: self.attribute_cursor.load(Ordering::Relaxed),
            opaque_draws: self.opaque_draws.load(Ordering::Relaxed),
            transparent_draws: self.transparent_draws.load(Ordering::Relaxed),
            _pad: 0,
        }
    }

    /// Gather both command ranges into a compact [`DrawnSet`]
    pub fn read_back(&self, opaque_meshgroup_count: u32) -> DrawnSet {
        let counters = self.counters();
        let opaque = 0..counters.opaque_draws as usize;
        let transparent_start = opaque_meshgroup_count as usize;
        let transparent = transparent_start..transparent_start + counters.transparent_draws as usize;

        let mut set = DrawnSet::default();
        for range in [opaque, transparent] {
            set.draw_commands.extend_from_slice(&self.draw_commands[range.clone()]);
            set.drawn_meshgroups.extend_from_slice(&self.drawn_meshgroups[range]);
        }
        let used = (counters.attribute_cursor as usize).min(self.attribute_indices.len());
        set.attribute_indices.extend_from_slice(&self.attribute_indices[..used]);
        set.draw_count = DrawCounts {
            opaque: counters.opaque_draws,
            transparent: counters.transparent_draws,
        };
        set
    }
}

/// True when the box lies entirely outside any plane
fn box_outside_planes(planes: &[[f32; 4]; 6], min: &[f32; 3], max: &[f32; 3]) -> bool {
    planes.iter().any(|plane| {
        let nearest: [f32; 3] = std::array::from_fn(|axis| if plane[axis] < 0.0 { max[axis] } else { min[axis] });
        let dot = plane[0] * nearest[0] + plane[1] * nearest[1] + plane[2] * nearest[2];
        dot + plane[3] > 0.0
    })
}

/// World-space bounds of an instance: hull of the 8 transformed corners
fn instance_world_bounds(model: &[[f32; 4]; 4], group: &GpuMeshgroup) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::MAX; 3];
    let mut max = [-f32::MAX; 3];
    for corner in 0..8 {
        let local = [
            if corner & 1 != 0 { group.bounds_max[0] } else { group.bounds_min[0] },
            if corner & 2 != 0 { group.bounds_max[1] } else { group.bounds_min[1] },
            if corner & 4 != 0 { group.bounds_max[2] } else { group.bounds_min[2] },
        ];
        for row in 0..3 {
            let world = model[0][row] * local[0] + model[1][row] * local[1] + model[2][row] * local[2] + model[3][row];
            min[row] = min[row].min(world);
            max[row] = max[row].max(world);
        }
    }
    (min, max)
}

/// Kernel (a): one invocation per instance
pub fn visibility_kernel(
    invocation: u32,
    uniforms: &CullUniforms,
    scene: &GpuSceneBuffers,
    buffers: &mut GpuCullBuffers,
) {
    if invocation >= uniforms.instance_count {
        return;
    }

    let instance = &scene.instances[invocation as usize];
    let group = &scene.meshgroups[instance.meshgroup as usize];
    let (min, max) = instance_world_bounds(&instance.model, group);
    let visible = !box_outside_planes(&uniforms.frustum_planes, &min, &max);

    buffers.visibility[invocation as usize] = u32::from(visible);
    if visible {
        buffers.group_counters[instance.meshgroup as usize].fetch_add(1, Ordering::Relaxed);
    }
}

/// Kernel (b): one invocation per meshgroup
pub fn compaction_kernel(
    invocation: u32,
    uniforms: &CullUniforms,
    scene: &GpuSceneBuffers,
    buffers: &mut GpuCullBuffers,
) {
    if invocation >= uniforms.meshgroup_count {
        return;
    }

    let group = &scene.meshgroups[invocation as usize];
    let count = buffers.group_counters[invocation as usize].load(Ordering::Relaxed);
    if count == 0 {
        return;
    }

    let base = buffers.attribute_cursor.fetch_add(count, Ordering::Relaxed);
    if base + count > uniforms.attribute_capacity {
        // Out of room: the host sees the cursor overshoot and reports it
        return;
    }

    let ids = &scene.group_instances[group.instance_offset as usize..][..group.instance_count as usize];
    let mut written = 0;
    for &id in ids {
        if buffers.visibility[id as usize] != 0 {
            buffers.attribute_indices[(base + written) as usize] = id;
            written += 1;
        }
    }

    let slot = if group.transparent != 0 {
        uniforms.opaque_meshgroup_count + buffers.transparent_draws.fetch_add(1, Ordering::Relaxed)
    } else {
        buffers.opaque_draws.fetch_add(1, Ordering::Relaxed)
    } as usize;

    buffers.draw_commands[slot] = IndirectDrawCommand {
        index_count: group.index_count,
        instance_count: count,
        first_index: group.first_index,
        vertex_offset: group.vertex_offset,
        first_instance: base,
    };
    buffers.drawn_meshgroups[slot] = DrawnMeshgroup {
        meshgroup: invocation,
        material: group.material,
        attribute_offset: base,
        instance_count: count,
    };
}

/// Order in which the host dispatcher runs invocations of a dispatch
///
/// Real hardware gives no ordering guarantee; running the kernels in
/// different orders checks that the visible set does not depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvocationOrder {
    /// Ascending invocation ids
    #[default]
    Forward,
    /// Descending invocation ids
    Reverse,
    /// Every `n`th id, then every `n`th starting at 1, and so on
    Interleaved(u32),
}

impl InvocationOrder {
    fn invocations(self, workgroups: u32) -> Vec<u32> {
        let total = workgroups * WORKGROUP_SIZE;
        match self {
            Self::Forward => (0..total).collect(),
            Self::Reverse => (0..total).rev().collect(),
            Self::Interleaved(stride) => {
                let stride = stride.max(1);
                (0..stride)
                    .flat_map(|start| (start..total).step_by(stride as usize))
                    .collect()
            }
        }
    }
}

/// Host-side executor of the culling sequence
#[derive(Debug)]
pub struct GpuCullMirror {
    scene: GpuSceneBuffers,
    buffers: GpuCullBuffers,
    opaque_meshgroup_count: u32,
    order: InvocationOrder,
}

impl GpuCullMirror {
    /// Pack `scene` and size every buffer to hold all of it
    pub fn new(scene: &SceneGeometry) -> Self {
        let buffers = GpuCullBuffers::new(
            scene.instances().len(),
            scene.meshgroups().len(),
            scene.instances().len(),
        );
        Self {
            scene: GpuSceneBuffers::from_scene(scene),
            buffers,
            opaque_meshgroup_count: scene.opaque_meshgroup_count() as u32,
            order: InvocationOrder::default(),
        }
    }

    /// Limit the attribute-index buffer to `capacity` entries
    pub fn with_attribute_capacity(mut self, capacity: usize) -> Self {
        self.buffers.attribute_indices = vec![0; capacity];
        self
    }

    /// Run invocations in the given order
    pub fn with_invocation_order(mut self, order: InvocationOrder) -> Self {
        self.order = order;
        self
    }

    /// Push constants for culling against `frustum`
    pub fn uniforms(&self, frustum: &Frustum) -> CullUniforms {
        CullUniforms {
            frustum_planes: frustum.planes_gpu(),
            instance_count: self.scene.instances.len() as u32,
            meshgroup_count: self.scene.meshgroups.len() as u32,
            opaque_meshgroup_count: self.opaque_meshgroup_count,
            attribute_capacity: self.buffers.attribute_indices.len() as u32,
        }
    }

    /// Byte offset of the transparent range in the draw command buffer
    pub fn transparent_command_offset(&self) -> u64 {
        u64::from(self.opaque_meshgroup_count) * u64::from(IndirectDrawCommand::STRIDE)
    }

    /// Scene buffer records
    pub fn scene_buffers(&self) -> &GpuSceneBuffers {
        &self.scene
    }

    /// Raw output buffers of the last dispatch
    pub fn buffers(&self) -> &GpuCullBuffers {
        &self.buffers
    }

    /// Run the whole sequence against `frustum` and read the lists back
    ///
    /// # Errors
    /// [`CullError::GpuCapacityExceeded`] when the visible instances do not
    /// fit the attribute-index buffer.
    pub fn dispatch(&mut self, frustum: &Frustum) -> CullResult<DrawnSet> {
        let uniforms = self.uniforms(frustum);

        for step in CULL_SEQUENCE {
            match step {
                CullStep::ResetCounters => self.buffers.reset_counters(),
                CullStep::Barrier(_) => fence(Ordering::SeqCst),
                CullStep::DispatchVisibility => {
                    for invocation in self.order.invocations(workgroup_count(uniforms.instance_count)) {
                        visibility_kernel(invocation, &uniforms, &self.scene, &mut self.buffers);
                    }
                }
                CullStep::DispatchCompaction => {
                    for invocation in self.order.invocations(workgroup_count(uniforms.meshgroup_count)) {
                        compaction_kernel(invocation, &uniforms, &self.scene, &mut self.buffers);
                    }
                }
            }
        }

        let counters = self.buffers.counters();
        if counters.attribute_cursor > uniforms.attribute_capacity {
            return Err(CullError::GpuCapacityExceeded {
                buffer: "attribute_indices",
                capacity: uniforms.attribute_capacity as usize,
                required: counters.attribute_cursor as usize,
            });
        }

        log::trace!(
            "GPU cull: {} opaque + {} transparent draws, {} instances",
            counters.opaque_draws,
            counters.transparent_draws,
            counters.attribute_cursor
        );
        Ok(self.buffers.read_back(self.opaque_meshgroup_count))
    }
}
