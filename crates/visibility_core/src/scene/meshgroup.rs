//! Static scene geometry grouped by material and transparency
//!
//! A meshgroup is one material + one transparency class of static geometry
//! sitting in the shared vertex/index buffers. Instances place a meshgroup
//! in the world with a model matrix. Both are created once at scene load
//! through [`SceneGeometryBuilder`] and are read-only afterwards.

use crate::foundation::math::Mat4;
use crate::scene::BoundingBox;

/// Transparency class of a meshgroup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transparency {
    /// Rendered in the opaque range
    Opaque,
    /// Rendered in the transparent range, after every opaque draw
    Transparent,
}

/// Index of a meshgroup inside [`SceneGeometry`]
///
/// Ids handed out by the builder are remapped when the builder moves
/// transparent groups behind opaque ones; use [`SceneGeometry::meshgroup_id`]
/// to translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshgroupId(pub u32);

/// Load-time description of a meshgroup
#[derive(Debug, Clone)]
pub struct MeshgroupDesc {
    /// Bounds of the untransformed geometry
    pub bounds: BoundingBox,
    /// First index in the shared index buffer
    pub first_index: u32,
    /// Number of indices
    pub index_count: u32,
    /// Value added to each index before fetching a vertex
    pub vertex_offset: i32,
    /// Material slot used by the shading stage
    pub material: u32,
    /// Transparency class
    pub transparency: Transparency,
}

/// One material + transparency class of static geometry
#[derive(Debug, Clone)]
pub struct Meshgroup {
    /// Bounds of the untransformed geometry
    pub bounds: BoundingBox,
    /// First index in the shared index buffer
    pub first_index: u32,
    /// Number of indices
    pub index_count: u32,
    /// Value added to each index before fetching a vertex
    pub vertex_offset: i32,
    /// Material slot
    pub material: u32,
    /// Transparency class
    pub transparency: Transparency,
    /// Instance ids placing this meshgroup, in load order
    pub instances: Vec<u32>,
}

impl Meshgroup {
    /// Check if this meshgroup renders in the transparent range
    pub fn is_transparent(&self) -> bool {
        self.transparency == Transparency::Transparent
    }
}

/// A placement of a meshgroup in the world
#[derive(Debug, Clone)]
pub struct Instance {
    /// Model-to-world matrix
    pub model: Mat4,
    /// Meshgroup this instance draws
    pub meshgroup: MeshgroupId,
}

/// Immutable, ordered scene geometry
///
/// Opaque meshgroups always precede transparent ones.
#[derive(Debug, Clone)]
pub struct SceneGeometry {
    meshgroups: Vec<Meshgroup>,
    instances: Vec<Instance>,
    opaque_count: usize,
    bounds: BoundingBox,
    id_remap: Vec<MeshgroupId>,
}

impl SceneGeometry {
    /// Meshgroups, opaque first
    pub fn meshgroups(&self) -> &[Meshgroup] {
        &self.meshgroups
    }

    /// Get a meshgroup by id
    pub fn meshgroup(&self, id: MeshgroupId) -> &Meshgroup {
        &self.meshgroups[id.0 as usize]
    }

    /// All instances, indexed by instance id
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Number of opaque meshgroups (they occupy `0..opaque_count`)
    pub fn opaque_meshgroup_count(&self) -> usize {
        self.opaque_count
    }

    /// World-space bounds of every instance
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Translate an id returned by [`SceneGeometryBuilder::add_meshgroup`]
    pub fn meshgroup_id(&self, builder_id: MeshgroupId) -> MeshgroupId {
        self.id_remap[builder_id.0 as usize]
    }

    /// World-space bounds of one instance
    pub fn instance_bounds(&self, instance: u32) -> BoundingBox {
        let instance = &self.instances[instance as usize];
        self.meshgroup(instance.meshgroup).bounds.transformed(&instance.model)
    }
}

/// Collects meshgroups and instances during scene load
#[derive(Debug, Default)]
pub struct SceneGeometryBuilder {
    meshgroups: Vec<Meshgroup>,
    instances: Vec<Instance>,
}

impl SceneGeometryBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a meshgroup with no instances yet
    pub fn add_meshgroup(&mut self, desc: MeshgroupDesc) -> MeshgroupId {
        let id = MeshgroupId(self.meshgroups.len() as u32);
        self.meshgroups.push(Meshgroup {
            bounds: desc.bounds,
            first_index: desc.first_index,
            index_count: desc.index_count,
            vertex_offset: desc.vertex_offset,
            material: desc.material,
            transparency: desc.transparency,
            instances: Vec::new(),
        });
        id
    }

    /// Place a meshgroup in the world, returning the instance id
    pub fn add_instance(&mut self, meshgroup: MeshgroupId, model: Mat4) -> u32 {
        let id = self.instances.len() as u32;
        self.meshgroups[meshgroup.0 as usize].instances.push(id);
        self.instances.push(Instance { model, meshgroup });
        id
    }

    /// Freeze the geometry, moving transparent meshgroups behind opaque ones
    ///
    /// Relative order inside each class is kept.
    ///
    /// # Panics
    /// Panics when no meshgroup was added.
    pub fn build(self) -> SceneGeometry {
        assert!(!self.meshgroups.is_empty(), "scene geometry needs at least one meshgroup");

        let (opaque, transparent): (Vec<_>, Vec<_>) = self
            .meshgroups
            .into_iter()
            .enumerate()
            .partition(|(_, group)| group.transparency == Transparency::Opaque);
        let opaque_count = opaque.len();

        let mut id_remap = vec![MeshgroupId(0); opaque_count + transparent.len()];
        let mut meshgroups = Vec::with_capacity(id_remap.len());
        for (new_index, (old_index, group)) in opaque.into_iter().chain(transparent).enumerate() {
            id_remap[old_index] = MeshgroupId(new_index as u32);
            meshgroups.push(group);
        }

        let mut instances = self.instances;
        for instance in &mut instances {
            instance.meshgroup = id_remap[instance.meshgroup.0 as usize];
        }

        let mut bounds = BoundingBox::empty();
        for instance in &instances {
            bounds.combine_with(meshgroups[instance.meshgroup.0 as usize].bounds.transformed(&instance.model));
        }

        log::debug!(
            "Scene geometry: {} meshgroups ({} opaque), {} instances",
            meshgroups.len(),
            opaque_count,
            instances.len()
        );

        SceneGeometry {
            meshgroups,
            instances,
            opaque_count,
            bounds,
            id_remap,
        }
    }
}
