//! CPU draw-list builder
//!
//! Walks the meshgroups in scene order (opaque first), keeps every instance
//! whose world box is not entirely outside the frustum, and emits one
//! indirect command per meshgroup that kept anything.

use crate::render::draw_commands::{DrawnMeshgroup, IndirectDrawCommand};
use crate::render::drawn_set::DrawnSet;
use crate::scene::{BoundingBox, Frustum, SceneGeometry};

/// Builds [`DrawnSet`]s for a fixed scene
///
/// Instance world bounds are computed once at construction, since neither
/// instances nor meshgroups move after scene load.
#[derive(Debug, Clone)]
pub struct VisibilityDrawBuilder {
    instance_bounds: Vec<BoundingBox>,
}

impl VisibilityDrawBuilder {
    /// Cache the world bounds of every instance in `scene`
    pub fn new(scene: &SceneGeometry) -> Self {
        let instance_bounds = (0..scene.instances().len() as u32)
            .map(|i| scene.instance_bounds(i))
            .collect();
        Self { instance_bounds }
    }

    /// World bounds of one instance
    pub fn instance_bounds(&self, instance: u32) -> &BoundingBox {
        &self.instance_bounds[instance as usize]
    }

    /// Cull `scene` against `frustum`, replacing the contents of `out`
    ///
    /// Instance ids keep their load order inside each meshgroup. Meshgroups
    /// with no surviving instance emit nothing.
    pub fn build(&self, scene: &SceneGeometry, frustum: &Frustum, out: &mut DrawnSet) {
        out.clear();

        for (index, group) in scene.meshgroups().iter().enumerate() {
            let offset = out.attribute_indices.len();
            out.attribute_indices.extend(
                group
                    .instances
                    .iter()
                    .copied()
                    .filter(|&instance| !frustum.can_cull(self.instance_bounds(instance))),
            );

            let count = (out.attribute_indices.len() - offset) as u32;
            if count == 0 {
                continue;
            }

            out.draw_commands.push(IndirectDrawCommand {
                index_count: group.index_count,
                instance_count: count,
                first_index: group.first_index,
                vertex_offset: group.vertex_offset,
                first_instance: offset as u32,
            });
            out.drawn_meshgroups.push(DrawnMeshgroup {
                meshgroup: index as u32,
                material: group.material,
                attribute_offset: offset as u32,
                instance_count: count,
            });

            if group.is_transparent() {
                out.draw_count.transparent += 1;
            } else {
                out.draw_count.opaque += 1;
            }
        }

        log::trace!(
            "Culled draw list: {} opaque + {} transparent draws, {}/{} instances",
            out.draw_count.opaque,
            out.draw_count.transparent,
            out.attribute_indices.len(),
            self.instance_bounds.len()
        );
    }

    /// Cull into a fresh [`DrawnSet`]
    pub fn build_set(&self, scene: &SceneGeometry, frustum: &Frustum) -> DrawnSet {
        let mut set = DrawnSet::default();
        self.build(scene, frustum, &mut set);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::test_support::{camera_frustum, grid_scene, mixed_scene, MIXED_VISIBLE};
    use crate::scene::{Plane, Transparency};
    use crate::foundation::math::Vec3;

    #[test]
    fn test_mixed_scene_draw_list() {
        let scene = mixed_scene();
        let builder = VisibilityDrawBuilder::new(&scene);
        let set = builder.build_set(&scene, &camera_frustum());

        // stone [1, 4], wood culled entirely, glass [0], water [6]
        assert_eq!(set.attribute_indices, vec![1, 4, 0, 6]);
        assert_eq!(set.draw_count.opaque, 1);
        assert_eq!(set.draw_count.transparent, 2);

        let stone = &set.draw_commands[0];
        assert_eq!(stone.instance_count, 2);
        assert_eq!(stone.first_instance, 0);
        assert_eq!(stone.index_count, 36);
        assert_eq!(stone.first_index, 36);
        assert_eq!(stone.vertex_offset, 8);

        let materials: Vec<u32> = set.drawn_meshgroups.iter().map(|d| d.material).collect();
        assert_eq!(materials, vec![1, 0, 2]);
        assert_eq!(set.drawn_meshgroups[2].attribute_offset, 3);
    }

    #[test]
    fn test_attribute_indices_name_exactly_visible_instances() {
        let scene = mixed_scene();
        let builder = VisibilityDrawBuilder::new(&scene);
        let frustum = camera_frustum();
        let set = builder.build_set(&scene, &frustum);

        assert_eq!(set.visible_instances(), MIXED_VISIBLE.to_vec());
        for (i, bounds) in builder.instance_bounds.iter().enumerate() {
            let kept = set.attribute_indices.contains(&(i as u32));
            assert_eq!(kept, !frustum.can_cull(bounds), "instance {}", i);
        }
    }

    #[test]
    fn test_partition_and_ordering_invariants() {
        let scene = grid_scene(9, 40);
        let builder = VisibilityDrawBuilder::new(&scene);
        let set = builder.build_set(&scene, &camera_frustum());

        assert!(!set.is_empty());
        assert_eq!(set.draw_count.total() as usize, set.draw_commands.len());

        let opaque: u32 = set.opaque_commands().iter().map(|c| c.instance_count).sum();
        let transparent: u32 = set.transparent_commands().iter().map(|c| c.instance_count).sum();
        assert_eq!((opaque + transparent) as usize, set.attribute_indices.len());

        // Every opaque draw precedes every transparent one
        let classes: Vec<Transparency> = set
            .drawn_meshgroups
            .iter()
            .map(|d| scene.meshgroups()[d.meshgroup as usize].transparency)
            .collect();
        let first_transparent = classes
            .iter()
            .position(|t| *t == Transparency::Transparent)
            .unwrap_or(classes.len());
        assert_eq!(first_transparent, set.draw_count.opaque as usize);
        assert!(classes[first_transparent..].iter().all(|t| *t == Transparency::Transparent));

        // Each command's range covers only its own meshgroup's instances
        for (command, drawn) in set.draw_commands.iter().zip(&set.drawn_meshgroups) {
            let start = command.first_instance as usize;
            let ids = &set.attribute_indices[start..start + command.instance_count as usize];
            let group = &scene.meshgroups()[drawn.meshgroup as usize];
            assert!(ids.iter().all(|id| group.instances.contains(id)));
            assert!(ids.windows(2).all(|w| w[0] < w[1]), "load order kept");
        }
    }

    #[test]
    fn test_frustum_culling_everything_gives_empty_set() {
        let scene = mixed_scene();
        let builder = VisibilityDrawBuilder::new(&scene);
        // Anything with x < 1000 violates this plane
        let mut planes = camera_frustum().planes;
        planes[0] = Plane::new(Vec3::new(-1.0, 0.0, 0.0), 1000.0);
        let set = builder.build_set(&scene, &Frustum::new(planes));

        assert!(set.is_empty());
        assert!(set.attribute_indices.is_empty());
        assert_eq!(set.draw_count.total(), 0);
    }

    #[test]
    fn test_rebuild_replaces_previous_contents() {
        let scene = mixed_scene();
        let builder = VisibilityDrawBuilder::new(&scene);
        let mut set = builder.build_set(&scene, &camera_frustum());
        let first = set.clone();

        builder.build(&scene, &camera_frustum(), &mut set);
        assert_eq!(set, first);
    }
}
