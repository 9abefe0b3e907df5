//! Per-frustum draw lists and their per-frame-in-flight storage
//!
//! Each frame slot owns one [`FrameDrawnSets`]: the main camera's
//! [`DrawnSet`] followed by one per active cascade. Slots never share
//! buffers, so a slot can be rebuilt while the GPU still reads another.

use std::ops::Range;

use crate::render::draw_commands::{DrawnMeshgroup, IndirectDrawCommand};

/// Number of draw commands in each transparency class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawCounts {
    /// Opaque draw commands, issued first
    pub opaque: u32,
    /// Transparent draw commands, issued after every opaque one
    pub transparent: u32,
}

impl DrawCounts {
    /// All draw commands
    pub fn total(&self) -> u32 {
        self.opaque + self.transparent
    }
}

/// Compacted draw list for one frustum
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawnSet {
    /// One record per draw command, indexed by draw id
    pub drawn_meshgroups: Vec<DrawnMeshgroup>,
    /// Visible instance ids, grouped by draw
    pub attribute_indices: Vec<u32>,
    /// Indexed indirect commands, opaque first
    pub draw_commands: Vec<IndirectDrawCommand>,
    /// Command count per transparency class
    pub draw_count: DrawCounts,
}

impl DrawnSet {
    /// Drop every draw, keeping allocations
    pub fn clear(&mut self) {
        self.drawn_meshgroups.clear();
        self.attribute_indices.clear();
        self.draw_commands.clear();
        self.draw_count = DrawCounts::default();
    }

    /// True when nothing survived culling
    pub fn is_empty(&self) -> bool {
        self.draw_commands.is_empty()
    }

    /// Command indices of the opaque indirect range
    pub fn opaque_range(&self) -> Range<usize> {
        0..self.draw_count.opaque as usize
    }

    /// Command indices of the transparent indirect range
    pub fn transparent_range(&self) -> Range<usize> {
        let start = self.draw_count.opaque as usize;
        start..start + self.draw_count.transparent as usize
    }

    /// Opaque draw commands
    pub fn opaque_commands(&self) -> &[IndirectDrawCommand] {
        &self.draw_commands[self.opaque_range()]
    }

    /// Transparent draw commands
    pub fn transparent_commands(&self) -> &[IndirectDrawCommand] {
        &self.draw_commands[self.transparent_range()]
    }

    /// Instances drawn by all commands
    pub fn visible_instance_count(&self) -> usize {
        self.attribute_indices.len()
    }

    /// Visible instance ids in ascending order
    pub fn visible_instances(&self) -> Vec<u32> {
        let mut ids = self.attribute_indices.clone();
        ids.sort_unstable();
        ids
    }
}

/// Which frustum a [`DrawnSet`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrustumId {
    /// Main camera
    Main,
    /// Shadow cascade `i`
    Cascade(u8),
}

impl FrustumId {
    /// Position inside [`FrameDrawnSets`]
    pub fn index(self) -> usize {
        match self {
            Self::Main => 0,
            Self::Cascade(i) => i as usize + 1,
        }
    }
}

/// Every frustum's draw list for one frame slot, main camera first
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDrawnSets {
    sets: Vec<DrawnSet>,
}

impl FrameDrawnSets {
    /// Empty lists for the main camera and `num_cascades` cascades
    pub fn new(num_cascades: usize) -> Self {
        Self {
            sets: vec![DrawnSet::default(); num_cascades + 1],
        }
    }

    /// Main camera list
    pub fn main(&self) -> &DrawnSet {
        &self.sets[0]
    }

    /// Cascade `i` list
    ///
    /// # Panics
    /// Panics when cascade `i` is not active.
    pub fn cascade(&self, i: usize) -> &DrawnSet {
        &self.sets[i + 1]
    }

    /// List of any frustum
    pub fn get(&self, frustum: FrustumId) -> Option<&DrawnSet> {
        self.sets.get(frustum.index())
    }

    /// Mutable list of any frustum
    pub fn get_mut(&mut self, frustum: FrustumId) -> Option<&mut DrawnSet> {
        self.sets.get_mut(frustum.index())
    }

    /// Number of active cascades
    pub fn num_cascades(&self) -> usize {
        self.sets.len() - 1
    }

    /// Grow or shrink the cascade lists
    pub fn resize_cascades(&mut self, num_cascades: usize) {
        self.sets.resize_with(num_cascades + 1, DrawnSet::default);
    }

    /// Lists paired with their frustum, main first
    pub fn iter(&self) -> impl Iterator<Item = (FrustumId, &DrawnSet)> {
        self.sets.iter().enumerate().map(|(i, set)| {
            let id = if i == 0 { FrustumId::Main } else { FrustumId::Cascade((i - 1) as u8) };
            (id, set)
        })
    }
}

/// Index of a frame in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSlot(pub usize);

/// One independent value per frame in flight
#[derive(Debug, Clone)]
pub struct FramesInFlight<T> {
    slots: Vec<T>,
}

impl<T> FramesInFlight<T> {
    /// Create `count` slots, each from `make`
    ///
    /// # Panics
    /// Panics when `count` is zero.
    pub fn new(count: usize, mut make: impl FnMut(FrameSlot) -> T) -> Self {
        assert!(count > 0, "at least one frame in flight is required");
        Self {
            slots: (0..count).map(|i| make(FrameSlot(i))).collect(),
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when there are no slots, which `new` never produces
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Value of a slot
    ///
    /// # Panics
    /// Panics when `slot` is out of range.
    pub fn get(&self, slot: FrameSlot) -> &T {
        self.check(slot);
        &self.slots[slot.0]
    }

    /// Mutable value of a slot
    ///
    /// # Panics
    /// Panics when `slot` is out of range.
    pub fn get_mut(&mut self, slot: FrameSlot) -> &mut T {
        self.check(slot);
        &mut self.slots[slot.0]
    }

    /// Mutable access to every slot
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut()
    }

    fn check(&self, slot: FrameSlot) {
        assert!(
            slot.0 < self.slots.len(),
            "frame slot {} out of range (frames in flight: {})",
            slot.0,
            self.slots.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(instance_count: u32) -> IndirectDrawCommand {
        IndirectDrawCommand {
            index_count: 3,
            instance_count,
            ..Default::default()
        }
    }

    #[test]
    fn test_ranges_split_opaque_and_transparent() {
        let set = DrawnSet {
            draw_commands: vec![command(1), command(2), command(3)],
            attribute_indices: vec![4, 0, 1, 7, 8, 9],
            draw_count: DrawCounts { opaque: 2, transparent: 1 },
            ..Default::default()
        };

        assert_eq!(set.opaque_range(), 0..2);
        assert_eq!(set.transparent_range(), 2..3);
        assert_eq!(set.transparent_commands()[0].instance_count, 3);
        assert_eq!(set.visible_instances(), vec![0, 1, 4, 7, 8, 9]);
        assert_eq!(set.draw_count.total(), 3);
    }

    #[test]
    fn test_frame_sets_order_main_first() {
        let mut sets = FrameDrawnSets::new(2);
        sets.get_mut(FrustumId::Cascade(1)).unwrap().draw_count.opaque = 5;

        assert_eq!(sets.num_cascades(), 2);
        assert_eq!(sets.cascade(1).draw_count.opaque, 5);
        assert!(sets.get(FrustumId::Cascade(2)).is_none());

        let ids: Vec<FrustumId> = sets.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![FrustumId::Main, FrustumId::Cascade(0), FrustumId::Cascade(1)]);

        sets.resize_cascades(1);
        assert_eq!(sets.num_cascades(), 1);
    }

    #[test]
    fn test_frames_in_flight_slots_are_independent() {
        let mut frames = FramesInFlight::new(3, |slot| slot.0 * 10);
        *frames.get_mut(FrameSlot(1)) += 1;

        assert_eq!(frames.len(), 3);
        assert_eq!(*frames.get(FrameSlot(0)), 0);
        assert_eq!(*frames.get(FrameSlot(1)), 11);
        assert_eq!(*frames.get(FrameSlot(2)), 20);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_frames_in_flight_rejects_bad_slot() {
        let frames = FramesInFlight::new(2, |_| ());
        frames.get(FrameSlot(2));
    }
}
