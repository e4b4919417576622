use crate::types::NodeId;

/// Removal state of a leaf.
///
/// Leaves move `Attached → Dropping` when flagged, and are removed from
/// the [`LeafSet`] once they have been dropping for the configured
/// duration. There is no way back to `Attached`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LeafPhase {
    Attached,
    Dropping { elapsed: f32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Leaf {
    /// Index of the hosting node. Not validated on its own; readers
    /// bounds-check against the tree.
    pub node: NodeId,
    pub is_cotyledon: bool,
    pub size: f32,
    /// Light received, in `[0, 1]`.
    pub light: f32,
    pub phase: LeafPhase,
    /// Phase offset in seconds for cyclic visibility.
    pub cycle_offset: f32,
}

impl Leaf {
    pub fn new(node: NodeId, size: f32, cycle_offset: f32) -> Self {
        Self {
            node,
            is_cotyledon: false,
            size,
            light: 1.0,
            phase: LeafPhase::Attached,
            cycle_offset,
        }
    }

    pub fn cotyledon(node: NodeId, size: f32) -> Self {
        Self {
            is_cotyledon: true,
            ..Self::new(node, size, 0.0)
        }
    }

    #[inline]
    pub fn is_dropping(&self) -> bool {
        matches!(self.phase, LeafPhase::Dropping { .. })
    }

    /// Starts the drop timer. Already dropping leaves keep their timer.
    pub fn begin_drop(&mut self) {
        if !self.is_dropping() {
            self.phase = LeafPhase::Dropping { elapsed: 0.0 };
        }
    }

    /// Seconds spent dropping so far, `0.0` while attached.
    pub fn drop_elapsed(&self) -> f32 {
        match self.phase {
            LeafPhase::Attached => 0.0,
            LeafPhase::Dropping { elapsed } => elapsed,
        }
    }

    /// Whether the leaf is inside the visible part of its cycle at `age`.
    pub fn is_visible_at(&self, age: f32, period: f32, visible_fraction: f32) -> bool {
        if period <= 0.0 {
            return true;
        }
        let t = (age + self.cycle_offset).rem_euclid(period);
        t <= period * visible_fraction.clamp(0.0, 1.0)
    }
}

/// The live leaf population of one tree.
#[derive(Clone, Debug, Default)]
pub struct LeafSet {
    pub leaves: Vec<Leaf>,
}

impl LeafSet {
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn clear(&mut self) {
        self.leaves.clear();
    }

    pub fn push(&mut self, leaf: Leaf) {
        self.leaves.push(leaf);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Leaf> {
        self.leaves.iter()
    }

    /// Attaches the seed-leaf pair to `node`.
    pub fn add_cotyledons(&mut self, node: NodeId, size: f32) {
        self.leaves.push(Leaf::cotyledon(node, size));
        self.leaves.push(Leaf::cotyledon(node, size));
    }

    /// Non-dropping leaves hosted by `node`.
    pub fn attached_count(&self, node: NodeId) -> usize {
        self.leaves
            .iter()
            .filter(|l| l.node == node && !l.is_dropping())
            .count()
    }

    /// Flags every leaf matching `pred` as dropping.
    pub fn drop_where(&mut self, mut pred: impl FnMut(&Leaf) -> bool) {
        for leaf in self.leaves.iter_mut().filter(|l| pred(l)) {
            leaf.begin_drop();
        }
    }

    /// Advances drop timers by `dt` and removes leaves whose timer has
    /// reached `duration`. Returns the number removed.
    pub fn advance_drops(&mut self, dt: f32, duration: f32) -> usize {
        let before = self.leaves.len();
        self.leaves.retain_mut(|leaf| match &mut leaf.phase {
            LeafPhase::Attached => true,
            LeafPhase::Dropping { elapsed } => {
                *elapsed += dt;
                *elapsed < duration
            }
        });
        before - self.leaves.len()
    }
}
