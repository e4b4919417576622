use crate::types::NodeId;
use glam::Vec3;

/// One vertex of the growing skeleton.
#[derive(Clone, Debug)]
pub struct TreeNode {
    pub id: NodeId,
    pub pos: Vec3,
    /// Unit direction this node was grown in from its parent.
    pub dir: Vec3,
    pub radius: f32,
    pub parent: Option<NodeId>,
    pub is_terminal: bool,
    pub children: Vec<NodeId>,
}

/// Rooted, acyclic skeleton stored as a flat node list.
///
/// Nodes are only appended, and a node's id equals its index, so every
/// child has a larger id than its parent.
#[derive(Clone, Debug, Default)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new_root(pos: Vec3, radius: f32) -> Self {
        Self {
            id: 0,
            pos,
            dir: Vec3::Y,
            radius,
            parent: None,
            is_terminal: true,
            children: Vec::with_capacity(2),
        }
    }

    pub fn new_child(id: NodeId, pos: Vec3, dir: Vec3, radius: f32, parent: NodeId) -> Self {
        Self {
            id,
            pos,
            dir,
            radius,
            parent: Some(parent),
            is_terminal: true,
            children: Vec::with_capacity(2),
        }
    }
}

impl Tree {
    pub fn new(root_pos: Vec3, root_radius: f32) -> Self {
        Self {
            nodes: vec![TreeNode::new_root(root_pos, root_radius)],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id)
    }

    /// `false` for ids that do not name a node.
    pub fn is_terminal(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.is_terminal)
    }

    /// Appends a terminal child of `parent` and returns its id.
    ///
    /// Returns `None` without touching the tree when `parent` does not
    /// exist or the tree already holds `max_nodes` nodes. A zero-length
    /// `dir` grows straight up.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        dir: Vec3,
        step: f32,
        radius: f32,
        max_nodes: usize,
    ) -> Option<NodeId> {
        if self.nodes.len() >= max_nodes || parent >= self.nodes.len() {
            return None;
        }

        let dir = if dir.length_squared() > 1e-4 {
            dir.normalize()
        } else {
            Vec3::Y
        };
        let id = self.nodes.len();
        let pos = self.nodes[parent].pos + dir * step;

        self.nodes
            .push(TreeNode::new_child(id, pos, dir, radius, parent));
        let p = &mut self.nodes[parent];
        p.children.push(id);
        p.is_terminal = false;
        Some(id)
    }

    /// Applies the pipe model bottom-up: every node with children gets
    /// `radius = (Σ child.radius^p)^(1/p)`.
    ///
    /// A single reverse pass is enough because children always have
    /// larger ids than their parent.
    pub fn recompute_radii(&mut self, exponent: f32) {
        let p = exponent.max(0.1);
        for i in (0..self.nodes.len()).rev() {
            if self.nodes[i].children.is_empty() {
                continue;
            }
            let sum: f32 = self.nodes[i]
                .children
                .iter()
                .filter_map(|&c| self.nodes.get(c))
                .map(|c| c.radius.powf(p))
                .sum();
            self.nodes[i].radius = sum.powf(1.0 / p);
        }
    }

    /// Highest y coordinate of any node, or `0.0` for an empty tree.
    pub fn max_height(&self) -> f32 {
        self.nodes
            .iter()
            .map(|n| n.pos.y)
            .reduce(f32::max)
            .unwrap_or(0.0)
    }

    /// Parent index per node, in the form the mesh synthesizer expects.
    pub fn parent_indices(&self) -> Vec<Option<NodeId>> {
        self.nodes.iter().map(|n| n.parent).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn new_tree_has_a_single_terminal_root() {
        let tree = Tree::new(Vec3::ZERO, 0.08);
        assert_eq!(tree.len(), 1);
        let root = &tree.nodes[0];
        assert_eq!(root.id, 0);
        assert!(root.parent.is_none());
        assert!(root.is_terminal);
        assert_eq!(root.dir, Vec3::Y);
    }

    #[test]
    fn add_child_links_both_sides_and_flips_parent() {
        let mut tree = Tree::new(Vec3::ZERO, 1.0);
        let id = tree.add_child(0, Vec3::new(0.0, 2.0, 0.0), 0.5, 0.9, 10);

        assert_eq!(id, Some(1));
        let child = &tree.nodes[1];
        assert_eq!(child.parent, Some(0));
        assert_eq!(child.dir, Vec3::Y);
        assert_relative_eq!(child.pos.y, 0.5);
        assert!(child.is_terminal);
        assert!(!tree.nodes[0].is_terminal);
        assert_eq!(tree.nodes[0].children, vec![1]);
    }

    #[test]
    fn add_child_respects_node_cap_and_missing_parent() {
        let mut tree = Tree::new(Vec3::ZERO, 1.0);
        assert!(tree.add_child(0, Vec3::Y, 1.0, 1.0, 2).is_some());
        assert!(tree.add_child(1, Vec3::Y, 1.0, 1.0, 2).is_none());
        assert!(tree.add_child(7, Vec3::Y, 1.0, 1.0, 10).is_none());
        assert_eq!(tree.len(), 2);
        assert!(tree.nodes[1].is_terminal);
    }

    #[test]
    fn zero_direction_grows_up() {
        let mut tree = Tree::new(Vec3::ZERO, 1.0);
        tree.add_child(0, Vec3::ZERO, 1.0, 1.0, 10);
        assert_eq!(tree.nodes[1].dir, Vec3::Y);
    }

    #[test]
    fn recompute_radii_follows_pipe_model() {
        let mut tree = Tree::new(Vec3::ZERO, 1.0);
        tree.add_child(0, Vec3::Y, 1.0, 0.3, 10);
        tree.add_child(0, Vec3::X, 1.0, 0.4, 10);
        tree.add_child(1, Vec3::Y, 1.0, 0.2, 10);

        tree.recompute_radii(2.0);

        assert_relative_eq!(tree.nodes[1].radius, 0.2);
        let expected = (0.2f32.powi(2) + 0.4f32.powi(2)).sqrt();
        assert_relative_eq!(tree.nodes[0].radius, expected, epsilon = 1e-6);
    }

    #[test]
    fn max_height_tracks_highest_node() {
        let mut tree = Tree::new(Vec3::ZERO, 1.0);
        assert_eq!(tree.max_height(), 0.0);
        tree.add_child(0, Vec3::Y, 2.0, 1.0, 10);
        tree.add_child(0, Vec3::NEG_Y, 5.0, 1.0, 10);
        assert_relative_eq!(tree.max_height(), 2.0);
        assert_eq!(Tree::default().max_height(), 0.0);
    }

    #[test]
    fn is_terminal_is_false_for_unknown_ids() {
        let tree = Tree::new(Vec3::ZERO, 1.0);
        assert!(tree.is_terminal(0));
        assert!(!tree.is_terminal(3));
    }
}
