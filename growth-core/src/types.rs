/// Identifier for a node in a [`crate::tree::Tree`].
///
/// This is an index into `Tree::nodes`. Ids are assigned in creation
/// order and never reused, so a child's id is always larger than its
/// parent's.
pub type NodeId = usize;

/// Opaque handle to a material owned by the host renderer.
///
/// The core never interprets the value; it only forwards the handle
/// alongside the submesh it was assigned to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u64);
