//! Node module for phylogenetic tree representation.

use crate::model::tree::NodeIndex;
use std::ops::Deref;

// =#========================================================================#=
// TREE NODE
// =#========================================================================#=
/// A node of a rooted, ordered phylogenetic tree stored in a
/// [Tree](crate::model::Tree) arena.
///
/// Nodes never own each other: children and parent are [NodeIndex] values
/// into the arena. The parent link is a plain back-reference used for upward
/// navigation (rerooting, depth queries).
///
/// # Invariants
/// - `index` is the node's position in the arena
/// - `branch_length` is finite and non-negative (enforced by [BranchLength])
/// - a node is a leaf iff it has no children
/// - only the root (and nodes detached by pruning) have no parent
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Index of this node in the tree arena
    index: NodeIndex,
    /// Sequence name for leaves; internal nodes keep whatever label the
    /// Newick string gave them, usually none
    name: String,
    /// Distance to parent
    branch_length: BranchLength,
    /// Index of the parent node, `None` for the root
    parent: Option<NodeIndex>,
    /// Ordered child indices, empty for leaves
    children: Vec<NodeIndex>,
}

impl TreeNode {
    /// Creates a new leaf node without parent.
    ///
    /// # Arguments
    /// * `index` - The unique index of this node in the tree (arena)
    /// * `name` - Name of the sequence this leaf represents
    /// * `branch_length` - Distance to parent node
    pub fn new_leaf(index: NodeIndex, name: String, branch_length: BranchLength) -> Self {
        TreeNode {
            index,
            name,
            branch_length,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Creates a new internal node without parent.
    ///
    /// # Arguments
    /// * `index` - The unique index of this node in the tree (arena)
    /// * `children` - Ordered child indices
    /// * `branch_length` - Distance to parent node
    pub fn new_internal(index: NodeIndex, children: Vec<NodeIndex>, branch_length: BranchLength) -> Self {
        TreeNode {
            index,
            name: String::new(),
            branch_length,
            parent: None,
            children,
        }
    }

    /// Returns the index of this node.
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    /// Returns the name of this node (empty for unnamed internal nodes).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the length of the branch to the parent.
    pub fn branch_length(&self) -> BranchLength {
        self.branch_length
    }

    /// Returns the ordered child indices (empty for leaves).
    pub fn children(&self) -> &[NodeIndex] {
        &self.children
    }

    /// Returns the index of the parent, or `None` for the root or a detached node.
    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    /// Returns `true` if this node has a parent set.
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Returns `true` if this node is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns `true` if this node has children.
    pub fn is_internal(&self) -> bool {
        !self.children.is_empty()
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_branch_length(&mut self, branch_length: BranchLength) {
        self.branch_length = branch_length;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeIndex>) {
        self.parent = parent;
    }

    pub(crate) fn set_children(&mut self, children: Vec<NodeIndex>) {
        self.children = children;
    }

    pub(crate) fn push_child(&mut self, child: NodeIndex) {
        self.children.push(child);
    }

    /// Removes `child` from the child list, returning its former position.
    pub(crate) fn remove_child(&mut self, child: NodeIndex) -> Option<usize> {
        let position = self.children.iter().position(|&c| c == child)?;
        self.children.remove(position);
        Some(position)
    }

    /// Replaces `old` by `new` at the same position in the child list.
    pub(crate) fn replace_child(&mut self, old: NodeIndex, new: NodeIndex) {
        if let Some(slot) = self.children.iter_mut().find(|c| **c == old) {
            *slot = new;
        }
    }
}

// =#========================================================================#=
// BRANCH LENGTH
// =#========================================================================#=
/// Branch length in a phylogenetic tree, enforced non-negative and finite.
///
/// Represents the evolutionary distance between a node and its parent.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct BranchLength(f64);

impl BranchLength {
    /// Length of a branch that was not given a length.
    pub const ZERO: BranchLength = BranchLength(0.0);

    /// Creates a new branch length.
    ///
    /// # Panics
    /// Panics if `length` is negative or not finite.
    pub fn new(length: f64) -> Self {
        assert!(length >= 0.0, "Branch length must be non-negative, got {}", length);
        assert!(length.is_finite(), "Branch length must be finite, got {}", length);
        BranchLength(length)
    }

    /// Creates a new branch length, or `None` if `length` is negative or not finite.
    pub fn try_new(length: f64) -> Option<Self> {
        (length.is_finite() && length >= 0.0).then_some(BranchLength(length))
    }
}

impl Deref for BranchLength {
    type Target = f64;
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl std::ops::Add for BranchLength {
    type Output = BranchLength;

    fn add(self, other: BranchLength) -> BranchLength {
        BranchLength(self.0 + other.0)
    }
}
