//! Provides the arena-based tree representation.
//!
//! Provides core data structures for representing phylogenetic trees:
//! * [Tree] - rooted, ordered tree of [TreeNode]s using the arena pattern
//! * [NodeIndex] as type used to index nodes in tree
//! * [PreOrderIter] and [PostOrderIter] for stack-based traversal

use crate::error::EcotypeError;
use crate::model::node::{BranchLength, TreeNode};
use crate::newick;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Index of a node in a tree (arena).
pub type NodeIndex = usize;

/// *During construction only*, index for unset root.
const NO_ROOT_SET_INDEX: NodeIndex = usize::MAX;

// =$========================================================================$=
// TREE
// =$========================================================================$=
/// A rooted, ordered phylogenetic tree represented using the arena pattern
/// on [TreeNode].
///
/// Nodes are stored in a contiguous vector and referenced by [NodeIndex];
/// children are owned through index lists and parents are plain
/// back-references, so no reference cycles can arise.
///
/// # Structure
/// - All nodes (root, internal, and leaves) are stored in the arena.
/// - Index of root is maintained.
/// - Nodes may have any number of children, in a meaningful order.
/// - Pruning ([remove_leaf](Self::remove_leaf)) and
///   [reroot](Self::reroot) detach nodes instead of shrinking the arena;
///   all queries only consider nodes reachable from the root.
///
/// # Construction
/// Trees are normally obtained from [newick::parse_str]. For programmatic
/// construction add leaves and internal nodes bottom-up, then set the root:
///
/// ```
/// use ecotype::model::{BranchLength, Tree};
///
/// // (A:0.1,(B:0.05,C:0.02):0.03);
/// let mut tree = Tree::new();
/// let a = tree.add_leaf("A".to_string(), BranchLength::new(0.1));
/// let b = tree.add_leaf("B".to_string(), BranchLength::new(0.05));
/// let c = tree.add_leaf("C".to_string(), BranchLength::new(0.02));
/// let bc = tree.add_internal(vec![b, c], BranchLength::new(0.03));
/// let root = tree.add_internal(vec![a, bc], BranchLength::ZERO);
/// tree.set_root(root);
///
/// assert!(tree.is_valid());
/// assert_eq!(tree.leaf_names(), vec!["A", "B", "C"]);
/// ```
#[derive(Debug, Clone)]
pub struct Tree {
    /// Nodes of this tree (arena pattern)
    nodes: Vec<TreeNode>,

    /// Index of the root of this tree
    root_index: NodeIndex,
}

// ============================================================================
// New, Construction, Getters (pub)
// ============================================================================
impl Tree {
    /// Creates a new empty tree; the root has to be set once constructed.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new empty tree with room for `num_nodes` nodes.
    pub fn with_capacity(num_nodes: usize) -> Self {
        Tree {
            nodes: Vec::with_capacity(num_nodes),
            root_index: NO_ROOT_SET_INDEX,
        }
    }

    /// Adds a leaf to the tree, assigning a unique index, which gets returned.
    ///
    /// # Arguments
    /// * `name` - Name of the sequence this leaf stands for
    /// * `branch_length` - Length of incoming branch, i.e. distance to parent
    pub fn add_leaf(&mut self, name: String, branch_length: BranchLength) -> NodeIndex {
        let index = self.nodes.len();
        self.nodes.push(TreeNode::new_leaf(index, name, branch_length));
        index
    }

    /// Adds an internal node with the given ordered children, assigning a
    /// unique index, which gets returned. Sets the parent of all children.
    ///
    /// # Arguments
    /// * `children` - Ordered child indices, previously added to this tree
    /// * `branch_length` - Length of incoming branch, i.e. distance to parent
    ///
    /// # Panics
    /// Panics if a child index is out of bounds.
    pub fn add_internal(&mut self, children: Vec<NodeIndex>, branch_length: BranchLength) -> NodeIndex {
        let index = self.nodes.len();
        for &child in &children {
            self.nodes[child].set_parent(Some(index));
        }
        self.nodes
            .push(TreeNode::new_internal(index, children, branch_length));
        index
    }

    /// Labels the node at `index`, e.g. an internal node carrying a support value.
    pub(crate) fn set_node_name(&mut self, index: NodeIndex, name: String) {
        self.nodes[index].set_name(name);
    }

    /// Declares the node at `index` to be the root.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn set_root(&mut self, index: NodeIndex) {
        self.nodes[index].set_parent(None);
        self.root_index = index;
    }

    /// Returns whether root of tree has been set.
    pub fn is_root_set(&self) -> bool {
        self.root_index != NO_ROOT_SET_INDEX
    }

    /// Returns the index of the root.
    pub fn root_index(&self) -> NodeIndex {
        self.root_index
    }

    /// Returns a reference to the root node.
    ///
    /// # Panics
    /// Panics if the root hasn't been set and thus tree hasn't been fully constructed yet.
    pub fn root(&self) -> &TreeNode {
        &self[self.root_index]
    }

    /// Returns a reference to the node at the given index.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn node(&self, index: NodeIndex) -> &TreeNode {
        &self[index]
    }

    /// Returns the number of leaves reachable from the root.
    pub fn num_leaves(&self) -> usize {
        self.pre_order_iter().filter(|n| n.is_leaf()).count()
    }

    /// Returns the number of internal nodes (root included) reachable from the root.
    pub fn num_internal(&self) -> usize {
        self.pre_order_iter().filter(|n| n.is_internal()).count()
    }

    /// Returns the number of nodes reachable from the root.
    pub fn num_nodes(&self) -> usize {
        self.pre_order_iter().count()
    }

    /// Returns the leaves in left-to-right order.
    ///
    /// A node contributes itself if it is a leaf, otherwise its children
    /// contribute in order; the result is deterministic for a fixed tree.
    pub fn leaves(&self) -> Vec<&TreeNode> {
        if !self.is_root_set() {
            return Vec::new();
        }
        self.descendant_leaves(self.root_index)
    }

    /// Returns the names of all leaves in left-to-right order.
    pub fn leaf_names(&self) -> Vec<String> {
        self.leaves().iter().map(|n| n.name().to_string()).collect()
    }

    /// Returns the leaves below `index` (or the node itself if it is a leaf),
    /// in left-to-right order.
    pub fn descendant_leaves(&self, index: NodeIndex) -> Vec<&TreeNode> {
        self.subtree_iter(index).filter(|n| n.is_leaf()).collect()
    }

    /// Returns the names of the leaves below `index`, in left-to-right order.
    pub fn descendant_leaf_names(&self, index: NodeIndex) -> Vec<String> {
        self.descendant_leaves(index)
            .iter()
            .map(|n| n.name().to_string())
            .collect()
    }

    /// Returns the index of the reachable leaf called `name`, if any.
    pub fn find_leaf(&self, name: &str) -> Option<NodeIndex> {
        self.pre_order_iter()
            .find(|n| n.is_leaf() && n.name() == name)
            .map(|n| n.index())
    }

    /// Returns the distance from the root to the node at `index`.
    pub fn depth_of(&self, index: NodeIndex) -> f64 {
        let mut depth = 0.0;
        let mut current = index;
        while let Some(parent) = self.nodes[current].parent() {
            depth += *self.nodes[current].branch_length();
            current = parent;
        }
        depth
    }

    /// Returns the maximum distance from the node at `index` down to any
    /// leaf of its subtree (0 for a leaf).
    pub fn max_leaf_distance(&self, index: NodeIndex) -> f64 {
        let mut max_distance: f64 = 0.0;
        let mut stack = vec![(index, 0.0)];
        while let Some((current, distance)) = stack.pop() {
            let node = &self.nodes[current];
            if node.is_leaf() {
                max_distance = max_distance.max(distance);
            }
            for &child in node.children() {
                stack.push((child, distance + *self.nodes[child].branch_length()));
            }
        }
        max_distance
    }

    /// Returns the patristic distance (sum of branch lengths on the path)
    /// between the nodes at `a` and `b`.
    pub fn patristic_distance(&self, a: NodeIndex, b: NodeIndex) -> f64 {
        let ancestors_of_a: HashSet<NodeIndex> = self.path_to_root(a).into_iter().collect();
        let lca = self
            .path_to_root(b)
            .into_iter()
            .find(|n| ancestors_of_a.contains(n))
            .unwrap_or(self.root_index);
        self.depth_of(a) + self.depth_of(b) - 2.0 * self.depth_of(lca)
    }

    /// Validates the tree structure and all index references.
    ///
    /// Checks:
    /// - Root index is set, within bounds and has no parent
    /// - Every reachable node's index matches its arena position
    /// - Every child points back to its parent, and no node is reached twice
    /// - The tree has more than one leaf
    ///
    /// # Returns
    /// `true` if tree is valid, `false` otherwise
    pub fn is_valid(&self) -> bool {
        if self.root_index == NO_ROOT_SET_INDEX || self.root_index >= self.nodes.len() {
            return false;
        }
        if self.nodes[self.root_index].has_parent() {
            return false;
        }

        let mut seen = vec![false; self.nodes.len()];
        let mut leaf_count = 0;
        let mut stack = vec![self.root_index];
        while let Some(index) = stack.pop() {
            if seen[index] {
                return false;
            }
            seen[index] = true;

            let node = &self.nodes[index];
            if node.index() != index {
                return false;
            }
            if node.is_leaf() {
                leaf_count += 1;
            }
            for &child in node.children() {
                if child >= self.nodes.len() || self.nodes[child].parent() != Some(index) {
                    return false;
                }
                stack.push(child);
            }
        }

        leaf_count > 1
    }

    /// Returns the Newick representation of this tree (see [newick::to_newick]).
    pub fn to_newick(&self) -> String {
        newick::to_newick(self)
    }

    /// Indices from `index` up to and including the root.
    fn path_to_root(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut path = vec![index];
        let mut current = index;
        while let Some(parent) = self.nodes[current].parent() {
            path.push(parent);
            current = parent;
        }
        path
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<NodeIndex> for Tree {
    type Output = TreeNode;

    fn index(&self, index: NodeIndex) -> &Self::Output {
        &self.nodes[index]
    }
}

// ============================================================================
// Mutation (pub)
// ============================================================================
impl Tree {
    /// Reroots the tree so that the leaf called `leaf_name` becomes the first
    /// child of a new root (outgroup convention).
    ///
    /// The outgroup's incoming branch is split in half between the outgroup
    /// and the rest of the tree, the path to the old root is reversed, and the
    /// old root is dissolved if it is left with a single child. Patristic
    /// distances between leaves are unchanged.
    ///
    /// # Errors
    /// [EcotypeError::NotFound] if no leaf is called `leaf_name`.
    pub fn reroot(&mut self, leaf_name: &str) -> Result<(), EcotypeError> {
        let leaf = self
            .find_leaf(leaf_name)
            .ok_or_else(|| EcotypeError::NotFound(leaf_name.to_string()))?;
        let Some(parent) = self.nodes[leaf].parent() else {
            // A single-node tree is already rooted at its only leaf
            return Ok(());
        };
        let old_root = self.root_index;

        // Already the outgroup of a bifurcating root: only move it to the front
        if parent == old_root && self.nodes[old_root].children().len() == 2 {
            let others: Vec<NodeIndex> = self.nodes[old_root]
                .children()
                .iter()
                .copied()
                .filter(|&c| c != leaf)
                .collect();
            let mut children = vec![leaf];
            children.extend(others);
            self.nodes[old_root].set_children(children);
            return Ok(());
        }

        // path = [parent, grandparent, ..., old_root]
        let path = self.path_to_root(parent);
        let lengths: Vec<BranchLength> = path.iter().map(|&p| self.nodes[p].branch_length()).collect();

        self.nodes[parent].remove_child(leaf);
        for i in 0..path.len() - 1 {
            let (child, ancestor) = (path[i], path[i + 1]);
            self.nodes[ancestor].remove_child(child);
            self.nodes[ancestor].set_parent(Some(child));
            self.nodes[ancestor].set_branch_length(lengths[i]);
            self.nodes[child].push_child(ancestor);
        }

        let half = BranchLength::new(*self.nodes[leaf].branch_length() / 2.0);
        let new_root = self.add_internal(vec![leaf, parent], BranchLength::ZERO);
        self.nodes[leaf].set_branch_length(half);
        self.nodes[parent].set_branch_length(half);
        self.root_index = new_root;

        if old_root != parent {
            self.dissolve_if_unary(old_root);
        }

        Ok(())
    }

    /// Detaches the leaf called `name` from its parent and returns its index.
    ///
    /// The parent is left as it is even if it becomes unary; collapsing it is
    /// the caller's responsibility.
    ///
    /// # Errors
    /// [EcotypeError::NotFound] if no leaf is called `name`.
    pub fn remove_leaf(&mut self, name: &str) -> Result<NodeIndex, EcotypeError> {
        let leaf = self
            .find_leaf(name)
            .ok_or_else(|| EcotypeError::NotFound(name.to_string()))?;
        // The root is always internal, so every reachable leaf has a parent
        if let Some(parent) = self.nodes[leaf].parent() {
            self.nodes[parent].remove_child(leaf);
            self.nodes[leaf].set_parent(None);
        }
        Ok(leaf)
    }

    /// Recursively sorts the children of every node with the default
    /// criterion: deepest subtree first, measured as the maximum distance from
    /// the parent through the child down to any leaf; ties are broken by name
    /// (the smallest leaf name for internal nodes).
    ///
    /// Logically equal trees thus serialize identically.
    pub fn sort_children(&mut self) {
        let mut heights = vec![0.0; self.nodes.len()];
        let mut names: Vec<String> = vec![String::new(); self.nodes.len()];

        let order: Vec<NodeIndex> = self.post_order_iter().map(|n| n.index()).collect();
        for index in order {
            let node = &self.nodes[index];
            if node.is_leaf() {
                names[index] = node.name().to_string();
                continue;
            }
            let mut height: f64 = 0.0;
            let mut smallest: Option<&str> = None;
            for &child in node.children() {
                height = height.max(*self.nodes[child].branch_length() + heights[child]);
                let name = names[child].as_str();
                if smallest.is_none_or(|s| name < s) {
                    smallest = Some(name);
                }
            }
            heights[index] = height;
            names[index] = if node.name().is_empty() {
                smallest.unwrap_or_default().to_string()
            } else {
                node.name().to_string()
            };
        }

        self.sort_children_by(|tree, a, b| {
            let key_a = *tree[a].branch_length() + heights[a];
            let key_b = *tree[b].branch_length() + heights[b];
            key_b
                .total_cmp(&key_a)
                .then_with(|| names[a].cmp(&names[b]))
        });
    }

    /// Recursively sorts the children of every node with an explicit comparator.
    ///
    /// # Arguments
    /// * `compare` - Orders two sibling nodes given by index; receives the tree
    ///   so that it can inspect subtrees
    pub fn sort_children_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&Tree, NodeIndex, NodeIndex) -> Ordering,
    {
        let order: Vec<NodeIndex> = self.pre_order_iter().map(|n| n.index()).collect();
        for index in order {
            let mut children = self.nodes[index].children().to_vec();
            let tree: &Tree = self;
            children.sort_by(|&a, &b| compare(tree, a, b));
            self.nodes[index].set_children(children);
        }
    }

    /// Replaces an internal node with a single remaining child by that child
    /// (branch lengths add up) and removes a childless former internal node.
    fn dissolve_if_unary(&mut self, index: NodeIndex) {
        let Some(parent) = self.nodes[index].parent() else {
            return;
        };
        let children = self.nodes[index].children().to_vec();
        match children.as_slice() {
            [] => {
                self.nodes[parent].remove_child(index);
            }
            &[only_child] => {
                let length = self.nodes[only_child].branch_length() + self.nodes[index].branch_length();
                self.nodes[only_child].set_branch_length(length);
                self.nodes[only_child].set_parent(Some(parent));
                self.nodes[parent].replace_child(index, only_child);
                self.nodes[index].set_children(Vec::new());
            }
            _ => return,
        }
        self.nodes[index].set_parent(None);
    }
}

// =$========================================================================$=
// ITERATORS
// =$========================================================================$=
impl Tree {
    /// Returns an iterator over the tree in pre-order (parents before
    /// children, children left to right).
    pub fn pre_order_iter(&self) -> PreOrderIter<'_> {
        if self.is_root_set() {
            self.subtree_iter(self.root_index)
        } else {
            PreOrderIter {
                tree: self,
                stack: Vec::new(),
            }
        }
    }

    /// Returns a pre-order iterator over the subtree rooted at `index`.
    pub fn subtree_iter(&self, index: NodeIndex) -> PreOrderIter<'_> {
        PreOrderIter {
            tree: self,
            stack: vec![index],
        }
    }

    /// Returns an iterator over the tree in post-order (children before parents).
    ///
    /// Useful for aggregating data from leaves upward.
    pub fn post_order_iter(&self) -> PostOrderIter<'_> {
        let mut stack = Vec::new();
        if self.is_root_set() {
            stack.push((self.root_index, false));
        }
        PostOrderIter { tree: self, stack }
    }
}

/// Iterator for pre-order traversal (parents before children).
///
/// Uses a stack instead of recursion, so deep caterpillar trees do not
/// exhaust the call stack.
pub struct PreOrderIter<'a> {
    tree: &'a Tree,
    stack: Vec<NodeIndex>,
}

impl<'a> Iterator for PreOrderIter<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.stack.pop()?;
        let node = &self.tree[index];

        // Push children in reverse, so the leftmost is processed first
        self.stack.extend(node.children().iter().rev());

        Some(node)
    }
}

/// Iterator for post-order traversal (children before parents).
pub struct PostOrderIter<'a> {
    tree: &'a Tree,
    stack: Vec<(NodeIndex, bool)>, // (index, children_visited)
}

impl<'a> Iterator for PostOrderIter<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((index, children_visited)) = self.stack.pop() {
            let node = &self.tree[index];

            if children_visited || node.is_leaf() {
                return Some(node);
            }

            self.stack.push((index, true));
            for &child in node.children().iter().rev() {
                self.stack.push((child, false));
            }
        }
        None
    }
}
