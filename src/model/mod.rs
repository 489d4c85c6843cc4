//! Tree model: arena-based [Tree] of [TreeNode]s with branch lengths.

/// Phylogenetic tree structure and operations
pub mod tree;
/// Tree nodes and branch lengths
pub mod node;

pub use node::{BranchLength, TreeNode};
pub use tree::{NodeIndex, PostOrderIter, PreOrderIter, Tree};
