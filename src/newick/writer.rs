//! Newick format writing for [Tree]s.
//!
//! Leaves are written as `name:length`, internal nodes as `(...):length`
//! without their label, which is the form external phylogenetics tools
//! expect. The root's length is only written when it is non-zero.

use crate::model::{NodeIndex, Tree};
use crate::parser::utils::escape_label;
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Extra buffer in Newick string length/capacity estimate
const BUFFER_CHARS: usize = 10;

/// Writes given list of trees to a file in Newick format, one tree per line.
///
/// # Errors
/// Returns an I/O error if writing fails.
///
/// # Example
/// ```no_run
/// use ecotype::newick::{parse_str, write_newick_file};
/// use std::fs::File;
///
/// let tree = parse_str("(A:0.1,(B:0.05,C:0.02):0.03);").unwrap();
/// let file = File::create("trees.nwk").unwrap();
/// write_newick_file(file, &[tree]).unwrap();
/// ```
pub fn write_newick_file(file: File, trees: &[Tree]) -> io::Result<()> {
    let Some(first) = trees.first() else {
        return Ok(());
    };

    let mut writer = BufWriter::new(file);
    let estimated_capacity = estimate_newick_len(first);
    for tree in trees {
        let newick = to_newick_with_capacity(tree, estimated_capacity);
        writer.write_all(newick.as_bytes())?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(())
}

/// Returns the Newick representation of the tree with closing semicolon.
///
/// Children are written in their current order; call
/// [Tree::sort_children] first for a canonical form.
///
/// # Example
/// ```
/// use ecotype::newick::{parse_str, to_newick};
///
/// let tree = parse_str("(A:0.1,(B:0.05,C:0.02)x:0.03);").unwrap();
/// assert_eq!(to_newick(&tree), "(A:0.1,(B:0.05,C:0.02):0.03);");
/// ```
pub fn to_newick(tree: &Tree) -> String {
    if !tree.is_root_set() {
        return String::new();
    }
    to_newick_with_capacity(tree, estimate_newick_len(tree))
}

/// Returns the Newick representation of a tree with pre-allocated capacity.
fn to_newick_with_capacity(tree: &Tree, estimated_capacity: usize) -> String {
    // Recursive helper for building the Newick string
    fn build_newick(tree: &Tree, newick: &mut String, index: NodeIndex) {
        let node = &tree[index];

        if node.is_leaf() {
            newick.push_str(&escape_label(node.name()));
        } else {
            newick.push('(');
            for (i, &child) in node.children().iter().enumerate() {
                if i > 0 {
                    newick.push(',');
                }
                build_newick(tree, newick, child);
            }
            newick.push(')');
        }

        let length = *node.branch_length();
        if node.has_parent() || length > 0.0 {
            newick.push(':');
            newick.push_str(&length.to_string());
        }
    }

    let mut newick = String::with_capacity(estimated_capacity);
    build_newick(tree, &mut newick, tree.root_index());
    newick.push(';');

    newick
}

/// Estimates the number of characters of the Newick representation.
fn estimate_newick_len(tree: &Tree) -> usize {
    // Each internal node: "()" plus a ',' per child
    const INTERNAL_NODE_CHARS: usize = 3;
    // Branch lengths: ~20 chars each (e.g., ":0.009529961339106089")
    const BRANCH_LENGTH_CHARS: usize = 20;

    let structure_capacity = tree.num_internal() * INTERNAL_NODE_CHARS;
    let label_capacity: usize = tree
        .leaves()
        .iter()
        .map(|leaf| escape_label(leaf.name()).len())
        .sum();
    let branch_capacity = tree.num_nodes() * BRANCH_LENGTH_CHARS;

    structure_capacity + label_capacity + branch_capacity + BUFFER_CHARS
}
