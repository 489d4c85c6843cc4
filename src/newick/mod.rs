//! Newick format parser and writer for phylogenetic trees.
//!
//! This module provides [`NewickParser`] to parse Newick format strings
//! into [`Tree`]s and [`to_newick`] to serialize them again.
//!
//! # Quick API
//! For simple use cases with default settings:
//! * [`parse_file`] - parses all trees of a file
//! * [`parse_str`] - parses a single string
//!
//! # Full API
//! For more control, configure a [`NewickParser`] and provide a [`ByteParser`]:
//! * [`NewickParser::parse_str`] - parse a single tree
//! * [`NewickParser::parse_all`] - parse all trees until EOF
//! * [`NewickParser::into_iter`] - obtain an iterator over trees
//!
//! # Format
//! The Newick format has the following simple grammar:
//! * `tree ::= subtree ';'`
//! * `subtree ::= '(' subtree (',' subtree)* ')' meta | meta`
//! * `meta ::= [label] [':' number]`
//!
//! Furthermore:
//! * Leaves must be labelled, and labels must be unique within a tree
//! * Labels may be single-quoted (`'B. subtilis 168'`, `''` escapes a quote)
//! * Whitespace can occur between elements,
//!   just not within an unquoted label or a branch length
//! * Comments are square brackets and can occur anywhere where whitespace is allowed
//!
//! Any violation is reported as [EcotypeError::MalformedTree].

mod defs;
mod parser;
pub mod writer;

pub use self::parser::{NewickIterator, NewickParser};
pub use self::writer::{to_newick, write_newick_file};

use crate::error::EcotypeError;
use crate::model::Tree;
use crate::parser::byte_parser::ByteParser;
use crate::parser::byte_source::InMemoryByteSource;
use std::path::Path;

// ============================================================================
// QUICK PARSING API (pub)
// ============================================================================
/// Parses a Newick file eagerly and returns all trees.
///
/// This is a convenience function to parse a file containing
/// semicolon-separated list of Newick strings,
/// using default settings and thus not requiring configuration of a parser.
///
/// # Arguments
/// * `path` - Path to the file (accepting `&str`, `String`, `Path`, or `PathBuf`)
///
/// # Errors
/// * [EcotypeError::Io] - If the file cannot be read
/// * [EcotypeError::MalformedTree] - If any tree is invalid
///
/// # Example
/// ```no_run
/// use ecotype::newick::parse_file;
///
/// let trees = parse_file("bacillus.nwk").unwrap();
/// println!("Parsed {} trees", trees.len());
/// ```
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<Tree>, EcotypeError> {
    let byte_parser = ByteParser::new(InMemoryByteSource::from_file(path)?);

    let mut newick_parser = NewickParser::new();
    Ok(newick_parser.parse_all(byte_parser)?)
}

/// Parses a single Newick string to obtain a [`Tree`].
///
/// # Errors
/// [EcotypeError::MalformedTree] when the terminating `;` is missing,
/// parentheses are unmatched, a branch length is not a finite non-negative
/// number, a leaf is unnamed or named twice, or the tree has fewer than two
/// leaves.
///
/// # Example
/// ```
/// use ecotype::newick::parse_str;
///
/// let tree = parse_str("(A:0.1,(B:0.05,C:0.02):0.03);").unwrap();
/// assert_eq!(tree.leaf_names(), vec!["A", "B", "C"]);
/// assert!(parse_str("(A:0.1,B:0.2)").is_err());
/// ```
pub fn parse_str<S: AsRef<str>>(newick: S) -> Result<Tree, EcotypeError> {
    let mut newick_parser = NewickParser::new();
    let mut byte_parser = ByteParser::for_str(newick.as_ref());
    Ok(newick_parser.parse_str(&mut byte_parser)?)
}
