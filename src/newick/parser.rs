//! Structs and logic to parse Newick strings.
//!
//! This module provides the [NewickParser] struct, which offers methods
//! to parse single strings or all trees of a file, as well as lazy parsing
//! via a [NewickIterator].

use crate::model::{BranchLength, NodeIndex, Tree};
use crate::newick::defs::{DEFAULT_NUM_LEAVES_GUESS, NEWICK_LABEL_DELIMITERS};
use crate::parser::byte_parser::ByteParser;
use crate::parser::byte_source::ByteSource;
use crate::parser::parsing_error::{ParsingError, ParsingErrorType};
use std::collections::HashSet;

// =#========================================================================#=
// NEWICK PARSER
// =#========================================================================$=
/// Parser (configuration) for single/multiple Newick format phylogenetic
/// trees with any number of children per internal node.
///
/// Besides the grammar, the parser enforces what the downstream analysis
/// relies on: every leaf is named, leaf names are unique within a tree,
/// branch lengths are finite and non-negative, and a tree has at least two
/// leaves. A missing branch length is read as zero.
///
/// # Configuration
/// * [`with_num_leaves(num_leaves)`](Self::with_num_leaves)
///     - Can be configured with number of leaves in trees to parse,
///       otherwise it is inferred from the first parsed tree and then stored.
///
/// # Parsing
/// * [`parse_str`](Self::parse_str) - Parse single tree
/// * [`parse_all`](Self::parse_all) - Parse all trees eagerly
/// * [`into_iter`](Self::into_iter) - Parse trees lazily
///
/// # Example
/// ```
/// use ecotype::newick::NewickParser;
/// use ecotype::parser::ByteParser;
///
/// let input = "(Bsub_168:0.01,(Bsub_W23:0.02,Bsub_PY79:0.02,Bsub_NCIB:0.03):0.005);";
/// let mut byte_parser = ByteParser::for_str(input);
/// let mut newick_parser = NewickParser::new();
///
/// let tree = newick_parser.parse_str(&mut byte_parser).unwrap();
/// assert_eq!(tree.num_leaves(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct NewickParser {
    know_num_leaves: bool,
    num_leaves: usize,
}

// ============================================================================
// Construction & Configuration (pub)
// ============================================================================
impl NewickParser {
    /// Creates a new [NewickParser]; the number of leaves is unknown and
    /// will be counted during parsing of the first tree.
    pub fn new() -> Self {
        Self {
            know_num_leaves: false,
            num_leaves: DEFAULT_NUM_LEAVES_GUESS,
        }
    }

    /// Sets the expected number of leaves in each parsed tree.
    ///
    /// This allows pre-allocation of the tree arena.
    /// If not set, the parser will count leaves during parsing.
    pub fn with_num_leaves(mut self, num_leaves: usize) -> Self {
        self.num_leaves = num_leaves;
        self.know_num_leaves = true;
        self
    }
}

impl Default for NewickParser {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// API Parsing (pub)
// ============================================================================
impl NewickParser {
    /// Consumes the parser and returns an iterator over trees from the byte source.
    ///
    /// # Arguments
    /// * `byte_parser` - A byte parser with underlying source containing only
    ///   Newick strings, except for whitespace and `[...]` comments.
    pub fn into_iter<B: ByteSource>(self, byte_parser: ByteParser<B>) -> NewickIterator<B> {
        NewickIterator {
            byte_parser,
            parser: self,
            done: false,
        }
    }

    /// Parses all Newick trees from the byte source until EOF.
    ///
    /// # Arguments
    /// * `byte_parser` - A byte parser with underlying source containing only
    ///   Newick strings, except for whitespace and `[...]` comments.
    ///
    /// # Returns
    /// * `Ok(Vec<Tree>)` - All parsed trees
    /// * `Err(ParsingError)` - If any tree fails to parse
    pub fn parse_all<B: ByteSource>(
        &mut self,
        mut byte_parser: ByteParser<B>,
    ) -> Result<Vec<Tree>, ParsingError> {
        let mut trees = Vec::new();
        loop {
            byte_parser.skip_comment_and_whitespace()?;
            if byte_parser.is_eof() {
                break;
            }
            trees.push(self.parse_str(&mut byte_parser)?);
        }
        Ok(trees)
    }

    /// Parses a single Newick tree from the given [ByteParser].
    ///
    /// # Arguments
    /// * `parser` - The byte parser positioned at the start of a Newick tree string
    ///
    /// # Returns
    /// * `Ok(Tree)` - The parsed phylogenetic tree
    /// * `Err(ParsingError)` - If the Newick string is invalid, see
    ///   [ParsingErrorType] for the possible reasons
    pub fn parse_str<B: ByteSource>(
        &mut self,
        parser: &mut ByteParser<B>,
    ) -> Result<Tree, ParsingError> {
        let mut state = TreeState {
            tree: Tree::with_capacity(2 * self.num_leaves),
            leaf_names: HashSet::with_capacity(self.num_leaves),
        };

        let root = self.parse_root(parser, &mut state)?;
        state.tree.set_root(root);

        let num_leaves = state.leaf_names.len();
        if num_leaves < 2 {
            return Err(ParsingError::without_context(
                ParsingErrorType::NotEnoughLeaves(num_leaves),
            ));
        }

        // Having parsed a full tree, the number of leaves is now known
        if !self.know_num_leaves {
            self.num_leaves = num_leaves;
            self.know_num_leaves = true;
        }

        Ok(state.tree)
    }
}

// ============================================================================
// Parsing
// ============================================================================
/// Tree under construction together with the leaf names seen so far.
struct TreeState {
    tree: Tree,
    leaf_names: HashSet<String>,
}

impl NewickParser {
    /// Parses the root node and the terminating semicolon:
    /// - `subtree ';'`
    /// - Skips leading comments and whitespace
    fn parse_root<B: ByteSource>(
        &self,
        parser: &mut ByteParser<B>,
        state: &mut TreeState,
    ) -> Result<NodeIndex, ParsingError> {
        parser.skip_comment_and_whitespace()?;
        let root = self.parse_node(parser, state, 0)?;

        parser.skip_comment_and_whitespace()?;
        if parser.consume_if(b';') {
            return Ok(root);
        }
        match parser.peek() {
            None => Err(ParsingError::missing_semicolon(parser)),
            Some(b')') => Err(ParsingError::unmatched_parenthesis(
                parser,
                "')' without matching '('".to_string(),
            )),
            Some(b) => Err(ParsingError::invalid_newick_string(
                parser,
                format!("Expected ';' at end of tree but found {:?}", char::from(b)),
            )),
        }
    }

    /// Parses a node (either internal node or leaf) and returns its index:
    /// - `'(' subtree (',' subtree)* ')' [name] [':' length]` or
    /// - `name [':' length]`
    ///
    /// `depth` is the number of currently open parentheses.
    fn parse_node<B: ByteSource>(
        &self,
        parser: &mut ByteParser<B>,
        state: &mut TreeState,
        depth: usize,
    ) -> Result<NodeIndex, ParsingError> {
        parser.skip_comment_and_whitespace()?;
        if parser.is_eof() {
            return Err(if depth > 0 {
                ParsingError::unmatched_parenthesis(parser, format!("{depth} '(' never closed"))
            } else {
                ParsingError::unexpected_eof(parser)
            });
        }

        if parser.peek_is(b'(') {
            self.parse_internal_node(parser, state, depth)
        } else {
            self.parse_leaf(parser, state)
        }
    }

    /// Parses internal node, adds it to tree, and returns its index.
    /// Expects parser at opening `(`.
    fn parse_internal_node<B: ByteSource>(
        &self,
        parser: &mut ByteParser<B>,
        state: &mut TreeState,
        depth: usize,
    ) -> Result<NodeIndex, ParsingError> {
        let open_position = parser.position();
        parser.next_byte(); // '('

        let mut children = Vec::new();
        loop {
            children.push(self.parse_node(parser, state, depth + 1)?);

            parser.skip_comment_and_whitespace()?;
            match parser.next_byte() {
                Some(b',') => continue,
                Some(b')') => break,
                None | Some(b';') => {
                    return Err(ParsingError::unmatched_parenthesis(
                        parser,
                        format!("'(' at position {open_position} is never closed"),
                    ));
                }
                Some(b) => {
                    return Err(ParsingError::invalid_newick_string(
                        parser,
                        format!("Expected ',' or ')' between children but found {:?}", char::from(b)),
                    ));
                }
            }
        }

        // Internal nodes may carry a label (e.g. a support value); it is kept, not required
        let name = parser.parse_label(NEWICK_LABEL_DELIMITERS)?;
        let branch_length = Self::parse_branch_length(parser)?;

        let index = state.tree.add_internal(children, branch_length);
        if !name.is_empty() {
            state.tree.set_node_name(index, name);
        }
        Ok(index)
    }

    /// Parses leaf node and adds it to tree:
    /// - `label[:branch_length]`
    /// - Expects parser at start of label
    fn parse_leaf<B: ByteSource>(
        &self,
        parser: &mut ByteParser<B>,
        state: &mut TreeState,
    ) -> Result<NodeIndex, ParsingError> {
        let label = parser.parse_label(NEWICK_LABEL_DELIMITERS)?;
        if label.is_empty() {
            return Err(ParsingError::from_parser(ParsingErrorType::EmptyLabel, parser));
        }
        if !state.leaf_names.insert(label.clone()) {
            return Err(ParsingError::from_parser(
                ParsingErrorType::DuplicateLabel(label),
                parser,
            ));
        }

        let branch_length = Self::parse_branch_length(parser)?;
        Ok(state.tree.add_leaf(label, branch_length))
    }

    /// Parses optional branch length `[:number]`:
    /// - Skips comments/whitespace before and after `:`
    /// - Supports scientific notation (e.g., `1.5e-10`)
    ///
    /// # Returns
    /// - the parsed branch length, or [BranchLength::ZERO] if there is none
    /// - [ParsingError] if the value is not a finite, non-negative number
    fn parse_branch_length<B: ByteSource>(
        parser: &mut ByteParser<B>,
    ) -> Result<BranchLength, ParsingError> {
        parser.skip_comment_and_whitespace()?;
        if !parser.consume_if(b':') {
            return Ok(BranchLength::ZERO);
        }
        parser.skip_comment_and_whitespace()?;

        let text = parser.parse_unquoted_label(NEWICK_LABEL_DELIMITERS)?;
        text.parse::<f64>()
            .ok()
            .and_then(BranchLength::try_new)
            .ok_or_else(|| ParsingError::invalid_branch_length(parser, text))
    }
}

// =#========================================================================#=
// NEWICK ITERATOR (lazy parser)
// =#========================================================================$=
/// Iterator to parse Newick trees.
///
/// Created by [NewickParser::into_iter()].
/// Yields `Result<Tree, ParsingError>` for each tree and stops after the
/// first error.
pub struct NewickIterator<B: ByteSource> {
    parser: NewickParser,
    byte_parser: ByteParser<B>,
    done: bool,
}

impl<B: ByteSource> Iterator for NewickIterator<B> {
    type Item = Result<Tree, ParsingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Err(e) = self.byte_parser.skip_comment_and_whitespace() {
            self.done = true;
            return Some(Err(e));
        }
        if self.byte_parser.is_eof() {
            self.done = true;
            return None;
        }

        let result = self.parser.parse_str(&mut self.byte_parser);
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}
