//! Error types for the Newick and FASTA parsers.
//!
//! This module provides [ParsingError] and [ParsingErrorType] for representing
//! and reporting errors that occur while reading trees and alignments.

use crate::parser::byte_parser::ByteParser;
use crate::parser::byte_source::ByteSource;
use std::error::Error;
use std::fmt;

/// Default length of context provided by error from parser
const DEFAULT_CONTEXT_LENGTH: usize = 50;

// =#========================================================================#=
// PARSING ERROR TYPE
// =#========================================================================#=
/// Error types that can occur while parsing Newick strings or FASTA alignments.
#[derive(thiserror::Error, PartialEq, Debug, Clone)]
pub enum ParsingErrorType {
    #[error("Unexpected end of input")]
    UnexpectedEOF,
    #[error("Unclosed comment")]
    UnclosedComment,
    #[error("Invalid newick string: {0}")]
    InvalidNewickString(String),
    #[error("Unmatched parenthesis: {0}")]
    UnmatchedParenthesis(String),
    #[error("Missing terminating ';'")]
    MissingSemicolon,
    #[error("Invalid branch length '{0}'")]
    InvalidBranchLength(String),
    #[error("Leaf without name")]
    EmptyLabel,
    #[error("Duplicate leaf name '{0}'")]
    DuplicateLabel(String),
    #[error("Not enough leaves: tree has {0}, needs at least 2")]
    NotEnoughLeaves(usize),
    #[error("Invalid FASTA alignment: {0}")]
    InvalidFasta(String),
}

// =#========================================================================#=
// PARSING ERROR
// =#========================================================================$=
/// Parsing error with contextual information (position and upcoming bytes).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsingError {
    kind: ParsingErrorType,
    position: usize,
    context: String,
}

impl ParsingError {
    /// Create a ParsingError from an error type and parser state
    pub fn from_parser<S: ByteSource>(kind: ParsingErrorType, parser: &ByteParser<S>) -> Self {
        Self {
            kind,
            position: parser.position(),
            context: parser.get_context_as_string(DEFAULT_CONTEXT_LENGTH),
        }
    }

    /// Convenience constructor for UnexpectedEOF
    pub fn unexpected_eof<S: ByteSource>(parser: &ByteParser<S>) -> Self {
        Self::from_parser(ParsingErrorType::UnexpectedEOF, parser)
    }

    /// Convenience constructor for UnclosedComment
    pub fn unclosed_comment<S: ByteSource>(parser: &ByteParser<S>) -> Self {
        Self::from_parser(ParsingErrorType::UnclosedComment, parser)
    }

    /// Convenience constructor for InvalidNewickString
    pub fn invalid_newick_string<S: ByteSource>(parser: &ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorType::InvalidNewickString(msg), parser)
    }

    /// Convenience constructor for UnmatchedParenthesis
    pub fn unmatched_parenthesis<S: ByteSource>(parser: &ByteParser<S>, msg: String) -> Self {
        Self::from_parser(ParsingErrorType::UnmatchedParenthesis(msg), parser)
    }

    /// Convenience constructor for MissingSemicolon
    pub fn missing_semicolon<S: ByteSource>(parser: &ByteParser<S>) -> Self {
        Self::from_parser(ParsingErrorType::MissingSemicolon, parser)
    }

    /// Convenience constructor for InvalidBranchLength
    pub fn invalid_branch_length<S: ByteSource>(parser: &ByteParser<S>, text: String) -> Self {
        Self::from_parser(ParsingErrorType::InvalidBranchLength(text), parser)
    }

    /// Create a ParsingError without parser context (for structural checks after parsing)
    pub fn without_context(kind: ParsingErrorType) -> Self {
        Self {
            kind,
            position: 0,
            context: String::new(),
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> &ParsingErrorType {
        &self.kind
    }

    /// Get the position where the error occurred
    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        // Structural checks carry no position
        if !self.context.is_empty() || self.position > 0 {
            write!(f, " at position {}", self.position)?;
        }

        if !self.context.is_empty() {
            write!(f, "\n  Context (next {} bytes): {}", self.context.len(), self.context)?;
        }

        Ok(())
    }
}

impl Error for ParsingError {}
