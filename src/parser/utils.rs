//! Utility functions for label escaping in Newick strings.
//!
//! Sequence identifiers are written verbatim whenever possible; anything
//! that would confuse a Newick reader is wrapped in single quotes.

/// Characters that end an unquoted Newick label or start a comment.
const SPECIAL_CHARS: &[char] = &[
    ' ', ',', ';', '\t', '\n', '\r', '(', ')', ':', '[', ']', '\'',
];

/// Checks if a label can be written without quoting.
///
/// # Examples
/// ```
/// # use ecotype::parser::utils::needs_quotes;
/// assert!(!needs_quotes("Bacillus_subtilis_168"));
/// assert!(needs_quotes("Bacillus subtilis"));
/// assert!(needs_quotes("strain:42"));
/// assert!(needs_quotes(""));
/// ```
pub fn needs_quotes(label: &str) -> bool {
    label.is_empty() || label.contains(SPECIAL_CHARS)
}

/// Escapes a label for use in a Newick string.
///
/// Labels containing whitespace or punctuation are wrapped in single quotes
/// and internal single quotes are doubled. Other labels are returned as-is,
/// so that [ByteParser::parse_label](crate::parser::ByteParser::parse_label)
/// reads back exactly the original label.
///
/// # Examples
/// ```
/// # use ecotype::parser::utils::escape_label;
/// assert_eq!(escape_label("Pukeko"), "Pukeko");
/// assert_eq!(escape_label("Pu[ke]ko"), "'Pu[ke]ko'");
/// assert_eq!(escape_label("Australasian Swamphen"), "'Australasian Swamphen'");
/// assert_eq!(escape_label("Baillon's Crake"), "'Baillon''s Crake'");
/// ```
pub fn escape_label(label: &str) -> String {
    if needs_quotes(label) {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ByteParser;

    #[test]
    fn test_escaped_labels_read_back_verbatim() {
        for label in ["A", "strain 7", "x:y", "Wilson's", "(paren)", "a_b"] {
            let escaped = escape_label(label);
            let mut parser = ByteParser::for_str(&escaped);
            assert_eq!(parser.parse_label(b",):;").unwrap(), label);
        }
    }

    #[test]
    fn test_only_special_labels_are_quoted() {
        assert_eq!(escape_label("with space"), "'with space'");
        assert_eq!(escape_label("nospace"), "nospace");
    }
}
