//! Multiple sequence alignments in FASTA format.
//!
//! The alignment provides the two inputs a demarcation needs besides the
//! tree: the analysed sequence length (after removing gap columns) and the
//! set of sequence identifiers, from which recombinant leaves are derived.

use crate::error::EcotypeError;
use crate::parser::parsing_error::{ParsingError, ParsingErrorType};
use bio::io::fasta;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Characters marking an alignment gap
const GAP_CHARS: &[u8] = b"-.";

/// A set of equally long, uniquely named sequences.
///
/// Sequences are stored uppercase; identifiers are the first word of each
/// FASTA header line.
///
/// # Example
/// ```
/// use ecotype::alignment::Alignment;
///
/// let alignment = Alignment::from_fasta_str(">A strain A\nAC-GT\n>B\nACTGA\n").unwrap();
/// assert_eq!(alignment.identifiers(), &["A", "B"]);
/// assert_eq!(alignment.width(), 5);
/// assert_eq!(alignment.sequence_length(), 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Alignment {
    identifiers: Vec<String>,
    rows: Vec<Vec<u8>>,
}

impl Alignment {
    /// Creates an alignment from identifiers and their aligned sequences.
    ///
    /// # Errors
    /// [EcotypeError::MalformedAlignment] if the alignment is empty, an
    /// identifier or sequence is empty, an identifier occurs twice, or the
    /// rows differ in length.
    pub fn new(records: Vec<(String, Vec<u8>)>) -> Result<Self, EcotypeError> {
        let (identifiers, rows): (Vec<String>, Vec<Vec<u8>>) = records
            .into_iter()
            .map(|(id, row)| (id, row.to_ascii_uppercase()))
            .unzip();
        Self::validate(&identifiers, &rows).map_err(EcotypeError::MalformedAlignment)?;
        Ok(Self { identifiers, rows })
    }

    /// Parses an alignment from a FASTA string.
    ///
    /// Sequences may span several lines; whitespace within sequences is
    /// ignored.
    ///
    /// # Errors
    /// [EcotypeError::MalformedAlignment] for syntax errors and for the
    /// conditions listed at [new](Self::new).
    pub fn from_fasta_str(fasta: &str) -> Result<Self, EcotypeError> {
        Self::from_reader(fasta.as_bytes())
    }

    /// Reads an alignment from a FASTA file.
    ///
    /// # Errors
    /// [EcotypeError::Io] if the file cannot be read, otherwise as
    /// [from_fasta_str](Self::from_fasta_str).
    pub fn from_fasta_file<P: AsRef<Path>>(path: P) -> Result<Self, EcotypeError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Reads `>identifier [description]` records; descriptions are dropped.
    fn from_reader<R: Read>(reader: R) -> Result<Self, EcotypeError> {
        let mut records = Vec::new();
        for result in fasta::Reader::new(reader).records() {
            let record = result.map_err(|e| {
                EcotypeError::MalformedAlignment(ParsingError::without_context(
                    ParsingErrorType::InvalidFasta(e.to_string()),
                ))
            })?;
            let row: Vec<u8> = record
                .seq()
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            records.push((record.id().to_string(), row));
        }
        Self::new(records)
    }

    fn validate(identifiers: &[String], rows: &[Vec<u8>]) -> Result<(), ParsingError> {
        let invalid = |msg: String| {
            ParsingError::without_context(ParsingErrorType::InvalidFasta(msg))
        };

        if identifiers.is_empty() {
            return Err(invalid("alignment contains no sequences".to_string()));
        }

        let mut seen = HashSet::with_capacity(identifiers.len());
        for (id, row) in identifiers.iter().zip(rows) {
            if id.is_empty() {
                return Err(invalid("sequence without identifier".to_string()));
            }
            if row.is_empty() {
                return Err(invalid(format!("sequence '{id}' is empty")));
            }
            if !seen.insert(id.as_str()) {
                return Err(invalid(format!("duplicate sequence identifier '{id}'")));
            }
        }

        let width = rows[0].len();
        if let Some((id, row)) = identifiers.iter().zip(rows).find(|(_, row)| row.len() != width) {
            return Err(invalid(format!(
                "sequence '{id}' has length {}, expected {width}",
                row.len()
            )));
        }

        Ok(())
    }

    /// Returns the number of sequences.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the alignment holds no sequences (never the case
    /// for a successfully constructed alignment).
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of alignment columns, gaps included.
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Returns the sequence identifiers in file order.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Returns the aligned rows in file order.
    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    /// Returns the aligned sequence of the given identifier.
    pub fn sequence(&self, identifier: &str) -> Option<&[u8]> {
        self.identifiers
            .iter()
            .position(|id| id == identifier)
            .map(|i| self.rows[i].as_slice())
    }

    /// Returns the sequence length used for the analysis: the number of
    /// columns in which no sequence has a gap.
    pub fn sequence_length(&self) -> usize {
        (0..self.width()).filter(|&col| !self.is_gap_column(col)).count()
    }

    /// Returns a copy of this alignment without any column containing a gap.
    pub fn without_gap_columns(&self) -> Alignment {
        let keep: Vec<usize> = (0..self.width())
            .filter(|&col| !self.is_gap_column(col))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| keep.iter().map(|&col| row[col]).collect())
            .collect();
        Alignment {
            identifiers: self.identifiers.clone(),
            rows,
        }
    }

    fn is_gap_column(&self, col: usize) -> bool {
        self.rows.iter().any(|row| is_gap(row[col]))
    }
}

/// Returns `true` if `residue` marks a gap.
pub(crate) fn is_gap(residue: u8) -> bool {
    GAP_CHARS.contains(&residue)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fasta_error(input: &str) -> ParsingErrorType {
        match Alignment::from_fasta_str(input) {
            Err(EcotypeError::MalformedAlignment(e)) => e.kind().clone(),
            other => panic!("expected malformed alignment, got {:?}", other),
        }
    }

    #[test]
    fn test_multiline_records_and_descriptions() {
        let alignment =
            Alignment::from_fasta_str(">seq1 Bacillus subtilis\nacgt\nAC\n\n>seq2\nACGTAA\n").unwrap();
        assert_eq!(alignment.identifiers(), &["seq1", "seq2"]);
        assert_eq!(alignment.sequence("seq1").unwrap(), b"ACGTAC");
        assert_eq!(alignment.width(), 6);
    }

    #[test]
    fn test_gap_columns_removed() {
        let alignment = Alignment::from_fasta_str(">a\nA-GT.\n>b\nAAG-T\n>c\nAAGTT\n").unwrap();
        assert_eq!(alignment.sequence_length(), 2);
        let stripped = alignment.without_gap_columns();
        assert_eq!(stripped.rows(), &[b"AG".to_vec(), b"AG".to_vec(), b"AG".to_vec()]);
        assert_eq!(stripped.sequence_length(), stripped.width());
    }

    #[test]
    fn test_invalid_alignments() {
        assert!(matches!(fasta_error("ACGT\n"), ParsingErrorType::InvalidFasta(_)));
        assert!(matches!(fasta_error(""), ParsingErrorType::InvalidFasta(_)));
        assert!(matches!(fasta_error(">a\nACGT\n>a\nACGT\n"), ParsingErrorType::InvalidFasta(_)));
        assert!(matches!(fasta_error(">a\nACGT\n>b\nACG\n"), ParsingErrorType::InvalidFasta(_)));
        assert!(matches!(fasta_error(">a\n>b\nACG\n"), ParsingErrorType::InvalidFasta(_)));
        assert!(matches!(fasta_error(">\nACG\n"), ParsingErrorType::InvalidFasta(_)));
    }

    #[test]
    fn test_read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b">s1 first\nAC-T\n>s2\nACGT\n").unwrap();
        let alignment = Alignment::from_fasta_file(file.path()).unwrap();
        assert_eq!(alignment.identifiers(), &["s1", "s2"]);
        assert_eq!(alignment.sequence_length(), 3);

        let missing = Alignment::from_fasta_file(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(EcotypeError::Io(_))));
    }

    #[test]
    fn test_new_validates_rows() {
        let records = vec![("x".to_string(), b"acg".to_vec()), ("y".to_string(), b"AC".to_vec())];
        assert!(Alignment::new(records).is_err());
        let records = vec![("x".to_string(), b"acg".to_vec()), ("y".to_string(), b"ACT".to_vec())];
        assert_eq!(Alignment::new(records).unwrap().sequence("x").unwrap(), b"ACG");
    }
}
