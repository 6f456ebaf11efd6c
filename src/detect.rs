//! Input format sniffing.
//!
//! Classification looks at a peeked prefix only and never consumes the
//! source, so the same reader can be handed straight to whichever parser
//! the classification selects.

use std::io::BufRead;

use crate::error::Result;
use crate::header::MAGIC;

/// The classification of an input byte source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    /// A nucleotide archive (magic bytes matched)
    Naf,
    /// FASTA text (first non-whitespace byte is `>`)
    Fasta,
    /// FASTQ text (first non-whitespace byte is `@`)
    Fastq,
    /// None of the known formats; a value, not an error
    Unknown,
}

/// Classifies a peeked prefix of an input source.
///
/// Pure function over the bytes; callers that need the non-consuming
/// behavior over a reader use [`detect_format`].
#[must_use]
pub fn detect(peek: &[u8]) -> FormatKind {
    if peek.starts_with(&MAGIC) {
        return FormatKind::Naf;
    }
    match peek.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'>') => FormatKind::Fasta,
        Some(b'@') => FormatKind::Fastq,
        _ => FormatKind::Unknown,
    }
}

/// Classifies a buffered reader without consuming it.
///
/// Peeks through [`BufRead::fill_buf`]; the buffered bytes stay available
/// for whichever parser runs next.
pub fn detect_format<R: BufRead>(reader: &mut R) -> Result<FormatKind> {
    let peek = reader.fill_buf()?;
    Ok(detect(peek))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Read};

    #[test]
    fn classifies_by_prefix() {
        assert_eq!(detect(&[0x01, 0xF9, 0xEC, 0x01]), FormatKind::Naf);
        assert_eq!(detect(b">seq1\nACGT\n"), FormatKind::Fasta);
        assert_eq!(detect(b"@r1\nACGT\n+\n!!!!\n"), FormatKind::Fastq);
        assert_eq!(detect(b"\n\t  >padded"), FormatKind::Fasta);
        assert_eq!(detect(b"ACGT"), FormatKind::Unknown);
        assert_eq!(detect(b""), FormatKind::Unknown);
    }

    #[test]
    fn magic_prefix_wins_over_heuristics() {
        // the byte after the magic is irrelevant
        assert_eq!(detect(&[0x01, 0xF9, 0xEC, b'>']), FormatKind::Naf);
    }

    #[test]
    fn detection_does_not_consume() {
        let mut reader = BufReader::new(&b">seq1\nACGT\n"[..]);
        assert_eq!(detect_format(&mut reader).unwrap(), FormatKind::Fasta);
        let mut replay = String::new();
        reader.read_to_string(&mut replay).unwrap();
        assert_eq!(replay, ">seq1\nACGT\n");
    }
}
