//! The logical record type shared by both codec directions.

/// One FASTA/FASTQ entry, decoded or awaiting encode.
///
/// The sequence keeps its original case: lowercase bases are the soft-mask
/// regions the mask stream carries. Quality, when present, always has
/// exactly one byte per base; the writer rejects records where it does not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// Record identifier (the FASTA/FASTQ header up to the first space)
    pub id: String,
    /// Description following the identifier, if any
    pub comment: Option<String>,
    /// Sequence symbols with original case
    pub sequence: Vec<u8>,
    /// Quality bytes, present for FASTQ records only
    pub quality: Option<Vec<u8>>,
}

impl Record {
    /// Creates a FASTA record without comment or quality
    #[must_use]
    pub fn new(id: impl Into<String>, sequence: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            comment: None,
            sequence: sequence.into(),
            quality: None,
        }
    }

    /// Attaches a comment
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Attaches quality bytes, making this a FASTQ record
    #[must_use]
    pub fn with_quality(mut self, quality: impl Into<Vec<u8>>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    /// Sequence length in bases
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Whether the sequence is empty (a zero-length record is legal)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Whether this record carries quality bytes
    #[must_use]
    pub fn has_quality(&self) -> bool {
        self.quality.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_style_construction() {
        let record = Record::new("seq1", *b"ACGT")
            .with_comment("sample")
            .with_quality(*b"IIII");
        assert_eq!(record.id, "seq1");
        assert_eq!(record.comment.as_deref(), Some("sample"));
        assert_eq!(record.len(), 4);
        assert!(record.has_quality());
    }

    #[test]
    fn zero_length_record_is_legal() {
        let record = Record::new("empty", Vec::new());
        assert!(record.is_empty());
        assert_eq!(record.len(), 0);
    }
}
