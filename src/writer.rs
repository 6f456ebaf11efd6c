//! Archive writer: the structural inverse of the reader.
//!
//! Records are pushed in order and split into per-stream raw buffers
//! (ids, comments, lengths, packed sequence, mask runs, quality). The
//! buffers live in memory until [`NafWriter::finish`], which is when the
//! mask encoder finally knows the archive's total base count; `finish`
//! compresses each non-empty stream, derives the header flags from the
//! streams that actually exist, and writes header plus blocks in canonical
//! order.

use std::borrow::Cow;
use std::io::Write;

use crate::compress::ZstdCodec;
use crate::error::{EncodeError, Result};
use crate::header::{Flags, NafHeader};
use crate::mask::MaskEncoder;
use crate::pack::{encode_symbol, SequencePacker};
use crate::record::Record;
use crate::stream::{self, StreamKind};
use crate::varint::write_varint;

/// What to do with a sequence symbol outside the 4-bit code table.
///
/// The default aborts the whole encode: an unknown symbol usually means
/// the input is not nucleotide data at all, and no repair is attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SymbolPolicy {
    /// Abort the encode with [`EncodeError::InvalidSymbol`]
    #[default]
    Strict,
    /// Drop the offending record entirely and keep encoding
    SkipRecord,
    /// Replace the offending symbol with `N` (case preserved)
    SubstituteN,
}

impl SymbolPolicy {
    /// Applies the policy to one record's sequence.
    ///
    /// Returns `None` when the record should be skipped; otherwise the
    /// sequence to encode, borrowed when no substitution was needed.
    /// `base_offset` is the global position of the record's first base,
    /// used to report the absolute offending position.
    fn apply<'a>(
        self,
        sequence: &'a [u8],
        base_offset: u64,
    ) -> Result<Option<Cow<'a, [u8]>>> {
        let Some(at) = sequence
            .iter()
            .position(|&b| encode_symbol(b).is_none())
        else {
            return Ok(Some(Cow::Borrowed(sequence)));
        };
        match self {
            SymbolPolicy::Strict => Err(EncodeError::InvalidSymbol {
                symbol: sequence[at],
                position: base_offset + at as u64,
            }
            .into()),
            SymbolPolicy::SkipRecord => Ok(None),
            SymbolPolicy::SubstituteN => {
                let mapped = sequence
                    .iter()
                    .map(|&b| match encode_symbol(b) {
                        Some(_) => b,
                        None if b.is_ascii_lowercase() => b'n',
                        None => b'N',
                    })
                    .collect();
                Ok(Some(Cow::Owned(mapped)))
            }
        }
    }
}

/// A builder for configured [`NafWriter`] instances.
///
/// Also doubles as the options bag of [`write_archive`](crate::write_archive).
#[derive(Debug, Default, Clone)]
pub struct NafWriterBuilder {
    line_length: Option<u64>,
    level: Option<i32>,
    policy: Option<SymbolPolicy>,
    extra: Option<Vec<u8>>,
}

impl NafWriterBuilder {
    /// Column width recorded in the header for text output.
    ///
    /// Zero (the default) selects variable mode: one line per record.
    #[must_use]
    pub fn line_length(mut self, width: u64) -> Self {
        self.line_length = Some(width);
        self
    }

    /// Compression level handed to the zstd block codec
    #[must_use]
    pub fn level(mut self, level: i32) -> Self {
        self.level = Some(level);
        self
    }

    /// Policy for symbols outside the 4-bit code table
    #[must_use]
    pub fn policy(mut self, policy: SymbolPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Opaque archive-level payload carried in the extra stream
    #[must_use]
    pub fn extra(mut self, extra: impl Into<Vec<u8>>) -> Self {
        self.extra = Some(extra.into());
        self
    }

    /// Builds a writer emitting the archive into `inner`.
    ///
    /// Nothing is written until [`NafWriter::finish`]: the header flags
    /// depend on which streams end up non-empty.
    pub fn build<W: Write>(self, inner: W) -> NafWriter<W> {
        NafWriter {
            inner,
            line_length: self.line_length.unwrap_or(0),
            codec: ZstdCodec::new(self.level.unwrap_or(zstd::DEFAULT_COMPRESSION_LEVEL)),
            policy: self.policy.unwrap_or_default(),
            extra: self.extra,
            ids: Vec::new(),
            comments: Vec::new(),
            any_comment: false,
            lengths: Vec::new(),
            packer: SequencePacker::new(),
            mask: MaskEncoder::new(),
            quality: Vec::new(),
            quality_mode: None,
            n_records: 0,
            n_skipped: 0,
        }
    }
}

/// Writer building a nucleotide archive from a stream of records.
pub struct NafWriter<W: Write> {
    inner: W,
    line_length: u64,
    codec: ZstdCodec,
    policy: SymbolPolicy,
    extra: Option<Vec<u8>>,

    ids: Vec<u8>,
    comments: Vec<u8>,
    any_comment: bool,
    lengths: Vec<u8>,
    packer: SequencePacker,
    mask: MaskEncoder,
    quality: Vec<u8>,
    /// Whether this archive carries quality, fixed by the first record
    quality_mode: Option<bool>,
    n_records: usize,
    n_skipped: usize,
}

impl<W: Write> NafWriter<W> {
    /// Appends one record to the archive.
    ///
    /// Quality presence must agree across all records (FASTA xor FASTQ);
    /// the first pushed record fixes the mode. Under
    /// [`SymbolPolicy::SkipRecord`] a record with an unknown symbol is
    /// dropped atomically, without advancing any stream.
    pub fn push(&mut self, record: &Record) -> Result<()> {
        let index = self.n_records + self.n_skipped;

        let has_quality = record.quality.is_some();
        match self.quality_mode {
            None => self.quality_mode = Some(has_quality),
            Some(mode) if mode != has_quality => {
                return Err(EncodeError::InconsistentQuality { record: index }.into());
            }
            Some(_) => {}
        }
        if let Some(quality) = record.quality.as_deref() {
            if quality.len() != record.sequence.len() {
                return Err(EncodeError::QualityLengthMismatch {
                    expected: record.sequence.len(),
                    got: quality.len(),
                }
                .into());
            }
        }
        if memchr::memchr(0, record.id.as_bytes()).is_some() {
            return Err(EncodeError::InvalidId { record: index }.into());
        }

        // resolve the policy before touching any stream so a skipped
        // record leaves the writer untouched
        let Some(sequence) = self.policy.apply(&record.sequence, self.packer.base_count())?
        else {
            self.n_skipped += 1;
            return Ok(());
        };

        self.ids.extend_from_slice(record.id.as_bytes());
        self.ids.push(0);
        if let Some(comment) = &record.comment {
            self.comments.extend_from_slice(comment.as_bytes());
            self.any_comment = true;
        }
        self.comments.push(0);
        write_varint(sequence.len() as u64, &mut self.lengths);
        self.packer
            .push(&sequence)
            .expect("policy already validated every symbol");
        self.mask.push(&sequence);
        if let Some(quality) = record.quality.as_deref() {
            self.quality.extend_from_slice(quality);
        }
        self.n_records += 1;
        Ok(())
    }

    /// Number of records dropped by [`SymbolPolicy::SkipRecord`]
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.n_skipped
    }

    /// Number of records accepted so far
    #[must_use]
    pub fn num_records(&self) -> usize {
        self.n_records
    }

    /// Compresses the streams and writes the complete archive.
    ///
    /// Returns the underlying sink. Flags are derived from the streams
    /// that are actually non-empty, so they can never disagree with the
    /// blocks that follow.
    pub fn finish(self) -> Result<W> {
        let NafWriter {
            mut inner,
            line_length,
            codec,
            extra,
            ids,
            comments,
            any_comment,
            lengths,
            packer,
            mask,
            quality,
            ..
        } = self;

        let sequence = packer.finish();
        let mask_bytes = mask.finish().unwrap_or_default();
        let comments = if any_comment { comments } else { Vec::new() };

        let raw = vec![
            (StreamKind::Ids, ids),
            (StreamKind::Comments, comments),
            (StreamKind::Lengths, lengths),
            (StreamKind::Mask, mask_bytes),
            (StreamKind::Sequence, sequence),
            (StreamKind::Quality, quality),
            (StreamKind::Extra, extra.unwrap_or_default()),
        ];

        let blocks = stream::encode_all(raw, &codec)?;
        let mut flags = Flags::new();
        for block in &blocks {
            flags.set(block.kind);
        }
        let header = NafHeader::with_line_length(flags, line_length);
        header.write_bytes(&mut inner)?;
        stream::write_blocks(&mut inner, header.flags(), &blocks)?;
        inner.flush()?;
        Ok(inner)
    }
}
