//! Archive reader and record assembler.
//!
//! Opening an archive parses the header, slices the compressed extent of
//! every enabled stream and decompresses them (in parallel when several
//! streams are enabled) into independently owned buffers. Record assembly
//! is then a single forward pass: one monotonically advancing cursor per
//! stream, no rewinds, which is why the reader is a lazy, fused, one-shot
//! iterator rather than a materialized list.
//!
//! A decode failure at record *i* yields `Err` carrying that context and
//! the iterator is terminal afterwards; records already yielded stand
//! (emit-then-fail, matching streaming consumption).

use std::fs::File;
use std::io::Read;
use std::iter::FusedIterator;
use std::path::Path;

use memmap2::Mmap;

use crate::compress::{BlockCodec, ZstdCodec};
use crate::error::{DecodeError, Result};
use crate::header::NafHeader;
use crate::mask::{self, MaskRun};
use crate::pack::PackCursor;
use crate::record::Record;
use crate::stream::{self, StreamKind};
use crate::varint::ByteCursor;

/// A decoded stream buffer with its advancing read position
#[derive(Debug, Default)]
struct StreamCursor {
    buf: Vec<u8>,
    pos: usize,
}

impl StreamCursor {
    fn new(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }
}

/// Reader over a nucleotide archive, yielding records in archive order.
///
/// Construct with [`NafReader::new`] for any [`Read`] source,
/// [`NafReader::from_path`] to memory-map a file, or
/// [`NafReader::from_buffer`] for bytes already in memory.
///
/// The iterator is single-pass: re-reading an archive means re-opening it.
#[derive(Debug)]
pub struct NafReader {
    header: NafHeader,
    /// Sequence lengths, one per record; drives iteration and termination
    lengths: Vec<u64>,
    ids: Option<StreamCursor>,
    comments: Option<StreamCursor>,
    sequence: Option<Vec<u8>>,
    seq_cursor: PackCursor,
    /// Lowercase runs in global coordinates, decoded up front
    mask_runs: Option<Vec<MaskRun>>,
    quality: Option<StreamCursor>,
    extra: Option<Vec<u8>>,
    /// Global base offset of the next record
    base_offset: u64,
    /// Index of the next record to assemble
    index: usize,
    /// Set after the first error; the iterator is terminal
    failed: bool,
}

impl NafReader {
    /// Opens an archive from any byte source, reading it to the end
    pub fn new<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_buffer(&bytes)
    }

    /// Opens an archive file through a memory map
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_buffer(&mmap)
    }

    /// Opens an archive from an in-memory buffer with the default zstd
    /// block codec
    pub fn from_buffer(bytes: &[u8]) -> Result<Self> {
        Self::with_codec(bytes, &ZstdCodec::default())
    }

    /// Opens an archive with a caller-supplied block codec.
    ///
    /// The codec is only used during open: every stream is decompressed
    /// here, so the reader owns plain buffers afterwards.
    pub fn with_codec<C: BlockCodec>(bytes: &[u8], codec: &C) -> Result<Self> {
        let mut cursor = ByteCursor::new(bytes);
        let header = NafHeader::from_cursor(&mut cursor)?;
        let flags = header.flags();

        let blocks = stream::read_blocks(&mut cursor, flags)?;
        let mut decoded = stream::decode_all(&blocks, codec)?;

        // every per-record stream leans on lengths for slicing
        let dependent = [
            StreamKind::Ids,
            StreamKind::Comments,
            StreamKind::Mask,
            StreamKind::Sequence,
            StreamKind::Quality,
        ];
        if !flags.has(StreamKind::Lengths) && dependent.iter().any(|&k| flags.has(k)) {
            return Err(DecodeError::MissingStream {
                kind: StreamKind::Lengths,
            }
            .into());
        }

        let lengths = match decoded.take(StreamKind::Lengths) {
            Some(buf) => decode_lengths(&buf)?,
            None => Vec::new(),
        };
        let total_bases: u64 = lengths.iter().sum();

        let mask_runs = match decoded.take(StreamKind::Mask) {
            Some(buf) => Some(mask::decode_runs(&buf, total_bases)?),
            None => None,
        };

        Ok(Self {
            header,
            lengths,
            ids: decoded.take(StreamKind::Ids).map(StreamCursor::new),
            comments: decoded.take(StreamKind::Comments).map(StreamCursor::new),
            sequence: decoded.take(StreamKind::Sequence),
            seq_cursor: PackCursor::new(),
            mask_runs,
            quality: decoded.take(StreamKind::Quality).map(StreamCursor::new),
            extra: decoded.take(StreamKind::Extra),
            base_offset: 0,
            index: 0,
            failed: false,
        })
    }

    /// The archive header
    #[must_use]
    pub fn header(&self) -> &NafHeader {
        &self.header
    }

    /// The opaque extra payload, if the archive carries one
    #[must_use]
    pub fn extra(&self) -> Option<&[u8]> {
        self.extra.as_deref()
    }

    /// Total number of records in the archive
    #[must_use]
    pub fn num_records(&self) -> usize {
        self.lengths.len()
    }

    /// Whether records carry quality bytes (FASTQ archive)
    #[must_use]
    pub fn has_quality(&self) -> bool {
        self.quality.is_some()
    }

    /// Reads the next NUL-terminated string from a cursor
    fn next_string(
        cursor: &mut StreamCursor,
        kind: StreamKind,
        record: usize,
    ) -> Result<String> {
        let rest = &cursor.buf[cursor.pos..];
        let nul = memchr::memchr(0, rest)
            .ok_or(DecodeError::StreamExhausted { kind, record })?;
        let text = std::str::from_utf8(&rest[..nul])
            .map_err(|_| DecodeError::InvalidString { kind, record })?
            .to_string();
        cursor.pos += nul + 1;
        Ok(text)
    }

    fn assemble_next(&mut self) -> Result<Record> {
        let record = self.index;
        let length = self.lengths[record];
        let length_usize = usize::try_from(length).map_err(|_| DecodeError::StreamExhausted {
            kind: StreamKind::Sequence,
            record,
        })?;

        let id = match self.ids.as_mut() {
            Some(cursor) => Self::next_string(cursor, StreamKind::Ids, record)?,
            None => String::new(),
        };
        let comment = match self.comments.as_mut() {
            Some(cursor) => {
                let text = Self::next_string(cursor, StreamKind::Comments, record)?;
                (!text.is_empty()).then_some(text)
            }
            None => None,
        };

        let mut sequence = Vec::with_capacity(length_usize);
        if length > 0 {
            let buf = self
                .sequence
                .as_deref()
                .ok_or(DecodeError::StreamExhausted {
                    kind: StreamKind::Sequence,
                    record,
                })?;
            self.seq_cursor
                .unpack_into(buf, length_usize, &mut sequence)
                .map_err(|_| DecodeError::StreamExhausted {
                    kind: StreamKind::Sequence,
                    record,
                })?;
        }

        if let Some(runs) = self.mask_runs.as_deref() {
            let local = mask::slice_for_record(runs, self.base_offset, length);
            mask::apply_mask(&mut sequence, &local);
        }

        let quality = match self.quality.as_mut() {
            Some(cursor) => {
                if cursor.buf.len() - cursor.pos < length_usize {
                    return Err(DecodeError::StreamExhausted {
                        kind: StreamKind::Quality,
                        record,
                    }
                    .into());
                }
                let bytes = cursor.buf[cursor.pos..cursor.pos + length_usize].to_vec();
                cursor.pos += length_usize;
                Some(bytes)
            }
            None => None,
        };

        self.base_offset += length;
        self.index += 1;
        Ok(Record {
            id,
            comment,
            sequence,
            quality,
        })
    }
}

impl Iterator for NafReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.index >= self.lengths.len() {
            return None;
        }
        match self.assemble_next() {
            Ok(record) => Some(Ok(record)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let remaining = self.lengths.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for NafReader {}

impl FusedIterator for NafReader {}

/// Decodes the lengths stream: one varint per record, in archive order
fn decode_lengths(buf: &[u8]) -> Result<Vec<u64>> {
    let mut cursor = ByteCursor::new(buf);
    let mut lengths = Vec::new();
    while !cursor.is_empty() {
        lengths.push(cursor.read_varint()?);
    }
    Ok(lengths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::NafWriterBuilder;

    fn archive_of(records: &[Record]) -> Vec<u8> {
        let mut writer = NafWriterBuilder::default()
            .line_length(60)
            .build(Vec::new());
        for record in records {
            writer.push(record).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn empty_archive_yields_no_records() {
        let bytes = archive_of(&[]);
        let mut reader = NafReader::from_buffer(&bytes).unwrap();
        assert_eq!(reader.num_records(), 0);
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
    }

    #[test]
    fn size_hint_tracks_remaining() {
        let bytes = archive_of(&[
            Record::new("a", *b"AC"),
            Record::new("b", *b"GT"),
        ]);
        let mut reader = NafReader::from_buffer(&bytes).unwrap();
        assert_eq!(reader.size_hint(), (2, Some(2)));
        reader.next().unwrap().unwrap();
        assert_eq!(reader.size_hint(), (1, Some(1)));
    }

    #[test]
    fn reader_is_single_pass() {
        let bytes = archive_of(&[Record::new("a", *b"ACGT")]);
        let mut reader = NafReader::from_buffer(&bytes).unwrap();
        assert!(reader.next().is_some());
        assert!(reader.next().is_none());
        // exhausted for good; re-open to read again
        assert!(reader.next().is_none());
    }

    #[test]
    fn truncated_quality_stream_fails_with_record_index() {
        // hand-build an archive whose quality stream is one byte short
        use crate::compress::ZstdCodec;
        use crate::header::{Flags, NafHeader};
        use crate::stream::{encode_all, write_blocks};
        use crate::varint::write_varint;

        let codec = ZstdCodec::default();
        let mut lengths = Vec::new();
        write_varint(4, &mut lengths);
        let raw = vec![
            (StreamKind::Ids, b"r1\0".to_vec()),
            (StreamKind::Lengths, lengths),
            (StreamKind::Sequence, crate::pack::pack(b"ACGT").unwrap()),
            (StreamKind::Quality, b"!!!".to_vec()),
        ];
        let mut flags = Flags::new();
        for (kind, _) in &raw {
            flags.set(*kind);
        }
        let header = NafHeader::new(flags);
        let mut bytes = Vec::new();
        header.write_bytes(&mut bytes).unwrap();
        let encoded = encode_all(raw, &codec).unwrap();
        write_blocks(&mut bytes, flags, &encoded).unwrap();

        let mut reader = NafReader::from_buffer(&bytes).unwrap();
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            crate::Error::DecodeError(DecodeError::StreamExhausted {
                kind: StreamKind::Quality,
                record: 0
            })
        ));
        // terminal after failure
        assert!(reader.next().is_none());
    }
}
