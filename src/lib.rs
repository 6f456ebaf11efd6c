//! # nafseq
//!
//! A codec for the Nucleotide Archive Format: a compressed container for
//! FASTA/FASTQ sequence collections. Identifiers, comments, sequence
//! lengths, soft-mask regions, 4-bit packed nucleotides and quality scores
//! are split into independently zstd-compressed streams and reassembled
//! losslessly on read, preserving case, ordering and line wrapping.
//!
//! ## Archive layout
//!
//! ```text
//! ┌─────────────────────┐
//! │  Header             │ magic, version, flags, [line length]
//! ├─────────────────────┤
//! │  ids block          │ ┐
//! ├─────────────────────┤ │ one length-prefixed, independently
//! │  comments block     │ │ compressed block per enabled stream,
//! ├─────────────────────┤ │ in canonical order:
//! │  lengths block      │ │ ids, comments, lengths, mask,
//! ├─────────────────────┤ │ sequence, quality, extra
//! │  ...                │ ┘
//! └─────────────────────┘
//! ```
//!
//! Per-stream compression is deliberate: reading only the identifiers never
//! decompresses sequence data, and the stream decompressions fan out across
//! worker threads on open.
//!
//! ## Usage
//!
//! ```
//! use nafseq::{NafReader, NafWriterBuilder, Record};
//!
//! // encode two records into an in-memory archive
//! let mut writer = NafWriterBuilder::default()
//!     .line_length(60)
//!     .build(Vec::new());
//! writer.push(&Record::new("seq1", *b"ACGTacgt")).unwrap();
//! writer.push(&Record::new("seq2", *b"GGCC")).unwrap();
//! let archive = writer.finish().unwrap();
//!
//! // decode them back, lazily and in order
//! let reader = NafReader::from_buffer(&archive).unwrap();
//! let records: Vec<Record> = reader.map(Result::unwrap).collect();
//! assert_eq!(records[0].sequence, b"ACGTacgt");
//! assert_eq!(records[1].id, "seq2");
//! ```

mod compress;
mod detect;
mod error;
mod fastx;
mod header;
mod mask;
mod pack;
mod reader;
mod record;
mod stream;
mod varint;
mod writer;

pub use compress::{BlockCodec, ZstdCodec};
pub use detect::{detect, detect_format, FormatKind};
pub use error::{DecodeError, EncodeError, Error, HeaderError, Result};
pub use fastx::{write_fasta_record, write_fastq_record, FastaReader, FastqReader};
pub use header::{Flags, NafHeader, MAGIC};
pub use mask::MaskRun;
pub use pack::{pack, unpack};
pub use reader::NafReader;
pub use record::Record;
pub use stream::StreamKind;
pub use writer::{NafWriter, NafWriterBuilder, SymbolPolicy};

use std::io::Write;

/// Encodes an ordered record sequence into an archive written to `sink`.
///
/// `options` carries line length, compression level, symbol policy and the
/// optional extra payload. Returns the sink.
pub fn write_archive<W, I>(records: I, options: NafWriterBuilder, sink: W) -> Result<W>
where
    W: Write,
    I: IntoIterator<Item = Record>,
{
    let mut writer = options.build(sink);
    for record in records {
        writer.push(&record)?;
    }
    writer.finish()
}

/// Renders every remaining record of `reader` as FASTA text.
///
/// Sequence lines are re-wrapped at the width the archive header declares;
/// width zero emits one sequence line per record.
pub fn export_fasta<W: Write>(reader: &mut NafReader, sink: &mut W) -> Result<()> {
    let width = reader.header().line_length();
    while let Some(record) = reader.next() {
        write_fasta_record(sink, &record?, width)?;
    }
    Ok(())
}

/// Renders every remaining record of `reader` as FASTQ text.
///
/// Fails with [`DecodeError::MissingQuality`] when the archive has no
/// quality stream.
pub fn export_fastq<W: Write>(reader: &mut NafReader, sink: &mut W) -> Result<()> {
    if !reader.has_quality() && reader.num_records() > 0 {
        return Err(DecodeError::MissingQuality.into());
    }
    let width = reader.header().line_length();
    while let Some(record) = reader.next() {
        write_fastq_record(sink, &record?, width)?;
    }
    Ok(())
}
