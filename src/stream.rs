//! The seven logical archive streams and their block lifecycle.
//!
//! An archive body is a run of independently compressed blocks, one per
//! enabled stream, in a fixed canonical order. Each block is framed by two
//! little-endian `u64` length prefixes (decompressed size, compressed size)
//! followed by exactly that many compressed bytes. Streams have no byte-level
//! interdependency, so decompression fans out across worker threads and joins
//! before record assembly begins.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::compress::BlockCodec;
use crate::error::{DecodeError, EncodeError, Result};
use crate::header::Flags;
use crate::varint::ByteCursor;

/// The seven logical streams of an archive, in canonical block order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// NUL-terminated record identifiers
    Ids,
    /// NUL-terminated record comments (may be empty per record)
    Comments,
    /// One varint sequence length per record
    Lengths,
    /// Alternating-state mask run lengths, varint encoded
    Mask,
    /// 4-bit packed nucleotide codes, two per byte
    Sequence,
    /// Raw quality bytes, one per base
    Quality,
    /// Opaque archive-level payload
    Extra,
}

impl StreamKind {
    /// All stream kinds in canonical archive order
    pub const ALL: [StreamKind; 7] = [
        StreamKind::Ids,
        StreamKind::Comments,
        StreamKind::Lengths,
        StreamKind::Mask,
        StreamKind::Sequence,
        StreamKind::Quality,
        StreamKind::Extra,
    ];

    /// Position of this stream in the canonical order
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            StreamKind::Ids => 0,
            StreamKind::Comments => 1,
            StreamKind::Lengths => 2,
            StreamKind::Mask => 3,
            StreamKind::Sequence => 4,
            StreamKind::Quality => 5,
            StreamKind::Extra => 6,
        }
    }

    /// Presence bit of this stream in the header flags byte
    #[must_use]
    pub(crate) fn flag_bit(self) -> u8 {
        1 << self.index()
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Ids => "ids",
            StreamKind::Comments => "comments",
            StreamKind::Lengths => "lengths",
            StreamKind::Mask => "mask",
            StreamKind::Sequence => "sequence",
            StreamKind::Quality => "quality",
            StreamKind::Extra => "extra",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A stream block located inside the archive, still compressed.
///
/// Holds a borrowed view of the compressed extent; the payload is only
/// materialized by [`decode_all`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct StreamBlock<'a> {
    pub kind: StreamKind,
    /// Declared size of the decompressed payload
    pub raw_len: u64,
    /// The compressed bytes, exactly as long as the block declared
    pub data: &'a [u8],
}

/// The decoded payloads of every enabled stream, indexed by kind.
#[derive(Debug, Default)]
pub(crate) struct DecodedStreams {
    bufs: [Option<Vec<u8>>; 7],
}

impl DecodedStreams {
    pub fn take(&mut self, kind: StreamKind) -> Option<Vec<u8>> {
        self.bufs[kind.index()].take()
    }
}

/// Walks the archive body, slicing out one compressed block per enabled
/// stream in canonical order.
///
/// The cursor must sit immediately after the header. Ending inside a
/// declared extent is [`DecodeError::TruncatedInput`] for that stream;
/// bytes left over after the final block are [`DecodeError::TrailingBytes`].
pub(crate) fn read_blocks<'a>(
    cursor: &mut ByteCursor<'a>,
    flags: Flags,
) -> Result<Vec<StreamBlock<'a>>> {
    let mut blocks = Vec::new();
    for kind in StreamKind::ALL {
        if !flags.has(kind) {
            continue;
        }
        let raw_len = cursor
            .read_u64_le()
            .map_err(|_| truncated(kind, cursor.position()))?;
        let compressed_len = cursor
            .read_u64_le()
            .map_err(|_| truncated(kind, cursor.position()))?;
        let compressed_len = usize::try_from(compressed_len)
            .map_err(|_| truncated(kind, cursor.position()))?;
        let data = cursor
            .take(compressed_len)
            .map_err(|_| truncated(kind, cursor.position()))?;
        blocks.push(StreamBlock {
            kind,
            raw_len,
            data,
        });
    }
    if !cursor.is_empty() {
        return Err(DecodeError::TrailingBytes {
            offset: cursor.position(),
        }
        .into());
    }
    Ok(blocks)
}

fn truncated(kind: StreamKind, offset: usize) -> crate::Error {
    DecodeError::TruncatedInput { kind, offset }.into()
}

/// Decompresses every located block, in parallel when more than one stream
/// is enabled and more than one core is available.
///
/// Blocks are pure, disjoint inputs, so workers share nothing but the
/// codec; results are joined before this function returns.
pub(crate) fn decode_all<C: BlockCodec>(
    blocks: &[StreamBlock<'_>],
    codec: &C,
) -> Result<DecodedStreams> {
    let decoded = run_parallel(blocks, |block| decode_block(block, codec))?;
    let mut streams = DecodedStreams::default();
    for (block, payload) in blocks.iter().zip(decoded) {
        streams.bufs[block.kind.index()] = Some(payload);
    }
    Ok(streams)
}

fn decode_block<C: BlockCodec>(block: &StreamBlock<'_>, codec: &C) -> Result<Vec<u8>> {
    let expected = usize::try_from(block.raw_len)
        .map_err(|_| DecodeError::CorruptStream { kind: block.kind })?;
    let payload = codec
        .decompress(block.data, expected)
        .map_err(|_| DecodeError::CorruptStream { kind: block.kind })?;
    if payload.len() as u64 != block.raw_len {
        return Err(DecodeError::BlockSizeMismatch {
            kind: block.kind,
            expected: block.raw_len,
            actual: payload.len() as u64,
        }
        .into());
    }
    Ok(payload)
}

/// A compressed stream block ready to be written out
pub(crate) struct EncodedBlock {
    pub kind: StreamKind,
    pub raw_len: u64,
    pub data: Vec<u8>,
}

/// Compresses every non-empty stream buffer independently.
///
/// Empty buffers contribute no block; the caller derives the header flags
/// from the returned set.
pub(crate) fn encode_all<C: BlockCodec>(
    raw: Vec<(StreamKind, Vec<u8>)>,
    codec: &C,
) -> Result<Vec<EncodedBlock>> {
    let inputs: Vec<_> = raw
        .into_iter()
        .filter(|(_, buf)| !buf.is_empty())
        .collect();
    let compressed = run_parallel(&inputs, |(kind, buf)| {
        codec
            .compress(buf)
            .map_err(crate::Error::from)
            .map(|data| (*kind, buf.len() as u64, data))
    })?;
    Ok(compressed
        .into_iter()
        .map(|(kind, raw_len, data)| EncodedBlock {
            kind,
            raw_len,
            data,
        })
        .collect())
}

/// Writes encoded blocks in canonical order with their length prefixes.
///
/// It is a precondition violation for `flags` to disagree with the set of
/// blocks supplied.
pub(crate) fn write_blocks<W: Write>(
    sink: &mut W,
    flags: Flags,
    blocks: &[EncodedBlock],
) -> Result<()> {
    let mut present = Flags::new();
    for block in blocks {
        present.set(block.kind);
    }
    if present.stream_bits() != flags.stream_bits() {
        return Err(EncodeError::InconsistentStreams.into());
    }
    for kind in StreamKind::ALL {
        let Some(block) = blocks.iter().find(|b| b.kind == kind) else {
            continue;
        };
        sink.write_u64::<LittleEndian>(block.raw_len)?;
        sink.write_u64::<LittleEndian>(block.data.len() as u64)?;
        sink.write_all(&block.data)?;
    }
    Ok(())
}

/// Runs `f` over `items` on up to `num_cpus` scoped worker threads.
///
/// Results come back in input order; the first error wins. With a single
/// item or a single core this degenerates to a plain sequential loop.
fn run_parallel<T, R, F>(items: &[T], f: F) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R> + Sync,
{
    let workers = items.len().min(num_cpus::get());
    if workers <= 1 {
        return items.iter().map(&f).collect();
    }

    let next = AtomicUsize::new(0);
    let slots: Mutex<Vec<Option<Result<R>>>> =
        Mutex::new((0..items.len()).map(|_| None).collect());
    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let idx = next.fetch_add(1, Ordering::Relaxed);
                if idx >= items.len() {
                    break;
                }
                let result = f(&items[idx]);
                slots.lock().unwrap()[idx] = Some(result);
            });
        }
    });

    slots
        .into_inner()
        .unwrap()
        .into_iter()
        .map(|slot| slot.expect("worker filled every slot"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::ZstdCodec;
    use crate::varint::ByteCursor;

    fn flags_for(kinds: &[StreamKind]) -> Flags {
        let mut flags = Flags::new();
        for &kind in kinds {
            flags.set(kind);
        }
        flags
    }

    #[test]
    fn canonical_order_is_stable() {
        for (i, kind) in StreamKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn block_roundtrip() {
        let codec = ZstdCodec::default();
        let raw = vec![
            (StreamKind::Ids, b"r1\0r2\0".to_vec()),
            (StreamKind::Lengths, vec![4, 4]),
            (StreamKind::Sequence, vec![0x84, 0x21]),
        ];
        let flags = flags_for(&[StreamKind::Ids, StreamKind::Lengths, StreamKind::Sequence]);

        let encoded = encode_all(raw.clone(), &codec).unwrap();
        let mut body = Vec::new();
        write_blocks(&mut body, flags, &encoded).unwrap();

        let mut cursor = ByteCursor::new(&body);
        let blocks = read_blocks(&mut cursor, flags).unwrap();
        assert_eq!(blocks.len(), 3);

        let mut decoded = decode_all(&blocks, &codec).unwrap();
        for (kind, buf) in raw {
            assert_eq!(decoded.take(kind).unwrap(), buf);
        }
    }

    #[test]
    fn empty_streams_contribute_no_block() {
        let codec = ZstdCodec::default();
        let raw = vec![
            (StreamKind::Ids, b"r1\0".to_vec()),
            (StreamKind::Quality, Vec::new()),
        ];
        let encoded = encode_all(raw, &codec).unwrap();
        assert_eq!(encoded.len(), 1);
        assert_eq!(encoded[0].kind, StreamKind::Ids);
    }

    #[test]
    fn flags_must_agree_with_blocks() {
        let codec = ZstdCodec::default();
        let encoded = encode_all(vec![(StreamKind::Ids, b"r1\0".to_vec())], &codec).unwrap();
        let flags = flags_for(&[StreamKind::Ids, StreamKind::Quality]);
        let mut sink = Vec::new();
        let err = write_blocks(&mut sink, flags, &encoded).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::EncodeError(EncodeError::InconsistentStreams)
        ));
    }

    #[test]
    fn truncated_extent_names_the_stream() {
        let codec = ZstdCodec::default();
        let encoded = encode_all(vec![(StreamKind::Sequence, vec![0x84; 64])], &codec).unwrap();
        let flags = flags_for(&[StreamKind::Sequence]);
        let mut body = Vec::new();
        write_blocks(&mut body, flags, &encoded).unwrap();

        // cut the block in half: the declared extent now runs past the end
        body.truncate(body.len() / 2);
        let mut cursor = ByteCursor::new(&body);
        let err = read_blocks(&mut cursor, flags).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::DecodeError(DecodeError::TruncatedInput {
                kind: StreamKind::Sequence,
                ..
            })
        ));
    }

    #[test]
    fn corrupt_block_names_the_stream() {
        let codec = ZstdCodec::default();
        let block = StreamBlock {
            kind: StreamKind::Mask,
            raw_len: 16,
            data: b"definitely not zstd",
        };
        let err = decode_all(&[block], &codec).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::DecodeError(DecodeError::CorruptStream {
                kind: StreamKind::Mask
            })
        ));
    }

    #[test]
    fn size_mismatch_is_reported() {
        let codec = ZstdCodec::default();
        let data = codec.compress(&[0xAA; 32]).unwrap();
        let block = StreamBlock {
            kind: StreamKind::Quality,
            raw_len: 16, // lies: payload is 32 bytes
            data: &data,
        };
        let err = decode_all(&[block], &codec).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::DecodeError(DecodeError::BlockSizeMismatch {
                kind: StreamKind::Quality,
                expected: 16,
                actual: 17,
            })
        ));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let codec = ZstdCodec::default();
        let encoded = encode_all(vec![(StreamKind::Ids, b"r1\0".to_vec())], &codec).unwrap();
        let flags = flags_for(&[StreamKind::Ids]);
        let mut body = Vec::new();
        write_blocks(&mut body, flags, &encoded).unwrap();
        body.push(0x42);
        let mut cursor = ByteCursor::new(&body);
        assert!(matches!(
            read_blocks(&mut cursor, flags).unwrap_err(),
            crate::Error::DecodeError(DecodeError::TrailingBytes { .. })
        ));
    }
}
