//! The entropy-compressor boundary.
//!
//! Archive stream blocks are opaque byte-stream transforms: the codec only
//! ever calls `compress` and `decompress`. Keeping that boundary behind a
//! trait keeps the container logic portable across compression libraries;
//! [`ZstdCodec`] is the stock implementation.

use std::io::{Read, Write};

use zstd::{Decoder as ZstdDecoder, Encoder as ZstdEncoder};

/// Narrow capability interface over a general-purpose block compressor.
///
/// Failures cross this boundary as plain I/O errors; the stream layer maps
/// them to [`DecodeError::CorruptStream`](crate::DecodeError) with the
/// stream identity attached.
#[auto_impl::auto_impl(&, Box)]
pub trait BlockCodec: Sync {
    /// Compresses a raw stream payload into a self-contained block
    fn compress(&self, raw: &[u8]) -> std::io::Result<Vec<u8>>;

    /// Decompresses a block, producing at most `expected_size` + 1 bytes.
    ///
    /// The cap keeps a corrupt block from allocating unboundedly; the
    /// caller verifies the exact size against the block's declared length.
    fn decompress(&self, compressed: &[u8], expected_size: usize) -> std::io::Result<Vec<u8>>;
}

/// Zstandard implementation of the [`BlockCodec`] boundary
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self::new(zstd::DEFAULT_COMPRESSION_LEVEL)
    }
}

impl ZstdCodec {
    /// Creates a codec with the given zstd compression level
    #[must_use]
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    /// The configured compression level
    #[must_use]
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl BlockCodec for ZstdCodec {
    fn compress(&self, raw: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder = ZstdEncoder::new(Vec::new(), self.level)?;
        encoder.write_all(raw)?;
        encoder.finish()
    }

    fn decompress(&self, compressed: &[u8], expected_size: usize) -> std::io::Result<Vec<u8>> {
        let decoder = ZstdDecoder::with_buffer(compressed)?;
        let mut out = Vec::with_capacity(expected_size);
        decoder
            .take(expected_size as u64 + 1)
            .read_to_end(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zstd_roundtrip() {
        let codec = ZstdCodec::default();
        let raw = b"ACGTACGTACGTACGTACGTACGT".repeat(64);
        let compressed = codec.compress(&raw).unwrap();
        assert!(compressed.len() < raw.len());
        let restored = codec.decompress(&compressed, raw.len()).unwrap();
        assert_eq!(restored, raw);
    }

    #[test]
    fn zstd_empty_payload() {
        let codec = ZstdCodec::default();
        let compressed = codec.compress(b"").unwrap();
        let restored = codec.decompress(&compressed, 0).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn zstd_rejects_garbage() {
        let codec = ZstdCodec::default();
        assert!(codec.decompress(b"not a zstd frame", 64).is_err());
    }
}
