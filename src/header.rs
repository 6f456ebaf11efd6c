//! Header structure and codec for nucleotide archives.
//!
//! The header is the only mandatory section of an archive. It opens with a
//! three-byte format descriptor, a version byte and a flags byte; the flags
//! carry one presence bit per stream (in canonical order) plus the
//! line-length mode bit. Fixed line-length mode appends one varint: the
//! column width used when records are rendered back to text.

use std::io::{Read, Write};

use crate::error::{HeaderError, Result};
use crate::stream::StreamKind;
use crate::varint::{write_varint, ByteCursor};

/// Format descriptor identifying a nucleotide archive
pub const MAGIC: [u8; 3] = [0x01, 0xF9, 0xEC];

/// Current format version of the archive layout
const FORMAT: u8 = 1;

/// Minimum header size in bytes: magic, version and flags
///
/// Fixed line-length mode appends a varint, so a full header is
/// variable-sized.
pub const SIZE_MIN_HEADER: usize = 5;

/// Stream-presence and mode bits of the archive header.
///
/// Bits 0 through 6 mark the presence of the seven streams in canonical
/// order; bit 7 selects fixed line-length mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(u8);

const FIXED_LINE_LENGTH: u8 = 0x80;

impl Flags {
    #[must_use]
    pub fn new() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Presence bits only, with the mode bit cleared
    #[must_use]
    pub fn stream_bits(self) -> u8 {
        self.0 & !FIXED_LINE_LENGTH
    }

    /// Whether the named stream is present in the archive
    #[must_use]
    pub fn has(self, kind: StreamKind) -> bool {
        self.0 & kind.flag_bit() != 0
    }

    pub fn set(&mut self, kind: StreamKind) {
        self.0 |= kind.flag_bit();
    }

    pub fn clear(&mut self, kind: StreamKind) {
        self.0 &= !kind.flag_bit();
    }

    /// Whether record text is re-wrapped to a fixed column width
    #[must_use]
    pub fn fixed_line_length(self) -> bool {
        self.0 & FIXED_LINE_LENGTH != 0
    }

    pub fn set_fixed_line_length(&mut self, fixed: bool) {
        if fixed {
            self.0 |= FIXED_LINE_LENGTH;
        } else {
            self.0 &= !FIXED_LINE_LENGTH;
        }
    }
}

/// Header of a nucleotide archive.
///
/// Parsed once at the start of decode and written once at the end of
/// encode; immutable in between. A `line_length` of zero means variable
/// mode: each record is rendered as a single unwrapped line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NafHeader {
    /// Version of the archive layout
    pub version: u8,

    /// Stream presence and line-length mode bits
    pub flags: Flags,

    /// Column width for text output; 0 in variable mode
    pub line_length: u64,
}

impl NafHeader {
    /// Creates a variable line-length header with the given flags
    #[must_use]
    pub fn new(flags: Flags) -> Self {
        let mut flags = flags;
        flags.set_fixed_line_length(false);
        Self {
            version: FORMAT,
            flags,
            line_length: 0,
        }
    }

    /// Creates a fixed line-length header wrapping text at `line_length`
    /// columns
    ///
    /// A zero width is the variable mode encoded by [`NafHeader::new`].
    #[must_use]
    pub fn with_line_length(flags: Flags, line_length: u64) -> Self {
        let mut flags = flags;
        flags.set_fixed_line_length(line_length > 0);
        Self {
            version: FORMAT,
            flags,
            line_length,
        }
    }

    /// Parses a header from a cursor positioned at the start of the archive.
    ///
    /// Validates the magic bytes first; an archive failing that check is
    /// unrecoverable. A version newer than [`FORMAT`] fails with
    /// [`HeaderError::UnsupportedVersion`].
    pub fn from_cursor(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let truncated = |c: &ByteCursor<'_>| HeaderError::Truncated(c.position());
        let magic: [u8; 3] = cursor
            .take(3)
            .map_err(|_| truncated(cursor))?
            .try_into()
            .expect("take(3) yields three bytes");
        if magic != MAGIC {
            return Err(HeaderError::BadMagic(magic).into());
        }
        let version = cursor.read_u8().map_err(|_| truncated(cursor))?;
        if version != FORMAT {
            return Err(HeaderError::UnsupportedVersion(version).into());
        }
        let flags = Flags::from_bits(cursor.read_u8().map_err(|_| truncated(cursor))?);
        let line_length = if flags.fixed_line_length() {
            let width = cursor.read_varint().map_err(|_| truncated(cursor))?;
            if width == 0 {
                return Err(HeaderError::InvalidLineLength.into());
            }
            width
        } else {
            0
        };
        Ok(Self {
            version,
            flags,
            line_length,
        })
    }

    /// Parses a header from the beginning of a buffer, ignoring any
    /// trailing archive body
    pub fn from_buffer(buffer: &[u8]) -> Result<Self> {
        let mut cursor = ByteCursor::new(buffer);
        Self::from_cursor(&mut cursor)
    }

    /// Reads a header from a reader.
    ///
    /// Reads the minimum fixed prefix, then single bytes while the varint
    /// line length continues, so it never consumes past the header.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut prefix = [0u8; SIZE_MIN_HEADER];
        reader.read_exact(&mut prefix)?;
        let mut header = Self::from_buffer_prefix(&prefix)?;
        if header.flags.fixed_line_length() {
            header.line_length = read_varint_bytewise(reader)?;
            if header.line_length == 0 {
                return Err(HeaderError::InvalidLineLength.into());
            }
        }
        Ok(header)
    }

    fn from_buffer_prefix(prefix: &[u8; SIZE_MIN_HEADER]) -> Result<Self> {
        let magic: [u8; 3] = prefix[..3].try_into().expect("three magic bytes");
        if magic != MAGIC {
            return Err(HeaderError::BadMagic(magic).into());
        }
        if prefix[3] != FORMAT {
            return Err(HeaderError::UnsupportedVersion(prefix[3]).into());
        }
        Ok(Self {
            version: prefix[3],
            flags: Flags::from_bits(prefix[4]),
            line_length: 0,
        })
    }

    /// Writes the header to a writer
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buffer = Vec::with_capacity(SIZE_MIN_HEADER + 2);
        buffer.extend_from_slice(&MAGIC);
        buffer.push(self.version);
        buffer.push(self.flags.bits());
        if self.flags.fixed_line_length() {
            write_varint(self.line_length, &mut buffer);
        }
        writer.write_all(&buffer)?;
        Ok(())
    }

    /// Column width for text output, 0 meaning one line per record
    #[must_use]
    pub fn line_length(&self) -> u64 {
        self.line_length
    }

    /// Stream presence and mode flags
    #[must_use]
    pub fn flags(&self) -> Flags {
        self.flags
    }
}

fn read_varint_bytewise<R: Read>(reader: &mut R) -> Result<u64> {
    let mut value = 0u64;
    let mut read = 0usize;
    loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        read += 1;
        value = value
            .checked_mul(128)
            .and_then(|v| v.checked_add(u64::from(byte[0] & 0x7F)))
            .ok_or(crate::error::DecodeError::VarintOverflow { offset: read })?;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn sample_flags() -> Flags {
        let mut flags = Flags::new();
        flags.set(StreamKind::Ids);
        flags.set(StreamKind::Lengths);
        flags.set(StreamKind::Sequence);
        flags
    }

    #[test]
    fn roundtrip_variable_mode() {
        let header = NafHeader::new(sample_flags());
        let mut buffer = Vec::new();
        header.write_bytes(&mut buffer).unwrap();
        assert_eq!(buffer.len(), SIZE_MIN_HEADER);
        assert_eq!(NafHeader::from_buffer(&buffer).unwrap(), header);
    }

    #[test]
    fn roundtrip_fixed_mode() {
        let header = NafHeader::with_line_length(sample_flags(), 60);
        let mut buffer = Vec::new();
        header.write_bytes(&mut buffer).unwrap();
        assert_eq!(buffer.len(), SIZE_MIN_HEADER + 1);
        let parsed = NafHeader::from_buffer(&buffer).unwrap();
        assert_eq!(parsed, header);
        assert!(parsed.flags().fixed_line_length());
        assert_eq!(parsed.line_length(), 60);
    }

    #[test]
    fn from_reader_stops_at_header_end() {
        let header = NafHeader::with_line_length(sample_flags(), 300);
        let mut buffer = Vec::new();
        header.write_bytes(&mut buffer).unwrap();
        buffer.extend_from_slice(b"BODY");
        let mut reader = std::io::Cursor::new(buffer);
        assert_eq!(NafHeader::from_reader(&mut reader).unwrap(), header);
        assert_eq!(reader.position(), (SIZE_MIN_HEADER + 2) as u64);
    }

    #[test]
    fn bad_magic_is_fatal() {
        let buffer = [0x50, 0x4B, 0x03, 0x01, 0x00];
        match NafHeader::from_buffer(&buffer) {
            Err(Error::HeaderError(HeaderError::BadMagic(m))) => {
                assert_eq!(m, [0x50, 0x4B, 0x03]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn newer_version_is_unsupported() {
        let buffer = [0x01, 0xF9, 0xEC, 0x07, 0x00];
        assert!(matches!(
            NafHeader::from_buffer(&buffer),
            Err(Error::HeaderError(HeaderError::UnsupportedVersion(7)))
        ));
    }

    #[test]
    fn zero_width_in_fixed_mode_is_malformed() {
        let buffer = [0x01, 0xF9, 0xEC, 0x01, 0x80, 0x00];
        assert!(matches!(
            NafHeader::from_buffer(&buffer),
            Err(Error::HeaderError(HeaderError::InvalidLineLength))
        ));
    }

    #[test]
    fn truncated_header() {
        let buffer = [0x01, 0xF9];
        assert!(matches!(
            NafHeader::from_buffer(&buffer),
            Err(Error::HeaderError(HeaderError::Truncated(_)))
        ));
    }

    #[test]
    fn flag_bits_roundtrip() {
        let mut flags = Flags::new();
        for kind in StreamKind::ALL {
            assert!(!flags.has(kind));
            flags.set(kind);
            assert!(flags.has(kind));
        }
        assert_eq!(flags.stream_bits(), 0x7F);
        flags.set_fixed_line_length(true);
        assert_eq!(flags.bits(), 0xFF);
        flags.clear(StreamKind::Quality);
        assert!(!flags.has(StreamKind::Quality));
        assert!(flags.fixed_line_length());
    }
}
