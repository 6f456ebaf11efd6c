use crate::stream::StreamKind;

/// Custom Result type for nafseq operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the nafseq library, encompassing all possible error
/// cases that can occur while reading or writing nucleotide archives.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to archive header processing
    HeaderError(#[from] HeaderError),
    /// Errors that occur while decoding an archive
    DecodeError(#[from] DecodeError),
    /// Errors that occur while encoding an archive
    EncodeError(#[from] EncodeError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}

/// Errors specific to parsing and validating archive headers
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The magic bytes at the start of the input do not identify a
    /// nucleotide archive
    #[error("Invalid magic bytes: {0:02x?}")]
    BadMagic([u8; 3]),

    /// The format version byte is newer than this implementation supports
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// The header declares fixed line-length mode but carries a zero width
    #[error("Fixed line-length mode with zero line length")]
    InvalidLineLength,

    /// The input ended before the header was complete
    ///
    /// Carries the number of bytes that were available.
    #[error("Input truncated inside the header ({0} bytes available)")]
    Truncated(usize),
}

/// Errors that can occur while decoding archive streams and records
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    /// The input ended inside a stream block's declared extent
    #[error("Input truncated inside the {kind} stream block at byte {offset}")]
    TruncatedInput { kind: StreamKind, offset: usize },

    /// The block decompressor rejected a stream block
    #[error("Failed to decompress the {kind} stream block")]
    CorruptStream { kind: StreamKind },

    /// A stream block decompressed to a different size than it declared
    #[error("The {kind} stream decompressed to {actual} bytes, expected {expected}")]
    BlockSizeMismatch {
        kind: StreamKind,
        expected: u64,
        actual: u64,
    },

    /// The cumulative sum of mask run lengths does not equal the total
    /// number of bases in the archive
    #[error("Mask runs cover {actual} bases, archive holds {expected}")]
    MaskLengthMismatch { expected: u64, actual: u64 },

    /// A zero-length run appeared in the interior of the mask stream
    #[error("Zero-length mask run at run index {index}")]
    ZeroMaskRun { index: usize },

    /// A stream ran out of data while assembling a record
    #[error("The {kind} stream is exhausted at record {record}")]
    StreamExhausted { kind: StreamKind, record: usize },

    /// A stream that other enabled streams depend on is absent
    #[error("The {kind} stream is required by the archive flags but absent")]
    MissingStream { kind: StreamKind },

    /// FASTQ output was requested from an archive without a quality stream
    #[error("Archive has no quality stream")]
    MissingQuality,

    /// A variable-length integer exceeded the 64-bit range
    #[error("Variable-length integer overflow at byte {offset}")]
    VarintOverflow { offset: usize },

    /// A cursor ran past the end of its buffer
    #[error("Unexpected end of input at byte {offset}")]
    UnexpectedEnd { offset: usize },

    /// An identifier or comment was not valid UTF-8
    #[error("The {kind} stream holds invalid UTF-8 at record {record}")]
    InvalidString { kind: StreamKind, record: usize },

    /// Data remained after the last declared stream block
    #[error("Trailing bytes after the final stream block at byte {offset}")]
    TrailingBytes { offset: usize },

    /// A FASTA/FASTQ text input violated the expected layout
    #[error("Malformed sequence text at line {line}: {reason}")]
    TextParse { line: u64, reason: &'static str },
}

/// Errors that can occur while encoding an archive
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    /// A sequence symbol has no entry in the 4-bit code table
    ///
    /// `position` is the global base offset across all pushed records.
    /// Raised under [`SymbolPolicy::Strict`](crate::SymbolPolicy).
    #[error("Invalid sequence symbol {symbol:#04x} at base position {position}")]
    InvalidSymbol { symbol: u8, position: u64 },

    /// A record identifier contains a byte the ids stream cannot carry
    #[error("Identifier of record {record} contains a NUL byte")]
    InvalidId { record: usize },

    /// Quality presence differs from the records pushed before
    ///
    /// An archive is either FASTA (no record has quality) or FASTQ (every
    /// record has quality); mixing the two is a caller bug.
    #[error("Record {record} disagrees with the archive on quality presence")]
    InconsistentQuality { record: usize },

    /// A quality string length differs from its sequence length
    #[error("Quality length ({got}) does not match sequence length ({expected})")]
    QualityLengthMismatch { expected: usize, got: usize },

    /// Header flags disagree with the streams actually supplied
    ///
    /// This is a precondition violation by the caller of the low-level
    /// stream API, not a recoverable data error.
    #[error("Header flags disagree with the supplied stream blocks")]
    InconsistentStreams,
}
