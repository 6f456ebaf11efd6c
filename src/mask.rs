//! Run-length codec for soft-mask (lowercase) regions.
//!
//! The mask stream covers the concatenation of every sequence in the
//! archive with alternating run lengths, starting from an implicit
//! uppercase state at global offset zero. Runs are varints; a zero-length
//! run is only legal as the very first run, when the archive opens in the
//! lowercase state and the alternation needs an immediate flip. Decoding
//! validates that the runs cover the archive's total base count exactly.

use crate::error::DecodeError;
use crate::varint::{write_varint, ByteCursor};

/// One contiguous lowercase region, in global base coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskRun {
    /// Absolute offset of the first lowercase base
    pub start: u64,
    /// Number of lowercase bases
    pub len: u64,
}

impl MaskRun {
    /// Exclusive end offset of the run
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// Incremental encoder building the archive-wide mask stream.
///
/// Records are pushed in archive order; adjacent same-state runs merge
/// across record boundaries, so concatenation can never introduce an
/// interior zero-length run.
#[derive(Debug, Default)]
pub struct MaskEncoder {
    /// Alternating run lengths, uppercase first
    runs: Vec<u64>,
    /// State of the run currently being extended
    lowercase: bool,
    /// Length of the run currently being extended
    current: u64,
    any_lowercase: bool,
}

impl MaskEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one record's case pattern into the global run sequence
    pub fn push(&mut self, sequence: &[u8]) {
        for &symbol in sequence {
            let lower = symbol.is_ascii_lowercase();
            if lower != self.lowercase {
                self.runs.push(self.current);
                self.lowercase = lower;
                self.current = 0;
            }
            self.current += 1;
            self.any_lowercase |= lower;
        }
    }

    /// Finishes the stream, returning its encoded bytes.
    ///
    /// Returns `None` when no base was lowercase: an all-uppercase archive
    /// carries no mask stream at all.
    #[must_use]
    pub fn finish(mut self) -> Option<Vec<u8>> {
        if !self.any_lowercase {
            return None;
        }
        if self.current > 0 {
            self.runs.push(self.current);
        }
        let mut out = Vec::with_capacity(self.runs.len());
        for run in self.runs {
            write_varint(run, &mut out);
        }
        Some(out)
    }
}

/// Decodes a mask stream into lowercase runs with absolute offsets.
///
/// The cumulative length of all runs (both states) must equal
/// `total_bases`; a shortfall or excess is [`DecodeError::MaskLengthMismatch`].
/// Zero-length runs past the first are [`DecodeError::ZeroMaskRun`].
pub fn decode_runs(bytes: &[u8], total_bases: u64) -> Result<Vec<MaskRun>, DecodeError> {
    let mut cursor = ByteCursor::new(bytes);
    let mut runs = Vec::new();
    let mut offset = 0u64;
    let mut lowercase = false;
    let mut index = 0usize;
    while !cursor.is_empty() {
        let len = cursor.read_varint()?;
        if len == 0 && index > 0 {
            return Err(DecodeError::ZeroMaskRun { index });
        }
        if lowercase && len > 0 {
            runs.push(MaskRun { start: offset, len });
        }
        offset = offset
            .checked_add(len)
            .ok_or(DecodeError::VarintOverflow {
                offset: cursor.position(),
            })?;
        lowercase = !lowercase;
        index += 1;
    }
    if offset != total_bases {
        return Err(DecodeError::MaskLengthMismatch {
            expected: total_bases,
            actual: offset,
        });
    }
    Ok(runs)
}

/// Translates global lowercase runs into one record's coordinate space.
///
/// Pure coordinate arithmetic: `start` is the record's global base offset
/// and the returned runs are relative to the record, clipped to its extent.
#[must_use]
pub fn slice_for_record(runs: &[MaskRun], start: u64, len: u64) -> Vec<MaskRun> {
    let end = start + len;
    let first = runs.partition_point(|run| run.end() <= start);
    let mut out = Vec::new();
    for run in &runs[first..] {
        if run.start >= end {
            break;
        }
        let clipped_start = run.start.max(start);
        let clipped_end = run.end().min(end);
        out.push(MaskRun {
            start: clipped_start - start,
            len: clipped_end - clipped_start,
        });
    }
    out
}

/// Lowercases the positions of `sequence` covered by record-relative runs.
///
/// Unpacked symbols arrive uppercase, so positions outside every run are
/// already in their final case.
pub fn apply_mask(sequence: &mut [u8], runs: &[MaskRun]) {
    for run in runs {
        let start = run.start as usize;
        let end = run.end() as usize;
        sequence[start..end].make_ascii_lowercase();
    }
}
