//! The FASTA/FASTQ text boundary.
//!
//! Readers parse text input into [`Record`]s for the encode path; the
//! write functions render decoded records back to text, re-wrapping
//! sequence (and quality) lines at the archive's declared width. A width
//! of zero emits one line per field.
//!
//! FASTQ input is parsed in its four-line form (the near-universal layout);
//! multi-line FASTQ is not supported. FASTA sequences may span any number
//! of lines.

use std::io::{BufRead, Write};

use crate::error::{DecodeError, Result};
use crate::record::Record;

/// Splits a header line (after `>` or `@`) into identifier and comment at
/// the first space
fn split_header(line: &[u8], line_no: u64) -> Result<(String, Option<String>)> {
    let text = std::str::from_utf8(line).map_err(|_| DecodeError::TextParse {
        line: line_no,
        reason: "header is not valid UTF-8",
    })?;
    match memchr::memchr(b' ', line) {
        Some(at) => {
            let comment = text[at + 1..].to_string();
            let comment = (!comment.is_empty()).then_some(comment);
            Ok((text[..at].to_string(), comment))
        }
        None => Ok((text.to_string(), None)),
    }
}

fn trim_newline(line: &mut Vec<u8>) {
    while matches!(line.last(), Some(b'\n' | b'\r')) {
        line.pop();
    }
}

/// A reader over FASTA text, yielding one [`Record`] per entry.
///
/// Sequences spanning multiple lines are concatenated; blank lines between
/// records are tolerated.
pub struct FastaReader<R: BufRead> {
    reader: R,
    /// Header line of the next record, already consumed from the reader
    pending: Option<Vec<u8>>,
    line_no: u64,
    done: bool,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: None,
            line_no: 0,
            done: false,
        }
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let n = self.reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        trim_newline(&mut line);
        Ok(Some(line))
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        let header = match self.pending.take() {
            Some(header) => header,
            None => loop {
                match self.read_line()? {
                    None => return Ok(None),
                    Some(line) if line.is_empty() => {}
                    Some(line) => break line,
                }
            },
        };
        if header.first() != Some(&b'>') {
            return Err(DecodeError::TextParse {
                line: self.line_no,
                reason: "expected '>' at record start",
            }
            .into());
        }
        let (id, comment) = split_header(&header[1..], self.line_no)?;
        let mut sequence = Vec::new();
        loop {
            match self.read_line()? {
                None => break,
                Some(line) if line.first() == Some(&b'>') => {
                    self.pending = Some(line);
                    break;
                }
                Some(line) => sequence.extend_from_slice(&line),
            }
        }
        let mut record = Record::new(id, sequence);
        record.comment = comment;
        Ok(Some(record))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// A reader over four-line FASTQ text, yielding one [`Record`] per entry.
pub struct FastqReader<R: BufRead> {
    reader: R,
    line_no: u64,
    done: bool,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            done: false,
        }
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let n = self.reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        trim_newline(&mut line);
        Ok(Some(line))
    }

    fn parse_error(&self, reason: &'static str) -> crate::Error {
        DecodeError::TextParse {
            line: self.line_no,
            reason,
        }
        .into()
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        let header = loop {
            match self.read_line()? {
                None => return Ok(None),
                Some(line) if line.is_empty() => {}
                Some(line) => break line,
            }
        };
        if header.first() != Some(&b'@') {
            return Err(self.parse_error("expected '@' at record start"));
        }
        let (id, comment) = split_header(&header[1..], self.line_no)?;
        let sequence = self
            .read_line()?
            .ok_or_else(|| self.parse_error("missing sequence line"))?;
        let plus = self
            .read_line()?
            .ok_or_else(|| self.parse_error("missing '+' line"))?;
        if plus.first() != Some(&b'+') {
            return Err(self.parse_error("expected '+' separator"));
        }
        let quality = self
            .read_line()?
            .ok_or_else(|| self.parse_error("missing quality line"))?;
        if quality.len() != sequence.len() {
            return Err(self.parse_error("quality length differs from sequence length"));
        }
        let mut record = Record::new(id, sequence).with_quality(quality);
        record.comment = comment;
        Ok(Some(record))
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn write_wrapped<W: Write>(sink: &mut W, bytes: &[u8], width: u64) -> Result<()> {
    if width == 0 || bytes.is_empty() {
        sink.write_all(bytes)?;
        sink.write_all(b"\n")?;
        return Ok(());
    }
    for chunk in bytes.chunks(width as usize) {
        sink.write_all(chunk)?;
        sink.write_all(b"\n")?;
    }
    Ok(())
}

/// Renders one record as FASTA text, wrapping the sequence at `width`
/// columns (0 = single line).
///
/// A zero-length record produces a header followed by one empty sequence
/// line.
pub fn write_fasta_record<W: Write>(sink: &mut W, record: &Record, width: u64) -> Result<()> {
    sink.write_all(b">")?;
    sink.write_all(record.id.as_bytes())?;
    if let Some(comment) = &record.comment {
        sink.write_all(b" ")?;
        sink.write_all(comment.as_bytes())?;
    }
    sink.write_all(b"\n")?;
    write_wrapped(sink, &record.sequence, width)
}

/// Renders one record as FASTQ text, wrapping sequence and quality
/// identically at `width` columns (0 = single line).
pub fn write_fastq_record<W: Write>(sink: &mut W, record: &Record, width: u64) -> Result<()> {
    let quality = record.quality.as_deref().ok_or(DecodeError::MissingQuality)?;
    sink.write_all(b"@")?;
    sink.write_all(record.id.as_bytes())?;
    if let Some(comment) = &record.comment {
        sink.write_all(b" ")?;
        sink.write_all(comment.as_bytes())?;
    }
    sink.write_all(b"\n")?;
    write_wrapped(sink, &record.sequence, width)?;
    sink.write_all(b"+\n")?;
    write_wrapped(sink, quality, width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse_fasta(text: &str) -> Vec<Record> {
        FastaReader::new(Cursor::new(text.as_bytes()))
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn parses_multiline_fasta() {
        let records = parse_fasta(">seq1 first sample\nACGT\nacgt\n>seq2\nGGCC\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "seq1");
        assert_eq!(records[0].comment.as_deref(), Some("first sample"));
        assert_eq!(records[0].sequence, b"ACGTacgt");
        assert_eq!(records[1].id, "seq2");
        assert_eq!(records[1].comment, None);
        assert_eq!(records[1].sequence, b"GGCC");
    }

    #[test]
    fn parses_empty_sequence_and_crlf() {
        let records = parse_fasta(">empty\r\n>after\r\nAC\r\nGT\r\n");
        assert_eq!(records.len(), 2);
        assert!(records[0].sequence.is_empty());
        assert_eq!(records[1].sequence, b"ACGT");
    }

    #[test]
    fn rejects_headerless_fasta() {
        let result: Result<Vec<_>> =
            FastaReader::new(Cursor::new(&b"ACGT\n"[..])).collect();
        assert!(result.is_err());
    }

    #[test]
    fn parses_fastq() {
        let text = "@r1 lane1\nACGT\n+\n!!!!\n@r2\nGG\n+r2\nII\n";
        let records: Vec<Record> = FastqReader::new(Cursor::new(text.as_bytes()))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "r1");
        assert_eq!(records[0].comment.as_deref(), Some("lane1"));
        assert_eq!(records[0].quality.as_deref(), Some(&b"!!!!"[..]));
        assert_eq!(records[1].quality.as_deref(), Some(&b"II"[..]));
    }

    #[test]
    fn rejects_quality_length_mismatch() {
        let text = "@r1\nACGT\n+\n!!\n";
        let result: Result<Vec<Record>> =
            FastqReader::new(Cursor::new(text.as_bytes())).collect();
        assert!(result.is_err());
    }

    #[test]
    fn fasta_output_wraps() {
        let record = Record::new("seq1", *b"ACGTACGTAC");
        let mut out = Vec::new();
        write_fasta_record(&mut out, &record, 4).unwrap();
        assert_eq!(out, b">seq1\nACGT\nACGT\nAC\n");
    }

    #[test]
    fn fasta_output_single_line_when_variable() {
        let record = Record::new("seq1", *b"ACGTACGTAC").with_comment("x");
        let mut out = Vec::new();
        write_fasta_record(&mut out, &record, 0).unwrap();
        assert_eq!(out, b">seq1 x\nACGTACGTAC\n");
    }

    #[test]
    fn empty_record_gets_empty_sequence_line() {
        let record = Record::new("empty", Vec::new());
        let mut out = Vec::new();
        write_fasta_record(&mut out, &record, 60).unwrap();
        assert_eq!(out, b">empty\n\n");
    }

    #[test]
    fn fastq_output_roundtrips_through_parser() {
        let record = Record::new("r1", *b"ACGT").with_quality(*b"!!!!");
        let mut out = Vec::new();
        write_fastq_record(&mut out, &record, 0).unwrap();
        assert_eq!(out, b"@r1\nACGT\n+\n!!!!\n");
        let reparsed: Vec<Record> = FastqReader::new(Cursor::new(&out[..]))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(reparsed, [record]);
    }
}
