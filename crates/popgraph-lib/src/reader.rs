//! FASTA/FASTQ record readers with transparent gzip decompression
//!
//! Readers fill a caller-owned [`SequenceRecord`] so one buffer serves a
//! whole file. Every error except I/O leaves the reader positioned at the
//! next record header: the caller may log the error, skip the record and
//! keep reading.

use crate::encoding::is_sequence_symbol;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Error type for sequence readers
#[derive(Error, Debug)]
pub enum ReadError {
    /// Underlying read failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// A line was found where a record header was expected
    #[error("Syntax error at line {line}: expected a record starting with '{}'", *expected as char)]
    MissingHeader {
        /// Header marker that was expected
        expected: u8,
        /// One-based line number of the offending line
        line: usize,
    },
    /// A base outside A/C/G/T/N
    #[error("Invalid symbol {:?} at position {position} in entry {record}", *symbol as char)]
    InvalidSymbol {
        /// Record name
        record: String,
        /// Zero-based offset within the record's bases
        position: usize,
        /// Offending byte
        symbol: u8,
    },
    /// FASTQ record whose quality string differs in length from its bases
    #[error("Qualities [{qualities}] and sequence [{bases}] sizes don't coincide for {record}")]
    LengthMismatch {
        /// Record name
        record: String,
        /// Number of bases
        bases: usize,
        /// Number of quality values
        qualities: usize,
    },
    /// Record longer than the configured maximum read length
    #[error("Read {record} is longer than the maximum read length {max}")]
    TooLong {
        /// Record name
        record: String,
        /// Configured maximum
        max: usize,
    },
}

impl ReadError {
    /// Whether reading may continue with the next record
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ReadError::Io(_))
    }
}

/// One sequence record: name, bases and (FASTQ only) quality characters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceRecord {
    /// Header token up to the first whitespace, without the marker
    pub name: String,
    /// Bases as read (A/C/G/T/N, either case)
    pub bases: Vec<u8>,
    /// Raw quality characters, empty for FASTA
    pub qualities: Vec<u8>,
}

impl SequenceRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record with room for `max_read_length` bases
    pub fn with_capacity(max_read_length: usize) -> Self {
        Self {
            name: String::new(),
            bases: Vec::with_capacity(max_read_length),
            qualities: Vec::with_capacity(max_read_length),
        }
    }

    /// Number of bases
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// True if the record has no bases
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Reset for reuse, keeping allocations
    pub fn clear(&mut self) {
        self.name.clear();
        self.bases.clear();
        self.qualities.clear();
    }
}

/// A stream of sequence records
pub trait SequenceSource {
    /// Read the next record into `record`
    ///
    /// Returns `Ok(None)` at end of input and `Ok(Some(len))` with the number
    /// of bases otherwise. On a recoverable error the record's contents are
    /// unspecified and the next call continues with the following record.
    fn read_next(&mut self, record: &mut SequenceRecord) -> Result<Option<usize>, ReadError>;
}

impl<S: SequenceSource + ?Sized> SequenceSource for Box<S> {
    fn read_next(&mut self, record: &mut SequenceRecord) -> Result<Option<usize>, ReadError> {
        (**self).read_next(record)
    }
}

/// Line source with a single line of push-back
struct LineReader<R> {
    inner: R,
    line: Vec<u8>,
    peeked: bool,
    line_number: usize,
}

impl<R: BufRead> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            line: Vec::with_capacity(256),
            peeked: false,
            line_number: 0,
        }
    }

    /// Load the next line into `self.line`; false at end of input
    fn advance(&mut self) -> io::Result<bool> {
        if self.peeked {
            self.peeked = false;
            return Ok(true);
        }
        self.line.clear();
        let n = self.inner.read_until(b'\n', &mut self.line)?;
        if n == 0 {
            return Ok(false);
        }
        self.line_number += 1;
        Ok(true)
    }

    /// Hand the current line back so the next `advance` returns it again
    fn push_back(&mut self) {
        self.peeked = true;
    }

    fn starts_with(&self, marker: u8) -> bool {
        self.line.first() == Some(&marker)
    }

    /// Current line up to the first whitespace character
    fn content(&self) -> &[u8] {
        let end = self
            .line
            .iter()
            .position(|&b| matches!(b, b'\n' | b'\r' | b' ' | b'\t'))
            .unwrap_or(self.line.len());
        &self.line[..end]
    }

    /// Skip forward until a line starting with `marker`, leaving it pushed back
    fn resync(&mut self, marker: u8) -> io::Result<()> {
        while self.advance()? {
            if self.starts_with(marker) {
                self.push_back();
                break;
            }
        }
        Ok(())
    }

    /// Read a header line, skipping blank lines
    ///
    /// Returns `Ok(None)` at end of input.
    fn header(&mut self, marker: u8) -> Result<Option<String>, ReadError> {
        loop {
            if !self.advance()? {
                return Ok(None);
            }
            if self.content().is_empty() && !self.starts_with(marker) {
                continue;
            }
            if !self.starts_with(marker) {
                let line = self.line_number;
                self.resync(marker)?;
                return Err(ReadError::MissingHeader {
                    expected: marker,
                    line,
                });
            }
            let name = self.content()[1..].to_vec();
            return Ok(Some(String::from_utf8_lossy(&name).into_owned()));
        }
    }
}

/// Append the current line's bases to `bases`, remembering the first problem
fn take_bases(
    content: &[u8],
    bases: &mut Vec<u8>,
    name: &str,
    max_read_length: usize,
    error: &mut Option<ReadError>,
) {
    if error.is_some() {
        return;
    }
    for &base in content {
        if !is_sequence_symbol(base) {
            *error = Some(ReadError::InvalidSymbol {
                record: name.to_string(),
                position: bases.len(),
                symbol: base,
            });
            return;
        }
        if bases.len() == max_read_length {
            *error = Some(ReadError::TooLong {
                record: name.to_string(),
                max: max_read_length,
            });
            return;
        }
        bases.push(base);
    }
}

/// FASTA reader
///
/// A record is a `>` header followed by any number of sequence lines; the
/// body ends at the next header or at end of input.
pub struct FastaReader<R> {
    lines: LineReader<R>,
    max_read_length: usize,
}

impl<R: BufRead> FastaReader<R> {
    /// Wrap a buffered reader
    pub fn new(inner: R, max_read_length: usize) -> Self {
        Self {
            lines: LineReader::new(inner),
            max_read_length,
        }
    }
}

impl FastaReader<Box<dyn BufRead>> {
    /// Open a FASTA file, decompressing `.gz` input
    pub fn from_path<P: AsRef<Path>>(path: P, max_read_length: usize) -> io::Result<Self> {
        Ok(Self::new(open_input(path)?, max_read_length))
    }
}

impl<R: BufRead> SequenceSource for FastaReader<R> {
    fn read_next(&mut self, record: &mut SequenceRecord) -> Result<Option<usize>, ReadError> {
        record.clear();
        let Some(name) = self.lines.header(b'>')? else {
            return Ok(None);
        };
        record.name = name;

        let mut error = None;
        while self.lines.advance()? {
            if self.lines.starts_with(b'>') {
                self.lines.push_back();
                break;
            }
            take_bases(
                self.lines.content(),
                &mut record.bases,
                &record.name,
                self.max_read_length,
                &mut error,
            );
        }

        match error {
            Some(e) => Err(e),
            None => Ok(Some(record.bases.len())),
        }
    }
}

/// FASTQ reader
///
/// Sequence and quality strings may span several lines. A line starting
/// with `@` only ends the qualities once there are at least as many quality
/// characters as base characters, since `@` is also a valid quality
/// character. Both counts include characters of a record already known to
/// be bad.
pub struct FastqReader<R> {
    lines: LineReader<R>,
    max_read_length: usize,
}

impl<R: BufRead> FastqReader<R> {
    /// Wrap a buffered reader
    pub fn new(inner: R, max_read_length: usize) -> Self {
        Self {
            lines: LineReader::new(inner),
            max_read_length,
        }
    }
}

impl FastqReader<Box<dyn BufRead>> {
    /// Open a FASTQ file, decompressing `.gz` input
    pub fn from_path<P: AsRef<Path>>(path: P, max_read_length: usize) -> io::Result<Self> {
        Ok(Self::new(open_input(path)?, max_read_length))
    }
}

impl<R: BufRead> SequenceSource for FastqReader<R> {
    fn read_next(&mut self, record: &mut SequenceRecord) -> Result<Option<usize>, ReadError> {
        record.clear();
        let Some(name) = self.lines.header(b'@')? else {
            return Ok(None);
        };
        record.name = name;

        // Symbols as written, including any past an error or the length limit
        let mut base_symbols = 0;
        let mut quality_symbols = 0;

        let mut error = None;
        let mut found_separator = false;
        while self.lines.advance()? {
            if self.lines.starts_with(b'+') || self.lines.starts_with(b'-') {
                found_separator = true;
                break;
            }
            base_symbols += self.lines.content().len();
            take_bases(
                self.lines.content(),
                &mut record.bases,
                &record.name,
                self.max_read_length,
                &mut error,
            );
        }
        if !found_separator {
            return Err(error.unwrap_or(ReadError::MissingHeader {
                expected: b'+',
                line: self.lines.line_number + 1,
            }));
        }

        while self.lines.advance()? {
            if self.lines.starts_with(b'@') && quality_symbols >= base_symbols {
                self.lines.push_back();
                break;
            }
            let content = self.lines.content();
            quality_symbols += content.len();
            let room = self.max_read_length.saturating_sub(record.qualities.len());
            if content.len() > room && error.is_none() {
                error = Some(ReadError::TooLong {
                    record: record.name.clone(),
                    max: self.max_read_length,
                });
            }
            record
                .qualities
                .extend_from_slice(&content[..content.len().min(room)]);
        }

        if let Some(e) = error {
            return Err(e);
        }
        if record.qualities.len() != record.bases.len() {
            return Err(ReadError::LengthMismatch {
                record: record.name.clone(),
                bases: record.bases.len(),
                qualities: record.qualities.len(),
            });
        }
        Ok(Some(record.bases.len()))
    }
}

/// Sequence file flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceFormat {
    /// `>` records, no qualities
    Fasta,
    /// `@` / `+` records with qualities
    Fastq,
}

/// Open a sequence file of the given format as a boxed record source
pub fn open_sequence_file<P: AsRef<Path>>(
    path: P,
    format: SequenceFormat,
    max_read_length: usize,
) -> io::Result<Box<dyn SequenceSource>> {
    let input = open_input(path)?;
    Ok(match format {
        SequenceFormat::Fasta => Box::new(FastaReader::new(input, max_read_length)),
        SequenceFormat::Fastq => Box::new(FastqReader::new(input, max_read_length)),
    })
}

/// Open a file for buffered reading, decompressing it if it ends in `.gz`
pub fn open_input<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let gzipped = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

    Ok(if gzipped {
        Box::new(BufReader::new(MultiGzDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn fasta(text: &str) -> FastaReader<Cursor<Vec<u8>>> {
        FastaReader::new(Cursor::new(text.as_bytes().to_vec()), 100)
    }

    fn fastq(text: &str) -> FastqReader<Cursor<Vec<u8>>> {
        FastqReader::new(Cursor::new(text.as_bytes().to_vec()), 100)
    }

    #[test]
    fn test_fasta_multiline_records() {
        let mut reader = fasta(">seq1 description\nACGT\nNNac\n\n>seq2\nTTT\n");
        let mut record = SequenceRecord::new();

        assert_eq!(reader.read_next(&mut record).unwrap(), Some(8));
        assert_eq!(record.name, "seq1");
        assert_eq!(record.bases, b"ACGTNNac");
        assert!(record.qualities.is_empty());

        assert_eq!(reader.read_next(&mut record).unwrap(), Some(3));
        assert_eq!(record.name, "seq2");
        assert_eq!(record.bases, b"TTT");

        assert_eq!(reader.read_next(&mut record).unwrap(), None);
        assert_eq!(reader.read_next(&mut record).unwrap(), None);
    }

    #[test]
    fn test_fasta_whitespace_ends_line() {
        let mut reader = fasta(">s\r\nACG TTT\r\nCC\tGG\n");
        let mut record = SequenceRecord::new();
        assert_eq!(reader.read_next(&mut record).unwrap(), Some(5));
        assert_eq!(record.bases, b"ACGCC");
    }

    #[test]
    fn test_fasta_invalid_symbol_resyncs() {
        let mut reader = fasta(">bad\nACXT\nAAAA\n>good\nCCCC\n");
        let mut record = SequenceRecord::new();

        match reader.read_next(&mut record) {
            Err(ReadError::InvalidSymbol { record, position, symbol }) => {
                assert_eq!(record, "bad");
                assert_eq!(position, 2);
                assert_eq!(symbol, b'X');
            }
            other => panic!("expected invalid symbol, got {:?}", other),
        }

        assert_eq!(reader.read_next(&mut record).unwrap(), Some(4));
        assert_eq!(record.name, "good");
    }

    #[test]
    fn test_fasta_missing_header() {
        let mut reader = fasta("ACGT\nACGT\n>ok\nA\n");
        let mut record = SequenceRecord::new();

        let err = reader.read_next(&mut record).unwrap_err();
        assert!(matches!(err, ReadError::MissingHeader { expected: b'>', line: 1 }));
        assert!(err.is_recoverable());

        assert_eq!(reader.read_next(&mut record).unwrap(), Some(1));
        assert_eq!(record.name, "ok");
    }

    #[test]
    fn test_fasta_too_long() {
        let mut reader = FastaReader::new(Cursor::new(b">long\nACGTACGT\nAC\n>short\nAC\n".to_vec()), 6);
        let mut record = SequenceRecord::new();

        assert!(matches!(
            reader.read_next(&mut record),
            Err(ReadError::TooLong { max: 6, .. })
        ));
        assert_eq!(reader.read_next(&mut record).unwrap(), Some(2));
        assert_eq!(record.name, "short");
    }

    #[test]
    fn test_fasta_empty_record() {
        let mut reader = fasta(">empty\n>full\nAC\n");
        let mut record = SequenceRecord::new();
        assert_eq!(reader.read_next(&mut record).unwrap(), Some(0));
        assert_eq!(record.name, "empty");
        assert_eq!(reader.read_next(&mut record).unwrap(), Some(2));
    }

    #[test]
    fn test_fastq_basic() {
        let mut reader = fastq("@r1\nACGT\n+\nIIII\n@r2 extra\nAC\nGT\n+r2\nII\n#I\n");
        let mut record = SequenceRecord::new();

        assert_eq!(reader.read_next(&mut record).unwrap(), Some(4));
        assert_eq!(record.name, "r1");
        assert_eq!(record.qualities, b"IIII");

        assert_eq!(reader.read_next(&mut record).unwrap(), Some(4));
        assert_eq!(record.name, "r2");
        assert_eq!(record.bases, b"ACGT");
        assert_eq!(record.qualities, b"II#I");

        assert_eq!(reader.read_next(&mut record).unwrap(), None);
    }

    #[test]
    fn test_fastq_quality_starting_with_at() {
        // The first quality line starts with '@' but the qualities are not complete yet
        let mut reader = fastq("@r1\nACGT\n+\n@@II\n@r2\nA\n+\nI\n");
        let mut record = SequenceRecord::new();

        assert_eq!(reader.read_next(&mut record).unwrap(), Some(4));
        assert_eq!(record.qualities, b"@@II");
        assert_eq!(reader.read_next(&mut record).unwrap(), Some(1));
        assert_eq!(record.name, "r2");
    }

    #[test]
    fn test_fastq_length_mismatch_resyncs() {
        let mut reader = fastq("@r1\nACGT\n+\nIIIIII\n@r2\nAC\n+\nII\n");
        let mut record = SequenceRecord::new();

        assert!(matches!(
            reader.read_next(&mut record),
            Err(ReadError::LengthMismatch { bases: 4, qualities: 6, .. })
        ));
        assert_eq!(reader.read_next(&mut record).unwrap(), Some(2));
        assert_eq!(record.name, "r2");
    }

    #[test]
    fn test_fastq_invalid_base_resyncs() {
        let mut reader = fastq("@r1\nAC.T\n+\nIIII\n@r2\nAC\n+\nII\n");
        let mut record = SequenceRecord::new();

        assert!(matches!(
            reader.read_next(&mut record),
            Err(ReadError::InvalidSymbol { position: 2, symbol: b'.', .. })
        ));
        assert_eq!(reader.read_next(&mut record).unwrap(), Some(2));
    }

    #[test]
    fn test_fastq_bad_record_with_at_qualities() {
        // Only the first base is stored before the error, but all five count
        // towards the quality terminator rule
        let mut reader = fastq("@r1\nXCGTA\n+\n@IIII\n@r2\nACGTA\n+\nIIIII\n");
        let mut record = SequenceRecord::new();

        assert!(matches!(
            reader.read_next(&mut record),
            Err(ReadError::InvalidSymbol { position: 0, symbol: b'X', .. })
        ));
        assert_eq!(reader.read_next(&mut record).unwrap(), Some(5));
        assert_eq!(record.name, "r2");
        assert_eq!(reader.read_next(&mut record).unwrap(), None);
    }

    #[test]
    fn test_fastq_too_long_with_at_qualities() {
        let text = b"@r1\nACGTAC\n+\n@IIIII\n@r2\nACG\n+\nIII\n".to_vec();
        let mut reader = FastqReader::new(Cursor::new(text), 4);
        let mut record = SequenceRecord::new();

        assert!(matches!(
            reader.read_next(&mut record),
            Err(ReadError::TooLong { max: 4, .. })
        ));
        assert_eq!(reader.read_next(&mut record).unwrap(), Some(3));
        assert_eq!(record.name, "r2");
    }

    #[test]
    fn test_fastq_missing_separator() {
        let mut reader = fastq("@r1\nACGT\n");
        let mut record = SequenceRecord::new();
        assert!(matches!(
            reader.read_next(&mut record),
            Err(ReadError::MissingHeader { expected: b'+', .. })
        ));
        assert_eq!(reader.read_next(&mut record).unwrap(), None);
    }

    #[test]
    fn test_open_plain_and_gzip() -> anyhow::Result<()> {
        let mut plain = NamedTempFile::new()?;
        writeln!(plain, ">a")?;
        writeln!(plain, "ACGT")?;
        plain.flush()?;

        let gz_path = tempfile::Builder::new().suffix(".fa.gz").tempfile()?;
        {
            let file = std::fs::File::create(gz_path.path())?;
            let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
            writeln!(encoder, ">b")?;
            writeln!(encoder, "GGCC")?;
            encoder.finish()?;
        }

        let mut record = SequenceRecord::with_capacity(16);
        let mut reader = open_sequence_file(plain.path(), SequenceFormat::Fasta, 16)?;
        assert_eq!(reader.read_next(&mut record)?, Some(4));
        assert_eq!(record.name, "a");

        let mut reader = FastaReader::from_path(gz_path.path(), 16)?;
        assert_eq!(reader.read_next(&mut record)?, Some(4));
        assert_eq!(record.name, "b");
        assert_eq!(record.bases, b"GGCC");
        Ok(())
    }
}
