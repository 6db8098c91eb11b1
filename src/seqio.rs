//! Sequence I/O Module
//!
//! Sequential FASTA reading for plain or gzip-compressed files. Database
//! FASTA files (VFDB) carry their metadata in the header line, so records
//! keep the full header text alongside the identifier.
//!
//! # Examples
//! ```no_run
//! use respath::seqio::FastaReader;
//!
//! // Auto-detects gzip from the `.gz` extension
//! let mut reader = FastaReader::open("VFDB_setA_pro.fas.gz").unwrap();
//! while let Some(record) = reader.read_next().unwrap() {
//!     println!("{}: {} aa", record.name, record.seq.len());
//! }
//! ```

use crate::error::{Error, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

// ============================================================================
// FASTA Format
// ============================================================================

/// A FASTA record.
///
/// # Fields
/// - `name`: Sequence identifier (text after '>' up to first whitespace)
/// - `header`: Full header line without the leading '>'
/// - `seq`: Sequence (concatenated from all sequence lines)
#[derive(Debug, Clone, PartialEq)]
pub struct FastaRecord {
    pub name: String,
    pub header: String,
    pub seq: String,
}

/// Sequential reader for FASTA data from any source.
///
/// Reads records one at a time with minimal memory footprint.
pub struct FastaReader<R: BufRead> {
    reader: R,
    line_buf: String,
    current_header: Option<String>,
}

impl FastaReader<BufReader<Box<dyn Read>>> {
    /// Opens a FASTA file, decompressing it when the extension is `.gz`.
    ///
    /// # Errors
    /// [`Error::SourceNotFound`] if the file does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::SourceNotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let source: Box<dyn Read> = match path.extension().and_then(|e| e.to_str()) {
            Some("gz") => Box::new(MultiGzDecoder::new(file)),
            _ => Box::new(file),
        };
        Self::new(BufReader::with_capacity(1024 * 1024, source))
    }
}

impl<R: BufRead> FastaReader<R> {
    /// Wraps a reader, skipping anything before the first header line.
    pub fn new(reader: R) -> Result<Self> {
        let mut reader = Self {
            reader,
            line_buf: String::with_capacity(256),
            current_header: None,
        };

        loop {
            reader.line_buf.clear();
            if reader.reader.read_line(&mut reader.line_buf)? == 0 {
                break;
            }
            if let Some(header) = reader.line_buf.strip_prefix('>') {
                reader.current_header = Some(header.trim_end().to_string());
                break;
            }
        }

        Ok(reader)
    }

    /// Reads the next FASTA record.
    ///
    /// # Returns
    /// - `Ok(Some(record))` - Successfully read a record
    /// - `Ok(None)` - End of file reached
    /// - `Err(e)` - I/O error occurred
    pub fn read_next(&mut self) -> Result<Option<FastaRecord>> {
        let header = match self.current_header.take() {
            Some(h) => h,
            None => return Ok(None),
        };

        let mut seq = String::with_capacity(1024);
        loop {
            self.line_buf.clear();
            if self.reader.read_line(&mut self.line_buf)? == 0 {
                break;
            }
            if let Some(next) = self.line_buf.strip_prefix('>') {
                self.current_header = Some(next.trim_end().to_string());
                break;
            }
            seq.push_str(self.line_buf.trim_end());
        }

        let name = header.split_whitespace().next().unwrap_or("").to_string();
        Ok(Some(FastaRecord { name, header, seq }))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    const FASTA: &str = ">seq1 first record\nACGT\nAC\n>seq2\n\nMKV\n";

    #[test]
    fn test_read_records() {
        let records: Vec<_> = FastaReader::new(Cursor::new(FASTA))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "seq1");
        assert_eq!(records[0].header, "seq1 first record");
        assert_eq!(records[0].seq, "ACGTAC");
        assert_eq!(records[1].seq, "MKV");
    }

    #[test]
    fn test_open_gzipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.fas.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        enc.write_all(FASTA.as_bytes()).unwrap();
        enc.finish().unwrap();

        let mut reader = FastaReader::open(&path).unwrap();
        assert_eq!(reader.read_next().unwrap().unwrap().name, "seq1");
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            FastaReader::open("missing.fas"),
            Err(Error::SourceNotFound(_))
        ));
    }
}
