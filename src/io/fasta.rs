// src/io/fasta.rs
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use flate2::write::GzEncoder;
use flate2::read::MultiGzDecoder;
use flate2::Compression;

use crate::error::{BridgeError, Result};

pub enum FastaWriter {
    Plain(BufWriter<File>),
    Compressed(BufWriter<GzEncoder<File>>),
}

/// Open a text file for reading, handles gzipped files automatically
pub fn open_text(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path).map_err(|e| BridgeError::io(path, e))?;
    if is_gz(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn is_gz(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

impl FastaWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| BridgeError::io(path, e))?;
        if is_gz(path) {
            let encoder = GzEncoder::new(file, Compression::default());
            Ok(FastaWriter::Compressed(BufWriter::new(encoder)))
        } else {
            Ok(FastaWriter::Plain(BufWriter::new(file)))
        }
    }

    pub fn write_record(&mut self, header: &str, sequence: &str) -> std::io::Result<()> {
        match self {
            FastaWriter::Plain(writer) => {
                writeln!(writer, ">{}", header)?;
                writeln!(writer, "{}", sequence)?;
            },
            FastaWriter::Compressed(writer) => {
                writeln!(writer, ">{}", header)?;
                writeln!(writer, "{}", sequence)?;
            },
        };
        Ok(())
    }

    /// Flush buffers and finish the gzip stream if there is one.
    pub fn finish(self) -> std::io::Result<()> {
        match self {
            FastaWriter::Plain(mut writer) => writer.flush(),
            FastaWriter::Compressed(writer) => {
                let encoder = writer.into_inner().map_err(|e| e.into_error())?;
                encoder.finish()?;
                Ok(())
            }
        }
    }
}

/// A FASTA or FASTQ record; only the name (first header token) and bases are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqRecord {
    pub name: String,
    pub sequence: String,
}

/// Streaming reader over FASTA (multi-line) or FASTQ (4-line) records.
///
/// The format is decided per record by its leading `>` or `@`.
pub struct SeqRecordReader<R: BufRead> {
    reader: R,
    path: PathBuf,
    line_no: usize,
    pending: Option<String>,
}

impl<R: BufRead> SeqRecordReader<R> {
    pub fn new(reader: R, path: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            path: path.into(),
            line_no: 0,
            pending: None,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .map_err(|e| BridgeError::io(&self.path, e))?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    fn record_name(header: &str) -> String {
        header[1..].split_whitespace().next().unwrap_or("").to_string()
    }

    fn read_record(&mut self) -> Result<Option<SeqRecord>> {
        let header = loop {
            match self.next_line()? {
                None => return Ok(None),
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break line,
            }
        };

        if header.starts_with('>') {
            let name = Self::record_name(&header);
            let mut sequence = String::new();
            while let Some(line) = self.next_line()? {
                if line.starts_with('>') {
                    self.pending = Some(line);
                    break;
                }
                sequence.push_str(line.trim());
            }
            Ok(Some(SeqRecord { name, sequence }))
        } else if header.starts_with('@') {
            let name = Self::record_name(&header);
            let sequence = self.next_line()?.unwrap_or_default();
            let plus = self.next_line()?.unwrap_or_default();
            if !plus.starts_with('+') {
                return Err(BridgeError::parse(&self.path, self.line_no, "FASTQ record missing '+' separator"));
            }
            let quality = self.next_line()?.unwrap_or_default();
            if quality.len() != sequence.len() {
                return Err(BridgeError::parse(&self.path, self.line_no, "FASTQ quality length differs from sequence"));
            }
            Ok(Some(SeqRecord { name, sequence }))
        } else {
            Err(BridgeError::parse(&self.path, self.line_no, "expected a '>' or '@' header line"))
        }
    }
}

impl<R: BufRead> Iterator for SeqRecordReader<R> {
    type Item = Result<SeqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

/// Open a FASTA/FASTQ(.gz) file as a record iterator
pub fn open_records(path: &Path) -> Result<SeqRecordReader<Box<dyn BufRead + Send>>> {
    Ok(SeqRecordReader::new(open_text(path)?, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn parse(text: &str) -> Result<Vec<SeqRecord>> {
        SeqRecordReader::new(Cursor::new(text.to_string()), "mem").collect()
    }

    #[test]
    fn test_multiline_fasta() {
        let records = parse(">ctg1 len=8\nACGT\nACGT\n\n>ctg2\nGG\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "ctg1");
        assert_eq!(records[0].sequence, "ACGTACGT");
        assert_eq!(records[1].sequence, "GG");
    }

    #[test]
    fn test_fastq_records() {
        let records = parse("@read1 extra\nACGT\n+\nIIII\n@read2\nTT\n+read2\nII\n").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].name, "read2");
        assert_eq!(records[1].sequence, "TT");
    }

    #[test]
    fn test_malformed_header_is_error() {
        let err = parse("ACGT\n").unwrap_err();
        assert!(matches!(err, BridgeError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_gz_roundtrip_writer() {
        let file = tempfile::Builder::new().suffix(".fa.gz").tempfile().unwrap();
        let mut writer = FastaWriter::create(file.path()).unwrap();
        writer.write_record("ctg1_read2_ctg3", "ACGTTT").unwrap();
        writer.finish().unwrap();

        let mut text = String::new();
        open_text(file.path()).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, ">ctg1_read2_ctg3\nACGTTT\n");
    }
}
