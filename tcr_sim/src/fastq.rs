// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// Write four-line fastq records and read quality strings back out of
// existing fastq files for the corpus degradation mode.

use crate::errors::SimError;
use std::fs::File;
use std::io::{prelude::*, BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Quality character for perfect reads: Phred 41.
pub const PERFECT_QUALITY: char = 'J';

/// Output path for one fastq stream, e.g. base_R1.degraded.fastq.
pub fn fastq_path(dir: &Path, base: &str, mate: Option<u8>, degraded: bool) -> PathBuf {
    let tag = if degraded { ".degraded" } else { "" };
    let name = match mate {
        None => format!("{}{}.fastq", base, tag),
        Some(m) => format!("{}_R{}{}.fastq", base, m, tag),
    };
    dir.join(name)
}

pub struct FastqWriter {
    w: BufWriter<File>,
    path: PathBuf,
}

impl FastqWriter {
    pub fn create(path: &Path) -> Result<FastqWriter, SimError> {
        let f = File::create(path).map_err(|e| SimError::Io {
            path: path.to_owned(),
            source: e,
        })?;
        Ok(FastqWriter {
            w: BufWriter::new(f),
            path: path.to_owned(),
        })
    }

    pub fn write_record(
        &mut self,
        id: &str,
        comment: &str,
        seq: &str,
        qual: &str,
    ) -> Result<(), SimError> {
        self.write_lines(id, comment, seq, qual)
            .map_err(|e| SimError::Io {
                path: self.path.clone(),
                source: e,
            })
    }

    fn write_lines(
        &mut self,
        id: &str,
        comment: &str,
        seq: &str,
        qual: &str,
    ) -> std::io::Result<()> {
        if comment.is_empty() {
            writeln!(self.w, "@{}", id)?;
        } else {
            writeln!(self.w, "@{} {}", id, comment)?;
        }
        writeln!(self.w, "{}", seq)?;
        writeln!(self.w, "+")?;
        writeln!(self.w, "{}", qual)
    }

    pub fn finish(mut self) -> Result<(), SimError> {
        self.w.flush().map_err(|e| SimError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Pull the quality line of every record in a fastq file.
pub fn read_quality_strings(path: &Path) -> Result<Vec<String>, SimError> {
    let f = File::open(path).map_err(|e| SimError::Io {
        path: path.to_owned(),
        source: e,
    })?;
    let mut quals = Vec::<String>::new();
    for (i, line) in BufReader::new(f).lines().enumerate() {
        let s = line.map_err(|e| SimError::Io {
            path: path.to_owned(),
            source: e,
        })?;
        match i % 4 {
            0 => {
                if !s.starts_with('@') {
                    return Err(SimError::Data(format!(
                        "{} line {}: fastq record does not start with @",
                        path.display(),
                        i + 1
                    )));
                }
            }
            3 => quals.push(s),
            _ => {}
        }
    }
    if quals.is_empty() {
        return Err(SimError::Data(format!(
            "{} holds no fastq records",
            path.display()
        )));
    }
    Ok(quals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let d = Path::new("/tmp/x");
        assert_eq!(fastq_path(d, "run", None, false), d.join("run.fastq"));
        assert_eq!(fastq_path(d, "run", None, true), d.join("run.degraded.fastq"));
        assert_eq!(fastq_path(d, "run", Some(1), false), d.join("run_R1.fastq"));
        assert_eq!(
            fastq_path(d, "run", Some(2), true),
            d.join("run_R2.degraded.fastq")
        );
    }

    #[test]
    fn test_write_then_read_back_qualities() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.fastq");
        let mut w = FastqWriter::create(&path).unwrap();
        w.write_record("TCRSIM:0:1", "clonotype=0", "ACGT", "JJJJ").unwrap();
        w.write_record("TCRSIM:1:1", "", "GGCC", "!!JJ").unwrap();
        w.finish().unwrap();
        let quals = read_quality_strings(&path).unwrap();
        assert_eq!(quals, vec!["JJJJ".to_string(), "!!JJ".to_string()]);
    }

    #[test]
    fn test_malformed_fastq_is_a_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.fastq");
        std::fs::write(&path, "not a header\nACGT\n+\nJJJJ\n").unwrap();
        assert!(matches!(
            read_quality_strings(&path),
            Err(SimError::Data(_))
        ));
    }
}
