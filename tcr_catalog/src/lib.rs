// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// This file contains code to load and index germline reference data for the
// TCR loci.  The segment table is a tab-separated file with one row per
// germline segment, and the chromosome sequences are plain nucleotide text
// (optionally gzipped, optionally with fasta headers).  Once built, the
// catalog is immutable, and segments are addressed either by index or by
// their stable name.

use debruijn::dna_string::DnaString;
use flate2::read::MultiGzDecoder;
use log::info;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{
    fs::File,
    io::{prelude::*, BufReader},
};
use tcr_types::{Locus, SegmentRole, Strand};
use thiserror::Error;

pub const SEGMENT_TABLE: &str = "tcell_receptor.tsv";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{file} line {line}: {msg}")]
    Parse {
        file: String,
        line: usize,
        msg: String,
    },
    #[error("duplicate segment name {0}")]
    DuplicateSegment(String),
    #[error("no reference sequence for chromosome {chromosome} (needed by {segment})")]
    MissingChromosome { chromosome: String, segment: String },
    #[error("segment {segment}: {msg}")]
    BadSegment { segment: String, msg: String },
}

// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓
// BASE-LEVEL UTILITIES
// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓

/// Watson-Crick complement of an ASCII base.  Unknown characters map to N.
pub fn complement_base(c: u8) -> u8 {
    match c {
        b'A' | b'a' => b'T',
        b'C' | b'c' => b'G',
        b'G' | b'g' => b'C',
        b'T' | b't' => b'A',
        _ => b'N',
    }
}

/// Reverse complement of an ASCII nucleotide sequence.
pub fn reverse_complement(b: &[u8]) -> Vec<u8> {
    b.iter().rev().map(|&c| complement_base(c)).collect()
}

// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓
// READ A REFERENCE CHROMOSOME
// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓

// Read one chromosome worth of nucleotide text.  Fasta header lines are
// ignored, so both headerless text and single-record fasta work.  A file
// ending in .gz is transparently decompressed.

pub fn read_reference(path: &Path) -> Result<DnaString, CatalogError> {
    let f = File::open(path).map_err(|e| CatalogError::Io {
        path: path.to_owned(),
        source: e,
    })?;
    let reader: Box<dyn Read> = if path.extension().map_or(false, |x| x == "gz") {
        Box::new(MultiGzDecoder::new(f))
    } else {
        Box::new(f)
    };
    let mut bases = Vec::<u8>::new();
    for line in BufReader::new(reader).lines() {
        let s = line.map_err(|e| CatalogError::Io {
            path: path.to_owned(),
            source: e,
        })?;
        if s.starts_with('>') {
            continue;
        }
        bases.extend(s.trim().as_bytes().iter().map(|c| c.to_ascii_uppercase()));
    }
    Ok(DnaString::from_acgt_bytes(&bases))
}

// Locate <chromosome>.fa, <chromosome>.fa.gz, <chromosome>.fasta or
// <chromosome>.fasta.gz under the working directory.

fn reference_path(dir: &Path, chromosome: &str) -> Option<PathBuf> {
    for name in [
        format!("{}.fa", chromosome),
        format!("{}.fa.gz", chromosome),
        format!("{}.fasta", chromosome),
        format!("{}.fasta.gz", chromosome),
    ]
    .iter()
    {
        let p = dir.join(name);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓
// SEGMENT
// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓

/// One germline gene segment.
///
/// Genomic coordinates are zero-based half-open on the forward strand of the
/// chromosome.  The stored sequence is in coding orientation: for a minus
/// strand segment it is the reverse complement of the genomic slice.  Exons
/// are kept in coding-local coordinates (relative to the start of `seq`,
/// sorted in transcription order), which makes splicing a straight
/// concatenation of slices.
#[derive(Debug, Clone)]
pub struct Segment {
    pub name: String,
    pub locus: Locus,
    pub role: SegmentRole,
    pub chromosome: String,
    pub strand: Strand,
    pub start: usize,
    pub end: usize,
    pub exons: Vec<(usize, usize)>,
    pub allele: u32,
    pub seq: DnaString,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Coding sequence as ASCII bases.
    pub fn bases(&self) -> Vec<u8> {
        self.seq.to_ascii_vec()
    }

    /// Exon-spliced coding sequence, clipped to the coding interval
    /// [lo, hi).  Used when a junction has chewed into a terminal exon.
    /// A segment with no listed exons (typically D) is wholly exonic.
    pub fn spliced(&self, lo: usize, hi: usize) -> Vec<u8> {
        let bases = self.bases();
        if self.exons.is_empty() {
            let (lo, hi) = (lo.min(bases.len()), hi.min(bases.len()));
            return if lo < hi { bases[lo..hi].to_vec() } else { Vec::new() };
        }
        let mut out = Vec::<u8>::new();
        for &(a, b) in &self.exons {
            let (a, b) = (a.max(lo), b.min(hi));
            if a < b {
                out.extend_from_slice(&bases[a..b]);
            }
        }
        out
    }

    /// True if other starts strictly after this segment ends, walking in
    /// transcription direction on the shared strand.  Segments on different
    /// chromosomes or strands are never ordered.
    pub fn is_upstream_of(&self, other: &Segment) -> bool {
        if self.chromosome != other.chromosome || self.strand != other.strand {
            return false;
        }
        match self.strand {
            Strand::Plus => other.start >= self.end,
            Strand::Minus => other.end <= self.start,
        }
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.start >= self.end {
            return Err(CatalogError::BadSegment {
                segment: self.name.clone(),
                msg: format!("empty genomic interval {}..{}", self.start, self.end),
            });
        }
        if self.seq.len() != self.len() {
            return Err(CatalogError::BadSegment {
                segment: self.name.clone(),
                msg: format!(
                    "sequence length {} does not match interval {}..{}",
                    self.seq.len(),
                    self.start,
                    self.end
                ),
            });
        }
        let n = self.len();
        let mut last = 0;
        for &(a, b) in &self.exons {
            if a >= b || b > n {
                return Err(CatalogError::BadSegment {
                    segment: self.name.clone(),
                    msg: format!("exon {}..{} outside segment of length {}", a, b, n),
                });
            }
            if a < last {
                return Err(CatalogError::BadSegment {
                    segment: self.name.clone(),
                    msg: "exons overlap or are out of order".to_string(),
                });
            }
            last = b;
        }
        Ok(())
    }
}

// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓
// SEGMENT CATALOG
// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓

/// Immutable index over all germline segments, addressable by name.
#[derive(Debug, Clone)]
pub struct SegmentCatalog {
    pub segs: Vec<Segment>,
    name_to_index: Vec<(String, usize)>,
}

impl SegmentCatalog {
    /// Build a catalog from already-materialized segments, checking name
    /// uniqueness and exon layout.
    pub fn from_segments(segs: Vec<Segment>) -> Result<SegmentCatalog, CatalogError> {
        let mut name_to_index = Vec::<(String, usize)>::with_capacity(segs.len());
        for (i, seg) in segs.iter().enumerate() {
            seg.validate()?;
            name_to_index.push((seg.name.clone(), i));
        }
        name_to_index.sort();
        for w in name_to_index.windows(2) {
            if w[0].0 == w[1].0 {
                return Err(CatalogError::DuplicateSegment(w[0].0.clone()));
            }
        }
        Ok(SegmentCatalog { segs, name_to_index })
    }

    /// Load the segment table and the reference chromosomes it mentions from
    /// one directory.
    pub fn load(dir: &Path) -> Result<SegmentCatalog, CatalogError> {
        let table = dir.join(SEGMENT_TABLE);
        let rows = parse_segment_table(&table)?;

        // Pull in each referenced chromosome exactly once.

        let mut refs = HashMap::<String, DnaString>::new();
        for row in &rows {
            if refs.contains_key(&row.chromosome) {
                continue;
            }
            let path = reference_path(dir, &row.chromosome).ok_or_else(|| {
                CatalogError::MissingChromosome {
                    chromosome: row.chromosome.clone(),
                    segment: row.name.clone(),
                }
            })?;
            info!("reading reference chromosome {}", row.chromosome);
            refs.insert(row.chromosome.clone(), read_reference(&path)?);
        }
        Self::from_rows(rows, &refs)
    }

    /// Resolve row coordinates against chromosome sequences, flipping minus
    /// strand segments into coding orientation.
    pub fn from_rows(
        rows: Vec<SegmentRow>,
        refs: &HashMap<String, DnaString>,
    ) -> Result<SegmentCatalog, CatalogError> {
        let mut segs = Vec::<Segment>::with_capacity(rows.len());
        for row in rows {
            let chrom = refs
                .get(&row.chromosome)
                .ok_or_else(|| CatalogError::MissingChromosome {
                    chromosome: row.chromosome.clone(),
                    segment: row.name.clone(),
                })?;
            if row.end > chrom.len() || row.start >= row.end {
                return Err(CatalogError::BadSegment {
                    segment: row.name,
                    msg: format!(
                        "interval {}..{} exceeds chromosome {} of length {}",
                        row.start,
                        row.end,
                        row.chromosome,
                        chrom.len()
                    ),
                });
            }
            let mut bases = chrom.slice(row.start, row.end).to_owned().to_ascii_vec();
            if row.strand == Strand::Minus {
                bases = reverse_complement(&bases);
            }
            let n = row.end - row.start;
            let mut exons = Vec::<(usize, usize)>::with_capacity(row.exons.len());
            for &(a, b) in &row.exons {
                if a < row.start || b > row.end || a >= b {
                    return Err(CatalogError::BadSegment {
                        segment: row.name,
                        msg: format!("exon {}..{} outside segment", a, b),
                    });
                }
                // Map to coding-local coordinates.
                match row.strand {
                    Strand::Plus => exons.push((a - row.start, b - row.start)),
                    Strand::Minus => exons.push((n - (b - row.start), n - (a - row.start))),
                }
            }
            exons.sort();
            segs.push(Segment {
                name: row.name,
                locus: row.locus,
                role: row.role,
                chromosome: row.chromosome,
                strand: row.strand,
                start: row.start,
                end: row.end,
                exons,
                allele: row.allele,
                seq: DnaString::from_acgt_bytes(&bases),
            });
        }
        Self::from_segments(segs)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index
            .binary_search_by(|probe| probe.0.as_str().cmp(name))
            .ok()
            .map(|i| self.name_to_index[i].1)
    }

    pub fn get(&self, name: &str) -> Option<&Segment> {
        self.index_of(name).map(|i| &self.segs[i])
    }

    /// Indices of all segments of the given locus and role, in table order.
    pub fn of_kind(&self, locus: Locus, role: SegmentRole) -> Vec<usize> {
        (0..self.segs.len())
            .filter(|&i| self.segs[i].locus == locus && self.segs[i].role == role)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.segs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segs.is_empty()
    }
}

// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓
// PARSE THE SEGMENT TABLE
// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓

/// One parsed row of the segment table, coordinates still genomic.
#[derive(Debug, Clone)]
pub struct SegmentRow {
    pub name: String,
    pub locus: Locus,
    pub role: SegmentRole,
    pub chromosome: String,
    pub strand: Strand,
    pub start: usize,
    pub end: usize,
    pub exons: Vec<(usize, usize)>,
    pub allele: u32,
}

// Expected columns:
// name locus role chromosome strand start end exons allele
// where exons is semicolon-separated start-end pairs, possibly empty.

pub fn parse_segment_table(path: &Path) -> Result<Vec<SegmentRow>, CatalogError> {
    let file = path.display().to_string();
    let f = File::open(path).map_err(|e| CatalogError::Io {
        path: path.to_owned(),
        source: e,
    })?;
    let mut rows = Vec::<SegmentRow>::new();
    for (k, line) in BufReader::new(f).lines().enumerate() {
        let s = line.map_err(|e| CatalogError::Io {
            path: path.to_owned(),
            source: e,
        })?;
        if k == 0 && s.starts_with("name") {
            continue;
        }
        if s.trim().is_empty() || s.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = s.split('\t').collect();
        if fields.len() != 9 {
            return Err(CatalogError::Parse {
                file: file.clone(),
                line: k + 1,
                msg: format!("expected 9 tab-separated fields, found {}", fields.len()),
            });
        }
        let parse = |msg: String| CatalogError::Parse {
            file: file.clone(),
            line: k + 1,
            msg,
        };
        let locus = Locus::from_str(fields[1])
            .map_err(|_| parse(format!("unknown locus \"{}\"", fields[1])))?;
        let role = SegmentRole::from_str(fields[2])
            .map_err(|_| parse(format!("unknown role \"{}\"", fields[2])))?;
        let strand = Strand::from_str(fields[4])
            .map_err(|_| parse(format!("unknown strand \"{}\"", fields[4])))?;
        let start = fields[5]
            .parse::<usize>()
            .map_err(|_| parse(format!("bad start \"{}\"", fields[5])))?;
        let end = fields[6]
            .parse::<usize>()
            .map_err(|_| parse(format!("bad end \"{}\"", fields[6])))?;
        let mut exons = Vec::<(usize, usize)>::new();
        if !fields[7].is_empty() {
            for piece in fields[7].split(';') {
                let mut it = piece.splitn(2, '-');
                let a = it.next().unwrap_or("");
                let b = it.next().unwrap_or("");
                let a = a
                    .parse::<usize>()
                    .map_err(|_| parse(format!("bad exon interval \"{}\"", piece)))?;
                let b = b
                    .parse::<usize>()
                    .map_err(|_| parse(format!("bad exon interval \"{}\"", piece)))?;
                exons.push((a, b));
            }
        }
        let allele = fields[8]
            .parse::<u32>()
            .map_err(|_| parse(format!("bad allele \"{}\"", fields[8])))?;
        rows.push(SegmentRow {
            name: fields[0].to_string(),
            locus,
            role,
            chromosome: fields[3].to_string(),
            strand,
            start,
            end,
            exons,
            allele,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn chrom(s: &str) -> HashMap<String, DnaString> {
        let mut m = HashMap::new();
        m.insert("chrT".to_string(), DnaString::from_acgt_bytes(s.as_bytes()));
        m
    }

    fn row(
        name: &str,
        role: SegmentRole,
        strand: Strand,
        start: usize,
        end: usize,
        exons: Vec<(usize, usize)>,
    ) -> SegmentRow {
        SegmentRow {
            name: name.to_string(),
            locus: Locus::TRB,
            role,
            chromosome: "chrT".to_string(),
            strand,
            start,
            end,
            exons,
            allele: 1,
        }
    }

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"ACGT"), b"ACGT".to_vec());
        assert_eq!(reverse_complement(b"AACCG"), b"CGGTT".to_vec());
        assert_eq!(reverse_complement(b""), Vec::<u8>::new());
    }

    #[test]
    fn test_plus_strand_extraction() {
        let refs = chrom("TTTTACGTACGTTTTT");
        let rows = vec![row("TRBV90-1", SegmentRole::V, Strand::Plus, 4, 12, vec![(4, 8)])];
        let cat = SegmentCatalog::from_rows(rows, &refs).unwrap();
        let seg = cat.get("TRBV90-1").unwrap();
        assert_eq!(seg.bases(), b"ACGTACGT".to_vec());
        assert_eq!(seg.exons, vec![(0, 4)]);
        assert_eq!(seg.spliced(0, 8), b"ACGT".to_vec());
    }

    #[test]
    fn test_minus_strand_extraction() {
        // Genomic ACGTACGT on 4..12; minus strand coding sequence is its
        // reverse complement, and the genomic exon 8..12 becomes local 0..4.
        let refs = chrom("TTTTACGTACGTTTTT");
        let rows = vec![row("TRBV90-2", SegmentRole::V, Strand::Minus, 4, 12, vec![(8, 12)])];
        let cat = SegmentCatalog::from_rows(rows, &refs).unwrap();
        let seg = cat.get("TRBV90-2").unwrap();
        assert_eq!(seg.bases(), reverse_complement(b"ACGTACGT"));
        assert_eq!(seg.exons, vec![(0, 4)]);
    }

    #[test]
    fn test_upstream_ordering() {
        let refs = chrom("TTTTACGTACGTTTTT");
        let rows = vec![
            row("V", SegmentRole::V, Strand::Plus, 0, 4, vec![]),
            row("J", SegmentRole::J, Strand::Plus, 6, 10, vec![]),
            row("Jm", SegmentRole::J, Strand::Minus, 6, 10, vec![]),
        ];
        let cat = SegmentCatalog::from_rows(rows, &refs).unwrap();
        let (v, j, jm) = (&cat.segs[0], &cat.segs[1], &cat.segs[2]);
        assert!(v.is_upstream_of(j));
        assert!(!j.is_upstream_of(v));
        // Opposite strands never order.
        assert!(!v.is_upstream_of(jm));
        // On the minus strand, upstream means larger genomic coordinate.
        let rows = vec![
            row("Vm", SegmentRole::V, Strand::Minus, 6, 10, vec![]),
            row("Jm", SegmentRole::J, Strand::Minus, 0, 4, vec![]),
        ];
        let cat = SegmentCatalog::from_rows(rows, &refs).unwrap();
        assert!(cat.segs[0].is_upstream_of(&cat.segs[1]));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let refs = chrom("TTTTACGTACGTTTTT");
        let rows = vec![
            row("X", SegmentRole::V, Strand::Plus, 0, 4, vec![]),
            row("X", SegmentRole::V, Strand::Plus, 4, 8, vec![]),
        ];
        match SegmentCatalog::from_rows(rows, &refs) {
            Err(CatalogError::DuplicateSegment(name)) => assert_eq!(name, "X"),
            other => panic!("expected duplicate error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_table_and_reference_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = File::create(dir.path().join(SEGMENT_TABLE)).unwrap();
        writeln!(t, "name\tlocus\trole\tchromosome\tstrand\tstart\tend\texons\tallele").unwrap();
        writeln!(t, "TRBV90-1\tTRB\tV\tchrT\t+\t0\t8\t0-4;6-8\t1").unwrap();
        writeln!(t, "TRBJ90-1\tTRB\tJ\tchrT\t+\t10\t14\t10-14\t1").unwrap();
        let mut r = File::create(dir.path().join("chrT.fa")).unwrap();
        writeln!(r, ">chrT test").unwrap();
        writeln!(r, "ACGTACGTAACCGGTT").unwrap();
        let cat = SegmentCatalog::load(dir.path()).unwrap();
        assert_eq!(cat.len(), 2);
        let v = cat.get("TRBV90-1").unwrap();
        assert_eq!(v.bases(), b"ACGTACGT".to_vec());
        assert_eq!(v.spliced(0, 8), b"ACGTGT".to_vec());
        assert_eq!(cat.of_kind(Locus::TRB, SegmentRole::J), vec![1]);
        assert_eq!(cat.of_kind(Locus::TRA, SegmentRole::V), Vec::<usize>::new());
    }
}
