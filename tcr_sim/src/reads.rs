// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// Slice sequencing reads out of population members.  A cell is drawn
// uniformly (clonotype weighting is implicit in the population), one of its
// two chains is picked at even odds, and the read geometry decides how the
// chain body is cut up.  Draw order is fixed: cell, chain, then lengths and
// positions, so a seeded run is reproducible.

use crate::errors::SimError;
use crate::params::{LengthModel, ReadSpace, ReadType, SimParams};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::fmt::Write as _;
use tcr_catalog::reverse_complement;
use tcr_recomb::repertoire::{Population, Repertoire};
use tcr_recomb::SimRng;
use tcr_types::Strand;

/// Bound on redraws while hunting for a cell the amplicon probe matches.
pub const AMPLICON_ATTEMPTS: usize = 1000;

/// One emitted read.  Coordinates are on the sense orientation of the
/// source body; strand records which way the read runs.
#[derive(Debug, Clone)]
pub struct ReadRecord {
    pub index: usize,
    pub mate: u8,
    pub clonotype: usize,
    pub cell: u64,
    pub chain: u8,
    pub space: ReadSpace,
    pub start: usize,
    pub end: usize,
    pub strand: Strand,
    pub insert: Option<i64>,
    pub seq: String,
}

impl ReadRecord {
    pub fn id(&self) -> String {
        format!("TCRSIM:{}:{}", self.index, self.mate)
    }

    pub fn comment(&self) -> String {
        let mut s = format!(
            "clonotype={} cell={} chain={} space={} pos={}:{} strand={} mate={}",
            self.clonotype,
            self.cell,
            self.chain,
            self.space,
            self.start,
            self.end,
            self.strand,
            self.mate
        );
        if let Some(ins) = self.insert {
            write!(s, " insert={}", ins).unwrap();
        }
        s
    }
}

#[derive(Debug, Clone)]
pub struct ReadPair {
    pub r1: ReadRecord,
    pub r2: Option<ReadRecord>,
}

/// Truncated-Gaussian length draw, rounded, at least one.  sd = 0 or
/// cutoff = 0 pins the draw to the mean.
pub fn bounded_gaussian(rng: &mut SimRng, lm: &LengthModel) -> usize {
    if lm.sd == 0.0 || lm.cutoff == 0.0 {
        return lm.mean.round().max(1.0) as usize;
    }
    let normal = Normal::new(lm.mean, lm.sd).unwrap();
    loop {
        let x = normal.sample(rng);
        if (x - lm.mean).abs() <= lm.cutoff * lm.sd {
            let r = x.round();
            if r >= 1.0 {
                return r as usize;
            }
        }
    }
}

fn revcomp_str(s: &[u8]) -> String {
    String::from_utf8(reverse_complement(s)).unwrap()
}

fn find_sub(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub fn simulate_reads(
    rng: &mut SimRng,
    repertoire: &Repertoire,
    population: &Population,
    params: &SimParams,
) -> Result<Vec<ReadPair>, SimError> {
    if params.sequence_count == 0 {
        return Ok(Vec::new());
    }
    let total = population.total();
    if total == 0 {
        return Err(SimError::Data(
            "cannot draw reads from a population of zero cells".to_string(),
        ));
    }
    let mut prefix = Vec::<u64>::with_capacity(population.len());
    let mut acc = 0u64;
    for &c in &population.cells {
        acc += u64::from(c);
        prefix.push(acc);
    }

    let mut out = Vec::<ReadPair>::with_capacity(params.sequence_count);
    for index in 0..params.sequence_count {
        let pair = match params.read_type {
            ReadType::Single => single_read(rng, repertoire, &prefix, total, params, index),
            ReadType::Paired => paired_read(rng, repertoire, &prefix, total, params, index),
            ReadType::Amplicon => amplicon_read(rng, repertoire, &prefix, total, params, index)?,
        };
        out.push(pair);
    }
    Ok(out)
}

// Uniform cell draw, then a fair coin for the chain.  Returns the
// clonotype index, the global cell ordinal, the chain number and its body
// in the requested space.

fn draw_cell<'a>(
    rng: &mut SimRng,
    repertoire: &'a Repertoire,
    prefix: &[u64],
    total: u64,
    space: ReadSpace,
) -> (usize, u64, u8, &'a [u8]) {
    let cell = rng.gen_range(0..total);
    let mut clonotype = 0;
    while prefix[clonotype] <= cell {
        clonotype += 1;
    }
    let chain_no: u8 = if rng.gen_bool(0.5) { 1 } else { 2 };
    let ct = &repertoire.clonotypes[clonotype];
    let chain = if chain_no == 1 { &ct.chain1 } else { &ct.chain2 };
    let body = match space {
        ReadSpace::Dna => chain.dna.as_bytes(),
        ReadSpace::Rna => chain.rna.as_bytes(),
    };
    (clonotype, cell, chain_no, body)
}

fn single_read(
    rng: &mut SimRng,
    repertoire: &Repertoire,
    prefix: &[u64],
    total: u64,
    params: &SimParams,
    index: usize,
) -> ReadPair {
    let (clonotype, cell, chain, body) = draw_cell(rng, repertoire, prefix, total, params.space);
    let len = bounded_gaussian(rng, &params.read_len).min(body.len());
    let start = rng.gen_range(0..=body.len() - len);
    let strand = if rng.gen_bool(0.5) { Strand::Plus } else { Strand::Minus };
    let slice = &body[start..start + len];
    let seq = match strand {
        Strand::Plus => String::from_utf8(slice.to_vec()).unwrap(),
        Strand::Minus => revcomp_str(slice),
    };
    ReadPair {
        r1: ReadRecord {
            index,
            mate: 1,
            clonotype,
            cell,
            chain,
            space: params.space,
            start,
            end: start + len,
            strand,
            insert: None,
            seq,
        },
        r2: None,
    }
}

fn paired_read(
    rng: &mut SimRng,
    repertoire: &Repertoire,
    prefix: &[u64],
    total: u64,
    params: &SimParams,
    index: usize,
) -> ReadPair {
    let (clonotype, cell, chain, body) = draw_cell(rng, repertoire, prefix, total, params.space);
    let insert = bounded_gaussian(rng, &params.insert_len).min(body.len());
    let start = rng.gen_range(0..=body.len() - insert);
    let len1 = bounded_gaussian(rng, &params.read_len).min(insert);
    let len2 = bounded_gaussian(rng, &params.read_len).min(insert);
    let r1_slice = &body[start..start + len1];
    let r2_slice = &body[start + insert - len2..start + insert];
    let r1 = ReadRecord {
        index,
        mate: 1,
        clonotype,
        cell,
        chain,
        space: params.space,
        start,
        end: start + len1,
        strand: Strand::Plus,
        insert: Some(insert as i64),
        seq: String::from_utf8(r1_slice.to_vec()).unwrap(),
    };
    let r2 = ReadRecord {
        index,
        mate: 2,
        clonotype,
        cell,
        chain,
        space: params.space,
        start: start + insert - len2,
        end: start + insert,
        strand: Strand::Minus,
        insert: Some(-(insert as i64)),
        seq: revcomp_str(r2_slice),
    };
    ReadPair { r1, r2: Some(r2) }
}

// R1 is anchored at the 3' end of the probe alignment; R2 is the exact
// reverse complement of R1, which is what the amplicon contract asks for
// even though real amplicon mates only overlap.

fn amplicon_read(
    rng: &mut SimRng,
    repertoire: &Repertoire,
    prefix: &[u64],
    total: u64,
    params: &SimParams,
    index: usize,
) -> Result<ReadPair, SimError> {
    let probe = match &params.amplicon_probe {
        Some(p) => p.as_bytes(),
        None => return Err(SimError::Config("amplicon probe missing".to_string())),
    };
    for _ in 0..AMPLICON_ATTEMPTS {
        let (clonotype, cell, chain, body) =
            draw_cell(rng, repertoire, prefix, total, params.space);

        // Align the probe on the sense strand first, then the antisense.

        let (anchored, fw, pos) = match find_sub(body, probe) {
            Some(pos) => (body.to_vec(), true, pos),
            None => {
                let rc = reverse_complement(body);
                match find_sub(&rc, probe) {
                    Some(pos) => (rc, false, pos),
                    None => continue,
                }
            }
        };
        let start = pos + probe.len();
        if start >= anchored.len() {
            // Probe flush against the end; nothing to read into.
            continue;
        }
        let len = bounded_gaussian(rng, &params.read_len).min(anchored.len() - start);
        let slice = &anchored[start..start + len];
        let n = anchored.len();
        let (s_start, s_end, strand) = if fw {
            (start, start + len, Strand::Plus)
        } else {
            (n - (start + len), n - start, Strand::Minus)
        };
        let r1 = ReadRecord {
            index,
            mate: 1,
            clonotype,
            cell,
            chain,
            space: params.space,
            start: s_start,
            end: s_end,
            strand,
            insert: None,
            seq: String::from_utf8(slice.to_vec()).unwrap(),
        };
        let r2 = ReadRecord {
            index,
            mate: 2,
            clonotype,
            cell,
            chain,
            space: params.space,
            start: s_start,
            end: s_end,
            strand: match strand {
                Strand::Plus => Strand::Minus,
                Strand::Minus => Strand::Plus,
            },
            insert: None,
            seq: revcomp_str(slice),
        };
        return Ok(ReadPair { r1, r2: Some(r2) });
    }
    Err(SimError::Data(format!(
        "amplicon probe matched no cell in {} attempts",
        AMPLICON_ATTEMPTS
    )))
}
