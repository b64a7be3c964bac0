// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// Shared fixtures for the engine tests: a miniature two-locus catalog and a
// fully deterministic model (no chewback, no addition) that tests override
// field by field.

use crate::model::{ProbArray, RecombinationModel};
use debruijn::dna_string::DnaString;
use tcr_catalog::{Segment, SegmentCatalog};
use tcr_types::{Locus, SegmentRole, Strand};

// V: leader exon [0,9), intron [9,21), body exon [21,60).  The spliced
// sequence carries its conserved cysteine codon at position 42.
pub const TRB_V: &str = "ATGCTGCTGGTAAGTAAGTAAGGATCCCAGTCAGTGGAGCAGAATTCTGGACACTGTGCC";
pub const TRB_D: &str = "GGGACAGGGGGC";
// J: F-G-X-G motif six bases in.
pub const TRB_J: &str = "AACACCTTTGGCCAGGGAACCAGACTCACA";
// C: exons [0,12) and [18,36).
pub const TRB_C: &str = "ATCCAGAACCCTGACCCTGCCGTGTACCAGCTGAGA";

pub fn seg(
    name: &str,
    locus: Locus,
    role: SegmentRole,
    chromosome: &str,
    start: usize,
    end: usize,
    exons: Vec<(usize, usize)>,
    seq: &str,
) -> Segment {
    Segment {
        name: name.to_string(),
        locus,
        role,
        chromosome: chromosome.to_string(),
        strand: Strand::Plus,
        start,
        end,
        exons,
        allele: 1,
        seq: DnaString::from_acgt_bytes(seq.as_bytes()),
    }
}

pub fn toy_catalog() -> SegmentCatalog {
    let segs = vec![
        seg("TRBV9-1", Locus::TRB, SegmentRole::V, "chr7", 0, 60, vec![(0, 9), (21, 60)], TRB_V),
        seg("TRBD9-1", Locus::TRB, SegmentRole::D, "chr7", 100, 112, vec![], TRB_D),
        seg("TRBJ9-1", Locus::TRB, SegmentRole::J, "chr7", 200, 230, vec![(0, 30)], TRB_J),
        seg("TRBC9", Locus::TRB, SegmentRole::C, "chr7", 300, 336, vec![(0, 12), (18, 36)], TRB_C),
        seg("TRAV9-1", Locus::TRA, SegmentRole::V, "chr14", 0, 60, vec![(0, 9), (21, 60)], TRB_V),
        seg("TRAJ9-1", Locus::TRA, SegmentRole::J, "chr14", 200, 230, vec![(0, 30)], TRB_J),
        seg("TRAC9", Locus::TRA, SegmentRole::C, "chr14", 300, 336, vec![(0, 12), (18, 36)], TRB_C),
    ];
    SegmentCatalog::from_segments(segs).unwrap()
}

pub fn toy_model() -> RecombinationModel {
    RecombinationModel {
        singles: vec![
            ("TRBV9-1".to_string(), 1.0),
            ("TRAV9-1".to_string(), 1.0),
        ],
        pairs: vec![],
        triples: vec![],
        v_chew: ProbArray::new("Vchewback", vec![1.0]).unwrap(),
        d5_chew: ProbArray::new("D5chewback", vec![1.0]).unwrap(),
        d3_chew: ProbArray::new("D3chewback", vec![1.0]).unwrap(),
        j_chew: ProbArray::new("Jchewback", vec![1.0]).unwrap(),
        vd_add: ProbArray::new("VDaddition", vec![1.0]).unwrap(),
        dj_add: ProbArray::new("DJaddition", vec![1.0]).unwrap(),
        vj_add: ProbArray::new("VJaddition", vec![1.0]).unwrap(),
    }
}
