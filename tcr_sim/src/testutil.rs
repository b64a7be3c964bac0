// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// Test fixtures: a synthetic repertoire with reproducible pseudo-random
// bodies, and baseline run parameters that individual tests tweak.

use crate::params::{
    LengthModel, PopulationSpec, ReadSpace, ReadType, SimParams,
};
use std::path::PathBuf;
use tcr_recomb::chain::{Chain, Junction};
use tcr_recomb::repertoire::{Clonotype, Repertoire, Uniqueness};
use tcr_types::{Locus, LocusPair};

// Fixed-sequence generator so tests get bodies whose k-mers are unique.
// Same multiplier/increment as the classic 64-bit LCG.

pub fn synthetic_body(n: usize) -> String {
    let mut x: i64 = 1;
    let mut s = String::with_capacity(n);
    for _ in 0..n {
        x = 6_364_136_223_846_793_005i64
            .wrapping_mul(x)
            .wrapping_add(1_442_695_040_888_963_407);
        s.push(match (x >> 33) & 3 {
            0 => 'A',
            1 => 'C',
            2 => 'G',
            _ => 'T',
        });
    }
    s
}

fn flat_chain(locus: Locus, body: &str) -> Chain {
    Chain {
        locus,
        v_name: format!("{}V1-1", locus),
        d_name: None,
        j_name: format!("{}J1-1", locus),
        c_name: format!("{}C1", locus),
        v_chew: 0,
        d5_chew: 0,
        d3_chew: 0,
        j_chew: 0,
        junction: Junction::VJ { n: String::new() },
        dna: body.to_string(),
        rna: body.to_string(),
        cdr3: Some(body[..12.min(body.len())].to_string()),
    }
}

/// One alpha-beta clonotype whose chains share a synthetic body of length n.
pub fn flat_repertoire(n: usize) -> Repertoire {
    let body = synthetic_body(n);
    Repertoire {
        clonotypes: vec![Clonotype {
            pair: LocusPair::AlphaBeta,
            chain1: flat_chain(Locus::TRA, &body),
            chain2: flat_chain(Locus::TRB, &body),
        }],
    }
}

pub fn read_params(read_type: ReadType) -> SimParams {
    SimParams {
        working_dir: PathBuf::from("."),
        output: "tcrsim".to_string(),
        load_population: None,
        repertoire_size: 1,
        alpha_beta_ratio: 1.0,
        uniqueness: Uniqueness::Off,
        population_size: 1,
        population: PopulationSpec::Stripe,
        sequence_count: 0,
        space: ReadSpace::Dna,
        read_type,
        read_len: LengthModel { mean: 48.0, sd: 0.0, cutoff: 4.0 },
        insert_len: LengthModel { mean: 150.0, sd: 0.0, cutoff: 4.0 },
        amplicon_probe: None,
        degrade: None,
        display_degradation: false,
        seed: Some(1),
    }
}
