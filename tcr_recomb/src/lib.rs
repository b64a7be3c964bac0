// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// The recombination engine.  Everything stochastic in here draws from one
// ChaCha stream in a fixed order, so a run is reproducible from its seed and
// the stream state can be frozen into a snapshot.

pub mod chain;
pub mod cdr3;
pub mod model;
pub mod repertoire;
pub mod sampler;
#[cfg(test)]
pub mod testutil;

use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tcr_types::{Locus, SegmentRole};
use thiserror::Error;

/// The single logical PRNG of the engine.  ChaCha because its state is
/// serializable, which the population snapshot needs.
pub type SimRng = rand_chacha::ChaCha8Rng;

/// Build the run RNG, drawing a seed from the system generator when the
/// caller did not supply one.  Returns the seed actually used so it can be
/// logged for replay.
pub fn seeded_rng(seed: Option<u64>) -> (SimRng, u64) {
    let seed = seed.unwrap_or_else(|| rand::thread_rng().gen());
    (SimRng::seed_from_u64(seed), seed)
}

#[derive(Debug, Error)]
pub enum RecombError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{file}: {msg}")]
    ModelFormat { file: String, msg: String },
    #[error("recombination table references unknown segment {0}")]
    UnknownSegment(String),
    #[error("recombination table: {msg}")]
    BadTuple { msg: String },
    #[error("negative probability {p} for {what}")]
    NegativeProbability { what: String, p: f64 },
    #[error("locus {locus} has no {role} segments")]
    EmptyLocus { locus: Locus, role: SegmentRole },
    #[error("no {role} segment downstream of {upstream} on locus {locus}")]
    NoDownstreamSegment {
        locus: Locus,
        role: SegmentRole,
        upstream: String,
    },
    #[error("failed to build a productive {locus} chain in {attempts} attempts")]
    UnproductiveLocus { locus: Locus, attempts: usize },
    #[error(
        "cannot satisfy {constraint} uniqueness for repertoire of size {size} \
         ({attempts} rejections at clonotype {slot})"
    )]
    Capacity {
        constraint: &'static str,
        size: usize,
        slot: usize,
        attempts: usize,
    },
}
