// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// Pair chains into clonotypes and enforce the repertoire uniqueness
// policy.  Unproductive chains are resampled silently (they do not count
// against the uniqueness retry budget); uniqueness rejections are bounded
// per slot and exhaust into a capacity error.

use crate::chain::{Chain, ChainBuilder};
use crate::{RecombError, SimRng};
use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tcr_types::{Locus, LocusPair};

/// Bound on rejections, applied separately to unproductive-chain resampling
/// and to uniqueness retries.
pub const RETRY_LIMIT: usize = 1000;

/// Uniqueness policy, strictest wins: CDR3-unique implies chain-unique
/// implies TCR-unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Uniqueness {
    Off,
    Tcr,
    Chain,
    Cdr3,
}

impl Uniqueness {
    pub fn from_flags(tcr: bool, chain: bool, cdr3: bool) -> Uniqueness {
        if cdr3 {
            Uniqueness::Cdr3
        } else if chain {
            Uniqueness::Chain
        } else if tcr {
            Uniqueness::Tcr
        } else {
            Uniqueness::Off
        }
    }

    fn constraint(self) -> &'static str {
        match self {
            Uniqueness::Off => "none",
            Uniqueness::Tcr => "TCR",
            Uniqueness::Chain => "chain",
            Uniqueness::Cdr3 => "CDR3",
        }
    }
}

/// An alpha-beta or gamma-delta chain pairing.  chain1 is the alpha or
/// gamma chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clonotype {
    pub pair: LocusPair,
    pub chain1: Chain,
    pub chain2: Chain,
}

impl Clonotype {
    pub fn chains(&self) -> [&Chain; 2] {
        [&self.chain1, &self.chain2]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repertoire {
    pub clonotypes: Vec<Clonotype>,
}

impl Repertoire {
    pub fn len(&self) -> usize {
        self.clonotypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clonotypes.is_empty()
    }
}

/// Cell counts per clonotype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Population {
    pub cells: Vec<u32>,
}

impl Population {
    pub fn total(&self) -> u64 {
        self.cells.iter().map(|&c| u64::from(c)).sum()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

// Resample until a chain carries a CDR3.

fn build_productive(
    rng: &mut SimRng,
    builder: &ChainBuilder<'_>,
    locus: Locus,
) -> Result<Chain, RecombError> {
    for _ in 0..RETRY_LIMIT {
        let chain = builder.build(rng, locus)?;
        if chain.is_productive() {
            return Ok(chain);
        }
        debug!("unproductive {} chain resampled", locus);
    }
    Err(RecombError::UnproductiveLocus {
        locus,
        attempts: RETRY_LIMIT,
    })
}

/// Build `size` clonotypes.  `alpha_beta_ratio` is the probability that a
/// slot is an alpha-beta receptor rather than gamma-delta; it must lie in
/// [0, 1].
pub fn build_repertoire(
    rng: &mut SimRng,
    builder: &ChainBuilder<'_>,
    size: usize,
    alpha_beta_ratio: f64,
    uniqueness: Uniqueness,
) -> Result<Repertoire, RecombError> {
    let mut clonotypes = Vec::<Clonotype>::with_capacity(size);
    let mut seen_tcr = HashSet::<(String, String)>::new();
    let mut seen_chain = HashSet::<(Locus, String)>::new();
    let mut seen_cdr3 = HashSet::<(Locus, String)>::new();

    for slot in 0..size {
        let mut accepted = false;
        for _attempt in 0..RETRY_LIMIT {
            let pair = if rng.gen_bool(alpha_beta_ratio) {
                LocusPair::AlphaBeta
            } else {
                LocusPair::GammaDelta
            };
            let (l1, l2) = pair.loci();
            let chain1 = build_productive(rng, builder, l1)?;
            let chain2 = build_productive(rng, builder, l2)?;

            let duplicate = match uniqueness {
                Uniqueness::Off => false,
                Uniqueness::Tcr => {
                    seen_tcr.contains(&(chain1.rna.clone(), chain2.rna.clone()))
                }
                Uniqueness::Chain => {
                    seen_chain.contains(&(l1, chain1.rna.clone()))
                        || seen_chain.contains(&(l2, chain2.rna.clone()))
                }
                Uniqueness::Cdr3 => {
                    seen_cdr3.contains(&(l1, chain1.cdr3_str().to_string()))
                        || seen_cdr3.contains(&(l2, chain2.cdr3_str().to_string()))
                }
            };
            if duplicate {
                debug!("clonotype {} rejected as duplicate, resampling", slot);
                continue;
            }
            match uniqueness {
                Uniqueness::Off => {}
                Uniqueness::Tcr => {
                    seen_tcr.insert((chain1.rna.clone(), chain2.rna.clone()));
                }
                Uniqueness::Chain => {
                    seen_chain.insert((l1, chain1.rna.clone()));
                    seen_chain.insert((l2, chain2.rna.clone()));
                }
                Uniqueness::Cdr3 => {
                    seen_cdr3.insert((l1, chain1.cdr3_str().to_string()));
                    seen_cdr3.insert((l2, chain2.cdr3_str().to_string()));
                }
            }
            clonotypes.push(Clonotype { pair, chain1, chain2 });
            accepted = true;
            break;
        }
        if !accepted {
            return Err(RecombError::Capacity {
                constraint: uniqueness.constraint(),
                size,
                slot,
                attempts: RETRY_LIMIT,
            });
        }
    }
    info!("built repertoire of {} clonotypes", clonotypes.len());
    Ok(Repertoire { clonotypes })
}
