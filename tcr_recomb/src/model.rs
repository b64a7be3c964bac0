// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// The recombination probability model: absolute probabilities for segment
// tuples of length one to three, plus seven length-indexed distributions for
// exonuclease chewback and junctional N-addition.  Loaded from yaml and
// validated against the segment catalog before any sampling happens.

use crate::{RecombError, SimRng};
use log::warn;
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tcr_catalog::SegmentCatalog;
use tcr_types::SegmentRole;

pub const RECOMBINATION_TABLE: &str = "tcell_recombination.yaml";

// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓
// LENGTH-INDEXED PROBABILITY ARRAYS
// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓

/// A distribution over nonnegative counts, index 0 meaning "zero bases".
/// The array should sum to one; any deficit is implicitly assigned to the
/// last index, and the first draw that lands in that region is reported.
#[derive(Debug)]
pub struct ProbArray {
    pub name: String,
    pub probs: Vec<f64>,
    residual_drawn: AtomicBool,
}

impl ProbArray {
    pub fn new(name: &str, probs: Vec<f64>) -> Result<ProbArray, RecombError> {
        if probs.is_empty() {
            return Err(RecombError::BadTuple {
                msg: format!("array {} is empty", name),
            });
        }
        for &p in &probs {
            if p < 0.0 || !p.is_finite() {
                return Err(RecombError::NegativeProbability {
                    what: format!("array {}", name),
                    p,
                });
            }
        }
        let sum: f64 = probs.iter().sum();
        if sum > 1.0 + 1e-9 {
            warn!(
                "distribution {} sums to {:.6}; clipping in declaration order",
                name, sum
            );
        }
        Ok(ProbArray {
            name: name.to_string(),
            probs,
            residual_drawn: AtomicBool::new(false),
        })
    }

    /// Draw a count.  A draw beyond the declared mass resolves to the last
    /// index and logs a warning the first time it happens.
    pub fn draw(&self, rng: &mut SimRng) -> usize {
        let u: f64 = rng.gen();
        let mut cum = 0.0;
        for (i, &p) in self.probs.iter().enumerate() {
            cum += p;
            if u < cum {
                return i;
            }
        }
        if !self.residual_drawn.swap(true, Ordering::Relaxed) {
            warn!(
                "distribution {} has unassigned mass {:.6}; drew the residual, \
                 which maps to count {}",
                self.name,
                1.0 - cum,
                self.probs.len() - 1
            );
        }
        self.probs.len() - 1
    }
}

// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓
// THE MODEL
// ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓

/// Segment-selection tuples (kept in declaration order, which fixes the
/// clipping order) and the seven chewback/addition arrays.
#[derive(Debug)]
pub struct RecombinationModel {
    pub singles: Vec<(String, f64)>,
    pub pairs: Vec<(String, String, f64)>,
    pub triples: Vec<(String, String, String, f64)>,
    pub v_chew: ProbArray,
    pub d5_chew: ProbArray,
    pub d3_chew: ProbArray,
    pub j_chew: ProbArray,
    pub vd_add: ProbArray,
    pub dj_add: ProbArray,
    pub vj_add: ProbArray,
}

#[derive(Deserialize)]
struct RawModel {
    segments: Vec<Vec<serde_yaml::Value>>,
    recombination: BTreeMap<String, Vec<f64>>,
}

impl RecombinationModel {
    pub fn load(path: &Path, catalog: &SegmentCatalog) -> Result<RecombinationModel, RecombError> {
        let file = path.display().to_string();
        let f = File::open(path).map_err(|e| RecombError::Io {
            path: path.to_owned(),
            source: e,
        })?;
        let raw: RawModel = serde_yaml::from_reader(f).map_err(|e| RecombError::ModelFormat {
            file: file.clone(),
            msg: e.to_string(),
        })?;
        Self::from_raw(raw, &file, catalog)
    }

    fn from_raw(
        raw: RawModel,
        file: &str,
        catalog: &SegmentCatalog,
    ) -> Result<RecombinationModel, RecombError> {
        let mut singles = Vec::<(String, f64)>::new();
        let mut pairs = Vec::<(String, String, f64)>::new();
        let mut triples = Vec::<(String, String, String, f64)>::new();
        for entry in &raw.segments {
            if entry.len() < 2 || entry.len() > 4 {
                return Err(RecombError::ModelFormat {
                    file: file.to_string(),
                    msg: format!("segment entry with {} elements", entry.len()),
                });
            }
            let n = entry.len() - 1;
            let mut names = Vec::<String>::with_capacity(n);
            for v in &entry[..n] {
                match v.as_str() {
                    Some(s) => names.push(s.to_string()),
                    None => {
                        return Err(RecombError::ModelFormat {
                            file: file.to_string(),
                            msg: format!("segment name is not a string: {:?}", v),
                        })
                    }
                }
            }
            let p = entry[n].as_f64().ok_or_else(|| RecombError::ModelFormat {
                file: file.to_string(),
                msg: format!("tuple probability is not a number: {:?}", entry[n]),
            })?;
            if p < 0.0 || !p.is_finite() {
                return Err(RecombError::NegativeProbability {
                    what: format!("tuple ({})", names.join(", ")),
                    p,
                });
            }
            match n {
                1 => singles.push((names.remove(0), p)),
                2 => {
                    let b = names.remove(1);
                    pairs.push((names.remove(0), b, p));
                }
                _ => {
                    let c = names.remove(2);
                    let b = names.remove(1);
                    triples.push((names.remove(0), b, c, p));
                }
            }
        }

        let mut arrays = raw.recombination;
        let mut take = |name: &str| -> Result<ProbArray, RecombError> {
            let probs = arrays.remove(name).ok_or_else(|| RecombError::ModelFormat {
                file: file.to_string(),
                msg: format!("missing distribution {}", name),
            })?;
            ProbArray::new(name, probs)
        };
        let model = RecombinationModel {
            singles,
            pairs,
            triples,
            v_chew: take("Vchewback")?,
            d5_chew: take("D5chewback")?,
            d3_chew: take("D3chewback")?,
            j_chew: take("Jchewback")?,
            vd_add: take("VDaddition")?,
            dj_add: take("DJaddition")?,
            vj_add: take("VJaddition")?,
        };
        if let Some(name) = arrays.keys().next() {
            return Err(RecombError::ModelFormat {
                file: file.to_string(),
                msg: format!("unknown distribution {}", name),
            });
        }
        model.validate(catalog)?;
        Ok(model)
    }

    // Check every tuple against the catalog: names must resolve, roles must
    // form V / V,D / V,J / V,D,J on one locus, and the declared mass at any
    // fixed prefix must not pass one (warned, the sampler clips).

    fn validate(&self, catalog: &SegmentCatalog) -> Result<(), RecombError> {
        let seg = |name: &String| {
            catalog
                .get(name)
                .ok_or_else(|| RecombError::UnknownSegment(name.clone()))
        };
        for (v, _) in &self.singles {
            let sv = seg(v)?;
            if sv.role != SegmentRole::V {
                return Err(RecombError::BadTuple {
                    msg: format!("1-tuple names {} which is not a V segment", v),
                });
            }
        }
        for (v, x, _) in &self.pairs {
            let (sv, sx) = (seg(v)?, seg(x)?);
            if sv.role != SegmentRole::V
                || (sx.role != SegmentRole::D && sx.role != SegmentRole::J)
                || sv.locus != sx.locus
            {
                return Err(RecombError::BadTuple {
                    msg: format!("2-tuple ({}, {}) is not V,D or V,J on one locus", v, x),
                });
            }
        }
        for (v, d, j, _) in &self.triples {
            let (sv, sd, sj) = (seg(v)?, seg(d)?, seg(j)?);
            if sv.role != SegmentRole::V
                || sd.role != SegmentRole::D
                || sj.role != SegmentRole::J
                || sv.locus != sd.locus
                || sv.locus != sj.locus
            {
                return Err(RecombError::BadTuple {
                    msg: format!("3-tuple ({}, {}, {}) is not V,D,J on one locus", v, d, j),
                });
            }
        }

        // Prefix mass checks.

        let mut by_locus = BTreeMap::<String, f64>::new();
        for (v, p) in &self.singles {
            *by_locus.entry(seg(v)?.locus.to_string()).or_insert(0.0) += p;
        }
        for (locus, sum) in &by_locus {
            if *sum > 1.0 + 1e-9 {
                warn!(
                    "V weights on {} sum to {:.6}; clipping in declaration order",
                    locus, sum
                );
            }
        }
        let mut by_v = BTreeMap::<&str, f64>::new();
        for (v, _, p) in &self.pairs {
            *by_v.entry(v.as_str()).or_insert(0.0) += p;
        }
        for (v, sum) in &by_v {
            if *sum > 1.0 + 1e-9 {
                warn!(
                    "weights conditioned on {} sum to {:.6}; clipping in declaration order",
                    v, sum
                );
            }
        }
        let mut by_vd = BTreeMap::<(&str, &str), f64>::new();
        for (v, d, _, p) in &self.triples {
            *by_vd.entry((v.as_str(), d.as_str())).or_insert(0.0) += p;
        }
        for ((v, d), sum) in &by_vd {
            if *sum > 1.0 + 1e-9 {
                warn!(
                    "weights conditioned on ({}, {}) sum to {:.6}; clipping in declaration order",
                    v, d, sum
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_prob_array_draws() {
        let mut rng = SimRng::seed_from_u64(0);
        let a = ProbArray::new("Vchewback", vec![1.0]).unwrap();
        for _ in 0..20 {
            assert_eq!(a.draw(&mut rng), 0);
        }
        let b = ProbArray::new("Jchewback", vec![0.0, 0.0, 1.0]).unwrap();
        for _ in 0..20 {
            assert_eq!(b.draw(&mut rng), 2);
        }
    }

    #[test]
    fn test_prob_array_deficit_goes_to_last() {
        // Mass 0.0 declared: every draw is in the residual region, which
        // resolves to the last index.
        let mut rng = SimRng::seed_from_u64(1);
        let a = ProbArray::new("VDaddition", vec![0.0, 0.0, 0.0, 0.0]).unwrap();
        for _ in 0..20 {
            assert_eq!(a.draw(&mut rng), 3);
        }
    }

    #[test]
    fn test_prob_array_rejects_negatives() {
        assert!(ProbArray::new("x", vec![0.5, -0.1]).is_err());
        assert!(ProbArray::new("x", vec![]).is_err());
    }
}
