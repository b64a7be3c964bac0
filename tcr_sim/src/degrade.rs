// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// Turn perfect reads into error-bearing ones.  A per-base error rate comes
// from a logistic position curve, a fixed Phred string, or quality strings
// harvested from real fastq files; the rate is jittered, used to decide a
// base substitution, and encoded back as a Phred+33 character.

use crate::errors::SimError;
use crate::fastq::read_quality_strings;
use crate::params::{DegradeMethod, DegradeSpec, ReadType};
use rand::Rng;
use tcr_recomb::SimRng;

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

enum Rates {
    Logistic { baseline: f64, limit: f64, k: f64, mid: f64 },
    Phred { q: Vec<u8> },
    Corpus { sides: Vec<Vec<Vec<u8>>>, random: bool },
}

pub struct Degrader {
    rates: Rates,
    variability: f64,
}

/// Phred+33 encoding of an error rate, clamped to [0, 41].
pub fn rate_to_quality(e: f64) -> u8 {
    if e <= 0.0 {
        return 33 + 41;
    }
    let phred = (-10.0 * e.log10()).round();
    33 + phred.max(0.0).min(41.0) as u8
}

/// Error rate encoded by a Phred+33 character.
pub fn quality_to_rate(c: u8) -> f64 {
    10f64.powf(-(f64::from(c.saturating_sub(33))) / 10.0)
}

/// The logistic per-position baseline error curve.
pub fn logistic_profile(baseline: f64, limit: f64, k: f64, mid: f64, len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| baseline + limit / (1.0 + (-k * (i as f64 - mid)).exp()))
        .collect()
}

impl Degrader {
    pub fn new(spec: &DegradeSpec, read_type: ReadType) -> Result<Degrader, SimError> {
        let rates = match &spec.method {
            DegradeMethod::Logistic { baseline, limit, k, mid } => Rates::Logistic {
                baseline: *baseline,
                limit: *limit,
                k: *k,
                mid: *mid,
            },
            DegradeMethod::Phred { q } => Rates::Phred {
                q: q.as_bytes().to_vec(),
            },
            DegradeMethod::Fastq { files, random } => {
                let need = if read_type.is_paired() { 2 } else { 1 };
                if files.len() != need {
                    return Err(SimError::Config(format!(
                        "{} quality corpus file(s) for a geometry that needs {}",
                        files.len(),
                        need
                    )));
                }
                let mut sides = Vec::<Vec<Vec<u8>>>::with_capacity(files.len());
                for f in files {
                    let quals = read_quality_strings(f)?;
                    sides.push(quals.into_iter().map(|q| q.into_bytes()).collect());
                }
                Rates::Corpus {
                    sides,
                    random: *random,
                }
            }
        };
        Ok(Degrader {
            rates,
            variability: spec.variability,
        })
    }

    /// Degrade one read.  `index` is the read's sequence index and `mate`
    /// selects the corpus side for paired geometries.  Returns the mutated
    /// bases and the quality string.
    pub fn degrade(
        &self,
        rng: &mut SimRng,
        seq: &str,
        index: usize,
        mate: u8,
    ) -> (String, String) {
        // For the corpus methods the template is chosen per read, before
        // any per-base draw.
        let template: Option<&[u8]> = match &self.rates {
            Rates::Corpus { sides, random } => {
                let side = &sides[usize::from(mate.max(1)) - 1];
                let pick = if *random {
                    rng.gen_range(0..side.len())
                } else {
                    index % side.len()
                };
                Some(&side[pick])
            }
            Rates::Phred { q } => Some(q),
            Rates::Logistic { .. } => None,
        };

        let mut out = Vec::<u8>::with_capacity(seq.len());
        let mut qual = Vec::<u8>::with_capacity(seq.len());
        for (i, &b) in seq.as_bytes().iter().enumerate() {
            let mut e = match (&self.rates, template) {
                (Rates::Logistic { baseline, limit, k, mid }, _) => {
                    baseline + limit / (1.0 + (-k * (i as f64 - mid)).exp())
                }
                (_, Some(q)) => quality_to_rate(q[i.min(q.len() - 1)]),
                _ => unreachable!(),
            };
            if self.variability > 0.0 {
                e *= 1.0 + rng.gen_range(-self.variability..self.variability);
                e = e.max(0.0).min(1.0);
            }
            qual.push(rate_to_quality(e));
            if rng.gen::<f64>() < e {
                out.push(mutate_base(rng, b));
            } else {
                out.push(b);
            }
        }
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(qual).unwrap(),
        )
    }
}

// Substitute a base with one of the other three.

fn mutate_base(rng: &mut SimRng, b: u8) -> u8 {
    let others: Vec<u8> = BASES.iter().copied().filter(|&x| x != b).collect();
    if others.len() == 4 {
        // Not an ACGT base; replace with anything.
        return BASES[rng.gen_range(0..4)];
    }
    others[rng.gen_range(0..3)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn spec(method: DegradeMethod, variability: f64) -> DegradeSpec {
        DegradeSpec { method, variability }
    }

    #[test]
    fn test_quality_encoding_round_trip() {
        assert_eq!(rate_to_quality(0.0), b'J');
        assert_eq!(rate_to_quality(1.0), b'!');
        assert_eq!(rate_to_quality(0.01), b'5');
        assert!((quality_to_rate(b'5') - 0.01).abs() < 1e-12);
        assert!((quality_to_rate(b'!') - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_error_leaves_reads_perfect() {
        let d = Degrader::new(
            &spec(DegradeMethod::Logistic { baseline: 0.0, limit: 0.0, k: 0.25, mid: 24.0 }, 0.0),
            ReadType::Single,
        )
        .unwrap();
        let mut rng = SimRng::seed_from_u64(0);
        let (seq, qual) = d.degrade(&mut rng, "ACGTACGTACGT", 0, 1);
        assert_eq!(seq, "ACGTACGTACGT");
        assert_eq!(qual, "J".repeat(12));
    }

    #[test]
    fn test_certain_error_mutates_every_base() {
        let d = Degrader::new(
            &spec(DegradeMethod::Logistic { baseline: 1.0, limit: 0.0, k: 0.25, mid: 24.0 }, 0.0),
            ReadType::Single,
        )
        .unwrap();
        let mut rng = SimRng::seed_from_u64(1);
        let original = "ACGTACGTAC";
        let (seq, qual) = d.degrade(&mut rng, original, 0, 1);
        assert_eq!(qual, "!".repeat(10));
        for (a, b) in original.bytes().zip(seq.bytes()) {
            assert_ne!(a, b);
            assert!(BASES.contains(&b));
        }
    }

    #[test]
    fn test_short_phred_string_repeats_its_last_character() {
        let d = Degrader::new(
            &spec(DegradeMethod::Phred { q: "5".to_string() }, 0.0),
            ReadType::Single,
        )
        .unwrap();
        let mut rng = SimRng::seed_from_u64(2);
        let (_, qual) = d.degrade(&mut rng, "ACGTACGTAC", 0, 1);
        assert_eq!(qual, "5".repeat(10));
    }

    #[test]
    fn test_corpus_sequential_selection_wraps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.fastq");
        std::fs::write(&path, "@a\nACGT\n+\nJJJJ\n@b\nACGT\n+\n!!!!\n").unwrap();
        let d = Degrader::new(
            &spec(
                DegradeMethod::Fastq { files: vec![path], random: false },
                0.0,
            ),
            ReadType::Single,
        )
        .unwrap();
        let mut rng = SimRng::seed_from_u64(3);
        // Read 0 gets the first template, read 1 the second, read 2 wraps.
        let (_, q0) = d.degrade(&mut rng, "ACGT", 0, 1);
        let (_, q1) = d.degrade(&mut rng, "ACGT", 1, 1);
        let (_, q2) = d.degrade(&mut rng, "ACGT", 2, 1);
        assert_eq!(q0, "JJJJ");
        assert_eq!(q1, "!!!!");
        assert_eq!(q2, "JJJJ");
    }

    #[test]
    fn test_logistic_profile_shape() {
        let prof = logistic_profile(0.001, 0.2, 0.25, 24.0, 48);
        assert_eq!(prof.len(), 48);
        // Monotone rise through the midpoint.
        assert!(prof[0] < prof[24]);
        assert!(prof[24] < prof[47]);
        assert!((prof[24] - (0.001 + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let d = Degrader::new(
            &spec(DegradeMethod::Logistic { baseline: 0.5, limit: 0.0, k: 0.25, mid: 24.0 }, 0.5),
            ReadType::Single,
        )
        .unwrap();
        let mut rng = SimRng::seed_from_u64(4);
        let (_, qual) = d.degrade(&mut rng, &"A".repeat(200), 0, 1);
        for c in qual.bytes() {
            assert!((33..=33 + 41).contains(&c));
        }
    }
}
