// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// Typed, validated run parameters.  The command line layer fills this in;
// everything downstream trusts it.

use crate::errors::SimError;
use log::warn;
use std::fmt;
use std::path::PathBuf;
use tcr_recomb::repertoire::Uniqueness;

/// Whether reads are sliced from the genomic body or the spliced transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSpace {
    Dna,
    Rna,
}

impl fmt::Display for ReadSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadSpace::Dna => write!(f, "dna"),
            ReadSpace::Rna => write!(f, "rna"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadType {
    Single,
    Paired,
    Amplicon,
}

impl ReadType {
    pub fn is_paired(self) -> bool {
        !matches!(self, ReadType::Single)
    }
}

/// Bounded-Gaussian length model: mean, standard deviation and the cutoff
/// in standard deviations.  sd = 0 collapses to the mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthModel {
    pub mean: f64,
    pub sd: f64,
    pub cutoff: f64,
}

/// How the cell population is spread over the clonotypes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PopulationSpec {
    Equal,
    Stripe,
    Unimodal { spread: f64 },
    ChiSquare { df: f64, cutoff: f64 },
    LogisticCdf { scale: f64, cutoff: f64 },
}

/// The four quality degradation methods.
#[derive(Debug, Clone, PartialEq)]
pub enum DegradeMethod {
    Logistic { baseline: f64, limit: f64, k: f64, mid: f64 },
    Phred { q: String },
    Fastq { files: Vec<PathBuf>, random: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DegradeSpec {
    pub method: DegradeMethod,
    pub variability: f64,
}

#[derive(Debug, Clone)]
pub struct SimParams {
    pub working_dir: PathBuf,
    pub output: String,
    pub load_population: Option<PathBuf>,
    pub repertoire_size: usize,
    pub alpha_beta_ratio: f64,
    pub uniqueness: Uniqueness,
    pub population_size: u64,
    pub population: PopulationSpec,
    pub sequence_count: usize,
    pub space: ReadSpace,
    pub read_type: ReadType,
    pub read_len: LengthModel,
    pub insert_len: LengthModel,
    pub amplicon_probe: Option<String>,
    pub degrade: Option<DegradeSpec>,
    pub display_degradation: bool,
    pub seed: Option<u64>,
}

impl SimParams {
    pub fn validate(&self) -> Result<(), SimError> {
        let cfg = |msg: String| Err(SimError::Config(msg));
        if self.repertoire_size == 0 {
            return cfg("repertoire size must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.alpha_beta_ratio) {
            return cfg(format!(
                "alpha-beta ratio {} is outside [0, 1]",
                self.alpha_beta_ratio
            ));
        }
        for (what, lm) in &[("read", self.read_len), ("insert", self.insert_len)] {
            if lm.mean < 1.0 || !lm.mean.is_finite() {
                return cfg(format!("{} length mean {} is not positive", what, lm.mean));
            }
            if lm.sd < 0.0 || lm.cutoff < 0.0 {
                return cfg(format!("{} length sd and cutoff must be nonnegative", what));
            }
        }
        match self.read_type {
            ReadType::Amplicon => match &self.amplicon_probe {
                None => return cfg("amplicon reads need an amplicon probe".to_string()),
                Some(p) => {
                    if p.is_empty() || p.bytes().any(|b| !matches!(b, b'A' | b'C' | b'G' | b'T')) {
                        return cfg(format!("amplicon probe \"{}\" is not an ACGT string", p));
                    }
                }
            },
            _ => {
                if self.amplicon_probe.is_some() {
                    return cfg("an amplicon probe only makes sense with read type amplicon"
                        .to_string());
                }
            }
        }
        if self.read_type == ReadType::Paired && self.read_len.mean > self.insert_len.mean {
            warn!(
                "read length mean {} exceeds insert length mean {}; mates will overlap heavily",
                self.read_len.mean, self.insert_len.mean
            );
        }
        match &self.population {
            PopulationSpec::Unimodal { spread } => {
                if *spread <= 0.0 {
                    return cfg(format!("unimodal spread {} must be positive", spread));
                }
            }
            PopulationSpec::ChiSquare { df, cutoff } => {
                if *df <= 0.0 || *cutoff <= 0.0 {
                    return cfg(format!(
                        "chisquare parameters ({}, {}) must be positive",
                        df, cutoff
                    ));
                }
            }
            PopulationSpec::LogisticCdf { scale, cutoff } => {
                if *scale <= 0.0 || *cutoff <= 0.0 {
                    return cfg(format!(
                        "logisticcdf parameters ({}, {}) must be positive",
                        scale, cutoff
                    ));
                }
            }
            PopulationSpec::Equal | PopulationSpec::Stripe => {}
        }
        if let Some(d) = &self.degrade {
            if !(0.0..=1.0).contains(&d.variability) {
                return cfg(format!(
                    "degrade variability {} is outside [0, 1]",
                    d.variability
                ));
            }
            match &d.method {
                DegradeMethod::Logistic { baseline, limit, .. } => {
                    if *baseline < 0.0 || *limit < 0.0 || baseline + limit > 1.0 {
                        return cfg(format!(
                            "logistic error rates ({}, {}) must stay within [0, 1]",
                            baseline, limit
                        ));
                    }
                }
                DegradeMethod::Phred { q } => {
                    if q.is_empty() || q.bytes().any(|b| !(33..=126).contains(&b)) {
                        return cfg("phred string must be printable ascii".to_string());
                    }
                }
                DegradeMethod::Fastq { files, .. } => {
                    let need = if self.read_type.is_paired() { 2 } else { 1 };
                    if files.len() != need {
                        return cfg(format!(
                            "{} fastq quality file(s) given but {} read geometry needs {}",
                            files.len(),
                            if need == 2 { "paired" } else { "single-end" },
                            need
                        ));
                    }
                }
            }
        }
        if self.display_degradation
            && !matches!(
                self.degrade.as_ref().map(|d| &d.method),
                Some(DegradeMethod::Logistic { .. })
            )
        {
            return cfg("display-degradation needs logistic degradation parameters".to_string());
        }
        Ok(())
    }
}
