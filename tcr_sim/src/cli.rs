// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// Command line surface.  Everything funnels into SimParams; the only logic
// here is parsing the colon-packed parameter tuples and rejecting
// contradictory degradation flags.

use crate::errors::SimError;
use crate::params::{
    DegradeMethod, DegradeSpec, LengthModel, PopulationSpec, ReadSpace, ReadType, SimParams,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tcr_recomb::repertoire::Uniqueness;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DistributionArg {
    Equal,
    Stripe,
    Unimodal,
    Chisquare,
    Logisticcdf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SpaceArg {
    Dna,
    Rna,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReadTypeArg {
    Single,
    Paired,
    Amplicon,
}

/// Colon-separated file list for the corpus degradation modes.
#[derive(Debug, Clone)]
pub struct FileList(pub Vec<PathBuf>);

fn parse_two(s: &str) -> Result<(f64, f64), String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(format!("expected a:b, got \"{}\"", s));
    }
    let a = parts[0].parse::<f64>().map_err(|e| e.to_string())?;
    let b = parts[1].parse::<f64>().map_err(|e| e.to_string())?;
    Ok((a, b))
}

fn parse_logistic(s: &str) -> Result<(f64, f64, f64, f64), String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 4 {
        return Err(format!("expected B:L:k:mid, got \"{}\"", s));
    }
    let mut v = [0.0f64; 4];
    for (slot, part) in v.iter_mut().zip(parts.iter()) {
        *slot = part.parse::<f64>().map_err(|e| e.to_string())?;
    }
    Ok((v[0], v[1], v[2], v[3]))
}

fn parse_files(s: &str) -> Result<FileList, String> {
    let files: Vec<PathBuf> = s.split(':').map(PathBuf::from).collect();
    if files.is_empty() || files.iter().any(|f| f.as_os_str().is_empty()) {
        return Err(format!("expected file[:file], got \"{}\"", s));
    }
    Ok(FileList(files))
}

#[derive(Debug, Parser)]
#[command(
    name = "tcr_sim",
    version,
    about = "Simulate T-cell receptor repertoires and sequencing reads"
)]
pub struct Cli {
    /// Directory holding tcell_receptor.tsv, tcell_recombination.yaml and
    /// the reference chromosomes; outputs land here too
    #[arg(long, default_value = ".")]
    pub working_dir: PathBuf,

    /// Basename for all output files
    #[arg(long, default_value = "tcrsim")]
    pub output: String,

    /// Thaw a previously frozen .population.bin instead of building a
    /// fresh repertoire
    #[arg(long)]
    pub load_population: Option<PathBuf>,

    /// Number of clonotypes to build
    #[arg(long, default_value_t = 10)]
    pub repertoire_size: usize,

    /// Probability that a clonotype is alpha-beta rather than gamma-delta
    #[arg(long, default_value_t = 0.9)]
    pub alpha_beta_ratio: f64,

    /// Reject clonotypes repeating an already generated chain-pair RNA
    #[arg(long)]
    pub repertoire_unique: bool,

    /// Reject chains repeating an already generated RNA on the same locus
    #[arg(long)]
    pub chain_unique: bool,

    /// Reject chains repeating an already generated CDR3 on the same locus
    #[arg(long)]
    pub cdr3_unique: bool,

    /// Number of cells to spread over the repertoire
    #[arg(long, default_value_t = 100)]
    pub population_size: u64,

    #[arg(long, value_enum, default_value = "logisticcdf")]
    pub population_distribution: DistributionArg,

    /// Standard deviations spanned by the unimodal distribution
    #[arg(long, default_value_t = 3.0)]
    pub population_unimodal_spread: f64,

    /// df:cutoff for the chisquare distribution
    #[arg(long, value_parser = parse_two, default_value = "3:10")]
    pub population_chisquare_params: (f64, f64),

    /// scale:cutoff for the logisticcdf distribution
    #[arg(long, value_parser = parse_two, default_value = "2:10")]
    pub population_logisticcdf_params: (f64, f64),

    /// Number of reads (read pairs for paired geometries) to emit
    #[arg(long, default_value_t = 0)]
    pub sequence_count: usize,

    /// Slice reads from dna or rna bodies
    #[arg(long, value_enum, default_value = "dna")]
    pub sequence_space: SpaceArg,

    #[arg(long, value_enum, default_value = "single")]
    pub read_type: ReadTypeArg,

    #[arg(long, default_value_t = 48.0)]
    pub read_length_mean: f64,

    #[arg(long, default_value_t = 4.0)]
    pub read_length_sd: f64,

    #[arg(long, default_value_t = 4.0)]
    pub read_length_sd_cutoff: f64,

    #[arg(long, default_value_t = 150.0)]
    pub insert_length_mean: f64,

    #[arg(long, default_value_t = 15.0)]
    pub insert_length_sd: f64,

    #[arg(long, default_value_t = 4.0)]
    pub insert_length_sd_cutoff: f64,

    /// Probe sequence anchoring amplicon R1 reads
    #[arg(long)]
    pub amplicon_probe: Option<String>,

    /// B:L:k:mid parameters of the logistic error curve
    #[arg(long, value_parser = parse_logistic)]
    pub degrade_logistic: Option<(f64, f64, f64, f64)>,

    /// Fixed Phred+33 string applied to every read
    #[arg(long)]
    pub degrade_phred: Option<String>,

    /// One or two fastq files (colon separated) supplying quality strings
    /// in corpus order
    #[arg(long, value_parser = parse_files)]
    pub degrade_fastq: Option<FileList>,

    /// Like --degrade-fastq but quality strings are drawn at random
    #[arg(long, value_parser = parse_files)]
    pub degrade_fastq_random: Option<FileList>,

    /// Multiplicative jitter applied to every per-base error rate
    #[arg(long, default_value_t = 0.0)]
    pub degrade_variability: f64,

    /// Print the logistic error table for one read and exit
    #[arg(long)]
    pub display_degradation: bool,

    /// Seed the run for bit-identical replay
    #[arg(long)]
    pub seed: Option<u64>,

    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn to_params(&self) -> Result<SimParams, SimError> {
        let mut methods = Vec::<DegradeMethod>::new();
        if let Some((baseline, limit, k, mid)) = self.degrade_logistic {
            methods.push(DegradeMethod::Logistic { baseline, limit, k, mid });
        }
        if let Some(q) = &self.degrade_phred {
            methods.push(DegradeMethod::Phred { q: q.clone() });
        }
        if let Some(FileList(files)) = &self.degrade_fastq {
            methods.push(DegradeMethod::Fastq { files: files.clone(), random: false });
        }
        if let Some(FileList(files)) = &self.degrade_fastq_random {
            methods.push(DegradeMethod::Fastq { files: files.clone(), random: true });
        }
        if methods.len() > 1 {
            return Err(SimError::Config(
                "more than one degradation method given".to_string(),
            ));
        }
        let degrade = methods.pop().map(|method| DegradeSpec {
            method,
            variability: self.degrade_variability,
        });

        let population = match self.population_distribution {
            DistributionArg::Equal => PopulationSpec::Equal,
            DistributionArg::Stripe => PopulationSpec::Stripe,
            DistributionArg::Unimodal => PopulationSpec::Unimodal {
                spread: self.population_unimodal_spread,
            },
            DistributionArg::Chisquare => {
                let (df, cutoff) = self.population_chisquare_params;
                PopulationSpec::ChiSquare { df, cutoff }
            }
            DistributionArg::Logisticcdf => {
                let (scale, cutoff) = self.population_logisticcdf_params;
                PopulationSpec::LogisticCdf { scale, cutoff }
            }
        };

        Ok(SimParams {
            working_dir: self.working_dir.clone(),
            output: self.output.clone(),
            load_population: self.load_population.clone(),
            repertoire_size: self.repertoire_size,
            alpha_beta_ratio: self.alpha_beta_ratio,
            uniqueness: Uniqueness::from_flags(
                self.repertoire_unique,
                self.chain_unique,
                self.cdr3_unique,
            ),
            population_size: self.population_size,
            population,
            sequence_count: self.sequence_count,
            space: match self.sequence_space {
                SpaceArg::Dna => ReadSpace::Dna,
                SpaceArg::Rna => ReadSpace::Rna,
            },
            read_type: match self.read_type {
                ReadTypeArg::Single => ReadType::Single,
                ReadTypeArg::Paired => ReadType::Paired,
                ReadTypeArg::Amplicon => ReadType::Amplicon,
            },
            read_len: LengthModel {
                mean: self.read_length_mean,
                sd: self.read_length_sd,
                cutoff: self.read_length_sd_cutoff,
            },
            insert_len: LengthModel {
                mean: self.insert_length_mean,
                sd: self.insert_length_sd,
                cutoff: self.insert_length_sd_cutoff,
            },
            amplicon_probe: self.amplicon_probe.clone(),
            degrade,
            display_degradation: self.display_degradation,
            seed: self.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let cli = Cli::parse_from(["tcr_sim"]);
        let p = cli.to_params().unwrap();
        assert_eq!(p.repertoire_size, 10);
        assert!(matches!(p.population, PopulationSpec::LogisticCdf { scale, cutoff }
            if (scale - 2.0).abs() < 1e-12 && (cutoff - 10.0).abs() < 1e-12));
        assert_eq!(p.read_type, ReadType::Single);
        assert!(p.degrade.is_none());
    }

    #[test]
    fn test_tuple_parsers() {
        assert_eq!(parse_two("3:10").unwrap(), (3.0, 10.0));
        assert!(parse_two("3").is_err());
        assert_eq!(
            parse_logistic("0.001:0.2:0.25:24").unwrap(),
            (0.001, 0.2, 0.25, 24.0)
        );
        assert!(parse_logistic("1:2:3").is_err());
        assert_eq!(parse_files("a.fastq:b.fastq").unwrap().0.len(), 2);
        assert!(parse_files("a.fastq:").is_err());
    }

    #[test]
    fn test_conflicting_degrade_methods_rejected() {
        let cli = Cli::parse_from([
            "tcr_sim",
            "--degrade-phred",
            "IIII",
            "--degrade-logistic",
            "0.001:0.2:0.25:24",
        ]);
        assert!(cli.to_params().is_err());
    }

    #[test]
    fn test_uniqueness_flags_combine() {
        let cli = Cli::parse_from(["tcr_sim", "--cdr3-unique"]);
        assert_eq!(cli.to_params().unwrap().uniqueness, Uniqueness::Cdr3);
    }

    #[test]
    fn test_degrade_fastq_flag() {
        let cli = Cli::parse_from(["tcr_sim", "--degrade-fastq", "q1.fastq:q2.fastq"]);
        let p = cli.to_params().unwrap();
        match p.degrade.unwrap().method {
            DegradeMethod::Fastq { files, random } => {
                assert_eq!(files.len(), 2);
                assert!(!random);
            }
            other => panic!("unexpected method {:?}", other),
        }
    }
}
