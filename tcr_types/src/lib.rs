// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

use enum_iterator::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

/// The four T-cell receptor loci.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    IntoEnumIterator,
    Hash,
)]
pub enum Locus {
    TRA,
    TRB,
    TRG,
    TRD,
}

impl Locus {
    /// Beta and delta chains recombine with a D segment, alpha and gamma
    /// chains do not.
    pub fn has_d(self) -> bool {
        matches!(self, Locus::TRB | Locus::TRD)
    }

    /// The pairing this locus participates in.
    pub fn pairing(self) -> LocusPair {
        match self {
            Locus::TRA | Locus::TRB => LocusPair::AlphaBeta,
            Locus::TRG | Locus::TRD => LocusPair::GammaDelta,
        }
    }
}

/// Which gene segment class a germline row describes.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumIter,
    IntoEnumIterator,
    Hash,
)]
pub enum SegmentRole {
    V, // Variable region
    D, // Diversity region
    J, // Joining region
    C, // Constant region
}

/// A receptor is either an alpha-beta or a gamma-delta heterodimer.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash, EnumIter,
    IntoEnumIterator,
)]
pub enum LocusPair {
    AlphaBeta,
    GammaDelta,
}

impl LocusPair {
    /// The two loci of the pair, first chain first.
    pub fn loci(self) -> (Locus, Locus) {
        match self {
            LocusPair::AlphaBeta => (Locus::TRA, Locus::TRB),
            LocusPair::GammaDelta => (Locus::TRG, Locus::TRD),
        }
    }
}

impl fmt::Display for LocusPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b) = self.loci();
        write!(f, "{}/{}", a, b)
    }
}

/// Genomic strand of a germline segment.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash,
)]
#[serde(into = "String", try_from = "&str")]
pub enum Strand {
    Plus,
    Minus,
}

impl Strand {
    pub fn is_fw(self) -> bool {
        self == Strand::Plus
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Plus => write!(f, "+"),
            Strand::Minus => write!(f, "-"),
        }
    }
}

impl From<Strand> for String {
    fn from(s: Strand) -> String {
        s.to_string()
    }
}

impl FromStr for Strand {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Plus),
            "-" => Ok(Strand::Minus),
            other => Err(format!("not a strand: \"{}\"", other)),
        }
    }
}

impl std::convert::TryFrom<&str> for Strand {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn locus_from_str() {
        assert_eq!(Locus::from_str("TRA"), Ok(Locus::TRA));
        assert_eq!(Locus::from_str("TRB"), Ok(Locus::TRB));
        assert_eq!(Locus::from_str("TRG"), Ok(Locus::TRG));
        assert_eq!(Locus::from_str("TRD"), Ok(Locus::TRD));
        assert!(Locus::from_str("IGH").is_err());
        for locus in Locus::iter() {
            let json = serde_json::to_string(&locus).unwrap();
            assert_eq!(serde_json::from_str::<Locus>(&json).unwrap(), locus);
        }
    }

    #[test]
    fn locus_pairing() {
        assert!(Locus::TRB.has_d());
        assert!(Locus::TRD.has_d());
        assert!(!Locus::TRA.has_d());
        assert!(!Locus::TRG.has_d());
        assert_eq!(Locus::TRA.pairing(), LocusPair::AlphaBeta);
        assert_eq!(Locus::TRD.pairing(), LocusPair::GammaDelta);
        assert_eq!(LocusPair::AlphaBeta.loci(), (Locus::TRA, Locus::TRB));
        assert_eq!(LocusPair::GammaDelta.to_string(), "TRG/TRD");
    }

    #[test]
    fn strand_round_trip() {
        assert_eq!(Strand::from_str("+"), Ok(Strand::Plus));
        assert_eq!(Strand::from_str("-"), Ok(Strand::Minus));
        assert!(Strand::from_str("fw").is_err());
        assert_eq!(serde_json::to_string(&Strand::Minus).unwrap(), "\"-\"");
        assert_eq!(
            serde_json::from_str::<Strand>("\"+\"").unwrap(),
            Strand::Plus
        );
    }
}
