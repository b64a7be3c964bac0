// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// Build one recombined TCR chain: sample segments through the conditional
// tuple weights, chew back the junction-facing ends, insert non-templated
// bases, and lay down both the genomic (DNA) and the spliced (RNA) body.

use crate::cdr3::find_cdr3;
use crate::model::RecombinationModel;
use crate::sampler::draw_weighted;
use crate::{RecombError, SimRng};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tcr_catalog::{Segment, SegmentCatalog};
use tcr_types::{Locus, SegmentRole, Strand};

const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Non-templated insertions at the junctions of one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Junction {
    VJ { n: String },
    VDJ { vd: String, dj: String },
}

/// One recombined chain.  Segments are referenced by name so the chain can
/// be frozen and later re-resolved against a fresh catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    pub locus: Locus,
    pub v_name: String,
    pub d_name: Option<String>,
    pub j_name: String,
    pub c_name: String,
    pub v_chew: usize,
    pub d5_chew: usize,
    pub d3_chew: usize,
    pub j_chew: usize,
    pub junction: Junction,
    pub dna: String,
    pub rna: String,
    pub cdr3: Option<String>,
}

impl Chain {
    pub fn is_productive(&self) -> bool {
        self.cdr3.is_some()
    }

    /// CDR3 nucleotide sequence, empty string when unproductive.
    pub fn cdr3_str(&self) -> &str {
        self.cdr3.as_deref().unwrap_or("")
    }
}

/// Chain factory bound to one catalog and one model.
pub struct ChainBuilder<'a> {
    pub catalog: &'a SegmentCatalog,
    pub model: &'a RecombinationModel,
}

impl<'a> ChainBuilder<'a> {
    pub fn new(catalog: &'a SegmentCatalog, model: &'a RecombinationModel) -> ChainBuilder<'a> {
        ChainBuilder { catalog, model }
    }

    pub fn build(&self, rng: &mut SimRng, locus: Locus) -> Result<Chain, RecombError> {
        let cat = self.catalog;

        // Sample V over all V segments of the locus.

        let v_candidates = self.candidates(locus, SegmentRole::V)?;
        let defined: Vec<(usize, f64)> = self
            .model
            .singles
            .iter()
            .filter_map(|(name, p)| {
                cat.index_of(name)
                    .filter(|i| v_candidates.contains(i))
                    .map(|i| (i, *p))
            })
            .collect();
        let v = self.draw(rng, &defined, &v_candidates);
        let vseg = &cat.segs[v];

        // Sample D (beta and delta only), then J, both restricted to
        // segments downstream of what is already chosen.

        let (d, j) = if locus.has_d() {
            let d_candidates = self.downstream_of(vseg, locus, SegmentRole::D)?;
            let defined: Vec<(usize, f64)> = self
                .model
                .pairs
                .iter()
                .filter(|(a, _, _)| *a == vseg.name)
                .filter_map(|(_, b, p)| {
                    cat.index_of(b)
                        .filter(|i| d_candidates.contains(i))
                        .map(|i| (i, *p))
                })
                .collect();
            let d = self.draw(rng, &defined, &d_candidates);
            let dseg = &cat.segs[d];

            let j_candidates = self.downstream_of(dseg, locus, SegmentRole::J)?;
            let defined: Vec<(usize, f64)> = self
                .model
                .triples
                .iter()
                .filter(|(a, b, _, _)| *a == vseg.name && *b == dseg.name)
                .filter_map(|(_, _, c, p)| {
                    cat.index_of(c)
                        .filter(|i| j_candidates.contains(i))
                        .map(|i| (i, *p))
                })
                .collect();
            (Some(d), self.draw(rng, &defined, &j_candidates))
        } else {
            let j_candidates = self.downstream_of(vseg, locus, SegmentRole::J)?;
            let defined: Vec<(usize, f64)> = self
                .model
                .pairs
                .iter()
                .filter(|(a, _, _)| *a == vseg.name)
                .filter_map(|(_, b, p)| {
                    cat.index_of(b)
                        .filter(|i| j_candidates.contains(i))
                        .map(|i| (i, *p))
                })
                .collect();
            (None, self.draw(rng, &defined, &j_candidates))
        };
        let jseg = &cat.segs[j];

        // The constant region is not sampled: take the nearest C segment
        // downstream of J.

        let c = self.nearest_c(jseg, locus)?;
        let cseg = &cat.segs[c];

        // Chewback and N-addition draws, in a fixed order so runs are
        // reproducible from the seed.

        let v_chew = self.model.v_chew.draw(rng);
        let j_chew = self.model.j_chew.draw(rng);
        let (d5_chew, d3_chew) = if d.is_some() {
            (self.model.d5_chew.draw(rng), self.model.d3_chew.draw(rng))
        } else {
            (0, 0)
        };
        let junction = if d.is_some() {
            let vd_len = self.model.vd_add.draw(rng);
            let vd = random_bases(rng, vd_len);
            let dj_len = self.model.dj_add.draw(rng);
            let dj = random_bases(rng, dj_len);
            Junction::VDJ { vd, dj }
        } else {
            let vj_len = self.model.vj_add.draw(rng);
            let n = random_bases(rng, vj_len);
            Junction::VJ { n }
        };

        Ok(assemble(
            locus,
            vseg,
            d.map(|i| &cat.segs[i]),
            jseg,
            cseg,
            v_chew,
            d5_chew,
            d3_chew,
            j_chew,
            junction,
        ))
    }

    fn candidates(&self, locus: Locus, role: SegmentRole) -> Result<Vec<usize>, RecombError> {
        let v = self.catalog.of_kind(locus, role);
        if v.is_empty() {
            return Err(RecombError::EmptyLocus { locus, role });
        }
        Ok(v)
    }

    fn downstream_of(
        &self,
        from: &Segment,
        locus: Locus,
        role: SegmentRole,
    ) -> Result<Vec<usize>, RecombError> {
        let v: Vec<usize> = self
            .catalog
            .of_kind(locus, role)
            .into_iter()
            .filter(|&i| from.is_upstream_of(&self.catalog.segs[i]))
            .collect();
        if v.is_empty() {
            return Err(RecombError::NoDownstreamSegment {
                locus,
                role,
                upstream: from.name.clone(),
            });
        }
        Ok(v)
    }

    fn nearest_c(&self, jseg: &Segment, locus: Locus) -> Result<usize, RecombError> {
        let cs = self.downstream_of(jseg, locus, SegmentRole::C)?;
        let mut best = cs[0];
        for &i in &cs[1..] {
            let (a, b) = (&self.catalog.segs[i], &self.catalog.segs[best]);
            let closer = match jseg.strand {
                Strand::Plus => a.start < b.start,
                Strand::Minus => a.end > b.end,
            };
            if closer {
                best = i;
            }
        }
        Ok(best)
    }

    // Residual items are the candidates carrying no declared weight.

    fn draw(&self, rng: &mut SimRng, defined: &[(usize, f64)], candidates: &[usize]) -> usize {
        let residual: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|i| !defined.iter().any(|(j, _)| j == i))
            .collect();
        // Candidate lists are checked non-empty before we get here.
        draw_weighted(rng, defined, &residual).expect("empty candidate list")
    }
}

fn random_bases(rng: &mut SimRng, n: usize) -> String {
    let mut s = String::with_capacity(n);
    for _ in 0..n {
        s.push(BASES[rng.gen_range(0..4)] as char);
    }
    s
}

#[allow(clippy::too_many_arguments)]
fn assemble(
    locus: Locus,
    vseg: &Segment,
    dseg: Option<&Segment>,
    jseg: &Segment,
    cseg: &Segment,
    v_chew: usize,
    d5_chew: usize,
    d3_chew: usize,
    j_chew: usize,
    junction: Junction,
) -> Chain {
    let vb = vseg.bases();
    let jb = jseg.bases();
    let cb = cseg.bases();
    let v_keep = vb.len() - v_chew.min(vb.len());
    let j_lo = j_chew.min(jb.len());

    let (n1, n2): (&[u8], &[u8]) = match &junction {
        Junction::VJ { n } => (n.as_bytes(), &[]),
        Junction::VDJ { vd, dj } => (vd.as_bytes(), dj.as_bytes()),
    };

    let mut dna = Vec::<u8>::new();
    let mut rna = Vec::<u8>::new();
    dna.extend_from_slice(&vb[..v_keep]);
    rna.extend_from_slice(&vseg.spliced(0, v_keep));
    let v_end = rna.len();
    dna.extend_from_slice(n1);
    rna.extend_from_slice(n1);
    if let Some(dseg) = dseg {
        let db = dseg.bases();
        let d_lo = d5_chew.min(db.len());
        let d_hi = (db.len() - d3_chew.min(db.len())).max(d_lo);
        dna.extend_from_slice(&db[d_lo..d_hi]);
        rna.extend_from_slice(&dseg.spliced(d_lo, d_hi));
        dna.extend_from_slice(n2);
        rna.extend_from_slice(n2);
    }
    let j_start = rna.len();
    dna.extend_from_slice(&jb[j_lo..]);
    rna.extend_from_slice(&jseg.spliced(j_lo, jb.len()));
    let j_end = rna.len();
    dna.extend_from_slice(&cb);
    rna.extend_from_slice(&cseg.spliced(0, cb.len()));

    let cdr3 = find_cdr3(&rna, v_end, j_start, j_end)
        .map(|(a, b)| String::from_utf8(rna[a..b].to_vec()).unwrap());

    Chain {
        locus,
        v_name: vseg.name.clone(),
        d_name: dseg.map(|d| d.name.clone()),
        j_name: jseg.name.clone(),
        c_name: cseg.name.clone(),
        v_chew,
        d5_chew,
        d3_chew,
        j_chew,
        junction,
        dna: String::from_utf8(dna).unwrap(),
        rna: String::from_utf8(rna).unwrap(),
        cdr3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProbArray;
    use crate::testutil::{toy_catalog, toy_model, TRB_C, TRB_D, TRB_J, TRB_V};
    use rand::SeedableRng;

    #[test]
    fn test_beta_chain_is_deterministic_concatenation() {
        let cat = toy_catalog();
        let model = toy_model();
        let builder = ChainBuilder::new(&cat, &model);
        let mut rng = SimRng::seed_from_u64(11);
        let chain = builder.build(&mut rng, Locus::TRB).unwrap();
        assert_eq!(chain.v_name, "TRBV9-1");
        assert_eq!(chain.d_name.as_deref(), Some("TRBD9-1"));
        assert_eq!(chain.j_name, "TRBJ9-1");
        assert_eq!(chain.c_name, "TRBC9");
        // Zero chewback, zero addition: the bodies concatenate verbatim.
        let expect_dna = [TRB_V, TRB_D, TRB_J, TRB_C].concat();
        assert_eq!(chain.dna, expect_dna);
        assert_eq!(chain.junction, Junction::VDJ { vd: String::new(), dj: String::new() });
    }

    #[test]
    fn test_rna_splices_introns_out() {
        let cat = toy_catalog();
        let model = toy_model();
        let builder = ChainBuilder::new(&cat, &model);
        let mut rng = SimRng::seed_from_u64(11);
        let chain = builder.build(&mut rng, Locus::TRB).unwrap();
        // V intron (9..21) and C intron (12..18) are gone.
        let v_rna = [&TRB_V[..9], &TRB_V[21..]].concat();
        let c_rna = [&TRB_C[..12], &TRB_C[18..]].concat();
        let expect_rna = [v_rna.as_str(), TRB_D, TRB_J, c_rna.as_str()].concat();
        assert_eq!(chain.rna, expect_rna);
        // RNA is the DNA with introns removed, so it embeds in order.
        assert!(chain.rna.len() < chain.dna.len());
        assert!(chain.is_productive());
    }

    #[test]
    fn test_cdr3_anchors() {
        let cat = toy_catalog();
        let model = toy_model();
        let builder = ChainBuilder::new(&cat, &model);
        let mut rng = SimRng::seed_from_u64(7);
        let chain = builder.build(&mut rng, Locus::TRB).unwrap();
        let cdr3 = chain.cdr3.as_ref().unwrap();
        assert!(cdr3.starts_with("TGT"));
        assert!(cdr3.ends_with("TTT"));
        assert_eq!(cdr3.len() % 3, 0);
        // The alpha chain has no D; same anchors hold.
        let alpha = builder.build(&mut rng, Locus::TRA).unwrap();
        assert!(alpha.d_name.is_none());
        assert!(alpha.is_productive());
        assert_eq!(alpha.junction, Junction::VJ { n: String::new() });
    }

    #[test]
    fn test_junction_insertions_land_in_both_bodies() {
        let cat = toy_catalog();
        let mut model = toy_model();
        model.vd_add = ProbArray::new("VDaddition", vec![0.0, 0.0, 1.0]).unwrap();
        model.dj_add = ProbArray::new("DJaddition", vec![0.0, 0.0, 0.0, 1.0]).unwrap();
        let builder = ChainBuilder::new(&cat, &model);
        let mut rng = SimRng::seed_from_u64(3);
        let chain = builder.build(&mut rng, Locus::TRB).unwrap();
        let (vd, dj) = match &chain.junction {
            Junction::VDJ { vd, dj } => (vd.clone(), dj.clone()),
            other => panic!("unexpected junction {:?}", other),
        };
        assert_eq!(vd.len(), 2);
        assert_eq!(dj.len(), 3);
        let expect_dna = [TRB_V, vd.as_str(), TRB_D, dj.as_str(), TRB_J, TRB_C].concat();
        assert_eq!(chain.dna, expect_dna);
        assert!(chain.rna.contains(&vd));
    }

    #[test]
    fn test_chewback_trims_junction_ends() {
        let cat = toy_catalog();
        let mut model = toy_model();
        let mut v = vec![0.0; 5];
        v[4] = 1.0;
        model.v_chew = ProbArray::new("Vchewback", v).unwrap();
        let mut j = vec![0.0; 3];
        j[2] = 1.0;
        model.j_chew = ProbArray::new("Jchewback", j).unwrap();
        let builder = ChainBuilder::new(&cat, &model);
        let mut rng = SimRng::seed_from_u64(5);
        let chain = builder.build(&mut rng, Locus::TRB).unwrap();
        assert_eq!(chain.v_chew, 4);
        assert_eq!(chain.j_chew, 2);
        let expect_dna = [
            &TRB_V[..TRB_V.len() - 4],
            TRB_D,
            &TRB_J[2..],
            TRB_C,
        ]
        .concat();
        assert_eq!(chain.dna, expect_dna);
    }

    #[test]
    fn test_overlong_chewback_empties_the_d() {
        let cat = toy_catalog();
        let mut model = toy_model();
        let mut d5 = vec![0.0; 25];
        d5[24] = 1.0;
        model.d5_chew = ProbArray::new("D5chewback", d5).unwrap();
        let builder = ChainBuilder::new(&cat, &model);
        let mut rng = SimRng::seed_from_u64(9);
        let chain = builder.build(&mut rng, Locus::TRB).unwrap();
        // 24 > |D|: the D contributes nothing but the chain still builds.
        let expect_dna = [TRB_V, TRB_J, TRB_C].concat();
        assert_eq!(chain.dna, expect_dna);
    }

    #[test]
    fn test_same_seed_same_chain() {
        let cat = toy_catalog();
        let model = toy_model();
        let builder = ChainBuilder::new(&cat, &model);
        let mut a = SimRng::seed_from_u64(42);
        let mut b = SimRng::seed_from_u64(42);
        let x = builder.build(&mut a, Locus::TRB).unwrap();
        let y = builder.build(&mut b, Locus::TRB).unwrap();
        assert_eq!(x.dna, y.dna);
        assert_eq!(x.rna, y.rna);
        assert_eq!(x.cdr3, y.cdr3);
    }
}
