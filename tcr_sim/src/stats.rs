// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// The per-clonotype statistics table: one row per clonotype with its
// segment choices, CDR3s and cell count.

use crate::errors::SimError;
use itertools::Itertools;
use std::fs::File;
use std::io::{prelude::*, BufWriter};
use std::path::Path;
use tcr_recomb::repertoire::{Population, Repertoire};

pub const HEADER: &str =
    "clonotype,locus_pair,v1,d1,j1,c1,cdr3_1,v2,d2,j2,c2,cdr3_2,cells";

pub fn write_statistics(
    path: &Path,
    repertoire: &Repertoire,
    population: &Population,
) -> Result<(), SimError> {
    let io = |e: std::io::Error| SimError::Io {
        path: path.to_owned(),
        source: e,
    };
    let f = File::create(path).map_err(io)?;
    let mut w = BufWriter::new(f);
    writeln!(w, "{}", HEADER).map_err(io)?;
    for (i, ct) in repertoire.clonotypes.iter().enumerate() {
        let cells = population.cells.get(i).copied().unwrap_or(0);
        let mut fields = vec![i.to_string(), ct.pair.to_string()];
        for chain in ct.chains().iter() {
            fields.push(chain.v_name.clone());
            fields.push(chain.d_name.clone().unwrap_or_default());
            fields.push(chain.j_name.clone());
            fields.push(chain.c_name.clone());
            fields.push(chain.cdr3_str().to_string());
        }
        fields.push(cells.to_string());
        writeln!(w, "{}", fields.iter().join(",")).map_err(io)?;
    }
    w.flush().map_err(io)
}
