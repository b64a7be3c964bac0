// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// Freeze the repertoire, the population and the RNG stream so a later run
// can pick up exactly where this one stopped.  Chains reference their
// segments by name, never by index, so a snapshot thaws against any
// catalog that still carries those names.

use crate::errors::SimError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tcr_catalog::SegmentCatalog;
use tcr_recomb::repertoire::{Population, Repertoire};
use tcr_recomb::SimRng;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub catalog_table: String,
    pub repertoire: Repertoire,
    pub population: Population,
    pub rng: SimRng,
}

impl Snapshot {
    pub fn new(
        catalog_table: &str,
        repertoire: Repertoire,
        population: Population,
        rng: SimRng,
    ) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            catalog_table: catalog_table.to_string(),
            repertoire,
            population,
            rng,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SimError> {
        let f = File::create(path).map_err(|e| SimError::Io {
            path: path.to_owned(),
            source: e,
        })?;
        let mut w = BufWriter::new(f);
        bincode::serialize_into(&mut w, self)
            .map_err(|e| SimError::Data(format!("could not freeze {}: {}", path.display(), e)))
    }

    pub fn load(path: &Path) -> Result<Snapshot, SimError> {
        let f = File::open(path).map_err(|e| SimError::Io {
            path: path.to_owned(),
            source: e,
        })?;
        let snap: Snapshot = bincode::deserialize_from(BufReader::new(f))
            .map_err(|e| SimError::Data(format!("could not thaw {}: {}", path.display(), e)))?;
        if snap.version != SNAPSHOT_VERSION {
            return Err(SimError::Data(format!(
                "snapshot {} has version {}, expected {}",
                path.display(),
                snap.version,
                SNAPSHOT_VERSION
            )));
        }
        Ok(snap)
    }

    /// A thawed repertoire only makes sense against a catalog that still
    /// defines every referenced segment.
    pub fn verify_against(&self, catalog: &SegmentCatalog) -> Result<(), SimError> {
        for ct in &self.repertoire.clonotypes {
            for chain in ct.chains().iter() {
                let mut names = vec![&chain.v_name, &chain.j_name, &chain.c_name];
                if let Some(d) = &chain.d_name {
                    names.push(d);
                }
                for name in names {
                    if catalog.index_of(name).is_none() {
                        return Err(SimError::Data(format!(
                            "snapshot references segment {} which the catalog does not define",
                            name
                        )));
                    }
                }
            }
        }
        if self.repertoire.len() != self.population.len() {
            return Err(SimError::Data(format!(
                "snapshot population covers {} clonotypes but the repertoire has {}",
                self.population.len(),
                self.repertoire.len()
            )));
        }
        Ok(())
    }
}
