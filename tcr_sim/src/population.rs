// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// Spread N cells over K clonotypes.  equal and stripe need no shape; the
// other three evaluate a density over K grid points, normalize, and draw N
// cells multinomially.  K = 1 degenerates to putting every cell in the one
// clonotype, whatever the mode.

use crate::errors::SimError;
use crate::params::PopulationSpec;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use statrs::distribution::{ChiSquared, Continuous};
use tcr_recomb::repertoire::Population;
use tcr_recomb::SimRng;

pub fn distribute(
    rng: &mut SimRng,
    spec: &PopulationSpec,
    k: usize,
    n: u64,
) -> Result<Population, SimError> {
    if k == 0 {
        return Err(SimError::Config(
            "cannot distribute cells over an empty repertoire".to_string(),
        ));
    }
    if n > u64::from(u32::MAX) {
        return Err(SimError::Config(format!(
            "population size {} is out of range",
            n
        )));
    }
    if k == 1 {
        return Ok(Population { cells: vec![n as u32] });
    }
    let mut cells = vec![0u32; k];
    match spec {
        PopulationSpec::Equal => {
            for _ in 0..n {
                cells[rng.gen_range(0..k)] += 1;
            }
        }
        PopulationSpec::Stripe => {
            // Cell i lands in clonotype i mod k.
            let (q, r) = (n / k as u64, n % k as u64);
            for (i, c) in cells.iter_mut().enumerate() {
                *c = (q + if (i as u64) < r { 1 } else { 0 }) as u32;
            }
        }
        _ => {
            let weights = shape_weights(spec, k)?;
            let index = WeightedIndex::new(&weights).map_err(|e| {
                SimError::Config(format!("population distribution has no usable mass: {}", e))
            })?;
            for _ in 0..n {
                cells[index.sample(rng)] += 1;
            }
        }
    }
    Ok(Population { cells })
}

// Evaluate the population shape on its K-point grid.  Only called with
// k >= 2 so the grid spacing is well defined.

fn shape_weights(spec: &PopulationSpec, k: usize) -> Result<Vec<f64>, SimError> {
    let mut weights = Vec::<f64>::with_capacity(k);
    match spec {
        PopulationSpec::Unimodal { spread } => {
            for i in 0..k {
                let x = -spread + 2.0 * spread * i as f64 / (k - 1) as f64;
                weights.push((-0.5 * x * x).exp());
            }
        }
        PopulationSpec::ChiSquare { df, cutoff } => {
            let dist = ChiSquared::new(*df).map_err(|e| {
                SimError::Config(format!("bad chisquare parameters: {}", e))
            })?;
            for i in 0..k {
                let x = cutoff * i as f64 / (k - 1) as f64;
                weights.push(dist.pdf(x));
            }
        }
        PopulationSpec::LogisticCdf { scale, cutoff } => {
            for i in 0..k {
                let x = -cutoff + 2.0 * cutoff * i as f64 / (k - 1) as f64;
                weights.push(1.0 / (1.0 + (-x / scale).exp()));
            }
        }
        PopulationSpec::Equal | PopulationSpec::Stripe => unreachable!(),
    }
    for &w in &weights {
        if !w.is_finite() || w < 0.0 {
            return Err(SimError::Config(format!(
                "population distribution produced unusable weight {}",
                w
            )));
        }
    }
    Ok(weights)
}
