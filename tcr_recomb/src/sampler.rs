// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

// Weighted categorical sampling with residual-mass redistribution.
//
// A draw takes a list of (item, weight) pairs in declaration order plus a
// list of residual items with no declared weight.  With declared mass
// S <= 1, each residual item receives (1 - S) / |residual|; with S > 1 the
// declared items are consumed in order until the cumulative weight reaches
// the uniform draw, which clips the tail.  Absent weights are never treated
// as zero.

use crate::SimRng;
use rand::Rng;

/// Draw one item.  Returns None only when both lists are empty.
pub fn draw_weighted(rng: &mut SimRng, defined: &[(usize, f64)], residual: &[usize]) -> Option<usize> {
    if defined.is_empty() && residual.is_empty() {
        return None;
    }
    let s: f64 = defined.iter().map(|x| x.1).sum();
    let residual_each = if residual.is_empty() || s >= 1.0 {
        0.0
    } else {
        (1.0 - s) / residual.len() as f64
    };
    let u: f64 = rng.gen();
    let mut cum = 0.0;
    for &(item, w) in defined {
        cum += w;
        if u < cum {
            return Some(item);
        }
    }
    for &item in residual {
        cum += residual_each;
        if u < cum {
            return Some(item);
        }
    }
    // Floating point slack, or declared mass below one with no residual
    // items to soak it up.  The draw lands on the final item.
    residual.last().or_else(|| defined.last().map(|x| &x.0)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_certain_item() {
        let mut rng = SimRng::seed_from_u64(0);
        for _ in 0..50 {
            assert_eq!(draw_weighted(&mut rng, &[(7, 1.0)], &[1, 2, 3]), Some(7));
        }
    }

    #[test]
    fn test_empty() {
        let mut rng = SimRng::seed_from_u64(0);
        assert_eq!(draw_weighted(&mut rng, &[], &[]), None);
    }

    #[test]
    fn test_residual_only_is_uniform() {
        // With no declared weights all mass goes to the residual items, so
        // every item must be reachable.
        let mut rng = SimRng::seed_from_u64(1);
        let mut seen = [false; 4];
        for _ in 0..400 {
            let k = draw_weighted(&mut rng, &[], &[0, 1, 2, 3]).unwrap();
            seen[k] = true;
        }
        assert_eq!(seen, [true; 4]);
    }

    #[test]
    fn test_redistribution_mass() {
        // Item 0 declared at 0.5, two residual items share the other half.
        // Item 0 should dominate each residual item roughly two to one.
        let mut rng = SimRng::seed_from_u64(2);
        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            let k = draw_weighted(&mut rng, &[(0, 0.5)], &[1, 2]).unwrap();
            counts[k] += 1;
        }
        assert!(counts[0] > counts[1] && counts[0] > counts[2]);
        assert!(counts[1] > 0 && counts[2] > 0);
        let half = counts[0] as f64 / 3000.0;
        assert!((half - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_overcommitted_weights_clip_in_order() {
        // Declared mass exceeds one; items are consumed in declaration
        // order, so the third item is unreachable and residuals get nothing.
        let mut rng = SimRng::seed_from_u64(3);
        for _ in 0..200 {
            let k = draw_weighted(&mut rng, &[(0, 0.7), (1, 0.7), (2, 0.7)], &[9]).unwrap();
            assert!(k == 0 || k == 1);
        }
    }

    #[test]
    fn test_deficit_without_residual_falls_to_last() {
        // Total declared mass is 0.2 and there is nowhere to put the rest;
        // draws beyond the declared mass land on the last declared item.
        let mut rng = SimRng::seed_from_u64(4);
        let mut counts = [0usize; 2];
        for _ in 0..1000 {
            let k = draw_weighted(&mut rng, &[(0, 0.1), (1, 0.1)], &[]).unwrap();
            counts[k] += 1;
        }
        assert!(counts[1] > counts[0]);
    }
}
