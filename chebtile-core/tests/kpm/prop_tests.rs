//! Property-based tests for the moment weights, the running average and the
//! gauged Hamiltonian multiply.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use chebtile_core::kpm::{RunningAverage, green, moment_weight, row_blocked_dot};
use chebtile_core::lattice::{LatticeBuilder, LatticeGeometry};
use num_complex::Complex64;
use proptest::prelude::*;

/// 8 × 8 periodic square lattice in four domains, Landau gauge `G[0][1] = g`.
fn gauged_square(g: f64) -> Arc<LatticeGeometry> {
    Arc::new(
        LatticeBuilder::new()
            .lengths(&[8, 8])
            .divisions(&[2, 2])
            .gauge(vec![vec![0.0, g], vec![0.0, 0.0]])
            .build()
            .unwrap(),
    )
}

fn complex() -> impl Strategy<Value = Complex64> {
    (-1e3f64..1e3, -1e3f64..1e3).prop_map(|(re, im)| Complex64::new(re, im))
}

proptest! {
    #[test]
    fn prop_running_average_is_the_mean(samples in prop::collection::vec(complex(), 1..64)) {
        let mut average = RunningAverage::new();
        for &s in &samples {
            average.push(s);
        }
        let mean = samples.iter().sum::<Complex64>() / samples.len() as f64;
        prop_assert_eq!(average.count(), samples.len() as u64);
        prop_assert!((average.mean() - mean).norm() < 1e-9 * (1.0 + mean.norm()));
    }

    /// For real energies every moment has the same modulus `2 / √(1 − E²)`.
    #[test]
    fn prop_green_modulus_on_the_real_axis(energy in -0.95f64..0.95, n in 0usize..200) {
        let g = green(n, 1, Complex64::new(energy, 0.0));
        let expected = 2.0 / (1.0 - energy * energy).sqrt();
        prop_assert!((g.norm() - expected).abs() < 1e-9 * expected);
    }

    /// The zeroth weight is half of `Im green(0)`, i.e. `1 / √(1 − E²)`.
    #[test]
    fn prop_zeroth_weight_normalization(energy in -0.95f64..0.95) {
        let w = moment_weight(0, Complex64::new(energy, 0.0));
        prop_assert!((w - 1.0 / (1.0 - energy * energy).sqrt()).abs() < 1e-9);
    }

    /// Without broadening the weights are `2 cos(n acos E) / √(1 − E²)`.
    #[test]
    fn prop_weights_are_chebyshev_kernels(energy in -0.9f64..0.9, n in 1usize..100) {
        let w = moment_weight(n, Complex64::new(energy, 0.0));
        let expected = 2.0 * (n as f64 * energy.acos()).cos() / (1.0 - energy * energy).sqrt();
        prop_assert!((w - expected).abs() < 1e-8);
    }

    #[test]
    fn prop_row_blocked_dot_any_row(
        values in prop::collection::vec(complex(), 1..48),
        row in 1usize..16,
    ) {
        let right: Vec<_> = values.iter().map(|v| v * Complex64::new(0.5, -0.25)).collect();
        let plain: Complex64 = values.iter().zip(&right).map(|(a, b)| a.conj() * b).sum();
        let blocked = row_blocked_dot(&values, &right, row);
        prop_assert!((blocked - plain).norm() < 1e-9 * (1.0 + plain.norm()));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// With a gauge field, both recursion steps of every domain equal the
    /// dense operator: tabulated phases inside, margin phase plus boundary
    /// phase across domains.
    #[test]
    fn prop_gauged_multiply_matches_dense(
        seed in any::<u64>(),
        concentration in 0.05f64..1.0,
        g in -0.5f64..0.5,
        diagonal in any::<bool>(),
    ) {
        let geometry = gauged_square(g);
        let motif = if diagonal {
            common::diagonal_dimer(concentration, Complex64::new(-0.7, 0.2))
        } else {
            common::hermitian_dimer(2, concentration)
        };
        let hams = common::defect_hamiltonians(&geometry, &[motif], seed);
        let engines: Vec<_> = hams.iter().flat_map(|h| h.engines()).collect();
        let dense = common::dense_defects(&engines);

        let x = common::global_vector(geometry.global_states());
        let y0: Vec<Complex64> = x.iter().map(|v| v.conj() * 0.5).collect();
        let hx = common::dense_apply(&dense, &x);

        for ham in &hams {
            let indexer = ham.indexer();
            let inp = common::scatter(indexer, &x);
            let mut first = common::scatter(indexer, &y0);
            ham.multiply::<0>(&mut first, &inp);
            let mut next = common::scatter(indexer, &y0);
            ham.multiply::<1>(&mut next, &inp);

            for cell in 0..indexer.interior_cells() {
                let local = indexer.interior_cell(cell);
                let global = indexer.global_index(local).unwrap();
                prop_assert!(
                    common::close(first[local], hx[global], 1e-12),
                    "MULT = 0, domain {} cell {}", indexer.domain_id(), global
                );
                prop_assert!(
                    common::close(next[local], 2.0 * hx[global] - y0[global], 1e-12),
                    "MULT = 1, domain {} cell {}", indexer.domain_id(), global
                );
            }
        }
    }
}
