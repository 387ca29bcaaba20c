//! Property-based tests for disorder placement and the defect multiply.
//!
//! Each case realizes disorder on a small lattice with one worker thread per
//! domain, so the case counts stay modest.

#[path = "../common/mod.rs"]
mod common;

use std::collections::HashSet;

use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_anchor_count_and_uniqueness(
        seed in any::<u64>(),
        concentration in 0.01f64..1.0,
        parts in 1usize..3,
    ) {
        let geometry = common::square(&[8 * parts, 8], &[parts, 1]);
        let realized = common::realize(&geometry, &common::onsite_motif(2, concentration, 1.0), &[], seed);

        for r in &realized {
            prop_assert!(r.result.is_ok());
            let expected = (concentration * 64.0).round() as usize;
            prop_assert_eq!(r.engine.anchor_count(), expected);

            let indexer = r.engine.indexer();
            let mut seen = HashSet::new();
            for tile in 0..indexer.tile_count() {
                for &anchor in r.engine.anchors(tile) {
                    prop_assert!(seen.insert(anchor), "anchor {} placed twice", anchor);
                    prop_assert_eq!(indexer.tile_of(anchor), tile);
                }
            }
        }
    }

    /// The domain-decomposed multiply equals the dense defect Hamiltonian.
    #[test]
    fn prop_multiply_matches_dense(
        seed in any::<u64>(),
        concentration in 0.05f64..1.0,
        parts_x in 1usize..3,
        parts_y in 1usize..3,
    ) {
        let geometry = common::square(&[4 * parts_x, 4 * parts_y], &[parts_x, parts_y]);
        let hams = common::defect_hamiltonians(&geometry, &[common::hermitian_dimer(2, concentration)], seed);
        let engines: Vec<_> = hams.iter().flat_map(|h| h.engines()).collect();
        let dense = common::dense_defects(&engines);

        let x = common::global_vector(geometry.global_states());
        let expected = common::dense_apply(&dense, &x);

        for ham in &hams {
            let indexer = ham.indexer();
            let inp = common::scatter(indexer, &x);
            let mut out = vec![num_complex::Complex64::new(0.0, 0.0); inp.len()];
            ham.multiply::<0>(&mut out, &inp);

            for tile in 0..indexer.tile_count() {
                for &local in indexer.tile_sites(tile) {
                    let global = indexer.global_index(local).unwrap();
                    prop_assert!(common::close(out[local], expected[global], 1e-12));
                }
            }
        }
    }

    /// Hermitian motifs give a hermitian operator: `<y, H x> = <H y, x>`.
    #[test]
    fn prop_hermitian_motif_gives_hermitian_operator(seed in any::<u64>(), concentration in 0.05f64..0.6) {
        let geometry = common::square(&[8, 8], &[2, 1]);
        let hams = common::defect_hamiltonians(&geometry, &[common::hermitian_dimer(2, concentration)], seed);
        let engines: Vec<_> = hams.iter().flat_map(|h| h.engines()).collect();
        let dense = common::dense_defects(&engines);

        for (&(to, from), &value) in &dense {
            let mirror = dense.get(&(from, to)).copied().unwrap_or_default();
            prop_assert!(common::close(value, mirror.conj(), 1e-12), "H[{},{}] not hermitian", to, from);
        }
    }
}
