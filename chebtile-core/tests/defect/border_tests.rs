//! Tests for the hand-off of motif terms across domain boundaries.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use chebtile_core::defect::{DefectMotif, DisorderPlacementEngine, MotifBond, border_phase, pack_node_position};
use chebtile_core::lattice::{LatticeBuilder, LatticeGeometry, LatticeIndexer, NGHOSTS};
use common::StuckRng;
use num_complex::Complex64;

const T: Complex64 = Complex64::new(-1.25, 0.5);

/// Landau gauge component `G[0][1]`.
const G: f64 = 0.3;

/// Local index of global cell `(x, y)` in its owner's layout.
fn owner_local(indexer: &LatticeIndexer, x: usize, y: usize) -> usize {
    let lx = indexer.geometry().lengths()[0];
    indexer.local_of_global(x + lx * y)
}

/// Anchors sitting on the last interior column of the domain.
fn right_edge_anchors(engine: &DisorderPlacementEngine) -> usize {
    let indexer = engine.indexer();
    let layout = indexer.local_layout();
    let edge = (NGHOSTS + indexer.geometry().interior()[0] - 1) as isize;
    (0..indexer.tile_count())
        .flat_map(|tile| engine.anchors(tile).iter())
        .filter(|&&a| layout.site(a)[0] == edge)
        .count()
}

#[test]
fn test_dimer_straddling_the_seam_is_handed_to_the_owner() {
    common::init_tracing();
    // 8 × 4, open along x, split into two 4 × 4 domains; every cell anchors.
    let geometry = common::open_x(&[8, 4], &[2, 1]);
    let realized = common::realize(&geometry, &common::dimer_motif(2, 1.0, T), &[], 9);

    // Domain 0's last column reaches into domain 1; domain 1's runs off the open edge.
    assert!(realized[0].engine.border().is_empty());
    let border = realized[1].engine.border();
    assert_eq!(border.bonds.len(), 4);
    assert!(border.onsite.is_empty());

    let indexer = realized[1].engine.indexer();
    for (y, bond) in border.bonds.iter().enumerate() {
        assert_eq!(bond.source, owner_local(indexer, 4, y));
        assert_eq!(bond.target, bond.source - 1, "from node sits one cell along -x");
        assert!(!indexer.is_interior(bond.target));
        assert_eq!(indexer.global_index(bond.target), Some(3 + 8 * y));
        assert!(common::close(bond.hopping, T, 1e-14));
    }
}

#[test]
fn test_periodic_seam_hands_off_both_ways() {
    let geometry = common::square(&[8, 4], &[2, 1]);
    let realized = common::realize(&geometry, &common::dimer_motif(2, 1.0, T), &[], 9);
    assert_eq!(realized[0].engine.border().bonds.len(), 4);
    assert_eq!(realized[1].engine.border().bonds.len(), 4);
}

#[test]
fn test_vacant_sender_site_suppresses_the_bond() {
    let geometry = common::open_x(&[8, 4], &[2, 1]);
    let sender = LatticeIndexer::new(geometry.clone(), 0).unwrap();
    let vacancies = vec![vec![owner_local(&sender, 3, 0)]];
    let realized = common::realize(&geometry, &common::dimer_motif(2, 1.0, T), &vacancies, 9);

    let border = realized[1].engine.border();
    assert_eq!(border.bonds.len(), 3);
    let receiver = realized[1].engine.indexer();
    assert!(border.bonds.iter().all(|b| b.source != owner_local(receiver, 4, 0)));
}

#[test]
fn test_vacant_receiver_site_drops_the_bond() {
    let geometry = common::open_x(&[8, 4], &[2, 1]);
    let receiver = LatticeIndexer::new(geometry.clone(), 1).unwrap();
    let vacant = owner_local(&receiver, 4, 1);
    let vacancies = vec![Vec::new(), vec![vacant]];
    let realized = common::realize(&geometry, &common::dimer_motif(2, 1.0, T), &vacancies, 9);

    let border = realized[1].engine.border();
    assert_eq!(border.bonds.len(), 3);
    assert!(border.bonds.iter().all(|b| b.source != vacant));
}

#[test]
fn test_onsite_terms_of_ghost_nodes_are_handed_off() {
    let geometry = common::open_x(&[8, 4], &[2, 1]);
    let realized = common::realize(&geometry, &common::hermitian_dimer(2, 1.0), &[], 4);

    let border = realized[1].engine.border();
    // Node 1 of each seam copy: one bond into it, its onsite term.
    assert_eq!(border.bonds.len(), 4);
    assert_eq!(border.onsite.len(), 4);
    assert!(border.onsite.iter().all(|o| common::close(o.value, Complex64::new(-0.3, 0.0), 1e-14)));
}

#[test]
fn test_border_lists_do_not_depend_on_scheduling() {
    let geometry = common::square(&[16, 8], &[2, 2]);
    let motif = common::hermitian_dimer(2, 0.4);
    let first = common::realize(&geometry, &motif, &[], 21);
    for _ in 0..8 {
        let again = common::realize(&geometry, &motif, &[], 21);
        for (a, b) in first.iter().zip(&again) {
            assert_eq!(a.engine.border(), b.engine.border());
        }
    }
    for r in &first {
        let bonds = &r.engine.border().bonds;
        assert!(bonds.windows(2).all(|w| (w[0].source, w[0].target) <= (w[1].source, w[1].target)));
    }
}

#[test]
fn test_border_count_matches_neighbor_edge_anchors() {
    let geometry = common::square(&[16, 8], &[2, 1]);
    for seed in 0..5 {
        let realized = common::realize(&geometry, &common::dimer_motif(2, 0.3, T), &[], seed);
        assert_eq!(realized[0].engine.border().bonds.len(), right_edge_anchors(&realized[1].engine));
        assert_eq!(realized[1].engine.border().bonds.len(), right_edge_anchors(&realized[0].engine));
    }
}

/// Node 1 one cell along `+x`, node 2 one cell along `+x` and `+y`, bonded
/// both ways. Node 0 only anchors the copy.
fn offset_pair_motif(concentration: f64) -> DefectMotif {
    DefectMotif::new(
        concentration,
        vec![
            pack_node_position(&[0, 0], 0),
            pack_node_position(&[1, 0], 0),
            pack_node_position(&[1, 1], 0),
        ],
        vec![
            MotifBond { to: 1, from: 2, hopping: T },
            MotifBond { to: 2, from: 1, hopping: T.conj() },
        ],
        Vec::new(),
    )
    .unwrap()
}

/// Node 1 one cell along `-x` and `+y`, bonded both ways.
fn back_diagonal_dimer(concentration: f64) -> DefectMotif {
    DefectMotif::new(
        concentration,
        vec![pack_node_position(&[0, 0], 0), pack_node_position(&[-1, 1], 0)],
        vec![
            MotifBond { to: 1, from: 0, hopping: T },
            MotifBond { to: 0, from: 1, hopping: T.conj() },
        ],
        Vec::new(),
    )
    .unwrap()
}

/// 4 × 4 lattice, open along x, two 2 × 4 domains, Landau gauge `G`.
fn gauged_strip() -> Arc<LatticeGeometry> {
    Arc::new(
        LatticeBuilder::new()
            .lengths(&[4, 4])
            .divisions(&[2, 1])
            .periodic(&[false, true])
            .gauge(vec![vec![0.0, G], vec![0.0, 0.0]])
            .build()
            .unwrap(),
    )
}

#[test]
fn test_bond_between_two_ghost_nodes_reaches_its_owner() {
    let geometry = common::square(&[8, 8], &[2, 2]);
    let motif = offset_pair_motif(1.0);
    let realized = common::realize(&geometry, &motif, &[], 13);
    for r in &realized {
        r.result.as_ref().unwrap();
    }

    // Hoppings domain `d` received for the bond `to ← from`, in global cells.
    let received = |domain: usize, to: (usize, usize), from: (usize, usize)| -> Vec<Complex64> {
        let engine = &realized[domain].engine;
        let indexer = engine.indexer();
        let source = owner_local(indexer, to.0, to.1);
        engine
            .border()
            .bonds
            .iter()
            .filter(|b| b.source == source && indexer.global_index(b.target) == Some(from.0 + 8 * from.1))
            .map(|b| b.hopping)
            .collect()
    };

    // The copy anchored at (3, 3) in domain 0 puts node 1 on (4, 3), owned by
    // domain 1, and node 2 on (4, 4), owned by domain 3. Both bonds have both
    // endpoints in domain 0's ghost margin.
    let into_node1 = received(1, (4, 3), (4, 4));
    assert_eq!(into_node1.len(), 1);
    assert!(common::close(into_node1[0], T, 1e-14));

    let into_node2 = received(3, (4, 4), (4, 3));
    assert_eq!(into_node2.len(), 1);
    assert!(common::close(into_node2[0], T.conj(), 1e-14));

    // Every domain's operator equals the dense one.
    let hams = common::defect_hamiltonians(&geometry, &[motif], 13);
    let engines: Vec<_> = hams.iter().flat_map(|h| h.engines()).collect();
    let x = common::global_vector(geometry.global_states());
    let expected = common::dense_apply(&common::dense_defects(&engines), &x);
    for ham in &hams {
        let indexer = ham.indexer();
        let inp = common::scatter(indexer, &x);
        let mut out = vec![Complex64::new(0.0, 0.0); inp.len()];
        ham.multiply::<0>(&mut out, &inp);
        for cell in 0..indexer.interior_cells() {
            let local = indexer.interior_cell(cell);
            let global = indexer.global_index(local).unwrap();
            assert!(
                common::close(out[local], expected[global], 1e-12),
                "domain {} cell {global}",
                indexer.domain_id()
            );
        }
    }
}

#[test]
fn test_single_instance_across_the_seam() {
    // One anchor per domain (0.125 · 8 cells), always the first interior cell.
    let geometry = gauged_strip();
    let realized = common::realize_with(&geometry, &back_diagonal_dimer(0.125), &[], |_| StuckRng);
    for r in &realized {
        r.result.as_ref().unwrap();
        assert_eq!(r.engine.anchor_count(), 1);
        assert_eq!(r.engine.anchors(0), &[r.engine.indexer().interior_cell(0)]);
    }

    // Domain 0's copy at (0, 0) runs off the open edge. Domain 1's copy at
    // (2, 0) puts node 1 on (1, 1), inside domain 0.
    assert!(realized[1].engine.border().is_empty());
    let receiver = &realized[0].engine;
    let border = receiver.border();
    assert_eq!(border.bonds.len(), 1);
    assert!(border.onsite.is_empty());

    let bond = &border.bonds[0];
    let indexer = receiver.indexer();
    assert_eq!(bond.source, owner_local(indexer, 1, 1));
    assert!(!indexer.is_interior(bond.target));
    assert_eq!(indexer.global_index(bond.target), Some(2));

    // Margin hopping carries ½ d₀ G d₁ with d = (1, 1) − (2, 0).
    let margin = T * Complex64::cis(-0.5 * G);
    assert!(common::close(bond.hopping, margin, 1e-14));
    assert!(common::close(
        bond.hopping,
        realized[1].engine.phase_table().get(0, NGHOSTS - 1),
        1e-14
    ));

    // (t₀ − s₀) · G · s₁ = (2 − 1) · G · 1
    let source = indexer.global_site(bond.source);
    let target = indexer.global_site(bond.target);
    assert!((border_phase(&geometry, &source[..2], &target[..2]) - G).abs() < 1e-14);

    let x = common::global_vector(16);
    let inp = common::scatter(indexer, &x);
    let mut out = vec![Complex64::new(0.0, 0.0); inp.len()];
    receiver.multiply_broken_defect::<0, false>(&mut out, &inp, 0);
    assert!(common::close(out[bond.source], margin * Complex64::cis(G) * x[2], 1e-12));
    assert_eq!(out.iter().filter(|v| v.norm() > 0.0).count(), 1);
}

#[test]
fn test_single_instance_vanishes_with_a_vacant_endpoint() {
    let geometry = gauged_strip();
    let motif = back_diagonal_dimer(0.125);
    let receiver = LatticeIndexer::new(geometry.clone(), 0).unwrap();
    let sender = LatticeIndexer::new(geometry.clone(), 1).unwrap();

    // Receiving end (1, 1) vacant.
    let vacancies = vec![vec![owner_local(&receiver, 1, 1)]];
    let realized = common::realize_with(&geometry, &motif, &vacancies, |_| StuckRng);
    assert_eq!(realized[1].engine.anchor_count(), 1);
    assert!(realized[0].engine.border().is_empty());

    // Sending end (2, 0), the anchor itself, vacant.
    let vacancies = vec![Vec::new(), vec![owner_local(&sender, 2, 0)]];
    let realized = common::realize_with(&geometry, &motif, &vacancies, |_| StuckRng);
    assert_eq!(realized[1].engine.anchor_count(), 1);
    assert!(realized[0].engine.border().is_empty());
}
