//! Tests for per-domain index conversion.

#[path = "../common/mod.rs"]
mod common;

use chebtile_core::lattice::{LatticeBuilder, LatticeIndexer, NGHOSTS};
use chebtile_core::LatticeError;

#[test]
fn test_interior_cells_map_to_owned_globals() {
    let geometry = common::square(&[16, 8], &[2, 2]);
    for indexer in LatticeIndexer::all(&geometry) {
        for cell in 0..indexer.interior_cells() {
            let local = indexer.interior_cell(cell);
            let global = indexer.global_index(local).expect("interior cells are inside the lattice");
            assert_eq!(indexer.owner_of_global(global), indexer.domain_id());
            assert_eq!(indexer.local_of_global(global), local);
        }
    }
}

#[test]
fn test_ghosts_are_owned_by_neighbors() {
    let geometry = common::square(&[8, 8], &[2, 1]);
    let indexer = LatticeIndexer::new(geometry.clone(), 0).unwrap();

    // Along x both sides of domain 0 belong to domain 1 (periodic).
    let owners: Vec<usize> = indexer.ghost_sources().iter().map(|g| g.owner).collect();
    assert!(owners.contains(&1));
    assert!(owners.contains(&0), "ghosts along y wrap onto domain 0 itself");
    assert!(indexer.open_ghosts().is_empty());

    let layout = indexer.local_layout();
    let ghost_count = layout.size() - indexer.interior_cells();
    assert_eq!(indexer.ghost_sources().len(), ghost_count);
}

#[test]
fn test_open_boundary_ghosts_have_no_source() {
    let geometry = common::open_x(&[8, 8], &[2, 1]);
    let left = LatticeIndexer::new(geometry.clone(), 0).unwrap();
    let right = LatticeIndexer::new(geometry, 1).unwrap();

    // Each domain has one open side of NGHOSTS columns, full height.
    let column = left.local_layout().dims()[1];
    assert_eq!(left.open_ghosts().len(), NGHOSTS * column);
    assert_eq!(right.open_ghosts().len(), NGHOSTS * column);
    for &ghost in left.open_ghosts() {
        assert_eq!(left.global_index(ghost), None);
        assert!(left.global_site(ghost)[0] < 0);
    }
}

#[test]
fn test_global_site_is_unwrapped() {
    let geometry = common::square(&[8, 8], &[1, 1]);
    let indexer = LatticeIndexer::new(geometry, 0).unwrap();
    // Local (0, 0) sits NGHOSTS cells before the first interior cell.
    let site = indexer.global_site(0);
    assert_eq!(site[0], -(NGHOSTS as isize));
    assert_eq!(site[1], -(NGHOSTS as isize));
    // Wrapped, it is cell (6, 6).
    assert_eq!(indexer.global_index(0), Some(6 + 8 * 6));
}

#[test]
fn test_tiles_follow_sweep_order() {
    let geometry = LatticeBuilder::new().lengths(&[8, 8]).tile_edge(4).build().unwrap();
    let indexer = LatticeIndexer::new(std::sync::Arc::new(geometry), 0).unwrap();
    assert_eq!(indexer.tile_count(), 4);

    // Tile ids grow with axis 0 fastest.
    let first = indexer.interior_cell(0);
    let right = indexer.interior_cell(4);
    let above = indexer.interior_cell(4 * 8);
    assert_eq!(indexer.tile_of(first), 0);
    assert_eq!(indexer.tile_of(right), 1);
    assert_eq!(indexer.tile_of(above), 2);
    for tile in 0..indexer.tile_count() {
        assert_eq!(indexer.tile_sites(tile).len(), 16);
    }
}

#[test]
fn test_orbitals_are_part_of_tiles() {
    let geometry = LatticeBuilder::new().lengths(&[4, 4]).orbitals(2).build().unwrap();
    let indexer = LatticeIndexer::new(std::sync::Arc::new(geometry), 0).unwrap();
    let total: usize = (0..indexer.tile_count()).map(|t| indexer.tile_sites(t).len()).sum();
    assert_eq!(total, 32);
}

#[test]
fn test_builder_rejects_thin_domains() {
    let err = LatticeBuilder::new().lengths(&[4, 4]).divisions(&[4, 1]).build().unwrap_err();
    assert!(matches!(err, LatticeError::DomainTooSmall { axis: 0, interior: 1, .. }));
}

#[test]
fn test_builder_rejects_bad_tile_edge() {
    let err = LatticeBuilder::new().lengths(&[12, 12]).tile_edge(8).build().unwrap_err();
    assert!(matches!(err, LatticeError::Tiles { tile_edge: 8, .. }));
}

#[test]
fn test_config_deserializes_with_defaults() {
    let json = r#"{ "lengths": [8, 4], "divisions": [2, 1] }"#;
    let config: chebtile_core::LatticeConfig = serde_json::from_str(json).unwrap();
    let geometry = config.build().unwrap();
    assert_eq!(geometry.orbitals(), 1);
    assert_eq!(geometry.domain_count(), 2);
    assert!(geometry.is_periodic(0));
}
