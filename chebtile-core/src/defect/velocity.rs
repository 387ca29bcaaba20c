//! Generalized velocity weights of defect bonds.
//!
//! The generalized velocity along axes `c_1 … c_k` multiplies every hopping
//! by `Π_j dr[c_j]`, where `dr` is the bond vector including the orbital
//! offsets. Each requested operator lives in its own slot.

use super::engine::DisorderPlacementEngine;
use super::phase::bond_vector;

/// Per-slot weights of the local motif bonds and of the received border bonds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VelocityTable {
    local: Vec<Vec<f64>>,
    border: Vec<Vec<f64>>,
}

impl VelocityTable {
    /// Number of slots built so far.
    pub fn slots(&self) -> usize {
        self.local.len()
    }

    /// Weights of the motif bonds in `slot`.
    #[inline]
    pub fn local(&self, slot: usize) -> &[f64] {
        &self.local[slot]
    }

    /// Weights of the border bonds in `slot`.
    #[inline]
    pub fn border(&self, slot: usize) -> &[f64] {
        &self.border[slot]
    }
}

fn weight(dr: &nalgebra::DVector<f64>, components: &[usize]) -> f64 {
    components.iter().map(|&c| dr[c]).product()
}

impl DisorderPlacementEngine {
    /// Builds the velocity weights along `components` into `slot`.
    ///
    /// Motif bonds are measured at the domain center. Border bonds use their
    /// own endpoints, so this must run after every
    /// [`generate_disorder`](Self::generate_disorder). Building an existing
    /// slot again overwrites it.
    ///
    /// # Panics
    ///
    /// Panics if `slot` skips past the next free slot, or if a component is
    /// not an axis of the lattice.
    pub fn build_velocity(&mut self, components: &[usize], slot: usize) {
        let slots = self.velocity.slots();
        assert!(slot <= slots, "velocity slot {slot} requested, next free slot is {slots}");

        let geometry = self.indexer.geometry();
        assert!(
            components.iter().all(|&c| c < geometry.dim()),
            "velocity components {components:?} outside a {}-dimensional lattice",
            geometry.dim()
        );
        let layout = self.indexer.local_layout();
        let center = self.indexer.center() as isize;

        let local = self
            .motif
            .bonds()
            .iter()
            .map(|bond| {
                let head = layout.site((center + self.offsets[bond.from]) as usize);
                let tail = layout.site((center + self.offsets[bond.to]) as usize);
                weight(&bond_vector(geometry, &head, &tail), components)
            })
            .collect();

        let border = self
            .border
            .bonds
            .iter()
            .map(|bond| {
                let head = layout.site(bond.target);
                let tail = layout.site(bond.source);
                weight(&bond_vector(geometry, &head, &tail), components)
            })
            .collect();

        if slot == slots {
            self.velocity.local.push(local);
            self.velocity.border.push(border);
        } else {
            self.velocity.local[slot] = local;
            self.velocity.border[slot] = border;
        }
    }
}
