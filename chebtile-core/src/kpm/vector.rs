//! Chebyshev state vectors of one domain.

use std::f64::consts::TAU;

use num_complex::Complex64;
use rand::Rng;

use super::halo::HaloExchange;
use crate::lattice::LatticeIndexer;
use crate::sync::DomainContext;

/// A set of ghost-inclusive buffers ("slots") with a current-slot index.
///
/// The Chebyshev recursion keeps two slots: the step writes `T(n+1)` over
/// `T(n-1)` and advances the index.
#[derive(Debug, Clone, PartialEq)]
pub struct KpmVector {
    slots: Vec<Vec<Complex64>>,
    index: usize,
}

impl KpmVector {
    /// `memory` zeroed slots of `len` entries each.
    ///
    /// # Panics
    ///
    /// Panics if `memory` is zero.
    pub fn new(memory: usize, len: usize) -> Self {
        assert!(memory > 0, "a KPM vector needs at least one slot");
        Self {
            slots: vec![vec![Complex64::new(0.0, 0.0); len]; memory],
            index: 0,
        }
    }

    /// Number of slots.
    pub fn memory(&self) -> usize {
        self.slots.len()
    }

    /// Length of every slot.
    pub fn len(&self) -> usize {
        self.slots[0].len()
    }

    /// True for zero-length slots.
    pub fn is_empty(&self) -> bool {
        self.slots[0].is_empty()
    }

    /// Index of the current slot.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Makes `index` the current slot.
    #[inline]
    pub fn set_index(&mut self, index: usize) {
        debug_assert!(index < self.slots.len());
        self.index = index;
    }

    /// Moves to the next slot, wrapping around.
    #[inline]
    pub fn advance(&mut self) {
        self.index = (self.index + 1) % self.slots.len();
    }

    /// The current slot.
    #[inline]
    pub fn current(&self) -> &[Complex64] {
        &self.slots[self.index]
    }

    /// The current slot, mutably.
    #[inline]
    pub fn current_mut(&mut self) -> &mut [Complex64] {
        &mut self.slots[self.index]
    }

    /// Slot `slot`.
    #[inline]
    pub fn slot(&self, slot: usize) -> &[Complex64] {
        &self.slots[slot]
    }

    /// Slot `slot`, mutably.
    #[inline]
    pub fn slot_mut(&mut self, slot: usize) -> &mut [Complex64] {
        &mut self.slots[slot]
    }

    /// The next slot (mutably) and the current one.
    ///
    /// # Panics
    ///
    /// Panics with a single slot.
    pub fn next_and_current(&mut self) -> (&mut [Complex64], &[Complex64]) {
        let next = (self.index + 1) % self.slots.len();
        assert_ne!(next, self.index, "recursion needs two slots");
        if next < self.index {
            let (low, high) = self.slots.split_at_mut(self.index);
            (low[next].as_mut_slice(), high[0].as_slice())
        } else {
            let (low, high) = self.slots.split_at_mut(next);
            (high[0].as_mut_slice(), low[self.index].as_slice())
        }
    }

    /// Zeroes the ghost margin of slot `slot`.
    pub fn empty_ghosts(&mut self, slot: usize, indexer: &LatticeIndexer) {
        let buffer = &mut self.slots[slot];
        for ghost in indexer.ghost_sources() {
            buffer[ghost.local] = Complex64::new(0.0, 0.0);
        }
        for &ghost in indexer.open_ghosts() {
            buffer[ghost] = Complex64::new(0.0, 0.0);
        }
    }

    /// Fills slot 0 with a random-phase vector and makes it current.
    ///
    /// Interior sites get `exp(2πiθ) / √(global states)` with θ uniform in
    /// `[0, 1)`; ghosts are zero until the next exchange.
    pub fn initiate_random<R: Rng + ?Sized>(&mut self, rng: &mut R, indexer: &LatticeIndexer) {
        let norm = 1.0 / (indexer.geometry().global_states() as f64).sqrt();
        self.index = 0;
        let buffer = &mut self.slots[0];
        buffer.fill(Complex64::new(0.0, 0.0));
        for tile in 0..indexer.tile_count() {
            for &site in indexer.tile_sites(tile) {
                buffer[site] = Complex64::from_polar(norm, TAU * rng.random::<f64>());
            }
        }
    }

    /// Refreshes the ghost margin of the current slot.
    pub fn exchange_boundaries(&mut self, ctx: &DomainContext<'_>, halo: &HaloExchange, indexer: &LatticeIndexer) {
        halo.exchange(ctx, indexer, &mut self.slots[self.index]);
    }
}
