//! The Hamiltonian of one domain: pristine part plus placed defects.
//!
//! # Tile sweep
//!
//! A multiply walks the tiles in order. Each tile is initialized, receives
//! the pristine terms, then the defects anchored in it:
//!
//! ```text
//! for tile in 0..tiles:
//!     init(tile)            MULT = 0: out = 0      MULT = 1: out = -out
//!     pristine(tile)        out += (MULT + 1) · H₀ · in
//!     defects(tile)         out += (MULT + 1) · H_d · in
//!     zero vacancies(tile)
//! border terms, then vacancies hit from a higher tile
//! ```
//!
//! A defect anchored in tile `i` can write into tile `j > i` before `j` is
//! swept. Such tiles are listed in [`CrossMosaicFlags`]; they are initialized
//! once before the sweep and skipped by it, so the early write survives.

use std::sync::Arc;

use num_complex::Complex64;
use rand::Rng;
use tracing::debug;

use super::halo::HaloExchange;
use super::vector::KpmVector;
use crate::defect::{ConflictTable, CrossMosaicFlags, DefectMotif, DisorderPlacementEngine, VacancyMap};
use crate::error::{MotifError, PlacementError};
use crate::lattice::LatticeIndexer;
use crate::sync::{DomainContext, SharedSection};

/// The disorder-free part of the Hamiltonian.
///
/// Both methods accumulate into `out` for the sites of one tile and may read
/// `inp` anywhere in the ghost-inclusive buffer.
pub trait PristineHamiltonian: Send {
    /// `out[s] += coefficient · (H₀ · inp)[s]` for every `s` in `sites`.
    fn multiply_tile(&self, sites: &[usize], coefficient: f64, out: &mut [Complex64], inp: &[Complex64]);

    /// `out[s] += (V₀ · inp)[s]` with the velocity built into `slot`.
    fn velocity_tile(&self, sites: &[usize], slot: usize, out: &mut [Complex64], inp: &[Complex64]);

    /// Prepares the velocity along `components` in `slot`.
    fn build_velocity(&mut self, _components: &[usize], _slot: usize) {}
}

/// A pristine Hamiltonian that is identically zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZeroPristine;

impl PristineHamiltonian for ZeroPristine {
    fn multiply_tile(&self, _: &[usize], _: f64, _: &mut [Complex64], _: &[Complex64]) {}

    fn velocity_tile(&self, _: &[usize], _: usize, _: &mut [Complex64], _: &[Complex64]) {}
}

/// Pristine operator, defect engines and vacancies of one domain.
#[derive(Debug)]
pub struct DisorderedHamiltonian<P> {
    indexer: Arc<LatticeIndexer>,
    pristine: P,
    engines: Vec<DisorderPlacementEngine>,
    vacancies: VacancyMap,
    mosaic: CrossMosaicFlags,
}

impl<P: PristineHamiltonian> DisorderedHamiltonian<P> {
    /// One placement engine per motif.
    ///
    /// # Errors
    ///
    /// Fails if a motif does not fit the lattice.
    pub fn new(
        indexer: Arc<LatticeIndexer>,
        pristine: P,
        motifs: &[DefectMotif],
        vacancies: VacancyMap,
    ) -> Result<Self, MotifError> {
        let engines = motifs
            .iter()
            .map(|motif| DisorderPlacementEngine::new(motif.clone(), Arc::clone(&indexer)))
            .collect::<Result<Vec<_>, _>>()?;
        let mosaic = CrossMosaicFlags::new(indexer.tile_count());

        Ok(Self {
            indexer,
            pristine,
            engines,
            vacancies,
            mosaic,
        })
    }

    /// Domain index conversion.
    pub fn indexer(&self) -> &LatticeIndexer {
        &self.indexer
    }

    /// Placement engines, in motif order.
    pub fn engines(&self) -> &[DisorderPlacementEngine] {
        &self.engines
    }

    /// Vacant sites of the domain.
    pub fn vacancies(&self) -> &VacancyMap {
        &self.vacancies
    }

    /// Tiles kept out of the sweep initialization this realization.
    pub fn mosaic(&self) -> &CrossMosaicFlags {
        &self.mosaic
    }

    /// Draws a new realization for every motif.
    ///
    /// Collective. Every engine runs its full protocol even after an earlier
    /// one failed; the first error is returned.
    pub fn generate_disorder<R: Rng + ?Sized>(
        &mut self,
        ctx: &DomainContext<'_>,
        table: &SharedSection<ConflictTable>,
        rng: &mut R,
    ) -> Result<(), PlacementError> {
        self.mosaic.reset();
        let mut first = Ok(());
        for engine in &mut self.engines {
            let result = engine.generate_disorder(ctx, table, &self.vacancies, &mut self.mosaic, rng);
            if first.is_ok() {
                first = result;
            }
        }
        debug!(domain = ctx.id(), crossed = self.mosaic.crossed().len(), "disorder realized");
        first
    }

    /// Builds the velocity along `components` into `slot`, pristine and defects.
    pub fn build_velocity(&mut self, components: &[usize], slot: usize) {
        self.pristine.build_velocity(components, slot);
        for engine in &mut self.engines {
            engine.build_velocity(components, slot);
        }
    }

    #[inline]
    fn initialize<const MULT: usize>(sites: &[usize], out: &mut [Complex64]) {
        for &site in sites {
            out[site] = if MULT == 0 { Complex64::new(0.0, 0.0) } else { -out[site] };
        }
    }

    /// `out = H · inp` (`MULT = 0`) or `out = 2 H · inp − out` (`MULT = 1`).
    ///
    /// Only the interior of `out` is meaningful afterwards.
    pub fn multiply<const MULT: usize>(&self, out: &mut [Complex64], inp: &[Complex64]) {
        const { assert!(MULT < 2, "the recursion only uses MULT = 0 or 1") };
        let coefficient = (MULT + 1) as f64;

        for &tile in self.mosaic.crossed() {
            Self::initialize::<MULT>(self.indexer.tile_sites(tile), out);
        }

        for tile in 0..self.indexer.tile_count() {
            let sites = self.indexer.tile_sites(tile);
            if self.mosaic.may_initialize(tile) {
                Self::initialize::<MULT>(sites, out);
            }
            self.pristine.multiply_tile(sites, coefficient, out, inp);
            for engine in &self.engines {
                engine.multiply_defect::<MULT, false>(tile, out, inp, 0);
            }
            self.vacancies.zero_tile(tile, out);
        }

        for engine in &self.engines {
            engine.multiply_broken_defect::<MULT, false>(out, inp, 0);
        }
        self.zero_conflicting_vacancies(out);
    }

    /// `out = V · inp` with the velocity in `slot`.
    pub fn velocity(&self, out: &mut [Complex64], inp: &[Complex64], slot: usize) {
        out.fill(Complex64::new(0.0, 0.0));

        for tile in 0..self.indexer.tile_count() {
            let sites = self.indexer.tile_sites(tile);
            self.pristine.velocity_tile(sites, slot, out, inp);
            for engine in &self.engines {
                engine.multiply_defect::<0, true>(tile, out, inp, slot);
            }
            self.vacancies.zero_tile(tile, out);
        }

        for engine in &self.engines {
            engine.multiply_broken_defect::<0, true>(out, inp, slot);
        }
        self.zero_conflicting_vacancies(out);
    }

    fn zero_conflicting_vacancies(&self, out: &mut [Complex64]) {
        for engine in &self.engines {
            for handoff in engine.tile_conflicts() {
                self.vacancies.zero_if_vacant(handoff.site, out);
            }
        }
    }

    /// One Chebyshev step on `phi`, followed by a ghost refresh.
    ///
    /// `step = 0` computes `T₁ = H T₀`; later steps compute
    /// `T(n+1) = 2 H T(n) − T(n-1)`. Collective through the exchange.
    pub fn cheb_iteration(&self, ctx: &DomainContext<'_>, halo: &HaloExchange, phi: &mut KpmVector, step: usize) {
        let (next, current) = phi.next_and_current();
        if step == 0 {
            self.multiply::<0>(next, current);
        } else {
            self.multiply::<1>(next, current);
        }
        phi.advance();
        phi.exchange_boundaries(ctx, halo, &self.indexer);
    }
}
