//! Random placement of defect motifs on one domain.
//!
//! # Realization protocol
//!
//! [`DisorderPlacementEngine::generate_disorder`] is a collective call: every
//! domain worker calls it with the same shared [`ConflictTable`], and the
//! phases line up across workers.
//!
//! ```text
//! 1. clear          local lists; master clears the shared table (barrier both sides)
//! 2. place          bounded rejection sampling of anchor cells
//! 3. hand off       ghost-margin nodes and lower-tile nodes → shared table (critical)
//! 4. collect        barrier; each domain takes its own entries (critical); barrier
//! 5. mosaic         nodes reaching into higher tiles clear their tile's init flag
//! 6. sort           anchors ascending per tile
//! ```
//!
//! A worker whose placement fails keeps going through every barrier with an
//! empty anchor set and reports the error at the end, so no peer is left
//! blocked.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use super::conflict::{
    BorderBond, BorderContributions, BorderOnsite, ConflictTable, CrossMosaicFlags, GhostHandoff,
    TileHandoff,
};
use super::motif::DefectMotif;
use super::phase::PhaseTable;
use super::vacancy::VacancyMap;
use super::velocity::VelocityTable;
use crate::error::{MotifError, PlacementError};
use crate::lattice::{LatticeIndexer, NGHOSTS};
use crate::sync::{DomainContext, SharedSection};

/// Rejection-sampling draws allowed per requested anchor.
pub const PLACEMENT_ATTEMPTS_PER_ANCHOR: usize = 64;

/// Lower bound on the rejection-sampling budget.
pub const MIN_PLACEMENT_ATTEMPTS: usize = 1024;

/// Places copies of one [`DefectMotif`] in one domain and applies them.
#[derive(Debug, Clone)]
pub struct DisorderPlacementEngine {
    pub(super) motif: DefectMotif,
    pub(super) indexer: Arc<LatticeIndexer>,
    /// Local layout delta of every motif node from its anchor.
    pub(super) offsets: Vec<isize>,
    pub(super) phase: PhaseTable,
    /// Anchor cells per tile, sorted after placement.
    pub(super) anchors: Vec<Vec<usize>>,
    taken: HashSet<usize>,
    pub(super) border: BorderContributions,
    /// Lower-tile writes of this domain's motifs, sorted.
    tile_conflicts: Vec<TileHandoff>,
    pub(super) velocity: VelocityTable,
}

impl DisorderPlacementEngine {
    /// Prepares the engine of one domain: node offsets and the phase table.
    ///
    /// # Errors
    ///
    /// Fails if a node position does not fit the motif basis.
    pub fn new(motif: DefectMotif, indexer: Arc<LatticeIndexer>) -> Result<Self, MotifError> {
        let offsets = motif.node_offsets(indexer.geometry())?;
        let phase = PhaseTable::build(&motif, &offsets, &indexer);
        let tiles = indexer.tile_count();

        debug!(
            domain = indexer.domain_id(),
            nodes = motif.node_count(),
            bonds = motif.bonds().len(),
            onsite = motif.onsite().len(),
            "defect engine ready"
        );

        Ok(Self {
            motif,
            indexer,
            offsets,
            phase,
            anchors: vec![Vec::new(); tiles],
            taken: HashSet::new(),
            border: BorderContributions::default(),
            tile_conflicts: Vec::new(),
            velocity: VelocityTable::default(),
        })
    }

    /// The motif this engine places.
    pub fn motif(&self) -> &DefectMotif {
        &self.motif
    }

    /// Domain index conversion.
    pub fn indexer(&self) -> &LatticeIndexer {
        &self.indexer
    }

    /// Local layout delta of every motif node.
    pub fn offsets(&self) -> &[isize] {
        &self.offsets
    }

    /// Phased hoppings of the motif bonds.
    pub fn phase_table(&self) -> &PhaseTable {
        &self.phase
    }

    /// Anchors of `tile`, ascending.
    pub fn anchors(&self, tile: usize) -> &[usize] {
        &self.anchors[tile]
    }

    /// Total number of placed anchors.
    pub fn anchor_count(&self) -> usize {
        self.taken.len()
    }

    /// Terms received from neighbor domains this realization.
    pub fn border(&self) -> &BorderContributions {
        &self.border
    }

    /// Lower-tile writes of this realization.
    pub fn tile_conflicts(&self) -> &[TileHandoff] {
        &self.tile_conflicts
    }

    /// Velocity weights built so far.
    pub fn velocity(&self) -> &VelocityTable {
        &self.velocity
    }

    /// Number of anchors one realization places in this domain.
    pub fn target_anchors(&self) -> usize {
        (self.motif.concentration() * self.indexer.interior_cells() as f64).round() as usize
    }

    /// Draws a fresh disorder realization.
    ///
    /// Collective: every domain worker must call this with the same `table`.
    /// `mosaic` belongs to this domain and is only ever marked here; resetting
    /// it between realizations is up to the caller, since several engines
    /// share it.
    ///
    /// # Errors
    ///
    /// Returns a [`PlacementError`] when the target anchor count cannot be
    /// reached. The worker still completes the protocol with no anchors.
    pub fn generate_disorder<R: Rng + ?Sized>(
        &mut self,
        ctx: &DomainContext<'_>,
        table: &SharedSection<ConflictTable>,
        vacancies: &VacancyMap,
        mosaic: &mut CrossMosaicFlags,
        rng: &mut R,
    ) -> Result<(), PlacementError> {
        debug!(domain = ctx.id(), "entered generate_disorder");

        for tile in &mut self.anchors {
            tile.clear();
        }
        self.taken.clear();
        self.border.clear();
        self.tile_conflicts.clear();
        ctx.master(table, ConflictTable::clear);

        let placed = self.place_anchors(rng);
        if placed.is_err() {
            for tile in &mut self.anchors {
                tile.clear();
            }
            self.taken.clear();
        }

        let (tiles, ghosts) = self.collect_handoffs(ctx.id(), vacancies);
        if !tiles.is_empty() || !ghosts.is_empty() {
            ctx.critical(table, |t| t.extend(&tiles, &ghosts));
        }

        ctx.barrier();
        let dropped = ctx.critical(table, |t| self.receive_handoffs(t, ctx.id(), vacancies));
        ctx.barrier();
        self.border.canonicalize();
        self.tile_conflicts.sort_by_key(|h| (h.tile, h.site));
        if dropped > 0 {
            debug!(domain = ctx.id(), dropped, "hand-offs onto vacancies dropped");
        }

        self.mark_crossed_tiles(mosaic);

        for tile in &mut self.anchors {
            tile.sort_unstable();
        }

        debug!(
            domain = ctx.id(),
            anchors = self.anchor_count(),
            border_bonds = self.border.bonds.len(),
            border_onsite = self.border.onsite.len(),
            "left generate_disorder"
        );
        placed
    }

    /// Step 2: rejection sampling, bounded.
    fn place_anchors<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), PlacementError> {
        let cells = self.indexer.interior_cells();
        let target = self.target_anchors();
        if target > cells {
            return Err(PlacementError::TooManyAnchors {
                requested: target,
                available: cells,
            });
        }

        let budget = (target * PLACEMENT_ATTEMPTS_PER_ANCHOR).max(MIN_PLACEMENT_ATTEMPTS);
        let mut attempts = 0usize;
        while self.taken.len() < target {
            if attempts == budget {
                warn!(
                    domain = self.indexer.domain_id(),
                    placed = self.taken.len(),
                    target,
                    "placement attempt budget exhausted"
                );
                return Err(PlacementError::AttemptsExhausted {
                    placed: self.taken.len(),
                    requested: target,
                    attempts,
                });
            }
            attempts += 1;

            let anchor = self.indexer.interior_cell(rng.random_range(0..cells));
            if self.taken.insert(anchor) {
                self.anchors[self.indexer.tile_of(anchor)].push(anchor);
            }
        }
        Ok(())
    }

    #[inline]
    fn node_site(&self, anchor: usize, node: usize) -> usize {
        let site = anchor as isize + self.offsets[node];
        debug_assert!(
            site >= 0 && (site as usize) < self.indexer.local_layout().size(),
            "motif node {node} of anchor {anchor} leaves the domain buffer"
        );
        site as usize
    }

    /// Step 3: terms this domain cannot apply itself.
    fn collect_handoffs(&self, domain: usize, vacancies: &VacancyMap) -> (Vec<TileHandoff>, Vec<GhostHandoff>) {
        let mut tiles = Vec::new();
        let mut ghosts = Vec::new();

        for (tile, anchors) in self.anchors.iter().enumerate() {
            for &anchor in anchors {
                for node in 0..self.offsets.len() {
                    let site = self.node_site(anchor, node);

                    if self.indexer.is_interior(site) {
                        let node_tile = self.indexer.tile_of(site);
                        if node_tile < tile {
                            tiles.push(TileHandoff {
                                domain,
                                tile: node_tile,
                                from_tile: tile,
                                site,
                            });
                        }
                        continue;
                    }

                    // Past an open edge nothing receives the term.
                    let Some(global) = self.indexer.global_index(site) else {
                        continue;
                    };
                    let owner = self.indexer.owner_of_global(global);

                    for (k, bond) in self.motif.bonds().iter().enumerate() {
                        if bond.to != node {
                            continue;
                        }
                        let from = self.node_site(anchor, bond.from);
                        if self.indexer.is_interior(from) && vacancies.contains(from) {
                            continue;
                        }
                        ghosts.push(GhostHandoff::Bond {
                            owner,
                            global,
                            delta: self.offsets[bond.from] - self.offsets[bond.to],
                            hopping: self.phase.get(k, NGHOSTS - 1),
                        });
                    }
                    for term in self.motif.onsite().iter().filter(|t| t.node == node) {
                        ghosts.push(GhostHandoff::Onsite {
                            owner,
                            global,
                            value: term.value,
                        });
                    }
                }
            }
        }
        (tiles, ghosts)
    }

    /// Step 4: takes this domain's entries from the shared table.
    ///
    /// Returns the number of ghost hand-offs dropped because their receiving
    /// site is a vacancy here.
    fn receive_handoffs(&mut self, table: &ConflictTable, domain: usize, vacancies: &VacancyMap) -> usize {
        let mut dropped = 0;
        for handoff in table.ghosts_for(domain) {
            match *handoff {
                GhostHandoff::Bond {
                    global,
                    delta,
                    hopping,
                    ..
                } => {
                    let source = self.indexer.local_of_global(global);
                    if vacancies.contains(source) {
                        dropped += 1;
                        continue;
                    }
                    self.border.bonds.push(BorderBond {
                        source,
                        target: (source as isize + delta) as usize,
                        hopping,
                    });
                }
                GhostHandoff::Onsite { global, value, .. } => {
                    let site = self.indexer.local_of_global(global);
                    if vacancies.contains(site) {
                        dropped += 1;
                        continue;
                    }
                    self.border.onsite.push(BorderOnsite { site, value });
                }
            }
        }
        self.tile_conflicts.extend(table.tiles_for(domain).copied());
        dropped
    }

    /// Step 5: tiles reached from a lower tile must not be re-zeroed.
    fn mark_crossed_tiles(&self, mosaic: &mut CrossMosaicFlags) {
        for (tile, anchors) in self.anchors.iter().enumerate() {
            for &anchor in anchors {
                for node in 0..self.offsets.len() {
                    let site = self.node_site(anchor, node);
                    if !self.indexer.is_interior(site) {
                        continue;
                    }
                    let node_tile = self.indexer.tile_of(site);
                    if node_tile > tile {
                        mosaic.mark_crossed(node_tile);
                    }
                }
            }
        }
    }
}
