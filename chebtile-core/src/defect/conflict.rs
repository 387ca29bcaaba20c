//! Cross-domain and cross-tile reconciliation structures.
//!
//! A placed motif can spill outside the tile or domain that anchors it:
//!
//! ```text
//!   domain 0 interior          │ domain 0 ghosts = domain 1 interior
//!                              │
//!        tile 0     tile 1     │
//!      ┌────────┬────────┐     │
//!      │  a──●  │        │     │     a  anchor (node 0)
//!      │        │  a──●──┼──●  │     ●  other motif nodes
//!      └────────┴────────┘     │
//! ```
//!
//! - A node in this domain's interior but in a lower tile becomes a
//!   [`TileHandoff`]: that tile was swept before the anchor's tile.
//! - A node in the ghost margin belongs to a neighbor. Its bonds and onsite
//!   terms become [`GhostHandoff`]s, collected by the owning domain into its
//!   [`BorderContributions`].
//!
//! Both kinds of hand-off live in the shared [`ConflictTable`], which is
//! cleared and refilled every disorder realization.

use num_complex::Complex64;

/// A motif node written into an already-swept lower tile of the same domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHandoff {
    /// Domain where both tiles live.
    pub domain: usize,
    /// The lower tile receiving the write.
    pub tile: usize,
    /// The tile holding the anchor (always greater than `tile`).
    pub from_tile: usize,
    /// Local index of the node.
    pub site: usize,
}

/// A term destined to the domain owning a ghost node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GhostHandoff {
    /// `H[site, site + delta] += hopping`, `site` in the owner's frame.
    Bond {
        /// Owning domain.
        owner: usize,
        /// Global index of the receiving node.
        global: usize,
        /// Linear layout delta from the receiving node to the source node.
        delta: isize,
        /// Hopping amplitude.
        hopping: Complex64,
    },
    /// `H[site, site] += value`.
    Onsite {
        /// Owning domain.
        owner: usize,
        /// Global index of the node.
        global: usize,
        /// Onsite energy.
        value: Complex64,
    },
}

impl GhostHandoff {
    /// Domain the hand-off is destined to.
    pub fn owner(&self) -> usize {
        match *self {
            GhostHandoff::Bond { owner, .. } | GhostHandoff::Onsite { owner, .. } => owner,
        }
    }
}

/// Shared scratch space for one realization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConflictTable {
    tiles: Vec<TileHandoff>,
    ghosts: Vec<GhostHandoff>,
}

impl ConflictTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.tiles.clear();
        self.ghosts.clear();
    }

    /// True if no hand-off is pending.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty() && self.ghosts.is_empty()
    }

    /// Records a write into a lower tile.
    ///
    /// # Panics
    ///
    /// In debug builds, panics unless `from_tile > tile`: hand-offs only flow
    /// down the sweep order.
    pub fn push_tile(&mut self, handoff: TileHandoff) {
        debug_assert!(handoff.from_tile > handoff.tile, "tile hand-off must flow to a lower tile");
        self.tiles.push(handoff);
    }

    /// Records a term for a neighbor domain.
    pub fn push_ghost(&mut self, handoff: GhostHandoff) {
        self.ghosts.push(handoff);
    }

    /// Appends a batch of entries.
    pub fn extend(&mut self, tiles: &[TileHandoff], ghosts: &[GhostHandoff]) {
        for &handoff in tiles {
            self.push_tile(handoff);
        }
        self.ghosts.extend_from_slice(ghosts);
    }

    /// Tile hand-offs recorded by `domain`.
    pub fn tiles_for(&self, domain: usize) -> impl Iterator<Item = &TileHandoff> {
        self.tiles.iter().filter(move |h| h.domain == domain)
    }

    /// Ghost hand-offs destined to `domain`.
    pub fn ghosts_for(&self, domain: usize) -> impl Iterator<Item = &GhostHandoff> {
        self.ghosts.iter().filter(move |h| h.owner() == domain)
    }

    /// Every tile hand-off.
    pub fn tile_handoffs(&self) -> &[TileHandoff] {
        &self.tiles
    }

    /// Every ghost hand-off.
    pub fn ghost_handoffs(&self) -> &[GhostHandoff] {
        &self.ghosts
    }
}

/// A bond received from a neighbor: `H[source, target] += hopping`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderBond {
    /// Local interior index receiving the amplitude.
    pub source: usize,
    /// Local index the amplitude is read from (may be a ghost).
    pub target: usize,
    /// Hopping with the margin phase; the boundary phase is added on use.
    pub hopping: Complex64,
}

/// An onsite term received from a neighbor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderOnsite {
    /// Local interior index.
    pub site: usize,
    /// Onsite energy.
    pub value: Complex64,
}

/// Terms of motifs anchored in neighboring domains that reach into this one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BorderContributions {
    /// Received bonds, sorted.
    pub bonds: Vec<BorderBond>,
    /// Received onsite terms, sorted.
    pub onsite: Vec<BorderOnsite>,
}

impl BorderContributions {
    /// Drops every entry.
    pub fn clear(&mut self) {
        self.bonds.clear();
        self.onsite.clear();
    }

    /// True if nothing was received.
    pub fn is_empty(&self) -> bool {
        self.bonds.is_empty() && self.onsite.is_empty()
    }

    /// Puts entries in a canonical order.
    ///
    /// Domains enter the collecting critical section in arbitrary order; the
    /// sort makes the result independent of it.
    pub fn canonicalize(&mut self) {
        self.bonds.sort_by(|a, b| {
            (a.source, a.target)
                .cmp(&(b.source, b.target))
                .then(a.hopping.re.total_cmp(&b.hopping.re))
                .then(a.hopping.im.total_cmp(&b.hopping.im))
        });
        self.onsite.sort_by(|a, b| {
            a.site
                .cmp(&b.site)
                .then(a.value.re.total_cmp(&b.value.re))
                .then(a.value.im.total_cmp(&b.value.im))
        });
    }
}

/// Tiles that must not be zero-initialized during the sweep.
///
/// A defect anchored in tile `i` may write into a higher tile `j > i`. If `j`
/// were initialized when the sweep reaches it, that write would be lost, so
/// `j` is initialized once before the sweep instead and skipped afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossMosaicFlags {
    may_initialize: Vec<bool>,
    crossed: Vec<usize>,
}

impl CrossMosaicFlags {
    /// Flags for `tiles` tiles, all initializable.
    pub fn new(tiles: usize) -> Self {
        Self {
            may_initialize: vec![true; tiles],
            crossed: Vec::new(),
        }
    }

    /// Marks every tile initializable again.
    pub fn reset(&mut self) {
        for tile in self.crossed.drain(..) {
            self.may_initialize[tile] = true;
        }
    }

    /// True if the sweep may zero-initialize `tile`.
    #[inline]
    pub fn may_initialize(&self, tile: usize) -> bool {
        self.may_initialize[tile]
    }

    /// Records that a defect writes into `tile` from a lower tile.
    ///
    /// Returns `true` the first time a tile is marked.
    pub fn mark_crossed(&mut self, tile: usize) -> bool {
        if self.may_initialize[tile] {
            self.may_initialize[tile] = false;
            self.crossed.push(tile);
            true
        } else {
            false
        }
    }

    /// Tiles marked this realization, in marking order.
    pub fn crossed(&self) -> &[usize] {
        &self.crossed
    }
}
