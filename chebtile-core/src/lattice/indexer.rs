//! Per-domain index conversion.
//!
//! [`LatticeIndexer`] answers every coordinate question a domain asks:
//!
//! | Question | Method |
//! |----------|--------|
//! | Which local index is the k-th interior cell? | [`interior_cell`](LatticeIndexer::interior_cell) |
//! | Is a local index in the ghost margin? | [`is_interior`](LatticeIndexer::is_interior) |
//! | Which tile holds an interior index? | [`tile_of`](LatticeIndexer::tile_of) |
//! | Where is a local index in the whole lattice? | [`global_site`](LatticeIndexer::global_site), [`global_index`](LatticeIndexer::global_index) |
//! | Which domain owns a global index? | [`owner_of_global`](LatticeIndexer::owner_of_global) |
//!
//! Domains are numbered with axis 0 fastest, as are tiles inside a domain.

use std::sync::Arc;

use super::{LatticeGeometry, Layout, MAX_DIM, NGHOSTS, Site};
use crate::error::LatticeError;

/// A ghost cell and the interior cell of the domain that feeds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GhostSource {
    /// Ghost index in this domain's local layout.
    pub local: usize,
    /// Domain owning the mirrored cell.
    pub owner: usize,
    /// Index of the mirrored cell in the owner's local layout.
    pub owner_local: usize,
}

/// Index conversion for one domain.
#[derive(Debug, Clone)]
pub struct LatticeIndexer {
    geometry: Arc<LatticeGeometry>,
    id: usize,
    /// Global cell coordinate of this domain's first interior cell.
    origin: [isize; MAX_DIM],
    /// Local indices of every site of each tile, tiles in sweep order.
    tiles: Vec<Vec<usize>>,
    /// Tile id per local index, `usize::MAX` in the ghost margin.
    tile_map: Vec<usize>,
    ghosts: Vec<GhostSource>,
    /// Ghost cells beyond an open boundary: always zero.
    open_ghosts: Vec<usize>,
}

impl LatticeIndexer {
    /// Builds the indexer of domain `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::UnknownDomain`] if `id` is out of range.
    pub fn new(geometry: Arc<LatticeGeometry>, id: usize) -> Result<Self, LatticeError> {
        let count = geometry.domain_count();
        if id >= count {
            return Err(LatticeError::UnknownDomain { domain: id, count });
        }
        Ok(Self::for_domain(geometry, id))
    }

    /// Builds one indexer per domain.
    pub fn all(geometry: &Arc<LatticeGeometry>) -> Vec<Self> {
        (0..geometry.domain_count())
            .map(|id| Self::for_domain(Arc::clone(geometry), id))
            .collect()
    }

    /// `id` must be below `geometry.domain_count()`.
    fn for_domain(geometry: Arc<LatticeGeometry>, id: usize) -> Self {
        debug_assert!(id < geometry.domain_count(), "domain {id} out of range");
        let dim = geometry.dim();
        let mut origin = [0isize; MAX_DIM];
        let mut rest = id;
        for axis in 0..dim {
            let d = rest % geometry.divisions()[axis];
            rest /= geometry.divisions()[axis];
            origin[axis] = (d * geometry.interior()[axis]) as isize;
        }

        let mut indexer = Self {
            geometry,
            id,
            origin,
            tiles: Vec::new(),
            tile_map: Vec::new(),
            ghosts: Vec::new(),
            open_ghosts: Vec::new(),
        };
        indexer.build_maps();
        indexer
    }

    fn build_maps(&mut self) {
        let local = self.geometry.local_layout().clone();
        let tile_layout = self.geometry.tile_layout().clone();
        let edge = self.geometry.tile_edge() as isize;

        self.tiles = vec![Vec::new(); self.geometry.tile_count()];
        self.tile_map = vec![usize::MAX; local.size()];

        for index in 0..local.size() {
            let site = local.site(index);
            if self.site_is_interior(&site) {
                let mut tile_site = [0isize; MAX_DIM + 1];
                for axis in 0..local.dim() {
                    tile_site[axis] = (site[axis] - NGHOSTS as isize) / edge;
                }
                let tile = tile_layout.index(&tile_site) as usize;
                self.tiles[tile].push(index);
                self.tile_map[index] = tile;
            } else {
                match self.global_index(index) {
                    Some(global) => {
                        let source = GhostSource {
                            local: index,
                            owner: self.owner_of_global(global),
                            owner_local: self.local_of_global(global),
                        };
                        self.ghosts.push(source);
                    }
                    None => self.open_ghosts.push(index),
                }
            }
        }
    }

    fn site_is_interior(&self, site: &Site) -> bool {
        let dims = self.geometry.local_layout().dims();
        (0..self.geometry.dim()).all(|axis| {
            let x = site[axis];
            x >= NGHOSTS as isize && x < (dims[axis] - NGHOSTS) as isize
        })
    }

    /// Shared lattice geometry.
    pub fn geometry(&self) -> &Arc<LatticeGeometry> {
        &self.geometry
    }

    /// Id of the domain this indexer describes.
    #[inline]
    pub fn domain_id(&self) -> usize {
        self.id
    }

    /// Ghost-inclusive local layout.
    #[inline]
    pub fn local_layout(&self) -> &Layout {
        self.geometry.local_layout()
    }

    /// Interior unit cells of this domain.
    #[inline]
    pub fn interior_cells(&self) -> usize {
        self.geometry.interior_cells()
    }

    /// Local index of interior cell `cell` (orbital 0), cells numbered with
    /// axis 0 fastest.
    pub fn interior_cell(&self, cell: usize) -> usize {
        debug_assert!(cell < self.interior_cells());
        let interior = self.geometry.interior();
        let mut site = [0isize; MAX_DIM + 1];
        let mut rest = cell;
        for (axis, &ld) in interior.iter().enumerate() {
            site[axis] = (rest % ld + NGHOSTS) as isize;
            rest /= ld;
        }
        self.local_layout().index(&site) as usize
    }

    /// True if `local` lies in the interior, false in the ghost margin.
    #[inline]
    pub fn is_interior(&self, local: usize) -> bool {
        self.tile_map[local] != usize::MAX
    }

    /// Tile holding the interior index `local`.
    #[inline]
    pub fn tile_of(&self, local: usize) -> usize {
        debug_assert!(self.is_interior(local), "index {local} is a ghost");
        self.tile_map[local]
    }

    /// Number of tiles in this domain.
    #[inline]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Local indices of every site (all orbitals) of `tile`.
    #[inline]
    pub fn tile_sites(&self, tile: usize) -> &[usize] {
        &self.tiles[tile]
    }

    /// Ghost cells mirrored from a domain, with their source.
    #[inline]
    pub fn ghost_sources(&self) -> &[GhostSource] {
        &self.ghosts
    }

    /// Ghost cells beyond an open boundary.
    #[inline]
    pub fn open_ghosts(&self) -> &[usize] {
        &self.open_ghosts
    }

    /// Unwrapped global coordinates of `local`.
    ///
    /// Ghost cells get coordinates outside `[0, L)` where they cross the
    /// lattice edge, so differences between nearby sites stay small.
    pub fn global_site(&self, local: usize) -> Site {
        let mut site = self.local_layout().site(local);
        for axis in 0..self.geometry.dim() {
            site[axis] += self.origin[axis] - NGHOSTS as isize;
        }
        site
    }

    /// Global linear index of `local`, wrapped across periodic edges.
    ///
    /// Returns `None` for ghost cells beyond an open boundary.
    pub fn global_index(&self, local: usize) -> Option<usize> {
        let mut site = self.global_site(local);
        let lengths = self.geometry.lengths();
        for axis in 0..self.geometry.dim() {
            let length = lengths[axis] as isize;
            if self.geometry.is_periodic(axis) {
                site[axis] = site[axis].rem_euclid(length);
            } else if site[axis] < 0 || site[axis] >= length {
                return None;
            }
        }
        Some(self.geometry.global_layout().index(&site) as usize)
    }

    /// Domain owning the global index `global`.
    pub fn owner_of_global(&self, global: usize) -> usize {
        let site = self.geometry.global_layout().site(global);
        let mut owner = 0usize;
        let mut stride = 1usize;
        for axis in 0..self.geometry.dim() {
            owner += (site[axis] as usize / self.geometry.interior()[axis]) * stride;
            stride *= self.geometry.divisions()[axis];
        }
        owner
    }

    /// Local index of `global` in the layout of the domain that owns it.
    pub fn local_of_global(&self, global: usize) -> usize {
        let mut site = self.geometry.global_layout().site(global);
        for axis in 0..self.geometry.dim() {
            let ld = self.geometry.interior()[axis] as isize;
            site[axis] = site[axis] % ld + NGHOSTS as isize;
        }
        self.local_layout().index(&site) as usize
    }

    /// Local index of the cell at the center of the local layout, orbital 0.
    pub fn center(&self) -> usize {
        let dims = self.local_layout().dims();
        let mut site = [0isize; MAX_DIM + 1];
        for axis in 0..self.geometry.dim() {
            site[axis] = (dims[axis] / 2) as isize;
        }
        self.local_layout().index(&site) as usize
    }
}
