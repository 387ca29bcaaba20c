//! Lattice geometry, domain decomposition and index conversion.
//!
//! A lattice of `L_0 × … × L_{D-1}` unit cells with `orbitals` sites per cell
//! is split into `divisions[i]` domains along each axis. Every domain stores its
//! interior plus a margin of [`NGHOSTS`] ghost cells on every side:
//!
//! ```text
//!   local layout of one domain (D = 2, NGHOSTS = 2)
//!
//!   g g g g g g g g
//!   g g g g g g g g
//!   g g . . . . g g      . interior cell, owned by this domain
//!   g g . . . . g g      g ghost cell, mirrored from a neighbor
//!   g g g g g g g g
//!   g g g g g g g g
//! ```
//!
//! Local indices are linear in a layout whose axis 0 is fastest and whose
//! orbital coordinate is slowest. The interior is further split into square
//! tiles swept in a fixed order during every Hamiltonian application.

/// Lattice configuration, builder and validated geometry.
pub mod config;

/// Per-domain conversion between local, global and tile coordinates.
pub mod indexer;

pub use config::{LatticeBuilder, LatticeConfig, LatticeGeometry};
pub use indexer::{GhostSource, LatticeIndexer};

/// Width of the ghost margin on each side of a domain, in unit cells.
pub const NGHOSTS: usize = 2;

/// Largest supported number of spatial dimensions.
pub const MAX_DIM: usize = 3;

/// Coordinates of one site: `dim` spatial coordinates followed by the orbital.
///
/// Entries past the orbital are always zero.
pub type Site = [isize; MAX_DIM + 1];

/// A linear layout over `dim` spatial axes plus one orbital axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    dim: usize,
    dims: [usize; MAX_DIM + 1],
    basis: [isize; MAX_DIM + 1],
    size: usize,
}

impl Layout {
    /// Creates a layout with the given spatial extents and orbital count.
    pub fn new(spatial: &[usize], orbitals: usize) -> Self {
        debug_assert!(!spatial.is_empty() && spatial.len() <= MAX_DIM);
        let dim = spatial.len();
        let mut dims = [0usize; MAX_DIM + 1];
        let mut basis = [0isize; MAX_DIM + 1];

        dims[..dim].copy_from_slice(spatial);
        dims[dim] = orbitals;

        let mut stride = 1usize;
        for axis in 0..=dim {
            basis[axis] = stride as isize;
            stride *= dims[axis];
        }

        Self {
            dim,
            dims,
            basis,
            size: stride,
        }
    }

    /// Number of spatial dimensions.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Extents of every axis, orbital last.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims[..=self.dim]
    }

    /// Linear stride of every axis, orbital last.
    #[inline]
    pub fn basis(&self) -> &[isize] {
        &self.basis[..=self.dim]
    }

    /// Total number of sites.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Linear index of `site`. May be negative or out of range for sites
    /// outside the layout; the result is still a valid linear delta.
    #[inline]
    pub fn index(&self, site: &Site) -> isize {
        site[..=self.dim]
            .iter()
            .zip(&self.basis[..=self.dim])
            .map(|(c, b)| c * b)
            .sum()
    }

    /// Coordinates of the site at `index`.
    #[inline]
    pub fn site(&self, index: usize) -> Site {
        debug_assert!(index < self.size, "index {index} outside layout of {}", self.size);
        let mut site = [0isize; MAX_DIM + 1];
        let mut rest = index;
        for axis in 0..=self.dim {
            site[axis] = (rest % self.dims[axis]) as isize;
            rest /= self.dims[axis];
        }
        site
    }
}
