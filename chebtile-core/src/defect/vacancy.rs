//! Structural vacancies of one domain.
//!
//! A vacancy is a site removed from the Hamiltonian. Its amplitude is forced
//! to zero after every multiply, and bonds pointing into it are never handed
//! across a domain boundary.

use std::collections::HashSet;

use num_complex::Complex64;

use crate::lattice::LatticeIndexer;

/// Vacant sites of one domain, in local indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VacancyMap {
    sites: HashSet<usize>,
    /// Vacancies per tile, for zeroing during the sweep.
    by_tile: Vec<Vec<usize>>,
}

impl VacancyMap {
    /// A domain without vacancies.
    pub fn empty(indexer: &LatticeIndexer) -> Self {
        Self {
            sites: HashSet::new(),
            by_tile: vec![Vec::new(); indexer.tile_count()],
        }
    }

    /// Builds the map from interior local indices. Ghost indices are ignored.
    pub fn from_sites(indexer: &LatticeIndexer, sites: impl IntoIterator<Item = usize>) -> Self {
        let mut map = Self::empty(indexer);
        for site in sites {
            if indexer.is_interior(site) && map.sites.insert(site) {
                map.by_tile[indexer.tile_of(site)].push(site);
            }
        }
        map
    }

    /// True if `site` is vacant.
    #[inline]
    pub fn contains(&self, site: usize) -> bool {
        self.sites.contains(&site)
    }

    /// Number of vacancies.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// True if the domain has no vacancies.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Zeroes every vacancy of `tile` in `buffer`.
    #[inline]
    pub fn zero_tile(&self, tile: usize, buffer: &mut [Complex64]) {
        if let Some(sites) = self.by_tile.get(tile) {
            for &site in sites {
                buffer[site] = Complex64::new(0.0, 0.0);
            }
        }
    }

    /// Zeroes `site` if it is vacant.
    #[inline]
    pub fn zero_if_vacant(&self, site: usize, buffer: &mut [Complex64]) {
        if self.contains(site) {
            buffer[site] = Complex64::new(0.0, 0.0);
        }
    }
}
