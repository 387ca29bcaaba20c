//! Blocking ghost refresh between domains.
//!
//! Each domain publishes its buffer into its own slot, then copies the cells
//! its ghost margin mirrors out of the neighbors' slots:
//!
//! ```text
//! barrier → publish own buffer → barrier → read ghost sources → barrier
//! ```
//!
//! The trailing barrier keeps a fast worker from republishing while a slow
//! one is still reading.

use num_complex::Complex64;
use parking_lot::RwLock;

use crate::lattice::LatticeIndexer;
use crate::sync::DomainContext;

/// Publication slots of every domain.
#[derive(Debug)]
pub struct HaloExchange {
    published: Vec<RwLock<Vec<Complex64>>>,
}

impl HaloExchange {
    /// One slot per domain.
    pub fn new(domains: usize) -> Self {
        Self {
            published: (0..domains).map(|_| RwLock::new(Vec::new())).collect(),
        }
    }

    /// Refreshes the ghost margin of `buffer`.
    ///
    /// Collective: every domain worker must call it. Ghosts past an open
    /// boundary are set to zero.
    pub fn exchange(&self, ctx: &DomainContext<'_>, indexer: &LatticeIndexer, buffer: &mut [Complex64]) {
        ctx.barrier();
        {
            let mut slot = self.published[ctx.id()].write();
            slot.clear();
            slot.extend_from_slice(buffer);
        }
        ctx.barrier();
        {
            let sources: Vec<_> = self.published.iter().map(|slot| slot.read()).collect();
            for ghost in indexer.ghost_sources() {
                buffer[ghost.local] = sources[ghost.owner][ghost.owner_local];
            }
        }
        for &ghost in indexer.open_ghosts() {
            buffer[ghost] = Complex64::new(0.0, 0.0);
        }
        ctx.barrier();
    }
}
