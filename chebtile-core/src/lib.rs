//! # chebtile-core: Disordered Tight-Binding Transport with the Kernel Polynomial Method
//!
//! `chebtile-core` estimates the longitudinal dc conductivity of large
//! tight-binding lattices carrying random structural defects. The Hamiltonian
//! is never stored as a matrix: it is applied tile by tile to state vectors,
//! and the conductivity is read off a Chebyshev expansion driven by that
//! application.
//!
//! ## Overview
//!
//! Every run repeats three steps:
//!
//! 1. **Place disorder** - copies of each [`DefectMotif`] are dropped on random
//!    unit cells, and copies straddling a domain boundary are reconciled
//! 2. **Build velocities** - the generalized velocity of every bond along the
//!    two requested legs
//! 3. **Recur** - random-phase vectors are pushed through the Chebyshev
//!    recursion and the single-shot estimator is averaged
//!
//! ## Architecture
//!
//! The lattice is split into domains, one worker thread each. A domain stores
//! its interior plus a margin of ghost cells mirrored from its neighbors, and
//! its interior is swept in fixed-size tiles:
//!
//! - **Barrier + designated writer** - shared structures are mutated by one
//!   worker while the others wait on a barrier ([`sync`])
//! - **Const-generic kernels** - the six `(coefficient, velocity)` defect
//!   multiplies are monomorphized, so the per-bond loop has no branch
//! - **Precomputed phases** - Peierls phases of motif bonds are tabulated per
//!   slice once; only boundary-crossing bonds compute theirs on the fly
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use chebtile_core::{
//!     ChebyshevTransportKernel, DefectMotif, DefectsOnly, LatticeBuilder, MemoryStore,
//!     SingleShotConfig, SingleShotJob,
//! };
//!
//! let geometry = Arc::new(LatticeBuilder::new().lengths(&[64, 64]).divisions(&[2, 1]).build()?);
//! let motifs = DefectMotif::load_all(&store, "Hamiltonian/StructuralDisorder")?;
//!
//! let kernel = ChebyshevTransportKernel::new(SingleShotConfig {
//!     jobs: vec![SingleShotJob { energy: 0.1, gamma: 0.01, preserve_disorder: true, moments: 256 }],
//!     ..Default::default()
//! })?;
//! let table = kernel.run(&geometry, &motifs, &DefectsOnly, &mut store)?;
//! ```
//!
//! ## Module Organization
//!
//! - [`lattice`] - Geometry, domain decomposition and index conversion
//! - [`defect`] - Motifs, placement, reconciliation and defect multiplies
//! - [`kpm`] - State vectors, halo exchange, recursion and the conductivity kernel
//! - [`sync`] - Worker pool and the barrier/single-writer protocol
//! - [`store`] - Hierarchical dataset store for inputs and results
//! - [`error`] - Error types

#![deny(missing_docs)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Structural disorder: motifs, placement and application.
pub mod defect;

/// Error types for every fallible stage.
pub mod error;

/// Chebyshev recursion and the single-shot conductivity kernel.
pub mod kpm;

/// Lattice geometry and per-domain index conversion.
pub mod lattice;

/// Hierarchical dataset store.
pub mod store;

/// Worker pool and shared sections.
pub mod sync;

// =============================================================================
// Convenience Re-exports (Clean Public API)
// =============================================================================

// Errors
pub use error::{LatticeError, MotifError, PlacementError, StoreError, TransportError};

// Lattice
pub use lattice::{LatticeBuilder, LatticeConfig, LatticeGeometry, LatticeIndexer, NGHOSTS};

// Disorder
pub use defect::{
    ConflictTable, CrossMosaicFlags, DefectMotif, DefectTerm, DisorderPlacementEngine, MotifBond,
    MotifOnsite, VacancyMap,
};

// Recursion and transport
pub use kpm::{
    ChebyshevTransportKernel, ConductivityTable, DefectsOnly, DisorderedHamiltonian, DomainModel,
    HaloExchange, KpmVector, PristineHamiltonian, SingleShotConfig, SingleShotJob, ZeroPristine,
};

// Storage and synchronization
pub use store::{Dataset, HierarchicalStore, MemoryStore};
pub use sync::{DomainContext, DomainPool, SharedSection};
