//! Chebyshev recursion and the single-shot conductivity kernel.
//!
//! - [`vector`] holds the ghost-inclusive state buffers of one domain
//! - [`halo`] refreshes their ghost margins across domains
//! - [`hamiltonian`] applies pristine plus defect terms tile by tile
//! - [`single_shot`] drives the recursion and reduces the estimator

/// Running mean of complex samples.
pub mod average;

/// Green's-function kernel coefficients.
pub mod green;

/// Ghost-margin exchange between domains.
pub mod halo;

/// Tile-ordered Hamiltonian and velocity application.
pub mod hamiltonian;

/// Single-shot longitudinal conductivity.
pub mod single_shot;

/// Multi-slot state vectors.
pub mod vector;

pub use average::RunningAverage;
pub use green::{green, moment_weight};
pub use halo::HaloExchange;
pub use hamiltonian::{DisorderedHamiltonian, PristineHamiltonian, ZeroPristine};
pub use single_shot::{
    ChebyshevTransportKernel, ConductivityPoint, ConductivityTable, DefectsOnly, DomainModel,
    SPIN_DEGENERACY, SingleShotConfig, SingleShotJob, parse_directions, row_blocked_dot,
};
pub use vector::KpmVector;
