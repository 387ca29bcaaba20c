//! Structural disorder: motifs, their random placement and their action.
//!
//! A [`DefectMotif`] describes one pattern. A [`DisorderPlacementEngine`]
//! owns the copies of that pattern placed in one domain for the current
//! realization, plus everything needed to apply them:
//!
//! | Piece | Lifetime | Module |
//! |-------|----------|--------|
//! | node offsets, phase table | whole run | [`motif`], [`phase`] |
//! | anchors, border terms | one realization | [`engine`], [`conflict`] |
//! | velocity weights | rebuilt after each realization | [`velocity`] |
//!
//! Applying the defects goes through the const-generic entry points in
//! [`multiply`].

pub mod conflict;
pub mod engine;
pub mod motif;
pub mod multiply;
pub mod phase;
pub mod vacancy;
pub mod velocity;

pub use conflict::{
    BorderBond, BorderContributions, BorderOnsite, ConflictTable, CrossMosaicFlags, GhostHandoff,
    TileHandoff,
};
pub use engine::{DisorderPlacementEngine, MIN_PLACEMENT_ATTEMPTS, PLACEMENT_ATTEMPTS_PER_ANCHOR};
pub use motif::{DefectMotif, MotifBond, MotifOnsite, pack_node_position};
pub use multiply::{Coefficient, DefectTerm, OperatorMode};
pub use phase::{PhaseTable, border_phase};
pub use vacancy::VacancyMap;
pub use velocity::VelocityTable;
