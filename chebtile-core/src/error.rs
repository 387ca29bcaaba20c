//! Error types for every fallible stage of a simulation.
//!
//! Each concern owns one enum. Lower-level errors convert into
//! [`TransportError`] through `#[from]`, so the kernel entry point can use `?`
//! throughout and hand a single error type back to the caller.

use thiserror::Error;

/// Errors raised while reading from or writing to a [`HierarchicalStore`](crate::store::HierarchicalStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No dataset exists at the requested path.
    #[error("dataset `{0}` not found")]
    Missing(String),

    /// The dataset exists but holds a different kind of data.
    #[error("dataset `{path}` holds {found} data, expected {expected}")]
    WrongKind {
        /// Dataset path.
        path: String,
        /// Kind that was requested.
        expected: &'static str,
        /// Kind that was found.
        found: &'static str,
    },

    /// The dataset holds a different number of values than required.
    #[error("dataset `{path}` holds {found} values, expected {expected}")]
    WrongLength {
        /// Dataset path.
        path: String,
        /// Required length.
        expected: usize,
        /// Actual length.
        found: usize,
    },

    /// An integer dataset holds a negative value where a count or index is needed.
    #[error("dataset `{path}` holds negative value {value}")]
    Negative {
        /// Dataset path.
        path: String,
        /// Offending value.
        value: i64,
    },

    /// Filesystem failure while saving or loading a store.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Malformed JSON representation of a store.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Errors raised while validating a lattice configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LatticeError {
    /// Only 1, 2 and 3 spatial dimensions are supported.
    #[error("lattice dimension {0} is not supported (expected 1..=3)")]
    Dimension(usize),

    /// A per-axis or matrix field has the wrong shape for the lattice dimension.
    #[error("`{field}` has {found} entries, expected {expected}")]
    Shape {
        /// Configuration field.
        field: &'static str,
        /// Required number of entries.
        expected: usize,
        /// Provided number of entries.
        found: usize,
    },

    /// The global length along an axis is not a multiple of the domain count.
    #[error("axis {axis}: length {length} is not divisible into {divisions} domains")]
    Divisions {
        /// Axis index.
        axis: usize,
        /// Global length in unit cells.
        length: usize,
        /// Requested number of domains along the axis.
        divisions: usize,
    },

    /// The domain interior along an axis is not a multiple of the tile edge.
    #[error("axis {axis}: domain interior {interior} is not a multiple of tile edge {tile_edge}")]
    Tiles {
        /// Axis index.
        axis: usize,
        /// Interior length of one domain.
        interior: usize,
        /// Tile edge length.
        tile_edge: usize,
    },

    /// The domain interior is narrower than the ghost margin it must feed.
    #[error("axis {axis}: domain interior {interior} is narrower than the ghost margin {ghosts}")]
    DomainTooSmall {
        /// Axis index.
        axis: usize,
        /// Interior length of one domain.
        interior: usize,
        /// Ghost margin width.
        ghosts: usize,
    },

    /// The primitive lattice vectors are linearly dependent.
    #[error("lattice vectors are singular")]
    Singular,

    /// At least one orbital per unit cell is required.
    #[error("lattice has no orbitals")]
    NoOrbitals,

    /// A domain id beyond the decomposition was requested.
    #[error("domain {domain} does not exist ({count} domains)")]
    UnknownDomain {
        /// Requested id.
        domain: usize,
        /// Number of domains.
        count: usize,
    },
}

/// Errors raised while loading or validating a [`DefectMotif`](crate::defect::DefectMotif).
#[derive(Debug, Error)]
pub enum MotifError {
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Concentration outside `(0, 1]`.
    #[error("concentration {0} is outside (0, 1]")]
    Concentration(f64),

    /// A motif without nodes cannot be placed.
    #[error("motif has no nodes")]
    NoNodes,

    /// A bond or onsite term references a node the motif does not have.
    #[error("{what} references node {index}, motif has {nodes} nodes")]
    NodeIndex {
        /// Which table held the reference.
        what: &'static str,
        /// Offending node index.
        index: usize,
        /// Number of motif nodes.
        nodes: usize,
    },

    /// A packed node position does not fit the `3 × … × 3 × orbitals` basis.
    #[error("node position {position} is outside the motif basis of size {basis}")]
    Position {
        /// Packed position.
        position: usize,
        /// Size of the basis.
        basis: usize,
    },
}

/// Errors raised while placing defects for one disorder realization.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlacementError {
    /// More anchors were requested than there are unit cells in the domain.
    #[error("concentration requires {requested} anchors but the domain has {available} cells")]
    TooManyAnchors {
        /// Anchors required by the concentration.
        requested: usize,
        /// Interior unit cells of the domain.
        available: usize,
    },

    /// Rejection sampling ran out of attempts before reaching the target count.
    #[error("placed {placed} of {requested} anchors after {attempts} attempts")]
    AttemptsExhausted {
        /// Anchors placed before giving up.
        placed: usize,
        /// Anchors required.
        requested: usize,
        /// Attempts spent.
        attempts: usize,
    },
}

/// Errors raised by the single-shot conductivity kernel.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The two legs of the conductivity tensor point along different axes.
    #[error(
        "single-shot is only meaningful for the longitudinal conductivity: \
         legs point along axis {left} and axis {right}; use directions like `x,x` or `y,y`"
    )]
    NonLongitudinal {
        /// First axis of leg 0.
        left: usize,
        /// First axis of leg 1.
        right: usize,
    },

    /// A direction string could not be parsed.
    #[error("invalid direction specification `{0}`")]
    Direction(String),

    /// A direction references an axis the lattice does not have.
    #[error("direction axis {axis} does not exist in a {dim}-dimensional lattice")]
    AxisOutOfRange {
        /// Requested axis.
        axis: usize,
        /// Lattice dimension.
        dim: usize,
    },

    /// The job queue is empty.
    #[error("no single-shot jobs were configured")]
    NoJobs,

    /// A job asks for zero Chebyshev moments.
    #[error("job {0} requests zero Chebyshev moments")]
    NoMoments(usize),

    /// Another domain failed and every worker stopped in lockstep.
    #[error("a peer domain failed during the run")]
    PeerAborted,

    /// Invalid lattice.
    #[error(transparent)]
    Lattice(#[from] LatticeError),

    /// Invalid defect motif.
    #[error(transparent)]
    Motif(#[from] MotifError),

    /// Disorder placement failed.
    #[error(transparent)]
    Placement(#[from] PlacementError),

    /// Result persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
