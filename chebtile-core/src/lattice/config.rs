//! Lattice configuration and the builder that validates it.
//!
//! [`LatticeConfig`] is the serializable description of a lattice (what a
//! configuration file holds). [`LatticeBuilder`] fills in defaults, checks
//! that the decomposition is consistent, and produces an immutable
//! [`LatticeGeometry`] shared by every domain.
//!
//! # Example
//!
//! ```ignore
//! use chebtile_core::lattice::LatticeBuilder;
//!
//! // 64 × 32 square lattice split into 2 × 1 domains with 8 × 8 tiles
//! let geometry = LatticeBuilder::new()
//!     .lengths(&[64, 32])
//!     .divisions(&[2, 1])
//!     .tile_edge(8)
//!     .build()?;
//! assert_eq!(geometry.domain_count(), 2);
//! ```

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::{Layout, MAX_DIM, NGHOSTS};
use crate::error::LatticeError;

/// Serializable lattice description.
///
/// Vectors are given one per entry: `lattice_vectors[i]` is the i-th primitive
/// vector, `orbital_positions[o]` the position of orbital `o` inside the cell.
/// Empty optional fields take the defaults of [`LatticeBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    /// Global number of unit cells along each axis.
    pub lengths: Vec<usize>,
    /// Number of domains along each axis.
    pub divisions: Vec<usize>,
    /// Edge of the square tiles inside a domain. `0` picks the largest of
    /// 8, 4, 2, 1 that divides every interior length.
    pub tile_edge: usize,
    /// Orbitals per unit cell.
    pub orbitals: usize,
    /// Primitive lattice vectors.
    pub lattice_vectors: Vec<Vec<f64>>,
    /// Orbital positions within the unit cell.
    pub orbital_positions: Vec<Vec<f64>>,
    /// Gauge-field tensor producing the Peierls phases (`D × D`, row-major rows).
    pub gauge: Vec<Vec<f64>>,
    /// Periodic boundary flag per axis.
    pub periodic: Vec<bool>,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            lengths: Vec::new(),
            divisions: Vec::new(),
            tile_edge: 0,
            orbitals: 1,
            lattice_vectors: Vec::new(),
            orbital_positions: Vec::new(),
            gauge: Vec::new(),
            periodic: Vec::new(),
        }
    }
}

impl LatticeConfig {
    /// Validates the configuration and builds the geometry.
    pub fn build(self) -> Result<LatticeGeometry, LatticeError> {
        LatticeBuilder::from_config(self).build()
    }
}

/// Builder for [`LatticeGeometry`].
///
/// Defaults: one domain per axis, hypercubic unit vectors, every orbital at
/// the cell origin, zero gauge field, periodic boundaries.
#[derive(Debug, Clone, Default)]
pub struct LatticeBuilder {
    config: LatticeConfig,
}

impl LatticeBuilder {
    /// Creates a builder with no lengths set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    #[must_use]
    pub fn from_config(config: LatticeConfig) -> Self {
        Self { config }
    }

    /// Sets the global lattice size in unit cells; its length fixes the dimension.
    #[must_use]
    pub fn lengths(mut self, lengths: &[usize]) -> Self {
        self.config.lengths = lengths.to_vec();
        self
    }

    /// Sets the number of domains along each axis.
    #[must_use]
    pub fn divisions(mut self, divisions: &[usize]) -> Self {
        self.config.divisions = divisions.to_vec();
        self
    }

    /// Sets the tile edge.
    #[must_use]
    pub fn tile_edge(mut self, tile_edge: usize) -> Self {
        self.config.tile_edge = tile_edge;
        self
    }

    /// Sets the number of orbitals per unit cell.
    #[must_use]
    pub fn orbitals(mut self, orbitals: usize) -> Self {
        self.config.orbitals = orbitals;
        self
    }

    /// Sets the primitive lattice vectors.
    #[must_use]
    pub fn lattice_vectors(mut self, vectors: Vec<Vec<f64>>) -> Self {
        self.config.lattice_vectors = vectors;
        self
    }

    /// Sets the orbital positions.
    #[must_use]
    pub fn orbital_positions(mut self, positions: Vec<Vec<f64>>) -> Self {
        self.config.orbital_positions = positions;
        self
    }

    /// Sets the gauge-field tensor.
    #[must_use]
    pub fn gauge(mut self, gauge: Vec<Vec<f64>>) -> Self {
        self.config.gauge = gauge;
        self
    }

    /// Sets the periodic boundary flags.
    #[must_use]
    pub fn periodic(mut self, periodic: &[bool]) -> Self {
        self.config.periodic = periodic.to_vec();
        self
    }

    /// Validates the configuration and builds the geometry.
    ///
    /// # Errors
    ///
    /// Returns a [`LatticeError`] if the dimension is unsupported, a field has
    /// the wrong shape, the lengths do not split evenly into domains and
    /// tiles, a domain is narrower than the ghost margin, or the lattice
    /// vectors are singular.
    pub fn build(self) -> Result<LatticeGeometry, LatticeError> {
        let c = self.config;
        let dim = c.lengths.len();
        if dim == 0 || dim > MAX_DIM {
            return Err(LatticeError::Dimension(dim));
        }
        if c.orbitals == 0 {
            return Err(LatticeError::NoOrbitals);
        }

        let divisions = or_default(c.divisions, vec![1; dim]);
        check_len("divisions", &divisions, dim)?;
        let periodic = or_default(c.periodic, vec![true; dim]);
        check_len("periodic", &periodic, dim)?;

        let mut interior = Vec::with_capacity(dim);
        for axis in 0..dim {
            let (length, parts) = (c.lengths[axis], divisions[axis]);
            if parts == 0 || length % parts != 0 {
                return Err(LatticeError::Divisions {
                    axis,
                    length,
                    divisions: parts,
                });
            }
            let ld = length / parts;
            if ld < NGHOSTS {
                return Err(LatticeError::DomainTooSmall {
                    axis,
                    interior: ld,
                    ghosts: NGHOSTS,
                });
            }
            interior.push(ld);
        }

        let tile_edge = match c.tile_edge {
            0 => [8, 4, 2, 1]
                .into_iter()
                .find(|edge| interior.iter().all(|ld| ld % edge == 0))
                .unwrap_or(1),
            edge => edge,
        };
        for (axis, &ld) in interior.iter().enumerate() {
            if ld % tile_edge != 0 {
                return Err(LatticeError::Tiles {
                    axis,
                    interior: ld,
                    tile_edge,
                });
            }
        }

        let lattice_vectors = columns(
            "lattice_vectors",
            or_default(c.lattice_vectors, identity_rows(dim)),
            dim,
            dim,
        )?;
        let inverse = lattice_vectors
            .clone()
            .try_inverse()
            .ok_or(LatticeError::Singular)?;
        let orbital_positions = columns(
            "orbital_positions",
            or_default(c.orbital_positions, vec![vec![0.0; dim]; c.orbitals]),
            c.orbitals,
            dim,
        )?;
        let gauge = rows(
            "gauge",
            or_default(c.gauge, vec![vec![0.0; dim]; dim]),
            dim,
        )?;
        let gauge_metric = inverse.transpose() * &gauge * &inverse;

        let local_dims: Vec<usize> = interior.iter().map(|ld| ld + 2 * NGHOSTS).collect();
        let tiles_per_axis: Vec<usize> = interior.iter().map(|ld| ld / tile_edge).collect();

        Ok(LatticeGeometry {
            dim,
            local: Layout::new(&local_dims, c.orbitals),
            global: Layout::new(&c.lengths, c.orbitals),
            tiles: Layout::new(&tiles_per_axis, 1),
            lengths: c.lengths,
            divisions,
            interior,
            tile_edge,
            orbitals: c.orbitals,
            lattice_vectors,
            orbital_positions,
            gauge,
            gauge_metric,
            periodic,
        })
    }
}

fn or_default<T>(value: Vec<T>, default: Vec<T>) -> Vec<T> {
    if value.is_empty() { default } else { value }
}

fn check_len<T>(field: &'static str, values: &[T], expected: usize) -> Result<(), LatticeError> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(LatticeError::Shape {
            field,
            expected,
            found: values.len(),
        })
    }
}

fn identity_rows(dim: usize) -> Vec<Vec<f64>> {
    (0..dim)
        .map(|i| (0..dim).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

/// `count` vectors of length `dim`, stored as matrix columns.
fn columns(
    field: &'static str,
    vectors: Vec<Vec<f64>>,
    count: usize,
    dim: usize,
) -> Result<DMatrix<f64>, LatticeError> {
    check_len(field, &vectors, count)?;
    for v in &vectors {
        check_len(field, v, dim)?;
    }
    Ok(DMatrix::from_fn(dim, count, |row, col| vectors[col][row]))
}

/// `dim × dim` matrix given as rows.
fn rows(field: &'static str, values: Vec<Vec<f64>>, dim: usize) -> Result<DMatrix<f64>, LatticeError> {
    check_len(field, &values, dim)?;
    for row in &values {
        check_len(field, row, dim)?;
    }
    Ok(DMatrix::from_fn(dim, dim, |row, col| values[row][col]))
}

/// Validated, immutable lattice geometry shared by every domain.
#[derive(Debug, Clone)]
pub struct LatticeGeometry {
    dim: usize,
    lengths: Vec<usize>,
    divisions: Vec<usize>,
    interior: Vec<usize>,
    tile_edge: usize,
    orbitals: usize,
    lattice_vectors: DMatrix<f64>,
    orbital_positions: DMatrix<f64>,
    gauge: DMatrix<f64>,
    gauge_metric: DMatrix<f64>,
    periodic: Vec<bool>,
    local: Layout,
    global: Layout,
    tiles: Layout,
}

impl LatticeGeometry {
    /// Number of spatial dimensions.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Global number of unit cells per axis.
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// Domains per axis.
    pub fn divisions(&self) -> &[usize] {
        &self.divisions
    }

    /// Interior unit cells of one domain per axis.
    pub fn interior(&self) -> &[usize] {
        &self.interior
    }

    /// Tile edge in unit cells.
    pub fn tile_edge(&self) -> usize {
        self.tile_edge
    }

    /// Orbitals per unit cell.
    pub fn orbitals(&self) -> usize {
        self.orbitals
    }

    /// Whether `axis` wraps around.
    pub fn is_periodic(&self, axis: usize) -> bool {
        self.periodic[axis]
    }

    /// Total number of domains.
    pub fn domain_count(&self) -> usize {
        self.divisions.iter().product()
    }

    /// Primitive vectors as matrix columns.
    pub fn lattice_vectors(&self) -> &DMatrix<f64> {
        &self.lattice_vectors
    }

    /// Position of `orbital` within the unit cell.
    pub fn orbital_position(&self, orbital: usize) -> DVector<f64> {
        self.orbital_positions.column(orbital).into_owned()
    }

    /// Gauge-field tensor.
    pub fn gauge(&self) -> &DMatrix<f64> {
        &self.gauge
    }

    /// Gauge tensor expressed in lattice coordinates: `A⁻ᵀ · G · A⁻¹`.
    pub fn gauge_metric(&self) -> &DMatrix<f64> {
        &self.gauge_metric
    }

    /// Area (volume in 3D) of the unit cell.
    pub fn unit_cell_area(&self) -> f64 {
        self.lattice_vectors.determinant().abs()
    }

    /// Ghost-inclusive layout of one domain.
    pub fn local_layout(&self) -> &Layout {
        &self.local
    }

    /// Layout of the whole lattice.
    pub fn global_layout(&self) -> &Layout {
        &self.global
    }

    /// Layout of the tile grid inside one domain.
    pub fn tile_layout(&self) -> &Layout {
        &self.tiles
    }

    /// Number of tiles per domain.
    pub fn tile_count(&self) -> usize {
        self.tiles.size()
    }

    /// Interior unit cells of one domain.
    pub fn interior_cells(&self) -> usize {
        self.interior.iter().product()
    }

    /// Quantum states of the whole lattice (cells × orbitals).
    pub fn global_states(&self) -> usize {
        self.global.size()
    }

    /// Cartesian displacement of a lattice-coordinate difference.
    pub fn cartesian(&self, cells: &[isize]) -> DVector<f64> {
        let v = DVector::from_iterator(self.dim, cells[..self.dim].iter().map(|&c| c as f64));
        &self.lattice_vectors * v
    }
}
