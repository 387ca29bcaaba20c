//! Structured hierarchical store for inputs and results.
//!
//! Simulation inputs (defect motifs) are read by slash-separated field names
//! such as `Hamiltonian/StructuralDisorder/Format0/Concentration`, and the
//! conductivity table is written back under a label in the same store. The
//! on-disk format is not fixed by the simulation: anything implementing
//! [`HierarchicalStore`] works. [`MemoryStore`] keeps datasets in a sorted
//! map and can be saved to / loaded from JSON.
//!
//! # Example
//!
//! ```ignore
//! use chebtile_core::store::{Dataset, HierarchicalStore, MemoryStore};
//!
//! let mut store = MemoryStore::new();
//! store.write("Defect/Concentration", Dataset::Real(vec![0.1]));
//! assert_eq!(store.read_f64("Defect/Concentration")?, 0.1);
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// One named dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dataset {
    /// Floating-point values.
    Real(Vec<f64>),
    /// Integer values (counts, node indices, packed positions).
    Integer(Vec<i64>),
    /// Complex values.
    Complex(Vec<Complex64>),
    /// Row-major two-dimensional array of floating-point values.
    Matrix {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
        /// `rows * cols` values, row-major.
        data: Vec<f64>,
    },
}

impl Dataset {
    /// Human-readable kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Dataset::Real(_) => "real",
            Dataset::Integer(_) => "integer",
            Dataset::Complex(_) => "complex",
            Dataset::Matrix { .. } => "matrix",
        }
    }

    /// Number of scalar values held.
    pub fn len(&self) -> usize {
        match self {
            Dataset::Real(v) => v.len(),
            Dataset::Integer(v) => v.len(),
            Dataset::Complex(v) => v.len(),
            Dataset::Matrix { data, .. } => data.len(),
        }
    }

    /// True if the dataset holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read/write access to named datasets.
///
/// Only [`dataset`](Self::dataset) and [`write`](Self::write) are required;
/// the typed readers are built on top of them.
pub trait HierarchicalStore {
    /// Returns the dataset at `path`, if any.
    fn dataset(&self, path: &str) -> Option<&Dataset>;

    /// Stores `dataset` at `path`, replacing any previous value.
    fn write(&mut self, path: &str, dataset: Dataset);

    /// True if a dataset exists at `path`.
    fn contains(&self, path: &str) -> bool {
        self.dataset(path).is_some()
    }

    /// Reads a real-valued dataset. Integer datasets are widened.
    fn read_reals(&self, path: &str) -> Result<Vec<f64>, StoreError> {
        match self.require(path)? {
            Dataset::Real(v) => Ok(v.clone()),
            Dataset::Integer(v) => Ok(v.iter().map(|&x| x as f64).collect()),
            other => Err(wrong_kind(path, "real", other)),
        }
    }

    /// Reads a single real value.
    fn read_f64(&self, path: &str) -> Result<f64, StoreError> {
        let values = self.read_reals(path)?;
        match values.as_slice() {
            [x] => Ok(*x),
            _ => Err(StoreError::WrongLength {
                path: path.to_owned(),
                expected: 1,
                found: values.len(),
            }),
        }
    }

    /// Reads an integer dataset.
    fn read_integers(&self, path: &str) -> Result<Vec<i64>, StoreError> {
        match self.require(path)? {
            Dataset::Integer(v) => Ok(v.clone()),
            other => Err(wrong_kind(path, "integer", other)),
        }
    }

    /// Reads a non-negative integer dataset as indices.
    fn read_indices(&self, path: &str) -> Result<Vec<usize>, StoreError> {
        self.read_integers(path)?
            .into_iter()
            .map(|value| {
                usize::try_from(value).map_err(|_| StoreError::Negative {
                    path: path.to_owned(),
                    value,
                })
            })
            .collect()
    }

    /// Reads a single non-negative integer.
    fn read_count(&self, path: &str) -> Result<usize, StoreError> {
        let values = self.read_indices(path)?;
        match values.as_slice() {
            [x] => Ok(*x),
            _ => Err(StoreError::WrongLength {
                path: path.to_owned(),
                expected: 1,
                found: values.len(),
            }),
        }
    }

    /// Reads a complex dataset. Real and integer datasets are promoted.
    fn read_complex(&self, path: &str) -> Result<Vec<Complex64>, StoreError> {
        match self.require(path)? {
            Dataset::Complex(v) => Ok(v.clone()),
            Dataset::Real(v) => Ok(v.iter().map(|&x| Complex64::new(x, 0.0)).collect()),
            Dataset::Integer(v) => Ok(v.iter().map(|&x| Complex64::new(x as f64, 0.0)).collect()),
            other => Err(wrong_kind(path, "complex", other)),
        }
    }

    /// Writes a row-major matrix, overwriting any previous dataset.
    fn write_matrix(&mut self, path: &str, rows: usize, cols: usize, data: Vec<f64>) {
        debug_assert_eq!(rows * cols, data.len());
        self.write(path, Dataset::Matrix { rows, cols, data });
    }

    #[doc(hidden)]
    fn require(&self, path: &str) -> Result<&Dataset, StoreError> {
        self.dataset(path)
            .ok_or_else(|| StoreError::Missing(path.to_owned()))
    }
}

fn wrong_kind(path: &str, expected: &'static str, found: &Dataset) -> StoreError {
    StoreError::WrongKind {
        path: path.to_owned(),
        expected,
        found: found.kind(),
    }
}

/// In-memory store backed by a sorted map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    datasets: BTreeMap<String, Dataset>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates over dataset paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    /// Serializes the store to a JSON string.
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a store from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Writes the store to `path` as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Loads a store previously written with [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

impl HierarchicalStore for MemoryStore {
    fn dataset(&self, path: &str) -> Option<&Dataset> {
        self.datasets.get(normalize(path))
    }

    fn write(&mut self, path: &str, dataset: Dataset) {
        self.datasets.insert(normalize(path).to_owned(), dataset);
    }
}

/// Leading slashes are optional in paths.
fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}
