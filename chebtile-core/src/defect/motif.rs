//! Defect motifs: the immutable pattern every placed defect copies.
//!
//! A motif is a small cluster of nodes around an anchor cell. Node positions
//! are packed in a `3 × … × 3 × orbitals` basis: spatial coordinate `c` in
//! `{0, 1, 2}` stands for a displacement of `c - 1` cells from the anchor,
//! and the last coordinate is the orbital of the node.
//!
//! ```text
//!   2D packing: position = (dx + 1) + 3 · (dy + 1) + 9 · orbital
//!
//!   (dx, dy) = (-1, +1) → 6     ( 0, +1) → 7     (+1, +1) → 8
//!   (dx, dy) = (-1,  0) → 3     ( 0,  0) → 4     (+1,  0) → 5
//!   (dx, dy) = (-1, -1) → 0     ( 0, -1) → 1     (+1, -1) → 2
//! ```

use num_complex::Complex64;

use crate::error::{MotifError, StoreError};
use crate::lattice::{LatticeGeometry, Layout, MAX_DIM};
use crate::store::{Dataset, HierarchicalStore};

/// A bond of the motif: `H[to, from] += hopping`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotifBond {
    /// Node receiving the amplitude.
    pub to: usize,
    /// Node the amplitude is read from.
    pub from: usize,
    /// Hopping amplitude.
    pub hopping: Complex64,
}

/// An onsite term of the motif.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotifOnsite {
    /// Node carrying the energy.
    pub node: usize,
    /// Onsite energy.
    pub value: Complex64,
}

/// One structural disorder pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct DefectMotif {
    concentration: f64,
    positions: Vec<usize>,
    bonds: Vec<MotifBond>,
    onsite: Vec<MotifOnsite>,
}

/// Packs a node displacement (each component in `{-1, 0, 1}`) and orbital.
pub fn pack_node_position(displacement: &[isize], orbital: usize) -> usize {
    let mut position = 0usize;
    let mut stride = 1usize;
    for &d in displacement {
        debug_assert!((-1..=1).contains(&d), "motif displacement {d} outside -1..=1");
        position += (d + 1) as usize * stride;
        stride *= 3;
    }
    position + orbital * stride
}

impl DefectMotif {
    /// Creates a motif after checking that every reference is consistent.
    ///
    /// # Errors
    ///
    /// Fails if the concentration is outside `(0, 1]`, there are no nodes, or
    /// a bond or onsite term names a node that does not exist.
    pub fn new(
        concentration: f64,
        positions: Vec<usize>,
        bonds: Vec<MotifBond>,
        onsite: Vec<MotifOnsite>,
    ) -> Result<Self, MotifError> {
        if !(concentration > 0.0 && concentration <= 1.0) {
            return Err(MotifError::Concentration(concentration));
        }
        if positions.is_empty() {
            return Err(MotifError::NoNodes);
        }
        let nodes = positions.len();
        let check = |what: &'static str, index: usize| {
            if index < nodes {
                Ok(())
            } else {
                Err(MotifError::NodeIndex { what, index, nodes })
            }
        };
        for bond in &bonds {
            check("bond `to`", bond.to)?;
            check("bond `from`", bond.from)?;
        }
        for term in &onsite {
            check("onsite term", term.node)?;
        }

        Ok(Self {
            concentration,
            positions,
            bonds,
            onsite,
        })
    }

    /// Reads a motif from the fields under `group`.
    ///
    /// Fields: `Concentration`, `NumNodes`, `NodePosition`, `NumBondDisorder`,
    /// `NodeTo`, `NodeFrom`, `Hopping`, `NumOnsiteDisorder`, `NodeOnsite`, `U0`.
    /// Bond and onsite arrays may be absent when their count is zero.
    pub fn load(store: &impl HierarchicalStore, group: &str) -> Result<Self, MotifError> {
        let field = |name: &str| format!("{group}/{name}");

        let concentration = store.read_f64(&field("Concentration"))?;
        let nodes = store.read_count(&field("NumNodes"))?;
        let positions = read_exact(store, &field("NodePosition"), nodes, |s, p| s.read_indices(p))?;

        let bond_count = store.read_count(&field("NumBondDisorder"))?;
        let to = read_exact(store, &field("NodeTo"), bond_count, |s, p| s.read_indices(p))?;
        let from = read_exact(store, &field("NodeFrom"), bond_count, |s, p| s.read_indices(p))?;
        let hopping = read_exact(store, &field("Hopping"), bond_count, |s, p| s.read_complex(p))?;
        let bonds = (0..bond_count)
            .map(|i| MotifBond {
                to: to[i],
                from: from[i],
                hopping: hopping[i],
            })
            .collect();

        let onsite_count = store.read_count(&field("NumOnsiteDisorder"))?;
        let node = read_exact(store, &field("NodeOnsite"), onsite_count, |s, p| s.read_indices(p))?;
        let value = read_exact(store, &field("U0"), onsite_count, |s, p| s.read_complex(p))?;
        let onsite = (0..onsite_count)
            .map(|i| MotifOnsite {
                node: node[i],
                value: value[i],
            })
            .collect();

        Self::new(concentration, positions, bonds, onsite)
    }

    /// Reads every motif stored as `group/Format0`, `group/Format1`, … until
    /// the first missing index.
    pub fn load_all(store: &impl HierarchicalStore, group: &str) -> Result<Vec<Self>, MotifError> {
        let mut motifs = Vec::new();
        loop {
            let sub = format!("{group}/Format{}", motifs.len());
            if !store.contains(&format!("{sub}/Concentration")) {
                break;
            }
            motifs.push(Self::load(store, &sub)?);
        }
        Ok(motifs)
    }

    /// Writes the motif under `group` in the layout [`load`](Self::load) reads.
    pub fn write(&self, store: &mut impl HierarchicalStore, group: &str) {
        let field = |name: &str| format!("{group}/{name}");
        let ints = |values: Vec<usize>| Dataset::Integer(values.into_iter().map(|v| v as i64).collect());

        store.write(&field("Concentration"), Dataset::Real(vec![self.concentration]));
        store.write(&field("NumNodes"), ints(vec![self.positions.len()]));
        store.write(&field("NodePosition"), ints(self.positions.clone()));
        store.write(&field("NumBondDisorder"), ints(vec![self.bonds.len()]));
        store.write(&field("NodeTo"), ints(self.bonds.iter().map(|b| b.to).collect()));
        store.write(&field("NodeFrom"), ints(self.bonds.iter().map(|b| b.from).collect()));
        store.write(&field("Hopping"), Dataset::Complex(self.bonds.iter().map(|b| b.hopping).collect()));
        store.write(&field("NumOnsiteDisorder"), ints(vec![self.onsite.len()]));
        store.write(&field("NodeOnsite"), ints(self.onsite.iter().map(|t| t.node).collect()));
        store.write(&field("U0"), Dataset::Complex(self.onsite.iter().map(|t| t.value).collect()));
    }

    /// Fraction of unit cells that anchor one copy of the motif.
    pub fn concentration(&self) -> f64 {
        self.concentration
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    /// Packed node positions.
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Bonds.
    pub fn bonds(&self) -> &[MotifBond] {
        &self.bonds
    }

    /// Onsite terms.
    pub fn onsite(&self) -> &[MotifOnsite] {
        &self.onsite
    }

    /// Converts packed node positions into linear deltas of the domain layout.
    ///
    /// Adding a delta to the local index of an anchor cell (orbital 0) gives
    /// the local index of the node.
    ///
    /// # Errors
    ///
    /// Fails if a packed position lies outside the motif basis.
    pub fn node_offsets(&self, geometry: &LatticeGeometry) -> Result<Vec<isize>, MotifError> {
        let dim = geometry.dim();
        let basis = Layout::new(&[3; MAX_DIM][..dim], geometry.orbitals());
        let local = geometry.local_layout();

        self.positions
            .iter()
            .map(|&position| {
                if position >= basis.size() {
                    return Err(MotifError::Position {
                        position,
                        basis: basis.size(),
                    });
                }
                let mut site = basis.site(position);
                for c in &mut site[..dim] {
                    *c -= 1;
                }
                Ok(local.index(&site))
            })
            .collect()
    }
}

fn read_exact<S, T>(
    store: &S,
    path: &str,
    expected: usize,
    read: impl Fn(&S, &str) -> Result<Vec<T>, StoreError>,
) -> Result<Vec<T>, StoreError>
where
    S: HierarchicalStore + ?Sized,
{
    if expected == 0 && !store.contains(path) {
        return Ok(Vec::new());
    }
    let values = read(store, path)?;
    if values.len() != expected {
        return Err(StoreError::WrongLength {
            path: path.to_owned(),
            expected,
            found: values.len(),
        });
    }
    Ok(values)
}
