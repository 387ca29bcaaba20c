//! Peierls phases of motif bonds.
//!
//! With a gauge field the hopping of a bond picks up a phase that depends on
//! where the bond sits. For motif bonds the dependence is only through the
//! coordinate along the last axis ("slice"), so the phased amplitudes are
//! tabulated once per bond and per slice and looked up in the multiply loop.
//!
//! For a bond from node `b` to node `a` at slice `s`:
//!
//! ```text
//!   ΔR = A (x_a - x_b)          lattice part of the bond vector
//!   ΔO = o_a - o_b              orbital part
//!   ΣO = o_a + o_b
//!   r  = A X_a                  absolute position of node a
//!
//!   φ1 =  ½ (ΔR + ΣO) · M (ΔR + ΔO)
//!   φ2 = -ΔR · M o_a
//!   φ3 = -ΔR · M r
//!
//!   t(s) = t · exp(i (φ1 + φ2 + φ3))   interior slices
//!   t(s) = t · exp(i (φ1 + φ2))        ghost-margin slices
//! ```
//!
//! where `A` holds the lattice vectors and `M` is the gauge tensor in lattice
//! coordinates ([`LatticeGeometry::gauge_metric`]).

use nalgebra::DVector;
use num_complex::Complex64;

use super::motif::DefectMotif;
use crate::lattice::{LatticeGeometry, LatticeIndexer, MAX_DIM, NGHOSTS};

/// Phased hopping amplitude per bond and slice.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTable {
    slices: usize,
    /// `bonds × slices`, bond-major.
    values: Vec<Complex64>,
}

impl PhaseTable {
    /// Tabulates the phased hoppings of every motif bond for this domain.
    pub fn build(motif: &DefectMotif, offsets: &[isize], indexer: &LatticeIndexer) -> Self {
        let geometry = indexer.geometry();
        let layout = indexer.local_layout();
        let dim = geometry.dim();
        let last = dim - 1;
        let slices = layout.dims()[last];
        let metric = geometry.gauge_metric();

        let mut values = vec![Complex64::new(0.0, 0.0); motif.bonds().len() * slices];

        for (ib, bond) in motif.bonds().iter().enumerate() {
            let row = &mut values[ib * slices..(ib + 1) * slices];
            let mut reduced = 0.0;

            for slice in NGHOSTS..slices - NGHOSTS {
                let mut base = [0isize; MAX_DIM + 1];
                for c in &mut base[..dim] {
                    *c = NGHOSTS as isize;
                }
                base[last] = slice as isize;
                let ip = layout.index(&base);

                let a = (ip + offsets[bond.to]) as usize;
                let b = (ip + offsets[bond.from]) as usize;
                let (site_a, site_b) = (layout.site(a), layout.site(b));

                let mut cells = [0isize; MAX_DIM];
                for axis in 0..dim {
                    cells[axis] = site_a[axis] - site_b[axis];
                }
                let dif_r = geometry.cartesian(&cells);
                let o_a = geometry.orbital_position(site_a[dim] as usize);
                let o_b = geometry.orbital_position(site_b[dim] as usize);
                let dif_o = &o_a - &o_b;
                let sum_o = &o_a + &o_b;
                let r_a = geometry.cartesian(&indexer.global_site(a)[..dim]);

                let phase1 = 0.5 * (&dif_r + &sum_o).dot(&(metric * (&dif_r + &dif_o)));
                let phase2 = -dif_r.dot(&(metric * &o_a));
                let phase3 = -dif_r.dot(&(metric * &r_a));

                row[slice] = bond.hopping * Complex64::cis(phase1 + phase2 + phase3);
                reduced = phase1 + phase2;
            }

            let margin = bond.hopping * Complex64::cis(reduced);
            for slice in (0..NGHOSTS).chain(slices - NGHOSTS..slices) {
                row[slice] = margin;
            }
        }

        Self { slices, values }
    }

    /// Number of slices along the last axis.
    #[inline]
    pub fn slices(&self) -> usize {
        self.slices
    }

    /// Phased hopping of `bond` at `slice`.
    #[inline]
    pub fn get(&self, bond: usize, slice: usize) -> Complex64 {
        self.values[bond * self.slices + slice]
    }
}

/// Phase of a bond that crosses a domain boundary.
///
/// Uses the absolute coordinates of both endpoints and the `(0, 1)` component
/// of the gauge tensor only. Zero in one dimension.
pub fn border_phase(geometry: &LatticeGeometry, source: &[isize], target: &[isize]) -> f64 {
    if geometry.dim() < 2 {
        return 0.0;
    }
    (target[0] - source[0]) as f64 * geometry.gauge()[(0, 1)] * source[1] as f64
}

/// Cartesian vector from `tail` to `head` including the orbital part.
pub(crate) fn bond_vector(geometry: &LatticeGeometry, head: &[isize], tail: &[isize]) -> DVector<f64> {
    let dim = geometry.dim();
    let mut cells = [0isize; MAX_DIM];
    for axis in 0..dim {
        cells[axis] = head[axis] - tail[axis];
    }
    geometry.cartesian(&cells) + geometry.orbital_position(head[dim] as usize)
        - geometry.orbital_position(tail[dim] as usize)
}
