//! Application of placed defects to a state vector.
//!
//! Every entry point accumulates into `out`; nothing is overwritten. The
//! coefficient `MULT + 1` and the velocity mode are const generics so the
//! per-bond loop carries no branch. Runtime selection goes through
//! [`DefectTerm`], dispatched once per call.

use num_complex::Complex64;

use super::engine::DisorderPlacementEngine;
use super::phase::border_phase;

/// Multiplier applied to a defect term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coefficient {
    /// `× 1`
    One,
    /// `× 2`
    Two,
    /// `× 3`
    Three,
}

/// Which operator the defect terms build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorMode {
    /// Plain Hamiltonian: bonds and onsite terms.
    Hamiltonian,
    /// Generalized velocity: bonds only, weighted by a velocity slot.
    Velocity,
}

/// One of the six `(coefficient, mode)` combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefectTerm {
    /// Multiplier.
    pub coefficient: Coefficient,
    /// Operator.
    pub mode: OperatorMode,
}

impl DefectTerm {
    /// Every combination, in application order.
    pub const ALL: [DefectTerm; 6] = [
        DefectTerm::new(Coefficient::One, OperatorMode::Hamiltonian),
        DefectTerm::new(Coefficient::One, OperatorMode::Velocity),
        DefectTerm::new(Coefficient::Two, OperatorMode::Hamiltonian),
        DefectTerm::new(Coefficient::Two, OperatorMode::Velocity),
        DefectTerm::new(Coefficient::Three, OperatorMode::Hamiltonian),
        DefectTerm::new(Coefficient::Three, OperatorMode::Velocity),
    ];

    /// Creates a term.
    pub const fn new(coefficient: Coefficient, mode: OperatorMode) -> Self {
        Self { coefficient, mode }
    }
}

/// Forwards to the monomorphized method matching a [`DefectTerm`].
macro_rules! dispatch_term {
    ($term:expr, $self:ident . $method:ident ( $($arg:expr),* )) => {
        match ($term.coefficient, $term.mode) {
            (Coefficient::One, OperatorMode::Hamiltonian) => $self.$method::<0, false>($($arg),*),
            (Coefficient::One, OperatorMode::Velocity) => $self.$method::<0, true>($($arg),*),
            (Coefficient::Two, OperatorMode::Hamiltonian) => $self.$method::<1, false>($($arg),*),
            (Coefficient::Two, OperatorMode::Velocity) => $self.$method::<1, true>($($arg),*),
            (Coefficient::Three, OperatorMode::Hamiltonian) => $self.$method::<2, false>($($arg),*),
            (Coefficient::Three, OperatorMode::Velocity) => $self.$method::<2, true>($($arg),*),
        }
    };
}

impl DisorderPlacementEngine {
    /// Applies the defects anchored in `tile`.
    ///
    /// For every anchor `a` and bond `k`:
    /// `out[a + off(to)] += (MULT + 1) · w · t_k(slice(a)) · inp[a + off(from)]`,
    /// with `w` the weight of `k` in velocity `slot` when `VELOCITY`, else 1.
    /// Without `VELOCITY`, onsite terms add `(MULT + 1) · U · inp[site]`.
    /// `slot` is ignored without `VELOCITY`.
    pub fn multiply_defect<const MULT: usize, const VELOCITY: bool>(
        &self,
        tile: usize,
        out: &mut [Complex64],
        inp: &[Complex64],
        slot: usize,
    ) {
        let coefficient = (MULT + 1) as f64;
        let weights: &[f64] = if VELOCITY { self.velocity.local(slot) } else { &[] };
        let layout = self.indexer.local_layout();
        let last = layout.dim() - 1;
        let bonds = self.motif.bonds();

        for &anchor in &self.anchors[tile] {
            let slice = layout.site(anchor)[last] as usize;
            let base = anchor as isize;

            for (k, bond) in bonds.iter().enumerate() {
                let to = (base + self.offsets[bond.to]) as usize;
                let from = (base + self.offsets[bond.from]) as usize;
                debug_assert!(to < out.len() && from < inp.len(), "defect bond leaves the buffer");

                let w = if VELOCITY { coefficient * weights[k] } else { coefficient };
                out[to] += w * self.phase.get(k, slice) * inp[from];
            }

            if !VELOCITY {
                for term in self.motif.onsite() {
                    let site = (base + self.offsets[term.node]) as usize;
                    debug_assert!(site < out.len(), "defect onsite term leaves the buffer");
                    out[site] += coefficient * term.value * inp[site];
                }
            }
        }
    }

    /// Applies the terms received from neighboring domains.
    ///
    /// Same accumulation as [`multiply_defect`](Self::multiply_defect), with
    /// the boundary phase recomputed from the absolute coordinates of both
    /// endpoints.
    pub fn multiply_broken_defect<const MULT: usize, const VELOCITY: bool>(
        &self,
        out: &mut [Complex64],
        inp: &[Complex64],
        slot: usize,
    ) {
        let coefficient = (MULT + 1) as f64;
        let weights: &[f64] = if VELOCITY { self.velocity.border(slot) } else { &[] };
        let geometry = self.indexer.geometry();
        let dim = geometry.dim();

        for (i, bond) in self.border.bonds.iter().enumerate() {
            debug_assert!(bond.source < out.len() && bond.target < inp.len(), "border bond leaves the buffer");
            let source = self.indexer.global_site(bond.source);
            let target = self.indexer.global_site(bond.target);
            let phase = Complex64::cis(border_phase(geometry, &source[..dim], &target[..dim]));

            let w = if VELOCITY { coefficient * weights[i] } else { coefficient };
            out[bond.source] += w * bond.hopping * inp[bond.target] * phase;
        }

        if !VELOCITY {
            for term in &self.border.onsite {
                out[term.site] += coefficient * term.value * inp[term.site];
            }
        }
    }

    /// Applies one [`DefectTerm`] of the defects anchored in `tile`.
    pub fn apply_defect(&self, term: DefectTerm, tile: usize, out: &mut [Complex64], inp: &[Complex64], slot: usize) {
        dispatch_term!(term, self.multiply_defect(tile, out, inp, slot))
    }

    /// Applies one [`DefectTerm`] of the received border terms.
    pub fn apply_broken_defect(&self, term: DefectTerm, out: &mut [Complex64], inp: &[Complex64], slot: usize) {
        dispatch_term!(term, self.multiply_broken_defect(out, inp, slot))
    }

    /// Applies all six combinations of [`DefectTerm::ALL`] to `tile`.
    pub fn interface_multiply_defect(&self, tile: usize, out: &mut [Complex64], inp: &[Complex64], slot: usize) {
        self.multiply_defect::<0, false>(tile, out, inp, slot);
        self.multiply_defect::<0, true>(tile, out, inp, slot);
        self.multiply_defect::<1, false>(tile, out, inp, slot);
        self.multiply_defect::<1, true>(tile, out, inp, slot);
        self.multiply_defect::<2, false>(tile, out, inp, slot);
        self.multiply_defect::<2, true>(tile, out, inp, slot);
    }

    /// Applies all six combinations of [`DefectTerm::ALL`] to the border terms.
    pub fn interface_multiply_broken_defect(&self, out: &mut [Complex64], inp: &[Complex64], slot: usize) {
        self.multiply_broken_defect::<0, false>(out, inp, slot);
        self.multiply_broken_defect::<0, true>(out, inp, slot);
        self.multiply_broken_defect::<1, false>(out, inp, slot);
        self.multiply_broken_defect::<1, true>(out, inp, slot);
        self.multiply_broken_defect::<2, false>(out, inp, slot);
        self.multiply_broken_defect::<2, true>(out, inp, slot);
    }
}
