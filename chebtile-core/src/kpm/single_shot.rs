//! Single-shot longitudinal dc conductivity.
//!
//! For every job `(E, γ, preserve, M)` and every random vector `|φ₀⟩`:
//!
//! ```text
//! |φ⟩    = V₀ |φ₀⟩
//! |L⟩    = V₁ Σₙ<M wₙ Tₙ(H) |φ⟩        ghosts zeroed
//! |R⟩    =    Σₙ<M wₙ Tₙ(H) |φ₀⟩
//! σ     += running mean of ⟨L|R⟩
//! ```
//!
//! with `wₙ = Im green(n, +1, E + iγ) / (1 + [n = 0])`. The domain averages
//! are summed across domains at the end and scaled by
//! `−2 · spin degeneracy · orbitals / unit cell area`.

use std::ops::Range;
use std::sync::Arc;

use num_complex::Complex64;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::average::RunningAverage;
use super::green::moment_weight;
use super::halo::HaloExchange;
use super::hamiltonian::{DisorderedHamiltonian, PristineHamiltonian, ZeroPristine};
use super::vector::KpmVector;
use crate::defect::{ConflictTable, DefectMotif, VacancyMap};
use crate::error::TransportError;
use crate::lattice::{LatticeGeometry, LatticeIndexer};
use crate::store::HierarchicalStore;
use crate::sync::{DomainContext, DomainPool, SharedSection};

/// States per orbital.
pub const SPIN_DEGENERACY: usize = 1;

/// One point of the conductivity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SingleShotJob {
    /// Energy in units of the energy scale, inside `(-1, 1)`.
    pub energy: f64,
    /// Broadening in units of the energy scale.
    pub gamma: f64,
    /// Reuse the current realization instead of drawing a new one.
    pub preserve_disorder: bool,
    /// Chebyshev moments.
    pub moments: usize,
}

/// Configuration of a single-shot run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SingleShotConfig {
    /// Factor converting rescaled energies back to physical units.
    pub energy_scale: f64,
    /// Points of the conductivity curve.
    pub jobs: Vec<SingleShotJob>,
    /// Axes of the two velocity legs, e.g. `"x,x"`.
    pub directions: String,
    /// Random vectors per realization and job.
    pub num_random: usize,
    /// Disorder realizations.
    pub num_disorder: usize,
    /// Dataset the table is written to.
    pub label: String,
    /// Split the moment loop into this many segments and log an estimate
    /// after each. 1 disables the diagnostic.
    pub convergence_segments: usize,
    /// Seed of the per-domain random streams.
    pub seed: u64,
}

impl Default for SingleShotConfig {
    fn default() -> Self {
        Self {
            energy_scale: 1.0,
            jobs: Vec::new(),
            directions: "x,x".to_owned(),
            num_random: 1,
            num_disorder: 1,
            label: "SingleShot".to_owned(),
            convergence_segments: 1,
            seed: 0,
        }
    }
}

/// Parses `"x,x"`-style directions into the axis lists of the two legs.
///
/// Each leg is a non-empty run of `x`, `y` or `z`.
pub fn parse_directions(directions: &str) -> Result<[Vec<usize>; 2], TransportError> {
    let invalid = || TransportError::Direction(directions.to_owned());
    let legs = directions
        .split(',')
        .map(|leg| {
            let axes = leg
                .trim()
                .chars()
                .map(|c| match c {
                    'x' => Some(0),
                    'y' => Some(1),
                    'z' => Some(2),
                    _ => None,
                })
                .collect::<Option<Vec<usize>>>()?;
            (!axes.is_empty()).then_some(axes)
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(invalid)?;

    <[Vec<usize>; 2]>::try_from(legs).map_err(|_| invalid())
}

/// One row of the result table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConductivityPoint {
    /// Energy in physical units.
    pub energy: f64,
    /// Broadening in physical units.
    pub broadening: f64,
    /// Chebyshev moments used.
    pub moments: usize,
    /// Real part of the conductivity.
    pub conductivity: f64,
}

/// The conductivity curve of one run, in job order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConductivityTable {
    /// One point per job.
    pub points: Vec<ConductivityPoint>,
}

impl ConductivityTable {
    /// The `4 × N` row-major layout: energies, broadenings, moments,
    /// conductivities.
    pub fn to_rows(&self) -> Vec<f64> {
        let n = self.points.len();
        let mut data = vec![0.0; 4 * n];
        for (j, p) in self.points.iter().enumerate() {
            data[j] = p.energy;
            data[n + j] = p.broadening;
            data[2 * n + j] = p.moments as f64;
            data[3 * n + j] = p.conductivity;
        }
        data
    }

    /// Writes the table under `label`, replacing any previous dataset.
    pub fn write<S: HierarchicalStore + ?Sized>(&self, store: &mut S, label: &str) {
        store.write_matrix(label, 4, self.points.len(), self.to_rows());
    }
}

/// Supplies the per-domain collaborators of a run.
pub trait DomainModel {
    /// Pristine Hamiltonian type.
    type Pristine: PristineHamiltonian;

    /// Pristine Hamiltonian of one domain.
    fn pristine(&self, indexer: &LatticeIndexer) -> Self::Pristine;

    /// Vacancies of one domain. None by default.
    fn vacancies(&self, indexer: &LatticeIndexer) -> VacancyMap {
        VacancyMap::empty(indexer)
    }
}

/// A model with no pristine Hamiltonian and no vacancies: defects only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefectsOnly;

impl DomainModel for DefectsOnly {
    type Pristine = ZeroPristine;

    fn pristine(&self, _: &LatticeIndexer) -> ZeroPristine {
        ZeroPristine
    }
}

struct DomainState<P> {
    hamiltonian: DisorderedHamiltonian<P>,
    rng: Xoshiro256PlusPlus,
}

struct Shared {
    table: SharedSection<ConflictTable>,
    halo: HaloExchange,
    accumulator: SharedSection<Vec<Complex64>>,
    partial: SharedSection<Complex64>,
}

struct Workspace {
    phi0: KpmVector,
    left_rec: KpmVector,
    right_rec: KpmVector,
    relay: KpmVector,
    left: KpmVector,
    acc_left: Vec<Complex64>,
    acc_right: Vec<Complex64>,
}

impl Workspace {
    fn new(len: usize) -> Self {
        Self {
            phi0: KpmVector::new(1, len),
            left_rec: KpmVector::new(2, len),
            right_rec: KpmVector::new(2, len),
            relay: KpmVector::new(1, len),
            left: KpmVector::new(1, len),
            acc_left: vec![Complex64::new(0.0, 0.0); len],
            acc_right: vec![Complex64::new(0.0, 0.0); len],
        }
    }
}

/// `Σ conj(left) · right`, summed block by block over rows of `row` entries.
pub fn row_blocked_dot(left: &[Complex64], right: &[Complex64], row: usize) -> Complex64 {
    left.chunks(row)
        .zip(right.chunks(row))
        .map(|(l, r)| l.iter().zip(r).map(|(a, b)| a.conj() * *b).sum::<Complex64>())
        .sum()
}

/// Splits `0..moments` into `count` consecutive ranges; the last absorbs the
/// remainder.
fn segments(moments: usize, count: usize) -> Vec<Range<usize>> {
    let count = count.clamp(1, moments.max(1));
    let size = moments / count;
    (0..count)
        .map(|s| s * size..if s + 1 == count { moments } else { (s + 1) * size })
        .collect()
}

/// Runs the single-shot conductivity over every domain of a lattice.
#[derive(Debug, Clone)]
pub struct ChebyshevTransportKernel {
    config: SingleShotConfig,
    legs: [Vec<usize>; 2],
}

impl ChebyshevTransportKernel {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`TransportError::NoJobs`] for an empty job list
    /// - [`TransportError::NoMoments`] for a job with zero moments
    /// - [`TransportError::Direction`] for an unparsable direction string
    /// - [`TransportError::NonLongitudinal`] when the legs start on different axes
    pub fn new(config: SingleShotConfig) -> Result<Self, TransportError> {
        if config.jobs.is_empty() {
            return Err(TransportError::NoJobs);
        }
        if let Some(j) = config.jobs.iter().position(|job| job.moments == 0) {
            return Err(TransportError::NoMoments(j));
        }
        let legs = parse_directions(&config.directions)?;
        if legs[0][0] != legs[1][0] {
            return Err(TransportError::NonLongitudinal {
                left: legs[0][0],
                right: legs[1][0],
            });
        }
        Ok(Self { config, legs })
    }

    /// The validated configuration.
    pub fn config(&self) -> &SingleShotConfig {
        &self.config
    }

    /// Velocity axes of the two legs.
    pub fn legs(&self) -> &[Vec<usize>; 2] {
        &self.legs
    }

    /// Runs every job and writes the table under the configured label.
    ///
    /// One worker thread per domain. `model` supplies the pristine
    /// Hamiltonian and vacancies of each domain; `motifs` are placed anew
    /// for every realization.
    pub fn run<M, S>(
        &self,
        geometry: &Arc<LatticeGeometry>,
        motifs: &[DefectMotif],
        model: &M,
        store: &mut S,
    ) -> Result<ConductivityTable, TransportError>
    where
        M: DomainModel,
        S: HierarchicalStore + ?Sized,
    {
        let dim = geometry.dim();
        if let Some(&axis) = self.legs.iter().flatten().find(|&&axis| axis >= dim) {
            return Err(TransportError::AxisOutOfRange { axis, dim });
        }

        let mut stream = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);
        let mut states = Vec::with_capacity(geometry.domain_count());
        for indexer in LatticeIndexer::all(geometry) {
            let indexer = Arc::new(indexer);
            let pristine = model.pristine(&indexer);
            let vacancies = model.vacancies(&indexer);
            let hamiltonian = DisorderedHamiltonian::new(Arc::clone(&indexer), pristine, motifs, vacancies)?;
            states.push(DomainState {
                hamiltonian,
                rng: stream.clone(),
            });
            stream.jump();
        }

        let domains = states.len();
        let factor = -2.0 * (SPIN_DEGENERACY * geometry.orbitals()) as f64 / geometry.unit_cell_area();
        let shared = Shared {
            table: SharedSection::new(ConflictTable::new()),
            halo: HaloExchange::new(domains),
            accumulator: SharedSection::new(Vec::new()),
            partial: SharedSection::new(Complex64::new(0.0, 0.0)),
        };

        info!(
            domains,
            jobs = self.config.jobs.len(),
            realizations = self.config.num_disorder,
            random_vectors = self.config.num_random,
            directions = %self.config.directions,
            "single-shot run started"
        );

        let results = DomainPool::new(domains).run(states, |ctx, state| self.worker(ctx, state, &shared, factor));

        let mut table = None;
        let mut failure = None;
        for result in results {
            match result {
                Ok(Some(t)) => table = Some(t),
                Ok(None) | Err(TransportError::PeerAborted) => {}
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }
        let table = table.ok_or(TransportError::PeerAborted)?;

        table.write(store, &self.config.label);
        for p in &table.points {
            info!(
                energy = p.energy,
                broadening = p.broadening,
                moments = p.moments,
                conductivity = p.conductivity,
                "single-shot conductivity"
            );
        }
        Ok(table)
    }

    fn worker<P: PristineHamiltonian>(
        &self,
        ctx: DomainContext<'_>,
        mut state: DomainState<P>,
        shared: &Shared,
        factor: f64,
    ) -> Result<Option<ConductivityTable>, TransportError> {
        let jobs = &self.config.jobs;
        let mut work = Workspace::new(state.hamiltonian.indexer().local_layout().size());
        let mut averages = vec![RunningAverage::new(); jobs.len()];

        for disorder in 0..self.config.num_disorder {
            self.realize(&ctx, &mut state, shared)?;

            for (j, job) in jobs.iter().enumerate() {
                if !job.preserve_disorder {
                    self.realize(&ctx, &mut state, shared)?;
                }
                for _ in 0..self.config.num_random {
                    let sample = self.sample(&ctx, &state.hamiltonian, &mut state.rng, shared, &mut work, job, factor);
                    averages[j].push(sample);
                }
                debug!(domain = ctx.id(), disorder, job = j, samples = averages[j].count(), "job realization done");
            }
        }

        ctx.master(&shared.accumulator, |acc| {
            acc.clear();
            acc.resize(jobs.len(), Complex64::new(0.0, 0.0));
        });
        ctx.critical(&shared.accumulator, |acc| {
            for (total, average) in acc.iter_mut().zip(&averages) {
                *total += average.mean();
            }
        });
        // The totals leave the accumulator with the table; the next reduction
        // starts from the empty vector.
        let table = ctx.master(&shared.accumulator, |acc| {
            let totals = std::mem::take(acc);
            let points = jobs
                .iter()
                .zip(totals)
                .map(|(job, total)| ConductivityPoint {
                    energy: job.energy * self.config.energy_scale,
                    broadening: job.gamma * self.config.energy_scale,
                    moments: job.moments,
                    conductivity: (total * factor).re,
                })
                .collect();
            ConductivityTable { points }
        });
        Ok(table)
    }

    fn realize<P: PristineHamiltonian>(
        &self,
        ctx: &DomainContext<'_>,
        state: &mut DomainState<P>,
        shared: &Shared,
    ) -> Result<(), TransportError> {
        let result = state.hamiltonian.generate_disorder(ctx, &shared.table, &mut state.rng);
        if ctx.any_failed(result.is_err()) {
            return Err(match result {
                Err(e) => e.into(),
                Ok(()) => TransportError::PeerAborted,
            });
        }
        state.hamiltonian.build_velocity(&self.legs[0], 0);
        state.hamiltonian.build_velocity(&self.legs[1], 1);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn sample<P: PristineHamiltonian, R: Rng + ?Sized>(
        &self,
        ctx: &DomainContext<'_>,
        ham: &DisorderedHamiltonian<P>,
        rng: &mut R,
        shared: &Shared,
        work: &mut Workspace,
        job: &SingleShotJob,
        factor: f64,
    ) -> Complex64 {
        let indexer = ham.indexer();
        let halo = &shared.halo;
        let energy = Complex64::new(job.energy, job.gamma);
        let row = indexer.local_layout().dims()[0];

        work.phi0.initiate_random(rng, indexer);
        work.phi0.exchange_boundaries(ctx, halo, indexer);

        work.left_rec.set_index(0);
        ham.velocity(work.left_rec.slot_mut(0), work.phi0.current(), 0);
        work.left_rec.exchange_boundaries(ctx, halo, indexer);

        work.right_rec.set_index(0);
        work.right_rec.slot_mut(0).copy_from_slice(work.phi0.current());

        work.acc_left.fill(Complex64::new(0.0, 0.0));
        work.acc_right.fill(Complex64::new(0.0, 0.0));

        let segments = segments(job.moments, self.config.convergence_segments);
        let last = segments.len() - 1;
        let mut estimate = Complex64::new(0.0, 0.0);

        for (s, range) in segments.into_iter().enumerate() {
            accumulate(ctx, ham, halo, &mut work.left_rec, &mut work.acc_left, range.clone(), energy);

            work.relay.slot_mut(0).copy_from_slice(&work.acc_left);
            work.relay.exchange_boundaries(ctx, halo, indexer);
            ham.velocity(work.left.slot_mut(0), work.relay.current(), 1);
            work.left.empty_ghosts(0, indexer);

            accumulate(ctx, ham, halo, &mut work.right_rec, &mut work.acc_right, range.clone(), energy);

            estimate = row_blocked_dot(work.left.current(), &work.acc_right, row);
            if s < last {
                report_partial(ctx, shared, job, range.end, estimate, factor, self.config.energy_scale);
            }
        }
        estimate
    }
}

/// Advances `rec` through `range` and adds `wₙ Tₙ` into `acc`.
fn accumulate<P: PristineHamiltonian>(
    ctx: &DomainContext<'_>,
    ham: &DisorderedHamiltonian<P>,
    halo: &HaloExchange,
    rec: &mut KpmVector,
    acc: &mut [Complex64],
    range: Range<usize>,
    energy: Complex64,
) {
    for n in range {
        if n > 0 {
            ham.cheb_iteration(ctx, halo, rec, n - 1);
        }
        let w = moment_weight(n, energy);
        for (a, t) in acc.iter_mut().zip(rec.current()) {
            *a += w * *t;
        }
    }
}

/// Sums the partial estimate across domains and logs it from the master.
#[allow(clippy::too_many_arguments)]
fn report_partial(
    ctx: &DomainContext<'_>,
    shared: &Shared,
    job: &SingleShotJob,
    moments: usize,
    estimate: Complex64,
    factor: f64,
    energy_scale: f64,
) {
    ctx.critical(&shared.partial, |p| *p += estimate);
    ctx.master(&shared.partial, |p| {
        info!(
            energy = job.energy * energy_scale,
            broadening = job.gamma * energy_scale,
            moments,
            conductivity = (*p * factor).re,
            "partial single-shot estimate"
        );
        *p = Complex64::new(0.0, 0.0);
    });
}
