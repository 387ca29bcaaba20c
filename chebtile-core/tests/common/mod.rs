//! Shared test utilities for chebtile-core tests.
//!
//! Lattice and motif constructors, a driver that runs one disorder
//! realization on every domain, and a dense reference for the defect
//! Hamiltonian.

#![allow(dead_code)] // Not all test files use all functions

use std::collections::HashMap;
use std::sync::Arc;

use chebtile_core::defect::{ConflictTable, CrossMosaicFlags, DefectMotif, DisorderPlacementEngine, MotifBond, MotifOnsite, VacancyMap, pack_node_position};
use chebtile_core::kpm::{DisorderedHamiltonian, PristineHamiltonian, ZeroPristine};
use chebtile_core::lattice::{LatticeBuilder, LatticeGeometry, LatticeIndexer};
use chebtile_core::sync::{DomainPool, SharedSection};
use num_complex::Complex64;
use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Installs a `tracing` subscriber once; `RUST_LOG` controls the output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Periodic square lattice with unit vectors.
pub fn square(lengths: &[usize], divisions: &[usize]) -> Arc<LatticeGeometry> {
    Arc::new(
        LatticeBuilder::new()
            .lengths(lengths)
            .divisions(divisions)
            .build()
            .expect("valid square lattice"),
    )
}

/// Square lattice open along axis 0, periodic along the others.
pub fn open_x(lengths: &[usize], divisions: &[usize]) -> Arc<LatticeGeometry> {
    let mut periodic = vec![true; lengths.len()];
    periodic[0] = false;
    Arc::new(
        LatticeBuilder::new()
            .lengths(lengths)
            .divisions(divisions)
            .periodic(&periodic)
            .build()
            .expect("valid open lattice"),
    )
}

/// One node at the anchor carrying onsite energy `u0`.
pub fn onsite_motif(dim: usize, concentration: f64, u0: f64) -> DefectMotif {
    DefectMotif::new(
        concentration,
        vec![pack_node_position(&vec![0; dim], 0)],
        Vec::new(),
        vec![MotifOnsite {
            node: 0,
            value: Complex64::new(u0, 0.0),
        }],
    )
    .expect("valid onsite motif")
}

/// Node 0 at the anchor, node 1 one cell along +x, one bond `H[1, 0] = t`.
pub fn dimer_motif(dim: usize, concentration: f64, t: Complex64) -> DefectMotif {
    let mut shift = vec![0; dim];
    shift[0] = 1;
    DefectMotif::new(
        concentration,
        vec![pack_node_position(&vec![0; dim], 0), pack_node_position(&shift, 0)],
        vec![MotifBond { to: 1, from: 0, hopping: t }],
        Vec::new(),
    )
    .expect("valid dimer motif")
}

/// A hermitian dimer: both bond directions plus onsite terms on each node.
pub fn hermitian_dimer(dim: usize, concentration: f64) -> DefectMotif {
    let mut shift = vec![0; dim];
    shift[0] = 1;
    let t = Complex64::new(-0.7, 0.2);
    DefectMotif::new(
        concentration,
        vec![pack_node_position(&vec![0; dim], 0), pack_node_position(&shift, 0)],
        vec![
            MotifBond { to: 1, from: 0, hopping: t },
            MotifBond { to: 0, from: 1, hopping: t.conj() },
        ],
        vec![
            MotifOnsite { node: 0, value: Complex64::new(0.4, 0.0) },
            MotifOnsite { node: 1, value: Complex64::new(-0.3, 0.0) },
        ],
    )
    .expect("valid hermitian dimer")
}

/// Node 0 at the anchor, node 1 one cell along `+x` and `+y`, hopping both
/// ways.
pub fn diagonal_dimer(concentration: f64, t: Complex64) -> DefectMotif {
    DefectMotif::new(
        concentration,
        vec![pack_node_position(&[0, 0], 0), pack_node_position(&[1, 1], 0)],
        vec![
            MotifBond { to: 1, from: 0, hopping: t },
            MotifBond { to: 0, from: 1, hopping: t.conj() },
        ],
        Vec::new(),
    )
    .expect("valid diagonal dimer")
}

/// Every draw returns zero, so only the first interior cell is ever proposed.
pub struct StuckRng;

impl RngCore for StuckRng {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        dst.fill(0);
    }
}

/// Per-domain output of [`realize`].
pub struct Realized {
    pub engine: DisorderPlacementEngine,
    pub mosaic: CrossMosaicFlags,
    pub result: Result<(), chebtile_core::PlacementError>,
}

/// Runs one realization of `motif` on every domain.
///
/// `vacancies[d]` lists local indices of domain `d`; missing entries mean no
/// vacancies. Domain `d` draws from a stream seeded with `seed + d`.
pub fn realize(
    geometry: &Arc<LatticeGeometry>,
    motif: &DefectMotif,
    vacancies: &[Vec<usize>],
    seed: u64,
) -> Vec<Realized> {
    realize_with(geometry, motif, vacancies, |domain| {
        Xoshiro256PlusPlus::seed_from_u64(seed + domain as u64)
    })
}

/// [`realize`] with the generator of domain `d` given by `rng_for(d)`.
pub fn realize_with<R, F>(
    geometry: &Arc<LatticeGeometry>,
    motif: &DefectMotif,
    vacancies: &[Vec<usize>],
    rng_for: F,
) -> Vec<Realized>
where
    R: RngCore + Send,
    F: Fn(usize) -> R,
{
    let states: Vec<_> = LatticeIndexer::all(geometry)
        .into_iter()
        .map(|indexer| {
            let indexer = Arc::new(indexer);
            let sites = vacancies.get(indexer.domain_id()).cloned().unwrap_or_default();
            let vacancy = VacancyMap::from_sites(&indexer, sites);
            let mosaic = CrossMosaicFlags::new(indexer.tile_count());
            let engine = DisorderPlacementEngine::new(motif.clone(), Arc::clone(&indexer)).expect("motif fits");
            let rng = rng_for(indexer.domain_id());
            (engine, vacancy, mosaic, rng)
        })
        .collect();

    let table = SharedSection::new(ConflictTable::new());
    DomainPool::new(states.len()).run(states, |ctx, (mut engine, vacancy, mut mosaic, mut rng)| {
        let result = engine.generate_disorder(&ctx, &table, &vacancy, &mut mosaic, &mut rng);
        Realized { engine, mosaic, result }
    })
}

/// Builds the Hamiltonian of every domain and draws one realization.
pub fn realize_hamiltonians<P, F>(
    geometry: &Arc<LatticeGeometry>,
    motifs: &[DefectMotif],
    pristine: F,
    seed: u64,
) -> Vec<DisorderedHamiltonian<P>>
where
    P: PristineHamiltonian,
    F: Fn(&LatticeIndexer) -> P,
{
    let states: Vec<_> = LatticeIndexer::all(geometry)
        .into_iter()
        .map(|indexer| {
            let indexer = Arc::new(indexer);
            let vacancies = VacancyMap::empty(&indexer);
            let p = pristine(&indexer);
            let rng = Xoshiro256PlusPlus::seed_from_u64(seed + indexer.domain_id() as u64);
            let ham = DisorderedHamiltonian::new(indexer, p, motifs, vacancies).expect("motifs fit");
            (ham, rng)
        })
        .collect();

    let table = SharedSection::new(ConflictTable::new());
    DomainPool::new(states.len()).run(states, |ctx, (mut ham, mut rng)| {
        ham.generate_disorder(&ctx, &table, &mut rng).expect("placement succeeds");
        ham
    })
}

/// Defects-only Hamiltonians, for tests that need no pristine part.
pub fn defect_hamiltonians(
    geometry: &Arc<LatticeGeometry>,
    motifs: &[DefectMotif],
    seed: u64,
) -> Vec<DisorderedHamiltonian<ZeroPristine>> {
    realize_hamiltonians(geometry, motifs, |_| ZeroPristine, seed)
}

/// Peierls phase of the bond `to ← from` in the Landau gauge `G[0][1]`, with
/// unit lattice vectors and orbitals at the cell origin.
///
/// `d = r_to − r_from` is the unwrapped bond vector and `y_to` the row of the
/// `to` site inside the lattice: `φ = ½ d₀ G d₁ − d₀ G y_to`.
pub fn landau_phase(indexer: &LatticeIndexer, to: usize, from: usize) -> f64 {
    let geometry = indexer.geometry();
    if geometry.dim() < 2 {
        return 0.0;
    }
    let g = geometry.gauge()[(0, 1)];
    let (head, tail) = (indexer.global_site(to), indexer.global_site(from));
    let d0 = (head[0] - tail[0]) as f64;
    let d1 = (head[1] - tail[1]) as f64;
    let global = indexer.global_index(to).expect("periodic lattice");
    let y_to = geometry.global_layout().site(global)[1] as f64;
    0.5 * d0 * g * d1 - d0 * g * y_to
}

/// Dense defect Hamiltonian in global indices, assuming periodic boundaries.
///
/// Bonds carry [`landau_phase`]; any other gauge component must be zero.
pub fn dense_defects(engines: &[&DisorderPlacementEngine]) -> HashMap<(usize, usize), Complex64> {
    let mut h: HashMap<(usize, usize), Complex64> = HashMap::new();
    for engine in engines {
        let indexer = engine.indexer();
        let offsets = engine.offsets();
        let global = |local: isize| indexer.global_index(local as usize).expect("periodic lattice");

        for tile in 0..indexer.tile_count() {
            for &anchor in engine.anchors(tile) {
                let a = anchor as isize;
                for bond in engine.motif().bonds() {
                    let (to, from) = (a + offsets[bond.to], a + offsets[bond.from]);
                    let phase = landau_phase(indexer, to as usize, from as usize);
                    *h.entry((global(to), global(from))).or_default() += bond.hopping * Complex64::cis(phase);
                }
                for term in engine.motif().onsite() {
                    let g = global(a + offsets[term.node]);
                    *h.entry((g, g)).or_default() += term.value;
                }
            }
        }
    }
    h
}

/// A deterministic, non-trivial global vector.
pub fn global_vector(len: usize) -> Vec<Complex64> {
    (0..len)
        .map(|g| Complex64::new(1.0 + g as f64 * 0.25, (g % 7) as f64 * -0.5))
        .collect()
}

/// `x` scattered into the ghost-inclusive buffer of one domain, ghosts
/// included.
pub fn scatter(indexer: &LatticeIndexer, x: &[Complex64]) -> Vec<Complex64> {
    let len = indexer.local_layout().size();
    (0..len)
        .map(|local| {
            indexer
                .global_index(local)
                .map_or(Complex64::new(0.0, 0.0), |g| x[g])
        })
        .collect()
}

/// `H · x` for a sparse `H`.
pub fn dense_apply(h: &HashMap<(usize, usize), Complex64>, x: &[Complex64]) -> Vec<Complex64> {
    let mut y = vec![Complex64::new(0.0, 0.0); x.len()];
    for (&(to, from), &value) in h {
        y[to] += value * x[from];
    }
    y
}

/// `|a - b| < tol` for complex numbers.
pub fn close(a: Complex64, b: Complex64, tol: f64) -> bool {
    (a - b).norm() < tol
}
