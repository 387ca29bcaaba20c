//! Worker pool and the barrier/single-writer protocol.
//!
//! Every domain of the lattice is driven by one worker thread. All workers run
//! the same program in lockstep through two kinds of phases:
//!
//! - **Domain-parallel** phases touch only the worker's own tile data and read
//!   neighbor halos. No synchronization is needed.
//! - **Shared-mutation** phases change a structure visible to every worker
//!   (the conflict table, the conductivity accumulator). They are bracketed by
//!   barriers, and writers are serialized by the protocol itself.
//!
//! ```text
//! worker 0  ──┬── local ──┤barrier├── master writes ──┤barrier├── local ──
//! worker 1  ──┼── local ──┤barrier├──     waits     ──┤barrier├── local ──
//! worker 2  ──┴── local ──┤barrier├──     waits     ──┤barrier├── local ──
//! ```
//!
//! [`SharedSection`] wraps the shared structure. Because writers never
//! overlap, its lock is uncontended in [`DomainContext::master`] and only
//! serializes the turn-taking in [`DomainContext::critical`].
//!
//! A worker that panics breaks the pool's barrier on its way out. Every peer
//! waiting on it, or arriving later, panics as well, and [`DomainPool::run`]
//! resumes the first worker's panic on the caller.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use parking_lot::{Condvar, Mutex};

/// A structure that several workers mutate, one at a time.
#[derive(Debug, Default)]
pub struct SharedSection<T> {
    inner: Mutex<T>,
}

impl<T> SharedSection<T> {
    /// Wraps `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Consumes the section and returns the value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }

    /// Mutable access when the caller holds the only reference.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    /// Read access outside the worker pool (tests, post-run inspection).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.lock())
    }
}

/// Panic payload of a worker unwound because a peer panicked.
#[derive(Debug)]
struct PeerPanicked;

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    broken: bool,
}

/// Reusable barrier that can be broken by a panicking worker.
#[derive(Debug)]
struct PhaseBarrier {
    workers: usize,
    state: Mutex<BarrierState>,
    released: Condvar,
}

impl PhaseBarrier {
    fn new(workers: usize) -> Self {
        Self {
            workers,
            state: Mutex::new(BarrierState::default()),
            released: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut state = self.state.lock();
        if state.broken {
            drop(state);
            std::panic::panic_any(PeerPanicked);
        }

        state.arrived += 1;
        if state.arrived == self.workers {
            state.arrived = 0;
            state.generation += 1;
            self.released.notify_all();
            return;
        }

        let generation = state.generation;
        while state.generation == generation && !state.broken {
            self.released.wait(&mut state);
        }
        if state.generation == generation {
            drop(state);
            std::panic::panic_any(PeerPanicked);
        }
    }

    fn break_all(&self) {
        self.state.lock().broken = true;
        self.released.notify_all();
    }
}

/// Breaks the barrier if the worker holding it unwinds.
struct BreakOnPanic<'a>(&'a PhaseBarrier);

impl Drop for BreakOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.break_all();
        }
    }
}

/// Handle given to each worker: its domain id plus the collective operations.
#[derive(Clone, Copy)]
pub struct DomainContext<'a> {
    id: usize,
    count: usize,
    barrier: &'a PhaseBarrier,
    failed: &'a AtomicBool,
}

impl<'a> DomainContext<'a> {
    /// Domain id of this worker.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Number of workers (and domains).
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Worker 0 performs every designated single-writer mutation.
    #[inline]
    pub fn is_master(&self) -> bool {
        self.id == 0
    }

    /// Blocks until every worker reaches this point.
    ///
    /// # Panics
    ///
    /// Panics if another worker panicked before everyone arrived.
    pub fn barrier(&self) {
        self.barrier.wait();
    }

    /// Barrier, master runs `f`, barrier.
    ///
    /// Returns `Some` on the master worker and `None` elsewhere. Every worker
    /// must call this, even though only one of them does any work.
    pub fn master<T, R>(&self, section: &SharedSection<T>, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.barrier();
        let result = if self.is_master() {
            Some(f(&mut *section.inner.lock()))
        } else {
            None
        };
        self.barrier();
        result
    }

    /// Runs `f` with exclusive access, each worker in turn, in no fixed order.
    ///
    /// No barrier is implied. Callers bracket critical phases with
    /// [`barrier`](Self::barrier) when later readers depend on every write.
    pub fn critical<T, R>(&self, section: &SharedSection<T>, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *section.inner.lock())
    }

    /// Collective failure vote.
    ///
    /// Every worker reports whether it failed; all of them learn whether any
    /// worker did. Workers that see `true` must leave the run together so no
    /// one is left waiting on a barrier.
    pub fn any_failed(&self, failed: bool) -> bool {
        if failed {
            self.failed.store(true, Ordering::Release);
        }
        self.barrier();
        let any = self.failed.load(Ordering::Acquire);
        self.barrier();
        any
    }
}

/// Fixed pool of scoped worker threads, one per domain.
#[derive(Debug, Clone, Copy)]
pub struct DomainPool {
    domains: usize,
}

impl DomainPool {
    /// Creates a pool with one worker per domain.
    ///
    /// # Panics
    ///
    /// Panics if `domains` is zero.
    pub fn new(domains: usize) -> Self {
        assert!(domains > 0, "a domain pool needs at least one worker");
        Self { domains }
    }

    /// Number of workers.
    pub fn domains(&self) -> usize {
        self.domains
    }

    /// Runs `f` on every worker, handing each one its own state.
    ///
    /// `states` must hold exactly one entry per domain; entry `i` goes to
    /// domain `i`. Results come back in domain order. A panic in any worker
    /// unwinds its peers at their next barrier and is resumed on the calling
    /// thread.
    pub fn run<S, R, F>(&self, states: Vec<S>, f: F) -> Vec<R>
    where
        S: Send,
        R: Send,
        F: Fn(DomainContext<'_>, S) -> R + Sync,
    {
        assert_eq!(states.len(), self.domains, "one state per domain");

        let barrier = PhaseBarrier::new(self.domains);
        let failed = AtomicBool::new(false);
        let f = &f;

        thread::scope(|scope| {
            let handles: Vec<_> = states
                .into_iter()
                .enumerate()
                .map(|(id, state)| {
                    let ctx = DomainContext {
                        id,
                        count: self.domains,
                        barrier: &barrier,
                        failed: &failed,
                    };
                    let barrier = &barrier;
                    scope.spawn(move || {
                        let _guard = BreakOnPanic(barrier);
                        f(ctx, state)
                    })
                })
                .collect();

            let mut results = Vec::with_capacity(handles.len());
            let mut panic: Option<Box<dyn Any + Send>> = None;
            for handle in handles {
                match handle.join() {
                    Ok(result) => results.push(result),
                    Err(payload) => {
                        let secondary = payload.is::<PeerPanicked>();
                        if panic.as_ref().is_none_or(|p| p.is::<PeerPanicked>() && !secondary) {
                            panic = Some(payload);
                        }
                    }
                }
            }
            if let Some(payload) = panic {
                std::panic::resume_unwind(payload);
            }
            results
        })
    }
}
