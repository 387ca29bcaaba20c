//! Incremental mean of complex samples.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Running mean updated as `avg += (x − avg) / (n + 1)`.
///
/// The stored value is a valid average after every sample, and no growing
/// sum is ever formed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningAverage {
    mean: Complex64,
    count: u64,
}

impl RunningAverage {
    /// An empty average (mean zero).
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one sample in.
    #[inline]
    pub fn push(&mut self, sample: Complex64) {
        self.mean += (sample - self.mean) / (self.count + 1) as f64;
        self.count += 1;
    }

    /// Current mean.
    #[inline]
    pub fn mean(&self) -> Complex64 {
        self.mean
    }

    /// Samples folded so far.
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }
}
