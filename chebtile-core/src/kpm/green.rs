//! Green's-function kernel coefficients of the Chebyshev expansion.

use num_complex::Complex64;

/// `green(n, σ, E) = 2σ / √(1 − E²) · i · exp(−iσ · n · acos E)`.
///
/// `energy` carries the broadening in its imaginary part.
pub fn green(n: usize, sigma: i32, energy: Complex64) -> Complex64 {
    let i = Complex64::i();
    let sq = (1.0 - energy * energy).sqrt();
    let exponent = -(f64::from(sigma) * n as f64) * energy.acos() * i;
    2.0 * f64::from(sigma) / sq * i * exponent.exp()
}

/// Weight of moment `n` in the single-shot recursion.
///
/// `Im(green(n, +1, E)) / (1 + [n == 0])`: the zeroth moment enters the
/// Chebyshev series with half weight.
#[inline]
pub fn moment_weight(n: usize, energy: Complex64) -> f64 {
    let weight = green(n, 1, energy).im;
    if n == 0 { weight / 2.0 } else { weight }
}
