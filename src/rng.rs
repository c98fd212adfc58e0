//! Seeded pseudo-random number generation.
//!
//! An LCG with Box-Muller normals, centralised into a reusable struct so
//! every task can own an independent generator. Never shared across
//! threads; child generators are split off with [`Rng::fork`].

use std::time::{SystemTime, UNIX_EPOCH};

const MULTIPLIER: u64 = 6364136223846793005;
const INCREMENT: u64 = 1442695040888963407;

/// A simple LCG-based pseudo-random number generator.
///
/// ```
/// # use atoll::Rng;
/// let mut rng = Rng::new(42);
/// let u = rng.next_f64(); // uniform in [0, 1)
/// let n = rng.normal();   // standard normal
/// ```
pub struct Rng {
    state: u64,
}

impl Rng {
    /// Create a new RNG from the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Create a new RNG seeded from the system clock.
    pub fn from_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x5eed);
        Self::new(nanos)
    }

    /// Split off an independently-seeded child generator.
    ///
    /// The child's stream does not overlap the parent's continuation in
    /// any way that matters for a stochastic search.
    pub fn fork(&mut self) -> Self {
        Self::new(self.next_u64() ^ 0x9e3779b97f4a7c15)
    }

    /// Advance the LCG and return the next raw `u64`.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT);
        self.state
    }

    /// Uniform random `f64` in [0, 1) with 53 bits of mantissa.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform random index in `[0, n)`. `n` must be nonzero.
    pub fn below(&mut self, n: usize) -> usize {
        debug_assert!(n > 0, "Rng::below(0)");
        (self.next_f64() * n as f64) as usize % n
    }

    /// Uniform random `i64` in `[lo, hi]` inclusive.
    pub fn between(&mut self, lo: i64, hi: i64) -> i64 {
        let span = (hi - lo + 1) as usize;
        lo + self.below(span) as i64
    }

    /// Standard normal (mean 0, variance 1) via Box-Muller transform.
    pub fn normal(&mut self) -> f64 {
        let u1 = self.next_f64().max(1e-15); // avoid log(0)
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    /// Returns `true` with probability `p`.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}
