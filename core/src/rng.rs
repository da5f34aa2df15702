//! Deterministic random number generation.
//!
//! RULE: Nothing in the generator may call any platform RNG.
//! All randomness flows through a single RandomSource owned by the
//! pipeline and seeded from the configured `seed`.
//!
//! The source is a plain mutable stream: it is neither Sync nor meant
//! to be shared between pipelines. Independent pipelines derive their
//! own streams with `RandomSource::derive(seed, stream)`.

use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Cauchy, Distribution, Normal};
use rand_pcg::Pcg64Mcg;
use std::f64::consts::PI;

/// A named, deterministic random stream.
pub struct RandomSource {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl RandomSource {
    pub fn new(seed: u64) -> Self {
        Self {
            name: "main",
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Derive an independent stream from a master seed and a stable
    /// stream index. The index must never change once assigned.
    pub fn derive(master_seed: u64, stream: u64) -> Self {
        let derived_seed = master_seed ^ (stream.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self::new(derived_seed)
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Uniform draw in [a, b). Degenerate ranges return `a`.
    pub fn uniform(&mut self, a: f64, b: f64) -> f64 {
        if b <= a {
            return a;
        }
        self.inner.gen_range(a..b)
    }

    /// Uniform azimuthal angle in [0, 2π).
    pub fn phi(&mut self) -> f64 {
        self.uniform(0.0, 2.0 * PI)
    }

    /// Gaussian draw. A non-positive width returns the mean.
    pub fn gaussian(&mut self, mean: f64, sigma: f64) -> f64 {
        match Normal::new(mean, sigma) {
            Ok(normal) if sigma > 0.0 => normal.sample(&mut self.inner),
            _ => mean,
        }
    }

    /// Breit-Wigner (Cauchy) draw with full width `width`.
    pub fn breit_wigner(&mut self, mean: f64, width: f64) -> f64 {
        match Cauchy::new(mean, 0.5 * width) {
            Ok(bw) if width > 0.0 => bw.sample(&mut self.inner),
            _ => mean,
        }
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = RandomSource::new(7);
        let mut b = RandomSource::new(7);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn derived_streams_differ() {
        let mut a = RandomSource::derive(7, 0);
        let mut b = RandomSource::derive(7, 1);
        let same = (0..16).all(|_| a.next_u64() == b.next_u64());
        assert!(!same, "stream index must change the sequence");
    }

    #[test]
    fn uniform_stays_in_range() {
        let mut rng = RandomSource::new(1);
        for _ in 0..10_000 {
            let x = rng.uniform(-2.0, 3.0);
            assert!((-2.0..3.0).contains(&x));
        }
        assert_eq!(rng.uniform(4.0, 4.0), 4.0);
    }

    #[test]
    fn gaussian_moments() {
        let mut rng = RandomSource::new(99);
        let n = 50_000;
        let draws: Vec<f64> = (0..n).map(|_| rng.gaussian(3.0, 0.5)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 3.0).abs() < 0.01, "mean={mean}");
        assert!((var.sqrt() - 0.5).abs() < 0.01, "sigma={}", var.sqrt());
        assert_eq!(rng.gaussian(1.5, 0.0), 1.5);
    }

    #[test]
    fn breit_wigner_median_is_the_mean() {
        let mut rng = RandomSource::new(5);
        let mut draws: Vec<f64> = (0..20_001).map(|_| rng.breit_wigner(3.097, 0.1)).collect();
        draws.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let median = draws[draws.len() / 2];
        assert!((median - 3.097).abs() < 0.005, "median={median}");
    }
}
