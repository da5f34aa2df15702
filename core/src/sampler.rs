//! Accept-reject sampling of bounded densities.
//!
//! RULE: the caller-declared bound must dominate the density everywhere
//! in the range. A draw that observes `density(x) > bound` is a contract
//! violation by the calling component and aborts immediately.

use crate::{
    error::{GenError, GenResult},
    rng::RandomSource,
};
use serde::{Deserialize, Serialize};

/// A closed interval `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.lo && x <= self.hi
    }

    pub fn is_empty(&self) -> bool {
        self.hi <= self.lo
    }
}

/// One accept-reject trial. Returns the accepted value, if any.
fn trial<F>(rng: &mut RandomSource, range: Interval, bound: f64, density: &F) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    let x = rng.uniform(range.lo, range.hi);
    let u = rng.uniform(0.0, bound);
    let f = density(x);
    assert!(
        f <= bound,
        "density {f} at x={x} exceeds bound {bound} on [{}, {}]",
        range.lo,
        range.hi
    );
    (u <= f).then_some(x)
}

/// Draw from `density` over `range` by accept-reject against a flat
/// envelope of height `bound`. Loops until a draw is accepted.
///
/// Expected number of trials is `bound * range.width() / ∫density`.
pub fn accept_reject<F>(rng: &mut RandomSource, range: Interval, bound: f64, density: F) -> f64
where
    F: Fn(f64) -> f64,
{
    loop {
        if let Some(x) = trial(rng, range, bound, &density) {
            return x;
        }
    }
}

/// Accept-reject sampler with an optional diagnostic trial ceiling.
///
/// The ceiling never changes which values are accepted; it only turns
/// a misconfigured, never-accepting density into an error.
#[derive(Debug, Clone, Copy)]
pub struct RejectionSampler {
    pub range:      Interval,
    pub bound:      f64,
    pub max_trials: Option<u64>,
}

impl RejectionSampler {
    pub fn new(range: Interval, bound: f64) -> Self {
        Self { range, bound, max_trials: None }
    }

    pub fn with_max_trials(mut self, max_trials: u64) -> Self {
        self.max_trials = Some(max_trials);
        self
    }

    pub fn sample<F>(&self, rng: &mut RandomSource, density: F) -> GenResult<f64>
    where
        F: Fn(f64) -> f64,
    {
        let Some(ceiling) = self.max_trials else {
            return Ok(accept_reject(rng, self.range, self.bound, density));
        };
        for _ in 0..ceiling {
            if let Some(x) = trial(rng, self.range, self.bound, &density) {
                return Ok(x);
            }
        }
        log::error!(
            "rejection sampler on [{}, {}] with bound {} accepted nothing in {ceiling} trials",
            self.range.lo,
            self.range.hi,
            self.bound
        );
        Err(GenError::SamplerExhausted { trials: ceiling })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_values_lie_in_range() {
        let mut rng = RandomSource::new(3);
        let range = Interval::new(-1.0, 1.0);
        for _ in 0..1_000 {
            let x = accept_reject(&mut rng, range, 2.0, |x| 1.0 + x * x);
            assert!(range.contains(x));
        }
    }

    #[test]
    fn ceiling_reports_exhaustion() {
        let mut rng = RandomSource::new(3);
        let sampler = RejectionSampler::new(Interval::new(0.0, 1.0), 1.0).with_max_trials(50);
        let err = sampler.sample(&mut rng, |_| 0.0).unwrap_err();
        assert!(matches!(err, GenError::SamplerExhausted { trials: 50 }));
    }

    #[test]
    fn ceiling_does_not_change_the_draws() {
        let density = |x: f64| 1.0 + x * x;
        let range = Interval::new(-1.0, 1.0);
        let mut a = RandomSource::new(11);
        let mut b = RandomSource::new(11);
        let capped = RejectionSampler::new(range, 2.0).with_max_trials(1_000);
        for _ in 0..200 {
            let x = accept_reject(&mut a, range, 2.0, density);
            let y = capped.sample(&mut b, density).unwrap();
            assert_eq!(x, y);
        }
    }

    #[test]
    #[should_panic(expected = "exceeds bound")]
    fn under_estimated_bound_aborts() {
        let mut rng = RandomSource::new(1);
        for _ in 0..1_000 {
            accept_reject(&mut rng, Interval::new(-1.0, 1.0), 1.5, |x| 1.0 + x * x);
        }
    }
}
