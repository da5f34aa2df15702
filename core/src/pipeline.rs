//! The generation pipeline.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   1. Initial state   (vertex → beam → target → photon → process)
//!   2. Acceptance      (weighted or unweighted)
//!   3. Decays          (in configured order)
//!   4. Detector
//!   5. Reconstruction
//!
//! RULES:
//!   - Every initial-state attempt is a trial and enters the
//!     cross-section sums, accepted or not.
//!   - A trial with `cross_section <= 0` is dropped and redrawn; this is
//!     the normal operating mode, not an error.
//!   - Stages after acceptance may zero the weight but never drop the
//!     event.
//!   - All randomness flows through the pipeline's single RandomSource,
//!     so a run is reproducible from its seed.

use crate::{
    config::Config,
    error::{GenError, GenResult},
    event::Event,
    generator::{DecayProcessor, DetectorSimulator, InitialStateGenerator, Reconstruction},
    output::EventSink,
    reconstruction::NoReconstruction,
    registry::ComponentRegistry,
    rng::RandomSource,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceMode {
    /// Accept a trial with probability σ/σ_max; emitted events carry unit weight.
    Unweighted,
    /// Accept every open trial; the event carries its trial cross section.
    Weighted,
}

/// Where the event currently being produced stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Initial,
    Accepted,
    Built,
    Emitted,
}

/// Running Monte-Carlo sums.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub n_trials:   u64,
    pub n_accepted: u64,
    pub n_events:   u64,
    pub sum_xs:     f64,
    pub sum_xs2:    f64,
}

impl RunStats {
    fn record_trial(&mut self, cross_section: f64) {
        self.n_trials += 1;
        self.sum_xs += cross_section;
        self.sum_xs2 += cross_section * cross_section;
    }

    /// Mean trial cross section, `Σσ / n_trials`.
    pub fn total_cross_section(&self) -> f64 {
        if self.n_trials == 0 {
            return 0.0;
        }
        self.sum_xs / self.n_trials as f64
    }

    /// Statistical error of the mean, `√((⟨σ²⟩ − ⟨σ⟩²) / n_trials)`.
    pub fn cross_section_error(&self) -> f64 {
        if self.n_trials == 0 {
            return 0.0;
        }
        let n = self.n_trials as f64;
        let mean = self.sum_xs / n;
        ((self.sum_xs2 / n - mean * mean).max(0.0) / n).sqrt()
    }

    /// Fraction of trials that were accepted.
    pub fn acceptance(&self) -> f64 {
        if self.n_trials == 0 {
            return 0.0;
        }
        self.n_accepted as f64 / self.n_trials as f64
    }
}

pub struct Pipeline {
    seed:           u64,
    rng:            RandomSource,
    mode:           AcceptanceMode,
    max_trials:     Option<u64>,
    max_xs:         f64,
    initial:        Box<dyn InitialStateGenerator>,
    decays:         Vec<Box<dyn DecayProcessor>>,
    detector:       Option<Box<dyn DetectorSimulator>>,
    reconstruction: Box<dyn Reconstruction>,
    stats:          RunStats,
    state:          TrialState,
}

impl Pipeline {
    /// A pipeline with only an initial-state generator: unweighted, no
    /// decays, no detector, no reconstruction.
    pub fn new(seed: u64, initial: Box<dyn InitialStateGenerator>) -> Self {
        Self {
            seed,
            rng:            RandomSource::new(seed).with_name("pipeline"),
            mode:           AcceptanceMode::Unweighted,
            max_trials:     None,
            max_xs:         initial.max_cross_section(),
            initial,
            decays:         Vec::new(),
            detector:       None,
            reconstruction: Box::new(NoReconstruction),
            stats:          RunStats::default(),
            state:          TrialState::Initial,
        }
    }

    /// Build a fully wired pipeline from the root configuration:
    /// `seed` plus the `generator` section.
    pub fn build(cfg: &Config, registry: &ComponentRegistry) -> GenResult<Self> {
        let seed: u64 = cfg.get_or("seed", 0)?;
        let generator = cfg.section("generator")?;
        let initial = registry.initial.create_from(&generator.section("initial")?, registry)?;
        let mut pipeline = Self::new(seed, initial)
            .with_mode(generator.get_or("mode", AcceptanceMode::Unweighted)?);
        if let Some(max_trials) = generator.get_optional("max_trials")? {
            pipeline = pipeline.with_max_trials(max_trials);
        }

        for decay in generator.sections("decays")? {
            pipeline.add_decay(registry.decay.create_from(&decay, registry)?);
        }
        if generator.contains("detector") {
            pipeline.set_detector(registry.detector.create_from(&generator.section("detector")?, registry)?);
        }
        if generator.contains("reconstruction") {
            pipeline.set_reconstruction(
                registry.reconstruction.create_from(&generator.section("reconstruction")?, registry)?,
            );
        }

        if pipeline.mode == AcceptanceMode::Unweighted && pipeline.max_xs <= 0.0 {
            return Err(GenError::config(
                generator.path(),
                format!("unweighted mode needs a positive maximum cross section, got {}", pipeline.max_xs),
            ));
        }
        log::info!(
            "pipeline: seed={seed} mode={:?} initial={} decays={} detector={} reconstruction={}",
            pipeline.mode,
            pipeline.initial.name(),
            pipeline.decays.len(),
            pipeline.detector.as_ref().map_or("none", |d| d.name()),
            pipeline.reconstruction.name()
        );
        Ok(pipeline)
    }

    pub fn with_mode(mut self, mode: AcceptanceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_trials(mut self, max_trials: u64) -> Self {
        self.max_trials = Some(max_trials);
        self
    }

    /// Decays run in the order they are added.
    pub fn add_decay(&mut self, decay: Box<dyn DecayProcessor>) {
        self.decays.push(decay);
    }

    pub fn set_detector(&mut self, detector: Box<dyn DetectorSimulator>) {
        self.detector = Some(detector);
    }

    pub fn set_reconstruction(&mut self, reconstruction: Box<dyn Reconstruction>) {
        self.reconstruction = reconstruction;
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn mode(&self) -> AcceptanceMode {
        self.mode
    }

    pub fn max_cross_section(&self) -> f64 {
        self.max_xs
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    /// One trial. Returns the initial state if it was accepted.
    pub fn generate_initial(&mut self) -> Option<Event> {
        self.state = TrialState::Initial;
        let event = self.initial.generate(&mut self.rng);
        let sigma = event.cross_section;
        self.stats.record_trial(sigma);
        if sigma <= 0.0 {
            return None;
        }

        let accepted = match self.mode {
            AcceptanceMode::Weighted => true,
            AcceptanceMode::Unweighted => {
                if sigma > self.max_xs {
                    log::warn!(
                        "trial cross section {sigma:.4e} exceeds declared maximum {:.4e}; \
                         unweighted sample is biased",
                        self.max_xs
                    );
                }
                self.rng.next_f64() * self.max_xs < sigma
            }
        };
        if !accepted {
            return None;
        }
        self.stats.n_accepted += 1;
        self.state = TrialState::Accepted;
        log::debug!("trial {} accepted with σ={sigma:.4e}", self.stats.n_trials);
        Some(event)
    }

    /// Run decays, detector and reconstruction on an accepted event.
    pub fn build_event(&mut self, event: &mut Event) -> GenResult<()> {
        for decay in &self.decays {
            decay.process(event, &mut self.rng)?;
        }
        if let Some(detector) = &self.detector {
            detector.detect(event, &mut self.rng);
        }
        self.reconstruction.reconstruct(event);
        self.state = TrialState::Built;
        Ok(())
    }

    /// Draw trials until one is accepted, then build and emit it.
    pub fn next_event(&mut self) -> GenResult<Event> {
        let mut trials = 0u64;
        let mut event = loop {
            if let Some(event) = self.generate_initial() {
                break event;
            }
            trials += 1;
            if let Some(ceiling) = self.max_trials {
                if trials >= ceiling {
                    log::error!("no trial accepted in {ceiling} attempts; check the configured kinematics");
                    return Err(GenError::TrialsExhausted { trials: ceiling });
                }
            }
        };
        self.build_event(&mut event)?;
        self.stats.n_events += 1;
        self.state = TrialState::Emitted;
        log::debug!("event {} emitted with weight {:.4e}", self.stats.n_events, event.weight);
        Ok(event)
    }

    /// Emit `n` events into `sink`. Returns the cumulative statistics.
    pub fn run(&mut self, n: u64, sink: &mut dyn EventSink) -> GenResult<RunStats> {
        for _ in 0..n {
            let event = self.next_event()?;
            sink.push(&event)?;
        }
        sink.finish()?;
        let stats = self.stats;
        log::info!(
            "{} events from {} trials: σ = {:.5e} ± {:.2e}, acceptance {:.4}",
            stats.n_events,
            stats.n_trials,
            stats.total_cross_section(),
            stats.cross_section_error(),
            stats.acceptance()
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        generator::Generator,
        particle::{Particle, Status},
    };

    /// Alternates a closed trial with an open one of cross section 2.
    struct Alternating {
        counter: std::cell::Cell<u64>,
    }

    impl Generator for Alternating {
        fn name(&self) -> &'static str { "alternating" }

        fn max_cross_section(&self) -> f64 {
            2.0
        }
    }

    impl InitialStateGenerator for Alternating {
        fn generate(&self, _rng: &mut RandomSource) -> Event {
            let n = self.counter.get();
            self.counter.set(n + 1);
            let mut event = Event::new();
            event.add_particle(Particle::named("p", Status::Beam).unwrap());
            event.cross_section = if n % 2 == 0 { 0.0 } else { 2.0 };
            event
        }
    }

    fn alternating() -> Box<dyn InitialStateGenerator> {
        Box::new(Alternating { counter: std::cell::Cell::new(0) })
    }

    #[test]
    fn closed_trials_count_toward_normalization() {
        let mut pipeline = Pipeline::new(1, alternating()).with_mode(AcceptanceMode::Weighted);
        let mut sink = crate::output::MemorySink::new();
        let stats = pipeline.run(10, &mut sink).unwrap();
        assert_eq!(stats.n_events, 10);
        assert_eq!(stats.n_trials, 20);
        assert_eq!(stats.n_accepted, 10);
        assert!((stats.total_cross_section() - 1.0).abs() < 1e-12);
        assert!((stats.cross_section_error() - (1.0f64 / 20.0).sqrt()).abs() < 1e-12);
        assert_eq!(pipeline.state(), TrialState::Emitted);
    }

    #[test]
    fn trial_ceiling_is_an_error() {
        struct Closed;
        impl Generator for Closed {
            fn name(&self) -> &'static str { "closed" }
        }
        impl InitialStateGenerator for Closed {
            fn generate(&self, _rng: &mut RandomSource) -> Event {
                let mut event = Event::new();
                event.cross_section = 0.0;
                event
            }
        }
        let mut pipeline = Pipeline::new(1, Box::new(Closed)).with_max_trials(50);
        assert!(matches!(pipeline.next_event(), Err(GenError::TrialsExhausted { trials: 50 })));
        assert_eq!(pipeline.stats().n_trials, 50);
    }

    #[test]
    fn empty_stats_are_zero() {
        let stats = RunStats::default();
        assert_eq!(stats.total_cross_section(), 0.0);
        assert_eq!(stats.cross_section_error(), 0.0);
        assert_eq!(stats.acceptance(), 0.0);
    }
}
