//! End-to-end normalization: the total cross section is the mean trial
//! cross section, whatever the acceptance mode.

use photogen_core::{
    config::Config,
    error::GenResult,
    event::Event,
    generator::{Generator, GeneratorData, PhotonData, ProcessData, ProcessGenerator},
    output::EventSink,
    particle::{Particle, Status},
    pipeline::Pipeline,
    registry::ComponentRegistry,
    rng::RandomSource,
};
use serde_json::json;

/// σ = σ0 · 2u with u uniform in [0, 1): mean σ0, maximum 2σ0.
/// With `spread: false` every trial reports exactly σ0.
struct SyntheticProcess {
    sigma0: f64,
    spread: bool,
}

impl SyntheticProcess {
    fn create(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn ProcessGenerator>> {
        Ok(Box::new(Self { sigma0: cfg.get("sigma0")?, spread: cfg.get_or("spread", true)? }))
    }
}

impl Generator for SyntheticProcess {
    fn name(&self) -> &'static str { "synthetic" }

    fn max_cross_section(&self) -> f64 {
        if self.spread { 2.0 * self.sigma0 } else { self.sigma0 }
    }
}

impl ProcessGenerator for SyntheticProcess {
    fn generate(&self, photon: &PhotonData, target: &Particle, rng: &mut RandomSource) -> ProcessData {
        let cross_section = if self.spread { 2.0 * self.sigma0 * rng.next_f64() } else { self.sigma0 };
        ProcessData {
            recoil:  target.clone(),
            leading: Particle::named("pi0", Status::FinalState).unwrap(),
            data:    GeneratorData { cross_section, ..photon.data },
        }
    }
}

#[derive(Default)]
struct CountingSink {
    events:     u64,
    sum_weight: f64,
}

impl EventSink for CountingSink {
    fn push(&mut self, event: &Event) -> GenResult<()> {
        self.events += 1;
        self.sum_weight += event.weight;
        Ok(())
    }
}

fn pipeline(mode: &str, process: serde_json::Value, seed: u64) -> Pipeline {
    let registry = ComponentRegistry::builtin();
    assert!(registry.process.register("synthetic", SyntheticProcess::create));
    let cfg = Config::new(json!({
        "seed": seed,
        "generator": {
            "mode": mode,
            "initial": {
                "type": "photoproduction",
                "beam": { "type": "constant", "particle": "gamma", "energy": 5.0 },
                "target": { "type": "constant", "particle": "p" },
                "photon": { "type": "beam" },
                "process": process
            }
        }
    }));
    Pipeline::build(&cfg, &registry).expect("pipeline")
}

#[test]
fn constant_cross_section_is_recovered_exactly() {
    let mut p = pipeline("weighted", json!({ "type": "synthetic", "sigma0": 1.0, "spread": false }), 1);
    let stats = p.run(1_000, &mut CountingSink::default()).unwrap();
    assert_eq!(stats.n_trials, 1_000);
    assert!((stats.total_cross_section() - 1.0).abs() < 1e-12);
    assert!(stats.cross_section_error() < 1e-9);
}

#[test]
fn weighted_mean_converges_to_sigma0() {
    let mut p = pipeline("weighted", json!({ "type": "synthetic", "sigma0": 1.0 }), 31);
    let mut sink = CountingSink::default();
    let stats = p.run(100_000, &mut sink).unwrap();

    assert_eq!(sink.events, 100_000);
    assert!(stats.n_trials >= 100_000);
    let total = stats.total_cross_section();
    assert!((total - 1.0).abs() < 0.01, "σ = {total}");
    // σ(2u) = 2/√12 per trial
    let expected_error = (4.0f64 / 12.0 / stats.n_trials as f64).sqrt();
    assert!((stats.cross_section_error() - expected_error).abs() < 0.1 * expected_error);
}

#[test]
fn unweighted_acceptance_is_mean_over_max() {
    let mut p = pipeline("unweighted", json!({ "type": "synthetic", "sigma0": 3.0 }), 5);
    let mut sink = CountingSink::default();
    let stats = p.run(20_000, &mut sink).unwrap();

    assert_eq!(stats.n_events, 20_000);
    assert!((sink.sum_weight - 20_000.0).abs() < 1e-9, "unweighted events carry unit weight");
    assert!((stats.acceptance() - 0.5).abs() < 0.01, "acceptance {}", stats.acceptance());
    assert!((stats.total_cross_section() - 3.0).abs() < 0.05, "σ = {}", stats.total_cross_section());
}
