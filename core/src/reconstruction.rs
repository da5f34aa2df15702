//! Event-level reconstruction stages.

use crate::{
    config::Config,
    error::GenResult,
    event::Event,
    generator::Reconstruction,
    particle::Species,
    registry::ComponentRegistry,
    types::Pdg,
};

/// Leaves the event as it is.
pub struct NoReconstruction;

impl NoReconstruction {
    pub fn create(_cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn Reconstruction>> {
        Ok(Box::new(Self))
    }
}

impl Reconstruction for NoReconstruction {
    fn name(&self) -> &'static str { "none" }

    fn reconstruct(&self, _event: &mut Event) {}
}

/// Vetoes (weight 0) events in which any of the listed species has no
/// detected record. A species listed twice must be detected twice.
pub struct RequireDetected {
    required: Vec<Pdg>,
}

impl RequireDetected {
    pub fn new(required: Vec<Pdg>) -> Self {
        Self { required }
    }

    pub fn create(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn Reconstruction>> {
        let names: Vec<String> = cfg.get("particles")?;
        let required = names
            .iter()
            .map(|n| Species::by_name(n).map(|s| s.pdg))
            .collect::<GenResult<Vec<_>>>()?;
        log::info!("require_detected: {}", names.join(" "));
        Ok(Box::new(Self::new(required)))
    }

    fn satisfied(&self, event: &Event) -> bool {
        let detected: Vec<Pdg> = event.detected().map(|p| p.pdg).collect();
        self.required.iter().all(|pdg| {
            let needed = self.required.iter().filter(|r| *r == pdg).count();
            detected.iter().filter(|d| *d == pdg).count() >= needed
        })
    }
}

impl Reconstruction for RequireDetected {
    fn name(&self) -> &'static str { "require_detected" }

    fn reconstruct(&self, event: &mut Event) {
        if !self.satisfied(event) {
            event.weight = 0.0;
        }
    }
}
