//! Two-body decay processors.
//!
//! RULES:
//!   - A processor only touches particles with an unstable status whose
//!     species matches its configured parent.
//!   - Daughters are appended with `Event::add_daughter`; the parent is
//!     then marked DECAYED and the event cross section scaled by the
//!     branching ratio.
//!   - A parent below the daughters' threshold zeroes the event weight;
//!     the event is kept.
//!
//! The loop walks the arena by index while it grows, so daughters that
//! are themselves unstable are decayed by the same processor when they
//! match its parent species.

use crate::{
    config::Config,
    error::{GenError, GenResult},
    event::Event,
    generator::DecayProcessor,
    kinematics::{self, FourVector, ProductionFrame},
    particle::{Particle, Species, Status},
    registry::ComponentRegistry,
    rng::RandomSource,
    sampler::{Interval, RejectionSampler},
    types::ParticleIndex,
};

/// Sampler ceiling used when the configuration does not set one.
const DEFAULT_MAX_TRIALS: u64 = 1_000_000;

// ── Angular densities ────────────────────────────────────────────────────────

/// Density in cos θ of the first daughter, on [-1, 1]. Not normalized.
#[derive(Debug, Clone, PartialEq)]
pub enum AngularDensity {
    Isotropic,
    /// Leptonic decay of a vector meson under s-channel helicity
    /// conservation: `(1 + r04) + (1 − 3·r04)·cos²θ`.
    Helicity { r04: f64 },
    /// `Σ cᵢ · cosⁱθ`
    Polynomial(Vec<f64>),
    /// `exp(slope · cos θ)`
    Exponential { slope: f64 },
}

impl AngularDensity {
    pub fn from_config(cfg: &Config) -> GenResult<Self> {
        let density = match cfg.type_name()?.as_str() {
            "isotropic" => Self::Isotropic,
            "helicity" => Self::Helicity { r04: cfg.get_or("r04", 0.0)? },
            "polynomial" => Self::Polynomial(cfg.get("coefficients")?),
            "exponential" => Self::Exponential { slope: cfg.get("slope")? },
            other => {
                return Err(GenError::UnknownType { family: "angular density", name: other.to_string() });
            }
        };
        if let Self::Helicity { r04 } = &density {
            if !(0.0..=1.0).contains(r04) {
                return Err(GenError::config(format!("{}/r04", cfg.path()), "r04 must lie in [0, 1]"));
            }
        }
        Ok(density)
    }

    pub fn eval(&self, cos_theta: f64) -> f64 {
        match self {
            Self::Isotropic => 1.0,
            Self::Helicity { r04 } => (1.0 + r04) + (1.0 - 3.0 * r04) * cos_theta * cos_theta,
            Self::Polynomial(coefficients) => {
                coefficients.iter().rev().fold(0.0, |acc, c| acc * cos_theta + c)
            }
            Self::Exponential { slope } => (slope * cos_theta).exp(),
        }
    }

    /// An upper bound of `eval` on [-1, 1].
    pub fn bound(&self) -> f64 {
        match self {
            Self::Isotropic => 1.0,
            Self::Helicity { r04 } => (1.0 + r04).max(2.0 - 2.0 * r04),
            Self::Polynomial(coefficients) => coefficients.iter().map(|c| c.abs()).sum(),
            Self::Exponential { slope } => slope.abs().exp(),
        }
    }
}

// ── Two-body decay ───────────────────────────────────────────────────────────

pub struct TwoBodyDecay {
    name:            &'static str,
    parent:          Species,
    daughters:       [Species; 2],
    branching_ratio: f64,
    density:         AngularDensity,
    sampler:         RejectionSampler,
}

impl TwoBodyDecay {
    pub fn new(
        name: &'static str,
        parent: Species,
        daughters: [Species; 2],
        branching_ratio: f64,
        density: AngularDensity,
    ) -> Self {
        let sampler = RejectionSampler::new(Interval::new(-1.0, 1.0), density.bound())
            .with_max_trials(DEFAULT_MAX_TRIALS);
        Self { name, parent, daughters, branching_ratio, density, sampler }
    }

    fn with_max_trials(mut self, max_trials: u64) -> Self {
        self.sampler = self.sampler.with_max_trials(max_trials);
        self
    }

    fn read_branching_ratio(cfg: &Config) -> GenResult<f64> {
        let br: f64 = cfg.get_or("branching_ratio", 1.0)?;
        if !(0.0..=1.0).contains(&br) {
            return Err(GenError::config(
                format!("{}/branching_ratio", cfg.path()),
                "branching ratio must lie in [0, 1]",
            ));
        }
        Ok(br)
    }

    /// `two_body`: explicit parent, daughters and angular density
    /// (isotropic when absent).
    pub fn create(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn DecayProcessor>> {
        let parent = Species::by_name(&cfg.get::<String>("parent")?)?;
        let [first, second]: [String; 2] = cfg.get("daughters")?;
        let density = if cfg.contains("angular") {
            AngularDensity::from_config(&cfg.section("angular")?)?
        } else {
            AngularDensity::Isotropic
        };
        let decay = Self::new(
            "two_body",
            parent,
            [Species::by_name(&first)?, Species::by_name(&second)?],
            Self::read_branching_ratio(cfg)?,
            density,
        )
        .with_max_trials(cfg.get_or("max_trials", DEFAULT_MAX_TRIALS)?);
        decay.log_created();
        Ok(Box::new(decay))
    }

    /// `vm_leptonic`: vector meson to a lepton pair with the helicity
    /// density. The negative lepton is the first daughter.
    pub fn create_vm_leptonic(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn DecayProcessor>> {
        let parent = Species::by_name(&cfg.get::<String>("parent")?)?;
        let lepton: String = cfg.get_or("lepton", "e".to_string())?;
        let daughters = match lepton.as_str() {
            "e" => [Species::by_name("e-")?, Species::by_name("e+")?],
            "mu" => [Species::by_name("mu-")?, Species::by_name("mu+")?],
            other => {
                return Err(GenError::config(
                    format!("{}/lepton", cfg.path()),
                    format!("expected 'e' or 'mu', got '{other}'"),
                ));
            }
        };
        let r04: f64 = cfg.get_or("r04", 0.0)?;
        if !(0.0..=1.0).contains(&r04) {
            return Err(GenError::config(format!("{}/r04", cfg.path()), "r04 must lie in [0, 1]"));
        }
        let decay = Self::new(
            "vm_leptonic",
            parent,
            daughters,
            Self::read_branching_ratio(cfg)?,
            AngularDensity::Helicity { r04 },
        )
        .with_max_trials(cfg.get_or("max_trials", DEFAULT_MAX_TRIALS)?);
        decay.log_created();
        Ok(Box::new(decay))
    }

    fn log_created(&self) {
        log::info!(
            "{}: {} → {} {} (BR {:.4}, {:?})",
            self.name,
            self.parent.name,
            self.daughters[0].name,
            self.daughters[1].name,
            self.branching_ratio,
            self.density
        );
    }

    pub fn sample_cos_theta(&self, rng: &mut RandomSource) -> GenResult<f64> {
        self.sampler.sample(rng, |x| self.density.eval(x))
    }

    /// Helicity frame: the γ*-target CM when the event has those roles
    /// and the parent asks for it, otherwise the lab.
    fn frame(&self, event: &Event, status: Status) -> Option<ProductionFrame> {
        if status != Status::UnstableHelicity {
            return None;
        }
        let photon = event.get(event.roles.photon?)?;
        let target = event.get(event.roles.target?)?;
        Some(ProductionFrame::new(&photon.p, &target.p))
    }

    fn decay_one(&self, event: &mut Event, index: ParticleIndex, rng: &mut RandomSource) -> GenResult<()> {
        let parent = event.particle(index).clone();
        let frame = self.frame(event, parent.status);
        let p = frame.map_or(parent.p, |f| f.to_cm(&parent.p));

        let cos_theta = self.sample_cos_theta(rng)?;
        let phi = rng.phi();
        let [s1, s2] = self.daughters;
        let Some((mut d1, mut d2)) = kinematics::two_body_decay(&p, s1.mass, s2.mass, cos_theta, phi)
        else {
            log::debug!(
                "{} at index {index} with mass {:.5} below {} + {} threshold",
                self.parent.name,
                parent.p.m(),
                s1.name,
                s2.name
            );
            event.scale(0.0);
            return Ok(());
        };
        if let Some(f) = frame {
            d1 = f.to_lab(&d1);
            d2 = f.to_lab(&d2);
        }

        event.add_daughter(index, daughter(&s1, d1, parent.vertex));
        event.add_daughter(index, daughter(&s2, d2, parent.vertex));
        event.set_status(index, Status::Decayed);
        // σ only; the weight is untouched.
        event.cross_section *= self.branching_ratio;
        Ok(())
    }
}

fn daughter(species: &Species, p: FourVector, vertex: FourVector) -> Particle {
    let status = if species.width > 0.0 { Status::Unstable } else { Status::FinalState };
    Particle::new(species, status).with_momentum(p).with_vertex(vertex)
}

impl DecayProcessor for TwoBodyDecay {
    fn name(&self) -> &'static str {
        self.name
    }

    fn process(&self, event: &mut Event, rng: &mut RandomSource) -> GenResult<()> {
        let mut index = 0;
        while index < event.len() {
            let part = event.particle(index);
            if part.status.is_unstable() && part.pdg == self.parent.pdg {
                self.decay_one(event, index, rng)?;
            }
            index += 1;
        }
        Ok(())
    }
}
