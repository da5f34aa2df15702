//! Generator and processor traits.
//!
//! RULE: Every pipeline component implements one of these traits and is
//! built through the matching family in `ComponentRegistry`. Generators
//! produce kinematics; processors mutate an existing Event.
//!
//! A closed channel is never an error: generators report it with a zero
//! `cross_section` and the pipeline draws a fresh trial.

use crate::{
    error::GenResult,
    event::Event,
    kinematics::FourVector,
    particle::Particle,
    rng::RandomSource,
    types::Pdg,
};
use serde::{Deserialize, Serialize};

/// Intermediate record handed from one generator stage to the next.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeneratorData {
    pub cross_section: f64,
    /// Normalization volume of the sampled variables.
    pub phase_space:   f64,
    /// invariant mass squared of the photon-target system
    pub w2:            f64,
    /// photon virtuality
    pub q2:            f64,
    /// photon energy in the target rest frame
    pub nu:            f64,
    pub y:             f64,
    pub x:             f64,
    /// Mandelstam t of the exclusive process
    pub t:             f64,
    /// virtual photon polarization
    pub epsilon:       f64,
}

impl Default for GeneratorData {
    fn default() -> Self {
        Self {
            cross_section: 1.0,
            phase_space:   1.0,
            w2:            0.0,
            q2:            0.0,
            nu:            0.0,
            y:             0.0,
            x:             0.0,
            t:             0.0,
            epsilon:       0.0,
        }
    }
}

impl GeneratorData {
    /// A kinematically closed trial.
    pub fn rejected() -> Self {
        Self { cross_section: 0.0, ..Self::default() }
    }

    pub fn is_open(&self) -> bool {
        self.cross_section > 0.0
    }
}

/// Capabilities shared by every generator.
pub trait Generator: Send {
    /// Unique stable name for this generator type.
    fn name(&self) -> &'static str;

    /// Upper bound on the cross section reported by any single trial.
    fn max_cross_section(&self) -> f64 {
        1.0
    }

    /// Normalization volume of the variables this generator samples.
    fn phase_space(&self) -> f64 {
        1.0
    }
}

/// Interaction vertex (t, x, y, z).
pub trait VertexGenerator: Generator {
    fn generate(&self, rng: &mut RandomSource) -> FourVector;
}

/// Beam or target particle.
pub trait ParticleGenerator: Generator {
    fn generate(&self, rng: &mut RandomSource) -> Particle;

    /// Species of every particle this generator produces.
    fn pdg(&self) -> Pdg;
}

/// Output of a photon generator.
#[derive(Debug, Clone)]
pub struct PhotonData {
    pub photon:    Particle,
    /// Scattered lepton for electroproduction; None for real photons.
    pub scattered: Option<Particle>,
    pub data:      GeneratorData,
}

/// Real or virtual photon off a beam, given the target.
pub trait PhotonGenerator: Generator {
    fn generate(&self, beam: &Particle, target: &Particle, rng: &mut RandomSource) -> PhotonData;

    /// True if the beam itself must be the photon.
    fn needs_photon_beam(&self) -> bool {
        false
    }
}

/// Output of an exclusive process generator.
#[derive(Debug, Clone)]
pub struct ProcessData {
    pub recoil:  Particle,
    pub leading: Particle,
    pub data:    GeneratorData,
}

/// `γ(*) + target → recoil + leading`.
pub trait ProcessGenerator: Generator {
    fn generate(&self, photon: &PhotonData, target: &Particle, rng: &mut RandomSource) -> ProcessData;
}

/// Produces a complete initial state: beam, target, photon and the
/// exclusive final state, with the trial cross section on the Event.
pub trait InitialStateGenerator: Generator {
    fn generate(&self, rng: &mut RandomSource) -> Event;
}

/// Decays unstable particles in place.
pub trait DecayProcessor: Send {
    fn name(&self) -> &'static str;

    fn process(&self, event: &mut Event, rng: &mut RandomSource) -> GenResult<()>;
}

/// Appends detected counterparts of final-state particles.
pub trait DetectorSimulator: Send {
    fn name(&self) -> &'static str;

    fn detect(&self, event: &mut Event, rng: &mut RandomSource);
}

/// Final event-level selection; may zero the weight, never drops the event.
pub trait Reconstruction: Send {
    fn name(&self) -> &'static str;

    fn reconstruct(&self, event: &mut Event);
}
