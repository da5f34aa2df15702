//! Particle records and the built-in species table.
//!
//! RULE: a particle's `index` is its position in the owning event's
//! arena. It is assigned by `Event::add_*` and never changes.

use crate::{
    error::{GenError, GenResult},
    kinematics::FourVector,
    types::{ParticleIndex, Pdg},
};
use serde::{Deserialize, Serialize};

/// Status codes as written to output. Variants are never renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum Status {
    Other            = 0,
    FinalState       = 1,
    Decayed          = 2,
    Unstable         = 3,
    Beam             = 4,
    InfoOnly         = 11,
    Scattered        = 21,
    UnstableHelicity = 22,
}

impl Status {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Particles that reach the detector.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::FinalState | Self::Scattered)
    }

    /// Particles that still need a decay processor.
    pub fn is_unstable(&self) -> bool {
        matches!(self, Self::Unstable | Self::UnstableHelicity)
    }
}

// ── Species ──────────────────────────────────────────────────────────────────

/// Static properties of a particle species.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Species {
    pub name:     &'static str,
    pub pdg:      Pdg,
    pub charge:   f64,
    /// GeV
    pub mass:     f64,
    /// full width, GeV
    pub width:    f64,
    /// mean proper lifetime, ns (0 for prompt or stable)
    pub lifetime: f64,
}

const fn species(
    name: &'static str,
    pdg: Pdg,
    charge: f64,
    mass: f64,
    width: f64,
    lifetime: f64,
) -> Species {
    Species { name, pdg, charge, mass, width, lifetime }
}

pub const PHOTON: Species = species("gamma", 22, 0.0, 0.0, 0.0, 0.0);

/// The species the built-in components know about.
pub const SPECIES: &[Species] = &[
    species("e-",      11,      -1.0, 0.000_510_999, 0.0,       0.0),
    species("e+",      -11,      1.0, 0.000_510_999, 0.0,       0.0),
    species("mu-",     13,      -1.0, 0.105_658_4,   0.0,       2_196.98),
    species("mu+",     -13,      1.0, 0.105_658_4,   0.0,       2_196.98),
    PHOTON,
    species("p",       2212,     1.0, 0.938_272_09,  0.0,       0.0),
    species("n",       2112,     0.0, 0.939_565_42,  0.0,       8.79e11),
    species("pi+",     211,      1.0, 0.139_570_39,  0.0,       26.033),
    species("pi-",     -211,    -1.0, 0.139_570_39,  0.0,       26.033),
    species("pi0",     111,      0.0, 0.134_976_8,   0.0,       8.43e-8),
    species("K+",      321,      1.0, 0.493_677,     0.0,       12.38),
    species("K-",      -321,    -1.0, 0.493_677,     0.0,       12.38),
    species("Lambda",  3122,     0.0, 1.115_683,     0.0,       0.263_2),
    species("rho0",    113,      0.0, 0.775_26,      0.149_1,   0.0),
    species("omega",   223,      0.0, 0.782_66,      0.008_68,  0.0),
    species("phi",     333,      0.0, 1.019_461,     0.004_249, 0.0),
    species("J/psi",   443,      0.0, 3.096_900,     0.000_092_6, 0.0),
    species("psi(2S)", 100_443,  0.0, 3.686_097,     0.000_294, 0.0),
    species("Upsilon", 553,      0.0, 9.460_30,      0.000_054_02, 0.0),
];

impl Species {
    pub fn by_name(name: &str) -> GenResult<Species> {
        SPECIES
            .iter()
            .find(|s| s.name == name)
            .copied()
            .ok_or_else(|| GenError::UnknownParticle { name: name.to_string() })
    }

    pub fn by_pdg(pdg: Pdg) -> GenResult<Species> {
        SPECIES
            .iter()
            .find(|s| s.pdg == pdg)
            .copied()
            .ok_or_else(|| GenError::UnknownParticle { name: pdg.to_string() })
    }
}

// ── Particle ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub index:       ParticleIndex,
    pub pdg:         Pdg,
    pub status:      Status,
    pub charge:      f64,
    pub mass:        f64,
    pub lifetime:    f64,
    pub p:           FourVector,
    pub vertex:      FourVector,
    pub parents:     [Option<ParticleIndex>; 2],
    /// Half-open range `[begin, end)` of daughters in the same arena.
    pub daughters:   (ParticleIndex, ParticleIndex),
    /// Detector region that produced this record, for detected copies.
    pub detector_id: Option<u32>,
}

impl Particle {
    /// A particle of the given species, at rest at the origin.
    pub fn new(species: &Species, status: Status) -> Self {
        Self {
            index:       0,
            pdg:         species.pdg,
            status,
            charge:      species.charge,
            mass:        species.mass,
            lifetime:    species.lifetime,
            p:           FourVector::at_rest(species.mass),
            vertex:      FourVector::default(),
            parents:     [None, None],
            daughters:   (0, 0),
            detector_id: None,
        }
    }

    pub fn named(name: &str, status: Status) -> GenResult<Self> {
        Ok(Self::new(&Species::by_name(name)?, status))
    }

    pub fn with_momentum(mut self, p: FourVector) -> Self {
        self.p = p;
        self
    }

    pub fn with_vertex(mut self, vertex: FourVector) -> Self {
        self.vertex = vertex;
        self
    }

    pub fn n_daughters(&self) -> usize {
        self.daughters.1 - self.daughters.0
    }

    pub fn has_parent(&self, index: ParticleIndex) -> bool {
        self.parents.contains(&Some(index))
    }

    /// Parent indices as written to output (-1 = absent).
    pub fn parent_codes(&self) -> [i64; 2] {
        self.parents.map(|p| p.map_or(-1, |i| i as i64))
    }
}
