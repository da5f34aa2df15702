//! Detector response: acceptance, efficiency and resolution.
//!
//! RULES:
//!   - Candidates are final-state (or scattered) particles that are not
//!     themselves detector records and have no detected copy yet.
//!   - A detection appends a copy with status INFO_ONLY, the detector
//!     region id, and the original particle as its single parent. The
//!     original's daughter range is left alone.
//!   - Detectors never remove particles and never touch the weight.

use crate::{
    config::Config,
    error::{GenError, GenResult},
    event::Event,
    generator::DetectorSimulator,
    initial::read_range,
    kinematics::{FourVector, Rotation3, Vector3},
    particle::{Species, Status},
    registry::ComponentRegistry,
    rng::RandomSource,
    types::{ParticleIndex, Pdg},
};

/// Indices of the particles a detector may still register.
pub fn candidates(event: &Event) -> Vec<ParticleIndex> {
    event
        .particles()
        .iter()
        .filter(|p| p.status.is_final() && p.detector_id.is_none())
        .map(|p| p.index)
        .filter(|&i| event.detected_copy_of(i).is_none())
        .collect()
}

fn append_copy(event: &mut Event, origin: ParticleIndex, p: FourVector, id: u32) -> ParticleIndex {
    let mut copy = event.particle(origin).clone().with_momentum(p);
    copy.status = Status::InfoOnly;
    copy.detector_id = Some(id);
    event.add_derived(origin, copy)
}

// ── Perfect ──────────────────────────────────────────────────────────────────

/// Registers every candidate with its true momentum.
pub struct PerfectDetector {
    id: u32,
}

impl PerfectDetector {
    pub fn new(id: u32) -> Self {
        Self { id }
    }

    pub fn create(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn DetectorSimulator>> {
        Ok(Box::new(Self::new(cfg.get_or("id", 0)?)))
    }
}

impl DetectorSimulator for PerfectDetector {
    fn name(&self) -> &'static str { "perfect" }

    fn detect(&self, event: &mut Event, _rng: &mut RandomSource) {
        for index in candidates(event) {
            let p = event.particle(index).p;
            append_copy(event, index, p, self.id);
        }
    }
}

// ── Acceptance maps ──────────────────────────────────────────────────────────

/// Efficiency table binned in momentum (GeV) and polar angle (degrees,
/// detector frame). Outside the table the efficiency is 0.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct AcceptanceMap {
    pub p_edges:     Vec<f64>,
    pub theta_edges: Vec<f64>,
    /// `values[p_bin][theta_bin]`
    pub values:      Vec<Vec<f64>>,
}

impl AcceptanceMap {
    pub fn from_config(cfg: &Config) -> GenResult<Self> {
        let map: AcceptanceMap = serde_json::from_value(cfg.value().clone())
            .map_err(|e| GenError::config(cfg.path(), e.to_string()))?;
        let shape_ok = map.p_edges.len() >= 2
            && map.theta_edges.len() >= 2
            && map.values.len() == map.p_edges.len() - 1
            && map.values.iter().all(|row| row.len() == map.theta_edges.len() - 1)
            && map.p_edges.windows(2).all(|w| w[0] < w[1])
            && map.theta_edges.windows(2).all(|w| w[0] < w[1]);
        if !shape_ok {
            return Err(GenError::config(
                cfg.path(),
                "acceptance map needs increasing edges and one value per (p, theta) bin",
            ));
        }
        Ok(map)
    }

    fn bin(edges: &[f64], x: f64) -> Option<usize> {
        let last = *edges.last()?;
        if !x.is_finite() || x < edges[0] || x >= last {
            return None;
        }
        Some(edges.partition_point(|&e| e <= x) - 1)
    }

    pub fn efficiency(&self, p: f64, theta_deg: f64) -> f64 {
        match (Self::bin(&self.p_edges, p), Self::bin(&self.theta_edges, theta_deg)) {
            (Some(i), Some(j)) => self.values[i][j].clamp(0.0, 1.0),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Efficiency {
    Flat(f64),
    Map(AcceptanceMap),
}

/// Gaussian resolution: relative in momentum, absolute (radians) in angle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Smearing {
    pub p_rel: f64,
    pub theta: f64,
    pub phi:   f64,
}

// ── Acceptance ───────────────────────────────────────────────────────────────

/// A spectrometer arm centred at `angle` from the beam axis in the x-z
/// plane. Windows, efficiencies and smearing are applied in the arm's
/// own frame (arm axis along +z).
pub struct AcceptanceDetector {
    id:           u32,
    species:      Option<Vec<Pdg>>,
    charged_only: bool,
    to_arm:       Rotation3,
    p_range:      (f64, f64),
    theta_range:  (f64, f64),
    phi_range:    (f64, f64),
    efficiency:   Efficiency,
    smearing:     Smearing,
}

impl AcceptanceDetector {
    pub fn from_config(cfg: &Config) -> GenResult<Self> {
        let species = match cfg.get_optional::<Vec<String>>("particles")? {
            None => None,
            Some(names) => Some(
                names
                    .iter()
                    .map(|n| Species::by_name(n).map(|s| s.pdg))
                    .collect::<GenResult<Vec<_>>>()?,
            ),
        };
        let deg = |(lo, hi): (f64, f64)| (lo.to_radians(), hi.to_radians());
        let optional_range = |key: &str, default: (f64, f64)| -> GenResult<(f64, f64)> {
            if cfg.contains(key) { read_range(cfg, key) } else { Ok(default) }
        };

        let efficiency = if cfg.contains("acceptance_map") {
            Efficiency::Map(AcceptanceMap::from_config(&cfg.section("acceptance_map")?)?)
        } else {
            let flat: f64 = cfg.get_or("efficiency", 1.0)?;
            if !(0.0..=1.0).contains(&flat) {
                return Err(GenError::config(format!("{}/efficiency", cfg.path()), "must lie in [0, 1]"));
            }
            Efficiency::Flat(flat)
        };
        let smearing = if cfg.contains("smearing") {
            let s = cfg.section("smearing")?;
            Smearing {
                p_rel: s.get_or("p", 0.0)?,
                theta: s.get_or::<f64>("theta", 0.0)?.to_radians(),
                phi:   s.get_or::<f64>("phi", 0.0)?.to_radians(),
            }
        } else {
            Smearing::default()
        };

        let angle: f64 = cfg.get_or::<f64>("angle", 0.0)?.to_radians();
        Ok(Self {
            id: cfg.get_or("id", 0)?,
            species,
            charged_only: cfg.get_or("charged_only", false)?,
            to_arm: Rotation3::about_y(-angle),
            p_range: optional_range("p_range", (0.0, f64::INFINITY))?,
            theta_range: deg(optional_range("theta_range", (0.0, 180.0))?),
            phi_range: deg(optional_range("phi_range", (-180.0, 180.0))?),
            efficiency,
            smearing,
        })
    }

    pub fn create(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn DetectorSimulator>> {
        let detector = Self::from_config(cfg)?;
        log::info!(
            "acceptance detector {}: p {:?} GeV, θ {:.1}..{:.1}°, {:?}",
            detector.id,
            detector.p_range,
            detector.theta_range.0.to_degrees(),
            detector.theta_range.1.to_degrees(),
            detector.smearing
        );
        Ok(Box::new(detector))
    }

    fn selects(&self, pdg: Pdg, charge: f64) -> bool {
        if self.charged_only && charge == 0.0 {
            return false;
        }
        self.species.as_ref().map_or(true, |list| list.contains(&pdg))
    }

    fn in_windows(&self, p: f64, theta: f64, phi: f64) -> bool {
        let within = |(lo, hi): (f64, f64), x: f64| x >= lo && x <= hi;
        within(self.p_range, p) && within(self.theta_range, theta) && within(self.phi_range, phi)
    }

    fn probability(&self, p: f64, theta: f64) -> f64 {
        match &self.efficiency {
            Efficiency::Flat(e) => *e,
            Efficiency::Map(map) => map.efficiency(p, theta.to_degrees()),
        }
    }

    /// Measured lab momentum for a particle seen by this arm, or None if
    /// it is missed.
    fn measure(&self, true_p: &FourVector, rng: &mut RandomSource) -> Option<FourVector> {
        let local = self.to_arm.apply(&true_p.p3());
        let (p, theta, phi) = (local.mag(), local.theta(), local.phi());
        if !self.in_windows(p, theta, phi) || !rng.chance(self.probability(p, theta)) {
            return None;
        }
        let smeared = Vector3::from_spherical(
            (p * (1.0 + rng.gaussian(0.0, self.smearing.p_rel))).max(0.0),
            rng.gaussian(theta, self.smearing.theta),
            rng.gaussian(phi, self.smearing.phi),
        );
        let mass = true_p.m().max(0.0);
        Some(FourVector::on_shell(mass, self.to_arm.inverse().apply(&smeared)))
    }
}

impl DetectorSimulator for AcceptanceDetector {
    fn name(&self) -> &'static str { "acceptance" }

    fn detect(&self, event: &mut Event, rng: &mut RandomSource) {
        for index in candidates(event) {
            let part = event.particle(index);
            if !self.selects(part.pdg, part.charge) {
                continue;
            }
            let true_p = part.p;
            if let Some(measured) = self.measure(&true_p, rng) {
                append_copy(event, index, measured, self.id);
            }
        }
    }
}

// ── Composite ────────────────────────────────────────────────────────────────

/// Runs its members in order. A particle registered by an earlier member
/// is no longer a candidate for later ones.
pub struct CompositeDetector {
    members: Vec<Box<dyn DetectorSimulator>>,
}

impl CompositeDetector {
    pub fn new(members: Vec<Box<dyn DetectorSimulator>>) -> Self {
        Self { members }
    }

    pub fn create(cfg: &Config, reg: &ComponentRegistry) -> GenResult<Box<dyn DetectorSimulator>> {
        let members = cfg
            .sections("detectors")?
            .iter()
            .map(|member| reg.detector.create_from(member, reg))
            .collect::<GenResult<Vec<_>>>()?;
        log::info!(
            "composite detector: [{}]",
            members.iter().map(|m| m.name()).collect::<Vec<_>>().join(", ")
        );
        Ok(Box::new(Self::new(members)))
    }
}

impl DetectorSimulator for CompositeDetector {
    fn name(&self) -> &'static str { "composite" }

    fn detect(&self, event: &mut Event, rng: &mut RandomSource) {
        for member in &self.members {
            member.detect(event, rng);
        }
    }
}
