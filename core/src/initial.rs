//! Initial-state generators: vertex, beam, target, photon, and the
//! photoproduction generator that composes them.
//!
//! EXECUTION ORDER inside `PhotoproductionGenerator::generate` (fixed):
//!   1. vertex
//!   2. beam
//!   3. target
//!   4. photon   (may close the channel)
//!   5. process  (may close the channel)
//!
//! Arena layout of a generated event:
//!   beam, target, [scattered, photon], recoil, leading
//! where a photon beam serves as its own photon.

use crate::{
    config::Config,
    error::{GenError, GenResult},
    event::Event,
    generator::{
        Generator, GeneratorData, ParticleGenerator, PhotonData, PhotonGenerator,
        InitialStateGenerator, ProcessGenerator, VertexGenerator,
    },
    kinematics::{self, FourVector, Rotation3, Vector3},
    particle::{Particle, Species, Status, PHOTON},
    registry::ComponentRegistry,
    rng::RandomSource,
    types::Pdg,
};

/// Fine-structure constant.
pub const ALPHA: f64 = 1.0 / 137.035_999;

/// Read a `[lo, hi]` pair and check its ordering.
pub(crate) fn read_range(cfg: &Config, key: &str) -> GenResult<(f64, f64)> {
    let [lo, hi]: [f64; 2] = cfg.get(key)?;
    if hi < lo {
        return Err(GenError::config(format!("{}/{key}", cfg.path()), "range upper edge below lower edge"));
    }
    Ok((lo, hi))
}

// ── Vertex generators ────────────────────────────────────────────────────────

pub struct OriginVertex;

impl OriginVertex {
    pub fn create(_cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn VertexGenerator>> {
        Ok(Box::new(Self))
    }
}

impl Generator for OriginVertex {
    fn name(&self) -> &'static str { "origin" }
}

impl VertexGenerator for OriginVertex {
    fn generate(&self, _rng: &mut RandomSource) -> FourVector {
        FourVector::default()
    }
}

/// Gaussian beam spot, lengths in cm.
pub struct GaussianVertex {
    sigma:  Vector3,
    offset: Vector3,
}

impl GaussianVertex {
    pub fn create(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn VertexGenerator>> {
        let [sx, sy, sz]: [f64; 3] = cfg.get("sigma")?;
        let [ox, oy, oz]: [f64; 3] = cfg.get_or("offset", [0.0; 3])?;
        Ok(Box::new(Self { sigma: Vector3::new(sx, sy, sz), offset: Vector3::new(ox, oy, oz) }))
    }
}

impl Generator for GaussianVertex {
    fn name(&self) -> &'static str { "gaussian" }
}

impl VertexGenerator for GaussianVertex {
    fn generate(&self, rng: &mut RandomSource) -> FourVector {
        FourVector::new(
            0.0,
            rng.gaussian(self.offset.x, self.sigma.x),
            rng.gaussian(self.offset.y, self.sigma.y),
            rng.gaussian(self.offset.z, self.sigma.z),
        )
    }
}

/// Uniform along a target cell centred on `z0`.
pub struct FlatZVertex {
    z0:     f64,
    length: f64,
}

impl FlatZVertex {
    pub fn create(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn VertexGenerator>> {
        let length: f64 = cfg.get("length")?;
        if length < 0.0 {
            return Err(GenError::config(format!("{}/length", cfg.path()), "negative target length"));
        }
        Ok(Box::new(Self { z0: cfg.get_or("z0", 0.0)?, length }))
    }
}

impl Generator for FlatZVertex {
    fn name(&self) -> &'static str { "flat_z" }
}

impl VertexGenerator for FlatZVertex {
    fn generate(&self, rng: &mut RandomSource) -> FourVector {
        let half = 0.5 * self.length;
        FourVector::new(0.0, 0.0, 0.0, rng.uniform(self.z0 - half, self.z0 + half))
    }
}

// ── Beam and target ──────────────────────────────────────────────────────────

/// A particle of fixed species and momentum.
pub struct ConstantParticle {
    name:     &'static str,
    particle: Particle,
}

impl ConstantParticle {
    /// Reads `particle`, `dir` (default +z) and either `energy` or
    /// `momentum` (default 0, i.e. at rest).
    pub fn from_config(cfg: &Config, name: &'static str) -> GenResult<Self> {
        let species = Species::by_name(&cfg.get::<String>("particle")?)?;
        let [dx, dy, dz]: [f64; 3] = cfg.get_or("dir", [0.0, 0.0, 1.0])?;
        let dir = Vector3::new(dx, dy, dz);
        if dir.mag2() == 0.0 {
            return Err(GenError::config(format!("{}/dir", cfg.path()), "zero direction"));
        }
        let momentum = match cfg.get_optional::<f64>("energy")? {
            Some(energy) if energy < species.mass => {
                return Err(GenError::config(format!("{}/energy", cfg.path()), "energy below particle mass"));
            }
            Some(energy) => (energy * energy - species.mass * species.mass).sqrt(),
            None => cfg.get_or("momentum", 0.0)?,
        };
        let p = FourVector::on_shell(species.mass, dir.unit() * momentum);
        Ok(Self { name, particle: Particle::new(&species, Status::Beam).with_momentum(p) })
    }

    pub fn create_beam(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn ParticleGenerator>> {
        Ok(Box::new(Self::from_config(cfg, "constant_beam")?))
    }

    pub fn create_target(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn ParticleGenerator>> {
        Ok(Box::new(Self::from_config(cfg, "constant_target")?))
    }
}

impl Generator for ConstantParticle {
    fn name(&self) -> &'static str { self.name }
}

impl ParticleGenerator for ConstantParticle {
    fn generate(&self, _rng: &mut RandomSource) -> Particle {
        self.particle.clone()
    }

    fn pdg(&self) -> Pdg {
        self.particle.pdg
    }
}

// ── Photon generators ────────────────────────────────────────────────────────

/// Invariants shared by the photon generators.
fn photon_data(photon: &FourVector, beam: &FourVector, target: &FourVector) -> GeneratorData {
    let mt = target.m();
    let w2 = (*photon + *target).m2();
    let q2 = -photon.m2();
    let nu = photon.dot(target) / mt;
    let e_beam = kinematics::generalized_beam_energy(beam, target);
    GeneratorData {
        w2,
        q2,
        nu,
        y: nu / e_beam,
        x: if nu > 0.0 { q2 / (2.0 * mt * nu) } else { 0.0 },
        ..GeneratorData::default()
    }
}

fn in_window(value: f64, window: Option<(f64, f64)>) -> bool {
    window.map_or(true, |(lo, hi)| value >= lo && value <= hi)
}

/// A photon beam used as-is: unit flux, no sampled variables.
pub struct PhotonBeam {
    w_range: Option<(f64, f64)>,
}

impl PhotonBeam {
    pub fn create(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn PhotonGenerator>> {
        let w_range = if cfg.contains("w_range") { Some(read_range(cfg, "w_range")?) } else { None };
        Ok(Box::new(Self { w_range }))
    }
}

impl Generator for PhotonBeam {
    fn name(&self) -> &'static str { "beam" }
}

impl PhotonGenerator for PhotonBeam {
    fn generate(&self, beam: &Particle, target: &Particle, _rng: &mut RandomSource) -> PhotonData {
        let photon = Particle::new(&PHOTON, Status::InfoOnly).with_vertex(beam.vertex).with_momentum(beam.p);
        let mut data = photon_data(&photon.p, &beam.p, &target.p);
        if data.w2 <= 0.0 || !in_window(data.w2.sqrt(), self.w_range) {
            data.cross_section = 0.0;
        }
        PhotonData { photon, scattered: None, data }
    }

    fn needs_photon_beam(&self) -> bool {
        true
    }
}

/// Real photons radiated by a charged beam in a thin radiator, collinear
/// with the beam, with energy fraction y drawn flat.
pub struct RealPhoton {
    y_range:     (f64, f64),
    /// radiator thickness in radiation lengths
    radiator_x0: f64,
    w_range:     Option<(f64, f64)>,
}

impl RealPhoton {
    pub fn create(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn PhotonGenerator>> {
        let y_range = if cfg.contains("y_range") { read_range(cfg, "y_range")? } else { (0.01, 1.0) };
        if y_range.0 <= 0.0 || y_range.1 > 1.0 {
            return Err(GenError::config(format!("{}/y_range", cfg.path()), "must lie inside (0, 1]"));
        }
        let w_range = if cfg.contains("w_range") { Some(read_range(cfg, "w_range")?) } else { None };
        Ok(Box::new(Self { y_range, radiator_x0: cfg.get_or("radiator_x0", 0.01)?, w_range }))
    }

    /// Thin-radiator photon yield per unit energy fraction.
    fn flux(&self, y: f64) -> f64 {
        self.radiator_x0 * (4.0 / 3.0 - 4.0 / 3.0 * y + y * y) / y
    }
}

impl Generator for RealPhoton {
    fn name(&self) -> &'static str { "real" }

    /// The flux falls monotonically in y on (0, 1].
    fn max_cross_section(&self) -> f64 {
        self.flux(self.y_range.0) * self.phase_space()
    }

    fn phase_space(&self) -> f64 {
        self.y_range.1 - self.y_range.0
    }
}

impl PhotonGenerator for RealPhoton {
    fn generate(&self, beam: &Particle, target: &Particle, rng: &mut RandomSource) -> PhotonData {
        let y = rng.uniform(self.y_range.0, self.y_range.1);
        let energy = y * beam.p.e;
        let photon = Particle::new(&PHOTON, Status::InfoOnly)
            .with_vertex(beam.vertex)
            .with_momentum(FourVector::from_p3(energy, beam.p.p3().unit() * energy));
        let mut data = photon_data(&photon.p, &beam.p, &target.p);
        data.cross_section = self.flux(y) * self.phase_space();
        data.phase_space = self.phase_space();
        if data.w2 <= 0.0 || !in_window(data.w2.sqrt(), self.w_range) {
            data.cross_section = 0.0;
        }
        PhotonData { photon, scattered: None, data }
    }
}

/// Virtual photons from a lepton beam in the equivalent-photon
/// approximation, sampled flat in (ln Q², y).
pub struct VirtualPhoton {
    q2_range: (f64, f64),
    y_range:  (f64, f64),
    w_range:  Option<(f64, f64)>,
}

impl VirtualPhoton {
    pub fn create(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn PhotonGenerator>> {
        let q2_range = read_range(cfg, "q2_range")?;
        let y_range = read_range(cfg, "y_range")?;
        if q2_range.0 <= 0.0 {
            return Err(GenError::config(format!("{}/q2_range", cfg.path()), "Q² must be positive"));
        }
        if y_range.0 <= 0.0 || y_range.1 >= 1.0 {
            return Err(GenError::config(format!("{}/y_range", cfg.path()), "must lie inside (0, 1)"));
        }
        let w_range = if cfg.contains("w_range") { Some(read_range(cfg, "w_range")?) } else { None };
        Ok(Box::new(Self { q2_range, y_range, w_range }))
    }

    /// Transverse photon flux dN/(dy dQ²) for a lepton of mass `ml`.
    fn flux(y: f64, q2: f64, ml: f64) -> f64 {
        let q2_min = ml * ml * y * y / (1.0 - y);
        if q2 < q2_min {
            return 0.0;
        }
        ALPHA / (std::f64::consts::PI * y * q2) * (1.0 - y + 0.5 * y * y - (1.0 - y) * q2_min / q2)
    }
}

impl Generator for VirtualPhoton {
    fn name(&self) -> &'static str { "virtual" }

    fn max_cross_section(&self) -> f64 {
        // Γ·Q² ≤ α/(π y)
        ALPHA / (std::f64::consts::PI * self.y_range.0) * self.phase_space()
    }

    fn phase_space(&self) -> f64 {
        (self.q2_range.1 / self.q2_range.0).ln() * (self.y_range.1 - self.y_range.0)
    }
}

impl PhotonGenerator for VirtualPhoton {
    fn generate(&self, beam: &Particle, target: &Particle, rng: &mut RandomSource) -> PhotonData {
        let closed = |photon: Particle| PhotonData { photon, scattered: None, data: GeneratorData::rejected() };
        let photon = Particle::new(&PHOTON, Status::InfoOnly).with_vertex(beam.vertex);

        let q2 = rng.uniform(self.q2_range.0.ln(), self.q2_range.1.ln()).exp();
        let y = rng.uniform(self.y_range.0, self.y_range.1);
        let phi = rng.phi();

        // Scattered lepton in the target rest frame, beam along +z.
        let target_beta = target.p.boost_vector();
        let beam_rest = beam.p.boost(&-target_beta);
        let rotation = Rotation3::aligning_with_z(&beam_rest.p3());
        let ml = beam.mass;
        let e = beam_rest.e;
        let e_out = e * (1.0 - y);
        if e_out <= ml {
            return closed(photon);
        }
        let p_in = beam_rest.p();
        let p_out = (e_out * e_out - ml * ml).sqrt();
        let cos_theta = (2.0 * e * e_out - 2.0 * ml * ml - q2) / (2.0 * p_in * p_out);
        if !(-1.0..=1.0).contains(&cos_theta) {
            return closed(photon);
        }
        let dir = Vector3::from_spherical(p_out, cos_theta.acos(), phi);
        let scattered_p = FourVector::from_p3(e_out, dir)
            .rotate(&rotation.inverse())
            .boost(&target_beta);

        let photon = photon.with_momentum(beam.p - scattered_p);
        let mut data = photon_data(&photon.p, &beam.p, &target.p);
        data.cross_section = Self::flux(y, q2, ml) * q2 * self.phase_space();
        data.phase_space = self.phase_space();
        if data.w2 <= 0.0 || !in_window(data.w2.sqrt(), self.w_range) {
            data.cross_section = 0.0;
        } else {
            data.epsilon = kinematics::epsilon(data.q2, data.w2.sqrt(), e, target.p.m());
        }

        let mut scattered = beam.clone().with_momentum(scattered_p);
        scattered.status = Status::Scattered;
        PhotonData { photon, scattered: Some(scattered), data }
    }
}

// ── Composed initial state ───────────────────────────────────────────────────

pub struct PhotoproductionGenerator {
    vertex:  Box<dyn VertexGenerator>,
    beam:    Box<dyn ParticleGenerator>,
    target:  Box<dyn ParticleGenerator>,
    photon:  Box<dyn PhotonGenerator>,
    process: Box<dyn ProcessGenerator>,
}

impl PhotoproductionGenerator {
    pub fn new(
        vertex: Box<dyn VertexGenerator>,
        beam: Box<dyn ParticleGenerator>,
        target: Box<dyn ParticleGenerator>,
        photon: Box<dyn PhotonGenerator>,
        process: Box<dyn ProcessGenerator>,
    ) -> Self {
        Self { vertex, beam, target, photon, process }
    }

    pub fn create(cfg: &Config, reg: &ComponentRegistry) -> GenResult<Box<dyn InitialStateGenerator>> {
        let vertex = if cfg.contains("vertex") {
            reg.vertex.create_from(&cfg.section("vertex")?, reg)?
        } else {
            Box::new(OriginVertex)
        };
        let beam = reg.beam.create_from(&cfg.section("beam")?, reg)?;
        let photon_cfg = cfg.section("photon")?;
        let photon = reg.photon.create_from(&photon_cfg, reg)?;
        let photon_beam = beam.pdg() == PHOTON.pdg;
        if photon_beam != photon.needs_photon_beam() {
            return Err(GenError::config(
                photon_cfg.path(),
                format!(
                    "photon generator '{}' cannot take a {} beam",
                    photon.name(),
                    if photon_beam { "photon" } else { "non-photon" }
                ),
            ));
        }
        let generator = Self::new(
            vertex,
            beam,
            reg.target.create_from(&cfg.section("target")?, reg)?,
            photon,
            reg.process.create_from(&cfg.section("process")?, reg)?,
        );
        log::info!(
            "photoproduction: vertex={} beam={} target={} photon={} process={} max σ={:.4e}",
            generator.vertex.name(),
            generator.beam.name(),
            generator.target.name(),
            generator.photon.name(),
            generator.process.name(),
            generator.max_cross_section()
        );
        Ok(Box::new(generator))
    }
}

impl Generator for PhotoproductionGenerator {
    fn name(&self) -> &'static str { "photoproduction" }

    fn max_cross_section(&self) -> f64 {
        self.photon.max_cross_section() * self.process.max_cross_section()
    }

    fn phase_space(&self) -> f64 {
        self.photon.phase_space() * self.process.phase_space()
    }
}

impl InitialStateGenerator for PhotoproductionGenerator {
    fn generate(&self, rng: &mut RandomSource) -> Event {
        let vertex = self.vertex.generate(rng);
        let beam = self.beam.generate(rng).with_vertex(vertex);
        let target = self.target.generate(rng).with_vertex(vertex);

        let mut event = Event::new();
        let beam_idx = event.add_particle(beam.clone());
        let target_idx = event.add_particle(target.clone());
        event.roles.beam = Some(beam_idx);
        event.roles.target = Some(target_idx);

        let photon = self.photon.generate(&beam, &target, rng);
        if !photon.data.is_open() {
            event.cross_section = 0.0;
            event.kinematics = photon.data;
            return event;
        }
        let process = self.process.generate(&photon, &target, rng);
        if !process.data.is_open() {
            event.cross_section = 0.0;
            event.kinematics = GeneratorData { cross_section: 0.0, ..photon.data };
            return event;
        }

        let photon_idx = if beam.pdg == PHOTON.pdg && photon.scattered.is_none() {
            beam_idx
        } else {
            if let Some(scattered) = photon.scattered.clone() {
                event.roles.scattered = Some(event.add_daughter(beam_idx, scattered));
            }
            event.add_daughter(beam_idx, photon.photon.clone())
        };
        event.roles.photon = Some(photon_idx);

        let recoil = process.recoil.with_vertex(vertex);
        let leading = process.leading.with_vertex(vertex);
        event.roles.recoil = Some(event.add_daughter_of(&[photon_idx, target_idx], recoil));
        event.roles.leading = Some(event.add_daughter_of(&[photon_idx, target_idx], leading));

        event.cross_section = photon.data.cross_section * process.data.cross_section;
        event.kinematics = GeneratorData {
            cross_section: event.cross_section,
            phase_space:   photon.data.phase_space * process.data.phase_space,
            t:             process.data.t,
            ..photon.data
        };
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn electron_beam() -> Particle {
        Particle::named("e-", Status::Beam)
            .unwrap()
            .with_momentum(FourVector::on_shell(0.000_511, Vector3::new(0.0, 0.0, 10.6)))
    }

    fn proton_at_rest() -> Particle {
        Particle::named("p", Status::Beam).unwrap()
    }

    #[test]
    fn constant_beam_reads_energy_and_direction() {
        let cfg = Config::new(json!({ "particle": "e-", "energy": 5.0, "dir": [0.0, 0.0, -2.0] }));
        let beam = ConstantParticle::from_config(&cfg, "beam").unwrap();
        let p = beam.generate(&mut RandomSource::new(1));
        assert!((p.p.e - 5.0).abs() < 1e-12);
        assert!(p.p.pz < 0.0 && p.p.px == 0.0);
        assert_eq!(p.status, Status::Beam);
    }

    #[test]
    fn constant_target_defaults_to_rest() {
        let cfg = Config::new(json!({ "particle": "p" }));
        let target = ConstantParticle::from_config(&cfg, "target").unwrap();
        let p = target.generate(&mut RandomSource::new(1));
        assert_eq!(p.p, FourVector::at_rest(p.mass));
    }

    #[test]
    fn virtual_photon_reproduces_sampled_invariants() {
        let cfg = Config::new(json!({ "q2_range": [0.5, 5.0], "y_range": [0.1, 0.9] }));
        let gen = VirtualPhoton::create(&cfg, &ComponentRegistry::empty()).unwrap();
        let mut rng = RandomSource::new(17);
        let (beam, target) = (electron_beam(), proton_at_rest());
        let mut open = 0;
        for _ in 0..500 {
            let out = gen.generate(&beam, &target, &mut rng);
            if !out.data.is_open() {
                continue;
            }
            open += 1;
            let scattered = out.scattered.expect("electroproduction keeps the lepton");
            assert!(out.data.q2 >= 0.5 - 1e-9 && out.data.q2 <= 5.0 + 1e-9, "q2={}", out.data.q2);
            assert!(out.data.y >= 0.1 - 1e-9 && out.data.y <= 0.9 + 1e-9, "y={}", out.data.y);
            assert!((scattered.p.m() - beam.mass).abs() < 1e-6);
            assert!(out.data.epsilon >= 0.0 && out.data.epsilon <= 1.0);
            assert!(out.data.cross_section <= gen.max_cross_section() * (1.0 + 1e-12));
        }
        assert!(open > 400, "only {open} open trials");
    }

    #[test]
    fn photon_beam_passes_through() {
        let cfg = Config::new(json!({}));
        let gen = PhotonBeam::create(&cfg, &ComponentRegistry::empty()).unwrap();
        let beam = Particle::named("gamma", Status::Beam)
            .unwrap()
            .with_momentum(FourVector::new(9.0, 0.0, 0.0, 9.0));
        let out = gen.generate(&beam, &proton_at_rest(), &mut RandomSource::new(3));
        assert_eq!(out.photon.p, beam.p);
        assert_eq!(out.data.cross_section, 1.0);
        assert!(out.data.q2.abs() < 1e-12);
    }

    #[test]
    fn bremsstrahlung_bound_holds_and_is_tight() {
        let cfg = Config::new(json!({ "y_range": [0.75, 1.0], "radiator_x0": 0.06 }));
        let gen = RealPhoton::create(&cfg, &ComponentRegistry::empty()).unwrap();
        let max = gen.max_cross_section();
        let mut rng = RandomSource::new(11);
        let mut observed = 0.0f64;
        for _ in 0..20_000 {
            let out = gen.generate(&electron_beam(), &proton_at_rest(), &mut rng);
            assert!(out.data.cross_section <= max, "σ {} above bound {max}", out.data.cross_section);
            observed = observed.max(out.data.cross_section);
        }
        assert!(max < 0.02, "bound {max} not set by the flux");
        assert!(observed > 0.99 * max, "observed {observed} vs bound {max}");
    }

    #[test]
    fn beam_species_must_match_photon_generator() {
        let cfg = |beam: &str, photon: &str| {
            Config::new(json!({
                "beam": { "type": "constant", "particle": beam, "energy": 10.6 },
                "target": { "type": "constant", "particle": "p" },
                "photon": { "type": photon },
                "process": { "type": "exponential_t", "recoil": "p", "leading": "J/psi", "b": 1.2, "sigma0": 1.0 }
            }))
        };
        let reg = ComponentRegistry::builtin();
        assert!(PhotoproductionGenerator::create(&cfg("gamma", "beam"), &reg).is_ok());
        assert!(PhotoproductionGenerator::create(&cfg("e-", "real"), &reg).is_ok());
        for (beam, photon) in [("gamma", "real"), ("e-", "beam")] {
            assert!(matches!(
                PhotoproductionGenerator::create(&cfg(beam, photon), &reg),
                Err(GenError::Config { .. })
            ));
        }
    }

    #[test]
    fn w_window_closes_the_channel() {
        let cfg = Config::new(json!({ "w_range": [100.0, 200.0] }));
        let gen = RealPhoton::create(&cfg, &ComponentRegistry::empty()).unwrap();
        let out = gen.generate(&electron_beam(), &proton_at_rest(), &mut RandomSource::new(3));
        assert_eq!(out.data.cross_section, 0.0);
    }

    #[test]
    fn reversed_range_is_a_config_error() {
        let cfg = Config::new(json!({ "q2_range": [5.0, 0.5], "y_range": [0.1, 0.9] }));
        assert!(matches!(
            VirtualPhoton::create(&cfg, &ComponentRegistry::empty()),
            Err(GenError::Config { .. })
        ));
    }
}
