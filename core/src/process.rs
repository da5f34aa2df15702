//! Exclusive production processes `γ(*) + target → recoil + leading`.

use crate::{
    config::Config,
    error::{GenError, GenResult},
    generator::{Generator, GeneratorData, PhotonData, ProcessData, ProcessGenerator},
    kinematics::{self, TwoBodyCm},
    particle::{Particle, Species, Status},
    registry::ComponentRegistry,
    rng::RandomSource,
};

/// Half-width of the Breit-Wigner mass window, in units of the width.
const BW_WINDOW: f64 = 3.0;

/// Diffractive production with `dσ/dt ∝ exp(b·t)`.
///
/// t is drawn flat in `exp(b·t)` over the allowed window, which makes the
/// per-trial weight independent of t:
///
/// `σ_trial = σ0 · F(W, Q², ε) · (exp(b·t_high) − exp(b·t_low))`
///
/// with `F` the product of the threshold, dipole and (1 + εR) factors.
pub struct ExponentialTProcess {
    recoil:          Species,
    leading:         Species,
    leading_status:  Status,
    /// t-slope, GeV⁻²
    b:               f64,
    /// asymptotic cross section (units are the caller's, nb by convention)
    sigma0:          f64,
    threshold_power: f64,
    dipole_power:    f64,
    /// R = σL/σT = (r_c · Q²/M²)^r_n
    r_c:             f64,
    r_n:             f64,
    breit_wigner:    bool,
    max_xs:          f64,
}

impl ExponentialTProcess {
    pub fn from_config(cfg: &Config) -> GenResult<Self> {
        let recoil = Species::by_name(&cfg.get::<String>("recoil")?)?;
        let leading = Species::by_name(&cfg.get::<String>("leading")?)?;
        let b: f64 = cfg.get("b")?;
        if b <= 0.0 {
            return Err(GenError::config(format!("{}/b", cfg.path()), "t-slope must be positive"));
        }
        let sigma0: f64 = cfg.get("sigma0")?;
        let leading_status = match cfg.get_optional::<String>("leading_status")?.as_deref() {
            None if leading.width > 0.0 => Status::Unstable,
            None | Some("final_state") => Status::FinalState,
            Some("unstable") => Status::Unstable,
            Some("unstable_helicity") => Status::UnstableHelicity,
            Some(other) => {
                return Err(GenError::config(
                    format!("{}/leading_status", cfg.path()),
                    format!("unknown status '{other}'"),
                ));
            }
        };
        let r_c: f64 = cfg.get_or("r_c", 0.0)?;
        let r_n: f64 = cfg.get_or("r_n", 1.0)?;
        if r_c > 0.0 && r_n <= 0.0 {
            return Err(GenError::config(format!("{}/r_n", cfg.path()), "R exponent must be positive"));
        }
        let breit_wigner: bool = cfg.get_or("breit_wigner", false)?;
        let mut process = Self {
            recoil,
            leading,
            leading_status,
            b,
            sigma0,
            threshold_power: cfg.get_or("threshold_power", 0.0)?,
            dipole_power:    cfg.get_or("dipole_power", 0.0)?,
            r_c,
            r_n,
            breit_wigner,
            max_xs:          sigma0,
        };
        process.max_xs = match cfg.get_optional::<f64>("max_cross_section")? {
            Some(max) => max,
            None if r_c > 0.0 => {
                let q2_max: f64 = cfg.get_optional("q2_max")?.ok_or_else(|| {
                    GenError::config(
                        format!("{}/max_cross_section", cfg.path()),
                        "r_c > 0 needs either max_cross_section or q2_max",
                    )
                })?;
                process.envelope_bound(q2_max)
            }
            None => sigma0,
        };
        Ok(process)
    }

    pub fn create(cfg: &Config, _reg: &ComponentRegistry) -> GenResult<Box<dyn ProcessGenerator>> {
        Ok(Box::new(Self::from_config(cfg)?))
    }

    fn leading_mass(&self, rng: &mut RandomSource) -> f64 {
        let (m, width) = (self.leading.mass, self.leading.width);
        if !self.breit_wigner || width <= 0.0 {
            return m;
        }
        let (lo, hi) = ((m - BW_WINDOW * width).max(0.0), m + BW_WINDOW * width);
        loop {
            let draw = rng.breit_wigner(m, width);
            if draw >= lo && draw <= hi {
                return draw;
            }
        }
    }

    /// Upper bound on `σ0 · envelope · Δy` for Q² ≤ `q2_max`.
    ///
    /// threshold, dipole and Δy never exceed 1; R grows with Q² and
    /// shrinks with the leading mass, and ε ≤ 1.
    fn envelope_bound(&self, q2_max: f64) -> f64 {
        let mut m = self.leading.mass;
        if self.breit_wigner && self.leading.width > 0.0 {
            m = (m - BW_WINDOW * self.leading.width).max(f64::MIN_POSITIVE);
        }
        self.sigma0 * (1.0 + (self.r_c * q2_max.max(0.0) / (m * m)).powf(self.r_n))
    }

    /// W, Q² and ε dependence of the t-integrated cross section.
    fn envelope(&self, w2: f64, q2: f64, epsilon: f64, mv: f64) -> f64 {
        let threshold2 = (self.recoil.mass + mv).powi(2);
        let threshold = (1.0 - threshold2 / w2).max(0.0).powf(self.threshold_power);
        let m2 = mv * mv;
        let dipole = (m2 / (m2 + q2)).powf(self.dipole_power);
        let r = if self.r_c > 0.0 && q2 > 0.0 { (self.r_c * q2 / m2).powf(self.r_n) } else { 0.0 };
        threshold * dipole * (1.0 + epsilon * r)
    }

    fn closed(&self) -> ProcessData {
        ProcessData {
            recoil:  Particle::new(&self.recoil, Status::FinalState),
            leading: Particle::new(&self.leading, self.leading_status),
            data:    GeneratorData::rejected(),
        }
    }
}

impl Generator for ExponentialTProcess {
    fn name(&self) -> &'static str { "exponential_t" }

    fn max_cross_section(&self) -> f64 {
        self.max_xs
    }

    /// Volume of the full t-range (−∞, 0] in the exp(b·t) parametrization.
    fn phase_space(&self) -> f64 {
        1.0 / self.b
    }
}

impl ProcessGenerator for ExponentialTProcess {
    fn generate(&self, photon: &PhotonData, target: &Particle, rng: &mut RandomSource) -> ProcessData {
        let mv = self.leading_mass(rng);
        let w2 = (photon.photon.p + target.p).m2();
        let q2 = -photon.photon.p.m2();
        let Some(cm) = TwoBodyCm::new(w2, q2, target.p.m(), self.recoil.mass, mv) else {
            log::debug!("closed channel: W²={w2:.4} below threshold");
            return self.closed();
        };
        let (t_low, t_high) = cm.t_range();
        if t_high <= t_low {
            return self.closed();
        }

        let (y_low, y_high) = kinematics::exp_bt_range(t_low, t_high, self.b);
        let y = rng.uniform(y_low, y_high);
        let t = kinematics::t_from_exp_bt(y, self.b, t_low, t_high);
        let phi = rng.phi();
        let Some((recoil_p, leading_p)) =
            kinematics::two_body_production(&photon.photon.p, &target.p, self.recoil.mass, mv, t, phi)
        else {
            return self.closed();
        };

        let mut leading = Particle::new(&self.leading, self.leading_status).with_momentum(leading_p);
        leading.mass = mv;
        let cross_section = self.sigma0
            * self.envelope(w2, q2, photon.data.epsilon, mv)
            * (y_high - y_low);

        ProcessData {
            recoil: Particle::new(&self.recoil, Status::FinalState).with_momentum(recoil_p),
            leading,
            data: GeneratorData {
                cross_section,
                phase_space: (y_high - y_low) / self.b,
                w2,
                q2,
                t,
                ..photon.data
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::FourVector;
    use serde_json::json;

    fn process(extra: serde_json::Value) -> ExponentialTProcess {
        let mut cfg = json!({ "recoil": "p", "leading": "J/psi", "b": 1.2, "sigma0": 2.0 });
        if let (Some(base), Some(more)) = (cfg.as_object_mut(), extra.as_object()) {
            base.extend(more.clone());
        }
        ExponentialTProcess::from_config(&Config::new(cfg)).unwrap()
    }

    fn real_photon(energy: f64) -> PhotonData {
        let photon = Particle::named("gamma", Status::InfoOnly)
            .unwrap()
            .with_momentum(FourVector::new(energy, 0.0, 0.0, energy));
        PhotonData { photon, scattered: None, data: GeneratorData::default() }
    }

    #[test]
    fn below_threshold_is_closed_not_an_error() {
        let target = Particle::named("p", Status::Beam).unwrap();
        let out = process(json!({})).generate(&real_photon(8.0), &target, &mut RandomSource::new(1));
        assert_eq!(out.data.cross_section, 0.0);
    }

    #[test]
    fn sampled_t_lies_in_window_and_matches_final_state() {
        let proc_ = process(json!({}));
        let target = Particle::named("p", Status::Beam).unwrap();
        let photon = real_photon(11.0);
        let mut rng = RandomSource::new(8);
        for _ in 0..200 {
            let out = proc_.generate(&photon, &target, &mut rng);
            assert!(out.data.is_open());
            let cm = TwoBodyCm::new(out.data.w2, 0.0, target.mass, target.mass, 3.0969).unwrap();
            let (t_low, t_high) = cm.t_range();
            assert!(out.data.t >= t_low && out.data.t <= t_high);
            let t_check = (target.p - out.recoil.p).m2();
            assert!((t_check - out.data.t).abs() < 1e-8, "{t_check} vs {}", out.data.t);
            assert!(out.data.cross_section <= proc_.max_cross_section());
        }
    }

    #[test]
    fn trial_weight_is_the_integral_over_the_window() {
        let proc_ = process(json!({}));
        let target = Particle::named("p", Status::Beam).unwrap();
        let photon = real_photon(11.0);
        let out = proc_.generate(&photon, &target, &mut RandomSource::new(2));
        let cm = TwoBodyCm::new(out.data.w2, 0.0, target.mass, target.mass, 3.0969).unwrap();
        let (t_low, t_high) = cm.t_range();
        let integral = 2.0 * ((1.2 * t_high).exp() - (1.2 * t_low).exp());
        assert!((out.data.cross_section - integral).abs() < 1e-9);
    }

    #[test]
    fn breit_wigner_mass_stays_in_window() {
        let proc_ = process(json!({ "leading": "phi", "breit_wigner": true }));
        let target = Particle::named("p", Status::Beam).unwrap();
        let mut rng = RandomSource::new(4);
        let width = 0.004_249;
        for _ in 0..200 {
            let out = proc_.generate(&real_photon(6.0), &target, &mut rng);
            assert!((out.leading.mass - 1.019_461).abs() <= BW_WINDOW * width + 1e-12);
            assert!((out.leading.p.m() - out.leading.mass).abs() < 1e-6);
            assert_eq!(out.leading.status, Status::Unstable);
        }
    }

    fn virtual_photon(nu: f64, q2: f64, epsilon: f64) -> PhotonData {
        let photon = Particle::named("gamma", Status::InfoOnly)
            .unwrap()
            .with_momentum(FourVector::new(nu, 0.0, 0.0, (nu * nu + q2).sqrt()));
        let data = GeneratorData { epsilon, ..GeneratorData::default() };
        PhotonData { photon, scattered: None, data }
    }

    #[test]
    fn longitudinal_term_needs_a_bound() {
        let cfg = Config::new(json!({ "recoil": "p", "leading": "phi", "b": 1.0, "sigma0": 1.0, "r_c": 1.0 }));
        assert!(matches!(ExponentialTProcess::from_config(&cfg), Err(GenError::Config { .. })));
    }

    #[test]
    fn longitudinal_term_stays_under_derived_maximum() {
        let proc_ = process(json!({
            "leading": "phi", "b": 1.0, "sigma0": 1.0, "r_c": 1.0, "r_n": 1.0, "q2_max": 2.0
        }));
        let target = Particle::named("p", Status::Beam).unwrap();
        let mut rng = RandomSource::new(5);
        for q2 in [0.1, 0.5, 1.0, 2.0] {
            let photon = virtual_photon(8.0, q2, 0.9);
            for _ in 0..50 {
                let out = proc_.generate(&photon, &target, &mut rng);
                assert!(out.data.is_open());
                assert!(
                    out.data.cross_section <= proc_.max_cross_section(),
                    "σ {} above {} at Q² {q2}",
                    out.data.cross_section,
                    proc_.max_cross_section()
                );
            }
        }
        assert!(proc_.max_cross_section() > 1.0);
    }

    #[test]
    fn unknown_status_is_a_config_error() {
        let cfg = Config::new(json!({
            "recoil": "p", "leading": "J/psi", "b": 1.0, "sigma0": 1.0, "leading_status": "wobbly"
        }));
        assert!(matches!(ExponentialTProcess::from_config(&cfg), Err(GenError::Config { .. })));
    }
}
