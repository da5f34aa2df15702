//! Relativistic kinematics: 3- and 4-vectors, boosts, rotations and the
//! two-body CM-frame construction used by every production, decay and
//! detector component.
//!
//! Conventions: natural units (GeV), metric (+,-,-,-), vectors stored
//! as (E, px, py, pz). Mandelstam t is negative in the physical region.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

// ── 3-vectors ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const Z: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 1.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Vector of length `r` pointing along polar angle `theta`, azimuth `phi`.
    pub fn from_spherical(r: f64, theta: f64, phi: f64) -> Self {
        let (st, ct) = theta.sin_cos();
        let (sp, cp) = phi.sin_cos();
        Self::new(r * st * cp, r * st * sp, r * ct)
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn mag2(&self) -> f64 {
        self.dot(self)
    }

    pub fn mag(&self) -> f64 {
        self.mag2().sqrt()
    }

    /// Polar angle with respect to +z, in [0, π].
    pub fn theta(&self) -> f64 {
        let perp = (self.x * self.x + self.y * self.y).sqrt();
        if perp == 0.0 && self.z == 0.0 {
            0.0
        } else {
            perp.atan2(self.z)
        }
    }

    /// Azimuth in (-π, π].
    pub fn phi(&self) -> f64 {
        if self.x == 0.0 && self.y == 0.0 {
            0.0
        } else {
            self.y.atan2(self.x)
        }
    }

    pub fn unit(&self) -> Vector3 {
        let m = self.mag();
        if m > 0.0 {
            *self * (1.0 / m)
        } else {
            *self
        }
    }
}

impl Add for Vector3 {
    type Output = Vector3;
    fn add(self, o: Vector3) -> Vector3 {
        Vector3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;
    fn sub(self, o: Vector3) -> Vector3 {
        Vector3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;
    fn neg(self) -> Vector3 {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Vector3;
    fn mul(self, s: f64) -> Vector3 {
        Vector3::new(self.x * s, self.y * s, self.z * s)
    }
}

// ── Rotations ────────────────────────────────────────────────────────────────

/// A proper rotation stored as a row-major 3x3 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation3 {
    m: [[f64; 3]; 3],
}

impl Default for Rotation3 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Rotation3 {
    pub fn identity() -> Self {
        Self { m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]] }
    }

    pub fn about_y(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self { m: [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]] }
    }

    pub fn about_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self { m: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]] }
    }

    /// The rotation taking the direction of `dir` onto +z.
    pub fn aligning_with_z(dir: &Vector3) -> Self {
        Self::about_y(-dir.theta()).after(&Self::about_z(-dir.phi()))
    }

    /// `self ∘ first`: apply `first`, then `self`.
    pub fn after(&self, first: &Rotation3) -> Self {
        let mut m = [[0.0; 3]; 3];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[i][k] * first.m[k][j]).sum();
            }
        }
        Self { m }
    }

    pub fn inverse(&self) -> Self {
        let mut m = [[0.0; 3]; 3];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = self.m[j][i];
            }
        }
        Self { m }
    }

    pub fn apply(&self, v: &Vector3) -> Vector3 {
        let r = &self.m;
        Vector3::new(
            r[0][0] * v.x + r[0][1] * v.y + r[0][2] * v.z,
            r[1][0] * v.x + r[1][1] * v.y + r[1][2] * v.z,
            r[2][0] * v.x + r[2][1] * v.y + r[2][2] * v.z,
        )
    }
}

// ── 4-vectors ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FourVector {
    pub e:  f64,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
}

impl FourVector {
    pub fn new(e: f64, px: f64, py: f64, pz: f64) -> Self {
        Self { e, px, py, pz }
    }

    pub fn from_p3(e: f64, p: Vector3) -> Self {
        Self::new(e, p.x, p.y, p.z)
    }

    /// On-shell vector of mass `mass` and 3-momentum `p`.
    pub fn on_shell(mass: f64, p: Vector3) -> Self {
        Self::from_p3((p.mag2() + mass * mass).sqrt(), p)
    }

    pub fn at_rest(mass: f64) -> Self {
        Self::new(mass, 0.0, 0.0, 0.0)
    }

    pub fn p3(&self) -> Vector3 {
        Vector3::new(self.px, self.py, self.pz)
    }

    pub fn p(&self) -> f64 {
        self.p3().mag()
    }

    pub fn theta(&self) -> f64 {
        self.p3().theta()
    }

    pub fn phi(&self) -> f64 {
        self.p3().phi()
    }

    /// Minkowski product.
    pub fn dot(&self, o: &FourVector) -> f64 {
        self.e * o.e - self.px * o.px - self.py * o.py - self.pz * o.pz
    }

    pub fn m2(&self) -> f64 {
        self.dot(self)
    }

    /// Invariant mass; negative for space-like vectors (-√|m²|).
    pub fn m(&self) -> f64 {
        let m2 = self.m2();
        if m2 >= 0.0 {
            m2.sqrt()
        } else {
            -(-m2).sqrt()
        }
    }

    /// Velocity of the frame in which this vector is at rest.
    pub fn boost_vector(&self) -> Vector3 {
        self.p3() * (1.0 / self.e)
    }

    /// Active Lorentz boost by velocity `beta`.
    pub fn boost(&self, beta: &Vector3) -> FourVector {
        let b2 = beta.mag2();
        if b2 == 0.0 {
            return *self;
        }
        let gamma = 1.0 / (1.0 - b2).sqrt();
        let bp = beta.dot(&self.p3());
        let gamma2 = (gamma - 1.0) / b2;
        let p = self.p3() + *beta * (gamma2 * bp + gamma * self.e);
        FourVector::from_p3(gamma * (self.e + bp), p)
    }

    pub fn rotate(&self, rot: &Rotation3) -> FourVector {
        FourVector::from_p3(self.e, rot.apply(&self.p3()))
    }
}

impl Add for FourVector {
    type Output = FourVector;
    fn add(self, o: FourVector) -> FourVector {
        FourVector::new(self.e + o.e, self.px + o.px, self.py + o.py, self.pz + o.pz)
    }
}

impl AddAssign for FourVector {
    fn add_assign(&mut self, o: FourVector) {
        *self = *self + o;
    }
}

impl Sub for FourVector {
    type Output = FourVector;
    fn sub(self, o: FourVector) -> FourVector {
        FourVector::new(self.e - o.e, self.px - o.px, self.py - o.py, self.pz - o.pz)
    }
}

impl Neg for FourVector {
    type Output = FourVector;
    fn neg(self) -> FourVector {
        FourVector::new(-self.e, -self.px, -self.py, -self.pz)
    }
}

impl Mul<f64> for FourVector {
    type Output = FourVector;
    fn mul(self, s: f64) -> FourVector {
        FourVector::new(self.e * s, self.px * s, self.py * s, self.pz * s)
    }
}

// ── Scalar helpers ───────────────────────────────────────────────────────────

/// Beam energy as seen in the rest frame of `frame`: (k·P)/M.
pub fn generalized_beam_energy(k: &FourVector, frame: &FourVector) -> f64 {
    k.dot(frame) / frame.m()
}

/// Virtual-photon polarization parameter ε for a photon of virtuality
/// `q2` producing invariant mass `w` off a target of mass `target_mass`,
/// with lepton beam energy `beam_energy` in the target rest frame.
///
/// Returns 0 outside the physical region.
pub fn epsilon(q2: f64, w: f64, beam_energy: f64, target_mass: f64) -> f64 {
    let nu = (w * w + q2 - target_mass * target_mass) / (2.0 * target_mass);
    if q2 < 0.0 || nu <= 0.0 || nu >= beam_energy {
        return 0.0;
    }
    let y = nu / beam_energy;
    // γ²y²/4 with γ² = Q²/ν²
    let g = q2 / (4.0 * beam_energy * beam_energy);
    let num = 1.0 - y - g;
    let den = 1.0 - y + 0.5 * y * y + g;
    (num / den).clamp(0.0, 1.0)
}

// ── Two-body exclusive production ────────────────────────────────────────────

/// CM-frame energies and momenta of `γ* + target → recoil + produced`
/// at fixed W² and Q².
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoBodyCm {
    pub w:  f64,
    /// target
    pub et: f64,
    pub pt: f64,
    pub mt: f64,
    /// recoil
    pub er: f64,
    pub pr: f64,
    pub mr: f64,
    /// produced
    pub ev: f64,
    pub mv: f64,
}

impl TwoBodyCm {
    /// Returns None when the channel is kinematically closed
    /// (W below the final-state threshold or an unphysical target leg).
    pub fn new(w2: f64, q2: f64, mt: f64, mr: f64, mv: f64) -> Option<Self> {
        let threshold = mr + mv;
        if w2 <= threshold * threshold || w2 <= 0.0 {
            return None;
        }
        let w = w2.sqrt();
        let et = (w2 + q2 + mt * mt) / (2.0 * w);
        let er = (w2 - mv * mv + mr * mr) / (2.0 * w);
        let ev = (w2 + mv * mv - mr * mr) / (2.0 * w);
        let pt2 = et * et - mt * mt;
        let pr2 = er * er - mr * mr;
        if pt2 < 0.0 || pr2 < 0.0 {
            return None;
        }
        Some(Self { w, et, pt: pt2.sqrt(), mt, er, pr: pr2.sqrt(), mr, ev, mv })
    }

    /// Allowed momentum-transfer window `(t_low, t_high)`, t_low ≤ t_high.
    pub fn t_range(&self) -> (f64, f64) {
        let base = self.mt * self.mt + self.mr * self.mr - 2.0 * self.et * self.er;
        let spread = 2.0 * self.pt * self.pr;
        (base - spread, base + spread)
    }

    /// CM scattering angle between target and recoil for a given t.
    pub fn cos_theta(&self, t: f64) -> f64 {
        (t + 2.0 * self.et * self.er - self.mt * self.mt - self.mr * self.mr)
            / (2.0 * self.pt * self.pr)
    }

    /// Recoil and produced 4-vectors in the CM frame with the photon
    /// along +z (target along -z).
    pub fn final_state(&self, t: f64, phi: f64) -> (FourVector, FourVector) {
        let cth = self.cos_theta(t).clamp(-1.0, 1.0);
        let theta = cth.acos();
        // recoil is measured from the target direction (-z)
        let dir = Vector3::from_spherical(self.pr, std::f64::consts::PI - theta, phi);
        let recoil = FourVector::from_p3(self.er, dir);
        let produced = FourVector::from_p3(self.ev, -dir);
        (recoil, produced)
    }
}

/// The chain lab → target rest frame → photon along z → γ*-target CM,
/// together with its inverse.
#[derive(Debug, Clone, Copy)]
pub struct ProductionFrame {
    target_beta: Vector3,
    rotation:    Rotation3,
    cm_beta:     Vector3,
}

impl ProductionFrame {
    pub fn new(photon: &FourVector, target: &FourVector) -> Self {
        let target_beta = target.boost_vector();
        let photon_rest = photon.boost(&-target_beta);
        let rotation = Rotation3::aligning_with_z(&photon_rest.p3());
        let target_rest = target.boost(&-target_beta).rotate(&rotation);
        let total = photon_rest.rotate(&rotation) + target_rest;
        Self { target_beta, rotation, cm_beta: total.boost_vector() }
    }

    pub fn to_cm(&self, v: &FourVector) -> FourVector {
        v.boost(&-self.target_beta).rotate(&self.rotation).boost(&-self.cm_beta)
    }

    pub fn to_lab(&self, v: &FourVector) -> FourVector {
        v.boost(&self.cm_beta).rotate(&self.rotation.inverse()).boost(&self.target_beta)
    }
}

/// Build the lab-frame recoil and produced particles for a sampled t.
///
/// Returns None if the channel is closed or `t` lies outside the
/// allowed window.
pub fn two_body_production(
    photon: &FourVector,
    target: &FourVector,
    mr: f64,
    mv: f64,
    t: f64,
    phi: f64,
) -> Option<(FourVector, FourVector)> {
    let q2 = -photon.m2();
    let w2 = (*photon + *target).m2();
    let cm = TwoBodyCm::new(w2, q2, target.m(), mr, mv)?;
    let (t_low, t_high) = cm.t_range();
    if t < t_low || t > t_high {
        return None;
    }
    let frame = ProductionFrame::new(photon, target);
    let (recoil, produced) = cm.final_state(t, phi);
    Some((frame.to_lab(&recoil), frame.to_lab(&produced)))
}

// ── Exponential-t reparametrization ──────────────────────────────────────────

/// Window in `y = exp(b·t)` matching the t-window `[t_low, t_high]`.
/// Requires b > 0.
pub fn exp_bt_range(t_low: f64, t_high: f64, b: f64) -> (f64, f64) {
    ((b * t_low).exp(), (b * t_high).exp())
}

/// Invert `y = exp(b·t)`, clamped onto the t-window so round-off in
/// exp/ln can never leave it.
pub fn t_from_exp_bt(y: f64, b: f64, t_low: f64, t_high: f64) -> f64 {
    (y.ln() / b).clamp(t_low, t_high)
}

// ── Two-body decay ───────────────────────────────────────────────────────────

/// Momentum of either daughter in the rest frame of a parent of mass `m`.
/// None below threshold.
pub fn decay_momentum(m: f64, m1: f64, m2: f64) -> Option<f64> {
    if m < m1 + m2 {
        return None;
    }
    let s = m * m;
    let lambda = (s - (m1 + m2).powi(2)) * (s - (m1 - m2).powi(2));
    Some(lambda.max(0.0).sqrt() / (2.0 * m))
}

/// Decay `parent` into daughters of mass `m1`, `m2`. The angles are those
/// of daughter 1 in the parent rest frame, measured from the parent's
/// direction of flight (helicity frame).
pub fn two_body_decay(
    parent: &FourVector,
    m1: f64,
    m2: f64,
    cos_theta: f64,
    phi: f64,
) -> Option<(FourVector, FourVector)> {
    let m = parent.m();
    let p = decay_momentum(m, m1, m2)?;
    let theta = cos_theta.clamp(-1.0, 1.0).acos();
    let dir = Vector3::from_spherical(p, theta, phi);
    let rotation = Rotation3::aligning_with_z(&parent.p3()).inverse();
    let beta = parent.boost_vector();
    let d1 = FourVector::on_shell(m1, dir).rotate(&rotation).boost(&beta);
    let d2 = FourVector::on_shell(m2, -dir).rotate(&rotation).boost(&beta);
    Some((d1, d2))
}
