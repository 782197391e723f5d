use std::ops;

use crate::constants::{INVALID, MAX_RAP, TWO_PI};

/// A four-momentum as seen by the clustering engine.
///
/// Rapidity, azimuth and kt^2 are computed once at construction and cached;
/// the arithmetic operators rebuild them because the momentum changes.
/// `cluster_hist_index` ties the jet to its entry in the cluster history and
/// stays [`INVALID`] until the jet is seeded into a sequence.
#[derive(Debug, Clone, Copy)]
pub struct PseudoJet {
    px: f64,
    py: f64,
    pz: f64,
    e: f64,
    kt2: f64,
    rap: f64,
    phi: f64,
    cluster_hist_index: usize,
}

impl PseudoJet {
    pub fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        let kt2 = px * px + py * py;
        let (rap, phi) = rap_phi(px, py, pz, e, kt2);
        PseudoJet {
            px,
            py,
            pz,
            e,
            kt2,
            rap,
            phi,
            cluster_hist_index: INVALID,
        }
    }

    #[inline]
    pub fn px(&self) -> f64 {
        self.px
    }

    #[inline]
    pub fn py(&self) -> f64 {
        self.py
    }

    #[inline]
    pub fn pz(&self) -> f64 {
        self.pz
    }

    #[inline]
    pub fn e(&self) -> f64 {
        self.e
    }

    /// Rapidity, cached. Particles with E == |pz| sit at +-(1e5 + |pz|).
    #[inline]
    pub fn rap(&self) -> f64 {
        self.rap
    }

    /// Azimuth in [0, 2pi).
    #[inline]
    pub fn phi(&self) -> f64 {
        self.phi
    }

    #[inline]
    pub fn kt2(&self) -> f64 {
        self.kt2
    }

    #[inline]
    pub fn pt2(&self) -> f64 {
        self.kt2
    }

    #[inline]
    pub fn pt(&self) -> f64 {
        self.kt2.sqrt()
    }

    #[inline]
    pub fn perp2(&self) -> f64 {
        self.kt2
    }

    #[inline]
    pub fn perp(&self) -> f64 {
        self.kt2.sqrt()
    }

    /// Squared invariant mass; may come out slightly negative for rounded
    /// input.
    #[inline]
    pub fn m2(&self) -> f64 {
        (self.e + self.pz) * (self.e - self.pz) - self.kt2
    }

    #[inline]
    pub fn m(&self) -> f64 {
        let m2 = self.m2();
        if m2 < 0.0 {
            -(-m2).sqrt()
        } else {
            m2.sqrt()
        }
    }

    /// Squared transverse mass, kt^2 + m^2.
    #[inline]
    pub fn mperp2(&self) -> f64 {
        (self.e + self.pz) * (self.e - self.pz)
    }

    #[inline]
    pub fn mperp(&self) -> f64 {
        self.mperp2().abs().sqrt()
    }

    /// Squared 3-momentum modulus.
    #[inline]
    pub fn modp2(&self) -> f64 {
        self.kt2 + self.pz * self.pz
    }

    #[inline]
    pub fn modp(&self) -> f64 {
        self.modp2().sqrt()
    }

    /// Transverse energy; zero for a jet along the beam.
    #[inline]
    pub fn et(&self) -> f64 {
        if self.kt2 == 0.0 {
            0.0
        } else {
            self.e / (1.0 + self.pz * self.pz / self.kt2).sqrt()
        }
    }

    #[inline]
    pub fn et2(&self) -> f64 {
        if self.kt2 == 0.0 {
            0.0
        } else {
            self.e * self.e / (1.0 + self.pz * self.pz / self.kt2)
        }
    }

    #[inline]
    pub fn cos_theta(&self) -> f64 {
        (self.pz / self.modp()).clamp(-1.0, 1.0)
    }

    #[inline]
    pub fn theta(&self) -> f64 {
        self.cos_theta().acos()
    }

    /// Direction cosines (px, py, pz)/|p|. A zero-momentum jet points along
    /// the positive beam axis so the angular metric stays finite.
    #[inline]
    pub fn direction(&self) -> (f64, f64, f64) {
        let modp = self.modp();
        if modp > 0.0 {
            (self.px / modp, self.py / modp, self.pz / modp)
        } else {
            (0.0, 0.0, 1.0)
        }
    }

    pub fn set_cluster_hist_index(&mut self, index: usize) {
        self.cluster_hist_index = index;
    }

    pub fn cluster_hist_index(&self) -> usize {
        self.cluster_hist_index
    }

    /// Sorts jets by decreasing transverse momentum, in place.
    pub fn sorted_by_pt(jets: &mut Vec<PseudoJet>) -> &mut Vec<PseudoJet> {
        jets.sort_by(|a, b| (-a.kt2()).total_cmp(&(-b.kt2())));
        jets
    }
}

// Rapidity and azimuth for a raw four-momentum: phi wrapped onto [0, 2pi),
// rapidity pinned to a large finite value for momenta exactly along the beam.
fn rap_phi(px: f64, py: f64, pz: f64, e: f64, kt2: f64) -> (f64, f64) {
    let mut phi = if kt2 == 0.0 { 0.0 } else { py.atan2(px) };
    if phi < 0.0 {
        phi += TWO_PI;
    }
    if phi >= TWO_PI {
        phi -= TWO_PI;
    }

    let rap = if e == pz.abs() && kt2 == 0.0 {
        let edge = MAX_RAP + pz.abs();
        if pz >= 0.0 {
            edge
        } else {
            -edge
        }
    } else {
        let m2_eff = ((e + pz) * (e - pz) - kt2).max(0.0);
        let e_plus_pz = e + pz.abs();
        let r = 0.5 * ((kt2 + m2_eff) / (e_plus_pz * e_plus_pz)).ln();
        if pz > 0.0 {
            -r
        } else {
            r
        }
    };

    (rap, phi)
}

impl From<[f64; 4]> for PseudoJet {
    fn from(p: [f64; 4]) -> Self {
        PseudoJet::new(p[0], p[1], p[2], p[3])
    }
}

impl From<(f64, f64, f64, f64)> for PseudoJet {
    fn from(p: (f64, f64, f64, f64)) -> Self {
        PseudoJet::new(p.0, p.1, p.2, p.3)
    }
}

impl ops::Index<usize> for PseudoJet {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        match index {
            0 => &self.px,
            1 => &self.py,
            2 => &self.pz,
            3 => &self.e,
            _ => panic!("Index out of bounds"),
        }
    }
}

impl ops::Add<&PseudoJet> for &PseudoJet {
    type Output = PseudoJet;

    fn add(self, other: &PseudoJet) -> PseudoJet {
        PseudoJet::new(
            self.px + other.px,
            self.py + other.py,
            self.pz + other.pz,
            self.e + other.e,
        )
    }
}

impl ops::Add<PseudoJet> for PseudoJet {
    type Output = PseudoJet;

    fn add(self, other: PseudoJet) -> PseudoJet {
        &self + &other
    }
}

impl ops::AddAssign<PseudoJet> for PseudoJet {
    fn add_assign(&mut self, other: PseudoJet) {
        let index = self.cluster_hist_index;
        *self = &*self + &other;
        self.cluster_hist_index = index;
    }
}

impl ops::Sub<PseudoJet> for PseudoJet {
    type Output = PseudoJet;

    fn sub(self, other: PseudoJet) -> PseudoJet {
        PseudoJet::new(
            self.px - other.px,
            self.py - other.py,
            self.pz - other.pz,
            self.e - other.e,
        )
    }
}

impl ops::SubAssign<PseudoJet> for PseudoJet {
    fn sub_assign(&mut self, other: PseudoJet) {
        let index = self.cluster_hist_index;
        *self = *self - other;
        self.cluster_hist_index = index;
    }
}

impl ops::Mul<f64> for PseudoJet {
    type Output = PseudoJet;

    fn mul(self, scalar: f64) -> PseudoJet {
        PseudoJet::new(
            self.px * scalar,
            self.py * scalar,
            self.pz * scalar,
            self.e * scalar,
        )
    }
}

impl ops::Mul<PseudoJet> for f64 {
    type Output = PseudoJet;

    fn mul(self, jet: PseudoJet) -> PseudoJet {
        jet * self
    }
}

impl ops::MulAssign<f64> for PseudoJet {
    fn mul_assign(&mut self, scalar: f64) {
        let index = self.cluster_hist_index;
        *self = *self * scalar;
        self.cluster_hist_index = index;
    }
}

impl ops::Div<f64> for PseudoJet {
    type Output = PseudoJet;

    fn div(self, scalar: f64) -> PseudoJet {
        self * (1.0 / scalar)
    }
}

impl ops::DivAssign<f64> for PseudoJet {
    fn div_assign(&mut self, scalar: f64) {
        *self *= 1.0 / scalar;
    }
}

impl PartialEq for PseudoJet {
    fn eq(&self, other: &PseudoJet) -> bool {
        self.px == other.px && self.py == other.py && self.pz == other.pz && self.e == other.e
    }
}
