use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use units::todo::{Anglef64, Energyf64, Massf64, Momentumf64, Ratiof64};

/// Lorentz vector `(px, py, pz, E)` in GeV, metric `(+, -, -, -)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FourMomentum {
    pub px: Momentumf64,
    pub py: Momentumf64,
    pub pz: Momentumf64,
    pub e : Energyf64,
}

impl FourMomentum {

    pub fn new(px: Momentumf64, py: Momentumf64, pz: Momentumf64, e: Energyf64) -> Self {
        Self { px, py, pz, e }
    }

    pub fn zero() -> Self { Self::default() }

    /// Build from transverse momentum, pseudorapidity, azimuth and mass.
    pub fn from_pt_eta_phi_m(pt: Momentumf64, eta: Ratiof64, phi: Anglef64, m: Massf64) -> Self {
        let (px, py, pz) = (pt * phi.cos(), pt * phi.sin(), pt * eta.sinh());
        let p = pt * eta.cosh();
        Self { px, py, pz, e: (p * p + m * m).sqrt() }
    }

    /// Build from transverse momentum, pseudorapidity, azimuth and energy.
    pub fn from_pt_eta_phi_e(pt: Momentumf64, eta: Ratiof64, phi: Anglef64, e: Energyf64) -> Self {
        Self { px: pt * phi.cos(), py: pt * phi.sin(), pz: pt * eta.sinh(), e }
    }

    /// Build from transverse momentum, polar angle, azimuth and mass.
    pub fn from_pt_theta_phi_m(pt: Momentumf64, theta: Anglef64, phi: Anglef64, m: Massf64) -> Self {
        let (px, py, pz) = (pt * phi.cos(), pt * phi.sin(), pt / theta.tan());
        let p = pt / theta.sin();
        Self { px, py, pz, e: (p * p + m * m).sqrt() }
    }

    pub fn vect(&self) -> Vector3<f64> { Vector3::new(self.px, self.py, self.pz) }

    pub fn pt2(&self) -> f64 { self.px * self.px + self.py * self.py }
    pub fn pt (&self) -> Momentumf64 { self.pt2().sqrt() }
    pub fn p2 (&self) -> f64 { self.pt2() + self.pz * self.pz }
    pub fn p  (&self) -> Momentumf64 { self.p2().sqrt() }

    pub fn phi  (&self) -> Anglef64 { self.py.atan2(self.px) }
    pub fn theta(&self) -> Anglef64 { self.pt().atan2(self.pz) }

    /// Pseudorapidity. Infinite (with the sign of `pz`) along the beam axis.
    pub fn eta(&self) -> Ratiof64 {
        let pt = self.pt();
        if pt > 0.0 { (self.pz / pt).asinh() }
        else if self.pz == 0.0 { 0.0 }
        else { self.pz.signum() * f64::INFINITY }
    }

    pub fn rapidity(&self) -> Ratiof64 {
        0.5 * ((self.e + self.pz) / (self.e - self.pz)).ln()
    }

    /// Squared invariant mass; may be slightly negative through rounding.
    pub fn m2(&self) -> f64 { self.e * self.e - self.p2() }

    /// Invariant mass, negative when `m2` is negative.
    pub fn m(&self) -> Massf64 {
        let m2 = self.m2();
        if m2 < 0.0 { -(-m2).sqrt() } else { m2.sqrt() }
    }

    /// Transverse mass `sqrt(E^2 - pz^2)`.
    pub fn mt(&self) -> Massf64 {
        let mt2 = self.e * self.e - self.pz * self.pz;
        if mt2 < 0.0 { -(-mt2).sqrt() } else { mt2.sqrt() }
    }

    /// Transverse energy `E pt / p`.
    pub fn et(&self) -> Energyf64 {
        let p = self.p();
        if p > 0.0 { self.e * self.pt() / p } else { 0.0 }
    }

    pub fn delta_phi(&self, other: &Self) -> Anglef64 { crate::delta_phi(self.phi(), other.phi()) }

    pub fn delta_r(&self, other: &Self) -> f64 {
        let deta = self.eta() - other.eta();
        let dphi = self.delta_phi(other);
        (deta * deta + dphi * dphi).sqrt()
    }

    /// Velocity of the rest frame of this momentum.
    pub fn boost_vector(&self) -> Vector3<f64> { self.vect() / self.e }

    /// Lorentz boost by velocity `beta` (|beta| < 1).
    pub fn boost(&self, beta: &Vector3<f64>) -> Self {
        let b2 = beta.norm_squared();
        if b2 == 0.0 { return *self }
        let gamma = 1.0 / (1.0 - b2).sqrt();
        let p = self.vect();
        let bp = beta.dot(&p);
        let gamma2 = (gamma - 1.0) / b2;
        let boosted = p + beta * (gamma2 * bp + gamma * self.e);
        Self {
            px: boosted.x,
            py: boosted.y,
            pz: boosted.z,
            e : gamma * (self.e + bp),
        }
    }
}

impl Add for FourMomentum {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            px: self.px + rhs.px,
            py: self.py + rhs.py,
            pz: self.pz + rhs.pz,
            e : self.e  + rhs.e,
        }
    }
}

impl Add for &FourMomentum {
    type Output = FourMomentum;
    fn add(self, rhs: Self) -> Self::Output { *self + *rhs }
}

impl AddAssign for FourMomentum {
    fn add_assign(&mut self, rhs: Self) { *self = *self + rhs }
}

impl Sub for FourMomentum {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output { self + (-rhs) }
}

impl Neg for FourMomentum {
    type Output = Self;
    fn neg(self) -> Self::Output { Self { px: -self.px, py: -self.py, pz: -self.pz, e: -self.e } }
}

impl Mul<f64> for FourMomentum {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self { px: self.px * rhs, py: self.py * rhs, pz: self.pz * rhs, e: self.e * rhs }
    }
}

impl Sum for FourMomentum {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self { iter.fold(Self::zero(), Add::add) }
}

impl<'a> Sum<&'a FourMomentum> for FourMomentum {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self { iter.copied().sum() }
}
