use nalgebra::Vector3;

use crate::FourMomentum;
use units::todo::{Anglef64, Massf64, Momentumf64};

/// Momentum of either daughter in the rest frame of a parent of mass `m`
/// decaying into daughters of masses `m1` and `m2`. `None` below threshold.
pub fn two_body_momentum(m: Massf64, m1: Massf64, m2: Massf64) -> Option<Momentumf64> {
    if m <= 0.0 || m < m1 + m2 { return None }
    let a = m * m - (m1 + m2) * (m1 + m2);
    let b = m * m - (m1 - m2) * (m1 - m2);
    Some((a * b).sqrt() / (2.0 * m))
}

/// Decay `parent` into two daughters of masses `m1` and `m2`. The direction of
/// the first daughter in the parent rest frame is given by `(cos_theta, phi)`.
/// Both daughters are returned in the frame in which `parent` was given.
pub fn two_body_decay(
    parent: &FourMomentum,
    m1: Massf64,
    m2: Massf64,
    cos_theta: f64,
    phi: Anglef64,
) -> Option<(FourMomentum, FourMomentum)> {
    let m = parent.m();
    let q = two_body_momentum(m, m1, m2)?;
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let dir = Vector3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);
    let p1 = dir * q;
    let d1 = FourMomentum::new( p1.x,  p1.y,  p1.z, (q * q + m1 * m1).sqrt());
    let d2 = FourMomentum::new(-p1.x, -p1.y, -p1.z, (q * q + m2 * m2).sqrt());
    let beta = parent.boost_vector();
    Some((d1.boost(&beta), d2.boost(&beta)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use proptest::prelude::*;

    #[test]
    fn below_threshold() {
        assert_eq!(two_body_momentum(80.0, 50.0, 40.0), None);
    }

    #[test]
    fn massless_daughters_share_energy() {
        assert_float_eq!(two_body_momentum(80.0, 0.0, 0.0).unwrap(), 40.0, abs <= 1e-12);
    }

    proptest! {
        #[test]
        fn daughters_conserve_four_momentum(
            pt        in   0.0 .. 300.0,
            eta       in  -2.0 ..   2.0,
            phi       in  -3.0 ..   3.0,
            cos_theta in  -1.0 ..   1.0,
            dphi      in  -3.0 ..   3.0,
        ) {
            let top = FourMomentum::from_pt_eta_phi_m(pt, eta, phi, 173.5);
            let (w, b) = two_body_decay(&top, 80.4, 4.8, cos_theta, dphi).unwrap();
            let sum = w + b;
            let tol = 1e-9 * top.e;
            assert_float_eq!((sum.px, sum.py, sum.pz, sum.e), (top.px, top.py, top.pz, top.e),
                             abs <= (tol, tol, tol, tol));
            assert_float_eq!(w.m(), 80.4, abs <= 1e-6 * top.e);
            assert_float_eq!(b.m(),  4.8, abs <= 1e-5 * top.e);
        }
    }
}
