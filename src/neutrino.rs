//! Starting values for the neutrino's unmeasured pseudorapidity.
//!
//! The transverse momentum of the neutrino is taken from the missing transverse
//! momentum, its longitudinal component is unknown. The constrained fit treats
//! the polar angle as a free parameter, but it must start from a reasonable
//! value.

use serde::{Deserialize, Serialize};

use crate::event::MissingEt;
use crate::{FourMomentum, Massf64};

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NeutrinoSeeding {
    /// `eta = 0`, `E = |MET|`
    #[default]
    Simple,
    /// Pseudorapidity solving the W and top mass conditions, where possible
    Refined,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Seed {
    pub eta: f64,
    pub energy: f64,
}

impl Seed {
    /// Massless neutrino with the seeded pseudorapidity and the measured transverse momentum
    pub fn momentum(&self, met: &MissingEt) -> FourMomentum {
        FourMomentum::from_pt_eta_phi_e(met.mag(), self.eta, met.phi(), self.energy)
    }
}

pub fn simple_seed(met: &MissingEt) -> Seed { Seed { eta: 0.0, energy: met.mag() } }

/// Neutrino pseudorapidities at which `system + neutrino` has a given mass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EtaSolutions {
    /// Pseudorapidity minimizing the invariant mass
    pub minimum: f64,
    /// The two pseudorapidities giving exactly the target mass, if reachable
    pub roots: Option<(f64, f64)>,
}

/// With the neutrino's transverse momentum fixed, the invariant mass of
/// `system + neutrino` depends on the neutrino pseudorapidity `eta` through
///
/// ```text
/// M^2 = m^2 + 2 pt_nu (mt cosh(eta - eta0) - pt cos(dphi))
/// ```
///
/// where `mt^2 = E^2 - pz^2` and `tanh(eta0) = pz / E` of the system.
pub fn eta_solutions(system: &FourMomentum, met: &MissingEt, target: Massf64) -> Option<EtaSolutions> {
    let pt_nu = met.mag();
    let mt = system.mt();
    if !(pt_nu > 0.0 && mt > 0.0) { return None }

    let minimum = (system.pz / system.e).atanh();
    let cos_dphi = kinematics::delta_phi(system.phi(), met.phi()).cos();
    let a = (target * target - system.m2()) / (2.0 * pt_nu) + system.pt() * cos_dphi;
    let ratio = a / mt;
    let roots = (ratio >= 1.0).then(|| {
        let d = ratio.acosh();
        (minimum - d, minimum + d)
    });
    minimum.is_finite().then_some(EtaSolutions { minimum, roots })
}

/// Root closest to `eta`
fn closest((a, b): (f64, f64), eta: f64) -> f64 {
    if (a - eta).abs() <= (b - eta).abs() { a } else { b }
}

/// Combine the pseudorapidities satisfying the leptonic W and top mass
/// conditions into a single guess.
fn combine(w: Option<EtaSolutions>, top: Option<EtaSolutions>) -> Option<f64> {
    let (w, top) = (w?, top?);
    match (w.roots, top.roots) {
        (Some(wr), Some(tr)) => {
            let pairs = [(wr.0, tr.0), (wr.0, tr.1), (wr.1, tr.0), (wr.1, tr.1)];
            pairs.into_iter()
                .min_by(|x, y| (x.0 - x.1).abs().total_cmp(&(y.0 - y.1).abs()))
                .map(|(a, b)| 0.5 * (a + b))
        }
        (Some(wr), None) => Some(0.5 * (closest(wr, top.minimum) + top.minimum)),
        (None, Some(tr)) => Some(0.5 * (closest(tr, w.minimum) + w.minimum)),
        (None, None) => None,
    }
}

/// Starting `(eta, E)` of the neutrino for one leptonic-top combination.
pub fn seed(
    mode: NeutrinoSeeding,
    met: &MissingEt,
    lepton: &FourMomentum,
    b_jet: &FourMomentum,
    w_mass: Massf64,
    top_mass: Massf64,
) -> Seed {
    match mode {
        NeutrinoSeeding::Simple  => simple_seed(met),
        NeutrinoSeeding::Refined => {
            let w   = eta_solutions(lepton, met, w_mass);
            let top = eta_solutions(&(lepton + b_jet), met, top_mass);
            match combine(w, top) {
                Some(eta) => Seed { eta, energy: met.mag() * eta.cosh() },
                None      => {
                    log::debug!("No neutrino pseudorapidity solves the mass conditions: using simple seed");
                    simple_seed(met)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Covariance;
    use float_eq::assert_float_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    const W: f64 = 80.385;
    const TOP: f64 = 173.5;

    fn met_of(nu: &FourMomentum) -> MissingEt {
        MissingEt { x: nu.px, y: nu.py, covariance: Covariance::default() }
    }

    #[test]
    fn simple_seed_is_central() {
        let met = MissingEt::from_mag_phi(35.0, 2.0, Covariance::default());
        let seed = seed(NeutrinoSeeding::Simple, &met, &FourMomentum::zero(), &FourMomentum::zero(), W, TOP);
        assert_eq!(seed, Seed { eta: 0.0, energy: 35.0 });
        let nu = seed.momentum(&met);
        assert_float_eq!(nu.pt(), 35.0, abs <= 1e-12);
        assert_float_eq!(nu.m() ,  0.0, abs <= 1e-6);
    }

    #[rstest(/**/ eta_nu, eta_l, dphi,
             case( 0.4,  -0.3, 2.5),
             case(-1.7,   0.9, 1.8),
             case( 2.2,   2.0, 3.0),
    )]
    fn true_eta_is_a_root(eta_nu: f64, eta_l: f64, dphi: f64) {
        let lepton = FourMomentum::from_pt_eta_phi_m(35.0, eta_l, 0.3, 0.0);
        // Choose the neutrino pt which puts the pair at the W mass
        let pt_nu = W * W / (2.0 * 35.0 * ((eta_nu - eta_l).cosh() - dphi.cos()));
        let nu = FourMomentum::from_pt_eta_phi_m(pt_nu, eta_nu, 0.3 + dphi, 0.0);
        assert_float_eq!((lepton + nu).m(), W, abs <= 1e-9);

        let solutions = eta_solutions(&lepton, &met_of(&nu), W).unwrap();
        let (a, b) = solutions.roots.unwrap();
        let nearest = closest((a, b), eta_nu);
        assert_float_eq!(nearest, eta_nu, abs <= 1e-9);
        assert_float_eq!(solutions.minimum, eta_l, abs <= 1e-12);
    }

    #[test]
    fn unreachable_mass_falls_back_to_simple_seed() {
        // Lepton and neutrino back to back with large momenta: even the minimum
        // mass is far above both targets
        let lepton = FourMomentum::from_pt_eta_phi_m(200.0, 0.0, 0.0, 0.0);
        let met = MissingEt::from_mag_phi(200.0, std::f64::consts::PI, Covariance::default());
        let b = FourMomentum::from_pt_eta_phi_m(150.0, 0.0, std::f64::consts::PI, 4.5);
        assert_eq!(eta_solutions(&lepton, &met, W).unwrap().roots, None);
        let seed = seed(NeutrinoSeeding::Refined, &met, &lepton, &b, W, TOP);
        assert_eq!(seed, simple_seed(&met));
    }

    #[test]
    fn no_missing_momentum_has_no_solutions() {
        let lepton = FourMomentum::from_pt_eta_phi_m(40.0, 0.0, 0.0, 0.0);
        assert_eq!(eta_solutions(&lepton, &MissingEt::default(), W), None);
    }

    #[test]
    fn combine_prefers_closest_pair() {
        let w   = EtaSolutions { minimum: 0.0, roots: Some((-1.0, 1.0)) };
        let top = EtaSolutions { minimum: 0.5, roots: Some(( 0.2, 2.5)) };
        assert_float_eq!(combine(Some(w), Some(top)).unwrap(), 0.6, abs <= 1e-12);

        let top = EtaSolutions { minimum: 0.8, roots: None };
        assert_float_eq!(combine(Some(w), Some(top)).unwrap(), 0.9, abs <= 1e-12);
        assert_eq!(combine(Some(EtaSolutions { roots: None, ..w }), Some(top)), None);
    }

    proptest! {
        #[test]
        fn refined_seed_keeps_measured_transverse_momentum(
            pt_l  in  25.0 .. 150.0,
            eta_l in  -2.5 ..   2.5,
            met   in  25.0 .. 150.0,
            phi   in  -3.1 ..   3.1,
            eta_b in  -2.5 ..   2.5,
        ) {
            let lepton = FourMomentum::from_pt_eta_phi_m(pt_l, eta_l, 0.0, 0.0);
            let b = FourMomentum::from_pt_eta_phi_m(60.0, eta_b, 2.0, 4.5);
            let met = MissingEt::from_mag_phi(met, phi, Covariance::default());
            let seed = seed(NeutrinoSeeding::Refined, &met, &lepton, &b, W, TOP);
            let nu = seed.momentum(&met);
            prop_assert!(seed.eta.is_finite());
            assert_float_eq!(nu.pt(), met.mag(), r2nd <= 1e-12);
            assert_float_eq!(nu.m(), 0.0, abs <= 1e-6 * nu.e);
        }
    }
}
