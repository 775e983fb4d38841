//! Toy Monte-Carlo generator of Wt events.
//!
//! A top quark and a W boson are produced back to back from a system of random
//! mass and rapidity. The top decays to `W b`; one of the two W bosons decays
//! leptonically, the other to two light quarks. All decays are isotropic in
//! the parent rest frame. Quarks become jets and every visible object is
//! smeared with Gaussian resolutions; the missing transverse momentum is the
//! smeared neutrino transverse momentum.

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Cauchy, Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::event::{Covariance, Event, Flavour, Jet, Lepton, MissingEt, TagWeight, Tagger};
pub use crate::event::Truth;
use crate::search::Hypothesis;
use crate::{Error, FourMomentum, Massf64, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToyConfig {
    pub seed: u64,
    pub run_number: u32,
    /// Probability that the top rather than the associated W decays leptonically
    pub leptonic_fraction: f64,
    /// Sample W and top masses from Breit-Wigner distributions, rather than using the pole masses
    pub breit_wigner_masses: bool,
    pub w_mass: Massf64,
    pub w_width: Massf64,
    pub top_mass: Massf64,
    pub top_width: Massf64,
    pub b_quark_mass: Massf64,
    /// Range of the invariant mass of the top + W system above threshold
    pub excess_mass_max: Massf64,
    /// Rapidity of the top + W system is uniform in `[-y, y]`
    pub rapidity_max: f64,
    /// Relative jet pt resolution
    pub jet_pt_resolution: f64,
    pub jet_angle_resolution: f64,
    pub lepton_pt_resolution: f64,
    pub lepton_angle_resolution: f64,
    /// Absolute resolution of the missing ET magnitude, in GeV
    pub met_resolution: f64,
    pub met_phi_resolution: f64,
}

impl Default for ToyConfig {
    fn default() -> Self {
        Self {
            seed: 1,
            run_number: 1,
            leptonic_fraction: 0.5,
            breit_wigner_masses: true,
            w_mass: 80.385,
            w_width: 2.085,
            top_mass: 173.5,
            top_width: 2.0,
            b_quark_mass: 4.5,
            excess_mass_max: 250.0,
            rapidity_max: 1.0,
            jet_pt_resolution: 0.1,
            jet_angle_resolution: 0.02,
            lepton_pt_resolution: 0.02,
            lepton_angle_resolution: 0.001,
            met_resolution: 10.0,
            met_phi_resolution: 0.1,
        }
    }
}

/// Breit-Wigner truncated at five widths from the pole
struct MassSampler {
    pole: Massf64,
    width: Massf64,
    shape: Option<Cauchy<f64>>,
}

impl MassSampler {
    fn new(pole: Massf64, width: Massf64, breit_wigner: bool) -> Result<Self> {
        let shape = if breit_wigner {
            Some(Cauchy::new(pole, width / 2.0)
                 .map_err(|e| Error::InvalidConfig(format!("Breit-Wigner ({pole}, {width}): {e}")))?)
        } else { None };
        Ok(Self { pole, width, shape })
    }

    fn sample(&self, rng: &mut StdRng) -> Massf64 {
        let Some(shape) = &self.shape else { return self.pole };
        loop {
            let m = shape.sample(rng);
            if (m - self.pole).abs() < 5.0 * self.width { return m }
        }
    }
}

pub struct ToyGenerator {
    config: ToyConfig,
    rng: StdRng,
    top: MassSampler,
    w: MassSampler,
    gauss: Normal<f64>,
    next_event_number: u64,
}

impl ToyGenerator {

    pub fn new(config: ToyConfig) -> Result<Self> {
        let c = &config;
        if !(0.0..=1.0).contains(&c.leptonic_fraction) {
            return Err(Error::InvalidConfig(format!("leptonic fraction {} is not a probability", c.leptonic_fraction)))
        }
        if c.top_mass - 5.0 * c.top_width <= c.w_mass + 5.0 * c.w_width + c.b_quark_mass {
            return Err(Error::InvalidConfig("top quark too light to decay to W b".into()))
        }
        let top = MassSampler::new(c.top_mass, c.top_width, c.breit_wigner_masses)?;
        let w   = MassSampler::new(c.w_mass  , c.w_width  , c.breit_wigner_masses)?;
        let gauss = Normal::new(0.0, 1.0).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        let rng = StdRng::seed_from_u64(c.seed);
        Ok(Self { config, rng, top, w, gauss, next_event_number: 0 })
    }

    pub fn config(&self) -> &ToyConfig { &self.config }

    /// `n` events, each carrying its generator truth
    pub fn events(&mut self, n: usize) -> Vec<Event> {
        (0..n).map(|_| self.next_event().0).collect()
    }

    pub fn next_event(&mut self) -> (Event, Truth) {
        let c = self.config.clone();
        let event_number = self.next_event_number;
        self.next_event_number += 1;

        let leptonic_top = self.rng.gen_bool(c.leptonic_fraction);
        let flavour = if self.rng.gen_bool(0.5) { Flavour::Electron } else { Flavour::Muon };
        let charge: i8 = if self.rng.gen_bool(0.5) { 1 } else { -1 };

        let (top_mass, top_w_mass, associated_w_mass) = (
            self.top.sample(&mut self.rng),
            self.w  .sample(&mut self.rng),
            self.w  .sample(&mut self.rng),
        );

        // Production
        let threshold = top_mass + associated_w_mass;
        let mass = threshold + self.rng.gen_range(1.0..c.excess_mass_max.max(2.0));
        let rapidity = self.rng.gen_range(-c.rapidity_max..=c.rapidity_max);
        let system = FourMomentum::new(0.0, 0.0, mass * rapidity.sinh(), mass * rapidity.cosh());
        let (top, associated_w) = self.decay(&system, top_mass, associated_w_mass);

        // Decays
        let (top_w, b) = self.decay(&top, top_w_mass, c.b_quark_mass);
        let (leptonic_w, hadronic_w) = if leptonic_top { (top_w, associated_w) } else { (associated_w, top_w) };
        let (lepton, neutrino) = self.decay(&leptonic_w, flavour.mass(), 0.0);
        let (q1, q2) = self.decay(&hadronic_w, 0.0, 0.0);

        // Detector
        let b_weight = self.rng.gen_range(0.95..1.0);
        let mut jets = vec![self.jet(&b, c.b_quark_mass, b_weight)];
        for q in [q1, q2] {
            let weight = self.rng.gen_range(0.0..0.5);
            jets.push(self.jet(&q, 0.0, weight));
        }
        let lepton = self.lepton(&lepton, flavour, charge);
        let missing_et = self.missing_et(&neutrino);

        let hypothesis = if leptonic_top { Hypothesis::LeptonicTop } else { Hypothesis::HadronicTop };
        let truth = Truth { hypothesis, top, top_w, associated_w, neutrino };
        let event = Event {
            run_number: c.run_number,
            event_number,
            leptons: vec![lepton],
            jets,
            missing_et,
            ttbar_chi2_prob: None,
            truth: Some(truth),
        };
        (event, truth)
    }

    /// Isotropic two-body decay. Masses are sampled below threshold, so the
    /// decay is always allowed.
    fn decay(&mut self, parent: &FourMomentum, m1: Massf64, m2: Massf64) -> (FourMomentum, FourMomentum) {
        let cos_theta = self.rng.gen_range(-1.0..=1.0);
        let phi = self.rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI);
        kinematics::two_body_decay(parent, m1, m2, cos_theta, phi)
            .unwrap_or((*parent, FourMomentum::zero()))
    }

    fn normal(&mut self, sigma: f64) -> f64 { sigma * self.gauss.sample(&mut self.rng) }

    /// Smeared `(pt, eta, phi)` and the matching covariance
    fn smear(&mut self, p: &FourMomentum, pt_resolution: f64, angle_resolution: f64) -> (f64, f64, f64, Covariance) {
        let pt  = (p.pt() * (1.0 + self.normal(pt_resolution))).abs();
        let eta = p.eta() + self.normal(angle_resolution);
        let phi = kinematics::normalize_phi(p.phi() + self.normal(angle_resolution));
        (pt, eta, phi, Covariance::from_resolutions(pt_resolution * pt, angle_resolution, angle_resolution))
    }

    fn jet(&mut self, quark: &FourMomentum, mass: Massf64, weight: f64) -> Jet {
        let (res_pt, res_angle) = (self.config.jet_pt_resolution, self.config.jet_angle_resolution);
        let (pt, eta, phi, covariance) = self.smear(quark, res_pt, res_angle);
        Jet {
            p: FourMomentum::from_pt_eta_phi_m(pt, eta, phi, mass),
            btag: vec![TagWeight { tagger: Tagger::MV1, weight }],
            good: true,
            covariance,
        }
    }

    fn lepton(&mut self, p: &FourMomentum, flavour: Flavour, charge: i8) -> Lepton {
        let (res_pt, res_angle) = (self.config.lepton_pt_resolution, self.config.lepton_angle_resolution);
        let (pt, eta, phi, covariance) = self.smear(p, res_pt, res_angle);
        Lepton { flavour, charge, p: FourMomentum::from_pt_eta_phi_m(pt, eta, phi, flavour.mass()), covariance }
    }

    fn missing_et(&mut self, neutrino: &FourMomentum) -> MissingEt {
        let (res, res_phi) = (self.config.met_resolution, self.config.met_phi_resolution);
        let mag = (neutrino.pt() + self.normal(res)).abs();
        let phi = neutrino.phi() + self.normal(res_phi);
        MissingEt::from_mag_phi(mag, phi, MissingEt::covariance_from_resolution(res, res_phi, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn unsmeared() -> ToyConfig {
        ToyConfig {
            jet_pt_resolution: 0.0, jet_angle_resolution: 0.0,
            lepton_pt_resolution: 0.0, lepton_angle_resolution: 0.0,
            met_resolution: 0.0, met_phi_resolution: 0.0,
            ..ToyConfig::default()
        }
    }

    #[test]
    fn same_seed_same_events() {
        let a = ToyGenerator::new(ToyConfig::default()).unwrap().events(20);
        let b = ToyGenerator::new(ToyConfig::default()).unwrap().events(20);
        let c = ToyGenerator::new(ToyConfig { seed: 2, ..ToyConfig::default() }).unwrap().events(20);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.iter().map(|e| e.event_number).collect::<Vec<_>>(), (0..20).collect::<Vec<_>>());
    }

    #[rstest(/**/ fraction, expected,
             case(1.0, Hypothesis::LeptonicTop),
             case(0.0, Hypothesis::HadronicTop),
    )]
    fn decay_mode_follows_fraction(fraction: f64, expected: Hypothesis) {
        let mut toy = ToyGenerator::new(ToyConfig { leptonic_fraction: fraction, ..ToyConfig::default() }).unwrap();
        for _ in 0..50 {
            let (event, truth) = toy.next_event();
            assert_eq!(truth.hypothesis, expected);
            assert_eq!(event.truth, Some(truth));
            assert_eq!((event.leptons.len(), event.jets.len()), (1, 3));
            let tagged = event.jets.iter().filter(|j| j.weight(Tagger::MV1).unwrap() > 0.905363).count();
            assert_eq!(tagged, 1);
        }
    }

    #[test]
    fn unsmeared_event_balances_transverse_momentum() {
        let mut toy = ToyGenerator::new(unsmeared()).unwrap();
        for _ in 0..50 {
            let (event, truth) = toy.next_event();
            let visible: FourMomentum = event.jets.iter().map(|j| j.p).chain(event.leptons.iter().map(|l| l.p)).sum();
            let tol = 1e-9 * truth.top.e;
            assert_float_eq!(visible.px + event.missing_et.x, 0.0, abs <= tol);
            assert_float_eq!(visible.py + event.missing_et.y, 0.0, abs <= tol);
            assert_float_eq!((truth.top_w + event.jets[0].p).m(), truth.top.m(), abs <= 1e-6 * truth.top.e);
        }
    }

    #[test]
    fn pole_masses_without_breit_wigner() {
        let mut toy = ToyGenerator::new(ToyConfig { breit_wigner_masses: false, ..unsmeared() }).unwrap();
        let (_, truth) = toy.next_event();
        assert_float_eq!(truth.top.m()         , 173.5 , abs <= 1e-6);
        assert_float_eq!(truth.top_w.m()       , 80.385, abs <= 1e-6);
        assert_float_eq!(truth.associated_w.m(), 80.385, abs <= 1e-6);
    }

    #[test]
    fn nonsense_configurations_rejected() {
        assert!(ToyGenerator::new(ToyConfig { leptonic_fraction: 1.5, ..ToyConfig::default() }).is_err());
        assert!(ToyGenerator::new(ToyConfig { top_mass: 80.0, ..ToyConfig::default() }).is_err());
    }
}
