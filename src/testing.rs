//! Builders for hand-made events used by unit tests.

use crate::event::{Covariance, Event, Flavour, Jet, Lepton, MissingEt, TagWeight, Tagger};
use crate::fit::{ConstrainedSolver, FitInputs, SolverOutput, SolverSettings, SolverStatus};
use crate::FourMomentum;

pub fn lepton(flavour: Flavour, pt: f64, eta: f64, phi: f64, charge: i8) -> Lepton {
    Lepton {
        flavour,
        charge,
        p: FourMomentum::from_pt_eta_phi_m(pt, eta, phi, flavour.mass()),
        covariance: Covariance::from_resolutions(0.02 * pt, 0.001, 0.001),
    }
}

pub fn electron(pt: f64, eta: f64, phi: f64, charge: i8) -> Lepton { lepton(Flavour::Electron, pt, eta, phi, charge) }
pub fn muon    (pt: f64, eta: f64, phi: f64, charge: i8) -> Lepton { lepton(Flavour::Muon    , pt, eta, phi, charge) }

/// Jet with an MV1 weight
pub fn jet(pt: f64, eta: f64, phi: f64, weight: f64) -> Jet {
    Jet {
        p: FourMomentum::from_pt_eta_phi_m(pt, eta, phi, 5.0),
        btag: vec![TagWeight { tagger: Tagger::MV1, weight }],
        good: true,
        covariance: Covariance::from_resolutions(0.1 * pt, 0.02, 0.02),
    }
}

pub fn untagged_jet(pt: f64, eta: f64, phi: f64) -> Jet { jet(pt, eta, phi, 0.05) }

pub fn event_with(leptons: Vec<Lepton>, jets: Vec<Jet>, met: f64) -> Event {
    Event {
        run_number: 1,
        event_number: 1,
        leptons,
        jets,
        missing_et: MissingEt::from_mag_phi(met, 1.5, MissingEt::covariance_from_resolution(10.0, 0.1, 0.0)),
        ttbar_chi2_prob: None,
        truth: None,
    }
}

/// Solver whose output is computed by a closure
pub struct FnSolver<F>(pub F);

impl<F: Fn(&FitInputs) -> SolverOutput> ConstrainedSolver for FnSolver<F> {
    fn solve(&self, inputs: &FitInputs, _: &SolverSettings) -> SolverOutput { (self.0)(inputs) }
}

/// Output leaving every parameter at its measured value
pub fn solver_output(inputs: &FitInputs, status: SolverStatus, chi_square: f64) -> SolverOutput {
    SolverOutput {
        status,
        chi_square,
        iterations: 1,
        parameters: inputs.particles.iter().map(|p| p.parameters()).collect(),
        pulls: vec![[0.0; 3]; inputs.particles.len()],
    }
}
