//! Decay-chain records built from the refit momenta of the winning combination.

use serde::{Deserialize, Serialize};

use crate::decision::DecisionResult;
use crate::event::{Lepton, MissingEt};
use crate::fit::{FitResult, Role};
use crate::types::pdg;
use crate::{Anglef64, FourMomentum, Massf64, Ratiof64};

/// One reconstructed particle
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub p: FourMomentum,
    pub pdg: i32,
}

impl Candidate {
    pub fn m       (&self) -> Massf64  { self.p.m() }
    pub fn mt      (&self) -> Massf64  { self.p.mt() }
    pub fn rapidity(&self) -> Ratiof64 { self.p.rapidity() }
    pub fn eta     (&self) -> Ratiof64 { self.p.eta() }
    pub fn phi     (&self) -> Anglef64 { self.p.phi() }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DecayChain {
    /// `t -> W b -> l nu b` with an associated `W -> q q'`
    LeptonicTop {
        neutrino: Candidate,
        leptonic_w: Candidate,
        top: Candidate,
        hadronic_w: Candidate,
    },
    /// `t -> W b -> q q' b` with an associated `W -> l nu`, of which only the
    /// transverse mass is known
    HadronicTop {
        hadronic_w: Candidate,
        top: Candidate,
        w_transverse_mass: Massf64,
    },
}

impl DecayChain {
    pub fn top(&self) -> &Candidate {
        match self {
            Self::LeptonicTop { top, .. } | Self::HadronicTop { top, .. } => top,
        }
    }

    pub fn hadronic_w(&self) -> &Candidate {
        match self {
            Self::LeptonicTop { hadronic_w, .. } | Self::HadronicTop { hadronic_w, .. } => hadronic_w,
        }
    }

    pub fn leptonic_w(&self) -> Option<&Candidate> {
        match self {
            Self::LeptonicTop { leptonic_w, .. } => Some(leptonic_w),
            Self::HadronicTop { .. } => None,
        }
    }

    pub fn neutrino(&self) -> Option<&Candidate> {
        match self {
            Self::LeptonicTop { neutrino, .. } => Some(neutrino),
            Self::HadronicTop { .. } => None,
        }
    }

    /// Transverse mass of the leptonic W: from the refit lepton and neutrino
    /// for a leptonic top, from the unfit lepton and missing ET otherwise
    pub fn w_transverse_mass(&self) -> Massf64 {
        match self {
            Self::LeptonicTop { neutrino, leptonic_w, .. } => {
                let lepton = leptonic_w.p - neutrino.p;
                kinematics::w_transverse_mass(&lepton, neutrino.p.px, neutrino.p.py)
            }
            Self::HadronicTop { w_transverse_mass, .. } => *w_transverse_mass,
        }
    }
}

/// Decay chain of a Wt decision; `None` when nothing was reconstructed or the
/// winning fit lacks one of the required refit particles.
pub fn emit(decision: &DecisionResult, lepton: &Lepton, met: &MissingEt) -> Option<DecayChain> {
    let q = i32::from(lepton.charge.signum());
    match decision {
        DecisionResult::LeptonicTopWt(winner) => leptonic_chain(&winner.fit, lepton, q),
        DecisionResult::HadronicTopWt(winner) => hadronic_chain(&winner.fit, lepton, met, q),
        DecisionResult::NoReconstruction | DecisionResult::TTbarVetoed => None,
    }
}

fn hadronic_w(fit: &FitResult, q: i32) -> Option<Candidate> {
    Some(Candidate { p: fit.refit(Role::Jet1)? + fit.refit(Role::Jet2)?, pdg: -pdg::W * q })
}

fn leptonic_chain(fit: &FitResult, lepton: &Lepton, q: i32) -> Option<DecayChain> {
    let neutrino = Candidate { p: fit.refit(Role::Neutrino)?, pdg: q * lepton.flavour.neutrino_pdg() };
    let leptonic_w = Candidate { p: fit.refit(Role::Lepton)? + neutrino.p, pdg: pdg::W * q };
    let top = Candidate { p: leptonic_w.p + fit.refit(Role::BJet)?, pdg: pdg::TOP * q };
    Some(DecayChain::LeptonicTop { neutrino, leptonic_w, top, hadronic_w: hadronic_w(fit, q)? })
}

fn hadronic_chain(fit: &FitResult, lepton: &Lepton, met: &MissingEt, q: i32) -> Option<DecayChain> {
    let hadronic_w = hadronic_w(fit, q)?;
    let top = Candidate { p: hadronic_w.p + fit.refit(Role::BJet)?, pdg: -pdg::TOP * q };
    let w_transverse_mass = kinematics::w_transverse_mass(&lepton.p, met.x, met.y);
    Some(DecayChain::HadronicTop { hadronic_w, top, w_transverse_mass })
}
