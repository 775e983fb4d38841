//! Reduce an event's leptons and jets to the candidate lists used by the
//! hypothesis search.

use serde::{Deserialize, Serialize};

use crate::config::Selection;
use crate::event::{Event, Flavour, Jet, MissingEt};
use units::{gev_, Energy};

/// Lepton flavours accepted as signal lepton
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeptonMode {
    #[default]
    All,
    Electron,
    Muon,
}

impl LeptonMode {
    pub fn accepts(self, flavour: Flavour) -> bool {
        match self {
            LeptonMode::All      => true,
            LeptonMode::Electron => flavour == Flavour::Electron,
            LeptonMode::Muon     => flavour == Flavour::Muon,
        }
    }
}

/// Reasons for rejecting an event before any hypothesis is attempted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rejection {
    NoSignalLepton,
    InsufficientMissingEt,
    InsufficientTransverseMass,
    WrongJetMultiplicity,
    WrongBJetMultiplicity,
}

/// Indices into `Event::jets` (and `Event::leptons` for `lepton`).
///
/// Every jet list is sorted by descending pt. No jet appears in both `b_jets`
/// and `w_jets`.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateLists {
    pub lepton: usize,
    pub met: MissingEt,
    pub generic_jets: Vec<usize>,
    pub b_jets: Vec<usize>,
    pub w_jets: Vec<usize>,
}

/// Result of object selection. The jet counts are filled in even when the
/// event is rejected, so that pretag and tagged multiplicities can be monitored.
#[derive(Clone, Debug, PartialEq)]
pub struct Selected {
    pub n_generic_jets: usize,
    pub n_b_jets: usize,
    pub candidates: Result<CandidateLists, Rejection>,
}

#[derive(Clone, Debug)]
pub struct ObjectSelector {
    cuts: Selection,
}

impl ObjectSelector {

    pub fn new(cuts: Selection) -> Self { Self { cuts } }

    pub fn cuts(&self) -> &Selection { &self.cuts }

    pub fn select(&self, event: &Event) -> Selected {
        let (generic_jets, b_jets, w_jets) = self.jet_lists(event);
        let n_generic_jets = generic_jets.len();
        let n_b_jets = b_jets.len();
        let candidates = self.check(event, generic_jets, b_jets, w_jets);
        Selected { n_generic_jets, n_b_jets, candidates }
    }

    /// Generic, b- and W-candidate jets, in that order
    fn jet_lists(&self, event: &Event) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
        let cuts = &self.cuts;
        let good_jets = || event.jets.iter().enumerate().filter(|(_, j)| j.good);

        let in_window = |jet: &Jet, et_min: Energy, eta_min: f64, eta_max: f64| {
            let eta = jet.eta();
            jet.et() > gev_(et_min) && eta_min < eta && eta < eta_max
        };

        let generic_jets = pt_ordered(event, good_jets()
            .filter(|(_, j)| in_window(j, cuts.jets.et_min, cuts.jets.eta_min, cuts.jets.eta_max))
            .map(|(i, _)| i));

        let b = &cuts.b_jets;
        let b_jets = pt_ordered(event, good_jets()
            .filter(|(_, j)| in_window(j, b.et_min, b.eta_min, b.eta_max))
            .filter(|(_, j)| j.weight(b.tagger).map_or(false, |w| w > b.weight_min))
            .map(|(i, _)| i));

        let w = &cuts.w_jets;
        let w_jets = pt_ordered(event, good_jets()
            .filter(|(_, j)| in_window(j, w.et_min, w.eta_min, w.eta_max))
            .filter(|(_, j)| j.weight(w.tagger).map_or(true, |x| x <= w.weight_max))
            .map(|(i, _)| i)
            .filter(|i| !b_jets.contains(i)));

        (generic_jets, b_jets, w_jets)
    }

    fn check(&self, event: &Event, generic_jets: Vec<usize>, b_jets: Vec<usize>, w_jets: Vec<usize>)
             -> Result<CandidateLists, Rejection> {
        use Rejection::*;
        let cuts = &self.cuts;
        let lepton = self.signal_lepton(event).ok_or(NoSignalLepton)?;

        let met = event.missing_et;
        if met.mag() < gev_(cuts.met_min) { return Err(InsufficientMissingEt) }

        if let Some(mt_min) = cuts.w_transverse_mass_min {
            let mt = kinematics::w_transverse_mass(&event.leptons[lepton].p, met.x, met.y);
            if mt < gev_(mt_min) { return Err(InsufficientTransverseMass) }
        }

        if generic_jets.len() != cuts.n_jets { return Err(WrongJetMultiplicity) }
        if b_jets.len() != 1 { return Err(WrongBJetMultiplicity) }

        Ok(CandidateLists { lepton, met, generic_jets, b_jets, w_jets })
    }

    /// Highest-pt lepton of an accepted flavour above its flavour's threshold
    fn signal_lepton(&self, event: &Event) -> Option<usize> {
        let cuts = &self.cuts;
        let mut order: Vec<usize> = (0..event.leptons.len()).collect();
        order.sort_by(|&a, &b| event.leptons[b].p.pt().total_cmp(&event.leptons[a].p.pt()));
        order.into_iter().find(|&i| {
            let lepton = &event.leptons[i];
            let pt_min = match lepton.flavour {
                Flavour::Electron => cuts.electron_pt_min,
                Flavour::Muon     => cuts.muon_pt_min,
            };
            // A neutral lepton has no charge to give the W and top
            lepton.charge != 0 && cuts.lepton_mode.accepts(lepton.flavour) && lepton.p.pt() > gev_(pt_min)
        })
    }
}

/// Sort jet indices by descending pt; equal pts keep their input order.
fn pt_ordered(event: &Event, indices: impl Iterator<Item = usize>) -> Vec<usize> {
    let mut indices: Vec<usize> = indices.collect();
    indices.sort_by(|&a, &b| event.jets[b].p.pt().total_cmp(&event.jets[a].p.pt()));
    indices
}
