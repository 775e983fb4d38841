//! Reconstructed objects handed over by the ingestion layer.
//!
//! Everything here is read-only as far as the reconstruction is concerned.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::search::Hypothesis;
use crate::types::{pdg, ELECTRON_MASS, MUON_MASS};
use crate::{FourMomentum, Massf64, Momentumf64, Ratiof64};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavour { Electron, Muon }

impl Flavour {
    pub fn mass(self) -> Massf64 {
        match self {
            Flavour::Electron => ELECTRON_MASS,
            Flavour::Muon     => MUON_MASS,
        }
    }

    /// PDG code of the neutrino produced together with a positive lepton of
    /// this flavour in a W decay. Multiply by the lepton charge.
    pub fn neutrino_pdg(self) -> i32 {
        match self {
            Flavour::Electron => pdg::ELECTRON_NEUTRINO,
            Flavour::Muon     => pdg::MUON_NEUTRINO,
        }
    }
}

/// 3x3 covariance matrix in `(pt, eta, phi)`, or `(pt, theta, phi)` for
/// missing transverse momentum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Covariance(pub [[f64; 3]; 3]);

impl Covariance {
    pub fn diagonal(a: f64, b: f64, c: f64) -> Self {
        Self([[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]])
    }

    /// Uncorrelated covariance from the three standard deviations.
    pub fn from_resolutions(sigma_pt: Momentumf64, sigma_angle: f64, sigma_phi: f64) -> Self {
        Self::diagonal(sigma_pt * sigma_pt, sigma_angle * sigma_angle, sigma_phi * sigma_phi)
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        let c = &self.0;
        Matrix3::new(c[0][0], c[0][1], c[0][2],
                     c[1][0], c[1][1], c[1][2],
                     c[2][0], c[2][1], c[2][2])
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lepton {
    pub flavour: Flavour,
    pub charge: i8,
    pub p: FourMomentum,
    pub covariance: Covariance,
}

/// b-tagging algorithms whose weights may be attached to a jet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tagger {
    MV1,
    MV1c,
    SV1,
    IP3DSV1,
    JetFitterCombNN,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagWeight {
    pub tagger: Tagger,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Jet {
    pub p: FourMomentum,
    #[serde(default)]
    pub btag: Vec<TagWeight>,
    /// Jet quality flag
    #[serde(default = "good_by_default")]
    pub good: bool,
    pub covariance: Covariance,
}

fn good_by_default() -> bool { true }

impl Jet {
    /// Weight assigned by `tagger`, if that tagger ran on this jet.
    pub fn weight(&self, tagger: Tagger) -> Option<f64> {
        self.btag.iter()
            .find(|t| t.tagger == tagger)
            .map(|t| t.weight)
    }

    pub fn et (&self) -> f64      { self.p.et() }
    pub fn eta(&self) -> Ratiof64 { self.p.eta() }
}

/// Missing transverse momentum
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingEt {
    pub x: Momentumf64,
    pub y: Momentumf64,
    /// In `(pt, theta, phi)`; the theta row and column are never used
    pub covariance: Covariance,
}

impl MissingEt {

    pub fn from_mag_phi(mag: Momentumf64, phi: f64, covariance: Covariance) -> Self {
        Self { x: mag * phi.cos(), y: mag * phi.sin(), covariance }
    }

    pub fn mag(&self) -> Momentumf64 { self.x.hypot(self.y) }
    pub fn phi(&self) -> f64 { self.y.atan2(self.x) }

    /// Covariance from the resolutions of magnitude and azimuth and their
    /// covariance. Theta is unmeasured and gets unit variance.
    pub fn covariance_from_resolution(sigma_pt: Momentumf64, sigma_phi: f64, cov_pt_phi: f64) -> Covariance {
        Covariance([[sigma_pt * sigma_pt, 0.0, cov_pt_phi             ],
                    [0.0                , 1.0, 0.0                    ],
                    [cov_pt_phi         , 0.0, sigma_phi * sigma_phi  ]])
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub run_number: u32,
    pub event_number: u64,
    #[serde(default)]
    pub leptons: Vec<Lepton>,
    #[serde(default)]
    pub jets: Vec<Jet>,
    pub missing_et: MissingEt,
    /// Chi-square probability of the best ttbar hypothesis, if one was reconstructed
    #[serde(default)]
    pub ttbar_chi2_prob: Option<f64>,
    /// Generator-level record, present only in simulated events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth: Option<Truth>,
}

/// Generator-level facts about a simulated event
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Truth {
    /// Which top decay produced the event
    pub hypothesis: Hypothesis,
    pub top: FourMomentum,
    /// W from the top decay
    pub top_w: FourMomentum,
    pub associated_w: FourMomentum,
    pub neutrino: FourMomentum,
}
