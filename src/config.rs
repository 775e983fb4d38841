//! Configuration file parser for Wt reconstruction
//!
//! Every field is optional: anything missing takes the value used in the
//! standard single-top Wt analysis. Energies, momenta and masses are written
//! with their units, e.g. `met_min = "25 GeV"`.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, de};

use units::{gev, gev_, Energy};

use crate::event::Tagger;
use crate::fit::{ConstraintShape, SolverSettings};
use crate::neutrino::NeutrinoSeeding;
use crate::selection::LeptonMode;
use crate::{Error, Result};

fn deserialize_uom<'d, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    String::deserialize(deserializer)?
        .parse::<T>()
        .map_err(de::Error::custom)
}

fn deserialize_uom_opt<'d, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'d>,
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    Option::<String>::deserialize(deserializer)?
        .map(|s| s.parse::<T>())
        .transpose()
        .map_err(de::Error::custom)
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub selection : Selection,
    pub fit       : Fit,
    pub masses    : Masses,
    pub decision  : Decision,
    pub histograms: Histograms,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Selection {
    /// Which lepton flavours may be the signal lepton
    pub lepton_mode: LeptonMode,

    #[serde(deserialize_with = "deserialize_uom")]
    pub electron_pt_min: Energy,

    #[serde(deserialize_with = "deserialize_uom")]
    pub muon_pt_min: Energy,

    /// Minimum magnitude of the missing transverse momentum
    #[serde(deserialize_with = "deserialize_uom")]
    pub met_min: Energy,

    /// Minimum W transverse mass from signal lepton and missing ET; no cut if absent
    #[serde(deserialize_with = "deserialize_uom_opt")]
    pub w_transverse_mass_min: Option<Energy>,

    /// Exact number of jets in the generic jet window
    pub n_jets: usize,

    pub jets  : JetWindow,
    pub b_jets: BJets,
    pub w_jets: WJets,
}

/// Kinematic window for the generic jets, used for jet multiplicity
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct JetWindow {
    #[serde(deserialize_with = "deserialize_uom")]
    pub et_min: Energy,
    pub eta_min: f64,
    pub eta_max: f64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BJets {
    #[serde(deserialize_with = "deserialize_uom")]
    pub et_min: Energy,
    pub eta_min: f64,
    pub eta_max: f64,
    pub tagger: Tagger,
    /// b-jet candidates need a weight strictly above this
    pub weight_min: f64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WJets {
    #[serde(deserialize_with = "deserialize_uom")]
    pub et_min: Energy,
    pub eta_min: f64,
    pub eta_max: f64,
    pub tagger: Tagger,
    /// Jets with a weight above this are too b-like to come from a W
    pub weight_max: f64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Fit {
    pub max_iterations: usize,
    /// Convergence: maximum change of chi-square between iterations
    pub max_delta_s: f64,
    /// Convergence: maximum sum of absolute constraint values
    pub max_f: f64,
    pub w_constraint: ConstraintShape,
    pub top_constraint: ConstraintShape,
    pub neutrino_seeding: NeutrinoSeeding,
    #[serde(deserialize_with = "deserialize_uom")]
    pub b_jet_mass: Energy,
    #[serde(deserialize_with = "deserialize_uom")]
    pub light_jet_mass: Energy,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Masses {
    #[serde(deserialize_with = "deserialize_uom")]
    pub w_mass: Energy,
    #[serde(deserialize_with = "deserialize_uom")]
    pub w_width: Energy,
    #[serde(deserialize_with = "deserialize_uom")]
    pub top_mass: Energy,
    #[serde(deserialize_with = "deserialize_uom")]
    pub top_width: Energy,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Decision {
    /// Events whose ttbar chi-square probability exceeds this are vetoed
    pub ttbar_veto_prob: f64,
    /// Minimum chi-square probability of the winning hypothesis (cutflow only)
    pub chi2_prob_min: f64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Histograms {
    /// Smallest jet multiplicity with its own set of control histograms
    pub jet_bin_min: usize,
    /// Largest jet multiplicity with its own set of control histograms
    pub jet_bin_max: usize,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            lepton_mode: LeptonMode::All,
            electron_pt_min: gev(25.0),
            muon_pt_min: gev(25.0),
            met_min: gev(25.0),
            w_transverse_mass_min: None,
            n_jets: 3,
            jets  : JetWindow::default(),
            b_jets: BJets::default(),
            w_jets: WJets::default(),
        }
    }
}

impl Default for JetWindow {
    fn default() -> Self { Self { et_min: gev(25.0), eta_min: -2.5, eta_max: 2.5 } }
}

const MV1_70_PERCENT: f64 = 0.905363;

impl Default for BJets {
    fn default() -> Self {
        Self { et_min: gev(25.0), eta_min: -2.5, eta_max: 2.5, tagger: Tagger::MV1, weight_min: MV1_70_PERCENT }
    }
}

impl Default for WJets {
    fn default() -> Self {
        Self { et_min: gev(25.0), eta_min: -2.5, eta_max: 2.5, tagger: Tagger::MV1, weight_max: MV1_70_PERCENT }
    }
}

impl Default for Fit {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_delta_s: 5e-5,
            max_f: 1e-4,
            w_constraint: ConstraintShape::Gaussian,
            top_constraint: ConstraintShape::Gaussian,
            neutrino_seeding: NeutrinoSeeding::Simple,
            b_jet_mass: gev(4.5),
            light_jet_mass: gev(0.0),
        }
    }
}

impl Default for Masses {
    fn default() -> Self {
        Self { w_mass: gev(80.385), w_width: gev(2.085), top_mass: gev(173.5), top_width: gev(2.0) }
    }
}

impl Default for Decision {
    fn default() -> Self { Self { ttbar_veto_prob: 0.1, chi2_prob_min: 0.1 } }
}

impl Default for Histograms {
    fn default() -> Self { Self { jet_bin_min: 2, jet_bin_max: 4 } }
}

impl Fit {
    pub fn solver_settings(&self) -> SolverSettings {
        SolverSettings {
            max_iterations: self.max_iterations,
            max_delta_s: self.max_delta_s,
            max_f: self.max_f,
        }
    }
}

impl Config {

    /// Reject configurations which parse but cannot be meaningfully used.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        let s = &self.selection;
        for (name, lo, hi) in [("jets"  , s.jets  .eta_min, s.jets  .eta_max),
                               ("b_jets", s.b_jets.eta_min, s.b_jets.eta_max),
                               ("w_jets", s.w_jets.eta_min, s.w_jets.eta_max)] {
            if lo >= hi { return invalid(format!("selection.{name}: eta_min ({lo}) must be below eta_max ({hi})")) }
        }
        if self.fit.max_iterations == 0 {
            return invalid("fit.max_iterations must be positive".into())
        }
        if self.fit.max_delta_s <= 0.0 || self.fit.max_f <= 0.0 {
            return invalid("fit convergence tolerances must be positive".into())
        }
        let m = &self.masses;
        for (name, value) in [("w_mass", m.w_mass), ("w_width", m.w_width), ("top_mass", m.top_mass), ("top_width", m.top_width)] {
            if gev_(value) <= 0.0 { return invalid(format!("masses.{name} must be positive")) }
        }
        let h = &self.histograms;
        if h.jet_bin_min > h.jet_bin_max {
            return invalid(format!("histograms.jet_bin_min ({}) exceeds jet_bin_max ({})", h.jet_bin_min, h.jet_bin_max))
        }
        if s.b_jets.weight_min < s.w_jets.weight_max {
            log::warn!("b-tag weight windows overlap (b_jets.weight_min {} < w_jets.weight_max {}): \
                        b-jet candidates are still removed from the W-jet candidates",
                       s.b_jets.weight_min, s.w_jets.weight_max);
        }
        Ok(())
    }
}

pub fn read_config_file(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let config: Config = toml::from_str(&text)
        .map_err(|source| Error::Config { path: path.into(), source })?;
    config.validate()?;
    Ok(config)
}


#[cfg(test)]
mod tests {
    use super::*;
    use units::uom::si::energy::gigaelectronvolt;
    use units::{assert_uom_eq, mev};

    // ----- Test an example on-disk config file -----------------------------------------
    #[test]
    fn test_config_file() {
        let config = read_config_file("wt-config.toml".as_ref()).unwrap();
        assert_eq!(config.selection.lepton_mode, LeptonMode::All);
        assert_eq!(config.selection.n_jets, 3);
        assert_eq!(config.selection.b_jets.tagger, Tagger::MV1);
        assert_eq!(config.fit.w_constraint, ConstraintShape::Gaussian);
        assert_eq!(config.fit.neutrino_seeding, NeutrinoSeeding::Simple);
        assert_uom_eq!(gigaelectronvolt, config.masses.top_mass, gev(173.5), ulps <= 1);
        assert_eq!(config.decision.ttbar_veto_prob, 0.1);
    }

    // ----- Some helpers to make the tests more concise ---------------------------------
    //  ---  Parse string as TOML  -------------------------
    fn parse<'d, D: Deserialize<'d>>(input: &'d str) -> D {
        toml::from_str(input).unwrap()
    }
    //  ---  Parse string as TOML, with explicit error reporting -------------------------
    fn parse_carefully<'d, D: Deserialize<'d>>(input: &'d str) -> std::result::Result<D, toml::de::Error> {
        toml::from_str(input)
    }
    //  ---  Macro for concise assertions about vlues of parsed fields -------------------
    macro_rules! check {
        ($type:ident($text:expr).$field:ident = $expected:expr) => {
            let config: $type = parse::<$type>($text);
            println!("DESERIALIZED: {config:?}");
            assert_eq!(config.$field, $expected);
        };
        ($type:ident($text:expr) fields: $($field:ident = $expected:expr);+$(;)?) => {
            let config: $type = parse::<$type>($text);
            println!("DESERIALIZED: {config:?}");
            $(assert_eq!(config.$field, $expected);)*
        }
    }
    // ----- Test deserializing of individual aspects of the Config type ----------------
    #[test]
    fn empty_config_gives_defaults() {
        let config: Config = parse("");
        assert_eq!(config, Config::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_selection_energies() {
        check!{Selection(r#"
                 electron_pt_min = "30 GeV"
                 muon_pt_min     = "27500 MeV"
                 met_min         = "20 GeV"
               "#) fields:
               electron_pt_min = gev(30.0);
               muon_pt_min     = mev(27500.0);
               met_min         = gev(20.0);
               n_jets          = 3;
               w_transverse_mass_min = None;
        }
        check!{Selection(r#"w_transverse_mass_min = "30 GeV""#).w_transverse_mass_min = Some(gev(30.0))}
        check!{Selection(r#"lepton_mode = "muon""#).lepton_mode = LeptonMode::Muon}
    }

    #[test]
    fn config_jet_windows() {
        check!{BJets(r#"
                 et_min     = "20 GeV"
                 eta_max    = 2.4
                 tagger     = "MV1c"
                 weight_min = 0.7
               "#) fields:
               et_min     = gev(20.0);
               eta_min    = -2.5;
               eta_max    = 2.4;
               tagger     = Tagger::MV1c;
               weight_min = 0.7;
        }
        check!{WJets(r#"weight_max = 0.5"#).weight_max = 0.5}
    }

    #[test]
    fn config_fit() {
        check!{Fit(r#"
                 max_iterations   = 200
                 w_constraint     = "breit-wigner"
                 neutrino_seeding = "refined"
                 b_jet_mass       = "4.8 GeV"
               "#) fields:
               max_iterations   = 200;
               w_constraint     = ConstraintShape::BreitWigner;
               top_constraint   = ConstraintShape::Gaussian;
               neutrino_seeding = NeutrinoSeeding::Refined;
               b_jet_mass       = gev(4.8);
        }
    }

    #[test]
    fn config_nested_tables() {
        let config: Config = parse(r#"
            [selection.jets]
            eta_min = -4.5
            eta_max =  4.5
            [masses]
            w_mass = "80.4 GeV"
            [decision]
            ttbar_veto_prob = 0.2
        "#);
        assert_eq!(config.selection.jets.eta_min, -4.5);
        assert_eq!(config.masses.w_mass, gev(80.4));
        assert_eq!(config.masses.top_mass, gev(173.5));
        assert_eq!(config.decision.ttbar_veto_prob, 0.2);
        assert_eq!(config.decision.chi2_prob_min, 0.1);
    }

    // ----- Make sure that unknown fields and missing units are not accepted -----------
    #[test]
    #[should_panic]
    fn config_reject_unknown_field() {
        parse::<Config>("unknown_field = 666");
    }

    #[test]
    fn config_reject_unitless_energy() {
        assert!(parse_carefully::<Selection>("met_min = 25.0").is_err());
        assert!(parse_carefully::<Selection>(r#"met_min = "25 parsecs""#).is_err());
    }

    #[test]
    fn config_reject_inconsistent_values() {
        let mut config = Config::default();
        config.histograms.jet_bin_min = 5;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = Config::default();
        config.selection.b_jets.eta_min = 3.0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let mut config = Config::default();
        config.fit.max_iterations = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
