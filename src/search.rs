//! Combinatorial search over jet assignments for the two top-decay hypotheses.
//!
//! For every b-jet candidate and every unordered pair of W-jet candidates one
//! constrained fit is run. The converged fit with the smallest chi-square is
//! kept; on exact ties the combination met first wins.

use std::ops::AddAssign;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use units::gev_;

use crate::config::Config;
use crate::event::Event;
use crate::fit::{ConstrainedSolver, ConstraintShape, FitEngine, FitError, FitInputs, FitParticle,
                 FitResult, FitStatus, MassConstraint, Parameterization, Role};
use crate::neutrino::{self, NeutrinoSeeding};
use crate::selection::CandidateLists;
use crate::{Massf64, SENTINEL_CHI2};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hypothesis {
    /// Top decays to `l nu b`, associated W to two jets
    LeptonicTop,
    /// Top decays to `b q q'`, associated W to `l nu`
    HadronicTop,
}

/// Indices into `Event::jets`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination {
    pub b_jet: usize,
    pub jet1: usize,
    pub jet2: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitCounters {
    pub attempted: u64,
    pub converged: u64,
    pub not_converged: u64,
    pub numeric_failures: u64,
    /// Converged fits which did not improve on the best so far
    pub worse_candidates: u64,
}

impl AddAssign for FitCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.attempted        += rhs.attempted;
        self.converged        += rhs.converged;
        self.not_converged    += rhs.not_converged;
        self.numeric_failures += rhs.numeric_failures;
        self.worse_candidates += rhs.worse_candidates;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BestCombination {
    pub combination: Combination,
    pub fit: FitResult,
}

/// Best combination found for one hypothesis in one event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HypothesisRecord {
    pub hypothesis: Hypothesis,
    /// `SENTINEL_CHI2` until a combination converges
    pub best_chi_square: f64,
    pub best: Option<BestCombination>,
    pub counters: FitCounters,
}

impl HypothesisRecord {

    pub fn new(hypothesis: Hypothesis) -> Self {
        Self { hypothesis, best_chi_square: SENTINEL_CHI2, best: None, counters: FitCounters::default() }
    }

    pub fn is_reconstructed(&self) -> bool { self.best.is_some() }

    /// Tally one fit, and keep it if it converged with a strictly smaller
    /// chi-square than anything seen so far. Returns whether it was kept.
    pub fn offer(&mut self, combination: Combination, fit: FitResult) -> bool {
        let counters = &mut self.counters;
        counters.attempted += 1;
        match fit.status {
            FitStatus::NotConverged   => { counters.not_converged    += 1; return false }
            FitStatus::NumericFailure => { counters.numeric_failures += 1; return false }
            FitStatus::Converged      =>   counters.converged        += 1,
        }
        if fit.chi_square < self.best_chi_square {
            self.best_chi_square = fit.chi_square;
            self.best = Some(BestCombination { combination, fit });
            true
        } else {
            counters.worse_candidates += 1;
            false
        }
    }
}

/// Masses, widths and constraint shapes used to build fit inputs
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitSetup {
    pub w_mass: Massf64,
    pub w_width: Massf64,
    pub top_mass: Massf64,
    pub top_width: Massf64,
    pub w_shape: ConstraintShape,
    pub top_shape: ConstraintShape,
    pub seeding: NeutrinoSeeding,
    pub b_jet_mass: Massf64,
    pub light_jet_mass: Massf64,
}

impl FitSetup {
    pub fn from_config(config: &Config) -> Self {
        let (m, f) = (&config.masses, &config.fit);
        Self {
            w_mass   : gev_(m.w_mass),
            w_width  : gev_(m.w_width),
            top_mass : gev_(m.top_mass),
            top_width: gev_(m.top_width),
            w_shape  : f.w_constraint,
            top_shape: f.top_constraint,
            seeding  : f.neutrino_seeding,
            b_jet_mass    : gev_(f.b_jet_mass),
            light_jet_mass: gev_(f.light_jet_mass),
        }
    }

    fn w(&self, name: &'static str, particles: Vec<usize>) -> MassConstraint {
        MassConstraint { name, particles, mass: self.w_mass, width: self.w_width, shape: self.w_shape }
    }

    fn top(&self, particles: Vec<usize>) -> MassConstraint {
        MassConstraint { name: "top", particles, mass: self.top_mass, width: self.top_width, shape: self.top_shape }
    }
}

/// Every `(b, j1, j2)` assignment in search order: b-jets outer, then index
/// pairs `i < j` of the W-jet candidates. No jet is used twice.
pub fn combinations(lists: &CandidateLists) -> impl Iterator<Item = Combination> + '_ {
    lists.b_jets.iter().flat_map(move |&b_jet| {
        lists.w_jets.iter()
            .filter(move |&&j| j != b_jet)
            .tuple_combinations()
            .map(move |(&jet1, &jet2)| Combination { b_jet, jet1, jet2 })
    })
}

pub struct HypothesisSearch<S> {
    engine: FitEngine<S>,
    setup: FitSetup,
}

impl<S: ConstrainedSolver> HypothesisSearch<S> {

    pub fn new(engine: FitEngine<S>, setup: FitSetup) -> Self { Self { engine, setup } }

    pub fn setup(&self) -> &FitSetup { &self.setup }

    pub fn search(&self, hypothesis: Hypothesis, event: &Event, lists: &CandidateLists) -> Result<HypothesisRecord, FitError> {
        match hypothesis {
            Hypothesis::LeptonicTop => self.search_leptonic(event, lists),
            Hypothesis::HadronicTop => self.search_hadronic(event, lists),
        }
    }

    pub fn search_leptonic(&self, event: &Event, lists: &CandidateLists) -> Result<HypothesisRecord, FitError> {
        self.run(Hypothesis::LeptonicTop, lists, |c| self.leptonic_inputs(event, lists, c))
    }

    pub fn search_hadronic(&self, event: &Event, lists: &CandidateLists) -> Result<HypothesisRecord, FitError> {
        self.run(Hypothesis::HadronicTop, lists, |c| self.hadronic_inputs(event, c))
    }

    fn run(
        &self,
        hypothesis: Hypothesis,
        lists: &CandidateLists,
        make_inputs: impl Fn(Combination) -> FitInputs,
    ) -> Result<HypothesisRecord, FitError> {
        let mut record = HypothesisRecord::new(hypothesis);
        for combination in combinations(lists) {
            let fit = self.engine.fit(&make_inputs(combination))?;
            log::debug!("{hypothesis:?} {combination:?}: {:?} chi2 = {:.4} after {} iterations",
                        fit.status, fit.chi_square, fit.iterations);
            if fit.status == FitStatus::NumericFailure {
                log::warn!("{hypothesis:?} fit of {combination:?} failed numerically");
            }
            record.offer(combination, fit);
        }
        Ok(record)
    }

    /// Lepton, neutrino, b-jet, jet1, jet2 under W(l nu), W(j1 j2) and top(l nu b)
    pub fn leptonic_inputs(&self, event: &Event, lists: &CandidateLists, c: Combination) -> FitInputs {
        let setup = &self.setup;
        let lepton = &event.leptons[lists.lepton];
        let met = &lists.met;
        let b = &event.jets[c.b_jet];
        let seed = neutrino::seed(setup.seeding, met, &lepton.p, &b.p, setup.w_mass, setup.top_mass);
        let (pt_eta_phi, pt_theta_phi) = (Parameterization::PtEtaPhi, Parameterization::PtThetaPhi);
        let particles = vec![
            FitParticle::measured(Role::Lepton, lepton.p, lepton.flavour.mass(), pt_eta_phi, lepton.covariance.to_matrix()),
            FitParticle::measured(Role::Neutrino, seed.momentum(met), 0.0, pt_theta_phi, met.covariance.to_matrix())
                .with_unmeasured(1),
            FitParticle::measured(Role::BJet, b.p, setup.b_jet_mass, pt_eta_phi, b.covariance.to_matrix()),
            self.light_jet(Role::Jet1, event, c.jet1),
            self.light_jet(Role::Jet2, event, c.jet2),
        ];
        let constraints = vec![
            setup.w("leptonic W", vec![0, 1]),
            setup.w("hadronic W", vec![3, 4]),
            setup.top(vec![0, 1, 2]),
        ];
        FitInputs { particles, constraints }
    }

    /// b-jet, jet1, jet2 under top(b j1 j2) and W(j1 j2)
    pub fn hadronic_inputs(&self, event: &Event, c: Combination) -> FitInputs {
        let setup = &self.setup;
        let b = &event.jets[c.b_jet];
        let particles = vec![
            FitParticle::measured(Role::BJet, b.p, setup.b_jet_mass, Parameterization::PtEtaPhi, b.covariance.to_matrix()),
            self.light_jet(Role::Jet1, event, c.jet1),
            self.light_jet(Role::Jet2, event, c.jet2),
        ];
        let constraints = vec![
            setup.top(vec![0, 1, 2]),
            setup.w("hadronic W", vec![1, 2]),
        ];
        FitInputs { particles, constraints }
    }

    fn light_jet(&self, role: Role, event: &Event, index: usize) -> FitParticle {
        let jet = &event.jets[index];
        FitParticle::measured(role, jet.p, self.setup.light_jet_mass, Parameterization::PtEtaPhi, jet.covariance.to_matrix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::{LagrangeSolver, SolverSettings};
    use crate::testing::{event_with, jet, muon, untagged_jet, FnSolver, solver_output};
    use crate::selection::ObjectSelector;
    use crate::fit::SolverStatus;
    use float_eq::assert_float_eq;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn lists(b_jets: Vec<usize>, w_jets: Vec<usize>) -> CandidateLists {
        CandidateLists { lepton: 0, met: Default::default(), generic_jets: vec![], b_jets, w_jets }
    }

    fn setup() -> FitSetup { FitSetup::from_config(&Config::default()) }

    fn combo(b_jet: usize, jet1: usize, jet2: usize) -> Combination { Combination { b_jet, jet1, jet2 } }

    #[test]
    fn combination_order() {
        let found: Vec<_> = combinations(&lists(vec![0, 4], vec![1, 2, 3])).collect();
        assert_eq!(found, vec![
            combo(0, 1, 2), combo(0, 1, 3), combo(0, 2, 3),
            combo(4, 1, 2), combo(4, 1, 3), combo(4, 2, 3),
        ]);
    }

    #[test]
    fn b_jet_never_paired_with_itself() {
        let found: Vec<_> = combinations(&lists(vec![1], vec![1, 2, 3])).collect();
        assert_eq!(found, vec![combo(1, 2, 3)]);
    }

    #[test]
    fn too_few_candidates_means_no_combinations() {
        assert_eq!(combinations(&lists(vec![], vec![1, 2, 3])).count(), 0);
        assert_eq!(combinations(&lists(vec![0], vec![1])).count(), 0);
    }

    /// 1 b-jet and 3 W-jet candidates with distinct pts
    fn four_jet_event() -> (Event, CandidateLists) {
        let jets = vec![jet(90.0, 0.1, 0.0, 0.99), untagged_jet(60.0, 0.5, 2.0),
                        untagged_jet(50.0, -0.5, -2.0), untagged_jet(40.0, 1.0, 1.0)];
        let event = event_with(vec![muon(45.0, 0.3, 0.0, -1)], jets, 40.0);
        let mut cuts = Config::default().selection;
        cuts.n_jets = 4;
        let lists = ObjectSelector::new(cuts).select(&event).candidates.unwrap();
        (event, lists)
    }

    /// chi-square of a combination identified by the pts of its light jets
    fn by_jet_pts(chi2: impl Fn(f64, f64) -> Option<f64>) -> impl Fn(&FitInputs) -> crate::fit::SolverOutput {
        move |inputs: &FitInputs| {
            let pt = |role| inputs.particles.iter().find(|p| p.role == role).unwrap().p.pt().round();
            match chi2(pt(Role::Jet1), pt(Role::Jet2)) {
                Some(c) => solver_output(inputs, SolverStatus::Converged, c),
                None    => solver_output(inputs, SolverStatus::NotConverged, 0.0),
            }
        }
    }

    #[test]
    fn later_smaller_chi_square_wins() {
        let (event, lists) = four_jet_event();
        // Pairs in order: (60,50), (60,40), (50,40)
        let solver = FnSolver(by_jet_pts(|a, b| match (a as u32, b as u32) {
            (60, 50) => Some(5.0),
            (60, 40) => None,
            (50, 40) => Some(3.0),
            _        => unreachable!(),
        }));
        let search = HypothesisSearch::new(FitEngine::new(solver, SolverSettings::default()), setup());
        let record = search.search_hadronic(&event, &lists).unwrap();
        assert_eq!(record.best_chi_square, 3.0);
        assert_eq!(record.best.unwrap().combination, combo(0, 2, 3));
        assert_eq!(record.counters, FitCounters {
            attempted: 3, converged: 2, not_converged: 1, numeric_failures: 0, worse_candidates: 0,
        });
    }

    #[test]
    fn first_combination_wins_ties() {
        let (event, lists) = four_jet_event();
        let solver = FnSolver(by_jet_pts(|_, _| Some(2.5)));
        let search = HypothesisSearch::new(FitEngine::new(solver, SolverSettings::default()), setup());
        let record = search.search_leptonic(&event, &lists).unwrap();
        assert_eq!(record.best.unwrap().combination, combo(0, 1, 2));
        assert_eq!(record.counters.worse_candidates, 2);
    }

    #[test]
    fn empty_b_jet_list_keeps_sentinel() {
        let (event, mut lists) = four_jet_event();
        lists.b_jets.clear();
        let search = HypothesisSearch::new(FitEngine::new(LagrangeSolver, SolverSettings::default()), setup());
        for h in [Hypothesis::LeptonicTop, Hypothesis::HadronicTop] {
            let record = search.search(h, &event, &lists).unwrap();
            assert_eq!(record.best_chi_square, SENTINEL_CHI2);
            assert!(!record.is_reconstructed());
            assert_eq!(record.counters, FitCounters::default());
        }
    }

    #[test]
    fn fatal_fit_error_aborts_search() {
        let (event, lists) = four_jet_event();
        let solver = FnSolver(|inputs: &FitInputs| solver_output(inputs, SolverStatus::Converged, -1.0));
        let search = HypothesisSearch::new(FitEngine::new(solver, SolverSettings::default()), setup());
        assert!(matches!(search.search_hadronic(&event, &lists), Err(FitError::NegativeChiSquare { .. })));
    }

    #[test]
    fn leptonic_inputs_layout() {
        let (event, lists) = four_jet_event();
        let search = HypothesisSearch::new(FitEngine::new(LagrangeSolver, SolverSettings::default()), setup());
        let inputs = search.leptonic_inputs(&event, &lists, combo(0, 1, 2));
        let roles: Vec<_> = inputs.particles.iter().map(|p| p.role).collect();
        assert_eq!(roles, vec![Role::Lepton, Role::Neutrino, Role::BJet, Role::Jet1, Role::Jet2]);
        assert_eq!(inputs.particles[1].unmeasured, [false, true, false]);
        assert_eq!(inputs.particles[1].parameterization, Parameterization::PtThetaPhi);
        assert_float_eq!(inputs.particles[2].mass, 4.5, abs <= 1e-9);
        let on: Vec<_> = inputs.constraints.iter().map(|c| c.particles.clone()).collect();
        assert_eq!(on, vec![vec![0, 1], vec![3, 4], vec![0, 1, 2]]);
        // Simple seed: central neutrino carrying the missing transverse momentum
        assert_float_eq!(inputs.particles[1].p.pz, 0.0, abs <= 1e-9);
        assert_float_eq!(inputs.particles[1].p.pt(), 40.0, abs <= 1e-9);
    }

    proptest! {
        #[test]
        fn best_chi_square_never_increases(
            fits in proptest::collection::vec((0..3u8, 0.0 .. 50.0f64), 0..30)
        ) {
            let mut record = HypothesisRecord::new(Hypothesis::LeptonicTop);
            let mut previous = record.best_chi_square;
            let mut smallest_converged = SENTINEL_CHI2;
            for (n, (status, chi_square)) in fits.into_iter().enumerate() {
                let status = [FitStatus::Converged, FitStatus::NotConverged, FitStatus::NumericFailure][status as usize];
                if status == FitStatus::Converged { smallest_converged = smallest_converged.min(chi_square) }
                let fit = FitResult { status, chi_square, ndof: 3, iterations: 1, refit: vec![], pulls: vec![] };
                let kept = record.offer(combo(0, n, n + 1), fit);
                prop_assert!(record.best_chi_square <= previous);
                prop_assert_eq!(kept, record.best_chi_square < previous);
                previous = record.best_chi_square;
            }
            prop_assert_eq!(record.best_chi_square, smallest_converged);
            let c = record.counters;
            prop_assert_eq!(c.attempted, c.converged + c.not_converged + c.numeric_failures);
        }
    }
}
