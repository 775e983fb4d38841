//! Per-event pipeline: selection, both hypothesis searches, decision and
//! decay-chain emission.

#[cfg(not(feature = "serial"))]
use rayon::prelude::*;

use serde::{Deserialize, Serialize};

use crate::config::{Config, Decision};
use crate::decision::{decide, DecisionResult};
use crate::emit::{emit, DecayChain};
use crate::event::{Event, Truth};
use crate::fit::{ConstrainedSolver, FitEngine, LagrangeSolver};
use crate::search::{FitSetup, HypothesisRecord, HypothesisSearch};
use crate::selection::{ObjectSelector, Rejection};
use crate::{Error, Result};

/// Everything learnt about one event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventOutcome {
    pub run_number: u32,
    pub event_number: u64,
    pub n_generic_jets: usize,
    pub n_b_jets: usize,
    /// Set if object selection rejected the event, in which case no search ran
    pub rejection: Option<Rejection>,
    pub leptonic: Option<HypothesisRecord>,
    pub hadronic: Option<HypothesisRecord>,
    pub decision: DecisionResult,
    pub chain: Option<DecayChain>,
    /// Winning hypothesis has a chi-square probability above `chi2_prob_min`
    pub passes_chi2_prob: bool,
    /// Generator truth carried over from simulated events
    pub truth: Option<Truth>,
}

impl EventOutcome {
    fn rejected(event: &Event, n_generic_jets: usize, n_b_jets: usize, rejection: Rejection) -> Self {
        Self {
            run_number: event.run_number,
            event_number: event.event_number,
            n_generic_jets,
            n_b_jets,
            rejection: Some(rejection),
            leptonic: None,
            hadronic: None,
            decision: DecisionResult::NoReconstruction,
            chain: None,
            passes_chi2_prob: false,
            truth: event.truth,
        }
    }
}

pub struct Reconstructor<S> {
    selector: ObjectSelector,
    search: HypothesisSearch<S>,
    decision: Decision,
}

impl Reconstructor<LagrangeSolver> {
    pub fn from_config(config: &Config) -> Self { Self::new(config, LagrangeSolver) }
}

impl<S: ConstrainedSolver> Reconstructor<S> {

    pub fn new(config: &Config, solver: S) -> Self {
        let engine = FitEngine::new(solver, config.fit.solver_settings());
        Self {
            selector: ObjectSelector::new(config.selection.clone()),
            search: HypothesisSearch::new(engine, FitSetup::from_config(config)),
            decision: config.decision.clone(),
        }
    }

    pub fn process(&self, event: &Event) -> Result<EventOutcome> {
        let selected = self.selector.select(event);
        let (n_generic_jets, n_b_jets) = (selected.n_generic_jets, selected.n_b_jets);
        let lists = match selected.candidates {
            Ok(lists) => lists,
            Err(rejection) => {
                log::trace!("Event {}/{} rejected: {rejection:?}", event.run_number, event.event_number);
                return Ok(EventOutcome::rejected(event, n_generic_jets, n_b_jets, rejection))
            }
        };

        let fatal = |source| Error::Fit { run: event.run_number, event: event.event_number, source };
        let leptonic = self.search.search_leptonic(event, &lists).map_err(fatal)?;
        let hadronic = self.search.search_hadronic(event, &lists).map_err(fatal)?;

        let decision = decide(&leptonic, &hadronic, event.ttbar_chi2_prob, self.decision.ttbar_veto_prob);
        let chain = emit(&decision, &event.leptons[lists.lepton], &lists.met);
        let passes_chi2_prob = decision.winner()
            .map_or(false, |(_, w)| w.chi2_prob > self.decision.chi2_prob_min);

        log::debug!("Event {}/{}: {}", event.run_number, event.event_number, decision.label());
        Ok(EventOutcome {
            run_number: event.run_number,
            event_number: event.event_number,
            n_generic_jets,
            n_b_jets,
            rejection: None,
            leptonic: Some(leptonic),
            hadronic: Some(hadronic),
            decision,
            chain,
            passes_chi2_prob,
            truth: event.truth,
        })
    }
}

/// Reconstruct every event, in input order. The first fatal error aborts the job.
pub fn process_events<S>(reconstructor: &Reconstructor<S>, events: &[Event]) -> Result<Vec<EventOutcome>>
where
    S: ConstrainedSolver + Sync,
{
    // Choose between serial parallel iteration
    #[cfg    (feature = "serial") ] let iter = events.    iter();
    #[cfg(not(feature = "serial"))] let iter = events.par_iter();
    iter.map(|event| reconstructor.process(event)).collect()
}
