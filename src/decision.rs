//! Choose one decay-channel classification from the two hypothesis records.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::fit::FitResult;
use crate::search::{Combination, Hypothesis, HypothesisRecord};

/// Probability of a chi-square at least this large with `ndof` degrees of freedom
pub fn chi2_prob(chi_square: f64, ndof: usize) -> f64 {
    if ndof == 0 { return if chi_square > 0.0 { 0.0 } else { 1.0 } }
    match ChiSquared::new(ndof as f64) {
        Ok(dist) => dist.sf(chi_square.max(0.0)),
        Err(_)   => 0.0,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Winner {
    pub combination: Combination,
    pub fit: FitResult,
    pub chi2_prob: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DecisionResult {
    NoReconstruction,
    TTbarVetoed,
    LeptonicTopWt(Winner),
    HadronicTopWt(Winner),
}

impl DecisionResult {
    pub fn winner(&self) -> Option<(Hypothesis, &Winner)> {
        match self {
            Self::LeptonicTopWt(w) => Some((Hypothesis::LeptonicTop, w)),
            Self::HadronicTopWt(w) => Some((Hypothesis::HadronicTop, w)),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NoReconstruction => "no-reconstruction",
            Self::TTbarVetoed      => "ttbar-vetoed",
            Self::LeptonicTopWt(_) => "leptonic-top",
            Self::HadronicTopWt(_) => "hadronic-top",
        }
    }
}

fn winner(record: &HypothesisRecord) -> Option<Winner> {
    record.best.as_ref().map(|best| Winner {
        combination: best.combination,
        fit: best.fit.clone(),
        chi2_prob: best.fit.probability(),
    })
}

/// Rules, in order:
///
/// 1. neither hypothesis reconstructed: `NoReconstruction`
/// 2. ttbar probability above `ttbar_veto_prob`: `TTbarVetoed`
/// 3. only one hypothesis reconstructed: that one
/// 4. the more probable hypothesis; leptonic top on equal probabilities
pub fn decide(
    leptonic: &HypothesisRecord,
    hadronic: &HypothesisRecord,
    ttbar_chi2_prob: Option<f64>,
    ttbar_veto_prob: f64,
) -> DecisionResult {
    use DecisionResult::*;
    let (lep, had) = (winner(leptonic), winner(hadronic));
    if lep.is_none() && had.is_none() { return NoReconstruction }
    if ttbar_chi2_prob.map_or(false, |p| p > ttbar_veto_prob) { return TTbarVetoed }
    match (lep, had) {
        (Some(l), None)    => LeptonicTopWt(l),
        (None, Some(h))    => HadronicTopWt(h),
        (Some(l), Some(h)) => if l.chi2_prob < h.chi2_prob { HadronicTopWt(h) } else { LeptonicTopWt(l) },
        (None, None)       => NoReconstruction,
    }
}
