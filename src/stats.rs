//! Job-level bookkeeping: cutflow, fit counters, decision tallies and a few
//! control histograms.
//!
//! A `Summary` is filled from `EventOutcome`s. Summaries of disjoint sets of
//! events can be merged, so each worker thread accumulates its own and the
//! results are reduced at the end.

use std::fmt;
use std::ops::AddAssign;

use ndhistogram::{axis::{Axis, BinInterval, Uniform}, ndhistogram, Histogram, HistND};
#[cfg(not(feature = "serial"))]
use rayon::prelude::*;

use crate::config::Histograms;
use crate::decision::DecisionResult;
use crate::reco::EventOutcome;
use crate::search::{FitCounters, Hypothesis};
use crate::selection::Rejection;
use crate::utils::group_digits as g;
use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cut {
    AllEvents,
    SignalLepton,
    MissingEt,
    TransverseMass,
    JetMultiplicity,
    BJetMultiplicity,
    Reconstructed,
    TTbarVeto,
    Chi2Prob,
}

impl Cut {
    pub const ALL: [Cut; 9] = [
        Cut::AllEvents, Cut::SignalLepton, Cut::MissingEt, Cut::TransverseMass, Cut::JetMultiplicity,
        Cut::BJetMultiplicity, Cut::Reconstructed, Cut::TTbarVeto, Cut::Chi2Prob,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Cut::AllEvents        => "all events",
            Cut::SignalLepton     => "signal lepton",
            Cut::MissingEt        => "missing ET",
            Cut::TransverseMass   => "W transverse mass",
            Cut::JetMultiplicity  => "jet multiplicity",
            Cut::BJetMultiplicity => "b-jet multiplicity",
            Cut::Reconstructed    => "Wt reconstructed",
            Cut::TTbarVeto        => "ttbar veto",
            Cut::Chi2Prob         => "chi2 probability",
        }
    }
}

/// Number of events surviving each successive cut
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cutflow([u64; 9]);

impl Cutflow {
    pub fn count(&self, cut: Cut) -> u64 { self.0[cut as usize] }

    /// Count an event which passed the first `n_passed` cuts
    fn record(&mut self, n_passed: usize) {
        for count in &mut self.0[..n_passed] { *count += 1 }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Cut, u64)> + '_ {
        Cut::ALL.into_iter().zip(self.0)
    }
}

impl AddAssign<&Cutflow> for Cutflow {
    fn add_assign(&mut self, rhs: &Cutflow) {
        for (l, r) in self.0.iter_mut().zip(rhs.0) { *l += r }
    }
}

/// How many of the cuts in `Cut::ALL` the event survived
fn cuts_passed(outcome: &EventOutcome) -> usize {
    use Rejection::*;
    match outcome.rejection {
        Some(NoSignalLepton)             => 1,
        Some(InsufficientMissingEt)      => 2,
        Some(InsufficientTransverseMass) => 3,
        Some(WrongJetMultiplicity)       => 4,
        Some(WrongBJetMultiplicity)      => 5,
        None => match outcome.decision {
            DecisionResult::NoReconstruction => 6,
            DecisionResult::TTbarVetoed      => 7,
            _ if outcome.passes_chi2_prob    => 9,
            _                                => 8,
        },
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecisionTally {
    pub no_reconstruction: u64,
    pub ttbar_vetoed: u64,
    pub leptonic_top: u64,
    pub hadronic_top: u64,
}

impl AddAssign<&DecisionTally> for DecisionTally {
    fn add_assign(&mut self, rhs: &DecisionTally) {
        self.no_reconstruction += rhs.no_reconstruction;
        self.ttbar_vetoed      += rhs.ttbar_vetoed;
        self.leptonic_top      += rhs.leptonic_top;
        self.hadronic_top      += rhs.hadronic_top;
    }
}

/// Reconstructed decay channel against the generator truth of simulated events
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelComparison {
    /// Rows: true leptonic top, true hadronic top. Columns: reconstructed as
    /// leptonic top, as hadronic top, not reconstructed.
    counts: [[u64; 3]; 2],
}

impl ChannelComparison {
    fn index(hypothesis: Hypothesis) -> usize {
        match hypothesis {
            Hypothesis::LeptonicTop => 0,
            Hypothesis::HadronicTop => 1,
        }
    }

    pub fn record(&mut self, truth: Hypothesis, reconstructed: Option<Hypothesis>) {
        self.counts[Self::index(truth)][reconstructed.map_or(2, Self::index)] += 1;
    }

    pub fn count(&self, truth: Hypothesis, reconstructed: Option<Hypothesis>) -> u64 {
        self.counts[Self::index(truth)][reconstructed.map_or(2, Self::index)]
    }

    pub fn n_events(&self) -> u64 { self.counts.iter().flatten().sum() }

    pub fn n_reconstructed(&self) -> u64 { self.counts.iter().map(|row| row[0] + row[1]).sum() }

    pub fn n_matched(&self) -> u64 { self.counts[0][0] + self.counts[1][1] }

    /// Fraction of reconstructed events assigned their true channel
    pub fn match_rate(&self) -> Option<f64> {
        let n = self.n_reconstructed();
        (n > 0).then(|| self.n_matched() as f64 / n as f64)
    }
}

impl AddAssign<&ChannelComparison> for ChannelComparison {
    fn add_assign(&mut self, rhs: &ChannelComparison) {
        for (l, r) in self.counts.iter_mut().flatten().zip(rhs.counts.iter().flatten()) { *l += r }
    }
}

type Hist = HistND<(Uniform<f64>,), usize>;

fn hist(nbins: usize, lo: f64, hi: f64) -> Hist { ndhistogram!(Uniform::new(nbins, lo, hi); usize) }

/// Control histograms, one set per hypothesis where it matters
#[derive(Clone, Debug, PartialEq)]
pub struct ControlHistograms {
    pub leptonic_chi2_prob: Hist,
    pub hadronic_chi2_prob: Hist,
    pub top_mass: Hist,
    pub hadronic_w_mass: Hist,
    pub leptonic_w_mass: Hist,
    pub w_transverse_mass: Hist,
    /// Generic jet multiplicity of events passing the W transverse mass cut
    pub jet_multiplicity: Hist,
    /// Reconstructed minus generated top mass, simulated events only
    pub top_mass_residual: Hist,
}

impl ControlHistograms {
    fn new(bins: &Histograms) -> Self {
        let (lo, hi) = (bins.jet_bin_min, bins.jet_bin_max.max(bins.jet_bin_min));
        Self {
            leptonic_chi2_prob: hist(20, 0.0, 1.0),
            hadronic_chi2_prob: hist(20, 0.0, 1.0),
            top_mass         : hist(50, 100.0, 250.0),
            hadronic_w_mass  : hist(40,  40.0, 120.0),
            leptonic_w_mass  : hist(40,  40.0, 120.0),
            w_transverse_mass: hist(30,   0.0, 150.0),
            jet_multiplicity : hist(hi - lo + 1, lo as f64 - 0.5, hi as f64 + 0.5),
            top_mass_residual: hist(40, -40.0, 40.0),
        }
    }

    fn named(&self) -> [(&'static str, &Hist); 8] {
        [("leptonic-top chi2 probability", &self.leptonic_chi2_prob),
         ("hadronic-top chi2 probability", &self.hadronic_chi2_prob),
         ("top mass [GeV]"               , &self.top_mass),
         ("hadronic W mass [GeV]"        , &self.hadronic_w_mass),
         ("leptonic W mass [GeV]"        , &self.leptonic_w_mass),
         ("W transverse mass [GeV]"      , &self.w_transverse_mass),
         ("jet multiplicity"             , &self.jet_multiplicity),
         ("top mass reco - true [GeV]"   , &self.top_mass_residual)]
    }
}

impl AddAssign<&ControlHistograms> for ControlHistograms {
    fn add_assign(&mut self, rhs: &ControlHistograms) {
        self.leptonic_chi2_prob += &rhs.leptonic_chi2_prob;
        self.hadronic_chi2_prob += &rhs.hadronic_chi2_prob;
        self.top_mass           += &rhs.top_mass;
        self.hadronic_w_mass    += &rhs.hadronic_w_mass;
        self.leptonic_w_mass    += &rhs.leptonic_w_mass;
        self.w_transverse_mass  += &rhs.w_transverse_mass;
        self.jet_multiplicity   += &rhs.jet_multiplicity;
        self.top_mass_residual  += &rhs.top_mass_residual;
    }
}

/// Contents of the bins of a histogram, without under- and overflow
pub fn bin_contents(h: &Hist) -> Vec<(f64, f64, usize)> {
    h.iter().filter_map(|item| match item.bin {
        BinInterval::Bin { start, end } => Some((start, end, *item.value)),
        _ => None,
    }).collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    bins: Histograms,
    pub cutflow: Cutflow,
    pub leptonic: FitCounters,
    pub hadronic: FitCounters,
    pub decisions: DecisionTally,
    pub truth: ChannelComparison,
    pub histograms: ControlHistograms,
}

impl Summary {

    pub fn new(bins: &Histograms) -> Self {
        Self {
            bins: bins.clone(),
            cutflow: Cutflow::default(),
            leptonic: FitCounters::default(),
            hadronic: FitCounters::default(),
            decisions: DecisionTally::default(),
            truth: ChannelComparison::default(),
            histograms: ControlHistograms::new(bins),
        }
    }

    pub fn n_events(&self) -> u64 { self.cutflow.count(Cut::AllEvents) }

    /// Events passing the jet multiplicity cut are classified into jet bins;
    /// a multiplicity outside the configured bins is fatal.
    pub fn add(&mut self, outcome: &EventOutcome) -> Result<()> {
        let n_passed = cuts_passed(outcome);
        self.cutflow.record(n_passed);

        let n_jets = outcome.n_generic_jets;
        if n_passed > Cut::TransverseMass as usize {
            self.histograms.jet_multiplicity.fill(&(n_jets as f64));
        }
        if n_passed > Cut::JetMultiplicity as usize {
            let (min, max) = (self.bins.jet_bin_min, self.bins.jet_bin_max);
            if n_jets < min || n_jets > max {
                return Err(Error::JetBinOutOfRange {
                    run: outcome.run_number, event: outcome.event_number, n_jets, min, max,
                })
            }
        }

        if let Some(record) = &outcome.leptonic { self.leptonic += record.counters }
        if let Some(record) = &outcome.hadronic { self.hadronic += record.counters }
        let h = &mut self.histograms;
        for (record, hist) in [(&outcome.leptonic, &mut h.leptonic_chi2_prob),
                               (&outcome.hadronic, &mut h.hadronic_chi2_prob)] {
            if let Some(best) = record.as_ref().and_then(|r| r.best.as_ref()) {
                hist.fill(&best.fit.probability());
            }
        }

        let tally = &mut self.decisions;
        match outcome.decision {
            DecisionResult::NoReconstruction => tally.no_reconstruction += 1,
            DecisionResult::TTbarVetoed      => tally.ttbar_vetoed      += 1,
            DecisionResult::LeptonicTopWt(_) => tally.leptonic_top      += 1,
            DecisionResult::HadronicTopWt(_) => tally.hadronic_top      += 1,
        }

        if let Some(truth) = &outcome.truth {
            self.truth.record(truth.hypothesis, outcome.decision.winner().map(|(h, _)| h));
            if let Some(chain) = &outcome.chain {
                h.top_mass_residual.fill(&(chain.top().m() - truth.top.m()));
            }
        }

        if let Some(chain) = &outcome.chain {
            h.top_mass         .fill(&chain.top().m());
            h.hadronic_w_mass  .fill(&chain.hadronic_w().m());
            h.w_transverse_mass.fill(&chain.w_transverse_mass());
            if let Some(w) = chain.leptonic_w() { h.leptonic_w_mass.fill(&w.m()) }
        }
        Ok(())
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.cutflow    += &other.cutflow;
        self.leptonic   += other.leptonic;
        self.hadronic   += other.hadronic;
        self.decisions  += &other.decisions;
        self.truth      += &other.truth;
        self.histograms += &other.histograms;
        self
    }

    /// Accumulate per worker, then reduce
    pub fn from_outcomes(outcomes: &[EventOutcome], bins: &Histograms) -> Result<Self> {
        let empty = || Summary::new(bins);
        let add_outcome = |mut summary: Summary, outcome: &EventOutcome| -> Result<Summary> {
            summary.add(outcome)?;
            Ok(summary)
        };

        #[cfg(feature = "serial")]
        let summary = outcomes.iter().try_fold(empty(), add_outcome);

        #[cfg(not(feature = "serial"))]
        let summary = outcomes.par_iter()
            .try_fold(empty, add_outcome)
            .try_reduce(empty, |l, r| Ok(l.merge(r)));

        summary
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cutflow")?;
        let all = self.n_events().max(1) as f64;
        for (cut, n) in self.cutflow.iter() {
            writeln!(f, "  {:<20} {:>12} {:>7.2}%", cut.label(), g(n), 100.0 * n as f64 / all)?;
        }
        writeln!(f, "Fits               attempted    converged not converged   failed    worse")?;
        for (name, c) in [("leptonic top", &self.leptonic), ("hadronic top", &self.hadronic)] {
            writeln!(f, "  {name:<14} {:>12} {:>12} {:>12} {:>8} {:>8}",
                     g(c.attempted), g(c.converged), g(c.not_converged), g(c.numeric_failures), g(c.worse_candidates))?;
        }
        let d = &self.decisions;
        writeln!(f, "Decisions")?;
        writeln!(f, "  no reconstruction {:>12}", g(d.no_reconstruction))?;
        writeln!(f, "  ttbar vetoed      {:>12}", g(d.ttbar_vetoed))?;
        writeln!(f, "  leptonic top      {:>12}", g(d.leptonic_top))?;
        writeln!(f, "  hadronic top      {:>12}", g(d.hadronic_top))?;
        let t = &self.truth;
        if t.n_events() > 0 {
            use Hypothesis::*;
            writeln!(f, "Generated channel   as leptonic   as hadronic  not reconstructed")?;
            for (name, truth) in [("leptonic top", LeptonicTop), ("hadronic top", HadronicTop)] {
                writeln!(f, "  {name:<14} {:>14} {:>13} {:>18}", g(t.count(truth, Some(LeptonicTop))),
                         g(t.count(truth, Some(HadronicTop))), g(t.count(truth, None)))?;
            }
            if let Some(rate) = t.match_rate() {
                writeln!(f, "  channel match rate {:.1}%", 100.0 * rate)?;
            }
        }
        for (name, h) in self.histograms.named() {
            let axis = &h.axes().as_tuple().0;
            writeln!(f, "{name} ({} bins in [{}, {}])", axis.num_bins(), axis.low(), axis.high())?;
            let contents = bin_contents(h);
            let peak = contents.iter().map(|(_, _, n)| *n).max().unwrap_or(0).max(1);
            for (start, end, n) in contents {
                let bar = "#".repeat(40 * n / peak);
                writeln!(f, "  [{start:>8.3}, {end:>8.3}) {:>8} {bar}", g(n))?;
            }
        }
        Ok(())
    }
}
