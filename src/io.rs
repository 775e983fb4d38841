//! Reading events and writing reconstruction results.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::emit::Candidate;
use crate::reco::EventOutcome;
use crate::search::Hypothesis;
use crate::selection::Rejection;
use crate::event::Event;
use crate::{Error, Result};

/// Read a JSON array of events
pub fn read_events(path: &Path) -> Result<Vec<Event>> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

pub fn write_events(path: &Path, events: &[Event]) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer(&mut out, events)?;
    out.flush().map_err(|e| Error::io(path, e))
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    pub m: f64,
    pub pt: f64,
    pub eta: f64,
    pub rapidity: f64,
    pub phi: f64,
}

impl From<&Candidate> for Kinematics {
    fn from(c: &Candidate) -> Self {
        Self { m: c.m(), pt: c.p.pt(), eta: c.eta(), rapidity: c.rapidity(), phi: c.phi() }
    }
}

/// One line of the results file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub run_number: u32,
    pub event_number: u64,
    pub rejection: Option<Rejection>,
    pub decision: String,
    pub chi_square: Option<f64>,
    pub ndof: Option<usize>,
    pub chi2_prob: Option<f64>,
    pub passes_chi2_prob: bool,
    pub top: Option<Kinematics>,
    pub hadronic_w: Option<Kinematics>,
    pub leptonic_w: Option<Kinematics>,
    pub w_transverse_mass: Option<f64>,
    /// Generated decay channel, simulated events only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_channel: Option<Hypothesis>,
}

impl From<&EventOutcome> for ResultRow {
    fn from(o: &EventOutcome) -> Self {
        let winner = o.decision.winner().map(|(_, w)| w);
        let chain = o.chain.as_ref();
        Self {
            run_number: o.run_number,
            event_number: o.event_number,
            rejection: o.rejection,
            decision: o.decision.label().to_string(),
            chi_square: winner.map(|w| w.fit.chi_square),
            ndof: winner.map(|w| w.fit.ndof),
            chi2_prob: winner.map(|w| w.chi2_prob),
            passes_chi2_prob: o.passes_chi2_prob,
            top: chain.map(|c| c.top().into()),
            hadronic_w: chain.map(|c| c.hadronic_w().into()),
            leptonic_w: chain.and_then(|c| c.leptonic_w()).map(Kinematics::from),
            w_transverse_mass: chain.map(|c| c.w_transverse_mass()),
            true_channel: o.truth.map(|t| t.hypothesis),
        }
    }
}

/// Write one JSON object per line, one line per event
pub fn write_results(path: &Path, outcomes: &[EventOutcome]) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);
    for outcome in outcomes {
        serde_json::to_writer(&mut out, &ResultRow::from(outcome))?;
        writeln!(out).map_err(|e| Error::io(path, e))?;
    }
    out.flush().map_err(|e| Error::io(path, e))
}
