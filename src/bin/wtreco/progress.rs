/// Progress bar and running statistics for the `run` subcommand
pub (super) struct Progress(Mutex<Inner>);

struct Inner {
    n_events_processed: u64,
    n_selected: u64,
    n_reconstructed: u64,
    bar: ProgressBar,
}

impl Inner {
    fn update(&mut self) {
        let Inner { n_events_processed, n_selected, n_reconstructed, bar } = self;
        bar.set_position(*n_events_processed);
        bar.set_message(format!("selected {}  reconstructed {}", g(n_selected), g(n_reconstructed)));
    }
}

impl Progress {

    pub (super) fn new(n_events: usize) -> Self {
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {wide_bar} {pos}/{len} ({eta_precise})\n{msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::new(n_events as u64).with_style(style);
        bar.tick();
        Self(Mutex::new(Inner { n_events_processed: 0, n_selected: 0, n_reconstructed: 0, bar }))
    }

    fn inner(&self) -> MutexGuard<'_, Inner> { self.0.lock().unwrap_or_else(PoisonError::into_inner) }

    pub (super) fn events_done(&self, outcomes: &[EventOutcome]) {
        let mut data = self.inner();
        data.n_events_processed += outcomes.len() as u64;
        data.n_selected         += outcomes.iter().filter(|o| o.rejection.is_none()).count() as u64;
        data.n_reconstructed    += outcomes.iter().filter(|o| o.chain.is_some()).count() as u64;
        data.update();
    }

    pub (super) fn final_report(&self) {
        let data = self.inner();
        data.bar.finish_and_clear();
        let Inner { n_events_processed: n, n_reconstructed: r, .. } = *data;
        let pct = if n > 0 { 100 * r / n } else { 0 };
        println!("{} / {} ({pct}%) events reconstructed as Wt", g(r), g(n));
    }
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::sync::{Mutex, MutexGuard, PoisonError};
use indicatif::{ProgressBar, ProgressStyle};
use wtreco::{reco::EventOutcome, utils::group_digits as g};
