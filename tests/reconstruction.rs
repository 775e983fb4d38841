use ndhistogram::Histogram;
use pretty_assertions::assert_eq;
use rstest::rstest;
use wtreco::config::Config;
use wtreco::reco::{process_events, EventOutcome, Reconstructor};
use wtreco::search::Hypothesis;
use wtreco::stats::{Cut, Summary};
use wtreco::toy::{ToyConfig, ToyGenerator};

fn toy_events(n: usize, seed: u64, leptonic_fraction: f64) -> Vec<wtreco::event::Event> {
    let config = ToyConfig { seed, leptonic_fraction, breit_wigner_masses: false, ..ToyConfig::default() };
    ToyGenerator::new(config).unwrap().events(n)
}

fn reconstruct(events: &[wtreco::event::Event]) -> Vec<EventOutcome> {
    process_events(&Reconstructor::from_config(&Config::default()), events).unwrap()
}

fn median(mut xs: Vec<f64>) -> f64 {
    xs.sort_by(|a, b| a.total_cmp(b));
    xs[xs.len() / 2]
}

#[test]
fn toy_events_are_reconstructed() {
    let outcomes = reconstruct(&toy_events(200, 11, 0.5));
    assert_eq!(outcomes.len(), 200);
    let tops: Vec<f64> = outcomes.iter()
        .filter_map(|o| o.chain.as_ref())
        .map(|chain| chain.top().m())
        .collect();
    assert!(!tops.is_empty(), "no event was reconstructed");
    let m = median(tops);
    assert!((m - 173.5).abs() < 15.0, "median reconstructed top mass {m}");
}

#[rstest(/**/ fraction, expected,
         case(1.0, "leptonic-top"),
         case(0.0, "hadronic-top"),
)]
fn pure_samples_favour_their_own_hypothesis(fraction: f64, expected: &str) {
    let outcomes = reconstruct(&toy_events(200, 5, fraction));
    let labels: Vec<&str> = outcomes.iter()
        .filter(|o| o.chain.is_some())
        .map(|o| o.decision.label())
        .collect();
    let right = labels.iter().filter(|&&l| l == expected).count();
    assert!(2 * right > labels.len(), "{right} of {} reconstructed events labelled {expected}", labels.len());
}

#[test]
fn reconstruction_is_reproducible() {
    let events = toy_events(100, 3, 0.5);
    assert_eq!(reconstruct(&events), reconstruct(&events));
    assert_eq!(toy_events(10, 3, 0.5), events[..10].to_vec());
}

#[test]
fn batch_agrees_with_one_event_at_a_time() {
    let events = toy_events(60, 8, 0.5);
    let reconstructor = Reconstructor::from_config(&Config::default());
    let one_by_one: Vec<_> = events.iter().map(|e| reconstructor.process(e).unwrap()).collect();
    assert_eq!(process_events(&reconstructor, &events).unwrap(), one_by_one);
}

#[test]
fn summary_counts_every_event() {
    let config = Config::default();
    let outcomes = reconstruct(&toy_events(150, 21, 0.5));
    let summary = Summary::from_outcomes(&outcomes, &config.histograms).unwrap();
    assert_eq!(summary.n_events(), 150);

    let counts: Vec<u64> = Cut::ALL.iter().map(|&cut| summary.cutflow.count(cut)).collect();
    assert!(counts.windows(2).all(|w| w[0] >= w[1]), "cutflow not monotone: {counts:?}");

    let reconstructed = outcomes.iter().filter(|o| o.chain.is_some()).count() as u64;
    let d = &summary.decisions;
    assert_eq!(d.leptonic_top + d.hadronic_top, reconstructed);
    assert_eq!(d.no_reconstruction + d.ttbar_vetoed + d.leptonic_top + d.hadronic_top, 150);
}

#[test]
fn reconstructed_channel_matches_generated_channel() {
    let config = Config::default();
    let events = toy_events(300, 17, 0.5);
    assert!(events.iter().all(|e| e.truth.is_some()));
    let outcomes = reconstruct(&events);

    let assigned: Vec<(Hypothesis, Hypothesis)> = outcomes.iter()
        .filter_map(|o| Some((o.truth?.hypothesis, o.decision.winner()?.0)))
        .collect();
    assert!(!assigned.is_empty(), "no event was reconstructed");
    let matched = assigned.iter().filter(|(truth, reco)| truth == reco).count();

    let summary = Summary::from_outcomes(&outcomes, &config.histograms).unwrap();
    let comparison = &summary.truth;
    assert_eq!(comparison.n_events(), 300);
    assert_eq!(comparison.n_reconstructed(), assigned.len() as u64);
    assert_eq!(comparison.n_matched(), matched as u64);
    let rate = comparison.match_rate().unwrap();
    assert!(rate > 0.5, "channel match rate {rate}");

    let residuals = summary.histograms.top_mass_residual.values().sum::<usize>();
    assert_eq!(residuals, outcomes.iter().filter(|o| o.chain.is_some()).count());
}
