mod cli;
mod progress;

fn main() -> BoxErr<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt().with_max_level(args.log_level).with_target(false).init();

    match args.command {
        Command::Run { events, config, out, threads, chunk_size } =>
            run(&events, config.as_deref(), out.as_deref(), threads, chunk_size),
        Command::Toy { events, seed, leptonic_fraction, pole_masses, out } =>
            toy(events, seed, leptonic_fraction, pole_masses, &out),
        Command::ShowConfig { config } => {
            println!("{:#?}", load_config(config.as_deref())?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> BoxErr<Config> {
    Ok(match path {
        Some(path) => read_config_file(path)?,
        None       => Config::default(),
    })
}

fn run(events: &Path, config: Option<&Path>, out: Option<&Path>, threads: usize, chunk_size: usize) -> BoxErr<()> {
    let config = load_config(config)?;
    let mut timing = wtreco::utils::timing::Progress::new();

    // If the directory where results will be written does not exist yet, make
    // it, before starting the potentially long computation
    if let Some(dir) = out.and_then(Path::parent).filter(|d| !d.as_os_str().is_empty()) {
        create_dir_all(dir)?;
    }

    timing.start("Reading events");
    let events = io::read_events(events)?;
    timing.done_with_message(&format!("loaded {}", g(events.len())));

    let reconstructor = Reconstructor::from_config(&config);
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
    info!("Reconstructing with up to {threads} threads");

    // --- Reconstruct ---------------------------------------------------------------
    let progress = Progress::new(events.len());
    let mut outcomes = Vec::with_capacity(events.len());
    for chunk in events.chunks(chunk_size.max(1)) {
        let done = pool.install(|| process_events(&reconstructor, chunk))?;
        progress.events_done(&done);
        outcomes.extend(done);
    }
    progress.final_report();

    // --- Summarize -----------------------------------------------------------------
    let summary = pool.install(|| Summary::from_outcomes(&outcomes, &config.histograms))?;
    println!("{summary}");

    if let Some(out) = out {
        timing.start(&format!("Writing results to {}", out.display()));
        io::write_results(out, &outcomes)?;
        timing.done();
    }
    Ok(())
}

fn toy(n: usize, seed: u64, leptonic_fraction: f64, pole_masses: bool, out: &Path) -> BoxErr<()> {
    let config = ToyConfig { seed, leptonic_fraction, breit_wigner_masses: !pole_masses, ..ToyConfig::default() };
    let mut timing = wtreco::utils::timing::Progress::new();
    timing.start(&format!("Generating {} toy events", g(n)));
    let events = ToyGenerator::new(config)?.events(n);
    timing.done();
    timing.start(&format!("Writing events to {}", out.display()));
    io::write_events(out, &events)?;
    timing.done();
    Ok(())
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::fs::create_dir_all;
use std::path::Path;
use clap::Parser;
use tracing::info;
use wtreco::{
    BoxErr,
    config::{read_config_file, Config},
    io,
    reco::{process_events, Reconstructor},
    stats::Summary,
    toy::{ToyConfig, ToyGenerator},
    utils::group_digits as g,
};
use cli::{Cli, Command};
use progress::Progress;
