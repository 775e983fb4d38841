/// Command line interface for `wtreco` executable
#[derive(clap::Parser, Debug, Clone)]
#[clap(
    name = "wtreco",
    about = "Reconstruct single-top Wt-channel events",
)]
pub (super) struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[clap(long, global = true, default_value = "warn")]
    pub log_level: tracing::Level,

    #[clap(subcommand)]
    pub (super) command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub (super) enum Command {

    /// Reconstruct events read from a JSON file
    Run {
        /// JSON file containing an array of events
        events: PathBuf,

        /// TOML configuration; built-in defaults if absent
        #[clap(short, long)]
        config: Option<PathBuf>,

        /// JSON-lines output file, one line per event
        #[clap(short, long)]
        out: Option<PathBuf>,

        /// Maximum number of rayon threads
        #[clap(short = 'j', long, default_value = "4")]
        threads: usize,

        /// Number of events processed between progress updates
        #[clap(long, default_value = "1000")]
        chunk_size: usize,
    },

    /// Generate toy Monte Carlo Wt events, each carrying its generator truth
    Toy {
        /// Number of events to generate
        #[clap(short = 'n', long, default_value = "1000")]
        events: usize,

        /// Random number generator seed
        #[clap(long, default_value = "1")]
        seed: u64,

        /// Fraction of events in which the top decays leptonically
        #[clap(long, default_value = "0.5")]
        leptonic_fraction: f64,

        /// Use pole masses instead of Breit-Wigner distributed masses
        #[clap(long)]
        pole_masses: bool,

        /// JSON output file
        #[clap(short, long)]
        out: PathBuf,
    },

    /// Print the configuration which would be used
    ShowConfig {
        /// TOML configuration; built-in defaults if absent
        config: Option<PathBuf>,
    },
}

// ----- Imports -----------------------------------------------------------------------------------------
use std::path::PathBuf;
