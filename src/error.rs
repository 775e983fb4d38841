//! Error types for Wt reconstruction jobs

use std::path::PathBuf;

use thiserror::Error;

use crate::fit::FitError;

/// Fatal conditions which abort a reconstruction job.
///
/// Per-event rejections and per-combination fit failures are *not* errors: they
/// are ordinary values (`selection::Rejection`, `fit::FitStatus`).
#[derive(Error, Debug)]
pub enum Error {
    /// Corrupted fit input detected by the constrained fit
    #[error("Constrained fit failed in event {run}/{event}: {source}")]
    Fit {
        run: u32,
        event: u64,
        #[source]
        source: FitError,
    },

    /// Jet multiplicity outside the configured range during histogram classification
    #[error("Jet multiplicity {n_jets} in event {run}/{event} is outside the configured jet bins [{min}, {max}]")]
    JetBinOutOfRange { run: u32, event: u64, n_jets: usize, min: usize, max: usize },

    /// I/O error
    #[error("I/O error on `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parsing error
    #[error("Couldn't parse config file `{}`: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Configuration which parses but makes no sense
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
