//! Crate-wide error type.
//!
//! Every variant maps onto a process exit code so the binary can report
//! failures the same way regardless of which stage produced them.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, CalibError>;

#[derive(Debug, Error)]
pub enum CalibError {
    /// Invalid scan/correction configuration or CLI input.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input tables or histograms that cannot be used (no bins, no positive
    /// probability mass, mismatched vector lengths, ...).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A correction parameter vector with the wrong number of coefficients.
    #[error("{name} requires {expected} parameters, but {actual} were passed")]
    ParameterLength {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// vz or luminosity correction parameters were never supplied.
    #[error("missing correction parameters: {0}")]
    MissingCorrection(String),

    /// A numerical failure with no documented fallback.
    #[error("numerical error: {0}")]
    Numerical(String),

    /// A file that could not be opened or created.
    #[error("cannot access '{}': {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl CalibError {
    /// Attach the offending path to an I/O failure.
    pub fn file(path: &Path, source: std::io::Error) -> Self {
        CalibError::File {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            CalibError::InvalidConfig(_)
            | CalibError::File { .. }
            | CalibError::Io(_)
            | CalibError::Json(_)
            | CalibError::Csv(_) => 2,
            CalibError::MalformedInput(_) => 3,
            CalibError::ParameterLength { .. } | CalibError::MissingCorrection(_) => 4,
            CalibError::Numerical(_) => 5,
        }
    }
}
