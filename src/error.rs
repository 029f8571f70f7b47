use std::path::PathBuf;

use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("input file not found: {} (generate the unified games dataset first)", path.display())]
    MissingInput { path: PathBuf },

    #[error("missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("failed reading {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("no usable team-game observations after removing missing values")]
    EmptyPanel,

    #[error("pregame probability {value} is outside the open interval (0, 1)")]
    InvalidGrid { value: f64 },

    #[error("failed to fit {model}: {reason}")]
    ModelFit { model: String, reason: FitFailure },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitFailure {
    #[error("did not converge after {iterations} iterations (max step {last_step:.3e})")]
    NotConverged { iterations: usize, last_step: f64 },

    #[error("design matrix is singular (rank {rank} < {columns} columns)")]
    Singular { rank: usize, columns: usize },

    #[error("non-finite values in the fitted coefficients")]
    NonFinite,

    #[error("need at least {needed} observations, got {got}")]
    TooFewObservations { needed: usize, got: usize },
}
