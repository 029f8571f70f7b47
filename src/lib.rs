pub mod config;
pub mod correlation;
pub mod effects;
pub mod error;
pub mod export;
pub mod games;
pub mod logit;
pub mod market;
pub mod models;
pub mod odds;
pub mod ols;
pub mod panel;
pub mod pipeline;
pub mod report;
pub mod strata;
pub mod synthetic;

pub use error::{AnalysisError, AnalysisResult, FitFailure};
