use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::{AnalysisError, AnalysisResult};
use crate::logit::LogitOptions;

pub const DEFAULT_INPUT: &str = "results/data/nfl_unified_data.csv";
pub const DEFAULT_OUTPUT_DIR: &str = "results/analysis";
pub const DEFAULT_MARKET_INPUT: &str = "results/data/kalshi_market_data.csv";
pub const DEFAULT_MARKET_OUTPUT_DIR: &str = "results/data";

/// First-touchdown win impact analysis for NFL games
#[derive(Parser, Debug, Clone)]
#[command(name = "first-td", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fit the win models and export effects, correlations and tier tables
    Analyze(AnalyzeArgs),
    /// Compare Kalshi pregame prices against Vegas odds
    Market(MarketArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Unified games CSV
    #[arg(long, env = "FIRST_TD_INPUT", default_value = DEFAULT_INPUT)]
    pub input: PathBuf,

    /// Directory receiving every analysis artifact
    #[arg(long, env = "FIRST_TD_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// |change| in the first-TD partial correlation below which the effect counts as stable
    #[arg(long, env = "FIRST_TD_STABILITY_THRESHOLD", default_value = "0.01")]
    pub stability_threshold: f64,

    /// Minimum observations in a pregame tier before its correlations are reported
    #[arg(long, env = "FIRST_TD_MIN_TIER_OBS", default_value = "50")]
    pub min_tier_observations: usize,

    /// Usable games below which the run is flagged as unreliable
    #[arg(long, env = "FIRST_TD_MIN_GAMES", default_value = "100")]
    pub min_games: usize,

    /// Significance level for the interaction term
    #[arg(long, env = "FIRST_TD_SIGNIFICANCE", default_value = "0.05")]
    pub significance: f64,

    /// Newton-Raphson iteration cap per model
    #[arg(long, env = "FIRST_TD_MAX_ITER", default_value = "35")]
    pub max_iterations: usize,

    /// Skip the xlsx workbook
    #[arg(long, default_value = "false")]
    pub no_workbook: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MarketArgs {
    /// Unified games CSV
    #[arg(long, env = "FIRST_TD_INPUT", default_value = DEFAULT_INPUT)]
    pub games: PathBuf,

    /// Kalshi market CSV produced by the fetch step
    #[arg(long, env = "FIRST_TD_MARKET_INPUT", default_value = DEFAULT_MARKET_INPUT)]
    pub market: PathBuf,

    #[arg(long, env = "FIRST_TD_MARKET_OUTPUT_DIR", default_value = DEFAULT_MARKET_OUTPUT_DIR)]
    pub output_dir: PathBuf,
}

/// Knobs for one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSettings {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub stability_threshold: f64,
    pub min_tier_observations: usize,
    pub min_games: usize,
    pub significance: f64,
    pub max_iterations: usize,
    pub write_workbook: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            stability_threshold: 0.01,
            min_tier_observations: 50,
            min_games: 100,
            significance: 0.05,
            max_iterations: 35,
            write_workbook: true,
        }
    }
}

impl AnalysisSettings {
    pub fn validate(&self) -> AnalysisResult<()> {
        if !(self.stability_threshold.is_finite() && self.stability_threshold >= 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "stability threshold must be a non-negative number, got {}",
                self.stability_threshold
            )));
        }
        if !(self.significance > 0.0 && self.significance < 1.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "significance must lie in (0, 1), got {}",
                self.significance
            )));
        }
        if self.max_iterations == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max iterations must be at least 1".to_string(),
            ));
        }
        if self.min_tier_observations < 3 {
            return Err(AnalysisError::InvalidConfig(format!(
                "tier correlations need at least 3 observations, got {}",
                self.min_tier_observations
            )));
        }
        Ok(())
    }

    pub fn logit_options(&self) -> LogitOptions {
        LogitOptions {
            max_iterations: self.max_iterations,
            ..LogitOptions::default()
        }
    }
}

impl From<AnalyzeArgs> for AnalysisSettings {
    fn from(args: AnalyzeArgs) -> Self {
        Self {
            input: args.input,
            output_dir: args.output_dir,
            stability_threshold: args.stability_threshold,
            min_tier_observations: args.min_tier_observations,
            min_games: args.min_games,
            significance: args.significance,
            max_iterations: args.max_iterations,
            write_workbook: !args.no_workbook,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AnalysisSettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_knobs() {
        let bad_sig = AnalysisSettings {
            significance: 1.5,
            ..AnalysisSettings::default()
        };
        assert!(matches!(bad_sig.validate(), Err(AnalysisError::InvalidConfig(_))));

        let bad_threshold = AnalysisSettings {
            stability_threshold: -0.1,
            ..AnalysisSettings::default()
        };
        assert!(bad_threshold.validate().is_err());
    }

    #[test]
    fn cli_parses_analyze_flags() {
        let cli = Cli::try_parse_from([
            "first-td",
            "analyze",
            "--input",
            "games.csv",
            "--stability-threshold",
            "0.02",
            "--no-workbook",
        ])
        .expect("valid args");
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        let settings = AnalysisSettings::from(args);
        assert_eq!(settings.input, PathBuf::from("games.csv"));
        assert_eq!(settings.stability_threshold, 0.02);
        assert!(!settings.write_workbook);
    }
}
