use tracing::{info, warn};

use crate::config::AnalysisSettings;
use crate::correlation::{CorrelationReport, correlation_report};
use crate::effects::{
    InteractionEffect, MarginalEffect, WinProbabilityPoint, coarse_grid, fine_grid,
    interaction_effects, marginal_effects, win_probability_curve,
};
use crate::error::AnalysisResult;
use crate::games::{GameRecord, load_games};
use crate::models::{ModelSuite, fit_suite};
use crate::panel::{Panel, build_panel};
use crate::strata::{TierCorrelation, TierSummary, tier_correlations, tier_summaries};

/// Everything computed by one analysis run, ready for export.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub settings: AnalysisSettings,
    pub games_loaded: usize,
    /// Games with both probabilities and every outcome column present.
    pub complete_games: usize,
    pub insufficient_data: bool,
    pub panel: Panel,
    pub suite: ModelSuite,
    pub correlations: CorrelationReport,
    pub marginal_coarse: Vec<MarginalEffect>,
    pub marginal_fine: Vec<MarginalEffect>,
    pub win_prob_coarse: Vec<WinProbabilityPoint>,
    pub win_prob_fine: Vec<WinProbabilityPoint>,
    /// Present only when the interaction term is significant.
    pub interaction: Option<Vec<InteractionEffect>>,
    pub tiers: Vec<TierSummary>,
    pub tier_correlations: Vec<TierCorrelation>,
}

impl AnalysisRun {
    /// "2020-2024" style season range of the panel, if seasons are known.
    pub fn season_span(&self) -> Option<String> {
        let seasons = self.panel.observations().iter().filter_map(|o| o.season);
        let (lo, hi) = seasons.fold(None, |acc: Option<(i32, i32)>, s| match acc {
            None => Some((s, s)),
            Some((lo, hi)) => Some((lo.min(s), hi.max(s))),
        })?;
        Some(if lo == hi {
            lo.to_string()
        } else {
            format!("{lo}-{hi}")
        })
    }
}

/// Loads the configured input and runs the full analysis.
pub fn analyze(settings: &AnalysisSettings) -> AnalysisResult<AnalysisRun> {
    settings.validate()?;
    let table = load_games(&settings.input)?;
    info!(
        path = %table.path.display(),
        rows = table.games.len(),
        "loaded unified games"
    );
    analyze_games(&table.games, settings)
}

pub fn analyze_games(games: &[GameRecord], settings: &AnalysisSettings) -> AnalysisResult<AnalysisRun> {
    settings.validate()?;
    let complete_games = games.iter().filter(|g| g.is_complete()).count();
    let insufficient_data = complete_games < settings.min_games;
    if insufficient_data {
        warn!(
            games = complete_games,
            min_games = settings.min_games,
            "few games with complete data; results may be unreliable"
        );
    }

    let panel = build_panel(games)?;
    info!(
        observations = panel.len(),
        games = panel.games_used(),
        "built team-game panel"
    );

    let suite = fit_suite(&panel, settings.logit_options())?;
    let correlations = correlation_report(&panel, settings.stability_threshold);
    info!(
        partial_basic = correlations.first_td_partial_basic,
        partial_controlled = correlations.first_td_partial_controlled,
        change = correlations.change,
        stable = correlations.stable,
        "first TD partial correlations"
    );

    let coarse = coarse_grid();
    let fine = fine_grid();
    let marginal_coarse = marginal_effects(&suite, &coarse)?;
    let marginal_fine = marginal_effects(&suite, &fine)?;
    let win_prob_coarse = win_probability_curve(&suite, &coarse)?;
    let win_prob_fine = win_probability_curve(&suite, &fine)?;

    let interaction_p = suite.interaction_p_value();
    let interaction = (interaction_p < settings.significance).then(|| {
        info!(p = interaction_p, "interaction term is significant");
        interaction_effects(&suite)
    });

    let tiers = tier_summaries(&panel);
    let tier_correlations = tier_correlations(&panel, settings.min_tier_observations);
    info!(tiers = tier_correlations.len(), "tier correlations computed");

    Ok(AnalysisRun {
        settings: settings.clone(),
        games_loaded: games.len(),
        complete_games,
        insufficient_data,
        panel,
        suite,
        correlations,
        marginal_coarse,
        marginal_fine,
        win_prob_coarse,
        win_prob_fine,
        interaction,
        tiers,
        tier_correlations,
    })
}
