use serde::Serialize;

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::{Covariates, FIRST_TD_X_PREGAME, FittedModel, ModelSuite, SCORED_FIRST_TD};

/// Pregame probabilities 0.05..=0.95 in 5-point steps (19 points).
pub fn coarse_grid() -> Vec<f64> {
    (1..=19).map(|i| f64::from(i * 5) / 100.0).collect()
}

/// Pregame probabilities 0.05..=0.95 in 1-point steps (91 points).
pub fn fine_grid() -> Vec<f64> {
    (5..=95).map(|i| f64::from(i) / 100.0).collect()
}

pub fn validate_grid(grid: &[f64]) -> AnalysisResult<()> {
    match grid.iter().find(|p| !(**p > 0.0 && **p < 1.0)) {
        Some(value) => Err(AnalysisError::InvalidGrid { value: *value }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarginalEffect {
    pub pregame_prob: f64,
    pub effect_got_ball: f64,
    pub effect_no_ball: f64,
    pub avg_effect: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WinProbabilityPoint {
    pub pregame_prob: f64,
    pub prob_no_first_td: f64,
    pub prob_with_first_td: f64,
    pub difference: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InteractionEffect {
    pub pregame_prob: f64,
    pub log_odds_effect: f64,
    pub odds_ratio: f64,
}

/// Win probability in percent without and with the first TD, at a fixed possession value.
fn win_pct_pair(model: &FittedModel, pregame_prob: f64, got_ball_first: f64) -> (f64, f64) {
    let at = |scored_first_td: f64| {
        model.predict(Covariates {
            pregame_prob,
            scored_first_td,
            got_ball_first,
        })
    };
    (at(0.0) * 100.0, at(1.0) * 100.0)
}

/// Marginal effects of the first TD under the selected model at each grid point.
pub fn marginal_effects(suite: &ModelSuite, grid: &[f64]) -> AnalysisResult<Vec<MarginalEffect>> {
    validate_grid(grid)?;
    let model = suite.best();
    Ok(grid
        .iter()
        .map(|&pregame_prob| {
            let (without_ball, with_ball) = win_pct_pair(model, pregame_prob, 1.0);
            let (without_no_ball, with_no_ball) = win_pct_pair(model, pregame_prob, 0.0);
            let effect_got_ball = with_ball - without_ball;
            let effect_no_ball = with_no_ball - without_no_ball;
            MarginalEffect {
                pregame_prob,
                effect_got_ball,
                effect_no_ball,
                avg_effect: (effect_got_ball + effect_no_ball) / 2.0,
            }
        })
        .collect())
}

/// Win probability with and without the first TD, averaging over opening possession by
/// fixing it at 0.5.
pub fn win_probability_curve(
    suite: &ModelSuite,
    grid: &[f64],
) -> AnalysisResult<Vec<WinProbabilityPoint>> {
    validate_grid(grid)?;
    let model = suite.best();
    Ok(grid
        .iter()
        .map(|&pregame_prob| {
            let (prob_no_first_td, prob_with_first_td) = win_pct_pair(model, pregame_prob, 0.5);
            WinProbabilityPoint {
                pregame_prob,
                prob_no_first_td,
                prob_with_first_td,
                difference: prob_with_first_td - prob_no_first_td,
            }
        })
        .collect())
}

/// Log-odds effect of the first TD, `b_td + b_inter * pregame`, from the interaction model
/// at 19 evenly spaced levels.
pub fn interaction_effects(suite: &ModelSuite) -> Vec<InteractionEffect> {
    let fit = &suite.interaction.fit;
    let main = fit.coefficient(SCORED_FIRST_TD).map_or(f64::NAN, |c| c.estimate);
    let inter = fit.coefficient(FIRST_TD_X_PREGAME).map_or(f64::NAN, |c| c.estimate);
    linspace(0.05, 0.95, 19)
        .into_iter()
        .map(|pregame_prob| {
            let log_odds_effect = main + inter * pregame_prob;
            InteractionEffect {
                pregame_prob,
                log_odds_effect,
                odds_ratio: log_odds_effect.exp(),
            }
        })
        .collect()
}

pub fn mean_avg_effect(rows: &[MarginalEffect]) -> f64 {
    if rows.is_empty() {
        return f64::NAN;
    }
    rows.iter().map(|r| r.avg_effect).sum::<f64>() / rows.len() as f64
}

/// Row whose grid point is within rounding of `pregame_prob`.
pub fn effect_at(rows: &[MarginalEffect], pregame_prob: f64) -> Option<&MarginalEffect> {
    rows.iter().find(|r| (r.pregame_prob - pregame_prob).abs() < 1e-9)
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n)
        .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn grids_have_expected_shape() {
        let coarse = coarse_grid();
        assert_eq!(coarse.len(), 19);
        assert_eq!(coarse[0], 0.05);
        assert_eq!(coarse[9], 0.5);
        assert_eq!(coarse[18], 0.95);

        let fine = fine_grid();
        assert_eq!(fine.len(), 91);
        assert_eq!(fine[45], 0.5);
        assert_eq!(*fine.last().unwrap(), 0.95);
    }

    #[test]
    fn grid_points_on_the_boundary_are_rejected() {
        assert!(validate_grid(&[0.2, 0.5]).is_ok());
        for bad in [0.0, 1.0, -0.1, f64::NAN] {
            let err = validate_grid(&[0.5, bad]).unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidGrid { .. }));
        }
    }

    #[test]
    fn linspace_hits_both_ends() {
        let points = linspace(0.05, 0.95, 19);
        assert_eq!(points.len(), 19);
        assert_abs_diff_eq!(points[9], 0.5, epsilon = 1e-12);
        assert_eq!(points[18], 0.95);
    }
}
