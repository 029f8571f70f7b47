use nalgebra::DMatrix;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AnalysisError, AnalysisResult};
use crate::logit::{LogitFit, LogitOptions, fit_logit};
use crate::panel::{Panel, TeamObservation};

pub const CONST: &str = "const";
pub const PREGAME_PROB: &str = "pregame_prob";
pub const SCORED_FIRST_TD: &str = "scored_first_td";
pub const GOT_BALL_FIRST: &str = "got_ball_first";
pub const FIRST_TD_X_PREGAME: &str = "first_td_x_pregame";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelSpec {
    Basic,
    Controlled,
    Interaction,
}

impl ModelSpec {
    pub const ALL: [ModelSpec; 3] = [ModelSpec::Basic, ModelSpec::Controlled, ModelSpec::Interaction];

    pub fn label(self) -> &'static str {
        match self {
            ModelSpec::Basic => "Model 1 (Basic)",
            ModelSpec::Controlled => "Model 2 (Controlled)",
            ModelSpec::Interaction => "Model 3 (Interaction)",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ModelSpec::Basic => "MODEL 1: BASIC (No Controls)",
            ModelSpec::Controlled => "MODEL 2: CONTROLLED (Adding Opening Possession)",
            ModelSpec::Interaction => {
                "MODEL 3: WITH INTERACTION TERM (scored_first_td × pregame_prob)"
            }
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            ModelSpec::Basic => &[CONST, PREGAME_PROB, SCORED_FIRST_TD],
            ModelSpec::Controlled => &[CONST, PREGAME_PROB, SCORED_FIRST_TD, GOT_BALL_FIRST],
            ModelSpec::Interaction => &[
                CONST,
                PREGAME_PROB,
                SCORED_FIRST_TD,
                GOT_BALL_FIRST,
                FIRST_TD_X_PREGAME,
            ],
        }
    }

    /// Design row for the given covariates. The interaction column is always derived as
    /// `scored_first_td * pregame_prob`.
    pub fn row(self, c: Covariates) -> Vec<f64> {
        let mut row = vec![1.0, c.pregame_prob, c.scored_first_td];
        if self != ModelSpec::Basic {
            row.push(c.got_ball_first);
        }
        if self == ModelSpec::Interaction {
            row.push(c.scored_first_td * c.pregame_prob);
        }
        row
    }

    pub fn design(self, observations: &[TeamObservation]) -> DMatrix<f64> {
        let k = self.columns().len();
        let rows: Vec<Vec<f64>> = observations
            .iter()
            .map(|o| self.row(Covariates::from(o)))
            .collect();
        DMatrix::from_fn(rows.len(), k, |r, c| rows[r][c])
    }
}

/// Covariate values for one prediction. Possession may be fractional (0.5 averages over
/// both possession states).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Covariates {
    pub pregame_prob: f64,
    pub scored_first_td: f64,
    pub got_ball_first: f64,
}

impl From<&TeamObservation> for Covariates {
    fn from(o: &TeamObservation) -> Self {
        Self {
            pregame_prob: o.pregame_prob,
            scored_first_td: o.scored_first_td_f64(),
            got_ball_first: o.got_ball_first_f64(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FittedModel {
    pub spec: ModelSpec,
    pub fit: LogitFit,
}

impl FittedModel {
    pub fn predict(&self, c: Covariates) -> f64 {
        self.fit.predict(&self.spec.row(c))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSuite {
    pub basic: FittedModel,
    pub controlled: FittedModel,
    pub interaction: FittedModel,
    pub selected: ModelSpec,
}

impl ModelSuite {
    pub fn get(&self, spec: ModelSpec) -> &FittedModel {
        match spec {
            ModelSpec::Basic => &self.basic,
            ModelSpec::Controlled => &self.controlled,
            ModelSpec::Interaction => &self.interaction,
        }
    }

    pub fn best(&self) -> &FittedModel {
        self.get(self.selected)
    }

    pub fn interaction_p_value(&self) -> f64 {
        self.interaction
            .fit
            .coefficient(FIRST_TD_X_PREGAME)
            .map(|c| c.p_value)
            .unwrap_or(f64::NAN)
    }
}

pub fn fit_model(panel: &Panel, spec: ModelSpec, opts: LogitOptions) -> AnalysisResult<FittedModel> {
    let x = spec.design(panel.observations());
    let y = panel.won();
    let fit = fit_logit(spec.columns(), &x, &y, opts).map_err(|reason| AnalysisError::ModelFit {
        model: spec.label().to_string(),
        reason,
    })?;
    if fit.perfect_separation {
        warn!(
            model = spec.label(),
            "perfect separation detected; coefficients are not identified"
        );
    }
    info!(
        model = spec.label(),
        aic = fit.aic,
        pseudo_r2 = fit.pseudo_r2,
        iterations = fit.iterations,
        "model fitted"
    );
    Ok(FittedModel { spec, fit })
}

/// Fits all three specifications; any failure aborts the suite.
pub fn fit_suite(panel: &Panel, opts: LogitOptions) -> AnalysisResult<ModelSuite> {
    let basic = fit_model(panel, ModelSpec::Basic, opts)?;
    let controlled = fit_model(panel, ModelSpec::Controlled, opts)?;
    let interaction = fit_model(panel, ModelSpec::Interaction, opts)?;
    let selected = select_by_aic(&controlled, &interaction);
    info!(selected = selected.label(), "best model by AIC");
    Ok(ModelSuite {
        basic,
        controlled,
        interaction,
        selected,
    })
}

/// The interaction model wins only with a strictly lower AIC.
pub fn select_by_aic(controlled: &FittedModel, interaction: &FittedModel) -> ModelSpec {
    if interaction.fit.aic < controlled.fit.aic {
        ModelSpec::Interaction
    } else {
        ModelSpec::Controlled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_follow_column_layout() {
        let c = Covariates {
            pregame_prob: 0.4,
            scored_first_td: 1.0,
            got_ball_first: 0.5,
        };
        assert_eq!(ModelSpec::Basic.row(c), vec![1.0, 0.4, 1.0]);
        assert_eq!(ModelSpec::Controlled.row(c), vec![1.0, 0.4, 1.0, 0.5]);
        assert_eq!(ModelSpec::Interaction.row(c), vec![1.0, 0.4, 1.0, 0.5, 0.4]);
        for spec in ModelSpec::ALL {
            assert_eq!(spec.row(c).len(), spec.columns().len());
        }
    }

    #[test]
    fn interaction_column_is_zero_without_first_td() {
        let c = Covariates {
            pregame_prob: 0.8,
            scored_first_td: 0.0,
            got_ball_first: 1.0,
        };
        assert_eq!(ModelSpec::Interaction.row(c)[4], 0.0);
    }
}
