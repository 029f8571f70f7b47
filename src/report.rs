use std::fmt::Write as _;

use crate::correlation::CorrelationReport;
use crate::effects::{effect_at, mean_avg_effect};
use crate::models::{FittedModel, ModelSpec};
use crate::pipeline::AnalysisRun;

const RULE: &str = "================================================================================";
const THIN: &str = "--------------------------------------------------------------------------------";

/// Regression table for one fitted model, laid out like a statsmodels `Logit` summary.
pub fn model_table(model: &FittedModel) -> String {
    let fit = &model.fit;
    let mut out = String::new();
    let df_model = fit.k().saturating_sub(1);
    let df_resid = fit.n_obs.saturating_sub(fit.k());

    let _ = writeln!(out, "{:^78}", "Logit Regression Results");
    let _ = writeln!(out, "{}", &RULE[..78]);
    let _ = writeln!(
        out,
        "{:<16}{:>22}   {:<20}{:>17}",
        "Dep. Variable:", "won", "No. Observations:", fit.n_obs
    );
    let _ = writeln!(
        out,
        "{:<16}{:>22}   {:<20}{:>17}",
        "Model:", model.spec.label(), "Df Residuals:", df_resid
    );
    let _ = writeln!(
        out,
        "{:<16}{:>22}   {:<20}{:>17}",
        "Method:", "MLE", "Df Model:", df_model
    );
    let _ = writeln!(
        out,
        "{:<16}{:>22}   {:<20}{:>17.4}",
        "Converged:",
        if fit.converged { "True" } else { "False" },
        "Pseudo R-squ.:",
        fit.pseudo_r2
    );
    let _ = writeln!(
        out,
        "{:<16}{:>22.2}   {:<20}{:>17.2}",
        "Log-Likelihood:", fit.log_likelihood, "LL-Null:", fit.null_log_likelihood
    );
    let _ = writeln!(
        out,
        "{:<16}{:>22.2}   {:<20}{:>17.4e}",
        "AIC:", fit.aic, "LLR p-value:", fit.llr_p_value
    );
    let _ = writeln!(out, "{:<16}{:>22.2}", "BIC:", fit.bic);
    let _ = writeln!(out, "{}", &RULE[..78]);
    let _ = writeln!(
        out,
        "{:<20}{:>9}{:>11}{:>10}{:>9}{:>10}{:>10}",
        "", "coef", "std err", "z", "P>|z|", "[0.025", "0.975]"
    );
    let _ = writeln!(out, "{}", &THIN[..78]);
    for c in &fit.coefficients {
        let _ = writeln!(
            out,
            "{:<20}{:>9.4}{:>11.3}{:>10.3}{:>9.3}{:>10.3}{:>10.3}",
            c.name, c.estimate, c.std_error, c.z, c.p_value, c.ci_low, c.ci_high
        );
    }
    let _ = writeln!(out, "{}", &RULE[..78]);
    if fit.perfect_separation {
        let _ = writeln!(
            out,
            "Possibly complete quasi-separation: the response is perfectly predicted and"
        );
        let _ = writeln!(out, "some parameters are not identified.");
    }
    out
}

pub fn model_comparison(run: &AnalysisRun) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "MODEL COMPARISON (ALL THREE MODELS)");
    let _ = writeln!(out, "{RULE}");
    for spec in ModelSpec::ALL {
        let fit = &run.suite.get(spec).fit;
        let _ = writeln!(
            out,
            "{:<24}AIC = {:.2}, BIC = {:.2}, Pseudo R² = {:.4}",
            format!("{}:", spec.label()),
            fit.aic,
            fit.bic,
            fit.pseudo_r2
        );
    }
    let p = run.suite.interaction_p_value();
    let _ = writeln!(out);
    let _ = writeln!(out, "Best Model (lowest AIC): {}", run.suite.selected.label());
    let significant = if p < run.settings.significance {
        format!("Yes (p < {})", run.settings.significance)
    } else {
        format!("No (p ≥ {})", run.settings.significance)
    };
    let _ = writeln!(out, "Interaction Term Significant: {significant}");
    let _ = writeln!(out, "Interaction Term p-value: {p:.4}");
    out
}

pub fn correlation_block(c: &CorrelationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "CORRELATION ANALYSIS");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "SIMPLE CORRELATIONS (No Controls):");
    let _ = writeln!(out, "{THIN}");
    let _ = writeln!(
        out,
        "Pregame Prob → Win:        r = {:.4} (p = {:.3e})",
        c.pregame_won.r, c.pregame_won.p_value
    );
    let _ = writeln!(
        out,
        "Scored First TD → Win:     r = {:.4} (p = {:.3e})",
        c.first_td_won.r, c.first_td_won.p_value
    );
    let _ = writeln!(
        out,
        "Got Ball First → Win:      r = {:.4} (p = {:.3})",
        c.ball_won.r, c.ball_won.p_value
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Correlations between predictors:");
    let _ = writeln!(out, "Pregame Prob → First TD:   r = {:.4}", c.pregame_first_td);
    let _ = writeln!(out, "Pregame Prob → Got Ball:   r = {:.4}", c.pregame_ball);
    let _ = writeln!(out, "First TD ↔ Got Ball:       r = {:.4}", c.first_td_ball);
    let _ = writeln!(out);
    let _ = writeln!(out, "PARTIAL CORRELATIONS (Controlling for Other Variables):");
    let _ = writeln!(out, "{THIN}");
    let _ = writeln!(
        out,
        "First TD → Win (controlling for pregame only):          r = {:.4}",
        c.first_td_partial_basic
    );
    let _ = writeln!(
        out,
        "First TD → Win (controlling for pregame + got ball):    r = {:.4}",
        c.first_td_partial_controlled
    );
    let _ = writeln!(
        out,
        "Got Ball → Win (controlling for pregame + first TD):    r = {:.4}",
        c.ball_partial_controlled
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "KEY FINDING:");
    let _ = writeln!(out, "{THIN}");
    let _ = writeln!(
        out,
        "Change: {:+.4} ({:+.1}%)",
        c.change,
        c.relative_change_pct()
    );
    if c.stable {
        let _ = writeln!(
            out,
            "Effect is STABLE - opening possession doesn't confound first TD impact"
        );
    } else {
        let _ = writeln!(
            out,
            "Effect changes by {:.4} - opening possession was confounding the analysis",
            c.change.abs()
        );
    }
    out
}

pub fn strength_of_first_td(r: f64) -> &'static str {
    if r.abs() > 0.3 {
        "STRONG"
    } else if r.abs() > 0.2 {
        "MODERATE"
    } else {
        "WEAK"
    }
}

pub fn strength_of_possession(r: f64) -> &'static str {
    if r.abs() < 0.1 {
        "WEAK"
    } else if r.abs() < 0.2 {
        "MODERATE"
    } else {
        "STRONG"
    }
}

pub fn interpretation(run: &AnalysisRun) -> String {
    let c = &run.correlations;
    let effects = &run.marginal_coarse;
    let at = |p: f64| effect_at(effects, p).map_or(f64::NAN, |r| r.avg_effect);
    let robustness = if c.stable { "ROBUST" } else { "SOMEWHAT INFLUENCED" };
    let comparison = if c.first_td_partial_controlled > c.first_td_partial_basic {
        "STRONGER THAN"
    } else if c.change.abs() < run.settings.stability_threshold {
        "SIMILAR TO"
    } else {
        "WEAKER THAN"
    };

    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Key Findings (Correlations):");
    let _ = writeln!(out, "1. Simple First TD correlation: r = {:.4}", c.first_td_won.r);
    let _ = writeln!(
        out,
        "2. Partial First TD correlation (controlling for pregame only): r = {:.4}",
        c.first_td_partial_basic
    );
    let _ = writeln!(
        out,
        "3. Partial First TD correlation (controlling for pregame + ball): r = {:.4}",
        c.first_td_partial_controlled
    );
    let _ = writeln!(
        out,
        "4. Change from adding opening possession control: {:+.4}",
        c.change
    );
    let _ = writeln!(out, "5. Opening possession simple correlation: r = {:.4}", c.ball_won.r);
    let _ = writeln!(
        out,
        "6. Opening possession partial correlation (controlled): r = {:.4}",
        c.ball_partial_controlled
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Key Findings (Marginal Effects - Percentage Points):");
    let _ = writeln!(
        out,
        "- Average effect of first TD across all pregame odds: {:.1}pp",
        mean_avg_effect(effects)
    );
    let _ = writeln!(out, "- Effect at 20% pregame odds: {:.1}pp", at(0.20));
    let _ = writeln!(out, "- Effect at 50% pregame odds: {:.1}pp", at(0.50));
    let _ = writeln!(out, "- Effect at 80% pregame odds: {:.1}pp", at(0.80));
    let _ = writeln!(out);
    let _ = writeln!(out, "Interpretation:");
    let _ = writeln!(
        out,
        "- The first TD effect is {robustness} when controlling for opening possession"
    );
    let _ = writeln!(
        out,
        "- First TD partial correlation remains {} (r = {:.4}) after controlling for both factors",
        strength_of_first_td(c.first_td_partial_controlled),
        c.first_td_partial_controlled
    );
    let _ = writeln!(
        out,
        "- Opening possession has a {} independent effect (r = {:.4})",
        strength_of_possession(c.ball_partial_controlled),
        c.ball_partial_controlled
    );
    let _ = writeln!(
        out,
        "- Controlled first TD correlation (r = {:.4}) is {comparison} the effect without the possession control",
        c.first_td_partial_controlled
    );
    out
}

/// Full text for `model_summaries.txt`.
pub fn model_summaries(run: &AnalysisRun) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "NFL FIRST TD ANALYSIS - MODEL SUMMARIES");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out);
    if let Some(span) = run.season_span() {
        let _ = writeln!(out, "Data: {span} NFL Games");
    }
    let _ = writeln!(out, "Total Games: {}", run.complete_games);
    let _ = writeln!(out, "Total Team-Game Observations: {}", run.panel.len());
    if run.insufficient_data {
        let _ = writeln!(
            out,
            "WARNING: fewer than {} games available; results may be unreliable.",
            run.settings.min_games
        );
    }
    let _ = writeln!(out);

    for spec in ModelSpec::ALL {
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "{}", spec.title());
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "{}", model_table(run.suite.get(spec)));
    }
    out.push_str(&model_comparison(run));
    let _ = writeln!(out);
    out.push_str(&correlation_block(&run.correlations));
    let _ = writeln!(out);
    out.push_str(&interpretation(run));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_labels_follow_thresholds() {
        assert_eq!(strength_of_first_td(0.35), "STRONG");
        assert_eq!(strength_of_first_td(-0.25), "MODERATE");
        assert_eq!(strength_of_first_td(0.2), "WEAK");
        assert_eq!(strength_of_possession(0.05), "WEAK");
        assert_eq!(strength_of_possession(0.15), "MODERATE");
        assert_eq!(strength_of_possession(-0.2), "STRONG");
    }
}
