use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::ols;
use crate::panel::Panel;

/// A simple correlation together with its two-sided significance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
    pub n: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationReport {
    pub pregame_won: Correlation,
    pub first_td_won: Correlation,
    pub ball_won: Correlation,

    pub pregame_first_td: f64,
    pub pregame_ball: f64,
    pub first_td_ball: f64,

    /// First TD vs win, controlling for pregame probability.
    pub first_td_partial_basic: f64,
    /// First TD vs win, controlling for pregame probability and opening possession.
    pub first_td_partial_controlled: f64,
    /// Opening possession vs win, controlling for pregame probability and first TD.
    pub ball_partial_controlled: f64,

    pub change: f64,
    pub stable: bool,
}

impl CorrelationReport {
    /// Change relative to the uncontrolled partial correlation, in percent.
    pub fn relative_change_pct(&self) -> f64 {
        self.change / self.first_td_partial_basic.abs() * 100.0
    }
}

/// Pearson correlation. Point-biserial correlation is the same quantity with one binary
/// argument. `NaN` when either side has no variance or the lengths differ.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 || y.len() != n {
        return f64::NAN;
    }
    let nf = n as f64;
    let mx = x.iter().sum::<f64>() / nf;
    let my = y.iter().sum::<f64>() / nf;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
}

pub fn correlation_test(x: &[f64], y: &[f64]) -> Correlation {
    let r = pearson(x, y);
    let n = x.len().min(y.len());
    Correlation {
        r,
        p_value: correlation_p_value(r, n),
        n,
    }
}

/// Two-sided p-value of `r` under the Student t distribution with `n - 2` degrees of
/// freedom.
pub fn correlation_p_value(r: f64, n: usize) -> f64 {
    if r.is_nan() || n < 3 {
        return f64::NAN;
    }
    let df = (n - 2) as f64;
    let denom = 1.0 - r * r;
    if denom <= 0.0 {
        return 0.0;
    }
    let t = r * (df / denom).sqrt();
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0),
        Err(_) => f64::NAN,
    }
}

/// Correlation of the OLS residuals of `x` and `y` after regressing each on an
/// intercept plus `controls`.
pub fn partial_correlation(x: &[f64], y: &[f64], controls: &[&[f64]]) -> f64 {
    match (ols::residuals(x, controls), ols::residuals(y, controls)) {
        (Some(rx), Some(ry)) => pearson(&rx, &ry),
        _ => f64::NAN,
    }
}

/// Closed-form first-order partial correlation of x and y given z.
pub fn first_order_partial(r_xy: f64, r_xz: f64, r_yz: f64) -> f64 {
    (r_xy - r_xz * r_yz) / ((1.0 - r_xz * r_xz) * (1.0 - r_yz * r_yz)).sqrt()
}

pub fn correlation_report(panel: &Panel, stability_threshold: f64) -> CorrelationReport {
    let pregame = panel.pregame();
    let won = panel.won();
    let td = panel.scored_first_td();
    let ball = panel.got_ball_first();

    let first_td_partial_basic = partial_correlation(&td, &won, &[&pregame]);
    let first_td_partial_controlled = partial_correlation(&td, &won, &[&pregame, &ball]);
    let ball_partial_controlled = partial_correlation(&ball, &won, &[&pregame, &td]);
    let change = first_td_partial_controlled - first_td_partial_basic;

    CorrelationReport {
        pregame_won: correlation_test(&won, &pregame),
        first_td_won: correlation_test(&td, &won),
        ball_won: correlation_test(&ball, &won),
        pregame_first_td: pearson(&td, &pregame),
        pregame_ball: pearson(&ball, &pregame),
        first_td_ball: pearson(&td, &ball),
        first_td_partial_basic,
        first_td_partial_controlled,
        ball_partial_controlled,
        change,
        stable: change.abs() < stability_threshold,
    }
}
