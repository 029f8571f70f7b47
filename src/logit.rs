use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use statrs::function::erf::erfc;

use crate::error::FitFailure;

const Z_975: f64 = 1.959_963_984_540_054;
const SEPARATION_TOL: f64 = 1e-6;
const PINV_REL_TOL: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct LogitOptions {
    pub max_iterations: usize,
    /// Converged once the largest absolute Newton step falls below this.
    pub tolerance: f64,
}

impl Default for LogitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 35,
            tolerance: 1e-8,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub z: f64,
    pub p_value: f64,
    pub ci_low: f64,
    pub ci_high: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogitFit {
    pub coefficients: Vec<Coefficient>,
    pub n_obs: usize,
    pub log_likelihood: f64,
    pub null_log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub pseudo_r2: f64,
    pub llr_p_value: f64,
    pub iterations: usize,
    pub converged: bool,
    /// The response was predicted perfectly; estimates are finite but not MLEs.
    pub perfect_separation: bool,
}

impl LogitFit {
    pub fn params(&self) -> Vec<f64> {
        self.coefficients.iter().map(|c| c.estimate).collect()
    }

    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Number of estimated coefficients, intercept included.
    pub fn k(&self) -> usize {
        self.coefficients.len()
    }

    /// Predicted probability for one design row laid out like the fitted columns.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let eta: f64 = self
            .coefficients
            .iter()
            .zip(row)
            .map(|(c, x)| c.estimate * x)
            .sum();
        sigmoid(eta)
    }
}

/// Maximum-likelihood logistic regression by Newton-Raphson.
///
/// `x` must already contain the intercept column. Newton steps are solved through the SVD
/// of the Hessian, so a rank-deficient design still produces a step; rank deficiency is
/// reported afterwards unless the data are perfectly separated.
pub fn fit_logit(
    names: &[&str],
    x: &DMatrix<f64>,
    y: &[f64],
    opts: LogitOptions,
) -> Result<LogitFit, FitFailure> {
    let n = x.nrows();
    let k = x.ncols();
    if n <= k || y.len() != n {
        return Err(FitFailure::TooFewObservations {
            needed: k + 1,
            got: n.min(y.len()),
        });
    }
    let target = DVector::from_column_slice(y);

    let mut beta = DVector::<f64>::zeros(k);
    let mut converged = false;
    let mut separated = false;
    let mut iterations = 0usize;
    let mut last_step = f64::INFINITY;

    for iter in 1..=opts.max_iterations.max(1) {
        iterations = iter;
        let p = fitted(x, &beta);
        if perfectly_predicted(&p, y) {
            separated = true;
            break;
        }
        let gradient = x.transpose() * (&target - &p);
        let hessian = information(x, &p);
        let step = solve_pinv(&hessian, &gradient).ok_or(FitFailure::Singular {
            rank: 0,
            columns: k,
        })?;
        beta += &step;
        if beta.iter().any(|b| !b.is_finite()) {
            return Err(FitFailure::NonFinite);
        }
        last_step = step.amax();
        if last_step < opts.tolerance {
            converged = true;
            break;
        }
    }

    let p = fitted(x, &beta);
    if !separated && perfectly_predicted(&p, y) {
        separated = true;
    }
    if !separated {
        let svd = x.clone().svd(false, false);
        let tol = PINV_REL_TOL * svd.singular_values.max().max(1.0) * (n as f64).sqrt();
        let rank = svd.rank(tol);
        if rank < k {
            return Err(FitFailure::Singular { rank, columns: k });
        }
        if !converged {
            return Err(FitFailure::NotConverged {
                iterations,
                last_step,
            });
        }
    }

    let cov = pseudo_inverse(&information(x, &p)).ok_or(FitFailure::Singular {
        rank: 0,
        columns: k,
    })?;

    let coefficients = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let estimate = beta[j];
            let std_error = cov[(j, j)].max(0.0).sqrt();
            let z = if std_error > 0.0 {
                estimate / std_error
            } else {
                f64::NAN
            };
            Coefficient {
                name: name.to_string(),
                estimate,
                std_error,
                z,
                p_value: two_sided_normal_p(z),
                ci_low: estimate - Z_975 * std_error,
                ci_high: estimate + Z_975 * std_error,
            }
        })
        .collect::<Vec<_>>();

    let eta = x * &beta;
    let log_likelihood = log_likelihood(&eta, y);
    let null_log_likelihood = null_log_likelihood(y);
    let kf = k as f64;
    let pseudo_r2 = if null_log_likelihood != 0.0 {
        1.0 - log_likelihood / null_log_likelihood
    } else {
        f64::NAN
    };
    let llr = 2.0 * (log_likelihood - null_log_likelihood);
    let llr_p_value = ChiSquared::new((k - 1).max(1) as f64)
        .map(|d| 1.0 - d.cdf(llr.max(0.0)))
        .unwrap_or(f64::NAN);

    Ok(LogitFit {
        coefficients,
        n_obs: n,
        log_likelihood,
        null_log_likelihood,
        aic: 2.0 * kf - 2.0 * log_likelihood,
        bic: kf * (n as f64).ln() - 2.0 * log_likelihood,
        pseudo_r2,
        llr_p_value,
        iterations,
        converged,
        perfect_separation: separated,
    })
}

pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

pub fn two_sided_normal_p(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    erfc(z.abs() / std::f64::consts::SQRT_2)
}

fn fitted(x: &DMatrix<f64>, beta: &DVector<f64>) -> DVector<f64> {
    (x * beta).map(sigmoid)
}

/// Observed information `X' W X` with `W = diag(p (1 - p))`.
fn information(x: &DMatrix<f64>, p: &DVector<f64>) -> DMatrix<f64> {
    let mut weighted = x.clone();
    for (i, mut row) in weighted.row_iter_mut().enumerate() {
        row *= p[i] * (1.0 - p[i]);
    }
    x.transpose() * weighted
}

fn solve_pinv(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = a.clone().svd(true, true);
    let tol = PINV_REL_TOL * svd.singular_values.max();
    svd.solve(b, tol).ok()
}

fn pseudo_inverse(a: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let svd = a.clone().svd(true, true);
    let tol = PINV_REL_TOL * svd.singular_values.max();
    svd.pseudo_inverse(tol).ok()
}

fn perfectly_predicted(p: &DVector<f64>, y: &[f64]) -> bool {
    p.iter().zip(y).all(|(p, y)| (p - y).abs() < SEPARATION_TOL)
}

fn log_likelihood(eta: &DVector<f64>, y: &[f64]) -> f64 {
    eta.iter().zip(y).map(|(e, y)| y * e - softplus(*e)).sum()
}

fn null_log_likelihood(y: &[f64]) -> f64 {
    let n = y.len() as f64;
    let mean = y.iter().sum::<f64>() / n;
    if mean <= 0.0 || mean >= 1.0 {
        return 0.0;
    }
    n * (mean * mean.ln() + (1.0 - mean) * (1.0 - mean).ln())
}

fn softplus(x: f64) -> f64 {
    if x > 0.0 {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn design(xs: &[f64]) -> DMatrix<f64> {
        DMatrix::from_fn(xs.len(), 2, |r, c| if c == 0 { 1.0 } else { xs[r] })
    }

    #[test]
    fn sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert_abs_diff_eq!(sigmoid(2.0) + sigmoid(-2.0), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn score_equations_hold_at_the_optimum() {
        let xs = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 0.35, 0.65, 0.55];
        let y = [0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 0.0];
        let x = design(&xs);
        let fit = fit_logit(&["const", "x"], &x, &y, LogitOptions::default()).unwrap();
        assert!(fit.converged);
        assert!(!fit.perfect_separation);

        let beta = DVector::from_vec(fit.params());
        let p = fitted(&x, &beta);
        let score = x.transpose() * (DVector::from_column_slice(&y) - p);
        for s in score.iter() {
            assert_abs_diff_eq!(*s, 0.0, epsilon = 1e-8);
        }
        assert!(fit.coefficient("x").unwrap().estimate > 0.0);
        assert!(fit.log_likelihood < 0.0);
        assert!(fit.log_likelihood > fit.null_log_likelihood);
        assert_abs_diff_eq!(fit.aic, 4.0 - 2.0 * fit.log_likelihood, epsilon = 1e-12);
    }

    #[test]
    fn intercept_only_matches_base_rate() {
        let y = [1.0, 1.0, 1.0, 0.0];
        let x = DMatrix::from_element(4, 1, 1.0);
        let fit = fit_logit(&["const"], &x, &y, LogitOptions::default()).unwrap();
        assert_abs_diff_eq!(fit.predict(&[1.0]), 0.75, epsilon = 1e-10);
        assert_abs_diff_eq!(fit.log_likelihood, fit.null_log_likelihood, epsilon = 1e-10);
    }

    #[test]
    fn collinear_columns_are_singular() {
        let xs = [0.1, 0.4, 0.2, 0.8, 0.6, 0.3, 0.9, 0.5];
        let y = [0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0];
        let x = DMatrix::from_fn(xs.len(), 3, |r, c| match c {
            0 => 1.0,
            1 => xs[r],
            _ => 2.0 * xs[r],
        });
        let err = fit_logit(&["const", "a", "b"], &x, &y, LogitOptions::default()).unwrap_err();
        assert!(matches!(err, FitFailure::Singular { rank: 2, columns: 3 }));
    }

    #[test]
    fn separated_data_is_flagged_not_failed() {
        let xs = [0.1, 0.2, 0.3, 0.7, 0.8, 0.9];
        let y = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let fit = fit_logit(&["const", "x"], &design(&xs), &y, LogitOptions::default()).unwrap();
        assert!(fit.perfect_separation);
        assert!(fit.coefficient("x").unwrap().estimate > 10.0);
    }

    #[test]
    fn too_few_rows() {
        let x = design(&[0.5]);
        let err = fit_logit(&["const", "x"], &x, &[1.0], LogitOptions::default()).unwrap_err();
        assert!(matches!(err, FitFailure::TooFewObservations { .. }));
    }

    #[test]
    fn normal_p_values() {
        assert_abs_diff_eq!(two_sided_normal_p(1.959_963_984_540_054), 0.05, epsilon = 1e-9);
        assert_abs_diff_eq!(two_sided_normal_p(0.0), 1.0, epsilon = 1e-12);
    }
}
