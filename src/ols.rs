use nalgebra::{DMatrix, DVector};

const RANK_TOL: f64 = 1e-12;

/// Design matrix with a leading intercept column followed by `columns`.
pub fn design_with_intercept(n: usize, columns: &[&[f64]]) -> DMatrix<f64> {
    DMatrix::from_fn(n, columns.len() + 1, |row, col| {
        if col == 0 { 1.0 } else { columns[col - 1][row] }
    })
}

/// Least-squares coefficients of `y` on an intercept plus `controls`.
///
/// Uses the SVD so that collinear controls resolve to the minimum-norm solution instead
/// of failing.
pub fn fit(y: &[f64], controls: &[&[f64]]) -> Option<DVector<f64>> {
    let n = y.len();
    if n == 0 || controls.iter().any(|c| c.len() != n) {
        return None;
    }
    let x = design_with_intercept(n, controls);
    let target = DVector::from_column_slice(y);
    let svd = x.svd(true, true);
    let tol = RANK_TOL * svd.singular_values.max().max(1.0);
    svd.solve(&target, tol).ok()
}

/// Residuals of `y` after an OLS regression on an intercept plus `controls`.
///
/// With no controls this is `y` centred on its mean.
pub fn residuals(y: &[f64], controls: &[&[f64]]) -> Option<Vec<f64>> {
    let beta = fit(y, controls)?;
    let x = design_with_intercept(y.len(), controls);
    let fitted = x * beta;
    Some(y.iter().zip(fitted.iter()).map(|(obs, hat)| obs - hat).collect())
}
