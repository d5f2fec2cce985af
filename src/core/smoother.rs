//! Robust local regression smoothing of equally spaced sequences.
//!
//! Each output sample is a weighted polynomial fit over a fixed-size window of
//! neighbours (tricube distance weights). Robustness iterations reweight the
//! fit with Tukey's bisquare on residuals scaled by six times their median
//! absolute value, so isolated spikes stop pulling the curve.

use crate::types::{SmileError, SmileResult};
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Bisquare tuning constant, applied to the median absolute residual
const BISQUARE_C: f64 = 6.0;

/// Below this fraction of the mean absolute residual the median is too small
/// to scale residuals, and the mean is used instead
const SCALE_THRESHOLD: f64 = 1.0e-7;

/// Highest supported polynomial degree
const MAX_DEGREE: usize = 2;

/// Fills `z` with a smoothed version of `y`
pub trait Smoother: Send + Sync {
    fn smooth(&self, y: &[f64], z: &mut [f64]) -> SmileResult<()>;
}

/// Local regression parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalRegressionParams {
    /// Polynomial degree of each local fit (0, 1 or 2)
    pub degree: usize,
    /// Number of samples in each local window
    pub order: usize,
    /// Number of robustness iterations after the initial fit
    pub iterations: usize,
}

impl Default for LocalRegressionParams {
    fn default() -> Self {
        Self {
            degree: 2,
            order: 15,
            iterations: 2,
        }
    }
}

impl LocalRegressionParams {
    /// Settings used to smooth the column-shift sequence
    pub fn column_shifts() -> Self {
        Self {
            degree: 0,
            order: 27,
            iterations: 2,
        }
    }
}

/// Robust LOWESS-style smoother over sample index
#[derive(Debug, Clone)]
pub struct LocalRegressionSmoother {
    params: LocalRegressionParams,
}

impl LocalRegressionSmoother {
    pub fn new(params: LocalRegressionParams) -> SmileResult<Self> {
        if params.degree > MAX_DEGREE {
            return Err(SmileError::InvalidInput(format!(
                "Local regression degree {} exceeds {}",
                params.degree, MAX_DEGREE
            )));
        }
        if params.order == 0 {
            return Err(SmileError::InvalidInput(
                "Local regression order must be positive".to_string(),
            ));
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &LocalRegressionParams {
        &self.params
    }

    /// Smooth `y` into `z`, generic over the float type
    pub fn smooth_values<T: Float>(&self, y: &[T], z: &mut [T]) -> SmileResult<()> {
        if y.len() != z.len() {
            return Err(SmileError::DimensionMismatch {
                expected: y.len(),
                actual: z.len(),
            });
        }
        let n = y.len();
        if n == 0 {
            return Ok(());
        }

        let span = self.params.order.min(n);
        let mut robustness = vec![T::one(); n];
        let mut residuals = vec![T::zero(); n];

        for iteration in 0..=self.params.iterations {
            for i in 0..n {
                z[i] = self.fit_at(y, &robustness, i, span);
            }
            if iteration == self.params.iterations {
                break;
            }

            for i in 0..n {
                residuals[i] = y[i] - z[i];
            }
            let abs_residuals: Vec<T> = residuals.iter().map(|r| r.abs()).collect();
            let mar = abs_residuals.iter().fold(T::zero(), |acc, &r| acc + r)
                / T::from(n).unwrap_or_else(T::one);
            let y_scale = y.iter().fold(T::zero(), |acc, &v| acc.max(v.abs()));
            if mar <= T::epsilon().sqrt() * y_scale || mar <= T::min_positive_value() {
                // fit is exact to rounding
                break;
            }
            let mut scale = median(&abs_residuals).unwrap_or(mar);
            if scale <= T::from(SCALE_THRESHOLD).unwrap_or_else(T::zero) * mar {
                scale = mar;
            }

            let c = T::from(BISQUARE_C).unwrap_or_else(T::one) * scale;
            for (w, &r) in robustness.iter_mut().zip(residuals.iter()) {
                *w = bisquare(r / c);
            }
        }

        Ok(())
    }

    /// Weighted polynomial fit in the window around `i`, evaluated at `i`
    fn fit_at<T: Float>(&self, y: &[T], robustness: &[T], i: usize, span: usize) -> T {
        let n = y.len();
        let start = i.saturating_sub(span / 2).min(n - span);
        let end = start + span;

        let reach = (i - start).max(end - 1 - i);
        if reach == 0 {
            return y[i];
        }
        // one past the farthest neighbour keeps every window sample in play
        let radius = T::from(reach + 1).unwrap_or_else(T::one);
        let degree = self.params.degree.min(span - 1);

        // moments of t = (j - i) / radius
        let mut s = [T::zero(); 2 * MAX_DEGREE + 1];
        let mut b = [T::zero(); MAX_DEGREE + 1];
        for j in start..end {
            let t = (T::from(j).unwrap_or_else(T::zero) - T::from(i).unwrap_or_else(T::zero)) / radius;
            let w = tricube(t.abs()) * robustness[j];
            if w <= T::zero() {
                continue;
            }
            let mut tk = T::one();
            for k in 0..=2 * degree {
                s[k] = s[k] + w * tk;
                if k <= degree {
                    b[k] = b[k] + w * tk * y[j];
                }
                tk = tk * t;
            }
        }

        if s[0] <= T::zero() {
            return y[i];
        }

        solve_intercept(&s, &b, degree).unwrap_or(b[0] / s[0])
    }
}

impl Smoother for LocalRegressionSmoother {
    fn smooth(&self, y: &[f64], z: &mut [f64]) -> SmileResult<()> {
        self.smooth_values(y, z)
    }
}

#[inline]
fn tricube<T: Float>(u: T) -> T {
    if u >= T::one() {
        return T::zero();
    }
    let v = T::one() - u * u * u;
    v * v * v
}

#[inline]
fn bisquare<T: Float>(u: T) -> T {
    let a = u.abs();
    if a >= T::one() {
        return T::zero();
    }
    let v = T::one() - a * a;
    v * v
}

/// Solve the normal equations and return the constant coefficient
fn solve_intercept<T: Float>(s: &[T], b: &[T], degree: usize) -> Option<T> {
    let m = degree + 1;
    if m == 1 {
        return Some(b[0] / s[0]);
    }

    let mut a = [[T::zero(); MAX_DEGREE + 2]; MAX_DEGREE + 1];
    for r in 0..m {
        for c in 0..m {
            a[r][c] = s[r + c];
        }
        a[r][m] = b[r];
    }

    let tolerance = T::epsilon() * T::from(1.0e3).unwrap_or_else(T::one) * s[0];
    for col in 0..m {
        let pivot = (col..m).max_by(|&p, &q| {
            a[p][col]
                .abs()
                .partial_cmp(&a[q][col].abs())
                .unwrap_or(Ordering::Equal)
        })?;
        if a[pivot][col].abs() <= tolerance {
            return None;
        }
        a.swap(col, pivot);
        for r in (col + 1)..m {
            let factor = a[r][col] / a[col][col];
            for c in col..=m {
                a[r][c] = a[r][c] - factor * a[col][c];
            }
        }
    }

    let mut x = [T::zero(); MAX_DEGREE + 1];
    for r in (0..m).rev() {
        let mut acc = a[r][m];
        for c in (r + 1)..m {
            acc = acc - a[r][c] * x[c];
        }
        x[r] = acc / a[r][r];
    }
    Some(x[0])
}

/// Median of a slice; the mean of the two middle values for even lengths
pub fn median<T: Float>(values: &[T]) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        let two = T::one() + T::one();
        Some((sorted[mid - 1] + sorted[mid]) / two)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_median() {
        assert_eq!(median::<f64>(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_quadratic_is_reproduced_by_degree_two() {
        let smoother = LocalRegressionSmoother::new(LocalRegressionParams::default()).unwrap();
        let y: Vec<f64> = (0..40).map(|i| 0.01 * (i as f64 - 20.0).powi(2) + 0.5).collect();
        let mut z = vec![0.0; y.len()];

        smoother.smooth(&y, &mut z).unwrap();

        for (a, b) in y.iter().zip(z.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_spike_is_suppressed() {
        let smoother = LocalRegressionSmoother::new(LocalRegressionParams {
            degree: 1,
            order: 11,
            iterations: 3,
        })
        .unwrap();
        let mut y: Vec<f64> = (0..50).map(|i| 0.2 + 0.001 * i as f64).collect();
        y[25] += 1.0;
        let mut z = vec![0.0; y.len()];

        smoother.smooth(&y, &mut z).unwrap();

        let expected = 0.2 + 0.001 * 25.0;
        assert!((z[25] - expected).abs() < 0.01, "spike leaked: {}", z[25]);
    }

    #[test]
    fn test_degree_zero_constant() {
        let smoother =
            LocalRegressionSmoother::new(LocalRegressionParams::column_shifts()).unwrap();
        let y = vec![0.42f32; 10];
        let mut z = vec![0.0f32; 10];

        smoother.smooth_values(&y, &mut z).unwrap();
        assert!(z.iter().all(|&v| (v - 0.42).abs() < 1e-6));
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let smoother = LocalRegressionSmoother::new(LocalRegressionParams::default()).unwrap();
        let mut z = vec![0.0; 3];
        assert!(smoother.smooth(&[1.0, 2.0], &mut z).is_err());
    }

    #[test]
    fn test_invalid_params() {
        let params = LocalRegressionParams {
            degree: 3,
            ..LocalRegressionParams::default()
        };
        assert!(LocalRegressionSmoother::new(params).is_err());
    }
}
