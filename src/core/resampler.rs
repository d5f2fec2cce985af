use crate::types::{SmileError, SmileResult};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Shape schedule of the instrument's spectral response.
///
/// The response exponent runs linearly from `first_exponent` at the first
/// band to `last_exponent` at the last one: near-rectangular at the blue end,
/// near-Gaussian at the red end. Calibrated values, not derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseShape {
    pub first_exponent: f64,
    pub last_exponent: f64,
    /// Half-width of the response window in bandwidths
    pub window_bandwidths: f64,
}

impl Default for ResponseShape {
    fn default() -> Self {
        Self {
            first_exponent: 6.0,
            last_exponent: 2.0,
            window_bandwidths: 2.0,
        }
    }
}

impl ResponseShape {
    /// Exponent for band `index` of `band_count`
    pub fn exponent(&self, index: usize, band_count: usize) -> f64 {
        if band_count < 2 {
            return self.first_exponent;
        }
        let fraction = index as f64 / (band_count - 1) as f64;
        self.first_exponent + (self.last_exponent - self.first_exponent) * fraction
    }
}

/// Width constant so that `exp(-(d / (bandwidth * c))^e)` is one half at `d = bandwidth / 2`
fn width_constant(exponent: f64) -> f64 {
    (1.0 / (2.0f64.powf(exponent) * std::f64::consts::LN_2)).powf(1.0 / exponent)
}

/// Convolves spectra from a fine source grid onto an instrument band grid
#[derive(Debug, Clone)]
pub struct SpectralResampler {
    weights: Array2<f64>,
    shift: f64,
}

impl SpectralResampler {
    /// Build the weight matrix with the default response shape
    pub fn new(
        source_wavelengths: &[f64],
        target_wavelengths: &[f64],
        target_bandwidths: &[f64],
        target_shift: f64,
    ) -> SmileResult<Self> {
        Self::with_shape(
            source_wavelengths,
            target_wavelengths,
            target_bandwidths,
            target_shift,
            &ResponseShape::default(),
        )
    }

    /// Build the weight matrix for an explicit response shape
    pub fn with_shape(
        source_wavelengths: &[f64],
        target_wavelengths: &[f64],
        target_bandwidths: &[f64],
        target_shift: f64,
        shape: &ResponseShape,
    ) -> SmileResult<Self> {
        if target_wavelengths.len() != target_bandwidths.len() {
            return Err(SmileError::DimensionMismatch {
                expected: target_wavelengths.len(),
                actual: target_bandwidths.len(),
            });
        }

        if let Some(i) = target_bandwidths
            .iter()
            .position(|&b| !(b.is_finite() && b > 0.0))
        {
            return Err(SmileError::InvalidInput(format!(
                "Target bandwidth {} must be finite and positive, got {}",
                i, target_bandwidths[i]
            )));
        }

        let n = target_wavelengths.len();
        let mut weights = Array2::<f64>::zeros((n, source_wavelengths.len()));

        for (i, mut row) in weights.outer_iter_mut().enumerate() {
            let bandwidth = target_bandwidths[i];
            let center = target_wavelengths[i] + target_shift;
            let exponent = shape.exponent(i, n);
            let scale = bandwidth * width_constant(exponent);
            let reach = shape.window_bandwidths * bandwidth;

            for (j, &source) in source_wavelengths.iter().enumerate() {
                let delta = (center - source).abs();
                if delta <= reach {
                    row[j] = (-(delta / scale).powf(exponent)).exp();
                }
            }

            let sum = row.sum();
            if sum > 0.0 {
                row /= sum;
            }
        }

        log::debug!(
            "Built {}x{} resampling matrix (shift {:.4} nm)",
            n,
            source_wavelengths.len(),
            target_shift
        );

        Ok(Self {
            weights,
            shift: target_shift,
        })
    }

    /// Resample one source spectrum onto the target grid
    pub fn resample(&self, source_values: ArrayView1<f64>) -> SmileResult<Array1<f64>> {
        if source_values.len() != self.source_len() {
            return Err(SmileError::DimensionMismatch {
                expected: self.source_len(),
                actual: source_values.len(),
            });
        }
        Ok(self.weights.dot(&source_values))
    }

    /// [`resample`](Self::resample) for a plain slice
    pub fn resample_slice(&self, source_values: &[f64]) -> SmileResult<Array1<f64>> {
        self.resample(ArrayView1::from(source_values))
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn shift(&self) -> f64 {
        self.shift
    }

    pub fn source_len(&self) -> usize {
        self.weights.ncols()
    }

    pub fn target_len(&self) -> usize {
        self.weights.nrows()
    }
}
