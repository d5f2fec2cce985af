use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};

/// One value per band, parallel to a [`WavelengthAxis`]
pub type Spectrum = Array1<f64>;

/// At-sensor radiance cube (rows x columns x bands)
pub type RadianceCube = Array3<f64>;

/// Per-pixel flag words (rows x columns)
pub type ValidityMask = Array2<u8>;

/// Pixel flag bits carried by a [`ValidityMask`]
pub mod pixel_flags {
    pub const INVALID: u8 = 1;
    pub const SATURATED: u8 = 1 << 1;
    pub const DROPOUT: u8 = 1 << 2;
    pub const IGNORE: u8 = 1 << 3;
    pub const CLOUD: u8 = 1 << 4;

    /// Any flag that excludes a pixel from column statistics
    pub const EXCLUDED: u8 = INVALID | SATURATED | DROPOUT | IGNORE | CLOUD;
}

/// Instrument band grid: centre wavelengths and bandwidths in nm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WavelengthAxis {
    wavelengths: Vec<f64>,
    bandwidths: Vec<f64>,
}

impl WavelengthAxis {
    /// Create an axis, checking that centres are strictly increasing and
    /// bandwidths are finite and positive
    pub fn new(wavelengths: Vec<f64>, bandwidths: Vec<f64>) -> SmileResult<Self> {
        if wavelengths.len() != bandwidths.len() {
            return Err(SmileError::DimensionMismatch {
                expected: wavelengths.len(),
                actual: bandwidths.len(),
            });
        }
        if wavelengths.is_empty() {
            return Err(SmileError::InvalidInput(
                "Wavelength axis must contain at least one band".to_string(),
            ));
        }
        if let Some(i) = wavelengths.windows(2).position(|w| w[1] <= w[0]) {
            return Err(SmileError::InvalidInput(format!(
                "Wavelengths must be strictly increasing (band {} = {} nm, band {} = {} nm)",
                i,
                wavelengths[i],
                i + 1,
                wavelengths[i + 1]
            )));
        }
        if let Some(i) = bandwidths.iter().position(|&b| !(b.is_finite() && b > 0.0)) {
            return Err(SmileError::InvalidInput(format!(
                "Bandwidth of band {} must be finite and positive, got {}",
                i, bandwidths[i]
            )));
        }
        Ok(Self {
            wavelengths,
            bandwidths,
        })
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn bandwidths(&self) -> &[f64] {
        &self.bandwidths
    }

    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    /// Inclusive band index range whose centres fall inside `[lower_nm, upper_nm]`
    pub fn band_window(&self, lower_nm: f64, upper_nm: f64) -> Option<(usize, usize)> {
        let first = self.wavelengths.iter().position(|&w| w >= lower_nm)?;
        let last = self.wavelengths.iter().rposition(|&w| w <= upper_nm)?;
        if first <= last {
            Some((first, last))
        } else {
            None
        }
    }
}

/// Observation and illumination geometry of a scene
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneGeometry {
    /// View zenith angle (degrees)
    pub vza: f64,
    /// Sun zenith angle (degrees)
    pub sza: f64,
    /// Relative azimuth (degrees)
    pub ada: f64,
    /// Target elevation (km)
    pub alt: f64,
}

/// Radiative-transfer coefficients on one wavelength grid
#[derive(Debug, Clone, PartialEq)]
pub struct RtcSpectra {
    /// Path radiance
    pub lpw: Array1<f64>,
    /// Ground irradiance
    pub egl: Array1<f64>,
    /// Spherical albedo
    pub sab: Array1<f64>,
    /// Background ratio term
    pub rat: Array1<f64>,
}

impl RtcSpectra {
    pub fn zeros(len: usize) -> Self {
        Self {
            lpw: Array1::zeros(len),
            egl: Array1::zeros(len),
            sab: Array1::zeros(len),
            rat: Array1::zeros(len),
        }
    }

    pub fn len(&self) -> usize {
        self.lpw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lpw.is_empty()
    }

    /// Check that all four components share one length
    pub fn validate(&self) -> SmileResult<()> {
        let n = self.lpw.len();
        for len in [self.egl.len(), self.sab.len(), self.rat.len()] {
            if len != n {
                return Err(SmileError::DimensionMismatch {
                    expected: n,
                    actual: len,
                });
            }
        }
        Ok(())
    }
}

/// RTC set interpolated at one free-axis coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedRtcSet {
    pub rtc: RtcSpectra,
    pub toa_scaling: f64,
}

/// Error types for smile estimation
#[derive(Debug, thiserror::Error)]
pub enum SmileError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

/// Result type for smile estimation
pub type SmileResult<T> = Result<T, SmileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_rejects_unsorted_wavelengths() {
        let result = WavelengthAxis::new(vec![400.0, 410.0, 405.0], vec![10.0; 3]);
        assert!(matches!(result, Err(SmileError::InvalidInput(_))));
    }

    #[test]
    fn test_axis_rejects_mismatched_bandwidths() {
        let result = WavelengthAxis::new(vec![400.0, 410.0], vec![10.0]);
        assert!(matches!(result, Err(SmileError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_axis_rejects_degenerate_bandwidths() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(WavelengthAxis::new(vec![400.0, 401.0], vec![2.0, bad]).is_err());
        }
    }

    #[test]
    fn test_band_window() {
        let axis = WavelengthAxis::new(
            (0..10).map(|i| 740.0 + 5.0 * i as f64).collect(),
            vec![5.0; 10],
        )
        .unwrap();

        assert_eq!(axis.band_window(755.0, 775.0), Some((3, 7)));
        assert_eq!(axis.band_window(900.0, 950.0), None);
    }
}
