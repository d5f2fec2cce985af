//! smilecorr: spectral smile estimation for hyperspectral pushbroom sensors
//!
//! This library provides the resampling, RTC interpolation and per-column
//! optimisation that estimate a scene's wavelength mis-registration ("smile")
//! ahead of atmospheric correction.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    InterpolatedRtcSet, RadianceCube, RtcSpectra, SceneGeometry, SmileError, SmileResult,
    Spectrum, ValidityMask, WavelengthAxis,
};

pub use io::{GriddedRtcTable, LutAxis, RtcLookupTable};

pub use core::{
    AxisInterpolationTable, ReflectanceCalculator, SmileCorrection, SmileCorrectionParams,
    SmileShiftEstimator, SmileShiftReducer, SpectralResampler,
};

#[cfg(feature = "python")]
mod python {
    use crate::core::{ReductionStrategy, SmileShiftReducer, SpectralResampler};
    use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
    use pyo3::prelude::*;

    fn runtime_error(e: crate::SmileError) -> PyErr {
        PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("{}", e))
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_class::<PySpectralResampler>()?;
        m.add_function(wrap_pyfunction!(reduce_shifts, m)?)?;
        Ok(())
    }

    /// Python wrapper for SpectralResampler
    #[pyclass(name = "SpectralResampler")]
    struct PySpectralResampler {
        inner: SpectralResampler,
    }

    #[pymethods]
    impl PySpectralResampler {
        #[new]
        #[pyo3(signature = (source_wavelengths, target_wavelengths, target_bandwidths, shift = 0.0))]
        fn new(
            source_wavelengths: PyReadonlyArray1<f64>,
            target_wavelengths: PyReadonlyArray1<f64>,
            target_bandwidths: PyReadonlyArray1<f64>,
            shift: f64,
        ) -> PyResult<Self> {
            let inner = SpectralResampler::new(
                &source_wavelengths.as_array().to_vec(),
                &target_wavelengths.as_array().to_vec(),
                &target_bandwidths.as_array().to_vec(),
                shift,
            )
            .map_err(runtime_error)?;

            Ok(PySpectralResampler { inner })
        }

        fn resample<'py>(
            &self,
            py: Python<'py>,
            values: PyReadonlyArray1<f64>,
        ) -> PyResult<&'py PyArray1<f64>> {
            let resampled = self
                .inner
                .resample(values.as_array())
                .map_err(runtime_error)?;
            Ok(resampled.into_pyarray(py))
        }

        #[getter]
        fn shift(&self) -> f64 {
            self.inner.shift()
        }

        fn __repr__(&self) -> String {
            format!(
                "SpectralResampler(bands={}, samples={}, shift={})",
                self.inner.target_len(),
                self.inner.source_len(),
                self.inner.shift()
            )
        }
    }

    /// Collapse per-column shifts to one scene value
    #[pyfunction]
    #[pyo3(signature = (shifts, use_median = true))]
    fn reduce_shifts(shifts: PyReadonlyArray1<f64>, use_median: bool) -> PyResult<f64> {
        let reducer = SmileShiftReducer::new(ReductionStrategy::from_use_median(use_median))
            .map_err(runtime_error)?;
        reducer
            .reduce(&shifts.as_array().to_vec())
            .map_err(runtime_error)
    }
}
