use crate::core::aggregator::ColumnSpectrumAggregator;
use crate::core::axis_table::AxisInterpolationTable;
use crate::core::minimizer::MinimizerParams;
use crate::core::reducer::{ReductionStrategy, SmileShiftReducer};
use crate::core::reflectance::{CalculatorFactory, ReflectanceCalculator};
use crate::core::resampler::{ResponseShape, SpectralResampler};
use crate::core::smile::{ResamplingShiftModel, SmileShiftEstimator, SmileShiftRaster};
use crate::core::smoother::{LocalRegressionParams, LocalRegressionSmoother};
use crate::io::lut::{LutAxis, RtcLookupTable};
use crate::types::{
    RadianceCube, SceneGeometry, SmileError, SmileResult, ValidityMask, WavelengthAxis,
};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Parameters of a scene smile estimation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmileCorrectionParams {
    /// Lower edge of the O2-A diagnostic window (nm)
    pub lower_o2_nm: f64,
    /// Upper edge of the O2-A diagnostic window (nm)
    pub upper_o2_nm: f64,
    /// Free axis interpolated for the zero-shift coefficients
    pub interpolation_axis: LutAxis,
    /// Instrument spectral response schedule
    pub response_shape: ResponseShape,
    /// Brent tolerances and budgets
    pub minimizer: MinimizerParams,
    /// Smoother applied to the column reference spectra
    pub reference_smoother: LocalRegressionParams,
    /// Smoother applied to the column-shift sequence
    pub shift_smoother: LocalRegressionParams,
    /// Median (true) or smoothed-mean (false) reduction
    pub use_median: bool,
    /// Factor converting image radiance to table radiance units
    pub toa_scaling: f64,
}

impl Default for SmileCorrectionParams {
    fn default() -> Self {
        Self {
            lower_o2_nm: 755.0,
            upper_o2_nm: 775.0,
            interpolation_axis: LutAxis::Cwv,
            response_shape: ResponseShape::default(),
            minimizer: MinimizerParams::default(),
            reference_smoother: LocalRegressionParams::default(),
            shift_smoother: LocalRegressionParams::column_shifts(),
            use_median: true,
            toa_scaling: 1.0,
        }
    }
}

/// One scene handed to [`SmileCorrection::run`]
#[derive(Debug, Clone, Copy)]
pub struct SceneInput<'a> {
    /// At-sensor radiance (rows x columns x bands)
    pub radiance: &'a RadianceCube,
    /// Pixel flags (rows x columns)
    pub mask: &'a ValidityMask,
    pub bands: &'a WavelengthAxis,
    pub geometry: SceneGeometry,
    pub aot: f64,
    pub cwv: f64,
    /// Per-band path radiance correction for the water-vapour table
    pub lpw_correction: Option<&'a Array1<f64>>,
}

/// Output of a scene smile estimation
#[derive(Debug, Clone)]
pub struct SmileCorrectionResult {
    /// Per-column estimates
    pub raster: SmileShiftRaster,
    /// Scene-wide wavelength shift (nm)
    pub shift: f64,
    /// Inclusive band window used by the objective
    pub window: (usize, usize),
    /// Zero-shift calculator the references were built with
    pub calculator: ReflectanceCalculator,
}

/// Scene-level smile estimation: aggregation, per-column search and reduction
pub struct SmileCorrection {
    params: SmileCorrectionParams,
}

impl SmileCorrection {
    pub fn new(params: SmileCorrectionParams) -> Self {
        Self { params }
    }

    /// Create a processor with default parameters
    pub fn standard() -> Self {
        Self::new(SmileCorrectionParams::default())
    }

    pub fn params(&self) -> &SmileCorrectionParams {
        &self.params
    }

    /// Estimate the smile shift of one scene
    pub fn run<T: RtcLookupTable + ?Sized>(
        &self,
        table: &T,
        scene: &SceneInput,
    ) -> SmileResult<SmileCorrectionResult> {
        let params = &self.params;
        let (rows, columns, bands) = scene.radiance.dim();
        log::info!(
            "Starting smile estimation: {}x{} pixels, {} bands",
            rows,
            columns,
            bands
        );
        if bands != scene.bands.len() {
            return Err(SmileError::DimensionMismatch {
                expected: scene.bands.len(),
                actual: bands,
            });
        }

        let window = scene
            .bands
            .band_window(params.lower_o2_nm, params.upper_o2_nm)
            .ok_or_else(|| {
                SmileError::InvalidInput(format!(
                    "No bands inside the O2 window [{}, {}] nm",
                    params.lower_o2_nm, params.upper_o2_nm
                ))
            })?;
        log::debug!("O2 window covers bands {}..={}", window.0, window.1);

        let calculator = self.zero_shift_calculator(table, scene)?;

        let spectra = ColumnSpectrumAggregator::column_means(scene.radiance, scene.mask)?;
        let reference_smoother = LocalRegressionSmoother::new(params.reference_smoother)?;
        let references =
            ColumnSpectrumAggregator::reference_spectra(&spectra, &calculator, &reference_smoother)?;

        let model = self.shift_model(table, scene)?;
        let estimator = SmileShiftEstimator::new(&model, window.0, window.1, params.minimizer)?;
        let usable: Vec<bool> = spectra.valid_pixels.iter().map(|&n| n > 0).collect();
        let raster = estimator.estimate_raster(&spectra.means, &references, Some(&usable))?;

        let reducer = SmileShiftReducer::with_smoother_params(
            ReductionStrategy::from_use_median(params.use_median),
            params.shift_smoother,
        )?;
        // unsearched columns carry a placeholder shift and stay out of the reduction
        let shifts: Vec<f64> = raster
            .shifts
            .iter()
            .zip(&usable)
            .filter_map(|(&s, &u)| u.then_some(s))
            .collect();
        if shifts.is_empty() {
            return Err(SmileError::Processing(
                "No column has valid pixels to estimate a smile shift from".to_string(),
            ));
        }
        let shift = reducer.reduce(&shifts)?;

        log::info!(
            "Smile estimation completed: {:.5} nm ({} of {} columns converged)",
            shift,
            raster.converged_count(),
            raster.len()
        );

        Ok(SmileCorrectionResult {
            raster,
            shift,
            window,
            calculator,
        })
    }

    /// Calculator from the interpolation table of the configured free axis
    fn zero_shift_calculator<T: RtcLookupTable + ?Sized>(
        &self,
        table: &T,
        scene: &SceneInput,
    ) -> SmileResult<ReflectanceCalculator> {
        let params = &self.params;
        let resampler = SpectralResampler::with_shape(
            table.wavelengths(),
            scene.bands.wavelengths(),
            scene.bands.bandwidths(),
            0.0,
            &params.response_shape,
        )?;

        let set = match params.interpolation_axis {
            LutAxis::Cwv => AxisInterpolationTable::water_vapour(
                table,
                &resampler,
                &scene.geometry,
                scene.aot,
                scene.lpw_correction,
                params.toa_scaling,
            )?
            .query(scene.cwv),
            LutAxis::Aot => AxisInterpolationTable::aerosol(
                table,
                &resampler,
                &scene.geometry,
                scene.cwv,
                params.toa_scaling,
            )?
            .query(scene.aot),
        };
        ReflectanceCalculator::from_interpolated(set)
    }

    /// Shift model over native-grid coefficients at the scene atmosphere
    fn shift_model<T: RtcLookupTable + ?Sized>(
        &self,
        table: &T,
        scene: &SceneInput,
    ) -> SmileResult<ResamplingShiftModel> {
        let params = &self.params;
        let (fixed, coordinate) = match params.interpolation_axis {
            LutAxis::Cwv => (scene.aot, scene.cwv),
            LutAxis::Aot => (scene.cwv, scene.aot),
        };
        let native = AxisInterpolationTable::native(
            table,
            params.interpolation_axis,
            &scene.geometry,
            fixed,
            params.toa_scaling,
        )?
        .query(coordinate);

        let lpw_correction = match params.interpolation_axis {
            LutAxis::Cwv => scene.lpw_correction.cloned(),
            LutAxis::Aot => None,
        };
        ResamplingShiftModel::new(
            table.wavelengths().to_vec(),
            scene.bands.clone(),
            params.response_shape,
            CalculatorFactory::new(native.rtc, native.toa_scaling)?,
            lpw_correction,
        )
    }
}
