//! Per-column spectral smile estimation.
//!
//! For every image column the wavelength shift is found that best reconciles
//! the column's reflectance inside the O2-A window with a smoothed reference
//! spectrum of the same column. The O2-A feature near 760 nm is narrow and
//! steep, so a sub-band mis-registration leaves a strong residual there.

use crate::core::minimizer::{brack_with_limit, brent, Bracket, MinimizerParams};
use crate::core::reflectance::{CalculatorFactory, ReflectanceCalculator};
use crate::core::resampler::{ResponseShape, SpectralResampler};
use crate::types::{SmileError, SmileResult, WavelengthAxis};
use ndarray::{Array1, Array2, ArrayView1, Axis};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Manufactures the resampler and calculator for a candidate shift
pub trait ShiftModelFactory: Send + Sync {
    fn create(&self, shift: f64) -> SmileResult<(SpectralResampler, ReflectanceCalculator)>;

    /// Number of instrument bands the calculators cover
    fn band_count(&self) -> usize;
}

/// Shift model that resamples native-grid RTC spectra onto a shifted band grid
#[derive(Debug, Clone)]
pub struct ResamplingShiftModel {
    source_wavelengths: Vec<f64>,
    bands: WavelengthAxis,
    shape: ResponseShape,
    calculators: CalculatorFactory,
    lpw_correction: Option<Array1<f64>>,
}

impl ResamplingShiftModel {
    pub fn new(
        source_wavelengths: Vec<f64>,
        bands: WavelengthAxis,
        shape: ResponseShape,
        calculators: CalculatorFactory,
        lpw_correction: Option<Array1<f64>>,
    ) -> SmileResult<Self> {
        if calculators.native().len() != source_wavelengths.len() {
            return Err(SmileError::DimensionMismatch {
                expected: source_wavelengths.len(),
                actual: calculators.native().len(),
            });
        }
        if let Some(correction) = &lpw_correction {
            if correction.len() != bands.len() {
                return Err(SmileError::DimensionMismatch {
                    expected: bands.len(),
                    actual: correction.len(),
                });
            }
        }
        Ok(Self {
            source_wavelengths,
            bands,
            shape,
            calculators,
            lpw_correction,
        })
    }
}

impl ShiftModelFactory for ResamplingShiftModel {
    fn create(&self, shift: f64) -> SmileResult<(SpectralResampler, ReflectanceCalculator)> {
        let resampler = SpectralResampler::with_shape(
            &self.source_wavelengths,
            self.bands.wavelengths(),
            self.bands.bandwidths(),
            shift,
            &self.shape,
        )?;
        let calculator = self
            .calculators
            .create_calculator(&resampler, self.lpw_correction.as_ref())?;
        Ok((resampler, calculator))
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }
}

/// Shift estimate of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnShift {
    /// Wavelength shift (nm, signed)
    pub shift: f64,
    /// Objective value at `shift`
    pub cost: f64,
    /// Both bracketing and refinement met their criteria
    pub converged: bool,
}

/// One wavelength shift per image column
#[derive(Debug, Clone)]
pub struct SmileShiftRaster {
    pub shifts: Array1<f64>,
    pub costs: Array1<f64>,
    pub converged: Vec<bool>,
}

impl SmileShiftRaster {
    pub fn len(&self) -> usize {
        self.shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shifts.is_empty()
    }

    pub fn converged_count(&self) -> usize {
        self.converged.iter().filter(|&&c| c).count()
    }
}

/// Minimizes the O2-window misfit over the wavelength shift, column by column
pub struct SmileShiftEstimator<'a, M: ShiftModelFactory + ?Sized> {
    model: &'a M,
    lower_band: usize,
    upper_band: usize,
    params: MinimizerParams,
}

impl<'a, M: ShiftModelFactory + ?Sized> SmileShiftEstimator<'a, M> {
    /// `lower_band..=upper_band` is the diagnostic window
    pub fn new(
        model: &'a M,
        lower_band: usize,
        upper_band: usize,
        params: MinimizerParams,
    ) -> SmileResult<Self> {
        if lower_band > upper_band || upper_band >= model.band_count() {
            return Err(SmileError::OutOfRange(format!(
                "Band window [{}, {}] invalid for {} bands",
                lower_band,
                upper_band,
                model.band_count()
            )));
        }
        Ok(Self {
            model,
            lower_band,
            upper_band,
            params,
        })
    }

    /// Sum of squared reflectance differences over the window at `shift`.
    ///
    /// A model that cannot be built for `shift` scores `+inf`.
    pub fn objective(&self, toa: &[f64], reference: ArrayView1<f64>, shift: f64) -> f64 {
        match self.reconstruct(toa, shift) {
            Ok(boa) => (self.lower_band..=self.upper_band)
                .map(|b| {
                    let d = reference[b] - boa[b];
                    d * d
                })
                .sum(),
            Err(e) => {
                log::debug!("Shift {} rejected: {}", shift, e);
                f64::INFINITY
            }
        }
    }

    fn reconstruct(&self, toa: &[f64], shift: f64) -> SmileResult<Vec<f64>> {
        let (_, calculator) = self.model.create(shift)?;
        let mut boa = vec![0.0; toa.len()];
        calculator.calculate_boa_reflectances_range(
            toa,
            &mut boa,
            self.lower_band,
            self.upper_band + 1,
        )?;
        Ok(boa)
    }

    /// Estimate the shift of one column from its mean TOA and reference BOA spectra
    pub fn estimate_column(
        &self,
        toa: ArrayView1<f64>,
        reference: ArrayView1<f64>,
    ) -> SmileResult<ColumnShift> {
        let n = self.model.band_count();
        if toa.len() != n || reference.len() != n {
            return Err(SmileError::DimensionMismatch {
                expected: n,
                actual: if toa.len() != n { toa.len() } else { reference.len() },
            });
        }

        let toa = toa.to_vec();
        let f = |shift: f64| self.objective(&toa, reference, shift);

        let mut bracket = Bracket::default();
        let bracketed = brack_with_limit(&f, 0.0, 1.0, &mut bracket, self.params.bracket_iter);
        if !bracketed {
            log::debug!(
                "No proper bracket found, refining from [{:.4}, {:.4}]",
                bracket.lower_x,
                bracket.upper_x
            );
        }
        let refined = brent(
            &f,
            &mut bracket,
            self.params.tol_x,
            self.params.tol_f,
            self.params.max_iter,
        );

        Ok(ColumnShift {
            shift: bracket.minimum_x,
            cost: bracket.minimum_f,
            converged: bracketed && refined,
        })
    }

    /// Estimate every column in parallel.
    ///
    /// `toa` and `references` are (columns x bands). Columns marked `false` in
    /// `usable` are not searched and keep a zero shift.
    pub fn estimate_raster(
        &self,
        toa: &Array2<f64>,
        references: &Array2<f64>,
        usable: Option<&[bool]>,
    ) -> SmileResult<SmileShiftRaster> {
        if toa.dim() != references.dim() {
            return Err(SmileError::InvalidInput(format!(
                "TOA spectra {:?} and references {:?} differ in shape",
                toa.dim(),
                references.dim()
            )));
        }
        let columns = toa.nrows();
        if let Some(usable) = usable {
            if usable.len() != columns {
                return Err(SmileError::DimensionMismatch {
                    expected: columns,
                    actual: usable.len(),
                });
            }
        }

        log::info!(
            "Estimating smile shift for {} columns over bands {}..={}",
            columns,
            self.lower_band,
            self.upper_band
        );

        let estimate = |(x, (t, r)): (usize, (ArrayView1<f64>, ArrayView1<f64>))| {
            if usable.map_or(true, |u| u[x]) {
                self.estimate_column(t, r)
            } else {
                Ok(ColumnShift {
                    shift: 0.0,
                    cost: 0.0,
                    converged: false,
                })
            }
        };

        #[cfg(feature = "parallel")]
        let results = toa
            .axis_iter(Axis(0))
            .into_par_iter()
            .zip(references.axis_iter(Axis(0)).into_par_iter())
            .enumerate()
            .map(estimate)
            .collect::<SmileResult<Vec<_>>>()?;

        #[cfg(not(feature = "parallel"))]
        let results = toa
            .axis_iter(Axis(0))
            .zip(references.axis_iter(Axis(0)))
            .enumerate()
            .map(estimate)
            .collect::<SmileResult<Vec<_>>>()?;

        let raster = SmileShiftRaster {
            shifts: results.iter().map(|c| c.shift).collect(),
            costs: results.iter().map(|c| c.cost).collect(),
            converged: results.iter().map(|c| c.converged).collect(),
        };

        let failed = columns - raster.converged_count();
        if failed > 0 {
            log::warn!(
                "{} of {} columns did not converge; best estimates kept",
                failed,
                columns
            );
        }

        Ok(raster)
    }

    pub fn window(&self) -> (usize, usize) {
        (self.lower_band, self.upper_band)
    }
}
