//! RTC interpolation along one free axis of the base table.
//!
//! A table is built once per scene geometry: the base table is queried at
//! every knot of the varying axis (the other axis held fixed), and the four
//! RTC arrays are resampled onto the instrument grid. Queries then only
//! interpolate between two knots.

use crate::core::resampler::SpectralResampler;
use crate::io::lut::{LutAxis, RtcLookupTable};
use crate::types::{InterpolatedRtcSet, RtcSpectra, SceneGeometry, SmileError, SmileResult};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// How the fractional knot position is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisScale {
    /// `(c - k_lo) / (k_hi - k_lo)`
    Linear,
    /// `ln(c / k_lo) / ln(k_hi / k_lo)`; absorption depth is log-linear in water vapour
    Logarithmic,
}

impl AxisScale {
    /// Natural scale of a lookup table axis
    pub fn for_axis(axis: LutAxis) -> Self {
        match axis {
            LutAxis::Aot => AxisScale::Linear,
            LutAxis::Cwv => AxisScale::Logarithmic,
        }
    }
}

/// Resampled RTC spectra at the knots of one free axis
#[derive(Debug, Clone)]
pub struct AxisInterpolationTable {
    axis: LutAxis,
    scale: AxisScale,
    knots: Vec<f64>,
    values: Vec<RtcSpectra>,
    toa_scaling: f64,
}

impl AxisInterpolationTable {
    /// Assemble a table from already resampled knot spectra
    pub fn from_knots(
        axis: LutAxis,
        scale: AxisScale,
        knots: Vec<f64>,
        values: Vec<RtcSpectra>,
        toa_scaling: f64,
    ) -> SmileResult<Self> {
        if knots.len() < 2 {
            return Err(SmileError::InvalidInput(format!(
                "{} table needs at least two knots, got {}",
                axis,
                knots.len()
            )));
        }
        if knots.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SmileError::InvalidInput(format!(
                "{} knots must be strictly increasing",
                axis
            )));
        }
        if scale == AxisScale::Logarithmic && knots[0] <= 0.0 {
            return Err(SmileError::InvalidInput(format!(
                "{} knots must be positive on a logarithmic axis",
                axis
            )));
        }
        if values.len() != knots.len() {
            return Err(SmileError::DimensionMismatch {
                expected: knots.len(),
                actual: values.len(),
            });
        }
        let bands = values[0].len();
        for v in &values {
            v.validate()?;
            if v.len() != bands {
                return Err(SmileError::DimensionMismatch {
                    expected: bands,
                    actual: v.len(),
                });
            }
        }

        Ok(Self {
            axis,
            scale,
            knots,
            values,
            toa_scaling,
        })
    }

    /// Water-vapour table at fixed aerosol thickness.
    ///
    /// `lpw_correction` is subtracted from the path radiance at every knot.
    pub fn water_vapour<T: RtcLookupTable + ?Sized>(
        table: &T,
        resampler: &SpectralResampler,
        geometry: &SceneGeometry,
        aot: f64,
        lpw_correction: Option<&Array1<f64>>,
        toa_scaling: f64,
    ) -> SmileResult<Self> {
        Self::build(
            table,
            LutAxis::Cwv,
            geometry,
            aot,
            Some(resampler),
            lpw_correction,
            toa_scaling,
        )
    }

    /// Aerosol table at fixed water vapour
    pub fn aerosol<T: RtcLookupTable + ?Sized>(
        table: &T,
        resampler: &SpectralResampler,
        geometry: &SceneGeometry,
        cwv: f64,
        toa_scaling: f64,
    ) -> SmileResult<Self> {
        Self::build(
            table,
            LutAxis::Aot,
            geometry,
            cwv,
            Some(resampler),
            None,
            toa_scaling,
        )
    }

    /// Table on the lookup table's own wavelength grid, without resampling
    pub fn native<T: RtcLookupTable + ?Sized>(
        table: &T,
        axis: LutAxis,
        geometry: &SceneGeometry,
        fixed: f64,
        toa_scaling: f64,
    ) -> SmileResult<Self> {
        Self::build(table, axis, geometry, fixed, None, None, toa_scaling)
    }

    /// Query the base table along `axis` with the other axis at `fixed`
    fn build<T: RtcLookupTable + ?Sized>(
        table: &T,
        axis: LutAxis,
        geometry: &SceneGeometry,
        fixed: f64,
        resampler: Option<&SpectralResampler>,
        lpw_correction: Option<&Array1<f64>>,
        toa_scaling: f64,
    ) -> SmileResult<Self> {
        let knots = table.dimension(axis).to_vec();
        log::info!(
            "Building {} interpolation table: {} knots, other axis fixed at {}",
            axis,
            knots.len(),
            fixed
        );

        let mut values = Vec::with_capacity(knots.len());
        for &knot in &knots {
            let rtc = match axis {
                LutAxis::Aot => table.rtc_spectra(geometry, knot, fixed)?,
                LutAxis::Cwv => table.rtc_spectra(geometry, fixed, knot)?,
            };
            let mut rtc = match resampler {
                Some(resampler) => resample_rtc(resampler, &rtc)?,
                None => rtc,
            };
            if let (LutAxis::Cwv, Some(correction)) = (axis, lpw_correction) {
                if correction.len() != rtc.len() {
                    return Err(SmileError::DimensionMismatch {
                        expected: rtc.len(),
                        actual: correction.len(),
                    });
                }
                rtc.lpw -= correction;
            }
            values.push(rtc);
        }

        Self::from_knots(
            axis,
            AxisScale::for_axis(axis),
            knots,
            values,
            toa_scaling,
        )
    }

    /// Interpolated RTC set at `coordinate`; out-of-domain values clamp to the end knots
    pub fn query(&self, coordinate: f64) -> InterpolatedRtcSet {
        let (lo, hi) = self.bracket(coordinate);
        let f = self.fraction(coordinate, lo, hi);

        let a = &self.values[lo];
        let b = &self.values[hi];
        let lerp = |x: &Array1<f64>, y: &Array1<f64>| x * (1.0 - f) + y * f;

        InterpolatedRtcSet {
            rtc: RtcSpectra {
                lpw: lerp(&a.lpw, &b.lpw),
                egl: lerp(&a.egl, &b.egl),
                sab: lerp(&a.sab, &b.sab),
                rat: lerp(&a.rat, &b.rat),
            },
            toa_scaling: self.toa_scaling,
        }
    }

    /// Adjacent knot indices `(lo, lo + 1)` with `knot[lo] <= coordinate < knot[lo + 1]`,
    /// pinned to the first or last pair outside the domain
    pub fn bracket(&self, coordinate: f64) -> (usize, usize) {
        let mut lo = 0;
        let mut hi = self.knots.len() - 1;

        while hi > lo + 1 {
            let mid = (lo + hi) / 2;
            if coordinate < self.knots[mid] {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        (lo, hi)
    }

    /// Fractional position between knots `lo` and `hi`, clamped to `[0, 1]`
    pub fn fraction(&self, coordinate: f64, lo: usize, hi: usize) -> f64 {
        let k_lo = self.knots[lo];
        let k_hi = self.knots[hi];

        let f = match self.scale {
            AxisScale::Linear => (coordinate - k_lo) / (k_hi - k_lo),
            AxisScale::Logarithmic => (coordinate / k_lo).ln() / (k_hi / k_lo).ln(),
        };

        // non-positive coordinates on a log axis give NaN or -inf; both saturate low
        if f.is_nan() {
            0.0
        } else {
            f.clamp(0.0, 1.0)
        }
    }

    pub fn min(&self) -> f64 {
        self.knots[0]
    }

    pub fn max(&self) -> f64 {
        self.knots[self.knots.len() - 1]
    }

    pub fn axis(&self) -> LutAxis {
        self.axis
    }

    pub fn scale(&self) -> AxisScale {
        self.scale
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn toa_scaling(&self) -> f64 {
        self.toa_scaling
    }
}

/// Map all four RTC components through one resampler
pub fn resample_rtc(resampler: &SpectralResampler, rtc: &RtcSpectra) -> SmileResult<RtcSpectra> {
    Ok(RtcSpectra {
        lpw: resampler.resample(rtc.lpw.view())?,
        egl: resampler.resample(rtc.egl.view())?,
        sab: resampler.resample(rtc.sab.view())?,
        rat: resampler.resample(rtc.rat.view())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::lut::GriddedRtcTable;
    use approx::assert_abs_diff_eq;

    fn spectra(value: f64) -> RtcSpectra {
        RtcSpectra {
            lpw: Array1::from_elem(3, value),
            egl: Array1::from_elem(3, 2.0 * value),
            sab: Array1::from_elem(3, 0.1),
            rat: Array1::from_elem(3, 1.0),
        }
    }

    fn cwv_table() -> AxisInterpolationTable {
        let knots = vec![0.5, 1.0, 2.0, 4.0, 8.0];
        let values = knots.iter().map(|&k| spectra(k)).collect();
        AxisInterpolationTable::from_knots(LutAxis::Cwv, AxisScale::Logarithmic, knots, values, 1.0)
            .unwrap()
    }

    fn aot_table() -> AxisInterpolationTable {
        let knots = vec![0.0, 0.1, 0.2, 0.4];
        let values = knots.iter().map(|&k| spectra(k)).collect();
        AxisInterpolationTable::from_knots(LutAxis::Aot, AxisScale::Linear, knots, values, 1.0)
            .unwrap()
    }

    #[test]
    fn test_exact_knot_reproduced() {
        let table = cwv_table();
        for (i, &k) in table.knots().iter().enumerate() {
            let rtc = table.query(k).rtc;
            assert_abs_diff_eq!(rtc.lpw[0], k, epsilon = 1e-12);
            let (lo, hi) = table.bracket(k);
            assert_eq!(hi, lo + 1);
            if i + 1 < table.knots().len() {
                assert_eq!(lo, i);
                assert_eq!(table.fraction(k, lo, hi), 0.0);
            }
        }
    }

    #[test]
    fn test_clamping() {
        let table = cwv_table();
        assert_eq!(table.query(0.1).rtc.lpw[0], 0.5);
        assert_eq!(table.query(0.0).rtc.lpw[0], 0.5);
        assert_eq!(table.query(-3.0).rtc.lpw[0], 0.5);
        assert_eq!(table.query(100.0).rtc.lpw[0], 8.0);

        let (lo, hi) = table.bracket(100.0);
        assert_eq!(table.fraction(100.0, lo, hi), 1.0);
        let (lo, hi) = table.bracket(0.1);
        assert_eq!(table.fraction(0.1, lo, hi), 0.0);
        assert_eq!(table.min(), 0.5);
        assert_eq!(table.max(), 8.0);
    }

    #[test]
    fn test_binary_search_returns_adjacent_pair() {
        let table = aot_table();
        for c in [0.01, 0.1, 0.15, 0.2, 0.3, 0.399] {
            let (lo, hi) = table.bracket(c);
            assert_eq!(hi, lo + 1);
            assert!(table.knots()[lo] <= c && c < table.knots()[hi]);
        }
    }

    #[test]
    fn test_linear_fraction() {
        let table = aot_table();
        let rtc = table.query(0.3).rtc;
        assert_abs_diff_eq!(rtc.lpw[1], 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(rtc.egl[1], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_logarithmic_fraction() {
        let table = cwv_table();
        // geometric midpoint of [2, 4]
        let c = 8.0f64.sqrt();
        let (lo, hi) = table.bracket(c);
        assert_abs_diff_eq!(table.fraction(c, lo, hi), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(table.query(c).rtc.lpw[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_log_axis_rejects_non_positive_knots() {
        let knots = vec![0.0, 1.0];
        let values = knots.iter().map(|&k| spectra(k)).collect();
        let result =
            AxisInterpolationTable::from_knots(LutAxis::Cwv, AxisScale::Logarithmic, knots, values, 1.0);
        assert!(result.is_err());
    }

    #[test]
    fn test_water_vapour_table_from_lut_applies_lpw_correction() {
        let geometry = SceneGeometry {
            vza: 20.0,
            sza: 35.0,
            ada: 145.0,
            alt: 0.3,
        };
        let wavelengths: Vec<f64> = (0..101).map(|i| 700.0 + i as f64).collect();
        let lut = GriddedRtcTable::from_fn(
            geometry,
            wavelengths.clone(),
            vec![0.1, 0.2],
            vec![1.0, 2.0, 4.0],
            |aot, cwv, wl| RtcSpectra {
                lpw: Array1::from_elem(wl.len(), 10.0 * cwv + aot),
                egl: Array1::from_elem(wl.len(), 30.0),
                sab: Array1::from_elem(wl.len(), 0.1),
                rat: Array1::from_elem(wl.len(), 1.0),
            },
        )
        .unwrap();

        let resampler =
            SpectralResampler::new(&wavelengths, &[740.0, 760.0], &[8.0, 8.0], 0.0).unwrap();
        let correction = Array1::from_elem(2, 0.5);
        let table = AxisInterpolationTable::water_vapour(
            &lut,
            &resampler,
            &geometry,
            0.2,
            Some(&correction),
            1.0e-4,
        )
        .unwrap();

        let set = table.query(2.0);
        assert_abs_diff_eq!(set.rtc.lpw[0], 20.2 - 0.5, epsilon = 1e-10);
        assert_abs_diff_eq!(set.rtc.egl[1], 30.0, epsilon = 1e-10);
        assert_eq!(set.toa_scaling, 1.0e-4);
        assert_eq!(table.scale(), AxisScale::Logarithmic);
    }

    #[test]
    fn test_aerosol_table_from_lut() {
        let geometry = SceneGeometry {
            vza: 0.0,
            sza: 30.0,
            ada: 0.0,
            alt: 0.0,
        };
        let wavelengths: Vec<f64> = (0..51).map(|i| 500.0 + i as f64).collect();
        let lut = GriddedRtcTable::from_fn(
            geometry,
            wavelengths.clone(),
            vec![0.1, 0.3],
            vec![2.0],
            |aot, _, wl| RtcSpectra {
                lpw: Array1::from_elem(wl.len(), 100.0 * aot),
                egl: Array1::from_elem(wl.len(), 1.0),
                sab: Array1::zeros(wl.len()),
                rat: Array1::zeros(wl.len()),
            },
        )
        .unwrap();
        let resampler = SpectralResampler::new(&wavelengths, &[525.0], &[10.0], 0.0).unwrap();

        let table = AxisInterpolationTable::aerosol(&lut, &resampler, &geometry, 2.0, 1.0).unwrap();
        assert_abs_diff_eq!(table.query(0.2).rtc.lpw[0], 20.0, epsilon = 1e-10);
        assert_eq!(table.axis(), LutAxis::Aot);
    }
}
