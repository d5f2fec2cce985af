use crate::core::axis_table::resample_rtc;
use crate::core::resampler::SpectralResampler;
use crate::types::{InterpolatedRtcSet, RtcSpectra, SmileError, SmileResult};
use ndarray::Array1;
use std::f64::consts::PI;

/// Converts at-sensor radiance to surface reflectance with fixed per-band RTCs.
///
/// With `L = toa_scaling * toa` and `a = pi * (L - Lpw)`, the Lambertian
/// inversion is `rho = a / (Egl + Sab * a)`.
#[derive(Debug, Clone)]
pub struct ReflectanceCalculator {
    rtc: RtcSpectra,
    toa_scaling: f64,
}

impl ReflectanceCalculator {
    pub fn new(rtc: RtcSpectra, toa_scaling: f64) -> SmileResult<Self> {
        rtc.validate()?;
        Ok(Self { rtc, toa_scaling })
    }

    pub fn from_interpolated(set: InterpolatedRtcSet) -> SmileResult<Self> {
        Self::new(set.rtc, set.toa_scaling)
    }

    pub fn band_count(&self) -> usize {
        self.rtc.len()
    }

    pub fn rtc(&self) -> &RtcSpectra {
        &self.rtc
    }

    pub fn toa_scaling(&self) -> f64 {
        self.toa_scaling
    }

    /// Surface reflectance of one band
    #[inline]
    pub fn boa_reflectance(&self, toa: f64, band: usize) -> f64 {
        let a = PI * (self.toa_scaling * toa - self.rtc.lpw[band]);
        let denominator = self.rtc.egl[band] + self.rtc.sab[band] * a;
        if denominator == 0.0 {
            0.0
        } else {
            a / denominator
        }
    }

    /// Convert every band of `toa` into `boa`
    pub fn calculate_boa_reflectances(&self, toa: &[f64], boa: &mut [f64]) -> SmileResult<()> {
        self.calculate_boa_reflectances_range(toa, boa, 0, self.band_count())
    }

    /// Convert the bands in `[from, to)`; other entries of `boa` are left untouched
    pub fn calculate_boa_reflectances_range(
        &self,
        toa: &[f64],
        boa: &mut [f64],
        from: usize,
        to: usize,
    ) -> SmileResult<()> {
        let n = self.band_count();
        if toa.len() != n || boa.len() != n {
            return Err(SmileError::DimensionMismatch {
                expected: n,
                actual: if toa.len() != n { toa.len() } else { boa.len() },
            });
        }
        if from > to || to > n {
            return Err(SmileError::OutOfRange(format!(
                "Band range [{}, {}) outside 0..{}",
                from, to, n
            )));
        }

        for band in from..to {
            boa[band] = self.boa_reflectance(toa[band], band);
        }
        Ok(())
    }

    /// Owned variant of [`calculate_boa_reflectances`](Self::calculate_boa_reflectances)
    pub fn boa_spectrum(&self, toa: &[f64]) -> SmileResult<Array1<f64>> {
        let mut boa = Array1::zeros(toa.len());
        if let Some(slice) = boa.as_slice_mut() {
            self.calculate_boa_reflectances(toa, slice)?;
        }
        Ok(boa)
    }

    /// Adjacency correction of a uniform-surface reflectance against its background
    pub fn adjacency_corrected(&self, rho: f64, rho_background: f64, band: usize) -> f64 {
        rho + self.rtc.rat[band] * (rho - rho_background)
    }
}

/// Builds the calculator matching a (possibly shifted) resampler.
///
/// Holds the RTC spectra on the lookup table's native grid for a fixed
/// geometry and atmosphere; each shift gets its own resampled copy.
#[derive(Debug, Clone)]
pub struct CalculatorFactory {
    native: RtcSpectra,
    toa_scaling: f64,
}

impl CalculatorFactory {
    pub fn new(native: RtcSpectra, toa_scaling: f64) -> SmileResult<Self> {
        native.validate()?;
        Ok(Self {
            native,
            toa_scaling,
        })
    }

    /// Optionally subtract a per-band path radiance correction after resampling
    pub fn create_calculator(
        &self,
        resampler: &SpectralResampler,
        lpw_correction: Option<&Array1<f64>>,
    ) -> SmileResult<ReflectanceCalculator> {
        let mut rtc = resample_rtc(resampler, &self.native)?;
        if let Some(correction) = lpw_correction {
            if correction.len() != rtc.len() {
                return Err(SmileError::DimensionMismatch {
                    expected: rtc.len(),
                    actual: correction.len(),
                });
            }
            rtc.lpw -= correction;
        }
        ReflectanceCalculator::new(rtc, self.toa_scaling)
    }

    pub fn native(&self) -> &RtcSpectra {
        &self.native
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn calculator() -> ReflectanceCalculator {
        let rtc = RtcSpectra {
            lpw: Array1::from_vec(vec![10.0, 20.0, 30.0]),
            egl: Array1::from_vec(vec![1000.0, 900.0, 0.0]),
            sab: Array1::from_vec(vec![0.1, 0.05, 0.0]),
            rat: Array1::from_vec(vec![0.2, 0.2, 0.2]),
        };
        ReflectanceCalculator::new(rtc, 1.0).unwrap()
    }

    /// Forward model used to check the inversion
    fn forward(lpw: f64, egl: f64, sab: f64, rho: f64) -> f64 {
        lpw + egl * rho / (PI * (1.0 - sab * rho))
    }

    #[test]
    fn test_inversion_round_trip() {
        let calc = calculator();
        let toa = forward(10.0, 1000.0, 0.1, 0.25);
        assert_abs_diff_eq!(calc.boa_reflectance(toa, 0), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_denominator_gives_zero() {
        let calc = calculator();
        assert_eq!(calc.boa_reflectance(100.0, 2), 0.0);
    }

    #[test]
    fn test_partial_range() {
        let calc = calculator();
        let toa = [50.0, 60.0, 70.0];
        let mut boa = [-1.0; 3];
        calc.calculate_boa_reflectances_range(&toa, &mut boa, 1, 2).unwrap();

        assert_eq!(boa[0], -1.0);
        assert!(boa[1] > 0.0);
        assert_eq!(boa[2], -1.0);
        assert!(calc.calculate_boa_reflectances_range(&toa, &mut boa, 2, 4).is_err());
    }

    #[test]
    fn test_adjacency_correction() {
        let calc = calculator();
        assert_abs_diff_eq!(calc.adjacency_corrected(0.3, 0.2, 0), 0.32, epsilon = 1e-12);
    }

    #[test]
    fn test_factory_resamples_and_corrects() {
        let wl: Vec<f64> = (0..41).map(|i| 740.0 + i as f64).collect();
        let native = RtcSpectra {
            lpw: Array1::from_elem(wl.len(), 5.0),
            egl: Array1::from_elem(wl.len(), 500.0),
            sab: Array1::from_elem(wl.len(), 0.1),
            rat: Array1::from_elem(wl.len(), 0.0),
        };
        let factory = CalculatorFactory::new(native, 1.0).unwrap();
        let resampler = SpectralResampler::new(&wl, &[760.0], &[5.0], 0.4).unwrap();
        let correction = Array1::from_elem(1, 1.0);

        let calc = factory.create_calculator(&resampler, Some(&correction)).unwrap();
        assert_abs_diff_eq!(calc.rtc().lpw[0], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(calc.rtc().egl[0], 500.0, epsilon = 1e-10);
    }
}
