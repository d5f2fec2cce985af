use crate::core::reflectance::ReflectanceCalculator;
use crate::core::smoother::Smoother;
use crate::types::{pixel_flags, RadianceCube, SmileError, SmileResult, ValidityMask};
use ndarray::{Array1, Array2, ArrayView1, Axis};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Masked per-column mean spectra of a radiance cube
#[derive(Debug, Clone)]
pub struct ColumnSpectra {
    /// Mean radiance (columns x bands); bands without valid samples are 0
    pub means: Array2<f64>,
    /// Number of unflagged pixels per column
    pub valid_pixels: Vec<usize>,
}

impl ColumnSpectra {
    pub fn column(&self, x: usize) -> ArrayView1<'_, f64> {
        self.means.row(x)
    }

    pub fn column_count(&self) -> usize {
        self.means.nrows()
    }
}

/// Builds column mean spectra and their smoothed reflectance references
pub struct ColumnSpectrumAggregator;

impl ColumnSpectrumAggregator {
    /// Mean spectrum of column `x` over unflagged pixels with positive radiance
    pub fn column_mean(
        radiance: &RadianceCube,
        mask: &ValidityMask,
        x: usize,
    ) -> SmileResult<(Array1<f64>, usize)> {
        let (rows, columns, bands) = radiance.dim();
        check_mask(radiance, mask)?;
        if x >= columns {
            return Err(SmileError::OutOfRange(format!(
                "Column {} outside image width {}",
                x, columns
            )));
        }

        let mut sum = Array1::<f64>::zeros(bands);
        let mut count = vec![0usize; bands];
        let mut valid_pixels = 0;

        for y in 0..rows {
            if mask[[y, x]] & pixel_flags::EXCLUDED != 0 {
                continue;
            }
            valid_pixels += 1;
            for (b, &value) in radiance.slice(ndarray::s![y, x, ..]).iter().enumerate() {
                if value > 0.0 {
                    sum[b] += value;
                    count[b] += 1;
                }
            }
        }

        for (b, &n) in count.iter().enumerate() {
            if n > 0 {
                sum[b] /= n as f64;
            }
        }
        Ok((sum, valid_pixels))
    }

    /// Mean spectra of every column, in parallel with the `parallel` feature
    pub fn column_means(radiance: &RadianceCube, mask: &ValidityMask) -> SmileResult<ColumnSpectra> {
        check_mask(radiance, mask)?;
        let (rows, columns, bands) = radiance.dim();
        log::info!(
            "Aggregating column spectra: {} rows x {} columns x {} bands",
            rows,
            columns,
            bands
        );

        #[cfg(feature = "parallel")]
        let results = (0..columns)
            .into_par_iter()
            .map(|x| Self::column_mean(radiance, mask, x))
            .collect::<SmileResult<Vec<_>>>()?;

        #[cfg(not(feature = "parallel"))]
        let results = (0..columns)
            .map(|x| Self::column_mean(radiance, mask, x))
            .collect::<SmileResult<Vec<_>>>()?;

        let mut means = Array2::<f64>::zeros((columns, bands));
        let mut valid_pixels = Vec::with_capacity(columns);
        for (x, (mean, valid)) in results.into_iter().enumerate() {
            means.row_mut(x).assign(&mean);
            valid_pixels.push(valid);
        }

        let empty = valid_pixels.iter().filter(|&&n| n == 0).count();
        if empty > 0 {
            log::warn!("{} of {} columns have no valid pixels", empty, columns);
        }

        Ok(ColumnSpectra {
            means,
            valid_pixels,
        })
    }

    /// Zero-shift reflectance of a mean spectrum, smoothed to drop narrow absorption residue
    pub fn reference_spectrum<S: Smoother + ?Sized>(
        mean: ArrayView1<f64>,
        calculator: &ReflectanceCalculator,
        smoother: &S,
    ) -> SmileResult<Array1<f64>> {
        let toa = mean.to_vec();
        let mut boa = vec![0.0; toa.len()];
        calculator.calculate_boa_reflectances(&toa, &mut boa)?;

        let mut smoothed = vec![0.0; boa.len()];
        smoother.smooth(&boa, &mut smoothed)?;
        Ok(Array1::from_vec(smoothed))
    }

    /// Reference spectra for all columns (columns x bands)
    pub fn reference_spectra<S: Smoother + ?Sized>(
        spectra: &ColumnSpectra,
        calculator: &ReflectanceCalculator,
        smoother: &S,
    ) -> SmileResult<Array2<f64>> {
        #[cfg(feature = "parallel")]
        let rows = spectra
            .means
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|mean| Self::reference_spectrum(mean, calculator, smoother))
            .collect::<SmileResult<Vec<_>>>()?;

        #[cfg(not(feature = "parallel"))]
        let rows = spectra
            .means
            .axis_iter(Axis(0))
            .map(|mean| Self::reference_spectrum(mean, calculator, smoother))
            .collect::<SmileResult<Vec<_>>>()?;

        let mut references = Array2::<f64>::zeros(spectra.means.dim());
        for (x, row) in rows.into_iter().enumerate() {
            references.row_mut(x).assign(&row);
        }
        Ok(references)
    }
}

fn check_mask(radiance: &RadianceCube, mask: &ValidityMask) -> SmileResult<()> {
    let (rows, columns, _) = radiance.dim();
    if mask.dim() != (rows, columns) {
        return Err(SmileError::InvalidInput(format!(
            "Mask is {:?} but radiance is {}x{}",
            mask.dim(),
            rows,
            columns
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::smoother::{LocalRegressionParams, LocalRegressionSmoother};
    use crate::types::RtcSpectra;
    use ndarray::Array3;

    fn cube() -> RadianceCube {
        Array3::from_shape_fn((4, 3, 2), |(y, x, b)| (1 + y + 10 * x + 100 * b) as f64)
    }

    #[test]
    fn test_mean_over_valid_rows() {
        let radiance = cube();
        let mut mask = ValidityMask::zeros((4, 3));
        mask[[0, 1]] = pixel_flags::CLOUD;
        mask[[3, 1]] = pixel_flags::SATURATED;

        let (mean, valid) = ColumnSpectrumAggregator::column_mean(&radiance, &mask, 1).unwrap();
        assert_eq!(valid, 2);
        // rows 1 and 2 of column 1: 12, 13 and 112, 113
        assert_eq!(mean[0], 12.5);
        assert_eq!(mean[1], 112.5);
    }

    #[test]
    fn test_non_positive_radiance_is_skipped_per_band() {
        let mut radiance = cube();
        radiance[[0, 0, 0]] = 0.0;
        radiance[[1, 0, 0]] = -5.0;
        let mask = ValidityMask::zeros((4, 3));

        let (mean, _) = ColumnSpectrumAggregator::column_mean(&radiance, &mask, 0).unwrap();
        assert_eq!(mean[0], 3.5);
        assert_eq!(mean[1], 102.5);
    }

    #[test]
    fn test_fully_masked_column_is_zero() {
        let radiance = cube();
        let mut mask = ValidityMask::zeros((4, 3));
        for y in 0..4 {
            mask[[y, 2]] = pixel_flags::DROPOUT | pixel_flags::IGNORE;
        }

        let spectra = ColumnSpectrumAggregator::column_means(&radiance, &mask).unwrap();
        assert_eq!(spectra.valid_pixels, vec![4, 4, 0]);
        assert!(spectra.column(2).iter().all(|&v| v == 0.0));
        assert!(spectra.means.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_mask_shape_checked() {
        let radiance = cube();
        let mask = ValidityMask::zeros((3, 3));
        assert!(ColumnSpectrumAggregator::column_means(&radiance, &mask).is_err());
    }

    #[test]
    fn test_reference_spectra_are_finite() {
        let radiance = Array3::from_elem((5, 2, 30), 50.0);
        let mask = ValidityMask::zeros((5, 2));
        let spectra = ColumnSpectrumAggregator::column_means(&radiance, &mask).unwrap();

        let rtc = RtcSpectra {
            lpw: Array1::from_elem(30, 10.0),
            egl: Array1::from_elem(30, 1000.0),
            sab: Array1::from_elem(30, 0.1),
            rat: Array1::zeros(30),
        };
        let calculator = ReflectanceCalculator::new(rtc, 1.0).unwrap();
        let smoother = LocalRegressionSmoother::new(LocalRegressionParams::default()).unwrap();

        let references =
            ColumnSpectrumAggregator::reference_spectra(&spectra, &calculator, &smoother).unwrap();
        assert_eq!(references.dim(), (2, 30));
        let expected = calculator.boa_reflectance(50.0, 0);
        assert!(references.iter().all(|&v| (v - expected).abs() < 1e-9));
    }
}
