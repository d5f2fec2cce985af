use crate::core::smoother::{median, LocalRegressionParams, LocalRegressionSmoother, Smoother};
use crate::types::{SmileError, SmileResult};
use serde::{Deserialize, Serialize};

/// How the per-column shifts collapse into one scene value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReductionStrategy {
    /// Median of all column shifts
    Median,
    /// Arithmetic mean after local smoothing of the column sequence
    SmoothedMean,
}

impl ReductionStrategy {
    pub fn from_use_median(use_median: bool) -> Self {
        if use_median {
            ReductionStrategy::Median
        } else {
            ReductionStrategy::SmoothedMean
        }
    }
}

/// Collapses a smile-shift raster to the scene-wide shift
pub struct SmileShiftReducer {
    strategy: ReductionStrategy,
    smoother: LocalRegressionSmoother,
}

impl SmileShiftReducer {
    pub fn new(strategy: ReductionStrategy) -> SmileResult<Self> {
        Self::with_smoother_params(strategy, LocalRegressionParams::column_shifts())
    }

    pub fn with_smoother_params(
        strategy: ReductionStrategy,
        params: LocalRegressionParams,
    ) -> SmileResult<Self> {
        Ok(Self {
            strategy,
            smoother: LocalRegressionSmoother::new(params)?,
        })
    }

    pub fn strategy(&self) -> ReductionStrategy {
        self.strategy
    }

    pub fn reduce(&self, shifts: &[f64]) -> SmileResult<f64> {
        if shifts.is_empty() {
            return Err(SmileError::InvalidInput(
                "Cannot reduce an empty shift raster".to_string(),
            ));
        }

        let shift = match self.strategy {
            ReductionStrategy::Median => median(shifts).unwrap_or(0.0),
            ReductionStrategy::SmoothedMean => {
                let mut smoothed = vec![0.0; shifts.len()];
                self.smoother.smooth(shifts, &mut smoothed)?;
                log::debug!(
                    "Smoothed column shifts range {:.4}..{:.4} nm",
                    smoothed.iter().cloned().fold(f64::INFINITY, f64::min),
                    smoothed.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
                );
                // TODO: decide whether the mean should be taken over `smoothed`;
                // the mean of the raw shifts matches the established products.
                shifts.iter().sum::<f64>() / shifts.len() as f64
            }
        };

        log::info!(
            "Scene smile shift ({:?} of {} columns): {:.5} nm",
            self.strategy,
            shifts.len(),
            shift
        );
        Ok(shift)
    }
}
