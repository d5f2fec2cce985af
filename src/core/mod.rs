//! Core smile estimation modules

pub mod minimizer;
pub mod smoother;
pub mod resampler;
pub mod axis_table;
pub mod reflectance;
pub mod aggregator;
pub mod smile;
pub mod reducer;
pub mod pipeline;

// Re-export main types
pub use minimizer::{brack, brent, Bracket, MinimizerParams};
pub use smoother::{LocalRegressionParams, LocalRegressionSmoother, Smoother};
pub use resampler::{ResponseShape, SpectralResampler};
pub use axis_table::{AxisInterpolationTable, AxisScale};
pub use reflectance::{CalculatorFactory, ReflectanceCalculator};
pub use aggregator::{ColumnSpectra, ColumnSpectrumAggregator};
pub use smile::{ColumnShift, ResamplingShiftModel, ShiftModelFactory, SmileShiftEstimator, SmileShiftRaster};
pub use reducer::{ReductionStrategy, SmileShiftReducer};
pub use pipeline::{SceneInput, SmileCorrection, SmileCorrectionParams, SmileCorrectionResult};
