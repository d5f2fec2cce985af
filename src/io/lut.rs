use crate::types::{RtcSpectra, SceneGeometry, SmileError, SmileResult};
use serde::{Deserialize, Serialize};

/// Free axes of the radiative-transfer table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LutAxis {
    /// Aerosol optical thickness
    Aot,
    /// Columnar water vapour
    Cwv,
}

impl std::fmt::Display for LutAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LutAxis::Aot => write!(f, "AOT"),
            LutAxis::Cwv => write!(f, "CWV"),
        }
    }
}

/// Base radiative-transfer lookup table.
///
/// Implementations own loading and their internal multi-axis interpolation;
/// out-of-range geometry is theirs to report.
pub trait RtcLookupTable: Send + Sync {
    /// RTC spectra on [`wavelengths`](Self::wavelengths) for one table query
    fn rtc_spectra(&self, geometry: &SceneGeometry, aot: f64, cwv: f64) -> SmileResult<RtcSpectra>;

    /// Sorted knots of a free axis
    fn dimension(&self, axis: LutAxis) -> &[f64];

    /// Native wavelength grid (nm)
    fn wavelengths(&self) -> &[f64];
}

/// In-memory table holding RTC spectra at the (AOT, CWV) knots of one geometry
#[derive(Debug, Clone)]
pub struct GriddedRtcTable {
    geometry: SceneGeometry,
    wavelengths: Vec<f64>,
    aot: Vec<f64>,
    cwv: Vec<f64>,
    // row-major over (aot, cwv)
    entries: Vec<RtcSpectra>,
}

impl GriddedRtcTable {
    /// Build from knots and entries ordered `entries[aot_index * cwv.len() + cwv_index]`
    pub fn new(
        geometry: SceneGeometry,
        wavelengths: Vec<f64>,
        aot: Vec<f64>,
        cwv: Vec<f64>,
        entries: Vec<RtcSpectra>,
    ) -> SmileResult<Self> {
        for (axis, knots) in [(LutAxis::Aot, &aot), (LutAxis::Cwv, &cwv)] {
            if knots.is_empty() || knots.windows(2).any(|w| w[1] <= w[0]) {
                return Err(SmileError::InvalidInput(format!(
                    "{} knots must be non-empty and strictly increasing",
                    axis
                )));
            }
        }
        if entries.len() != aot.len() * cwv.len() {
            return Err(SmileError::DimensionMismatch {
                expected: aot.len() * cwv.len(),
                actual: entries.len(),
            });
        }
        for entry in &entries {
            entry.validate()?;
            if entry.len() != wavelengths.len() {
                return Err(SmileError::DimensionMismatch {
                    expected: wavelengths.len(),
                    actual: entry.len(),
                });
            }
        }

        log::info!(
            "Loaded RTC table: {} wavelengths, {} AOT x {} CWV knots",
            wavelengths.len(),
            aot.len(),
            cwv.len()
        );

        Ok(Self {
            geometry,
            wavelengths,
            aot,
            cwv,
            entries,
        })
    }

    /// Tabulate a generator over every knot pair
    pub fn from_fn<F>(
        geometry: SceneGeometry,
        wavelengths: Vec<f64>,
        aot: Vec<f64>,
        cwv: Vec<f64>,
        generator: F,
    ) -> SmileResult<Self>
    where
        F: Fn(f64, f64, &[f64]) -> RtcSpectra,
    {
        let entries = aot
            .iter()
            .flat_map(|&a| cwv.iter().map(move |&c| (a, c)))
            .map(|(a, c)| generator(a, c, &wavelengths))
            .collect();
        Self::new(geometry, wavelengths, aot, cwv, entries)
    }

    pub fn geometry(&self) -> &SceneGeometry {
        &self.geometry
    }

    fn knot_index(knots: &[f64], value: f64, axis: LutAxis) -> SmileResult<usize> {
        let tolerance = 1.0e-9 * value.abs().max(1.0);
        knots
            .iter()
            .position(|&k| (k - value).abs() <= tolerance)
            .ok_or_else(|| {
                SmileError::OutOfRange(format!("{} = {} is not a table knot", axis, value))
            })
    }
}

impl RtcLookupTable for GriddedRtcTable {
    fn rtc_spectra(&self, geometry: &SceneGeometry, aot: f64, cwv: f64) -> SmileResult<RtcSpectra> {
        if geometry != &self.geometry {
            return Err(SmileError::OutOfRange(format!(
                "Geometry {:?} differs from tabulated geometry {:?}",
                geometry, self.geometry
            )));
        }
        let i = Self::knot_index(&self.aot, aot, LutAxis::Aot)?;
        let j = Self::knot_index(&self.cwv, cwv, LutAxis::Cwv)?;
        Ok(self.entries[i * self.cwv.len() + j].clone())
    }

    fn dimension(&self, axis: LutAxis) -> &[f64] {
        match axis {
            LutAxis::Aot => &self.aot,
            LutAxis::Cwv => &self.cwv,
        }
    }

    fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }
}
