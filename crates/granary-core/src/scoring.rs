//! Composite quality scoring
//!
//! Combines the stabilized gas concentrations, the yield weight, and the
//! ambient environment into a single bounded score in `[0, 100]`. Each
//! factor is scored on `[0, 1]` by a piecewise rule, then the factors are
//! folded into a weighted sum normalized so that 100 is the theoretical
//! maximum when every factor is at 1.
//!
//! Gas factors degrade linearly with concentration per kilogram of yield
//! (a larger yield tolerates more absolute off-gassing before the same
//! quality penalty). Temperature and humidity are flat inside their target
//! bands and fall off linearly outside them.

use thiserror_no_std::Error;

use crate::sensors::{EnvironmentSample, GasKind};

/// Cold-storage temperature band, flat score inside.
pub const TEMPERATURE_BAND_MIN_C: f32 = 0.0;
pub const TEMPERATURE_BAND_MAX_C: f32 = 15.0;
/// Span over which the temperature score falls from 1 to 0 outside the band.
pub const TEMPERATURE_FALLOFF_C: f32 = 15.0;

/// Target relative-humidity band, flat score inside.
pub const HUMIDITY_BAND_MIN_PCT: f32 = 85.0;
pub const HUMIDITY_BAND_MAX_PCT: f32 = 90.0;
/// Span over which the humidity score falls from 1 to 0 either side of the band.
pub const HUMIDITY_FALLOFF_PCT: f32 = 5.0;

const ALCOHOL_WEIGHT: f32 = 2.0;
const METHANE_WEIGHT: f32 = 2.0;
const AMMONIA_WEIGHT: f32 = 4.0;
const HYDROGEN_WEIGHT: f32 = 2.0;
const TEMPERATURE_WEIGHT: f32 = 1.0;
const HUMIDITY_WEIGHT: f32 = 1.0;
const TOTAL_WEIGHT: f32 = ALCOHOL_WEIGHT
    + METHANE_WEIGHT
    + AMMONIA_WEIGHT
    + HYDROGEN_WEIGHT
    + TEMPERATURE_WEIGHT
    + HUMIDITY_WEIGHT;

/// Per-gas tolerance in ppm per kilogram of yield. A reading at
/// `weight * tolerance` zeroes that gas factor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityThresholds {
    pub methane_ppm_per_kg: f32,
    pub alcohol_ppm_per_kg: f32,
    pub hydrogen_ppm_per_kg: f32,
    pub ammonia_ppm_per_kg: f32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            methane_ppm_per_kg: 55.0,
            alcohol_ppm_per_kg: 0.4,
            hydrogen_ppm_per_kg: 1.0,
            ammonia_ppm_per_kg: 0.4,
        }
    }
}

/// Composite quality in `[0, 100]`. Only the scorer constructs one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityScore(f32);

impl QualityScore {
    pub fn percent(self) -> f32 {
        self.0
    }
}

/// Scoring could not produce a number. Surfaced on the report as "N/A";
/// never a crash or a NaN.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreIndeterminate {
    /// Weight absent or non-positive; the gas factors divide by it.
    #[error("no yield weight available")]
    NoYieldWeight,
    #[error("missing gas reading: {gas:?}")]
    MissingGas { gas: GasKind },
    #[error("environment reading unavailable")]
    MissingEnvironment,
}

/// Everything the scorer consumes. Absent fields short-circuit to
/// [`ScoreIndeterminate`] rather than entering a faulted comparison.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScoreInputs {
    pub weight_kg: Option<f32>,
    pub methane_ppm: Option<f32>,
    pub alcohol_ppm: Option<f32>,
    pub hydrogen_ppm: Option<f32>,
    pub ammonia_ppm: Option<f32>,
    pub environment: Option<EnvironmentSample>,
}

/// Linear per-kilogram gas penalty, clamped at zero.
pub fn gas_factor(ppm: f32, weight_kg: f32, tolerance_ppm_per_kg: f32) -> f32 {
    (1.0 - ppm / (weight_kg * tolerance_ppm_per_kg)).max(0.0)
}

pub fn temperature_factor(temperature_c: f32) -> f32 {
    if temperature_c < TEMPERATURE_BAND_MIN_C {
        (1.0 + temperature_c / TEMPERATURE_FALLOFF_C).max(0.0)
    } else if temperature_c > TEMPERATURE_BAND_MAX_C {
        (1.0 - (temperature_c - TEMPERATURE_BAND_MAX_C) / TEMPERATURE_FALLOFF_C).max(0.0)
    } else {
        1.0
    }
}

pub fn humidity_factor(humidity_pct: f32) -> f32 {
    if humidity_pct < HUMIDITY_BAND_MIN_PCT {
        (1.0 - (HUMIDITY_BAND_MIN_PCT - humidity_pct) / HUMIDITY_FALLOFF_PCT).max(0.0)
    } else if humidity_pct > HUMIDITY_BAND_MAX_PCT {
        (1.0 - (humidity_pct - HUMIDITY_BAND_MAX_PCT) / HUMIDITY_FALLOFF_PCT).max(0.0)
    } else {
        1.0
    }
}

/// Score one yield.
///
/// Requires a positive weight, all four gas readings, and an environment
/// sample; anything missing yields the matching [`ScoreIndeterminate`].
pub fn score(
    inputs: &ScoreInputs,
    thresholds: &QualityThresholds,
) -> Result<QualityScore, ScoreIndeterminate> {
    let weight_kg = match inputs.weight_kg {
        Some(w) if w > 0.0 => w,
        _ => return Err(ScoreIndeterminate::NoYieldWeight),
    };
    let methane = inputs.methane_ppm.ok_or(ScoreIndeterminate::MissingGas {
        gas: GasKind::Methane,
    })?;
    let alcohol = inputs.alcohol_ppm.ok_or(ScoreIndeterminate::MissingGas {
        gas: GasKind::Alcohol,
    })?;
    let hydrogen = inputs.hydrogen_ppm.ok_or(ScoreIndeterminate::MissingGas {
        gas: GasKind::Hydrogen,
    })?;
    let ammonia = inputs.ammonia_ppm.ok_or(ScoreIndeterminate::MissingGas {
        gas: GasKind::AmmoniaProxy,
    })?;
    let environment = inputs
        .environment
        .ok_or(ScoreIndeterminate::MissingEnvironment)?;

    let q_methane = gas_factor(methane, weight_kg, thresholds.methane_ppm_per_kg);
    let q_alcohol = gas_factor(alcohol, weight_kg, thresholds.alcohol_ppm_per_kg);
    let q_hydrogen = gas_factor(hydrogen, weight_kg, thresholds.hydrogen_ppm_per_kg);
    let q_ammonia = gas_factor(ammonia, weight_kg, thresholds.ammonia_ppm_per_kg);
    let q_temperature = temperature_factor(environment.temperature_c);
    let q_humidity = humidity_factor(environment.humidity_pct);

    let composite = (ALCOHOL_WEIGHT * q_alcohol
        + METHANE_WEIGHT * q_methane
        + AMMONIA_WEIGHT * q_ammonia
        + HYDROGEN_WEIGHT * q_hydrogen
        + TEMPERATURE_WEIGHT * q_temperature
        + HUMIDITY_WEIGHT * q_humidity)
        * 100.0
        / TOTAL_WEIGHT;

    Ok(QualityScore(composite))
}
