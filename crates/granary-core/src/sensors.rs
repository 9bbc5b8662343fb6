//! Sensor trait seams and fault types
//!
//! Every physical input the station touches is reached through one of the
//! traits in this module, so the acquisition pipeline stays independent of
//! the hardware bindings (and runs against synthetic peripherals in the
//! simulator and tests).

use serde::Serialize;
use thiserror_no_std::Error;

use crate::calibration::{AdcTransfer, CalibrationCurve};

/// Opaque identifier produced by the identity source (uppercase hex UID).
pub type TagId = heapless::String<32>;

/// A single reading being unavailable. Faulted reads are excluded from
/// averages and degrade one field of the cycle's record; they never abort
/// the cycle.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: read failed ({details})")]
    ReadFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: timed out waiting for {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
}

/// The gas factors the station measures, one analog channel each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GasKind {
    Alcohol,
    Methane,
    Hydrogen,
    /// MQ-135 air-quality reading, treated as an ammonia proxy.
    AmmoniaProxy,
}

impl GasKind {
    pub const ALL: [GasKind; 4] = [
        GasKind::Alcohol,
        GasKind::Methane,
        GasKind::Hydrogen,
        GasKind::AmmoniaProxy,
    ];

    /// Short label used on the display.
    pub const fn label(self) -> &'static str {
        match self {
            GasKind::Alcohol => "Alcohol",
            GasKind::Methane => "Methane",
            GasKind::Hydrogen => "Hydrogen",
            GasKind::AmmoniaProxy => "Air Q",
        }
    }
}

/// Raw analog input in `[0, max_adc]` counts.
pub trait AnalogChannel {
    async fn read_raw(&mut self) -> Result<u16, SensorError>;
}

/// Load cell, post-tare and post-scale, reading in kilograms.
pub trait WeightSensor {
    async fn read_kg(&mut self) -> Result<f32, SensorError>;
}

/// Combined temperature and relative-humidity reading.
///
/// The originating sensor reports both values or faults as a whole, so a
/// partially-valid pair cannot be constructed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EnvironmentSample {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Ambient temperature/humidity sensor.
pub trait EnvironmentSensor {
    async fn measure(&mut self) -> Result<EnvironmentSample, SensorError>;
}

/// Identity source. One call is one poll attempt; `None` means no tag was
/// in range during this attempt.
pub trait TagReader {
    async fn poll_tag(&mut self) -> Result<Option<TagId>, SensorError>;
}

/// Yield-ready signal (button), debounced externally.
pub trait ReadySignal {
    fn is_ready(&mut self) -> bool;
}

/// Offload actuator (fan).
pub trait Actuator {
    fn set_active(&mut self, on: bool);
}

/// One configured analog gas channel: the measured gas, the converter's
/// transfer function, and the sensor's fitted calibration curve.
/// Immutable once constructed.
pub struct GasChannel<C> {
    kind: GasKind,
    adc: AdcTransfer,
    curve: CalibrationCurve,
    input: C,
}

impl<C: AnalogChannel> GasChannel<C> {
    pub fn new(kind: GasKind, input: C, adc: AdcTransfer, curve: CalibrationCurve) -> Self {
        Self {
            kind,
            adc,
            curve,
            input,
        }
    }

    pub fn kind(&self) -> GasKind {
        self.kind
    }

    /// Read the channel once and convert to ppm.
    pub async fn sample_ppm(&mut self) -> Result<f32, SensorError> {
        let raw = self.input.read_raw().await?;
        Ok(self.curve.convert(self.adc.to_volts(raw)))
    }
}
