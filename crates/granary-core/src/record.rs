//! Per-cycle yield records and the upload payload
//!
//! A [`YieldRecord`] is created once per acquisition cycle, is immutable
//! after scoring, and goes out of scope after reporting. Faulted fields are
//! simply absent; the record renders them as "N/A" locally and omits them
//! from the upload payload.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use serde::Serialize;

use crate::sampling::StableReading;
use crate::scoring::{QualityScore, ScoreIndeterminate};
use crate::sensors::{EnvironmentSample, GasKind};

/// Everything one acquisition cycle measured and derived.
#[derive(Clone, Debug)]
pub struct YieldRecord {
    /// Display name of the identified operator.
    pub operator: String,
    pub weight_kg: Option<f32>,
    /// Stabilized per-channel readings; channels whose rounds all faulted
    /// are absent.
    pub gas: Vec<StableReading>,
    pub environment: Option<EnvironmentSample>,
    pub quality: Result<QualityScore, ScoreIndeterminate>,
}

impl YieldRecord {
    pub fn gas_ppm(&self, kind: GasKind) -> Option<f32> {
        self.gas
            .iter()
            .find(|reading| reading.kind == kind)
            .map(|reading| reading.value)
    }

    /// Borrow the record as the upload payload.
    pub fn to_report(&self) -> YieldReport<'_> {
        YieldReport {
            user_name: Some(self.operator.as_str()),
            temperature: self.environment.map(|e| e.temperature_c),
            humidity: self.environment.map(|e| e.humidity_pct),
            load_cell: self.weight_kg,
            nh3_sensor: self.gas_ppm(GasKind::AmmoniaProxy),
            h2_sensor: self.gas_ppm(GasKind::Hydrogen),
            ch4_sensor: self.gas_ppm(GasKind::Methane),
            alcohol_sensor: self.gas_ppm(GasKind::Alcohol),
        }
    }

    /// Summary lines for the local display, absent values shown as "N/A".
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for kind in [
            GasKind::Alcohol,
            GasKind::Methane,
            GasKind::AmmoniaProxy,
            GasKind::Hydrogen,
        ] {
            lines.push(match self.gas_ppm(kind) {
                Some(ppm) => format!("{}: {:.1}ppm", kind.label(), ppm),
                None => format!("{}: N/A", kind.label()),
            });
        }
        lines.push(match &self.quality {
            Ok(quality) => format!("Quality: {:.2}%", quality.percent()),
            Err(_) => String::from("Quality: N/A"),
        });
        lines.push(match self.weight_kg {
            Some(weight) => format!("Weight: {:.2}kg", weight),
            None => String::from("Weight: N/A"),
        });
        lines
    }
}

/// Upload payload. Field names match the logging endpoint's sheet columns;
/// absent values are omitted from the JSON object entirely rather than sent
/// as nulls.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct YieldReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_cell: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nh3_sensor: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h2_sensor: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ch4_sensor: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alcohol_sensor: Option<f32>,
}
