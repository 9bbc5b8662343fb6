//! Desktop simulator for the granary-rs yield intake station.
//!
//! Drives complete acquisition cycles against synthetic peripherals so the
//! pipeline can be exercised without hardware: a scripted RFID reader, a
//! noisy four-channel gas bank, a load cell that clears itself after the
//! yield is "offloaded", and a logging upload sink standing in for the
//! HTTP endpoint.
//!
//! The scripted session runs three cycles: one identity timeout, one
//! unregistered tag, and one full weigh-score-report pass.

mod peripherals;

use embassy_futures::block_on;
use log::info;

use granary_core::calibration::{AdcTransfer, CalibrationCurve};
use granary_core::config::{OperatorRegistry, StationConfig};
use granary_core::cycle::{AcquisitionCycle, CycleOutcome};
use granary_core::sensors::{GasChannel, GasKind};

use peripherals::{
    ConsoleDisplay, SheetUploader, SimActuator, SimButton, SimDelay, SimEnvironment,
    SimGasChannel, SimScale, SimTagReader,
};

// ---------------------------------------------------------------------------
// Scripted session
// ---------------------------------------------------------------------------

const OPERATORS: &[(&str, &str)] = &[
    ("04A37C92", "Asha"),
    ("1CB9F2D4", "Rafi"),
    ("7F30E6A1", "Mina"),
];

const UPLOAD_ENDPOINT: &str = "https://sheets.example.com/api/yield-log";

/// Wall-clock divisor applied to every delay; a full bench cycle compresses
/// from minutes to about a second.
const TIME_COMPRESSION: u32 = 200;

const CYCLES: usize = 3;

/// Identity polls in one window: 7 s window at 100 ms per poll.
const POLLS_PER_IDENTITY_WINDOW: usize = 70;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Starting granary station simulator");
    info!("Upload endpoint: {UPLOAD_ENDPOINT}");

    let mut tags = SimTagReader::new();
    // Cycle 1: nobody presents a tag for the whole window.
    tags.queue_absent(POLLS_PER_IDENTITY_WINDOW);
    // Cycle 2: an unregistered tag shows up after a few polls.
    tags.queue_tag(4, "DEADBEEF");
    // Cycle 3: Asha logs a yield.
    tags.queue_tag(2, "04A37C92");

    let gas_channels = vec![
        GasChannel::new(
            GasKind::Alcohol,
            SimGasChannel::new(40, 6, 11),
            AdcTransfer::ESP32_12BIT,
            CalibrationCurve::MQ3_ALCOHOL,
        ),
        GasChannel::new(
            GasKind::Methane,
            SimGasChannel::new(160, 12, 12),
            AdcTransfer::ESP32_12BIT,
            CalibrationCurve::MQ4_METHANE,
        ),
        GasChannel::new(
            GasKind::Hydrogen,
            SimGasChannel::new(55, 8, 13),
            AdcTransfer::ESP32_12BIT,
            CalibrationCurve::MQ8_HYDROGEN,
        ),
        GasChannel::new(
            GasKind::AmmoniaProxy,
            SimGasChannel::new(90, 10, 14),
            AdcTransfer::ESP32_12BIT,
            CalibrationCurve::MQ135_AMMONIA,
        ),
    ];

    // Weight sampling takes 30 reads (10 settling + 20 averaged); the
    // platform then clears a few offload polls later.
    let scale = SimScale::new(3.09, 0.015, 36, 21);

    let mut station = AcquisitionCycle::new(
        StationConfig::default(),
        OperatorRegistry::new(OPERATORS),
        tags,
        SimButton::new(6),
        scale,
        SimEnvironment::new(11.8, 86.5, 0, 31),
        gas_channels,
        SimActuator,
        ConsoleDisplay,
        SheetUploader {
            endpoint: UPLOAD_ENDPOINT,
        },
        SimDelay {
            compression: TIME_COMPRESSION,
        },
    );

    block_on(async {
        for cycle in 1..=CYCLES {
            info!("--- acquisition cycle {cycle} ---");
            match station.run_once().await {
                CycleOutcome::Completed(record) => match record.weight_kg {
                    Some(weight) => {
                        info!("cycle {cycle} complete: {} logged {weight:.2} kg", record.operator)
                    }
                    None => info!("cycle {cycle} complete: {} (no stable weight)", record.operator),
                },
                CycleOutcome::NoIdentity => info!("cycle {cycle}: no identity presented"),
                CycleOutcome::UnknownIdentity(uid) => {
                    info!("cycle {cycle}: unrecognized tag {uid}")
                }
            }
        }
    });

    info!("Simulator exiting");
}
