//! Synthetic peripherals for the desktop simulator
//!
//! Each type implements one of the core's hardware traits with scripted or
//! seeded-noise behavior so complete acquisition cycles can run without a
//! station attached.

use std::collections::VecDeque;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use embedded_hal_async::delay::DelayNs;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use granary_core::cycle::{DisplaySink, UploadError, UploadSink};
use granary_core::record::YieldReport;
use granary_core::sensors::{
    Actuator, AnalogChannel, EnvironmentSample, EnvironmentSensor, ReadySignal, SensorError, TagId,
    TagReader, WeightSensor,
};

/// Wall-clock delay provider with time compression, so a cycle that takes
/// minutes on the bench runs in moments here.
pub struct SimDelay {
    pub compression: u32,
}

impl DelayNs for SimDelay {
    async fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(
            (ns / self.compression.max(1)) as u64,
        ));
    }
}

/// Scripted RFID reader: each poll pops the next scripted response; an
/// exhausted script reads as "nothing in range".
pub struct SimTagReader {
    script: VecDeque<Option<&'static str>>,
}

impl SimTagReader {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
        }
    }

    /// Script `polls` attempts with no tag in range.
    pub fn queue_absent(&mut self, polls: usize) {
        for _ in 0..polls {
            self.script.push_back(None);
        }
    }

    /// Script a tag appearing after `after_polls` empty attempts.
    pub fn queue_tag(&mut self, after_polls: usize, uid: &'static str) {
        self.queue_absent(after_polls);
        self.script.push_back(Some(uid));
    }
}

impl TagReader for SimTagReader {
    async fn poll_tag(&mut self) -> Result<Option<TagId>, SensorError> {
        match self.script.pop_front().flatten() {
            Some(uid) => {
                let uid = TagId::from_str(uid).map_err(|_| SensorError::ReadFailed {
                    sensor: "rfid",
                    details: "uid overflow",
                })?;
                Ok(Some(uid))
            }
            None => Ok(None),
        }
    }
}

/// Analog gas channel with a fixed baseline and seeded converter noise.
pub struct SimGasChannel {
    baseline: u16,
    jitter: u16,
    rng: StdRng,
}

impl SimGasChannel {
    pub fn new(baseline: u16, jitter: u16, seed: u64) -> Self {
        Self {
            baseline,
            jitter,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl AnalogChannel for SimGasChannel {
    async fn read_raw(&mut self) -> Result<u16, SensorError> {
        let swing = self.rng.gen_range(0..=self.jitter as i32 * 2) - self.jitter as i32;
        Ok((self.baseline as i32 + swing).clamp(0, 4095) as u16)
    }
}

/// Load cell that reads a noisy constant load, then reads empty once the
/// scripted number of reads has elapsed (the operator clearing the
/// platform).
pub struct SimScale {
    loaded_kg: f32,
    noise_kg: f32,
    reads_before_clear: usize,
    reads: usize,
    rng: StdRng,
}

impl SimScale {
    pub fn new(loaded_kg: f32, noise_kg: f32, reads_before_clear: usize, seed: u64) -> Self {
        Self {
            loaded_kg,
            noise_kg,
            reads_before_clear,
            reads: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl WeightSensor for SimScale {
    async fn read_kg(&mut self) -> Result<f32, SensorError> {
        self.reads += 1;
        if self.reads > self.reads_before_clear {
            return Ok(0.0);
        }
        Ok(self.loaded_kg + self.rng.gen_range(-self.noise_kg..self.noise_kg))
    }
}

/// Temperature/humidity sensor around a fixed operating point. A non-zero
/// `fail_every` makes every n-th measurement fault, to exercise the
/// degraded-record path.
pub struct SimEnvironment {
    temperature_c: f32,
    humidity_pct: f32,
    fail_every: usize,
    reads: usize,
    rng: StdRng,
}

impl SimEnvironment {
    pub fn new(temperature_c: f32, humidity_pct: f32, fail_every: usize, seed: u64) -> Self {
        Self {
            temperature_c,
            humidity_pct,
            fail_every,
            reads: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl EnvironmentSensor for SimEnvironment {
    async fn measure(&mut self) -> Result<EnvironmentSample, SensorError> {
        self.reads += 1;
        if self.fail_every != 0 && self.reads % self.fail_every == 0 {
            return Err(SensorError::ReadFailed {
                sensor: "dht",
                details: "checksum failure",
            });
        }
        Ok(EnvironmentSample {
            temperature_c: self.temperature_c + self.rng.gen_range(-0.4..0.4),
            humidity_pct: self.humidity_pct + self.rng.gen_range(-0.8..0.8),
        })
    }
}

/// Yield-ready button that reads active after a scripted number of polls.
pub struct SimButton {
    polls_until_ready: usize,
}

impl SimButton {
    pub fn new(polls_until_ready: usize) -> Self {
        Self { polls_until_ready }
    }
}

impl ReadySignal for SimButton {
    fn is_ready(&mut self) -> bool {
        if self.polls_until_ready == 0 {
            true
        } else {
            self.polls_until_ready -= 1;
            false
        }
    }
}

pub struct SimActuator;

impl Actuator for SimActuator {
    fn set_active(&mut self, on: bool) {
        info!("[actuator] {}", if on { "ON" } else { "OFF" });
    }
}

pub struct ConsoleDisplay;

impl DisplaySink for ConsoleDisplay {
    fn render(&mut self, lines: &[String]) {
        for line in lines {
            info!("[display] {line}");
        }
    }
}

/// Upload boundary: serializes the report the way the HTTP client would and
/// logs the request instead of sending it.
pub struct SheetUploader {
    pub endpoint: &'static str,
}

impl UploadSink for SheetUploader {
    async fn upload(&mut self, report: &YieldReport<'_>) -> Result<(), UploadError> {
        let body = serde_json::to_string(report).map_err(|_| UploadError::Transport {
            details: "serialization failed",
        })?;
        info!("POST {} application/json {}", self.endpoint, body);
        Ok(())
    }
}
