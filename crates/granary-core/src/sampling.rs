//! Noisy-channel stabilization and lock-step multi-channel sampling
//!
//! Analog channels settle for a while after power-up or a mux switch, and
//! the readings that follow still carry high-frequency converter noise.
//! [`read_stable`] discards a burst of settling reads and then averages a
//! fixed window of converted samples into one trustworthy scalar.
//! [`sample_all`] applies the same discard/average policy to a whole bank of
//! gas channels in lock-step rounds, so the per-channel averages represent
//! the same instant to within one round.

use alloc::vec::Vec;

use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use log::warn;
use thiserror_no_std::Error;

use crate::sensors::{AnalogChannel, GasChannel, GasKind, SensorError, WeightSensor};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The mean of zero samples is undefined.
    #[error("sample count must be at least 1")]
    ZeroSampleCount,
}

/// Discard/average window for one stabilized acquisition.
///
/// `sample_count >= 1` is enforced at construction; the stock windows below
/// match the station's channel settling characteristics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplingParams {
    ignore_count: usize,
    sample_count: usize,
    interval: Duration,
}

impl SamplingParams {
    /// MQ gas channels: fast to settle, sampled at 10 Hz.
    pub const GAS_DEFAULT: Self = Self {
        ignore_count: 10,
        sample_count: 20,
        interval: Duration::from_millis(100),
    };

    /// Load cell: slower converter, sampled at 2 Hz.
    pub const WEIGHT_DEFAULT: Self = Self {
        ignore_count: 10,
        sample_count: 20,
        interval: Duration::from_millis(500),
    };

    pub const fn new(
        ignore_count: usize,
        sample_count: usize,
        interval: Duration,
    ) -> Result<Self, ConfigError> {
        if sample_count == 0 {
            return Err(ConfigError::ZeroSampleCount);
        }
        Ok(Self {
            ignore_count,
            sample_count,
            interval,
        })
    }

    pub const fn ignore_count(&self) -> usize {
        self.ignore_count
    }

    pub const fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    fn interval_ms(&self) -> u32 {
        self.interval.as_millis() as u32
    }
}

/// One stabilized per-channel result: the arithmetic mean of the
/// post-settling converted reads that survived fault exclusion.
/// `sample_count >= 1` by construction; a channel whose reads all faulted
/// produces no reading at all.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StableReading {
    pub kind: GasKind,
    pub value: f32,
    pub sample_count: usize,
}

/// Anything [`read_stable`] can average: a calibrated gas channel, the load
/// cell, or an injected test sequence.
pub trait SampleSource {
    /// Name used when logging excluded faulted reads.
    fn name(&self) -> &'static str;

    async fn sample(&mut self) -> Result<f32, SensorError>;
}

impl<C: AnalogChannel> SampleSource for GasChannel<C> {
    fn name(&self) -> &'static str {
        self.kind().label()
    }

    async fn sample(&mut self) -> Result<f32, SensorError> {
        self.sample_ppm().await
    }
}

/// Adapter lending a [`WeightSensor`] to [`read_stable`].
pub struct WeightSource<'a, W>(pub &'a mut W);

impl<W: WeightSensor> SampleSource for WeightSource<'_, W> {
    fn name(&self) -> &'static str {
        "scale"
    }

    async fn sample(&mut self) -> Result<f32, SensorError> {
        self.0.read_kg().await
    }
}

/// Read one source into a stable scalar.
///
/// Performs `ignore_count` discarded reads (settling transient), then
/// averages `sample_count` converted reads, pausing `interval` after every
/// read including the discard phase. Faulted reads are logged and excluded
/// from the mean; `None` is returned only if every sampling read faulted.
pub async fn read_stable<S, D>(source: &mut S, params: &SamplingParams, delay: &mut D) -> Option<f32>
where
    S: SampleSource,
    D: DelayNs,
{
    for _ in 0..params.ignore_count() {
        let _ = source.sample().await;
        delay.delay_ms(params.interval_ms()).await;
    }

    let mut sum = 0.0f32;
    let mut kept = 0usize;
    for _ in 0..params.sample_count() {
        match source.sample().await {
            Ok(value) => {
                sum += value;
                kept += 1;
            }
            Err(e) => warn!("{}: sample excluded: {}", source.name(), e),
        }
        delay.delay_ms(params.interval_ms()).await;
    }

    (kept > 0).then(|| sum / kept as f32)
}

/// Sample a bank of gas channels in lock-step.
///
/// Each round reads every channel once, in slice order, then applies a
/// single inter-round delay; this bounds the time skew between channels to
/// one round, which matters because the scorer combines the averages as if
/// they were taken at the same instant. The first `ignore_count` rounds are
/// discarded for all channels together; the next `sample_count` rounds are
/// averaged per channel independently.
///
/// A faulted read is excluded from that channel's mean without disturbing
/// the round for the other channels. The result is parallel to `channels`;
/// an entry is `None` only if all of that channel's rounds faulted.
pub async fn sample_all<C, D>(
    channels: &mut [GasChannel<C>],
    params: &SamplingParams,
    delay: &mut D,
) -> Vec<Option<StableReading>>
where
    C: AnalogChannel,
    D: DelayNs,
{
    let mut sums = alloc::vec![0.0f32; channels.len()];
    let mut kept = alloc::vec![0usize; channels.len()];

    for _ in 0..params.ignore_count() {
        for channel in channels.iter_mut() {
            let _ = channel.sample_ppm().await;
        }
        delay.delay_ms(params.interval_ms()).await;
    }

    for _ in 0..params.sample_count() {
        for (i, channel) in channels.iter_mut().enumerate() {
            match channel.sample_ppm().await {
                Ok(ppm) => {
                    sums[i] += ppm;
                    kept[i] += 1;
                }
                Err(e) => warn!("{}: round excluded: {}", channel.kind().label(), e),
            }
        }
        delay.delay_ms(params.interval_ms()).await;
    }

    channels
        .iter()
        .enumerate()
        .map(|(i, channel)| {
            (kept[i] > 0).then(|| StableReading {
                kind: channel.kind(),
                value: sums[i] / kept[i] as f32,
                sample_count: kept[i],
            })
        })
        .collect()
}
