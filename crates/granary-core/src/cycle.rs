//! Acquisition-cycle orchestrator
//!
//! One call to [`AcquisitionCycle::run_once`] walks a single pass of the
//! station's state machine:
//!
//! ```text
//! IDLE -> AWAIT_IDENTITY -> AWAIT_YIELD_READY -> SAMPLING -> SCORING
//!      -> REPORTING -> AWAIT_OFFLOAD -> IDLE
//! ```
//!
//! Identity acquisition is bounded by a poll window; an unknown or absent
//! tag aborts the cycle back to idle. Every wait is cooperative polling
//! through the injected delay provider, so a single logical task services
//! the whole station. Sensor faults degrade individual record fields to
//! absent; upload failures are logged and dropped. Nothing in steady-state
//! operation is fatal.
//!
//! All peripherals are owned by the orchestrator for the life of the
//! process and handed in at construction.

use alloc::string::String;
use alloc::vec::Vec;

use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use crate::config::{OperatorRegistry, StationConfig};
use crate::record::{YieldRecord, YieldReport};
use crate::sampling::{StableReading, WeightSource, read_stable, sample_all};
use crate::scoring::{ScoreInputs, score};
use crate::sensors::{
    Actuator, AnalogChannel, EnvironmentSensor, GasChannel, GasKind, ReadySignal, TagId, TagReader,
    WeightSensor,
};

/// A record failed to reach the logging endpoint. Logged, never retried
/// within the cycle; the next cycle proceeds normally.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError {
    #[error("endpoint rejected the record (status {status})")]
    Rejected { status: u16 },
    #[error("transport failed: {details}")]
    Transport { details: &'static str },
}

/// Local display. Layout is the sink's concern; the cycle only supplies
/// ordered lines.
pub trait DisplaySink {
    fn render(&mut self, lines: &[String]);
}

/// Remote record logging endpoint.
pub trait UploadSink {
    async fn upload(&mut self, report: &YieldReport<'_>) -> Result<(), UploadError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    AwaitIdentity,
    AwaitYieldReady,
    Sampling,
    Scoring,
    Reporting,
    AwaitOffload,
}

/// How one pass of the state machine ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A yield was weighed, scored, and reported.
    Completed(YieldRecord),
    /// The identity window elapsed with no tag produced. Retried next pass.
    NoIdentity,
    /// A tag was produced but is not in the registry.
    UnknownIdentity(TagId),
}

enum IdentityOutcome {
    Identified { name: &'static str },
    Unknown(TagId),
    NoTag,
}

pub struct AcquisitionCycle<T, B, S, E, C, A, O, U, D> {
    config: StationConfig,
    registry: OperatorRegistry,
    phase: CyclePhase,
    tags: T,
    ready: B,
    scale: S,
    environment: E,
    gas_channels: Vec<GasChannel<C>>,
    actuator: A,
    display: O,
    uplink: U,
    delay: D,
}

impl<T, B, S, E, C, A, O, U, D> AcquisitionCycle<T, B, S, E, C, A, O, U, D>
where
    T: TagReader,
    B: ReadySignal,
    S: WeightSensor,
    E: EnvironmentSensor,
    C: AnalogChannel,
    A: Actuator,
    O: DisplaySink,
    U: UploadSink,
    D: DelayNs,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: StationConfig,
        registry: OperatorRegistry,
        tags: T,
        ready: B,
        scale: S,
        environment: E,
        gas_channels: Vec<GasChannel<C>>,
        actuator: A,
        display: O,
        uplink: U,
        delay: D,
    ) -> Self {
        Self {
            config,
            registry,
            phase: CyclePhase::Idle,
            tags,
            ready,
            scale,
            environment,
            gas_channels,
            actuator,
            display,
            uplink,
            delay,
        }
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Run one full pass of the state machine.
    pub async fn run_once(&mut self) -> CycleOutcome {
        self.enter(CyclePhase::AwaitIdentity);
        self.show(&["Scan your tag"]);

        let name = match self.await_identity().await {
            IdentityOutcome::Identified { name } => name,
            IdentityOutcome::Unknown(uid) => {
                warn!("unknown tag {}", uid);
                self.show(&["Unknown operator"]);
                self.enter(CyclePhase::Idle);
                return CycleOutcome::UnknownIdentity(uid);
            }
            IdentityOutcome::NoTag => {
                info!("no tag within identity window");
                self.show(&["No tag detected", "Try again"]);
                self.enter(CyclePhase::Idle);
                return CycleOutcome::NoIdentity;
            }
        };

        self.show(&["Welcome", name]);
        self.enter(CyclePhase::AwaitYieldReady);
        self.show(&["Place your yield"]);
        self.await_yield_ready().await;

        self.enter(CyclePhase::Sampling);
        let record = self.acquire(name).await;

        self.enter(CyclePhase::Reporting);
        self.report(&record).await;
        self.delay
            .delay_ms(self.config.post_report_hold.as_millis() as u32)
            .await;
        self.show(&["Offload your yield"]);

        self.enter(CyclePhase::AwaitOffload);
        self.await_offload().await;

        self.enter(CyclePhase::Idle);
        CycleOutcome::Completed(record)
    }

    fn enter(&mut self, phase: CyclePhase) {
        debug!("phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn show(&mut self, lines: &[&str]) {
        let lines: Vec<String> = lines.iter().map(|line| String::from(*line)).collect();
        self.display.render(&lines);
    }

    /// Poll the tag reader for up to the configured window.
    ///
    /// Reader faults count as "nothing in range this attempt"; the window
    /// keeps running.
    async fn await_identity(&mut self) -> IdentityOutcome {
        let poll_ms = (self.config.identity.poll_interval.as_millis() as u32).max(1);
        let attempts = (self.config.identity.window.as_millis() / poll_ms as u64).max(1);

        for _ in 0..attempts {
            match self.tags.poll_tag().await {
                Ok(Some(uid)) => {
                    return match self.registry.name_for(uid.as_str()) {
                        Some(name) => {
                            info!("tag {} identified as {}", uid, name);
                            IdentityOutcome::Identified { name }
                        }
                        None => IdentityOutcome::Unknown(uid),
                    };
                }
                Ok(None) => {}
                Err(e) => warn!("tag reader: {}", e),
            }
            self.delay.delay_ms(poll_ms).await;
        }
        IdentityOutcome::NoTag
    }

    async fn await_yield_ready(&mut self) {
        let poll_ms = (self.config.ready_poll_interval.as_millis() as u32).max(1);
        while !self.ready.is_ready() {
            self.delay.delay_ms(poll_ms).await;
        }
    }

    /// Sample weight, gas bank, and environment, then score the yield.
    /// Any sensor fault leaves its field absent without aborting.
    async fn acquire(&mut self, operator: &'static str) -> YieldRecord {
        let weight_kg = read_stable(
            &mut WeightSource(&mut self.scale),
            &self.config.weight_sampling,
            &mut self.delay,
        )
        .await;
        if weight_kg.is_none() {
            warn!("scale: no stable weight this cycle");
        }

        let gas: Vec<StableReading> = sample_all(
            &mut self.gas_channels,
            &self.config.gas_sampling,
            &mut self.delay,
        )
        .await
        .into_iter()
        .flatten()
        .collect();

        let environment = match self.environment.measure().await {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!("environment: {}", e);
                None
            }
        };

        self.enter(CyclePhase::Scoring);
        let inputs = ScoreInputs {
            weight_kg,
            methane_ppm: gas_value(&gas, GasKind::Methane),
            alcohol_ppm: gas_value(&gas, GasKind::Alcohol),
            hydrogen_ppm: gas_value(&gas, GasKind::Hydrogen),
            ammonia_ppm: gas_value(&gas, GasKind::AmmoniaProxy),
            environment,
        };
        let quality = score(&inputs, &self.config.thresholds);
        match &quality {
            Ok(q) => info!("quality {:.2}%", q.percent()),
            Err(reason) => info!("quality indeterminate: {}", reason),
        }

        YieldRecord {
            operator: String::from(operator),
            weight_kg,
            gas,
            environment,
            quality,
        }
    }

    /// Render the summary locally and attempt the upload, fire-and-forget.
    async fn report(&mut self, record: &YieldRecord) {
        let lines = record.summary_lines();
        for line in &lines {
            info!("{}", line);
        }
        self.display.render(&lines);

        match self.uplink.upload(&record.to_report()).await {
            Ok(()) => debug!("record uploaded"),
            Err(e) => error!("upload failed, continuing: {}", e),
        }
    }

    /// Wait for the platform to clear, then pulse the actuator.
    async fn await_offload(&mut self) {
        let poll_ms = (self.config.offload.poll_interval.as_millis() as u32).max(1);
        let threshold = self.config.offload.clear_threshold_kg;

        loop {
            match self.scale.read_kg().await {
                Ok(weight) if weight < threshold => break,
                Ok(_) => {}
                Err(e) => warn!("scale: {}", e),
            }
            self.delay.delay_ms(poll_ms).await;
        }

        self.actuator.set_active(true);
        self.delay
            .delay_ms(self.config.offload.actuator_pulse.as_millis() as u32)
            .await;
        self.actuator.set_active(false);
    }
}

fn gas_value(gas: &[StableReading], kind: GasKind) -> Option<f32> {
    gas.iter()
        .find(|reading| reading.kind == kind)
        .map(|reading| reading.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{AdcTransfer, CalibrationCurve};
    use crate::config::{IdentityConfig, OffloadConfig};
    use crate::sampling::SamplingParams;
    use crate::scoring::{QualityThresholds, ScoreIndeterminate};
    use crate::sensors::{EnvironmentSample, SensorError};

    use alloc::collections::VecDeque;
    use alloc::rc::Rc;
    use core::cell::RefCell;
    use core::str::FromStr;
    use embassy_futures::block_on;
    use embassy_time::Duration;

    static OPERATORS: &[(&str, &str)] = &[("04A37C92", "Asha"), ("1CB9F2D4", "Rafi")];

    /// Everything the station did, in order, shared by the mock peripherals.
    #[derive(Default)]
    struct Trace {
        actuator: Vec<bool>,
        delays_ms: Vec<u32>,
        frames: Vec<Vec<String>>,
        uploads: Vec<String>,
    }

    type SharedTrace = Rc<RefCell<Trace>>;

    struct TraceDelay(SharedTrace);

    impl DelayNs for TraceDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.0.borrow_mut().delays_ms.push(ns / 1_000_000);
        }

        async fn delay_ms(&mut self, ms: u32) {
            self.0.borrow_mut().delays_ms.push(ms);
        }
    }

    struct TraceActuator(SharedTrace);

    impl Actuator for TraceActuator {
        fn set_active(&mut self, on: bool) {
            self.0.borrow_mut().actuator.push(on);
        }
    }

    struct TraceDisplay(SharedTrace);

    impl DisplaySink for TraceDisplay {
        fn render(&mut self, lines: &[String]) {
            self.0.borrow_mut().frames.push(lines.to_vec());
        }
    }

    struct TraceUplink(SharedTrace);

    impl UploadSink for TraceUplink {
        async fn upload(&mut self, report: &YieldReport<'_>) -> Result<(), UploadError> {
            let body = serde_json::to_string(report).unwrap();
            self.0.borrow_mut().uploads.push(body);
            Ok(())
        }
    }

    struct ScriptTags {
        script: VecDeque<Result<Option<TagId>, SensorError>>,
    }

    impl ScriptTags {
        fn silent() -> Self {
            Self {
                script: VecDeque::new(),
            }
        }

        fn presenting(after_polls: usize, uid: &str) -> Self {
            let mut script: VecDeque<_> = (0..after_polls).map(|_| Ok(None)).collect();
            script.push_back(Ok(Some(TagId::from_str(uid).unwrap())));
            Self { script }
        }
    }

    impl TagReader for ScriptTags {
        async fn poll_tag(&mut self) -> Result<Option<TagId>, SensorError> {
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    struct ReadyAfter(usize);

    impl ReadySignal for ReadyAfter {
        fn is_ready(&mut self) -> bool {
            if self.0 == 0 {
                true
            } else {
                self.0 -= 1;
                false
            }
        }
    }

    /// Constant load until `reads_before_clear` reads have happened, then
    /// the platform reads as empty.
    struct BenchScale {
        loaded_kg: f32,
        reads_before_clear: usize,
        reads: usize,
    }

    impl WeightSensor for BenchScale {
        async fn read_kg(&mut self) -> Result<f32, SensorError> {
            self.reads += 1;
            if self.reads > self.reads_before_clear {
                Ok(0.0)
            } else {
                Ok(self.loaded_kg)
            }
        }
    }

    struct FixedEnvironment(Option<EnvironmentSample>);

    impl EnvironmentSensor for FixedEnvironment {
        async fn measure(&mut self) -> Result<EnvironmentSample, SensorError> {
            self.0.ok_or(SensorError::ReadFailed {
                sensor: "environment",
                details: "checksum failure",
            })
        }
    }

    struct QuietChannel;

    impl AnalogChannel for QuietChannel {
        async fn read_raw(&mut self) -> Result<u16, SensorError> {
            Ok(0)
        }
    }

    /// Scale that walks a fault/reading script, then reads empty forever.
    struct ScriptScale {
        script: VecDeque<Result<f32, SensorError>>,
    }

    impl WeightSensor for ScriptScale {
        async fn read_kg(&mut self) -> Result<f32, SensorError> {
            self.script.pop_front().unwrap_or(Ok(0.0))
        }
    }

    struct RejectingUplink(SharedTrace);

    impl UploadSink for RejectingUplink {
        async fn upload(&mut self, _report: &YieldReport<'_>) -> Result<(), UploadError> {
            self.0.borrow_mut().uploads.push(String::from("rejected"));
            Err(UploadError::Rejected { status: 500 })
        }
    }

    fn test_config() -> StationConfig {
        StationConfig {
            identity: IdentityConfig {
                window: Duration::from_millis(700),
                poll_interval: Duration::from_millis(100),
            },
            gas_sampling: SamplingParams::new(1, 2, Duration::from_millis(1)).unwrap(),
            weight_sampling: SamplingParams::new(1, 2, Duration::from_millis(1)).unwrap(),
            ready_poll_interval: Duration::from_millis(10),
            post_report_hold: Duration::from_millis(20),
            offload: OffloadConfig {
                clear_threshold_kg: 0.01,
                poll_interval: Duration::from_millis(5),
                actuator_pulse: Duration::from_millis(3000),
            },
            thresholds: QualityThresholds::default(),
        }
    }

    fn quiet_bank() -> Vec<GasChannel<QuietChannel>> {
        alloc::vec![
            GasChannel::new(
                GasKind::Alcohol,
                QuietChannel,
                AdcTransfer::ESP32_12BIT,
                CalibrationCurve::MQ3_ALCOHOL,
            ),
            GasChannel::new(
                GasKind::Methane,
                QuietChannel,
                AdcTransfer::ESP32_12BIT,
                CalibrationCurve::MQ4_METHANE,
            ),
            GasChannel::new(
                GasKind::Hydrogen,
                QuietChannel,
                AdcTransfer::ESP32_12BIT,
                CalibrationCurve::MQ8_HYDROGEN,
            ),
            GasChannel::new(
                GasKind::AmmoniaProxy,
                QuietChannel,
                AdcTransfer::ESP32_12BIT,
                CalibrationCurve::MQ135_AMMONIA,
            ),
        ]
    }

    #[allow(clippy::type_complexity)]
    fn station(
        trace: &SharedTrace,
        tags: ScriptTags,
        ready_after: usize,
        scale: BenchScale,
        environment: FixedEnvironment,
    ) -> AcquisitionCycle<
        ScriptTags,
        ReadyAfter,
        BenchScale,
        FixedEnvironment,
        QuietChannel,
        TraceActuator,
        TraceDisplay,
        TraceUplink,
        TraceDelay,
    > {
        AcquisitionCycle::new(
            test_config(),
            OperatorRegistry::new(OPERATORS),
            tags,
            ReadyAfter(ready_after),
            scale,
            environment,
            quiet_bank(),
            TraceActuator(trace.clone()),
            TraceDisplay(trace.clone()),
            TraceUplink(trace.clone()),
            TraceDelay(trace.clone()),
        )
    }

    fn in_band_environment() -> FixedEnvironment {
        FixedEnvironment(Some(EnvironmentSample {
            temperature_c: 7.0,
            humidity_pct: 87.0,
        }))
    }

    #[test]
    fn test_identity_timeout_aborts_to_idle() {
        let trace = SharedTrace::default();
        let mut cycle = station(
            &trace,
            ScriptTags::silent(),
            0,
            BenchScale {
                loaded_kg: 3.0,
                reads_before_clear: usize::MAX,
                reads: 0,
            },
            in_band_environment(),
        );

        let outcome = block_on(cycle.run_once());

        assert!(matches!(outcome, CycleOutcome::NoIdentity));
        assert_eq!(cycle.phase(), CyclePhase::Idle);

        let trace = trace.borrow();
        // 700 ms window polled every 100 ms = 7 attempts, nothing else ran
        assert_eq!(
            trace.delays_ms.iter().filter(|&&ms| ms == 100).count(),
            7
        );
        assert!(trace.actuator.is_empty());
        assert!(trace.uploads.is_empty());
    }

    #[test]
    fn test_unknown_tag_is_reported_and_aborts() {
        let trace = SharedTrace::default();
        let mut cycle = station(
            &trace,
            ScriptTags::presenting(2, "DEADBEEF"),
            0,
            BenchScale {
                loaded_kg: 3.0,
                reads_before_clear: usize::MAX,
                reads: 0,
            },
            in_band_environment(),
        );

        let outcome = block_on(cycle.run_once());

        match outcome {
            CycleOutcome::UnknownIdentity(uid) => assert_eq!(uid.as_str(), "DEADBEEF"),
            other => panic!("expected UnknownIdentity, got {:?}", other),
        }
        assert_eq!(cycle.phase(), CyclePhase::Idle);

        let trace = trace.borrow();
        assert!(
            trace
                .frames
                .iter()
                .any(|frame| frame.iter().any(|line| line == "Unknown operator"))
        );
        assert!(trace.uploads.is_empty());
        assert!(trace.actuator.is_empty());
    }

    #[test]
    fn test_full_cycle_scores_and_reports() {
        let trace = SharedTrace::default();
        // Weight sampling takes 3 reads (1 ignore + 2 samples); the platform
        // then clears on the third offload poll
        let mut cycle = station(
            &trace,
            ScriptTags::presenting(1, "04A37C92"),
            3,
            BenchScale {
                loaded_kg: 3.0,
                reads_before_clear: 5,
                reads: 0,
            },
            in_band_environment(),
        );

        let outcome = block_on(cycle.run_once());

        let record = match outcome {
            CycleOutcome::Completed(record) => record,
            other => panic!("expected Completed, got {:?}", other),
        };
        assert_eq!(cycle.phase(), CyclePhase::Idle);
        assert_eq!(record.operator, "Asha");
        assert_eq!(record.weight_kg, Some(3.0));
        // Quiet channels and an in-band environment give a perfect yield
        assert!((record.quality.unwrap().percent() - 100.0).abs() < 1e-4);

        let trace = trace.borrow();
        assert!(
            trace
                .frames
                .iter()
                .any(|frame| frame.iter().any(|line| line == "Welcome"))
        );
        assert!(
            trace
                .frames
                .iter()
                .any(|frame| frame.iter().any(|line| line == "Offload your yield"))
        );

        assert_eq!(trace.uploads.len(), 1);
        assert!(trace.uploads[0].contains("\"user_name\":\"Asha\""));
        assert!(trace.uploads[0].contains("\"load_cell\":3.0"));

        // Actuator pulsed exactly once, for the configured duration
        assert_eq!(trace.actuator, alloc::vec![true, false]);
        assert_eq!(
            trace.delays_ms.iter().filter(|&&ms| ms == 3000).count(),
            1
        );
    }

    #[test]
    fn test_scale_fault_yields_indeterminate_score() {
        let trace = SharedTrace::default();
        // Every sampling read times out; the offload poll then sees an
        // empty platform straight away
        let sampling_faults = (0..3)
            .map(|_| {
                Err(SensorError::Timeout {
                    sensor: "scale",
                    operation: "conversion ready",
                })
            })
            .collect();

        let mut cycle = AcquisitionCycle::new(
            test_config(),
            OperatorRegistry::new(OPERATORS),
            ScriptTags::presenting(0, "04A37C92"),
            ReadyAfter(0),
            ScriptScale {
                script: sampling_faults,
            },
            in_band_environment(),
            quiet_bank(),
            TraceActuator(trace.clone()),
            TraceDisplay(trace.clone()),
            TraceUplink(trace.clone()),
            TraceDelay(trace.clone()),
        );

        let outcome = block_on(cycle.run_once());

        let record = match outcome {
            CycleOutcome::Completed(record) => record,
            other => panic!("expected Completed, got {:?}", other),
        };
        assert_eq!(record.weight_kg, None);
        assert_eq!(record.quality, Err(ScoreIndeterminate::NoYieldWeight));

        let trace = trace.borrow();
        assert!(!trace.uploads[0].contains("load_cell"));
        assert!(
            trace
                .frames
                .iter()
                .any(|frame| frame.iter().any(|line| line == "Weight: N/A"))
        );
        assert_eq!(trace.actuator, alloc::vec![true, false]);
    }

    #[test]
    fn test_upload_failure_is_not_fatal() {
        let trace = SharedTrace::default();
        let mut cycle = AcquisitionCycle::new(
            test_config(),
            OperatorRegistry::new(OPERATORS),
            ScriptTags::presenting(0, "04A37C92"),
            ReadyAfter(0),
            BenchScale {
                loaded_kg: 3.0,
                reads_before_clear: 4,
                reads: 0,
            },
            in_band_environment(),
            quiet_bank(),
            TraceActuator(trace.clone()),
            TraceDisplay(trace.clone()),
            RejectingUplink(trace.clone()),
            TraceDelay(trace.clone()),
        );

        let outcome = block_on(cycle.run_once());

        // The rejected upload is dropped; the cycle still offloads and
        // returns to idle
        assert!(matches!(outcome, CycleOutcome::Completed(_)));
        assert_eq!(cycle.phase(), CyclePhase::Idle);
        assert_eq!(trace.borrow().actuator, alloc::vec![true, false]);
    }

    #[test]
    fn test_environment_fault_degrades_to_indeterminate() {
        let trace = SharedTrace::default();
        let mut cycle = station(
            &trace,
            ScriptTags::presenting(0, "1CB9F2D4"),
            0,
            BenchScale {
                loaded_kg: 2.0,
                reads_before_clear: 4,
                reads: 0,
            },
            FixedEnvironment(None),
        );

        let outcome = block_on(cycle.run_once());

        let record = match outcome {
            CycleOutcome::Completed(record) => record,
            other => panic!("expected Completed, got {:?}", other),
        };
        assert_eq!(record.environment, None);
        assert_eq!(record.quality, Err(ScoreIndeterminate::MissingEnvironment));

        let trace = trace.borrow();
        // The cycle still reported and offloaded; the upload just omits the
        // environment fields
        assert_eq!(trace.uploads.len(), 1);
        assert!(!trace.uploads[0].contains("temperature"));
        assert!(!trace.uploads[0].contains("null"));
        assert_eq!(trace.actuator, alloc::vec![true, false]);
        assert!(
            trace
                .frames
                .iter()
                .any(|frame| frame.iter().any(|line| line == "Quality: N/A"))
        );
    }
}
