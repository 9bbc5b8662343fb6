//! Static station configuration
//!
//! Everything here is fixed at startup: poll windows, sampling windows,
//! offload behavior, scoring tolerances, and the operator registry. There
//! is no runtime mutation path.

use embassy_time::Duration;

use crate::sampling::SamplingParams;
use crate::scoring::QualityThresholds;

/// Identity acquisition window.
#[derive(Clone, Copy, Debug)]
pub struct IdentityConfig {
    /// Total time to wait for a tag before giving up on the cycle.
    pub window: Duration,
    /// Pause between reader polls inside the window.
    pub poll_interval: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(7),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// End-of-cycle offload behavior.
#[derive(Clone, Copy, Debug)]
pub struct OffloadConfig {
    /// Scale reading below which the platform counts as cleared.
    pub clear_threshold_kg: f32,
    /// Pause between scale polls while waiting for the platform to clear.
    pub poll_interval: Duration,
    /// How long the actuator stays on once the platform clears.
    pub actuator_pulse: Duration,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            clear_threshold_kg: 0.01,
            poll_interval: Duration::from_millis(500),
            actuator_pulse: Duration::from_secs(3),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StationConfig {
    pub identity: IdentityConfig,
    pub gas_sampling: SamplingParams,
    pub weight_sampling: SamplingParams,
    /// Pause between yield-ready signal polls.
    pub ready_poll_interval: Duration,
    /// Hold time after reporting before the offload prompt appears.
    pub post_report_hold: Duration,
    pub offload: OffloadConfig,
    pub thresholds: QualityThresholds,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            gas_sampling: SamplingParams::GAS_DEFAULT,
            weight_sampling: SamplingParams::WEIGHT_DEFAULT,
            ready_poll_interval: Duration::from_millis(100),
            post_report_hold: Duration::from_secs(15),
            offload: OffloadConfig::default(),
            thresholds: QualityThresholds::default(),
        }
    }
}

/// Known-identity registry: tag UID to operator display name, statically
/// configured.
#[derive(Clone, Copy, Debug)]
pub struct OperatorRegistry {
    entries: &'static [(&'static str, &'static str)],
}

impl OperatorRegistry {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { entries }
    }

    pub fn name_for(&self, uid: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(known, _)| *known == uid)
            .map(|(_, name)| *name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        static ENTRIES: &[(&str, &str)] = &[("04A37C92", "Asha"), ("1CB9F2D4", "Rafi")];
        let registry = OperatorRegistry::new(ENTRIES);

        assert_eq!(registry.name_for("04A37C92"), Some("Asha"));
        assert_eq!(registry.name_for("1CB9F2D4"), Some("Rafi"));
        assert_eq!(registry.name_for("FFFFFFFF"), None);
    }

    #[test]
    fn test_default_windows() {
        let config = StationConfig::default();
        assert_eq!(config.identity.window, Duration::from_secs(7));
        assert_eq!(config.gas_sampling.sample_count(), 20);
        assert_eq!(config.weight_sampling.interval(), Duration::from_millis(500));
        assert!(config.offload.clear_threshold_kg < 0.02);
    }
}
