use crate::errors::TachError;
use crate::Millis;

/// Edges closer together than this are contact bounce / electrical noise. Must stay well below
/// the shortest plausible interval, 5ms still resolves 12_000 rpm.
pub const DEFAULT_DEBOUNCE_MS: Millis = 5;

/// Shortest accepted time between two edges (3000 rpm with one mark per revolution)
pub const DEFAULT_MIN_INTERVAL_MS: Millis = 20;

/// Longest accepted time between two edges (20 rpm with one mark per revolution)
pub const DEFAULT_MAX_INTERVAL_MS: Millis = 3000;

/// Instantaneous readings above this are dropped even if the interval looked plausible
pub const DEFAULT_RPM_CEILING: f32 = 6000.0;

/// if no edge is seen for this long the shaft is considered stopped and the reading drops to zero.
///
/// Shorter than [`DEFAULT_MAX_INTERVAL_MS`]: between 20 and 40 rpm a reading is accepted on each
/// edge and dropped to zero again before the next one. Raise it to at least the max interval if
/// those speeds matter.
pub const DEFAULT_STALL_TIMEOUT_MS: Millis = 1500;

pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;

/// Upper bound for the smoothing window, sets the capacity of the backing ring
pub const MAX_SMOOTHING_WINDOW: usize = 16;

/// How often a sample is appended to the history while recording. The displays refresh at the
/// same rate.
pub const DEFAULT_RECORD_INTERVAL_MS: Millis = 1000;

pub const DEFAULT_HISTORY_CAPACITY: usize = 60;

/// Tunables of the pulse estimator, shared by both channels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    pub min_interval_ms: Millis,
    pub max_interval_ms: Millis,
    pub rpm_ceiling: f32,
    pub stall_timeout_ms: Millis,
    pub smoothing_window: usize,
    /// Forget the averaged samples when a channel stalls, so the first reading after the shaft
    /// restarts is not blended with the speed from before it stopped.
    pub clear_window_on_stall: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
            max_interval_ms: DEFAULT_MAX_INTERVAL_MS,
            rpm_ceiling: DEFAULT_RPM_CEILING,
            stall_timeout_ms: DEFAULT_STALL_TIMEOUT_MS,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            clear_window_on_stall: true,
        }
    }
}

/// Every tunable of the core. Build one with [`ConfigBuilder`] to get it validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TachConfig {
    pub debounce_ms: Millis,
    pub estimator: EstimatorConfig,
    pub record_interval_ms: Millis,
}

impl Default for TachConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            estimator: EstimatorConfig::default(),
            record_interval_ms: DEFAULT_RECORD_INTERVAL_MS,
        }
    }
}

impl TachConfig {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<(), TachError> {
        let est = &self.estimator;
        if est.min_interval_ms == 0 {
            return Err(TachError::InvalidConfig("minimum interval must be non-zero"));
        }
        if est.min_interval_ms > est.max_interval_ms {
            return Err(TachError::InvalidConfig("minimum interval exceeds maximum interval"));
        }
        if self.debounce_ms >= est.min_interval_ms {
            return Err(TachError::InvalidConfig("debounce would hide the shortest plausible interval"));
        }
        if !(est.rpm_ceiling.is_finite() && est.rpm_ceiling > 0.0) {
            return Err(TachError::InvalidConfig("rpm ceiling must be positive"));
        }
        if est.stall_timeout_ms == 0 {
            return Err(TachError::InvalidConfig("stall timeout must be non-zero"));
        }
        if est.smoothing_window == 0 || est.smoothing_window > MAX_SMOOTHING_WINDOW {
            return Err(TachError::InvalidConfig("smoothing window must be within 1..=16"));
        }
        if self.record_interval_ms == 0 {
            return Err(TachError::InvalidConfig("record interval must be non-zero"));
        }
        if self.stall_blinks_slow_readings() {
            warn!(
                "stall timeout {}ms is shorter than the max interval {}ms, slow readings will drop to zero between edges",
                est.stall_timeout_ms,
                est.max_interval_ms
            );
        }
        Ok(())
    }

    /// True if a shaft slow enough to pass the interval band can still trip the stall timeout
    /// between two of its edges
    pub fn stall_blinks_slow_readings(&self) -> bool {
        self.estimator.stall_timeout_ms < self.estimator.max_interval_ms
    }
}

pub struct ConfigBuilder {
    config: TachConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TachConfig::default(),
        }
    }

    pub fn set_debounce_ms(mut self, debounce_ms: Millis) -> Self {
        self.config.debounce_ms = debounce_ms;
        self
    }

    pub fn set_interval_band_ms(mut self, min_interval_ms: Millis, max_interval_ms: Millis) -> Self {
        self.config.estimator.min_interval_ms = min_interval_ms;
        self.config.estimator.max_interval_ms = max_interval_ms;
        self
    }

    pub fn set_rpm_ceiling(mut self, rpm_ceiling: f32) -> Self {
        self.config.estimator.rpm_ceiling = rpm_ceiling;
        self
    }

    pub fn set_stall_timeout_ms(mut self, stall_timeout_ms: Millis) -> Self {
        self.config.estimator.stall_timeout_ms = stall_timeout_ms;
        self
    }

    pub fn set_smoothing_window(mut self, samples: usize) -> Self {
        self.config.estimator.smoothing_window = samples;
        self
    }

    pub fn set_clear_window_on_stall(mut self, clear: bool) -> Self {
        self.config.estimator.clear_window_on_stall = clear;
        self
    }

    pub fn set_record_interval_ms(mut self, record_interval_ms: Millis) -> Self {
        self.config.record_interval_ms = record_interval_ms;
        self
    }

    pub fn build(self) -> Result<TachConfig, TachError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config, TachConfig::default());
        assert_eq!(config.estimator.min_interval_ms, 20);
        assert_eq!(config.estimator.max_interval_ms, 3000);
        assert_eq!(config.estimator.smoothing_window, 3);
    }

    #[test]
    fn builder_sets_every_field() {
        let config = TachConfig::builder()
            .set_debounce_ms(2)
            .set_interval_band_ms(10, 5000)
            .set_rpm_ceiling(4000.0)
            .set_stall_timeout_ms(2500)
            .set_smoothing_window(8)
            .set_clear_window_on_stall(false)
            .set_record_interval_ms(500)
            .build()
            .unwrap();

        assert_eq!(config.debounce_ms, 2);
        assert_eq!(config.estimator.min_interval_ms, 10);
        assert_eq!(config.estimator.max_interval_ms, 5000);
        assert_eq!(config.estimator.rpm_ceiling, 4000.0);
        assert_eq!(config.estimator.stall_timeout_ms, 2500);
        assert_eq!(config.estimator.smoothing_window, 8);
        assert!(!config.estimator.clear_window_on_stall);
        assert_eq!(config.record_interval_ms, 500);
    }

    #[test]
    fn rejects_inverted_band() {
        let result = ConfigBuilder::new().set_interval_band_ms(3000, 20).build();
        assert!(matches!(result, Err(TachError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_min_interval() {
        let result = ConfigBuilder::new().set_debounce_ms(0).set_interval_band_ms(0, 20).build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_debounce_longer_than_min_interval() {
        // 50ms would silently cap the meter at 1200 rpm
        let result = ConfigBuilder::new().set_debounce_ms(50).build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_bad_window_sizes() {
        assert!(ConfigBuilder::new().set_smoothing_window(0).build().is_err());
        assert!(ConfigBuilder::new()
            .set_smoothing_window(MAX_SMOOTHING_WINDOW + 1)
            .build()
            .is_err());
        assert!(ConfigBuilder::new()
            .set_smoothing_window(MAX_SMOOTHING_WINDOW)
            .build()
            .is_ok());
    }

    #[test]
    fn rejects_bad_ceiling_and_timeouts() {
        assert!(ConfigBuilder::new().set_rpm_ceiling(0.0).build().is_err());
        assert!(ConfigBuilder::new().set_rpm_ceiling(f32::NAN).build().is_err());
        assert!(ConfigBuilder::new().set_stall_timeout_ms(0).build().is_err());
        assert!(ConfigBuilder::new().set_record_interval_ms(0).build().is_err());
    }

    #[test]
    fn stall_shorter_than_max_interval_is_allowed_but_flagged() {
        let config = TachConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.stall_blinks_slow_readings());

        let config = TachConfig::builder().set_stall_timeout_ms(3000).build().unwrap();
        assert!(!config.stall_blinks_slow_readings());
    }
}
