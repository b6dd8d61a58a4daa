use circular_buffer::CircularBuffer;

use crate::config::{EstimatorConfig, MAX_SMOOTHING_WINDOW};
use crate::Millis;

const MS_PER_MINUTE: f32 = 60_000.0;

/// Moving average over the last `len` instantaneous readings.
#[derive(Debug, Clone)]
pub struct SmoothingWindow {
    samples: CircularBuffer<MAX_SMOOTHING_WINDOW, f32>,
    len: usize,
}

impl SmoothingWindow {
    /// `len` is clamped to `1..=MAX_SMOOTHING_WINDOW`
    pub fn new(len: usize) -> Self {
        Self {
            samples: CircularBuffer::new(),
            len: len.clamp(1, MAX_SMOOTHING_WINDOW),
        }
    }

    /// Append, evicting the oldest sample once `len` are held
    pub fn push(&mut self, value: f32) {
        if self.samples.len() >= self.len {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Mean of the samples seen so far, at most `len` of them. Zero when empty.
    pub fn mean(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.samples.iter().sum();
        sum / self.samples.len() as f32
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn filled(&self) -> usize {
        self.samples.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelState {
    /// No accepted reading since boot or since the last stall. Reads zero.
    NoSignal,
    Tracking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RejectReason {
    IntervalTooShort,
    IntervalTooLong,
    AboveCeiling,
}

/// What a single [`ChannelEstimator::update`] did, mostly for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EstimatorEvent {
    /// First edge of the channel (or first after boot), nothing to measure against yet
    FirstEdge,
    /// An interval passed every check, `rpm` is the instantaneous value before smoothing
    Accepted { rpm: f32 },
    Rejected(RejectReason),
    /// The channel went quiet and its reading was forced to zero
    SignalLost,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelStats {
    pub accepted: u32,
    pub rejected_interval: u32,
    pub rejected_ceiling: u32,
    pub stalls: u32,
}

/// Turns the edge timestamps of one channel into a smoothed rpm reading.
///
/// `current_rpm` only ever changes in here. The capture side never computes anything.
#[derive(Debug, Clone)]
pub struct ChannelEstimator {
    config: EstimatorConfig,
    last_edge: Option<Millis>,
    window: SmoothingWindow,
    current_rpm: f32,
    state: ChannelState,
    stats: ChannelStats,
}

impl ChannelEstimator {
    pub fn new(config: &EstimatorConfig) -> Self {
        Self {
            config: *config,
            last_edge: None,
            window: SmoothingWindow::new(config.smoothing_window),
            current_rpm: 0.0,
            state: ChannelState::NoSignal,
            stats: ChannelStats::default(),
        }
    }

    /// One estimator step. `edge` is the timestamp taken out of the channel mailbox this cycle,
    /// `None` if nothing was pending. The stall check runs every call regardless of edges.
    pub fn update(&mut self, edge: Option<Millis>, now: Millis) -> Option<EstimatorEvent> {
        let mut event = edge.map(|edge_time| self.consume_edge(edge_time));

        if self.check_stall(now) {
            event = Some(EstimatorEvent::SignalLost);
        }
        event
    }

    fn consume_edge(&mut self, edge_time: Millis) -> EstimatorEvent {
        let Some(last_edge) = self.last_edge.replace(edge_time) else {
            return EstimatorEvent::FirstEdge;
        };

        let interval = edge_time.wrapping_sub(last_edge);
        if interval < self.config.min_interval_ms {
            self.stats.rejected_interval += 1;
            return EstimatorEvent::Rejected(RejectReason::IntervalTooShort);
        }
        if interval > self.config.max_interval_ms {
            self.stats.rejected_interval += 1;
            return EstimatorEvent::Rejected(RejectReason::IntervalTooLong);
        }

        let instant_rpm = MS_PER_MINUTE / interval as f32;
        if instant_rpm > self.config.rpm_ceiling {
            self.stats.rejected_ceiling += 1;
            return EstimatorEvent::Rejected(RejectReason::AboveCeiling);
        }

        self.window.push(instant_rpm);
        self.current_rpm = self.window.mean();
        self.stats.accepted += 1;
        self.state = ChannelState::Tracking;
        EstimatorEvent::Accepted { rpm: instant_rpm }
    }

    /// Returns true on the Tracking -> NoSignal transition
    fn check_stall(&mut self, now: Millis) -> bool {
        let Some(last_edge) = self.last_edge else {
            return false;
        };
        let age = now.wrapping_sub(last_edge);
        // more than half the clock range means the edge was stamped after `now` was read
        if age <= self.config.stall_timeout_ms || age > Millis::MAX / 2 {
            return false;
        }

        self.current_rpm = 0.0;
        if self.config.clear_window_on_stall {
            self.window.clear();
        }
        if self.state == ChannelState::Tracking {
            self.state = ChannelState::NoSignal;
            self.stats.stalls += 1;
            true
        } else {
            false
        }
    }

    pub fn current_rpm(&self) -> f32 {
        self.current_rpm
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    pub fn last_edge(&self) -> Option<Millis> {
        self.last_edge
    }

    pub fn window(&self) -> &SmoothingWindow {
        &self.window
    }
}
