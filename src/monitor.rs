use core::fmt::Write;

use crate::capture::EdgeMailbox;
use crate::config::{TachConfig, DEFAULT_HISTORY_CAPACITY};
use crate::estimator::{ChannelEstimator, EstimatorEvent, RejectReason};
use crate::export::{self, SensorSnapshot};
use crate::history::{HistoryBuffer, HistoryRecorder};
use crate::{Channel, Millis, CHANNEL_COUNT};

/// Result of one [`Monitor::poll`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollOutcome {
    /// Readings after this poll
    pub rpm: [f32; CHANNEL_COUNT],
    /// The record interval elapsed. Displays refresh on this, whether or not a sample was stored.
    pub tick: bool,
    pub recorded: bool,
}

/// All state of the two tachometer channels and their history, owned by the main loop.
///
/// Time is passed in on every call, nothing in here reads a clock.
pub struct Monitor<const N: usize = DEFAULT_HISTORY_CAPACITY> {
    config: TachConfig,
    channels: [ChannelEstimator; CHANNEL_COUNT],
    recorder: HistoryRecorder<N>,
}

impl<const N: usize> Monitor<N> {
    pub fn new(config: TachConfig) -> Self {
        Self {
            channels: [
                ChannelEstimator::new(&config.estimator),
                ChannelEstimator::new(&config.estimator),
            ],
            recorder: HistoryRecorder::new(config.record_interval_ms),
            config,
        }
    }

    /// Run the estimator on whatever edges are waiting, then the recorder if its tick is due.
    /// Call as often as possible.
    ///
    /// `now` may be read before the mailboxes are drained: an edge stamped slightly after `now`
    /// is measured normally and never counts as a stall.
    pub fn poll(&mut self, mailboxes: &[EdgeMailbox; CHANNEL_COUNT], now: Millis) -> PollOutcome {
        for channel in Channel::ALL {
            let edge = mailboxes[channel.index()].take();
            self.update_channel(channel, edge, now);
        }

        let rpm = self.rpm();
        let tick = self.recorder.is_tick_due(now);
        let recorded = tick && self.recorder.on_tick(now, rpm);
        PollOutcome { rpm, tick, recorded }
    }

    /// Estimator step for a single channel
    pub fn update_channel(&mut self, channel: Channel, edge: Option<Millis>, now: Millis) {
        let estimator = &mut self.channels[channel.index()];
        match estimator.update(edge, now) {
            Some(EstimatorEvent::Accepted { rpm }) => {
                trace!("channel {}: {} rpm", channel.number(), rpm);
            }
            Some(EstimatorEvent::Rejected(RejectReason::AboveCeiling)) => {
                warn!("channel {}: reading above the rpm ceiling, ignoring", channel.number());
            }
            Some(EstimatorEvent::Rejected(_)) => {
                debug!("channel {}: implausible pulse interval, ignoring", channel.number());
            }
            Some(EstimatorEvent::SignalLost) => {
                info!("channel {}: signal lost", channel.number());
            }
            Some(EstimatorEvent::FirstEdge) | None => {}
        }
    }

    pub fn current_rpm(&self, channel: Channel) -> f32 {
        self.channels[channel.index()].current_rpm()
    }

    pub fn rpm(&self) -> [f32; CHANNEL_COUNT] {
        [self.current_rpm(Channel::One), self.current_rpm(Channel::Two)]
    }

    pub fn channel(&self, channel: Channel) -> &ChannelEstimator {
        &self.channels[channel.index()]
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recorder.set_recording(recording);
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn toggle_recording(&mut self) -> bool {
        self.recorder.toggle_recording()
    }

    /// Record a tick right now, outside the regular schedule
    pub fn record_now(&mut self, now: Millis) -> bool {
        let rpm = self.rpm();
        self.recorder.on_tick(now, rpm)
    }

    pub fn history(&self) -> &HistoryBuffer<N> {
        self.recorder.history()
    }

    pub fn snapshot(&self) -> SensorSnapshot<N> {
        SensorSnapshot::capture(self.rpm(), self.is_recording(), self.history())
    }

    pub fn write_csv<W: Write>(&self, out: &mut W) -> core::fmt::Result {
        export::write_csv(self.history(), out)
    }

    pub fn config(&self) -> &TachConfig {
        &self.config
    }
}
