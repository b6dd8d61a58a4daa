//! Core of the twin-tach firmware: two-channel pulse capture, RPM estimation and a rolling
//! history of readings.
//!
//! Everything here is `no_std` and free of hardware types so it runs the same on the RP2040 and in
//! host tests. The firmware binary (`src/main.rs`, feature `firmware`) wires it to pins, displays
//! and the network.

#![cfg_attr(not(test), no_std)]

// must stay first so the logging macros are visible to every module below
mod fmt;

pub mod capture;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod estimator;
pub mod export;
pub mod history;
pub mod http;
pub mod monitor;
pub mod segment_display;
pub mod settings;

pub use capture::{EdgeCapture, EdgeMailbox};
pub use config::{ConfigBuilder, TachConfig};
pub use errors::TachError;
pub use estimator::{ChannelEstimator, ChannelState};
pub use history::{HistoryBuffer, HistoryRecorder, HistorySample};
pub use monitor::{Monitor, PollOutcome};

/// Monotonic milliseconds since boot. Wraps after ~49 days; every interval is computed with
/// `wrapping_sub`.
pub type Millis = u32;

/// Number of measurement channels.
pub const CHANNEL_COUNT: usize = 2;

/// One of the two sensor inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    One,
    Two,
}

impl Channel {
    pub const ALL: [Channel; CHANNEL_COUNT] = [Channel::One, Channel::Two];

    pub const fn index(self) -> usize {
        match self {
            Channel::One => 0,
            Channel::Two => 1,
        }
    }

    /// 1-based number, as printed on the enclosure and in logs
    pub const fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}
