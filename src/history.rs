use crate::{Millis, CHANNEL_COUNT};

/// One recorded tick: when it was taken and both readings at that moment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HistorySample {
    /// milliseconds since boot
    pub elapsed_ms: Millis,
    pub rpm: [f32; CHANNEL_COUNT],
}

impl HistorySample {
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed_ms as f32 / 1000.0
    }
}

/// Fixed capacity ring of samples. Never grows; once full the oldest sample is overwritten.
///
/// Before the first wrap the valid samples are `[0, write_index)`. After it, all `N` slots are
/// valid and the oldest one sits at `write_index`.
#[derive(Clone)]
pub struct HistoryBuffer<const N: usize> {
    samples: [HistorySample; N],
    write_index: usize,
    full: bool,
}

impl<const N: usize> HistoryBuffer<N> {
    pub const fn new() -> Self {
        Self {
            samples: [HistorySample {
                elapsed_ms: 0,
                rpm: [0.0; CHANNEL_COUNT],
            }; N],
            write_index: 0,
            full: false,
        }
    }

    pub fn push(&mut self, sample: HistorySample) {
        if N == 0 {
            return;
        }
        self.samples[self.write_index] = sample;
        self.write_index += 1;
        if self.write_index >= N {
            self.write_index = 0;
            self.full = true;
        }
    }

    pub fn len(&self) -> usize {
        if self.full {
            N
        } else {
            self.write_index
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Slot the next sample will be written to
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Valid samples, oldest first. Does not touch the write cursor.
    pub fn iter(&self) -> impl Iterator<Item = HistorySample> + '_ {
        let start = if self.full { self.write_index } else { 0 };
        (0..self.len()).map(move |offset| self.samples[(start + offset) % N])
    }

    pub fn oldest(&self) -> Option<HistorySample> {
        self.iter().next()
    }

    pub fn newest(&self) -> Option<HistorySample> {
        if self.is_empty() {
            return None;
        }
        let index = (self.write_index + N - 1) % N;
        Some(self.samples[index])
    }
}

impl<const N: usize> Default for HistoryBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Appends the current readings to the history on a fixed tick, but only while recording is on.
/// The only thing that ever writes to the buffer.
pub struct HistoryRecorder<const N: usize> {
    buffer: HistoryBuffer<N>,
    recording: bool,
    tick_interval_ms: Millis,
    last_tick: Option<Millis>,
}

impl<const N: usize> HistoryRecorder<N> {
    pub fn new(tick_interval_ms: Millis) -> Self {
        Self {
            buffer: HistoryBuffer::new(),
            recording: false,
            tick_interval_ms,
            last_tick: None,
        }
    }

    pub fn set_recording(&mut self, recording: bool) {
        if recording != self.recording {
            info!("recording {}", if recording { "started" } else { "stopped" });
        }
        self.recording = recording;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Flip recording, returns the new state
    pub fn toggle_recording(&mut self) -> bool {
        self.set_recording(!self.recording);
        self.recording
    }

    /// True once per tick interval. The first call only starts the clock.
    pub fn is_tick_due(&mut self, now: Millis) -> bool {
        match self.last_tick {
            None => {
                self.last_tick = Some(now);
                false
            }
            Some(last) if now.wrapping_sub(last) >= self.tick_interval_ms => {
                self.last_tick = Some(now);
                true
            }
            Some(_) => false,
        }
    }

    /// Record one tick. Returns whether a sample was appended.
    pub fn on_tick(&mut self, now: Millis, rpm: [f32; CHANNEL_COUNT]) -> bool {
        if !self.recording {
            return false;
        }
        self.buffer.push(HistorySample {
            elapsed_ms: now,
            rpm,
        });
        if self.buffer.is_full() && self.buffer.write_index() == 0 {
            debug!("history wrapped, evicting oldest samples from now on");
        }
        true
    }

    pub fn history(&self) -> &HistoryBuffer<N> {
        &self.buffer
    }

    pub fn tick_interval_ms(&self) -> Millis {
        self.tick_interval_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tick: u32) -> HistorySample {
        HistorySample {
            elapsed_ms: tick * 1000,
            rpm: [tick as f32, tick as f32 * 2.0],
        }
    }

    fn ticks<const N: usize>(buffer: &HistoryBuffer<N>) -> std::vec::Vec<u32> {
        buffer.iter().map(|s| s.elapsed_ms / 1000).collect()
    }

    #[test]
    fn starts_empty() {
        let buffer = HistoryBuffer::<60>::new();
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
        assert_eq!(buffer.capacity(), 60);
        assert_eq!(buffer.iter().count(), 0);
        assert_eq!(buffer.newest(), None);
        assert_eq!(buffer.oldest(), None);
    }

    #[test]
    fn partial_fill_is_in_append_order() {
        let mut buffer = HistoryBuffer::<5>::new();
        for tick in 1..=3 {
            buffer.push(sample(tick));
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.write_index(), 3);
        assert!(!buffer.is_full());
        assert_eq!(ticks(&buffer), [1, 2, 3]);
        assert_eq!(buffer.oldest(), Some(sample(1)));
        assert_eq!(buffer.newest(), Some(sample(3)));
    }

    #[test]
    fn exactly_full_wraps_cursor() {
        let mut buffer = HistoryBuffer::<5>::new();
        for tick in 1..=5 {
            buffer.push(sample(tick));
        }
        assert!(buffer.is_full());
        assert_eq!(buffer.write_index(), 0);
        assert_eq!(ticks(&buffer), [1, 2, 3, 4, 5]);
        assert_eq!(buffer.newest(), Some(sample(5)));
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut buffer = HistoryBuffer::<5>::new();
        for tick in 1..=12 {
            buffer.push(sample(tick));
        }
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.write_index(), 2);
        assert_eq!(ticks(&buffer), [8, 9, 10, 11, 12]);
        assert_eq!(buffer.oldest(), Some(sample(8)));
        assert_eq!(buffer.newest(), Some(sample(12)));
    }

    #[test]
    fn iterating_does_not_move_the_cursor() {
        let mut buffer = HistoryBuffer::<5>::new();
        for tick in 1..=7 {
            buffer.push(sample(tick));
        }
        let first: std::vec::Vec<_> = buffer.iter().collect();
        let second: std::vec::Vec<_> = buffer.iter().collect();
        assert_eq!(first, second);
        assert_eq!(buffer.write_index(), 2);
    }

    #[test]
    fn zero_capacity_is_inert() {
        let mut buffer = HistoryBuffer::<0>::new();
        buffer.push(sample(1));
        assert!(buffer.is_empty());
        assert_eq!(buffer.iter().count(), 0);
    }

    #[test]
    fn sample_seconds() {
        let s = HistorySample {
            elapsed_ms: 1500,
            rpm: [0.0, 0.0],
        };
        assert_eq!(s.elapsed_seconds(), 1.5);
    }

    #[test]
    fn recorder_ignores_ticks_while_not_recording() {
        let mut recorder = HistoryRecorder::<60>::new(500);
        assert!(!recorder.is_recording());
        assert!(!recorder.on_tick(500, [100.0, 200.0]));
        assert!(recorder.history().is_empty());
    }

    #[test]
    fn recorder_toggle() {
        let mut recorder = HistoryRecorder::<60>::new(500);
        assert!(recorder.toggle_recording());
        assert!(recorder.on_tick(500, [100.0, 200.0]));
        assert!(!recorder.toggle_recording());
        assert!(!recorder.on_tick(1000, [100.0, 200.0]));
        assert_eq!(recorder.history().len(), 1);
        assert_eq!(
            recorder.history().newest(),
            Some(HistorySample {
                elapsed_ms: 500,
                rpm: [100.0, 200.0]
            })
        );
    }

    #[test]
    fn tick_schedule() {
        let mut recorder = HistoryRecorder::<60>::new(500);
        assert_eq!(recorder.tick_interval_ms(), 500);
        assert!(!recorder.is_tick_due(100));
        assert!(!recorder.is_tick_due(599));
        assert!(recorder.is_tick_due(600));
        assert!(!recorder.is_tick_due(700));
        assert!(recorder.is_tick_due(1150));
        // late ticks re-anchor on the time they actually ran
        assert!(!recorder.is_tick_due(1600));
        assert!(recorder.is_tick_due(1650));
    }

    #[test]
    fn tick_schedule_survives_wraparound() {
        let mut recorder = HistoryRecorder::<60>::new(500);
        assert!(!recorder.is_tick_due(Millis::MAX - 100));
        assert!(!recorder.is_tick_due(200));
        assert!(recorder.is_tick_due(399));
    }
}
