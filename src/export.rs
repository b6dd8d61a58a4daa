//! Read-only views of the history for the dashboard (JSON) and for download (CSV).
//!
//! Both walk the ring oldest first through [`HistoryBuffer::iter`], so neither can disturb the
//! recorder.

use core::fmt::Write;

use heapless::{String, Vec};
use serde::Serialize;

use crate::errors::TachError;
use crate::history::HistoryBuffer;
use crate::CHANNEL_COUNT;

pub const CSV_HEADER: &str = "Time (s);RPM1;RPM2\r\n";

/// Everything the dashboard polls for: live readings, recording flag and the chart series.
///
/// Field names on the wire match what the dashboard script reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSnapshot<const N: usize> {
    pub rpm1: f32,
    pub rpm2: f32,
    pub recording: bool,
    #[serde(rename = "rpm1History")]
    pub rpm1_history: Vec<f32, N>,
    #[serde(rename = "rpm2History")]
    pub rpm2_history: Vec<f32, N>,
    /// seconds since boot
    pub time: Vec<f32, N>,
}

impl<const N: usize> SensorSnapshot<N> {
    pub fn capture(rpm: [f32; CHANNEL_COUNT], recording: bool, history: &HistoryBuffer<N>) -> Self {
        let mut snapshot = Self {
            rpm1: rpm[0],
            rpm2: rpm[1],
            recording,
            rpm1_history: Vec::new(),
            rpm2_history: Vec::new(),
            time: Vec::new(),
        };
        // the buffer never holds more than N samples, so these pushes cannot fail
        for sample in history.iter() {
            let _ = snapshot.rpm1_history.push(sample.rpm[0]);
            let _ = snapshot.rpm2_history.push(sample.rpm[1]);
            let _ = snapshot.time.push(sample.elapsed_seconds());
        }
        snapshot
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Encode a snapshot into `buf`, returns the number of bytes written
pub fn write_json<const N: usize>(snapshot: &SensorSnapshot<N>, buf: &mut [u8]) -> Result<usize, TachError> {
    Ok(serde_json_core::to_slice(snapshot, buf)?)
}

/// Write the history as `;` separated rows with a header, CRLF line endings
pub fn write_csv<const N: usize, W: Write>(history: &HistoryBuffer<N>, out: &mut W) -> core::fmt::Result {
    out.write_str(CSV_HEADER)?;
    for sample in history.iter() {
        write!(
            out,
            "{:.1};{:.1};{:.1}\r\n",
            sample.elapsed_seconds(),
            sample.rpm[0],
            sample.rpm[1]
        )?;
    }
    Ok(())
}

pub fn csv_string<const N: usize, const CAP: usize>(history: &HistoryBuffer<N>) -> Result<String<CAP>, TachError> {
    let mut out = String::new();
    write_csv(history, &mut out)?;
    Ok(out)
}
