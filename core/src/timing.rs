//! Conversions between play time and PCM byte counts.

use crate::format::PcmFormat;
use std::time::Duration;

impl PcmFormat {
    /// Time taken to play `byte_count` bytes, truncated to whole milliseconds.
    pub fn play_time_from_byte_count(&self, byte_count: u64) -> Duration {
        let millis = u128::from(byte_count) * 1000
            / u128::from(self.bytes_per_second());
        Duration::from_millis(millis.try_into().unwrap_or(u64::MAX))
    }

    /// Bytes needed to play for `play_time`, at millisecond granularity.
    pub fn byte_count_from_play_time(&self, play_time: Duration) -> u64 {
        let bytes =
            play_time.as_millis() * u128::from(self.bytes_per_second()) / 1000;
        bytes.try_into().unwrap_or(u64::MAX)
    }
}
