//! Latency configuration for realistic mode.

use std::time::Duration;

/// Delays applied in [`MockMode::Realistic`](super::MockMode::Realistic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyConfig {
    /// Delay added to every round trip (network + service)
    pub round_trip_ms: u64,
    /// Capture time per recorded frame
    pub frame_capture_ms: u64,
    /// Extra delay for camera open/close (power sequencing)
    pub power_sequence_ms: u64,
}

impl LatencyConfig {
    /// Latency of a KV260 on a direct gigabit link.
    pub fn kv260() -> Self {
        Self {
            round_trip_ms: 1,
            frame_capture_ms: 2,
            power_sequence_ms: 50,
        }
    }

    /// Total delay for a record of `frames` frames.
    #[must_use]
    pub fn record_delay(&self, frames: u32) -> Duration {
        Duration::from_millis(
            self.round_trip_ms
                .saturating_add(self.frame_capture_ms.saturating_mul(u64::from(frames))),
        )
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            round_trip_ms: 0,
            frame_capture_ms: 0,
            power_sequence_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_latency_is_zero() {
        let config = LatencyConfig::default();
        assert_eq!(config.record_delay(1000), Duration::ZERO);
    }

    #[test]
    fn test_record_delay_scales() {
        let config = LatencyConfig::kv260();
        assert_eq!(config.record_delay(0), Duration::from_millis(1));
        assert_eq!(config.record_delay(20), Duration::from_millis(41));
    }
}
