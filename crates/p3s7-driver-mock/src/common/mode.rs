//! Operational modes for the simulated device.
//!
//! - **Instant**: Zero delays, deterministic behavior for unit tests
//! - **Realistic**: Link and capture latency for integration tests

/// Operational modes for the simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMode {
    /// Zero delays, deterministic - for unit tests
    #[default]
    Instant,
    /// Round-trip and per-frame capture delays - for integration tests
    Realistic,
}

impl MockMode {
    /// Whether delays from [`LatencyConfig`](super::LatencyConfig) apply.
    #[must_use]
    pub fn is_realistic(self) -> bool {
        matches!(self, Self::Realistic)
    }
}
