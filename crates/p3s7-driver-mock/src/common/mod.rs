//! Common infrastructure for the simulated device.
//!
//! - **mode**: Operational modes (Instant, Realistic)
//! - **latency**: Link and capture delays
//! - **faults**: Fault injection framework
//! - **rng**: Seeded random number generator

pub mod faults;
pub mod latency;
pub mod mode;
pub mod rng;

pub use faults::{FaultConfig, FaultScenario, InjectedFault};
pub use latency::LatencyConfig;
pub use mode::MockMode;
pub use rng::FaultRng;
