//! Fault injection for the simulated device.
//!
//! Faults are keyed by wire operation name (`"RecordImage"`, `"ReadSysReg"`,
//! ...). A rate keyed `"*"` applies to every operation without its own entry.
//! The fault state lives behind an `Arc`, so clones of a [`FaultConfig`] (and
//! of the device holding it) observe the same counters and link state.

use super::rng::FaultRng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Fault injection configuration
#[derive(Clone, Debug)]
pub struct FaultConfig {
    /// Per-operation probability of a rejected response (0.0 to 1.0)
    reject_rates: Arc<HashMap<&'static str, f64>>,
    scenarios: Arc<Vec<FaultScenario>>,
    rng: Arc<FaultRng>,
    state: Arc<Mutex<FaultState>>,
}

/// Scripted fault behavior.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultScenario {
    /// Accept the first `count` calls of `operation`, reject every later one
    RejectAfterN {
        /// Wire operation name
        operation: &'static str,
        /// Calls accepted before rejections start
        count: u32,
    },
    /// Always reject `operation`
    Reject {
        /// Wire operation name
        operation: &'static str,
    },
    /// Stall `operation` for `after`, then fail with a deadline error
    Timeout {
        /// Wire operation name
        operation: &'static str,
        /// How long the call hangs before failing
        after: Duration,
    },
    /// The link drops on the first call and stays down
    CommunicationLoss,
    /// The link drops after `count` successful calls of any operation
    CommunicationLossAfterN {
        /// Calls that succeed before the link drops
        count: u32,
    },
}

/// Outcome of a fault check that should alter the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    /// The device answers with `ok = false`
    Reject,
    /// The call fails at the transport level
    CommunicationLoss,
    /// The call stalls for the given duration, then fails
    Timeout(Duration),
}

#[derive(Default, Debug)]
struct FaultState {
    operation_counts: HashMap<&'static str, u32>,
    total_calls: u32,
    communication_lost: bool,
}

impl FaultConfig {
    /// No injected faults (default)
    pub fn none() -> Self {
        Self::build(HashMap::new(), Vec::new(), None)
    }

    /// Reject every operation with the given probability
    pub fn random_rejections(rate: f64) -> Self {
        Self::random_rejections_seeded(rate, None)
    }

    /// Reject every operation with the given probability, reproducibly
    pub fn random_rejections_seeded(rate: f64, seed: Option<u64>) -> Self {
        let mut rates = HashMap::new();
        rates.insert("*", rate);
        Self::build(rates, Vec::new(), seed)
    }

    /// A single scripted scenario
    pub fn scenario(scenario: FaultScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    /// Several scripted scenarios, checked in order
    pub fn scenarios(scenarios: Vec<FaultScenario>) -> Self {
        Self::build(HashMap::new(), scenarios, None)
    }

    /// Custom rejection rates per operation
    pub fn with_rates(rates: HashMap<&'static str, f64>) -> Self {
        Self::build(rates, Vec::new(), None)
    }

    fn build(
        rates: HashMap<&'static str, f64>,
        scenarios: Vec<FaultScenario>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            reject_rates: Arc::new(rates),
            scenarios: Arc::new(scenarios),
            rng: Arc::new(FaultRng::new(seed)),
            state: Arc::new(Mutex::new(FaultState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FaultState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide whether `operation` should be disturbed.
    ///
    /// Returns `None` when the call proceeds normally. A lost link is
    /// reported for every call until [`reset`](Self::reset) or
    /// [`restore_link`](Self::restore_link).
    pub fn check_operation(&self, operation: &'static str) -> Option<InjectedFault> {
        let mut state = self.lock();

        if state.communication_lost {
            return Some(InjectedFault::CommunicationLoss);
        }

        for scenario in self.scenarios.iter() {
            match scenario {
                FaultScenario::RejectAfterN {
                    operation: op,
                    count,
                } if *op == operation => {
                    let current = state.operation_counts.entry(operation).or_insert(0);
                    *current = current.saturating_add(1);
                    if *current > *count {
                        return Some(InjectedFault::Reject);
                    }
                }
                FaultScenario::Reject { operation: op } if *op == operation => {
                    return Some(InjectedFault::Reject);
                }
                FaultScenario::Timeout {
                    operation: op,
                    after,
                } if *op == operation => {
                    return Some(InjectedFault::Timeout(*after));
                }
                FaultScenario::CommunicationLoss => {
                    state.communication_lost = true;
                    return Some(InjectedFault::CommunicationLoss);
                }
                FaultScenario::CommunicationLossAfterN { count } => {
                    if state.total_calls >= *count {
                        state.communication_lost = true;
                        return Some(InjectedFault::CommunicationLoss);
                    }
                }
                _ => {}
            }
        }

        state.total_calls = state.total_calls.saturating_add(1);
        drop(state);

        let rate = self
            .reject_rates
            .get(operation)
            .or_else(|| self.reject_rates.get("*"))
            .copied()
            .unwrap_or(0.0);

        self.rng.roll(rate).then_some(InjectedFault::Reject)
    }

    /// Drop the link now, independent of any scenario.
    pub fn sever_link(&self) {
        self.lock().communication_lost = true;
    }

    /// Bring a lost link back without clearing the counters.
    pub fn restore_link(&self) {
        self.lock().communication_lost = false;
    }

    /// Whether the simulated link is down.
    #[must_use]
    pub fn is_link_lost(&self) -> bool {
        self.lock().communication_lost
    }

    /// Reset fault state (counters and link)
    pub fn reset(&self) {
        *self.lock() = FaultState::default();
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_faults() {
        let config = FaultConfig::none();
        for _ in 0..100 {
            assert_eq!(config.check_operation("ReadSysReg"), None);
        }
    }

    #[test]
    fn test_random_rejections() {
        let config = FaultConfig::random_rejections_seeded(0.5, Some(42));
        let rejected = (0..1000)
            .filter(|_| config.check_operation("ReadSysReg").is_some())
            .count();
        assert!(rejected > 400 && rejected < 600, "Got {} rejections", rejected);
    }

    #[test]
    fn test_reject_after_n() {
        let config = FaultConfig::scenario(FaultScenario::RejectAfterN {
            operation: "RecordImage",
            count: 3,
        });

        for i in 0..3 {
            assert_eq!(
                config.check_operation("RecordImage"),
                None,
                "Call {} should pass",
                i + 1
            );
        }
        assert_eq!(config.check_operation("RecordImage"), Some(InjectedFault::Reject));
        assert_eq!(config.check_operation("RecordBlack"), None);
    }

    #[test]
    fn test_timeout_scenario() {
        let after = Duration::from_millis(250);
        let config = FaultConfig::scenario(FaultScenario::Timeout {
            operation: "ReadImage",
            after,
        });
        assert_eq!(
            config.check_operation("ReadImage"),
            Some(InjectedFault::Timeout(after))
        );
        assert_eq!(config.check_operation("ReadBlack"), None);
    }

    #[test]
    fn test_communication_loss_persists_across_clones() {
        let config = FaultConfig::scenario(FaultScenario::CommunicationLoss);
        let clone = config.clone();

        assert_eq!(
            config.check_operation("GetVersion"),
            Some(InjectedFault::CommunicationLoss)
        );
        assert!(clone.is_link_lost());
        assert_eq!(
            clone.check_operation("CameraOpen"),
            Some(InjectedFault::CommunicationLoss)
        );
    }

    #[test]
    fn test_communication_loss_after_n() {
        let config = FaultConfig::scenario(FaultScenario::CommunicationLossAfterN { count: 2 });
        assert_eq!(config.check_operation("GetVersion"), None);
        assert_eq!(config.check_operation("CameraOpen"), None);
        assert_eq!(
            config.check_operation("RecordImage"),
            Some(InjectedFault::CommunicationLoss)
        );
    }

    #[test]
    fn test_sever_and_restore_link() {
        let config = FaultConfig::none();
        config.sever_link();
        assert_eq!(
            config.check_operation("ReadCamReg"),
            Some(InjectedFault::CommunicationLoss)
        );
        config.restore_link();
        assert_eq!(config.check_operation("ReadCamReg"), None);
    }

    #[test]
    fn test_reset() {
        let config = FaultConfig::scenario(FaultScenario::RejectAfterN {
            operation: "WriteSysReg",
            count: 1,
        });

        assert_eq!(config.check_operation("WriteSysReg"), None);
        assert!(config.check_operation("WriteSysReg").is_some());

        config.reset();

        assert_eq!(config.check_operation("WriteSysReg"), None);
        assert!(config.check_operation("WriteSysReg").is_some());
    }

    #[test]
    fn test_custom_rates() {
        let mut rates = HashMap::new();
        rates.insert("ReadImage", 1.0);
        rates.insert("ReadBlack", 0.0);
        let config = FaultConfig::with_rates(rates);

        for _ in 0..10 {
            assert_eq!(config.check_operation("ReadImage"), Some(InjectedFault::Reject));
            assert_eq!(config.check_operation("ReadBlack"), None);
        }
    }
}
