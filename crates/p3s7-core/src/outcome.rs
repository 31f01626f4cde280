//! Tagged result of a device operation.
//!
//! The wire protocol answers every call with a success flag and, for read-style
//! calls, a value that is only defined when the flag is set. [`Outcome`] makes
//! that rule structural: a rejected outcome has no value to misread.

use crate::error::{ControlError, ControlResult};

/// Device verdict on a single operation.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome<T> {
    /// The device performed the operation; `T` is its payload.
    Accepted(T),
    /// The device answered `ok = false`. There is no payload.
    Rejected,
}

impl<T> Outcome<T> {
    /// Build an outcome from the wire pair `(ok, value)`.
    ///
    /// The value is dropped when `ok` is false; whatever the device put in the
    /// data field of a failed response carries no meaning.
    pub fn from_parts(ok: bool, value: T) -> Self {
        if ok {
            Self::Accepted(value)
        } else {
            Self::Rejected
        }
    }

    /// Build an outcome lazily, only computing the value on success.
    pub fn from_flag(ok: bool, value: impl FnOnce() -> T) -> Self {
        if ok {
            Self::Accepted(value())
        } else {
            Self::Rejected
        }
    }

    /// `true` when the device accepted the operation.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// `true` when the device rejected the operation.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// The payload, if accepted.
    #[must_use]
    pub fn value(self) -> Option<T> {
        match self {
            Self::Accepted(value) => Some(value),
            Self::Rejected => None,
        }
    }

    /// Borrow the payload.
    pub fn as_ref(&self) -> Outcome<&T> {
        match self {
            Self::Accepted(value) => Outcome::Accepted(value),
            Self::Rejected => Outcome::Rejected,
        }
    }

    /// Transform the payload of an accepted outcome.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Accepted(value) => Outcome::Accepted(f(value)),
            Self::Rejected => Outcome::Rejected,
        }
    }

    /// Chain another fallible step onto an accepted outcome.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Self::Accepted(value) => f(value),
            Self::Rejected => Outcome::Rejected,
        }
    }

    /// Treat a rejection as an error, naming the operation.
    ///
    /// Useful for scripted workflows where any rejection aborts the run.
    pub fn into_result(self, operation: &'static str) -> ControlResult<T> {
        match self {
            Self::Accepted(value) => Ok(value),
            Self::Rejected => Err(ControlError::Rejected { operation }),
        }
    }
}

impl Outcome<()> {
    /// Outcome of a call whose only response is the success flag.
    pub fn from_ok(ok: bool) -> Self {
        Self::from_parts(ok, ())
    }
}

impl<T> From<Outcome<T>> for Option<T> {
    fn from(outcome: Outcome<T>) -> Self {
        outcome.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_pair_discards_value() {
        // A zero in the data field of a failed response must not surface.
        let outcome = Outcome::from_parts(false, 0u32);
        assert_eq!(outcome, Outcome::Rejected);
        assert_eq!(outcome.value(), None);
    }

    #[test]
    fn test_accepted_zero_is_a_real_zero() {
        let outcome = Outcome::from_parts(true, 0u32);
        assert_eq!(outcome.value(), Some(0));
    }

    #[test]
    fn test_from_flag_is_lazy() {
        let outcome: Outcome<Vec<u8>> = Outcome::from_flag(false, || panic!("not evaluated"));
        assert!(outcome.is_rejected());
    }

    #[test]
    fn test_into_result_names_operation() {
        let err = Outcome::<u32>::Rejected
            .into_result("ReadCamReg")
            .unwrap_err();
        assert_eq!(
            err,
            ControlError::Rejected {
                operation: "ReadCamReg"
            }
        );
        assert_eq!(Outcome::Accepted(7).into_result("ReadCamReg"), Ok(7));
    }

    #[test]
    fn test_map_and_then() {
        let doubled = Outcome::Accepted(21u32).map(|v| v * 2);
        assert_eq!(doubled, Outcome::Accepted(42));

        let chained = Outcome::Accepted(3u32).and_then(|v| {
            if v > 5 {
                Outcome::Accepted(v)
            } else {
                Outcome::Rejected
            }
        });
        assert!(chained.is_rejected());
    }
}
