//! Logical time as an opaque, pluggable value, and wall-clock deadlines for the server loop.
//!
//! Per spec §1(d), the logical-time factory (integer64, float64, ...) is an external
//! collaborator: this crate defines no time *algebra*, only the ordering contract the object
//! model needs to track LBTS/commit bookkeeping (spec §3.3, §4.8) without caring which concrete
//! representation a federation chose.

use std::time::Duration;

/// A value produced by some federation's logical-time factory.
///
/// The core only ever compares and clones these; it never adds, subtracts, or otherwise
/// interprets them (that would be "implementing concrete logical-time algebra", an explicit
/// non-goal). [`Integer64Time`] and [`Float64Time`] are the two concrete factories named in the
/// spec, provided so the model and its tests have something real to plug in.
pub trait LogicalTime:
    std::fmt::Debug + Clone + Copy + PartialEq + Eq + PartialOrd + Ord + Send + Sync + 'static
{
}

impl<T> LogicalTime for T where
    T: std::fmt::Debug + Clone + Copy + PartialEq + Eq + PartialOrd + Ord + Send + Sync + 'static
{
}

/// The `integer64` logical-time factory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Integer64Time(pub i64);

/// The `float64` logical-time factory.
///
/// Federates are assumed never to produce NaN timestamps; comparing one will panic rather than
/// silently misorder the federation, since a NaN LBTS would violate every ordering invariant the
/// RTI relies on.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Float64Time(pub f64);

impl PartialEq for Float64Time {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Float64Time {}

impl PartialOrd for Float64Time {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Float64Time {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .partial_cmp(&other.0)
            .expect("federate produced a NaN logical-time timestamp")
    }
}

/// A kind of commit a federate can make against its LBTS (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CommitKind {
    TimeAdvanceCommit,
    NextMessageCommit,
    TimeAdvanceAndNextMessageCommit,
}

/// A wall-clock instant, represented as an offset from a fixed origin so it saturates instead of
/// panicking at the edges (spec §8.3: `Clock::fromSeconds(-1) == zero`,
/// `Clock::fromSeconds(huge) == max`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Clock(Duration);

impl Clock {
    pub const ZERO: Clock = Clock(Duration::ZERO);
    pub const MAX: Clock = Clock(Duration::MAX);

    /// Builds a `Clock` `seconds` (fractional, may be negative or huge) after the origin,
    /// saturating at [`Clock::ZERO`]/[`Clock::MAX`] rather than over/underflowing.
    pub fn from_seconds(seconds: f64) -> Clock {
        if seconds.is_nan() || seconds <= 0.0 {
            return Clock::ZERO;
        }
        if seconds.is_infinite() || seconds >= Duration::MAX.as_secs_f64() {
            return Clock::MAX;
        }
        Clock(Duration::from_secs_f64(seconds))
    }

    pub fn now() -> Clock {
        use std::sync::OnceLock;
        static ORIGIN: OnceLock<std::time::Instant> = OnceLock::new();
        let origin = *ORIGIN.get_or_init(std::time::Instant::now);
        Clock(std::time::Instant::now().saturating_duration_since(origin))
    }

    /// Returns the `Clock` `offset` after `self`, saturating at [`Clock::MAX`].
    pub fn checked_add(&self, offset: Duration) -> Clock {
        Clock(self.0.saturating_add(offset))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_seconds_saturates_at_bounds() {
        assert_eq!(Clock::from_seconds(-1.0), Clock::ZERO);
        assert_eq!(Clock::from_seconds(0.0), Clock::ZERO);
        assert_eq!(Clock::from_seconds(f64::INFINITY), Clock::MAX);
        assert_eq!(Clock::from_seconds(1e30), Clock::MAX);
    }

    #[test]
    fn from_seconds_round_trips_ordinary_values() {
        let c = Clock::from_seconds(10.0);
        assert!(c > Clock::ZERO);
        assert!(c < Clock::MAX);
        assert_eq!(c.as_duration(), Duration::from_secs(10));
    }

    #[test]
    fn integer_time_orders_as_expected() {
        let a = Integer64Time(1);
        let b = Integer64Time(2);
        assert!(a < b);
    }

    #[test]
    fn float_time_orders_as_expected() {
        let a = Float64Time(1.5);
        let b = Float64Time(2.5);
        assert!(a < b);
        assert_eq!(a, Float64Time(1.5));
    }
}
