//! Time management bookkeeping (spec §3.3, §4.8): tracking regulating federates' current time,
//! computing GALT (greatest available logical time) for constrained federates, and deciding which
//! pending time-advance requests can now be granted.
//!
//! Generic over the pluggable [`LogicalTime`] implementation; carries no time arithmetic itself
//! beyond ordering, matching the "no concrete time algebra" non-goal.

use std::collections::BTreeMap;

use rti_core::{CommitKind, FederateHandle, LogicalTime};

use crate::object_model::OrderType;

/// One federate's time-management state within a federation (spec §4.8).
#[derive(Debug, Clone)]
pub struct FederateTimeState<T: LogicalTime> {
    pub regulating: bool,
    pub constrained: bool,
    pub current_time: T,
    /// The lower bound a regulating federate has committed not to send a timestamped message
    /// below (spec §4.8 `NextMessageCommit`); constrained federates use this alongside
    /// `current_time` to compute their own GALT.
    pub next_message_timestamp: T,
    /// Monotonically increasing per federate (spec §4.8).
    pub commit_id: u64,
    /// Set while a `TimeAdvanceRequest`/`NextEventRequest` is outstanding; cleared once granted.
    pub pending_advance: Option<PendingAdvance<T>>,
}

#[derive(Debug, Clone, Copy)]
pub struct PendingAdvance<T: LogicalTime> {
    pub requested_time: T,
    pub order_type: OrderType,
}

impl<T: LogicalTime> FederateTimeState<T> {
    pub fn new(current_time: T) -> Self {
        Self {
            regulating: false,
            constrained: false,
            current_time,
            next_message_timestamp: current_time,
            commit_id: 0,
            pending_advance: None,
        }
    }
}

/// Per-federation time-management tracker.
#[derive(Debug)]
pub struct TimeManager<T: LogicalTime> {
    federates: BTreeMap<FederateHandle, FederateTimeState<T>>,
}

impl<T: LogicalTime> Default for TimeManager<T> {
    fn default() -> Self {
        Self {
            federates: BTreeMap::new(),
        }
    }
}

impl<T: LogicalTime> TimeManager<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enroll(&mut self, federate: FederateHandle, initial_time: T) {
        self.federates
            .entry(federate)
            .or_insert_with(|| FederateTimeState::new(initial_time));
    }

    pub fn remove(&mut self, federate: FederateHandle) {
        self.federates.remove(&federate);
    }

    pub fn set_regulating(&mut self, federate: FederateHandle, regulating: bool) {
        if let Some(state) = self.federates.get_mut(&federate) {
            state.regulating = regulating;
        }
    }

    pub fn set_constrained(&mut self, federate: FederateHandle, constrained: bool) {
        if let Some(state) = self.federates.get_mut(&federate) {
            state.constrained = constrained;
        }
    }

    /// GALT: the lower bound, over every time-regulating federate, of its current logical time
    /// (spec §4.8). `None` if there are no regulating federates (unbounded advance).
    pub fn galt(&self) -> Option<T> {
        self.federates
            .values()
            .filter(|s| s.regulating)
            .map(|s| s.current_time)
            .min()
    }

    pub fn request_advance(
        &mut self,
        federate: FederateHandle,
        requested_time: T,
        order_type: OrderType,
    ) {
        if let Some(state) = self.federates.get_mut(&federate) {
            state.pending_advance = Some(PendingAdvance {
                requested_time,
                order_type,
            });
        }
    }

    /// Every federate whose pending request can now be satisfied, given the current GALT (spec
    /// §4.8: a constrained federate may advance to `t` only once GALT >= `t`; an unconstrained one
    /// may always advance immediately). Grants are applied (federate's `current_time` is updated,
    /// the pending request cleared) and returned.
    pub fn grantable(&mut self) -> Vec<FederateHandle> {
        let galt = self.galt();
        let mut granted = Vec::new();
        for (&handle, state) in self.federates.iter_mut() {
            let Some(pending) = state.pending_advance else {
                continue;
            };
            let can_grant = if state.constrained {
                galt.map_or(true, |galt| galt >= pending.requested_time)
            } else {
                true
            };
            if can_grant {
                state.current_time = pending.requested_time;
                state.pending_advance = None;
                granted.push(handle);
            }
        }
        granted
    }

    pub fn current_time(&self, federate: FederateHandle) -> Option<T> {
        self.federates.get(&federate).map(|s| s.current_time)
    }

    /// Applies a `CommitLowerBoundTimeStamp` (spec §4.8): updates one or both of the federate's
    /// timestamps depending on `kind`, and bumps its commit id.
    pub fn commit_lower_bound(&mut self, federate: FederateHandle, kind: CommitKind, time: T, commit_id: u64) {
        if let Some(state) = self.federates.get_mut(&federate) {
            match kind {
                CommitKind::TimeAdvanceCommit => state.current_time = time,
                CommitKind::NextMessageCommit => state.next_message_timestamp = time,
                CommitKind::TimeAdvanceAndNextMessageCommit => {
                    state.current_time = time;
                    state.next_message_timestamp = time;
                }
            }
            state.commit_id = commit_id;
        }
    }

    pub fn is_regulating(&self, federate: FederateHandle) -> bool {
        self.federates.get(&federate).map(|s| s.regulating).unwrap_or(false)
    }

    /// Every currently-enrolled regulating federate (spec §4.8:
    /// `LockedByNextMessageRequest` targets "currently-regulating connects").
    pub fn regulating_federates(&self) -> impl Iterator<Item = FederateHandle> + '_ {
        self.federates
            .iter()
            .filter(|(_, s)| s.regulating)
            .map(|(&h, _)| h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rti_core::Integer64Time;

    fn federate(i: usize) -> FederateHandle {
        FederateHandle::from(i)
    }

    #[test]
    fn unconstrained_federate_advances_immediately() {
        let mut mgr = TimeManager::<Integer64Time>::new();
        mgr.enroll(federate(0), Integer64Time(0));
        mgr.request_advance(federate(0), Integer64Time(10), OrderType::TimeStamp);
        assert_eq!(mgr.grantable(), vec![federate(0)]);
        assert_eq!(mgr.current_time(federate(0)), Some(Integer64Time(10)));
    }

    #[test]
    fn constrained_federate_waits_for_galt() {
        let mut mgr = TimeManager::<Integer64Time>::new();
        mgr.enroll(federate(0), Integer64Time(0));
        mgr.enroll(federate(1), Integer64Time(0));
        mgr.set_regulating(federate(0), true);
        mgr.set_constrained(federate(1), true);

        mgr.request_advance(federate(1), Integer64Time(5), OrderType::TimeStamp);
        assert!(mgr.grantable().is_empty());

        mgr.federates.get_mut(&federate(0)).unwrap().current_time = Integer64Time(5);
        assert_eq!(mgr.grantable(), vec![federate(1)]);
    }

    #[test]
    fn galt_is_none_with_no_regulating_federates() {
        let mut mgr = TimeManager::<Integer64Time>::new();
        mgr.enroll(federate(0), Integer64Time(0));
        assert_eq!(mgr.galt(), None);
    }

    #[test]
    fn commit_lower_bound_updates_only_the_requested_timestamp() {
        let mut mgr = TimeManager::<Integer64Time>::new();
        mgr.enroll(federate(0), Integer64Time(0));
        mgr.set_regulating(federate(0), true);

        mgr.commit_lower_bound(federate(0), CommitKind::NextMessageCommit, Integer64Time(7), 1);
        assert_eq!(mgr.current_time(federate(0)), Some(Integer64Time(0)));
        assert!(mgr.regulating_federates().any(|f| f == federate(0)));

        mgr.commit_lower_bound(federate(0), CommitKind::TimeAdvanceCommit, Integer64Time(3), 2);
        assert_eq!(mgr.current_time(federate(0)), Some(Integer64Time(3)));
    }
}
