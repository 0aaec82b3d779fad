//! Federation execution state: joined federates, per-connect federation membership, and
//! synchronization points (spec §3.3, §3.4, §4.3, §4.7).

use std::collections::BTreeSet;

use rti_core::{ConnectHandle, FederateHandle, FederationHandle};
use rti_tinymap::SlotTable;

use crate::error::{MessageError, ModelError};
use crate::instance::InstanceModel;
use crate::object_model::ObjectModel;

/// A federate that has joined this federation (spec §3.3).
#[derive(Debug, Clone)]
pub struct Federate {
    pub handle: FederateHandle,
    pub name: String,
    pub connect: ConnectHandle,
    pub time_regulating: bool,
    pub time_constrained: bool,
}

/// One synchronization point's progress (spec §3.4, §4.7).
#[derive(Debug, Clone)]
pub struct SynchronizationPoint {
    pub label: String,
    /// `None` means "open to any current and future federate"; `Some` is a fixed set announced at
    /// registration and cannot be extended afterward (spec §4.7 edge case).
    pub fixed_federate_set: Option<BTreeSet<FederateHandle>>,
    pub achieved: BTreeSet<FederateHandle>,
}

impl SynchronizationPoint {
    /// The set of federates this point is currently waiting on, given who has joined so far.
    pub fn waiting_on(&self, joined: impl Iterator<Item = FederateHandle>) -> BTreeSet<FederateHandle> {
        let participants: BTreeSet<FederateHandle> = match &self.fixed_federate_set {
            Some(set) => set.clone(),
            None => joined.collect(),
        };
        participants.difference(&self.achieved).copied().collect()
    }

    pub fn is_complete(&self, joined: impl Iterator<Item = FederateHandle>) -> bool {
        self.waiting_on(joined).is_empty()
    }
}

/// Per-connect federation membership record: the node's own connect is a member too once it has
/// at least one federate or a subordinate connect with members (spec §3.3/§4.3: a federation
/// execution conceptually spans every node that has a stake in it).
#[derive(Debug, Clone, Default)]
pub struct FederationConnect {
    pub federate_count: usize,
}

/// One federation execution (spec §3.3): the object model built by its federates' modules, the
/// live instance model, the joined federates, and synchronization point state.
#[derive(Debug)]
pub struct Federation {
    pub handle: FederationHandle,
    pub name: String,
    pub model: ObjectModel,
    pub instances: InstanceModel,
    pub federates: SlotTable<FederateHandle, Federate>,
    pub connects: std::collections::BTreeMap<ConnectHandle, FederationConnect>,
    pub synchronization_points: Vec<SynchronizationPoint>,
    federate_names: std::collections::BTreeSet<String>,
}

impl Federation {
    pub fn new(handle: FederationHandle, name: String) -> Self {
        Self {
            handle,
            name,
            model: ObjectModel::new(),
            instances: InstanceModel::new(),
            federates: SlotTable::new(),
            connects: std::collections::BTreeMap::new(),
            synchronization_points: Vec::new(),
            federate_names: std::collections::BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.federates.is_empty()
    }

    /// Admits a new federate (spec §4.3). Fails if the name is already in use within this
    /// federation.
    pub fn join(
        &mut self,
        name: String,
        connect: ConnectHandle,
    ) -> Result<FederateHandle, ModelError> {
        if self.federate_names.contains(&name) {
            return Err(ModelError::FederateNameAlreadyInUse(name));
        }
        self.federate_names.insert(name.clone());
        let handle = self.federates.insert_with_key(|handle| Federate {
            handle,
            name,
            connect,
            time_regulating: false,
            time_constrained: false,
        });
        *self.connects.entry(connect).or_default() = FederationConnect {
            federate_count: self
                .connects
                .get(&connect)
                .map(|c| c.federate_count)
                .unwrap_or(0)
                + 1,
        };
        Ok(handle)
    }

    /// Removes a federate (resign, or cascading disconnect cleanup, spec §4.9).
    pub fn resign(&mut self, handle: FederateHandle) -> Result<Federate, ModelError> {
        let federate = self
            .federates
            .remove(handle)
            .ok_or(ModelError::UnknownFederate(handle))?;
        self.federate_names.remove(&federate.name);
        if let Some(entry) = self.connects.get_mut(&federate.connect) {
            entry.federate_count = entry.federate_count.saturating_sub(1);
            if entry.federate_count == 0 {
                self.connects.remove(&federate.connect);
            }
        }
        Ok(federate)
    }

    pub fn federate_handles(&self) -> impl Iterator<Item = FederateHandle> + '_ {
        self.federates.keys()
    }

    /// Every federate currently joined through `connect` (spec §4.7 per-connect announce).
    pub fn federates_on(&self, connect: ConnectHandle) -> Vec<FederateHandle> {
        self.federates
            .iter()
            .filter(|(_, f)| f.connect == connect)
            .map(|(h, _)| h)
            .collect()
    }

    /// The distinct connects hosting any federate in `federates` (spec §4.7:
    /// `FederationSynchronized` fans to "every connect that had any federate achieve").
    pub fn connects_with_any_of(&self, federates: &BTreeSet<FederateHandle>) -> BTreeSet<ConnectHandle> {
        self.federates
            .iter()
            .filter(|(h, _)| federates.contains(h))
            .map(|(_, f)| f.connect)
            .collect()
    }

    /// Registers a new synchronization point label (spec §4.7). Labels must be unique within the
    /// federation's currently-open points.
    pub fn register_synchronization_point(
        &mut self,
        label: String,
        fixed_federate_set: Option<BTreeSet<FederateHandle>>,
    ) -> Result<(), ModelError> {
        if self.synchronization_points.iter().any(|p| p.label == label) {
            return Err(ModelError::LabelNotUnique(label));
        }
        self.synchronization_points.push(SynchronizationPoint {
            label,
            fixed_federate_set,
            achieved: BTreeSet::new(),
        });
        Ok(())
    }

    /// Records that `federate` has achieved `label` (spec §4.7). Returns the point's achieved set
    /// once every participant has achieved it, in which case the point is dropped and the caller
    /// should announce `FederationSynchronized` to every connect with a federate in that set.
    pub fn achieve_synchronization_point(
        &mut self,
        label: &str,
        federate: FederateHandle,
    ) -> Result<Option<BTreeSet<FederateHandle>>, ModelError> {
        let joined: Vec<FederateHandle> = self.federate_handles().collect();
        let point = self
            .synchronization_points
            .iter_mut()
            .find(|p| p.label == label)
            .ok_or_else(|| ModelError::Message(MessageError::Malformed(format!(
                "unknown synchronization point {label:?}"
            ))))?;
        point.achieved.insert(federate);
        let complete = point.is_complete(joined.into_iter());
        if complete {
            let achieved = point.achieved.clone();
            self.synchronization_points.retain(|p| p.label != label);
            return Ok(Some(achieved));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(i: usize) -> ConnectHandle {
        ConnectHandle::from(i)
    }

    #[test]
    fn join_rejects_duplicate_names() {
        let mut fed = Federation::new(FederationHandle::from(0), "Exercise1".to_string());
        fed.join("Alice".to_string(), connect(1)).unwrap();
        let err = fed.join("Alice".to_string(), connect(2));
        assert_eq!(err, Err(ModelError::FederateNameAlreadyInUse("Alice".to_string())));
    }

    #[test]
    fn resign_frees_the_name_for_reuse() {
        let mut fed = Federation::new(FederationHandle::from(0), "Exercise1".to_string());
        let alice = fed.join("Alice".to_string(), connect(1)).unwrap();
        fed.resign(alice).unwrap();
        assert!(fed.join("Alice".to_string(), connect(2)).is_ok());
    }

    #[test]
    fn synchronization_point_completes_once_every_joined_federate_achieves_it() {
        let mut fed = Federation::new(FederationHandle::from(0), "Exercise1".to_string());
        let alice = fed.join("Alice".to_string(), connect(1)).unwrap();
        let bob = fed.join("Bob".to_string(), connect(2)).unwrap();
        fed.register_synchronization_point("ReadyToRun".to_string(), None)
            .unwrap();

        assert!(fed.achieve_synchronization_point("ReadyToRun", alice).unwrap().is_none());
        assert!(fed.achieve_synchronization_point("ReadyToRun", bob).unwrap().is_some());
        assert!(fed.synchronization_points.is_empty());
    }

    #[test]
    fn fixed_federate_set_ignores_federates_outside_it() {
        let mut fed = Federation::new(FederationHandle::from(0), "Exercise1".to_string());
        let alice = fed.join("Alice".to_string(), connect(1)).unwrap();
        let _bob = fed.join("Bob".to_string(), connect(2)).unwrap();
        fed.register_synchronization_point(
            "Phase1".to_string(),
            Some(BTreeSet::from([alice])),
        )
        .unwrap();

        assert_eq!(
            fed.achieve_synchronization_point("Phase1", alice).unwrap(),
            Some(BTreeSet::from([alice]))
        );
    }

    #[test]
    fn connects_with_any_of_finds_only_the_hosting_connects() {
        let mut fed = Federation::new(FederationHandle::from(0), "Exercise1".to_string());
        let alice = fed.join("Alice".to_string(), connect(1)).unwrap();
        let _bob = fed.join("Bob".to_string(), connect(2)).unwrap();

        assert_eq!(fed.federates_on(connect(1)), vec![alice]);
        assert_eq!(
            fed.connects_with_any_of(&BTreeSet::from([alice])),
            BTreeSet::from([connect(1)])
        );
    }
}
