//! Object instance and region state (spec §3.3, §4.5, §4.6).

use std::collections::BTreeSet;

use rti_core::{
    AttributeHandle, ConnectHandle, FederateHandle, ObjectClassHandle, ObjectInstanceHandle,
    RegionHandle,
};
use rti_tinymap::{SlotTable, TinySecondaryMap};

/// A live object instance (spec §3.3). Deleted when its owner (holder of `privilegeToDelete`)
/// disconnects or explicitly deletes it.
#[derive(Debug, Clone)]
pub struct ObjectInstance {
    pub handle: ObjectInstanceHandle,
    pub name: String,
    pub class: ObjectClassHandle,
    /// The connect that currently holds ownership of each attribute, keyed by attribute handle.
    /// Every live attribute has an owner; `privilegeToDelete`'s owner can delete the instance.
    pub attribute_owners: TinySecondaryMap<AttributeHandle, ConnectHandle>,
    /// Connects that know about this instance (have been told it was discovered), for targeted
    /// reflect/delete delivery.
    pub known_at: BTreeSet<ConnectHandle>,
}

impl ObjectInstance {
    pub fn owner_of(&self, attribute: AttributeHandle) -> Option<ConnectHandle> {
        self.attribute_owners.get(attribute).copied()
    }

    pub fn privilege_to_delete_holder(&self) -> Option<ConnectHandle> {
        // Attribute 0 on every root class is privilegeToDelete (spec §3.2).
        self.attribute_owners.get(AttributeHandle::from(0)).copied()
    }
}

/// A declared region of interest over one or more dimensions (spec §3.3 region-based routing).
#[derive(Debug, Clone)]
pub struct Region {
    pub handle: RegionHandle,
    pub owner: FederateHandle,
    pub extents: Vec<RegionExtent>,
}

#[derive(Debug, Clone, Copy)]
pub struct RegionExtent {
    pub dimension: rti_core::DimensionHandle,
    pub range_lower: u64,
    pub range_upper: u64,
}

/// A name reserved ahead of registration, tied to the connect that asked for it (spec §4.4: "a
/// successful reservation also registers a reference on the requesting connect").
#[derive(Debug, Clone)]
pub struct NameReservation {
    pub connect: ConnectHandle,
}

/// All object instances and regions live within one federation (spec §3.3).
#[derive(Debug, Default)]
pub struct InstanceModel {
    pub instances: SlotTable<ObjectInstanceHandle, ObjectInstance>,
    pub regions: SlotTable<RegionHandle, Region>,
    instances_by_name: std::collections::BTreeMap<String, ObjectInstanceHandle>,
    reservations: std::collections::BTreeMap<String, NameReservation>,
}

impl InstanceModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves `name` for `connect` if it is not already reserved or registered (spec §4.4).
    /// Returns `false` (without side effects) if the name is already taken either way.
    pub fn reserve_name(&mut self, name: &str, connect: ConnectHandle) -> bool {
        if self.instances_by_name.contains_key(name) || self.reservations.contains_key(name) {
            return false;
        }
        self.reservations
            .insert(name.to_string(), NameReservation { connect });
        true
    }

    pub fn release_reservation(&mut self, name: &str) -> Option<NameReservation> {
        self.reservations.remove(name)
    }

    /// Inserts a region owned by `owner` (spec §3.3, §3.5).
    pub fn insert_region(
        &mut self,
        owner: FederateHandle,
        extents: Vec<RegionExtent>,
    ) -> RegionHandle {
        self.regions
            .insert_with_key(|handle| Region { handle, owner, extents })
    }

    /// Replaces the extents of an existing region (spec §3.3). Returns `false` if the region is
    /// unknown.
    pub fn commit_region(&mut self, handle: RegionHandle, extents: Vec<RegionExtent>) -> bool {
        match self.regions.get_mut(handle) {
            Some(region) => {
                region.extents = extents;
                true
            }
            None => false,
        }
    }

    pub fn erase_region(&mut self, handle: RegionHandle) -> Option<Region> {
        self.regions.remove(handle)
    }

    /// Mints `count` fresh, unnamed instance handles for a later out-of-band
    /// `RegisterObjectInstance` (spec §4.4 `ObjectInstanceHandlesRequest`). Each starts owned
    /// (referenced) only by `owner`.
    pub fn allocate_anonymous(
        &mut self,
        owner: ConnectHandle,
        count: u32,
    ) -> Vec<ObjectInstanceHandle> {
        (0..count)
            .map(|_| {
                self.instances.insert_with_key(|handle| ObjectInstance {
                    handle,
                    name: String::new(),
                    class: ObjectClassHandle::from(0),
                    attribute_owners: TinySecondaryMap::new(),
                    known_at: BTreeSet::from([owner]),
                })
            })
            .collect()
    }

    /// Drops the calling connect's reference on a batch of handles, releasing any that are left
    /// with no references anywhere (spec §4.4
    /// `ReleaseMultipleObjectInstanceNameHandlePairs`).
    pub fn release_handles(&mut self, connect: ConnectHandle, handles: &[ObjectInstanceHandle]) {
        for &handle in handles {
            let now_empty = match self.instances.get_mut(handle) {
                Some(inst) => {
                    inst.known_at.remove(&connect);
                    inst.known_at.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.delete(handle);
            }
        }
    }

    pub fn discover(
        &mut self,
        name: String,
        class: ObjectClassHandle,
        owner: ConnectHandle,
        privilege_to_delete_attr: AttributeHandle,
    ) -> ObjectInstanceHandle {
        let mut attribute_owners = TinySecondaryMap::new();
        attribute_owners.insert(privilege_to_delete_attr, owner);
        let name_clone = name.clone();
        let handle = self.instances.insert_with_key(|handle| ObjectInstance {
            handle,
            name,
            class,
            attribute_owners,
            known_at: BTreeSet::from([owner]),
        });
        self.instances_by_name.insert(name_clone.clone(), handle);
        self.reservations.remove(&name_clone);
        handle
    }

    /// Removes an instance, e.g. after its owner disconnected or explicitly deleted it (spec
    /// §4.9: "every ObjectInstance whose privilegeToDelete owner was that connect is deleted").
    pub fn delete(&mut self, handle: ObjectInstanceHandle) -> Option<ObjectInstance> {
        let removed = self.instances.remove(handle)?;
        self.instances_by_name.remove(&removed.name);
        Some(removed)
    }

    pub fn by_name(&self, name: &str) -> Option<ObjectInstanceHandle> {
        self.instances_by_name.get(name).copied()
    }

    /// Every instance whose `privilegeToDelete` owner is `connect` (spec §4.9 cascading cleanup).
    pub fn instances_owned_by(&self, connect: ConnectHandle) -> Vec<ObjectInstanceHandle> {
        self.instances
            .iter()
            .filter(|(_, inst)| inst.privilege_to_delete_holder() == Some(connect))
            .map(|(handle, _)| handle)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(i: usize) -> ConnectHandle {
        ConnectHandle::from(i)
    }

    #[test]
    fn discover_then_delete_round_trips_and_frees_the_name() {
        let mut model = InstanceModel::new();
        let attr0 = AttributeHandle::from(0);
        let handle = model.discover(
            "Tank1".to_string(),
            ObjectClassHandle::from(0),
            connect(1),
            attr0,
        );
        assert!(!model.reserve_name("Tank1", connect(2)));
        assert_eq!(model.by_name("Tank1"), Some(handle));

        model.delete(handle);
        assert!(model.reserve_name("Tank1", connect(2)));
        assert_eq!(model.by_name("Tank1"), None);
    }

    #[test]
    fn reservation_blocks_a_second_reservation_of_the_same_name() {
        let mut model = InstanceModel::new();
        assert!(model.reserve_name("HLA_not_checked_here", connect(1)));
        assert!(!model.reserve_name("HLA_not_checked_here", connect(2)));
        model.release_reservation("HLA_not_checked_here");
        assert!(model.reserve_name("HLA_not_checked_here", connect(2)));
    }

    #[test]
    fn region_commit_replaces_extents_and_erase_removes_it() {
        let mut model = InstanceModel::new();
        let dim = rti_core::DimensionHandle::from(0);
        let handle = model.insert_region(
            FederateHandle::from(0),
            vec![RegionExtent {
                dimension: dim,
                range_lower: 0,
                range_upper: 10,
            }],
        );
        assert!(model.commit_region(
            handle,
            vec![RegionExtent {
                dimension: dim,
                range_lower: 5,
                range_upper: 15,
            }]
        ));
        assert_eq!(model.regions[handle].extents[0].range_lower, 5);
        assert!(model.erase_region(handle).is_some());
        assert!(model.erase_region(handle).is_none());
    }

    #[test]
    fn instances_owned_by_finds_privilege_to_delete_holder() {
        let mut model = InstanceModel::new();
        let attr0 = AttributeHandle::from(0);
        let owner = connect(5);
        let handle = model.discover("X".to_string(), ObjectClassHandle::from(0), owner, attr0);

        let owned = model.instances_owned_by(owner);
        assert_eq!(owned, vec![handle]);
        assert!(model.instances_owned_by(connect(9)).is_empty());
    }

    #[test]
    fn anonymous_handles_are_released_once_their_only_reference_drops() {
        let mut model = InstanceModel::new();
        let handles = model.allocate_anonymous(connect(1), 3);
        assert_eq!(handles.len(), 3);
        assert!(model.instances.contains(handles[0]));

        model.release_handles(connect(1), &handles);
        for h in handles {
            assert!(!model.instances.contains(h));
        }
    }
}
