//! A server node's top-level state: the federations it hosts or relays for, and its neighboring
//! connects (spec §3.1, §4.1, §4.9).

use std::collections::BTreeMap;

use rti_core::{ConnectHandle, FederationHandle};
use rti_tinymap::SlotTable;

use crate::error::ModelError;
use crate::federation::Federation;

/// One neighboring connect: either the node's parent (if any) or one of its children (spec
/// §3.1). The RTI's routing tree is exactly the set of live connects plus the `parent` pointer.
#[derive(Debug, Clone)]
pub struct NodeConnect {
    pub handle: ConnectHandle,
    pub is_parent: bool,
    /// Opaque, transport-layer identifying string (e.g. the peer's URL), for logging.
    pub peer: String,
}

/// A single server node's state (spec §4.1): the federation table, the connect table, and which
/// connect (if any) is its parent.
#[derive(Debug, Default)]
pub struct Node {
    pub federations: SlotTable<FederationHandle, Federation>,
    pub connects: SlotTable<ConnectHandle, NodeConnect>,
    pub parent: Option<ConnectHandle>,
    federations_by_name: BTreeMap<String, FederationHandle>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connect(&mut self, peer: String, is_parent: bool) -> ConnectHandle {
        let handle = self
            .connects
            .insert_with_key(|handle| NodeConnect { handle, is_parent, peer });
        if is_parent {
            self.parent = Some(handle);
        }
        handle
    }

    pub fn remove_connect(&mut self, handle: ConnectHandle) -> Option<NodeConnect> {
        if self.parent == Some(handle) {
            self.parent = None;
        }
        self.connects.remove(handle)
    }

    /// Creates a new federation execution (spec §4.3). Fails if the name is already in use.
    pub fn create_federation(&mut self, name: String) -> Result<FederationHandle, ModelError> {
        if self.federations_by_name.contains_key(&name) {
            return Err(ModelError::FederationExecutionAlreadyExists(name));
        }
        let name_clone = name.clone();
        let handle = self
            .federations
            .insert_with_key(|handle| Federation::new(handle, name));
        self.federations_by_name.insert(name_clone, handle);
        Ok(handle)
    }

    /// Destroys a federation execution (spec §4.3). Fails while any federate is still joined.
    pub fn destroy_federation(&mut self, handle: FederationHandle) -> Result<(), ModelError> {
        let federation = self
            .federations
            .get(handle)
            .ok_or(ModelError::UnknownFederation(handle))?;
        if !federation.is_empty() {
            return Err(ModelError::FederatesCurrentlyJoined(federation.name.clone()));
        }
        let federation = self.federations.remove(handle).expect("checked above");
        self.federations_by_name.remove(&federation.name);
        Ok(())
    }

    pub fn federation_by_name(&self, name: &str) -> Option<FederationHandle> {
        self.federations_by_name.get(name).copied()
    }

    /// Cascading cleanup when a connect is lost (spec §4.9): every federate joined through it
    /// resigns, and any federation left with no federates and no children is a destroy candidate
    /// for the caller to act on.
    pub fn federates_on_connect(&self, connect: ConnectHandle) -> Vec<(FederationHandle, rti_core::FederateHandle)> {
        let mut out = Vec::new();
        for (fed_handle, federation) in self.federations.iter() {
            for federate_handle in federation.federate_handles() {
                if federation.federates[federate_handle].connect == connect {
                    out.push((fed_handle, federate_handle));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_federation_rejects_duplicate_names() {
        let mut node = Node::new();
        node.create_federation("Exercise1".to_string()).unwrap();
        let err = node.create_federation("Exercise1".to_string());
        assert_eq!(
            err,
            Err(ModelError::FederationExecutionAlreadyExists("Exercise1".to_string()))
        );
    }

    #[test]
    fn destroy_federation_fails_while_federates_are_joined() {
        let mut node = Node::new();
        let handle = node.create_federation("Exercise1".to_string()).unwrap();
        let connect = node.add_connect("federate-a".to_string(), false);
        node.federations[handle]
            .join("Alice".to_string(), connect)
            .unwrap();

        assert!(matches!(
            node.destroy_federation(handle),
            Err(ModelError::FederatesCurrentlyJoined(_))
        ));
    }

    #[test]
    fn destroy_federation_succeeds_once_empty_and_frees_the_name() {
        let mut node = Node::new();
        let handle = node.create_federation("Exercise1".to_string()).unwrap();
        node.destroy_federation(handle).unwrap();
        assert!(node.create_federation("Exercise1".to_string()).is_ok());
    }
}
