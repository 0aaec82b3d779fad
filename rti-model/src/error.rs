//! Error kinds the object model and dispatcher produce (spec §7).
//!
//! Mirrors the style of `boomerang_federated::client::ClientError`: one `thiserror` enum per
//! layer, `#[from]` for the obvious wraps, no panics for expected outcomes.

use rti_core::{AttributeHandle, FederateHandle, FederationHandle, ObjectClassHandle};
use thiserror::Error;

/// Errors surfaced while building or extending a federation's object model (spec §4.2).
#[derive(Debug, Error, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InconsistentFddError {
    #[error("dimension {name:?} already exists with a different upper bound")]
    DimensionBoundMismatch { name: String },
    #[error("update rate {name:?} already exists with a different rate")]
    UpdateRateMismatch { name: String },
    #[error("interaction class {path:?} already exists with a different order/transport/dimension set")]
    InteractionClassMismatch { path: String },
    #[error("object class {path:?} already exists with a different order/transport/dimension set")]
    ObjectClassMismatch { path: String },
    #[error("parameter {name:?} of interaction class {class:?} already exists with a different shape")]
    ParameterMismatch { class: String, name: String },
    #[error("attribute {name:?} of object class {class:?} already exists with a different shape")]
    AttributeMismatch { class: String, name: String },
    #[error("parent class {parent:?} named by {child:?} does not exist")]
    UnknownParent { child: String, parent: String },
}

/// Errors the object model / federation bookkeeping can produce; each one maps directly onto a
/// typed response message at the dispatcher boundary (spec §7).
#[derive(Debug, Error, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ModelError {
    #[error("federation execution {0:?} already exists")]
    FederationExecutionAlreadyExists(String),

    #[error("federation execution {0:?} does not exist")]
    FederationExecutionDoesNotExist(String),

    #[error("federation execution {0:?} still has federates joined")]
    FederatesCurrentlyJoined(String),

    #[error("federate name {0:?} is already in use in this federation")]
    FederateNameAlreadyInUse(String),

    #[error("inconsistent FDD: {0}")]
    InconsistentFdd(#[from] InconsistentFddError),

    #[error("synchronization point label {0:?} is not unique")]
    LabelNotUnique(String),

    #[error("unknown federation handle {0:?}")]
    UnknownFederation(FederationHandle),

    #[error("unknown federate handle {0:?}")]
    UnknownFederate(FederateHandle),

    #[error("unknown object class handle {0:?}")]
    UnknownObjectClass(ObjectClassHandle),

    #[error("unknown attribute handle {0:?} on class {1:?}")]
    UnknownAttribute(ObjectClassHandle, AttributeHandle),

    #[error("object instance name {0:?} is reserved for the RTI")]
    ReservedInstanceName(String),

    #[error("object instance name {0:?} is already reserved or in use")]
    InstanceNameInUse(String),

    #[error("a fixed-federate-set synchronization point cannot be incrementally updated")]
    SynchronizationPointFixedSet,

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error("internal RTI error: {0}")]
    RtiInternal(String),
}

/// A peer sent a structurally or semantically illegal message (spec §7). Fatal to the offending
/// connect.
#[derive(Debug, Error, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MessageError {
    #[error("received {message_kind} while federate {federate:?} was not in a state to accept it")]
    UnexpectedMessage {
        federate: Option<FederateHandle>,
        message_kind: &'static str,
    },

    #[error("attempted to reserve a name starting with the reserved \"HLA\" prefix: {0:?}")]
    ReservedNamePrefix(String),

    #[error("incrementally-updating a fixed-federate-set synchronization point is a protocol error")]
    FixedSyncPointUpdate,

    #[error("malformed message: {0}")]
    Malformed(String),
}
