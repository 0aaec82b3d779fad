//! The dispatcher-facing message catalogue (spec §6): every request a federate or a child node
//! can send up, and every notification the RTI sends back down or out.
//!
//! Kept as a single tagged union rather than one type per direction, mirroring how
//! `boomerang_federated::rti` dispatches on one incoming `RtiMsg` regardless of its origin.

use rti_core::{
    AttributeHandle, CommitKind, ConnectHandle, DimensionHandle, FederateHandle,
    FederationHandle, InteractionClassHandle, ObjectClassHandle, ObjectInstanceHandle,
    ParameterHandle, RegionHandle,
};

use crate::object_model::{ModuleDescription, OrderType};

/// An attribute/parameter value, carried opaquely — the wire encoding of federate-defined data is
/// out of scope (spec Non-goals).
pub type EncodedValue = Vec<u8>;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RtiMsg {
    // --- Federation execution lifecycle (spec §4.3) ---
    CreateFederationExecution {
        federation_name: String,
    },
    CreateFederationExecutionResponse(Result<(), crate::error::ModelError>),
    DestroyFederationExecution {
        federation_name: String,
    },
    DestroyFederationExecutionResponse(Result<(), crate::error::ModelError>),
    /// Root tells a child that a federation now exists in its subtree, so the child can push it
    /// into its own model on demand (spec §4.3: "pushes the federation into its own model").
    InsertFederationExecution {
        federation: FederationHandle,
        federation_name: String,
    },
    /// Broadcast to children when a federate's join brings new FDD modules into the federation.
    InsertModules {
        federation: FederationHandle,
        modules: Vec<ModuleDescription>,
    },
    /// A subtree's last federate resigned; the federation execution is gone from that subtree.
    EraseFederationExecution {
        federation: FederationHandle,
    },
    /// Root returns a FederationHandle to the free pool after `EraseFederationExecution` has
    /// propagated everywhere that used it (spec §3.1 handle release).
    ReleaseFederationHandle {
        federation: FederationHandle,
    },
    /// Root tells every other subtree a federate joined, so they can track its handle→connect
    /// mapping for routing (spec §4.3).
    JoinFederateNotify {
        federation: FederationHandle,
        federate: FederateHandle,
        federate_name: String,
    },
    ResignFederateNotify {
        federation: FederationHandle,
        federate: FederateHandle,
    },

    // --- Join / resign (spec §4.3) ---
    JoinFederationExecution {
        federation_name: String,
        federate_name: String,
        modules: Vec<ModuleDescription>,
    },
    JoinFederationExecutionResponse(Result<JoinedFederate, crate::error::ModelError>),
    ResignFederationExecution {
        federation: FederationHandle,
        federate: FederateHandle,
    },

    // --- Publication / subscription (spec §3.5, §4.5) ---
    PublishObjectClassAttributes {
        federation: FederationHandle,
        class: ObjectClassHandle,
        attributes: Vec<AttributeHandle>,
        publish: bool,
    },
    SubscribeObjectClassAttributes {
        federation: FederationHandle,
        class: ObjectClassHandle,
        attributes: Vec<AttributeHandle>,
        subscribe: bool,
    },
    PublishInteractionClass {
        federation: FederationHandle,
        class: InteractionClassHandle,
        publish: bool,
    },
    SubscribeInteractionClass {
        federation: FederationHandle,
        class: InteractionClassHandle,
        subscribe: bool,
    },
    /// Sent to a publisher to request a fresh update for attributes it owns (spec §6).
    RequestAttributeUpdate {
        federation: FederationHandle,
        instance: ObjectInstanceHandle,
        attributes: Vec<AttributeHandle>,
    },

    // --- Object instance name/handle lifecycle (spec §3.3, §4.4) ---
    ReserveObjectInstanceName {
        federation: FederationHandle,
        name: String,
    },
    ReserveObjectInstanceNameResponse(Result<String, crate::error::ModelError>),
    /// A child asks root for a batch of fresh, empty-named object-instance handles (spec §4.4).
    ObjectInstanceHandlesRequest {
        federation: FederationHandle,
        count: u32,
    },
    ObjectInstanceHandlesResponse(Result<Vec<ObjectInstanceHandle>, crate::error::ModelError>),
    /// Drops the requesting connect's reference on a batch of instance handles; when the last
    /// reference anywhere drops, the root releases the handle back to the allocator (spec §4.4).
    ReleaseMultipleObjectInstanceNameHandlePairs {
        federation: FederationHandle,
        instances: Vec<ObjectInstanceHandle>,
    },
    RegisterObjectInstance {
        federation: FederationHandle,
        class: ObjectClassHandle,
        name: String,
    },
    DiscoverObjectInstance {
        federation: FederationHandle,
        instance: ObjectInstanceHandle,
        class: ObjectClassHandle,
        name: String,
    },
    UpdateAttributeValues {
        federation: FederationHandle,
        instance: ObjectInstanceHandle,
        values: Vec<(AttributeHandle, EncodedValue)>,
        order_type: OrderType,
    },
    ReflectAttributeValues {
        federation: FederationHandle,
        instance: ObjectInstanceHandle,
        values: Vec<(AttributeHandle, EncodedValue)>,
        order_type: OrderType,
    },
    DeleteObjectInstance {
        federation: FederationHandle,
        instance: ObjectInstanceHandle,
    },
    RemoveObjectInstance {
        federation: FederationHandle,
        instance: ObjectInstanceHandle,
    },

    // --- Interactions (spec §3.3, §4.6) ---
    SendInteraction {
        federation: FederationHandle,
        class: InteractionClassHandle,
        parameters: Vec<(ParameterHandle, EncodedValue)>,
        order_type: OrderType,
    },
    ReceiveInteraction {
        federation: FederationHandle,
        class: InteractionClassHandle,
        parameters: Vec<(ParameterHandle, EncodedValue)>,
        order_type: OrderType,
    },

    // --- Data Distribution Management regions (spec §3.3, §3.5) ---
    InsertRegion {
        federation: FederationHandle,
        region: RegionHandle,
        owner: FederateHandle,
        extents: Vec<(DimensionHandle, u64, u64)>,
    },
    CommitRegion {
        federation: FederationHandle,
        region: RegionHandle,
        extents: Vec<(DimensionHandle, u64, u64)>,
    },
    EraseRegion {
        federation: FederationHandle,
        region: RegionHandle,
    },

    // --- Synchronization points (spec §4.7) ---
    RegisterFederationSynchronizationPoint {
        federation: FederationHandle,
        label: String,
        fixed_federate_set: Option<Vec<FederateHandle>>,
    },
    RegisterFederationSynchronizationPointResponse(Result<(), crate::error::ModelError>),
    /// Routed per-connect with only that connect's own federates in `federate_handles` (spec
    /// §4.7).
    AnnounceSynchronizationPoint {
        federation: FederationHandle,
        label: String,
        federate_handles: Vec<FederateHandle>,
        fixed_federate_set: Option<Vec<FederateHandle>>,
    },
    SynchronizationPointAchieved {
        federation: FederationHandle,
        label: String,
        federate: FederateHandle,
    },
    FederationSynchronized {
        federation: FederationHandle,
        label: String,
    },

    // --- Time management (spec §3.3, §4.8) ---
    EnableTimeRegulation {
        federation: FederationHandle,
        federate: FederateHandle,
        enable: bool,
        time_bytes: EncodedValue,
    },
    EnableTimeRegulationResponse(Result<(), crate::error::ModelError>),
    /// Broadcast to every other child when a federate enables regulation (spec §4.8).
    EnableTimeRegulationRequest {
        federation: FederationHandle,
        federate: FederateHandle,
        time_bytes: EncodedValue,
    },
    /// Broadcast to every other connect (except the source) when a federate disables regulation.
    DisableTimeRegulationRequest {
        federation: FederationHandle,
        federate: FederateHandle,
    },
    EnableTimeConstrained {
        federation: FederationHandle,
        federate: FederateHandle,
        enable: bool,
    },
    EnableTimeConstrainedResponse(Result<(), crate::error::ModelError>),
    /// Updates one or both of a federate's lower-bound timestamps and broadcasts to all other
    /// connects, constrained or not (spec §4.8: "constrained federates must be able to compute
    /// their own GALT").
    CommitLowerBoundTimeStamp {
        federation: FederationHandle,
        federate: FederateHandle,
        kind: CommitKind,
        time_bytes: EncodedValue,
        commit_id: u64,
    },
    /// Sent only to currently-regulating connects other than the source (spec §4.8).
    LockedByNextMessageRequest {
        federation: FederationHandle,
        federate: FederateHandle,
        time_bytes: EncodedValue,
    },

    // --- Connection loss (spec §4.9) ---
    /// From a node to its children when its own upstream connect is lost, so pending entries
    /// originated through it can be invalidated down the tree.
    ConnectionLost {
        connect: ConnectHandle,
    },

    /// Root-driven teardown broadcast when a federation execution is destroyed mid-flight.
    ShutdownFederationExecution {
        federation: FederationHandle,
    },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct JoinedFederate {
    pub federation: FederationHandle,
    pub federate: FederateHandle,
}
