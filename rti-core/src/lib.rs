//! Foundational types shared by the OpenRTI object model and server: typed handles for every
//! entity scope (spec §3.1), an opaque logical-time contract, and a wall-clock `Clock`.

pub mod handles;
pub mod time;

pub use handles::{
    AttributeHandle, ConnectHandle, DimensionHandle, FederateHandle, FederationHandle,
    InteractionClassHandle, ModuleHandle, ObjectClassHandle, ObjectInstanceHandle, ParameterHandle,
    RegionHandle, UpdateRateHandle,
};
pub use time::{Clock, CommitKind, Float64Time, Integer64Time, LogicalTime};
