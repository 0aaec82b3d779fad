//! The per-federation object model, instance model, routing tables, time-management bookkeeping,
//! and dispatcher-facing message catalogue for an OpenRTI server node (spec §3, §4).

pub mod error;
pub mod federation;
pub mod instance;
pub mod message;
pub mod node;
pub mod object_model;
pub mod routing;
pub mod time_mgmt;

pub use error::{InconsistentFddError, MessageError, ModelError};
pub use federation::{Federate, Federation, FederationConnect, SynchronizationPoint};
pub use instance::{InstanceModel, ObjectInstance, Region, RegionExtent};
pub use message::{EncodedValue, JoinedFederate, RtiMsg};
pub use node::{Node, NodeConnect};
pub use object_model::{
    AttributeDecl, AttributeDef, Dimension, DimensionDecl, FieldDef, InteractionClassDecl,
    InteractionClassDef, ModuleDescription, ObjectClassDecl, ObjectClassDef, ObjectModel,
    OrderType, OrderTypeDecl, TransportType, TransportTypeDecl, UpdateRate, UpdateRateDecl,
    PRIVILEGE_TO_DELETE,
};
pub use routing::{ClassRouting, PropagationDecision, PublicationType, SubscriptionType};
pub use time_mgmt::{FederateTimeState, PendingAdvance, TimeManager};
