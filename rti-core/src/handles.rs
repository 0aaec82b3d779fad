//! Typed handles for every entity-scope in the RTI's object model (spec §3.1).
//!
//! Each handle is an opaque integer wrapped so the type system keeps the scopes apart — a
//! `FederateHandle` and a `DimensionHandle` are both "just a `u64`" underneath, but Rust will
//! never let us pass one where the other is expected. A handle is unique within its scope while
//! live; [`rti_tinymap::HandleAllocator`] is what actually allocates/releases/reuses them.

rti_tinymap::key_type! {
    /// Identifies a Federation within a [`Node`](crate::Node)'s federation table.
    #[derive(serde::Serialize, serde::Deserialize)]
    pub FederationHandle
}

rti_tinymap::key_type! {
    /// Identifies a Federate within a single Federation.
    #[derive(serde::Serialize, serde::Deserialize)]
    pub FederateHandle
}

rti_tinymap::key_type! {
    /// Identifies one transport-level peering (parent or child) at a [`Node`](crate::Node).
    #[derive(serde::Serialize, serde::Deserialize)]
    pub ConnectHandle
}

rti_tinymap::key_type! {
    /// Identifies an ObjectClass within a Federation's object model.
    #[derive(serde::Serialize, serde::Deserialize)]
    pub ObjectClassHandle
}

rti_tinymap::key_type! {
    /// Identifies a ClassAttribute, unique within the ObjectClass tree it was declared in
    /// (attribute 0 of every root class is `privilegeToDelete`, per spec §3.2).
    #[derive(serde::Serialize, serde::Deserialize)]
    pub AttributeHandle
}

rti_tinymap::key_type! {
    /// Identifies an InteractionClass within a Federation's object model.
    #[derive(serde::Serialize, serde::Deserialize)]
    pub InteractionClassHandle
}

rti_tinymap::key_type! {
    /// Identifies a Parameter, unique within the InteractionClass tree it was declared in.
    #[derive(serde::Serialize, serde::Deserialize)]
    pub ParameterHandle
}

rti_tinymap::key_type! {
    /// Identifies a Dimension (a named, bounded routing axis) within a Federation.
    #[derive(serde::Serialize, serde::Deserialize)]
    pub DimensionHandle
}

rti_tinymap::key_type! {
    /// Identifies an UpdateRate within a Federation.
    #[derive(serde::Serialize, serde::Deserialize)]
    pub UpdateRateHandle
}

rti_tinymap::key_type! {
    /// Identifies a Module (an incremental FOM contribution) within a Federation.
    #[derive(serde::Serialize, serde::Deserialize)]
    pub ModuleHandle
}

rti_tinymap::key_type! {
    /// Identifies an ObjectInstance within a Federation. Allocated authoritatively at the root
    /// (spec §4.4).
    #[derive(serde::Serialize, serde::Deserialize)]
    pub ObjectInstanceHandle
}

rti_tinymap::key_type! {
    /// Identifies a Region (a federate-owned routing-space extent) within a Federation.
    #[derive(serde::Serialize, serde::Deserialize)]
    pub RegionHandle
}
