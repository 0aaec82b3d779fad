//! Message handling: the pure, synchronous core that turns one incoming [`RtiMsg`] plus the
//! current [`Node`] state into state changes and a set of outgoing messages (spec §4.1-§4.9).
//!
//! Kept free of any async/transport concerns so it can be driven directly by unit tests (spec
//! §8: "tests use a mock Transport, no real socket/codec needed") as well as by either server
//! loop variant.
//!
//! Every non-root node forwards authoritative requests to its parent and parks a [`PendingRequest`]
//! until the parent answers (spec §4.1, §4.3, §4.4, §4.7). Because of that, every handler reached
//! from [`Dispatcher::handle_locally`] may assume it is running on the root: `forward_plan`
//! intercepts root-only messages before they ever get there.

use std::collections::{BTreeSet, HashMap, VecDeque};

use rti_core::{
    AttributeHandle, CommitKind, ConnectHandle, FederateHandle, FederationHandle, Integer64Time,
    InteractionClassHandle, ObjectClassHandle, ObjectInstanceHandle, ParameterHandle,
};
use rti_model::{
    AttributeDecl, DimensionDecl, JoinedFederate, MessageError, ModelError, ModuleDescription,
    Node, ObjectClassDecl, ObjectModel, OrderType, PropagationDecision, PublicationType, RtiMsg,
    SubscriptionType, TimeManager,
};
use rti_tinymap::Key as _;

/// What handling one message produced: zero or more (destination connect, message) pairs to send.
#[derive(Default)]
pub struct DispatchOutcome {
    pub replies: Vec<(ConnectHandle, RtiMsg)>,
}

impl DispatchOutcome {
    fn reply(to: ConnectHandle, msg: RtiMsg) -> Self {
        Self {
            replies: vec![(to, msg)],
        }
    }

    fn none() -> Self {
        Self::default()
    }
}

/// A request forwarded upward, parked here until the parent answers it (spec §4.1: "a node that
/// is not the root relays the request to its own parent and remembers who to answer"). The tree
/// has exactly one `_pendingMessageList` per node, not one per message kind, so a single FIFO
/// queue mirrors that directly.
struct PendingRequest {
    /// The connect to answer once the parent responds. Cleared (not removed) if that connect is
    /// lost while the request is still in flight (spec §4.9 invalidation); the eventual response
    /// is then just discarded.
    origin: Option<ConnectHandle>,
}

/// How a node with a parent must handle a message before it ever reaches local processing (spec
/// §4.1, §4.3, §4.4, §4.7, §4.8). Messages not listed here are [`ForwardPlan::Local`]: publish/
/// subscribe/instance/interaction/region traffic already carries its own propagation decision via
/// [`rti_model::ClassRouting`], which naturally includes the parent connect when needed.
enum ForwardPlan {
    Local,
    /// Forward upward, parking a [`PendingRequest`] so the eventual response routes back here.
    WithPending,
    /// Forward upward with no response expected; nothing to park.
    FireAndForget,
}

fn forward_plan(msg: &RtiMsg) -> ForwardPlan {
    match msg {
        RtiMsg::CreateFederationExecution { .. }
        | RtiMsg::DestroyFederationExecution { .. }
        | RtiMsg::JoinFederationExecution { .. }
        | RtiMsg::ReserveObjectInstanceName { .. }
        | RtiMsg::ObjectInstanceHandlesRequest { .. }
        | RtiMsg::RegisterFederationSynchronizationPoint { .. }
        | RtiMsg::EnableTimeConstrained { .. } => ForwardPlan::WithPending,
        RtiMsg::EnableTimeRegulation { enable: true, .. } => ForwardPlan::WithPending,
        RtiMsg::ResignFederationExecution { .. }
        | RtiMsg::SynchronizationPointAchieved { .. }
        | RtiMsg::ReleaseMultipleObjectInstanceNameHandlePairs { .. }
        | RtiMsg::CommitLowerBoundTimeStamp { .. }
        | RtiMsg::LockedByNextMessageRequest { .. } => ForwardPlan::FireAndForget,
        RtiMsg::EnableTimeRegulation { enable: false, .. } => ForwardPlan::FireAndForget,
        _ => ForwardPlan::Local,
    }
}

/// Whether `msg` is the matching response to one of the `WithPending`-classified requests above,
/// and therefore something a parent sends back down rather than a child sends up.
fn is_pending_response(msg: &RtiMsg) -> bool {
    matches!(
        msg,
        RtiMsg::CreateFederationExecutionResponse(_)
            | RtiMsg::DestroyFederationExecutionResponse(_)
            | RtiMsg::JoinFederationExecutionResponse(_)
            | RtiMsg::ReserveObjectInstanceNameResponse(_)
            | RtiMsg::ObjectInstanceHandlesResponse(_)
            | RtiMsg::RegisterFederationSynchronizationPointResponse(_)
            | RtiMsg::EnableTimeRegulationResponse(_)
            | RtiMsg::EnableTimeConstrainedResponse(_)
    )
}

/// The node's full dispatch-time state: the object/instance/federation model plus, per
/// federation, a time manager instantiated for this node's configured logical-time factory (spec
/// §1(d): pluggable, integer64 chosen here as the default factory).
pub struct Dispatcher {
    pub node: Node,
    time_managers: HashMap<FederationHandle, TimeManager<Integer64Time>>,
    pending: VecDeque<PendingRequest>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            node: Node::new(),
            time_managers: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    fn is_root(&self) -> bool {
        self.node.parent.is_none()
    }

    pub fn handle(&mut self, from: ConnectHandle, msg: RtiMsg) -> DispatchOutcome {
        if Some(from) == self.node.parent && is_pending_response(&msg) {
            return self.relay_response_from_parent(msg);
        }

        if !self.is_root() {
            match forward_plan(&msg) {
                ForwardPlan::WithPending => {
                    self.pending.push_back(PendingRequest { origin: Some(from) });
                    let parent = self.node.parent.expect("checked by is_root");
                    return DispatchOutcome::reply(parent, msg);
                }
                ForwardPlan::FireAndForget => {
                    let parent = self.node.parent.expect("checked by is_root");
                    return DispatchOutcome::reply(parent, msg);
                }
                ForwardPlan::Local => {}
            }
        }

        self.handle_locally(from, msg)
    }

    /// Pops the oldest parked request and routes the parent's answer back to whoever asked, or
    /// discards it if that connect was lost in the meantime (spec §4.9).
    fn relay_response_from_parent(&mut self, msg: RtiMsg) -> DispatchOutcome {
        let Some(pending) = self.pending.pop_front() else {
            return DispatchOutcome::none();
        };
        match pending.origin {
            Some(origin) => DispatchOutcome::reply(origin, msg),
            None => DispatchOutcome::none(),
        }
    }

    /// Everything below assumes `self.is_root()`, enforced by `handle`'s forwarding above.
    fn handle_locally(&mut self, from: ConnectHandle, msg: RtiMsg) -> DispatchOutcome {
        match msg {
            RtiMsg::CreateFederationExecution { federation_name } => {
                let result = self.node.create_federation(federation_name).map(|_| ());
                DispatchOutcome::reply(from, RtiMsg::CreateFederationExecutionResponse(result))
            }
            RtiMsg::DestroyFederationExecution { federation_name } => {
                self.handle_destroy(from, federation_name)
            }
            RtiMsg::JoinFederationExecution {
                federation_name,
                federate_name,
                modules,
            } => self.handle_join(from, federation_name, federate_name, modules),
            RtiMsg::ResignFederationExecution { federation, federate } => DispatchOutcome {
                replies: self.resign_at_root(federation, federate),
            },
            RtiMsg::PublishObjectClassAttributes {
                federation,
                class,
                attributes,
                publish,
            } => {
                self.handle_publish_object(federation, class, &attributes, publish, from);
                DispatchOutcome::none()
            }
            RtiMsg::SubscribeObjectClassAttributes {
                federation,
                class,
                attributes,
                subscribe,
            } => self.handle_subscribe_object(from, federation, class, &attributes, subscribe),
            RtiMsg::PublishInteractionClass {
                federation,
                class,
                publish,
            } => {
                if let Some(fed) = self.node.federations.get_mut(federation) {
                    let state = if publish {
                        PublicationType::Published
                    } else {
                        PublicationType::Unpublished
                    };
                    fed.model.interaction_classes[class].routing.set_publication(from, state);
                }
                DispatchOutcome::none()
            }
            RtiMsg::SubscribeInteractionClass {
                federation,
                class,
                subscribe,
            } => self.handle_subscribe_interaction(from, federation, class, subscribe),
            RtiMsg::RequestAttributeUpdate {
                federation,
                instance,
                attributes,
            } => self.handle_request_attribute_update(from, federation, instance, attributes),
            RtiMsg::ReserveObjectInstanceName { federation, name } => {
                self.handle_reserve_name(from, federation, name)
            }
            RtiMsg::ObjectInstanceHandlesRequest { federation, count } => {
                self.handle_instance_handles_request(from, federation, count)
            }
            RtiMsg::ReleaseMultipleObjectInstanceNameHandlePairs { federation, instances } => {
                if let Some(fed) = self.node.federations.get_mut(federation) {
                    fed.instances.release_handles(from, &instances);
                }
                DispatchOutcome::none()
            }
            RtiMsg::RegisterObjectInstance {
                federation,
                class,
                name,
            } => self.handle_register_instance(from, federation, class, name),
            RtiMsg::UpdateAttributeValues {
                federation,
                instance,
                values,
                order_type,
            } => self.handle_update_attributes(from, federation, instance, values, order_type),
            RtiMsg::DeleteObjectInstance { federation, instance } => {
                self.handle_delete_instance(from, federation, instance)
            }
            RtiMsg::SendInteraction {
                federation,
                class,
                parameters,
                order_type,
            } => self.handle_send_interaction(from, federation, class, parameters, order_type),
            RtiMsg::InsertRegion {
                federation,
                owner,
                extents,
                ..
            } => self.handle_insert_region(from, federation, owner, extents),
            RtiMsg::CommitRegion {
                federation,
                region,
                extents,
            } => self.handle_commit_region(from, federation, region, extents),
            RtiMsg::EraseRegion { federation, region } => {
                self.handle_erase_region(from, federation, region)
            }
            RtiMsg::RegisterFederationSynchronizationPoint {
                federation,
                label,
                fixed_federate_set,
            } => self.handle_register_sync_point(from, federation, label, fixed_federate_set),
            RtiMsg::SynchronizationPointAchieved {
                federation,
                label,
                federate,
            } => self.handle_sync_achieved(federation, label, federate),
            RtiMsg::EnableTimeRegulation {
                federation,
                federate,
                enable,
                time_bytes,
            } => self.handle_enable_time_regulation(from, federation, federate, enable, time_bytes),
            RtiMsg::EnableTimeConstrained {
                federation,
                federate,
                enable,
            } => self.handle_enable_time_constrained(from, federation, federate, enable),
            RtiMsg::CommitLowerBoundTimeStamp {
                federation,
                federate,
                kind,
                time_bytes,
                commit_id,
            } => self.handle_commit_lower_bound(from, federation, federate, kind, time_bytes, commit_id),
            RtiMsg::LockedByNextMessageRequest {
                federation,
                federate,
                time_bytes,
            } => self.handle_locked_by_next_message(from, federation, federate, time_bytes),
            // Server-originated notifications and responses arriving here (from a peer that is
            // not our parent, or with no pending request to match) are either a protocol error or
            // a stale reply to an already-invalidated request; drop silently rather than panic.
            _ => DispatchOutcome::none(),
        }
    }

    /// Cascading cleanup when `connect` is lost (spec §4.9): every federate it hosted resigns as
    /// if it had resigned itself, every pending request it originated is invalidated, and its
    /// instance/region references are dropped.
    pub fn handle_connect_lost(&mut self, connect: ConnectHandle) -> DispatchOutcome {
        for pending in self.pending.iter_mut() {
            if pending.origin == Some(connect) {
                pending.origin = None;
            }
        }

        let affected = self.node.federates_on_connect(connect);
        let mut replies = Vec::new();
        for (federation, federate) in affected {
            replies.extend(self.resign_one(federation, federate));
        }

        for (_, fed) in self.node.federations.iter_mut() {
            let owned = fed.instances.instances_owned_by(connect);
            for instance in owned {
                fed.instances.delete(instance);
            }
        }

        let was_parent = self.node.parent == Some(connect);
        self.node.remove_connect(connect);
        if was_parent {
            replies.extend(
                self.node
                    .connects
                    .keys()
                    .map(|c| (c, RtiMsg::ConnectionLost { connect })),
            );
        }
        DispatchOutcome { replies }
    }

    fn handle_destroy(&mut self, from: ConnectHandle, federation_name: String) -> DispatchOutcome {
        let Some(handle) = self.node.federation_by_name(&federation_name) else {
            return DispatchOutcome::reply(
                from,
                RtiMsg::DestroyFederationExecutionResponse(Err(
                    ModelError::FederationExecutionDoesNotExist(federation_name),
                )),
            );
        };
        let result = self.node.destroy_federation(handle);
        if result.is_ok() {
            self.time_managers.remove(&handle);
        }
        DispatchOutcome::reply(from, RtiMsg::DestroyFederationExecutionResponse(result))
    }

    fn handle_join(
        &mut self,
        from: ConnectHandle,
        federation_name: String,
        federate_name: String,
        modules: Vec<ModuleDescription>,
    ) -> DispatchOutcome {
        let Some(federation_handle) = self.node.federation_by_name(&federation_name) else {
            return DispatchOutcome::reply(
                from,
                RtiMsg::JoinFederationExecutionResponse(Err(
                    ModelError::FederationExecutionDoesNotExist(federation_name),
                )),
            );
        };
        let modules_to_broadcast = modules.clone();

        let result = (|| {
            let fed = self.node.federations.get_mut(federation_handle).expect("looked up");
            for module in modules {
                fed.model.insert(module)?;
            }
            let federate_handle = fed.join(federate_name.clone(), from)?;
            self.time_managers
                .entry(federation_handle)
                .or_insert_with(TimeManager::new)
                .enroll(federate_handle, Integer64Time(0));
            Ok(federate_handle)
        })();

        let federate_handle = match result {
            Ok(h) => h,
            Err(err) => {
                return DispatchOutcome::reply(from, RtiMsg::JoinFederationExecutionResponse(Err(err)))
            }
        };

        let mut replies = vec![(
            from,
            RtiMsg::JoinFederationExecutionResponse(Ok(JoinedFederate {
                federation: federation_handle,
                federate: federate_handle,
            })),
        )];

        let fed = self.node.federations.get(federation_handle).expect("looked up");
        let other_connects: Vec<ConnectHandle> =
            fed.connects.keys().copied().filter(|&c| c != from).collect();

        if !modules_to_broadcast.is_empty() {
            for &connect in &other_connects {
                replies.push((
                    connect,
                    RtiMsg::InsertModules {
                        federation: federation_handle,
                        modules: modules_to_broadcast.clone(),
                    },
                ));
            }
        }
        for &connect in &other_connects {
            replies.push((
                connect,
                RtiMsg::JoinFederateNotify {
                    federation: federation_handle,
                    federate: federate_handle,
                    federate_name: federate_name.clone(),
                },
            ));
        }

        // Auto-extend sync points (spec §4.3, §4.7 edge case): a late joiner is added to the
        // waiting set of every currently open, non-fixed point.
        for point in &fed.synchronization_points {
            if point.fixed_federate_set.is_none() {
                replies.push((
                    from,
                    RtiMsg::AnnounceSynchronizationPoint {
                        federation: federation_handle,
                        label: point.label.clone(),
                        federate_handles: vec![federate_handle],
                        fixed_federate_set: None,
                    },
                ));
            }
        }

        DispatchOutcome { replies }
    }

    /// The full resign path at the root: achieves any waiting synchronization points on the
    /// federate's behalf, disables its time regulation, notifies siblings, and erases the
    /// federation execution from the originating subtree once it has no federates left (spec
    /// §4.3, §4.7, §4.8, §4.9).
    fn resign_at_root(
        &mut self,
        federation: FederationHandle,
        federate: FederateHandle,
    ) -> Vec<(ConnectHandle, RtiMsg)> {
        let Some(fed) = self.node.federations.get_mut(federation) else {
            return Vec::new();
        };
        let origin_connect = fed.federates.get(federate).map(|f| f.connect);
        let was_regulating = fed
            .federates
            .get(federate)
            .map(|f| f.time_regulating)
            .unwrap_or(false);

        let mut replies = Vec::new();
        for label in fed
            .synchronization_points
            .iter()
            .map(|p| p.label.clone())
            .collect::<Vec<_>>()
        {
            if let Ok(Some(achieved)) = fed.achieve_synchronization_point(&label, federate) {
                for connect in fed.connects_with_any_of(&achieved) {
                    replies.push((connect, RtiMsg::FederationSynchronized { federation, label: label.clone() }));
                }
            }
        }

        if was_regulating {
            for connect in fed.connects.keys().copied() {
                replies.push((connect, RtiMsg::DisableTimeRegulationRequest { federation, federate }));
            }
        }

        let _ = fed.resign(federate);
        if let Some(mgr) = self.time_managers.get_mut(&federation) {
            mgr.remove(federate);
        }

        let fed = self.node.federations.get(federation).expect("still exists");
        for connect in fed.connects.keys().copied() {
            replies.push((
                connect,
                RtiMsg::ResignFederateNotify { federation, federate },
            ));
        }
        if let Some(origin_connect) = origin_connect {
            if !fed.connects.contains_key(&origin_connect) {
                replies.push((origin_connect, RtiMsg::EraseFederationExecution { federation }));
            }
        }

        replies
    }

    /// Like [`Dispatcher::resign_at_root`] but usable from any node: at the root it does the
    /// bookkeeping directly, otherwise it synthesizes and forwards a resign request upward (spec
    /// §4.9: cascading disconnect cleanup mirrors an explicit resign at every hop).
    fn resign_one(
        &mut self,
        federation: FederationHandle,
        federate: FederateHandle,
    ) -> Vec<(ConnectHandle, RtiMsg)> {
        if self.is_root() {
            self.resign_at_root(federation, federate)
        } else {
            let parent = self.node.parent.expect("checked above");
            vec![(parent, RtiMsg::ResignFederationExecution { federation, federate })]
        }
    }

    fn handle_publish_object(
        &mut self,
        federation: FederationHandle,
        class: ObjectClassHandle,
        attributes: &[AttributeHandle],
        publish: bool,
        from: ConnectHandle,
    ) {
        let Some(fed) = self.node.federations.get_mut(federation) else {
            return;
        };
        let state = if publish {
            PublicationType::Published
        } else {
            PublicationType::Unpublished
        };
        let class_def = &mut fed.model.object_classes[class];
        let handles: Vec<_> = class_def.own_attributes.keys().collect();
        for handle in handles {
            if attributes.contains(&handle) {
                class_def.own_attributes[handle].routing.set_publication(from, state);
            }
        }
    }

    fn handle_subscribe_object(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        class: ObjectClassHandle,
        attributes: &[AttributeHandle],
        subscribe: bool,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get_mut(federation) else {
            return DispatchOutcome::none();
        };
        let state = if subscribe {
            SubscriptionType::Subscribed
        } else {
            SubscriptionType::Unsubscribed
        };
        let class_def = &fed.model.object_classes[class];
        let handles: Vec<_> = class_def
            .own_attributes
            .iter()
            .filter(|(h, _)| attributes.contains(h))
            .map(|(h, def)| (h, def.name.clone()))
            .collect();

        let mut newly_subscribed = false;
        for (handle, name) in &handles {
            let descendants = fed.model.object_class_descendants(class);
            let mut descendant_connects = Vec::new();
            for d in &descendants {
                for (dh, def) in fed.model.object_classes[*d].own_attributes.iter() {
                    if def.name == *name {
                        descendant_connects
                            .extend(fed.model.object_classes[*d].own_attributes[dh].routing.direct_subscribed_connects());
                    }
                }
            }
            let attr = &mut fed.model.object_classes[class].own_attributes[*handle];
            attr.routing.set_subscription(from, state);
            attr.routing.recompute_cumulative(std::iter::empty());
            attr.routing.fold_descendant_connects(descendant_connects.into_iter());
            if subscribe {
                newly_subscribed = true;
            }
        }

        if !newly_subscribed {
            return DispatchOutcome::none();
        }

        // spec §4.5: a subscription upgrade sends InsertObjectInstance (realized here as
        // DiscoverObjectInstance) for every currently-known matching instance.
        let descendants: BTreeSet<ObjectClassHandle> =
            fed.model.object_class_descendants(class).into_iter().collect();
        let matches: Vec<(ObjectInstanceHandle, ObjectClassHandle, String)> = fed
            .instances
            .instances
            .iter()
            .filter(|(_, inst)| inst.class == class || descendants.contains(&inst.class))
            .map(|(h, inst)| (h, inst.class, inst.name.clone()))
            .collect();

        let mut replies = Vec::new();
        for (instance, inst_class, name) in matches {
            if let Some(inst) = fed.instances.instances.get_mut(instance) {
                inst.known_at.insert(from);
            }
            replies.push((
                from,
                RtiMsg::DiscoverObjectInstance {
                    federation,
                    instance,
                    class: inst_class,
                    name,
                },
            ));
        }
        DispatchOutcome { replies }
    }

    fn handle_subscribe_interaction(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        class: InteractionClassHandle,
        subscribe: bool,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get_mut(federation) else {
            return DispatchOutcome::none();
        };
        let state = if subscribe {
            SubscriptionType::Subscribed
        } else {
            SubscriptionType::Unsubscribed
        };

        let descendants = fed.model.interaction_class_descendants(class);
        let mut descendant_connects = Vec::new();
        for d in &descendants {
            descendant_connects.extend(fed.model.interaction_classes[d].routing.direct_subscribed_connects());
        }

        let routing = &mut fed.model.interaction_classes[class].routing;
        routing.set_subscription(from, state);
        routing.recompute_cumulative(std::iter::empty());
        routing.fold_descendant_connects(descendant_connects.into_iter());
        DispatchOutcome::none()
    }

    fn handle_request_attribute_update(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        instance: ObjectInstanceHandle,
        attributes: Vec<AttributeHandle>,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get(federation) else {
            return DispatchOutcome::none();
        };
        let Some(inst) = fed.instances.instances.get(instance) else {
            return DispatchOutcome::none();
        };
        let owners: BTreeSet<ConnectHandle> = attributes
            .iter()
            .filter_map(|&a| inst.owner_of(a))
            .filter(|&c| c != from)
            .collect();
        let replies = owners
            .into_iter()
            .map(|c| {
                (
                    c,
                    RtiMsg::RequestAttributeUpdate {
                        federation,
                        instance,
                        attributes: attributes.clone(),
                    },
                )
            })
            .collect();
        DispatchOutcome { replies }
    }

    fn handle_reserve_name(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        name: String,
    ) -> DispatchOutcome {
        let result = if name.starts_with("HLA") {
            Err(ModelError::Message(MessageError::ReservedNamePrefix(name)))
        } else {
            self.node
                .federations
                .get_mut(federation)
                .ok_or(ModelError::UnknownFederation(federation))
                .and_then(|fed| {
                    if fed.instances.reserve_name(&name, from) {
                        Ok(name.clone())
                    } else {
                        Err(ModelError::InstanceNameInUse(name.clone()))
                    }
                })
        };
        DispatchOutcome::reply(from, RtiMsg::ReserveObjectInstanceNameResponse(result))
    }

    fn handle_instance_handles_request(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        count: u32,
    ) -> DispatchOutcome {
        let result = self
            .node
            .federations
            .get_mut(federation)
            .ok_or(ModelError::UnknownFederation(federation))
            .map(|fed| fed.instances.allocate_anonymous(from, count));
        DispatchOutcome::reply(from, RtiMsg::ObjectInstanceHandlesResponse(result))
    }

    fn handle_register_instance(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        class: ObjectClassHandle,
        name: String,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get_mut(federation) else {
            return DispatchOutcome::none();
        };
        let mut targets: BTreeSet<ConnectHandle> = BTreeSet::new();
        for (_, attr_def) in fed.model.effective_attributes(class) {
            targets.extend(attr_def.routing.cumulative_subscribed_connects().iter().copied());
        }
        targets.remove(&from);

        let privilege_attr = AttributeHandle::from(0);
        let instance = fed.instances.discover(name.clone(), class, from, privilege_attr);
        if let Some(inst) = fed.instances.instances.get_mut(instance) {
            inst.known_at.extend(targets.iter().copied());
        }

        let replies = targets
            .into_iter()
            .map(|connect| {
                (
                    connect,
                    RtiMsg::DiscoverObjectInstance {
                        federation,
                        instance,
                        class,
                        name: name.clone(),
                    },
                )
            })
            .collect();
        DispatchOutcome { replies }
    }

    fn handle_update_attributes(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        instance: ObjectInstanceHandle,
        values: Vec<(AttributeHandle, Vec<u8>)>,
        order_type: OrderType,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get(federation) else {
            return DispatchOutcome::none();
        };
        let Some(inst) = fed.instances.instances.get(instance) else {
            return DispatchOutcome::none();
        };
        let class = inst.class;
        let class_def = &fed.model.object_classes[class];
        let mut targets: BTreeSet<ConnectHandle> = BTreeSet::new();
        for (attr, _) in &values {
            if attr.index() < class_def.own_attributes.len() {
                let attr_def = &class_def.own_attributes[*attr];
                targets.extend(attr_def.routing.cumulative_subscribed_connects().iter().copied());
            }
        }
        targets.extend(inst.known_at.iter().copied());
        targets.remove(&from);

        let msg = RtiMsg::ReflectAttributeValues {
            federation,
            instance,
            values,
            order_type,
        };
        let replies = targets
            .into_iter()
            .map(|connect| (connect, msg.clone()))
            .collect();
        DispatchOutcome { replies }
    }

    fn handle_delete_instance(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        instance: ObjectInstanceHandle,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get_mut(federation) else {
            return DispatchOutcome::none();
        };
        let Some(known_at) = fed.instances.instances.get(instance).map(|i| i.known_at.clone()) else {
            return DispatchOutcome::none();
        };
        fed.instances.delete(instance);
        let replies = known_at
            .into_iter()
            .filter(|&c| c != from)
            .map(|c| (c, RtiMsg::RemoveObjectInstance { federation, instance }))
            .collect();
        DispatchOutcome { replies }
    }

    fn handle_send_interaction(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        class: InteractionClassHandle,
        parameters: Vec<(ParameterHandle, Vec<u8>)>,
        order_type: OrderType,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get(federation) else {
            return DispatchOutcome::none();
        };
        let class_def = &fed.model.interaction_classes[class];
        let decision = class_def.routing.propagation_decision(from);

        let targets: Vec<ConnectHandle> = match decision {
            PropagationDecision::None => Vec::new(),
            PropagationDecision::Send(to) => vec![to],
            PropagationDecision::Broadcast => class_def
                .routing
                .cumulative_subscribed_connects()
                .iter()
                .copied()
                .filter(|&c| c != from)
                .collect(),
        };

        // spec §4.6: narrow up the class tree to whichever ancestor each target actually
        // subscribes at; forward verbatim if that's `class` itself, or if no ancestor matches
        // (the target's interest came in only via descendant folding).
        let replies = targets
            .into_iter()
            .map(|connect| {
                let (send_class, send_params) =
                    narrow_interaction(&fed.model, class, connect, &parameters);
                (
                    connect,
                    RtiMsg::ReceiveInteraction {
                        federation,
                        class: send_class,
                        parameters: send_params,
                        order_type,
                    },
                )
            })
            .collect();
        DispatchOutcome { replies }
    }

    fn handle_insert_region(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        owner: FederateHandle,
        extents_raw: Vec<(rti_core::DimensionHandle, u64, u64)>,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get_mut(federation) else {
            return DispatchOutcome::none();
        };
        let extents: Vec<rti_model::RegionExtent> = extents_raw
            .iter()
            .map(|&(dimension, range_lower, range_upper)| rti_model::RegionExtent {
                dimension,
                range_lower,
                range_upper,
            })
            .collect();
        let region = fed.instances.insert_region(owner, extents);
        let replies = fed
            .connects
            .keys()
            .copied()
            .filter(|&c| c != from)
            .map(|c| {
                (
                    c,
                    RtiMsg::InsertRegion {
                        federation,
                        region,
                        owner,
                        extents: extents_raw.clone(),
                    },
                )
            })
            .collect();
        DispatchOutcome { replies }
    }

    fn handle_commit_region(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        region: rti_core::RegionHandle,
        extents_raw: Vec<(rti_core::DimensionHandle, u64, u64)>,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get_mut(federation) else {
            return DispatchOutcome::none();
        };
        let extents: Vec<rti_model::RegionExtent> = extents_raw
            .iter()
            .map(|&(dimension, range_lower, range_upper)| rti_model::RegionExtent {
                dimension,
                range_lower,
                range_upper,
            })
            .collect();
        if !fed.instances.commit_region(region, extents) {
            return DispatchOutcome::none();
        }
        let replies = fed
            .connects
            .keys()
            .copied()
            .filter(|&c| c != from)
            .map(|c| {
                (
                    c,
                    RtiMsg::CommitRegion {
                        federation,
                        region,
                        extents: extents_raw.clone(),
                    },
                )
            })
            .collect();
        DispatchOutcome { replies }
    }

    fn handle_erase_region(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        region: rti_core::RegionHandle,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get_mut(federation) else {
            return DispatchOutcome::none();
        };
        if fed.instances.erase_region(region).is_none() {
            return DispatchOutcome::none();
        }
        let replies = fed
            .connects
            .keys()
            .copied()
            .filter(|&c| c != from)
            .map(|c| (c, RtiMsg::EraseRegion { federation, region }))
            .collect();
        DispatchOutcome { replies }
    }

    fn handle_register_sync_point(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        label: String,
        fixed_federate_set: Option<Vec<FederateHandle>>,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get_mut(federation) else {
            return DispatchOutcome::reply(
                from,
                RtiMsg::RegisterFederationSynchronizationPointResponse(Err(
                    ModelError::UnknownFederation(federation),
                )),
            );
        };
        let fixed_set: Option<BTreeSet<FederateHandle>> =
            fixed_federate_set.clone().map(|v| v.into_iter().collect());
        if let Err(err) = fed.register_synchronization_point(label.clone(), fixed_set) {
            return DispatchOutcome::reply(
                from,
                RtiMsg::RegisterFederationSynchronizationPointResponse(Err(err)),
            );
        }

        let mut replies = vec![(
            from,
            RtiMsg::RegisterFederationSynchronizationPointResponse(Ok(())),
        )];
        for connect in fed.connects.keys().copied() {
            let mut federate_handles = fed.federates_on(connect);
            if let Some(set) = &fixed_federate_set {
                federate_handles.retain(|h| set.contains(h));
            }
            replies.push((
                connect,
                RtiMsg::AnnounceSynchronizationPoint {
                    federation,
                    label: label.clone(),
                    federate_handles,
                    fixed_federate_set: fixed_federate_set.clone(),
                },
            ));
        }
        DispatchOutcome { replies }
    }

    fn handle_sync_achieved(
        &mut self,
        federation: FederationHandle,
        label: String,
        federate: FederateHandle,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get_mut(federation) else {
            return DispatchOutcome::none();
        };
        let Ok(Some(achieved)) = fed.achieve_synchronization_point(&label, federate) else {
            return DispatchOutcome::none();
        };
        let replies = fed
            .connects_with_any_of(&achieved)
            .into_iter()
            .map(|c| (c, RtiMsg::FederationSynchronized { federation, label: label.clone() }))
            .collect();
        DispatchOutcome { replies }
    }

    fn handle_enable_time_regulation(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        federate: FederateHandle,
        enable: bool,
        time_bytes: Vec<u8>,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get_mut(federation) else {
            return DispatchOutcome::none();
        };
        if let Some(f) = fed.federates.get_mut(federate) {
            f.time_regulating = enable;
        }
        let connects: Vec<ConnectHandle> = fed.connects.keys().copied().collect();
        let mgr = self.time_managers.entry(federation).or_insert_with(TimeManager::new);
        mgr.set_regulating(federate, enable);

        if !enable {
            let replies = connects
                .into_iter()
                .filter(|&c| c != from)
                .map(|c| (c, RtiMsg::DisableTimeRegulationRequest { federation, federate }))
                .collect();
            return DispatchOutcome { replies };
        }

        if let Some(time) = decode_integer64_time(&time_bytes) {
            mgr.commit_lower_bound(federate, CommitKind::TimeAdvanceAndNextMessageCommit, time, 0);
        }
        let mut replies: Vec<_> = connects
            .into_iter()
            .filter(|&c| c != from)
            .map(|c| {
                (
                    c,
                    RtiMsg::EnableTimeRegulationRequest {
                        federation,
                        federate,
                        time_bytes: time_bytes.clone(),
                    },
                )
            })
            .collect();
        replies.push((from, RtiMsg::EnableTimeRegulationResponse(Ok(()))));
        DispatchOutcome { replies }
    }

    fn handle_enable_time_constrained(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        federate: FederateHandle,
        enable: bool,
    ) -> DispatchOutcome {
        let result = self
            .node
            .federations
            .get_mut(federation)
            .ok_or(ModelError::UnknownFederation(federation));
        let fed = match result {
            Ok(fed) => fed,
            Err(err) => {
                return DispatchOutcome::reply(from, RtiMsg::EnableTimeConstrainedResponse(Err(err)))
            }
        };
        if let Some(f) = fed.federates.get_mut(federate) {
            f.time_constrained = enable;
        }
        self.time_managers
            .entry(federation)
            .or_insert_with(TimeManager::new)
            .set_constrained(federate, enable);
        DispatchOutcome::reply(from, RtiMsg::EnableTimeConstrainedResponse(Ok(())))
    }

    fn handle_commit_lower_bound(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        federate: FederateHandle,
        kind: CommitKind,
        time_bytes: Vec<u8>,
        commit_id: u64,
    ) -> DispatchOutcome {
        if let Some(time) = decode_integer64_time(&time_bytes) {
            self.time_managers
                .entry(federation)
                .or_insert_with(TimeManager::new)
                .commit_lower_bound(federate, kind, time, commit_id);
        }
        let Some(fed) = self.node.federations.get(federation) else {
            return DispatchOutcome::none();
        };
        // Broadcast to every other connect, constrained or not: a constrained federate computes
        // its own GALT from every regulating federate's lower bound (spec §4.8).
        let replies = fed
            .connects
            .keys()
            .copied()
            .filter(|&c| c != from)
            .map(|c| {
                (
                    c,
                    RtiMsg::CommitLowerBoundTimeStamp {
                        federation,
                        federate,
                        kind,
                        time_bytes: time_bytes.clone(),
                        commit_id,
                    },
                )
            })
            .collect();
        DispatchOutcome { replies }
    }

    fn handle_locked_by_next_message(
        &mut self,
        from: ConnectHandle,
        federation: FederationHandle,
        federate: FederateHandle,
        time_bytes: Vec<u8>,
    ) -> DispatchOutcome {
        let Some(fed) = self.node.federations.get(federation) else {
            return DispatchOutcome::none();
        };
        let Some(mgr) = self.time_managers.get(&federation) else {
            return DispatchOutcome::none();
        };
        let regulating: BTreeSet<FederateHandle> = mgr.regulating_federates().collect();
        let targets: Vec<ConnectHandle> = fed
            .connects
            .keys()
            .copied()
            .filter(|&c| c != from)
            .filter(|&c| fed.federates_on(c).iter().any(|f| regulating.contains(f)))
            .collect();
        let replies = targets
            .into_iter()
            .map(|c| {
                (
                    c,
                    RtiMsg::LockedByNextMessageRequest {
                        federation,
                        federate,
                        time_bytes: time_bytes.clone(),
                    },
                )
            })
            .collect();
        DispatchOutcome { replies }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks from `from_class` up to the root looking for a class `connect` actually subscribes at
/// (spec §4.6). Forwards verbatim if that is `from_class` itself, or if no ancestor matches (the
/// target's interest reached us only through descendant folding and there is no narrower target
/// to shrink the parameter set to).
fn narrow_interaction(
    model: &ObjectModel,
    from_class: InteractionClassHandle,
    connect: ConnectHandle,
    parameters: &[(ParameterHandle, Vec<u8>)],
) -> (InteractionClassHandle, Vec<(ParameterHandle, Vec<u8>)>) {
    let mut cur = Some(from_class);
    while let Some(h) = cur {
        if model.interaction_classes[h].routing.is_subscribed(connect) {
            if h == from_class {
                return (from_class, parameters.to_vec());
            }
            let allowed: BTreeSet<ParameterHandle> =
                model.effective_parameters(h).into_iter().map(|(p, _)| p).collect();
            let narrowed = parameters
                .iter()
                .filter(|(p, _)| allowed.contains(p))
                .cloned()
                .collect();
            return (h, narrowed);
        }
        cur = model.interaction_classes[h].parent;
    }
    (from_class, parameters.to_vec())
}

fn decode_integer64_time(bytes: &[u8]) -> Option<Integer64Time> {
    let arr: [u8; 8] = bytes.get(0..8)?.try_into().ok()?;
    Some(Integer64Time(i64::from_le_bytes(arr)))
}

/// Helpers for tests to build module descriptions without hand-writing every field.
#[cfg(test)]
pub fn simple_object_class(path: &str, attrs: &[&str]) -> ObjectClassDecl {
    ObjectClassDecl {
        path: path.to_string(),
        dimensions: Vec::new(),
        attributes: Some(
            attrs
                .iter()
                .map(|a| AttributeDecl {
                    name: a.to_string(),
                    order_type: rti_model::OrderTypeDecl::Receive,
                    transport_type: rti_model::TransportTypeDecl::Reliable,
                })
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(i: usize) -> ConnectHandle {
        ConnectHandle::from(i)
    }

    fn make_federation(dispatcher: &mut Dispatcher, name: &str) -> FederationHandle {
        dispatcher.node.create_federation(name.to_string()).unwrap()
    }

    #[test]
    fn create_federation_execution_responds_ok_once() {
        let mut dispatcher = Dispatcher::new();
        let outcome = dispatcher.handle(
            connect(1),
            RtiMsg::CreateFederationExecution {
                federation_name: "Exercise1".to_string(),
            },
        );
        assert_eq!(outcome.replies.len(), 1);
        assert!(matches!(
            outcome.replies[0].1,
            RtiMsg::CreateFederationExecutionResponse(Ok(()))
        ));

        let outcome = dispatcher.handle(
            connect(1),
            RtiMsg::CreateFederationExecution {
                federation_name: "Exercise1".to_string(),
            },
        );
        assert!(matches!(
            outcome.replies[0].1,
            RtiMsg::CreateFederationExecutionResponse(Err(ModelError::FederationExecutionAlreadyExists(_)))
        ));
    }

    #[test]
    fn join_enrolls_the_federate_and_builds_the_module() {
        let mut dispatcher = Dispatcher::new();
        make_federation(&mut dispatcher, "Exercise1");

        let outcome = dispatcher.handle(
            connect(1),
            RtiMsg::JoinFederationExecution {
                federation_name: "Exercise1".to_string(),
                federate_name: "Alice".to_string(),
                modules: vec![ModuleDescription {
                    object_classes: vec![simple_object_class("Tank", &["Position"])],
                    ..Default::default()
                }],
            },
        );
        match &outcome.replies[0].1 {
            RtiMsg::JoinFederationExecutionResponse(Ok(joined)) => {
                assert_eq!(joined.federate.index(), 0);
            }
            other => panic!("expected successful join, got {other:?}"),
        }
    }

    #[test]
    fn second_federate_is_notified_of_the_first() {
        let mut dispatcher = Dispatcher::new();
        make_federation(&mut dispatcher, "Exercise1");
        dispatcher.handle(
            connect(1),
            RtiMsg::JoinFederationExecution {
                federation_name: "Exercise1".to_string(),
                federate_name: "Alice".to_string(),
                modules: vec![],
            },
        );
        let outcome = dispatcher.handle(
            connect(2),
            RtiMsg::JoinFederationExecution {
                federation_name: "Exercise1".to_string(),
                federate_name: "Bob".to_string(),
                modules: vec![],
            },
        );
        assert!(outcome
            .replies
            .iter()
            .any(|(to, msg)| *to == connect(1) && matches!(msg, RtiMsg::JoinFederateNotify { .. })));
    }

    #[test]
    fn register_instance_notifies_subscribed_connects_but_not_the_registrant() {
        let mut dispatcher = Dispatcher::new();
        let federation = make_federation(&mut dispatcher, "Exercise1");
        dispatcher
            .node
            .federations
            .get_mut(federation)
            .unwrap()
            .model
            .insert(ModuleDescription {
                object_classes: vec![simple_object_class("Tank", &[])],
                ..Default::default()
            })
            .unwrap();
        let class = dispatcher
            .node
            .federations
            .get(federation)
            .unwrap()
            .model
            .object_classes
            .keys()
            .next()
            .unwrap();

        let privilege_attr = AttributeHandle::from(0);
        let attr = &mut dispatcher
            .node
            .federations
            .get_mut(federation)
            .unwrap()
            .model
            .object_classes[class]
            .own_attributes[privilege_attr];
        attr.routing.set_subscription(connect(2), SubscriptionType::Subscribed);
        attr.routing.recompute_cumulative(std::iter::empty());

        let outcome = dispatcher.handle(
            connect(1),
            RtiMsg::RegisterObjectInstance {
                federation,
                class,
                name: "Tank1".to_string(),
            },
        );

        assert_eq!(outcome.replies.len(), 1);
        assert_eq!(outcome.replies[0].0, connect(2));
    }

    #[test]
    fn subscribing_after_registration_gets_a_discover_for_the_existing_instance() {
        let mut dispatcher = Dispatcher::new();
        let federation = make_federation(&mut dispatcher, "Exercise1");
        dispatcher
            .node
            .federations
            .get_mut(federation)
            .unwrap()
            .model
            .insert(ModuleDescription {
                object_classes: vec![simple_object_class("Tank", &["Position"])],
                ..Default::default()
            })
            .unwrap();
        let class = dispatcher
            .node
            .federations
            .get(federation)
            .unwrap()
            .model
            .object_classes
            .keys()
            .next()
            .unwrap();
        let position = AttributeHandle::from(1);

        dispatcher.handle(
            connect(1),
            RtiMsg::RegisterObjectInstance {
                federation,
                class,
                name: "Tank1".to_string(),
            },
        );

        let outcome = dispatcher.handle(
            connect(2),
            RtiMsg::SubscribeObjectClassAttributes {
                federation,
                class,
                attributes: vec![position],
                subscribe: true,
            },
        );

        assert_eq!(outcome.replies.len(), 1);
        assert_eq!(outcome.replies[0].0, connect(2));
        assert!(matches!(
            outcome.replies[0].1,
            RtiMsg::DiscoverObjectInstance { .. }
        ));
    }

    #[test]
    fn reserving_an_hla_prefixed_name_is_rejected() {
        let mut dispatcher = Dispatcher::new();
        let federation = make_federation(&mut dispatcher, "Exercise1");
        let outcome = dispatcher.handle(
            connect(1),
            RtiMsg::ReserveObjectInstanceName {
                federation,
                name: "HLAfoo".to_string(),
            },
        );
        assert!(matches!(
            &outcome.replies[0].1,
            RtiMsg::ReserveObjectInstanceNameResponse(Err(ModelError::Message(
                MessageError::ReservedNamePrefix(_)
            )))
        ));
    }

    #[test]
    fn a_name_can_only_be_reserved_once() {
        let mut dispatcher = Dispatcher::new();
        let federation = make_federation(&mut dispatcher, "Exercise1");
        dispatcher.handle(
            connect(1),
            RtiMsg::ReserveObjectInstanceName {
                federation,
                name: "Tank1".to_string(),
            },
        );
        let outcome = dispatcher.handle(
            connect(2),
            RtiMsg::ReserveObjectInstanceName {
                federation,
                name: "Tank1".to_string(),
            },
        );
        assert!(matches!(
            &outcome.replies[0].1,
            RtiMsg::ReserveObjectInstanceNameResponse(Err(ModelError::InstanceNameInUse(_)))
        ));
    }

    #[test]
    fn connect_loss_resigns_its_federates() {
        let mut dispatcher = Dispatcher::new();
        let federation = make_federation(&mut dispatcher, "Exercise1");
        dispatcher.handle(
            connect(1),
            RtiMsg::JoinFederationExecution {
                federation_name: "Exercise1".to_string(),
                federate_name: "Alice".to_string(),
                modules: vec![],
            },
        );
        dispatcher.handle_connect_lost(connect(1));

        let fed = dispatcher.node.federations.get(federation).unwrap();
        assert!(fed.is_empty());
    }

    #[test]
    fn a_non_root_node_parks_a_pending_request_and_forwards_it_up() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.node.add_connect("parent".to_string(), true);
        let parent = dispatcher.node.parent.unwrap();

        let outcome = dispatcher.handle(
            connect(5),
            RtiMsg::CreateFederationExecution {
                federation_name: "Exercise1".to_string(),
            },
        );
        assert_eq!(outcome.replies, vec![(parent, RtiMsg::CreateFederationExecution {
            federation_name: "Exercise1".to_string(),
        })]);
        assert_eq!(dispatcher.pending.len(), 1);

        let outcome = dispatcher.handle(
            parent,
            RtiMsg::CreateFederationExecutionResponse(Ok(())),
        );
        assert_eq!(outcome.replies, vec![(connect(5), RtiMsg::CreateFederationExecutionResponse(Ok(())))]);
        assert!(dispatcher.pending.is_empty());
    }

    #[test]
    fn losing_the_origin_connect_invalidates_its_pending_request() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.node.add_connect("parent".to_string(), true);
        let parent = dispatcher.node.parent.unwrap();
        let origin = dispatcher.node.add_connect("federate-a".to_string(), false);

        dispatcher.handle(
            origin,
            RtiMsg::CreateFederationExecution {
                federation_name: "Exercise1".to_string(),
            },
        );
        dispatcher.handle_connect_lost(origin);

        let outcome = dispatcher.handle(
            parent,
            RtiMsg::CreateFederationExecutionResponse(Ok(())),
        );
        assert!(outcome.replies.is_empty());
    }

    #[test]
    fn synchronization_point_announces_fan_to_each_connects_own_federates() {
        let mut dispatcher = Dispatcher::new();
        let federation = make_federation(&mut dispatcher, "Exercise1");
        dispatcher.handle(
            connect(1),
            RtiMsg::JoinFederationExecution {
                federation_name: "Exercise1".to_string(),
                federate_name: "Alice".to_string(),
                modules: vec![],
            },
        );
        let outcome = dispatcher.handle(
            connect(1),
            RtiMsg::RegisterFederationSynchronizationPoint {
                federation,
                label: "ReadyToRun".to_string(),
                fixed_federate_set: None,
            },
        );
        let announce = outcome
            .replies
            .iter()
            .find(|(to, msg)| *to == connect(1) && matches!(msg, RtiMsg::AnnounceSynchronizationPoint { .. }));
        assert!(announce.is_some());
    }

    #[test]
    fn enabling_time_regulation_broadcasts_to_other_connects_and_replies_to_the_source() {
        let mut dispatcher = Dispatcher::new();
        let federation = make_federation(&mut dispatcher, "Exercise1");
        dispatcher.handle(
            connect(1),
            RtiMsg::JoinFederationExecution {
                federation_name: "Exercise1".to_string(),
                federate_name: "Alice".to_string(),
                modules: vec![],
            },
        );
        let alice = dispatcher
            .node
            .federations
            .get(federation)
            .unwrap()
            .federates
            .keys()
            .next()
            .unwrap();
        dispatcher.handle(
            connect(2),
            RtiMsg::JoinFederationExecution {
                federation_name: "Exercise1".to_string(),
                federate_name: "Bob".to_string(),
                modules: vec![],
            },
        );

        let outcome = dispatcher.handle(
            connect(1),
            RtiMsg::EnableTimeRegulation {
                federation,
                federate: alice,
                enable: true,
                time_bytes: vec![0; 8],
            },
        );

        assert!(outcome
            .replies
            .iter()
            .any(|(to, msg)| *to == connect(1) && matches!(msg, RtiMsg::EnableTimeRegulationResponse(Ok(())))));
        assert!(outcome
            .replies
            .iter()
            .any(|(to, msg)| *to == connect(2) && matches!(msg, RtiMsg::EnableTimeRegulationRequest { .. })));
    }

    #[test]
    fn interaction_sent_on_a_subclass_is_narrowed_for_an_ancestor_subscriber() {
        let mut dispatcher = Dispatcher::new();
        let federation = make_federation(&mut dispatcher, "Exercise1");
        let fed = dispatcher.node.federations.get_mut(federation).unwrap();
        fed.model
            .insert(ModuleDescription {
                interaction_classes: vec![
                    rti_model::InteractionClassDecl {
                        path: "Fire".to_string(),
                        order_type: rti_model::OrderTypeDecl::Receive,
                        transport_type: rti_model::TransportTypeDecl::Reliable,
                        dimensions: Vec::new(),
                        parameters: Some(vec!["Target".to_string()]),
                    },
                    rti_model::InteractionClassDecl {
                        path: "Fire.Precise".to_string(),
                        order_type: rti_model::OrderTypeDecl::Receive,
                        transport_type: rti_model::TransportTypeDecl::Reliable,
                        dimensions: Vec::new(),
                        parameters: Some(vec!["Aim".to_string()]),
                    },
                ],
                ..Default::default()
            })
            .unwrap();
        let fire = fed.model.interaction_classes.keys().next().unwrap();
        let precise = fed
            .model
            .interaction_classes
            .keys()
            .find(|&h| h != fire)
            .unwrap();
        let target = rti_core::ParameterHandle::from(0);
        let aim = rti_core::ParameterHandle::from(0);

        dispatcher.handle(
            connect(2),
            RtiMsg::SubscribeInteractionClass {
                federation,
                class: fire,
                subscribe: true,
            },
        );

        let outcome = dispatcher.handle(
            connect(1),
            RtiMsg::SendInteraction {
                federation,
                class: precise,
                parameters: vec![(target, vec![1]), (aim, vec![2])],
                order_type: OrderType::Receive,
            },
        );

        assert_eq!(outcome.replies.len(), 1);
        match &outcome.replies[0].1 {
            RtiMsg::ReceiveInteraction { class, parameters, .. } => {
                assert_eq!(*class, fire);
                assert_eq!(parameters, &vec![(target, vec![1])]);
            }
            other => panic!("expected a narrowed interaction, got {other:?}"),
        }
    }
}
