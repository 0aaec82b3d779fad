//! Per-class, per-connect publication and subscription routing state (spec §3.5, §4.4).
//!
//! Every object class attribute and every interaction class carries one [`ClassRouting`] that
//! tracks, per neighboring connect, whether that connect (or something reachable through it)
//! publishes or subscribes, and the derived [`PropagationDecision`] for an update/interaction
//! arriving from a given connect.

use std::collections::BTreeSet;

use rti_core::ConnectHandle;
use rti_tinymap::TinySecondaryMap;

/// Whether a connect directly publishes a class/attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublicationType {
    #[default]
    Unpublished,
    Published,
}

/// Whether a connect directly subscribes to a class/attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscriptionType {
    #[default]
    Unsubscribed,
    Subscribed,
}

/// What a node should do with a message of this class arriving from `from` (spec §3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationDecision {
    /// No reachable connect subscribes; drop.
    None,
    /// Exactly the parent connect needs it, forward there only.
    Send(ConnectHandle),
    /// More than one neighboring connect needs it (parent and/or children); fan out to all of
    /// `cumulative_subscribed_connects()` other than `from`.
    Broadcast,
}

/// Publication/subscription bookkeeping for one class (or one attribute), per connect.
#[derive(Debug, Clone, Default)]
pub struct ClassRouting {
    publication: TinySecondaryMap<ConnectHandle, PublicationType>,
    subscription: TinySecondaryMap<ConnectHandle, SubscriptionType>,
    /// Union, over this connect and every connect reachable through it, of "is subscribed"
    /// (spec §3.5: "cumulative_subscribed_connects: per class, the union of `subscribed` over
    /// the class's own subtree"). Recomputed by [`ClassRouting::recompute_cumulative`].
    cumulative_subscribed_connects: BTreeSet<ConnectHandle>,
}

impl ClassRouting {
    pub fn set_publication(&mut self, connect: ConnectHandle, state: PublicationType) {
        self.publication.insert(connect, state);
    }

    pub fn set_subscription(&mut self, connect: ConnectHandle, state: SubscriptionType) {
        self.subscription.insert(connect, state);
    }

    pub fn is_published(&self, connect: ConnectHandle) -> bool {
        matches!(
            self.publication.get(connect),
            Some(PublicationType::Published)
        )
    }

    pub fn is_subscribed(&self, connect: ConnectHandle) -> bool {
        matches!(
            self.subscription.get(connect),
            Some(SubscriptionType::Subscribed)
        )
    }

    pub fn published_connects(&self) -> impl Iterator<Item = ConnectHandle> + '_ {
        self.publication
            .iter()
            .filter(|(_, state)| matches!(state, PublicationType::Published))
            .map(|(connect, _)| connect)
    }

    pub fn cumulative_subscribed_connects(&self) -> &BTreeSet<ConnectHandle> {
        &self.cumulative_subscribed_connects
    }

    /// Connects that directly subscribe at exactly this class level (no descendant folding).
    pub fn direct_subscribed_connects(&self) -> impl Iterator<Item = ConnectHandle> + '_ {
        self.subscription
            .iter()
            .filter(|(_, state)| matches!(state, SubscriptionType::Subscribed))
            .map(|(connect, _)| connect)
    }

    /// Folds extra connects straight into the cumulative set, e.g. the direct subscribers of every
    /// descendant class (spec §3.5: "cumulative_subscribed_connects on a class is the union of
    /// direct subscribers and cumulative subscribers of all subclasses"). Call after
    /// [`ClassRouting::recompute_cumulative`].
    pub fn fold_descendant_connects(&mut self, connects: impl Iterator<Item = ConnectHandle>) {
        self.cumulative_subscribed_connects.extend(connects);
    }

    /// Recomputes `cumulative_subscribed_connects` as this connect's own subscription state union
    /// the cumulative subscription of every connect in `children`, i.e. every other connect
    /// adjacent to this node (spec §3.5). The routing graph is a tree rooted at this federation's
    /// node, so each neighbor's cumulative view already captures its own subtree.
    pub fn recompute_cumulative<'a>(
        &mut self,
        neighbors: impl Iterator<Item = (ConnectHandle, &'a ClassRouting)>,
    ) {
        self.cumulative_subscribed_connects.clear();
        for (connect, state) in self.subscription.iter() {
            if matches!(state, SubscriptionType::Subscribed) {
                self.cumulative_subscribed_connects.insert(connect);
            }
        }
        for (connect, neighbor) in neighbors {
            if !neighbor.cumulative_subscribed_connects.is_empty() {
                self.cumulative_subscribed_connects.insert(connect);
            }
        }
    }

    /// Decides what a node reachable at `self` should do with a class message that just arrived
    /// from `from` (spec §3.5 propagation rule). Whether the single remaining interested connect
    /// happens to be this node's parent or a child makes no difference to the decision itself —
    /// `Send` just carries whichever connect it is — so there is nothing parent-specific to branch
    /// on here.
    pub fn propagation_decision(&self, from: ConnectHandle) -> PropagationDecision {
        let interested: Vec<ConnectHandle> = self
            .cumulative_subscribed_connects
            .iter()
            .copied()
            .filter(|&c| c != from)
            .collect();

        match interested.len() {
            0 => PropagationDecision::None,
            1 => PropagationDecision::Send(interested[0]),
            _ => PropagationDecision::Broadcast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rti_tinymap::Key;

    fn connect(i: usize) -> ConnectHandle {
        ConnectHandle::from(i)
    }

    #[test]
    fn cumulative_subscription_unions_child_subtrees() {
        let mut child_a = ClassRouting::default();
        child_a.set_subscription(connect(1), SubscriptionType::Subscribed);
        child_a.recompute_cumulative(std::iter::empty());

        let mut child_b = ClassRouting::default();
        child_b.recompute_cumulative(std::iter::empty());

        let mut parent = ClassRouting::default();
        parent.recompute_cumulative(
            [(connect(10), &child_a), (connect(11), &child_b)].into_iter(),
        );

        assert!(parent.cumulative_subscribed_connects().contains(&connect(10)));
        assert!(!parent.cumulative_subscribed_connects().contains(&connect(11)));
    }

    #[test]
    fn propagation_is_none_when_nobody_else_is_interested() {
        let routing = ClassRouting::default();
        assert_eq!(
            routing.propagation_decision(connect(1)),
            PropagationDecision::None
        );
    }

    #[test]
    fn propagation_broadcasts_when_multiple_neighbors_are_interested() {
        let mut routing = ClassRouting::default();
        routing.set_subscription(connect(2), SubscriptionType::Subscribed);
        routing.set_subscription(connect(3), SubscriptionType::Subscribed);
        routing.recompute_cumulative(std::iter::empty());

        assert_eq!(
            routing.propagation_decision(connect(1)),
            PropagationDecision::Broadcast
        );
    }

    #[test]
    fn propagation_sends_to_the_single_other_interested_connect() {
        let mut routing = ClassRouting::default();
        routing.set_subscription(connect(2), SubscriptionType::Subscribed);
        routing.recompute_cumulative(std::iter::empty());

        assert_eq!(
            routing.propagation_decision(connect(1)),
            PropagationDecision::Send(connect(2))
        );
    }
}
