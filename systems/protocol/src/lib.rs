#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that rewrites and validates client messages touching beacons.
//!
//! Filters are registered per direction and message kind and run in
//! registration order. The first filter that rejects a message stops the
//! chain and discards every command queued for it, so a rejected message
//! never changes the world. Accepted messages may have been rewritten in
//! place and their commands must be applied before the message travels on.

mod filters;

use std::{collections::BTreeMap, fmt, sync::Arc};

use beacon_core::{
    BlockPos, Command, Direction, EffectRuleTable, Message, MessageKind, PayloadError,
    SelectionError, SessionSnapshot, WorldView,
};
use thiserror::Error;
use tracing::debug;

pub use filters::{remap_fuel_slot, rewrite_container_open, validate_effect_selection};

/// Outcome of running a message through its filter chain.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    /// The message may travel on.
    Accept,
    /// The message must be dropped.
    Reject(RejectReason),
}

/// Why a message was dropped. Only logged; clients never see it.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum RejectReason {
    /// The session controls no participant present in the world.
    #[error("session has no participant in the world")]
    NoParticipant,
    /// The participant stands too far away from the targeted block.
    #[error("target is {distance_squared} squared blocks away")]
    OutOfReach {
        /// Squared distance between participant and target.
        distance_squared: f64,
    },
    /// No beacon exists at the targeted block.
    #[error("no beacon at {position:?}")]
    NoBeacon {
        /// Targeted block.
        position: BlockPos,
    },
    /// The beacon's fuel slot is empty or holds something that is not fuel.
    #[error("fuel slot holds no fuel")]
    NoFuel,
    /// The payload could not be read.
    #[error("malformed payload: {0}")]
    Malformed(#[from] PayloadError),
    /// The payload names a selection the beacon cannot accept.
    #[error("invalid selection: {0}")]
    Selection(#[from] SelectionError),
}

/// Everything a filter may read while inspecting a message.
pub struct FilterContext<'a> {
    /// Session the message belongs to.
    pub session: &'a SessionSnapshot,
    /// Live world.
    pub world: &'a dyn WorldView,
    /// Rule table used to validate selections.
    pub rules: &'a EffectRuleTable,
}

/// Pure interceptor that may rewrite a message and queue commands.
pub type Filter = fn(&mut Message, &FilterContext<'_>, &mut Vec<Command>) -> Verdict;

/// Registry of message filters keyed by direction and message kind.
pub struct ProtocolBridge {
    rules: Arc<EffectRuleTable>,
    filters: BTreeMap<(Direction, MessageKind), Vec<Filter>>,
}

impl ProtocolBridge {
    /// Creates a bridge with the beacon filters registered.
    #[must_use]
    pub fn new(rules: impl Into<Arc<EffectRuleTable>>) -> Self {
        let mut bridge = Self::without_filters(rules);
        bridge.register(
            Direction::Outbound,
            MessageKind::ContainerOpen,
            rewrite_container_open,
        );
        bridge.register(
            Direction::Inbound,
            MessageKind::InventoryTransaction,
            remap_fuel_slot,
        );
        bridge.register(
            Direction::Inbound,
            MessageKind::BlockEntityData,
            validate_effect_selection,
        );
        bridge
    }

    /// Creates a bridge that lets every message through untouched.
    #[must_use]
    pub fn without_filters(rules: impl Into<Arc<EffectRuleTable>>) -> Self {
        Self {
            rules: rules.into(),
            filters: BTreeMap::new(),
        }
    }

    /// Appends a filter to the chain of the direction and message kind.
    pub fn register(&mut self, direction: Direction, kind: MessageKind, filter: Filter) {
        self.filters.entry((direction, kind)).or_default().push(filter);
    }

    /// Filters registered for the direction and message kind, in run order.
    #[must_use]
    pub fn filters(&self, direction: Direction, kind: MessageKind) -> &[Filter] {
        self.filters
            .get(&(direction, kind))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Rule table used by the filters.
    #[must_use]
    pub fn rules(&self) -> &Arc<EffectRuleTable> {
        &self.rules
    }

    /// Swaps the rule table the filters validate against.
    pub fn replace_rules(&mut self, rules: Arc<EffectRuleTable>) {
        self.rules = rules;
    }

    /// Runs a message received from `session` through its inbound chain.
    pub fn inbound(
        &self,
        message: &mut Message,
        session: &SessionSnapshot,
        world: &dyn WorldView,
        out: &mut Vec<Command>,
    ) -> Verdict {
        self.dispatch(Direction::Inbound, message, session, world, out)
    }

    /// Runs a message about to be sent to `session` through its outbound
    /// chain, returning the copy that session should receive.
    pub fn outbound(
        &self,
        message: &Message,
        session: &SessionSnapshot,
        world: &dyn WorldView,
        out: &mut Vec<Command>,
    ) -> Option<Message> {
        let mut copy = message.clone();
        match self.dispatch(Direction::Outbound, &mut copy, session, world, out) {
            Verdict::Accept => Some(copy),
            Verdict::Reject(_) => None,
        }
    }

    /// Sends a message to several sessions, filtering each copy separately.
    ///
    /// Targets whose copy is rejected are skipped; the others still receive
    /// theirs.
    pub fn broadcast<'s, K>(
        &self,
        message: &Message,
        targets: impl IntoIterator<Item = (K, &'s SessionSnapshot)>,
        world: &dyn WorldView,
        out: &mut Vec<Command>,
    ) -> Vec<(K, Message)> {
        targets
            .into_iter()
            .filter_map(|(target, session)| {
                self.outbound(message, session, world, out)
                    .map(|copy| (target, copy))
            })
            .collect()
    }

    fn dispatch(
        &self,
        direction: Direction,
        message: &mut Message,
        session: &SessionSnapshot,
        world: &dyn WorldView,
        out: &mut Vec<Command>,
    ) -> Verdict {
        let kind = message.kind();
        let context = FilterContext {
            session,
            world,
            rules: self.rules.as_ref(),
        };
        let queued = out.len();

        for filter in self.filters(direction, kind) {
            if let Verdict::Reject(reason) = filter(message, &context, out) {
                out.truncate(queued);
                debug!(?direction, ?kind, %reason, "message rejected");
                return Verdict::Reject(reason);
            }
        }
        Verdict::Accept
    }
}

impl fmt::Debug for ProtocolBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chains: BTreeMap<_, _> = self
            .filters
            .iter()
            .map(|(key, chain)| (*key, chain.len()))
            .collect();
        f.debug_struct("ProtocolBridge")
            .field("rules", &self.rules)
            .field("chains", &chains)
            .finish()
    }
}

impl Default for ProtocolBridge {
    fn default() -> Self {
        Self::new(EffectRuleTable::vanilla())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{BlockPos, SelectedEffects};
    use beacon_world::World;

    fn queue_marker(_: &mut Message, _: &FilterContext<'_>, out: &mut Vec<Command>) -> Verdict {
        out.push(Command::Tick);
        Verdict::Accept
    }

    fn refuse(_: &mut Message, _: &FilterContext<'_>, _: &mut Vec<Command>) -> Verdict {
        Verdict::Reject(RejectReason::NoFuel)
    }

    fn never_runs(_: &mut Message, _: &FilterContext<'_>, out: &mut Vec<Command>) -> Verdict {
        out.push(Command::SelectEffects {
            position: BlockPos::new(0, 0, 0),
            selection: SelectedEffects::NONE,
        });
        Verdict::Accept
    }

    #[test]
    fn default_bridge_registers_beacon_filters() {
        let bridge = ProtocolBridge::default();
        assert_eq!(
            bridge
                .filters(Direction::Outbound, MessageKind::ContainerOpen)
                .len(),
            1
        );
        assert_eq!(
            bridge
                .filters(Direction::Inbound, MessageKind::InventoryTransaction)
                .len(),
            1
        );
        assert_eq!(
            bridge
                .filters(Direction::Inbound, MessageKind::BlockEntityData)
                .len(),
            1
        );
        assert!(bridge
            .filters(Direction::Inbound, MessageKind::ContainerOpen)
            .is_empty());
    }

    #[test]
    fn first_rejection_stops_chain_and_drops_commands() {
        let mut bridge = ProtocolBridge::without_filters(EffectRuleTable::vanilla());
        let kind = MessageKind::Other(42);
        bridge.register(Direction::Inbound, kind, queue_marker);
        bridge.register(Direction::Inbound, kind, refuse);
        bridge.register(Direction::Inbound, kind, never_runs);

        let world = World::new();
        let mut out = vec![Command::Tick];
        let verdict = bridge.inbound(
            &mut Message::Other(42),
            &SessionSnapshot::default(),
            &world,
            &mut out,
        );

        assert_eq!(verdict, Verdict::Reject(RejectReason::NoFuel));
        assert_eq!(out, vec![Command::Tick]);
    }

    #[test]
    fn unfiltered_kinds_pass_untouched() {
        let bridge = ProtocolBridge::default();
        let world = World::new();
        let mut out = Vec::new();
        let mut message = Message::Other(7);
        assert_eq!(
            bridge.inbound(&mut message, &SessionSnapshot::default(), &world, &mut out),
            Verdict::Accept
        );
        assert_eq!(message, Message::Other(7));
        assert!(out.is_empty());
    }
}
