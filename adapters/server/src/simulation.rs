//! Single-threaded driver that owns the world and runs the systems between
//! ticks.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::{anyhow, Result};
use beacon_core::{
    protocol::FUEL_SLOT, ActionSource, BlockPos, Command, ContainerOpen, EffectRuleTable, Event,
    InventoryAction, InventoryTransaction, Message, ParticipantId, Position, SessionSnapshot,
    TransactionData, WindowHolder, WindowId, WindowType,
};
use beacon_system_effects::EffectScheduler;
use beacon_system_protocol::{ProtocolBridge, Verdict};
use beacon_world::{self as world, query, World};
use tracing::{debug, info};

/// Handle of a connected client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SessionId(u32);

/// World, systems and sessions driven by one cooperative loop.
#[derive(Debug)]
pub(crate) struct Simulation {
    world: World,
    scheduler: EffectScheduler,
    bridge: ProtocolBridge,
    sessions: BTreeMap<SessionId, SessionSnapshot>,
    next_session: u32,
}

impl Simulation {
    /// Creates an empty world driven by the built-in rule table.
    pub(crate) fn new() -> Self {
        let rules = Arc::new(EffectRuleTable::vanilla());
        Self {
            world: World::new(),
            scheduler: EffectScheduler::new(Arc::clone(&rules)),
            bridge: ProtocolBridge::new(rules),
            sessions: BTreeMap::new(),
            next_session: 1,
        }
    }

    /// Installs a new rule table in every system.
    ///
    /// Every beacon rescans its pyramid against the new materials on the
    /// next tick, which also re-arms the idle ones.
    pub(crate) fn replace_rules(&mut self, rules: EffectRuleTable) {
        let rules = Arc::new(rules);
        self.scheduler.replace_rules(Arc::clone(&rules));
        self.bridge.replace_rules(rules);

        let beacons = query::beacons(&self.world);
        for beacon in &beacons {
            let _ = self.apply(Command::FlagLayerRecalculation {
                position: beacon.position,
            });
        }
        info!(beacons = beacons.len(), "rule table replaced");
    }

    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    /// Applies a single command and returns the events it produced.
    pub(crate) fn apply(&mut self, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        events
    }

    /// Spawns a participant and attaches a fresh session to it.
    pub(crate) fn connect(&mut self, participant: ParticipantId, position: Position) -> SessionId {
        let _ = self.apply(Command::SpawnParticipant {
            participant,
            position,
        });
        let id = SessionId(self.next_session);
        self.next_session += 1;
        let _ = self.sessions.insert(
            id,
            SessionSnapshot {
                participant: Some(participant),
                ..SessionSnapshot::default()
            },
        );
        info!(?id, ?participant, "session connected");
        id
    }

    /// Opens the container of the beacon at `position` for the session.
    ///
    /// Returns the container-open message the client receives, after the
    /// outbound filters ran on it.
    pub(crate) fn open_beacon(
        &mut self,
        session: SessionId,
        position: BlockPos,
    ) -> Result<Option<Message>> {
        if query::beacon(&self.world, position).is_none() {
            return Err(anyhow!("no beacon at {position:?}"));
        }
        let snapshot = self
            .sessions
            .get_mut(&session)
            .ok_or_else(|| anyhow!("unknown session {session:?}"))?;
        let window = snapshot
            .windows
            .keys()
            .next_back()
            .map_or(WindowId::new(1), |last| WindowId::new(last.get().wrapping_add(1)));
        let _ = snapshot
            .windows
            .insert(window, WindowHolder::Beacon(position));
        snapshot.current_window = Some(window);

        let message = Message::ContainerOpen(ContainerOpen {
            window,
            window_type: WindowType::Container,
            position,
        });
        let mut commands = Vec::new();
        let delivered = self
            .bridge
            .outbound(&message, snapshot, &self.world, &mut commands);
        for command in commands {
            let _ = self.apply(command);
        }
        Ok(delivered)
    }

    /// Runs a client message through the inbound filters and, when accepted,
    /// applies the commands it queued.
    pub(crate) fn receive(&mut self, session: SessionId, mut message: Message) -> Result<Verdict> {
        let snapshot = self
            .sessions
            .get(&session)
            .cloned()
            .ok_or_else(|| anyhow!("unknown session {session:?}"))?;

        let mut commands = Vec::new();
        let verdict = self
            .bridge
            .inbound(&mut message, &snapshot, &self.world, &mut commands);
        if verdict != Verdict::Accept {
            debug!(?session, kind = ?message.kind(), "client message dropped");
            return Ok(verdict);
        }

        for command in commands {
            let _ = self.apply(command);
        }
        if let Message::InventoryTransaction(InventoryTransaction {
            transaction: TransactionData::Normal(actions),
        }) = &message
        {
            self.store_fuel(&snapshot, actions);
        }
        Ok(verdict)
    }

    fn store_fuel(&mut self, session: &SessionSnapshot, actions: &[InventoryAction]) {
        let Some((window, position)) = session.current_beacon_window() else {
            return;
        };
        for action in actions {
            if action.source == ActionSource::Container
                && action.window == Some(window)
                && action.slot == FUEL_SLOT
            {
                let _ = self.apply(Command::SetFuel {
                    position,
                    fuel: action.new_item,
                });
            }
        }
    }

    /// Advances the world by one tick and lets the scheduler react.
    pub(crate) fn step(&mut self) -> Vec<Event> {
        let mut events = self.apply(Command::Tick);
        let mut commands = Vec::new();
        self.scheduler.handle(&events, &self.world, &mut commands);
        for command in commands {
            events.extend(self.apply(command));
        }
        events
    }
}
