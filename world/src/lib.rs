#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative in-memory world hosting beacons.
//!
//! The world owns resident chunks, participants, the beacon registry, the
//! chunk listeners bound to each beacon and the delayed-update queue. It is
//! only mutated through [`apply`] and read through [`query`] or its
//! [`WorldView`] implementation.

mod beacons;
mod chunks;
mod listeners;
mod participants;
mod schedule;

use std::collections::{BTreeMap, BTreeSet};

use beacon_core::{
    material, BeaconSnapshot, BlockPos, ChunkPos, Command, Event, MaterialId, ParticipantId,
    ParticipantSnapshot, WorldBounds, WorldView, RECALCULATION_DELAY_TICKS,
};
use tracing::{debug, info, warn};

use beacons::{BeaconRegistry, BeaconState};
use chunks::{ChunkMap, ParticipantIndex};
use listeners::ListenerRegistry;
use participants::Participant;
use schedule::UpdateQueue;

const DEFAULT_TRANSPARENT: [MaterialId; 3] = [material::AIR, material::GLASS, material::BEACON];

/// Represents the authoritative world state.
#[derive(Debug)]
pub struct World {
    bounds: WorldBounds,
    transparent: BTreeSet<MaterialId>,
    chunks: ChunkMap,
    participants: BTreeMap<ParticipantId, Participant>,
    participant_index: ParticipantIndex,
    beacons: BeaconRegistry,
    listeners: ListenerRegistry,
    updates: UpdateQueue,
    tick_index: u64,
}

impl World {
    /// Creates an empty world with the default vertical bounds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bounds(WorldBounds::default())
    }

    /// Creates an empty world spanning the provided vertical bounds.
    #[must_use]
    pub fn with_bounds(bounds: WorldBounds) -> Self {
        Self {
            bounds,
            transparent: DEFAULT_TRANSPARENT.into_iter().collect(),
            chunks: ChunkMap::default(),
            participants: BTreeMap::new(),
            participant_index: ParticipantIndex::default(),
            beacons: BeaconRegistry::default(),
            listeners: ListenerRegistry::default(),
            updates: UpdateQueue::default(),
            tick_index: 0,
        }
    }

    fn is_writable(&self, position: BlockPos) -> bool {
        self.bounds.contains(position.y()) && self.chunks.is_loaded(position.chunk())
    }

    fn schedule(&mut self, position: BlockPos, delay: u64) {
        let due = self.tick_index.saturating_add(delay.max(1));
        self.updates.schedule(position, due);
    }

    fn write_block(&mut self, position: BlockPos, material: MaterialId, out_events: &mut Vec<Event>) {
        let Some(chunk) = self.chunks.get_mut(position.chunk()) else {
            return;
        };
        chunk.set(position, material);
        out_events.push(Event::BlockChanged { position, material });
        self.notify_listeners(position, out_events);
    }

    fn notify_listeners(&mut self, changed: BlockPos, out_events: &mut Vec<Event>) {
        for beacon in self.listeners.listeners_of(changed.chunk()) {
            let Some(state) = self.beacons.get_mut(beacon) else {
                continue;
            };
            let invalidation = state.listener.on_block_changed(changed);
            if invalidation.tiers {
                state.flag_for_layer_recalculation();
                out_events.push(Event::TiersInvalidated { position: beacon });
            }
            if invalidation.obstruction {
                state.flag_for_cover_recalculation();
                out_events.push(Event::ObstructionInvalidated { position: beacon });
            }
            if invalidation.tiers || invalidation.obstruction {
                self.schedule(beacon, RECALCULATION_DELAY_TICKS);
            }
        }
    }

    /// Residency of a pyramid chunk changed, so every scan over it is outdated.
    fn invalidate_listeners_of(&mut self, chunk: ChunkPos, out_events: &mut Vec<Event>) {
        for beacon in self.listeners.listeners_of(chunk) {
            let Some(state) = self.beacons.get_mut(beacon) else {
                continue;
            };
            state.flag_for_layer_recalculation();
            out_events.push(Event::TiersInvalidated { position: beacon });
            self.schedule(beacon, RECALCULATION_DELAY_TICKS);
        }
    }

    fn register_beacon(&mut self, mut state: BeaconState, out_events: &mut Vec<Event>) {
        let position = state.position();
        state.listener = self.listeners.register(position);
        self.beacons.insert(state);
        info!(?position, "beacon registered");
        out_events.push(Event::BeaconPlaced { position });
    }

    fn destroy_beacon(&mut self, position: BlockPos, out_events: &mut Vec<Event>) -> bool {
        let Some(mut state) = self.beacons.remove(position) else {
            return false;
        };
        self.listeners.unregister(&mut state.listener);
        self.updates.cancel(position);
        info!(?position, "beacon destroyed");
        out_events.push(Event::BeaconRemoved { position });
        if let Some(fuel) = state.fuel() {
            out_events.push(Event::FuelDropped { position, fuel });
        }
        true
    }

    fn flag_recalculation(
        &mut self,
        position: BlockPos,
        layers: bool,
        cover: bool,
        out_events: &mut Vec<Event>,
    ) {
        let Some(state) = self.beacons.get_mut(position) else {
            return;
        };
        if layers {
            state.flag_for_layer_recalculation();
            out_events.push(Event::TiersInvalidated { position });
        }
        if cover {
            state.flag_for_cover_recalculation();
            out_events.push(Event::ObstructionInvalidated { position });
        }
        self.schedule(position, RECALCULATION_DELAY_TICKS);
    }

    fn despawn_participant(&mut self, participant: ParticipantId, out_events: &mut Vec<Event>) {
        if let Some(entry) = self.participants.remove(&participant) {
            self.participant_index
                .remove(entry.position().chunk(), participant);
            out_events.push(Event::ParticipantDespawned { participant });
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced {
                tick: world.tick_index,
            });

            for participant in world.participants.values_mut() {
                participant.decay_effects();
            }
            for position in world.updates.drain_due(world.tick_index) {
                out_events.push(Event::ScheduledUpdateDue { position });
            }
        }
        Command::LoadChunk { chunk } => {
            if world.chunks.load(chunk) {
                out_events.push(Event::ChunkLoaded { chunk });
                world.invalidate_listeners_of(chunk, out_events);
            }
        }
        Command::UnloadChunk { chunk } => {
            if !world.chunks.is_loaded(chunk) {
                return;
            }
            let resident: Vec<BlockPos> = world
                .beacons
                .positions()
                .filter(|position| position.chunk() == chunk)
                .collect();
            for position in resident {
                let _ = world.destroy_beacon(position, out_events);
            }
            let present: Vec<ParticipantId> = world.participant_index.in_chunk(chunk).collect();
            for participant in present {
                world.despawn_participant(participant, out_events);
            }
            let _ = world.chunks.unload(chunk);
            out_events.push(Event::ChunkUnloaded { chunk });
            world.invalidate_listeners_of(chunk, out_events);
        }
        Command::SetBlock { position, material } => {
            if !world.is_writable(position) {
                debug!(?position, "block change outside resident space ignored");
                return;
            }
            if material != material::BEACON {
                let _ = world.destroy_beacon(position, out_events);
            }
            world.write_block(position, material, out_events);
        }
        Command::PlaceBeacon { position } => {
            if !world.is_writable(position) || world.beacons.get(position).is_some() {
                debug!(?position, "beacon placement ignored");
                return;
            }
            world.write_block(position, material::BEACON, out_events);
            world.register_beacon(BeaconState::placed(position), out_events);
        }
        Command::RestoreBeacon { position, record } => {
            if !world.is_writable(position) || world.beacons.get(position).is_some() {
                debug!(?position, "beacon restore ignored");
                return;
            }
            match BeaconState::restored(position, &record) {
                Ok(state) => {
                    let active = !state.selection().is_empty();
                    world.write_block(position, material::BEACON, out_events);
                    world.register_beacon(state, out_events);
                    if active {
                        world.schedule(position, RECALCULATION_DELAY_TICKS);
                    }
                }
                Err(reason) => {
                    warn!(?position, %reason, "refusing to restore beacon");
                    out_events.push(Event::BeaconRestoreRejected { position, reason });
                }
            }
        }
        Command::RemoveBeacon { position } => {
            if world.destroy_beacon(position, out_events) {
                world.write_block(position, material::AIR, out_events);
            }
        }
        Command::SetFuel { position, fuel } => {
            if let Some(state) = world.beacons.get_mut(position) {
                state.set_fuel(fuel);
                out_events.push(Event::FuelChanged {
                    position,
                    fuel: state.fuel(),
                });
            }
        }
        Command::ScheduleUpdate { position, delay } => {
            world.schedule(position, delay);
        }
        Command::RecordTiers { position, tiers } => {
            if let Some(state) = world.beacons.get_mut(position) {
                state.record_tiers(tiers);
                out_events.push(Event::TiersRecorded { position, tiers });
            }
        }
        Command::RecordObstruction {
            position,
            obstructed,
        } => {
            if let Some(state) = world.beacons.get_mut(position) {
                state.record_obstruction(obstructed);
                out_events.push(Event::ObstructionRecorded {
                    position,
                    obstructed,
                });
            }
        }
        Command::SelectEffects {
            position,
            selection,
        } => {
            let Some(state) = world.beacons.get_mut(position) else {
                debug!(?position, "selection for missing beacon ignored");
                return;
            };
            if !state.select_effects(selection) {
                debug!(?position, "selection ignored, fuel slot is empty");
                return;
            }
            let fuel = state.fuel();
            let selection = state.selection();
            out_events.push(Event::FuelChanged { position, fuel });
            out_events.push(Event::EffectsSelected {
                position,
                selection,
            });
            if !selection.is_empty() {
                world.schedule(position, RECALCULATION_DELAY_TICKS);
            }
        }
        Command::FlagRecalculation { position } => {
            world.flag_recalculation(position, true, true, out_events);
        }
        Command::FlagLayerRecalculation { position } => {
            world.flag_recalculation(position, true, false, out_events);
        }
        Command::FlagCoverRecalculation { position } => {
            world.flag_recalculation(position, false, true, out_events);
        }
        Command::SpawnParticipant {
            participant,
            position,
        } => {
            if world.participants.contains_key(&participant) {
                debug!(?participant, "participant already present");
                return;
            }
            let _ = world
                .participants
                .insert(participant, Participant::new(participant, position));
            world.participant_index.insert(position.chunk(), participant);
            out_events.push(Event::ParticipantSpawned { participant });
        }
        Command::MoveParticipant {
            participant,
            position,
        } => {
            let Some(entry) = world.participants.get_mut(&participant) else {
                return;
            };
            let previous = entry.position().chunk();
            entry.move_to(position);
            if previous != position.chunk() {
                world.participant_index.remove(previous, participant);
                world.participant_index.insert(position.chunk(), participant);
            }
        }
        Command::DespawnParticipant { participant } => {
            world.despawn_participant(participant, out_events);
        }
        Command::ApplyEffect {
            participant,
            effect,
        } => {
            let Some(entry) = world.participants.get_mut(&participant) else {
                return;
            };
            if entry.add_effect(effect) {
                out_events.push(Event::EffectApplied {
                    participant,
                    effect,
                });
            }
        }
    }
}

impl WorldView for World {
    fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    fn is_chunk_loaded(&self, chunk: ChunkPos) -> bool {
        self.chunks.is_loaded(chunk)
    }

    fn material_at(&self, position: BlockPos) -> Option<MaterialId> {
        if !self.bounds.contains(position.y()) {
            return None;
        }
        self.chunks
            .get(position.chunk())
            .map(|chunk| chunk.material_at(position))
    }

    fn is_transparent(&self, material: MaterialId) -> bool {
        self.transparent.contains(&material)
    }

    fn participants_in_chunk(&self, chunk: ChunkPos) -> Vec<ParticipantSnapshot> {
        if !self.chunks.is_loaded(chunk) {
            return Vec::new();
        }
        self.participant_index
            .in_chunk(chunk)
            .filter_map(|id| self.participants.get(&id))
            .map(Participant::snapshot)
            .collect()
    }

    fn participant(&self, participant: ParticipantId) -> Option<ParticipantSnapshot> {
        self.participants.get(&participant).map(Participant::snapshot)
    }

    fn beacon(&self, position: BlockPos) -> Option<BeaconSnapshot> {
        self.beacons.get(position).map(BeaconState::snapshot)
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::World;
    use beacon_core::{
        BeaconSnapshot, BlockPos, ChunkPos, EffectInstance, ParticipantId, StructureRecord, Tag,
    };

    /// Index of the current tick.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Snapshot of the beacon stored at the coordinate.
    #[must_use]
    pub fn beacon(world: &World, position: BlockPos) -> Option<BeaconSnapshot> {
        world.beacons.get(position).map(|state| state.snapshot())
    }

    /// Snapshots of every beacon, in coordinate order.
    #[must_use]
    pub fn beacons(world: &World) -> Vec<BeaconSnapshot> {
        world
            .beacons
            .positions()
            .filter_map(|position| world.beacons.get(position))
            .map(|state| state.snapshot())
            .collect()
    }

    /// Persisted form of the beacon, ready to be saved with its chunk.
    #[must_use]
    pub fn beacon_record(world: &World, position: BlockPos) -> Option<StructureRecord> {
        world.beacons.get(position).map(|state| state.record())
    }

    /// Payload describing the beacon to clients.
    #[must_use]
    pub fn spawn_payload(world: &World, position: BlockPos) -> Option<Tag> {
        world.beacons.get(position).map(|state| state.spawn_payload())
    }

    /// Effects currently active on the participant, in effect order.
    #[must_use]
    pub fn participant_effects(world: &World, participant: ParticipantId) -> Vec<EffectInstance> {
        world
            .participants
            .get(&participant)
            .map(|entry| entry.effects().collect())
            .unwrap_or_default()
    }

    /// Tick at which the pending delayed update of the coordinate falls due.
    #[must_use]
    pub fn pending_update(world: &World, position: BlockPos) -> Option<u64> {
        world.updates.due_at(position)
    }

    /// Chunks the beacon's listener is registered on.
    #[must_use]
    pub fn listened_chunks(world: &World, position: BlockPos) -> Vec<ChunkPos> {
        world
            .beacons
            .get(position)
            .map(|state| state.listener.chunks().to_vec())
            .unwrap_or_default()
    }

    /// Beacons listening for mutations inside the chunk.
    #[must_use]
    pub fn listening_beacons(world: &World, chunk: ChunkPos) -> Vec<BlockPos> {
        world.listeners.listeners_of(chunk)
    }
}
