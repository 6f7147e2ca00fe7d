//! Authoritative beacon state stored inside the world.

use std::collections::BTreeMap;

use beacon_core::{
    protocol::{self, TAG_CUSTOM_NAME, TAG_ID},
    BeaconSnapshot, BlockPos, Cached, EffectId, ItemStack, RecordError, RecordItem,
    SelectedEffects, StructureRecord, Tag, TierCount,
};

use crate::listeners::ChunkListener;

/// Block-entity type advertised to clients.
const BEACON_ENTITY_ID: &str = "Beacon";

/// Mutable record kept for every beacon placed in the world.
#[derive(Clone, Debug)]
pub(crate) struct BeaconState {
    position: BlockPos,
    name: Option<String>,
    tiers: Cached<TierCount>,
    obstruction: Cached<bool>,
    selection: SelectedEffects,
    fuel: Option<ItemStack>,
    pub(crate) listener: ChunkListener,
}

impl BeaconState {
    /// Creates the state of a freshly placed beacon; nothing is known yet.
    pub(crate) fn placed(position: BlockPos) -> Self {
        Self {
            position,
            name: None,
            tiers: Cached::Stale,
            obstruction: Cached::Stale,
            selection: SelectedEffects::NONE,
            fuel: None,
            listener: ChunkListener::Inert,
        }
    }

    /// Rebuilds the state of a beacon from its persisted record.
    pub(crate) fn restored(position: BlockPos, record: &StructureRecord) -> Result<Self, RecordError> {
        Ok(Self {
            position,
            name: record.custom_name.clone(),
            tiers: record.tiers()?,
            obstruction: record.obstruction(),
            selection: record.selection()?,
            fuel: record.fuel()?,
            listener: ChunkListener::Inert,
        })
    }

    pub(crate) fn position(&self) -> BlockPos {
        self.position
    }

    pub(crate) fn selection(&self) -> SelectedEffects {
        self.selection
    }

    pub(crate) fn fuel(&self) -> Option<ItemStack> {
        self.fuel
    }

    pub(crate) fn set_fuel(&mut self, fuel: Option<ItemStack>) {
        self.fuel = fuel;
    }

    /// Burns one unit of fuel and stores the selection in the same step.
    ///
    /// Returns `false` without touching anything when the slot is empty.
    pub(crate) fn select_effects(&mut self, selection: SelectedEffects) -> bool {
        let Some(fuel) = self.fuel else {
            return false;
        };
        self.fuel = fuel.pop();
        self.selection = selection;
        true
    }

    pub(crate) fn flag_for_layer_recalculation(&mut self) {
        self.tiers = Cached::Stale;
    }

    pub(crate) fn flag_for_cover_recalculation(&mut self) {
        self.obstruction = Cached::Stale;
    }

    pub(crate) fn record_tiers(&mut self, tiers: TierCount) {
        self.tiers = Cached::Fresh(tiers);
    }

    pub(crate) fn record_obstruction(&mut self, obstructed: bool) {
        self.obstruction = Cached::Fresh(obstructed);
    }

    pub(crate) fn snapshot(&self) -> BeaconSnapshot {
        BeaconSnapshot {
            position: self.position,
            name: self.name.clone(),
            tiers: self.tiers,
            obstruction: self.obstruction,
            selection: self.selection,
            fuel: self.fuel,
        }
    }

    /// Persisted form; stale derived values are left out.
    pub(crate) fn record(&self) -> StructureRecord {
        StructureRecord {
            custom_name: self.name.clone(),
            items: self
                .fuel
                .map(|stack| RecordItem {
                    slot: 0,
                    item: stack.item(),
                    count: stack.count(),
                })
                .into_iter()
                .collect(),
            primary: EffectId::to_wire(self.selection.primary()),
            secondary: EffectId::to_wire(self.selection.secondary()),
            layers: self.tiers.fresh().map(|tiers| tiers.get()),
            covers: self.obstruction.fresh().map(u8::from),
        }
    }

    /// Payload describing the beacon to clients.
    pub(crate) fn spawn_payload(&self) -> Tag {
        let mut payload =
            Tag::compound().with(TAG_ID, Tag::String(BEACON_ENTITY_ID.to_owned()));
        if let Some(name) = &self.name {
            payload = payload.with(TAG_CUSTOM_NAME, Tag::String(name.clone()));
        }
        protocol::write_selection(payload, self.selection)
    }
}

/// Registry that stores beacons by coordinate.
#[derive(Debug, Default)]
pub(crate) struct BeaconRegistry {
    entries: BTreeMap<BlockPos, BeaconState>,
}

impl BeaconRegistry {
    pub(crate) fn get(&self, position: BlockPos) -> Option<&BeaconState> {
        self.entries.get(&position)
    }

    pub(crate) fn get_mut(&mut self, position: BlockPos) -> Option<&mut BeaconState> {
        self.entries.get_mut(&position)
    }

    pub(crate) fn insert(&mut self, state: BeaconState) {
        let _ = self.entries.insert(state.position(), state);
    }

    pub(crate) fn remove(&mut self, position: BlockPos) -> Option<BeaconState> {
        self.entries.remove(&position)
    }

    pub(crate) fn positions(&self) -> impl Iterator<Item = BlockPos> + '_ {
        self.entries.keys().copied()
    }
}
