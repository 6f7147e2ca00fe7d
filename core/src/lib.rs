#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the beacon runtime.
//!
//! This crate defines the message surface that connects the server driver,
//! the authoritative world, and pure systems. Drivers submit [`Command`]
//! values describing desired mutations, the world executes those commands via
//! its `apply` entry point, and then broadcasts [`Event`] values for systems
//! to react to. Systems read the world through the [`WorldView`] collaborator
//! trait and respond exclusively with new command batches.

pub mod protocol;
pub mod record;
pub mod rules;

use serde::{Deserialize, Serialize};

pub use protocol::{
    ActionSource, BlockEntityData, ContainerOpen, Direction, InventoryAction,
    InventoryTransaction, Message, MessageKind, PayloadError, SessionSnapshot, Tag,
    TransactionData, WindowHolder, WindowId, WindowType,
};
pub use record::{RecordError, RecordItem, StructureRecord};
pub use rules::{
    EffectRequirement, EffectRuleTable, RuleTableConfig, RuleTableError, SelectionError,
};

/// Number of pyramid layers that may be confirmed beneath a beacon.
pub const MAX_TIERS: u8 = 4;

/// Delay, in ticks, between two effect broadcasts of an active beacon.
pub const BROADCAST_INTERVAL_TICKS: u64 = 80;

/// Delay, in ticks, before a beacon re-evaluates after being invalidated.
pub const RECALCULATION_DELAY_TICKS: u64 = 1;

/// Squared reach beyond which a participant may not configure a beacon.
pub const MAX_INTERACTION_DISTANCE_SQUARED: f64 = 10_000.0;

/// Horizontal radius of the region a pyramid scan may touch.
pub const PYRAMID_RADIUS: i32 = MAX_TIERS as i32;

const CHUNK_SHIFT: i32 = 4;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the world clock by a single tick.
    Tick,
    /// Makes a chunk resident so its blocks and participants can be queried.
    LoadChunk {
        /// Chunk that becomes resident.
        chunk: ChunkPos,
    },
    /// Drops a chunk, together with every beacon and participant inside it.
    ///
    /// The fuel held by dropped beacons is reported through
    /// [`Event::FuelDropped`].
    UnloadChunk {
        /// Chunk that stops being resident.
        chunk: ChunkPos,
    },
    /// Replaces the material stored at a block coordinate.
    SetBlock {
        /// Coordinate of the mutated block.
        position: BlockPos,
        /// Material stored after the mutation.
        material: MaterialId,
    },
    /// Places a fresh beacon whose derived state still has to be computed.
    PlaceBeacon {
        /// Coordinate of the beacon block.
        position: BlockPos,
    },
    /// Recreates a beacon from its persisted record.
    RestoreBeacon {
        /// Coordinate of the beacon block.
        position: BlockPos,
        /// Record previously produced when saving the beacon.
        record: StructureRecord,
    },
    /// Removes a beacon and its block.
    RemoveBeacon {
        /// Coordinate of the beacon block.
        position: BlockPos,
    },
    /// Replaces the content of a beacon's fuel slot.
    SetFuel {
        /// Coordinate of the beacon.
        position: BlockPos,
        /// Stack stored in the fuel slot, if any.
        fuel: Option<ItemStack>,
    },
    /// Requests a delayed update of the block at the provided coordinate.
    ScheduleUpdate {
        /// Coordinate that receives the update.
        position: BlockPos,
        /// Number of ticks before the update is delivered.
        delay: u64,
    },
    /// Stores a freshly scanned tier count on a beacon.
    RecordTiers {
        /// Coordinate of the beacon.
        position: BlockPos,
        /// Tier count produced by the scan.
        tiers: TierCount,
    },
    /// Stores a freshly scanned obstruction flag on a beacon.
    RecordObstruction {
        /// Coordinate of the beacon.
        position: BlockPos,
        /// Whether anything opaque sits above the beacon.
        obstructed: bool,
    },
    /// Consumes one fuel unit and stores a validated effect selection.
    SelectEffects {
        /// Coordinate of the beacon.
        position: BlockPos,
        /// Selection that already passed validation.
        selection: SelectedEffects,
    },
    /// Marks both derived values of a beacon stale and queues a re-evaluation.
    FlagRecalculation {
        /// Coordinate of the beacon.
        position: BlockPos,
    },
    /// Marks the tier count of a beacon stale and queues a re-evaluation.
    FlagLayerRecalculation {
        /// Coordinate of the beacon.
        position: BlockPos,
    },
    /// Marks the obstruction flag of a beacon stale and queues a re-evaluation.
    FlagCoverRecalculation {
        /// Coordinate of the beacon.
        position: BlockPos,
    },
    /// Adds a participant to the world.
    SpawnParticipant {
        /// Identifier of the participant.
        participant: ParticipantId,
        /// Location the participant appears at.
        position: Position,
    },
    /// Moves a participant to a new location.
    MoveParticipant {
        /// Identifier of the participant.
        participant: ParticipantId,
        /// Location after the move.
        position: Position,
    },
    /// Removes a participant from the world.
    DespawnParticipant {
        /// Identifier of the participant.
        participant: ParticipantId,
    },
    /// Applies an effect instance to a participant.
    ApplyEffect {
        /// Participant receiving the effect.
        participant: ParticipantId,
        /// Effect instance to apply.
        effect: EffectInstance,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the world clock advanced.
    TimeAdvanced {
        /// Index of the tick that just started.
        tick: u64,
    },
    /// Confirms that a chunk became resident.
    ChunkLoaded {
        /// Chunk that was loaded.
        chunk: ChunkPos,
    },
    /// Confirms that a chunk was dropped.
    ChunkUnloaded {
        /// Chunk that was unloaded.
        chunk: ChunkPos,
    },
    /// Confirms that a block changed material.
    BlockChanged {
        /// Coordinate of the block.
        position: BlockPos,
        /// Material stored after the change.
        material: MaterialId,
    },
    /// Confirms that a beacon was created, either placed or restored.
    BeaconPlaced {
        /// Coordinate of the beacon.
        position: BlockPos,
    },
    /// Confirms that a beacon was destroyed.
    BeaconRemoved {
        /// Coordinate of the former beacon.
        position: BlockPos,
    },
    /// Reports the content of a fuel slot released by a destroyed beacon.
    FuelDropped {
        /// Coordinate of the former beacon.
        position: BlockPos,
        /// Stack that was held in the fuel slot.
        fuel: ItemStack,
    },
    /// Reports that a persisted record could not be turned into a beacon.
    BeaconRestoreRejected {
        /// Coordinate the record targeted.
        position: BlockPos,
        /// Reason the record was refused.
        reason: RecordError,
    },
    /// Delivers a delayed update requested earlier.
    ScheduledUpdateDue {
        /// Coordinate the update targets.
        position: BlockPos,
    },
    /// Reports that a beacon's tier count must be recomputed.
    TiersInvalidated {
        /// Coordinate of the beacon.
        position: BlockPos,
    },
    /// Reports that a beacon's obstruction flag must be recomputed.
    ObstructionInvalidated {
        /// Coordinate of the beacon.
        position: BlockPos,
    },
    /// Confirms that a scanned tier count was stored.
    TiersRecorded {
        /// Coordinate of the beacon.
        position: BlockPos,
        /// Stored tier count.
        tiers: TierCount,
    },
    /// Confirms that a scanned obstruction flag was stored.
    ObstructionRecorded {
        /// Coordinate of the beacon.
        position: BlockPos,
        /// Stored obstruction flag.
        obstructed: bool,
    },
    /// Confirms that the content of a fuel slot changed.
    FuelChanged {
        /// Coordinate of the beacon.
        position: BlockPos,
        /// Content of the fuel slot after the change.
        fuel: Option<ItemStack>,
    },
    /// Confirms that an effect selection was stored.
    EffectsSelected {
        /// Coordinate of the beacon.
        position: BlockPos,
        /// Selection now stored on the beacon.
        selection: SelectedEffects,
    },
    /// Confirms that a participant joined the world.
    ParticipantSpawned {
        /// Identifier of the participant.
        participant: ParticipantId,
    },
    /// Confirms that a participant left the world.
    ParticipantDespawned {
        /// Identifier of the participant.
        participant: ParticipantId,
    },
    /// Confirms that an effect instance reached a participant.
    EffectApplied {
        /// Participant that received the effect.
        participant: ParticipantId,
        /// Effect instance that was applied.
        effect: EffectInstance,
    },
}

/// Read-only access to the live world, as consumed by the beacon systems.
///
/// Every query is best-effort over resident data: coordinates inside chunks
/// that are not loaded report no block at all.
pub trait WorldView {
    /// Vertical extent of the world.
    fn bounds(&self) -> WorldBounds;

    /// Reports whether the chunk is currently resident.
    fn is_chunk_loaded(&self, chunk: ChunkPos) -> bool;

    /// Material stored at the coordinate, or `None` when the chunk is not
    /// resident or the coordinate lies outside the vertical bounds.
    fn material_at(&self, position: BlockPos) -> Option<MaterialId>;

    /// Reports whether light passes through the material.
    fn is_transparent(&self, material: MaterialId) -> bool;

    /// Participants whose position lies within the chunk, in identifier order.
    fn participants_in_chunk(&self, chunk: ChunkPos) -> Vec<ParticipantSnapshot>;

    /// Looks up a single participant.
    fn participant(&self, participant: ParticipantId) -> Option<ParticipantSnapshot>;

    /// Looks up the beacon stored at the coordinate.
    fn beacon(&self, position: BlockPos) -> Option<BeaconSnapshot>;
}

/// Vertical extent of a world: blocks exist for `floor <= y < ceiling`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldBounds {
    floor: i32,
    ceiling: i32,
}

impl WorldBounds {
    /// Creates bounds from the lowest valid coordinate and the exclusive ceiling.
    #[must_use]
    pub const fn new(floor: i32, ceiling: i32) -> Self {
        Self { floor, ceiling }
    }

    /// Lowest vertical coordinate that may hold a block.
    #[must_use]
    pub const fn floor(&self) -> i32 {
        self.floor
    }

    /// First vertical coordinate above the world.
    #[must_use]
    pub const fn ceiling(&self) -> i32 {
        self.ceiling
    }

    /// Reports whether blocks may exist at the provided height.
    #[must_use]
    pub const fn contains(&self, y: i32) -> bool {
        y >= self.floor && y < self.ceiling
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::new(0, 256)
    }
}

/// Integer coordinate of a single block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    x: i32,
    y: i32,
    z: i32,
}

impl BlockPos {
    /// Creates a new block coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// East-west component.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical component.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// North-south component.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }

    /// Returns the coordinate displaced by the provided offsets, clamped to
    /// the representable range.
    #[must_use]
    pub const fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.z.saturating_add(dz),
        )
    }

    /// Chunk that contains the coordinate.
    #[must_use]
    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos::containing(self.x, self.z)
    }

    /// Squared euclidean distance between the block corner and a position.
    #[must_use]
    pub fn distance_squared(&self, position: Position) -> f64 {
        let dx = f64::from(self.x) - position.x();
        let dy = f64::from(self.y) - position.y();
        let dz = f64::from(self.z) - position.z();
        dx * dx + dy * dy + dz * dz
    }
}

/// Horizontal coordinate of a 16×16 column of blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    x: i32,
    z: i32,
}

impl ChunkPos {
    /// Creates a new chunk coordinate.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the provided block column.
    #[must_use]
    pub const fn containing(block_x: i32, block_z: i32) -> Self {
        Self::new(block_x >> CHUNK_SHIFT, block_z >> CHUNK_SHIFT)
    }

    /// East-west chunk index.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// North-south chunk index.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.z
    }

    /// Every chunk intersecting the inclusive block rectangle, row by row.
    pub fn covering(
        min_x: i32,
        max_x: i32,
        min_z: i32,
        max_z: i32,
    ) -> impl Iterator<Item = ChunkPos> {
        let min = Self::containing(min_x, min_z);
        let max = Self::containing(max_x, max_z);
        (min.x..=max.x).flat_map(move |x| (min.z..=max.z).map(move |z| ChunkPos::new(x, z)))
    }
}

/// Continuous location of a participant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    x: f64,
    y: f64,
    z: f64,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// East-west component.
    #[must_use]
    pub const fn x(&self) -> f64 {
        self.x
    }

    /// Vertical component.
    #[must_use]
    pub const fn y(&self) -> f64 {
        self.y
    }

    /// North-south component.
    #[must_use]
    pub const fn z(&self) -> f64 {
        self.z
    }

    /// Chunk whose columns contain the position.
    #[must_use]
    pub fn chunk(&self) -> ChunkPos {
        ChunkPos::containing(self.x.floor() as i32, self.z.floor() as i32)
    }
}

/// Identifier of a block material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(u32);

impl MaterialId {
    /// Creates a new material identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of an item type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(u32);

impl ItemId {
    /// Creates a new item identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of a status effect. The wire value `0` means "no effect" and is
/// never a valid identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectId(u32);

impl EffectId {
    /// Creates a new effect identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Decodes the wire representation where `0` stands for "none".
    ///
    /// Negative values have no meaning and yield `Err` with the raw value.
    pub const fn from_wire(value: i32) -> Result<Option<Self>, i32> {
        if value < 0 {
            Err(value)
        } else if value == 0 {
            Ok(None)
        } else {
            Ok(Some(Self(value as u32)))
        }
    }

    /// Encodes an optional effect into its wire representation.
    #[must_use]
    pub const fn to_wire(effect: Option<Self>) -> i32 {
        match effect {
            Some(effect) => effect.0 as i32,
            None => 0,
        }
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(u32);

impl ParticipantId {
    /// Creates a new participant identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Well-known materials used by the default rule table and the reference world.
pub mod material {
    use super::MaterialId;

    /// Empty space.
    pub const AIR: MaterialId = MaterialId::new(0);
    /// Plain opaque stone.
    pub const STONE: MaterialId = MaterialId::new(1);
    /// Transparent glass.
    pub const GLASS: MaterialId = MaterialId::new(20);
    /// Gold storage block.
    pub const GOLD_BLOCK: MaterialId = MaterialId::new(41);
    /// Iron storage block.
    pub const IRON_BLOCK: MaterialId = MaterialId::new(42);
    /// Diamond storage block.
    pub const DIAMOND_BLOCK: MaterialId = MaterialId::new(57);
    /// Emerald storage block.
    pub const EMERALD_BLOCK: MaterialId = MaterialId::new(133);
    /// The beacon block itself.
    pub const BEACON: MaterialId = MaterialId::new(138);
    /// Coal storage block.
    pub const COAL_BLOCK: MaterialId = MaterialId::new(173);
}

/// Well-known items used by the default rule table.
pub mod item {
    use super::ItemId;

    /// Coal.
    pub const COAL: ItemId = ItemId::new(263);
    /// Diamond.
    pub const DIAMOND: ItemId = ItemId::new(264);
    /// Iron ingot.
    pub const IRON_INGOT: ItemId = ItemId::new(265);
    /// Gold ingot.
    pub const GOLD_INGOT: ItemId = ItemId::new(266);
    /// Stick, which is never fuel.
    pub const STICK: ItemId = ItemId::new(280);
    /// Emerald.
    pub const EMERALD: ItemId = ItemId::new(388);
}

/// Well-known status effects.
pub mod effect {
    use super::EffectId;

    /// Movement speed.
    pub const SPEED: EffectId = EffectId::new(1);
    /// Mining speed.
    pub const HASTE: EffectId = EffectId::new(3);
    /// Melee damage.
    pub const STRENGTH: EffectId = EffectId::new(5);
    /// Jump height.
    pub const JUMP_BOOST: EffectId = EffectId::new(8);
    /// Health regeneration.
    pub const REGENERATION: EffectId = EffectId::new(10);
    /// Damage reduction.
    pub const RESISTANCE: EffectId = EffectId::new(11);
}

/// Number of confirmed pyramid layers beneath a beacon, between 0 and
/// [`MAX_TIERS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TierCount(u8);

impl TierCount {
    /// No pyramid at all.
    pub const ZERO: Self = Self(0);

    /// Complete pyramid.
    pub const MAX: Self = Self(MAX_TIERS);

    /// Creates a tier count, saturating at [`MAX_TIERS`].
    #[must_use]
    pub const fn new(value: u8) -> Self {
        if value > MAX_TIERS {
            Self(MAX_TIERS)
        } else {
            Self(value)
        }
    }

    /// Retrieves the number of layers.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }

    /// Horizontal reach of the beacon's effects, in blocks.
    #[must_use]
    pub const fn range(&self) -> i32 {
        (self.0 as i32 + 1) * 10
    }

    /// Duration of every broadcast effect instance, in ticks.
    #[must_use]
    pub const fn effect_duration(&self) -> u32 {
        (9 + self.0 as u32 * 2) * 20
    }
}

/// Quantity of a single item type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    item: ItemId,
    count: u8,
}

impl ItemStack {
    /// Creates a stack. A zero count describes an empty slot and yields `None`.
    #[must_use]
    pub const fn new(item: ItemId, count: u8) -> Option<Self> {
        if count == 0 {
            None
        } else {
            Some(Self { item, count })
        }
    }

    /// Item type held by the stack.
    #[must_use]
    pub const fn item(&self) -> ItemId {
        self.item
    }

    /// Number of units in the stack, always at least one.
    #[must_use]
    pub const fn count(&self) -> u8 {
        self.count
    }

    /// Removes a single unit, returning what remains of the stack.
    #[must_use]
    pub const fn pop(self) -> Option<Self> {
        Self::new(self.item, self.count.saturating_sub(1))
    }
}

/// Concrete effect applied to a participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectInstance {
    effect: EffectId,
    amplifier: u8,
    duration: u32,
}

impl EffectInstance {
    /// Creates a new effect instance.
    #[must_use]
    pub const fn new(effect: EffectId, amplifier: u8, duration: u32) -> Self {
        Self {
            effect,
            amplifier,
            duration,
        }
    }

    /// Effect type.
    #[must_use]
    pub const fn effect(&self) -> EffectId {
        self.effect
    }

    /// Zero-based strength of the effect.
    #[must_use]
    pub const fn amplifier(&self) -> u8 {
        self.amplifier
    }

    /// Remaining duration in ticks.
    #[must_use]
    pub const fn duration(&self) -> u32 {
        self.duration
    }

    /// Returns the same instance with a different remaining duration.
    #[must_use]
    pub const fn with_duration(self, duration: u32) -> Self {
        Self { duration, ..self }
    }
}

/// Slot of a beacon's effect pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectSlot {
    /// First effect, available from the first tier.
    Primary,
    /// Second effect, only available on a complete pyramid.
    Secondary,
}

impl EffectSlot {
    /// Amplifier applied to effects selected in this slot.
    #[must_use]
    pub const fn amplifier(self) -> u8 {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }

    /// Tiers required before an effect in this slot is broadcast.
    #[must_use]
    pub const fn required_tiers(self) -> TierCount {
        match self {
            Self::Primary => TierCount::new(1),
            Self::Secondary => TierCount::MAX,
        }
    }
}

/// Pair of effects selected on a beacon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedEffects {
    primary: Option<EffectId>,
    secondary: Option<EffectId>,
}

impl SelectedEffects {
    /// Selection without any effect.
    pub const NONE: Self = Self {
        primary: None,
        secondary: None,
    };

    /// Creates a selection from its two slots.
    #[must_use]
    pub const fn new(primary: Option<EffectId>, secondary: Option<EffectId>) -> Self {
        Self { primary, secondary }
    }

    /// Effect selected in the primary slot.
    #[must_use]
    pub const fn primary(&self) -> Option<EffectId> {
        self.primary
    }

    /// Effect selected in the secondary slot.
    #[must_use]
    pub const fn secondary(&self) -> Option<EffectId> {
        self.secondary
    }

    /// Reports whether neither slot holds an effect.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_none()
    }

    /// Iterates over the occupied slots, primary first.
    pub fn slots(&self) -> impl Iterator<Item = (EffectSlot, EffectId)> {
        let primary = self.primary.map(|effect| (EffectSlot::Primary, effect));
        let secondary = self.secondary.map(|effect| (EffectSlot::Secondary, effect));
        primary.into_iter().chain(secondary)
    }
}

/// Derived beacon value that is either known or awaiting recomputation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cached<T> {
    /// The value reflects the world as of the last scan.
    Fresh(T),
    /// The world changed; the value must be rescanned before being trusted.
    Stale,
}

impl<T: Copy> Cached<T> {
    /// Returns the value when it is fresh.
    #[must_use]
    pub fn fresh(&self) -> Option<T> {
        match self {
            Self::Fresh(value) => Some(*value),
            Self::Stale => None,
        }
    }

    /// Reports whether the value must be recomputed.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }
}

/// Broadcast lifecycle of a beacon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BeaconPhase {
    /// No effect is selected.
    Idle,
    /// Effects are selected and broadcast whenever the pyramid allows it.
    Active,
}

/// Immutable representation of a single beacon used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct BeaconSnapshot {
    /// Coordinate of the beacon block.
    pub position: BlockPos,
    /// Custom display name, if one was assigned.
    pub name: Option<String>,
    /// Last known tier count.
    pub tiers: Cached<TierCount>,
    /// Last known obstruction flag.
    pub obstruction: Cached<bool>,
    /// Selected effect pair.
    pub selection: SelectedEffects,
    /// Content of the fuel slot.
    pub fuel: Option<ItemStack>,
}

impl BeaconSnapshot {
    /// Broadcast lifecycle derived from the selection.
    #[must_use]
    pub fn phase(&self) -> BeaconPhase {
        if self.selection.is_empty() {
            BeaconPhase::Idle
        } else {
            BeaconPhase::Active
        }
    }
}

/// Immutable representation of a single participant used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticipantSnapshot {
    /// Identifier of the participant.
    pub id: ParticipantId,
    /// Current location.
    pub position: Position,
}

#[cfg(test)]
mod tests {
    use super::{
        BeaconPhase, BeaconSnapshot, BlockPos, Cached, ChunkPos, EffectId, EffectInstance, ItemId,
        ItemStack, Position, SelectedEffects, TierCount, MAX_TIERS,
    };
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn range_and_duration_follow_tier_formula() {
        for tiers in 0..=MAX_TIERS {
            let count = TierCount::new(tiers);
            assert_eq!(count.range(), 10 * (i32::from(tiers) + 1));
            assert_eq!(count.effect_duration(), (9 + 2 * u32::from(tiers)) * 20);
        }
    }

    #[test]
    fn tier_count_saturates_at_maximum() {
        assert_eq!(TierCount::new(9), TierCount::MAX);
        assert_eq!(TierCount::new(9).get(), MAX_TIERS);
    }

    #[test]
    fn offset_clamps_at_the_coordinate_limits() {
        let edge = BlockPos::new(i32::MAX - 1, 64, i32::MIN + 1);
        assert_eq!(edge.offset(4, 0, -4), BlockPos::new(i32::MAX, 64, i32::MIN));
        assert_eq!(edge.offset(-4, -1, 4), BlockPos::new(i32::MAX - 5, 63, i32::MIN + 5));
    }

    #[test]
    fn phase_follows_the_selection() {
        let mut snapshot = BeaconSnapshot {
            position: BlockPos::new(0, 64, 0),
            name: None,
            tiers: Cached::Stale,
            obstruction: Cached::Stale,
            selection: SelectedEffects::NONE,
            fuel: None,
        };
        assert_eq!(snapshot.phase(), BeaconPhase::Idle);

        snapshot.selection = SelectedEffects::new(None, Some(EffectId::new(3)));
        assert_eq!(snapshot.phase(), BeaconPhase::Active);
    }

    #[test]
    fn chunk_of_negative_coordinates_rounds_down() {
        assert_eq!(BlockPos::new(-1, 64, -17).chunk(), ChunkPos::new(-1, -2));
        assert_eq!(BlockPos::new(15, 0, 16).chunk(), ChunkPos::new(0, 1));
        assert_eq!(Position::new(-0.5, 70.0, 31.9).chunk(), ChunkPos::new(-1, 1));
    }

    #[test]
    fn covering_visits_every_intersecting_chunk() {
        let chunks: Vec<_> = ChunkPos::covering(-4, 20, 12, 20).collect();
        assert_eq!(
            chunks,
            vec![
                ChunkPos::new(-1, 0),
                ChunkPos::new(-1, 1),
                ChunkPos::new(0, 0),
                ChunkPos::new(0, 1),
                ChunkPos::new(1, 0),
                ChunkPos::new(1, 1),
            ]
        );
    }

    #[test]
    fn popping_last_unit_empties_the_stack() {
        let stack = ItemStack::new(ItemId::new(263), 2).expect("stack");
        let remaining = stack.pop().expect("one left");
        assert_eq!(remaining.count(), 1);
        assert_eq!(remaining.pop(), None);
        assert_eq!(ItemStack::new(ItemId::new(263), 0), None);
    }

    #[test]
    fn effect_wire_values_treat_zero_as_absent() {
        assert_eq!(EffectId::from_wire(0), Ok(None));
        assert_eq!(EffectId::from_wire(5), Ok(Some(EffectId::new(5))));
        assert_eq!(EffectId::from_wire(-3), Err(-3));
        assert_eq!(EffectId::to_wire(None), 0);
        assert_eq!(EffectId::to_wire(Some(EffectId::new(11))), 11);
    }

    #[test]
    fn distance_is_measured_from_block_corner() {
        let target = BlockPos::new(0, 64, 0);
        assert_eq!(target.distance_squared(Position::new(100.0, 65.0, 0.0)), 10_001.0);
        assert_eq!(target.distance_squared(Position::new(3.0, 68.0, 0.0)), 25.0);
    }

    #[test]
    fn slots_skip_empty_entries() {
        let selection = SelectedEffects::new(None, Some(EffectId::new(1)));
        let slots: Vec<_> = selection.slots().collect();
        assert_eq!(slots.len(), 1);
        assert!(SelectedEffects::NONE.is_empty());
    }

    #[test]
    fn selection_round_trips_through_bincode() {
        assert_round_trip(&SelectedEffects::new(
            Some(EffectId::new(1)),
            Some(EffectId::new(1)),
        ));
    }

    #[test]
    fn effect_instance_round_trips_through_bincode() {
        assert_round_trip(&EffectInstance::new(EffectId::new(10), 1, 340));
    }
}
