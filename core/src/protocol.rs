//! Wire messages exchanged with clients and the session state they refer to.
//!
//! Only the fields the beacon runtime reads or rewrites are modelled; every
//! other message travels as [`Message::Other`] and is never inspected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BlockPos, EffectId, ItemStack, ParticipantId, SelectedEffects};

/// Slot index the generic container UI uses when a client touches the fuel
/// slot of a beacon.
pub const VIRTUAL_FUEL_SLOT: u32 = 27;

/// Index of the fuel slot inside a beacon's own container.
pub const FUEL_SLOT: u32 = 0;

/// Payload key of the primary effect.
pub const TAG_PRIMARY: &str = "primary";
/// Payload key of the secondary effect.
pub const TAG_SECONDARY: &str = "secondary";
/// Payload key of the block-entity type.
pub const TAG_ID: &str = "id";
/// Payload key of a custom display name.
pub const TAG_CUSTOM_NAME: &str = "CustomName";

/// Structured value carried by block-entity messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tag {
    /// Signed 8-bit integer.
    Byte(i8),
    /// Signed 32-bit integer.
    Int(i32),
    /// UTF-8 string.
    String(String),
    /// Homogeneous list.
    List(Vec<Tag>),
    /// Named fields.
    Compound(BTreeMap<String, Tag>),
}

impl Tag {
    /// Creates an empty compound.
    #[must_use]
    pub fn compound() -> Self {
        Self::Compound(BTreeMap::new())
    }

    /// Returns the named fields when the value is a compound.
    #[must_use]
    pub fn as_compound(&self) -> Option<&BTreeMap<String, Tag>> {
        match self {
            Self::Compound(fields) => Some(fields),
            _ => None,
        }
    }

    /// Builder-style helper that inserts a field into a compound.
    ///
    /// Non-compound values are returned unchanged.
    #[must_use]
    pub fn with(mut self, key: &str, value: Tag) -> Self {
        if let Self::Compound(fields) = &mut self {
            let _ = fields.insert(key.to_owned(), value);
        }
        self
    }
}

/// Reasons a block-entity payload cannot be read as an effect selection.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// The root value is not a compound.
    #[error("payload root is not a compound")]
    NotACompound,
    /// A selection field holds something other than an integer.
    #[error("field `{0}` is not an integer")]
    WrongFieldType(&'static str),
    /// A selection field holds a negative effect identifier.
    #[error("field `{field}` holds invalid effect id {value}")]
    InvalidEffectId {
        /// Name of the offending field.
        field: &'static str,
        /// Raw value found in the payload.
        value: i32,
    },
}

/// Reads the effect pair carried by a block-entity payload.
///
/// Missing fields mean "no effect", like an explicit `0`.
pub fn read_selection(payload: &Tag) -> Result<SelectedEffects, PayloadError> {
    let fields = payload.as_compound().ok_or(PayloadError::NotACompound)?;
    let primary = read_effect(fields, TAG_PRIMARY)?;
    let secondary = read_effect(fields, TAG_SECONDARY)?;
    Ok(SelectedEffects::new(primary, secondary))
}

fn read_effect(
    fields: &BTreeMap<String, Tag>,
    field: &'static str,
) -> Result<Option<EffectId>, PayloadError> {
    match fields.get(field) {
        None => Ok(None),
        Some(Tag::Int(value)) => EffectId::from_wire(*value)
            .map_err(|value| PayloadError::InvalidEffectId { field, value }),
        Some(_) => Err(PayloadError::WrongFieldType(field)),
    }
}

/// Writes the effect pair into a compound payload.
#[must_use]
pub fn write_selection(payload: Tag, selection: SelectedEffects) -> Tag {
    payload
        .with(TAG_PRIMARY, Tag::Int(EffectId::to_wire(selection.primary())))
        .with(TAG_SECONDARY, Tag::Int(EffectId::to_wire(selection.secondary())))
}

/// Identifier of a container window within a single session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(u8);

impl WindowId {
    /// Creates a new window identifier.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// UI classification sent to the client when a container opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowType {
    /// Generic chest-like container.
    Container,
    /// Crafting table.
    Workbench,
    /// Furnace.
    Furnace,
    /// Beacon effect picker with its fuel slot.
    Beacon,
}

/// What a window opened by a session is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WindowHolder {
    /// The container of the beacon at the coordinate.
    Beacon(BlockPos),
    /// Any other container.
    Other,
}

/// Session state supplied by the connection layer for a single message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Participant controlled by the session, once spawned.
    pub participant: Option<ParticipantId>,
    /// Window the session currently interacts with.
    pub current_window: Option<WindowId>,
    /// Every window the session has open.
    pub windows: BTreeMap<WindowId, WindowHolder>,
}

impl SessionSnapshot {
    /// Holder of the window with the provided identifier.
    #[must_use]
    pub fn window(&self, window: WindowId) -> Option<WindowHolder> {
        self.windows.get(&window).copied()
    }

    /// Current window together with the beacon it belongs to, if any.
    #[must_use]
    pub fn current_beacon_window(&self) -> Option<(WindowId, BlockPos)> {
        let window = self.current_window?;
        match self.window(window)? {
            WindowHolder::Beacon(position) => Some((window, position)),
            WindowHolder::Other => None,
        }
    }
}

/// Origin of an inventory action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionSource {
    /// A slot of an open container window.
    Container,
    /// Items dropped into or picked up from the world.
    World,
    /// The creative inventory.
    Creative,
    /// Client-side bookkeeping slots.
    Todo,
}

/// Single slot change inside an inventory transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAction {
    /// Where the action originates.
    pub source: ActionSource,
    /// Window the slot belongs to, for container actions.
    pub window: Option<WindowId>,
    /// Slot index within the window.
    pub slot: u32,
    /// Slot content the client believes was there.
    pub old_item: Option<ItemStack>,
    /// Slot content after the action.
    pub new_item: Option<ItemStack>,
}

/// Payload of an inventory transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionData {
    /// Plain slot moves.
    Normal(Vec<InventoryAction>),
    /// Item use, mismatch reports, and other transaction flavours.
    Other,
}

/// Outbound request for the client to open a container window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerOpen {
    /// Window being opened.
    pub window: WindowId,
    /// UI classification shown by the client.
    pub window_type: WindowType,
    /// Block the container belongs to.
    pub position: BlockPos,
}

/// Inbound report of inventory slot changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    /// Transaction payload.
    pub transaction: TransactionData,
}

/// Inbound structured update for a block entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntityData {
    /// Block entity the update targets.
    pub position: BlockPos,
    /// Structured payload.
    pub payload: Tag,
}

/// Tag identifying the kind of a message, used to dispatch interceptors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    /// [`ContainerOpen`].
    ContainerOpen,
    /// [`InventoryTransaction`].
    InventoryTransaction,
    /// [`BlockEntityData`].
    BlockEntityData,
    /// Any message the beacon runtime does not inspect, by network id.
    Other(u16),
}

/// Travel direction of a message relative to the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Client to server.
    Inbound,
    /// Server to client.
    Outbound,
}

/// Message exchanged with a client session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// See [`ContainerOpen`].
    ContainerOpen(ContainerOpen),
    /// See [`InventoryTransaction`].
    InventoryTransaction(InventoryTransaction),
    /// See [`BlockEntityData`].
    BlockEntityData(BlockEntityData),
    /// Uninspected message carrying only its network id.
    Other(u16),
}

impl Message {
    /// Dispatch tag of the message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::ContainerOpen(_) => MessageKind::ContainerOpen,
            Self::InventoryTransaction(_) => MessageKind::InventoryTransaction,
            Self::BlockEntityData(_) => MessageKind::BlockEntityData,
            Self::Other(id) => MessageKind::Other(*id),
        }
    }
}
