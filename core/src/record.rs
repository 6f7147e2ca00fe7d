//! Persisted form of a beacon, embedded in the world's block-entity storage.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Cached, EffectId, ItemId, ItemStack, SelectedEffects, TierCount, MAX_TIERS};

/// Stored content of a container slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordItem {
    /// Slot index inside the container.
    #[serde(rename = "Slot")]
    pub slot: u8,
    /// Item type.
    #[serde(rename = "id")]
    pub item: ItemId,
    /// Number of units.
    #[serde(rename = "Count")]
    pub count: u8,
}

/// Fields persisted for every beacon.
///
/// `layers` and `covers` are only written while the matching value is fresh;
/// a record without them forces a rescan once restored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureRecord {
    /// Custom display name.
    #[serde(rename = "CustomName", default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    /// Content of the fuel container.
    #[serde(rename = "Items", default)]
    pub items: Vec<RecordItem>,
    /// Wire id of the primary effect, `0` for none.
    #[serde(default)]
    pub primary: i32,
    /// Wire id of the secondary effect, `0` for none.
    #[serde(default)]
    pub secondary: i32,
    /// Last scanned tier count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<u8>,
    /// Last scanned obstruction flag as `0` or `1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covers: Option<u8>,
}

/// Reasons a persisted record cannot be restored.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The document could not be decoded.
    #[error("malformed beacon record: {0}")]
    Malformed(String),
    /// An effect field holds a negative id.
    #[error("field `{field}` holds invalid effect id {value}")]
    InvalidEffectId {
        /// Name of the offending field.
        field: &'static str,
        /// Raw stored value.
        value: i32,
    },
    /// The stored tier count exceeds the maximum pyramid height.
    #[error("stored tier count {0} exceeds {max}", max = MAX_TIERS)]
    TiersOutOfRange(u8),
    /// An item sits in a slot the single-slot container does not have.
    #[error("item stored in slot {0}, only slot 0 exists")]
    InvalidSlot(u8),
}

impl StructureRecord {
    /// Decodes a record from its JSON document.
    pub fn from_json(document: &str) -> Result<Self, RecordError> {
        serde_json::from_str(document).map_err(|error| RecordError::Malformed(error.to_string()))
    }

    /// Encodes the record as a JSON document.
    pub fn to_json(&self) -> Result<String, RecordError> {
        serde_json::to_string(self).map_err(|error| RecordError::Malformed(error.to_string()))
    }

    /// Stored effect pair.
    pub fn selection(&self) -> Result<SelectedEffects, RecordError> {
        let primary = EffectId::from_wire(self.primary).map_err(|value| {
            RecordError::InvalidEffectId {
                field: "primary",
                value,
            }
        })?;
        let secondary = EffectId::from_wire(self.secondary).map_err(|value| {
            RecordError::InvalidEffectId {
                field: "secondary",
                value,
            }
        })?;
        Ok(SelectedEffects::new(primary, secondary))
    }

    /// Stored fuel stack.
    pub fn fuel(&self) -> Result<Option<ItemStack>, RecordError> {
        let mut fuel = None;
        for item in &self.items {
            if item.slot != 0 {
                return Err(RecordError::InvalidSlot(item.slot));
            }
            fuel = ItemStack::new(item.item, item.count);
        }
        Ok(fuel)
    }

    /// Stored tier count, stale when it was not persisted.
    pub fn tiers(&self) -> Result<Cached<TierCount>, RecordError> {
        match self.layers {
            None => Ok(Cached::Stale),
            Some(layers) if layers > MAX_TIERS => Err(RecordError::TiersOutOfRange(layers)),
            Some(layers) => Ok(Cached::Fresh(TierCount::new(layers))),
        }
    }

    /// Stored obstruction flag, stale when it was not persisted.
    #[must_use]
    pub fn obstruction(&self) -> Cached<bool> {
        match self.covers {
            None => Cached::Stale,
            Some(covers) => Cached::Fresh(covers != 0),
        }
    }
}
