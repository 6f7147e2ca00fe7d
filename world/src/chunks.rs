//! Resident block storage, split by chunk.

use std::collections::{BTreeSet, HashMap};

use beacon_core::{material, BlockPos, ChunkPos, MaterialId, ParticipantId};

/// Sparse block content of a single resident chunk. Unset blocks are air.
#[derive(Debug, Default)]
pub(crate) struct Chunk {
    blocks: HashMap<BlockPos, MaterialId>,
}

impl Chunk {
    pub(crate) fn material_at(&self, position: BlockPos) -> MaterialId {
        self.blocks
            .get(&position)
            .copied()
            .unwrap_or(material::AIR)
    }

    pub(crate) fn set(&mut self, position: BlockPos, material: MaterialId) {
        if material == material::AIR {
            let _ = self.blocks.remove(&position);
        } else {
            let _ = self.blocks.insert(position, material);
        }
    }
}

/// Every resident chunk.
#[derive(Debug, Default)]
pub(crate) struct ChunkMap {
    chunks: HashMap<ChunkPos, Chunk>,
}

impl ChunkMap {
    pub(crate) fn is_loaded(&self, chunk: ChunkPos) -> bool {
        self.chunks.contains_key(&chunk)
    }

    /// Makes the chunk resident; returns `false` if it already was.
    pub(crate) fn load(&mut self, chunk: ChunkPos) -> bool {
        if self.is_loaded(chunk) {
            return false;
        }
        let _ = self.chunks.insert(chunk, Chunk::default());
        true
    }

    /// Drops the chunk; returns `false` if it was not resident.
    pub(crate) fn unload(&mut self, chunk: ChunkPos) -> bool {
        self.chunks.remove(&chunk).is_some()
    }

    pub(crate) fn get(&self, chunk: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&chunk)
    }

    pub(crate) fn get_mut(&mut self, chunk: ChunkPos) -> Option<&mut Chunk> {
        self.chunks.get_mut(&chunk)
    }
}

/// Index of the participants standing in each chunk, resident or not.
#[derive(Debug, Default)]
pub(crate) struct ParticipantIndex {
    by_chunk: HashMap<ChunkPos, BTreeSet<ParticipantId>>,
}

impl ParticipantIndex {
    pub(crate) fn insert(&mut self, chunk: ChunkPos, participant: ParticipantId) {
        let _ = self.by_chunk.entry(chunk).or_default().insert(participant);
    }

    pub(crate) fn remove(&mut self, chunk: ChunkPos, participant: ParticipantId) {
        if let Some(participants) = self.by_chunk.get_mut(&chunk) {
            let _ = participants.remove(&participant);
            if participants.is_empty() {
                let _ = self.by_chunk.remove(&chunk);
            }
        }
    }

    pub(crate) fn in_chunk(&self, chunk: ChunkPos) -> impl Iterator<Item = ParticipantId> + '_ {
        self.by_chunk.get(&chunk).into_iter().flatten().copied()
    }
}
