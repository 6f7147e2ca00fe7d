//! Chunk listeners that invalidate beacon state when nearby blocks change.

use std::collections::{BTreeSet, HashMap};

use beacon_core::{BlockPos, ChunkPos, PYRAMID_RADIUS};

/// Binding between a beacon and the world's mutation notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ChunkListener {
    /// Listening on every chunk a pyramid scan of `beacon` may touch.
    Bound {
        /// Beacon notified about mutations.
        beacon: BlockPos,
        /// Chunks the listener is registered on.
        chunks: Vec<ChunkPos>,
    },
    /// Not registered anywhere; ignores every notification.
    Inert,
}

/// Derived values a block change may have invalidated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Invalidation {
    pub(crate) tiers: bool,
    pub(crate) obstruction: bool,
}

impl ChunkListener {
    /// Reacts to a block change reported in one of the listened chunks.
    ///
    /// The tier region is the cube a scan could touch, a superset of the
    /// pyramid itself.
    pub(crate) fn on_block_changed(&self, changed: BlockPos) -> Invalidation {
        let Self::Bound { beacon, .. } = self else {
            return Invalidation::default();
        };

        let reach = PYRAMID_RADIUS.unsigned_abs();
        let below = changed.y() < beacon.y() && beacon.y().abs_diff(changed.y()) <= reach;
        let tiers = below
            && changed.x().abs_diff(beacon.x()) <= reach
            && changed.z().abs_diff(beacon.z()) <= reach;
        let obstruction =
            changed.y() > beacon.y() && changed.x() == beacon.x() && changed.z() == beacon.z();

        Invalidation { tiers, obstruction }
    }

    /// Chunks the binding is registered on.
    pub(crate) fn chunks(&self) -> &[ChunkPos] {
        match self {
            Self::Bound { chunks, .. } => chunks,
            Self::Inert => &[],
        }
    }
}

/// Chunks intersecting the widest pyramid beneath the beacon.
pub(crate) fn pyramid_chunks(beacon: BlockPos) -> Vec<ChunkPos> {
    ChunkPos::covering(
        beacon.x().saturating_sub(PYRAMID_RADIUS),
        beacon.x().saturating_add(PYRAMID_RADIUS),
        beacon.z().saturating_sub(PYRAMID_RADIUS),
        beacon.z().saturating_add(PYRAMID_RADIUS),
    )
    .collect()
}

/// Index from chunk to the beacons listening on it.
#[derive(Debug, Default)]
pub(crate) struct ListenerRegistry {
    by_chunk: HashMap<ChunkPos, BTreeSet<BlockPos>>,
}

impl ListenerRegistry {
    /// Registers the beacon on every pyramid chunk and returns its binding.
    pub(crate) fn register(&mut self, beacon: BlockPos) -> ChunkListener {
        let chunks = pyramid_chunks(beacon);
        for chunk in &chunks {
            let _ = self.by_chunk.entry(*chunk).or_default().insert(beacon);
        }
        ChunkListener::Bound { beacon, chunks }
    }

    /// Removes every registration of the binding and swaps it to inert.
    pub(crate) fn unregister(&mut self, listener: &mut ChunkListener) {
        let previous = std::mem::replace(listener, ChunkListener::Inert);
        let ChunkListener::Bound { beacon, chunks } = previous else {
            return;
        };
        for chunk in chunks {
            if let Some(beacons) = self.by_chunk.get_mut(&chunk) {
                let _ = beacons.remove(&beacon);
                if beacons.is_empty() {
                    let _ = self.by_chunk.remove(&chunk);
                }
            }
        }
    }

    /// Beacons listening on the chunk, in coordinate order.
    pub(crate) fn listeners_of(&self, chunk: ChunkPos) -> Vec<BlockPos> {
        self.by_chunk
            .get(&chunk)
            .map(|beacons| beacons.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pyramid_near_chunk_corner_spans_four_chunks() {
        let chunks = pyramid_chunks(BlockPos::new(1, 64, 1));
        assert_eq!(
            chunks,
            vec![
                ChunkPos::new(-1, -1),
                ChunkPos::new(-1, 0),
                ChunkPos::new(0, -1),
                ChunkPos::new(0, 0),
            ]
        );
    }

    #[test]
    fn pyramid_in_chunk_center_spans_one_chunk() {
        assert_eq!(pyramid_chunks(BlockPos::new(8, 64, 8)), vec![ChunkPos::new(0, 0)]);
    }

    #[test]
    fn changes_inside_scan_cube_invalidate_tiers() {
        let beacon = BlockPos::new(8, 64, 8);
        let listener = ChunkListener::Bound {
            beacon,
            chunks: pyramid_chunks(beacon),
        };
        assert!(listener.on_block_changed(beacon.offset(4, -4, -4)).tiers);
        assert!(listener.on_block_changed(beacon.offset(0, -1, 0)).tiers);
        assert!(!listener.on_block_changed(beacon.offset(0, -5, 0)).tiers);
        assert!(!listener.on_block_changed(beacon.offset(5, -1, 0)).tiers);
        assert!(!listener.on_block_changed(beacon).tiers);
    }

    #[test]
    fn changes_in_column_above_invalidate_obstruction() {
        let beacon = BlockPos::new(8, 64, 8);
        let listener = ChunkListener::Bound {
            beacon,
            chunks: pyramid_chunks(beacon),
        };
        let above = listener.on_block_changed(beacon.offset(0, 30, 0));
        assert!(above.obstruction);
        assert!(!above.tiers);
        assert!(!listener.on_block_changed(beacon.offset(1, 30, 0)).obstruction);
    }

    #[test]
    fn pyramid_at_coordinate_limit_stays_in_range() {
        let beacon = BlockPos::new(i32::MAX - 1, 64, 8);
        assert_eq!(
            pyramid_chunks(beacon),
            vec![ChunkPos::containing(i32::MAX, 8)]
        );
        let listener = ChunkListener::Bound {
            beacon,
            chunks: pyramid_chunks(beacon),
        };
        assert!(listener.on_block_changed(beacon.offset(1, -2, 0)).tiers);
        assert!(listener.on_block_changed(BlockPos::new(i32::MAX - 5, 63, 8)).tiers);
    }

    #[test]
    fn inert_listener_ignores_everything() {
        let invalidation = ChunkListener::Inert.on_block_changed(BlockPos::new(0, 0, 0));
        assert_eq!(invalidation, Invalidation::default());
    }

    #[test]
    fn unregister_removes_every_chunk_and_goes_inert() {
        let mut registry = ListenerRegistry::default();
        let beacon = BlockPos::new(1, 64, 1);
        let mut listener = registry.register(beacon);
        assert_eq!(registry.listeners_of(ChunkPos::new(-1, -1)), vec![beacon]);

        registry.unregister(&mut listener);

        assert_eq!(listener, ChunkListener::Inert);
        for chunk in pyramid_chunks(beacon) {
            assert!(registry.listeners_of(chunk).is_empty());
        }
    }
}
