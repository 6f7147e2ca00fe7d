//! Queue of delayed block updates keyed by the tick they fall due.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use beacon_core::BlockPos;

/// Pending delayed updates. A coordinate is queued at most once; asking for a
/// later update while an earlier one is pending keeps the earlier one.
#[derive(Debug, Default)]
pub(crate) struct UpdateQueue {
    by_tick: BTreeMap<u64, BTreeSet<BlockPos>>,
    due_at: HashMap<BlockPos, u64>,
}

impl UpdateQueue {
    /// Queues an update for `position` at tick `due`.
    pub(crate) fn schedule(&mut self, position: BlockPos, due: u64) {
        if let Some(existing) = self.due_at.get(&position).copied() {
            if existing <= due {
                return;
            }
            self.forget(position, existing);
        }
        let _ = self.by_tick.entry(due).or_default().insert(position);
        let _ = self.due_at.insert(position, due);
    }

    /// Removes and returns every update due at or before `tick`, oldest first.
    pub(crate) fn drain_due(&mut self, tick: u64) -> Vec<BlockPos> {
        let later = self.by_tick.split_off(&(tick + 1));
        let due = std::mem::replace(&mut self.by_tick, later);
        let mut positions = Vec::new();
        for (_, batch) in due {
            for position in batch {
                let _ = self.due_at.remove(&position);
                positions.push(position);
            }
        }
        positions
    }

    /// Tick the pending update of `position` falls due, if any.
    pub(crate) fn due_at(&self, position: BlockPos) -> Option<u64> {
        self.due_at.get(&position).copied()
    }

    /// Drops the pending update of `position`, if any.
    pub(crate) fn cancel(&mut self, position: BlockPos) {
        if let Some(due) = self.due_at.remove(&position) {
            self.forget(position, due);
        }
    }

    fn forget(&mut self, position: BlockPos, due: u64) {
        if let Some(batch) = self.by_tick.get_mut(&due) {
            let _ = batch.remove(&position);
            if batch.is_empty() {
                let _ = self.by_tick.remove(&due);
            }
        }
    }
}
