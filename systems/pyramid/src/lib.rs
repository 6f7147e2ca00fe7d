#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that measures the pyramid beneath a beacon and the column
//! above it.
//!
//! Scans only read through [`WorldView`]. Blocks inside chunks that are not
//! resident read as absent, which never confirms a layer and never obstructs.
//! The `resolve_*` helpers reuse fresh cached values and otherwise scan,
//! queueing the command that stores the result.

use beacon_core::{
    BeaconSnapshot, BlockPos, Cached, Command, EffectRuleTable, TierCount, WorldView, MAX_TIERS,
};
use tracing::trace;

/// Counts the contiguous pyramid layers beneath `position`.
///
/// Layer `n` is the `(2n+1)²` square centred `n` blocks below the beacon; it
/// counts only when every cell holds a pyramid material and every layer
/// above it counted too.
pub fn scan_tiers<W>(world: &W, rules: &EffectRuleTable, position: BlockPos) -> TierCount
where
    W: WorldView + ?Sized,
{
    let floor = world.bounds().floor();
    let mut confirmed = 0;

    for layer in 1..=MAX_TIERS {
        let radius = i32::from(layer);
        let y = position.y() - radius;
        if y < floor {
            break;
        }
        if !layer_complete(world, rules, position, y, radius) {
            break;
        }
        confirmed = layer;
    }

    trace!(?position, tiers = confirmed, "pyramid scanned");
    TierCount::new(confirmed)
}

fn layer_complete<W: WorldView + ?Sized>(
    world: &W,
    rules: &EffectRuleTable,
    center: BlockPos,
    y: i32,
    radius: i32,
) -> bool {
    for x in center.x() - radius..=center.x() + radius {
        for z in center.z() - radius..=center.z() + radius {
            let cell = BlockPos::new(x, y, z);
            match world.material_at(cell) {
                Some(material) if rules.is_pyramid_material(material) => {}
                _ => return false,
            }
        }
    }
    true
}

/// Reports whether anything opaque sits in the column above `position`.
///
/// A beacon at or above the ceiling has no sky access at all.
pub fn scan_obstruction<W: WorldView + ?Sized>(world: &W, position: BlockPos) -> bool {
    let ceiling = world.bounds().ceiling();
    if position.y() >= ceiling {
        return true;
    }

    let obstructed = (position.y() + 1..ceiling).any(|y| {
        world
            .material_at(BlockPos::new(position.x(), y, position.z()))
            .map_or(false, |material| !world.is_transparent(material))
    });

    trace!(?position, obstructed, "column scanned");
    obstructed
}

/// Returns the beacon's tier count, scanning when the cached value is stale.
///
/// A rescan queues [`Command::RecordTiers`] so the world stores the result.
pub fn resolve_tiers<W: WorldView + ?Sized>(
    world: &W,
    rules: &EffectRuleTable,
    beacon: &BeaconSnapshot,
    out: &mut Vec<Command>,
) -> TierCount {
    match beacon.tiers {
        Cached::Fresh(tiers) => tiers,
        Cached::Stale => {
            let tiers = scan_tiers(world, rules, beacon.position);
            out.push(Command::RecordTiers {
                position: beacon.position,
                tiers,
            });
            tiers
        }
    }
}

/// Returns the beacon's obstruction flag, scanning when the cached value is
/// stale.
///
/// A rescan queues [`Command::RecordObstruction`].
pub fn resolve_obstruction<W: WorldView + ?Sized>(
    world: &W,
    beacon: &BeaconSnapshot,
    out: &mut Vec<Command>,
) -> bool {
    match beacon.obstruction {
        Cached::Fresh(obstructed) => obstructed,
        Cached::Stale => {
            let obstructed = scan_obstruction(world, beacon.position);
            out.push(Command::RecordObstruction {
                position: beacon.position,
                obstructed,
            });
            obstructed
        }
    }
}
