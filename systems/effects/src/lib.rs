#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that re-evaluates beacons when their delayed update falls due
//! and broadcasts the selected effects to nearby participants.

use std::sync::Arc;

use beacon_core::{
    BeaconPhase, BeaconSnapshot, BlockPos, ChunkPos, Command, EffectRuleTable, Event,
    ParticipantSnapshot, TierCount, WorldView, BROADCAST_INTERVAL_TICKS,
};
use beacon_system_pyramid::{resolve_obstruction, resolve_tiers};
use tracing::trace;

/// Periodic driver of every beacon in the world.
#[derive(Debug, Default)]
pub struct EffectScheduler {
    rules: Arc<EffectRuleTable>,
}

impl EffectScheduler {
    /// Creates a scheduler that validates effects against the provided rules.
    #[must_use]
    pub fn new(rules: impl Into<Arc<EffectRuleTable>>) -> Self {
        Self {
            rules: rules.into(),
        }
    }

    /// Rule table currently in use.
    #[must_use]
    pub fn rules(&self) -> &Arc<EffectRuleTable> {
        &self.rules
    }

    /// Swaps the rule table wholesale.
    ///
    /// Cached tier counts were scanned under the previous table, so the
    /// caller must also flag every beacon for layer recalculation.
    pub fn replace_rules(&mut self, rules: Arc<EffectRuleTable>) {
        self.rules = rules;
    }

    /// Reacts to delayed updates delivered by the world.
    ///
    /// For every due beacon the stale derived values are rescanned first.
    /// Obstructed beacons, beacons without a pyramid and beacons without a
    /// selection go quiet until something schedules them again.
    pub fn handle(&mut self, events: &[Event], world: &impl WorldView, out: &mut Vec<Command>) {
        for event in events {
            let Event::ScheduledUpdateDue { position } = event else {
                continue;
            };
            let Some(beacon) = world.beacon(*position) else {
                continue;
            };
            self.update_beacon(world, &beacon, out);
        }
    }

    fn update_beacon(&self, world: &impl WorldView, beacon: &BeaconSnapshot, out: &mut Vec<Command>) {
        let position = beacon.position;
        let obstructed = resolve_obstruction(world, beacon, out);
        let tiers = resolve_tiers(world, &self.rules, beacon, out);

        if obstructed || tiers == TierCount::ZERO || beacon.phase() == BeaconPhase::Idle {
            trace!(?position, obstructed, tiers = tiers.get(), "beacon idle");
            return;
        }

        let effects = self.rules.valid_effects(beacon.selection, tiers);
        if effects.is_empty() {
            trace!(?position, tiers = tiers.get(), "no effect unlocked");
            return;
        }

        let participants = participants_in_range(world, position, tiers);
        trace!(
            ?position,
            effects = effects.len(),
            participants = participants.len(),
            "effects broadcast"
        );
        for participant in &participants {
            for effect in &effects {
                out.push(Command::ApplyEffect {
                    participant: participant.id,
                    effect: *effect,
                });
            }
        }

        out.push(Command::ScheduleUpdate {
            position,
            delay: BROADCAST_INTERVAL_TICKS,
        });
    }
}

/// Participants inside the broadcast box of a beacon with `tiers` layers.
///
/// The box spans `range` blocks horizontally on each side and vertically from
/// `range` below the beacon up to `range` above the world ceiling. Only the
/// chunks intersecting it are consulted; bounds are inclusive on every axis.
#[must_use]
pub fn participants_in_range(
    world: &impl WorldView,
    position: BlockPos,
    tiers: TierCount,
) -> Vec<ParticipantSnapshot> {
    let range = tiers.range();
    let min_x = position.x().saturating_sub(range);
    let max_x = position.x().saturating_add(range);
    let min_z = position.z().saturating_sub(range);
    let max_z = position.z().saturating_add(range);
    let min_y = f64::from(position.y().saturating_sub(range));
    let max_y = f64::from(world.bounds().ceiling().saturating_add(range));

    let within = |value: f64, min: i32, max: i32| value >= f64::from(min) && value <= f64::from(max);

    ChunkPos::covering(min_x, max_x, min_z, max_z)
        .filter(|chunk| world.is_chunk_loaded(*chunk))
        .flat_map(|chunk| world.participants_in_chunk(chunk))
        .filter(|participant| {
            let at = participant.position;
            within(at.x(), min_x, max_x)
                && within(at.z(), min_z, max_z)
                && at.y() >= min_y
                && at.y() <= max_y
        })
        .collect()
}
