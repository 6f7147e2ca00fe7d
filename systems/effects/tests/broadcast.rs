use beacon_core::{
    effect, item, material, BlockPos, ChunkPos, Command, EffectInstance, EffectRuleTable, Event,
    ItemStack, ParticipantId, Position, SelectedEffects, StructureRecord, TierCount,
    BROADCAST_INTERVAL_TICKS,
};
use beacon_system_effects::{participants_in_range, EffectScheduler};
use beacon_world::{self as world, query, World};

const BEACON: BlockPos = BlockPos::new(8, 64, 8);
const NEAR: ParticipantId = ParticipantId::new(1);
const FAR: ParticipantId = ParticipantId::new(2);

struct Harness {
    world: World,
    scheduler: EffectScheduler,
    broadcasts: Vec<Command>,
}

impl Harness {
    fn new() -> Self {
        let mut harness = Self {
            world: World::new(),
            scheduler: EffectScheduler::new(EffectRuleTable::vanilla()),
            broadcasts: Vec::new(),
        };
        for x in -2..=2 {
            for z in -2..=2 {
                harness.apply(Command::LoadChunk {
                    chunk: ChunkPos::new(x, z),
                });
            }
        }
        harness
    }

    fn apply(&mut self, command: Command) -> Vec<Event> {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        events
    }

    fn build_pyramid(&mut self, layers: i32) {
        for layer in 1..=layers {
            for x in -layer..=layer {
                for z in -layer..=layer {
                    let _ = self.apply(Command::SetBlock {
                        position: BEACON.offset(x, -layer, z),
                        material: material::DIAMOND_BLOCK,
                    });
                }
            }
        }
    }

    fn spawn(&mut self, participant: ParticipantId, position: Position) {
        let _ = self.apply(Command::SpawnParticipant {
            participant,
            position,
        });
    }

    fn select(&mut self, selection: SelectedEffects) {
        let _ = self.apply(Command::SetFuel {
            position: BEACON,
            fuel: ItemStack::new(item::IRON_INGOT, 1),
        });
        let _ = self.apply(Command::SelectEffects {
            position: BEACON,
            selection,
        });
    }

    /// Advances one tick and returns the commands the scheduler produced.
    fn tick(&mut self) -> Vec<Command> {
        let events = self.apply(Command::Tick);
        let mut commands = Vec::new();
        self.scheduler.handle(&events, &self.world, &mut commands);
        for command in commands.clone() {
            let _ = self.apply(command);
        }
        self.broadcasts.extend(
            commands
                .iter()
                .filter(|command| matches!(command, Command::ApplyEffect { .. }))
                .cloned(),
        );
        commands
    }

    fn run_ticks(&mut self, ticks: u64) {
        for _ in 0..ticks {
            let _ = self.tick();
        }
    }
}

fn applied_to(commands: &[Command], target: ParticipantId) -> Vec<EffectInstance> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::ApplyEffect {
                participant,
                effect,
            } if *participant == target => Some(*effect),
            _ => None,
        })
        .collect()
}

#[test]
fn single_tier_broadcasts_primary_within_range() {
    let mut harness = Harness::new();
    let _ = harness.apply(Command::PlaceBeacon { position: BEACON });
    harness.build_pyramid(1);
    harness.spawn(NEAR, Position::new(28.0, 70.0, 8.0));
    harness.spawn(FAR, Position::new(28.5, 70.0, 8.0));
    harness.select(SelectedEffects::new(Some(effect::SPEED), None));

    let commands = harness.tick();

    let expected = EffectInstance::new(effect::SPEED, 0, TierCount::new(1).effect_duration());
    assert_eq!(applied_to(&commands, NEAR), vec![expected]);
    assert!(applied_to(&commands, FAR).is_empty());
    assert_eq!(
        query::participant_effects(&harness.world, NEAR),
        vec![expected]
    );
    assert_eq!(
        query::pending_update(&harness.world, BEACON),
        Some(1 + BROADCAST_INTERVAL_TICKS)
    );
}

#[test]
fn broadcast_repeats_every_interval() {
    let mut harness = Harness::new();
    let _ = harness.apply(Command::PlaceBeacon { position: BEACON });
    harness.build_pyramid(2);
    harness.spawn(NEAR, Position::new(10.0, 64.0, 10.0));
    harness.select(SelectedEffects::new(Some(effect::RESISTANCE), None));

    harness.run_ticks(1 + 2 * BROADCAST_INTERVAL_TICKS);

    assert_eq!(applied_to(&harness.broadcasts, NEAR).len(), 3);
}

#[test]
fn no_pyramid_means_no_broadcast_and_no_rearm() {
    let mut harness = Harness::new();
    let _ = harness.apply(Command::PlaceBeacon { position: BEACON });
    harness.spawn(NEAR, Position::new(8.0, 64.0, 8.0));
    harness.select(SelectedEffects::new(Some(effect::SPEED), None));

    let commands = harness.tick();

    assert!(applied_to(&commands, NEAR).is_empty());
    assert!(commands.contains(&Command::RecordTiers {
        position: BEACON,
        tiers: TierCount::ZERO,
    }));
    assert_eq!(query::pending_update(&harness.world, BEACON), None);
}

#[test]
fn obstruction_pauses_broadcast_until_cleared() {
    let mut harness = Harness::new();
    let roof = BEACON.offset(0, 5, 0);
    let _ = harness.apply(Command::PlaceBeacon { position: BEACON });
    harness.build_pyramid(1);
    let _ = harness.apply(Command::SetBlock {
        position: roof,
        material: material::STONE,
    });
    harness.spawn(NEAR, Position::new(8.0, 64.0, 8.0));
    harness.select(SelectedEffects::new(Some(effect::HASTE), None));

    harness.run_ticks(2 * BROADCAST_INTERVAL_TICKS);
    assert!(harness.broadcasts.is_empty());
    assert_eq!(query::pending_update(&harness.world, BEACON), None);

    let _ = harness.apply(Command::SetBlock {
        position: roof,
        material: material::AIR,
    });
    let commands = harness.tick();

    assert_eq!(
        applied_to(&commands, NEAR),
        vec![EffectInstance::new(effect::HASTE, 0, 220)]
    );
}

#[test]
fn secondary_waits_for_complete_pyramid() {
    let mut harness = Harness::new();
    let _ = harness.apply(Command::PlaceBeacon { position: BEACON });
    harness.build_pyramid(3);
    harness.spawn(NEAR, Position::new(8.0, 64.0, 8.0));
    let selection = SelectedEffects::new(Some(effect::SPEED), Some(effect::SPEED));
    harness.select(selection);

    let commands = harness.tick();
    assert_eq!(
        applied_to(&commands, NEAR),
        vec![EffectInstance::new(effect::SPEED, 0, 300)]
    );

    harness.build_pyramid(4);
    let commands = harness.tick();
    assert_eq!(
        applied_to(&commands, NEAR),
        vec![EffectInstance::new(effect::SPEED, 1, 340)]
    );
}

#[test]
fn restored_beacon_behaves_like_the_saved_one() {
    let mut original = Harness::new();
    let _ = original.apply(Command::PlaceBeacon { position: BEACON });
    original.build_pyramid(3);
    original.spawn(NEAR, Position::new(12.0, 60.0, 3.0));
    original.select(SelectedEffects::new(Some(effect::SPEED), None));
    let first = original.tick();

    let record = query::beacon_record(&original.world, BEACON).expect("beacon saved");
    assert_eq!(record.layers, Some(3));
    assert_eq!(record.covers, Some(0));
    let document = record.to_json().expect("record encodes");

    let mut restored = Harness::new();
    restored.build_pyramid(3);
    restored.spawn(NEAR, Position::new(12.0, 60.0, 3.0));
    let _ = restored.apply(Command::RestoreBeacon {
        position: BEACON,
        record: StructureRecord::from_json(&document).expect("record decodes"),
    });
    let snapshot = query::beacon(&restored.world, BEACON).expect("beacon restored");
    assert_eq!(snapshot.tiers.fresh(), Some(TierCount::new(3)));
    assert_eq!(snapshot.obstruction.fresh(), Some(false));

    let second = restored.tick();
    assert_eq!(applied_to(&first, NEAR), applied_to(&second, NEAR));
    assert!(!second
        .iter()
        .any(|command| matches!(command, Command::RecordTiers { .. })));
}

#[test]
fn broadcast_box_reaches_above_the_ceiling_but_not_far_below() {
    let mut harness = Harness::new();
    let _ = harness.apply(Command::PlaceBeacon { position: BEACON });
    harness.spawn(NEAR, Position::new(8.0, 270.0, 8.0));
    harness.spawn(FAR, Position::new(8.0, 43.0, 8.0));

    let found = participants_in_range(&harness.world, BEACON, TierCount::new(1));
    let ids: Vec<_> = found.iter().map(|participant| participant.id).collect();
    assert_eq!(ids, vec![NEAR]);
}

#[test]
fn many_edits_before_a_tick_collapse_into_one_rescan() {
    let mut harness = Harness::new();
    let _ = harness.apply(Command::PlaceBeacon { position: BEACON });
    harness.build_pyramid(2);
    assert_eq!(query::pending_update(&harness.world, BEACON), Some(1));

    let events = harness.apply(Command::Tick);
    let due: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, Event::ScheduledUpdateDue { .. }))
        .collect();
    assert_eq!(due, vec![&Event::ScheduledUpdateDue { position: BEACON }]);

    let mut commands = Vec::new();
    harness
        .scheduler
        .handle(&events, &harness.world, &mut commands);
    let rescans: Vec<_> = commands
        .iter()
        .filter(|command| matches!(command, Command::RecordTiers { .. }))
        .collect();
    assert_eq!(
        rescans,
        vec![&Command::RecordTiers {
            position: BEACON,
            tiers: TierCount::new(2),
        }]
    );
}
