use beacon_core::{material, BlockPos, ChunkPos, Command, EffectRuleTable, Event, TierCount};
use beacon_system_pyramid::{resolve_tiers, scan_obstruction, scan_tiers};
use beacon_world::{self as world, query, World};

const BEACON: BlockPos = BlockPos::new(8, 64, 8);

fn run(world: &mut World, commands: Vec<Command>) -> Vec<Event> {
    let mut events = Vec::new();
    for command in commands {
        world::apply(world, command, &mut events);
    }
    events
}

fn pyramid_commands(center: BlockPos, layers: i32) -> Vec<Command> {
    let mut commands = Vec::new();
    for layer in 1..=layers {
        for x in -layer..=layer {
            for z in -layer..=layer {
                commands.push(Command::SetBlock {
                    position: center.offset(x, -layer, z),
                    material: material::GOLD_BLOCK,
                });
            }
        }
    }
    commands
}

fn world_with_pyramid(layers: i32) -> World {
    let mut world = World::new();
    let mut commands = vec![
        Command::LoadChunk {
            chunk: ChunkPos::new(0, 0),
        },
        Command::PlaceBeacon { position: BEACON },
    ];
    commands.extend(pyramid_commands(BEACON, layers));
    let _ = run(&mut world, commands);
    world
}

#[test]
fn scans_the_resident_world() {
    let world = world_with_pyramid(3);
    let rules = EffectRuleTable::vanilla();
    assert_eq!(scan_tiers(&world, &rules, BEACON), TierCount::new(3));
    assert!(!scan_obstruction(&world, BEACON));
}

#[test]
fn rescan_after_mutation_observes_the_change() {
    let mut world = world_with_pyramid(4);
    let rules = EffectRuleTable::vanilla();

    let mut commands = Vec::new();
    let beacon = query::beacon(&world, BEACON).expect("beacon placed");
    assert_eq!(
        resolve_tiers(&world, &rules, &beacon, &mut commands),
        TierCount::MAX
    );
    let _ = run(&mut world, commands);

    let events = run(
        &mut world,
        vec![Command::SetBlock {
            position: BEACON.offset(2, -3, -1),
            material: material::AIR,
        }],
    );
    assert!(events.contains(&Event::TiersInvalidated { position: BEACON }));

    let mut commands = Vec::new();
    let beacon = query::beacon(&world, BEACON).expect("beacon placed");
    assert_eq!(
        resolve_tiers(&world, &rules, &beacon, &mut commands),
        TierCount::new(2)
    );
}

#[test]
fn stone_above_the_beacon_obstructs_until_removed() {
    let mut world = world_with_pyramid(1);
    let roof = BEACON.offset(0, 10, 0);

    let _ = run(
        &mut world,
        vec![Command::SetBlock {
            position: roof,
            material: material::STONE,
        }],
    );
    assert!(scan_obstruction(&world, BEACON));

    let _ = run(
        &mut world,
        vec![Command::SetBlock {
            position: roof,
            material: material::AIR,
        }],
    );
    assert!(!scan_obstruction(&world, BEACON));
}
