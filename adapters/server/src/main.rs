#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless server adapter that runs a beacon scenario on the reference world.

mod simulation;

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use beacon_core::{
    effect, item, material, protocol, ActionSource, BlockEntityData, BlockPos, ChunkPos, Command,
    EffectRuleTable, Event, InventoryAction, InventoryTransaction, ItemStack, Message,
    ParticipantId, Position, RuleTableConfig, SelectedEffects, Tag, TransactionData, WindowId,
    MAX_TIERS,
};
use beacon_world::query;
use clap::Parser;
use tracing::info;

use simulation::Simulation;

const DEMO_BEACON: BlockPos = BlockPos::new(8, 64, 8);

/// Command-line options of the beacon server.
#[derive(Debug, Parser)]
#[command(name = "beacon-server", version, about = "Runs a beacon on an in-memory world")]
struct Args {
    /// JSON rule table to load instead of the built-in one.
    #[arg(long)]
    rules: Option<PathBuf>,
    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 400)]
    ticks: u64,
    /// Pyramid layers built beneath the demo beacon.
    #[arg(long, default_value_t = MAX_TIERS, value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_TIERS)))]
    tiers: u8,
    /// Print the active rule table as JSON and exit.
    #[arg(long)]
    print_rules: bool,
}

/// Entry point for the beacon server.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let rules = args.rules.as_deref().map(load_rules).transpose()?;

    if args.print_rules {
        let config = rules.unwrap_or_default().to_config();
        let document = serde_json::to_string_pretty(&config).context("encode rule table")?;
        println!("{document}");
        return Ok(());
    }

    run_demo(rules, args.tiers, args.ticks)
}

fn load_rules(path: &Path) -> Result<EffectRuleTable> {
    let document = fs::read_to_string(path)
        .with_context(|| format!("read rule table {}", path.display()))?;
    let config = RuleTableConfig::from_json(&document)
        .with_context(|| format!("parse rule table {}", path.display()))?;
    let rules = EffectRuleTable::from_config(config)
        .with_context(|| format!("validate rule table {}", path.display()))?;
    info!(path = %path.display(), "rule table loaded");
    Ok(rules)
}

fn run_demo(rules: Option<EffectRuleTable>, tiers: u8, ticks: u64) -> Result<()> {
    let mut simulation = Simulation::new();
    if let Some(rules) = rules {
        simulation.replace_rules(rules);
    }

    for x in -1..=1 {
        for z in -1..=1 {
            let _ = simulation.apply(Command::LoadChunk {
                chunk: ChunkPos::new(x, z),
            });
        }
    }
    let _ = simulation.apply(Command::PlaceBeacon {
        position: DEMO_BEACON,
    });
    for layer in 1..=i32::from(tiers) {
        for x in -layer..=layer {
            for z in -layer..=layer {
                let _ = simulation.apply(Command::SetBlock {
                    position: DEMO_BEACON.offset(x, -layer, z),
                    material: material::IRON_BLOCK,
                });
            }
        }
    }

    let session = simulation.connect(ParticipantId::new(1), Position::new(11.5, 64.0, 6.5));
    let opened = simulation.open_beacon(session, DEMO_BEACON)?;
    info!(?opened, "beacon window opened");

    let fuel = Message::InventoryTransaction(InventoryTransaction {
        transaction: TransactionData::Normal(vec![InventoryAction {
            source: ActionSource::Container,
            window: Some(WindowId::new(0)),
            slot: protocol::VIRTUAL_FUEL_SLOT,
            old_item: None,
            new_item: ItemStack::new(item::IRON_INGOT, 1),
        }]),
    });
    let verdict = simulation.receive(session, fuel)?;
    info!(?verdict, "fuel inserted");

    let selection = if tiers == MAX_TIERS {
        SelectedEffects::new(Some(effect::REGENERATION), Some(effect::REGENERATION))
    } else {
        SelectedEffects::new(Some(effect::SPEED), None)
    };
    let request = Message::BlockEntityData(BlockEntityData {
        position: DEMO_BEACON,
        payload: protocol::write_selection(Tag::compound(), selection),
    });
    let verdict = simulation.receive(session, request)?;
    info!(?verdict, ?selection, "effects requested");

    let mut applied = 0_usize;
    for _ in 0..ticks {
        applied += simulation
            .step()
            .iter()
            .filter(|event| matches!(event, Event::EffectApplied { .. }))
            .count();
    }
    info!(ticks, applied, "simulation finished");

    let record = query::beacon_record(simulation.world(), DEMO_BEACON)
        .context("demo beacon disappeared")?;
    info!(record = %record.to_json()?, "beacon persisted");
    Ok(())
}
