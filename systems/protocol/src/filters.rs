//! Filters the bridge registers for beacon interactions.

use beacon_core::{
    protocol::{self, FUEL_SLOT, VIRTUAL_FUEL_SLOT},
    ActionSource, Command, InventoryTransaction, Message, TransactionData, WindowHolder,
    WindowType, MAX_INTERACTION_DISTANCE_SQUARED,
};
use beacon_system_pyramid::resolve_tiers;

use crate::{FilterContext, RejectReason, Verdict};

/// Shows the beacon UI for container windows that belong to a beacon.
///
/// Registered on outbound container-open messages. Never rejects.
pub fn rewrite_container_open(
    message: &mut Message,
    context: &FilterContext<'_>,
    _out: &mut Vec<Command>,
) -> Verdict {
    if let Message::ContainerOpen(open) = message {
        if let Some(WindowHolder::Beacon(_)) = context.session.window(open.window) {
            open.window_type = WindowType::Beacon;
        }
    }
    Verdict::Accept
}

/// Redirects actions on the virtual fuel slot to the beacon's real slot.
///
/// Only applies while the session's current window belongs to a beacon.
/// Registered on inbound inventory transactions. Never rejects.
pub fn remap_fuel_slot(
    message: &mut Message,
    context: &FilterContext<'_>,
    _out: &mut Vec<Command>,
) -> Verdict {
    let Message::InventoryTransaction(InventoryTransaction {
        transaction: TransactionData::Normal(actions),
    }) = message
    else {
        return Verdict::Accept;
    };
    let Some((window, _)) = context.session.current_beacon_window() else {
        return Verdict::Accept;
    };

    for action in actions.iter_mut().filter(|action| action.slot == VIRTUAL_FUEL_SLOT) {
        action.source = ActionSource::Container;
        action.window = Some(window);
        action.slot = FUEL_SLOT;
    }
    Verdict::Accept
}

/// Validates an effect selection submitted through a block-entity update.
///
/// Checks run in a fixed order: participant, reach, beacon, fuel, payload
/// shape, then the selection itself against the current tier count. A stale
/// tier count is rescanned here. On success the filter queues the scanned
/// tier count (if any) and the selection, which burns one fuel unit.
pub fn validate_effect_selection(
    message: &mut Message,
    context: &FilterContext<'_>,
    out: &mut Vec<Command>,
) -> Verdict {
    let Message::BlockEntityData(data) = message else {
        return Verdict::Accept;
    };
    let position = data.position;

    let Some(participant) = context
        .session
        .participant
        .and_then(|id| context.world.participant(id))
    else {
        return Verdict::Reject(RejectReason::NoParticipant);
    };

    let distance_squared = position.distance_squared(participant.position);
    if distance_squared > MAX_INTERACTION_DISTANCE_SQUARED {
        return Verdict::Reject(RejectReason::OutOfReach { distance_squared });
    }

    let Some(beacon) = context.world.beacon(position) else {
        return Verdict::Reject(RejectReason::NoBeacon { position });
    };
    if !context.rules.is_fuel(beacon.fuel) {
        return Verdict::Reject(RejectReason::NoFuel);
    }

    let selection = match protocol::read_selection(&data.payload) {
        Ok(selection) => selection,
        Err(error) => return Verdict::Reject(error.into()),
    };

    let mut pending = Vec::new();
    let tiers = resolve_tiers(context.world, context.rules, &beacon, &mut pending);
    if let Err(error) = context.rules.check_selection(selection, tiers) {
        return Verdict::Reject(error.into());
    }

    out.extend(pending);
    out.push(Command::SelectEffects {
        position,
        selection,
    });
    Verdict::Accept
}
