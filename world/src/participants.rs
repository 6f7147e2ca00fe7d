//! Participants and the effects currently active on them.

use std::collections::BTreeMap;

use beacon_core::{EffectId, EffectInstance, ParticipantId, ParticipantSnapshot, Position};

/// A participant tracked by the world.
#[derive(Clone, Debug)]
pub(crate) struct Participant {
    id: ParticipantId,
    position: Position,
    effects: BTreeMap<EffectId, EffectInstance>,
}

impl Participant {
    pub(crate) fn new(id: ParticipantId, position: Position) -> Self {
        Self {
            id,
            position,
            effects: BTreeMap::new(),
        }
    }

    pub(crate) fn position(&self) -> Position {
        self.position
    }

    pub(crate) fn move_to(&mut self, position: Position) {
        self.position = position;
    }

    /// Applies an effect unless a stronger or longer instance is active.
    ///
    /// A weaker amplifier never replaces a stronger one; at equal amplifier
    /// the longer remaining duration wins. Returns whether the effect was
    /// stored.
    pub(crate) fn add_effect(&mut self, effect: EffectInstance) -> bool {
        if let Some(active) = self.effects.get(&effect.effect()) {
            if active.amplifier() > effect.amplifier() {
                return false;
            }
            if active.amplifier() == effect.amplifier() && active.duration() > effect.duration()
            {
                return false;
            }
        }
        let _ = self.effects.insert(effect.effect(), effect);
        true
    }

    /// Counts every active effect down by one tick and drops expired ones.
    pub(crate) fn decay_effects(&mut self) {
        self.effects.retain(|_, effect| {
            *effect = effect.with_duration(effect.duration().saturating_sub(1));
            effect.duration() > 0
        });
    }

    pub(crate) fn effects(&self) -> impl Iterator<Item = EffectInstance> + '_ {
        self.effects.values().copied()
    }

    pub(crate) fn snapshot(&self) -> ParticipantSnapshot {
        ParticipantSnapshot {
            id: self.id,
            position: self.position,
        }
    }
}
