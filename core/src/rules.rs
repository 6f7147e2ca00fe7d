//! Immutable lookup tables that decide what a beacon accepts.
//!
//! The table is built once, then shared with every system that needs it.
//! Replacing the rules means building a new table and handing it to all of
//! them at once.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    effect, item, material, EffectId, EffectInstance, ItemId, ItemStack, MaterialId,
    SelectedEffects, TierCount, MAX_TIERS,
};

/// Minimum number of tiers an effect needs before it may be selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EffectRequirement {
    /// Effect the requirement applies to.
    pub effect: EffectId,
    /// Lowest tier count at which the effect becomes available.
    pub minimum_tier: u8,
}

impl EffectRequirement {
    /// Creates a new requirement.
    #[must_use]
    pub const fn new(effect: EffectId, minimum_tier: u8) -> Self {
        Self {
            effect,
            minimum_tier,
        }
    }
}

/// Serializable description of an [`EffectRuleTable`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTableConfig {
    /// Materials that count towards a pyramid layer.
    pub pyramid_materials: Vec<MaterialId>,
    /// Items accepted as fuel.
    pub fuel_items: Vec<ItemId>,
    /// Effects that may be selected, with their tier requirements.
    pub effects: Vec<EffectRequirement>,
}

impl RuleTableConfig {
    /// Parses a configuration document in JSON form.
    pub fn from_json(document: &str) -> Result<Self, RuleTableError> {
        serde_json::from_str(document).map_err(RuleTableError::Parse)
    }
}

/// Reasons a rule configuration may be refused.
#[derive(Debug, Error)]
pub enum RuleTableError {
    /// The configuration document is not valid JSON for a rule table.
    #[error("malformed rule table: {0}")]
    Parse(#[source] serde_json::Error),
    /// The reserved identifier `0` was listed as an effect.
    #[error("effect id 0 is reserved for \"no effect\"")]
    ReservedEffectId,
    /// An effect requires a tier the pyramid cannot reach.
    #[error("effect {effect} requires tier {minimum_tier}, expected 1..={max}", max = MAX_TIERS)]
    TierOutOfRange {
        /// Raw identifier of the offending effect.
        effect: u32,
        /// Requested minimum tier.
        minimum_tier: u8,
    },
}

/// Reasons an effect selection may be refused for a given tier count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// An effect is unknown or needs more tiers than the pyramid has.
    #[error("effect {} is not available at tier {}", .effect.get(), .tiers.get())]
    Unavailable {
        /// Effect that was refused.
        effect: EffectId,
        /// Tier count the selection was checked against.
        tiers: TierCount,
    },
    /// Both slots are filled with different effects.
    #[error("secondary effect {} differs from primary effect {}", .secondary.get(), .primary.get())]
    Mismatched {
        /// Effect in the primary slot.
        primary: EffectId,
        /// Effect in the secondary slot.
        secondary: EffectId,
    },
}

/// Lookup of pyramid materials, fuel items, and effect tier requirements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectRuleTable {
    pyramid_materials: BTreeSet<MaterialId>,
    fuel_items: BTreeSet<ItemId>,
    effects_by_tier: BTreeMap<u8, BTreeSet<EffectId>>,
}

impl EffectRuleTable {
    /// Builds a table from explicit collections.
    ///
    /// An effect listed more than once keeps its lowest requirement.
    pub fn new(
        pyramid_materials: impl IntoIterator<Item = MaterialId>,
        fuel_items: impl IntoIterator<Item = ItemId>,
        effects: impl IntoIterator<Item = EffectRequirement>,
    ) -> Result<Self, RuleTableError> {
        let mut lowest: BTreeMap<EffectId, u8> = BTreeMap::new();
        for requirement in effects {
            if requirement.effect.get() == 0 {
                return Err(RuleTableError::ReservedEffectId);
            }
            if requirement.minimum_tier == 0 || requirement.minimum_tier > MAX_TIERS {
                return Err(RuleTableError::TierOutOfRange {
                    effect: requirement.effect.get(),
                    minimum_tier: requirement.minimum_tier,
                });
            }
            let entry = lowest
                .entry(requirement.effect)
                .or_insert(requirement.minimum_tier);
            *entry = (*entry).min(requirement.minimum_tier);
        }

        let mut effects_by_tier: BTreeMap<u8, BTreeSet<EffectId>> = BTreeMap::new();
        for (effect, tier) in lowest {
            let _ = effects_by_tier.entry(tier).or_default().insert(effect);
        }

        Ok(Self {
            pyramid_materials: pyramid_materials.into_iter().collect(),
            fuel_items: fuel_items.into_iter().collect(),
            effects_by_tier,
        })
    }

    /// Builds a table from its serializable description.
    pub fn from_config(config: RuleTableConfig) -> Result<Self, RuleTableError> {
        Self::new(config.pyramid_materials, config.fuel_items, config.effects)
    }

    /// Default rules: storage blocks build pyramids, their raw items are fuel.
    #[must_use]
    pub fn vanilla() -> Self {
        let mut effects_by_tier: BTreeMap<u8, BTreeSet<EffectId>> = BTreeMap::new();
        for requirement in VANILLA_EFFECTS {
            let _ = effects_by_tier
                .entry(requirement.minimum_tier)
                .or_default()
                .insert(requirement.effect);
        }

        Self {
            pyramid_materials: [
                material::COAL_BLOCK,
                material::DIAMOND_BLOCK,
                material::EMERALD_BLOCK,
                material::GOLD_BLOCK,
                material::IRON_BLOCK,
            ]
            .into_iter()
            .collect(),
            fuel_items: [
                item::COAL,
                item::DIAMOND,
                item::EMERALD,
                item::GOLD_INGOT,
                item::IRON_INGOT,
            ]
            .into_iter()
            .collect(),
            effects_by_tier,
        }
    }

    /// Serializable description of the table.
    #[must_use]
    pub fn to_config(&self) -> RuleTableConfig {
        RuleTableConfig {
            pyramid_materials: self.pyramid_materials.iter().copied().collect(),
            fuel_items: self.fuel_items.iter().copied().collect(),
            effects: self
                .effects_by_tier
                .iter()
                .flat_map(|(tier, effects)| {
                    effects
                        .iter()
                        .map(move |effect| EffectRequirement::new(*effect, *tier))
                })
                .collect(),
        }
    }

    /// Reports whether the material counts towards a pyramid layer.
    #[must_use]
    pub fn is_pyramid_material(&self, material: MaterialId) -> bool {
        self.pyramid_materials.contains(&material)
    }

    /// Reports whether the item may be burnt to arm a selection.
    #[must_use]
    pub fn is_fuel_item(&self, item: ItemId) -> bool {
        self.fuel_items.contains(&item)
    }

    /// Reports whether the stack holds valid fuel.
    #[must_use]
    pub fn is_fuel(&self, stack: Option<ItemStack>) -> bool {
        stack.is_some_and(|stack| self.is_fuel_item(stack.item()))
    }

    /// Lowest tier count at which the effect may be selected.
    #[must_use]
    pub fn minimum_tier_for(&self, effect: EffectId) -> Option<TierCount> {
        self.effects_by_tier
            .iter()
            .find(|(_, effects)| effects.contains(&effect))
            .map(|(tier, _)| TierCount::new(*tier))
    }

    /// Reports whether the effect may be selected on a pyramid of `tiers`.
    ///
    /// Buckets are visited in ascending tier order, so the scan stops at the
    /// first bucket the pyramid cannot reach.
    #[must_use]
    pub fn is_effect_valid(&self, effect: EffectId, tiers: TierCount) -> bool {
        for (required, effects) in &self.effects_by_tier {
            if tiers.get() < *required {
                break;
            }
            if effects.contains(&effect) {
                return true;
            }
        }
        false
    }

    /// Checks a client-submitted selection against the current tier count.
    pub fn check_selection(
        &self,
        selection: SelectedEffects,
        tiers: TierCount,
    ) -> Result<(), SelectionError> {
        for (_, effect) in selection.slots() {
            if !self.is_effect_valid(effect, tiers) {
                return Err(SelectionError::Unavailable { effect, tiers });
            }
        }

        if let (Some(primary), Some(secondary)) = (selection.primary(), selection.secondary()) {
            if primary != secondary {
                return Err(SelectionError::Mismatched { primary, secondary });
            }
        }

        Ok(())
    }

    /// Effect instances a beacon with this selection broadcasts at `tiers`.
    ///
    /// Slots whose own tier requirement is unmet are skipped, and an effect
    /// present in both slots is emitted once with the higher amplifier.
    #[must_use]
    pub fn valid_effects(
        &self,
        selection: SelectedEffects,
        tiers: TierCount,
    ) -> Vec<EffectInstance> {
        let duration = tiers.effect_duration();
        let mut effects: BTreeMap<EffectId, EffectInstance> = BTreeMap::new();
        for (slot, effect) in selection.slots() {
            if tiers < slot.required_tiers() || !self.is_effect_valid(effect, tiers) {
                continue;
            }
            let instance = EffectInstance::new(effect, slot.amplifier(), duration);
            let replace = effects
                .get(&effect)
                .map_or(true, |existing| instance.amplifier() > existing.amplifier());
            if replace {
                let _ = effects.insert(effect, instance);
            }
        }
        effects.into_values().collect()
    }
}

impl Default for EffectRuleTable {
    fn default() -> Self {
        Self::vanilla()
    }
}

const VANILLA_EFFECTS: [EffectRequirement; 6] = [
    EffectRequirement::new(effect::SPEED, 1),
    EffectRequirement::new(effect::HASTE, 1),
    EffectRequirement::new(effect::RESISTANCE, 2),
    EffectRequirement::new(effect::JUMP_BOOST, 2),
    EffectRequirement::new(effect::STRENGTH, 3),
    EffectRequirement::new(effect::REGENERATION, 4),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vanilla_requirements_match_pyramid_progression() {
        let rules = EffectRuleTable::vanilla();
        assert_eq!(rules.minimum_tier_for(effect::SPEED), Some(TierCount::new(1)));
        assert_eq!(rules.minimum_tier_for(effect::JUMP_BOOST), Some(TierCount::new(2)));
        assert_eq!(rules.minimum_tier_for(effect::STRENGTH), Some(TierCount::new(3)));
        assert_eq!(rules.minimum_tier_for(effect::REGENERATION), Some(TierCount::MAX));
        assert_eq!(rules.minimum_tier_for(EffectId::new(99)), None);
    }

    #[test]
    fn effect_validity_is_monotonic_in_tiers() {
        let rules = EffectRuleTable::vanilla();
        let candidates = [
            effect::SPEED,
            effect::HASTE,
            effect::RESISTANCE,
            effect::JUMP_BOOST,
            effect::STRENGTH,
            effect::REGENERATION,
            EffectId::new(42),
        ];
        for effect in candidates {
            for tiers in 0..=MAX_TIERS {
                if rules.is_effect_valid(effect, TierCount::new(tiers)) {
                    for higher in tiers..=MAX_TIERS {
                        assert!(
                            rules.is_effect_valid(effect, TierCount::new(higher)),
                            "effect {effect:?} valid at {tiers} but not at {higher}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn nothing_is_valid_without_a_pyramid() {
        let rules = EffectRuleTable::vanilla();
        assert!(!rules.is_effect_valid(effect::SPEED, TierCount::ZERO));
    }

    #[test]
    fn membership_checks_use_configured_sets() {
        let rules = EffectRuleTable::vanilla();
        assert!(rules.is_pyramid_material(material::IRON_BLOCK));
        assert!(!rules.is_pyramid_material(material::STONE));
        assert!(rules.is_fuel_item(item::EMERALD));
        assert!(!rules.is_fuel_item(item::STICK));
        assert!(!rules.is_fuel(None));
        assert!(!rules.is_fuel(ItemStack::new(item::STICK, 3)));
        assert!(rules.is_fuel(ItemStack::new(item::COAL, 1)));
    }

    #[test]
    fn mismatched_pair_is_refused() {
        let rules = EffectRuleTable::vanilla();
        let selection = SelectedEffects::new(Some(effect::SPEED), Some(effect::HASTE));
        assert_eq!(
            rules.check_selection(selection, TierCount::MAX),
            Err(SelectionError::Mismatched {
                primary: effect::SPEED,
                secondary: effect::HASTE,
            })
        );
    }

    #[test]
    fn duplicated_pair_is_accepted() {
        let rules = EffectRuleTable::vanilla();
        let selection = SelectedEffects::new(Some(effect::SPEED), Some(effect::SPEED));
        assert_eq!(rules.check_selection(selection, TierCount::MAX), Ok(()));
    }

    #[test]
    fn locked_primary_is_refused() {
        let rules = EffectRuleTable::vanilla();
        let selection = SelectedEffects::new(Some(effect::STRENGTH), None);
        assert_eq!(
            rules.check_selection(selection, TierCount::new(2)),
            Err(SelectionError::Unavailable {
                effect: effect::STRENGTH,
                tiers: TierCount::new(2),
            })
        );
    }

    #[test]
    fn valid_effects_empty_without_pyramid() {
        let rules = EffectRuleTable::vanilla();
        let selection = SelectedEffects::new(Some(effect::SPEED), Some(effect::SPEED));
        assert!(rules.valid_effects(selection, TierCount::ZERO).is_empty());
    }

    #[test]
    fn valid_effects_keep_higher_amplifier_for_duplicates() {
        let rules = EffectRuleTable::vanilla();
        let selection = SelectedEffects::new(Some(effect::SPEED), Some(effect::SPEED));
        let effects = rules.valid_effects(selection, TierCount::MAX);
        assert_eq!(
            effects,
            vec![EffectInstance::new(
                effect::SPEED,
                1,
                TierCount::MAX.effect_duration()
            )]
        );
    }

    #[test]
    fn secondary_slot_waits_for_complete_pyramid() {
        let rules = EffectRuleTable::vanilla();
        let selection = SelectedEffects::new(Some(effect::SPEED), Some(effect::SPEED));
        let effects = rules.valid_effects(selection, TierCount::new(3));
        assert_eq!(
            effects,
            vec![EffectInstance::new(effect::SPEED, 0, TierCount::new(3).effect_duration())]
        );
    }

    #[test]
    fn config_rejects_unreachable_tier() {
        let config = RuleTableConfig {
            pyramid_materials: vec![material::IRON_BLOCK],
            fuel_items: vec![item::COAL],
            effects: vec![EffectRequirement::new(effect::SPEED, 5)],
        };
        assert!(matches!(
            EffectRuleTable::from_config(config),
            Err(RuleTableError::TierOutOfRange {
                minimum_tier: 5,
                ..
            })
        ));
    }

    #[test]
    fn config_rejects_reserved_effect() {
        let config = RuleTableConfig {
            effects: vec![EffectRequirement::new(EffectId::new(0), 1)],
            ..RuleTableConfig::default()
        };
        assert!(matches!(
            EffectRuleTable::from_config(config),
            Err(RuleTableError::ReservedEffectId)
        ));
    }

    #[test]
    fn config_round_trips_through_json() {
        let rules = EffectRuleTable::vanilla();
        let document = serde_json::to_string(&rules.to_config()).expect("serialize");
        let parsed = RuleTableConfig::from_json(&document).expect("parse");
        let rebuilt = EffectRuleTable::from_config(parsed).expect("valid");
        assert_eq!(rebuilt, rules);
    }

    #[test]
    fn duplicate_requirements_keep_lowest_tier() {
        let rules = EffectRuleTable::new(
            [material::GOLD_BLOCK],
            [item::GOLD_INGOT],
            [
                EffectRequirement::new(effect::SPEED, 3),
                EffectRequirement::new(effect::SPEED, 2),
            ],
        )
        .expect("valid");
        assert_eq!(rules.minimum_tier_for(effect::SPEED), Some(TierCount::new(2)));
    }
}
