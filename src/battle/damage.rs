//! Damage model
//!
//! Pure functions: damage rates per unit category, composition-weighted bonus
//! damage, terrain/research/charge modifiers, and the two damage distribution
//! rules. Nothing here touches engagement state.
//!
//! Per unit type:
//!
//! ```text
//! dps = count * max(minimum, (base + research + weighted_bonus) / attack_interval)
//! weighted_bonus = sum over enemy categories of (enemy ratio * bonus vs category)
//! ```
//!
//! and the side total is scaled by `1 - penalty + bonus * (1 + tactics_scaling)`.

use crate::battle::research::ResearchContext;
use crate::battle::side::SideCombatState;
use crate::battle::unit_type::{UnitCategory, UnitType};
use crate::battle::world::{Army, Composition};

/// Modifiers applied to one side's damage output
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DamageModifiers {
    pub terrain_penalty: f64,
    pub terrain_bonus: f64,
    pub research: ResearchContext,
    pub minimum_unit_dps: f64,
}

impl DamageModifiers {
    pub fn new(research: ResearchContext, minimum_unit_dps: f64) -> Self {
        Self {
            terrain_penalty: 0.0,
            terrain_bonus: 0.0,
            research,
            minimum_unit_dps,
        }
    }

    pub fn with_terrain(mut self, penalty: f64, bonus: f64) -> Self {
        self.terrain_penalty = penalty;
        self.terrain_bonus = bonus;
        self
    }

    /// Multiplier from terrain, never negative
    pub fn terrain_scale(&self) -> f64 {
        (1.0 - self.terrain_penalty + self.terrain_bonus * (1.0 + self.research.tactics_scaling))
            .max(0.0)
    }
}

/// Charge multipliers while the charge window is open
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Charge {
    pub cavalry: f64,
    pub infantry: f64,
}

impl Charge {
    fn multiplier(&self, category: UnitCategory) -> f64 {
        match category {
            UnitCategory::Cavalry => self.cavalry,
            UnitCategory::Infantry => self.infantry,
            _ => 1.0,
        }
    }
}

/// Bonus damage per attack of `unit` against the enemy's current mix
pub fn weighted_bonus(unit: UnitType, enemy: &SideCombatState) -> f64 {
    let bonus = &unit.stats().bonus_vs;
    UnitCategory::ALL
        .iter()
        .map(|category| enemy.category_ratio(*category) * bonus.against(*category))
        .sum()
}

/// Damage per second of a single unit of `unit` (before count and terrain)
pub fn unit_dps(unit: UnitType, enemy: &SideCombatState, mods: &DamageModifiers) -> f64 {
    let stats = unit.stats();
    let per_attack =
        stats.base_damage + mods.research.attack_bonus(stats.damage_kind) + weighted_bonus(unit, enemy);
    (per_attack / stats.attack_interval).max(mods.minimum_unit_dps)
}

/// DPS contribution of every matching unit type on `side`, in storage order
pub fn dps_breakdown(
    side: &SideCombatState,
    enemy: &SideCombatState,
    include: impl Fn(UnitCategory) -> bool,
    charge: Option<Charge>,
    mods: &DamageModifiers,
) -> Vec<(UnitType, f64)> {
    let scale = mods.terrain_scale();
    side.live
        .iter()
        .filter(|(unit, count)| **count > 0 && include(unit.category()))
        .map(|(unit, count)| {
            let charge_mult = charge.map_or(1.0, |c| c.multiplier(unit.category()));
            let dps = unit_dps(*unit, enemy, mods) * *count as f64 * charge_mult * scale;
            (*unit, dps)
        })
        .collect()
}

/// DPS of ranged and siege units only
pub fn ranged_dps(side: &SideCombatState, enemy: &SideCombatState, mods: &DamageModifiers) -> f64 {
    dps_breakdown(side, enemy, |c| c.is_ranged_or_siege(), None, mods)
        .iter()
        .map(|(_, dps)| dps)
        .sum()
}

/// DPS of infantry and cavalry, with charge multipliers when `charge` is set
pub fn melee_dps(
    side: &SideCombatState,
    enemy: &SideCombatState,
    charge: Option<Charge>,
    mods: &DamageModifiers,
) -> f64 {
    dps_breakdown(side, enemy, |c| c.is_melee(), charge, mods)
        .iter()
        .map(|(_, dps)| dps)
        .sum()
}

/// DPS of every unit on the side
pub fn total_dps(side: &SideCombatState, enemy: &SideCombatState, mods: &DamageModifiers) -> f64 {
    dps_breakdown(side, enemy, |_| true, None, mods)
        .iter()
        .map(|(_, dps)| dps)
        .sum()
}

/// Flat DPS of a composition with no enemy-mix bonus (used against buildings and villagers)
pub fn aggregate_dps(composition: &Composition, research: &ResearchContext, minimum_unit_dps: f64) -> f64 {
    composition
        .iter()
        .filter(|(_, count)| **count > 0)
        .map(|(unit, count)| {
            let stats = unit.stats();
            let per_attack = stats.base_damage + research.attack_bonus(stats.damage_kind);
            (per_attack / stats.attack_interval).max(minimum_unit_dps) * *count as f64
        })
        .sum()
}

/// Casualties produced by one damage application
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DamageOutcome {
    pub casualties: Vec<(UnitType, u32)>,
    /// Hit points removed as whole units
    pub hp_removed: f64,
}

impl DamageOutcome {
    pub fn total_killed(&self) -> u32 {
        self.casualties.iter().map(|(_, n)| n).sum()
    }
}

/// Apply damage to a side in strict category priority (siege, ranged, infantry, cavalry)
///
/// A category's whole hit-point pool is exhausted before the next category
/// takes any damage. The priority is applied regardless of which phase or
/// unit category dealt the damage. Only whole units die; the remainder stays
/// in `pending_damage` for the next application.
pub fn apply_damage_to_side(side: &mut SideCombatState, damage: f64) -> DamageOutcome {
    let mut outcome = DamageOutcome::default();
    side.pending_damage += damage.max(0.0);

    'categories: for category in UnitCategory::CASUALTY_PRIORITY {
        let units: Vec<(UnitType, u32)> = side
            .live
            .iter()
            .filter(|(unit, count)| **count > 0 && unit.category() == category)
            .map(|(unit, count)| (*unit, *count))
            .collect();

        for (unit, count) in units {
            let hp = unit.hit_points();
            let pool = hp * count as f64;
            let kills = if side.pending_damage >= pool {
                count
            } else {
                (side.pending_damage / hp).floor() as u32
            };

            if kills > 0 {
                let killed = side.kill(unit, kills);
                let removed = killed as f64 * hp;
                side.pending_damage = (side.pending_damage - removed).max(0.0);
                outcome.hp_removed += removed;
                outcome.casualties.push((unit, killed));
            }

            if kills < count {
                // Not enough left to finish this type: later types are untouched
                break 'categories;
            }
        }
    }

    if side.is_empty() {
        side.pending_damage = 0.0;
    }
    outcome
}

/// Apply damage to an army in storage order, without category priority
///
/// Each type loses `min(live, floor(remaining / hp))` units until the damage
/// is spent. Sub-unit remainders accumulate in `army.wounds`.
pub fn apply_damage_to_army_direct(army: &mut Army, damage: f64) -> DamageOutcome {
    let mut outcome = DamageOutcome::default();
    army.wounds += damage.max(0.0);

    let units: Vec<(UnitType, u32)> = army.composition.iter().map(|(u, c)| (*u, *c)).collect();
    for (unit, count) in units {
        if army.wounds <= 0.0 {
            break;
        }
        let hp = unit.hit_points();
        let kills = count.min((army.wounds / hp).floor() as u32);
        if kills == 0 {
            continue;
        }
        let killed = army.remove_units(unit, kills);
        let removed = killed as f64 * hp;
        army.wounds = (army.wounds - removed).max(0.0);
        outcome.hp_removed += removed;
        outcome.casualties.push((unit, killed));
    }

    if army.is_empty() {
        army.wounds = 0.0;
    }
    outcome
}
