//! Massacre sub-engine: army vs unarmed villager group
//!
//! The attacker's damage flows into a fractional accumulator that is
//! converted into whole villager kills. Surviving villagers hit back weakly
//! through the unordered direct-damage rule.

use serde::{Deserialize, Serialize};

use crate::battle::damage::{aggregate_dps, apply_damage_to_army_direct, DamageOutcome};
use crate::battle::hex::HexCoord;
use crate::battle::world::{Army, VillagerGroup, World};
use crate::core::config::CombatConfig;
use crate::core::types::{ArmyId, CombatId, PlayerId, SimTime, VillagerGroupId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MassacreStatus {
    Ongoing,
    AttackerWon,
    VillagersWon,
    /// Attacker or group no longer present, retreating or out of range
    AttackerInvalid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MassacreTick {
    pub villagers_killed: u32,
    pub attacker_losses: DamageOutcome,
    pub status: MassacreStatus,
}

impl MassacreTick {
    fn with_status(status: MassacreStatus) -> Self {
        Self {
            villagers_killed: 0,
            attacker_losses: DamageOutcome::default(),
            status,
        }
    }
}

/// Attacker damage per second against a group, after armour
pub fn massacre_dps(army: &Army, group: &VillagerGroup, world: &World, config: &CombatConfig) -> f64 {
    let research = world.research_for(army.owner);
    let raw = aggregate_dps(&army.composition, &research, config.minimum_unit_dps);
    (raw - group.melee_armor).max(config.massacre_minimum_dps)
}

/// An in-flight massacre
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MassacreEngagement {
    pub id: CombatId,
    pub attacker: ArmyId,
    pub attacker_owner: PlayerId,
    pub target: VillagerGroupId,
    pub target_owner: PlayerId,
    pub coord: HexCoord,
    pub started_at: SimTime,
    pub last_tick_at: SimTime,
    /// Damage not yet converted into a whole kill
    pub accumulated_damage: f64,
    pub villagers_killed: u32,
    pub attacker_initial_units: u32,
    pub villagers_initial: u32,
}

impl MassacreEngagement {
    pub fn new(id: CombatId, army: &Army, group: &VillagerGroup, now: SimTime) -> Self {
        Self {
            id,
            attacker: army.id,
            attacker_owner: army.owner,
            target: group.id,
            target_owner: group.owner,
            coord: group.coord,
            started_at: now,
            last_tick_at: now,
            accumulated_damage: 0.0,
            villagers_killed: 0,
            attacker_initial_units: army.total_units(),
            villagers_initial: group.count,
        }
    }

    /// Advance to `now`, killing villagers and applying their retaliation
    pub fn advance(&mut self, world: &mut World, now: SimTime, config: &CombatConfig) -> MassacreTick {
        let (dps, hp_per_villager) = {
            let (Some(army), Some(group)) = (world.army(self.attacker), world.villager_group(self.target))
            else {
                return MassacreTick::with_status(MassacreStatus::AttackerInvalid);
            };
            if army.is_retreating || !army.coord.within(&group.coord, config.contact_range) {
                return MassacreTick::with_status(MassacreStatus::AttackerInvalid);
            }
            if army.is_empty() {
                return MassacreTick::with_status(MassacreStatus::VillagersWon);
            }
            if group.count == 0 {
                return MassacreTick::with_status(MassacreStatus::AttackerWon);
            }
            (massacre_dps(army, group, world, config), group.hp_per_villager.max(f64::EPSILON))
        };

        let dt = (now - self.last_tick_at).max(0.0);
        self.last_tick_at = now;
        if dt <= 0.0 {
            return MassacreTick::with_status(MassacreStatus::Ongoing);
        }

        self.accumulated_damage += dps * dt;

        let (killed, retaliation, remaining) = match world.villager_group_mut(self.target) {
            Some(group) => {
                let killed = group.count.min((self.accumulated_damage / hp_per_villager).floor() as u32);
                group.count -= killed;
                self.accumulated_damage -= killed as f64 * hp_per_villager;
                if group.count == 0 {
                    self.accumulated_damage = 0.0;
                }
                let retaliation = group.count as f64 * group.attack_per_villager * dt;
                (killed, retaliation, group.count)
            }
            None => (0, 0.0, 0),
        };
        self.villagers_killed += killed;

        let attacker_losses = match world.army_mut(self.attacker) {
            Some(army) if remaining > 0 && retaliation > 0.0 => apply_damage_to_army_direct(army, retaliation),
            _ => DamageOutcome::default(),
        };

        let attacker_empty = world.army(self.attacker).map_or(true, |a| a.is_empty());
        let status = if remaining == 0 {
            MassacreStatus::AttackerWon
        } else if attacker_empty {
            MassacreStatus::VillagersWon
        } else {
            MassacreStatus::Ongoing
        };

        MassacreTick {
            villagers_killed: killed,
            attacker_losses,
            status,
        }
    }
}
