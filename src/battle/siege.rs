//! Siege sub-engine: army vs building
//!
//! Sieges progress in discrete phase ticks gated by a fixed interval rather
//! than continuously. Each phase tick applies the attacker's aggregated
//! damage, boosted when the army brings siege engines.

use serde::{Deserialize, Serialize};

use crate::battle::building::BuildingType;
use crate::battle::damage::aggregate_dps;
use crate::battle::hex::HexCoord;
use crate::battle::history::BuildingDamageReport;
use crate::battle::research::ResearchContext;
use crate::battle::world::{Army, Building, World};
use crate::core::config::CombatConfig;
use crate::core::types::{ArmyId, BuildingId, CombatId, PlayerId, SimTime};

/// Float slack when comparing accumulated phase timestamps
const PHASE_EPSILON: f64 = 1e-9;

/// Damage of one siege phase tick by `army` against any building
pub fn siege_phase_damage(army: &Army, research: &ResearchContext, config: &CombatConfig) -> f64 {
    let base = aggregate_dps(&army.composition, research, config.minimum_unit_dps)
        * config.siege_phase_interval;
    if army.has_siege() {
        (base + config.siege_bonus_vs_buildings) * config.siege_multiplier
    } else {
        base
    }
}

/// Is the army close enough to strike the building?
pub fn in_siege_reach(army: &Army, building: &Building, config: &CombatConfig) -> bool {
    army.coord
        .within(&building.coord, config.siege_reach + building.stats().footprint_radius)
}

/// One phase tick's hit on the building
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SiegeHit {
    pub damage: f64,
    pub health_remaining: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SiegeStatus {
    Ongoing,
    Destroyed(BuildingDamageReport),
    /// Attacker gone, emptied, retreating or out of reach
    AttackerInvalid,
    /// Building removed by something other than this siege
    TargetLost,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiegeTick {
    pub hits: Vec<SiegeHit>,
    pub status: SiegeStatus,
}

/// An in-flight siege
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingEngagement {
    pub id: CombatId,
    pub attacker: ArmyId,
    pub attacker_owner: PlayerId,
    pub target: BuildingId,
    pub defender_owner: PlayerId,
    pub coord: HexCoord,
    pub started_at: SimTime,
    pub last_phase_at: SimTime,
    pub phase_ticks: u32,
    pub total_damage: f64,
    pub building_type: BuildingType,
    pub starting_health: f64,
    pub attacker_initial_units: u32,
}

impl BuildingEngagement {
    pub fn new(id: CombatId, army: &Army, building: &Building, now: SimTime) -> Self {
        Self {
            id,
            attacker: army.id,
            attacker_owner: army.owner,
            target: building.id,
            defender_owner: building.owner,
            coord: building.coord,
            started_at: now,
            last_phase_at: now,
            phase_ticks: 0,
            total_damage: 0.0,
            building_type: building.building_type,
            starting_health: building.health,
            attacker_initial_units: army.total_units(),
        }
    }

    fn attacker_valid(&self, world: &World, building: &Building, config: &CombatConfig) -> bool {
        match world.army(self.attacker) {
            Some(army) => {
                !army.is_empty() && !army.is_retreating && in_siege_reach(army, building, config)
            }
            None => false,
        }
    }

    pub fn damage_report(&self, health_after: f64, destroyed: bool) -> BuildingDamageReport {
        BuildingDamageReport {
            building_id: self.target,
            building_type: self.building_type,
            health_before: self.starting_health,
            health_after,
            total_damage: self.total_damage,
            phase_ticks: self.phase_ticks,
            destroyed,
        }
    }

    /// Run every phase tick due by `now`, reducing the building's health
    pub fn advance(&mut self, world: &mut World, now: SimTime, config: &CombatConfig) -> SiegeTick {
        let mut hits = Vec::new();

        let Some(building) = world.building(self.target).filter(|b| b.is_standing()) else {
            return SiegeTick {
                hits,
                status: SiegeStatus::TargetLost,
            };
        };
        if !self.attacker_valid(world, building, config) {
            return SiegeTick {
                hits,
                status: SiegeStatus::AttackerInvalid,
            };
        }

        let research = world.research_for(self.attacker_owner);
        let damage = match world.army(self.attacker) {
            Some(army) => siege_phase_damage(army, &research, config),
            None => 0.0,
        };

        let Some(building) = world.building_mut(self.target) else {
            return SiegeTick {
                hits,
                status: SiegeStatus::TargetLost,
            };
        };

        while now - self.last_phase_at >= config.siege_phase_interval - PHASE_EPSILON {
            self.last_phase_at += config.siege_phase_interval;
            self.phase_ticks += 1;

            let applied = damage.min(building.health).max(0.0);
            building.health = (building.health - damage).max(0.0);
            self.total_damage += applied;
            hits.push(SiegeHit {
                damage: applied,
                health_remaining: building.health,
            });

            tracing::debug!(
                "Siege {} phase {}: {:.1} damage, {:.1} health left",
                self.id,
                self.phase_ticks,
                applied,
                building.health
            );

            if building.health <= 0.0 {
                let report = self.damage_report(0.0, true);
                return SiegeTick {
                    hits,
                    status: SiegeStatus::Destroyed(report),
                };
            }
        }

        SiegeTick {
            hits,
            status: SiegeStatus::Ongoing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::unit_type::UnitType;

    fn setup(units: &[(UnitType, u32)]) -> (World, BuildingEngagement) {
        let mut world = World::new();
        let tower = world.spawn_building(PlayerId(2), BuildingType::WatchTower, HexCoord::new(3, 3));
        let mut army = Army::new(ArmyId(0), PlayerId(1), HexCoord::new(3, 4));
        for (unit, count) in units {
            army.add_units(*unit, *count);
        }
        let army_id = world.spawn_army(army);
        let engagement = match (world.army(army_id), world.building(tower)) {
            (Some(a), Some(b)) => BuildingEngagement::new(CombatId(1), a, b, 0.0),
            _ => panic!("setup failed"),
        };
        (world, engagement)
    }

    #[test]
    fn test_siege_bonus_applies_with_siege_units() {
        let config = CombatConfig::default();
        let treb = Army::new(ArmyId(1), PlayerId(1), HexCoord::new(0, 0)).with_units(UnitType::Trebuchet, 1);
        // (80/8 + 25) * 1.5
        assert!((siege_phase_damage(&treb, &ResearchContext::none(), &config) - 52.5).abs() < 1e-9);

        let swords = Army::new(ArmyId(2), PlayerId(1), HexCoord::new(0, 0)).with_units(UnitType::Swordsman, 3);
        assert!((siege_phase_damage(&swords, &ResearchContext::none(), &config) - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_phase_ticks_gated_by_interval() {
        let config = CombatConfig::default();
        let (mut world, mut siege) = setup(&[(UnitType::Trebuchet, 1)]);

        let tick = siege.advance(&mut world, 0.5, &config);
        assert!(tick.hits.is_empty());

        let tick = siege.advance(&mut world, 2.0, &config);
        assert_eq!(tick.hits.len(), 2);
        assert_eq!(siege.phase_ticks, 2);
        assert_eq!(tick.status, SiegeStatus::Ongoing);
    }

    #[test]
    fn test_destroyed_after_ceil_ticks() {
        let config = CombatConfig::default();
        let (mut world, mut siege) = setup(&[(UnitType::Trebuchet, 1)]);

        let mut status = SiegeStatus::Ongoing;
        let mut t = 0.0;
        while status == SiegeStatus::Ongoing && t < 100.0 {
            t += 1.0;
            status = siege.advance(&mut world, t, &config).status;
        }

        let expected = (1000.0_f64 / 52.5).ceil() as u32;
        assert_eq!(siege.phase_ticks, expected);
        match status {
            SiegeStatus::Destroyed(report) => {
                assert!(report.destroyed);
                assert_eq!(report.health_after, 0.0);
                assert!((report.total_damage - 1000.0).abs() < 1e-9);
            }
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn test_out_of_reach_attacker_invalid() {
        let config = CombatConfig::default();
        let (mut world, mut siege) = setup(&[(UnitType::Trebuchet, 1)]);
        if let Some(army) = world.army_mut(siege.attacker) {
            army.coord = HexCoord::new(10, 10);
        }
        let tick = siege.advance(&mut world, 1.0, &config);
        assert_eq!(tick.status, SiegeStatus::AttackerInvalid);
    }

    #[test]
    fn test_missing_building_is_target_lost() {
        let config = CombatConfig::default();
        let (mut world, mut siege) = setup(&[(UnitType::Trebuchet, 1)]);
        world.remove_building(siege.target);
        assert_eq!(siege.advance(&mut world, 1.0, &config).status, SiegeStatus::TargetLost);
    }
}
