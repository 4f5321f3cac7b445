//! Garrison defense: buildings firing on nearby hostile armies
//!
//! A building fires when a friendly army with ranged or siege units stands on
//! its footprint. Each building picks one target per tick. Volleys from every
//! building aimed at the same army are summed before armour is subtracted,
//! so armour counts once per volley rather than once per building.
//!
//! Markers only remember which targets are under fire so that one history
//! record is written per engagement instead of one per tick.

use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::battle::damage::DamageOutcome;
use crate::battle::hex::HexCoord;
use crate::battle::history::UnitTypeReport;
use crate::battle::side::Side;
use crate::battle::unit_type::DamageKind;
use crate::battle::world::{Army, Building, Composition, World};
use crate::core::types::{ArmyId, BuildingId, PlayerId, SimTime};

/// Float slack when counting elapsed volley intervals
const VOLLEY_EPSILON: f64 = 1e-9;

/// One building's planned shot for this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GarrisonVolley {
    pub building: BuildingId,
    pub owner: PlayerId,
    pub target: ArmyId,
    /// Raw damage of one volley, before the target's armour
    pub damage: f64,
}

/// All volleys aimed at one target, combined
#[derive(Debug, Clone, PartialEq)]
pub struct GarrisonHit {
    pub target: ArmyId,
    pub owner: PlayerId,
    pub buildings: Vec<BuildingId>,
    pub raw_damage: f64,
    pub armor: f64,
}

impl GarrisonHit {
    /// Damage of one combined volley after armour
    pub fn damage_per_volley(&self) -> f64 {
        (self.raw_damage - self.armor).max(0.0)
    }
}

/// Ongoing engagement of one target army by garrisoned buildings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GarrisonMarker {
    pub target: ArmyId,
    pub target_owner: PlayerId,
    /// Owner of the first building that opened fire
    pub owner: PlayerId,
    /// Where the target stood when fire opened
    pub coord: HexCoord,
    pub started_at: SimTime,
    pub initial_units: u32,
    pub initial_composition: Composition,
    /// Units this garrison fire has killed so far
    pub casualties: Composition,
    pub buildings: BTreeSet<BuildingId>,
}

impl GarrisonMarker {
    pub fn new(target: &Army, owner: PlayerId, buildings: &[BuildingId], now: SimTime) -> Self {
        Self {
            target: target.id,
            target_owner: target.owner,
            owner,
            coord: target.coord,
            started_at: now,
            initial_units: target.total_units(),
            initial_composition: target.composition.clone(),
            casualties: Composition::new(),
            buildings: buildings.iter().copied().collect(),
        }
    }

    pub fn record_losses(&mut self, outcome: &DamageOutcome) {
        for (unit, count) in &outcome.casualties {
            *self.casualties.entry(*unit).or_insert(0) += count;
        }
    }

    /// Target still alive and within range of a building that can fire on it
    ///
    /// A building that switched to a nearer enemy keeps the marker alive.
    pub fn in_reach(&self, world: &World) -> bool {
        let Some(army) = world.army(self.target).filter(|a| !a.is_empty()) else {
            return false;
        };
        self.buildings
            .iter()
            .filter_map(|id| world.building(*id))
            .any(|building| {
                building.operational
                    && building.is_standing()
                    && world.are_hostile(building.owner, army.owner)
                    && building
                        .stats()
                        .defense_range
                        .is_some_and(|range| army.coord.within(&building.coord, range))
                    && !garrison_composition(world, building).is_empty()
            })
    }

    /// Per-type report for the target army; `remaining` is what it still holds
    pub fn unit_reports(&self, remaining: &Composition) -> Vec<UnitTypeReport> {
        self.initial_composition
            .iter()
            .map(|(unit, initial)| {
                let killed = self.casualties.get(unit).copied().unwrap_or(0);
                UnitTypeReport {
                    side: Side::Attacker,
                    unit_type: *unit,
                    initial: *initial,
                    remaining: remaining.get(unit).copied().unwrap_or(0),
                    killed,
                    damage_dealt: 0.0,
                    damage_received: killed as f64 * unit.hit_points(),
                }
            })
            .collect()
    }
}

/// Volley clock plus the set of targets currently under fire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GarrisonState {
    pub markers: BTreeMap<ArmyId, GarrisonMarker>,
    pub last_volley_at: Option<SimTime>,
}

impl GarrisonState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of volleys due at `now`; the first call fires immediately
    pub fn due_volleys(&mut self, now: SimTime, interval: f64) -> u32 {
        match self.last_volley_at {
            None => {
                self.last_volley_at = Some(now);
                1
            }
            Some(last) => {
                let due = ((now - last) / interval + VOLLEY_EPSILON).floor().max(0.0) as u32;
                if due > 0 {
                    self.last_volley_at = Some(last + due as f64 * interval);
                }
                due
            }
        }
    }

    pub fn is_engaged(&self, target: ArmyId) -> bool {
        self.markers.contains_key(&target)
    }
}

/// Units able to fire from the building, pooled across co-located friendly armies
pub fn garrison_composition(world: &World, building: &Building) -> Composition {
    let mut composition = Composition::new();
    for army in world.armies.values() {
        if army.is_empty()
            || !building.covers(army.coord)
            || world.are_hostile(building.owner, army.owner)
            || !army.has_ranged_or_siege()
        {
            continue;
        }
        for (unit, count) in &army.composition {
            if unit.can_garrison_fire() {
                *composition.entry(*unit).or_insert(0) += count;
            }
        }
    }
    composition
}

/// Raw damage of one volley from a garrison
pub fn volley_damage(composition: &Composition, pierce_multiplier: f64) -> f64 {
    composition
        .iter()
        .map(|(unit, count)| {
            let stats = unit.stats();
            let per_unit = match stats.damage_kind {
                DamageKind::Pierce => stats.garrison_volley * pierce_multiplier,
                _ => stats.garrison_volley,
            };
            per_unit * *count as f64
        })
        .sum()
}

/// Nearest eligible hostile army in range, lowest id on ties
fn pick_target<'a>(
    world: &'a World,
    building: &Building,
    range: u32,
    sieging: &BTreeMap<ArmyId, BuildingId>,
) -> Option<&'a Army> {
    world
        .armies
        .values()
        .filter(|army| !army.is_empty() && world.are_hostile(building.owner, army.owner))
        .filter(|army| army.coord.within(&building.coord, range))
        .filter(|army| match sieging.get(&army.id) {
            // Already assaulting another defensive building: leave it to that one
            Some(target) if *target != building.id => !world
                .building(*target)
                .is_some_and(|b| b.building_type.provides_garrison_defense()),
            _ => true,
        })
        .min_by_key(|army| (army.coord.distance(&building.coord), army.id))
}

/// One volley per qualifying building, in building id order
pub fn plan_volleys(world: &World, sieging: &BTreeMap<ArmyId, BuildingId>) -> Vec<GarrisonVolley> {
    let mut volleys = Vec::new();
    for building in world.buildings.values() {
        let Some(range) = building.stats().defense_range else {
            continue;
        };
        if !building.operational || !building.is_standing() {
            continue;
        }
        let composition = garrison_composition(world, building);
        if composition.is_empty() {
            continue;
        }
        let Some(target) = pick_target(world, building, range, sieging) else {
            continue;
        };
        let research = world.research_for(building.owner);
        let damage = volley_damage(&composition, research.garrison_pierce_multiplier);
        if damage <= 0.0 {
            continue;
        }
        volleys.push(GarrisonVolley {
            building: building.id,
            owner: building.owner,
            target: target.id,
            damage,
        });
    }
    volleys
}

/// Combine volleys per target; armour is looked up once per target
pub fn aggregate_volleys(world: &World, volleys: &[GarrisonVolley]) -> Vec<GarrisonHit> {
    let mut by_target: AHashMap<ArmyId, GarrisonHit> = AHashMap::new();
    for volley in volleys {
        let hit = by_target.entry(volley.target).or_insert_with(|| GarrisonHit {
            target: volley.target,
            owner: volley.owner,
            buildings: Vec::new(),
            raw_damage: 0.0,
            armor: world
                .army(volley.target)
                .map_or(0.0, |army| army.mean_pierce_armor()),
        });
        hit.raw_damage += volley.damage;
        hit.buildings.push(volley.building);
    }

    let mut hits: Vec<GarrisonHit> = by_target.into_values().collect();
    hits.sort_by_key(|hit| hit.target);
    hits
}
