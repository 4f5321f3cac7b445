//! Entity arena and collaborator interfaces
//!
//! Armies, buildings, villager groups and players live in id-keyed maps. The
//! combat core never holds references between entities; everything is looked
//! up by id at the moment it is needed. Maps are ordered so that iteration,
//! and therefore every tick, is deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::battle::building::{BuildingStats, BuildingType};
use crate::battle::hex::HexCoord;
use crate::battle::research::ResearchContext;
use crate::battle::terrain::Terrain;
use crate::battle::unit_type::{UnitCategory, UnitType};
use crate::core::types::{ArmyId, BuildingId, PlayerId, VillagerGroupId};

/// Live unit counts keyed by type, in storage order
pub type Composition = BTreeMap<UnitType, u32>;

/// Sum of all counts in a composition
pub fn composition_total(composition: &Composition) -> u32 {
    composition.values().sum()
}

/// Terrain lookup provided by the map service
pub trait TerrainSource {
    fn terrain_at(&self, coord: HexCoord) -> Terrain;
}

/// Path search provided by the map service
pub trait Pathfinder {
    /// Path from `from` to `to` inclusive of both ends, or `None` if unreachable
    fn find_path(&self, from: HexCoord, to: HexCoord, player: PlayerId) -> Option<Vec<HexCoord>>;
}

/// Everything the combat core needs from the map
pub trait MapServices: TerrainSource + Pathfinder {}

impl<T: TerrainSource + Pathfinder> MapServices for T {}

/// A field army
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Army {
    pub id: ArmyId,
    pub owner: PlayerId,
    pub coord: HexCoord,
    pub home_base: Option<BuildingId>,
    pub composition: Composition,
    pub in_combat: bool,
    pub is_retreating: bool,
    /// Movement path installed by retreat orders (consumed by the movement system)
    pub path: Vec<HexCoord>,
    /// Damage taken that has not yet amounted to a whole unit
    pub wounds: f64,
}

impl Army {
    pub fn new(id: ArmyId, owner: PlayerId, coord: HexCoord) -> Self {
        Self {
            id,
            owner,
            coord,
            home_base: None,
            composition: Composition::new(),
            in_combat: false,
            is_retreating: false,
            path: Vec::new(),
            wounds: 0.0,
        }
    }

    pub fn with_units(mut self, unit: UnitType, count: u32) -> Self {
        self.add_units(unit, count);
        self
    }

    pub fn with_home_base(mut self, building: BuildingId) -> Self {
        self.home_base = Some(building);
        self
    }

    pub fn add_units(&mut self, unit: UnitType, count: u32) {
        if count > 0 {
            *self.composition.entry(unit).or_insert(0) += count;
        }
    }

    /// Remove up to `count` units of a type; returns how many were removed
    pub fn remove_units(&mut self, unit: UnitType, count: u32) -> u32 {
        let Some(live) = self.composition.get_mut(&unit) else {
            return 0;
        };
        let removed = count.min(*live);
        *live -= removed;
        if *live == 0 {
            self.composition.remove(&unit);
        }
        removed
    }

    pub fn count(&self, unit: UnitType) -> u32 {
        self.composition.get(&unit).copied().unwrap_or(0)
    }

    pub fn total_units(&self) -> u32 {
        composition_total(&self.composition)
    }

    pub fn category_count(&self, category: UnitCategory) -> u32 {
        self.composition
            .iter()
            .filter(|(unit, _)| unit.category() == category)
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_units() == 0
    }

    pub fn has_siege(&self) -> bool {
        self.category_count(UnitCategory::Siege) > 0
    }

    pub fn has_ranged_or_siege(&self) -> bool {
        self.composition
            .iter()
            .any(|(unit, count)| *count > 0 && unit.category().is_ranged_or_siege())
    }

    /// Mean pierce armour per live unit
    pub fn mean_pierce_armor(&self) -> f64 {
        let total = self.total_units();
        if total == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .composition
            .iter()
            .map(|(unit, count)| unit.stats().pierce_armor * *count as f64)
            .sum();
        sum / total as f64
    }
}

/// A building on the map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub owner: PlayerId,
    pub building_type: BuildingType,
    pub coord: HexCoord,
    pub health: f64,
    /// Construction finished and not disabled
    pub operational: bool,
}

impl Building {
    pub fn new(id: BuildingId, owner: PlayerId, building_type: BuildingType, coord: HexCoord) -> Self {
        Self {
            id,
            owner,
            building_type,
            coord,
            health: building_type.stats().max_health,
            operational: true,
        }
    }

    pub fn stats(&self) -> &'static BuildingStats {
        self.building_type.stats()
    }

    pub fn is_standing(&self) -> bool {
        self.health > 0.0
    }

    /// Does the building's footprint cover this hex?
    pub fn covers(&self, coord: HexCoord) -> bool {
        self.coord.within(&coord, self.stats().footprint_radius)
    }

    /// Standing, operational home base
    pub fn is_valid_home_base(&self) -> bool {
        self.building_type.is_home_base() && self.operational && self.is_standing()
    }
}

/// A group of unarmed villagers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VillagerGroup {
    pub id: VillagerGroupId,
    pub owner: PlayerId,
    pub coord: HexCoord,
    pub count: u32,
    pub hp_per_villager: f64,
    pub melee_armor: f64,
    /// Melee damage per second dealt by one villager
    pub attack_per_villager: f64,
    pub in_combat: bool,
}

pub const VILLAGER_HIT_POINTS: f64 = 25.0;
pub const VILLAGER_MELEE_ARMOR: f64 = 0.0;
pub const VILLAGER_ATTACK_DPS: f64 = 1.5;

impl VillagerGroup {
    pub fn new(id: VillagerGroupId, owner: PlayerId, coord: HexCoord, count: u32) -> Self {
        Self {
            id,
            owner,
            coord,
            count,
            hp_per_villager: VILLAGER_HIT_POINTS,
            melee_armor: VILLAGER_MELEE_ARMOR,
            attack_per_villager: VILLAGER_ATTACK_DPS,
            in_combat: false,
        }
    }
}

/// A player and the research that affects combat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Players sharing a team are never hostile to each other
    pub team: Option<u32>,
    pub research: ResearchContext,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            team: None,
            research: ResearchContext::default(),
        }
    }
}

/// Arena of all live entities for one match
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    pub armies: BTreeMap<ArmyId, Army>,
    pub buildings: BTreeMap<BuildingId, Building>,
    pub villager_groups: BTreeMap<VillagerGroupId, VillagerGroup>,
    pub players: BTreeMap<PlayerId, Player>,
    next_id: u32,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_player(&mut self, player: Player) -> PlayerId {
        let id = player.id;
        self.players.insert(id, player);
        id
    }

    /// Insert an army built by the caller, assigning it a fresh id
    pub fn spawn_army(&mut self, mut army: Army) -> ArmyId {
        let id = ArmyId(self.allocate_id());
        army.id = id;
        self.armies.insert(id, army);
        id
    }

    pub fn spawn_building(
        &mut self,
        owner: PlayerId,
        building_type: BuildingType,
        coord: HexCoord,
    ) -> BuildingId {
        let id = BuildingId(self.allocate_id());
        self.buildings
            .insert(id, Building::new(id, owner, building_type, coord));
        id
    }

    pub fn spawn_villagers(&mut self, owner: PlayerId, coord: HexCoord, count: u32) -> VillagerGroupId {
        let id = VillagerGroupId(self.allocate_id());
        self.villager_groups
            .insert(id, VillagerGroup::new(id, owner, coord, count));
        id
    }

    pub fn army(&self, id: ArmyId) -> Option<&Army> {
        self.armies.get(&id)
    }

    pub fn army_mut(&mut self, id: ArmyId) -> Option<&mut Army> {
        self.armies.get_mut(&id)
    }

    pub fn remove_army(&mut self, id: ArmyId) -> Option<Army> {
        self.armies.remove(&id)
    }

    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    pub fn building_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.get_mut(&id)
    }

    pub fn remove_building(&mut self, id: BuildingId) -> Option<Building> {
        self.buildings.remove(&id)
    }

    pub fn villager_group(&self, id: VillagerGroupId) -> Option<&VillagerGroup> {
        self.villager_groups.get(&id)
    }

    pub fn villager_group_mut(&mut self, id: VillagerGroupId) -> Option<&mut VillagerGroup> {
        self.villager_groups.get_mut(&id)
    }

    pub fn remove_villager_group(&mut self, id: VillagerGroupId) -> Option<VillagerGroup> {
        self.villager_groups.remove(&id)
    }

    /// Research for a player; players without a record have none
    pub fn research_for(&self, player: PlayerId) -> ResearchContext {
        self.players
            .get(&player)
            .map(|p| p.research)
            .unwrap_or_default()
    }

    pub fn are_hostile(&self, a: PlayerId, b: PlayerId) -> bool {
        if a == b {
            return false;
        }
        let team_a = self.players.get(&a).and_then(|p| p.team);
        let team_b = self.players.get(&b).and_then(|p| p.team);
        !matches!((team_a, team_b), (Some(x), Some(y)) if x == y)
    }

    /// Standing building whose footprint covers `coord`, lowest id first
    pub fn building_at(&self, coord: HexCoord) -> Option<&Building> {
        self.buildings
            .values()
            .find(|b| b.is_standing() && b.covers(coord))
    }

    /// Valid home bases of a player, nearest to `from` first (ties by id)
    pub fn home_bases_by_distance(&self, player: PlayerId, from: HexCoord) -> Vec<&Building> {
        let mut bases: Vec<&Building> = self
            .buildings
            .values()
            .filter(|b| b.owner == player && b.is_valid_home_base())
            .collect();
        bases.sort_by_key(|b| (b.coord.distance(&from), b.id));
        bases
    }
}
