//! Combat orchestrator
//!
//! `CombatSystem` owns every in-flight engagement and the combat history for
//! one match. It is constructed explicitly by the caller; nothing here is
//! global, so independent matches can run side by side.
//!
//! Each `tick` runs, in this fixed order:
//! 1. army-vs-army engagements
//! 2. sieges
//! 3. massacres
//! 4. garrison defense
//!
//! and returns the events it produced in the order they happened.

use std::collections::{BTreeMap, BTreeSet};

use crate::battle::damage::{apply_damage_to_army_direct, DamageOutcome};
use crate::battle::engagement::{can_engage, find_contacts, ActiveCombat, CombatPhase};
use crate::battle::events::CombatEvent;
use crate::battle::garrison::{aggregate_volleys, plan_volleys, GarrisonMarker, GarrisonState};
use crate::battle::history::{
    CombatHistory, CombatKind, CombatOutcome, CombatRecord, DetailedCombatRecord, Participant,
    ParticipantSummary, UnitTypeReport,
};
use crate::battle::massacre::{MassacreEngagement, MassacreStatus};
use crate::battle::retreat::{auto_retreat, evacuate_footprint};
use crate::battle::side::{Side, SideCombatState};
use crate::battle::siege::{in_siege_reach, BuildingEngagement, SiegeStatus};
use crate::battle::world::{composition_total, Composition, MapServices, Pathfinder, World};
use crate::core::config::CombatConfig;
use crate::core::error::{CombatError, Result};
use crate::core::types::{ArmyId, BuildingId, CombatId, SimTime, VillagerGroupId};

/// Building strength reported in history records
fn health_strength(health: f64) -> u32 {
    health.max(0.0).ceil() as u32
}

/// Combat orchestrator for one match
#[derive(Debug, Clone)]
pub struct CombatSystem {
    config: CombatConfig,
    combats: BTreeMap<CombatId, ActiveCombat>,
    sieges: BTreeMap<CombatId, BuildingEngagement>,
    massacres: BTreeMap<CombatId, MassacreEngagement>,
    garrison: GarrisonState,
    history: CombatHistory,
    next_combat_id: u64,
    /// Events produced by commands between ticks
    pending_events: Vec<CombatEvent>,
}

impl CombatSystem {
    pub fn new(config: CombatConfig) -> Self {
        let history = CombatHistory::new(config.history_capacity);
        Self {
            config,
            combats: BTreeMap::new(),
            sieges: BTreeMap::new(),
            massacres: BTreeMap::new(),
            garrison: GarrisonState::new(),
            history,
            next_combat_id: 0,
            pending_events: Vec::new(),
        }
    }

    fn allocate_id(&mut self) -> CombatId {
        self.next_combat_id += 1;
        CombatId(self.next_combat_id)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn history(&self) -> &CombatHistory {
        &self.history
    }

    pub fn combat(&self, id: CombatId) -> Option<&ActiveCombat> {
        self.combats.get(&id)
    }

    pub fn active_combats(&self) -> impl Iterator<Item = &ActiveCombat> {
        self.combats.values()
    }

    pub fn sieges(&self) -> impl Iterator<Item = &BuildingEngagement> {
        self.sieges.values()
    }

    pub fn massacres(&self) -> impl Iterator<Item = &MassacreEngagement> {
        self.massacres.values()
    }

    pub fn garrison(&self) -> &GarrisonState {
        &self.garrison
    }

    /// Number of in-flight engagements of every kind
    pub fn active_count(&self) -> usize {
        self.combats.len() + self.sieges.len() + self.massacres.len()
    }

    /// Does the army take part in any engagement it started or joined?
    pub fn is_engaged(&self, army: ArmyId) -> bool {
        self.combats.values().any(|c| c.involves(army))
            || self.sieges.values().any(|s| s.attacker == army)
            || self.massacres.values().any(|m| m.attacker == army)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Start an army-vs-army engagement; terrain is taken from under the defender
    pub fn start_army_combat<M: MapServices + ?Sized>(
        &mut self,
        world: &mut World,
        map: &M,
        attacker: ArmyId,
        defender: ArmyId,
        now: SimTime,
    ) -> Result<CombatId> {
        let att = world.army(attacker).ok_or(CombatError::ArmyNotFound(attacker))?;
        let def = world.army(defender).ok_or(CombatError::ArmyNotFound(defender))?;

        if !world.are_hostile(att.owner, def.owner) {
            return Err(CombatError::NotHostile(format!(
                "armies {:?} and {:?} are not hostile",
                attacker, defender
            )));
        }
        for army in [att, def] {
            if army.is_empty() {
                return Err(CombatError::EmptyArmy(army.id));
            }
            if army.in_combat || army.is_retreating {
                return Err(CombatError::AlreadyEngaged(army.id));
            }
        }
        if !att.coord.within(&def.coord, self.config.contact_range) {
            return Err(CombatError::OutOfRange(format!(
                "army {:?} at {} cannot reach army {:?} at {}",
                attacker, att.coord, defender, def.coord
            )));
        }

        let coord = def.coord;
        let terrain = map.terrain_at(coord);
        let mut attacker_side = SideCombatState::new(att.owner);
        attacker_side.add_army(attacker, &att.composition);
        let mut defender_side = SideCombatState::new(def.owner);
        defender_side.add_army(defender, &def.composition);

        let id = self.allocate_id();
        self.combats.insert(
            id,
            ActiveCombat::new(id, attacker_side, defender_side, coord, terrain, now),
        );
        for army in [attacker, defender] {
            if let Some(army) = world.army_mut(army) {
                army.in_combat = true;
            }
        }

        tracing::info!(
            "{} started at {}: army {:?} attacks army {:?} on {:?}",
            id,
            coord,
            attacker,
            defender,
            terrain
        );
        self.pending_events.push(CombatEvent::CombatStarted {
            combat_id: id,
            kind: CombatKind::ArmyVsArmy,
            coord,
            time: now,
        });
        Ok(id)
    }

    /// Add a reinforcing army to one side of an in-flight engagement
    pub fn join_combat(
        &mut self,
        world: &mut World,
        combat_id: CombatId,
        army_id: ArmyId,
        side: Side,
    ) -> Result<()> {
        let combat = self
            .combats
            .get(&combat_id)
            .ok_or(CombatError::CombatNotFound(combat_id))?;
        let army = world.army(army_id).ok_or(CombatError::ArmyNotFound(army_id))?;

        if army.is_empty() {
            return Err(CombatError::EmptyArmy(army_id));
        }
        if !can_engage(army) || combat.involves(army_id) {
            return Err(CombatError::AlreadyEngaged(army_id));
        }
        let friend = combat.side(side).owner;
        let foe = combat.side(side.opponent()).owner;
        if world.are_hostile(army.owner, friend) || !world.are_hostile(army.owner, foe) {
            return Err(CombatError::NotHostile(format!(
                "army {:?} cannot fight on the {:?} side of {}",
                army_id, side, combat_id
            )));
        }
        if !army.coord.within(&combat.coord, self.config.contact_range) {
            return Err(CombatError::OutOfRange(format!(
                "army {:?} at {} is not at {} ({})",
                army_id, army.coord, combat_id, combat.coord
            )));
        }

        let composition = army.composition.clone();
        if let Some(combat) = self.combats.get_mut(&combat_id) {
            combat.side_mut(side).add_army(army_id, &composition);
        }
        if let Some(army) = world.army_mut(army_id) {
            army.in_combat = true;
        }

        tracing::info!("Army {:?} joins {} as {:?}", army_id, combat_id, side);
        self.pending_events.push(CombatEvent::ArmyJoinedCombat {
            combat_id,
            army_id,
            side,
        });
        Ok(())
    }

    /// Start a siege of a hostile building
    pub fn start_siege(
        &mut self,
        world: &mut World,
        army: ArmyId,
        building: BuildingId,
        now: SimTime,
    ) -> Result<CombatId> {
        let mut events = Vec::new();
        let id = self.begin_siege(world, army, building, now, &mut events)?;
        self.pending_events.extend(events);
        Ok(id)
    }

    fn begin_siege(
        &mut self,
        world: &mut World,
        army_id: ArmyId,
        building_id: BuildingId,
        now: SimTime,
        events: &mut Vec<CombatEvent>,
    ) -> Result<CombatId> {
        let army = world.army(army_id).ok_or(CombatError::ArmyNotFound(army_id))?;
        let building = world
            .building(building_id)
            .filter(|b| b.is_standing())
            .ok_or(CombatError::BuildingNotFound(building_id))?;

        if army.is_empty() {
            return Err(CombatError::EmptyArmy(army_id));
        }
        if !can_engage(army) {
            return Err(CombatError::AlreadyEngaged(army_id));
        }
        if !world.are_hostile(army.owner, building.owner) {
            return Err(CombatError::NotHostile(format!(
                "army {:?} cannot besiege friendly building {:?}",
                army_id, building_id
            )));
        }
        if !in_siege_reach(army, building, &self.config) {
            return Err(CombatError::OutOfRange(format!(
                "army {:?} at {} cannot reach building {:?} at {}",
                army_id, army.coord, building_id, building.coord
            )));
        }

        let id = self.allocate_id();
        let engagement = BuildingEngagement::new(id, army, building, now);
        let coord = engagement.coord;
        tracing::info!(
            "{} started: army {:?} besieges {:?} {:?} ({:.0} hp)",
            id,
            army_id,
            engagement.building_type,
            building_id,
            engagement.starting_health
        );
        self.sieges.insert(id, engagement);
        if let Some(army) = world.army_mut(army_id) {
            army.in_combat = true;
        }

        events.push(CombatEvent::CombatStarted {
            combat_id: id,
            kind: CombatKind::Siege,
            coord,
            time: now,
        });
        Ok(id)
    }

    /// Start a massacre of a hostile villager group
    pub fn start_massacre(
        &mut self,
        world: &mut World,
        army_id: ArmyId,
        group_id: VillagerGroupId,
        now: SimTime,
    ) -> Result<CombatId> {
        let army = world.army(army_id).ok_or(CombatError::ArmyNotFound(army_id))?;
        let group = world
            .villager_group(group_id)
            .ok_or(CombatError::VillagerGroupNotFound(group_id))?;

        if army.is_empty() {
            return Err(CombatError::EmptyArmy(army_id));
        }
        if !can_engage(army) || group.in_combat {
            return Err(CombatError::AlreadyEngaged(army_id));
        }
        if !world.are_hostile(army.owner, group.owner) {
            return Err(CombatError::NotHostile(format!(
                "army {:?} cannot attack friendly villagers {:?}",
                army_id, group_id
            )));
        }
        if group.count == 0 || !army.coord.within(&group.coord, self.config.contact_range) {
            return Err(CombatError::OutOfRange(format!(
                "villager group {:?} is not attackable by army {:?}",
                group_id, army_id
            )));
        }

        let id = self.allocate_id();
        let engagement = MassacreEngagement::new(id, army, group, now);
        let coord = engagement.coord;
        self.massacres.insert(id, engagement);
        if let Some(army) = world.army_mut(army_id) {
            army.in_combat = true;
        }
        if let Some(group) = world.villager_group_mut(group_id) {
            group.in_combat = true;
        }

        tracing::info!("{} started: army {:?} attacks villagers {:?}", id, army_id, group_id);
        self.pending_events.push(CombatEvent::CombatStarted {
            combat_id: id,
            kind: CombatKind::Massacre,
            coord,
            time: now,
        });
        Ok(id)
    }

    /// Pull free armies into nearby fights and start engagements between
    /// hostile armies in contact. Returns the ids of new engagements.
    pub fn engage_contacts<M: MapServices + ?Sized>(
        &mut self,
        world: &mut World,
        map: &M,
        now: SimTime,
    ) -> Vec<CombatId> {
        let range = self.config.contact_range;

        let mut joins: Vec<(CombatId, ArmyId, Side)> = Vec::new();
        for army in world.armies.values().filter(|a| can_engage(a)) {
            let found = self.combats.values().find_map(|combat| {
                if !army.coord.within(&combat.coord, range) {
                    return None;
                }
                let hostile_to_attacker = world.are_hostile(army.owner, combat.attacker.owner);
                let hostile_to_defender = world.are_hostile(army.owner, combat.defender.owner);
                match (hostile_to_attacker, hostile_to_defender) {
                    (false, true) => Some((combat.id, Side::Attacker)),
                    (true, false) => Some((combat.id, Side::Defender)),
                    _ => None,
                }
            });
            if let Some((combat_id, side)) = found {
                joins.push((combat_id, army.id, side));
            }
        }
        for (combat_id, army_id, side) in joins {
            if let Err(err) = self.join_combat(world, combat_id, army_id, side) {
                tracing::debug!("Army {:?} could not join {}: {}", army_id, combat_id, err);
            }
        }

        let mut started = Vec::new();
        for contact in find_contacts(world, range) {
            match self.start_army_combat(world, map, contact.attacker, contact.defender, now) {
                Ok(id) => started.push(id),
                Err(err) => tracing::debug!("Contact not engaged: {}", err),
            }
        }
        started
    }

    /// Drop every engagement the army takes part in, without writing records
    pub fn abort_engagements_for_army(&mut self, world: &mut World, army_id: ArmyId) -> usize {
        let mut aborted = 0;

        let combat_ids: Vec<CombatId> = self
            .combats
            .values()
            .filter(|c| c.involves(army_id))
            .map(|c| c.id)
            .collect();
        for id in combat_ids {
            if let Some(combat) = self.combats.remove(&id) {
                for army in combat.all_armies() {
                    if let Some(army) = world.army_mut(army) {
                        army.in_combat = false;
                    }
                }
                self.pending_events.push(CombatEvent::CombatAborted {
                    combat_id: id,
                    army_id,
                });
                aborted += 1;
            }
        }

        let siege_ids: Vec<CombatId> = self
            .sieges
            .values()
            .filter(|s| s.attacker == army_id)
            .map(|s| s.id)
            .collect();
        for id in siege_ids {
            self.sieges.remove(&id);
            self.pending_events.push(CombatEvent::CombatAborted {
                combat_id: id,
                army_id,
            });
            aborted += 1;
        }

        let massacre_ids: Vec<CombatId> = self
            .massacres
            .values()
            .filter(|m| m.attacker == army_id)
            .map(|m| m.id)
            .collect();
        for id in massacre_ids {
            if let Some(massacre) = self.massacres.remove(&id) {
                if let Some(group) = world.villager_group_mut(massacre.target) {
                    group.in_combat = false;
                }
            }
            self.pending_events.push(CombatEvent::CombatAborted {
                combat_id: id,
                army_id,
            });
            aborted += 1;
        }

        self.garrison.markers.remove(&army_id);
        if let Some(army) = world.army_mut(army_id) {
            army.in_combat = false;
        }

        if aborted > 0 {
            tracing::info!("Army {:?} broke off {} engagement(s)", army_id, aborted);
        }
        aborted
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance every engagement to simulated time `now`
    pub fn tick<M: MapServices + ?Sized>(&mut self, world: &mut World, map: &M, now: SimTime) -> Vec<CombatEvent> {
        let mut events = std::mem::take(&mut self.pending_events);

        self.tick_army_combats(world, map, now, &mut events);
        self.tick_sieges(world, map, now, &mut events);
        self.tick_massacres(world, now, &mut events);
        self.tick_garrisons(world, now, &mut events);

        events
    }

    fn tick_army_combats<M: MapServices + ?Sized>(
        &mut self,
        world: &mut World,
        map: &M,
        now: SimTime,
        events: &mut Vec<CombatEvent>,
    ) {
        let ids: Vec<CombatId> = self.combats.keys().copied().collect();
        for id in ids {
            let Some(mut combat) = self.combats.remove(&id) else {
                continue;
            };

            reconcile_side(world, &mut combat.attacker);
            reconcile_side(world, &mut combat.defender);

            let attacker_research = world.research_for(combat.attacker.owner);
            let defender_research = world.research_for(combat.defender.owner);
            let tick = combat.advance(now, &self.config, attacker_research, defender_research);

            if let Some((from, to)) = tick.phase_change {
                tracing::debug!("{} phase {:?} -> {:?}", id, from, to);
                events.push(CombatEvent::PhaseChanged {
                    combat_id: id,
                    from,
                    to,
                });
            }
            if tick.attacker_damage > 0.0 {
                events.push(CombatEvent::DamageDealt {
                    combat_id: id,
                    by: Side::Attacker,
                    amount: tick.attacker_damage,
                });
            }
            if tick.defender_damage > 0.0 {
                events.push(CombatEvent::DamageDealt {
                    combat_id: id,
                    by: Side::Defender,
                    amount: tick.defender_damage,
                });
            }

            write_back_losses(world, &combat.attacker.armies, &tick.attacker_losses, events);
            write_back_losses(world, &combat.defender.armies, &tick.defender_losses, events);

            if combat.should_end(&self.config) {
                self.finish_army_combat(world, map, combat, now, events);
            } else {
                self.combats.insert(id, combat);
            }
        }
    }

    fn finish_army_combat<P: Pathfinder + ?Sized>(
        &mut self,
        world: &mut World,
        map: &P,
        mut combat: ActiveCombat,
        now: SimTime,
        events: &mut Vec<CombatEvent>,
    ) {
        let outcome = combat.determine_outcome(
            &self.config,
            world.research_for(combat.attacker.owner),
            world.research_for(combat.defender.owner),
        );
        let previous = combat.phase;
        combat.finish(outcome);
        events.push(CombatEvent::PhaseChanged {
            combat_id: combat.id,
            from: previous,
            to: CombatPhase::Ended,
        });

        for army in combat.all_armies() {
            if let Some(army) = world.army_mut(army) {
                army.in_combat = false;
            }
        }

        let record = CombatRecord {
            id: combat.id,
            kind: CombatKind::ArmyVsArmy,
            coord: combat.coord,
            started_at: combat.started_at,
            ended_at: now,
            attacker: side_summary(&combat.attacker),
            defender: side_summary(&combat.defender),
            outcome,
        };
        let mut detailed = DetailedCombatRecord::new(combat.id, CombatKind::ArmyVsArmy);
        detailed.terrain = Some(combat.terrain);
        detailed.units = unit_reports(Side::Attacker, &combat.attacker);
        detailed.units.extend(unit_reports(Side::Defender, &combat.defender));
        detailed.phases = combat.phases.clone();
        self.history.push(record, Some(detailed));

        tracing::info!(
            "{} ended after {:.1}s: {:?} ({} vs {} survivors)",
            combat.id,
            combat.elapsed,
            outcome,
            combat.attacker.total_units(),
            combat.defender.total_units()
        );
        events.push(CombatEvent::CombatEnded {
            combat_id: combat.id,
            kind: CombatKind::ArmyVsArmy,
            outcome,
        });

        let losers = match outcome {
            CombatOutcome::AttackerVictory => combat.defender.armies.clone(),
            CombatOutcome::DefenderVictory => combat.attacker.armies.clone(),
            CombatOutcome::Draw => Vec::new(),
        };
        for army in losers {
            if let Some(event) = auto_retreat(world, map, army) {
                events.push(event);
            }
        }

        if outcome == CombatOutcome::AttackerVictory {
            self.auto_escalate(world, &combat, now, events);
        }
    }

    /// After a won field battle, turn on a hostile building at the same spot
    fn auto_escalate(
        &mut self,
        world: &mut World,
        combat: &ActiveCombat,
        now: SimTime,
        events: &mut Vec<CombatEvent>,
    ) {
        let Some(building_id) = world
            .buildings
            .values()
            .filter(|b| b.is_standing() && b.covers(combat.coord))
            .find(|b| world.are_hostile(combat.attacker.owner, b.owner))
            .map(|b| b.id)
        else {
            return;
        };

        let Some(army_id) = combat
            .attacker
            .armies
            .iter()
            .copied()
            .find(|id| world.army(*id).is_some_and(can_engage))
        else {
            return;
        };

        match self.begin_siege(world, army_id, building_id, now, events) {
            Ok(siege_id) => {
                tracing::info!("{} escalates into siege {} of {:?}", combat.id, siege_id, building_id);
                events.push(CombatEvent::AutoEscalated {
                    from_combat: combat.id,
                    siege_id,
                    building_id,
                });
            }
            Err(err) => tracing::debug!("{} did not escalate: {}", combat.id, err),
        }
    }

    fn tick_sieges<P: Pathfinder + ?Sized>(
        &mut self,
        world: &mut World,
        map: &P,
        now: SimTime,
        events: &mut Vec<CombatEvent>,
    ) {
        let ids: Vec<CombatId> = self.sieges.keys().copied().collect();
        for id in ids {
            let Some(mut siege) = self.sieges.remove(&id) else {
                continue;
            };
            let tick = siege.advance(world, now, &self.config);

            for hit in &tick.hits {
                events.push(CombatEvent::BuildingDamaged {
                    combat_id: id,
                    building_id: siege.target,
                    damage: hit.damage,
                    health_remaining: hit.health_remaining,
                });
            }

            let (outcome, final_health, report) = match tick.status {
                SiegeStatus::Ongoing => {
                    self.sieges.insert(id, siege);
                    continue;
                }
                SiegeStatus::Destroyed(report) => {
                    if let Some(building) = world.remove_building(siege.target) {
                        tracing::info!("{:?} {:?} destroyed by {}", building.building_type, building.id, id);
                        events.push(CombatEvent::BuildingDestroyed {
                            combat_id: id,
                            building_id: building.id,
                            building_type: building.building_type,
                            owner: building.owner,
                        });
                        let evacuation = evacuate_footprint(world, map, &building);
                        for event in &evacuation {
                            if let CombatEvent::ArmyRetreating { army_id, .. } = event {
                                self.release_army(world, *army_id, events);
                            }
                        }
                        events.extend(evacuation);
                    }
                    (CombatOutcome::AttackerVictory, 0.0, Some(report))
                }
                SiegeStatus::AttackerInvalid => {
                    tracing::info!("{} ended: attacker {:?} no longer valid", id, siege.attacker);
                    let health = world.building(siege.target).map_or(0.0, |b| b.health);
                    let report = siege.damage_report(health, false);
                    (CombatOutcome::DefenderVictory, health, Some(report))
                }
                SiegeStatus::TargetLost => {
                    tracing::warn!("{} ended: building {:?} vanished", id, siege.target);
                    (CombatOutcome::Draw, 0.0, None)
                }
            };

            if let Some(army) = world.army_mut(siege.attacker) {
                army.in_combat = false;
            }
            let attacker_final = world.army(siege.attacker).map_or(0, |a| a.total_units());

            let record = CombatRecord {
                id,
                kind: CombatKind::Siege,
                coord: siege.coord,
                started_at: siege.started_at,
                ended_at: now,
                attacker: ParticipantSummary {
                    participant: Participant::Armies(vec![siege.attacker]),
                    owner: siege.attacker_owner,
                    initial_strength: siege.attacker_initial_units,
                    final_strength: attacker_final,
                },
                defender: ParticipantSummary {
                    participant: Participant::Building(siege.target),
                    owner: siege.defender_owner,
                    initial_strength: health_strength(siege.starting_health),
                    final_strength: health_strength(final_health),
                },
                outcome,
            };
            let mut detailed = DetailedCombatRecord::new(id, CombatKind::Siege);
            detailed.building = report;
            self.history.push(record, Some(detailed));
            events.push(CombatEvent::CombatEnded {
                combat_id: id,
                kind: CombatKind::Siege,
                outcome,
            });
        }
    }

    /// Take an evacuating army out of the field battles it stood in
    fn release_army(&mut self, world: &mut World, army_id: ArmyId, events: &mut Vec<CombatEvent>) {
        let ids: Vec<CombatId> = self
            .combats
            .values()
            .filter(|c| c.involves(army_id))
            .map(|c| c.id)
            .collect();
        for id in ids {
            if let Some(combat) = self.combats.remove(&id) {
                for army in combat.all_armies() {
                    if let Some(army) = world.army_mut(army) {
                        army.in_combat = false;
                    }
                }
                events.push(CombatEvent::CombatAborted {
                    combat_id: id,
                    army_id,
                });
            }
        }
    }

    fn tick_massacres(&mut self, world: &mut World, now: SimTime, events: &mut Vec<CombatEvent>) {
        let ids: Vec<CombatId> = self.massacres.keys().copied().collect();
        for id in ids {
            let Some(mut massacre) = self.massacres.remove(&id) else {
                continue;
            };
            let tick = massacre.advance(world, now, &self.config);

            if tick.villagers_killed > 0 {
                events.push(CombatEvent::VillagersKilled {
                    combat_id: id,
                    group_id: massacre.target,
                    count: tick.villagers_killed,
                });
            }
            for (unit_type, count) in &tick.attacker_losses.casualties {
                events.push(CombatEvent::UnitsLost {
                    army_id: massacre.attacker,
                    unit_type: *unit_type,
                    count: *count,
                });
            }

            let outcome = match tick.status {
                MassacreStatus::Ongoing => {
                    self.massacres.insert(id, massacre);
                    continue;
                }
                MassacreStatus::AttackerWon => {
                    if let Some(group) = world.remove_villager_group(massacre.target) {
                        events.push(CombatEvent::VillagerGroupWiped {
                            group_id: group.id,
                            owner: group.owner,
                        });
                    }
                    if let Some(army) = world.army_mut(massacre.attacker) {
                        army.in_combat = false;
                    }
                    tracing::info!("{} ended: villagers {:?} wiped out", id, massacre.target);
                    CombatOutcome::AttackerVictory
                }
                MassacreStatus::VillagersWon => {
                    if let Some(army) = world.remove_army(massacre.attacker) {
                        events.push(CombatEvent::ArmyDestroyed {
                            army_id: army.id,
                            owner: army.owner,
                        });
                    }
                    if let Some(group) = world.villager_group_mut(massacre.target) {
                        group.in_combat = false;
                    }
                    tracing::warn!(
                        "{} ended: villagers {:?} destroyed attacking army {:?}",
                        id,
                        massacre.target,
                        massacre.attacker
                    );
                    CombatOutcome::DefenderVictory
                }
                MassacreStatus::AttackerInvalid => {
                    if let Some(army) = world.army_mut(massacre.attacker) {
                        army.in_combat = false;
                    }
                    if let Some(group) = world.villager_group_mut(massacre.target) {
                        group.in_combat = false;
                    }
                    tracing::info!("{} ended: attacker {:?} no longer valid", id, massacre.attacker);
                    CombatOutcome::DefenderVictory
                }
            };

            let record = CombatRecord {
                id,
                kind: CombatKind::Massacre,
                coord: massacre.coord,
                started_at: massacre.started_at,
                ended_at: now,
                attacker: ParticipantSummary {
                    participant: Participant::Armies(vec![massacre.attacker]),
                    owner: massacre.attacker_owner,
                    initial_strength: massacre.attacker_initial_units,
                    final_strength: world.army(massacre.attacker).map_or(0, |a| a.total_units()),
                },
                defender: ParticipantSummary {
                    participant: Participant::Villagers(massacre.target),
                    owner: massacre.target_owner,
                    initial_strength: massacre.villagers_initial,
                    final_strength: world.villager_group(massacre.target).map_or(0, |g| g.count),
                },
                outcome,
            };
            let mut detailed = DetailedCombatRecord::new(id, CombatKind::Massacre);
            detailed.villagers_killed = Some(massacre.villagers_killed);
            self.history.push(record, Some(detailed));
            events.push(CombatEvent::CombatEnded {
                combat_id: id,
                kind: CombatKind::Massacre,
                outcome,
            });
        }
    }

    fn tick_garrisons(&mut self, world: &mut World, now: SimTime, events: &mut Vec<CombatEvent>) {
        let sieging: BTreeMap<ArmyId, BuildingId> = self
            .sieges
            .values()
            .map(|s| (s.attacker, s.target))
            .collect();
        let volleys = plan_volleys(world, &sieging);
        let hits = aggregate_volleys(world, &volleys);
        let targeted: BTreeSet<ArmyId> = hits.iter().map(|h| h.target).collect();

        // Targets that slipped out of range (or died elsewhere). An untargeted
        // army still in range of one of its buildings keeps its marker.
        let released: Vec<ArmyId> = self
            .garrison
            .markers
            .values()
            .filter(|marker| !targeted.contains(&marker.target) && !marker.in_reach(world))
            .map(|marker| marker.target)
            .collect();
        for target in released {
            let Some(marker) = self.garrison.markers.remove(&target) else {
                continue;
            };
            match world.army(target) {
                Some(army) => {
                    tracing::info!("Garrison stops firing on army {:?}", target);
                    events.push(CombatEvent::GarrisonDisengaged { target });
                    self.record_garrison(&marker, &army.composition, CombatOutcome::Draw, now);
                }
                None => tracing::debug!("Garrison target {:?} gone", target),
            }
        }

        for hit in &hits {
            match self.garrison.markers.get_mut(&hit.target) {
                Some(marker) => marker.buildings.extend(hit.buildings.iter().copied()),
                None => {
                    let Some(army) = world.army(hit.target) else {
                        continue;
                    };
                    tracing::info!("Garrison opens fire on army {:?}", hit.target);
                    events.push(CombatEvent::GarrisonEngaged {
                        target: hit.target,
                        buildings: hit.buildings.clone(),
                    });
                    self.garrison
                        .markers
                        .insert(hit.target, GarrisonMarker::new(army, hit.owner, &hit.buildings, now));
                }
            }
        }

        let due = self
            .garrison
            .due_volleys(now, self.config.garrison_fire_interval);
        if due == 0 {
            return;
        }

        for volley in &volleys {
            events.push(CombatEvent::GarrisonAttack {
                building_id: volley.building,
                target: volley.target,
                damage: volley.damage * due as f64,
            });
        }

        for hit in hits {
            let damage = hit.damage_per_volley() * due as f64;
            let Some(army) = world.army_mut(hit.target) else {
                continue;
            };
            let losses = apply_damage_to_army_direct(army, damage);
            if let Some(marker) = self.garrison.markers.get_mut(&hit.target) {
                marker.record_losses(&losses);
            }
            for (unit_type, count) in &losses.casualties {
                events.push(CombatEvent::UnitsLost {
                    army_id: hit.target,
                    unit_type: *unit_type,
                    count: *count,
                });
            }

            if world.army(hit.target).is_some_and(|a| a.is_empty()) {
                if let Some(army) = world.remove_army(hit.target) {
                    tracing::info!("Garrison destroyed army {:?}", army.id);
                    events.push(CombatEvent::ArmyDestroyed {
                        army_id: army.id,
                        owner: army.owner,
                    });
                }
                if let Some(marker) = self.garrison.markers.remove(&hit.target) {
                    self.record_garrison(&marker, &Composition::new(), CombatOutcome::DefenderVictory, now);
                }
            }
        }
    }

    fn record_garrison(
        &mut self,
        marker: &GarrisonMarker,
        remaining: &Composition,
        outcome: CombatOutcome,
        now: SimTime,
    ) {
        let id = self.allocate_id();
        let buildings: Vec<BuildingId> = marker.buildings.iter().copied().collect();
        let strength = buildings.len() as u32;
        let record = CombatRecord {
            id,
            kind: CombatKind::GarrisonDefense,
            coord: marker.coord,
            started_at: marker.started_at,
            ended_at: now,
            attacker: ParticipantSummary {
                participant: Participant::Armies(vec![marker.target]),
                owner: marker.target_owner,
                initial_strength: marker.initial_units,
                final_strength: composition_total(remaining),
            },
            defender: ParticipantSummary {
                participant: Participant::Garrison(buildings),
                owner: marker.owner,
                initial_strength: strength,
                final_strength: strength,
            },
            outcome,
        };
        let mut detailed = DetailedCombatRecord::new(id, CombatKind::GarrisonDefense);
        detailed.units = marker.unit_reports(remaining);
        self.history.push(record, Some(detailed));
    }
}

/// Cap a side's live counts at what its armies still hold
///
/// Armies can lose units outside this engagement (garrison fire, removal);
/// the side follows them down, booking the difference as killed.
fn reconcile_side(world: &World, side: &mut SideCombatState) {
    let mut held = Composition::new();
    for army in side.armies.iter().filter_map(|id| world.army(*id)) {
        for (unit, count) in &army.composition {
            *held.entry(*unit).or_insert(0) += count;
        }
    }

    let excess: Vec<(_, u32)> = side
        .live
        .iter()
        .filter_map(|(unit, live)| {
            let have = held.get(unit).copied().unwrap_or(0);
            (*live > have).then(|| (*unit, *live - have))
        })
        .collect();
    for (unit, extra) in excess {
        side.kill(unit, extra);
    }
    if side.is_empty() {
        side.pending_damage = 0.0;
    }
}

/// Remove side casualties from the contributing armies, in join order
fn write_back_losses(
    world: &mut World,
    armies: &[ArmyId],
    losses: &DamageOutcome,
    events: &mut Vec<CombatEvent>,
) {
    for (unit_type, count) in &losses.casualties {
        let mut remaining = *count;
        for army_id in armies {
            if remaining == 0 {
                break;
            }
            let Some(army) = world.army_mut(*army_id) else {
                continue;
            };
            let removed = army.remove_units(*unit_type, remaining);
            if removed > 0 {
                remaining -= removed;
                events.push(CombatEvent::UnitsLost {
                    army_id: *army_id,
                    unit_type: *unit_type,
                    count: removed,
                });
            }
        }
    }

    if losses.casualties.is_empty() {
        return;
    }
    for army_id in armies {
        if world.army(*army_id).is_some_and(|a| a.is_empty()) {
            if let Some(army) = world.remove_army(*army_id) {
                tracing::info!("Army {:?} destroyed", army.id);
                events.push(CombatEvent::ArmyDestroyed {
                    army_id: army.id,
                    owner: army.owner,
                });
            }
        }
    }
}

fn side_summary(side: &SideCombatState) -> ParticipantSummary {
    ParticipantSummary {
        participant: Participant::Armies(side.armies.clone()),
        owner: side.owner,
        initial_strength: composition_total(&side.initial),
        final_strength: side.total_units(),
    }
}

fn unit_reports(side_tag: Side, side: &SideCombatState) -> Vec<UnitTypeReport> {
    side.initial
        .iter()
        .map(|(unit, initial)| {
            let ledger = side.ledger.get(unit).copied().unwrap_or_default();
            UnitTypeReport {
                side: side_tag,
                unit_type: *unit,
                initial: *initial,
                remaining: side.count(*unit),
                killed: ledger.killed,
                damage_dealt: ledger.damage_dealt,
                damage_received: ledger.damage_received,
            }
        })
        .collect()
}
