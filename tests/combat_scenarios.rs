//! Combat system integration tests

use hexwar_combat::battle::*;
use hexwar_combat::core::config::CombatConfig;
use hexwar_combat::core::error::CombatError;
use hexwar_combat::core::types::{ArmyId, BuildingId, PlayerId};

fn spawn(world: &mut World, owner: u32, coord: HexCoord, units: &[(UnitType, u32)]) -> ArmyId {
    let mut army = Army::new(ArmyId(0), PlayerId(owner), coord);
    for (unit, count) in units {
        army.add_units(*unit, *count);
    }
    world.spawn_army(army)
}

/// Tick in fixed steps, returning (time, events) for every tick
fn run_for(
    system: &mut CombatSystem,
    world: &mut World,
    map: &GridMap,
    dt: f64,
    until: f64,
) -> Vec<(f64, Vec<CombatEvent>)> {
    let mut log = Vec::new();
    let mut step = 0u32;
    loop {
        step += 1;
        let now = step as f64 * dt;
        if now > until + 1e-9 {
            break;
        }
        log.push((now, system.tick(world, map, now)));
    }
    log
}

fn all_events(log: &[(f64, Vec<CombatEvent>)]) -> Vec<CombatEvent> {
    log.iter().flat_map(|(_, events)| events.iter().cloned()).collect()
}

#[test]
fn test_swordsmen_beat_archers_after_ranged_exchange() {
    let mut world = World::new();
    let map = GridMap::new(10, 10);
    let mut system = CombatSystem::new(CombatConfig::default());
    let at = HexCoord::new(5, 5);
    let swords = spawn(&mut world, 1, at, &[(UnitType::Swordsman, 10)]);
    let archers = spawn(&mut world, 2, at, &[(UnitType::Archer, 10)]);

    let id = system
        .start_army_combat(&mut world, &map, swords, archers, 0.0)
        .unwrap();
    let log = run_for(&mut system, &mut world, &map, 0.1, 60.0);

    // Ranged exchange: only the archers deal damage
    for (now, events) in log.iter().filter(|(now, _)| *now < 2.95) {
        for event in events {
            assert!(
                !matches!(event, CombatEvent::DamageDealt { by: Side::Attacker, .. }),
                "attacker dealt damage at {}",
                now
            );
        }
    }
    let ranged_hits = log
        .iter()
        .filter(|(now, _)| *now < 2.95)
        .flat_map(|(_, events)| events.iter())
        .filter(|e| matches!(e, CombatEvent::DamageDealt { by: Side::Defender, .. }))
        .count();
    assert!(ranged_hits > 0);

    // Melee: swordsmen join in
    let melee_hits = log
        .iter()
        .filter(|(now, _)| *now > 3.05)
        .flat_map(|(_, events)| events.iter())
        .filter(|e| matches!(e, CombatEvent::DamageDealt { by: Side::Attacker, .. }))
        .count();
    assert!(melee_hits > 0);

    let record = system.history().by_id(id).unwrap();
    assert_eq!(record.kind, CombatKind::ArmyVsArmy);
    assert_eq!(record.outcome, CombatOutcome::AttackerVictory);
    assert_eq!(record.defender.final_strength, 0);
    assert!(record.attacker.final_strength > 0);
    assert!(world.army(archers).is_none());

    let detailed = system.history().detailed_by_id(id).unwrap();
    let phases: Vec<CombatPhase> = detailed.phases.iter().map(|p| p.phase).collect();
    assert_eq!(phases[0], CombatPhase::RangedExchange);
    assert_eq!(phases[1], CombatPhase::MeleeEngagement);
    assert_eq!(detailed.terrain, Some(Terrain::Plains));
    let archer_report = detailed
        .units
        .iter()
        .find(|u| u.side == Side::Defender && u.unit_type == UnitType::Archer)
        .unwrap();
    assert_eq!(archer_report.killed, 10);
    assert!(archer_report.damage_dealt > 0.0);
}

#[test]
fn test_siege_takes_ceil_health_over_damage_ticks() {
    let config = CombatConfig::default();
    let mut world = World::new();
    let map = GridMap::new(10, 10);
    let mut system = CombatSystem::new(config.clone());
    let tower = world.spawn_building(PlayerId(2), BuildingType::WatchTower, HexCoord::new(4, 4));
    let army = spawn(&mut world, 1, HexCoord::new(4, 5), &[(UnitType::Trebuchet, 1)]);

    let per_tick = siege::siege_phase_damage(
        world.army(army).unwrap(),
        &ResearchContext::none(),
        &config,
    );
    assert!((per_tick - 52.5).abs() < 1e-9);
    let expected_ticks = (1000.0 / per_tick).ceil() as usize;

    system.start_siege(&mut world, army, tower, 0.0).unwrap();
    let log = run_for(&mut system, &mut world, &map, 1.0, 40.0);
    let events = all_events(&log);

    let damaged = events
        .iter()
        .filter(|e| matches!(e, CombatEvent::BuildingDamaged { .. }))
        .count();
    assert_eq!(damaged, expected_ticks);

    let destroyed_at: Vec<f64> = log
        .iter()
        .filter(|(_, events)| {
            events
                .iter()
                .any(|e| matches!(e, CombatEvent::BuildingDestroyed { .. }))
        })
        .map(|(now, _)| *now)
        .collect();
    assert_eq!(destroyed_at, vec![expected_ticks as f64]);
    assert!(world.building(tower).is_none());
    assert!(!world.army(army).unwrap().in_combat);

    let record = system.history().latest().unwrap();
    assert_eq!(record.kind, CombatKind::Siege);
    assert_eq!(record.outcome, CombatOutcome::AttackerVictory);
    assert_eq!(record.defender.initial_strength, 1000);
    assert_eq!(record.defender.final_strength, 0);
    let report = system
        .history()
        .detailed_by_id(record.id)
        .and_then(|d| d.building.clone())
        .unwrap();
    assert_eq!(report.phase_ticks as usize, expected_ticks);
    assert!(report.destroyed);
}

fn mixed_match() -> String {
    let mut world = World::new();
    let mut map = GridMap::new(12, 12);
    map.set_terrain(HexCoord::new(3, 3), Terrain::Hills);
    let mut system = CombatSystem::new(CombatConfig::default());

    let at = HexCoord::new(3, 3);
    spawn(
        &mut world,
        1,
        at,
        &[(UnitType::Knight, 6), (UnitType::Crossbowman, 8), (UnitType::Mangonel, 1)],
    );
    spawn(
        &mut world,
        2,
        at,
        &[(UnitType::Pikeman, 9), (UnitType::Archer, 7), (UnitType::Swordsman, 4)],
    );
    let raider = spawn(&mut world, 1, HexCoord::new(8, 8), &[(UnitType::Scout, 4)]);
    let villagers = world.spawn_villagers(PlayerId(2), HexCoord::new(8, 8), 12);

    system.engage_contacts(&mut world, &map, 0.0);
    system
        .start_massacre(&mut world, raider, villagers, 0.0)
        .unwrap();
    run_for(&mut system, &mut world, &map, 0.25, 120.0);

    let records: Vec<&CombatRecord> = system.history().records().collect();
    serde_json::to_string(&records).unwrap()
}

#[test]
fn test_identical_runs_produce_identical_records() {
    let first = mixed_match();
    let second = mixed_match();
    assert!(first.len() > 2);
    assert_eq!(first, second);
}

#[test]
fn test_victory_escalates_into_siege() {
    let mut world = World::new();
    let map = GridMap::new(10, 10);
    let mut system = CombatSystem::new(CombatConfig::default());
    let at = HexCoord::new(6, 6);
    let house = world.spawn_building(PlayerId(2), BuildingType::House, at);
    let knights = spawn(&mut world, 1, at, &[(UnitType::Knight, 10)]);
    let scouts = spawn(&mut world, 2, at, &[(UnitType::Scout, 2)]);

    let battle = system
        .start_army_combat(&mut world, &map, knights, scouts, 0.0)
        .unwrap();
    let events = all_events(&run_for(&mut system, &mut world, &map, 0.1, 40.0));

    let escalation = events.iter().find_map(|e| match e {
        CombatEvent::AutoEscalated {
            from_combat,
            building_id,
            ..
        } => Some((*from_combat, *building_id)),
        _ => None,
    });
    assert_eq!(escalation, Some((battle, house)));
    assert!(world.building(house).is_none());

    let kinds: Vec<(CombatKind, CombatOutcome)> = system
        .history()
        .records()
        .map(|r| (r.kind, r.outcome))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (CombatKind::Siege, CombatOutcome::AttackerVictory),
            (CombatKind::ArmyVsArmy, CombatOutcome::AttackerVictory),
        ]
    );
}

#[test]
fn test_loser_on_home_base_holds() {
    let mut config = CombatConfig::default();
    config.max_engagement_duration = 2.0;
    let mut world = World::new();
    let map = GridMap::new(10, 10);
    let mut system = CombatSystem::new(config);
    let at = HexCoord::new(5, 5);
    let base = world.spawn_building(PlayerId(2), BuildingType::CityCenter, at);
    let knights = spawn(&mut world, 1, at, &[(UnitType::Knight, 10)]);
    let mut defender = Army::new(ArmyId(0), PlayerId(2), at).with_units(UnitType::Swordsman, 3);
    defender.home_base = Some(base);
    let defender = world.spawn_army(defender);

    system
        .start_army_combat(&mut world, &map, knights, defender, 0.0)
        .unwrap();
    let events = all_events(&run_for(&mut system, &mut world, &map, 0.5, 3.0));

    // No ranged units: nothing dies before the time limit, DPS decides
    assert_eq!(
        system.history().records().last().map(|r| r.outcome),
        Some(CombatOutcome::AttackerVictory)
    );
    assert!(events.contains(&CombatEvent::ArmyHoldingHomeBase {
        army_id: defender,
        building_id: base
    }));
    let army = world.army(defender).unwrap();
    assert!(!army.is_retreating);
    assert_eq!(army.coord, at);
    assert!(events
        .iter()
        .any(|e| matches!(e, CombatEvent::AutoEscalated { building_id, .. } if *building_id == base)));
}

#[test]
fn test_loser_retreats_home_or_stays_without_path() {
    for blocked in [false, true] {
        let mut config = CombatConfig::default();
        config.max_engagement_duration = 2.0;
        let mut world = World::new();
        let mut map = GridMap::new(12, 12);
        let home = HexCoord::new(1, 1);
        let base = world.spawn_building(PlayerId(2), BuildingType::Castle, home);
        if blocked {
            for hex in home.ring(2) {
                map.block(hex);
            }
        }
        let mut system = CombatSystem::new(config);
        let at = HexCoord::new(8, 8);
        let knights = spawn(&mut world, 1, at, &[(UnitType::Knight, 10)]);
        let mut defender = Army::new(ArmyId(0), PlayerId(2), at).with_units(UnitType::Pikeman, 2);
        defender.home_base = Some(base);
        let defender = world.spawn_army(defender);

        system
            .start_army_combat(&mut world, &map, knights, defender, 0.0)
            .unwrap();
        let events = all_events(&run_for(&mut system, &mut world, &map, 0.5, 3.0));
        let army = world.army(defender).unwrap();

        if blocked {
            assert!(events.contains(&CombatEvent::RetreatUnavailable { army_id: defender }));
            assert!(!army.is_retreating);
            assert!(army.path.is_empty());
        } else {
            assert!(events.iter().any(|e| matches!(
                e,
                CombatEvent::ArmyRetreating { army_id, destination, .. }
                    if *army_id == defender && *destination == base
            )));
            assert!(army.is_retreating);
            assert_eq!(army.path.first(), Some(&at));
            assert_eq!(army.path.last(), Some(&home));
        }
        assert_eq!(army.coord, at);
        assert!(!army.in_combat);
    }
}

#[test]
fn test_massacre_wipes_villagers() {
    let mut world = World::new();
    let map = GridMap::new(10, 10);
    let mut system = CombatSystem::new(CombatConfig::default());
    let at = HexCoord::new(2, 7);
    let knights = spawn(&mut world, 1, at, &[(UnitType::Knight, 4)]);
    let group = world.spawn_villagers(PlayerId(2), at, 10);

    let id = system.start_massacre(&mut world, knights, group, 0.0).unwrap();
    let events = all_events(&run_for(&mut system, &mut world, &map, 0.5, 60.0));

    assert!(world.villager_group(group).is_none());
    assert!(events.contains(&CombatEvent::VillagerGroupWiped {
        group_id: group,
        owner: PlayerId(2)
    }));
    let killed: u32 = events
        .iter()
        .filter_map(|e| match e {
            CombatEvent::VillagersKilled { count, .. } => Some(*count),
            _ => None,
        })
        .sum();
    assert_eq!(killed, 10);

    let record = system.history().by_id(id).unwrap();
    assert_eq!(record.kind, CombatKind::Massacre);
    assert_eq!(record.outcome, CombatOutcome::AttackerVictory);
    assert_eq!(record.defender.final_strength, 0);
    assert_eq!(
        system.history().detailed_by_id(id).and_then(|d| d.villagers_killed),
        Some(10)
    );
    assert!(!world.army(knights).unwrap().in_combat);
}

fn garrison_world() -> (World, ArmyId, [BuildingId; 2]) {
    let mut world = World::new();
    let north = world.spawn_building(PlayerId(1), BuildingType::WatchTower, HexCoord::new(5, 4));
    let south = world.spawn_building(PlayerId(1), BuildingType::WatchTower, HexCoord::new(5, 6));
    spawn(&mut world, 1, HexCoord::new(5, 4), &[(UnitType::Archer, 5)]);
    spawn(&mut world, 1, HexCoord::new(5, 6), &[(UnitType::Archer, 5)]);
    let target = spawn(&mut world, 2, HexCoord::new(5, 5), &[(UnitType::Mangonel, 3)]);
    (world, target, [north, south])
}

#[test]
fn test_garrison_volleys_aggregate_before_armour() {
    let (mut world, target, towers) = garrison_world();
    let map = GridMap::new(10, 10);
    let mut system = CombatSystem::new(CombatConfig::default());

    let events = system.tick(&mut world, &map, 1.0);
    let attacks: Vec<BuildingId> = events
        .iter()
        .filter_map(|e| match e {
            CombatEvent::GarrisonAttack { building_id, .. } => Some(*building_id),
            _ => None,
        })
        .collect();
    assert_eq!(attacks, towers.to_vec());
    assert!(events.contains(&CombatEvent::GarrisonEngaged {
        target,
        buildings: towers.to_vec()
    }));

    // 2 x (5 archers * 4) - mangonel pierce armour 6, subtracted once
    let army = world.army(target).unwrap();
    assert_eq!(army.count(UnitType::Mangonel), 3);
    assert!((army.wounds - 34.0).abs() < 1e-9);
    assert!(system.garrison().is_engaged(target));

    // Later ticks keep firing without re-engaging
    let events = all_events(&run_for(&mut system, &mut world, &map, 1.0, 12.0));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, CombatEvent::GarrisonEngaged { .. }))
            .count(),
        1
    );
    assert!(world.army(target).is_none());
    assert!(events.contains(&CombatEvent::ArmyDestroyed {
        army_id: target,
        owner: PlayerId(2)
    }));

    let records: Vec<&CombatRecord> = system.history().records().collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, CombatKind::GarrisonDefense);
    assert_eq!(records[0].outcome, CombatOutcome::DefenderVictory);
    assert_eq!(records[0].attacker.initial_strength, 3);
    assert!(!system.garrison().is_engaged(target));

    let detailed = system.history().detailed_by_id(records[0].id).unwrap();
    assert_eq!(detailed.kind, CombatKind::GarrisonDefense);
    assert_eq!(detailed.units.len(), 1);
    let mangonels = &detailed.units[0];
    assert_eq!(mangonels.unit_type, UnitType::Mangonel);
    assert_eq!((mangonels.initial, mangonels.remaining, mangonels.killed), (3, 0, 3));
    assert!((mangonels.damage_received - 300.0).abs() < 1e-9);
}

#[test]
fn test_garrison_target_leaving_range_is_a_draw() {
    let (mut world, target, _) = garrison_world();
    let map = GridMap::new(20, 20);
    let mut system = CombatSystem::new(CombatConfig::default());

    system.tick(&mut world, &map, 1.0);
    world.army_mut(target).unwrap().coord = HexCoord::new(15, 15);
    let events = system.tick(&mut world, &map, 2.0);

    assert!(events.contains(&CombatEvent::GarrisonDisengaged { target }));
    let record = system.history().latest().unwrap();
    assert_eq!(record.kind, CombatKind::GarrisonDefense);
    assert_eq!(record.outcome, CombatOutcome::Draw);
    assert_eq!(record.attacker.final_strength, 3);
}

/// Tower at (5, 5) garrisoned by a single archer
fn lone_tower_world() -> (World, BuildingId) {
    let mut world = World::new();
    let tower = world.spawn_building(PlayerId(1), BuildingType::WatchTower, HexCoord::new(5, 5));
    spawn(&mut world, 1, HexCoord::new(5, 5), &[(UnitType::Archer, 1)]);
    (world, tower)
}

#[test]
fn test_nearer_enemy_does_not_release_first_target() {
    let (mut world, _) = lone_tower_world();
    let map = GridMap::new(20, 20);
    let mut system = CombatSystem::new(CombatConfig::default());
    let far = spawn(&mut world, 2, HexCoord::new(7, 5), &[(UnitType::Knight, 3)]);

    let events = system.tick(&mut world, &map, 1.0);
    assert!(events.iter().any(|e| matches!(e, CombatEvent::GarrisonEngaged { target, .. } if *target == far)));

    let near = spawn(&mut world, 2, HexCoord::new(6, 5), &[(UnitType::Knight, 3)]);
    let events = system.tick(&mut world, &map, 2.0);

    assert!(!events.contains(&CombatEvent::GarrisonDisengaged { target: far }));
    assert!(events.iter().any(|e| matches!(e, CombatEvent::GarrisonEngaged { target, .. } if *target == near)));
    assert!(events.iter().all(|e| !matches!(e, CombatEvent::GarrisonAttack { target, .. } if *target == far)));
    assert!(system.garrison().is_engaged(far));
    assert!(system.garrison().is_engaged(near));
    assert!(system.history().is_empty());
}

#[test]
fn test_one_garrison_record_per_engagement_with_competing_target() {
    let (mut world, tower) = lone_tower_world();
    let map = GridMap::new(20, 20);
    let mut system = CombatSystem::new(CombatConfig::default());
    let far = spawn(&mut world, 2, HexCoord::new(7, 5), &[(UnitType::Knight, 3)]);
    system.tick(&mut world, &map, 1.0);
    let near = spawn(&mut world, 2, HexCoord::new(6, 5), &[(UnitType::Knight, 3)]);

    // Both stay in range for several volleys; only the nearer one is shot
    let mut events = Vec::new();
    for step in 2..=10 {
        events.extend(system.tick(&mut world, &map, step as f64));
    }
    assert!(events.iter().all(|e| !matches!(e, CombatEvent::GarrisonDisengaged { .. })));
    let engaged = events
        .iter()
        .filter(|e| matches!(e, CombatEvent::GarrisonEngaged { .. }))
        .count();
    assert_eq!(engaged, 1);
    assert!(system.history().is_empty());

    world.army_mut(far).unwrap().coord = HexCoord::new(15, 5);
    let events = system.tick(&mut world, &map, 11.0);
    assert!(events.contains(&CombatEvent::GarrisonDisengaged { target: far }));
    assert!(!events.contains(&CombatEvent::GarrisonDisengaged { target: near }));

    world.army_mut(near).unwrap().coord = HexCoord::new(15, 15);
    system.tick(&mut world, &map, 12.0);

    let records: Vec<&CombatRecord> = system.history().records().collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].attacker.participant, Participant::Armies(vec![far]));
    assert_eq!(records[1].attacker.participant, Participant::Armies(vec![near]));
    for record in &records {
        assert_eq!(record.kind, CombatKind::GarrisonDefense);
        assert_eq!(record.outcome, CombatOutcome::Draw);
        assert_eq!(record.defender.participant, Participant::Garrison(vec![tower]));
    }
    // The far army was only fired on before the nearer one arrived
    assert_eq!(records[0].started_at, 1.0);
    assert_eq!(records[1].started_at, 2.0);
    assert_eq!(records[0].attacker.final_strength, 3);
}

#[test]
fn test_reinforcements_join_existing_fight() {
    let mut world = World::new();
    let map = GridMap::new(10, 10);
    let mut system = CombatSystem::new(CombatConfig::default());
    let at = HexCoord::new(3, 3);
    let first = spawn(&mut world, 1, at, &[(UnitType::Swordsman, 5)]);
    let enemy = spawn(&mut world, 2, at, &[(UnitType::Swordsman, 8)]);

    let started = system.engage_contacts(&mut world, &map, 0.0);
    assert_eq!(started.len(), 1);
    let id = started[0];
    assert_eq!(system.combat(id).unwrap().side_of(first), Some(Side::Attacker));
    assert_eq!(system.combat(id).unwrap().side_of(enemy), Some(Side::Defender));

    let second = spawn(&mut world, 1, at, &[(UnitType::Swordsman, 6)]);
    assert!(system.engage_contacts(&mut world, &map, 0.5).is_empty());
    let combat = system.combat(id).unwrap();
    assert_eq!(combat.attacker.armies, vec![first, second]);
    assert_eq!(combat.attacker.count(UnitType::Swordsman), 11);
    assert_eq!(combat.attacker.initial_units(), 11);
    assert!(world.army(second).unwrap().in_combat);

    let events = all_events(&run_for(&mut system, &mut world, &map, 0.5, 120.0));
    assert!(events.contains(&CombatEvent::ArmyJoinedCombat {
        combat_id: id,
        army_id: second,
        side: Side::Attacker
    }));
    let record = system.history().by_id(id).unwrap();
    assert_eq!(record.outcome, CombatOutcome::AttackerVictory);
    assert_eq!(record.attacker.initial_strength, 11);

    // Losses land on the first army to join before the second
    let first_left = world.army(first).map_or(0, |a| a.total_units());
    let second_left = world.army(second).map_or(0, |a| a.total_units());
    assert_eq!(first_left + second_left, record.attacker.final_strength);
    if first_left > 0 {
        assert_eq!(second_left, 6);
    }
}

#[test]
fn test_join_rejects_wrong_side() {
    let mut world = World::new();
    let map = GridMap::new(10, 10);
    let mut system = CombatSystem::new(CombatConfig::default());
    let at = HexCoord::new(3, 3);
    let a = spawn(&mut world, 1, at, &[(UnitType::Swordsman, 5)]);
    let b = spawn(&mut world, 2, at, &[(UnitType::Swordsman, 5)]);
    let ally = spawn(&mut world, 1, at, &[(UnitType::Archer, 5)]);
    let id = system.start_army_combat(&mut world, &map, a, b, 0.0).unwrap();

    assert!(matches!(
        system.join_combat(&mut world, id, ally, Side::Defender),
        Err(CombatError::NotHostile(_))
    ));
    assert!(matches!(
        system.join_combat(&mut world, hexwar_combat::core::types::CombatId(99), ally, Side::Attacker),
        Err(CombatError::CombatNotFound(_))
    ));
    assert!(system.join_combat(&mut world, id, ally, Side::Attacker).is_ok());
}

#[test]
fn test_allied_players_do_not_fight() {
    let mut world = World::new();
    let map = GridMap::new(10, 10);
    let mut system = CombatSystem::new(CombatConfig::default());
    for id in [1, 2] {
        let mut player = Player::new(PlayerId(id));
        player.team = Some(7);
        world.add_player(player);
    }
    let at = HexCoord::new(1, 1);
    spawn(&mut world, 1, at, &[(UnitType::Knight, 2)]);
    spawn(&mut world, 2, at, &[(UnitType::Knight, 2)]);

    assert!(system.engage_contacts(&mut world, &map, 0.0).is_empty());
    assert_eq!(system.active_count(), 0);
}

#[test]
fn test_abort_removes_siege_and_massacre() {
    let mut world = World::new();
    let map = GridMap::new(10, 10);
    let mut system = CombatSystem::new(CombatConfig::default());
    let at = HexCoord::new(2, 2);
    let house = world.spawn_building(PlayerId(2), BuildingType::House, at);
    let group = world.spawn_villagers(PlayerId(2), at, 5);
    let sieger = spawn(&mut world, 1, at, &[(UnitType::Swordsman, 2)]);
    let raider = spawn(&mut world, 1, at, &[(UnitType::Scout, 2)]);

    system.start_siege(&mut world, sieger, house, 0.0).unwrap();
    system.start_massacre(&mut world, raider, group, 0.0).unwrap();
    system.tick(&mut world, &map, 1.0);

    assert_eq!(system.abort_engagements_for_army(&mut world, sieger), 1);
    assert_eq!(system.abort_engagements_for_army(&mut world, raider), 1);
    assert_eq!(system.active_count(), 0);
    assert!(!world.army(raider).unwrap().in_combat);
    assert!(!world.villager_group(group).unwrap().in_combat);
    assert!(system.history().is_empty());

    let aborted = system
        .tick(&mut world, &map, 2.0)
        .into_iter()
        .filter(|e| matches!(e, CombatEvent::CombatAborted { .. }))
        .count();
    assert_eq!(aborted, 2);
}

#[test]
fn test_config_from_toml_changes_phase_timing() {
    let config = CombatConfig::from_toml_str(
        r#"
        ranged_exchange_duration = 5.0
        melee_engagement_duration = 4.0
        "#,
    )
    .unwrap();
    assert_eq!(config.cleanup_start(), 9.0);
    assert_eq!(CombatPhase::from_elapsed(4.5, &config), CombatPhase::RangedExchange);
    assert_eq!(CombatPhase::from_elapsed(9.5, &config), CombatPhase::Cleanup);

    let mut world = World::new();
    let map = GridMap::new(10, 10);
    let mut system = CombatSystem::new(config);
    let at = HexCoord::new(3, 3);
    let a = spawn(&mut world, 1, at, &[(UnitType::Knight, 20)]);
    let b = spawn(&mut world, 2, at, &[(UnitType::Knight, 20)]);
    let id = system.start_army_combat(&mut world, &map, a, b, 0.0).unwrap();
    run_for(&mut system, &mut world, &map, 0.5, 4.5);

    // Melee-only armies do nothing until the longer ranged exchange ends
    let combat = system.combat(id).unwrap();
    assert_eq!(combat.phase, CombatPhase::RangedExchange);
    assert_eq!(combat.attacker.total_units(), 20);
    assert_eq!(combat.defender.total_units(), 20);
}

#[test]
fn test_history_queries() {
    let mut world = World::new();
    let map = GridMap::new(10, 10);
    let mut config = CombatConfig::default();
    config.history_capacity = 2;
    let mut system = CombatSystem::new(config);

    let mut ids = Vec::new();
    for (i, q) in [1, 4, 7].into_iter().enumerate() {
        let at = HexCoord::new(q, 1);
        let knights = spawn(&mut world, 1, at, &[(UnitType::Knight, 5)]);
        let scouts = spawn(&mut world, 2, at, &[(UnitType::Scout, 1)]);
        let start = i as f64 * 20.0;
        ids.push(
            system
                .start_army_combat(&mut world, &map, knights, scouts, start)
                .unwrap(),
        );
        let mut now = start;
        while system.active_count() > 0 {
            now += 0.5;
            system.tick(&mut world, &map, now);
        }
    }

    assert_eq!(system.history().len(), 2);
    assert!(system.history().by_id(ids[0]).is_none());
    assert_eq!(system.history().latest().map(|r| r.id), Some(ids[2]));
    let near = system
        .history()
        .find_near(25.0, HexCoord::new(4, 2), 10.0, 1)
        .map(|r| r.id);
    assert_eq!(near, Some(ids[1]));
}
