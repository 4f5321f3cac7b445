//! Auto-retreat after a lost engagement, and evacuation of a destroyed
//! building's footprint.
//!
//! An army standing on its own home base holds its ground. Everyone else
//! heads for a home base by path; with no path the army stays where it is.

use crate::battle::events::CombatEvent;
use crate::battle::world::{Building, Pathfinder, World};
use crate::core::types::{ArmyId, BuildingId};

/// Home base an army should fall back to, and whether it must be rebound
fn retreat_destination(world: &World, army: ArmyId) -> Option<(BuildingId, bool)> {
    let army = world.army(army)?;

    let own = army
        .home_base
        .and_then(|id| world.building(id))
        .filter(|b| b.owner == army.owner && b.is_valid_home_base() && !b.covers(army.coord));
    if let Some(base) = own {
        return Some((base.id, false));
    }

    world
        .home_bases_by_distance(army.owner, army.coord)
        .into_iter()
        .find(|b| !b.covers(army.coord))
        .map(|b| (b.id, true))
}

/// Send a beaten army home, or keep it on its home base
pub fn auto_retreat<P: Pathfinder + ?Sized>(world: &mut World, map: &P, army_id: ArmyId) -> Option<CombatEvent> {
    let army = world.army(army_id)?;
    if army.is_empty() {
        return None;
    }

    let holding = army
        .home_base
        .and_then(|id| world.building(id))
        .filter(|b| b.owner == army.owner && b.is_valid_home_base() && b.covers(army.coord))
        .map(|b| b.id);
    if let Some(building_id) = holding {
        tracing::info!("Army {:?} holds at home base {:?}", army_id, building_id);
        return Some(CombatEvent::ArmyHoldingHomeBase {
            army_id,
            building_id,
        });
    }

    let Some((destination, rebind)) = retreat_destination(world, army_id) else {
        tracing::warn!("Army {:?} has no home base to retreat to", army_id);
        return Some(CombatEvent::RetreatUnavailable { army_id });
    };
    let target = world.building(destination)?.coord;
    let (from, owner) = (army.coord, army.owner);

    let Some(path) = map.find_path(from, target, owner) else {
        tracing::warn!("Army {:?} has no path to {:?}, staying in place", army_id, destination);
        return Some(CombatEvent::RetreatUnavailable { army_id });
    };

    let path_len = path.len();
    let army = world.army_mut(army_id)?;
    if rebind {
        army.home_base = Some(destination);
    }
    army.is_retreating = true;
    army.in_combat = false;
    army.path = path;

    tracing::info!("Army {:?} retreating to {:?} ({} hexes)", army_id, destination, path_len);
    Some(CombatEvent::ArmyRetreating {
        army_id,
        destination,
        path_len,
    })
}

/// Move friendly armies off a destroyed building's footprint
///
/// `destroyed` must already be removed from the world. Each army goes to the
/// nearest other home base it can reach by path; otherwise it stays.
pub fn evacuate_footprint<P: Pathfinder + ?Sized>(
    world: &mut World,
    map: &P,
    destroyed: &Building,
) -> Vec<CombatEvent> {
    let mut events = Vec::new();

    let occupants: Vec<ArmyId> = world
        .armies
        .values()
        .filter(|army| !army.is_empty() && destroyed.covers(army.coord))
        .filter(|army| !world.are_hostile(destroyed.owner, army.owner))
        .map(|army| army.id)
        .collect();

    for army_id in occupants {
        let Some(army) = world.army(army_id) else {
            continue;
        };
        let (from, owner) = (army.coord, army.owner);

        let route = world
            .home_bases_by_distance(owner, from)
            .into_iter()
            .filter(|b| b.id != destroyed.id && !b.covers(from))
            .find_map(|b| map.find_path(from, b.coord, owner).map(|path| (b.id, path)));

        match (route, world.army_mut(army_id)) {
            (Some((destination, path)), Some(army)) => {
                let path_len = path.len();
                army.home_base = Some(destination);
                army.is_retreating = true;
                army.in_combat = false;
                army.path = path;
                tracing::info!(
                    "Army {:?} evacuating destroyed {:?} toward {:?}",
                    army_id,
                    destroyed.building_type,
                    destination
                );
                events.push(CombatEvent::ArmyRetreating {
                    army_id,
                    destination,
                    path_len,
                });
            }
            _ => {
                tracing::info!("Army {:?} has nowhere to evacuate, staying in place", army_id);
                events.push(CombatEvent::RetreatUnavailable { army_id });
            }
        }
    }

    events
}
