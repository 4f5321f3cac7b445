//! State-change events emitted by the combat core
//!
//! Each call to `CombatSystem::tick` returns the events of that tick in the
//! order they happened. Delivery (UI, persistence, network) is the caller's
//! business.

use serde::{Deserialize, Serialize};

use crate::battle::building::BuildingType;
use crate::battle::engagement::CombatPhase;
use crate::battle::hex::HexCoord;
use crate::battle::history::{CombatKind, CombatOutcome};
use crate::battle::side::Side;
use crate::battle::unit_type::UnitType;
use crate::core::types::{ArmyId, BuildingId, CombatId, PlayerId, SimTime, VillagerGroupId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CombatEvent {
    CombatStarted {
        combat_id: CombatId,
        kind: CombatKind,
        coord: HexCoord,
        time: SimTime,
    },
    ArmyJoinedCombat {
        combat_id: CombatId,
        army_id: ArmyId,
        side: Side,
    },
    PhaseChanged {
        combat_id: CombatId,
        from: CombatPhase,
        to: CombatPhase,
    },
    DamageDealt {
        combat_id: CombatId,
        by: Side,
        amount: f64,
    },
    UnitsLost {
        army_id: ArmyId,
        unit_type: UnitType,
        count: u32,
    },
    ArmyDestroyed {
        army_id: ArmyId,
        owner: PlayerId,
    },
    CombatEnded {
        combat_id: CombatId,
        kind: CombatKind,
        outcome: CombatOutcome,
    },
    CombatAborted {
        combat_id: CombatId,
        army_id: ArmyId,
    },
    AutoEscalated {
        from_combat: CombatId,
        siege_id: CombatId,
        building_id: BuildingId,
    },
    BuildingDamaged {
        combat_id: CombatId,
        building_id: BuildingId,
        damage: f64,
        health_remaining: f64,
    },
    BuildingDestroyed {
        combat_id: CombatId,
        building_id: BuildingId,
        building_type: BuildingType,
        owner: PlayerId,
    },
    VillagersKilled {
        combat_id: CombatId,
        group_id: VillagerGroupId,
        count: u32,
    },
    VillagerGroupWiped {
        group_id: VillagerGroupId,
        owner: PlayerId,
    },
    GarrisonEngaged {
        target: ArmyId,
        buildings: Vec<BuildingId>,
    },
    GarrisonAttack {
        building_id: BuildingId,
        target: ArmyId,
        damage: f64,
    },
    GarrisonDisengaged {
        target: ArmyId,
    },
    ArmyRetreating {
        army_id: ArmyId,
        destination: BuildingId,
        path_len: usize,
    },
    ArmyHoldingHomeBase {
        army_id: ArmyId,
        building_id: BuildingId,
    },
    RetreatUnavailable {
        army_id: ArmyId,
    },
}

impl CombatEvent {
    /// Engagement this event belongs to, if any
    pub fn combat_id(&self) -> Option<CombatId> {
        match self {
            CombatEvent::CombatStarted { combat_id, .. }
            | CombatEvent::ArmyJoinedCombat { combat_id, .. }
            | CombatEvent::PhaseChanged { combat_id, .. }
            | CombatEvent::DamageDealt { combat_id, .. }
            | CombatEvent::CombatEnded { combat_id, .. }
            | CombatEvent::CombatAborted { combat_id, .. }
            | CombatEvent::BuildingDamaged { combat_id, .. }
            | CombatEvent::BuildingDestroyed { combat_id, .. }
            | CombatEvent::VillagersKilled { combat_id, .. } => Some(*combat_id),
            CombatEvent::AutoEscalated { siege_id, .. } => Some(*siege_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_type_tag() {
        let event = CombatEvent::ArmyDestroyed {
            army_id: ArmyId(3),
            owner: PlayerId(1),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"ArmyDestroyed\""));
    }

    #[test]
    fn test_combat_id_lookup() {
        let event = CombatEvent::DamageDealt {
            combat_id: CombatId(4),
            by: Side::Attacker,
            amount: 1.0,
        };
        assert_eq!(event.combat_id(), Some(CombatId(4)));
        assert_eq!(
            CombatEvent::GarrisonDisengaged { target: ArmyId(1) }.combat_id(),
            None
        );
    }
}
