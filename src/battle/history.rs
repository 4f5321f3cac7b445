//! Combat history: immutable summary and detailed after-action records
//!
//! Both histories are ordered most-recent-first and bounded in size.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::battle::building::BuildingType;
use crate::battle::engagement::CombatPhase;
use crate::battle::hex::HexCoord;
use crate::battle::side::Side;
use crate::battle::terrain::Terrain;
use crate::battle::unit_type::UnitType;
use crate::core::types::{ArmyId, BuildingId, CombatId, PlayerId, SimTime, VillagerGroupId};

/// Kind of engagement a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatKind {
    ArmyVsArmy,
    Siege,
    Massacre,
    GarrisonDefense,
}

/// Who won
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatOutcome {
    AttackerVictory,
    DefenderVictory,
    Draw,
}

/// The entities that made up one side of an engagement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Participant {
    Armies(Vec<ArmyId>),
    Building(BuildingId),
    Garrison(Vec<BuildingId>),
    Villagers(VillagerGroupId),
}

/// Strength summary of one side
///
/// Strength is a unit count for armies and villagers and remaining health
/// (rounded up) for buildings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub participant: Participant,
    pub owner: PlayerId,
    pub initial_strength: u32,
    pub final_strength: u32,
}

impl ParticipantSummary {
    pub fn casualties(&self) -> u32 {
        self.initial_strength.saturating_sub(self.final_strength)
    }
}

/// Summary record of a finished engagement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatRecord {
    pub id: CombatId,
    pub kind: CombatKind,
    pub coord: HexCoord,
    pub started_at: SimTime,
    pub ended_at: SimTime,
    pub attacker: ParticipantSummary,
    pub defender: ParticipantSummary,
    pub outcome: CombatOutcome,
}

impl CombatRecord {
    pub fn duration(&self) -> f64 {
        self.ended_at - self.started_at
    }
}

/// Per-unit-type breakdown for one side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTypeReport {
    pub side: Side,
    pub unit_type: UnitType,
    pub initial: u32,
    pub remaining: u32,
    pub killed: u32,
    pub damage_dealt: f64,
    pub damage_received: f64,
}

/// Damage and casualties accumulated during one phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: CombatPhase,
    /// Seconds after engagement start at which the phase began
    pub started_at: f64,
    pub duration: f64,
    pub attacker_damage_dealt: f64,
    pub defender_damage_dealt: f64,
    pub attacker_casualties: u32,
    pub defender_casualties: u32,
}

impl PhaseReport {
    pub fn new(phase: CombatPhase, started_at: f64) -> Self {
        Self {
            phase,
            started_at,
            duration: 0.0,
            attacker_damage_dealt: 0.0,
            defender_damage_dealt: 0.0,
            attacker_casualties: 0,
            defender_casualties: 0,
        }
    }
}

/// Damage taken by a building over a siege
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingDamageReport {
    pub building_id: BuildingId,
    pub building_type: BuildingType,
    pub health_before: f64,
    pub health_after: f64,
    pub total_damage: f64,
    pub phase_ticks: u32,
    pub destroyed: bool,
}

/// Detailed after-action report, keyed by the same id as its summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedCombatRecord {
    pub id: CombatId,
    pub kind: CombatKind,
    pub terrain: Option<Terrain>,
    pub units: Vec<UnitTypeReport>,
    pub phases: Vec<PhaseReport>,
    pub building: Option<BuildingDamageReport>,
    pub villagers_killed: Option<u32>,
}

impl DetailedCombatRecord {
    pub fn new(id: CombatId, kind: CombatKind) -> Self {
        Self {
            id,
            kind,
            terrain: None,
            units: Vec::new(),
            phases: Vec::new(),
            building: None,
            villagers_killed: None,
        }
    }
}

/// Bounded, most-recent-first histories of finished engagements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatHistory {
    records: VecDeque<CombatRecord>,
    detailed: VecDeque<DetailedCombatRecord>,
    capacity: usize,
}

impl CombatHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            detailed: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a finished engagement; the oldest entries fall off past capacity
    pub fn push(&mut self, record: CombatRecord, detailed: Option<DetailedCombatRecord>) {
        self.records.push_front(record);
        self.records.truncate(self.capacity);
        if let Some(detailed) = detailed {
            self.detailed.push_front(detailed);
            self.detailed.truncate(self.capacity);
        }
    }

    /// Summary records, most recent first
    pub fn records(&self) -> impl Iterator<Item = &CombatRecord> {
        self.records.iter()
    }

    /// Detailed records, most recent first
    pub fn detailed_records(&self) -> impl Iterator<Item = &DetailedCombatRecord> {
        self.detailed.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&CombatRecord> {
        self.records.front()
    }

    pub fn by_id(&self, id: CombatId) -> Option<&CombatRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn detailed_by_id(&self, id: CombatId) -> Option<&DetailedCombatRecord> {
        self.detailed.iter().find(|r| r.id == id)
    }

    /// Record that ended closest to `time` within the given tolerances
    pub fn find_near(
        &self,
        time: SimTime,
        coord: HexCoord,
        time_tolerance: f64,
        hex_tolerance: u32,
    ) -> Option<&CombatRecord> {
        self.records
            .iter()
            .filter(|r| (r.ended_at - time).abs() <= time_tolerance)
            .filter(|r| r.coord.within(&coord, hex_tolerance))
            .min_by(|a, b| {
                let da = (a.ended_at - time).abs();
                let db = (b.ended_at - time).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}
