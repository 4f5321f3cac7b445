//! Combat resolution - armies, buildings, villagers and garrisons
//!
//! Four kinds of engagement share one damage model:
//! - Army vs army: phase machine (ranged exchange, melee, cleanup)
//! - Army vs building: discrete siege phase ticks
//! - Army vs villagers: accumulated kills with weak retaliation
//! - Garrison vs army: buildings firing on hostile armies in range
//!
//! `CombatSystem` advances all of them once per simulation tick and reports
//! what happened as an ordered list of events.

pub mod building;
pub mod damage;
pub mod engagement;
pub mod events;
pub mod garrison;
pub mod hex;
pub mod history;
pub mod massacre;
pub mod pathfinding;
pub mod research;
pub mod retreat;
pub mod side;
pub mod siege;
pub mod system;
pub mod terrain;
pub mod unit_type;
pub mod world;

// Re-exports for convenient access
pub use building::{BuildingStats, BuildingType};
pub use damage::{
    aggregate_dps, apply_damage_to_army_direct, apply_damage_to_side, melee_dps, ranged_dps,
    total_dps, Charge, DamageModifiers, DamageOutcome,
};
pub use engagement::{find_contacts, ActiveCombat, CombatPhase, CombatTick, Contact};
pub use events::CombatEvent;
pub use garrison::{GarrisonHit, GarrisonMarker, GarrisonState, GarrisonVolley};
pub use hex::HexCoord;
pub use history::{
    BuildingDamageReport, CombatHistory, CombatKind, CombatOutcome, CombatRecord,
    DetailedCombatRecord, Participant, ParticipantSummary, PhaseReport, UnitTypeReport,
};
pub use massacre::{MassacreEngagement, MassacreStatus};
pub use pathfinding::GridMap;
pub use research::ResearchContext;
pub use retreat::{auto_retreat, evacuate_footprint};
pub use side::{Side, SideCombatState};
pub use siege::{BuildingEngagement, SiegeStatus};
pub use system::CombatSystem;
pub use terrain::{Terrain, TerrainModifiers};
pub use unit_type::{DamageKind, UnitCategory, UnitStats, UnitType};
pub use world::{
    Army, Building, Composition, MapServices, Pathfinder, Player, TerrainSource, VillagerGroup,
    World,
};
