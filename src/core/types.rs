//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Simulated game clock in seconds (monotonic, never wall-clock)
pub type SimTime = f64;

/// Unique identifier for armies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArmyId(pub u32);

impl ArmyId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Unique identifier for buildings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingId(pub u32);

impl BuildingId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Unique identifier for villager groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VillagerGroupId(pub u32);

impl VillagerGroupId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Unique identifier for players
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl PlayerId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier shared by every engagement and the history records it produces
///
/// Allocated sequentially by the combat system so repeated runs of the same
/// match produce identical ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombatId(pub u64);

impl std::fmt::Display for CombatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "combat#{}", self.0)
    }
}
