use thiserror::Error;

use crate::core::types::{ArmyId, BuildingId, CombatId, VillagerGroupId};

#[derive(Error, Debug)]
pub enum CombatError {
    #[error("Army not found: {0:?}")]
    ArmyNotFound(ArmyId),

    #[error("Building not found: {0:?}")]
    BuildingNotFound(BuildingId),

    #[error("Villager group not found: {0:?}")]
    VillagerGroupNotFound(VillagerGroupId),

    #[error("Engagement not found: {0}")]
    CombatNotFound(CombatId),

    #[error("Participants are not hostile: {0}")]
    NotHostile(String),

    #[error("Army {0:?} is already engaged")]
    AlreadyEngaged(ArmyId),

    #[error("Army {0:?} has no units")]
    EmptyArmy(ArmyId),

    #[error("Target out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, CombatError>;
