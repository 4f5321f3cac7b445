//! Per-player research bonuses consumed by the damage model

use serde::{Deserialize, Serialize};

use crate::battle::unit_type::DamageKind;

/// Research state relevant to combat for one player
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResearchContext {
    /// Flat damage added to every melee attack
    pub melee_attack_bonus: f64,
    /// Flat damage added to every pierce attack
    pub pierce_attack_bonus: f64,
    /// Flat damage added to every siege attack
    pub siege_attack_bonus: f64,
    /// Scales the terrain defense bonus: `bonus * (1 + tactics_scaling)`
    pub tactics_scaling: f64,
    /// Multiplier on pierce-type garrison volleys
    pub garrison_pierce_multiplier: f64,
}

impl Default for ResearchContext {
    fn default() -> Self {
        Self {
            melee_attack_bonus: 0.0,
            pierce_attack_bonus: 0.0,
            siege_attack_bonus: 0.0,
            tactics_scaling: 0.0,
            garrison_pierce_multiplier: 1.0,
        }
    }
}

impl ResearchContext {
    pub fn none() -> Self {
        Self::default()
    }

    /// Flat attack bonus for a damage kind
    pub fn attack_bonus(&self, kind: DamageKind) -> f64 {
        match kind {
            DamageKind::Melee => self.melee_attack_bonus,
            DamageKind::Pierce => self.pierce_attack_bonus,
            DamageKind::Siege => self.siege_attack_bonus,
        }
    }
}
