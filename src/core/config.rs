//! Combat configuration with documented constants
//!
//! All tunable numbers for the combat core are collected here. A config is
//! handed to each `CombatSystem` on construction; there is no global instance,
//! so independent matches can run side by side with different tunings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{CombatError, Result};

/// Configuration for the combat systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    // === ARMY VS ARMY ===
    /// Seconds of ranged exchange before melee begins
    pub ranged_exchange_duration: f64,

    /// Seconds of melee engagement before cleanup begins
    pub melee_engagement_duration: f64,

    /// Seconds after melee starts during which charge multipliers apply
    pub charge_window: f64,

    /// Melee damage multiplier for cavalry inside the charge window
    pub cavalry_charge_multiplier: f64,

    /// Melee damage multiplier for infantry inside the charge window
    pub infantry_charge_multiplier: f64,

    /// Floor on the per-unit damage rate of any unit type that is present
    pub minimum_unit_dps: f64,

    /// Engagements running longer than this end on the tiebreak rules
    pub max_engagement_duration: f64,

    /// Hex distance at which hostile armies count as in contact (0 = same hex)
    pub contact_range: u32,

    // === SIEGE ===
    /// Simulated seconds between siege phase ticks
    pub siege_phase_interval: f64,

    /// Flat damage added per phase tick when siege units are present
    pub siege_bonus_vs_buildings: f64,

    /// Multiplier applied to siege-phase damage when siege units are present
    pub siege_multiplier: f64,

    /// Hex distance an attacker may stand from its target building
    pub siege_reach: u32,

    // === MASSACRE ===
    /// Minimum damage per second dealt to a villager group after armour
    pub massacre_minimum_dps: f64,

    // === GARRISON ===
    /// Simulated seconds between garrison volleys
    pub garrison_fire_interval: f64,

    // === HISTORY ===
    /// Maximum records retained in each history (oldest dropped first)
    pub history_capacity: usize,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            ranged_exchange_duration: 3.0,
            melee_engagement_duration: 10.0,
            charge_window: 1.0,
            cavalry_charge_multiplier: 1.2,
            infantry_charge_multiplier: 1.1,
            minimum_unit_dps: 0.1,
            max_engagement_duration: 300.0,
            contact_range: 0,

            siege_phase_interval: 1.0,
            siege_bonus_vs_buildings: 25.0,
            siege_multiplier: 1.5,
            siege_reach: 1,

            massacre_minimum_dps: 1.0,

            garrison_fire_interval: 1.0,

            history_capacity: 200,
        }
    }
}

impl CombatConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CombatConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file on disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Seconds from engagement start at which cleanup begins
    pub fn cleanup_start(&self) -> f64 {
        self.ranged_exchange_duration + self.melee_engagement_duration
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.ranged_exchange_duration < 0.0 || self.melee_engagement_duration <= 0.0 {
            return Err(CombatError::InvalidConfig(format!(
                "phase durations must be non-negative (ranged {}, melee {})",
                self.ranged_exchange_duration, self.melee_engagement_duration
            )));
        }

        if self.charge_window < 0.0 || self.charge_window > self.melee_engagement_duration {
            return Err(CombatError::InvalidConfig(format!(
                "charge_window ({}) must lie within the melee phase ({})",
                self.charge_window, self.melee_engagement_duration
            )));
        }

        if self.cavalry_charge_multiplier < 1.0
            || self.infantry_charge_multiplier < 1.0
            || self.siege_multiplier < 1.0
        {
            return Err(CombatError::InvalidConfig(
                "damage multipliers must be >= 1.0".into(),
            ));
        }

        if self.siege_phase_interval <= 0.0 || self.garrison_fire_interval <= 0.0 {
            return Err(CombatError::InvalidConfig(
                "tick intervals must be positive".into(),
            ));
        }

        if self.minimum_unit_dps < 0.0 || self.massacre_minimum_dps < 0.0 {
            return Err(CombatError::InvalidConfig(
                "minimum damage rates must be non-negative".into(),
            ));
        }

        if self.max_engagement_duration <= self.cleanup_start() {
            return Err(CombatError::InvalidConfig(format!(
                "max_engagement_duration ({}) must exceed cleanup start ({})",
                self.max_engagement_duration,
                self.cleanup_start()
            )));
        }

        if self.history_capacity == 0 {
            return Err(CombatError::InvalidConfig(
                "history_capacity must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
