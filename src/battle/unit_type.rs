//! Unit types and their static combat statistics
//!
//! Stats live in a lookup table keyed by `UnitType`; combat behaviour is
//! written as functions over this data, never as per-type branches.

use serde::{Deserialize, Serialize};

/// Broad unit category. Gates which units fight in which engagement phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitCategory {
    Infantry,
    Cavalry,
    Ranged,
    Siege,
}

impl UnitCategory {
    pub const ALL: [UnitCategory; 4] = [
        UnitCategory::Infantry,
        UnitCategory::Cavalry,
        UnitCategory::Ranged,
        UnitCategory::Siege,
    ];

    /// Order in which incoming damage consumes a side's units
    pub const CASUALTY_PRIORITY: [UnitCategory; 4] = [
        UnitCategory::Siege,
        UnitCategory::Ranged,
        UnitCategory::Infantry,
        UnitCategory::Cavalry,
    ];

    pub fn is_ranged_or_siege(&self) -> bool {
        matches!(self, UnitCategory::Ranged | UnitCategory::Siege)
    }

    pub fn is_melee(&self) -> bool {
        matches!(self, UnitCategory::Infantry | UnitCategory::Cavalry)
    }
}

/// What kind of damage a unit's attack deals (selects the research bonus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageKind {
    Melee,
    Pierce,
    Siege,
}

/// Bonus damage per attack against each enemy category
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryBonus {
    pub infantry: f64,
    pub cavalry: f64,
    pub ranged: f64,
    pub siege: f64,
}

impl CategoryBonus {
    pub const NONE: CategoryBonus = CategoryBonus {
        infantry: 0.0,
        cavalry: 0.0,
        ranged: 0.0,
        siege: 0.0,
    };

    pub fn against(&self, category: UnitCategory) -> f64 {
        match category {
            UnitCategory::Infantry => self.infantry,
            UnitCategory::Cavalry => self.cavalry,
            UnitCategory::Ranged => self.ranged,
            UnitCategory::Siege => self.siege,
        }
    }
}

/// Immutable reference data for one unit type
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UnitStats {
    pub category: UnitCategory,
    pub damage_kind: DamageKind,
    pub base_damage: f64,
    /// Seconds between attacks
    pub attack_interval: f64,
    pub hit_points: f64,
    /// Hexes per second
    pub move_speed: f64,
    pub bonus_vs: CategoryBonus,
    pub melee_armor: f64,
    pub pierce_armor: f64,
    /// Damage per volley when firing from a garrisoned building (0 = cannot)
    pub garrison_volley: f64,
}

/// Military unit type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitType {
    // Infantry
    Swordsman,
    Pikeman,

    // Cavalry
    Scout,
    Knight,

    // Ranged
    Archer,
    Crossbowman,

    // Siege
    Mangonel,
    Trebuchet,
}

const SWORDSMAN: UnitStats = UnitStats {
    category: UnitCategory::Infantry,
    damage_kind: DamageKind::Melee,
    base_damage: 9.0,
    attack_interval: 1.5,
    hit_points: 60.0,
    move_speed: 0.9,
    bonus_vs: CategoryBonus {
        infantry: 0.0,
        cavalry: 0.0,
        ranged: 3.0,
        siege: 4.0,
    },
    melee_armor: 1.0,
    pierce_armor: 1.0,
    garrison_volley: 0.0,
};

const PIKEMAN: UnitStats = UnitStats {
    category: UnitCategory::Infantry,
    damage_kind: DamageKind::Melee,
    base_damage: 4.0,
    attack_interval: 2.0,
    hit_points: 55.0,
    move_speed: 0.9,
    bonus_vs: CategoryBonus {
        infantry: 0.0,
        cavalry: 18.0,
        ranged: 0.0,
        siege: 2.0,
    },
    melee_armor: 0.0,
    pierce_armor: 1.0,
    garrison_volley: 0.0,
};

const SCOUT: UnitStats = UnitStats {
    category: UnitCategory::Cavalry,
    damage_kind: DamageKind::Melee,
    base_damage: 5.0,
    attack_interval: 2.0,
    hit_points: 45.0,
    move_speed: 1.8,
    bonus_vs: CategoryBonus {
        infantry: 0.0,
        cavalry: 0.0,
        ranged: 4.0,
        siege: 6.0,
    },
    melee_armor: 0.0,
    pierce_armor: 2.0,
    garrison_volley: 0.0,
};

const KNIGHT: UnitStats = UnitStats {
    category: UnitCategory::Cavalry,
    damage_kind: DamageKind::Melee,
    base_damage: 12.0,
    attack_interval: 1.8,
    hit_points: 120.0,
    move_speed: 1.4,
    bonus_vs: CategoryBonus {
        infantry: 0.0,
        cavalry: 0.0,
        ranged: 2.0,
        siege: 4.0,
    },
    melee_armor: 2.0,
    pierce_armor: 2.0,
    garrison_volley: 0.0,
};

const ARCHER: UnitStats = UnitStats {
    category: UnitCategory::Ranged,
    damage_kind: DamageKind::Pierce,
    base_damage: 5.0,
    attack_interval: 2.0,
    hit_points: 30.0,
    move_speed: 1.0,
    bonus_vs: CategoryBonus {
        infantry: 1.0,
        cavalry: 0.0,
        ranged: 0.0,
        siege: 0.0,
    },
    melee_armor: 0.0,
    pierce_armor: 0.0,
    garrison_volley: 4.0,
};

const CROSSBOWMAN: UnitStats = UnitStats {
    category: UnitCategory::Ranged,
    damage_kind: DamageKind::Pierce,
    base_damage: 8.0,
    attack_interval: 2.5,
    hit_points: 40.0,
    move_speed: 0.9,
    bonus_vs: CategoryBonus {
        infantry: 2.0,
        cavalry: 0.0,
        ranged: 0.0,
        siege: 0.0,
    },
    melee_armor: 0.0,
    pierce_armor: 1.0,
    garrison_volley: 6.0,
};

const MANGONEL: UnitStats = UnitStats {
    category: UnitCategory::Siege,
    damage_kind: DamageKind::Siege,
    base_damage: 30.0,
    attack_interval: 5.0,
    hit_points: 100.0,
    move_speed: 0.6,
    bonus_vs: CategoryBonus {
        infantry: 5.0,
        cavalry: 0.0,
        ranged: 10.0,
        siege: 0.0,
    },
    melee_armor: 0.0,
    pierce_armor: 6.0,
    garrison_volley: 12.0,
};

const TREBUCHET: UnitStats = UnitStats {
    category: UnitCategory::Siege,
    damage_kind: DamageKind::Siege,
    base_damage: 80.0,
    attack_interval: 8.0,
    hit_points: 150.0,
    move_speed: 0.4,
    bonus_vs: CategoryBonus::NONE,
    melee_armor: 2.0,
    pierce_armor: 8.0,
    garrison_volley: 20.0,
};

impl UnitType {
    pub const ALL: [UnitType; 8] = [
        UnitType::Swordsman,
        UnitType::Pikeman,
        UnitType::Scout,
        UnitType::Knight,
        UnitType::Archer,
        UnitType::Crossbowman,
        UnitType::Mangonel,
        UnitType::Trebuchet,
    ];

    /// Static stats for this unit type
    pub fn stats(&self) -> &'static UnitStats {
        match self {
            UnitType::Swordsman => &SWORDSMAN,
            UnitType::Pikeman => &PIKEMAN,
            UnitType::Scout => &SCOUT,
            UnitType::Knight => &KNIGHT,
            UnitType::Archer => &ARCHER,
            UnitType::Crossbowman => &CROSSBOWMAN,
            UnitType::Mangonel => &MANGONEL,
            UnitType::Trebuchet => &TREBUCHET,
        }
    }

    pub fn category(&self) -> UnitCategory {
        self.stats().category
    }

    pub fn hit_points(&self) -> f64 {
        self.stats().hit_points
    }

    /// Can this unit fire from inside a building?
    pub fn can_garrison_fire(&self) -> bool {
        self.stats().garrison_volley > 0.0
    }

    /// Parse a unit type name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "swordsman" => Some(UnitType::Swordsman),
            "pikeman" => Some(UnitType::Pikeman),
            "scout" => Some(UnitType::Scout),
            "knight" => Some(UnitType::Knight),
            "archer" => Some(UnitType::Archer),
            "crossbowman" => Some(UnitType::Crossbowman),
            "mangonel" => Some(UnitType::Mangonel),
            "trebuchet" => Some(UnitType::Trebuchet),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(UnitType::Swordsman.category(), UnitCategory::Infantry);
        assert_eq!(UnitType::Knight.category(), UnitCategory::Cavalry);
        assert_eq!(UnitType::Crossbowman.category(), UnitCategory::Ranged);
        assert_eq!(UnitType::Trebuchet.category(), UnitCategory::Siege);
    }

    #[test]
    fn test_stats_sane() {
        for unit in UnitType::ALL {
            let stats = unit.stats();
            assert!(stats.hit_points > 0.0, "{:?}", unit);
            assert!(stats.attack_interval > 0.0, "{:?}", unit);
            assert!(stats.base_damage >= 0.0, "{:?}", unit);
        }
    }

    #[test]
    fn test_pikemen_counter_cavalry() {
        let pike = UnitType::Pikeman.stats();
        assert!(pike.bonus_vs.against(UnitCategory::Cavalry) > pike.base_damage);
    }

    #[test]
    fn test_only_ranged_and_siege_garrison() {
        for unit in UnitType::ALL {
            assert_eq!(unit.can_garrison_fire(), unit.category().is_ranged_or_siege());
        }
    }

    #[test]
    fn test_casualty_priority_covers_all_categories() {
        let mut seen = UnitCategory::CASUALTY_PRIORITY.to_vec();
        seen.sort();
        assert_eq!(seen, UnitCategory::ALL.to_vec());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(UnitType::from_name("ARCHER"), Some(UnitType::Archer));
        assert_eq!(UnitType::from_name("dragon"), None);
    }
}
