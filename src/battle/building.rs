//! Building types and their static defensive statistics

use serde::{Deserialize, Serialize};

/// Building type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildingType {
    CityCenter,
    Castle,
    WatchTower,
    Barracks,
    House,
}

/// Immutable reference data for one building type
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BuildingStats {
    pub max_health: f64,
    /// Armies may bind to this building and retreat to it
    pub is_home_base: bool,
    /// Hex radius within which a garrison fires (`None` = no garrison defense)
    pub defense_range: Option<u32>,
    /// Hex radius of the building's footprint around its anchor coordinate
    pub footprint_radius: u32,
}

const CITY_CENTER: BuildingStats = BuildingStats {
    max_health: 2400.0,
    is_home_base: true,
    defense_range: Some(3),
    footprint_radius: 1,
};

const CASTLE: BuildingStats = BuildingStats {
    max_health: 4800.0,
    is_home_base: true,
    defense_range: Some(4),
    footprint_radius: 1,
};

const WATCH_TOWER: BuildingStats = BuildingStats {
    max_health: 1000.0,
    is_home_base: false,
    defense_range: Some(3),
    footprint_radius: 0,
};

const BARRACKS: BuildingStats = BuildingStats {
    max_health: 1500.0,
    is_home_base: false,
    defense_range: None,
    footprint_radius: 0,
};

const HOUSE: BuildingStats = BuildingStats {
    max_health: 550.0,
    is_home_base: false,
    defense_range: None,
    footprint_radius: 0,
};

impl BuildingType {
    pub fn stats(&self) -> &'static BuildingStats {
        match self {
            BuildingType::CityCenter => &CITY_CENTER,
            BuildingType::Castle => &CASTLE,
            BuildingType::WatchTower => &WATCH_TOWER,
            BuildingType::Barracks => &BARRACKS,
            BuildingType::House => &HOUSE,
        }
    }

    pub fn provides_garrison_defense(&self) -> bool {
        self.stats().defense_range.is_some()
    }

    pub fn is_home_base(&self) -> bool {
        self.stats().is_home_base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_bases_defend() {
        for building in [BuildingType::CityCenter, BuildingType::Castle] {
            assert!(building.is_home_base());
            assert!(building.provides_garrison_defense());
        }
    }

    #[test]
    fn test_house_is_undefended() {
        assert!(!BuildingType::House.provides_garrison_defense());
        assert!(!BuildingType::House.is_home_base());
    }

    #[test]
    fn test_castle_outlasts_tower() {
        assert!(BuildingType::Castle.stats().max_health > BuildingType::WatchTower.stats().max_health);
    }
}
