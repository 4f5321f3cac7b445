//! Strategic terrain types and their combat effects
//!
//! Terrain is read once, under the defender, when an engagement is created.

use serde::{Deserialize, Serialize};

/// Terrain type of a map hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Terrain {
    #[default]
    Plains,
    Forest,
    Hills,
    Mountains,
    Marsh,
    Desert,
}

/// Combat modifiers derived from terrain, fixed for one engagement
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TerrainModifiers {
    /// Fractional damage bonus for the defending side
    pub defender_bonus: f64,
    /// Fractional damage penalty for the attacking side
    pub attacker_penalty: f64,
}

impl Terrain {
    /// Damage bonus for armies defending on this terrain
    pub fn defender_bonus(&self) -> f64 {
        match self {
            Terrain::Plains => 0.0,
            Terrain::Forest => 0.15,
            Terrain::Hills => 0.25,
            Terrain::Mountains => 0.4,
            Terrain::Marsh => 0.0,
            Terrain::Desert => 0.05,
        }
    }

    /// Damage penalty for armies attacking into this terrain
    pub fn attacker_penalty(&self) -> f64 {
        match self {
            Terrain::Plains => 0.0,
            Terrain::Forest => 0.1,
            Terrain::Hills => 0.05,
            Terrain::Mountains => 0.2,
            Terrain::Marsh => 0.2,
            Terrain::Desert => 0.1,
        }
    }

    pub fn modifiers(&self) -> TerrainModifiers {
        TerrainModifiers {
            defender_bonus: self.defender_bonus(),
            attacker_penalty: self.attacker_penalty(),
        }
    }

    /// Parse a terrain name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "plains" => Some(Terrain::Plains),
            "forest" => Some(Terrain::Forest),
            "hills" => Some(Terrain::Hills),
            "mountains" => Some(Terrain::Mountains),
            "marsh" => Some(Terrain::Marsh),
            "desert" => Some(Terrain::Desert),
            _ => None,
        }
    }
}
