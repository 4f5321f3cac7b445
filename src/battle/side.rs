//! Per-participant state of an army-vs-army engagement

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::battle::unit_type::{UnitCategory, UnitType};
use crate::battle::world::{composition_total, Composition};
use crate::core::types::{ArmyId, PlayerId};

/// Which side of an engagement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Attacker,
    Defender,
}

impl Side {
    pub fn opponent(&self) -> Side {
        match self {
            Side::Attacker => Side::Defender,
            Side::Defender => Side::Attacker,
        }
    }
}

/// Running totals for one unit type on one side
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitLedger {
    pub damage_dealt: f64,
    pub damage_received: f64,
    pub killed: u32,
}

/// Live and initial composition of one side, plus its damage ledger
///
/// Live counts only ever decrease, so `live[t] <= initial[t]` for every type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideCombatState {
    pub owner: PlayerId,
    /// Contributing armies in join order (casualties are written back in this order)
    pub armies: Vec<ArmyId>,
    pub live: Composition,
    pub initial: Composition,
    pub ledger: BTreeMap<UnitType, UnitLedger>,
    /// Incoming damage not yet amounting to a whole unit
    pub pending_damage: f64,
}

impl SideCombatState {
    pub fn new(owner: PlayerId) -> Self {
        Self {
            owner,
            armies: Vec::new(),
            live: Composition::new(),
            initial: Composition::new(),
            ledger: BTreeMap::new(),
            pending_damage: 0.0,
        }
    }

    /// Build a side directly from a composition (no backing army)
    pub fn from_composition(owner: PlayerId, composition: &Composition) -> Self {
        let mut side = Self::new(owner);
        side.add_units(composition);
        side
    }

    /// Add an army's units to both live and initial counts
    pub fn add_army(&mut self, army: ArmyId, composition: &Composition) {
        if !self.armies.contains(&army) {
            self.armies.push(army);
        }
        self.add_units(composition);
    }

    fn add_units(&mut self, composition: &Composition) {
        for (unit, count) in composition {
            if *count == 0 {
                continue;
            }
            *self.live.entry(*unit).or_insert(0) += count;
            *self.initial.entry(*unit).or_insert(0) += count;
        }
    }

    pub fn count(&self, unit: UnitType) -> u32 {
        self.live.get(&unit).copied().unwrap_or(0)
    }

    pub fn total_units(&self) -> u32 {
        composition_total(&self.live)
    }

    pub fn initial_units(&self) -> u32 {
        composition_total(&self.initial)
    }

    pub fn is_empty(&self) -> bool {
        self.total_units() == 0
    }

    pub fn category_count(&self, category: UnitCategory) -> u32 {
        self.live
            .iter()
            .filter(|(unit, _)| unit.category() == category)
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn initial_category_count(&self, category: UnitCategory) -> u32 {
        self.initial
            .iter()
            .filter(|(unit, _)| unit.category() == category)
            .map(|(_, count)| *count)
            .sum()
    }

    /// Fraction of live units in a category (0 when the side is empty)
    pub fn category_ratio(&self, category: UnitCategory) -> f64 {
        let total = self.total_units();
        if total == 0 {
            return 0.0;
        }
        self.category_count(category) as f64 / total as f64
    }

    /// Remove killed units and book them in the ledger
    pub(crate) fn kill(&mut self, unit: UnitType, count: u32) -> u32 {
        let Some(live) = self.live.get_mut(&unit) else {
            return 0;
        };
        let killed = count.min(*live);
        *live -= killed;
        if *live == 0 {
            self.live.remove(&unit);
        }
        let ledger = self.ledger.entry(unit).or_default();
        ledger.killed += killed;
        ledger.damage_received += killed as f64 * unit.hit_points();
        killed
    }

    pub(crate) fn credit_damage(&mut self, unit: UnitType, amount: f64) {
        if amount > 0.0 {
            self.ledger.entry(unit).or_default().damage_dealt += amount;
        }
    }
}
