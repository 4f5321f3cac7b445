//! Army-vs-army engagements
//!
//! An `ActiveCombat` moves through `RangedExchange -> MeleeEngagement ->
//! Cleanup -> Ended`. The phase follows elapsed simulated time against two
//! thresholds and never moves backwards; `Ended` is only set by the system
//! once a termination condition is observed.
//!
//! Each tick:
//! 1. delta time from engagement-relative elapsed time
//! 2. phase update (transition reported to the caller)
//! 3. damage for the current phase, both directions at once
//! 4. priority-ordered damage application and ledger bookkeeping

use serde::{Deserialize, Serialize};

use crate::battle::damage::{
    apply_damage_to_side, dps_breakdown, total_dps, Charge, DamageModifiers, DamageOutcome,
};
use crate::battle::hex::HexCoord;
use crate::battle::history::{CombatOutcome, PhaseReport};
use crate::battle::research::ResearchContext;
use crate::battle::side::{Side, SideCombatState};
use crate::battle::terrain::{Terrain, TerrainModifiers};
use crate::battle::unit_type::{UnitCategory, UnitType};
use crate::battle::world::{Army, World};
use crate::core::config::CombatConfig;
use crate::core::types::{ArmyId, CombatId, SimTime};

const RANGED_FORCE: &[UnitCategory] = &[UnitCategory::Ranged, UnitCategory::Siege];
const MELEE_FORCE: &[UnitCategory] = &[UnitCategory::Infantry, UnitCategory::Cavalry];

/// Engagement phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CombatPhase {
    RangedExchange,
    MeleeEngagement,
    Cleanup,
    Ended,
}

impl CombatPhase {
    /// Phase implied by elapsed time alone
    pub fn from_elapsed(elapsed: f64, config: &CombatConfig) -> Self {
        if elapsed < config.ranged_exchange_duration {
            CombatPhase::RangedExchange
        } else if elapsed < config.cleanup_start() {
            CombatPhase::MeleeEngagement
        } else {
            CombatPhase::Cleanup
        }
    }
}

/// What happened during one engagement tick
#[derive(Debug, Clone, Default)]
pub struct CombatTick {
    pub phase_change: Option<(CombatPhase, CombatPhase)>,
    pub attacker_damage: f64,
    pub defender_damage: f64,
    /// Units lost by the attacking side
    pub attacker_losses: DamageOutcome,
    /// Units lost by the defending side
    pub defender_losses: DamageOutcome,
}

/// An in-flight army-vs-army engagement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveCombat {
    pub id: CombatId,
    pub attacker: SideCombatState,
    pub defender: SideCombatState,
    pub coord: HexCoord,
    pub terrain: Terrain,
    pub modifiers: TerrainModifiers,
    pub phase: CombatPhase,
    pub started_at: SimTime,
    /// Simulated seconds since `started_at` covered so far
    pub elapsed: f64,
    /// One entry per phase entered, in order
    pub phases: Vec<PhaseReport>,
    pub outcome: Option<CombatOutcome>,
}

impl ActiveCombat {
    /// Create an engagement; terrain modifiers are fixed from here on
    pub fn new(
        id: CombatId,
        attacker: SideCombatState,
        defender: SideCombatState,
        coord: HexCoord,
        terrain: Terrain,
        now: SimTime,
    ) -> Self {
        Self {
            id,
            attacker,
            defender,
            coord,
            terrain,
            modifiers: terrain.modifiers(),
            phase: CombatPhase::RangedExchange,
            started_at: now,
            elapsed: 0.0,
            phases: vec![PhaseReport::new(CombatPhase::RangedExchange, 0.0)],
            outcome: None,
        }
    }

    pub fn side(&self, side: Side) -> &SideCombatState {
        match side {
            Side::Attacker => &self.attacker,
            Side::Defender => &self.defender,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut SideCombatState {
        match side {
            Side::Attacker => &mut self.attacker,
            Side::Defender => &mut self.defender,
        }
    }

    /// Side an army fights on, if it participates
    pub fn side_of(&self, army: ArmyId) -> Option<Side> {
        if self.attacker.armies.contains(&army) {
            Some(Side::Attacker)
        } else if self.defender.armies.contains(&army) {
            Some(Side::Defender)
        } else {
            None
        }
    }

    pub fn involves(&self, army: ArmyId) -> bool {
        self.side_of(army).is_some()
    }

    /// Every participating army, attackers first
    pub fn all_armies(&self) -> Vec<ArmyId> {
        self.attacker
            .armies
            .iter()
            .chain(self.defender.armies.iter())
            .copied()
            .collect()
    }

    pub fn is_ended(&self) -> bool {
        self.phase == CombatPhase::Ended
    }

    pub fn attacker_modifiers(&self, research: ResearchContext, config: &CombatConfig) -> DamageModifiers {
        DamageModifiers::new(research, config.minimum_unit_dps)
            .with_terrain(self.modifiers.attacker_penalty, 0.0)
    }

    pub fn defender_modifiers(&self, research: ResearchContext, config: &CombatConfig) -> DamageModifiers {
        DamageModifiers::new(research, config.minimum_unit_dps)
            .with_terrain(0.0, self.modifiers.defender_bonus)
    }

    /// Next phase for the current elapsed time and composition (never regresses)
    fn next_phase(&self, config: &CombatConfig) -> CombatPhase {
        let phase = self.phase.max(CombatPhase::from_elapsed(self.elapsed, config));
        let force_lost = match phase {
            CombatPhase::RangedExchange => {
                self.force_lost(&self.attacker, RANGED_FORCE) || self.force_lost(&self.defender, RANGED_FORCE)
            }
            CombatPhase::MeleeEngagement => {
                self.force_lost(&self.attacker, MELEE_FORCE) || self.force_lost(&self.defender, MELEE_FORCE)
            }
            _ => false,
        };
        if force_lost {
            CombatPhase::Cleanup
        } else {
            phase
        }
    }

    /// A side that brought units of `categories` has none of them left
    fn force_lost(&self, side: &SideCombatState, categories: &[UnitCategory]) -> bool {
        let brought: u32 = categories.iter().map(|c| side.initial_category_count(*c)).sum();
        let left: u32 = categories.iter().map(|c| side.category_count(*c)).sum();
        brought > 0 && left == 0
    }

    /// Charge multipliers for the tick covering `[elapsed - dt, elapsed]`,
    /// scaled by how much of that tick lies inside the charge window
    fn charge(&self, config: &CombatConfig, dt: f64) -> Option<Charge> {
        if self.phase != CombatPhase::MeleeEngagement || dt <= 0.0 {
            return None;
        }
        let window_start = config.ranged_exchange_duration;
        let window_end = window_start + config.charge_window;
        let overlap = self.elapsed.min(window_end) - (self.elapsed - dt).max(window_start);
        if overlap <= 0.0 {
            return None;
        }
        let share = (overlap / dt).min(1.0);
        Some(Charge {
            cavalry: 1.0 + (config.cavalry_charge_multiplier - 1.0) * share,
            infantry: 1.0 + (config.infantry_charge_multiplier - 1.0) * share,
        })
    }

    /// Per-unit-type DPS of `side` against `enemy` in the current phase
    fn phase_breakdown(
        &self,
        side: &SideCombatState,
        enemy: &SideCombatState,
        mods: &DamageModifiers,
        config: &CombatConfig,
        dt: f64,
    ) -> Vec<(UnitType, f64)> {
        match self.phase {
            CombatPhase::RangedExchange => {
                dps_breakdown(side, enemy, |c| c.is_ranged_or_siege(), None, mods)
            }
            CombatPhase::MeleeEngagement => {
                let mut rates = dps_breakdown(side, enemy, |c| c.is_ranged_or_siege(), None, mods);
                rates.extend(dps_breakdown(side, enemy, |c| c.is_melee(), self.charge(config, dt), mods));
                rates
            }
            CombatPhase::Cleanup => dps_breakdown(side, enemy, |_| true, None, mods),
            CombatPhase::Ended => Vec::new(),
        }
    }

    /// Advance the engagement to simulated time `now`
    pub fn advance(
        &mut self,
        now: SimTime,
        config: &CombatConfig,
        attacker_research: ResearchContext,
        defender_research: ResearchContext,
    ) -> CombatTick {
        let mut tick = CombatTick::default();
        if self.is_ended() {
            return tick;
        }

        let elapsed = (now - self.started_at).max(0.0);
        let dt = elapsed - self.elapsed;
        if dt <= 0.0 {
            return tick;
        }
        self.elapsed = elapsed;

        let next = self.next_phase(config);
        if next != self.phase {
            tick.phase_change = Some((self.phase, next));
            self.phase = next;
            let phase_start = match next {
                CombatPhase::MeleeEngagement => config.ranged_exchange_duration.min(elapsed),
                _ => elapsed - dt,
            };
            self.phases.push(PhaseReport::new(next, phase_start));
        }

        let attacker_mods = self.attacker_modifiers(attacker_research, config);
        let defender_mods = self.defender_modifiers(defender_research, config);
        let attacker_rates = self.phase_breakdown(&self.attacker, &self.defender, &attacker_mods, config, dt);
        let defender_rates = self.phase_breakdown(&self.defender, &self.attacker, &defender_mods, config, dt);

        let attacker_dps: f64 = attacker_rates.iter().map(|(_, dps)| dps).sum();
        let defender_dps: f64 = defender_rates.iter().map(|(_, dps)| dps).sum();
        tick.attacker_damage = attacker_dps * dt;
        tick.defender_damage = defender_dps * dt;

        // Damage dealt is credited to unit types by their share of side DPS
        for (unit, dps) in &attacker_rates {
            self.attacker.credit_damage(*unit, dps * dt);
        }
        for (unit, dps) in &defender_rates {
            self.defender.credit_damage(*unit, dps * dt);
        }

        tick.defender_losses = apply_damage_to_side(&mut self.defender, tick.attacker_damage);
        tick.attacker_losses = apply_damage_to_side(&mut self.attacker, tick.defender_damage);

        if let Some(report) = self.phases.last_mut() {
            report.duration = elapsed - report.started_at;
            report.attacker_damage_dealt += tick.attacker_damage;
            report.defender_damage_dealt += tick.defender_damage;
            report.attacker_casualties += tick.attacker_losses.total_killed();
            report.defender_casualties += tick.defender_losses.total_killed();
        }

        tracing::trace!(
            combat = %self.id,
            phase = ?self.phase,
            attacker_damage = tick.attacker_damage,
            defender_damage = tick.defender_damage,
            "engagement tick"
        );

        tick
    }

    /// Either side wiped out, or the engagement ran past its time limit
    pub fn should_end(&self, config: &CombatConfig) -> bool {
        self.attacker.is_empty()
            || self.defender.is_empty()
            || self.elapsed >= config.max_engagement_duration
    }

    /// Winner: the emptied side loses; otherwise higher total DPS, then more units
    pub fn determine_outcome(
        &self,
        config: &CombatConfig,
        attacker_research: ResearchContext,
        defender_research: ResearchContext,
    ) -> CombatOutcome {
        match (self.attacker.is_empty(), self.defender.is_empty()) {
            (true, true) => return CombatOutcome::Draw,
            (true, false) => return CombatOutcome::DefenderVictory,
            (false, true) => return CombatOutcome::AttackerVictory,
            (false, false) => {}
        }

        let attacker_dps = total_dps(
            &self.attacker,
            &self.defender,
            &self.attacker_modifiers(attacker_research, config),
        );
        let defender_dps = total_dps(
            &self.defender,
            &self.attacker,
            &self.defender_modifiers(defender_research, config),
        );

        if attacker_dps > defender_dps {
            CombatOutcome::AttackerVictory
        } else if defender_dps > attacker_dps {
            CombatOutcome::DefenderVictory
        } else {
            match self.attacker.total_units().cmp(&self.defender.total_units()) {
                std::cmp::Ordering::Greater => CombatOutcome::AttackerVictory,
                std::cmp::Ordering::Less => CombatOutcome::DefenderVictory,
                std::cmp::Ordering::Equal => CombatOutcome::Draw,
            }
        }
    }

    /// Freeze the engagement as ended
    pub fn finish(&mut self, outcome: CombatOutcome) {
        self.phase = CombatPhase::Ended;
        self.outcome = Some(outcome);
    }
}

/// Pair of hostile armies close enough to fight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contact {
    pub attacker: ArmyId,
    pub defender: ArmyId,
}

/// Can this army start or join a fight right now?
pub fn can_engage(army: &Army) -> bool {
    !army.in_combat && !army.is_retreating && !army.is_empty()
}

/// Hostile, free armies within `range` of each other
///
/// The army with a movement path is the attacker; otherwise the lower id.
/// Each army appears in at most one contact, lowest ids first.
pub fn find_contacts(world: &World, range: u32) -> Vec<Contact> {
    let free: Vec<&Army> = world.armies.values().filter(|a| can_engage(a)).collect();
    let mut taken: Vec<ArmyId> = Vec::new();
    let mut contacts = Vec::new();

    for (i, a) in free.iter().enumerate() {
        if taken.contains(&a.id) {
            continue;
        }
        for b in free.iter().skip(i + 1) {
            if taken.contains(&b.id) {
                continue;
            }
            if !world.are_hostile(a.owner, b.owner) || !a.coord.within(&b.coord, range) {
                continue;
            }
            let contact = if b.path.is_empty() || !a.path.is_empty() {
                Contact {
                    attacker: a.id,
                    defender: b.id,
                }
            } else {
                Contact {
                    attacker: b.id,
                    defender: a.id,
                }
            };
            taken.push(a.id);
            taken.push(b.id);
            contacts.push(contact);
            break;
        }
    }

    contacts
}
