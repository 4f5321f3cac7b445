//! Headless Combat Simulator
//!
//! Runs many independent army-vs-army trials in parallel and prints win rates
//! for balance evaluation.

use std::path::PathBuf;

use clap::Parser;
use hexwar_combat::battle::{
    Army, CombatOutcome, CombatSystem, Composition, GridMap, HexCoord, Player, Terrain, UnitType,
    World,
};
use hexwar_combat::core::config::CombatConfig;
use hexwar_combat::core::types::{ArmyId, PlayerId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;

/// Headless Combat Simulator - batch army-vs-army trials
#[derive(Parser, Debug)]
#[command(name = "combat_sim")]
#[command(about = "Run batches of army-vs-army engagements and report win rates")]
struct Args {
    /// Attacker composition, e.g. "swordsman:10,archer:5"
    #[arg(long)]
    attacker: String,

    /// Defender composition, e.g. "pikeman:8,crossbowman:6"
    #[arg(long)]
    defender: String,

    /// Terrain under the defender
    #[arg(long, default_value = "plains")]
    terrain: String,

    /// Number of independent trials
    #[arg(long, default_value_t = 100)]
    trials: u64,

    /// Base seed; trial N uses seed + N
    #[arg(long)]
    seed: Option<u64>,

    /// Random +/- fraction applied to every unit count (0 = exact compositions)
    #[arg(long, default_value_t = 0.0)]
    jitter: f64,

    /// Combat config TOML file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Simulated seconds before a trial is abandoned
    #[arg(long, default_value_t = 600.0)]
    max_time: f64,

    /// Simulated seconds per tick
    #[arg(long, default_value_t = 0.1)]
    dt: f64,
}

/// Result of one trial
#[derive(Debug, Clone, Serialize)]
struct TrialResult {
    outcome: Option<CombatOutcome>,
    duration: f64,
    attacker_survivors: u32,
    defender_survivors: u32,
}

/// JSON output structure
#[derive(Serialize)]
struct BatchSummary {
    trials: u64,
    attacker_wins: u64,
    defender_wins: u64,
    draws: u64,
    unresolved: u64,
    attacker_win_rate: f64,
    mean_duration: f64,
    mean_attacker_survivors: f64,
    mean_defender_survivors: f64,
    terrain: Terrain,
    seed: u64,
}

fn parse_composition(text: &str) -> Result<Composition, String> {
    let mut composition = Composition::new();
    for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, count) = entry
            .split_once(':')
            .ok_or_else(|| format!("expected unit:count, got '{}'", entry))?;
        let unit = UnitType::from_name(name.trim()).ok_or_else(|| format!("unknown unit type '{}'", name))?;
        let count: u32 = count
            .trim()
            .parse()
            .map_err(|e| format!("bad count in '{}': {}", entry, e))?;
        *composition.entry(unit).or_insert(0) += count;
    }
    if composition.values().sum::<u32>() == 0 {
        return Err(format!("composition '{}' has no units", text));
    }
    Ok(composition)
}

fn jittered(composition: &Composition, jitter: f64, rng: &mut ChaCha8Rng) -> Composition {
    if jitter <= 0.0 {
        return composition.clone();
    }
    composition
        .iter()
        .map(|(unit, count)| {
            let factor = rng.gen_range(1.0 - jitter..=1.0 + jitter);
            (*unit, (*count as f64 * factor).round().max(1.0) as u32)
        })
        .collect()
}

fn run_trial(
    config: &CombatConfig,
    attacker: &Composition,
    defender: &Composition,
    terrain: Terrain,
    args: &Args,
    seed: u64,
) -> TrialResult {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let coord = HexCoord::new(4, 4);

    let mut map = GridMap::new(8, 8);
    map.set_terrain(coord, terrain);

    let mut world = World::new();
    world.add_player(Player::new(PlayerId(1)));
    world.add_player(Player::new(PlayerId(2)));

    let mut attacking = Army::new(ArmyId(0), PlayerId(1), coord);
    attacking.composition = jittered(attacker, args.jitter, &mut rng);
    let mut defending = Army::new(ArmyId(0), PlayerId(2), coord);
    defending.composition = jittered(defender, args.jitter, &mut rng);
    let attacker_id = world.spawn_army(attacking);
    let defender_id = world.spawn_army(defending);

    let mut system = CombatSystem::new(config.clone());
    if let Err(e) = system.start_army_combat(&mut world, &map, attacker_id, defender_id, 0.0) {
        tracing::warn!("Trial seed {} could not start: {}", seed, e);
        return TrialResult {
            outcome: None,
            duration: 0.0,
            attacker_survivors: 0,
            defender_survivors: 0,
        };
    }

    let mut now = 0.0;
    while system.active_count() > 0 && now < args.max_time {
        now += args.dt;
        system.tick(&mut world, &map, now);
    }

    match system.history().latest() {
        Some(record) => TrialResult {
            outcome: Some(record.outcome),
            duration: record.duration(),
            attacker_survivors: record.attacker.final_strength,
            defender_survivors: record.defender.final_strength,
        },
        None => TrialResult {
            outcome: None,
            duration: now,
            attacker_survivors: world.army(attacker_id).map_or(0, |a| a.total_units()),
            defender_survivors: world.army(defender_id).map_or(0, |a| a.total_units()),
        },
    }
}

fn summarize(results: &[TrialResult], terrain: Terrain, seed: u64) -> BatchSummary {
    let count = |outcome: Option<CombatOutcome>| results.iter().filter(|r| r.outcome == outcome).count() as u64;
    let n = results.len().max(1) as f64;
    let attacker_wins = count(Some(CombatOutcome::AttackerVictory));

    BatchSummary {
        trials: results.len() as u64,
        attacker_wins,
        defender_wins: count(Some(CombatOutcome::DefenderVictory)),
        draws: count(Some(CombatOutcome::Draw)),
        unresolved: count(None),
        attacker_win_rate: attacker_wins as f64 / n,
        mean_duration: results.iter().map(|r| r.duration).sum::<f64>() / n,
        mean_attacker_survivors: results.iter().map(|r| r.attacker_survivors as f64).sum::<f64>() / n,
        mean_defender_survivors: results.iter().map(|r| r.defender_survivors as f64).sum::<f64>() / n,
        terrain,
        seed,
    }
}

fn print_json(summary: &BatchSummary) {
    match serde_json::to_string_pretty(summary) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize summary: {}", e);
            std::process::exit(1);
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    let config = match &args.config {
        Some(path) => CombatConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config '{}': {}", path.display(), e);
            eprintln!("Using default config");
            CombatConfig::default()
        }),
        None => CombatConfig::default(),
    };

    let terrain = Terrain::from_name(&args.terrain).unwrap_or_else(|| {
        eprintln!("Unknown terrain '{}', defaulting to plains", args.terrain);
        Terrain::Plains
    });

    let (attacker, defender) = match (parse_composition(&args.attacker), parse_composition(&args.defender)) {
        (Ok(a), Ok(d)) => (a, d),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    tracing::info!("Running {} trials on {:?} (seed {})", args.trials, terrain, seed);

    let results: Vec<TrialResult> = (0..args.trials)
        .into_par_iter()
        .map(|trial| run_trial(&config, &attacker, &defender, terrain, &args, seed.wrapping_add(trial)))
        .collect();

    let summary = summarize(&results, terrain, seed);

    match args.format.as_str() {
        "json" => print_json(&summary),
        "text" => {
            println!("Combat Simulation");
            println!("=================");
            println!("Trials: {} on {:?}", summary.trials, summary.terrain);
            println!(
                "Attacker wins: {} ({:.1}%)",
                summary.attacker_wins,
                summary.attacker_win_rate * 100.0
            );
            println!("Defender wins: {}", summary.defender_wins);
            println!("Draws: {}", summary.draws);
            println!("Unresolved: {}", summary.unresolved);
            println!("Mean duration: {:.1}s", summary.mean_duration);
            println!(
                "Mean survivors: {:.1} attacker / {:.1} defender",
                summary.mean_attacker_survivors, summary.mean_defender_survivors
            );
            println!("Seed: {}", summary.seed);
        }
        _ => {
            eprintln!("Unknown format '{}', defaulting to json", args.format);
            print_json(&summary);
        }
    }
}
