use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

use crate::computer_player::Personality;
use crate::config::EngineConfig;
use crate::display::{
    course_table, game_simulation_table, odds_table, print_error, probability_bar, simulation_table,
};
use crate::error::{WgpError, WgpResult};
use crate::model::{default_course, players_from_handicaps, Course, Player, PlayerId, PLAYERS_PER_GAME};
use crate::monte_carlo::{run_monte_carlo, MonteCarloEngine, MonteCarloReport, MonteCarloTarget};
use crate::odds::{OddsCalculator, OddsContext};
use crate::probability::{expected_score, hole_difficulty, Lie, ProbabilityCalculator};
use crate::teams::TeamConfiguration;

#[derive(Parser)]
#[command(
    name = "wgp",
    version = "1.0.0",
    about = "Wolf Goat Pig toolkit: betting odds, shot probabilities, simulations and play."
)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Course file (JSON) to use instead of the built-in course
    #[arg(long, global = true)]
    course: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum LieArg {
    Tee,
    Fairway,
    #[value(name = "first_cut")]
    FirstCut,
    Rough,
    Bunker,
    Trees,
    Green,
}

impl LieArg {
    fn to_lie(&self) -> Lie {
        match self {
            LieArg::Tee => Lie::Tee,
            LieArg::Fairway => Lie::Fairway,
            LieArg::FirstCut => Lie::FirstCut,
            LieArg::Rough => Lie::Rough,
            LieArg::Bunker => Lie::Bunker,
            LieArg::Trees => Lie::Trees,
            LieArg::Green => Lie::Green,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum PersonalityArg {
    Aggressive,
    Conservative,
    Strategic,
    Balanced,
    Mixed,
}

#[derive(Subcommand)]
enum Commands {
    /// Real-time odds and betting scenarios for a hole
    Odds {
        /// Four handicaps in seat order (e.g., 8,12,15,20)
        #[arg(value_delimiter = ',', num_args = 1.., required = true)]
        handicaps: Vec<f64>,
        /// Hole number
        #[arg(long, default_value = "1")]
        hole: u8,
        /// Team setup: pending, solo, or partners:<seat>
        #[arg(short, long, default_value = "pending")]
        teams: String,
        /// Quarters at stake
        #[arg(short, long, default_value = "1")]
        wager: u32,
        /// Seat whose options are evaluated (defaults to the captain)
        #[arg(short, long)]
        perspective: Option<u32>,
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Shot success probability and hole score distribution
    Probability {
        /// Player handicap (0-36)
        handicap: f64,
        /// Distance to the hole in yards
        distance: f64,
        /// Current lie
        #[arg(short, long, default_value = "fairway")]
        lie: LieArg,
        /// Hole number (sets difficulty and the score distribution)
        #[arg(long, default_value = "1")]
        hole: u8,
    },
    /// Monte Carlo estimate of a single hole
    Simulate {
        /// Four handicaps in seat order
        #[arg(value_delimiter = ',', num_args = 1.., required = true)]
        handicaps: Vec<f64>,
        /// Hole number
        #[arg(long, default_value = "1")]
        hole: u8,
        /// Team setup: pending, solo, or partners:<seat>
        #[arg(short, long, default_value = "pending")]
        teams: String,
        /// Number of simulations
        #[arg(short = 'n', long, default_value = "10000")]
        sims: usize,
        /// RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
        /// Stop early once every interval is narrow enough
        #[arg(long)]
        early_stop: bool,
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Monte Carlo estimate of full 18-hole games
    SimulateGame {
        /// Four handicaps in seat order
        #[arg(value_delimiter = ',', num_args = 1.., required = true)]
        handicaps: Vec<f64>,
        /// Number of games
        #[arg(short = 'n', long, default_value = "500")]
        games: usize,
        /// RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
        /// Print JSON instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Interactive game against three computer players
    Play {
        /// Your handicap
        #[arg(long, default_value = "12")]
        handicap: f64,
        /// Computer opponents' personality
        #[arg(short, long, default_value = "mixed")]
        personality: PersonalityArg,
        /// RNG seed for opponents and their scores
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show the course card
    Course,
}

pub fn run() {
    let cli = Cli::parse();
    dispatch(cli);
}

fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("warn");
    let _ = env_logger::Builder::from_env(env).format_timestamp(None).try_init();
}

fn load_config(path: Option<&Path>) -> WgpResult<EngineConfig> {
    match path {
        Some(p) => EngineConfig::load(p),
        None => Ok(EngineConfig::default()),
    }
}

fn load_course(path: Option<&Path>) -> WgpResult<Course> {
    match path {
        Some(p) => {
            let json = std::fs::read_to_string(p)?;
            let course = Course::from_json(&json)?;
            log::info!("loaded course {} from {}", course.name, p.display());
            Ok(course)
        }
        None => Ok(default_course().clone()),
    }
}

fn dispatch(cli: Cli) {
    init_logging();
    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            print_error(&e.to_string());
            return;
        }
    };
    let course = match load_course(cli.course.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            print_error(&e.to_string());
            return;
        }
    };

    let result = match cli.command {
        Commands::Odds {
            handicaps,
            hole,
            teams,
            wager,
            perspective,
            json,
        } => cmd_odds(&config, &course, &handicaps, hole, &teams, wager, perspective, json),
        Commands::Probability {
            handicap,
            distance,
            lie,
            hole,
        } => cmd_probability(&config, &course, handicap, distance, lie.to_lie(), hole),
        Commands::Simulate {
            handicaps,
            hole,
            teams,
            sims,
            seed,
            early_stop,
            json,
        } => cmd_simulate(&config, &course, &handicaps, hole, &teams, sims, seed, early_stop, json),
        Commands::SimulateGame {
            handicaps,
            games,
            seed,
            json,
        } => cmd_simulate_game(&config, &course, &handicaps, games, seed, json),
        Commands::Play {
            handicap,
            personality,
            seed,
        } => {
            let personality = match personality {
                PersonalityArg::Aggressive => Some(Personality::Aggressive),
                PersonalityArg::Conservative => Some(Personality::Conservative),
                PersonalityArg::Strategic => Some(Personality::Strategic),
                PersonalityArg::Balanced => Some(Personality::Balanced),
                PersonalityArg::Mixed => None,
            };
            crate::play::play_command(config.clone(), course.clone(), handicap, personality, seed);
            Ok(())
        }
        Commands::Course => {
            println!();
            println!("{}", course_table(&course));
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        print_error(&e.to_string());
    }
}

/// Captain of a hole: seats rotate one per hole.
fn captain_for(players: &[Player], hole: u8) -> PlayerId {
    let seat = (usize::from(hole.max(1)) - 1) % players.len().max(1);
    players[seat].id
}

/// Parses `pending`, `solo` or `partners:<seat>` for the hole's captain.
pub fn parse_teams(spec: &str, players: &[Player], captain: PlayerId) -> WgpResult<TeamConfiguration> {
    let spec = spec.trim().to_lowercase();
    let others: Vec<PlayerId> = players.iter().map(|p| p.id).filter(|&id| id != captain).collect();
    if others.len() != PLAYERS_PER_GAME - 1 {
        return Err(WgpError::Validation("captain must be one of the four players".to_string()));
    }
    match spec.as_str() {
        "pending" => Ok(TeamConfiguration::Pending),
        "solo" => Ok(TeamConfiguration::Solo {
            captain,
            opponents: [others[0], others[1], others[2]],
        }),
        s => {
            let seat = s
                .strip_prefix("partners:")
                .and_then(|n| n.parse::<u32>().ok())
                .ok_or_else(|| {
                    WgpError::Validation(format!(
                        "teams must be pending, solo or partners:<seat>, got '{}'",
                        spec
                    ))
                })?;
            let partner = PlayerId(seat);
            if !others.contains(&partner) {
                return Err(WgpError::Validation(format!(
                    "partner {} must be another seat than the captain {}",
                    partner, captain
                )));
            }
            let rest: Vec<PlayerId> = others.into_iter().filter(|&id| id != partner).collect();
            Ok(TeamConfiguration::Partners {
                team1: [captain, partner],
                team2: [rest[0], rest[1]],
            })
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_odds(
    config: &EngineConfig,
    course: &Course,
    handicaps: &[f64],
    hole_number: u8,
    teams: &str,
    wager: u32,
    perspective: Option<u32>,
    json: bool,
) -> WgpResult<()> {
    let players = players_from_handicaps(handicaps)?;
    let hole = course.hole(hole_number)?;
    let captain = captain_for(&players, hole_number);
    let mut context = OddsContext::pre_hole(captain, wager);
    context.teams = parse_teams(teams, &players, captain)?;
    context.float_available = true;
    context.holes_remaining = course.holes.len().saturating_sub(usize::from(hole_number)) + 1;
    if let Some(seat) = perspective {
        context = context.with_perspective(PlayerId(seat));
    }

    let calculator = OddsCalculator::new(config.odds.clone(), config.probability.clone());
    let odds = calculator.calculate_real_time_odds(&players, hole, &context);

    if json {
        println!("{}", serde_json::to_string_pretty(&odds)?);
        return Ok(());
    }

    println!();
    println!(
        "  {}  captain {}  {}  wager {}",
        hole.to_string().bold(),
        captain.to_string().bold(),
        context.teams,
        wager
    );
    println!();
    println!("{}", odds_table(&odds));
    println!(
        "  {}",
        format!("confidence {:.0}%, {:.1} ms", odds.confidence * 100.0, odds.computation_ms).dimmed()
    );
    println!();
    Ok(())
}

fn cmd_probability(
    config: &EngineConfig,
    course: &Course,
    handicap: f64,
    distance: f64,
    lie: Lie,
    hole_number: u8,
) -> WgpResult<()> {
    let hole = course.hole(hole_number)?;
    let calculator = ProbabilityCalculator::new(config.probability.clone());
    let difficulty = hole_difficulty(hole.stroke_index);
    let p = calculator.shot_success_probability(handicap, distance, lie, difficulty);
    let remaining = calculator.expected_strokes_remaining(handicap, distance, lie, difficulty);
    let distribution = calculator.hole_completion_distribution(handicap, hole);

    println!();
    println!(
        "  Handicap {} from {} yds ({}) on {}",
        format!("{}", handicap).bold(),
        distance,
        lie,
        hole
    );
    println!();
    println!("  Shot success: {}", probability_bar(p, 30));
    println!("  Expected strokes to hole out: {:.2}", remaining);
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Score".bold().to_string()),
        Cell::new("vs Par").set_alignment(CellAlignment::Right),
        Cell::new("Probability"),
    ]);
    for (&score, &prob) in &distribution {
        let rel = score - i32::from(hole.par);
        let label = match rel {
            r if r <= -2 => "eagle or better".to_string(),
            -1 => "birdie".to_string(),
            0 => "par".to_string(),
            1 => "bogey".to_string(),
            r => format!("+{}", r),
        };
        table.add_row(vec![
            Cell::new(score),
            Cell::new(label).set_alignment(CellAlignment::Right),
            Cell::new(probability_bar(prob, 24)),
        ]);
    }
    println!("{}", table);
    println!("  Expected gross score: {:.2}", expected_score(&distribution));
    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_simulate(
    config: &EngineConfig,
    course: &Course,
    handicaps: &[f64],
    hole_number: u8,
    teams: &str,
    sims: usize,
    seed: Option<u64>,
    early_stop: bool,
    json: bool,
) -> WgpResult<()> {
    let players = players_from_handicaps(handicaps)?;
    let hole = *course.hole(hole_number)?;
    let captain = captain_for(&players, hole_number);
    let teams = parse_teams(teams, &players, captain)?;

    let mut mc = config.monte_carlo.clone();
    mc.early_stopping = mc.early_stopping || early_stop;
    let engine = MonteCarloEngine::new(mc);
    let target = MonteCarloTarget::Hole { hole, teams };

    if !json {
        println!();
        println!(
            "  {}  ({} simulations{})",
            hole.to_string().bold(),
            sims.to_string().bold(),
            seed.map(|s| format!(", seed {}", s)).unwrap_or_default()
        );
    }
    let result = match run_monte_carlo(&engine, &players, &target, sims, seed) {
        MonteCarloReport::Hole(r) => r,
        MonteCarloReport::Game(_) => {
            return Err(WgpError::Validation("expected a hole simulation".to_string()))
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    println!();
    println!("{}", simulation_table(&result));
    let converged = if result.convergence_achieved {
        "converged".green().to_string()
    } else {
        "not converged".yellow().to_string()
    };
    println!(
        "  {} sims, {}, {:.0} ms, seed {}",
        result.simulations, converged, result.elapsed_ms, result.seed
    );
    if result.degraded {
        println!("  {}", "Inputs were invalid; nothing was simulated.".yellow());
    }
    println!();
    Ok(())
}

fn cmd_simulate_game(
    config: &EngineConfig,
    course: &Course,
    handicaps: &[f64],
    games: usize,
    seed: Option<u64>,
    json: bool,
) -> WgpResult<()> {
    let players = players_from_handicaps(handicaps)?;
    let engine = MonteCarloEngine::new(config.monte_carlo.clone());
    let target = MonteCarloTarget::FullGame {
        course: course.clone(),
    };
    let result = match run_monte_carlo(&engine, &players, &target, games, seed) {
        MonteCarloReport::Game(r) => r,
        MonteCarloReport::Hole(_) => {
            return Err(WgpError::Validation("expected a game simulation".to_string()))
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    println!();
    println!(
        "  {} on {}  ({} games, seed {})",
        "Full round".bold(),
        course.name,
        result.games,
        result.seed
    );
    println!();
    println!("{}", game_simulation_table(&result));
    println!("  {:.0} ms", result.elapsed_ms);
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn players() -> Vec<Player> {
        players_from_handicaps(&[8.0, 12.0, 15.0, 20.0]).unwrap()
    }

    #[test]
    fn captain_rotates_by_hole() {
        let players = players();
        assert_eq!(captain_for(&players, 1), PlayerId(1));
        assert_eq!(captain_for(&players, 4), PlayerId(4));
        assert_eq!(captain_for(&players, 5), PlayerId(1));
        assert_eq!(captain_for(&players, 18), PlayerId(2));
    }

    #[test]
    fn parses_team_specs() {
        let players = players();
        let captain = PlayerId(2);
        assert_eq!(parse_teams("pending", &players, captain).unwrap(), TeamConfiguration::Pending);
        assert_eq!(
            parse_teams("Solo", &players, captain).unwrap(),
            TeamConfiguration::Solo {
                captain,
                opponents: [PlayerId(1), PlayerId(3), PlayerId(4)]
            }
        );
        assert_eq!(
            parse_teams("partners:4", &players, captain).unwrap(),
            TeamConfiguration::Partners {
                team1: [PlayerId(2), PlayerId(4)],
                team2: [PlayerId(1), PlayerId(3)]
            }
        );
        assert!(parse_teams("partners:2", &players, captain).is_err());
        assert!(parse_teams("partners:x", &players, captain).is_err());
        assert!(parse_teams("threesome", &players, captain).is_err());
    }
}
