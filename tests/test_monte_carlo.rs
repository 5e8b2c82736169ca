use std::thread;
use std::time::Duration;

use approx::assert_abs_diff_eq;
use wolf_goat_pig::config::MonteCarloConfig;
use wolf_goat_pig::model::{default_course, players_from_handicaps, Player, PlayerId};
use wolf_goat_pig::monte_carlo::*;
use wolf_goat_pig::teams::TeamConfiguration;

fn field() -> Vec<Player> {
    players_from_handicaps(&[6.0, 12.0, 18.0, 24.0]).unwrap()
}

fn partners() -> TeamConfiguration {
    TeamConfiguration::Partners {
        team1: [PlayerId(1), PlayerId(4)],
        team2: [PlayerId(2), PlayerId(3)],
    }
}

// ---------------------------------------------------------------------------
// Single holes
// ---------------------------------------------------------------------------

#[test]
fn test_seeded_runs_are_identical() {
    let engine = MonteCarloEngine::default();
    let hole = default_course().hole(3).unwrap();
    let a = engine.simulate_hole(&field(), hole, &partners(), 10_000, Some(42));
    let b = engine.simulate_hole(&field(), hole, &partners(), 10_000, Some(42));
    assert_eq!(a.simulations, 10_000);
    assert_eq!(a.win_probabilities(), b.win_probabilities());
    assert_eq!(a.ties, b.ties);
    assert_eq!(a.seed, 42);
}

#[test]
fn test_different_seeds_differ() {
    let engine = MonteCarloEngine::default();
    let hole = default_course().hole(3).unwrap();
    let a = engine.simulate_hole(&field(), hole, &TeamConfiguration::Pending, 5_000, Some(1));
    let b = engine.simulate_hole(&field(), hole, &TeamConfiguration::Pending, 5_000, Some(2));
    assert_ne!(a.entrants.iter().map(|e| e.wins).collect::<Vec<_>>(), b.entrants.iter().map(|e| e.wins).collect::<Vec<_>>());
}

#[test]
fn test_outcomes_sum_to_one() {
    let engine = MonteCarloEngine::default();
    let hole = default_course().hole(7).unwrap();
    for teams in [TeamConfiguration::Pending, partners()] {
        let result = engine.simulate_hole(&field(), hole, &teams, 4_000, Some(9));
        let total: f64 = result.win_probabilities().iter().sum::<f64>() + result.tie_probability;
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
        let wins: u64 = result.entrants.iter().map(|e| e.wins).sum();
        assert_eq!(wins + result.ties, result.simulations);
        assert!(!result.degraded);
    }
}

#[test]
fn test_entrants_follow_teams() {
    let engine = MonteCarloEngine::default();
    let hole = default_course().hole(1).unwrap();
    let solo = TeamConfiguration::Solo {
        captain: PlayerId(2),
        opponents: [PlayerId(1), PlayerId(3), PlayerId(4)],
    };
    let result = engine.simulate_hole(&field(), hole, &solo, 1_000, Some(3));
    assert_eq!(result.entrants.len(), 2);
    assert_eq!(result.entrants[0].members, vec![PlayerId(2)]);
    assert_eq!(result.entrants[1].members.len(), 3);
    assert!(result.entrants[0].label.contains("solo"));

    let pending = engine.simulate_hole(&field(), hole, &TeamConfiguration::Pending, 1_000, Some(3));
    assert_eq!(pending.entrants.len(), 4);
}

#[test]
fn test_three_on_one_favours_the_field() {
    let engine = MonteCarloEngine::default();
    let players = players_from_handicaps(&[10.0, 10.0, 10.0, 10.0]).unwrap();
    let hole = default_course().hole(4).unwrap();
    let solo = TeamConfiguration::Solo {
        captain: PlayerId(1),
        opponents: [PlayerId(2), PlayerId(3), PlayerId(4)],
    };
    let result = engine.simulate_hole(&players, hole, &solo, 8_000, Some(11));
    assert!(result.entrants[1].win_probability > result.entrants[0].win_probability);
}

#[test]
fn test_confidence_interval_narrows() {
    let engine = MonteCarloEngine::default();
    let hole = default_course().hole(2).unwrap();
    let small = engine.simulate_hole(&field(), hole, &partners(), 500, Some(5));
    let large = engine.simulate_hole(&field(), hole, &partners(), 20_000, Some(5));
    assert!(large.max_interval_width() < small.max_interval_width());
    for e in &large.entrants {
        assert!(e.confidence_interval.0 <= e.win_probability);
        assert!(e.win_probability <= e.confidence_interval.1);
    }
}

// ---------------------------------------------------------------------------
// Degraded and interrupted runs
// ---------------------------------------------------------------------------

#[test]
fn test_zero_simulations_degrades() {
    let engine = MonteCarloEngine::default();
    let hole = default_course().hole(1).unwrap();
    let result = engine.simulate_hole(&field(), hole, &partners(), 0, Some(1));
    assert!(result.degraded);
    assert_eq!(result.simulations, 0);
    assert_eq!(result.win_probabilities(), vec![0.5, 0.5]);
}

#[test]
fn test_wrong_player_count_degrades() {
    let engine = MonteCarloEngine::default();
    let hole = default_course().hole(1).unwrap();
    let players: Vec<Player> = field().into_iter().take(3).collect();
    let result = engine.simulate_hole(&players, hole, &TeamConfiguration::Pending, 1_000, Some(1));
    assert!(result.degraded);
    assert_eq!(result.simulations, 0);
    for p in result.win_probabilities() {
        assert_abs_diff_eq!(p, 1.0 / 3.0);
    }
}

#[test]
fn test_cancelled_before_start() {
    let engine = MonteCarloEngine::default();
    let hole = default_course().hole(1).unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let result = engine.simulate_hole_with_cancel(&field(), hole, &partners(), 50_000, Some(1), &token);
    assert!(result.cancelled);
    assert!(result.simulations < 50_000);
    assert!(!result.degraded);
}

#[test]
fn test_cancelled_mid_run_keeps_partial_tallies() {
    let engine = MonteCarloEngine::default();
    let hole = default_course().hole(1).unwrap();
    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            token.cancel();
        })
    };
    let requested = 50_000_000;
    let result = engine.simulate_hole_with_cancel(&field(), hole, &partners(), requested, Some(3), &token);
    canceller.join().unwrap();

    assert!(result.cancelled);
    assert!(!result.degraded);
    assert!(result.simulations > 0);
    assert!(result.simulations < requested as u64);
    let wins: u64 = result.entrants.iter().map(|e| e.wins).sum();
    assert_eq!(wins + result.ties, result.simulations);
    let total: f64 = result.win_probabilities().iter().sum::<f64>() + result.tie_probability;
    assert_abs_diff_eq!(total, 1.0, epsilon = 1e-9);
}

#[test]
fn test_early_stopping_cuts_run_short() {
    let engine = MonteCarloEngine::new(MonteCarloConfig {
        early_stopping: true,
        min_simulations_for_convergence: 1_000,
        convergence_threshold: 0.10,
        ..MonteCarloConfig::default()
    });
    let hole = default_course().hole(8).unwrap();
    let result = engine.simulate_hole(&field(), hole, &partners(), 100_000, Some(13));
    assert!(result.convergence_achieved);
    assert!(result.simulations < 100_000);
    assert!(result.simulations >= 1_000);
}

#[test]
fn test_full_run_without_early_stopping() {
    let engine = MonteCarloEngine::default();
    let hole = default_course().hole(8).unwrap();
    let result = engine.simulate_hole(&field(), hole, &partners(), 6_000, Some(13));
    assert_eq!(result.simulations, 6_000);
    assert!(!result.cancelled);
}

// ---------------------------------------------------------------------------
// Full games
// ---------------------------------------------------------------------------

#[test]
fn test_game_simulation_is_zero_sum_on_average() {
    let engine = MonteCarloEngine::default();
    let result = engine.simulate_game(&field(), default_course(), 200, Some(21));
    assert_eq!(result.games, 200);
    assert!(!result.degraded);
    let avg: f64 = result.players.iter().map(|p| p.average_points).sum();
    assert_abs_diff_eq!(avg, 0.0, epsilon = 1e-9);
    let wins: f64 = result.players.iter().map(|p| p.wins).sum();
    assert_abs_diff_eq!(wins, 200.0, epsilon = 1e-9);
    for p in &result.players {
        assert!(p.min_points <= p.max_points);
        assert_eq!(p.points_distribution.values().sum::<u64>(), 200);
    }
}

#[test]
fn test_game_simulation_is_deterministic() {
    let engine = MonteCarloEngine::default();
    let a = engine.simulate_game(&field(), default_course(), 64, Some(8));
    let b = engine.simulate_game(&field(), default_course(), 64, Some(8));
    assert_eq!(a.players, b.players);
}

#[test]
fn test_game_simulation_cancelled_mid_run() {
    let engine = MonteCarloEngine::default();
    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            token.cancel();
        })
    };
    let requested = 10_000_000;
    let result = engine.simulate_game_with_cancel(&field(), default_course(), requested, Some(5), &token);
    canceller.join().unwrap();

    assert!(result.cancelled);
    assert!(!result.degraded);
    assert!(result.games > 0);
    assert!(result.games < requested as u64);
    let wins: f64 = result.players.iter().map(|p| p.wins).sum();
    assert_abs_diff_eq!(wins, result.games as f64, epsilon = 1e-6);
    let rate: f64 = result.players.iter().map(|p| p.win_rate).sum();
    assert_abs_diff_eq!(rate, 1.0, epsilon = 1e-9);
    for p in &result.players {
        assert_eq!(p.points_distribution.values().sum::<u64>(), result.games);
    }
}

#[test]
fn test_game_simulation_rejects_bad_field() {
    let engine = MonteCarloEngine::default();
    let result = engine.simulate_game(&field()[..2], default_course(), 10, Some(1));
    assert!(result.degraded);
    assert_eq!(result.games, 0);
}

#[test]
fn test_run_monte_carlo_dispatches() {
    let engine = MonteCarloEngine::default();
    let hole = *default_course().hole(5).unwrap();
    let target = MonteCarloTarget::Hole {
        hole,
        teams: partners(),
    };
    match run_monte_carlo(&engine, &field(), &target, 1_000, Some(4)) {
        MonteCarloReport::Hole(r) => assert_eq!(r.hole_number, 5),
        other => panic!("expected a hole report, got {:?}", other),
    }
    let target = MonteCarloTarget::FullGame {
        course: default_course().clone(),
    };
    match run_monte_carlo(&engine, &field(), &target, 8, Some(4)) {
        MonteCarloReport::Game(r) => assert_eq!(r.games, 8),
        other => panic!("expected a game report, got {:?}", other),
    }
}
