//! End-to-end audit of the betting arithmetic.
//!
//! Checks stroke allocation, wager escalation, carry-overs, payout splitting
//! and the zero-sum property against hand-computed values.

use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use wolf_goat_pig::betting::{distribute_payout, BettingStateMachine, HoleOutcome};
use wolf_goat_pig::model::{default_course, handicap_strokes, players_from_handicaps, Course, Hole, PlayerId};
use wolf_goat_pig::monte_carlo::play_fixed_policy_game;
use wolf_goat_pig::odds::{OddsCalculator, OddsContext, ScenarioKind};
use wolf_goat_pig::teams::Side;

const P1: PlayerId = PlayerId(1);
const P2: PlayerId = PlayerId(2);
const P3: PlayerId = PlayerId(3);
const P4: PlayerId = PlayerId(4);

fn even_machine() -> BettingStateMachine {
    let players = players_from_handicaps(&[10.0, 10.0, 10.0, 10.0]).unwrap();
    BettingStateMachine::new(players, default_course().clone(), 1).unwrap()
}

fn score_all(m: &mut BettingStateMachine, gross: [u32; 4]) {
    for (id, g) in [P1, P2, P3, P4].into_iter().zip(gross) {
        m.record_net_score(id, g).unwrap();
    }
}

// =========================================================================
// Section 1: Handicap strokes
// =========================================================================

#[test]
fn audit_stroke_allocation_cases() {
    let cases: &[(f64, u8, u32)] = &[
        (0.0, 1, 0),
        (5.0, 5, 1),
        (5.0, 6, 0),
        (12.4, 12, 1), // rounds to 12
        (12.6, 13, 1), // rounds to 13
        (18.0, 18, 1),
        (20.0, 2, 2),
        (20.0, 3, 1),
        (36.0, 18, 2),
    ];
    for &(handicap, si, expected) in cases {
        assert_eq!(
            handicap_strokes(handicap, si),
            expected,
            "handicap {} on SI {}",
            handicap,
            si
        );
    }
}

#[test]
fn audit_strokes_over_a_round_equal_handicap() {
    for h in 0..=36u32 {
        let total: u32 = (1..=18u8).map(|si| handicap_strokes(f64::from(h), si)).sum();
        assert_eq!(total, h, "handicap {}", h);
    }
}

// =========================================================================
// Section 2: Payout splitting
// =========================================================================

#[test]
fn audit_payout_cases() {
    let players = players_from_handicaps(&[8.0, 12.0, 15.0, 20.0]).unwrap();
    // (winners, losers, wager, expected deltas P1..P4)
    let cases: &[(&[PlayerId], &[PlayerId], u32, [i32; 4])] = &[
        (&[P1, P2], &[P3, P4], 1, [1, 1, -1, -1]),
        (&[P1], &[P2, P3, P4], 2, [6, -2, -2, -2]),
        (&[P2, P3, P4], &[P1], 3, [-3, 1, 1, 1]),
        (&[P2, P3, P4], &[P1], 2, [-2, 1, 1, 0]),
        (&[P2, P3, P4], &[P1], 4, [-4, 2, 1, 1]),
    ];
    for (winners, losers, wager, expected) in cases {
        let deltas = distribute_payout(&players, winners, losers, *wager).unwrap();
        let got: Vec<i32> = [P1, P2, P3, P4].iter().map(|id| deltas[id]).collect();
        assert_eq!(got, expected.to_vec(), "winners {:?} wager {}", winners, wager);
    }
}

#[test]
fn audit_remainder_goes_to_trailing_winners() {
    let mut m = even_machine();
    m.go_solo(P1).unwrap();
    score_all(&mut m, [3, 6, 6, 6]);
    m.settle_hole().unwrap();
    let points: Vec<i32> = m.players().iter().map(|p| p.points()).collect();
    assert_eq!(points, vec![6, -2, -2, -2]);

    // P2 and P3 are behind P1, so they take the two odd quarters.
    let deltas = distribute_payout(m.players(), &[P1, P2, P3], &[P4], 2).unwrap();
    assert_eq!(deltas[&P1], 0);
    assert_eq!(deltas[&P2], 1);
    assert_eq!(deltas[&P3], 1);
    assert_eq!(deltas[&P4], -2);
}

#[test]
fn audit_payout_always_zero_sum() {
    let players = players_from_handicaps(&[1.0, 2.0, 3.0, 4.0]).unwrap();
    let splits: &[(&[PlayerId], &[PlayerId])] = &[
        (&[P1], &[P2, P3, P4]),
        (&[P1, P2], &[P3, P4]),
        (&[P1, P2, P3], &[P4]),
    ];
    for wager in 1..=32 {
        for (w, l) in splits {
            let total: i32 = distribute_payout(&players, w, l, wager).unwrap().values().sum();
            assert_eq!(total, 0);
        }
    }
}

// =========================================================================
// Section 3: Wager escalation
// =========================================================================

#[test]
fn audit_float_solo_and_double_compound() {
    let players = players_from_handicaps(&[8.0, 12.0, 15.0, 20.0]).unwrap();
    let mut m = BettingStateMachine::new(players, default_course().clone(), 1).unwrap();
    m.invoke_float(P1).unwrap();
    assert_eq!(m.wager().current(), 2);
    m.go_solo(P1).unwrap();
    assert_eq!(m.wager().current(), 4);
    m.offer_double(Side::Team2, Side::Team1).unwrap();
    m.accept_double().unwrap();
    assert_eq!(m.wager().current(), 8);

    score_all(&mut m, [3, 5, 5, 5]);
    let result = m.settle_hole().unwrap();
    assert_eq!(result.wager, 8);
    assert_eq!(result.delta_for(P1), 24);
    for id in [P2, P3, P4] {
        assert_eq!(result.delta_for(id), -8);
    }
}

#[test]
fn audit_carry_over_chain() {
    let mut m = even_machine();
    let mut wagers = Vec::new();
    for _ in 0..2 {
        let captain = m.captain();
        let partner = if captain == P4 { P1 } else { PlayerId(captain.0 + 1) };
        m.request_partner(captain, partner).unwrap();
        m.accept_partner(partner).unwrap();
        wagers.push(m.wager().current());
        score_all(&mut m, [5, 5, 5, 5]);
        let result = m.settle_hole().unwrap();
        assert!(matches!(result.outcome, HoleOutcome::Halved { .. }));
        m.advance_hole().unwrap();
    }
    // Hole 3: captain P3 partners P4 and wins the accumulated pot.
    wagers.push(m.wager().current());
    m.request_partner(P3, P4).unwrap();
    m.accept_partner(P4).unwrap();
    score_all(&mut m, [6, 6, 4, 6]);
    let result = m.settle_hole().unwrap();
    assert_eq!(wagers, vec![1, 2, 3]);
    assert_eq!(result.delta_for(P3), 3);
    assert_eq!(result.delta_for(P4), 3);
    assert_eq!(result.delta_for(P1), -3);
    assert_eq!(m.carry_over(), 0);
}

#[test]
fn audit_declined_double_pays_pre_double_wager() {
    let mut m = even_machine();
    m.request_partner(P1, P2).unwrap();
    m.accept_partner(P2).unwrap();
    m.offer_double(Side::Team1, Side::Team2).unwrap();
    let result = m.decline_double().unwrap();
    assert_eq!(result.wager, 1);
    assert_eq!(result.delta_for(P1), 1);
    assert_eq!(result.delta_for(P3), -1);
    assert!(!m.wager().is_doubled());
}

// =========================================================================
// Section 4: Whole rounds
// =========================================================================

#[test]
fn audit_fixed_policy_rounds_are_zero_sum() {
    let players = players_from_handicaps(&[3.0, 11.0, 19.0, 28.0]).unwrap();
    for seed in 0..25 {
        let mut rng = StdRng::seed_from_u64(seed);
        let finals = play_fixed_policy_game(&mut rng, &players, default_course(), 10).unwrap();
        assert_eq!(finals.len(), 4);
        assert_eq!(finals.iter().sum::<i32>(), 0, "seed {}", seed);
    }
}

#[test]
fn audit_round_is_exactly_eighteen_holes() {
    let players = players_from_handicaps(&[5.0, 9.0, 14.0, 18.0]).unwrap();
    let mut m = BettingStateMachine::new(players, default_course().clone(), 1).unwrap();
    let mut captains = Vec::new();
    while !m.is_complete() {
        let captain = m.captain();
        captains.push(captain.0);
        m.go_solo(captain).unwrap();
        score_all(&mut m, [5, 5, 5, 5]);
        m.settle_hole().unwrap();
        m.advance_hole().unwrap();
    }
    assert_eq!(captains.len(), 18);
    assert_eq!(&captains[..6], &[1, 2, 3, 4, 1, 2]);
    assert_eq!(m.summary().holes.len(), 18);
}

#[test]
fn audit_course_must_have_eighteen_holes() {
    let holes = (1..=9u8).map(|n| Hole::new(n, 4, n * 2 - 1, 390).unwrap()).collect();
    assert!(Course::new("Front Nine", holes).is_err());
}

// =========================================================================
// Section 5: Odds expected values
// =========================================================================

#[test]
fn audit_hold_values_balance_across_sides() {
    let players = players_from_handicaps(&[4.0, 11.0, 17.0, 26.0]).unwrap();
    let mut m = BettingStateMachine::new(players.clone(), default_course().clone(), 1).unwrap();
    m.go_solo(P1).unwrap();
    let calc = OddsCalculator::default();
    let hold = |who: PlayerId| {
        let ctx = OddsContext::from_machine(&m).with_perspective(who);
        calc.calculate_real_time_odds(&players, m.hole(), &ctx)
            .scenario(&ScenarioKind::Hold)
            .unwrap()
            .expected_value
    };
    let captain = hold(P1);
    let field = hold(P2);
    assert_abs_diff_eq!(field, hold(P4), epsilon = 1e-12);
    assert_abs_diff_eq!(captain + 3.0 * field, 0.0, epsilon = 1e-9);
}
