use wolf_goat_pig::betting::*;
use wolf_goat_pig::error::WgpError;
use wolf_goat_pig::model::{default_course, players_from_handicaps, Course, Hole, PlayerId};
use wolf_goat_pig::teams::{Side, TeamConfiguration};
use wolf_goat_pig::wager::MAX_WAGER;

const P1: PlayerId = PlayerId(1);
const P2: PlayerId = PlayerId(2);
const P3: PlayerId = PlayerId(3);
const P4: PlayerId = PlayerId(4);

/// Every hole par 4; hole 1 is stroke index 5.
fn par4_course() -> Course {
    let holes = (1..=18u8)
        .map(|n| {
            let si = match n {
                1 => 5,
                5 => 1,
                n => n,
            };
            Hole::new(n, 4, si, 380).unwrap()
        })
        .collect();
    Course::new("Test Links", holes).unwrap()
}

fn machine_on(course: Course) -> BettingStateMachine {
    let players = players_from_handicaps(&[8.0, 12.0, 15.0, 20.0]).unwrap();
    BettingStateMachine::new(players, course, 1).unwrap()
}

fn machine() -> BettingStateMachine {
    machine_on(default_course().clone())
}

fn score_all(m: &mut BettingStateMachine, gross: [u32; 4]) {
    for (id, g) in [P1, P2, P3, P4].into_iter().zip(gross) {
        m.record_net_score(id, g).unwrap();
    }
}

fn points(m: &BettingStateMachine) -> Vec<i32> {
    m.players().iter().map(|p| p.points()).collect()
}

// ---------------------------------------------------------------------------
// Team formation
// ---------------------------------------------------------------------------

#[test]
fn test_request_and_accept_forms_partners() {
    let mut m = machine();
    m.request_partner(P1, P3).unwrap();
    assert_eq!(m.pending_request(), Some(P3));
    assert_eq!(m.phase(), Phase::AwaitingTeams);
    m.accept_partner(P3).unwrap();
    assert_eq!(m.phase(), Phase::Partners);
    assert_eq!(
        m.teams(),
        &TeamConfiguration::Partners {
            team1: [P1, P3],
            team2: [P2, P4]
        }
    );
    assert_eq!(m.wager().current(), 1);
}

#[test]
fn test_decline_leaves_captain_free_to_ask_again() {
    let mut m = machine();
    m.request_partner(P1, P2).unwrap();
    m.decline_partner(P2).unwrap();
    assert_eq!(m.phase(), Phase::AwaitingTeams);
    assert_eq!(m.pending_request(), None);
    m.request_partner(P1, P4).unwrap();
    m.accept_partner(P4).unwrap();
    assert_eq!(m.phase(), Phase::Partners);
}

#[test]
fn test_only_captain_may_request() {
    let mut m = machine();
    let err = m.request_partner(P2, P3).unwrap_err();
    assert!(matches!(err, WgpError::InvalidStateTransition { .. }));
    assert_eq!(m.phase(), Phase::AwaitingTeams);
}

#[test]
fn test_request_after_teams_formed_rejected() {
    let mut m = machine();
    m.go_solo(P1).unwrap();
    assert!(matches!(
        m.request_partner(P1, P2),
        Err(WgpError::InvalidStateTransition { .. })
    ));
    assert!(matches!(m.go_solo(P1), Err(WgpError::InvalidStateTransition { .. })));
}

#[test]
fn test_wrong_player_cannot_answer_request() {
    let mut m = machine();
    m.request_partner(P1, P2).unwrap();
    assert!(m.accept_partner(P3).is_err());
    assert!(m.decline_partner(P4).is_err());
    assert_eq!(m.pending_request(), Some(P2));
}

#[test]
fn test_go_solo_doubles_exactly() {
    let mut m = machine_on(par4_course());
    m.go_solo(P1).unwrap();
    assert_eq!(m.wager().current(), 2);

    // With a carry-over the whole pre-solo wager doubles.
    let mut m = machine_on(par4_course());
    m.request_partner(P1, P2).unwrap();
    m.accept_partner(P2).unwrap();
    score_all(&mut m, [5, 5, 5, 5]);
    assert!(matches!(m.settle_hole().unwrap().outcome, HoleOutcome::Halved { .. }));
    m.advance_hole().unwrap();
    assert_eq!(m.wager().current(), 2);
    m.go_solo(P2).unwrap();
    assert_eq!(m.wager().current(), 4);
}

fn other_than(id: PlayerId) -> PlayerId {
    if id == P1 {
        P2
    } else {
        P1
    }
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

#[test]
fn test_solo_captain_beats_field() {
    let mut m = machine_on(par4_course());
    assert_eq!(m.hole().stroke_index, 5);
    for p in m.players() {
        assert_eq!(p.strokes_on(m.hole()), 1, "{} should get one stroke", p.name);
    }
    m.go_solo(P1).unwrap();
    assert_eq!(m.wager().current(), 2);
    score_all(&mut m, [4, 5, 5, 5]);
    let result = m.settle_hole().unwrap();
    assert_eq!(result.delta_for(P1), 6);
    assert_eq!(result.delta_for(P2), -2);
    assert_eq!(result.delta_for(P3), -2);
    assert_eq!(result.delta_for(P4), -2);
    assert_eq!(result.delta_sum(), 0);
    assert_eq!(points(&m), vec![6, -2, -2, -2]);
    assert_eq!(m.phase(), Phase::Scored);
}

#[test]
fn test_solo_captain_loses_to_field() {
    let mut m = machine_on(par4_course());
    m.go_solo(P1).unwrap();
    score_all(&mut m, [6, 5, 6, 6]);
    let result = m.settle_hole().unwrap();
    assert_eq!(result.delta_for(P1), -2);
    assert_eq!(result.delta_sum(), 0);
    assert!(matches!(result.outcome, HoleOutcome::Won { ref winners, .. } if winners.len() == 3));
}

#[test]
fn test_partners_best_ball() {
    let mut m = machine_on(par4_course());
    m.request_partner(P1, P4).unwrap();
    m.accept_partner(P4).unwrap();
    // P4's net 3 is the best ball on the hole.
    score_all(&mut m, [7, 5, 5, 4]);
    let result = m.settle_hole().unwrap();
    assert_eq!(result.delta_for(P1), 1);
    assert_eq!(result.delta_for(P4), 1);
    assert_eq!(result.delta_for(P2), -1);
    assert_eq!(result.delta_for(P3), -1);
}

#[test]
fn test_tie_carries_over_and_pays_nothing() {
    let mut m = machine_on(par4_course());
    m.request_partner(P1, P2).unwrap();
    m.accept_partner(P2).unwrap();
    score_all(&mut m, [5, 6, 5, 6]);
    let result = m.settle_hole().unwrap();
    assert_eq!(result.outcome, HoleOutcome::Halved { carried: 1 });
    assert!(result.deltas.values().all(|&d| d == 0));
    assert_eq!(m.carry_over(), 1);

    m.advance_hole().unwrap();
    assert_eq!(m.captain(), P2);
    assert_eq!(m.wager().carry_in(), 1);
    assert_eq!(m.wager().current(), 2);
    assert_eq!(m.carry_over(), 0);
}

#[test]
fn test_settle_requires_all_scores() {
    let mut m = machine();
    m.go_solo(P1).unwrap();
    m.record_net_score(P1, 4).unwrap();
    assert!(matches!(m.settle_hole(), Err(WgpError::PreconditionNotMet(_))));
}

#[test]
fn test_settle_requires_teams() {
    let mut m = machine();
    score_all(&mut m, [4, 4, 4, 4]);
    assert!(matches!(m.settle_hole(), Err(WgpError::PreconditionNotMet(_))));
}

#[test]
fn test_duplicate_score_rejected() {
    let mut m = machine();
    m.go_solo(P1).unwrap();
    m.record_net_score(P2, 5).unwrap();
    assert!(matches!(
        m.record_net_score(P2, 4),
        Err(WgpError::InvalidStateTransition { .. })
    ));
    assert!(matches!(m.record_net_score(P3, 0), Err(WgpError::Validation(_))));
    assert!(matches!(m.record_net_score(PlayerId(9), 4), Err(WgpError::Validation(_))));
}

#[test]
fn test_net_score_uses_handicap_strokes() {
    let mut m = machine();
    // Hole 1 on the default course is stroke index 5.
    assert_eq!(m.record_net_score(P1, 5).unwrap(), 4);
    assert_eq!(m.record_net_score(P4, 7).unwrap(), 6);
}

#[test]
fn test_team_change_after_scoring_rejected() {
    let mut m = machine();
    m.record_net_score(P2, 5).unwrap();
    assert!(m.go_solo(P1).is_err());
    assert!(m.request_partner(P1, P2).is_err());
}

// ---------------------------------------------------------------------------
// Doubles and floats
// ---------------------------------------------------------------------------

#[test]
fn test_offer_then_decline_ends_hole() {
    let mut m = machine();
    m.request_partner(P1, P2).unwrap();
    m.accept_partner(P2).unwrap();
    m.offer_double(Side::Team2, Side::Team1).unwrap();
    let result = m.decline_double().unwrap();
    assert_eq!(result.wager, 1);
    assert!(matches!(result.outcome, HoleOutcome::DoubleDeclined { .. }));
    assert_eq!(result.delta_for(P3), 1);
    assert_eq!(result.delta_for(P4), 1);
    assert_eq!(result.delta_for(P1), -1);
    assert_eq!(result.delta_for(P2), -1);
    assert_eq!(m.phase(), Phase::Scored);
    assert!(m.net_scores().is_empty());
    assert!(m.record_net_score(P1, 4).is_err());
}

#[test]
fn test_accept_double_doubles_wager() {
    let mut m = machine();
    m.go_solo(P1).unwrap();
    m.offer_double(Side::Team1, Side::Team2).unwrap();
    assert!(matches!(
        m.record_net_score(P1, 4),
        Err(WgpError::PreconditionNotMet(_))
    ));
    m.accept_double().unwrap();
    assert_eq!(m.wager().current(), 4);
    assert!(m.wager().is_doubled());
    assert!(matches!(
        m.offer_double(Side::Team2, Side::Team1),
        Err(WgpError::InvalidStateTransition { .. })
    ));
}

#[test]
fn test_double_needs_formed_teams() {
    let mut m = machine();
    assert!(m.offer_double(Side::Team1, Side::Team2).is_err());
    assert!(m.accept_double().is_err());
    assert!(m.decline_double().is_err());
}

#[test]
fn test_float_twice_is_already_used() {
    let mut m = machine();
    m.invoke_float(P1).unwrap();
    assert_eq!(m.wager().current(), 2);
    m.go_solo(P1).unwrap();
    assert_eq!(m.wager().current(), 4);
    score_all(&mut m, [4, 5, 5, 5]);
    m.settle_hole().unwrap();

    // Walk round until P1 is captain again.
    for _ in 0..4 {
        m.advance_hole().unwrap();
        if m.captain() == P1 {
            break;
        }
        m.go_solo(m.captain()).unwrap();
        score_all(&mut m, [5, 5, 5, 5]);
        m.settle_hole().unwrap();
    }
    assert_eq!(m.captain(), P1);
    assert!(matches!(m.invoke_float(P1), Err(WgpError::AlreadyUsed { player }) if player == P1));
}

#[test]
fn test_float_only_for_captain() {
    let mut m = machine();
    assert!(matches!(
        m.invoke_float(P2),
        Err(WgpError::InvalidStateTransition { .. })
    ));
    assert!(!m.players()[1].float_used());
}

#[test]
fn test_halved_escalations_stop_at_table_limit() {
    let players = players_from_handicaps(&[10.0; 4]).unwrap();
    let mut m = BettingStateMachine::new(players, default_course().clone(), 1).unwrap();
    let mut refused = 0;
    for hole in 1..=18u8 {
        let captain = m.captain();
        let before = m.wager().current();
        match m.go_solo(captain) {
            Ok(()) => {}
            Err(WgpError::PreconditionNotMet(_)) => {
                refused += 1;
                assert_eq!(m.wager().current(), before);
                assert_eq!(m.teams(), &TeamConfiguration::Pending);
                let partner = m.players().iter().map(|p| p.id).find(|&id| id != captain).unwrap();
                m.request_partner(captain, partner).unwrap();
                m.accept_partner(partner).unwrap();
            }
            Err(e) => panic!("hole {}: {}", hole, e),
        }
        match m.offer_double(Side::Team2, Side::Team1) {
            Ok(()) => m.accept_double().unwrap(),
            Err(e) => assert!(matches!(e, WgpError::PreconditionNotMet(_)), "hole {}: {}", hole, e),
        }
        assert!(m.wager().current() <= MAX_WAGER, "hole {}", hole);

        if hole < 18 {
            score_all(&mut m, [5, 5, 5, 5]);
            assert!(matches!(m.settle_hole().unwrap().outcome, HoleOutcome::Halved { .. }));
            m.advance_hole().unwrap();
        } else {
            score_all(&mut m, [4, 5, 5, 5]);
            let result = m.settle_hole().unwrap();
            assert_eq!(result.wager, MAX_WAGER);
            assert_eq!(result.delta_sum(), 0);
        }
    }
    assert!(refused > 0);
    let totals = points(&m);
    assert_eq!(totals.iter().sum::<i32>(), 0);
    assert!(totals.iter().all(|p| p.unsigned_abs() <= 3 * MAX_WAGER));
}

// ---------------------------------------------------------------------------
// Game flow
// ---------------------------------------------------------------------------

#[test]
fn test_full_round_is_zero_sum_and_completes() {
    let mut m = machine();
    let grosses = [[4, 5, 5, 6], [5, 5, 4, 6], [6, 5, 6, 4], [5, 5, 5, 5], [4, 6, 7, 5]];
    for hole in 0..18 {
        let captain = m.captain();
        assert_eq!(captain, PlayerId((hole % 4) as u32 + 1));
        if hole % 3 == 0 {
            m.go_solo(captain).unwrap();
        } else {
            let partner = other_than(captain);
            m.request_partner(captain, partner).unwrap();
            m.accept_partner(partner).unwrap();
        }
        score_all(&mut m, grosses[hole % grosses.len()]);
        let result = m.settle_hole().unwrap();
        assert_eq!(result.delta_sum(), 0);
        assert_eq!(points(&m).iter().sum::<i32>(), 0);
        let phase = m.advance_hole().unwrap();
        if hole == 17 {
            assert_eq!(phase, Phase::GameComplete);
        }
    }
    assert!(m.is_complete());
    assert_eq!(m.history().len(), 18);
    assert_eq!(m.holes_remaining(), 0);
    assert!(m.go_solo(P1).is_err());

    let summary = m.summary();
    assert_eq!(summary.holes.len(), 18);
    assert_eq!(summary.standings.iter().map(|s| s.points).sum::<i32>(), 0);
    assert!(summary.standings.windows(2).all(|w| w[0].points >= w[1].points));
}

#[test]
fn test_karl_marx_favours_trailing_winner() {
    let players = players_from_handicaps(&[8.0, 12.0, 15.0, 20.0]).unwrap();
    // Three winners share 2 quarters from one loser at wager 2.
    let deltas = distribute_payout(&players, &[P2, P3, P4], &[P1], 2).unwrap();
    assert_eq!(deltas[&P1], -2);
    assert_eq!(deltas[&P2], 1);
    assert_eq!(deltas[&P3], 1);
    assert_eq!(deltas[&P4], 0);
    assert_eq!(deltas.values().sum::<i32>(), 0);
}

#[test]
fn test_rejects_bad_setup() {
    let players = players_from_handicaps(&[8.0, 12.0, 15.0, 20.0]).unwrap();
    assert!(BettingStateMachine::new(players.clone(), default_course().clone(), 0).is_err());
    assert!(BettingStateMachine::new(players[..3].to_vec(), default_course().clone(), 1).is_err());
}
