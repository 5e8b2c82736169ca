use std::io::{self, BufRead, Write};
use std::sync::Arc;

use colored::Colorize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::betting::{GameSummary, HoleResult};
use crate::computer_player::{ComputerPlayer, DecisionContext, PartnershipChoice, Personality};
use crate::config::EngineConfig;
use crate::display::{hole_result_line, print_error, standings_table, styled_action, styled_points};
use crate::error::{WgpError, WgpResult};
use crate::game::{GameAction, GameSession};
use crate::model::{Course, Player, PlayerId};
use crate::monte_carlo::play_hole;
use crate::odds::OddsCalculator;
use crate::teams::Side;

const HUMAN: PlayerId = PlayerId(1);

const OPPONENTS: [(&str, f64); 3] = [("Wolf", 9.0), ("Goat", 14.0), ("Pig", 20.0)];

const MIXED_PERSONALITIES: [Personality; 3] = [
    Personality::Aggressive,
    Personality::Strategic,
    Personality::Conservative,
];

pub struct PlaySetup {
    pub config: EngineConfig,
    pub course: Course,
    pub handicap: f64,
    /// One personality for every opponent, or a mix when unset.
    pub personality: Option<Personality>,
    pub seed: u64,
}

// ---------------------------------------------------------------------------
// Input helpers
// ---------------------------------------------------------------------------

fn prompt(message: &str, default: Option<&str>, reader: &mut dyn BufRead, writer: &mut dyn Write) -> String {
    if let Some(d) = default {
        write!(writer, "{} [{}]: ", message, d).ok();
    } else {
        write!(writer, "{}: ", message).ok();
    }
    writer.flush().ok();

    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => "q".to_string(),
        Ok(_) => {
            let trimmed = line.trim().to_string();
            if trimmed.is_empty() {
                default.unwrap_or("").to_string()
            } else {
                trimmed
            }
        }
        Err(_) => "q".to_string(),
    }
}

fn prompt_menu(
    title: &str,
    options: &[&str],
    default_idx: usize,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> String {
    writeln!(writer, "\n  {}", title.bold()).ok();
    for (i, opt) in options.iter().enumerate() {
        let marker = if i == default_idx { " <" } else { "" };
        writeln!(writer, "    {}  {}{}", format!("{}.", i + 1).bold(), opt, marker.dimmed()).ok();
    }
    let answer = prompt("  Enter a number", Some(&format!("{}", default_idx + 1)), reader, writer);
    if answer.to_lowercase() == "q" {
        return "q".to_string();
    }
    if let Ok(n) = answer.parse::<usize>() {
        if n >= 1 && n <= options.len() {
            return options[n - 1].to_string();
        }
    }
    let lower = answer.to_lowercase();
    for opt in options {
        if opt.to_lowercase() == lower || opt.to_lowercase().starts_with(&lower) {
            return opt.to_string();
        }
    }
    options[default_idx].to_string()
}

fn prompt_yn(message: &str, default: &str, reader: &mut dyn BufRead, writer: &mut dyn Write) -> Option<bool> {
    let answer = prompt(&format!("{} (y/n)", message), Some(default), reader, writer);
    if answer.to_lowercase() == "q" {
        return None;
    }
    Some(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

pub fn parse_gross_score(text: &str) -> Option<u32> {
    let n: u32 = text.trim().parse().ok()?;
    (1..=20).contains(&n).then_some(n)
}

// ---------------------------------------------------------------------------
// Interactive session
// ---------------------------------------------------------------------------

struct QuitSession;

struct Match {
    session: GameSession,
    bots: Vec<ComputerPlayer>,
    rng: StdRng,
    stroke_cap: u32,
}

impl Match {
    fn new(setup: &PlaySetup) -> WgpResult<Self> {
        let mut players = vec![Player::new(HUMAN.0, "You", setup.handicap)?];
        let mut bots = Vec::new();
        for (i, (name, handicap)) in OPPONENTS.iter().enumerate() {
            let id = i as u32 + 2;
            players.push(Player::new(id, name, *handicap)?);
            let personality = setup.personality.unwrap_or(MIXED_PERSONALITIES[i]);
            bots.push(ComputerPlayer::new(PlayerId(id), personality, setup.seed.wrapping_add(u64::from(id))));
        }
        let odds = Arc::new(OddsCalculator::new(
            setup.config.odds.clone(),
            setup.config.probability.clone(),
        ));
        let session = GameSession::new(
            "play",
            players,
            setup.course.clone(),
            setup.config.game.base_wager,
            odds,
        )?;
        Ok(Match {
            session,
            bots,
            rng: StdRng::seed_from_u64(setup.seed),
            stroke_cap: setup.config.monte_carlo.stroke_cap,
        })
    }

    fn name(&self, id: PlayerId) -> String {
        self.session
            .machine()
            .player(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|_| id.to_string())
    }

    fn describe(&self, id: PlayerId) -> String {
        match self.bots.iter().find(|b| b.player_id == id) {
            Some(bot) => format!("{} ({})", self.name(id), bot.personality()),
            None => self.name(id),
        }
    }
}

/// Runs `decision` for computer player `who` with fresh odds from their seat.
fn decide<T>(
    session: &GameSession,
    bots: &mut [ComputerPlayer],
    who: PlayerId,
    decision: impl FnOnce(&mut ComputerPlayer, &DecisionContext<'_>) -> WgpResult<T>,
) -> WgpResult<T> {
    let odds = session.odds_for(who);
    let ctx = DecisionContext::from_machine(session.machine(), who, Some(&odds));
    let bot = bots
        .iter_mut()
        .find(|b| b.player_id == who)
        .ok_or_else(|| WgpError::Validation(format!("{} is not a computer player", who)))?;
    decision(bot, &ctx)
}

fn check<T>(result: WgpResult<T>, writer: &mut dyn Write) -> Result<T, QuitSession> {
    result.map_err(|e| {
        writeln!(writer, "  {} {}", "Error:".red().bold(), e).ok();
        QuitSession
    })
}

pub fn play_command(
    config: EngineConfig,
    course: Course,
    handicap: f64,
    personality: Option<Personality>,
    seed: Option<u64>,
) {
    let setup = PlaySetup {
        config,
        course,
        handicap,
        personality,
        seed: seed.unwrap_or_else(|| rand::thread_rng().gen()),
    };
    if let Err(e) = Player::new(HUMAN.0, "You", handicap) {
        print_error(&e.to_string());
        return;
    }
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reader = stdin.lock();
    let mut writer = stdout.lock();
    run_interactive_session(&setup, &mut reader, &mut writer);
}

/// Plays a full round. Returns the summary when all holes were completed.
pub fn run_interactive_session(
    setup: &PlaySetup,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> Option<GameSummary> {
    writeln!(writer).ok();
    writeln!(writer, "{}", "Wolf Goat Pig: you against three computer players".cyan().bold()).ok();
    writeln!(writer, "Type {} at any prompt to quit. Points are in quarters.", "'q'".bold()).ok();

    let mut game = match Match::new(setup) {
        Ok(g) => g,
        Err(e) => {
            writeln!(writer, "  {} {}", "Error:".red().bold(), e).ok();
            return None;
        }
    };
    for id in game.bots.iter().map(|b| b.player_id).collect::<Vec<_>>() {
        let handicap = game.session.machine().player(id).map(|p| p.handicap).unwrap_or(0.0);
        writeln!(writer, "  {} plays off {}", game.describe(id), handicap).ok();
    }

    loop {
        if play_one_hole(&mut game, reader, writer).is_err() {
            writeln!(writer, "\n{}\n", "Thanks for the game.".cyan().bold()).ok();
            return None;
        }
        writeln!(writer, "\n{}", standings_table(&game.session.machine().standings())).ok();

        match game.session.apply(GameAction::AdvanceHole) {
            Ok(_) if game.session.machine().is_complete() => break,
            Ok(_) => {}
            Err(e) => {
                writeln!(writer, "  {} {}", "Error:".red().bold(), e).ok();
                return None;
            }
        }
        match prompt_yn("\nNext hole?", "y", reader, writer) {
            Some(true) => continue,
            _ => {
                writeln!(writer, "\n{}\n", "Thanks for the game.".cyan().bold()).ok();
                return None;
            }
        }
    }

    let summary = game.session.machine().summary();
    writeln!(writer, "\n{}", "--- Final standings ---".cyan().bold()).ok();
    writeln!(writer, "{}", standings_table(&summary.standings)).ok();
    if summary.unresolved_carry > 0 {
        writeln!(
            writer,
            "  {}",
            format!("{} quarters were still carrying after the last hole.", summary.unresolved_carry).dimmed()
        )
        .ok();
    }
    Some(summary)
}

fn play_one_hole(game: &mut Match, reader: &mut dyn BufRead, writer: &mut dyn Write) -> Result<(), QuitSession> {
    let hole = *game.session.machine().hole();
    let captain = game.session.machine().captain();
    writeln!(
        writer,
        "\n{}",
        format!("--- Hole {}: par {}, SI {}, {} yds ---", hole.number, hole.par, hole.stroke_index, hole.yards)
            .cyan()
            .bold()
    )
    .ok();
    writeln!(
        writer,
        "  Captain: {}  |  Wager: {} quarter(s)",
        game.describe(captain).bold(),
        game.session.machine().wager().current()
    )
    .ok();

    form_teams(game, reader, writer)?;
    writeln!(writer, "  Teams: {}", team_names(game)).ok();

    float_decision(game, reader, writer)?;
    if let Some(result) = double_decision(game, reader, writer)? {
        show_result(game, &result, writer);
        return Ok(());
    }

    record_scores(game, reader, writer)?;
    let result = check(game.session.apply(GameAction::SettleHole), writer)?.point_delta;
    if let Some(result) = result {
        show_result(game, &result, writer);
    }
    Ok(())
}

fn team_names(game: &Match) -> String {
    let teams = game.session.machine().teams();
    let side = |s: Side| {
        teams
            .members(s)
            .into_iter()
            .map(|id| game.name(id))
            .collect::<Vec<_>>()
            .join(" & ")
    };
    format!("{} vs {}", side(Side::Team1).bold(), side(Side::Team2).bold())
}

fn form_teams(game: &mut Match, reader: &mut dyn BufRead, writer: &mut dyn Write) -> Result<(), QuitSession> {
    let captain = game.session.machine().captain();
    let mut excluded: Vec<PlayerId> = Vec::new();

    while !game.session.machine().teams().is_formed() {
        let choice = if captain == HUMAN {
            let odds = game.session.odds_for(HUMAN);
            if let Some(rec) = &odds.recommended_action {
                writeln!(writer, "  Advisor suggests: {}", styled_action(&rec.to_string())).ok();
            }
            let candidates: Vec<PlayerId> = game
                .bots
                .iter()
                .map(|b| b.player_id)
                .filter(|id| !excluded.contains(id))
                .collect();
            let mut options: Vec<String> = candidates.iter().map(|id| format!("Ask {}", game.name(*id))).collect();
            if candidates.is_empty() || game.session.machine().wager().can_double() {
                options.push("Go solo".to_string());
            }
            let refs: Vec<&str> = options.iter().map(|s| s.as_str()).collect();
            let answer = prompt_menu("Your call as captain", &refs, 0, reader, writer);
            if answer == "q" {
                return Err(QuitSession);
            }
            match options.iter().position(|o| *o == answer) {
                Some(i) if i < candidates.len() => PartnershipChoice::Request(candidates[i]),
                _ => PartnershipChoice::GoSolo,
            }
        } else {
            let result = decide(&game.session, &mut game.bots, captain, |bot, ctx| {
                bot.choose_partnership(ctx, &excluded)
            });
            check(result, writer)?
        };

        match choice {
            PartnershipChoice::GoSolo => {
                check(game.session.apply(GameAction::GoSolo { captain }), writer)?;
                writeln!(writer, "  {} goes {}!", game.name(captain), styled_action("go_solo")).ok();
            }
            PartnershipChoice::Request(partner) => {
                check(game.session.apply(GameAction::RequestPartner { captain, partner }), writer)?;
                writeln!(writer, "  {} asks {} to partner.", game.name(captain), game.name(partner)).ok();
                let accepted = if partner == HUMAN {
                    prompt_yn("  Accept the partnership?", "y", reader, writer).ok_or(QuitSession)?
                } else {
                    let result = decide(&game.session, &mut game.bots, partner, |bot, ctx| bot.accept_partnership(ctx));
                    check(result, writer)?
                };
                if accepted {
                    check(game.session.apply(GameAction::AcceptPartner { partner }), writer)?;
                    writeln!(writer, "  {} {}.", game.name(partner), styled_action("accepts")).ok();
                } else {
                    check(game.session.apply(GameAction::DeclinePartner { partner }), writer)?;
                    writeln!(writer, "  {} {}.", game.name(partner), styled_action("declines")).ok();
                    excluded.push(partner);
                }
            }
        }
    }
    Ok(())
}

fn float_decision(game: &mut Match, reader: &mut dyn BufRead, writer: &mut dyn Write) -> Result<(), QuitSession> {
    let captain = game.session.machine().captain();
    let used = check(game.session.machine().player(captain).map(|p| p.float_used()), writer)?;
    if used || !game.session.machine().wager().can_double() {
        return Ok(());
    }
    let float = if captain == HUMAN {
        prompt_yn("  Use your float to double this hole?", "n", reader, writer).ok_or(QuitSession)?
    } else {
        check(
            decide(&game.session, &mut game.bots, captain, |bot, ctx| bot.invoke_float(ctx)),
            writer,
        )?
    };
    if float {
        let outcome = check(game.session.apply(GameAction::InvokeFloat { captain }), writer)?;
        writeln!(
            writer,
            "  {} {}: wager now {}",
            game.name(captain),
            styled_action("invoke_float"),
            outcome.state.wager
        )
        .ok();
    }
    Ok(())
}

/// Returns the hole result when a declined double ended the hole.
fn double_decision(
    game: &mut Match,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> Result<Option<HoleResult>, QuitSession> {
    let teams = game.session.machine().teams().clone();
    let mine = match teams.side_of(HUMAN) {
        Some(side) => side,
        None => return Ok(None),
    };
    if !game.session.machine().wager().can_double() {
        return Ok(None);
    }
    let theirs = mine.opponent();
    let responder = match teams.members(theirs).into_iter().find(|id| *id != HUMAN) {
        Some(id) => id,
        None => return Ok(None),
    };

    let offer = prompt_yn("  Offer a double?", "n", reader, writer).ok_or(QuitSession)?;
    if offer {
        check(
            game.session.apply(GameAction::OfferDouble { offering: mine, target: theirs }),
            writer,
        )?;
        let accepted = check(
            decide(&game.session, &mut game.bots, responder, |bot, ctx| bot.accept_double(ctx)),
            writer,
        )?;
        return answer_double(game, accepted, responder, writer);
    }

    let offered = check(
        decide(&game.session, &mut game.bots, responder, |bot, ctx| bot.offer_double(ctx)),
        writer,
    )?;
    if !offered {
        return Ok(None);
    }
    check(
        game.session.apply(GameAction::OfferDouble { offering: theirs, target: mine }),
        writer,
    )?;
    writeln!(writer, "  {} {}!", game.name(responder), styled_action("offer_double")).ok();
    let accepted = prompt_yn("  Accept the double?", "y", reader, writer).ok_or(QuitSession)?;
    answer_double(game, accepted, HUMAN, writer)
}

fn answer_double(
    game: &mut Match,
    accepted: bool,
    who: PlayerId,
    writer: &mut dyn Write,
) -> Result<Option<HoleResult>, QuitSession> {
    if accepted {
        let outcome = check(game.session.apply(GameAction::AcceptDouble), writer)?;
        writeln!(
            writer,
            "  {} {}: wager now {}",
            game.name(who),
            styled_action("accept_double"),
            outcome.state.wager
        )
        .ok();
        Ok(None)
    } else {
        let outcome = check(game.session.apply(GameAction::DeclineDouble), writer)?;
        writeln!(writer, "  {} {}.", game.name(who), styled_action("decline_double")).ok();
        Ok(outcome.point_delta)
    }
}

fn record_scores(game: &mut Match, reader: &mut dyn BufRead, writer: &mut dyn Write) -> Result<(), QuitSession> {
    let hole = *game.session.machine().hole();
    let seats: Vec<(PlayerId, f64)> = game
        .session
        .machine()
        .players()
        .iter()
        .map(|p| (p.id, p.handicap))
        .collect();

    for (id, handicap) in seats {
        let simulated = play_hole(&mut game.rng, handicap, &hole, game.stroke_cap);
        let gross = if id == HUMAN {
            loop {
                let answer = prompt("  Your gross score", Some(&simulated.to_string()), reader, writer);
                if answer.to_lowercase() == "q" {
                    return Err(QuitSession);
                }
                match parse_gross_score(&answer) {
                    Some(n) => break n,
                    None => {
                        writeln!(writer, "  {}", "Enter a whole number from 1 to 20.".red()).ok();
                    }
                }
            }
        } else {
            simulated
        };
        let outcome = check(
            game.session.apply(GameAction::RecordNetScore { player: id, gross }),
            writer,
        )?;
        let net = outcome.state.net_scores.get(&id).copied().unwrap_or(gross as i32);
        writeln!(writer, "  {:<6} gross {:>2}  net {:>2}", game.name(id), gross, net).ok();
    }
    Ok(())
}

fn show_result(game: &Match, result: &HoleResult, writer: &mut dyn Write) {
    writeln!(writer, "\n  {}", hole_result_line(result, |id| game.name(id))).ok();
    let deltas: Vec<String> = result
        .deltas
        .iter()
        .map(|(id, d)| format!("{} {}", game.name(*id), styled_points(*d)))
        .collect();
    writeln!(writer, "  {}", deltas.join("  ")).ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::default_course;
    use std::io::Cursor;

    fn setup() -> PlaySetup {
        PlaySetup {
            config: EngineConfig::default(),
            course: default_course().clone(),
            handicap: 12.0,
            personality: None,
            seed: 11,
        }
    }

    #[test]
    fn test_parse_gross_score() {
        assert_eq!(parse_gross_score("5"), Some(5));
        assert_eq!(parse_gross_score(" 12 "), Some(12));
        assert_eq!(parse_gross_score("0"), None);
        assert_eq!(parse_gross_score("21"), None);
        assert_eq!(parse_gross_score("four"), None);
    }

    #[test]
    fn test_interactive_quit_immediately() {
        let mut input = Cursor::new(b"q\n".to_vec());
        let mut output = Vec::new();
        let summary = run_interactive_session(&setup(), &mut input, &mut output);
        assert!(summary.is_none());
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("Thanks for the game."));
    }
}
