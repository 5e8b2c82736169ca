use colored::Colorize;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

use crate::betting::{HoleOutcome, HoleResult, Standing};
use crate::model::{Course, PlayerId};
use crate::monte_carlo::{GameSimulationResult, SimulationResult};
use crate::odds::{OddsResult, RiskLevel};

pub fn probability_bar(p: f64, width: usize) -> String {
    let p = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
    let filled = ((p * width as f64) as usize).min(width);
    let bar: String = "\u{2588}".repeat(filled) + &"\u{2591}".repeat(width - filled);
    let pct = format!("{:.1}%", p * 100.0);

    if p >= 0.6 {
        format!("{} {}", bar.green(), pct)
    } else if p >= 0.4 {
        format!("{} {}", bar.yellow(), pct)
    } else {
        format!("{} {}", bar.red(), pct)
    }
}

pub fn signed_quarters(value: f64) -> String {
    let s = format!("{:+.2}", value);
    if value > 0.0 {
        s.green().to_string()
    } else if value < 0.0 {
        s.red().to_string()
    } else {
        s
    }
}

pub fn styled_points(points: i32) -> String {
    let s = format!("{:+}", points);
    match points.signum() {
        1 => s.green().bold().to_string(),
        -1 => s.red().bold().to_string(),
        _ => s.dimmed().to_string(),
    }
}

pub fn styled_risk(risk: RiskLevel) -> String {
    match risk {
        RiskLevel::Low => risk.as_str().green().to_string(),
        RiskLevel::Medium => risk.as_str().yellow().to_string(),
        RiskLevel::High => risk.as_str().red().bold().to_string(),
    }
}

/// Colour for a betting action name.
pub fn action_style(action: &str) -> &'static str {
    let lower = action.to_lowercase();
    if lower.starts_with("go_solo") || lower.contains("offer_double") || lower.contains("float") {
        "red"
    } else if lower.starts_with("accept") || lower.starts_with("request_partner") {
        "green"
    } else if lower.starts_with("decline") {
        "dim"
    } else if lower == "hold" {
        "yellow"
    } else {
        "bold"
    }
}

pub fn styled_action(action: &str) -> String {
    match action_style(action) {
        "red" => action.red().bold().to_string(),
        "green" => action.green().bold().to_string(),
        "dim" => action.dimmed().bold().to_string(),
        "yellow" => action.yellow().bold().to_string(),
        _ => action.bold().to_string(),
    }
}

pub fn odds_table(odds: &OddsResult) -> String {
    let mut out = String::new();

    let mut players = Table::new();
    players.set_content_arrangement(ContentArrangement::Dynamic);
    players.set_header(vec![
        Cell::new("Player".bold().to_string()),
        Cell::new("Strokes").set_alignment(CellAlignment::Right),
        Cell::new("Exp. Net").set_alignment(CellAlignment::Right),
        Cell::new("Low Net"),
        Cell::new("Next Shot").set_alignment(CellAlignment::Right),
    ]);
    for p in &odds.player_odds {
        players.add_row(vec![
            Cell::new(&p.name),
            Cell::new(p.strokes_received).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}", p.expected_net)).set_alignment(CellAlignment::Right),
            Cell::new(probability_bar(p.win_probability, 20)),
            Cell::new(
                p.shot_success
                    .map(|s| format!("{:.0}%", s * 100.0))
                    .unwrap_or_else(|| "-".to_string()),
            )
            .set_alignment(CellAlignment::Right),
        ]);
    }
    out.push_str(&players.to_string());
    out.push('\n');

    if let Some(team) = odds.team_odds {
        out.push_str(&format!(
            "\n  Team 1 {}\n  Team 2 {}\n  Halved {}\n",
            probability_bar(team.team1_win, 20),
            probability_bar(team.team2_win, 20),
            probability_bar(team.tie, 20),
        ));
    }

    if !odds.scenarios.is_empty() {
        let mut scenarios = Table::new();
        scenarios.set_content_arrangement(ContentArrangement::Dynamic);
        scenarios.set_header(vec![
            Cell::new("Action".bold().to_string()),
            Cell::new("Win").set_alignment(CellAlignment::Right),
            Cell::new("EV (q)").set_alignment(CellAlignment::Right),
            Cell::new("Risk"),
            Cell::new("95% CI"),
            Cell::new("Note"),
        ]);
        for s in &odds.scenarios {
            let name = s.scenario_type.to_string();
            scenarios.add_row(vec![
                Cell::new(styled_action(&name)),
                Cell::new(format!("{:.1}%", s.win_probability * 100.0)).set_alignment(CellAlignment::Right),
                Cell::new(signed_quarters(s.expected_value)).set_alignment(CellAlignment::Right),
                Cell::new(styled_risk(s.risk_level)),
                Cell::new(format!(
                    "{:.0}-{:.0}%",
                    s.confidence_interval.0 * 100.0,
                    s.confidence_interval.1 * 100.0
                )),
                Cell::new(&s.recommendation),
            ]);
        }
        out.push('\n');
        out.push_str(&scenarios.to_string());
        out.push('\n');
    }

    if let Some(action) = &odds.recommended_action {
        out.push_str(&format!("\n  Recommended: {}\n", styled_action(&action.to_string())));
    }
    for line in &odds.rationale {
        out.push_str(&format!("  {} {}\n", "-".dimmed(), line));
    }
    if odds.degraded {
        out.push_str(&format!(
            "  {}\n",
            "Simplified estimate: odds inputs were unusable".yellow()
        ));
    }
    out
}

pub fn simulation_table(result: &SimulationResult) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Entrant".bold().to_string()),
        Cell::new("Wins").set_alignment(CellAlignment::Right),
        Cell::new("Win Probability"),
        Cell::new("95% CI"),
    ]);
    for e in &result.entrants {
        table.add_row(vec![
            Cell::new(&e.label),
            Cell::new(e.wins).set_alignment(CellAlignment::Right),
            Cell::new(probability_bar(e.win_probability, 24)),
            Cell::new(format!(
                "{:.1}-{:.1}%",
                e.confidence_interval.0 * 100.0,
                e.confidence_interval.1 * 100.0
            )),
        ]);
    }
    table.add_row(vec![
        Cell::new("Halved".dimmed().to_string()),
        Cell::new(result.ties).set_alignment(CellAlignment::Right),
        Cell::new(probability_bar(result.tie_probability, 24)),
        Cell::new(""),
    ]);
    table.to_string()
}

pub fn game_simulation_table(result: &GameSimulationResult) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Player".bold().to_string()),
        Cell::new("Win Share"),
        Cell::new("Avg Points").set_alignment(CellAlignment::Right),
        Cell::new("Min").set_alignment(CellAlignment::Right),
        Cell::new("Max").set_alignment(CellAlignment::Right),
    ]);
    for p in &result.players {
        table.add_row(vec![
            Cell::new(&p.name),
            Cell::new(probability_bar(p.win_rate, 20)),
            Cell::new(signed_quarters(p.average_points)).set_alignment(CellAlignment::Right),
            Cell::new(p.min_points).set_alignment(CellAlignment::Right),
            Cell::new(p.max_points).set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}

pub fn standings_table(standings: &[Standing]) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#"),
        Cell::new("Player".bold().to_string()),
        Cell::new("Quarters").set_alignment(CellAlignment::Right),
    ]);
    for (i, s) in standings.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&s.name),
            Cell::new(styled_points(s.points)).set_alignment(CellAlignment::Right),
        ]);
    }
    table.to_string()
}

pub fn course_table(course: &Course) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Hole".bold().to_string()),
        Cell::new("Par").set_alignment(CellAlignment::Right),
        Cell::new("SI").set_alignment(CellAlignment::Right),
        Cell::new("Yards").set_alignment(CellAlignment::Right),
    ]);
    for h in &course.holes {
        let si = if h.stroke_index <= 3 {
            h.stroke_index.to_string().red().bold().to_string()
        } else {
            h.stroke_index.to_string()
        };
        table.add_row(vec![
            Cell::new(h.number),
            Cell::new(h.par).set_alignment(CellAlignment::Right),
            Cell::new(si).set_alignment(CellAlignment::Right),
            Cell::new(h.yards).set_alignment(CellAlignment::Right),
        ]);
    }
    let yards: u32 = course.holes.iter().map(|h| h.yards).sum();
    format!(
        "  {}  (par {}, {} yds)\n{}",
        course.name.bold(),
        course.total_par(),
        yards,
        table
    )
}

/// One-line summary of a settled hole.
pub fn hole_result_line(result: &HoleResult, name_of: impl Fn(PlayerId) -> String) -> String {
    let names = |ids: &[PlayerId]| ids.iter().map(|id| name_of(*id)).collect::<Vec<_>>().join(" & ");
    match &result.outcome {
        HoleOutcome::Won { winners, .. } => format!(
            "Hole {}: {} win {} quarters each from the losers",
            result.hole_number,
            names(winners).bold(),
            result.wager
        ),
        HoleOutcome::DoubleDeclined { winners, .. } => format!(
            "Hole {}: double declined, {} take the hole at {}",
            result.hole_number,
            names(winners).bold(),
            result.wager
        ),
        HoleOutcome::Halved { carried } => format!(
            "Hole {}: halved, {} quarters carry to the next hole",
            result.hole_number,
            carried.to_string().yellow().bold()
        ),
    }
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "Error:".red().bold(), msg);
}
