use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use chrono::DateTime;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, Paragraph, Wrap};

use prono_desk::analysis::{MatchAnalysis, TeamReport};
use prono_desk::bet_tiers::{PriceSource, TierLevel};
use prono_desk::ledger::{Settlement, WagerStatus};
use prono_desk::logging;
use prono_desk::provider;
use prono_desk::state::{
    AppState, Delta, NarrativeState, ProviderCommand, Screen, apply_delta, parse_manual_fixture,
};
use prono_desk::stats_engine::MatchOutcomeDistribution;

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
}

impl App {
    fn new(cmd_tx: Option<mpsc::Sender<ProviderCommand>>) -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
            cmd_tx,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        if self.state.screen == Screen::Search && self.state.search_active {
            self.on_search_key(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Char('/') => {
                self.state.screen = Screen::Search;
                self.state.search_active = true;
            }
            KeyCode::Char('g') => {
                self.state.ledger_selected = 0;
                self.state.screen = Screen::Ledger;
            }
            KeyCode::Char('b') | KeyCode::Esc => self.state.go_back(),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Enter => self.on_enter(),
            KeyCode::Char('+') | KeyCode::Char('=') => self.state.adjust_stake(true),
            KeyCode::Char('-') => self.state.adjust_stake(false),
            KeyCode::Char('n') if self.state.screen == Screen::Analysis => {
                self.request_narrative()
            }
            KeyCode::Char(c @ '1'..='3') if self.state.screen == Screen::Analysis => {
                let level = TierLevel::ALL[(c as u8 - b'1') as usize];
                self.state.place_tier_wager(level);
            }
            KeyCode::Char('w') if self.state.screen == Screen::Ledger => {
                self.state.settle_selected(Settlement::Won)
            }
            KeyCode::Char('l') if self.state.screen == Screen::Ledger => {
                self.state.settle_selected(Settlement::Lost)
            }
            KeyCode::Char('v') if self.state.screen == Screen::Ledger => {
                self.state.settle_selected(Settlement::Void)
            }
            _ => {}
        }
    }

    fn on_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.submit_search(),
            KeyCode::Backspace => {
                self.state.search_input.pop();
            }
            KeyCode::Esc => self.state.search_active = false,
            KeyCode::Char(c) => self.state.search_input.push(c),
            _ => {}
        }
    }

    fn submit_search(&mut self) {
        let input = self.state.search_input.trim().to_string();
        if input.is_empty() {
            return;
        }
        if let Some((home, away)) = parse_manual_fixture(&input) {
            self.send(
                ProviderCommand::AnalyzeManual { home, away },
                "Manual analysis",
            );
            return;
        }
        self.send(
            ProviderCommand::SearchTeams { query: input },
            "Team search",
        );
    }

    fn on_enter(&mut self) {
        match self.state.screen {
            Screen::Search => self.state.search_active = true,
            Screen::Teams => {
                let Some(team) = self.state.selected_team().cloned() else {
                    return;
                };
                self.send(ProviderCommand::FetchFixtures { team }, "Fixtures");
            }
            Screen::Fixtures => {
                let Some(fixture) = self.state.selected_fixture().cloned() else {
                    return;
                };
                self.send(ProviderCommand::AnalyzeFixture { fixture }, "Analysis");
            }
            Screen::Analysis | Screen::Ledger => {}
        }
    }

    fn request_narrative(&mut self) {
        if self.state.narrative == NarrativeState::Pending {
            self.state.push_log("[INFO] Narrative already requested");
            return;
        }
        let Some(analysis) = self.state.analysis.clone() else {
            return;
        };
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log("[INFO] Narrative unavailable");
            return;
        };
        if tx
            .send(ProviderCommand::GenerateNarrative {
                analysis: Box::new(analysis),
            })
            .is_err()
        {
            self.state.push_log("[WARN] Narrative request failed");
        } else {
            self.state.narrative = NarrativeState::Pending;
        }
    }

    fn send(&mut self, cmd: ProviderCommand, what: &str) {
        let Some(tx) = &self.cmd_tx else {
            self.state.push_log(format!("[INFO] {what} unavailable"));
            return;
        };
        if tx.send(cmd).is_err() {
            self.state.push_log(format!("[WARN] {what} request failed"));
        } else {
            self.state.loading = true;
            self.state.push_log(format!("[INFO] {what} request sent"));
        }
    }
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let _log_guard = logging::init_file_logging();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    provider::spawn_provider(tx, cmd_rx);

    let mut app = App::new(Some(cmd_tx));
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(8),
            Constraint::Length(7),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen {
        Screen::Search => render_search(frame, chunks[1], &app.state),
        Screen::Teams => render_teams(frame, chunks[1], &app.state),
        Screen::Fixtures => render_fixtures(frame, chunks[1], &app.state),
        Screen::Analysis => render_analysis(frame, chunks[1], &app.state),
        Screen::Ledger => render_ledger(frame, chunks[1], &app.state),
    }

    let console = Paragraph::new(console_text(&app.state, chunks[2].height))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(&app.state))
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let screen = match state.screen {
        Screen::Search => "SEARCH",
        Screen::Teams => "TEAMS",
        Screen::Fixtures => "FIXTURES",
        Screen::Analysis => "ANALYSIS",
        Screen::Ledger => "LEDGER",
    };
    let summary = state.ledger.summary();
    let loading = if state.loading { " | loading..." } else { "" };
    format!(
        " PRONO DESK | {screen} | Bankroll {:.2} | Stake {:.2}{loading}",
        summary.bankroll, state.stake
    )
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Search if state.search_active => {
            "Type team or \"Home vs Away\" | Enter Search | Esc Stop typing | Ctrl-C Quit".to_string()
        }
        Screen::Search => "/ Type | g Ledger | ? Help | q Quit".to_string(),
        Screen::Teams | Screen::Fixtures => {
            "j/k/↑/↓ Move | Enter Select | b/Esc Back | / Search | g Ledger | ? Help | q Quit"
                .to_string()
        }
        Screen::Analysis => {
            "n Narrative | 1/2/3 Bet Safe/Mid/Aggressive | +/- Stake | g Ledger | b Back | q Quit"
                .to_string()
        }
        Screen::Ledger => {
            "j/k Move | w Won | l Lost | v Void | b Back | / Search | q Quit".to_string()
        }
    }
}

fn render_search(frame: &mut Frame, area: Rect, state: &AppState) {
    let cursor = if state.search_active { "_" } else { "" };
    let text = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Cyan)),
            Span::raw(format!("{}{cursor}", state.search_input)),
        ]),
        Line::from(""),
        Line::styled(
            "Search a team (3+ characters) to list its upcoming fixtures.",
            Style::default().fg(Color::DarkGray),
        ),
        Line::styled(
            "\"Real Madrid vs Manchester City\" runs an offline analysis on estimated stats.",
            Style::default().fg(Color::DarkGray),
        ),
    ];
    let paragraph = Paragraph::new(text)
        .block(Block::default().title("Team search").borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn render_teams(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows: Vec<String> = state
        .teams
        .iter()
        .map(|t| match t.country.as_deref() {
            Some(country) => format!("{}  ({country})", t.name),
            None => t.name.clone(),
        })
        .collect();
    render_selectable_list(frame, area, "Teams", &rows, state.teams_selected, "No teams");
}

fn render_fixtures(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows: Vec<String> = state
        .fixtures
        .iter()
        .map(|f| {
            let round = f.round.as_deref().unwrap_or("-");
            format!(
                "{:<16} {:<40} {} | {}",
                format_kickoff(&f.kickoff),
                format!("{} vs {}", f.home.name, f.away.name),
                f.league_name,
                round
            )
        })
        .collect();
    let title = match state.fixtures_team.as_ref() {
        Some(team) => format!("Upcoming fixtures: {}", team.name),
        None => "Upcoming fixtures".to_string(),
    };
    render_selectable_list(
        frame,
        area,
        &title,
        &rows,
        state.fixtures_selected,
        "No upcoming fixtures",
    );
}

fn render_selectable_list(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    rows: &[String],
    selected: usize,
    empty: &str,
) {
    let block = Block::default().title(title.to_string()).borders(Borders::ALL);
    if rows.is_empty() {
        let paragraph = Paragraph::new(empty.to_string())
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let visible = area.height.saturating_sub(2) as usize;
    let (start, end) = visible_range(selected, rows.len(), visible);
    let lines: Vec<Line> = (start..end)
        .map(|idx| {
            if idx == selected {
                Line::styled(
                    format!("▶ {}", rows[idx]),
                    Style::default().fg(Color::White).bg(Color::DarkGray),
                )
            } else {
                Line::from(format!("  {}", rows[idx]))
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_analysis(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(analysis) = state.analysis.as_ref() else {
        let empty = Paragraph::new("No analysis yet")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().title("Analysis").borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Min(3),
        ])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[0]);
    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[1]);

    let teams = Paragraph::new(teams_text(analysis)).block(
        Block::default()
            .title(analysis_title(analysis))
            .borders(Borders::ALL),
    );
    frame.render_widget(teams, top[0]);
    frame.render_widget(outcome_bar_chart(&analysis.outcome), top[1]);

    let markets = Paragraph::new(markets_text(analysis))
        .block(Block::default().title("Markets").borders(Borders::ALL));
    frame.render_widget(markets, middle[0]);

    let tiers = Paragraph::new(tiers_text(analysis, state.stake))
        .block(Block::default().title("Bet tiers").borders(Borders::ALL));
    frame.render_widget(tiers, middle[1]);

    let narrative = Paragraph::new(narrative_text(&state.narrative))
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Narrative").borders(Borders::ALL));
    frame.render_widget(narrative, rows[2]);
}

fn analysis_title(analysis: &MatchAnalysis) -> String {
    let mut title = analysis.label();
    if let Some(comp) = analysis.competition.as_deref() {
        title.push_str(&format!(" | {comp}"));
    }
    if let Some(kickoff) = analysis.kickoff.as_deref() {
        title.push_str(&format!(" | {}", format_kickoff(kickoff)));
    }
    title
}

fn teams_text(analysis: &MatchAnalysis) -> Vec<Line<'static>> {
    let mut lines = vec![Line::styled(
        format!(
            "{:<22} {:>4} {:>4} {:>4} {:>5}  {}",
            "Team", "ATK", "DEF", "MOM", "xG", "Form"
        ),
        Style::default().fg(Color::DarkGray),
    )];
    lines.push(team_line(&analysis.home));
    lines.push(team_line(&analysis.away));
    if analysis.any_estimated() {
        lines.push(Line::from(""));
        lines.push(Line::styled(
            "EST = estimated from team name, not measured form",
            Style::default().fg(Color::Yellow),
        ));
    }
    lines
}

fn team_line(team: &TeamReport) -> Line<'static> {
    let i = &team.indices;
    let form = team
        .snapshot
        .as_ref()
        .map(|s| s.form_string())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| "-".to_string());
    let mut spans = vec![Span::raw(format!(
        "{:<22} {:>4} {:>4} {:>4} {:>5.2}  {form}",
        truncate(&team.name, 22),
        i.attack,
        i.defense,
        i.momentum,
        i.expected_goals
    ))];
    if i.is_estimated {
        spans.push(Span::styled(" EST", Style::default().fg(Color::Yellow)));
    }
    Line::from(spans)
}

fn outcome_bar_chart(dist: &MatchOutcomeDistribution) -> BarChart<'static> {
    let bar = |label: &'static str, value: u8, color: Color| {
        Bar::default()
            .label(label.into())
            .value(value as u64)
            .text_value(format!("{value}%"))
            .style(Style::default().fg(color))
    };
    let bars = [
        bar("Home", dist.home_win_pct, Color::Green),
        bar("Draw", dist.draw_pct, Color::Yellow),
        bar("Away", dist.away_win_pct, Color::Red),
    ];
    BarChart::default()
        .block(Block::default().title("1X2 model").borders(Borders::ALL))
        .direction(Direction::Horizontal)
        .data(BarGroup::default().bars(&bars))
        .bar_width(1)
        .bar_gap(1)
        .max(100)
}

fn markets_text(analysis: &MatchAnalysis) -> String {
    let g = &analysis.goals;
    let mut lines = vec![
        format!("Over 1.5       {:>3}%", g.over1_5_pct),
        format!("Over 2.5       {:>3}%", g.over2_5_pct),
        format!("Both to score  {:>3}%", g.both_teams_score_pct),
    ];
    match analysis.value.as_ref() {
        Some(v) => lines.push(format!(
            "VALUE {} @ {:.2} (edge {:.2})",
            v.outcome.label(),
            v.odd,
            v.edge
        )),
        None if analysis.odds.is_empty() => lines.push("No bookmaker odds".to_string()),
        None => lines.push("No value detected".to_string()),
    }
    if let Some(h2h) = analysis.head_to_head.as_ref() {
        lines.push(format!(
            "H2H last {}: {}W {}D {}L, {:.1} goals",
            h2h.meetings.len(),
            h2h.home_side_wins,
            h2h.draws,
            h2h.away_side_wins,
            h2h.avg_goals
        ));
    }
    lines.join("\n")
}

fn tiers_text(analysis: &MatchAnalysis, stake: f64) -> String {
    let mut lines = Vec::new();
    for (n, tier) in analysis.tiers.iter().enumerate() {
        let price = match tier.priced {
            PriceSource::Bookmaker => "book",
            PriceSource::Fair => "fair",
        };
        lines.push(format!(
            "[{}] {:<10} {:<22} @ {:>5.2} ({price}) {:>3}%",
            n + 1,
            tier.level.label(),
            tier.pick.label(),
            tier.odd,
            tier.model_pct
        ));
    }
    lines.push(String::new());
    lines.push(format!("Press 1/2/3 to log a {stake:.2} stake"));
    lines.join("\n")
}

fn narrative_text(narrative: &NarrativeState) -> String {
    match narrative {
        NarrativeState::Idle => "Press n to request a narrative".to_string(),
        NarrativeState::Pending => "Generating narrative...".to_string(),
        NarrativeState::Ready(text) => text.clone(),
        NarrativeState::Failed(err) => format!("Narrative unavailable: {err}"),
    }
}

fn render_ledger(frame: &mut Frame, area: Rect, state: &AppState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(3)])
        .split(area);

    let s = state.ledger.summary();
    let summary = format!(
        "Start {:.2} | Bankroll {:.2} | Staked {:.2} | Returned {:.2}\nProfit {:+.2} | ROI {:+.1}% | Pending {}",
        s.starting_bankroll, s.bankroll, s.staked, s.returned, s.profit, s.roi_pct, s.pending
    );
    let summary = Paragraph::new(summary)
        .block(Block::default().title("Bankroll").borders(Borders::ALL));
    frame.render_widget(summary, sections[0]);

    let rows: Vec<String> = state
        .ledger
        .wagers()
        .iter()
        .map(|w| {
            let status = match state.ledger.status(w.id) {
                Some(WagerStatus::Pending) | None => "PENDING",
                Some(WagerStatus::Won) => "WON",
                Some(WagerStatus::Lost) => "LOST",
                Some(WagerStatus::Void) => "VOID",
            };
            format!(
                "#{:<3} {} {:<30} {:<34} @ {:>5.2} x {:>6.2}  {status}",
                w.id,
                w.placed_at.format("%H:%M"),
                truncate(&w.fixture, 30),
                truncate(&w.pick, 34),
                w.odd,
                w.stake
            )
        })
        .collect();
    render_selectable_list(
        frame,
        sections[1],
        "Wagers",
        &rows,
        state.ledger_selected,
        "No wagers this session",
    );
}

fn console_text(state: &AppState, height: u16) -> String {
    let visible = height.saturating_sub(2) as usize;
    let skip = state.logs.len().saturating_sub(visible);
    state
        .logs
        .iter()
        .skip(skip)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn truncate(raw: &str, max: usize) -> String {
    if raw.chars().count() <= max {
        return raw.to_string();
    }
    let mut out: String = raw.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn format_kickoff(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.format("%a %d %b %H:%M").to_string(),
        Err(_) if raw.is_empty() => "-".to_string(),
        Err(_) => raw.to_string(),
    }
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Prono Desk - Help",
        "",
        "Global:",
        "  /            Search (team or \"Home vs Away\")",
        "  Enter        Select",
        "  b / Esc      Back",
        "  j/k or ↑/↓   Move",
        "  g            Bankroll ledger",
        "  +/-          Stake up/down",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Analysis:",
        "  n            Request LLM narrative",
        "  1 2 3        Log Safe / Mid / Aggressive wager",
        "",
        "Ledger:",
        "  w / l / v    Settle selected as won / lost / void",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
