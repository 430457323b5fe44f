use std::collections::VecDeque;
use std::env;

use crate::analysis::MatchAnalysis;
use crate::api_football::{Fixture, TeamHit};
use crate::bet_tiers::TierLevel;
use crate::ledger::{Ledger, Settlement, WagerId, WagerSlip};

const DEFAULT_STAKE: f64 = 10.0;
const DEFAULT_BANKROLL: f64 = 100.0;
const STAKE_STEP: f64 = 5.0;
const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Search,
    Teams,
    Fixtures,
    Analysis,
    Ledger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrativeState {
    Idle,
    Pending,
    Ready(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub search_input: String,
    pub search_active: bool,
    pub loading: bool,
    pub teams: Vec<TeamHit>,
    pub teams_selected: usize,
    pub fixtures_team: Option<TeamHit>,
    pub fixtures: Vec<Fixture>,
    pub fixtures_selected: usize,
    pub analysis: Option<MatchAnalysis>,
    pub narrative: NarrativeState,
    pub ledger: Ledger,
    pub ledger_selected: usize,
    pub stake: f64,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let stake = env_f64("PRONO_STAKE", DEFAULT_STAKE);
        let bankroll = env_f64("PRONO_BANKROLL", DEFAULT_BANKROLL);
        Self::with_bankroll(bankroll, stake)
    }

    pub fn with_bankroll(bankroll: f64, stake: f64) -> Self {
        Self {
            screen: Screen::Search,
            search_input: String::new(),
            search_active: true,
            loading: false,
            teams: Vec::new(),
            teams_selected: 0,
            fixtures_team: None,
            fixtures: Vec::new(),
            fixtures_selected: 0,
            analysis: None,
            narrative: NarrativeState::Idle,
            ledger: Ledger::new(bankroll),
            ledger_selected: 0,
            stake: if stake.is_finite() && stake > 0.0 {
                stake
            } else {
                DEFAULT_STAKE
            },
            logs: VecDeque::new(),
            help_overlay: false,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn selected_team(&self) -> Option<&TeamHit> {
        self.teams.get(self.teams_selected)
    }

    pub fn selected_fixture(&self) -> Option<&Fixture> {
        self.fixtures.get(self.fixtures_selected)
    }

    pub fn select_next(&mut self) {
        if let Some((selected, len)) = self.selection_mut() {
            if *selected + 1 < len {
                *selected += 1;
            }
        }
    }

    pub fn select_prev(&mut self) {
        if let Some((selected, _)) = self.selection_mut() {
            *selected = selected.saturating_sub(1);
        }
    }

    fn selection_mut(&mut self) -> Option<(&mut usize, usize)> {
        match self.screen {
            Screen::Teams => Some((&mut self.teams_selected, self.teams.len())),
            Screen::Fixtures => Some((&mut self.fixtures_selected, self.fixtures.len())),
            Screen::Ledger => Some((&mut self.ledger_selected, self.ledger.wagers().len())),
            Screen::Search | Screen::Analysis => None,
        }
    }

    /// Where `b`/Esc leads from the current screen.
    pub fn go_back(&mut self) {
        self.screen = match self.screen {
            Screen::Search => Screen::Search,
            Screen::Teams => Screen::Search,
            Screen::Fixtures => {
                if self.teams.is_empty() {
                    Screen::Search
                } else {
                    Screen::Teams
                }
            }
            Screen::Analysis => {
                if self.fixtures.is_empty() {
                    Screen::Search
                } else {
                    Screen::Fixtures
                }
            }
            Screen::Ledger => {
                if self.analysis.is_some() {
                    Screen::Analysis
                } else {
                    Screen::Search
                }
            }
        };
        if self.screen == Screen::Search {
            self.search_active = true;
        }
    }

    pub fn adjust_stake(&mut self, up: bool) {
        let next = if up {
            self.stake + STAKE_STEP
        } else {
            self.stake - STAKE_STEP
        };
        self.stake = next.max(1.0);
    }

    pub fn place_tier_wager(&mut self, level: TierLevel) -> Option<WagerId> {
        let Some(analysis) = self.analysis.as_ref() else {
            self.push_log("[INFO] No analysis on screen");
            return None;
        };
        let Some(tier) = analysis.tiers.iter().find(|t| t.level == level) else {
            self.push_log(format!("[WARN] No {} tier available", level.label()));
            return None;
        };
        let pick = tier.pick.label();
        let odd = tier.odd;
        let slip = WagerSlip {
            fixture: analysis.label(),
            pick: format!("{pick} ({})", level.label()),
            odd,
            stake: self.stake,
        };
        match self.ledger.place(slip) {
            Ok(id) => {
                self.push_log(format!(
                    "[INFO] Wager #{id} placed: {pick} @ {odd:.2}, stake {:.2}",
                    self.stake
                ));
                Some(id)
            }
            Err(err) => {
                self.push_log(format!("[WARN] Wager rejected: {err}"));
                None
            }
        }
    }

    pub fn settle_selected(&mut self, result: Settlement) {
        let Some(wager) = self.ledger.wagers().get(self.ledger_selected) else {
            self.push_log("[INFO] No wager selected");
            return;
        };
        let id = wager.id;
        match self.ledger.settle(id, result) {
            Ok(()) => self.push_log(format!("[INFO] Wager #{id} settled: {result:?}")),
            Err(err) => self.push_log(format!("[WARN] {err}")),
        }
    }
}

/// Background results flowing back to the UI thread.
#[derive(Debug, Clone)]
pub enum Delta {
    SetTeams {
        query: String,
        teams: Vec<TeamHit>,
    },
    SetFixtures {
        team: TeamHit,
        fixtures: Vec<Fixture>,
    },
    SetAnalysis(Box<MatchAnalysis>),
    SetNarrative {
        key: String,
        text: String,
    },
    NarrativeFailed {
        key: String,
        error: String,
    },
    RequestFailed(String),
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    SearchTeams { query: String },
    FetchFixtures { team: TeamHit },
    AnalyzeFixture { fixture: Fixture },
    AnalyzeManual { home: String, away: String },
    GenerateNarrative { analysis: Box<MatchAnalysis> },
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetTeams { query, teams } => {
            state.loading = false;
            state.push_log(format!(
                "[INFO] {} team(s) found for \"{query}\"",
                teams.len()
            ));
            state.teams = teams;
            state.teams_selected = 0;
            if !state.teams.is_empty() {
                state.screen = Screen::Teams;
                state.search_active = false;
            }
        }
        Delta::SetFixtures { team, fixtures } => {
            state.loading = false;
            if fixtures.is_empty() {
                state.push_log(format!("[INFO] No upcoming fixtures for {}", team.name));
            }
            state.fixtures_team = Some(team);
            state.fixtures = fixtures;
            state.fixtures_selected = 0;
            state.screen = Screen::Fixtures;
        }
        Delta::SetAnalysis(analysis) => {
            state.loading = false;
            if analysis.any_estimated() {
                state.push_log(format!(
                    "[WARN] {}: stats partly estimated",
                    analysis.label()
                ));
            }
            state.analysis = Some(*analysis);
            state.narrative = NarrativeState::Idle;
            state.screen = Screen::Analysis;
        }
        Delta::SetNarrative { key, text } => {
            if current_key(state).as_deref() == Some(key.as_str()) {
                state.narrative = NarrativeState::Ready(text);
            }
        }
        Delta::NarrativeFailed { key, error } => {
            state.push_log(format!("[WARN] Narrative error: {error}"));
            if current_key(state).as_deref() == Some(key.as_str()) {
                state.narrative = NarrativeState::Failed(error);
            }
        }
        Delta::RequestFailed(msg) => {
            state.loading = false;
            state.push_log(format!("[WARN] {msg}"));
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

fn current_key(state: &AppState) -> Option<String> {
    state.analysis.as_ref().map(|a| a.key())
}

/// "Home vs Away" (also "v" or "-") runs an offline analysis on estimated stats.
pub fn parse_manual_fixture(input: &str) -> Option<(String, String)> {
    // ASCII-only lowering keeps byte offsets valid for slicing `input`.
    let lower = input.to_ascii_lowercase();
    for sep in [" vs. ", " vs ", " v ", " - "] {
        if let Some(pos) = lower.find(sep) {
            let home = input[..pos].trim();
            let away = input[pos + sep.len()..].trim();
            if !home.is_empty() && !away.is_empty() {
                return Some((home.to_string(), away.to_string()));
            }
        }
    }
    None
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_fixture_parsing() {
        assert_eq!(
            parse_manual_fixture("Real Madrid vs Manchester City"),
            Some(("Real Madrid".to_string(), "Manchester City".to_string()))
        );
        assert_eq!(
            parse_manual_fixture("Lyon VS Lens"),
            Some(("Lyon".to_string(), "Lens".to_string()))
        );
        assert_eq!(parse_manual_fixture("arsenal"), None);
        assert_eq!(parse_manual_fixture(" vs Chelsea"), None);
    }

    #[test]
    fn manual_fixture_keeps_non_ascii_names_intact() {
        assert_eq!(
            parse_manual_fixture("İstanbulspor vs Çaykur Rizespor"),
            Some(("İstanbulspor".to_string(), "Çaykur Rizespor".to_string()))
        );
        assert_eq!(
            parse_manual_fixture("İstanbul VS Roma"),
            Some(("İstanbul".to_string(), "Roma".to_string()))
        );
        assert_eq!(
            parse_manual_fixture("Beşiktaş - Fenerbahçe"),
            Some(("Beşiktaş".to_string(), "Fenerbahçe".to_string()))
        );
    }

    #[test]
    fn stake_never_drops_below_one() {
        let mut state = AppState::with_bankroll(100.0, 3.0);
        state.adjust_stake(false);
        assert_eq!(state.stake, 1.0);
        state.adjust_stake(true);
        assert_eq!(state.stake, 6.0);
    }

    #[test]
    fn selection_is_bounded() {
        let mut state = AppState::with_bankroll(100.0, 10.0);
        state.screen = Screen::Teams;
        state.teams = vec![
            TeamHit {
                id: 1,
                name: "A".to_string(),
                country: None,
            },
            TeamHit {
                id: 2,
                name: "B".to_string(),
                country: None,
            },
        ];
        state.select_next();
        state.select_next();
        assert_eq!(state.teams_selected, 1);
        state.select_prev();
        state.select_prev();
        assert_eq!(state.teams_selected, 0);
    }
}
