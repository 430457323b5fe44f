use serde::{Deserialize, Serialize};

use crate::fallback;

pub const RECENT_WINDOW: usize = 5;
pub const HOME_ADVANTAGE: i32 = 10;

const ATTACK_CEILING_GOALS: f64 = 2.5;
const DEFENSE_CEILING_CONCEDED: f64 = 2.0;
const DEFENSE_FLOOR: f64 = 10.0;
const EMPTY_FORM_MOMENTUM: u8 = 70;
const POISSON_MAX_GOALS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchResult {
    Win,
    Draw,
    Loss,
}

impl MatchResult {
    pub fn from_symbol(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'W' => Some(Self::Win),
            'D' => Some(Self::Draw),
            'L' => Some(Self::Loss),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Self::Win => 'W',
            Self::Draw => 'D',
            Self::Loss => 'L',
        }
    }

    fn points(self) -> u32 {
        match self {
            Self::Win => 3,
            Self::Draw => 1,
            Self::Loss => 0,
        }
    }
}

/// Aggregated season figures for one team, as consumed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamFormSnapshot {
    pub team: String,
    pub played: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    /// Chronological, most recent last. Never longer than [`RECENT_WINDOW`].
    pub recent_results: Vec<MatchResult>,
}

impl TeamFormSnapshot {
    pub fn new(
        team: impl Into<String>,
        played: u32,
        goals_for: u32,
        goals_against: u32,
        recent_results: Vec<MatchResult>,
    ) -> Self {
        let mut recent_results = recent_results;
        if recent_results.len() > RECENT_WINDOW {
            recent_results.drain(..recent_results.len() - RECENT_WINDOW);
        }
        Self {
            team: team.into(),
            played,
            goals_for,
            goals_against,
            recent_results,
        }
    }

    /// Unknown symbols are skipped; only the last five results are kept.
    pub fn with_form(
        team: impl Into<String>,
        played: u32,
        goals_for: u32,
        goals_against: u32,
        form: &str,
    ) -> Self {
        Self::new(team, played, goals_for, goals_against, parse_form(form))
    }

    pub fn form_string(&self) -> String {
        self.recent_results.iter().map(|r| r.symbol()).collect()
    }
}

pub fn parse_form(raw: &str) -> Vec<MatchResult> {
    raw.chars().filter_map(MatchResult::from_symbol).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamIndices {
    pub attack: u8,
    pub defense: u8,
    pub momentum: u8,
    pub expected_goals: f64,
    pub is_estimated: bool,
}

impl TeamIndices {
    fn strength(&self) -> i32 {
        self.attack as i32 + self.defense as i32 + self.momentum as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcomeDistribution {
    pub home_win_pct: u8,
    pub draw_pct: u8,
    pub away_win_pct: u8,
}

impl MatchOutcomeDistribution {
    pub const DEGENERATE: Self = Self {
        home_win_pct: 33,
        draw_pct: 34,
        away_win_pct: 33,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalMarketProbabilities {
    pub over1_5_pct: u8,
    pub over2_5_pct: u8,
    pub both_teams_score_pct: u8,
}

pub fn derive_indices(snapshot: &TeamFormSnapshot) -> TeamIndices {
    if snapshot.played == 0 {
        return fallback::synthetic_indices(&snapshot.team);
    }

    let played = snapshot.played as f64;
    let gf_per_match = snapshot.goals_for as f64 / played;
    let ga_per_match = snapshot.goals_against as f64 / played;

    let attack = clamp(
        (100.0 * gf_per_match / ATTACK_CEILING_GOALS).round(),
        0.0,
        100.0,
    );
    let defense = clamp(
        (100.0 * (1.0 - ga_per_match / DEFENSE_CEILING_CONCEDED)).round(),
        DEFENSE_FLOOR,
        100.0,
    );

    TeamIndices {
        attack: attack as u8,
        defense: defense as u8,
        momentum: momentum_index(&snapshot.recent_results),
        expected_goals: round_to(gf_per_match, 2),
        is_estimated: false,
    }
}

fn momentum_index(results: &[MatchResult]) -> u8 {
    if results.is_empty() {
        return EMPTY_FORM_MOMENTUM;
    }
    let earned: u32 = results.iter().map(|r| r.points()).sum();
    let available = 3 * results.len() as u32;
    clamp((100.0 * earned as f64 / available as f64).round(), 0.0, 100.0) as u8
}

pub fn derive_outcome_distribution(
    home: &TeamIndices,
    away: &TeamIndices,
) -> MatchOutcomeDistribution {
    // Only reachable with all-zero indices; the fallback never produces them.
    if home.strength() == 0 && away.strength() == 0 {
        return MatchOutcomeDistribution::DEGENERATE;
    }

    let power_home = home.strength() + HOME_ADVANTAGE;
    let power_away = away.strength();
    let diff = (power_home - power_away) as f64;

    let home_win = clamp((45.0 + diff * 0.4).round(), 5.0, 90.0) as u8;
    let away_win = clamp((30.0 - diff * 0.4).round(), 5.0, 90.0) as u8;
    // The draw takes the complement so rounding residue never leaks into the win buckets.
    let draw = 100 - home_win - away_win;

    MatchOutcomeDistribution {
        home_win_pct: home_win,
        draw_pct: draw,
        away_win_pct: away_win,
    }
}

pub fn derive_goal_market_probabilities(
    expected_goals_home: f64,
    expected_goals_away: f64,
) -> GoalMarketProbabilities {
    let p_home = poisson_pmf(expected_goals_home, POISSON_MAX_GOALS);
    let p_away = poisson_pmf(expected_goals_away, POISSON_MAX_GOALS);

    let btts = (1.0 - p_home[0]) * (1.0 - p_away[0]);
    let under_1_5 = total_goals_at_most(&p_home, &p_away, 1);
    let under_2_5 = total_goals_at_most(&p_home, &p_away, 2);

    GoalMarketProbabilities {
        over1_5_pct: to_pct(1.0 - under_1_5),
        over2_5_pct: to_pct(1.0 - under_2_5),
        both_teams_score_pct: to_pct(btts),
    }
}

fn total_goals_at_most(p_home: &[f64], p_away: &[f64], max_total: usize) -> f64 {
    let mut mass = 0.0;
    for (i, p_i) in p_home.iter().enumerate() {
        for (j, p_j) in p_away.iter().enumerate() {
            if i + j <= max_total {
                mass += p_i * p_j;
            }
        }
    }
    mass
}

/// Truncated at `max_k`; tail mass is dropped, not folded into the last bucket.
pub fn poisson_pmf(lambda: f64, max_k: usize) -> Vec<f64> {
    let lambda = if lambda.is_finite() { lambda.max(0.0) } else { 0.0 };
    let mut out = vec![0.0; max_k + 1];
    out[0] = (-lambda).exp();
    for k in 1..=max_k {
        out[k] = out[k - 1] * lambda / k as f64;
    }
    out
}

fn to_pct(p: f64) -> u8 {
    clamp((100.0 * p).round(), 0.0, 100.0) as u8
}

pub(crate) fn round_to(v: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (v * scale).round() / scale
}

pub(crate) fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}
