use serde::{Deserialize, Serialize};

use crate::stats_engine::MatchOutcomeDistribution;

const WIN_EDGE_THRESHOLD: f64 = 1.05;
const DRAW_EDGE_THRESHOLD: f64 = 1.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::Home => "Home win",
            Self::Draw => "Draw",
            Self::Away => "Away win",
        }
    }

    pub fn model_pct(self, dist: &MatchOutcomeDistribution) -> u8 {
        match self {
            Self::Home => dist.home_win_pct,
            Self::Draw => dist.draw_pct,
            Self::Away => dist.away_win_pct,
        }
    }
}

/// Decimal prices from one bookmaker. Any quote may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmakerOdds {
    #[serde(default)]
    pub home: Option<f64>,
    #[serde(default)]
    pub draw: Option<f64>,
    #[serde(default)]
    pub away: Option<f64>,
    #[serde(default)]
    pub over_2_5: Option<f64>,
    #[serde(default)]
    pub both_teams_score: Option<f64>,
}

impl BookmakerOdds {
    pub fn outcome(&self, outcome: Outcome) -> Option<f64> {
        match outcome {
            Outcome::Home => valid_odd(self.home),
            Outcome::Draw => valid_odd(self.draw),
            Outcome::Away => valid_odd(self.away),
        }
    }

    pub fn is_empty(&self) -> bool {
        [
            self.home,
            self.draw,
            self.away,
            self.over_2_5,
            self.both_teams_score,
        ]
        .into_iter()
        .all(|o| valid_odd(o).is_none())
    }
}

pub fn valid_odd(odd: Option<f64>) -> Option<f64> {
    odd.filter(|v| v.is_finite() && *v > 0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueSignal {
    pub outcome: Outcome,
    pub odd: f64,
    pub model_pct: u8,
    pub edge: f64,
}

/// Checks home, away, then draw and reports the first priced outcome whose
/// modeled probability times the odd clears its threshold.
pub fn detect_value(
    dist: &MatchOutcomeDistribution,
    odds: &BookmakerOdds,
) -> Option<ValueSignal> {
    for outcome in [Outcome::Home, Outcome::Away, Outcome::Draw] {
        let Some(odd) = odds.outcome(outcome) else {
            continue;
        };
        let model_pct = outcome.model_pct(dist);
        let edge = odd * (model_pct as f64 / 100.0);
        let threshold = match outcome {
            Outcome::Draw => DRAW_EDGE_THRESHOLD,
            Outcome::Home | Outcome::Away => WIN_EDGE_THRESHOLD,
        };
        if edge > threshold {
            return Some(ValueSignal {
                outcome,
                odd,
                model_pct,
                edge,
            });
        }
    }
    None
}
