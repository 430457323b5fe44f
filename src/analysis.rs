use serde::{Deserialize, Serialize};

use crate::bet_tiers::{BetTier, derive_bet_tiers};
use crate::fallback;
use crate::stats_engine::{
    GoalMarketProbabilities, MatchOutcomeDistribution, TeamFormSnapshot, TeamIndices,
    derive_goal_market_probabilities, derive_indices, derive_outcome_distribution,
};
use crate::value_bet::{BookmakerOdds, ValueSignal, detect_value};

/// Upstream form for one team, with absence modeled explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SnapshotSource {
    Provided(TeamFormSnapshot),
    Unavailable { reason: String },
}

impl SnapshotSource {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

pub fn resolve_indices(name: &str, source: &SnapshotSource) -> TeamIndices {
    match source {
        SnapshotSource::Provided(snapshot) if snapshot.played > 0 => derive_indices(snapshot),
        _ => fallback::synthetic_indices(name),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct H2hMeeting {
    pub date: String,
    pub home: String,
    pub away: String,
    pub home_goals: u8,
    pub away_goals: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadToHead {
    pub meetings: Vec<H2hMeeting>,
    /// Wins for the side playing at home in the analysed fixture.
    pub home_side_wins: usize,
    pub draws: usize,
    pub away_side_wins: usize,
    pub avg_goals: f64,
}

impl HeadToHead {
    /// `home_side` names the analysed fixture's home team, whatever venue each meeting had.
    pub fn from_meetings(home_side: &str, meetings: Vec<H2hMeeting>) -> Self {
        let mut home_side_wins = 0;
        let mut draws = 0;
        let mut away_side_wins = 0;
        let mut goals = 0u32;

        for m in &meetings {
            goals += m.home_goals as u32 + m.away_goals as u32;
            if m.home_goals == m.away_goals {
                draws += 1;
                continue;
            }
            let winner = if m.home_goals > m.away_goals {
                &m.home
            } else {
                &m.away
            };
            if winner.eq_ignore_ascii_case(home_side) {
                home_side_wins += 1;
            } else {
                away_side_wins += 1;
            }
        }

        let avg_goals = if meetings.is_empty() {
            0.0
        } else {
            crate::stats_engine::round_to(goals as f64 / meetings.len() as f64, 2)
        };

        Self {
            meetings,
            home_side_wins,
            draws,
            away_side_wins,
            avg_goals,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub fixture_id: Option<u64>,
    pub home: String,
    pub away: String,
    pub competition: Option<String>,
    pub kickoff: Option<String>,
    pub home_source: SnapshotSource,
    pub away_source: SnapshotSource,
    pub odds: BookmakerOdds,
    pub head_to_head: Option<HeadToHead>,
}

impl MatchRequest {
    /// Request with no upstream data: both sides run on estimates.
    pub fn manual(home: impl Into<String>, away: impl Into<String>) -> Self {
        Self {
            fixture_id: None,
            home: home.into(),
            away: away.into(),
            competition: None,
            kickoff: None,
            home_source: SnapshotSource::unavailable("manual fixture"),
            away_source: SnapshotSource::unavailable("manual fixture"),
            odds: BookmakerOdds::default(),
            head_to_head: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamReport {
    pub name: String,
    pub indices: TeamIndices,
    pub snapshot: Option<TeamFormSnapshot>,
    pub unavailable_reason: Option<String>,
}

impl TeamReport {
    fn resolve(name: String, source: SnapshotSource) -> Self {
        let indices = resolve_indices(&name, &source);
        match source {
            SnapshotSource::Provided(snapshot) if !indices.is_estimated => Self {
                name,
                indices,
                snapshot: Some(snapshot),
                unavailable_reason: None,
            },
            SnapshotSource::Provided(_) => Self {
                name,
                indices,
                snapshot: None,
                unavailable_reason: Some("no matches played".to_string()),
            },
            SnapshotSource::Unavailable { reason } => Self {
                name,
                indices,
                snapshot: None,
                unavailable_reason: Some(reason),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchAnalysis {
    pub fixture_id: Option<u64>,
    pub competition: Option<String>,
    pub kickoff: Option<String>,
    pub home: TeamReport,
    pub away: TeamReport,
    pub outcome: MatchOutcomeDistribution,
    pub goals: GoalMarketProbabilities,
    pub odds: BookmakerOdds,
    pub value: Option<ValueSignal>,
    pub tiers: Vec<BetTier>,
    pub head_to_head: Option<HeadToHead>,
}

impl MatchAnalysis {
    pub fn label(&self) -> String {
        format!("{} vs {}", self.home.name, self.away.name)
    }

    /// Identifies the analysed match so late async results can be matched back.
    pub fn key(&self) -> String {
        match self.fixture_id {
            Some(id) => format!("fixture:{id}"),
            None => format!("manual:{}", self.label().to_lowercase()),
        }
    }

    pub fn any_estimated(&self) -> bool {
        self.home.indices.is_estimated || self.away.indices.is_estimated
    }
}

pub fn analyze_match(request: MatchRequest) -> MatchAnalysis {
    let home = TeamReport::resolve(request.home, request.home_source);
    let away = TeamReport::resolve(request.away, request.away_source);

    let outcome = derive_outcome_distribution(&home.indices, &away.indices);
    let goals = derive_goal_market_probabilities(
        home.indices.expected_goals,
        away.indices.expected_goals,
    );
    let value = detect_value(&outcome, &request.odds);
    let tiers = derive_bet_tiers(&outcome, &goals, &request.odds, value.as_ref());

    MatchAnalysis {
        fixture_id: request.fixture_id,
        competition: request.competition,
        kickoff: request.kickoff,
        home,
        away,
        outcome,
        goals,
        odds: request.odds,
        value,
        tiers,
        head_to_head: request.head_to_head,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meeting(home: &str, away: &str, hg: u8, ag: u8) -> H2hMeeting {
        H2hMeeting {
            date: "2025-01-01".to_string(),
            home: home.to_string(),
            away: away.to_string(),
            home_goals: hg,
            away_goals: ag,
        }
    }

    #[test]
    fn head_to_head_credits_sides_regardless_of_venue() {
        let h2h = HeadToHead::from_meetings(
            "Arsenal",
            vec![
                meeting("Arsenal", "Chelsea", 2, 0),
                meeting("Chelsea", "Arsenal", 1, 3),
                meeting("Chelsea", "Arsenal", 2, 1),
                meeting("Arsenal", "Chelsea", 1, 1),
            ],
        );
        assert_eq!(h2h.home_side_wins, 2);
        assert_eq!(h2h.away_side_wins, 1);
        assert_eq!(h2h.draws, 1);
        assert_eq!(h2h.avg_goals, 2.75);
    }

    #[test]
    fn zero_played_snapshot_is_reported_as_estimate() {
        let mut req = MatchRequest::manual("Arsenal", "Chelsea");
        req.home_source =
            SnapshotSource::Provided(TeamFormSnapshot::new("Arsenal", 0, 0, 0, Vec::new()));
        let analysis = analyze_match(req);
        assert!(analysis.home.indices.is_estimated);
        assert_eq!(
            analysis.home.unavailable_reason.as_deref(),
            Some("no matches played")
        );
        assert!(analysis.any_estimated());
    }

    #[test]
    fn provided_snapshots_are_measured() {
        let mut req = MatchRequest::manual("Arsenal", "Chelsea");
        req.fixture_id = Some(42);
        req.home_source =
            SnapshotSource::Provided(TeamFormSnapshot::with_form("Arsenal", 10, 24, 8, "WWDWL"));
        req.away_source =
            SnapshotSource::Provided(TeamFormSnapshot::with_form("Chelsea", 10, 15, 12, "WDLDW"));
        let analysis = analyze_match(req);
        assert!(!analysis.any_estimated());
        assert_eq!(analysis.key(), "fixture:42");
        let sum = analysis.outcome.home_win_pct as u32
            + analysis.outcome.draw_pct as u32
            + analysis.outcome.away_win_pct as u32;
        assert_eq!(sum, 100);
        assert_eq!(analysis.tiers.len(), 3);
    }
}
