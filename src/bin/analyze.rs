use std::fs;
use std::path::PathBuf;

use prono_desk::analysis::{MatchRequest, SnapshotSource, analyze_match};
use prono_desk::narrative;
use prono_desk::stats_engine::TeamFormSnapshot;
use prono_desk::value_bet::BookmakerOdds;

#[derive(Debug, serde::Deserialize)]
struct SideCase {
    name: String,
    #[serde(default)]
    played: Option<u32>,
    #[serde(default)]
    goals_for: u32,
    #[serde(default)]
    goals_against: u32,
    #[serde(default)]
    form: String,
}

impl SideCase {
    fn source(&self) -> SnapshotSource {
        match self.played {
            Some(played) => SnapshotSource::Provided(TeamFormSnapshot::with_form(
                self.name.as_str(),
                played,
                self.goals_for,
                self.goals_against,
                &self.form,
            )),
            None => SnapshotSource::unavailable("no stats in case file"),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct AnalyzeCase {
    #[serde(default)]
    competition: Option<String>,
    #[serde(default)]
    kickoff: Option<String>,
    home: SideCase,
    away: SideCase,
    #[serde(default)]
    odds: BookmakerOdds,
}

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/analyze_case.json"));

    let raw = fs::read_to_string(&path)?;
    let case: AnalyzeCase = serde_json::from_str(&raw)?;

    // Offline: one case in, model output and the narrative prompt out.
    let request = MatchRequest {
        fixture_id: None,
        home_source: case.home.source(),
        away_source: case.away.source(),
        home: case.home.name,
        away: case.away.name,
        competition: case.competition,
        kickoff: case.kickoff,
        odds: case.odds,
        head_to_head: None,
    };
    let analysis = analyze_match(request);

    println!("{}", serde_json::to_string_pretty(&analysis)?);
    println!();
    println!("--- prompt ---");
    println!("{}", narrative::build_prompt(&analysis));

    Ok(())
}
