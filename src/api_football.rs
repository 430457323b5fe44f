use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::analysis::{H2hMeeting, HeadToHead, MatchRequest, SnapshotSource};
use crate::http_cache::fetch_json_cached;
use crate::http_client::http_client;
use crate::stats_engine::TeamFormSnapshot;
use crate::value_bet::{BookmakerOdds, valid_odd};

const DEFAULT_BASE_URL: &str = "https://v3.football.api-sports.io";
const DEFAULT_CACHE_SECS: u64 = 900;
const DEFAULT_FIXTURES_NEXT: u8 = 10;
const H2H_LAST: u8 = 5;

#[derive(Debug, Clone)]
pub struct ApiFootballConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub cache_ttl: Duration,
    pub fixtures_next: u8,
    pub bookmaker_id: Option<u32>,
}

impl ApiFootballConfig {
    pub fn from_env() -> Self {
        let api_key = env::var("API_FOOTBALL_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let base_url = env::var("API_FOOTBALL_BASE_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let cache_secs = env::var("API_FOOTBALL_CACHE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_CACHE_SECS)
            .clamp(30, 86_400);
        let fixtures_next = env::var("API_FOOTBALL_FIXTURES_NEXT")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .unwrap_or(DEFAULT_FIXTURES_NEXT)
            .clamp(1, 50);
        let bookmaker_id = env::var("API_FOOTBALL_BOOKMAKER")
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok());

        Self {
            api_key,
            base_url,
            cache_ttl: Duration::from_secs(cache_secs),
            fixtures_next,
            bookmaker_id,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamHit {
    pub id: u32,
    pub name: String,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: u64,
    pub kickoff: String,
    pub league_id: u32,
    pub league_name: String,
    pub season: u16,
    pub round: Option<String>,
    pub home: TeamRef,
    pub away: TeamRef,
}

/// One standings line. Every figure is optional because the upstream omits
/// fields freely; see [`StandingsRow::to_source`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StandingsRow {
    pub team_id: Option<u32>,
    pub team_name: Option<String>,
    pub played: Option<u32>,
    pub goals_for: Option<u32>,
    pub goals_against: Option<u32>,
    pub form: Option<String>,
}

impl StandingsRow {
    pub fn to_source(&self, display_name: &str) -> SnapshotSource {
        let (Some(played), Some(goals_for), Some(goals_against), Some(form)) = (
            self.played,
            self.goals_for,
            self.goals_against,
            self.form.as_deref(),
        ) else {
            return SnapshotSource::unavailable("incomplete standings row");
        };
        if played == 0 {
            return SnapshotSource::unavailable("no matches played");
        }
        SnapshotSource::Provided(TeamFormSnapshot::with_form(
            display_name,
            played,
            goals_for,
            goals_against,
            form,
        ))
    }
}

pub fn search_teams(cfg: &ApiFootballConfig, query: &str) -> Result<Vec<TeamHit>> {
    let query = query.trim();
    if query.len() < 3 {
        return Err(anyhow::anyhow!("team search needs at least 3 characters"));
    }
    let url = format!("{}/teams?search={}", cfg.base_url, encode_query(query));
    let body = get(cfg, &url).context("team search request failed")?;
    parse_teams_json(&body)
}

pub fn fetch_upcoming_fixtures(cfg: &ApiFootballConfig, team_id: u32) -> Result<Vec<Fixture>> {
    let url = format!(
        "{}/fixtures?team={team_id}&next={}",
        cfg.base_url, cfg.fixtures_next
    );
    let body = get(cfg, &url).context("fixtures request failed")?;
    parse_fixtures_json(&body)
}

pub fn fetch_standings(
    cfg: &ApiFootballConfig,
    league_id: u32,
    season: u16,
) -> Result<Vec<StandingsRow>> {
    let url = format!(
        "{}/standings?league={league_id}&season={season}",
        cfg.base_url
    );
    let body = get(cfg, &url).context("standings request failed")?;
    parse_standings_json(&body)
}

pub fn fetch_odds(cfg: &ApiFootballConfig, fixture_id: u64) -> Result<BookmakerOdds> {
    let url = format!("{}/odds?fixture={fixture_id}", cfg.base_url);
    let body = get(cfg, &url).context("odds request failed")?;
    parse_odds_json(&body, cfg.bookmaker_id)
}

pub fn fetch_head_to_head(
    cfg: &ApiFootballConfig,
    home: &TeamRef,
    away: &TeamRef,
) -> Result<HeadToHead> {
    let url = format!(
        "{}/fixtures/headtohead?h2h={}-{}&last={H2H_LAST}",
        cfg.base_url, home.id, away.id
    );
    let body = get(cfg, &url).context("head-to-head request failed")?;
    let meetings = parse_head_to_head_json(&body)?;
    Ok(HeadToHead::from_meetings(&home.name, meetings))
}

pub struct FixtureData {
    pub request: MatchRequest,
    pub warnings: Vec<String>,
}

/// Gathers every upstream input for one fixture. Standings, odds and head-to-head
/// are fetched concurrently; each failure degrades to its "absent" form and is
/// reported in `warnings`.
pub fn load_fixture_data(cfg: &ApiFootballConfig, fixture: &Fixture) -> FixtureData {
    let ((standings, odds), h2h) = rayon::join(
        || {
            rayon::join(
                || fetch_standings(cfg, fixture.league_id, fixture.season),
                || fetch_odds(cfg, fixture.id),
            )
        },
        || fetch_head_to_head(cfg, &fixture.home, &fixture.away),
    );

    let mut warnings = Vec::new();
    let (home_source, away_source) = match standings {
        Ok(rows) => (
            source_for(&rows, &fixture.home),
            source_for(&rows, &fixture.away),
        ),
        Err(err) => {
            warnings.push(format!("standings unavailable: {err:#}"));
            let reason = "standings unavailable";
            (
                SnapshotSource::unavailable(reason),
                SnapshotSource::unavailable(reason),
            )
        }
    };
    let odds = odds.unwrap_or_else(|err| {
        warnings.push(format!("odds unavailable: {err:#}"));
        BookmakerOdds::default()
    });
    let head_to_head = match h2h {
        Ok(h2h) if !h2h.meetings.is_empty() => Some(h2h),
        Ok(_) => None,
        Err(err) => {
            warnings.push(format!("head-to-head unavailable: {err:#}"));
            None
        }
    };

    info!(
        fixture = fixture.id,
        warnings = warnings.len(),
        "fixture data loaded"
    );

    FixtureData {
        request: MatchRequest {
            fixture_id: Some(fixture.id),
            home: fixture.home.name.clone(),
            away: fixture.away.name.clone(),
            competition: Some(fixture.league_name.clone()),
            kickoff: Some(fixture.kickoff.clone()),
            home_source,
            away_source,
            odds,
            head_to_head,
        },
        warnings,
    }
}

fn source_for(rows: &[StandingsRow], team: &TeamRef) -> SnapshotSource {
    rows.iter()
        .find(|r| r.team_id == Some(team.id))
        .map(|r| r.to_source(&team.name))
        .unwrap_or_else(|| SnapshotSource::unavailable("team not in standings"))
}

fn get(cfg: &ApiFootballConfig, url: &str) -> Result<String> {
    let Some(key) = cfg.api_key.as_deref() else {
        return Err(anyhow::anyhow!("API_FOOTBALL_KEY not set"));
    };
    debug!(url, "api-football request");
    let client = http_client()?;
    fetch_json_cached(
        client,
        url,
        &[("x-apisports-key", key)],
        cfg.cache_ttl,
        check_envelope,
    )
}

fn encode_query(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push_str("%20"),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

/// Rejects bodies the cache must not keep: invalid json or a populated `errors`
/// field, which API-Football sends with HTTP 200 for rate limits and bad keys.
pub(crate) fn check_envelope(raw: &str) -> Result<()> {
    parse_envelope(raw).map(|_| ())
}

/// Parses the common envelope and returns the `response` payload. `null` and empty
/// bodies yield `None`; a populated `errors` field (rate limit, bad key) is an error.
fn parse_envelope(raw: &str) -> Result<Option<Value>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    let mut root: Value = serde_json::from_str(trimmed).context("invalid api-football json")?;

    if let Some(errors) = root.get("errors") {
        let messages: Vec<String> = match errors {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| format!("{k}: {}", v.as_str().unwrap_or_default()))
                .collect(),
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect(),
            _ => Vec::new(),
        };
        if !messages.is_empty() {
            return Err(anyhow::anyhow!("api-football error: {}", messages.join("; ")));
        }
    }

    Ok(root.get_mut("response").map(Value::take))
}

pub fn parse_teams_json(raw: &str) -> Result<Vec<TeamHit>> {
    let Some(response) = parse_envelope(raw)? else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for item in response.as_array().into_iter().flatten() {
        let Some(team) = item.get("team") else {
            continue;
        };
        let (Some(id), Some(name)) = (as_u32(team.get("id")), as_string(team.get("name"))) else {
            continue;
        };
        out.push(TeamHit {
            id,
            name,
            country: as_string(team.get("country")),
        });
    }
    Ok(out)
}

pub fn parse_fixtures_json(raw: &str) -> Result<Vec<Fixture>> {
    let Some(response) = parse_envelope(raw)? else {
        return Ok(Vec::new());
    };
    let mut out: Vec<Fixture> = response
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(parse_fixture)
        .collect();
    out.sort_by(|a, b| a.kickoff.cmp(&b.kickoff).then(a.id.cmp(&b.id)));
    out.dedup_by_key(|f| f.id);
    Ok(out)
}

fn parse_fixture(v: &Value) -> Option<Fixture> {
    let fixture = v.get("fixture")?;
    let league = v.get("league")?;
    let teams = v.get("teams")?;

    Some(Fixture {
        id: fixture.get("id")?.as_u64()?,
        kickoff: as_string(fixture.get("date")).unwrap_or_default(),
        league_id: as_u32(league.get("id"))?,
        league_name: as_string(league.get("name")).unwrap_or_default(),
        season: league.get("season")?.as_u64()? as u16,
        round: as_string(league.get("round")),
        home: parse_team_ref(teams.get("home")?)?,
        away: parse_team_ref(teams.get("away")?)?,
    })
}

fn parse_team_ref(v: &Value) -> Option<TeamRef> {
    Some(TeamRef {
        id: as_u32(v.get("id"))?,
        name: as_string(v.get("name"))?,
    })
}

pub fn parse_standings_json(raw: &str) -> Result<Vec<StandingsRow>> {
    let Some(response) = parse_envelope(raw)? else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for entry in response.as_array().into_iter().flatten() {
        let groups = entry
            .get("league")
            .and_then(|l| l.get("standings"))
            .and_then(|s| s.as_array());
        // Leagues with groups return one table per group.
        for group in groups.into_iter().flatten() {
            for row in group.as_array().into_iter().flatten() {
                out.push(parse_standings_row(row));
            }
        }
    }
    Ok(out)
}

fn parse_standings_row(row: &Value) -> StandingsRow {
    let team = row.get("team");
    let all = row.get("all");
    let goals = all.and_then(|a| a.get("goals"));
    StandingsRow {
        team_id: as_u32(team.and_then(|t| t.get("id"))),
        team_name: as_string(team.and_then(|t| t.get("name"))),
        played: as_u32(all.and_then(|a| a.get("played"))),
        goals_for: as_u32(goals.and_then(|g| g.get("for"))),
        goals_against: as_u32(goals.and_then(|g| g.get("against"))),
        form: as_string(row.get("form")),
    }
}

pub fn parse_odds_json(raw: &str, bookmaker_id: Option<u32>) -> Result<BookmakerOdds> {
    let Some(response) = parse_envelope(raw)? else {
        return Ok(BookmakerOdds::default());
    };
    let Some(bookmakers) = response
        .as_array()
        .and_then(|items| items.first())
        .and_then(|first| first.get("bookmakers"))
        .and_then(|b| b.as_array())
    else {
        return Ok(BookmakerOdds::default());
    };

    let chosen = bookmaker_id
        .and_then(|id| bookmakers.iter().find(|b| as_u32(b.get("id")) == Some(id)))
        .or_else(|| bookmakers.first());
    let Some(bookmaker) = chosen else {
        return Ok(BookmakerOdds::default());
    };

    let mut odds = BookmakerOdds::default();
    for bet in bookmaker
        .get("bets")
        .and_then(|b| b.as_array())
        .into_iter()
        .flatten()
    {
        let name = as_string(bet.get("name")).unwrap_or_default();
        let values = bet.get("values").and_then(|v| v.as_array());
        let quote = |label: &str| -> Option<f64> {
            values?
                .iter()
                .find(|v| {
                    as_string(v.get("value")).is_some_and(|s| s.eq_ignore_ascii_case(label))
                })
                .and_then(|v| parse_odd(v.get("odd")))
        };
        match name.as_str() {
            "Match Winner" => {
                odds.home = quote("Home");
                odds.draw = quote("Draw");
                odds.away = quote("Away");
            }
            "Goals Over/Under" => odds.over_2_5 = quote("Over 2.5"),
            "Both Teams Score" => odds.both_teams_score = quote("Yes"),
            _ => {}
        }
    }
    Ok(odds)
}

/// Odds arrive as strings ("2.10"), occasionally as numbers.
fn parse_odd(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    let parsed = match v {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    valid_odd(parsed)
}

pub fn parse_head_to_head_json(raw: &str) -> Result<Vec<H2hMeeting>> {
    let Some(response) = parse_envelope(raw)? else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for item in response.as_array().into_iter().flatten() {
        let teams = item.get("teams");
        let goals = item.get("goals");
        let (Some(home), Some(away)) = (
            as_string(teams.and_then(|t| t.get("home")).and_then(|h| h.get("name"))),
            as_string(teams.and_then(|t| t.get("away")).and_then(|a| a.get("name"))),
        ) else {
            continue;
        };
        // Unplayed meetings carry null goals.
        let (Some(home_goals), Some(away_goals)) = (
            as_u32(goals.and_then(|g| g.get("home"))),
            as_u32(goals.and_then(|g| g.get("away"))),
        ) else {
            continue;
        };
        let date = as_string(item.get("fixture").and_then(|f| f.get("date"))).unwrap_or_default();
        out.push(H2hMeeting {
            date,
            home,
            away,
            home_goals: home_goals.min(u8::MAX as u32) as u8,
            away_goals: away_goals.min(u8::MAX as u32) as u8,
        });
    }
    // Most recent first.
    out.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(out)
}

fn as_u32(v: Option<&Value>) -> Option<u32> {
    v?.as_u64().and_then(|n| u32::try_from(n).ok())
}

fn as_string(v: Option<&Value>) -> Option<String> {
    v?.as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_percent_encoded() {
        assert_eq!(encode_query("Real Madrid"), "Real%20Madrid");
        assert_eq!(encode_query("Brighton & Hove"), "Brighton%20%26%20Hove");
    }

    #[test]
    fn incomplete_row_is_unavailable() {
        let row = StandingsRow {
            team_id: Some(1),
            played: Some(10),
            goals_for: Some(12),
            goals_against: None,
            form: Some("WWDLW".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            row.to_source("Team"),
            SnapshotSource::Unavailable { .. }
        ));
    }

    #[test]
    fn zero_played_row_is_unavailable() {
        let row = StandingsRow {
            team_id: Some(1),
            team_name: Some("Team".to_string()),
            played: Some(0),
            goals_for: Some(0),
            goals_against: Some(0),
            form: Some(String::new()),
        };
        match row.to_source("Team") {
            SnapshotSource::Unavailable { reason } => assert_eq!(reason, "no matches played"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_key_is_an_error() {
        let cfg = ApiFootballConfig {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_ttl: Duration::from_secs(60),
            fixtures_next: 10,
            bookmaker_id: None,
        };
        let err = fetch_upcoming_fixtures(&cfg, 42).expect_err("no key");
        assert!(format!("{err:#}").contains("API_FOOTBALL_KEY"));
    }

    #[test]
    fn error_envelope_is_reported() {
        let raw = r#"{"errors":{"requests":"You have reached the request limit for the day"},"response":[]}"#;
        let err = parse_teams_json(raw).expect_err("rate limited");
        assert!(err.to_string().contains("request limit"));
    }

    #[test]
    fn numeric_odds_are_accepted() {
        assert_eq!(parse_odd(Some(&serde_json::json!(1.95))), Some(1.95));
        assert_eq!(parse_odd(Some(&serde_json::json!("x"))), None);
        assert_eq!(parse_odd(Some(&serde_json::json!("-2"))), None);
    }
}
