use prono_desk::analysis::{MatchAnalysis, MatchRequest, analyze_match};
use prono_desk::api_football::{Fixture, TeamHit, TeamRef};
use prono_desk::bet_tiers::TierLevel;
use prono_desk::ledger::{Settlement, WagerStatus};
use prono_desk::state::{AppState, Delta, NarrativeState, Screen, apply_delta};
use prono_desk::value_bet::BookmakerOdds;

fn team(id: u32, name: &str) -> TeamHit {
    TeamHit {
        id,
        name: name.to_string(),
        country: Some("France".to_string()),
    }
}

fn fixture(id: u64) -> Fixture {
    Fixture {
        id,
        kickoff: "2025-10-26T19:45:00+00:00".to_string(),
        league_id: 61,
        league_name: "Ligue 1".to_string(),
        season: 2025,
        round: Some("Regular Season - 10".to_string()),
        home: TeamRef {
            id: 80,
            name: "Lyon".to_string(),
        },
        away: TeamRef {
            id: 85,
            name: "Paris Saint Germain".to_string(),
        },
    }
}

fn priced_analysis(fixture_id: u64) -> MatchAnalysis {
    let mut request = MatchRequest::manual("Lyon", "Paris Saint Germain");
    request.fixture_id = Some(fixture_id);
    request.odds = BookmakerOdds {
        home: Some(3.5),
        draw: Some(3.8),
        away: Some(2.0),
        over_2_5: Some(1.72),
        both_teams_score: Some(1.62),
    };
    analyze_match(request)
}

#[test]
fn search_results_move_to_team_list() {
    let mut state = AppState::with_bankroll(100.0, 10.0);
    state.loading = true;

    apply_delta(
        &mut state,
        Delta::SetTeams {
            query: "lyon".to_string(),
            teams: vec![team(80, "Lyon"), team(1501, "Lyon Duchère")],
        },
    );

    assert!(!state.loading);
    assert_eq!(state.screen, Screen::Teams);
    assert!(!state.search_active);
    assert_eq!(state.selected_team().map(|t| t.id), Some(80));
    assert!(state.logs.back().is_some_and(|l| l.contains("2 team(s)")));
}

#[test]
fn empty_search_stays_on_search_screen() {
    let mut state = AppState::with_bankroll(100.0, 10.0);
    apply_delta(
        &mut state,
        Delta::SetTeams {
            query: "zzz".to_string(),
            teams: Vec::new(),
        },
    );
    assert_eq!(state.screen, Screen::Search);
}

#[test]
fn fixtures_then_analysis_then_back() {
    let mut state = AppState::with_bankroll(100.0, 10.0);
    apply_delta(
        &mut state,
        Delta::SetTeams {
            query: "lyon".to_string(),
            teams: vec![team(80, "Lyon")],
        },
    );
    apply_delta(
        &mut state,
        Delta::SetFixtures {
            team: team(80, "Lyon"),
            fixtures: vec![fixture(1208412)],
        },
    );
    assert_eq!(state.screen, Screen::Fixtures);
    assert_eq!(state.selected_fixture().map(|f| f.id), Some(1208412));

    apply_delta(
        &mut state,
        Delta::SetAnalysis(Box::new(priced_analysis(1208412))),
    );
    assert_eq!(state.screen, Screen::Analysis);
    assert_eq!(state.narrative, NarrativeState::Idle);

    state.go_back();
    assert_eq!(state.screen, Screen::Fixtures);
    state.go_back();
    assert_eq!(state.screen, Screen::Teams);
    state.go_back();
    assert_eq!(state.screen, Screen::Search);
    assert!(state.search_active);
}

#[test]
fn late_narrative_for_another_match_is_ignored() {
    let mut state = AppState::with_bankroll(100.0, 10.0);
    apply_delta(&mut state, Delta::SetAnalysis(Box::new(priced_analysis(2))));
    state.narrative = NarrativeState::Pending;

    apply_delta(
        &mut state,
        Delta::SetNarrative {
            key: "fixture:1".to_string(),
            text: "stale".to_string(),
        },
    );
    assert_eq!(state.narrative, NarrativeState::Pending);

    apply_delta(
        &mut state,
        Delta::SetNarrative {
            key: "fixture:2".to_string(),
            text: "Lyon should sit deep.".to_string(),
        },
    );
    assert_eq!(
        state.narrative,
        NarrativeState::Ready("Lyon should sit deep.".to_string())
    );
}

#[test]
fn narrative_failure_is_logged_and_shown() {
    let mut state = AppState::with_bankroll(100.0, 10.0);
    apply_delta(&mut state, Delta::SetAnalysis(Box::new(priced_analysis(7))));
    apply_delta(
        &mut state,
        Delta::NarrativeFailed {
            key: "fixture:7".to_string(),
            error: "OPENAI_API_KEY not set".to_string(),
        },
    );
    assert!(matches!(state.narrative, NarrativeState::Failed(_)));
    assert!(
        state
            .logs
            .iter()
            .any(|l| l.starts_with("[WARN]") && l.contains("OPENAI_API_KEY"))
    );
}

#[test]
fn estimated_analysis_logs_a_warning() {
    let mut state = AppState::with_bankroll(100.0, 10.0);
    let analysis = analyze_match(MatchRequest::manual("Lyon", "Lens"));
    apply_delta(&mut state, Delta::SetAnalysis(Box::new(analysis)));
    assert!(
        state
            .logs
            .iter()
            .any(|l| l.contains("Lyon vs Lens") && l.contains("estimated"))
    );
}

#[test]
fn request_failure_clears_loading() {
    let mut state = AppState::with_bankroll(100.0, 10.0);
    state.loading = true;
    apply_delta(
        &mut state,
        Delta::RequestFailed("Team search error: API_FOOTBALL_KEY not set".to_string()),
    );
    assert!(!state.loading);
    assert_eq!(
        state.logs.back().map(String::as_str),
        Some("[WARN] Team search error: API_FOOTBALL_KEY not set")
    );
}

#[test]
fn console_is_capped() {
    let mut state = AppState::with_bankroll(100.0, 10.0);
    for n in 0..250 {
        apply_delta(&mut state, Delta::Log(format!("[INFO] line {n}")));
    }
    assert_eq!(state.logs.len(), 200);
    assert_eq!(state.logs.front().map(String::as_str), Some("[INFO] line 50"));
}

#[test]
fn tier_wagers_flow_into_the_ledger() {
    let mut state = AppState::with_bankroll(100.0, 10.0);
    assert_eq!(state.place_tier_wager(TierLevel::Safe), None);

    apply_delta(&mut state, Delta::SetAnalysis(Box::new(priced_analysis(3))));
    let safe = state.place_tier_wager(TierLevel::Safe).expect("safe wager");
    state.adjust_stake(true);
    let aggressive = state
        .place_tier_wager(TierLevel::Aggressive)
        .expect("aggressive wager");

    let wagers = state.ledger.wagers();
    assert_eq!(wagers.len(), 2);
    assert_eq!(wagers[0].fixture, "Lyon vs Paris Saint Germain");
    assert!(wagers[0].pick.ends_with("(Safe)"));
    assert_eq!(wagers[1].stake, 15.0);
    assert_eq!(state.ledger.summary().bankroll, 75.0);

    state.screen = Screen::Ledger;
    state.settle_selected(Settlement::Lost);
    state.select_next();
    state.settle_selected(Settlement::Void);
    state.settle_selected(Settlement::Won);

    assert_eq!(state.ledger.status(safe), Some(WagerStatus::Lost));
    assert_eq!(state.ledger.status(aggressive), Some(WagerStatus::Void));
    assert!(state.logs.iter().any(|l| l.contains("already settled")));

    let summary = state.ledger.summary();
    assert_eq!(summary.pending, 0);
    assert_eq!(summary.profit, -10.0);
    assert_eq!(summary.bankroll, 90.0);
}
