use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use prono_desk::analysis::{MatchRequest, SnapshotSource, analyze_match};
use prono_desk::api_football::{parse_odds_json, parse_standings_json};
use prono_desk::fallback;
use prono_desk::narrative::build_prompt;
use prono_desk::stats_engine::{
    TeamFormSnapshot, derive_goal_market_probabilities, derive_indices,
    derive_outcome_distribution,
};
use prono_desk::value_bet::BookmakerOdds;

const STANDINGS_JSON: &str = include_str!("../tests/fixtures/standings.json");
const ODDS_JSON: &str = include_str!("../tests/fixtures/odds.json");

fn sample_request() -> MatchRequest {
    let mut request = MatchRequest::manual("Lyon", "Paris Saint Germain");
    request.fixture_id = Some(1208412);
    request.home_source =
        SnapshotSource::Provided(TeamFormSnapshot::with_form("Lyon", 8, 12, 9, "LWDWW"));
    request.away_source = SnapshotSource::Provided(TeamFormSnapshot::with_form(
        "Paris Saint Germain",
        8,
        18,
        6,
        "WWDWL",
    ));
    request.odds = BookmakerOdds {
        home: Some(3.5),
        draw: Some(3.8),
        away: Some(2.0),
        over_2_5: Some(1.72),
        both_teams_score: Some(1.62),
    };
    request
}

fn bench_derive_indices(c: &mut Criterion) {
    let snap = TeamFormSnapshot::with_form("Lyon", 8, 12, 9, "LWDWW");
    c.bench_function("derive_indices", |b| {
        b.iter(|| derive_indices(black_box(&snap)))
    });
}

fn bench_fallback(c: &mut Criterion) {
    c.bench_function("fallback_synthetic_team", |b| {
        b.iter(|| fallback::synthetic_team(black_box("Unknown FC United")))
    });
}

fn bench_distributions(c: &mut Criterion) {
    let home = derive_indices(&TeamFormSnapshot::with_form("Lyon", 8, 12, 9, "LWDWW"));
    let away = derive_indices(&TeamFormSnapshot::with_form("PSG", 8, 18, 6, "WWDWL"));
    c.bench_function("outcome_and_goal_markets", |b| {
        b.iter(|| {
            let dist = derive_outcome_distribution(black_box(&home), black_box(&away));
            let goals = derive_goal_market_probabilities(
                black_box(home.expected_goals),
                black_box(away.expected_goals),
            );
            (dist, goals)
        })
    });
}

fn bench_analyze_match(c: &mut Criterion) {
    let request = sample_request();
    c.bench_function("analyze_match", |b| {
        b.iter(|| analyze_match(black_box(request.clone())))
    });
}

fn bench_build_prompt(c: &mut Criterion) {
    let analysis = analyze_match(sample_request());
    c.bench_function("build_prompt", |b| {
        b.iter(|| build_prompt(black_box(&analysis)))
    });
}

fn bench_api_parsing(c: &mut Criterion) {
    c.bench_function("standings_parse", |b| {
        b.iter(|| parse_standings_json(black_box(STANDINGS_JSON)).expect("valid standings"))
    });
    c.bench_function("odds_parse", |b| {
        b.iter(|| parse_odds_json(black_box(ODDS_JSON), Some(8)).expect("valid odds"))
    });
}

criterion_group!(
    benches,
    bench_derive_indices,
    bench_fallback,
    bench_distributions,
    bench_analyze_match,
    bench_build_prompt,
    bench_api_parsing
);
criterion_main!(benches);
