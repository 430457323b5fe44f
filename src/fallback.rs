//! Deterministic placeholder stats for teams the provider has no data for.
//!
//! Every value is drawn from a generator seeded by the team's display name, so
//! the same name always yields the same indices. Results are flagged
//! `is_estimated` and must not be presented as measured form.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::stats_engine::{MatchResult, RECENT_WINDOW, TeamFormSnapshot, TeamIndices, round_to};

const JITTER: i32 = 2;
const MOMENTUM_RANGE: (u8, u8) = (40, 90);
const EXPECTED_GOALS_RANGE: (f64, f64) = (0.9, 2.5);
const SYNTHETIC_PLAYED: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StrengthTier {
    Elite,
    Contender,
    Established,
    Competitive,
    Outsider,
}

impl StrengthTier {
    /// (attack, defense) before jitter.
    pub fn base(self) -> (i32, i32) {
        match self {
            Self::Elite => (88, 82),
            Self::Contender => (78, 72),
            Self::Established => (68, 64),
            Self::Competitive => (60, 56),
            Self::Outsider => (50, 48),
        }
    }
}

const ELITE: &[&str] = &[
    "real madrid",
    "manchester city",
    "bayern",
    "liverpool",
    "arsenal",
    "barcelona",
    "paris saint germain",
    "psg",
    "internazionale",
    "inter milan",
];

/// Names too short or too common to match as a word inside a longer name.
const EXACT: &[(&str, StrengthTier)] = &[("inter", StrengthTier::Elite)];

const CONTENDER: &[&str] = &[
    "atletico madrid",
    "atlético madrid",
    "borussia dortmund",
    "bayer leverkusen",
    "juventus",
    "ac milan",
    "napoli",
    "chelsea",
    "tottenham",
    "manchester united",
];

const ESTABLISHED: &[&str] = &[
    "newcastle",
    "aston villa",
    "roma",
    "atalanta",
    "lazio",
    "sevilla",
    "real sociedad",
    "villarreal",
    "rb leipzig",
    "marseille",
    "monaco",
    "lyon",
    "olympique lyonnais",
    "benfica",
    "porto",
    "sporting cp",
    "ajax",
    "psv",
];

const COMPETITIVE: &[&str] = &[
    "brighton",
    "west ham",
    "fulham",
    "crystal palace",
    "wolverhampton",
    "everton",
    "fiorentina",
    "bologna",
    "torino",
    "real betis",
    "athletic club",
    "valencia",
    "girona",
    "eintracht frankfurt",
    "stuttgart",
    "lille",
    "lens",
    "nice",
    "rennes",
    "feyenoord",
    "celtic",
    "galatasaray",
];

/// Case-insensitive. A listed name matches when its words appear as
/// consecutive whole words of `name`, so "lens" matches "RC Lens" only.
pub fn strength_tier(name: &str) -> StrengthTier {
    let words = name_words(name);
    if let Some((_, tier)) = EXACT.iter().find(|(n, _)| name_words(n) == words) {
        return *tier;
    }
    let tiers = [
        (StrengthTier::Elite, ELITE),
        (StrengthTier::Contender, CONTENDER),
        (StrengthTier::Established, ESTABLISHED),
        (StrengthTier::Competitive, COMPETITIVE),
    ];
    for (tier, names) in tiers {
        if names.iter().any(|n| contains_words(&words, &name_words(n))) {
            return tier;
        }
    }
    StrengthTier::Outsider
}

fn name_words(name: &str) -> Vec<String> {
    normalize_name(name)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_words(words: &[String], needle: &[String]) -> bool {
    !needle.is_empty() && words.windows(needle.len()).any(|w| w == needle)
}

pub fn name_seed(name: &str) -> u64 {
    let digest = Sha256::digest(normalize_name(name).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn synthetic_indices(name: &str) -> TeamIndices {
    let mut rng = StdRng::seed_from_u64(name_seed(name));
    indices_from_rng(strength_tier(name), &mut rng)
}

fn indices_from_rng(tier: StrengthTier, rng: &mut StdRng) -> TeamIndices {
    let (attack_base, defense_base) = tier.base();
    let attack = (attack_base + rng.gen_range(-JITTER..=JITTER)).clamp(0, 100);
    let defense = (defense_base + rng.gen_range(-JITTER..=JITTER)).clamp(10, 100);
    let momentum = rng.gen_range(MOMENTUM_RANGE.0..=MOMENTUM_RANGE.1);
    let expected_goals = round_to(
        rng.gen_range(EXPECTED_GOALS_RANGE.0..=EXPECTED_GOALS_RANGE.1),
        2,
    );

    TeamIndices {
        attack: attack as u8,
        defense: defense as u8,
        momentum,
        expected_goals,
        is_estimated: true,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticTeam {
    pub tier: StrengthTier,
    pub snapshot: TeamFormSnapshot,
    pub indices: TeamIndices,
}

/// Indices plus a display snapshot back-projected from them over a notional
/// ten-match season. The snapshot is for display only; the indices are authoritative.
pub fn synthetic_team(name: &str) -> SyntheticTeam {
    let tier = strength_tier(name);
    let mut rng = StdRng::seed_from_u64(name_seed(name));
    let indices = indices_from_rng(tier, &mut rng);

    let played = SYNTHETIC_PLAYED as f64;
    let goals_for = (indices.expected_goals * played).round() as u32;
    let conceded_rate = 2.0 * (1.0 - indices.defense as f64 / 100.0);
    let goals_against = (conceded_rate * played).round().max(0.0) as u32;

    let win_share = indices.momentum as f64 / 100.0;
    let recent_results = (0..RECENT_WINDOW)
        .map(|_| {
            let roll: f64 = rng.gen_range(0.0..1.0);
            if roll < win_share * 0.8 {
                MatchResult::Win
            } else if roll < win_share * 0.8 + 0.25 {
                MatchResult::Draw
            } else {
                MatchResult::Loss
            }
        })
        .collect();

    SyntheticTeam {
        tier,
        snapshot: TeamFormSnapshot::new(name, SYNTHETIC_PLAYED, goals_for, goals_against, recent_results),
        indices,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_lookup_is_case_insensitive() {
        assert_eq!(strength_tier("  REAL MADRID "), StrengthTier::Elite);
        assert_eq!(strength_tier("Chelsea FC"), StrengthTier::Contender);
        assert_eq!(strength_tier("AFC Ajax"), StrengthTier::Established);
        assert_eq!(strength_tier("Brighton & Hove Albion"), StrengthTier::Competitive);
        assert_eq!(strength_tier("Unknown FC United"), StrengthTier::Outsider);
    }

    #[test]
    fn tier_lookup_matches_whole_words() {
        assert_eq!(strength_tier("Inter"), StrengthTier::Elite);
        assert_eq!(strength_tier("FC Internazionale Milano"), StrengthTier::Elite);
        assert_eq!(strength_tier("Paris Saint-Germain"), StrengthTier::Elite);
        assert_eq!(strength_tier("Inter Miami"), StrengthTier::Outsider);
        assert_eq!(strength_tier("Internacional"), StrengthTier::Outsider);
        assert_eq!(strength_tier("Romania"), StrengthTier::Outsider);
        assert_eq!(strength_tier("Venice FC"), StrengthTier::Outsider);
        assert_eq!(strength_tier("AS Roma"), StrengthTier::Established);
        assert_eq!(strength_tier("OGC Nice"), StrengthTier::Competitive);
        assert_eq!(strength_tier("Atlético Madrid"), StrengthTier::Contender);
    }

    #[test]
    fn seed_ignores_surrounding_whitespace_and_case() {
        assert_eq!(name_seed("Arsenal"), name_seed("  arsenal "));
        assert_ne!(name_seed("Arsenal"), name_seed("Chelsea"));
    }

    #[test]
    fn jitter_stays_within_band() {
        for name in ["Real Madrid", "Lazio", "Somewhere Rovers", "Celtic", "Napoli"] {
            let tier = strength_tier(name);
            let (a, d) = tier.base();
            let idx = synthetic_indices(name);
            assert!((idx.attack as i32 - a).abs() <= JITTER, "{name}");
            assert!((idx.defense as i32 - d).abs() <= JITTER, "{name}");
            assert!((40..=90).contains(&idx.momentum));
            assert!(idx.is_estimated);
        }
    }

    #[test]
    fn synthetic_team_matches_indices() {
        let team = synthetic_team("Real Madrid");
        assert_eq!(team.indices, synthetic_indices("Real Madrid"));
        assert_eq!(team.snapshot.played, SYNTHETIC_PLAYED);
        assert_eq!(team.snapshot.recent_results.len(), RECENT_WINDOW);
        assert_eq!(team.snapshot, synthetic_team("Real Madrid").snapshot);
    }
}
