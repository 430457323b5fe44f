use serde::Serialize;

use crate::stats_engine::{GoalMarketProbabilities, MatchOutcomeDistribution, round_to};
use crate::value_bet::{BookmakerOdds, Outcome, ValueSignal, valid_odd};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TierLevel {
    Safe,
    Mid,
    Aggressive,
}

impl TierLevel {
    pub const ALL: [TierLevel; 3] = [TierLevel::Safe, TierLevel::Mid, TierLevel::Aggressive];

    pub fn label(self) -> &'static str {
        match self {
            Self::Safe => "SAFE",
            Self::Mid => "MID",
            Self::Aggressive => "AGGRESSIVE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Market {
    Outright(Outcome),
    HomeOrDraw,
    DrawOrAway,
    Over1_5,
    Over2_5,
    BothTeamsScore,
}

impl Market {
    pub fn label(self) -> &'static str {
        match self {
            Self::Outright(o) => o.label(),
            Self::HomeOrDraw => "Double chance 1X",
            Self::DrawOrAway => "Double chance X2",
            Self::Over1_5 => "Over 1.5 goals",
            Self::Over2_5 => "Over 2.5 goals",
            Self::BothTeamsScore => "Both teams to score",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PriceSource {
    Bookmaker,
    Fair,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetTier {
    pub level: TierLevel,
    pub pick: Market,
    pub odd: f64,
    pub model_pct: u8,
    pub priced: PriceSource,
}

pub fn derive_bet_tiers(
    dist: &MatchOutcomeDistribution,
    goals: &GoalMarketProbabilities,
    odds: &BookmakerOdds,
    value: Option<&ValueSignal>,
) -> Vec<BetTier> {
    let home_or_draw = dist.home_win_pct.saturating_add(dist.draw_pct);
    let draw_or_away = dist.draw_pct.saturating_add(dist.away_win_pct);

    let safe_candidates = [
        (Market::Over1_5, goals.over1_5_pct),
        (Market::HomeOrDraw, home_or_draw),
        (Market::DrawOrAway, draw_or_away),
    ];
    // Ties keep the earlier candidate.
    let (safe_pick, safe_pct) = safe_candidates
        .into_iter()
        .fold(safe_candidates[0], |best, c| if c.1 > best.1 { c } else { best });

    let (mid_pick, mid_pct) = if goals.both_teams_score_pct >= goals.over2_5_pct {
        (Market::BothTeamsScore, goals.both_teams_score_pct)
    } else {
        (Market::Over2_5, goals.over2_5_pct)
    };

    let aggressive = match value {
        Some(signal) => signal.outcome,
        None if dist.away_win_pct > dist.home_win_pct => Outcome::Away,
        None => Outcome::Home,
    };
    let aggressive_pct = aggressive.model_pct(dist);

    vec![
        price_tier(TierLevel::Safe, safe_pick, safe_pct, odds),
        price_tier(TierLevel::Mid, mid_pick, mid_pct, odds),
        price_tier(
            TierLevel::Aggressive,
            Market::Outright(aggressive),
            aggressive_pct,
            odds,
        ),
    ]
}

fn price_tier(level: TierLevel, pick: Market, model_pct: u8, odds: &BookmakerOdds) -> BetTier {
    let (odd, priced) = match bookmaker_price(pick, odds) {
        Some(odd) => (odd, PriceSource::Bookmaker),
        None => (fair_odd(model_pct), PriceSource::Fair),
    };
    BetTier {
        level,
        pick,
        odd,
        model_pct,
        priced,
    }
}

fn bookmaker_price(pick: Market, odds: &BookmakerOdds) -> Option<f64> {
    match pick {
        Market::Outright(o) => odds.outcome(o),
        Market::HomeOrDraw => double_chance(odds.outcome(Outcome::Home), odds.outcome(Outcome::Draw)),
        Market::DrawOrAway => double_chance(odds.outcome(Outcome::Draw), odds.outcome(Outcome::Away)),
        Market::Over2_5 => valid_odd(odds.over_2_5),
        Market::BothTeamsScore => valid_odd(odds.both_teams_score),
        Market::Over1_5 => None,
    }
}

fn double_chance(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    let (a, b) = (a?, b?);
    Some(round_to(1.0 / (1.0 / a + 1.0 / b), 2))
}

/// Break-even decimal odd for a modeled percentage.
pub fn fair_odd(model_pct: u8) -> f64 {
    let pct = model_pct.max(1) as f64;
    round_to(100.0 / pct, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (MatchOutcomeDistribution, GoalMarketProbabilities) {
        (
            MatchOutcomeDistribution {
                home_win_pct: 49,
                draw_pct: 25,
                away_win_pct: 26,
            },
            GoalMarketProbabilities {
                over1_5_pct: 80,
                over2_5_pct: 58,
                both_teams_score_pct: 62,
            },
        )
    }

    #[test]
    fn tiers_without_odds_use_fair_prices() {
        let (dist, goals) = sample();
        let tiers = derive_bet_tiers(&dist, &goals, &BookmakerOdds::default(), None);
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[0].pick, Market::Over1_5);
        assert_eq!(tiers[0].odd, 1.25);
        assert_eq!(tiers[1].pick, Market::BothTeamsScore);
        assert_eq!(tiers[2].pick, Market::Outright(Outcome::Home));
        assert!(tiers.iter().all(|t| t.priced == PriceSource::Fair));
    }

    #[test]
    fn value_signal_drives_aggressive_tier() {
        let (dist, goals) = sample();
        let odds = BookmakerOdds {
            away: Some(4.5),
            home: Some(1.9),
            ..Default::default()
        };
        let signal = ValueSignal {
            outcome: Outcome::Away,
            odd: 4.5,
            model_pct: 26,
            edge: 1.17,
        };
        let tiers = derive_bet_tiers(&dist, &goals, &odds, Some(&signal));
        assert_eq!(tiers[2].pick, Market::Outright(Outcome::Away));
        assert_eq!(tiers[2].odd, 4.5);
        assert_eq!(tiers[2].priced, PriceSource::Bookmaker);
    }

    #[test]
    fn double_chance_priced_from_both_legs() {
        let dist = MatchOutcomeDistribution {
            home_win_pct: 60,
            draw_pct: 25,
            away_win_pct: 15,
        };
        let goals = GoalMarketProbabilities {
            over1_5_pct: 70,
            over2_5_pct: 45,
            both_teams_score_pct: 40,
        };
        let odds = BookmakerOdds {
            home: Some(2.0),
            draw: Some(2.0),
            ..Default::default()
        };
        let tiers = derive_bet_tiers(&dist, &goals, &odds, None);
        assert_eq!(tiers[0].pick, Market::HomeOrDraw);
        assert_eq!(tiers[0].odd, 1.0);
        assert_eq!(tiers[1].pick, Market::Over2_5);
    }

    #[test]
    fn fair_odd_never_divides_by_zero() {
        assert_eq!(fair_odd(0), 100.0);
        assert_eq!(fair_odd(50), 2.0);
    }
}
