use crate::error::{PropError, PropResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Convert American odds to decimal odds
/// Positive odds (+150) mean you win $150 on a $100 bet
/// Negative odds (-150) mean you need to bet $150 to win $100
pub fn american_to_decimal(odds: i32) -> f64 {
    if odds > 0 {
        1.0 + odds as f64 / 100.0
    } else {
        1.0 + 100.0 / odds.abs() as f64
    }
}

/// Convert fractional odds (3/2) to decimal odds
pub fn fractional_to_decimal(numerator: f64, denominator: f64) -> f64 {
    1.0 + numerator / denominator
}

/// Parse an odds quote as written on a bookmaker sheet into decimal odds.
/// Accepts decimal ("1.85", "1,85"), American ("+150", "-110") and fractional ("3/2") quotes.
pub fn parse_odds_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '/' | '+' | '-'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    if let Some((num, den)) = cleaned.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        return Some(fractional_to_decimal(num, den));
    }

    if cleaned.starts_with('+') || cleaned.starts_with('-') {
        let american: i32 = cleaned.parse().ok()?;
        if american.abs() < 100 {
            return None;
        }
        return Some(american_to_decimal(american));
    }

    cleaned.parse().ok()
}

/// Whether a bet is worth placing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Bet,
    Pass,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Recommendation::Bet => "BET",
            Recommendation::Pass => "DO NOT BET",
        })
    }
}

/// Value of a bet at decimal odds given an estimated true probability
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvResult {
    pub probability: f64,
    pub decimal_odds: f64,
    /// Break-even probability of the quote, `1 / odds`
    pub implied_probability: f64,
    /// Net win per unit staked, `odds - 1`
    pub potential_gain: f64,
    /// Average return per unit staked
    pub expected_value: f64,
    /// Relative gap between estimated and implied probability, in percent
    pub edge_percent: f64,
    /// Full Kelly stake as a fraction of bankroll, never negative
    pub kelly_fraction: f64,
    pub recommendation: Recommendation,
}

/// Money figures of an [`EvResult`] for a concrete stake
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StakeOutcome {
    pub stake: f64,
    /// Net win if the bet lands
    pub potential_gain: f64,
    pub expected_value: f64,
}

impl EvResult {
    pub fn for_stake(&self, stake: f64) -> PropResult<StakeOutcome> {
        if !stake.is_finite() || stake <= 0.0 {
            return Err(PropError::InvalidInput(format!(
                "stake {} must be a positive amount",
                stake
            )));
        }
        Ok(StakeOutcome {
            stake,
            potential_gain: self.potential_gain * stake,
            expected_value: self.expected_value * stake,
        })
    }
}

/// Calculate expected value for a bet
/// EV = (probability of winning * amount won per unit) - (probability of losing * 1 unit)
pub fn evaluate(probability: f64, decimal_odds: f64) -> PropResult<EvResult> {
    if !decimal_odds.is_finite() || decimal_odds <= 1.0 {
        return Err(PropError::InvalidOdds(decimal_odds));
    }
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(PropError::InvalidInput(format!(
            "probability {} is outside [0, 1]",
            probability
        )));
    }

    let implied_probability = 1.0 / decimal_odds;
    let potential_gain = decimal_odds - 1.0;
    let expected_value = probability * potential_gain - (1.0 - probability);
    let edge_percent = (probability - implied_probability) / implied_probability * 100.0;
    let kelly_fraction = ((probability * decimal_odds - 1.0) / potential_gain).max(0.0);

    Ok(EvResult {
        probability,
        decimal_odds,
        implied_probability,
        potential_gain,
        expected_value,
        edge_percent,
        kelly_fraction,
        recommendation: if expected_value > 0.0 {
            Recommendation::Bet
        } else {
            Recommendation::Pass
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_american_to_decimal() {
        assert!((american_to_decimal(150) - 2.5).abs() < 1e-12);
        assert!((american_to_decimal(-150) - 1.6667).abs() < 0.001);
        assert!((american_to_decimal(100) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_odds_text() {
        assert_eq!(parse_odds_text("1.85"), Some(1.85));
        assert_eq!(parse_odds_text(" 1,95 "), Some(1.95));
        assert_eq!(parse_odds_text("+150"), Some(2.5));
        assert!((parse_odds_text("-110").unwrap() - 1.909).abs() < 0.001);
        assert_eq!(parse_odds_text("3/2"), Some(2.5));
        assert_eq!(parse_odds_text("n/a"), None);
        assert_eq!(parse_odds_text(""), None);
        assert_eq!(parse_odds_text("5/0"), None);
    }

    #[test]
    fn test_even_money_value_bet() {
        let ev = evaluate(0.6, 2.0).unwrap();
        assert!((ev.implied_probability - 0.5).abs() < 1e-12);
        assert!((ev.expected_value - 0.2).abs() < 1e-12);
        assert!((ev.edge_percent - 20.0).abs() < 1e-9);
        assert!((ev.kelly_fraction - 0.2).abs() < 1e-12);
        assert_eq!(ev.recommendation, Recommendation::Bet);
    }

    #[test]
    fn test_invalid_odds() {
        assert_eq!(evaluate(0.6, 1.0).unwrap_err(), PropError::InvalidOdds(1.0));
        assert!(matches!(evaluate(0.6, 0.5), Err(PropError::InvalidOdds(_))));
        assert!(matches!(evaluate(0.6, f64::NAN), Err(PropError::InvalidOdds(_))));
        assert!(matches!(evaluate(1.2, 2.0), Err(PropError::InvalidInput(_))));
    }

    #[test]
    fn test_stake_scales_gain_and_ev() {
        let ev = evaluate(0.6, 2.0).unwrap();
        let outcome = ev.for_stake(100.0).unwrap();
        assert!((outcome.potential_gain - 100.0).abs() < 1e-9);
        assert!((outcome.expected_value - 20.0).abs() < 1e-9);

        assert!(matches!(ev.for_stake(0.0), Err(PropError::InvalidInput(_))));
        assert!(matches!(ev.for_stake(-5.0), Err(PropError::InvalidInput(_))));
    }

    #[test]
    fn test_push_is_not_a_bet() {
        let ev = evaluate(0.5, 2.0).unwrap();
        assert_eq!(ev.expected_value, 0.0);
        assert_eq!(ev.recommendation, Recommendation::Pass);
        assert_eq!(ev.kelly_fraction, 0.0);
    }

    #[test]
    fn test_negative_kelly_is_clamped() {
        let ev = evaluate(0.3, 1.8).unwrap();
        assert!(ev.expected_value < 0.0);
        assert_eq!(ev.kelly_fraction, 0.0);
        assert_eq!(ev.recommendation, Recommendation::Pass);
    }

    #[test]
    fn test_positive_ev_matches_positive_edge() {
        for odds in [1.37, 1.9, 2.25, 3.1, 6.5] {
            for step in 0..19 {
                let probability = 0.013 + step as f64 * 0.05;
                let ev = evaluate(probability, odds).unwrap();
                assert_eq!(
                    ev.expected_value > 0.0,
                    probability > 1.0 / odds,
                    "p={} odds={}",
                    probability,
                    odds
                );
                assert_eq!(ev.expected_value > 0.0, ev.edge_percent > 0.0);
            }
        }
    }
}
