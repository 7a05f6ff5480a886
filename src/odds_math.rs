//! Odds conversions and parlay arithmetic.
//!
//! Every function is pure. Conversions that can fail return `None` so the
//! caller can render "-" for unavailable odds instead of propagating an error.

/// Correlation haircut applied per extra leg of a same-game parlay
pub const SGP_CORRELATION_FACTOR: f64 = 0.72;

/// Convert American odds to decimal odds
/// Positive odds (+150) pay $150 on a $100 stake, negative odds (-150)
/// need a $150 stake to win $100
pub fn american_to_decimal(american: i32) -> f64 {
    if american >= 0 {
        1.0 + american as f64 / 100.0
    } else {
        1.0 + 100.0 / (american as f64).abs()
    }
}

/// Convert American odds to implied probability (vig included)
pub fn american_to_probability(american: i32) -> f64 {
    if american >= 0 {
        100.0 / (american as f64 + 100.0)
    } else {
        let abs_odds = (american as f64).abs();
        abs_odds / (abs_odds + 100.0)
    }
}

/// Convert decimal odds back to American odds.
/// Returns `None` for non-finite input or prices that cannot win (`<= 1.0`).
pub fn decimal_to_american(decimal: f64) -> Option<i32> {
    if !decimal.is_finite() || decimal <= 1.0 {
        return None;
    }

    let american = if decimal >= 2.0 {
        ((decimal - 1.0) * 100.0).round()
    } else {
        (-100.0 / (decimal - 1.0)).round()
    };

    if american.is_finite() && american.abs() <= i32::MAX as f64 {
        Some(american as i32)
    } else {
        None
    }
}

/// Convert a win probability to fair American odds
pub fn probability_to_american(probability: f64) -> Option<i32> {
    if !probability.is_finite() || probability <= 0.0 || probability >= 1.0 {
        return None;
    }
    decimal_to_american(1.0 / probability)
}

/// Format American odds for display ("+120", "-110")
pub fn format_odds(american: i32) -> String {
    if american >= 0 {
        format!("+{}", american)
    } else {
        american.to_string()
    }
}

/// Format optional odds, rendering "-" when unavailable
pub fn format_optional_odds(american: Option<i32>) -> String {
    american.map(format_odds).unwrap_or_else(|| "-".to_string())
}

/// Multiply already-decimal legs. `None` for an empty slip or any
/// non-finite leg.
pub fn calculate_parlay_decimal(legs: &[f64]) -> Option<f64> {
    if legs.is_empty() {
        return None;
    }

    let total = legs.iter().try_fold(1.0_f64, |acc, leg| {
        if leg.is_finite() {
            Some(acc * leg)
        } else {
            None
        }
    })?;

    total.is_finite().then_some(total)
}

/// Combine American-odds legs into a single parlay price
pub fn calculate_parlay_odds(legs: &[i32]) -> Option<i32> {
    let decimals: Vec<f64> = legs.iter().copied().map(american_to_decimal).collect();
    decimal_to_american(calculate_parlay_decimal(&decimals)?)
}

/// Same-game parlay price with a per-leg correlation haircut
pub fn calculate_sgp_odds(legs: &[i32]) -> Option<i32> {
    let decimals: Vec<f64> = legs.iter().copied().map(american_to_decimal).collect();
    let base = calculate_parlay_decimal(&decimals)?;
    let multiplier = SGP_CORRELATION_FACTOR.powi(legs.len() as i32 - 1);
    decimal_to_american(base * multiplier)
}

/// Total return (stake + winnings) for a wager; 0 when odds are missing
pub fn calculate_payout(american: Option<i32>, wager: f64) -> f64 {
    match american {
        None => 0.0,
        Some(odds) if odds > 0 => wager + wager * odds as f64 / 100.0,
        Some(odds) => wager + wager * 100.0 / (odds as f64).abs(),
    }
}

/// Remove the bookmaker margin from a two-way market.
/// Returns the fair (over, under) probabilities.
pub fn no_vig_probabilities(over: i32, under: i32) -> Option<(f64, f64)> {
    let p_over = american_to_probability(over);
    let p_under = american_to_probability(under);
    let total = p_over + p_under;
    if !total.is_finite() || total <= 0.0 {
        return None;
    }
    Some((p_over / total, p_under / total))
}

/// Expected value per unit staked for a bet at `american` odds that wins
/// with `probability`
pub fn expected_value(probability: f64, american: i32) -> f64 {
    let win_amount = american_to_decimal(american) - 1.0;
    probability * win_amount - (1.0 - probability)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_ODDS: [i32; 12] = [
        -1000, -450, -250, -150, -115, -110, -105, 100, 105, 120, 350, 1200,
    ];

    #[test]
    fn test_american_to_decimal() {
        assert!((american_to_decimal(150) - 2.5).abs() < 1e-9);
        assert!((american_to_decimal(-200) - 1.5).abs() < 1e-9);
        assert!((american_to_decimal(100) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_american_to_probability() {
        assert!((american_to_probability(-150) - 0.6).abs() < 1e-9);
        assert!((american_to_probability(150) - 0.4).abs() < 1e-9);
        assert!((american_to_probability(100) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_decimal_to_american_edges() {
        assert_eq!(decimal_to_american(2.5), Some(150));
        assert_eq!(decimal_to_american(1.5), Some(-200));
        assert_eq!(decimal_to_american(1.0), None);
        assert_eq!(decimal_to_american(0.5), None);
        assert_eq!(decimal_to_american(f64::NAN), None);
        assert_eq!(decimal_to_american(f64::INFINITY), None);
    }

    #[test]
    fn test_round_trip_preserves_probability() {
        for odds in SAMPLE_ODDS {
            let back = decimal_to_american(american_to_decimal(odds)).unwrap();
            let diff = (american_to_probability(back) - american_to_probability(odds)).abs();
            assert!(diff < 1e-3, "odds {} came back as {}", odds, back);
        }
    }

    #[test]
    fn test_single_leg_parlay_is_identity() {
        for odds in SAMPLE_ODDS {
            assert_eq!(calculate_parlay_odds(&[odds]), Some(odds));
        }
    }

    #[test]
    fn test_parlay_is_order_independent() {
        let a = calculate_parlay_odds(&[-110, 150, -200]);
        let b = calculate_parlay_odds(&[150, -200, -110]);
        let c = calculate_parlay_odds(&[-200, -110, 150]);
        assert_eq!(a, b);
        assert_eq!(b, c);
        // -110 x -110 is the classic +264
        assert_eq!(calculate_parlay_odds(&[-110, -110]), Some(264));
    }

    #[test]
    fn test_parlay_rejects_bad_input() {
        assert_eq!(calculate_parlay_odds(&[]), None);
        assert_eq!(calculate_parlay_decimal(&[2.0, f64::NAN]), None);
        assert_eq!(calculate_parlay_decimal(&[2.0, f64::INFINITY]), None);
    }

    #[test]
    fn test_sgp_applies_correlation_haircut() {
        let parlay = calculate_parlay_odds(&[150, 150]).unwrap();
        let sgp = calculate_sgp_odds(&[150, 150]).unwrap();
        assert!(sgp < parlay);
        // one leg has no haircut
        assert_eq!(calculate_sgp_odds(&[150]), Some(150));
    }

    #[test]
    fn test_format_odds() {
        assert_eq!(format_odds(120), "+120");
        assert_eq!(format_odds(0), "+0");
        assert_eq!(format_odds(-110), "-110");
        assert_eq!(format_optional_odds(None), "-");
    }

    #[test]
    fn test_payout() {
        assert!((calculate_payout(Some(150), 100.0) - 250.0).abs() < 1e-9);
        assert!((calculate_payout(Some(-200), 100.0) - 150.0).abs() < 1e-9);
        assert_eq!(calculate_payout(None, 100.0), 0.0);
    }

    #[test]
    fn test_no_vig_and_ev() {
        let (over, under) = no_vig_probabilities(-110, -110).unwrap();
        assert!((over - 0.5).abs() < 1e-9);
        assert!((under - 0.5).abs() < 1e-9);

        assert!(expected_value(0.6, 150) > 0.0);
        assert!(expected_value(0.4, -150) < 0.0);
        assert_eq!(probability_to_american(0.5), Some(100));
        assert_eq!(probability_to_american(1.0), None);
    }
}
