//! Mapping a requested line onto the lines a sportsbook actually offers.
//!
//! Exact match first. Strikeout markets are quoted as "N+" on betslips but
//! as "Over N-0.5" upstream, so they get one retry at the shifted line. After
//! that the nearest line within tolerance wins.

use crate::config::LineTolerance;
use crate::types::{parse_line, CanonicalLineMap, LineBucket, Outcome, Side};
use std::cmp::Ordering;

const LINE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketKind {
    Strikeout,
    Standard,
}

impl MarketKind {
    /// Classify by Odds API market key (`pitcher_strikeouts`, ...)
    pub fn from_market_key(market_key: &str) -> Self {
        if market_key.to_lowercase().contains("strikeout") {
            MarketKind::Strikeout
        } else {
            MarketKind::Standard
        }
    }

    pub fn tolerance(self, tolerance: &LineTolerance) -> f64 {
        match self {
            MarketKind::Strikeout => tolerance.strikeout,
            MarketKind::Standard => tolerance.default,
        }
    }
}

fn same_line(a: f64, b: f64) -> bool {
    (a - b).abs() < LINE_EPSILON
}

/// The "N+" / "Over N-0.5" counterpart of a strikeout line
pub fn alternate_line(requested: f64, kind: MarketKind) -> Option<f64> {
    if kind != MarketKind::Strikeout {
        return None;
    }
    let fraction = (requested - requested.trunc()).abs();
    if fraction < LINE_EPSILON {
        Some(requested - 0.5)
    } else if same_line(fraction, 0.5) {
        Some(requested + 0.5)
    } else {
        None
    }
}

/// Pick which of `available` (in upstream order) stands in for `requested`
pub fn resolve_line(
    available: impl IntoIterator<Item = f64>,
    requested: f64,
    kind: MarketKind,
    tolerance: &LineTolerance,
) -> Option<f64> {
    let lines: Vec<f64> = available.into_iter().filter(|l| l.is_finite()).collect();
    if lines.is_empty() || !requested.is_finite() {
        return None;
    }

    if let Some(exact) = lines.iter().copied().find(|l| same_line(*l, requested)) {
        return Some(exact);
    }

    if let Some(alt) = alternate_line(requested, kind) {
        if let Some(found) = lines.iter().copied().find(|l| same_line(*l, alt)) {
            return Some(found);
        }
    }

    let max_distance = kind.tolerance(tolerance) + LINE_EPSILON;
    let mut nearby: Vec<f64> = lines
        .into_iter()
        .filter(|l| (l - requested).abs() <= max_distance)
        .collect();
    // stable, so equal distances keep upstream order
    nearby.sort_by(|a, b| {
        (a - requested)
            .abs()
            .partial_cmp(&(b - requested).abs())
            .unwrap_or(Ordering::Equal)
    });
    nearby.first().copied()
}

/// Choose the outcome for `side` closest to `requested`.
/// Outcomes without a point cannot be placed on a line and are ignored.
pub fn resolve_outcome<'a>(
    outcomes: &[&'a Outcome],
    requested: f64,
    side: Side,
    kind: MarketKind,
    tolerance: &LineTolerance,
) -> Option<&'a Outcome> {
    let on_side: Vec<&'a Outcome> = outcomes
        .iter()
        .copied()
        .filter(|o| o.side() == Some(side) && o.point.is_some())
        .collect();

    let line = resolve_line(on_side.iter().filter_map(|o| o.point), requested, kind, tolerance)?;
    on_side
        .into_iter()
        .find(|o| o.point.map_or(false, |p| same_line(p, line)))
}

/// Choose the line bucket standing in for `requested`, considering only
/// buckets where at least one book prices `side`
pub fn resolve_bucket<'m>(
    map: &'m CanonicalLineMap,
    requested: f64,
    side: Side,
    kind: MarketKind,
    tolerance: &LineTolerance,
) -> Option<(f64, &'m LineBucket)> {
    let priced = |bucket: &LineBucket| bucket.values().any(|e| e.side(side).is_some());

    let candidates = map
        .iter()
        .filter(|(_, bucket)| priced(*bucket))
        .filter_map(|(key, _)| parse_line(key));

    let line = resolve_line(candidates, requested, kind, tolerance)?;
    map.bucket(line).map(|bucket| (line, bucket))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tol() -> LineTolerance {
        LineTolerance::default()
    }

    fn outcome(name: &str, point: Option<f64>, price: i32) -> Outcome {
        Outcome {
            name: name.to_string(),
            price,
            point,
            description: Some("Gerrit Cole".to_string()),
            sid: None,
            link: None,
        }
    }

    #[test]
    fn test_market_kind() {
        assert_eq!(MarketKind::from_market_key("pitcher_strikeouts"), MarketKind::Strikeout);
        assert_eq!(
            MarketKind::from_market_key("pitcher_strikeouts_alternate"),
            MarketKind::Strikeout
        );
        assert_eq!(MarketKind::from_market_key("batter_hits"), MarketKind::Standard);
    }

    #[test]
    fn test_exact_line_wins() {
        let line = resolve_line([5.5, 6.0, 6.5], 6.0, MarketKind::Strikeout, &tol());
        assert_eq!(line, Some(6.0));
    }

    #[test]
    fn test_strikeout_plus_convention() {
        // "6+" strikeouts is quoted upstream as Over 5.5
        assert_eq!(resolve_line([5.5], 6.0, MarketKind::Strikeout, &tol()), Some(5.5));
        assert_eq!(resolve_line([6.0], 5.5, MarketKind::Strikeout, &tol()), Some(6.0));
        // alternate beats a closer-looking nearest line
        assert_eq!(
            resolve_line([6.5, 5.5], 6.0, MarketKind::Strikeout, &tol()),
            Some(5.5)
        );
    }

    #[test]
    fn test_nearest_within_tolerance() {
        assert_eq!(resolve_line([1.5, 0.5], 1.0, MarketKind::Standard, &tol()), Some(1.5));
        assert_eq!(resolve_line([2.5], 1.5, MarketKind::Standard, &tol()), None);
        assert_eq!(resolve_line([7.0], 6.0, MarketKind::Strikeout, &tol()), Some(7.0));
        assert_eq!(resolve_line([7.5], 6.0, MarketKind::Strikeout, &tol()), None);
        assert_eq!(resolve_line(Vec::new(), 6.0, MarketKind::Standard, &tol()), None);
    }

    #[test]
    fn test_resolve_outcome_filters_side() {
        let over = outcome("Over", Some(5.5), -120);
        let under = outcome("Under", Some(5.5), 100);
        let pointless = outcome("Over", None, 300);
        let outcomes = vec![&pointless, &under, &over];

        let found = resolve_outcome(&outcomes, 6.0, Side::Over, MarketKind::Strikeout, &tol());
        assert_eq!(found.map(|o| o.price), Some(-120));

        let found = resolve_outcome(&outcomes, 6.0, Side::Under, MarketKind::Strikeout, &tol());
        assert_eq!(found.map(|o| o.price), Some(100));
    }

    #[test]
    fn test_resolve_bucket_skips_unpriced_side() {
        let mut map = CanonicalLineMap::new();
        map.insert_side(5.5, "dk", Side::Under, outcome("Under", Some(5.5), -110), None);
        map.insert_side(6.5, "fd", Side::Over, outcome("Over", Some(6.5), 140), None);

        let (line, bucket) =
            resolve_bucket(&map, 6.0, Side::Over, MarketKind::Strikeout, &tol()).unwrap();
        assert_eq!(line, 6.5);
        assert!(bucket.contains_key("fd"));

        let (line, _) =
            resolve_bucket(&map, 6.0, Side::Under, MarketKind::Strikeout, &tol()).unwrap();
        assert_eq!(line, 5.5);
    }
}
