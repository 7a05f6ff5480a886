//! Find one player's price at every bookmaker in an Odds API event.
//!
//! Shared by the betslip lookup and refresh flows: gather the outcomes for
//! the requested side across standard and alternate market keys, pick the
//! outcomes that name the player, then place the requested line.

use crate::config::EngineConfig;
use crate::line_resolver::{resolve_outcome, MarketKind};
use crate::name_matcher::{find_player_outcomes, near_misses};
use crate::odds_api::OddsApiEvent;
use crate::selector::is_better_price;
use crate::types::{BestOdds, CanonicalLineMap, Outcome, Side};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

/// Display market, Odds API key, whether an `_alternate` market exists
const MARKETS: [(&str, &str, bool); 7] = [
    ("Home Runs", "batter_home_runs", true),
    ("Hits", "batter_hits", true),
    ("RBIs", "batter_rbis", true),
    ("Strikeouts", "pitcher_strikeouts", true),
    ("Total Bases", "batter_total_bases", true),
    ("Runs", "batter_runs", false),
    ("Stolen Bases", "batter_stolen_bases", false),
];

/// Descriptions scoring above this are logged when a player is not found
const NEAR_MISS_FLOOR: f64 = 0.3;

/// Odds API market keys for a display market or API key, standard first.
/// Unknown markets pass through unchanged.
pub fn market_keys_for(market: &str) -> Vec<String> {
    let wanted = market.trim();
    let known = MARKETS
        .iter()
        .find(|(display, key, _)| display.eq_ignore_ascii_case(wanted) || *key == wanted);

    match known {
        Some((_, key, true)) => vec![key.to_string(), format!("{}_alternate", key)],
        Some((_, key, false)) => vec![key.to_string()],
        None => vec![wanted.to_string()],
    }
}

/// What to look for in an event
#[derive(Debug, Clone)]
pub struct SelectionQuery<'a> {
    pub player: &'a str,
    pub market_keys: &'a [String],
    /// No line means any line the player is listed at
    pub line: Option<f64>,
    pub side: Side,
}

/// One book's price for the selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookPrice {
    pub price: i32,
    pub point: Option<f64>,
    pub link: Option<String>,
    pub sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_link: Option<String>,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OddsMetadata {
    pub matches_found: usize,
    pub total_bookmakers: usize,
    pub best_odds: Option<i32>,
    pub best_book: Option<String>,
    pub player_searched: String,
    pub line_searched: Option<f64>,
    pub bet_type_searched: Side,
    pub market_searched: String,
    pub last_updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerOdds {
    pub bookmakers: IndexMap<String, BookPrice>,
    pub metadata: OddsMetadata,
}

impl PlayerOdds {
    pub fn is_empty(&self) -> bool {
        self.bookmakers.is_empty()
    }

    pub fn price_at(&self, book: &str) -> Option<i32> {
        self.bookmakers.get(book).map(|p| p.price)
    }

    /// Best price across books, recomputed from the per-book prices.
    /// Prices without a point cannot be placed on a line and are skipped.
    pub fn best(&self) -> Option<BestOdds> {
        let mut best: Option<BestOdds> = None;
        for (book, price) in &self.bookmakers {
            let Some(line) = price.point else { continue };
            if is_better_price(price.price, best.as_ref().map(|b| b.price)) {
                best = Some(BestOdds {
                    book: book.clone(),
                    price: price.price,
                    line,
                    link: price.link.clone(),
                    sid: price.sid.clone(),
                });
            }
        }
        best
    }

    /// The matched prices as a canonical line map, each book at the line
    /// it was resolved to
    pub fn line_map(&self, side: Side) -> CanonicalLineMap {
        let mut map = CanonicalLineMap::new();
        for (book, price) in &self.bookmakers {
            let Some(line) = price.point else { continue };
            let outcome = Outcome {
                name: side.outcome_name().to_string(),
                price: price.price,
                point: Some(line),
                description: Some(self.metadata.player_searched.clone()),
                sid: price.sid.clone(),
                link: price.link.clone(),
            };
            map.insert_side(line, book, side, outcome, price.last_update);
        }
        map
    }
}

/// Match the selection at every bookmaker in `event`.
///
/// Books without the player (or without a line within tolerance) are left
/// out. When nothing matches, the metadata carries an `error` and the
/// closest descriptions are logged.
pub fn extract_player_odds(
    event: &OddsApiEvent,
    query: &SelectionQuery<'_>,
    config: &EngineConfig,
) -> PlayerOdds {
    let kind = query
        .market_keys
        .first()
        .map(|k| MarketKind::from_market_key(k))
        .unwrap_or(MarketKind::Standard);

    let mut bookmakers = IndexMap::new();
    let mut best: Option<(String, i32)> = None;

    for bookmaker in &event.bookmakers {
        let outcomes = bookmaker.outcomes_for(query.market_keys);
        if outcomes.is_empty() {
            debug!("No {} markets at {}", query.market_keys.join(","), bookmaker.key);
            continue;
        }

        let on_side: Vec<&Outcome> = outcomes
            .iter()
            .filter(|o| o.side() == Some(query.side))
            .collect();
        let matches = find_player_outcomes(query.player, on_side, &config.matching);
        let candidates: Vec<&Outcome> = matches.iter().map(|m| m.outcome).collect();

        let chosen = match query.line {
            Some(line) => resolve_outcome(&candidates, line, query.side, kind, &config.tolerance),
            None => candidates.first().copied(),
        };

        let Some(outcome) = chosen else {
            debug!(
                "No match for {} {} {:?} at {}",
                query.player, query.side, query.line, bookmaker.key
            );
            continue;
        };

        if is_better_price(outcome.price, best.as_ref().map(|(_, p)| *p)) {
            best = Some((bookmaker.key.clone(), outcome.price));
        }

        bookmakers.insert(
            bookmaker.key.clone(),
            BookPrice {
                price: outcome.price,
                point: outcome.point,
                link: outcome.link.clone(),
                sid: outcome.sid.clone(),
                event_sid: bookmaker.sid.clone(),
                event_link: bookmaker.link.clone(),
                last_update: bookmaker.last_update,
            },
        );
    }

    let error = if event.bookmakers.is_empty() {
        Some("No bookmakers available".to_string())
    } else if bookmakers.is_empty() {
        log_near_misses(event, query, config);
        Some("Player/line combination not found in any sportsbook".to_string())
    } else {
        info!(
            "Found {} at {} sportsbooks: {}",
            query.player,
            bookmakers.len(),
            bookmakers.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        None
    };

    let (best_book, best_odds) = best.map_or((None, None), |(book, price)| (Some(book), Some(price)));

    PlayerOdds {
        metadata: OddsMetadata {
            matches_found: bookmakers.len(),
            total_bookmakers: event.bookmakers.len(),
            best_odds,
            best_book,
            player_searched: query.player.to_string(),
            line_searched: query.line,
            bet_type_searched: query.side,
            market_searched: query.market_keys.join(","),
            last_updated: Utc::now(),
            error,
        },
        bookmakers,
    }
}

fn log_near_misses(event: &OddsApiEvent, query: &SelectionQuery<'_>, config: &EngineConfig) {
    let all: Vec<Outcome> = event
        .bookmakers
        .iter()
        .flat_map(|b| b.outcomes_for(query.market_keys))
        .collect();
    let misses = near_misses(query.player, &all, &config.matching, NEAR_MISS_FLOOR);
    info!(
        "No odds found for {} ({}); closest descriptions: {:?}",
        query.player,
        query.market_keys.join(","),
        misses
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds_api::{ApiMarket, ApiOutcome, Bookmaker};

    fn api_outcome(name: &str, player: &str, point: f64, price: i32) -> ApiOutcome {
        ApiOutcome {
            name: name.to_string(),
            price: Some(price),
            point: Some(point),
            description: Some(player.to_string()),
            sid: Some(format!("{}-{}-{}", player, name, point)),
            link: None,
        }
    }

    fn book(key: &str, market: &str, outcomes: Vec<ApiOutcome>) -> Bookmaker {
        Bookmaker {
            key: key.to_string(),
            title: key.to_string(),
            markets: vec![ApiMarket {
                key: market.to_string(),
                outcomes,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn event(bookmakers: Vec<Bookmaker>) -> OddsApiEvent {
        OddsApiEvent {
            id: "evt".to_string(),
            bookmakers,
            ..Default::default()
        }
    }

    #[test]
    fn test_market_keys_for() {
        assert_eq!(
            market_keys_for("Strikeouts"),
            vec!["pitcher_strikeouts", "pitcher_strikeouts_alternate"]
        );
        assert_eq!(market_keys_for("runs"), vec!["batter_runs"]);
        assert_eq!(
            market_keys_for("batter_hits"),
            vec!["batter_hits", "batter_hits_alternate"]
        );
        assert_eq!(market_keys_for("player_points"), vec!["player_points"]);
    }

    #[test]
    fn test_extracts_price_per_book_with_best() {
        let keys = market_keys_for("Home Runs");
        let evt = event(vec![
            book(
                "draftkings",
                "batter_home_runs",
                vec![
                    api_outcome("Over", "Aaron Judge", 0.5, 180),
                    api_outcome("Under", "Aaron Judge", 0.5, -250),
                ],
            ),
            book(
                "fanduel",
                "batter_home_runs",
                vec![api_outcome("Over", "Aaron Judge", 0.5, 195)],
            ),
        ]);
        let query = SelectionQuery {
            player: "Aaron Judge",
            market_keys: &keys,
            line: Some(0.5),
            side: Side::Over,
        };

        let odds = extract_player_odds(&evt, &query, &EngineConfig::default());
        assert_eq!(odds.metadata.matches_found, 2);
        assert_eq!(odds.metadata.best_book.as_deref(), Some("fanduel"));
        assert_eq!(odds.metadata.best_odds, Some(195));
        assert_eq!(odds.price_at("draftkings"), Some(180));
        assert!(odds.metadata.error.is_none());
        assert_eq!(odds.best().map(|b| b.book), Some("fanduel".to_string()));
    }

    #[test]
    fn test_best_skips_prices_without_point() {
        let keys = market_keys_for("Home Runs");
        let evt = event(vec![
            book(
                "draftkings",
                "batter_home_runs",
                vec![api_outcome("Over", "Aaron Judge", 0.5, 180)],
            ),
            book(
                "fanduel",
                "batter_home_runs",
                vec![api_outcome("Over", "Aaron Judge", 0.5, 195)],
            ),
        ]);
        let query = SelectionQuery {
            player: "Aaron Judge",
            market_keys: &keys,
            line: Some(0.5),
            side: Side::Over,
        };

        let mut odds = extract_player_odds(&evt, &query, &EngineConfig::default());
        if let Some(fanduel) = odds.bookmakers.get_mut("fanduel") {
            fanduel.point = None;
        }

        let best = odds.best().unwrap();
        assert_eq!(best.book, "draftkings");
        assert_eq!(best.price, 180);
        assert_eq!(best.line, 0.5);

        for price in odds.bookmakers.values_mut() {
            price.point = None;
        }
        assert!(odds.best().is_none());
    }

    #[test]
    fn test_under_side_survives_name_selection() {
        let keys = market_keys_for("Hits");
        let evt = event(vec![book(
            "betmgm",
            "batter_hits",
            vec![
                api_outcome("Over", "Jose Altuve", 1.5, 150),
                api_outcome("Under", "Jose Altuve", 1.5, -190),
            ],
        )]);
        let query = SelectionQuery {
            player: "Jose Altuve",
            market_keys: &keys,
            line: Some(1.5),
            side: Side::Under,
        };
        let odds = extract_player_odds(&evt, &query, &EngineConfig::default());
        assert_eq!(odds.price_at("betmgm"), Some(-190));
    }

    #[test]
    fn test_alternate_market_and_strikeout_line() {
        let keys = market_keys_for("Strikeouts");
        let mut bm = book(
            "draftkings",
            "pitcher_strikeouts",
            vec![api_outcome("Over", "Gerrit Cole", 6.5, 120)],
        );
        bm.markets.push(ApiMarket {
            key: "pitcher_strikeouts_alternate".to_string(),
            outcomes: vec![api_outcome("Over", "Gerrit Cole", 5.5, -160)],
            ..Default::default()
        });
        let query = SelectionQuery {
            player: "Gerrit Cole",
            market_keys: &keys,
            line: Some(6.0),
            side: Side::Over,
        };

        let odds = extract_player_odds(&event(vec![bm]), &query, &EngineConfig::default());
        let price = &odds.bookmakers["draftkings"];
        assert_eq!(price.price, -160);
        assert_eq!(price.point, Some(5.5));
    }

    #[test]
    fn test_no_match_sets_error() {
        let keys = market_keys_for("Home Runs");
        let evt = event(vec![book(
            "draftkings",
            "batter_home_runs",
            vec![api_outcome("Over", "Kyle Stowers", 0.5, 300)],
        )]);
        let query = SelectionQuery {
            player: "Kyle Schwarber",
            market_keys: &keys,
            line: Some(0.5),
            side: Side::Over,
        };
        let odds = extract_player_odds(&evt, &query, &EngineConfig::default());
        assert!(odds.is_empty());
        assert_eq!(odds.metadata.total_bookmakers, 1);
        assert_eq!(
            odds.metadata.error.as_deref(),
            Some("Player/line combination not found in any sportsbook")
        );

        let empty = extract_player_odds(&event(vec![]), &query, &EngineConfig::default());
        assert_eq!(empty.metadata.error.as_deref(), Some("No bookmakers available"));
    }

    #[test]
    fn test_line_map_groups_by_resolved_line() {
        let keys = market_keys_for("Home Runs");
        let evt = event(vec![
            book("a", "batter_home_runs", vec![api_outcome("Over", "Aaron Judge", 0.5, -150)]),
            book("b", "batter_home_runs", vec![api_outcome("Over", "Aaron Judge", 0.5, 110)]),
        ]);
        let query = SelectionQuery {
            player: "Aaron Judge",
            market_keys: &keys,
            line: Some(0.5),
            side: Side::Over,
        };
        let map = extract_player_odds(&evt, &query, &EngineConfig::default()).line_map(Side::Over);
        let bucket = map.bucket(0.5).unwrap();
        assert_eq!(bucket.len(), 2);
        assert_eq!(bucket["a"].over.as_ref().map(|o| o.price), Some(-150));
    }
}
