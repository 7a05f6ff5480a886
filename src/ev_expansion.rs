//! Drill-down for a +EV play: every book's price on the play's line and
//! side, plus spread statistics.
//!
//! Odds for a play live behind a pointer key in one of two layouts:
//!
//! - player blob, line-keyed: `{ "21.5": { "betmgm": { "over": {...} } } }`
//! - game blob: `{ "event": {...}, "lines": { "40": { "line": 40, "books": {...} } } }`

use crate::cache::expansion_key;
use crate::normalizer::normalize_value;
use crate::odds_math::{expected_value, no_vig_probabilities, probability_to_american};
use crate::selector::{market_stats, ranked_books, select_best, MarketStats, RankedBook};
use crate::types::{line_key, parse_line, CanonicalLineMap, Side};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const LINE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Deserialize)]
pub struct ExpansionQuery {
    pub sport: String,
    pub event_id: String,
    pub market: String,
    pub market_key: String,
    #[serde(default)]
    pub player_id: Option<String>,
    pub side: Side,
    pub line: f64,
}

impl ExpansionQuery {
    pub fn cache_key(&self) -> String {
        expansion_key(
            &self.sport,
            &self.event_id,
            &self.market,
            self.player_id.as_deref().filter(|p| !p.is_empty()),
            &self.side.to_string(),
            &line_key(self.line),
        )
    }
}

/// A stored +EV play. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EvPlay {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub sport: String,
    #[serde(default)]
    pub scope: String,
    pub event_id: String,
    pub market: String,
    pub side: Side,
    pub line: f64,
    #[serde(default)]
    pub ev_percentage: Option<f64>,
    #[serde(default)]
    pub best_book: Option<String>,
    #[serde(default)]
    pub best_odds: Option<i32>,
    #[serde(default)]
    pub fair_odds: Option<i32>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub market_key: String,
    #[serde(default)]
    pub home: String,
    #[serde(default)]
    pub away: String,
    #[serde(default)]
    pub start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    /// Cache key of the odds blob backing this play
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
}

/// Plays from an `ev:{sport}:{scope}` blob, which is either a bare array
/// or `{ "data": [...] }`. Entries that do not parse are skipped.
pub fn parse_ev_plays(value: &Value) -> Vec<EvPlay> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => obj
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };

    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<EvPlay>(item.clone()) {
            Ok(play) => Some(play),
            Err(e) => {
                debug!("Skipping EV play: {}", e);
                None
            }
        })
        .collect()
}

/// The stored play this query drills into
pub fn find_play<'a>(plays: &'a [EvPlay], query: &ExpansionQuery) -> Option<&'a EvPlay> {
    plays.iter().find(|play| {
        play.event_id == query.event_id
            && play.market == query.market
            && play.player_id == query.player_id
            && (play.line - query.line).abs() < LINE_EPSILON
            && play.side == query.side
    })
}

/// Layout of a pointer blob
#[derive(Debug, Clone, PartialEq)]
pub enum ExpansionBlob {
    /// Line-keyed player blob
    PlayerLines(Value),
    /// Game blob with `lines.{line}.books`
    GameLines { event: Option<Value>, lines: Map<String, Value> },
}

impl ExpansionBlob {
    pub fn detect(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if let Some(lines) = obj.get("lines").and_then(Value::as_object) {
            return Some(ExpansionBlob::GameLines {
                event: obj.get("event").cloned(),
                lines: lines.clone(),
            });
        }
        if !obj.contains_key("event") && obj.keys().any(|k| k.trim().parse::<f64>().is_ok()) {
            return Some(ExpansionBlob::PlayerLines(value.clone()));
        }
        None
    }

    /// Canonical map over every line in the blob
    pub fn line_map(&self) -> CanonicalLineMap {
        match self {
            ExpansionBlob::PlayerLines(value) => {
                // metadata such as `updated_at` can sit beside the line keys
                let by_line: Map<String, Value> = value
                    .as_object()
                    .into_iter()
                    .flatten()
                    .filter(|(key, _)| parse_line(key).is_some())
                    .map(|(key, books)| (key.clone(), books.clone()))
                    .collect();
                normalize_value(&Value::Object(by_line), None, None)
            }
            ExpansionBlob::GameLines { lines, .. } => {
                let mut by_line = Map::new();
                for (key, line) in lines {
                    if let Some(books) = line.get("books") {
                        by_line.insert(key.clone(), books.clone());
                    }
                }
                normalize_value(&Value::Object(by_line), None, None)
            }
        }
    }

    fn event_field(&self, field: &str) -> Option<String> {
        match self {
            ExpansionBlob::GameLines { event: Some(event), .. } => {
                event.get(field).and_then(Value::as_str).map(str::to_string)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpansionData {
    pub play: EvPlay,
    pub all_books: Vec<RankedBook>,
    pub market_stats: Option<MarketStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExpansionData {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Play skeleton for a query with no stored play
fn play_from_query(query: &ExpansionQuery) -> EvPlay {
    let id = match &query.player_id {
        Some(player) => format!("{}:{}:{}:{}", query.event_id, player, line_key(query.line), query.side),
        None => format!("{}:{}:{}:{}", query.event_id, query.market, line_key(query.line), query.side),
    };
    EvPlay {
        id,
        sport: query.sport.clone(),
        scope: String::new(),
        event_id: query.event_id.clone(),
        market: query.market.clone(),
        side: query.side,
        line: query.line,
        ev_percentage: None,
        best_book: None,
        best_odds: None,
        fair_odds: None,
        timestamp: None,
        market_key: query.market_key.clone(),
        home: String::new(),
        away: String::new(),
        start: String::new(),
        player_id: query.player_id.clone(),
        player_name: None,
        team: None,
        position: None,
        pointer: None,
    }
}

/// Build the drill-down for `query`.
///
/// `play` is the stored play when one was found. Best book and odds are
/// always recomputed from the blob; fair odds and EV are derived from the
/// no-vig best prices only when the stored play lacks them. Missing or
/// unrecognized blobs yield an empty expansion with `error` set.
pub fn build_expansion(blob: Option<&Value>, query: &ExpansionQuery, play: Option<EvPlay>) -> ExpansionData {
    let mut play = play.unwrap_or_else(|| play_from_query(query));
    let empty = |play: EvPlay, error: String| {
        warn!("EV expansion {}: {}", query.cache_key(), error);
        ExpansionData {
            play,
            all_books: Vec::new(),
            market_stats: None,
            error: Some(error),
        }
    };

    let Some(blob) = blob else {
        return empty(play, format!("No odds data for {}", query.market_key));
    };
    let Some(layout) = ExpansionBlob::detect(blob) else {
        return empty(play, "Unable to parse odds data structure".to_string());
    };

    let map = layout.line_map();
    let Some(bucket) = map.bucket(query.line) else {
        let available: Vec<&str> = map.line_keys().collect();
        return empty(
            play,
            format!(
                "Line {} not found. Available lines: {}",
                line_key(query.line),
                available.join(", ")
            ),
        );
    };

    let all_books = ranked_books(bucket, query.side);
    if all_books.is_empty() {
        return empty(
            play,
            format!("No odds found for {} on line {}", query.side, line_key(query.line)),
        );
    }

    let best = select_best(bucket, query.side);
    play.best_book = best.as_ref().map(|b| b.book.clone());
    play.best_odds = best.as_ref().map(|b| b.price);

    let over = select_best(bucket, Side::Over).map(|b| b.price);
    let under = select_best(bucket, Side::Under).map(|b| b.price);
    if let (Some(over), Some(under), Some(best_price)) = (over, under, play.best_odds) {
        if let Some((p_over, p_under)) = no_vig_probabilities(over, under) {
            let fair = match query.side {
                Side::Over => p_over,
                Side::Under => p_under,
            };
            if play.fair_odds.is_none() {
                play.fair_odds = probability_to_american(fair);
            }
            if play.ev_percentage.is_none() {
                play.ev_percentage = Some(expected_value(fair, best_price) * 100.0);
            }
        }
    }

    if play.home.is_empty() {
        play.home = layout.event_field("home").unwrap_or_default();
    }
    if play.away.is_empty() {
        play.away = layout.event_field("away").unwrap_or_default();
    }
    if play.start.is_empty() {
        play.start = layout.event_field("start").unwrap_or_default();
    }
    if play.timestamp.is_none() {
        play.timestamp = Some(Utc::now().timestamp_millis());
    }

    ExpansionData {
        market_stats: market_stats(bucket, query.side),
        all_books,
        play,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(player: Option<&str>, side: Side, line: f64) -> ExpansionQuery {
        ExpansionQuery {
            sport: "nfl".to_string(),
            event_id: "e1".to_string(),
            market: "passing_yards".to_string(),
            market_key: "odds:nfl:props:passing_yards:primary:pregame".to_string(),
            player_id: player.map(str::to_string),
            side,
            line,
        }
    }

    fn player_blob() -> Value {
        json!({
            "245.5": {
                "betmgm": {"over": {"price": -115, "link": "https://mgm/1"}, "under": {"price": -105}},
                "draftkings": {"over": {"price": -110}, "under": {"price": -110}},
                "fanduel": {"over": {"price": -120}}
            },
            "250.5": {
                "draftkings": {"over": {"price": 105}}
            }
        })
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(
            query(Some("p9"), Side::Over, 245.5).cache_key(),
            "ev:expansion:nfl:e1:passing_yards:p9:over:245.5"
        );
        assert_eq!(
            query(None, Side::Under, 44.0).cache_key(),
            "ev:expansion:nfl:e1:passing_yards:under:44"
        );
    }

    #[test]
    fn test_detect_layouts() {
        assert!(matches!(
            ExpansionBlob::detect(&player_blob()),
            Some(ExpansionBlob::PlayerLines(_))
        ));
        let game = json!({"event": {"home": "KC"}, "lines": {}});
        assert!(matches!(
            ExpansionBlob::detect(&game),
            Some(ExpansionBlob::GameLines { .. })
        ));
        assert!(ExpansionBlob::detect(&json!({"event": {}})).is_none());
        assert!(ExpansionBlob::detect(&json!([1, 2])).is_none());
    }

    #[test]
    fn test_player_expansion() {
        let blob = player_blob();
        let data = build_expansion(Some(&blob), &query(Some("p9"), Side::Over, 245.5), None);

        assert!(data.is_complete());
        let books: Vec<&str> = data.all_books.iter().map(|b| b.book.as_str()).collect();
        assert_eq!(books, vec!["draftkings", "betmgm", "fanduel"]);
        assert_eq!(data.all_books[1].link.as_deref(), Some("https://mgm/1"));

        let stats = data.market_stats.unwrap();
        assert_eq!(stats.total_books, 3);
        assert_eq!(stats.best_odds, -110);
        assert_eq!(stats.worst_odds, -120);
        assert_eq!(stats.odds_spread, 10);
        assert_eq!(stats.avg_odds, -115);

        assert_eq!(data.play.best_book.as_deref(), Some("draftkings"));
        assert_eq!(data.play.best_odds, Some(-110));
        // best over -110 vs best under -105: fair over just under 50%
        assert!(data.play.fair_odds.is_some());
        assert!(data.play.ev_percentage.unwrap() < 0.0);
    }

    #[test]
    fn test_player_blob_with_metadata_keys() {
        let mut blob = player_blob();
        blob["updated_at"] = json!(1717200000);
        blob["player"] = json!({"name": "Patrick Mahomes"});
        assert!(matches!(
            ExpansionBlob::detect(&blob),
            Some(ExpansionBlob::PlayerLines(_))
        ));

        let data = build_expansion(Some(&blob), &query(Some("p9"), Side::Under, 245.5), None);
        assert!(data.is_complete(), "{:?}", data.error);
        let books: Vec<&str> = data.all_books.iter().map(|b| b.book.as_str()).collect();
        assert_eq!(books, vec!["betmgm", "draftkings"]);

        let lines: Vec<String> = ExpansionBlob::PlayerLines(blob)
            .line_map()
            .line_keys()
            .map(str::to_string)
            .collect();
        assert_eq!(lines, vec!["245.5", "250.5"]);
    }

    #[test]
    fn test_stored_play_fields_pass_through() {
        let blob = player_blob();
        let stored: EvPlay = serde_json::from_value(json!({
            "id": "stored",
            "event_id": "e1",
            "market": "passing_yards",
            "side": "over",
            "line": 245.5,
            "ev_percentage": 4.2,
            "fair_odds": -125,
            "best_book": "stale",
            "best_odds": 999,
            "player_id": "p9",
            "player_name": "Patrick Mahomes"
        }))
        .unwrap();
        let data = build_expansion(Some(&blob), &query(Some("p9"), Side::Over, 245.5), Some(stored));
        assert_eq!(data.play.ev_percentage, Some(4.2));
        assert_eq!(data.play.fair_odds, Some(-125));
        assert_eq!(data.play.best_odds, Some(-110));
        assert_eq!(data.play.player_name.as_deref(), Some("Patrick Mahomes"));
    }

    #[test]
    fn test_game_expansion() {
        let blob = json!({
            "event": {"home": "KC", "away": "BUF", "start": "2024-01-21T23:30:00Z"},
            "lines": {
                "47.5": {"line": 47.5, "books": {
                    "fanduel": {"over": {"price": -108, "line": 47.5}, "under": {"price": -112, "line": 47.5}},
                    "caesars": {"under": {"price": -105, "line": 47.5}}
                }}
            }
        });
        let data = build_expansion(Some(&blob), &query(None, Side::Under, 47.5), None);
        assert!(data.is_complete());
        assert_eq!(data.all_books[0].book, "caesars");
        assert_eq!(data.play.home, "KC");
        assert_eq!(data.play.start, "2024-01-21T23:30:00Z");
    }

    #[test]
    fn test_missing_line_and_missing_blob() {
        let blob = player_blob();
        let data = build_expansion(Some(&blob), &query(Some("p9"), Side::Over, 260.5), None);
        assert!(data.all_books.is_empty());
        let error = data.error.unwrap();
        assert!(error.contains("245.5") && error.contains("250.5"));

        let data = build_expansion(Some(&blob), &query(Some("p9"), Side::Under, 250.5), None);
        assert!(data.error.unwrap().starts_with("No odds found"));

        let data = build_expansion(None, &query(None, Side::Over, 1.5), None);
        assert!(data.market_stats.is_none());
        assert!(data.error.is_some());
    }

    #[test]
    fn test_parse_and_find_play() {
        let blob = json!({"data": [
            {"event_id": "e1", "market": "passing_yards", "side": "over", "line": 245.5,
             "player_id": "p9", "pointer": "props:nfl:e1:p9:passing_yards"},
            {"event_id": "e1", "market": "passing_yards", "side": "sideways", "line": 245.5},
            {"event_id": "e1", "market": "total", "side": "under", "line": 47.5}
        ]});
        let plays = parse_ev_plays(&blob);
        assert_eq!(plays.len(), 2);

        let found = find_play(&plays, &query(Some("p9"), Side::Over, 245.5)).unwrap();
        assert_eq!(found.pointer.as_deref(), Some("props:nfl:e1:p9:passing_yards"));
        assert!(find_play(&plays, &query(Some("p9"), Side::Under, 245.5)).is_none());
        assert!(parse_ev_plays(&json!("nope")).is_empty());
    }
}
