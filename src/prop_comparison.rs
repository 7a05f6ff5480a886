//! Player-prop comparison over cached per-market blobs.
//!
//! A blob holds every event's players for one market, each with a per-book
//! `{over, under}` quote. Prices are normalized into a [`CanonicalLineMap`]
//! per player and the best prices are recomputed from that map; the
//! `best` block stored alongside the quotes is ignored.

use crate::cache::props_key;
use crate::normalizer::normalize_value;
use crate::selector::select_best;
use crate::types::{line_key, BestOdds, CanonicalLineMap, Side};
use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Pregame,
    Live,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Pregame => write!(f, "pregame"),
            Scope::Live => write!(f, "live"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropQuery {
    pub sport: String,
    pub market: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub game_id: Option<String>,
}

impl PropQuery {
    pub fn cache_key(&self) -> String {
        props_key(&sport_code(&self.sport), &market_code(&self.market), &self.scope.to_string())
    }
}

/// Short sport code used in cache keys
pub fn sport_code(sport: &str) -> String {
    let code = match sport {
        "football_nfl" | "americanfootball_nfl" => "nfl",
        "basketball_nba" => "nba",
        "basketball_ncaab" => "ncaab",
        "baseball_mlb" => "mlb",
        "football_ncaaf" | "americanfootball_ncaaf" => "ncaaf",
        other => other,
    };
    code.to_string()
}

/// Vendor market code for a display market ("Pass Yards" -> "passing_yards")
pub fn market_code(market: &str) -> String {
    let lowered = market.trim().to_lowercase();
    let code = match lowered.as_str() {
        "pass yards" => "passing_yards",
        "reception yards" => "receiving_yards",
        "rush yards" => "rushing_yards",
        "pass touchdowns" | "passing_touchdowns" => "passing_tds",
        "reception touchdowns" | "receiving_touchdowns" => "receiving_tds",
        "rush touchdowns" | "rushing_touchdowns" => "rushing_tds",
        "interceptions thrown" => "pass_intercepts",
        "pass + rush + reception yards" => "pass_rush_reception_yards",
        "pass + rush + reception touchdowns" => "pass_rush_reception_touchdowns",
        "rush + reception yards" => "rush_reception_yards",
        "rush + reception touchdowns" => "rush_reception_touchdowns",
        "tackles + assists" => "tackles_assists",
        _ => return lowered.replace(' ', "_"),
    };
    code.to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarketBlob {
    /// Unix seconds
    pub updated_at: Option<i64>,
    pub events: IndexMap<String, EventBlob>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventBlob {
    pub event: EventInfo,
    pub players: IndexMap<String, PlayerBlob>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EventInfo {
    pub id: Option<String>,
    pub home: Option<String>,
    pub away: Option<String>,
    pub start: Option<String>,
    pub live: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlayerBlob {
    pub name: String,
    pub position: Option<String>,
    pub team: Option<String>,
    pub player_id: Option<String>,
    pub primary_line: Option<f64>,
    /// book -> {over, under}; normalized on read
    pub books: Value,
    pub metrics: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerComparison {
    pub description: String,
    pub player_id: String,
    pub team: Option<String>,
    pub position: Option<String>,
    pub market: String,
    pub event_id: String,
    pub commence_time: Option<String>,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub lines: CanonicalLineMap,
    pub primary_line: Option<String>,
    pub active_line: Option<String>,
    pub best_over: Option<BestOdds>,
    pub best_under: Option<BestOdds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Value>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonMetadata {
    pub total: usize,
    pub sport: String,
    pub market: String,
    pub scope: Scope,
    pub game_id: Option<String>,
    pub events_found: usize,
    pub players_found: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropComparisonResponse {
    pub success: bool,
    pub data: Vec<PlayerComparison>,
    pub metadata: ComparisonMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PropComparisonResponse {
    pub fn empty(query: &PropQuery, error: Option<String>) -> Self {
        Self {
            success: true,
            data: Vec::new(),
            metadata: ComparisonMetadata {
                total: 0,
                sport: query.sport.clone(),
                market: query.market.clone(),
                scope: query.scope,
                game_id: query.game_id.clone(),
                events_found: 0,
                players_found: 0,
                last_updated: None,
            },
            error,
        }
    }
}

/// Primary line when it has prices, otherwise the first line seen
pub fn active_line(lines: &CanonicalLineMap, primary_line: Option<f64>) -> Option<String> {
    primary_line
        .map(line_key)
        .filter(|key| lines.bucket_by_key(key).is_some())
        .or_else(|| lines.line_keys().next().map(str::to_string))
}

fn compare_player(
    player_id: &str,
    player: &PlayerBlob,
    event_id: &str,
    event: &EventInfo,
    market: &str,
    last_updated: Option<DateTime<Utc>>,
) -> PlayerComparison {
    let lines = normalize_value(&player.books, player.primary_line, last_updated);
    let active = active_line(&lines, player.primary_line);
    let bucket = active.as_deref().and_then(|key| lines.bucket_by_key(key));

    PlayerComparison {
        description: player.name.clone(),
        player_id: player.player_id.clone().unwrap_or_else(|| player_id.to_string()),
        team: player.team.clone(),
        position: player.position.clone(),
        market: market.to_string(),
        event_id: event_id.to_string(),
        commence_time: event.start.clone(),
        home_team: event.home.clone(),
        away_team: event.away.clone(),
        primary_line: player.primary_line.map(line_key),
        active_line: active.clone(),
        best_over: bucket.and_then(|b| select_best(b, Side::Over)),
        best_under: bucket.and_then(|b| select_best(b, Side::Under)),
        metrics: player.metrics.clone(),
        last_updated,
        lines,
    }
}

/// Flatten a market blob into per-player comparisons sorted by name
pub fn build_comparison(blob: &MarketBlob, query: &PropQuery) -> PropComparisonResponse {
    let last_updated = blob
        .updated_at
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    let events: Vec<(&String, &EventBlob)> = match query.game_id.as_deref() {
        Some(game_id) => blob.events.get_key_value(game_id).into_iter().collect(),
        None => blob.events.iter().collect(),
    };

    let mut data = Vec::new();
    for (event_id, event) in &events {
        for (player_id, player) in &event.players {
            data.push(compare_player(
                player_id,
                player,
                event_id,
                &event.event,
                &query.market,
                last_updated,
            ));
        }
    }

    data.sort_by_key(|p| p.description.to_lowercase());
    debug!(
        "Built {} player comparisons across {} events",
        data.len(),
        events.len()
    );

    PropComparisonResponse {
        success: true,
        metadata: ComparisonMetadata {
            total: data.len(),
            sport: query.sport.clone(),
            market: query.market.clone(),
            scope: query.scope,
            game_id: query.game_id.clone(),
            events_found: events.len(),
            players_found: data.len(),
            last_updated,
        },
        data,
        error: None,
    }
}

/// Parse a raw cached blob and build the comparison. Malformed blobs are
/// logged and produce an empty response carrying the error.
pub fn comparison_from_json(raw: &str, query: &PropQuery) -> PropComparisonResponse {
    match serde_json::from_str::<MarketBlob>(raw) {
        Ok(blob) => build_comparison(&blob, query),
        Err(e) => {
            warn!("Malformed market blob at {}: {}", query.cache_key(), e);
            PropComparisonResponse::empty(query, Some("Invalid market data in cache".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(game_id: Option<&str>) -> PropQuery {
        PropQuery {
            sport: "baseball_mlb".to_string(),
            market: "batter_hits".to_string(),
            scope: Scope::Pregame,
            game_id: game_id.map(str::to_string),
        }
    }

    fn blob() -> serde_json::Value {
        json!({
            "updated_at": 1_717_200_000,
            "events": {
                "e1": {
                    "event": {"id": "e1", "home": "NYY", "away": "BOS", "start": "2024-06-01T23:05:00Z", "live": false},
                    "players": {
                        "p2": {
                            "name": "Rafael Devers",
                            "primary_line": 1.5,
                            "books": {
                                "draftkings": {
                                    "over": {"price": 170, "line": 1.5, "links": {"desktop": "https://dk/1"}},
                                    "under": {"price": -230, "line": 1.5}
                                },
                                "fanduel": {
                                    "over": {"price": 185, "line": 1.5},
                                    "under": {"price": -240, "line": 1.5}
                                }
                            },
                            "best": {"over": {"book": "draftkings", "price": 999, "line": 1.5}}
                        },
                        "p1": {
                            "name": "Aaron Judge",
                            "books": {
                                "betmgm": {"over": {"price": -125, "line": 0.5}, "under": {"price": -105, "line": 0.5}},
                                "fanduel": {"over": {"price": -120, "line": 0.5}, "under": {"price": 140, "line": 1.5}}
                            }
                        }
                    }
                },
                "e2": {"event": {"id": "e2"}, "players": {}}
            }
        })
    }

    #[test]
    fn test_codes_and_key() {
        assert_eq!(sport_code("americanfootball_nfl"), "nfl");
        assert_eq!(market_code("Pass Yards"), "passing_yards");
        assert_eq!(market_code("Receptions"), "receptions");
        assert_eq!(
            query(None).cache_key(),
            "odds:mlb:props:batter_hits:primary:pregame"
        );
    }

    #[test]
    fn test_players_sorted_and_best_recomputed() {
        let parsed: MarketBlob = serde_json::from_value(blob()).unwrap();
        let response = build_comparison(&parsed, &query(None));

        assert_eq!(response.metadata.events_found, 2);
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[0].description, "Aaron Judge");

        let devers = &response.data[1];
        assert_eq!(devers.active_line.as_deref(), Some("1.5"));
        // stored best (999) is ignored
        let best_over = devers.best_over.as_ref().unwrap();
        assert_eq!((best_over.book.as_str(), best_over.price), ("fanduel", 185));
        assert_eq!(devers.best_under.as_ref().unwrap().price, -230);
        assert_eq!(devers.commence_time.as_deref(), Some("2024-06-01T23:05:00Z"));
    }

    #[test]
    fn test_sides_on_different_lines() {
        let parsed: MarketBlob = serde_json::from_value(blob()).unwrap();
        let response = build_comparison(&parsed, &query(Some("e1")));
        let judge = &response.data[0];

        // no primary line: first line seen is active
        assert_eq!(judge.active_line.as_deref(), Some("0.5"));
        assert_eq!(judge.lines.len(), 2);
        assert!(judge.lines.bucket(1.5).unwrap()["fanduel"].over.is_none());
        assert_eq!(judge.best_over.as_ref().unwrap().book, "fanduel");
        assert_eq!(judge.best_under.as_ref().unwrap().book, "betmgm");
    }

    #[test]
    fn test_game_filter() {
        let parsed: MarketBlob = serde_json::from_value(blob()).unwrap();
        let response = build_comparison(&parsed, &query(Some("missing")));
        assert_eq!(response.metadata.events_found, 0);
        assert!(response.data.is_empty());
    }

    #[test]
    fn test_malformed_blob_is_empty_with_error() {
        let response = comparison_from_json("{not json", &query(None));
        assert!(response.success);
        assert!(response.data.is_empty());
        assert!(response.error.is_some());
    }
}
