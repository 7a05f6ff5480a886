//! Betslip odds lookup and refresh.
//!
//! Both flows price each selection at every active sportsbook through
//! [`extract_player_odds`]. Problems with a single selection (no game
//! match, missing ids, upstream errors) are reported on that selection and
//! never fail the whole request.

use crate::config::EngineConfig;
use crate::error::{OddsError, OddsResult};
use crate::odds_api::{OddsApiClient, OddsApiEvent};
use crate::parlay::{compare_parlays, ParlayComparison};
use crate::player_odds::{extract_player_odds, market_keys_for, BookPrice, OddsMetadata, SelectionQuery};
use crate::teams::{find_matching_game, ScheduledGame};
use crate::types::Side;
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_SPORT: &str = "baseball_mlb";

fn default_side() -> Side {
    Side::Over
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionTeams {
    #[serde(default)]
    pub away_team: Option<String>,
    #[serde(default)]
    pub home_team: Option<String>,
}

/// A selection read off a scanned betslip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetSelection {
    pub player: String,
    pub market: String,
    #[serde(default)]
    pub line: Option<f64>,
    #[serde(default = "default_side")]
    pub bet_type: Side,
    #[serde(default)]
    pub metadata: Option<SelectionTeams>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    #[serde(default)]
    pub selections: Vec<BetSelection>,
    pub sport: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub include_sids: bool,
    #[serde(default)]
    pub include_links: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedSelection {
    #[serde(flatten)]
    pub selection: BetSelection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    pub match_confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_odds: Option<IndexMap<String, BookPrice>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odds_metadata: Option<OddsMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnrichedSelection {
    fn unmatched(selection: BetSelection, error: Option<String>) -> Self {
        Self {
            selection,
            game_id: None,
            match_confidence: 0.0,
            current_odds: None,
            odds_metadata: None,
            error,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResponse {
    pub enriched_selections: Vec<EnrichedSelection>,
    pub games_found: usize,
    pub matched_selections: usize,
    pub parlay_comparison: Option<ParlayComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Price one selection against an already-fetched event
pub fn enrich_from_event(
    selection: &BetSelection,
    event: &OddsApiEvent,
    engine: &EngineConfig,
) -> (Option<IndexMap<String, BookPrice>>, OddsMetadata) {
    let market_keys = market_keys_for(&selection.market);
    let query = SelectionQuery {
        player: &selection.player,
        market_keys: &market_keys,
        line: selection.line,
        side: selection.bet_type,
    };
    let odds = extract_player_odds(event, &query, engine);
    let bookmakers = (!odds.is_empty()).then_some(odds.bookmakers);
    (bookmakers, odds.metadata)
}

/// Match each selection to today's games, price it everywhere, and compare
/// the parlay across books
pub async fn lookup_odds(
    client: &OddsApiClient,
    engine: &EngineConfig,
    request: LookupRequest,
) -> OddsResult<LookupResponse> {
    if request.selections.is_empty() {
        return Err(OddsError::Validation("No selections provided".to_string()));
    }

    let date = request.date.unwrap_or_else(|| Utc::now().date_naive());
    info!(
        "Odds lookup: {} selections, sport {}, date {}",
        request.selections.len(),
        request.sport,
        date
    );

    let games: Vec<ScheduledGame> = match client.games_for_date(&request.sport, date).await {
        Ok(games) => games,
        Err(e) => {
            warn!("Could not load games for {} on {}: {}", request.sport, date, e);
            Vec::new()
        }
    };

    if games.is_empty() {
        return Ok(LookupResponse {
            enriched_selections: request
                .selections
                .into_iter()
                .map(|s| EnrichedSelection::unmatched(s, None))
                .collect(),
            games_found: 0,
            matched_selections: 0,
            parlay_comparison: None,
            message: Some("No games found for the specified date".to_string()),
        });
    }

    // one upstream call per (game, market) within a request
    let mut events: HashMap<(String, Vec<String>), OddsApiEvent> = HashMap::new();
    let mut enriched = Vec::with_capacity(request.selections.len());

    for selection in request.selections {
        let teams = selection.metadata.clone().unwrap_or_default();
        let Some(game) = find_matching_game(teams.away_team.as_deref(), teams.home_team.as_deref(), &games)
        else {
            info!("No game match found for {}", selection.player);
            enriched.push(EnrichedSelection::unmatched(selection, None));
            continue;
        };

        let market_keys = market_keys_for(&selection.market);
        let cache_key = (game.game_id.clone(), market_keys.clone());
        if !events.contains_key(&cache_key) {
            match client
                .fetch_event_odds(
                    &request.sport,
                    &game.game_id,
                    &market_keys,
                    request.include_sids,
                    request.include_links,
                )
                .await
            {
                Ok(event) => {
                    events.insert(cache_key.clone(), event);
                }
                Err(e) => {
                    warn!("Odds fetch failed for game {}: {}", game.game_id, e);
                    enriched.push(EnrichedSelection {
                        selection,
                        game_id: Some(game.game_id),
                        match_confidence: game.confidence,
                        current_odds: None,
                        odds_metadata: None,
                        error: Some(fetch_error_message(&e)),
                    });
                    continue;
                }
            }
        }

        let (current_odds, metadata) = match events.get(&cache_key) {
            Some(event) => enrich_from_event(&selection, event, engine),
            None => continue,
        };
        enriched.push(EnrichedSelection {
            selection,
            game_id: Some(game.game_id),
            match_confidence: game.confidence,
            current_odds,
            error: metadata.error.clone(),
            odds_metadata: Some(metadata),
        });
    }

    let parlay_comparison = compare_parlays(enriched.iter().map(|s| s.current_odds.as_ref()));
    let matched_selections = enriched.iter().filter(|s| s.game_id.is_some()).count();

    Ok(LookupResponse {
        games_found: games.len(),
        matched_selections,
        enriched_selections: enriched,
        parlay_comparison,
        message: None,
    })
}

fn fetch_error_message(error: &OddsError) -> String {
    match error {
        OddsError::Upstream { status, .. } => format!("API error: {}", status),
        other => format!("Error fetching odds: {}", other),
    }
}

/// A selection as stored with a saved betslip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSelection {
    #[serde(default)]
    pub id: Option<String>,
    pub player_name: String,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub market_api_key: Option<String>,
    #[serde(default)]
    pub sport_api_key: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
    pub line: f64,
    #[serde(default = "default_side")]
    pub bet_type: Side,
    /// Remaining stored columns, echoed back untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub selections: Vec<StoredSelection>,
    /// Used for selections without their own `sport_api_key`
    #[serde(default)]
    pub sport: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CurrentOdds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmakers: Option<IndexMap<String, BookPrice>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<OddsMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CurrentOdds {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn matches_found(&self) -> usize {
        self.metadata.as_ref().map_or(0, |m| m.matches_found)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshedSelection {
    #[serde(flatten)]
    pub selection: StoredSelection,
    pub current_odds: CurrentOdds,
    pub odds_last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshSummary {
    pub total_selections: usize,
    pub successful_refreshes: usize,
    pub failed_refreshes: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub betslip_id: Uuid,
    pub selections_updated: usize,
    pub last_refresh: DateTime<Utc>,
    pub selections: Vec<RefreshedSelection>,
    pub summary: RefreshSummary,
}

pub fn summarize(selections: &[RefreshedSelection]) -> RefreshSummary {
    RefreshSummary {
        total_selections: selections.len(),
        successful_refreshes: selections
            .iter()
            .filter(|s| s.current_odds.matches_found() > 0)
            .count(),
        failed_refreshes: selections
            .iter()
            .filter(|s| s.current_odds.error.is_some() || s.current_odds.matches_found() == 0)
            .count(),
    }
}

/// Reprice a stored selection against a fetched event
pub fn refresh_from_event(
    selection: &StoredSelection,
    market_keys: &[String],
    event: &OddsApiEvent,
    engine: &EngineConfig,
) -> CurrentOdds {
    if event.bookmakers.is_empty() {
        return CurrentOdds::failed("No bookmakers available");
    }

    let query = SelectionQuery {
        player: &selection.player_name,
        market_keys,
        line: Some(selection.line),
        side: selection.bet_type,
    };
    let odds = extract_player_odds(event, &query, engine);

    CurrentOdds {
        bookmakers: Some(odds.bookmakers),
        metadata: Some(odds.metadata),
        error: None,
    }
}

/// Parse a betslip id from a path segment
pub fn parse_betslip_id(raw: &str) -> OddsResult<Uuid> {
    Ok(Uuid::parse_str(raw.trim())?)
}

/// Reprice every selection of a saved betslip
pub async fn refresh_betslip(
    client: &OddsApiClient,
    engine: &EngineConfig,
    betslip_id: &str,
    request: RefreshRequest,
) -> OddsResult<RefreshResponse> {
    let betslip_id = parse_betslip_id(betslip_id)?;
    if request.selections.is_empty() {
        return Err(OddsError::Validation(
            "No selections found in this betslip".to_string(),
        ));
    }

    info!(
        "Refreshing {} selections for betslip {} across {} sportsbooks",
        request.selections.len(),
        betslip_id,
        client.bookmakers().len()
    );

    let mut refreshed = Vec::with_capacity(request.selections.len());
    for selection in request.selections {
        let current_odds = refresh_one(client, engine, &selection, request.sport.as_deref()).await;
        refreshed.push(RefreshedSelection {
            selection,
            current_odds,
            odds_last_updated: Utc::now(),
        });
    }

    let summary = summarize(&refreshed);
    info!(
        "Refreshed betslip {}: {} ok, {} failed",
        betslip_id, summary.successful_refreshes, summary.failed_refreshes
    );

    Ok(RefreshResponse {
        betslip_id,
        selections_updated: refreshed.len(),
        last_refresh: Utc::now(),
        selections: refreshed,
        summary,
    })
}

async fn refresh_one(
    client: &OddsApiClient,
    engine: &EngineConfig,
    selection: &StoredSelection,
    fallback_sport: Option<&str>,
) -> CurrentOdds {
    let Some(event_id) = selection.event_id.as_deref().filter(|id| !id.is_empty()) else {
        warn!("No event_id for selection {:?}, skipping odds refresh", selection.id);
        return CurrentOdds::failed("No event ID available");
    };
    let Some(market_key) = selection.market_api_key.as_deref().filter(|k| !k.is_empty()) else {
        warn!("No market_api_key for selection {:?}, skipping odds refresh", selection.id);
        return CurrentOdds::failed("No market API key available");
    };

    let sport = selection
        .sport_api_key
        .as_deref()
        .or(fallback_sport)
        .unwrap_or(DEFAULT_SPORT);
    let market_keys = market_keys_for(market_key);

    match client
        .fetch_event_odds(sport, event_id, &market_keys, true, true)
        .await
    {
        Ok(event) => refresh_from_event(selection, &market_keys, &event, engine),
        Err(e) => {
            warn!("Failed to fetch odds for {}: {}", event_id, e);
            CurrentOdds::failed(fetch_error_message(&e))
        }
    }
}
