//! The Odds API client and wire types.

use crate::error::{OddsError, OddsResult};
use crate::teams::ScheduledGame;
use crate::types::Outcome;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The Odds API event structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct OddsApiEvent {
    pub id: String,
    pub sport_key: String,
    pub sport_title: String,
    pub commence_time: Option<DateTime<Utc>>,
    pub home_team: String,
    pub away_team: String,
    pub bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Bookmaker {
    pub key: String,
    pub title: String,
    pub last_update: Option<DateTime<Utc>>,
    /// Event-level id/link, present with includeSids/includeLinks
    pub sid: Option<String>,
    pub link: Option<String>,
    pub markets: Vec<ApiMarket>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ApiMarket {
    pub key: String,
    pub last_update: Option<DateTime<Utc>>,
    pub outcomes: Vec<ApiOutcome>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ApiOutcome {
    pub name: String,
    pub price: Option<i32>,
    pub point: Option<f64>,
    pub description: Option<String>,
    pub sid: Option<String>,
    pub link: Option<String>,
}

impl ApiOutcome {
    /// Canonical outcome; `None` when upstream sent no price
    pub fn to_outcome(&self) -> Option<Outcome> {
        Some(Outcome {
            name: self.name.clone(),
            price: self.price?,
            point: self.point,
            description: self.description.clone(),
            sid: self.sid.clone(),
            link: self.link.clone(),
        })
    }
}

impl Bookmaker {
    /// Priced outcomes across the given market keys, in market-key order
    pub fn outcomes_for(&self, market_keys: &[String]) -> Vec<Outcome> {
        market_keys
            .iter()
            .filter_map(|key| self.markets.iter().find(|m| &m.key == key))
            .flat_map(|market| market.outcomes.iter().filter_map(ApiOutcome::to_outcome))
            .collect()
    }
}

impl From<&OddsApiEvent> for ScheduledGame {
    fn from(event: &OddsApiEvent) -> Self {
        ScheduledGame {
            id: event.id.clone(),
            home_team: event.home_team.clone(),
            away_team: event.away_team.clone(),
            commence_time: event.commence_time,
        }
    }
}

/// Odds API sport key for short sport names used by the front end
pub fn api_sport_key(sport: &str) -> String {
    let sport = sport.trim().to_lowercase();
    let key = match sport.as_str() {
        "mlb" | "baseball_mlb" => "baseball_mlb",
        "nba" | "basketball_nba" => "basketball_nba",
        "ncaab" | "basketball_ncaab" => "basketball_ncaab",
        "nfl" | "football_nfl" | "americanfootball_nfl" => "americanfootball_nfl",
        "ncaaf" | "football_ncaaf" | "americanfootball_ncaaf" => "americanfootball_ncaaf",
        "wnba" | "basketball_wnba" => "basketball_wnba",
        "nhl" | "icehockey_nhl" => "icehockey_nhl",
        _ => return sport,
    };
    key.to_string()
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate-limited client for The Odds API v4
pub struct OddsApiClient {
    http_client: reqwest::Client,
    rate_limiter: DirectLimiter,
    api_key: String,
    base_url: String,
    regions: String,
    bookmakers: Vec<String>,
}

impl OddsApiClient {
    pub fn new(
        api_key: String,
        base_url: String,
        regions: String,
        bookmakers: Vec<String>,
        rate_per_minute: u32,
    ) -> OddsResult<Self> {
        let per_minute = NonZeroU32::new(rate_per_minute)
            .ok_or_else(|| OddsError::Config("rate_per_minute must be positive".to_string()))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            api_key,
            base_url,
            regions,
            bookmakers,
        })
    }

    pub fn bookmakers(&self) -> &[String] {
        &self.bookmakers
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> OddsResult<T> {
        self.rate_limiter.until_ready().await;

        let response = self
            .http_client
            .get(url)
            .query(&[("apiKey", self.api_key.as_str())])
            .query(query)
            .send()
            .await?;

        if let Some(remaining) = response.headers().get("x-requests-remaining") {
            debug!("API requests remaining: {}", remaining.to_str().unwrap_or("?"));
        }

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Odds API error (status {}) for {}: {}", status, url, body);
            return Err(OddsError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Events commencing inside `[from, to]`
    pub async fn fetch_events(
        &self,
        sport: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> OddsResult<Vec<OddsApiEvent>> {
        let url = format!("{}/v4/sports/{}/events", self.base_url, api_sport_key(sport));
        let events: Vec<OddsApiEvent> = self
            .get_json(
                &url,
                &[
                    ("dateFormat", "iso".to_string()),
                    ("commenceTimeFrom", format_api_time(from)),
                    ("commenceTimeTo", format_api_time(to)),
                ],
            )
            .await?;

        info!("Fetched {} {} events from The Odds API", events.len(), sport);
        Ok(events)
    }

    /// Games on a calendar date, extended to 06:00 UTC the next morning so
    /// late US games are included
    pub async fn games_for_date(&self, sport: &str, date: NaiveDate) -> OddsResult<Vec<ScheduledGame>> {
        let start = date.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        let end = (date + ChronoDuration::days(1))
            .and_hms_opt(6, 0, 0)
            .map(|t| t.and_utc());
        let (Some(start), Some(end)) = (start, end) else {
            return Err(OddsError::Validation(format!("invalid date {}", date)));
        };

        let events = self.fetch_events(sport, start, end).await?;
        Ok(events.iter().map(ScheduledGame::from).collect())
    }

    /// Odds for one event across `market_keys` from the configured books
    pub async fn fetch_event_odds(
        &self,
        sport: &str,
        event_id: &str,
        market_keys: &[String],
        include_sids: bool,
        include_links: bool,
    ) -> OddsResult<OddsApiEvent> {
        let url = format!(
            "{}/v4/sports/{}/events/{}/odds",
            self.base_url,
            api_sport_key(sport),
            event_id
        );

        let mut query = vec![
            ("regions", self.regions.clone()),
            ("markets", market_keys.join(",")),
            ("oddsFormat", "american".to_string()),
            ("bookmakers", self.bookmakers.join(",")),
        ];
        if include_sids {
            query.push(("includeSids", "true".to_string()));
        }
        if include_links {
            query.push(("includeLinks", "true".to_string()));
        }

        let event: OddsApiEvent = self.get_json(&url, &query).await?;
        debug!(
            "Fetched {} bookmakers for event {} ({})",
            event.bookmakers.len(),
            event_id,
            market_keys.join(",")
        );
        Ok(event)
    }
}

fn format_api_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
