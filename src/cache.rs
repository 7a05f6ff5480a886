//! Redis access for cached odds blobs, EV plays and expansion results.

use crate::error::OddsResult;
use anyhow::{anyhow, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{info, warn};

/// `odds:{sport}:props:{market}:primary:{scope}`
pub fn props_key(sport: &str, market: &str, scope: &str) -> String {
    format!("odds:{}:props:{}:primary:{}", sport, market, scope)
}

/// `ev:{sport}:{scope}`
pub fn ev_key(sport: &str, scope: &str) -> String {
    format!("ev:{}:{}", sport, scope)
}

/// `ev:expansion:{sport}:{event}:{market}[:{player}]:{side}:{line}`
pub fn expansion_key(
    sport: &str,
    event_id: &str,
    market: &str,
    player_id: Option<&str>,
    side: &str,
    line: &str,
) -> String {
    match player_id {
        Some(player) => format!(
            "ev:expansion:{}:{}:{}:{}:{}:{}",
            sport, event_id, market, player, side, line
        ),
        None => format!("ev:expansion:{}:{}:{}:{}:{}", sport, event_id, market, side, line),
    }
}

/// Shared Redis handle; clones share one multiplexed connection
#[derive(Clone)]
pub struct OddsCache {
    conn: ConnectionManager,
}

impl OddsCache {
    /// Connect with exponential backoff
    pub async fn connect(url: &str, max_retries: u32) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| anyhow!("Invalid Redis URL: {}", e))?;

        let mut attempt = 0;
        loop {
            match ConnectionManager::new(client.clone()).await {
                Ok(conn) => {
                    info!("Connected to Redis");
                    return Ok(Self { conn });
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_retries {
                        return Err(anyhow!(
                            "Failed to connect to Redis after {} attempts: {}",
                            max_retries,
                            e
                        ));
                    }
                    warn!("Redis connection attempt {} failed: {}. Retrying...", attempt, e);
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }

    pub async fn get_string(&self, key: &str) -> OddsResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> OddsResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await?;
        Ok(())
    }
}
