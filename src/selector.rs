//! Best-price selection across sportsbooks.
//!
//! American odds are already ordered by bettor preference (-120 < -105 <
//! +100 < +120), so the raw integer with strict greater-than is the
//! comparator for both sides. Ties keep the first book seen.

use crate::types::{BestOdds, LineBucket, Side};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Strictly better than the current best (or there is no current best)
pub fn is_better_price(candidate: i32, current: Option<i32>) -> bool {
    current.map_or(true, |best| candidate > best)
}

/// Best available price for `side` within one line bucket
pub fn select_best(bucket: &LineBucket, side: Side) -> Option<BestOdds> {
    let mut best: Option<BestOdds> = None;

    for (book, entry) in bucket {
        let Some(outcome) = entry.side(side) else {
            continue;
        };
        if is_better_price(outcome.price, best.as_ref().map(|b| b.price)) {
            best = Some(BestOdds {
                book: book.clone(),
                price: outcome.price,
                line: outcome.point.unwrap_or(entry.line),
                link: outcome.link.clone(),
                sid: outcome.sid.clone(),
            });
        }
    }

    best
}

/// One book's price in a best-first listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedBook {
    pub book: String,
    pub odds: i32,
    pub line: f64,
    pub side: Side,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Every book pricing `side`, best first (stable on ties)
pub fn ranked_books(bucket: &LineBucket, side: Side) -> Vec<RankedBook> {
    let mut books: Vec<RankedBook> = bucket
        .iter()
        .filter_map(|(book, entry)| {
            let outcome = entry.side(side)?;
            Some(RankedBook {
                book: book.clone(),
                odds: outcome.price,
                line: outcome.point.unwrap_or(entry.line),
                side,
                link: outcome.link.clone(),
                last_updated: entry.last_update,
            })
        })
        .collect();

    books.sort_by(|a, b| b.odds.cmp(&a.odds));
    books
}

/// Spread of prices across books for one side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketStats {
    pub total_books: usize,
    pub best_odds: i32,
    pub worst_odds: i32,
    pub odds_spread: i32,
    pub avg_odds: i32,
}

/// Summary stats for `side`; `None` when no book prices it
pub fn market_stats(bucket: &LineBucket, side: Side) -> Option<MarketStats> {
    let prices: Vec<i32> = bucket
        .values()
        .filter_map(|entry| entry.side(side).map(|o| o.price))
        .collect();

    let best = *prices.iter().max()?;
    let worst = *prices.iter().min()?;
    let total: i64 = prices.iter().map(|p| *p as i64).sum();
    let mean = total as f64 / prices.len() as f64;

    Some(MarketStats {
        total_books: prices.len(),
        best_odds: best,
        worst_odds: worst,
        odds_spread: (best - worst).abs(),
        // half rounds up
        avg_odds: (mean + 0.5).floor() as i32,
    })
}
