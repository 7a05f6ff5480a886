//! Parlay price comparison across sportsbooks.

use crate::odds_math::{calculate_parlay_odds, format_optional_odds};
use crate::player_odds::BookPrice;
use crate::selector::is_better_price;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookParlay {
    /// Only set when the book prices every leg
    pub parlay_odds: Option<i32>,
    pub individual_odds: Vec<i32>,
    pub has_all_selections: bool,
    pub num_selections: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParlayComparison {
    pub parlay_results: IndexMap<String, BookParlay>,
    pub best_sportsbook: Option<String>,
    pub best_odds: Option<i32>,
    pub num_selections_with_odds: usize,
    pub total_selections: usize,
}

/// Price the parlay at every book that quotes at least one leg.
///
/// `legs` holds each selection's per-book prices (`None` when the selection
/// could not be priced anywhere); unpriced selections are left out of the
/// parlay. Returns `None` when no selection has prices.
pub fn compare_parlays<'a>(
    legs: impl IntoIterator<Item = Option<&'a IndexMap<String, BookPrice>>>,
) -> Option<ParlayComparison> {
    let legs: Vec<Option<&IndexMap<String, BookPrice>>> = legs.into_iter().collect();
    let total_selections = legs.len();
    let priced: Vec<&IndexMap<String, BookPrice>> = legs
        .into_iter()
        .flatten()
        .filter(|books| !books.is_empty())
        .collect();

    if priced.is_empty() {
        debug!("No selections have odds; skipping parlay comparison");
        return None;
    }

    let mut books: Vec<&str> = Vec::new();
    for leg in &priced {
        for book in leg.keys() {
            if !books.contains(&book.as_str()) {
                books.push(book);
            }
        }
    }

    let mut parlay_results = IndexMap::new();
    let mut best: Option<(String, i32)> = None;

    for book in books {
        let individual_odds: Vec<i32> = priced
            .iter()
            .filter_map(|leg| leg.get(book).map(|p| p.price))
            .collect();
        let has_all_selections = individual_odds.len() == priced.len();
        let parlay_odds = if has_all_selections {
            calculate_parlay_odds(&individual_odds)
        } else {
            None
        };

        debug!("{} parlay: {}", book, format_optional_odds(parlay_odds));

        if let Some(odds) = parlay_odds {
            if is_better_price(odds, best.as_ref().map(|(_, p)| *p)) {
                best = Some((book.to_string(), odds));
            }
        }

        parlay_results.insert(
            book.to_string(),
            BookParlay {
                parlay_odds,
                num_selections: individual_odds.len(),
                individual_odds,
                has_all_selections,
            },
        );
    }

    let (best_sportsbook, best_odds) =
        best.map_or((None, None), |(book, odds)| (Some(book), Some(odds)));

    Some(ParlayComparison {
        parlay_results,
        best_sportsbook,
        best_odds,
        num_selections_with_odds: priced.len(),
        total_selections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(entries: &[(&str, i32)]) -> IndexMap<String, BookPrice> {
        entries
            .iter()
            .map(|(book, price)| {
                (
                    book.to_string(),
                    BookPrice {
                        price: *price,
                        point: Some(0.5),
                        link: None,
                        sid: None,
                        event_sid: None,
                        event_link: None,
                        last_update: None,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_best_book_prices_every_leg() {
        let leg1 = prices(&[("draftkings", -110), ("fanduel", -105), ("betmgm", 100)]);
        let leg2 = prices(&[("draftkings", -110), ("fanduel", -115)]);

        let cmp = compare_parlays([Some(&leg1), Some(&leg2), None]).unwrap();
        assert_eq!(cmp.total_selections, 3);
        assert_eq!(cmp.num_selections_with_odds, 2);

        assert_eq!(cmp.parlay_results["draftkings"].parlay_odds, Some(264));
        assert!(!cmp.parlay_results["betmgm"].has_all_selections);
        assert_eq!(cmp.parlay_results["betmgm"].parlay_odds, None);
        assert_eq!(cmp.parlay_results["betmgm"].individual_odds, vec![100]);

        // fanduel: 1.952 * 1.870 = 3.651 -> +265
        assert_eq!(cmp.best_sportsbook.as_deref(), Some("fanduel"));
        assert!(cmp.best_odds.unwrap() > 264);
    }

    #[test]
    fn test_no_priced_selections() {
        let empty = IndexMap::new();
        assert!(compare_parlays([None, Some(&empty)]).is_none());
    }

    #[test]
    fn test_single_leg_parlay_is_identity() {
        let leg = prices(&[("draftkings", 150)]);
        let cmp = compare_parlays([Some(&leg)]).unwrap();
        assert_eq!(cmp.best_odds, Some(150));
    }
}
