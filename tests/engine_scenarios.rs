use odds_comparison::config::{EngineConfig, LineTolerance, MatchConfig};
use odds_comparison::name_matcher::score;
use odds_comparison::odds_api::OddsApiEvent;
use odds_comparison::odds_math::{american_to_decimal, calculate_parlay_odds, decimal_to_american};
use odds_comparison::player_odds::{extract_player_odds, market_keys_for, SelectionQuery};
use odds_comparison::types::SportsbookEntry;
use odds_comparison::{normalize_value, resolve_line, select_best, MarketKind, Side};
use serde_json::json;

fn judge_event() -> OddsApiEvent {
    serde_json::from_value(json!({
        "id": "evt-nyy-bos",
        "home_team": "New York Yankees",
        "away_team": "Boston Red Sox",
        "bookmakers": [
            {
                "key": "book_a",
                "markets": [{
                    "key": "batter_home_runs",
                    "outcomes": [
                        {"name": "Over", "description": "Aaron Judge", "price": -150, "point": 0.5},
                        {"name": "Over", "description": "Giancarlo Stanton", "price": 210, "point": 0.5}
                    ]
                }]
            },
            {
                "key": "book_b",
                "markets": [{
                    "key": "batter_home_runs",
                    "outcomes": [
                        {"name": "Over", "description": "Aaron Judge", "price": 110, "point": 0.5}
                    ]
                }]
            }
        ]
    }))
    .unwrap()
}

#[test]
fn test_aaron_judge_home_run_over() {
    let market_keys = market_keys_for("Home Runs");
    assert_eq!(market_keys, vec!["batter_home_runs", "batter_home_runs_alternate"]);

    let query = SelectionQuery {
        player: "Aaron Judge",
        market_keys: &market_keys,
        line: Some(0.5),
        side: Side::Over,
    };
    let odds = extract_player_odds(&judge_event(), &query, &EngineConfig::default());
    assert_eq!(odds.metadata.matches_found, 2);
    assert!(odds.metadata.error.is_none());

    let map = odds.line_map(Side::Over);
    assert_eq!(map.line_keys().collect::<Vec<_>>(), vec!["0.5"]);

    let bucket = map.bucket(0.5).unwrap();
    let books: Vec<&str> = bucket.keys().map(String::as_str).collect();
    assert_eq!(books, vec!["book_a", "book_b"]);
    assert_eq!(bucket["book_a"].over.as_ref().unwrap().price, -150);
    assert_eq!(bucket["book_b"].over.as_ref().unwrap().price, 110);

    let best = select_best(bucket, Side::Over).unwrap();
    assert_eq!(best.book, "book_b");
    assert_eq!(best.price, 110);
    assert_eq!(odds.best().unwrap().book, "book_b");
}

#[test]
fn test_flat_legacy_and_nested_payloads_agree() {
    let nested = normalize_value(
        &json!({"draftkings": {"over": {"price": -110, "line": 1.5, "link": "https://dk/1"}}}),
        None,
        None,
    );
    let flat = normalize_value(
        &json!({"draftkings": {"price": -110, "link": "https://dk/1"}}),
        Some(1.5),
        None,
    );
    let legacy = normalize_value(
        &json!({"draftkings": {"odds": -110, "over_link": "https://dk/1"}}),
        Some(1.5),
        None,
    );

    let entry = |map: &odds_comparison::CanonicalLineMap| -> SportsbookEntry {
        map.bucket(1.5).unwrap()["draftkings"].clone()
    };
    assert_eq!(entry(&nested), entry(&flat));
    assert_eq!(entry(&nested), entry(&legacy));
}

#[test]
fn test_best_price_examples() {
    let map = normalize_value(
        &json!({"0.5": {
            "dk": {"over": {"price": 120}},
            "fd": {"over": {"price": -110}},
            "mgm": {"over": {"price": 105}}
        }}),
        None,
        None,
    );
    let best = select_best(map.bucket(0.5).unwrap(), Side::Over).unwrap();
    assert_eq!((best.book.as_str(), best.price), ("dk", 120));

    let map = normalize_value(
        &json!({"0.5": {"dk": {"over": {"price": -105}}, "fd": {"over": {"price": -120}}}}),
        None,
        None,
    );
    let best = select_best(map.bucket(0.5).unwrap(), Side::Over).unwrap();
    assert_eq!((best.book.as_str(), best.price), ("dk", -105));
}

#[test]
fn test_strikeout_line_shift() {
    let kind = MarketKind::from_market_key("pitcher_strikeouts");
    let resolved = resolve_line([5.5], 6.0, kind, &LineTolerance::default());
    assert_eq!(resolved, Some(5.5));
}

#[test]
fn test_name_scores() {
    let config = MatchConfig::default();
    assert_eq!(score("Aaron Judge", "Aaron Judge", &config), 1.0);
    assert!(score("Lourdes Gurriel", "Lourdes Gurriel Jr.", &config) >= 0.95);
    assert!(score("Kyle Schwarber", "Kyle Stowers", &config) < 0.8);
}

#[test]
fn test_parlay_properties() {
    assert_eq!(calculate_parlay_odds(&[150]), Some(150));
    assert_eq!(
        calculate_parlay_odds(&[-110, 250, -200]),
        calculate_parlay_odds(&[-200, -110, 250])
    );

    for american in [-250, -110, 100, 145, 600] {
        let back = decimal_to_american(american_to_decimal(american)).unwrap();
        assert!((back - american).abs() <= 1, "{} -> {}", american, back);
    }
}
