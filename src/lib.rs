//! Sportsbook odds comparison.
//!
//! The engine normalizes heterogeneous sportsbook payloads into a
//! [`CanonicalLineMap`], matches player names across books, resolves
//! requested lines and picks the best American price. The [`server`]
//! module exposes it over HTTP backed by Redis and The Odds API.

pub mod betslip;
pub mod cache;
pub mod config;
pub mod error;
pub mod ev_expansion;
pub mod line_resolver;
pub mod name_matcher;
pub mod normalizer;
pub mod odds_api;
pub mod odds_math;
pub mod parlay;
pub mod player_odds;
pub mod prop_comparison;
pub mod selector;
pub mod server;
pub mod sportsbooks;
pub mod teams;
pub mod types;

pub use config::{Config, EngineConfig, LineTolerance, MatchConfig};
pub use error::{OddsError, OddsResult};
pub use line_resolver::{resolve_line, MarketKind};
pub use name_matcher::{find_player_outcomes, normalize_name};
pub use normalizer::{normalize, normalize_json, normalize_value, RawPayload};
pub use selector::{is_better_price, select_best};
pub use types::{BestOdds, CanonicalLineMap, Outcome, Side, SportsbookEntry};
