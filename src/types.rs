//! Canonical odds structures shared by the normalizer, selector and service.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of a two-way prop a price belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Over,
    Under,
}

impl Side {
    /// Outcome name used by the sportsbooks ("Over" / "Under")
    pub fn outcome_name(self) -> &'static str {
        match self {
            Side::Over => "Over",
            Side::Under => "Under",
        }
    }

    /// Parse a bet type or outcome name, case-insensitively
    pub fn parse(value: &str) -> Option<Side> {
        match value.trim().to_lowercase().as_str() {
            "over" | "o" => Some(Side::Over),
            "under" | "u" => Some(Side::Under),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Over => write!(f, "over"),
            Side::Under => write!(f, "under"),
        }
    }
}

/// One priced bet leg as received from upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub name: String,
    pub price: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<f64>,
    /// Player name for player props
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Outcome {
    /// Side this outcome prices, if it is an over/under leg
    pub fn side(&self) -> Option<Side> {
        Side::parse(&self.name)
    }
}

/// One book's over/under pair within a line bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SportsbookEntry {
    pub book: String,
    pub over: Option<Outcome>,
    pub under: Option<Outcome>,
    pub line: f64,
    pub last_update: Option<DateTime<Utc>>,
}

impl SportsbookEntry {
    pub fn new(book: &str, line: f64, last_update: Option<DateTime<Utc>>) -> Self {
        Self {
            book: book.to_string(),
            over: None,
            under: None,
            line,
            last_update,
        }
    }

    pub fn side(&self, side: Side) -> Option<&Outcome> {
        match side {
            Side::Over => self.over.as_ref(),
            Side::Under => self.under.as_ref(),
        }
    }

    /// Write one side, replacing any previous price for it
    pub fn set_side(&mut self, side: Side, outcome: Outcome) {
        match side {
            Side::Over => self.over = Some(outcome),
            Side::Under => self.under = Some(outcome),
        }
    }
}

/// book id -> entry, in first-seen order
pub type LineBucket = IndexMap<String, SportsbookEntry>;

/// line (stringified) -> book id -> entry
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CanonicalLineMap {
    lines: IndexMap<String, LineBucket>,
}

impl CanonicalLineMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for (line, book), creating bucket and entry lazily
    pub fn entry_mut(
        &mut self,
        line: f64,
        book: &str,
        last_update: Option<DateTime<Utc>>,
    ) -> &mut SportsbookEntry {
        self.lines
            .entry(line_key(line))
            .or_default()
            .entry(book.to_string())
            .or_insert_with(|| SportsbookEntry::new(book, line, last_update))
    }

    /// Record one priced side for a book at a line
    pub fn insert_side(
        &mut self,
        line: f64,
        book: &str,
        side: Side,
        outcome: Outcome,
        last_update: Option<DateTime<Utc>>,
    ) {
        self.entry_mut(line, book, last_update).set_side(side, outcome);
    }

    pub fn bucket(&self, line: f64) -> Option<&LineBucket> {
        self.lines.get(&line_key(line))
    }

    pub fn bucket_by_key(&self, key: &str) -> Option<&LineBucket> {
        self.lines.get(key)
    }

    /// Line keys in first-seen order
    pub fn line_keys(&self) -> impl Iterator<Item = &str> {
        self.lines.keys().map(String::as_str)
    }

    /// Numeric lines in first-seen order
    pub fn lines(&self) -> impl Iterator<Item = f64> + '_ {
        self.lines.keys().filter_map(|k| parse_line(k))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LineBucket)> {
        self.lines.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Total number of (line, book) entries
    pub fn entry_count(&self) -> usize {
        self.lines.values().map(|b| b.len()).sum()
    }
}

/// Best available price for one side, derived on read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestOdds {
    pub book: String,
    pub price: i32,
    pub line: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

/// Stringify a line the way the upstream keys are written ("6", "5.5", "-1.5")
pub fn line_key(line: f64) -> String {
    if line == 0.0 {
        // covers -0.0 as well
        return "0".to_string();
    }
    format!("{}", line)
}

/// Parse a line key back into a number
pub fn parse_line(key: &str) -> Option<f64> {
    key.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
