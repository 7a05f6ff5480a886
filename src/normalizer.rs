//! Reshape per-sportsbook odds payloads into a [`CanonicalLineMap`].
//!
//! Upstream blobs come in several dialects:
//!
//! - line-keyed: `{ "0.5": { "draftkings": { "over": {...}, "under": {...} } } }`
//! - book-keyed, sides carry their own line:
//!   `{ "draftkings": { "over": { "price": -110, "line": 0.5, "links": {...} } } }`
//! - old flat format: `{ "draftkings": { "price": -110, "link": "..." } }`
//! - legacy format: `{ "draftkings": { "odds": -110, "over_link": "..." } }`
//!
//! [`RawPayload::detect`] classifies a blob once; [`normalize`] then walks
//! the typed variant, so the fallback chain is exhaustive.

use crate::error::{OddsError, OddsResult};
use crate::types::{parse_line, CanonicalLineMap, Outcome, Side};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// One priced side in the new nested shape
#[derive(Debug, Clone, PartialEq)]
pub struct RawSide {
    pub price: i32,
    pub line: Option<f64>,
    pub link: Option<String>,
    pub sid: Option<String>,
}

/// A single book's quote, in whichever dialect upstream used
#[derive(Debug, Clone, PartialEq)]
pub enum RawBookQuote {
    /// `{over: {...}, under: {...}}`
    Sided {
        over: Option<RawSide>,
        under: Option<RawSide>,
    },
    /// `{price, link}`; prices the over only
    FlatPrice { price: i32, link: Option<String> },
    /// `{odds, over_link}`; prices the over only
    LegacyOdds { odds: i32, link: Option<String> },
}

/// A whole payload, classified by its top-level keys
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    ByLine(IndexMap<String, IndexMap<String, RawBookQuote>>),
    ByBook(IndexMap<String, RawBookQuote>),
}

impl RawSide {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let price = obj.get("price").and_then(as_price)?;
        let line = obj
            .get("line")
            .or_else(|| obj.get("point"))
            .and_then(as_line);

        Some(Self {
            price,
            line,
            link: link_of(obj),
            sid: obj.get("sid").and_then(as_text),
        })
    }
}

impl RawBookQuote {
    /// Classify one book's quote: new shape, then old flat shape, then the
    /// legacy `odds` field
    pub fn detect(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let over = obj.get("over").and_then(RawSide::from_value);
        let under = obj.get("under").and_then(RawSide::from_value);
        if over.is_some() || under.is_some() {
            return Some(RawBookQuote::Sided { over, under });
        }

        if let Some(price) = obj.get("price").and_then(as_price) {
            return Some(RawBookQuote::FlatPrice {
                price,
                link: link_of(obj),
            });
        }

        if let Some(odds) = obj.get("odds").and_then(as_price) {
            return Some(RawBookQuote::LegacyOdds {
                odds,
                link: link_of(obj),
            });
        }

        None
    }
}

impl RawPayload {
    /// Classify a payload. Line-keyed when every top-level key is numeric,
    /// book-keyed otherwise. Books whose quote matches no dialect are
    /// dropped with a warning.
    pub fn detect(value: &Value) -> OddsResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            OddsError::UnrecognizedShape(format!("expected an object, got {}", type_name(value)))
        })?;

        // A numeric book id ("365") is not a line: line buckets hold books,
        // never a quote directly.
        let line_keyed = !obj.is_empty()
            && obj
                .iter()
                .all(|(k, v)| parse_line(k).is_some() && RawBookQuote::detect(v).is_none());

        if line_keyed {
            let mut lines = IndexMap::new();
            for (line, books) in obj {
                match books.as_object() {
                    Some(books) => {
                        lines.insert(line.clone(), detect_books(books));
                    }
                    None => warn!("Skipping line {}: expected an object of books", line),
                }
            }
            return Ok(RawPayload::ByLine(lines));
        }

        Ok(RawPayload::ByBook(detect_books(obj)))
    }

    pub fn book_count(&self) -> usize {
        match self {
            RawPayload::ByLine(lines) => lines.values().map(|b| b.len()).sum(),
            RawPayload::ByBook(books) => books.len(),
        }
    }
}

fn detect_books(books: &Map<String, Value>) -> IndexMap<String, RawBookQuote> {
    let mut out = IndexMap::new();
    for (book, quote) in books {
        match RawBookQuote::detect(quote) {
            Some(q) => {
                out.insert(book.clone(), q);
            }
            None => debug!("Skipping {}: no usable price", book),
        }
    }
    out
}

/// Build the canonical line map from a classified payload.
///
/// `fallback_line` places quotes that carry no line of their own (flat and
/// legacy formats, or sides missing `line` in a book-keyed payload).
pub fn normalize(
    payload: &RawPayload,
    fallback_line: Option<f64>,
    last_update: Option<DateTime<Utc>>,
) -> CanonicalLineMap {
    let mut map = CanonicalLineMap::new();

    match payload {
        RawPayload::ByLine(lines) => {
            for (key, books) in lines {
                let Some(bucket_line) = parse_line(key) else {
                    continue;
                };
                for (book, quote) in books {
                    write_quote(&mut map, book, quote, Some(bucket_line), last_update);
                }
            }
        }
        RawPayload::ByBook(books) => {
            for (book, quote) in books {
                write_quote(&mut map, book, quote, fallback_line, last_update);
            }
        }
    }

    map
}

/// Detect and normalize in one step. Unrecognized payloads are logged and
/// yield an empty map.
pub fn normalize_value(
    value: &Value,
    fallback_line: Option<f64>,
    last_update: Option<DateTime<Utc>>,
) -> CanonicalLineMap {
    match RawPayload::detect(value) {
        Ok(payload) => normalize(&payload, fallback_line, last_update),
        Err(e) => {
            warn!("Could not normalize odds payload: {}", e);
            CanonicalLineMap::new()
        }
    }
}

/// Parse and normalize a JSON string, recovering from malformed input with
/// an empty map
pub fn normalize_json(
    raw: &str,
    fallback_line: Option<f64>,
    last_update: Option<DateTime<Utc>>,
) -> CanonicalLineMap {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => normalize_value(&value, fallback_line, last_update),
        Err(e) => {
            warn!("Malformed odds JSON ({} bytes): {}", raw.len(), e);
            CanonicalLineMap::new()
        }
    }
}

fn write_quote(
    map: &mut CanonicalLineMap,
    book: &str,
    quote: &RawBookQuote,
    default_line: Option<f64>,
    last_update: Option<DateTime<Utc>>,
) {
    match quote {
        RawBookQuote::Sided { over, under } => {
            for (side, raw) in [(Side::Over, over), (Side::Under, under)] {
                let Some(raw) = raw else { continue };
                // Each side's own line decides its bucket; books can skew
                // the over and under onto different points.
                let Some(line) = raw.line.or(default_line) else {
                    warn!("Skipping {} {} for {}: no line", book, side, raw.price);
                    continue;
                };
                let outcome = outcome(side, raw.price, line, raw.sid.clone(), raw.link.clone());
                map.insert_side(line, book, side, outcome, last_update);
            }
        }
        RawBookQuote::FlatPrice { price, link } | RawBookQuote::LegacyOdds { odds: price, link } => {
            let Some(line) = default_line else {
                warn!("Skipping flat quote {} for {}: no line", price, book);
                return;
            };
            let outcome = outcome(Side::Over, *price, line, None, link.clone());
            map.insert_side(line, book, Side::Over, outcome, last_update);
        }
    }
}

fn outcome(side: Side, price: i32, line: f64, sid: Option<String>, link: Option<String>) -> Outcome {
    Outcome {
        name: side.outcome_name().to_string(),
        price,
        point: Some(line),
        description: None,
        sid,
        link,
    }
}

/// Accept integer, float or "+120"-style string prices
fn as_price(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).ok()
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && f.abs() <= i32::MAX as f64)
                    .map(|f| f.round() as i32)
            }
        }
        Value::String(s) => s.trim().parse::<i32>().ok(),
        _ => None,
    }
}

fn as_line(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_line(s),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `link`, then `links.desktop` / `links.mobile`, then `over_link`
fn link_of(obj: &Map<String, Value>) -> Option<String> {
    obj.get("link")
        .and_then(as_text)
        .or_else(|| {
            let links = obj.get("links")?.as_object()?;
            links
                .get("desktop")
                .and_then(as_text)
                .or_else(|| links.get("mobile").and_then(as_text))
        })
        .or_else(|| obj.get("over_link").and_then(as_text))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
