use anyhow::{anyhow, Context, Result};
use std::env;

/// Tunable scores and thresholds for player-name matching.
///
/// The defaults reproduce the production heuristics; regression tests pin
/// behavior against these values rather than against literals in control
/// flow.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    /// Normalized names are identical
    pub exact: f64,
    /// Names match once a generational suffix is dropped on one or both sides
    pub suffix: f64,
    /// First and last names both match
    pub first_last: f64,
    /// Last name matches and first letters agree
    pub last_initial: f64,
    /// One normalized name contains the other
    pub contains: f64,
    /// Minimum score for an outcome to count as the player
    pub accept: f64,
    /// Top score at or above which several close candidates are all returned
    pub multi_match_floor: f64,
    /// Candidates within this distance of the top score count as ties
    pub ambiguity_band: f64,
    /// Treat a first name as matching when either side starts with the
    /// other's first letter. Known to over-match short names; kept on to
    /// match production behavior.
    pub initial_prefix_match: bool,
    /// Trailing words stripped before comparing
    pub suffixes: Vec<String>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            exact: 1.0,
            suffix: 0.95,
            first_last: 0.9,
            last_initial: 0.8,
            contains: 0.6,
            accept: 0.7,
            multi_match_floor: 0.9,
            ambiguity_band: 0.1,
            initial_prefix_match: true,
            suffixes: ["jr", "sr", "ii", "iii", "iv", "v"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// How far a resolved line may drift from the requested one
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineTolerance {
    pub strikeout: f64,
    pub default: f64,
}

impl Default for LineTolerance {
    fn default() -> Self {
        Self {
            strikeout: 1.0,
            default: 0.5,
        }
    }
}

/// Engine tunables bundled for the service layer
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub matching: MatchConfig,
    pub tolerance: LineTolerance,
}

/// Service configuration
#[derive(Clone)]
pub struct Config {
    pub odds_api_key: String,
    pub odds_api_base_url: String,
    pub regions: String,
    pub redis_url: String,
    pub http_port: u16,
    /// Sportsbooks requested from The Odds API
    pub active_sportsbooks: Vec<String>,
    /// Outbound Odds API budget
    pub rate_per_minute: u32,
    pub expansion_cache_ttl_seconds: u64,
    pub engine: EngineConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("odds_api_base_url", &self.odds_api_base_url)
            .field("regions", &self.regions)
            .field("http_port", &self.http_port)
            .field("active_sportsbooks", &self.active_sportsbooks)
            .field("rate_per_minute", &self.rate_per_minute)
            .finish_non_exhaustive()
    }
}

pub const DEFAULT_SPORTSBOOKS: [&str; 6] = [
    "draftkings",
    "fanduel",
    "betmgm",
    "williamhill_us",
    "betrivers",
    "novig",
];

impl Config {
    pub fn from_env() -> Result<Self> {
        // API key: env var first, Docker secret file otherwise
        let odds_api_key = match env::var("THE_ODDS_API_KEY") {
            Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
            Ok(_) => return Err(anyhow!("THE_ODDS_API_KEY is set but empty")),
            Err(_) => read_secret_file("/run/secrets/odds_api_key", "odds_api_key")?,
        };
        validate_api_key(&odds_api_key)?;

        let redis_url = match env::var("REDIS_URL") {
            Ok(v) if !v.trim().is_empty() => v,
            Ok(_) => return Err(anyhow!("REDIS_URL is set but empty")),
            Err(_) => "redis://127.0.0.1:6379".to_string(),
        };

        let active_sportsbooks = env::var("ACTIVE_SPORTSBOOKS")
            .map(|v| parse_list(&v))
            .ok()
            .filter(|books| !books.is_empty())
            .unwrap_or_else(|| DEFAULT_SPORTSBOOKS.iter().map(|s| s.to_string()).collect());

        Ok(Self {
            odds_api_key,
            odds_api_base_url: env::var("ODDS_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.the-odds-api.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            regions: env::var("ODDS_API_REGIONS").unwrap_or_else(|_| "us".to_string()),
            redis_url,
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8083".to_string())
                .parse()
                .unwrap_or(8083),
            active_sportsbooks,
            rate_per_minute: env::var("ODDS_API_RATE_PER_MINUTE")
                .unwrap_or_else(|_| "45".to_string())
                .parse()
                .ok()
                .filter(|v| *v > 0)
                .unwrap_or(45),
            expansion_cache_ttl_seconds: env::var("EXPANSION_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            engine: EngineConfig::default(),
        })
    }
}

/// Prevent accidental use of sample/placeholder keys
fn validate_api_key(key: &str) -> Result<()> {
    let key_lower = key.trim().to_lowercase();
    if key_lower.contains("change_me") || key_lower.contains("your_") || key_lower.starts_with("sample") {
        return Err(anyhow!(
            "THE_ODDS_API_KEY appears to be a placeholder value; replace with your real key"
        ));
    }
    Ok(())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Read a secret from a Docker secret file
fn read_secret_file(file_path: &str, secret_name: &str) -> Result<String> {
    std::fs::read_to_string(file_path)
        .map(|s| s.trim().to_string())
        .context(format!(
            "Secret not configured: set THE_ODDS_API_KEY or mount {} ({})",
            file_path, secret_name
        ))
}
