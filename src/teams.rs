//! Team-name matching between betslip selections and scheduled games, and
//! team lookup for live-game players.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Nicknames that stand in for the full city + club name on betslips
const TEAM_ALIASES: [(&str, &str); 8] = [
    ("new york mets", "mets"),
    ("texas rangers", "rangers"),
    ("chicago cubs", "cubs"),
    ("houston astros", "astros"),
    ("washington nationals", "nationals"),
    ("minnesota twins", "twins"),
    ("pittsburgh pirates", "pirates"),
    ("chicago white sox", "white sox"),
];

pub fn normalize_team_name(team: &str) -> String {
    let mut name = team
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    for (full, short) in TEAM_ALIASES {
        if name.contains(full) {
            name = name.replacen(full, short, 1);
        }
    }
    name
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledGame {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub commence_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameMatch {
    pub game_id: String,
    pub confidence: f64,
}

/// Minimum confidence for a game to count as matched
pub const GAME_MATCH_FLOOR: f64 = 0.3;

fn side_confidence(selection: &str, game: &str) -> f64 {
    if selection.is_empty() {
        return 0.0;
    }
    let mut confidence = 0.0;
    if game.contains(selection) {
        confidence += 0.5;
    }
    if selection.split(' ').any(|word| game.contains(word)) {
        confidence += 0.2;
    }
    confidence
}

/// Find the game whose teams best match the selection's teams.
///
/// Each side scores 0.5 when the game's team name contains the selection's
/// and 0.2 more when any single word overlaps; the sum is capped at 1.0
/// and must exceed [`GAME_MATCH_FLOOR`]. The first game wins ties.
pub fn find_matching_game(
    away_team: Option<&str>,
    home_team: Option<&str>,
    games: &[ScheduledGame],
) -> Option<GameMatch> {
    let away = away_team.map(normalize_team_name).unwrap_or_default();
    let home = home_team.map(normalize_team_name).unwrap_or_default();
    if away.is_empty() && home.is_empty() {
        return None;
    }

    let mut best: Option<GameMatch> = None;
    for game in games {
        let confidence = (side_confidence(&away, &normalize_team_name(&game.away_team))
            + side_confidence(&home, &normalize_team_name(&game.home_team)))
        .min(1.0);

        let highest = best.as_ref().map_or(0.0, |b| b.confidence);
        if confidence > highest && confidence > GAME_MATCH_FLOOR {
            best = Some(GameMatch {
                game_id: game.id.clone(),
                confidence,
            });
        }
    }

    if best.is_none() {
        debug!("No game matched away={:?} home={:?}", away_team, home_team);
    }
    best
}

/// Ids arrive as numbers from some feeds and strings from others
fn id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatistics {
    #[serde(default)]
    pub team_tricode: Option<String>,
    #[serde(default)]
    pub team_code: Option<String>,
}

/// A player row from a live scoreboard or boxscore feed
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePlayer {
    #[serde(default, deserialize_with = "id_string")]
    pub person_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "id_string")]
    pub team_id: Option<String>,
    #[serde(default)]
    pub team_tricode: Option<String>,
    #[serde(default)]
    pub team_abbreviation: Option<String>,
    #[serde(default)]
    pub statistics: Option<PlayerStatistics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveTeam {
    #[serde(default, deserialize_with = "id_string")]
    pub team_id: Option<String>,
    #[serde(default)]
    pub team_tricode: Option<String>,
    #[serde(default)]
    pub team_code: Option<String>,
    #[serde(default)]
    pub players: Vec<LivePlayer>,
}

impl LiveTeam {
    fn code(&self) -> Option<String> {
        self.team_tricode
            .clone()
            .or_else(|| self.team_code.clone())
            .filter(|c| !c.is_empty())
    }

    fn has_player(&self, person_id: &str) -> bool {
        self.players
            .iter()
            .any(|p| p.person_id.as_deref() == Some(person_id))
    }
}

/// Scoreboard game or boxscore; both carry a home and an away team
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveGame {
    #[serde(default, deserialize_with = "id_string")]
    pub game_id: Option<String>,
    #[serde(default)]
    pub home_team: LiveTeam,
    #[serde(default)]
    pub away_team: LiveTeam,
}

/// Determine a player's team code.
///
/// Direct fields on the player come first, then the game the player is
/// being processed for (by team id), then boxscore rosters (by person id).
pub fn resolve_player_team(
    player: &LivePlayer,
    game: Option<&LiveGame>,
    boxscore: Option<&LiveGame>,
) -> Option<String> {
    let label = player
        .name
        .clone()
        .or_else(|| player.person_id.clone())
        .unwrap_or_else(|| "unknown player".to_string());

    let direct = player
        .team_tricode
        .clone()
        .or_else(|| player.statistics.as_ref().and_then(|s| s.team_tricode.clone()))
        .or_else(|| player.statistics.as_ref().and_then(|s| s.team_code.clone()))
        .or_else(|| player.team_abbreviation.clone())
        .filter(|c| !c.is_empty());
    if direct.is_some() {
        return direct;
    }

    if let (Some(team_id), Some(game)) = (player.team_id.as_deref(), game) {
        for team in [&game.home_team, &game.away_team] {
            if team.team_id.as_deref() == Some(team_id) {
                if let Some(code) = team.code() {
                    debug!("Team for {} found via game team id: {}", label, code);
                    return Some(code);
                }
            }
        }
    }

    if let (Some(person_id), Some(boxscore)) = (player.person_id.as_deref(), boxscore) {
        for team in [&boxscore.home_team, &boxscore.away_team] {
            if team.has_player(person_id) {
                let code = team.code();
                debug!("Team for {} found via boxscore roster: {:?}", label, code);
                return code;
            }
        }
    }

    warn!("Could not determine team for {}", label);
    None
}
