//! Sportsbook identifiers.
//!
//! Betslips, cached blobs and The Odds API all spell books differently.
//! Everything is keyed by the Odds API bookmaker key internally.

/// Map a sportsbook name or alias to its standard id.
/// Unknown names pass through lower-cased and trimmed.
pub fn standardize_id(name: &str) -> String {
    let normalized = name.trim().to_lowercase();
    if normalized.is_empty() {
        return "unknown".to_string();
    }

    let id = match normalized.as_str() {
        "draftkings" | "dk" | "draft kings" | "draft_kings" => "draftkings",
        "fanduel" | "fan duel" | "fd" => "fanduel",
        "betmgm" | "bet mgm" | "mgm" => "betmgm",
        "caesars" | "caesar" | "williamhill" | "william hill" | "wh" | "williamhill_us" => {
            "williamhill_us"
        }
        "espn bet" | "espnbet" | "espn" | "espn_bet" => "espnbet",
        "hardrockbet" | "hard rock bet" | "hardrock" | "hard rock" | "hard_rock" => "hardrockbet",
        "fanatics" | "fanatics sportsbook" => "fanatics",
        "betrivers" | "bet rivers" | "rivers" | "bet_rivers" => "betrivers",
        "novig" | "no vig" => "novig",
        "pinnacle" | "pin" => "pinnacle",
        "bally bet" | "ballybet" | "bally" | "bally_bet" => "ballybet",
        "bet365" | "365" => "bet365",
        "superbook" | "super" => "superbook",
        "pointsbet" | "points bet" => "pointsbetus",
        "wynn" | "wynnbet" => "wynnbet",
        "unibet" | "uni" => "unibet_us",
        _ => return normalized,
    };
    id.to_string()
}

/// Human-readable name for a book id or alias
pub fn display_name(name: &str) -> String {
    let display = match standardize_id(name).as_str() {
        "draftkings" => "DraftKings",
        "fanduel" => "FanDuel",
        "betmgm" => "BetMGM",
        "williamhill_us" => "Caesars",
        "espnbet" => "ESPN BET",
        "hardrockbet" => "Hard Rock Bet",
        "fanatics" => "Fanatics",
        "betrivers" => "BetRivers",
        "novig" => "Novig",
        "pinnacle" => "Pinnacle",
        "ballybet" => "Bally Bet",
        "bet365" => "bet365",
        "superbook" => "SuperBook",
        "pointsbetus" => "PointsBet",
        "wynnbet" => "WynnBET",
        "unibet_us" => "Unibet",
        "unknown" => "Unknown",
        _ => return name.trim().to_string(),
    };
    display.to_string()
}
