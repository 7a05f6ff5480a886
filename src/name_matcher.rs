//! Fuzzy matching of player names against sportsbook outcome descriptions.
//!
//! Sportsbooks disagree on punctuation, generational suffixes and first-name
//! spelling ("Lourdes Gurriel" vs "Lourdes Gurriel Jr.", "Mike" vs
//! "Michael"). Scores are drawn from [`MatchConfig`] so the heuristics can be
//! tuned and pinned by tests.

use crate::config::MatchConfig;
use crate::types::Outcome;
use std::cmp::Ordering;
use tracing::debug;

/// An outcome that matched the requested player
#[derive(Debug, Clone, Copy)]
pub struct PlayerMatch<'a> {
    pub outcome: &'a Outcome,
    pub score: f64,
}

/// Lower-case, drop punctuation, collapse whitespace
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop a trailing generational suffix ("jr", "iii", ...) from a
/// normalized name of two or more words
fn strip_suffix(name: &str, suffixes: &[String]) -> String {
    let words: Vec<&str> = name.split(' ').collect();
    if words.len() >= 2 {
        if let Some(last) = words.last() {
            if suffixes.iter().any(|s| s == last) {
                return words[..words.len() - 1].join(" ");
            }
        }
    }
    name.to_string()
}

/// Score how well `candidate` names the same player as `target`, in `[0, 1]`
pub fn score(target: &str, candidate: &str, config: &MatchConfig) -> f64 {
    let target_norm = normalize_name(target);
    let candidate_norm = normalize_name(candidate);

    if target_norm == candidate_norm {
        return config.exact;
    }
    if target_norm.is_empty() || candidate_norm.is_empty() {
        return 0.0;
    }

    let target_base = strip_suffix(&target_norm, &config.suffixes);
    let candidate_base = strip_suffix(&candidate_norm, &config.suffixes);

    if target_base == candidate_base {
        return config.suffix;
    }
    // "Lourdes Gurriel" vs "Lourdes Gurriel Jr"
    if target_base == candidate_norm || target_norm == candidate_base {
        return config.suffix;
    }

    let target_words: Vec<&str> = target_base.split(' ').collect();
    let candidate_words: Vec<&str> = candidate_base.split(' ').collect();

    if target_words.len() >= 2 && candidate_words.len() >= 2 {
        let target_first = target_words[0];
        let candidate_first = candidate_words[0];
        let target_initial = target_first.chars().next();
        let candidate_initial = candidate_first.chars().next();

        let first_name_match = target_first == candidate_first
            || (config.initial_prefix_match
                && (candidate_initial.map_or(false, |c| target_first.starts_with(c))
                    || target_initial.map_or(false, |c| candidate_first.starts_with(c))));

        let last_name_match = target_words.last() == candidate_words.last();

        if first_name_match && last_name_match {
            return config.first_last;
        }
        if last_name_match && target_initial.is_some() && target_initial == candidate_initial {
            return config.last_initial;
        }
    }

    if target_norm.contains(&candidate_norm) || candidate_norm.contains(&target_norm) {
        return config.contains;
    }

    0.0
}

/// Alternate spellings a sportsbook may use for the same player:
/// straight, "Last First", "F Last", "First L"
pub fn name_variations(player: &str) -> Vec<String> {
    let normalized = normalize_name(player);
    let mut variations = vec![normalized.clone()];

    let parts: Vec<&str> = normalized.split(' ').collect();
    if parts.len() >= 2 {
        let first = parts[0];
        let last = parts[parts.len() - 1];
        variations.push(format!("{} {}", last, first));
        if let Some(initial) = first.chars().next() {
            variations.push(format!("{} {}", initial, last));
        }
        if let Some(initial) = last.chars().next() {
            variations.push(format!("{} {}", first, initial));
        }
    }

    variations
}

/// Best score for `description` over every variation of `player`
pub fn best_variation_score(player: &str, description: &str, config: &MatchConfig) -> f64 {
    name_variations(player)
        .iter()
        .map(|v| score(v, description, config))
        .chain(std::iter::once(score(player, description, config)))
        .fold(0.0, f64::max)
}

/// Every described outcome scored against `player`, best first.
/// The sort is stable so equal scores keep upstream order.
pub fn rank_candidates<'a>(
    player: &str,
    outcomes: impl IntoIterator<Item = &'a Outcome>,
    config: &MatchConfig,
) -> Vec<PlayerMatch<'a>> {
    let mut ranked: Vec<PlayerMatch<'a>> = outcomes
        .into_iter()
        .filter_map(|outcome| {
            let description = outcome.description.as_deref()?;
            Some(PlayerMatch {
                outcome,
                score: best_variation_score(player, description, config),
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked
}

/// Pick the outcomes that belong to `player`.
///
/// Candidates below `accept` are discarded. When the top score clears
/// `multi_match_floor` and several candidates sit within `ambiguity_band`
/// of it (one book listing the same player at several lines), all of them
/// are returned; otherwise only the single best match.
pub fn find_player_outcomes<'a>(
    player: &str,
    outcomes: impl IntoIterator<Item = &'a Outcome>,
    config: &MatchConfig,
) -> Vec<PlayerMatch<'a>> {
    let accepted: Vec<PlayerMatch<'a>> = rank_candidates(player, outcomes, config)
        .into_iter()
        .filter(|m| m.score >= config.accept)
        .collect();

    let Some(best) = accepted.first().copied() else {
        debug!("No confident matches found for player \"{}\"", player);
        return Vec::new();
    };

    let top: Vec<PlayerMatch<'a>> = accepted
        .iter()
        .copied()
        .filter(|m| m.score >= best.score - config.ambiguity_band)
        .collect();

    if best.score >= config.multi_match_floor && top.len() > 1 {
        debug!(
            "Player \"{}\" matched {} high-confidence outcomes (top {:.2})",
            player,
            top.len(),
            best.score
        );
        return top;
    }

    vec![best]
}

/// Closest descriptions for a player that did not match, for diagnostics
pub fn near_misses<'a>(
    player: &str,
    outcomes: impl IntoIterator<Item = &'a Outcome>,
    config: &MatchConfig,
    floor: f64,
) -> Vec<(String, f64)> {
    let mut seen = std::collections::HashSet::new();
    rank_candidates(player, outcomes, config)
        .into_iter()
        .filter(|m| m.score > floor)
        .filter_map(|m| {
            let description = m.outcome.description.clone()?;
            seen.insert(description.clone()).then_some((description, m.score))
        })
        .collect()
}
