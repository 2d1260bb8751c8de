//! Session-length filter applied to merged catalogs

use crate::bgg::Game;

/// Keep games whose maximum play time fits in `session_minutes`
///
/// Games without a reported maximum play time (0) always fit.
pub fn filter_by_time(games: &[Game], session_minutes: u32) -> Vec<Game> {
    games
        .iter()
        .filter(|game| game.max_play_time <= session_minutes)
        .cloned()
        .collect()
}
