use crate::data::Database;
use crate::error::{CoreError, Result};
use crate::model::{CrawledProfile, GameInfo, TopGame};
use std::collections::HashMap;

/// Games listed in a graph's stats.
pub const TOP_GAMES: usize = 10;

/// Most ids a single details lookup accepts.
pub const MAX_GAME_DETAILS: usize = 20;

pub fn game_details(db: &Database, appid: u32) -> Result<GameInfo> {
    db.get_game(appid)?
        .ok_or_else(|| CoreError::NotFound(format!("game {}", appid)))
}

/// Catalogue entries for 1 to `MAX_GAME_DETAILS` ids, in request order.
/// Ids no crawl has seen are left out.
pub fn games_details(db: &Database, appids: &[u32]) -> Result<Vec<GameInfo>> {
    if appids.is_empty() || appids.len() > MAX_GAME_DETAILS {
        return Err(CoreError::InvalidInput(format!(
            "expected between 1 and {} game ids, got {}",
            MAX_GAME_DETAILS,
            appids.len()
        )));
    }
    Ok(db.get_games(appids)?)
}

/// The `TOP_GAMES` games most common among the profiles' most played
/// games. Ties go to the larger total playtime, then the smaller app id.
pub fn top_games(profiles: &[CrawledProfile]) -> Vec<TopGame> {
    let mut tally: HashMap<u32, TopGame> = HashMap::new();
    for game in profiles.iter().flat_map(|p| &p.games) {
        let entry = tally.entry(game.appid).or_insert_with(|| TopGame {
            appid: game.appid,
            name: game.name.clone(),
            owners: 0,
            playtime: 0,
        });
        entry.owners += 1;
        entry.playtime += game.playtime_forever;
    }

    let mut ranked: Vec<TopGame> = tally.into_values().collect();
    ranked.sort_by(|a, b| {
        b.owners
            .cmp(&a.owners)
            .then(b.playtime.cmp(&a.playtime))
            .then(a.appid.cmp(&b.appid))
    });
    ranked.truncate(TOP_GAMES);
    ranked
}
