use crate::steam::{OwnedGame, PlayerSummary};
use crate::steam_id::SteamId;
use serde::{Deserialize, Serialize};

/// One profile visited by a crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResult {
    pub summary: PlayerSummary,
    /// Hops from the seed.
    pub depth: u8,
    pub discovered_from: Option<SteamId>,
    /// Friend ids as reported upstream. Empty for leaves.
    pub friends: Vec<SteamId>,
    /// False for private profiles, hidden friend lists and the last level.
    pub expanded: bool,
    /// Most played games, empty for private profiles and hidden libraries.
    #[serde(default)]
    pub games: Vec<OwnedGame>,
}

impl ProfileResult {
    pub fn leaf(summary: PlayerSummary, depth: u8, discovered_from: Option<SteamId>) -> Self {
        Self {
            summary,
            depth,
            discovered_from,
            friends: Vec::new(),
            expanded: false,
            games: Vec::new(),
        }
    }

    pub fn steam_id(&self) -> &SteamId {
        &self.summary.steam_id
    }
}

/// Progress notifications, delivered in the order they happen.
///
/// A `Discovered` event for the profiles found while expanding a node always
/// precedes that node's `Processed` event, so a consumer applying events in
/// order never sees more profiles processed than discovered.
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    Discovered { count: usize },
    Processed(ProfileResult),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub seed: SteamId,
    pub max_depth: u8,
    pub profiles_discovered: usize,
    pub profiles_processed: usize,
    pub truncated: bool,
}
