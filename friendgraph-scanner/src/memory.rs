//! In-memory `FriendSource` for tests.
//!
//! Holds a fixed friend graph with game libraries and can simulate hidden
//! friend lists, upstream outages and transient failures without any network
//! access.

use crate::error::{Result, ScanError};
use crate::steam::{FriendList, FriendSource, OwnedGame, PlayerSummary, Visibility};
use crate::steam_id::SteamId;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Base of the individual account id range, handy for building fixtures.
pub const ACCOUNT_ID_BASE: u64 = 76561197960265728;

/// `ACCOUNT_ID_BASE + n` as a `SteamId`.
pub fn account(n: u64) -> SteamId {
    SteamId::from_u64(ACCOUNT_ID_BASE + n).expect("account id fits in 17 digits")
}

#[derive(Default)]
pub struct MemoryFriendSource {
    profiles: HashMap<SteamId, PlayerSummary>,
    friendships: HashMap<SteamId, BTreeSet<SteamId>>,
    hidden_friend_lists: HashSet<SteamId>,
    games: HashMap<SteamId, Vec<OwnedGame>>,
    broken_libraries: HashSet<SteamId>,
    unavailable: HashSet<SteamId>,
    flaky: Mutex<HashMap<SteamId, u32>>,
    requests: AtomicUsize,
}

impl MemoryFriendSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, steam_id: &SteamId, name: &str, visibility: Visibility) -> Self {
        self.profiles.insert(
            steam_id.clone(),
            PlayerSummary {
                steam_id: steam_id.clone(),
                persona_name: name.to_string(),
                profile_url: format!("https://steamcommunity.com/profiles/{}/", steam_id),
                avatar: String::new(),
                country_code: None,
                visibility,
            },
        );
        self
    }

    pub fn with_public(self, steam_id: &SteamId, name: &str) -> Self {
        self.with_profile(steam_id, name, Visibility::Public)
    }

    /// Friendship is symmetric, as it is on Steam.
    pub fn with_friendship(mut self, a: &SteamId, b: &SteamId) -> Self {
        self.friendships
            .entry(a.clone())
            .or_default()
            .insert(b.clone());
        self.friendships
            .entry(b.clone())
            .or_default()
            .insert(a.clone());
        self
    }

    /// Adds a game to the profile's library.
    pub fn with_game(mut self, steam_id: &SteamId, appid: u32, name: &str, playtime: u64) -> Self {
        self.games.entry(steam_id.clone()).or_default().push(OwnedGame {
            appid,
            name: name.to_string(),
            playtime_forever: playtime,
            img_icon_url: format!("icon{}", appid),
        });
        self
    }

    /// Public summary, but the friend list cannot be read.
    pub fn with_hidden_friends(mut self, steam_id: &SteamId) -> Self {
        self.hidden_friend_lists.insert(steam_id.clone());
        self
    }

    /// Every request touching this id fails with a 503.
    pub fn with_unavailable(mut self, steam_id: &SteamId) -> Self {
        self.unavailable.insert(steam_id.clone());
        self
    }

    /// Only game library requests for this id fail, always with a 503.
    pub fn with_broken_library(mut self, steam_id: &SteamId) -> Self {
        self.broken_libraries.insert(steam_id.clone());
        self
    }

    /// The first `failures` friend-list requests for this id fail with a 503.
    pub fn with_flaky(self, steam_id: &SteamId, failures: u32) -> Self {
        if let Ok(mut flaky) = self.flaky.lock() {
            flaky.insert(steam_id.clone(), failures);
        }
        self
    }

    /// Total number of upstream calls served so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn outage(endpoint: &str) -> ScanError {
        ScanError::Upstream {
            endpoint: endpoint.to_string(),
            status: 503,
        }
    }

    fn take_flaky_failure(&self, steam_id: &SteamId) -> bool {
        let Ok(mut flaky) = self.flaky.lock() else {
            return false;
        };
        match flaky.get_mut(steam_id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl FriendSource for MemoryFriendSource {
    async fn player_summaries(&self, steam_ids: &[SteamId]) -> Result<Vec<PlayerSummary>> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if steam_ids.iter().any(|id| self.unavailable.contains(id)) {
            return Err(Self::outage("GetPlayerSummaries"));
        }

        Ok(steam_ids
            .iter()
            .filter_map(|id| self.profiles.get(id).cloned())
            .collect())
    }

    async fn friend_list(&self, steam_id: &SteamId) -> Result<FriendList> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.contains(steam_id) || self.take_flaky_failure(steam_id) {
            return Err(Self::outage("GetFriendList"));
        }

        let readable = self
            .profiles
            .get(steam_id)
            .is_some_and(PlayerSummary::is_public)
            && !self.hidden_friend_lists.contains(steam_id);
        if !readable {
            return Ok(FriendList::Private);
        }

        let friends = self
            .friendships
            .get(steam_id)
            .map(|friends| friends.iter().cloned().collect())
            .unwrap_or_default();
        Ok(FriendList::Public(friends))
    }

    async fn owned_games(&self, steam_id: &SteamId) -> Result<Vec<OwnedGame>> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if self.unavailable.contains(steam_id) || self.broken_libraries.contains(steam_id) {
            return Err(Self::outage("GetOwnedGames"));
        }
        if !self.profiles.get(steam_id).is_some_and(PlayerSummary::is_public) {
            return Ok(Vec::new());
        }
        Ok(self.games.get(steam_id).cloned().unwrap_or_default())
    }
}
