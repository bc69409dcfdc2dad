use crate::error::{Result, ScanError};
use crate::steam_id::SteamId;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_STEAM_API_URL: &str = "https://api.steampowered.com";

/// GetPlayerSummaries accepts at most this many ids per call.
pub const MAX_SUMMARY_BATCH: usize = 100;

/// Games kept per profile, most played first.
pub const MAX_GAMES_PER_PROFILE: usize = 40;

/// `communityvisibilitystate` value the Steam API uses for public profiles.
const PUBLIC_VISIBILITY_STATE: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// Account details for one profile, as reported by GetPlayerSummaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub steam_id: SteamId,
    pub persona_name: String,
    pub profile_url: String,
    pub avatar: String,
    pub country_code: Option<String>,
    pub visibility: Visibility,
}

impl PlayerSummary {
    /// Placeholder for an id the upstream API returned nothing for.
    pub fn unreachable(steam_id: SteamId) -> Self {
        Self {
            steam_id,
            persona_name: String::new(),
            profile_url: String::new(),
            avatar: String::new(),
            country_code: None,
            visibility: Visibility::Private,
        }
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

/// A game in a player's library, as reported by GetOwnedGames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedGame {
    pub appid: u32,
    pub name: String,
    /// Total minutes played.
    #[serde(rename = "playtimeforever")]
    pub playtime_forever: u64,
    #[serde(rename = "imgiconurl", default)]
    pub img_icon_url: String,
}

/// The `MAX_GAMES_PER_PROFILE` most played games, ties broken on app id.
pub fn top_games(mut games: Vec<OwnedGame>) -> Vec<OwnedGame> {
    games.sort_by(|a, b| {
        b.playtime_forever
            .cmp(&a.playtime_forever)
            .then(a.appid.cmp(&b.appid))
    });
    games.truncate(MAX_GAMES_PER_PROFILE);
    games
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendList {
    Public(Vec<SteamId>),
    /// The friend list is hidden or the profile does not exist.
    Private,
}

/// Upstream identity provider: profile summaries and friend lists.
#[async_trait]
pub trait FriendSource: Send + Sync {
    /// Summaries for the given ids. Ids unknown upstream are simply absent
    /// from the result.
    async fn player_summaries(&self, steam_ids: &[SteamId]) -> Result<Vec<PlayerSummary>>;

    async fn friend_list(&self, steam_id: &SteamId) -> Result<FriendList>;

    /// The player's library. Hidden libraries come back empty.
    async fn owned_games(&self, steam_id: &SteamId) -> Result<Vec<OwnedGame>>;
}

// Raw Steam Web API payloads

#[derive(Debug, Deserialize)]
struct PlayerSummariesResponse {
    response: PlayersEnvelope,
}

#[derive(Debug, Deserialize)]
struct PlayersEnvelope {
    #[serde(default)]
    players: Vec<RawPlayer>,
}

#[derive(Debug, Deserialize)]
struct RawPlayer {
    steamid: String,
    #[serde(default)]
    communityvisibilitystate: u8,
    #[serde(default)]
    personaname: String,
    #[serde(default)]
    profileurl: String,
    #[serde(default)]
    avatarfull: String,
    loccountrycode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FriendListResponse {
    friendslist: FriendsEnvelope,
}

#[derive(Debug, Deserialize)]
struct FriendsEnvelope {
    #[serde(default)]
    friends: Vec<RawFriend>,
}

#[derive(Debug, Deserialize)]
struct RawFriend {
    steamid: String,
    #[serde(default)]
    relationship: String,
}

#[derive(Debug, Deserialize)]
struct OwnedGamesResponse {
    response: GamesEnvelope,
}

#[derive(Debug, Default, Deserialize)]
struct GamesEnvelope {
    #[serde(default)]
    games: Vec<RawGame>,
}

#[derive(Debug, Deserialize)]
struct RawGame {
    appid: u32,
    #[serde(default)]
    name: String,
    #[serde(default)]
    playtime_forever: u64,
    #[serde(default)]
    img_icon_url: String,
}

impl From<RawGame> for OwnedGame {
    fn from(raw: RawGame) -> Self {
        Self {
            appid: raw.appid,
            name: raw.name,
            playtime_forever: raw.playtime_forever,
            img_icon_url: raw.img_icon_url,
        }
    }
}

impl RawPlayer {
    fn into_summary(self) -> Option<PlayerSummary> {
        let steam_id = SteamId::parse(&self.steamid).ok()?;
        let visibility = if self.communityvisibilitystate == PUBLIC_VISIBILITY_STATE {
            Visibility::Public
        } else {
            Visibility::Private
        };
        Some(PlayerSummary {
            steam_id,
            persona_name: self.personaname,
            profile_url: self.profileurl,
            avatar: self.avatarfull,
            country_code: self.loccountrycode.filter(|c| !c.is_empty()),
            visibility,
        })
    }
}

/// `FriendSource` backed by the Steam Web API.
pub struct SteamApiClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl SteamApiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_STEAM_API_URL, 10)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: &str,
        timeout_secs: u64,
    ) -> Result<Self> {
        // Url::join drops the last path segment unless the base ends in '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = Client::builder()
            .user_agent(concat!("friendgraph/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_max_idle_per_host(20)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", path, e)))
    }

    async fn fetch_summary_batch(&self, batch: &[SteamId]) -> Result<Vec<PlayerSummary>> {
        let ids = batch
            .iter()
            .map(SteamId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let url = self.endpoint("ISteamUser/GetPlayerSummaries/v0002/")?;
        debug!("Fetching {} player summaries", batch.len());

        let response = self
            .client
            .get(url.clone())
            .query(&[("key", self.api_key.as_str()), ("steamids", ids.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Upstream {
                endpoint: url.path().to_string(),
                status: status.as_u16(),
            });
        }

        let body: PlayerSummariesResponse = response.json().await?;
        Ok(body
            .response
            .players
            .into_iter()
            .filter_map(RawPlayer::into_summary)
            .collect())
    }
}

#[async_trait]
impl FriendSource for SteamApiClient {
    async fn player_summaries(&self, steam_ids: &[SteamId]) -> Result<Vec<PlayerSummary>> {
        let mut summaries = Vec::with_capacity(steam_ids.len());
        for batch in steam_ids.chunks(MAX_SUMMARY_BATCH) {
            summaries.extend(self.fetch_summary_batch(batch).await?);
        }
        Ok(summaries)
    }

    async fn friend_list(&self, steam_id: &SteamId) -> Result<FriendList> {
        let url = self.endpoint("ISteamUser/GetFriendList/v0001/")?;
        debug!("Fetching friend list of {}", steam_id);

        let response = self
            .client
            .get(url.clone())
            .query(&[
                ("key", self.api_key.as_str()),
                ("steamid", steam_id.as_str()),
                ("relationship", "friend"),
            ])
            .send()
            .await?;

        match response.status() {
            // Steam answers 401 for hidden friend lists and 404 for unknown ids
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                return Ok(FriendList::Private);
            }
            status if !status.is_success() => {
                return Err(ScanError::Upstream {
                    endpoint: url.path().to_string(),
                    status: status.as_u16(),
                });
            }
            _ => {}
        }

        let body: FriendListResponse = response.json().await?;
        let friends = body
            .friendslist
            .friends
            .into_iter()
            .filter(|f| f.relationship.is_empty() || f.relationship == "friend")
            .filter_map(|f| SteamId::parse(&f.steamid).ok())
            .collect();
        Ok(FriendList::Public(friends))
    }

    async fn owned_games(&self, steam_id: &SteamId) -> Result<Vec<OwnedGame>> {
        let url = self.endpoint("IPlayerService/GetOwnedGames/v0001/")?;
        debug!("Fetching owned games of {}", steam_id);

        let response = self
            .client
            .get(url.clone())
            .query(&[
                ("key", self.api_key.as_str()),
                ("steamid", steam_id.as_str()),
                ("include_appinfo", "1"),
                ("include_played_free_games", "1"),
                ("format", "json"),
            ])
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Ok(Vec::new()),
            status if !status.is_success() => {
                return Err(ScanError::Upstream {
                    endpoint: url.path().to_string(),
                    status: status.as_u16(),
                });
            }
            _ => {}
        }

        // a private library answers with an empty `response` object
        let body: OwnedGamesResponse = response.json().await?;
        Ok(body.response.games.into_iter().map(OwnedGame::from).collect())
    }
}
