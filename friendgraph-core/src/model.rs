use crate::error::{CoreError, Result};
use friendgraph_scanner::{OwnedGame, ProfileResult, SteamId, Visibility};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hop limit of a crawl: 0 = the seed only, 1 = friends, 2 = friends of friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Depth(u8);

impl Depth {
    pub const MAX: u8 = 2;

    pub fn new(depth: u8) -> Result<Self> {
        if depth <= Self::MAX {
            Ok(Self(depth))
        } else {
            Err(CoreError::InvalidInput(format!(
                "depth must be between 0 and {}, got {}",
                Self::MAX,
                depth
            )))
        }
    }

    /// Clients speak in levels, which start at 1 for the seed itself.
    pub fn from_level(level: i64) -> Result<Self> {
        if (1..=i64::from(Self::MAX) + 1).contains(&level) {
            Ok(Self((level - 1) as u8))
        } else {
            Err(CoreError::InvalidInput(format!(
                "level must be between 1 and {}, got {}",
                Self::MAX + 1,
                level
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn level(self) -> u8 {
        self.0 + 1
    }
}

impl TryFrom<u8> for Depth {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Depth> for u8 {
    fn from(depth: Depth) -> Self {
        depth.0
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A crawl of one seed profile to a fixed depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlJob {
    pub crawl_id: String,
    pub seed: SteamId,
    pub depth: Depth,
    pub status: JobStatus,
    pub users_discovered: u64,
    pub users_processed: u64,
    pub truncated: bool,
    pub failure: Option<String>,
    /// Milliseconds since the unix epoch.
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

impl CrawlJob {
    /// State as reported to clients.
    ///
    /// Failed is sticky. A job only reads as completed once every discovered
    /// profile has been processed; anything short of that is still running.
    pub fn state(&self) -> JobStatus {
        match self.status {
            JobStatus::Failed => JobStatus::Failed,
            JobStatus::Pending => JobStatus::Pending,
            JobStatus::Completed
                if self.users_processed > 0 && self.users_processed == self.users_discovered =>
            {
                JobStatus::Completed
            }
            _ => JobStatus::Running,
        }
    }
}

/// How `get_or_create_job` satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOrigin {
    Created,
    /// A pending, running or completed job for the same seed and depth.
    Existing,
    /// A failed job, reset to pending under the same id.
    Restarted,
}

impl JobOrigin {
    pub fn needs_traversal(&self) -> bool {
        !matches!(self, JobOrigin::Existing)
    }
}

/// A profile visited by one crawl job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawledProfile {
    #[serde(rename = "steamid")]
    pub steam_id: SteamId,
    #[serde(rename = "personaname")]
    pub persona_name: String,
    #[serde(rename = "profileurl")]
    pub profile_url: String,
    pub avatar: String,
    #[serde(rename = "countrycode")]
    pub country_code: Option<String>,
    pub visibility: Visibility,
    /// Hops from the seed.
    pub depth: u8,
    #[serde(rename = "discoveredfrom")]
    pub discovered_from: Option<SteamId>,
    pub expanded: bool,
    #[serde(rename = "crawltime")]
    pub crawled_at: i64,
    /// Most played games, at most `MAX_GAMES_PER_PROFILE`.
    #[serde(default)]
    pub games: Vec<OwnedGame>,
}

impl CrawledProfile {
    pub fn from_result(result: &ProfileResult, crawled_at: i64) -> Self {
        let summary = &result.summary;
        Self {
            steam_id: summary.steam_id.clone(),
            persona_name: summary.persona_name.clone(),
            profile_url: summary.profile_url.clone(),
            avatar: summary.avatar.clone(),
            country_code: summary.country_code.clone(),
            visibility: summary.visibility,
            depth: result.depth,
            discovered_from: result.discovered_from.clone(),
            expanded: result.expanded,
            crawled_at,
            games: result.games.clone(),
        }
    }
}

/// Broadcast to live subscribers whenever a crawl stores a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUserEvent {
    #[serde(rename = "crawlid")]
    pub crawl_id: String,
    #[serde(rename = "steamid")]
    pub steam_id: SteamId,
    #[serde(rename = "personaname")]
    pub persona_name: String,
    #[serde(rename = "profileurl")]
    pub profile_url: String,
    pub avatar: String,
    #[serde(rename = "countrycode")]
    pub country_code: Option<String>,
    #[serde(rename = "crawltime")]
    pub crawled_at: i64,
}

impl NewUserEvent {
    pub fn new(crawl_id: &str, profile: &CrawledProfile) -> Self {
        Self {
            crawl_id: crawl_id.to_string(),
            steam_id: profile.steam_id.clone(),
            persona_name: profile.persona_name.clone(),
            profile_url: profile.profile_url.clone(),
            avatar: profile.avatar.clone(),
            country_code: profile.country_code.clone(),
            crawled_at: profile.crawled_at,
        }
    }
}

/// A game catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    pub appid: u32,
    pub name: String,
    #[serde(rename = "imgiconurl")]
    pub img_icon_url: String,
}

/// A game ranked by how many profiles of a crawl play it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopGame {
    pub appid: u32,
    pub name: String,
    /// Profiles with the game among their most played.
    pub owners: usize,
    /// Minutes played, summed over those profiles.
    pub playtime: u64,
}

/// A finished crawl together with its seed profile.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedCrawl {
    pub job: CrawlJob,
    pub user: Option<CrawledProfile>,
}

/// Hop count between two profiles, or no connection at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    Hops(u32),
    Unreachable,
}

const UNREACHABLE: &str = "unreachable";

impl Serialize for Distance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Distance::Hops(hops) => serializer.serialize_u32(*hops),
            Distance::Unreachable => serializer.serialize_str(UNREACHABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Distance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Hops(u32),
            Label(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Hops(hops) => Ok(Distance::Hops(hops)),
            Repr::Label(label) if label == UNREACHABLE => Ok(Distance::Unreachable),
            Repr::Label(label) => Err(de::Error::invalid_value(
                de::Unexpected::Str(&label),
                &"a hop count or \"unreachable\"",
            )),
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Hops(hops) => write!(f, "{}", hops),
            Distance::Unreachable => f.write_str(UNREACHABLE),
        }
    }
}

/// Shortest friend-distance between the seeds of two completed crawls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortestDistanceResult {
    /// Ordered so the pair reads the same regardless of request order.
    #[serde(rename = "crawlids")]
    pub crawl_ids: [String; 2],
    #[serde(rename = "firstuser")]
    pub first_user: CrawledProfile,
    #[serde(rename = "seconduser")]
    pub second_user: CrawledProfile,
    pub distance: Distance,
    /// Profiles from the first seed to the second. Empty when unreachable.
    #[serde(rename = "shortestdistance")]
    pub path: Vec<CrawledProfile>,
    /// Distinct profiles across both crawls.
    #[serde(rename = "totalnetworkspan")]
    pub total_network_span: usize,
    #[serde(rename = "timecomputed")]
    pub computed_at: i64,
}
