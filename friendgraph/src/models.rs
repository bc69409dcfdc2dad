use friendgraph_core::model::{
    CrawlJob, CrawledProfile, FinishedCrawl, GameInfo, JobStatus, ShortestDistanceResult,
};
use friendgraph_scanner::SteamId;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

pub const SUCCESS: &str = "success";

// Request bodies

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelSteamIdInput {
    pub level: i64,
    pub steamid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlInput {
    pub level: i64,
    pub steamids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlIdsInput {
    pub crawlids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameIdsInput {
    pub gameids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampQuery {
    pub timestamp: i64,
}

// Responses

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: String,
    pub message: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: SUCCESS.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResponse {
    pub status: String,
    pub crawlids: Vec<String>,
}

/// A crawl job as the browser client polls it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlingStatus {
    pub crawlid: String,
    pub originalcrawltarget: SteamId,
    pub maxlevel: u8,
    pub totaluserstocrawl: u64,
    pub userscrawled: u64,
    pub state: JobStatus,
    pub truncated: bool,
    pub timestarted: i64,
    pub timefinished: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub failure: Option<String>,
}

impl From<CrawlJob> for CrawlingStatus {
    fn from(job: CrawlJob) -> Self {
        let state = job.state();
        Self {
            crawlid: job.crawl_id,
            originalcrawltarget: job.seed,
            maxlevel: job.depth.level(),
            totaluserstocrawl: job.users_discovered,
            userscrawled: job.users_processed,
            state,
            truncated: job.truncated,
            timestarted: job.started_at,
            timefinished: job.completed_at,
            failure: job.failure,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlingStatusResponse {
    pub status: String,
    pub crawlingstatus: CrawlingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishedCrawlEntry {
    pub crawlingstatus: CrawlingStatus,
    pub user: Option<CrawledProfile>,
}

impl From<FinishedCrawl> for FinishedCrawlEntry {
    fn from(finished: FinishedCrawl) -> Self {
        Self {
            crawlingstatus: finished.job.into(),
            user: finished.user,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishedCrawlsResponse {
    pub status: String,
    pub crawls: Vec<FinishedCrawlEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishedDistancesResponse {
    pub status: String,
    pub crawlingstatus: Vec<ShortestDistanceResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub status: String,
    pub exists: String,
}

impl ExistsResponse {
    pub fn new(exists: bool) -> Self {
        Self {
            status: SUCCESS.to_string(),
            exists: if exists { "yes" } else { "no" }.to_string(),
        }
    }
}

/// Carries the stored artifact through unchanged, byte for byte.
#[derive(Debug, Serialize)]
pub struct GraphDataResponse {
    pub status: String,
    pub usergraphdata: Box<RawValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortestDistanceResponse {
    pub status: String,
    pub shortestdistanceinfo: ShortestDistanceResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub status: String,
    pub user: CrawledProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameDetailsResponse {
    pub status: String,
    pub game: GameInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamesDetailsResponse {
    pub status: String,
    pub games: Vec<GameInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Seconds since the server started.
    pub uptime: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub error: String,
}
