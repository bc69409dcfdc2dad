use crate::config::Config;
use crate::crawl::{CrawlOptions, Orchestrator, lock};
use crate::data::{Database, SharedDatabase};
use crate::error::{CoreError, Result};
use crate::model::{
    CrawlJob, CrawledProfile, Depth, FinishedCrawl, GameInfo, JobStatus, NewUserEvent,
    ShortestDistanceResult,
};
use crate::validate::{ProfileVisibility, Validator};
use crate::{dedup, distance, games, graph, status};
use friendgraph_scanner::{FriendSource, RequestBudget, SteamId};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::info;

/// Everything the HTTP surface needs, behind one handle.
pub struct Engine {
    db: SharedDatabase,
    validator: Validator,
    orchestrator: Orchestrator,
    started: Instant,
}

pub fn parse_steam_id(raw: &str) -> Result<SteamId> {
    Ok(SteamId::parse(raw)?)
}

/// Exactly two crawl ids, as the distance endpoints expect.
fn crawl_pair(crawl_ids: &[String]) -> Result<(&str, &str)> {
    match crawl_ids {
        [first, second] => Ok((first.as_str(), second.as_str())),
        _ => Err(CoreError::InvalidInput(format!(
            "expected two crawl ids, got {}",
            crawl_ids.len()
        ))),
    }
}

impl Engine {
    /// Wraps the store, marking jobs a previous process left unfinished as
    /// failed so they restart on the next request.
    pub fn new(db: Database, source: Arc<dyn FriendSource>, config: &Config) -> Result<Self> {
        Self::with_budget(db, source, config, config.budget())
    }

    pub fn with_budget(
        db: Database,
        source: Arc<dyn FriendSource>,
        config: &Config,
        budget: RequestBudget,
    ) -> Result<Self> {
        let interrupted = db.fail_interrupted_jobs()?;
        if interrupted > 0 {
            info!("Marked {} interrupted crawls as failed", interrupted);
        }

        let db = db.into_shared();
        let validator = Validator::new(source.clone(), budget.clone(), config.retry_policy());
        let orchestrator = Orchestrator::new(
            db.clone(),
            source,
            budget,
            CrawlOptions::from_config(config),
        );

        Ok(Self {
            db,
            validator,
            orchestrator,
            started: Instant::now(),
        })
    }

    pub fn database(&self) -> &SharedDatabase {
        &self.db
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub async fn check_visibility(&self, raw_id: &str) -> Result<ProfileVisibility> {
        let steam_id = parse_steam_id(raw_id)?;
        Ok(self.validator.check_visibility(&steam_id).await)
    }

    pub fn find_existing(&self, raw_id: &str, depth: Depth) -> Result<Option<String>> {
        let steam_id = parse_steam_id(raw_id)?;
        let db = lock(&self.db)?;
        dedup::find_existing(&db, &steam_id, depth)
    }

    /// Validates the seeds and starts (or reuses) one crawl per seed.
    ///
    /// Visibility is only checked for seeds that need a new traversal, so
    /// polling clients re-submitting a known crawl cost no upstream calls.
    pub async fn submit(&self, raw_ids: &[String], depth: Depth) -> Result<Vec<String>> {
        if raw_ids.is_empty() || raw_ids.len() > 2 {
            return Err(CoreError::InvalidInput(format!(
                "expected one or two steam ids, got {}",
                raw_ids.len()
            )));
        }
        let seeds = raw_ids
            .iter()
            .map(|raw| parse_steam_id(raw))
            .collect::<Result<Vec<_>>>()?;

        for seed in &seeds {
            let known = lock(&self.db)?
                .find_job(seed, depth)?
                .is_some_and(|job| job.status != JobStatus::Failed);
            if known {
                continue;
            }
            match self.validator.check_visibility(seed).await {
                ProfileVisibility::Public => {}
                ProfileVisibility::Private => {
                    return Err(CoreError::PrivateProfile(seed.to_string()));
                }
                ProfileVisibility::Unknown => {
                    return Err(CoreError::UpstreamUnavailable(format!(
                        "could not check the visibility of {}",
                        seed
                    )));
                }
            }
        }

        self.orchestrator.start_crawl(&seeds, depth)
    }

    pub async fn wait_for(&self, crawl_id: &str) -> Result<CrawlJob> {
        self.orchestrator.wait_for(crawl_id).await
    }

    pub fn status(&self, crawl_id: &str) -> Result<CrawlJob> {
        let db = lock(&self.db)?;
        status::get_status(&db, crawl_id)
    }

    pub fn finished_since(&self, timestamp: i64) -> Result<Vec<FinishedCrawl>> {
        let db = lock(&self.db)?;
        status::list_finished_since(&db, timestamp)
    }

    pub fn crawling_user(&self, crawl_id: &str) -> Result<CrawledProfile> {
        let db = lock(&self.db)?;
        status::get_crawling_user(&db, crawl_id)
    }

    pub fn graph_exists(&self, crawl_id: &str) -> Result<bool> {
        let db = lock(&self.db)?;
        graph::exists(&db, crawl_id)
    }

    /// Serialized graph artifact, built on first request.
    pub fn graph(&self, crawl_id: &str) -> Result<String> {
        let db = lock(&self.db)?;
        graph::materialize(&db, crawl_id)
    }

    pub fn compute_distance(&self, crawl_ids: &[String]) -> Result<ShortestDistanceResult> {
        let (first, second) = crawl_pair(crawl_ids)?;
        let db = lock(&self.db)?;
        distance::compute(&db, first, second)
    }

    pub fn get_distance(&self, crawl_ids: &[String]) -> Result<ShortestDistanceResult> {
        let (first, second) = crawl_pair(crawl_ids)?;
        let db = lock(&self.db)?;
        distance::get(&db, first, second)
    }

    pub fn distances_since(&self, timestamp: i64) -> Result<Vec<ShortestDistanceResult>> {
        let db = lock(&self.db)?;
        distance::list_finished_since(&db, timestamp)
    }

    pub fn game_details(&self, appid: u32) -> Result<GameInfo> {
        let db = lock(&self.db)?;
        games::game_details(&db, appid)
    }

    pub fn games_details(&self, appids: &[u32]) -> Result<Vec<GameInfo>> {
        let db = lock(&self.db)?;
        games::games_details(&db, appids)
    }

    pub fn subscribe_new_users(&self) -> broadcast::Receiver<NewUserEvent> {
        self.orchestrator.subscribe_new_users()
    }
}
