use crate::config::Config;
use crate::data::{Database, SharedDatabase};
use crate::error::{CoreError, Result};
use crate::graph;
use crate::model::{CrawlJob, Depth, NewUserEvent};
use friendgraph_scanner::{
    CrawlEvent, CrawlSummary, Crawler, EventCallback, FriendSource, RequestBudget, RetryPolicy,
    SteamId,
};
use std::sync::{Arc, MutexGuard};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

/// Locks the shared store, turning a poisoned lock into an error.
pub fn lock(db: &SharedDatabase) -> Result<MutexGuard<'_, Database>> {
    db.lock()
        .map_err(|_| CoreError::Other("database lock poisoned".to_string()))
}

/// Stored profiles buffered for slow new-user subscribers before they lag.
pub const NEW_USER_CHANNEL_CAPACITY: usize = 1024;

/// Per-crawl traversal limits.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub workers: usize,
    pub max_profiles: usize,
    pub retry: RetryPolicy,
}

impl CrawlOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.workers,
            max_profiles: config.max_profiles_per_crawl,
            retry: config.retry_policy(),
        }
    }
}

/// Starts crawl jobs and runs each traversal as its own task.
///
/// Progress reaches the store through one writer task per job that applies
/// the crawler's events in order, so the job row only ever changes from its
/// own traversal.
pub struct Orchestrator {
    db: SharedDatabase,
    source: Arc<dyn FriendSource>,
    budget: RequestBudget,
    options: CrawlOptions,
    finished: Arc<watch::Sender<u64>>,
    new_users: broadcast::Sender<NewUserEvent>,
}

impl Orchestrator {
    pub fn new(
        db: SharedDatabase,
        source: Arc<dyn FriendSource>,
        budget: RequestBudget,
        options: CrawlOptions,
    ) -> Self {
        let (finished, _) = watch::channel(0);
        let (new_users, _) = broadcast::channel(NEW_USER_CHANNEL_CAPACITY);
        Self {
            db,
            source,
            budget,
            options,
            finished: Arc::new(finished),
            new_users,
        }
    }

    /// Returns one crawl id per seed, in order, reusing existing jobs.
    /// New and re-armed jobs start traversing in the background, so this
    /// must run inside a Tokio runtime.
    pub fn start_crawl(&self, seeds: &[SteamId], depth: Depth) -> Result<Vec<String>> {
        if seeds.is_empty() || seeds.len() > 2 {
            return Err(CoreError::InvalidInput(format!(
                "expected one or two steam ids, got {}",
                seeds.len()
            )));
        }

        let mut crawl_ids = Vec::with_capacity(seeds.len());
        for seed in seeds {
            let (job, origin) = lock(&self.db)?.get_or_create_job(seed, depth)?;
            if origin.needs_traversal() {
                info!(
                    "{:?} crawl {} of {} at depth {}",
                    origin, job.crawl_id, seed, depth
                );
                self.spawn(&job);
            } else {
                debug!("Reusing crawl {} for {}", job.crawl_id, seed);
            }
            crawl_ids.push(job.crawl_id);
        }
        Ok(crawl_ids)
    }

    /// Waits until the job is completed or failed.
    pub async fn wait_for(&self, crawl_id: &str) -> Result<CrawlJob> {
        let mut finished = self.finished.subscribe();
        loop {
            let job = lock(&self.db)?
                .get_job(crawl_id)?
                .ok_or_else(|| CoreError::NotFound(format!("crawl {}", crawl_id)))?;
            if job.status.is_finished() {
                return Ok(job);
            }
            finished
                .changed()
                .await
                .map_err(|_| CoreError::Other("orchestrator shut down".to_string()))?;
        }
    }

    /// Counter bumped every time a job finishes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.finished.subscribe()
    }

    /// Every profile stored from now on, across all crawls.
    pub fn subscribe_new_users(&self) -> broadcast::Receiver<NewUserEvent> {
        self.new_users.subscribe()
    }

    fn spawn(&self, job: &CrawlJob) {
        let crawl_id = job.crawl_id.clone();
        let seed = job.seed.clone();
        let db = self.db.clone();
        let finished = self.finished.clone();

        let (events, receiver) = mpsc::unbounded_channel();
        let writer = tokio::spawn(apply_events(
            db.clone(),
            crawl_id.clone(),
            receiver,
            self.new_users.clone(),
        ));

        let callback: EventCallback = Arc::new(move |event: CrawlEvent| {
            // the writer only stops early on a store error, which fails the job anyway
            let _ = events.send(event);
        });
        let crawler = Crawler::new(self.source.clone())
            .with_max_depth(job.depth.get())
            .with_workers(self.options.workers)
            .with_max_profiles(self.options.max_profiles)
            .with_budget(self.budget.clone())
            .with_retry_policy(self.options.retry.clone())
            .with_event_callback(callback);

        tokio::spawn(async move {
            if let Err(e) = lock(&db).and_then(|db| Ok(db.mark_running(&crawl_id)?)) {
                error!("Could not mark crawl {} running: {}", crawl_id, e);
            }

            let outcome = crawler.crawl(&seed).await;
            // dropping the crawler closes the event channel so the writer drains and exits
            drop(crawler);
            let written = match writer.await {
                Ok(result) => result,
                Err(e) => Err(CoreError::from(e)),
            };

            finish_job(&db, &crawl_id, outcome.map_err(CoreError::from), written);
            finished.send_modify(|count| *count += 1);
        });
    }
}

async fn apply_events(
    db: SharedDatabase,
    crawl_id: String,
    mut events: mpsc::UnboundedReceiver<CrawlEvent>,
    new_users: broadcast::Sender<NewUserEvent>,
) -> Result<()> {
    while let Some(event) = events.recv().await {
        match event {
            CrawlEvent::Discovered { count } => {
                lock(&db)?.record_discovered(&crawl_id, count)?;
            }
            CrawlEvent::Processed(profile) => {
                debug!("Crawl {}: processed {}", crawl_id, profile.steam_id());
                let stored = lock(&db)?.record_profile(&crawl_id, &profile)?;
                // no subscribers is not an error
                let _ = new_users.send(NewUserEvent::new(&crawl_id, &stored));
            }
        }
    }
    Ok(())
}

fn finish_job(
    db: &SharedDatabase,
    crawl_id: &str,
    outcome: Result<CrawlSummary>,
    written: Result<()>,
) {
    let result = match (outcome, written) {
        (Ok(summary), Ok(())) => complete(db, crawl_id, &summary),
        (Err(e), _) | (Ok(_), Err(e)) => {
            error!("Crawl {} failed: {}", crawl_id, e);
            lock(db).and_then(|db| Ok(db.fail_job(crawl_id, &e.to_string())?))
        }
    };

    if let Err(e) = result {
        error!("Could not record the outcome of crawl {}: {}", crawl_id, e);
    }
}

fn complete(db: &SharedDatabase, crawl_id: &str, summary: &CrawlSummary) -> Result<()> {
    let db = lock(db)?;
    db.complete_job(crawl_id, summary.truncated)?;
    info!(
        "Crawl {} of {} completed: {} profiles{}",
        crawl_id,
        summary.seed,
        summary.profiles_processed,
        if summary.truncated { " (truncated)" } else { "" }
    );

    if let Err(e) = graph::materialize(&db, crawl_id) {
        warn!("Could not build the graph for crawl {}: {}", crawl_id, e);
    }
    Ok(())
}
