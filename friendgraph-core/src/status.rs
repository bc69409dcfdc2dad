use crate::data::Database;
use crate::error::{CoreError, Result};
use crate::model::{CrawlJob, CrawledProfile, FinishedCrawl};

pub fn get_status(db: &Database, crawl_id: &str) -> Result<CrawlJob> {
    db.get_job(crawl_id)?
        .ok_or_else(|| CoreError::NotFound(format!("crawl {}", crawl_id)))
}

/// Crawls completed strictly after `timestamp`, oldest first.
///
/// Completion times never repeat, so a poller that passes the largest
/// `completed_at` it has seen gets every completion exactly once.
pub fn list_finished_since(db: &Database, timestamp: i64) -> Result<Vec<FinishedCrawl>> {
    db.finished_jobs_since(timestamp)?
        .into_iter()
        .map(|job| -> Result<FinishedCrawl> {
            let user = db.get_profile(&job.crawl_id, &job.seed)?;
            Ok(FinishedCrawl { job, user })
        })
        .collect()
}

/// The seed profile of a crawl, available once the seed has been processed.
pub fn get_crawling_user(db: &Database, crawl_id: &str) -> Result<CrawledProfile> {
    let job = get_status(db, crawl_id)?;
    db.get_profile(crawl_id, &job.seed)?.ok_or_else(|| {
        CoreError::NotReady(format!("crawl {} has not processed its seed yet", crawl_id))
    })
}
