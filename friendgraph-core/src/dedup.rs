use crate::data::Database;
use crate::error::Result;
use crate::model::{Depth, JobStatus};
use friendgraph_scanner::SteamId;

/// Id of the crawl already recorded for exactly this seed and depth.
///
/// A depth-2 crawl does not stand in for a depth-1 request; only exact
/// matches count. Failed jobs are not reported: their data is partial until
/// a new request re-arms them.
pub fn find_existing(db: &Database, seed: &SteamId, depth: Depth) -> Result<Option<String>> {
    Ok(db
        .find_job(seed, depth)?
        .filter(|job| job.status != JobStatus::Failed)
        .map(|job| job.crawl_id))
}
