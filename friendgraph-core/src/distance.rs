use crate::data::Database;
use crate::error::{CoreError, Result};
use crate::graph::{FriendGraph, completed_job};
use crate::model::{CrawlJob, CrawledProfile, Distance, ShortestDistanceResult};
use friendgraph_scanner::SteamId;
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::info;

/// Cache key for a pair of crawls: the same for (a, b) and (b, a).
pub fn pair_key(first: &str, second: &str) -> (String, String) {
    if first <= second {
        (first.to_string(), second.to_string())
    } else {
        (second.to_string(), first.to_string())
    }
}

/// One crawl loaded for path finding.
struct CrawlGraph {
    job: CrawlJob,
    profiles: HashMap<SteamId, CrawledProfile>,
    friends: FriendGraph,
}

impl CrawlGraph {
    fn load(db: &Database, crawl_id: &str) -> Result<Self> {
        let job = completed_job(db, crawl_id)?;
        let profiles = db.get_profiles(crawl_id)?;
        let edges = db.get_edges(crawl_id)?;
        let friends = FriendGraph::build(&profiles, &edges);
        let profiles = profiles
            .into_iter()
            .map(|p| (p.steam_id.clone(), p))
            .collect();
        Ok(Self {
            job,
            profiles,
            friends,
        })
    }

    fn seed_profile(&self) -> Result<CrawledProfile> {
        self.profiles.get(&self.job.seed).cloned().ok_or_else(|| {
            CoreError::NotReady(format!(
                "seed of crawl {} was never processed",
                self.job.crawl_id
            ))
        })
    }

    /// Breadth-first search from the seed: hop count and parent per profile.
    fn hops_from_seed(&self) -> HashMap<SteamId, (u32, Option<SteamId>)> {
        let graph = &self.friends.graph;
        let mut reached: HashMap<SteamId, (u32, Option<SteamId>)> = HashMap::new();
        let Some(&start) = self.friends.index.get(&self.job.seed) else {
            return reached;
        };

        reached.insert(self.job.seed.clone(), (0, None));
        let mut queue: VecDeque<NodeIndex> = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            let current = graph[node].clone();
            let hops = reached[&current].0;

            // neighbours in id order so ties resolve the same way every time
            let mut next: Vec<NodeIndex> = graph.neighbors(node).collect();
            next.sort_by(|a, b| graph[*a].cmp(&graph[*b]));
            for neighbour in next {
                let id = &graph[neighbour];
                if !reached.contains_key(id) {
                    reached.insert(id.clone(), (hops + 1, Some(current.clone())));
                    queue.push_back(neighbour);
                }
            }
        }
        reached
    }
}

/// Walks parent links from `target` back to the seed, returned seed first.
fn path_to(reached: &HashMap<SteamId, (u32, Option<SteamId>)>, target: &SteamId) -> Vec<SteamId> {
    let mut path = vec![target.clone()];
    let mut cursor = target;
    while let Some((_, Some(parent))) = reached.get(cursor) {
        path.push(parent.clone());
        cursor = parent;
    }
    path.reverse();
    path
}

/// Returns the cached distance for the pair, computing and caching it on
/// first use. Both crawls must have completed.
pub fn compute(db: &Database, first: &str, second: &str) -> Result<ShortestDistanceResult> {
    let (first, second) = pair_key(first, second);
    if let Some(payload) = db.get_distance(&first, &second)? {
        return Ok(serde_json::from_str(&payload)?);
    }

    let a = CrawlGraph::load(db, &first)?;
    let b = CrawlGraph::load(db, &second)?;
    let first_user = a.seed_profile()?;
    let second_user = b.seed_profile()?;

    let from_a = a.hops_from_seed();
    let from_b = b.hops_from_seed();

    // the meeting profile minimising the combined hop count, lowest id on ties
    let meeting = from_a
        .iter()
        .filter_map(|(id, (hops_a, _))| from_b.get(id).map(|(hops_b, _)| (hops_a + hops_b, id)))
        .min();

    let (distance, path) = match meeting {
        Some((hops, meeting)) => {
            let mut ids = path_to(&from_a, meeting);
            let mut back = path_to(&from_b, meeting);
            back.pop();
            back.reverse();
            ids.extend(back);

            let path = ids
                .iter()
                .filter_map(|id| a.profiles.get(id).or_else(|| b.profiles.get(id)).cloned())
                .collect();
            (Distance::Hops(hops), path)
        }
        None => (Distance::Unreachable, Vec::new()),
    };

    let span: HashSet<&SteamId> = a.profiles.keys().chain(b.profiles.keys()).collect();

    let computed_at = db.next_distance_timestamp()?;
    let result = ShortestDistanceResult {
        crawl_ids: [first.clone(), second.clone()],
        first_user,
        second_user,
        distance,
        path,
        total_network_span: span.len(),
        computed_at,
    };

    let payload = serde_json::to_string(&result)?;
    let stored = db.store_distance(&first, &second, computed_at, &payload)?;
    info!(
        "Shortest distance between crawls {} and {}: {}",
        first, second, result.distance
    );
    Ok(serde_json::from_str(&stored)?)
}

/// Reads a cached distance without computing anything.
pub fn get(db: &Database, first: &str, second: &str) -> Result<ShortestDistanceResult> {
    let (first, second) = pair_key(first, second);
    let payload = db.get_distance(&first, &second)?.ok_or_else(|| {
        CoreError::NotFound(format!(
            "no shortest distance computed for crawls {} and {}",
            first, second
        ))
    })?;
    Ok(serde_json::from_str(&payload)?)
}

/// Distances computed after `timestamp`, oldest first.
pub fn list_finished_since(db: &Database, timestamp: i64) -> Result<Vec<ShortestDistanceResult>> {
    db.distances_since(timestamp)?
        .iter()
        .map(|payload| serde_json::from_str(payload).map_err(CoreError::from))
        .collect()
}
