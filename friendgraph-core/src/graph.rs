use crate::data::Database;
use crate::error::{CoreError, Result};
use crate::games;
use crate::model::{CrawlJob, CrawledProfile, JobStatus, TopGame};
use friendgraph_scanner::SteamId;
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// The processed friend graph of one completed crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphArtifact {
    #[serde(rename = "crawlid")]
    pub crawl_id: String,
    #[serde(rename = "maxlevel")]
    pub max_level: u8,
    pub truncated: bool,
    pub user: CrawledProfile,
    /// Sorted by hops from the seed, then steam id.
    pub nodes: Vec<CrawledProfile>,
    /// Friendship pairs, smaller id first, sorted.
    pub edges: Vec<[SteamId; 2]>,
    pub stats: GraphStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    #[serde(rename = "nodecount")]
    pub node_count: usize,
    #[serde(rename = "edgecount")]
    pub edge_count: usize,
    /// Profile count at each hop distance, starting with the seed.
    #[serde(rename = "perlevel")]
    pub per_level: Vec<usize>,
    pub components: usize,
    /// Most common games among the crawled profiles.
    #[serde(rename = "topgames", default)]
    pub top_games: Vec<TopGame>,
}

/// Crawl profiles as an undirected petgraph plus an id lookup.
pub struct FriendGraph {
    pub graph: UnGraph<SteamId, ()>,
    pub index: HashMap<SteamId, NodeIndex>,
}

impl FriendGraph {
    pub fn build(profiles: &[CrawledProfile], edges: &[(SteamId, SteamId)]) -> Self {
        let mut graph = UnGraph::with_capacity(profiles.len(), edges.len());
        let mut index = HashMap::with_capacity(profiles.len());
        for profile in profiles {
            index.insert(
                profile.steam_id.clone(),
                graph.add_node(profile.steam_id.clone()),
            );
        }
        for (source, target) in edges {
            if let (Some(&a), Some(&b)) = (index.get(source), index.get(target)) {
                graph.add_edge(a, b, ());
            }
        }
        Self { graph, index }
    }
}

/// Loads a job and insists it has completed.
pub(crate) fn completed_job(db: &Database, crawl_id: &str) -> Result<CrawlJob> {
    let job = db
        .get_job(crawl_id)?
        .ok_or_else(|| CoreError::NotFound(format!("crawl {}", crawl_id)))?;
    if job.state() != JobStatus::Completed {
        return Err(CoreError::NotReady(format!(
            "crawl {} is {}",
            crawl_id,
            job.state()
        )));
    }
    Ok(job)
}

pub fn exists(db: &Database, crawl_id: &str) -> Result<bool> {
    Ok(db.has_artifact(crawl_id)?)
}

/// Returns the serialized graph of a completed crawl, building and storing
/// it on first use. Later calls return the stored bytes unchanged.
pub fn materialize(db: &Database, crawl_id: &str) -> Result<String> {
    if let Some(payload) = db.get_artifact(crawl_id)? {
        return Ok(payload);
    }

    let job = completed_job(db, crawl_id)?;
    let artifact = build_artifact(db, &job)?;
    let payload = serde_json::to_string(&artifact)?;
    let stored = db.store_artifact(crawl_id, &payload)?;

    info!(
        "Materialized graph for crawl {}: {} nodes, {} edges",
        crawl_id, artifact.stats.node_count, artifact.stats.edge_count
    );
    Ok(stored)
}

fn build_artifact(db: &Database, job: &CrawlJob) -> Result<GraphArtifact> {
    let nodes = db.get_profiles(&job.crawl_id)?;
    let edges = db.get_edges(&job.crawl_id)?;

    let user = nodes
        .iter()
        .find(|p| p.steam_id == job.seed)
        .cloned()
        .ok_or_else(|| {
            CoreError::NotReady(format!("seed of crawl {} was never processed", job.crawl_id))
        })?;

    let friend_graph = FriendGraph::build(&nodes, &edges);

    let mut per_level = vec![0usize; usize::from(job.depth.get()) + 1];
    for node in &nodes {
        if let Some(count) = per_level.get_mut(usize::from(node.depth)) {
            *count += 1;
        }
    }

    let stats = GraphStats {
        node_count: friend_graph.graph.node_count(),
        edge_count: friend_graph.graph.edge_count(),
        per_level,
        components: connected_components(&friend_graph.graph),
        top_games: games::top_games(&nodes),
    };

    Ok(GraphArtifact {
        crawl_id: job.crawl_id.clone(),
        max_level: job.depth.level(),
        truncated: job.truncated,
        user,
        nodes,
        edges: edges.into_iter().map(|(a, b)| [a, b]).collect(),
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Depth;
    use friendgraph_scanner::{OwnedGame, PlayerSummary, ProfileResult, Visibility};

    fn id(n: u64) -> SteamId {
        SteamId::from_u64(76561198000000000 + n).unwrap()
    }

    fn profile(n: u64, depth: u8, friends: &[u64]) -> ProfileResult {
        ProfileResult {
            summary: PlayerSummary {
                steam_id: id(n),
                persona_name: format!("user{}", n),
                profile_url: String::new(),
                avatar: String::new(),
                country_code: None,
                visibility: Visibility::Public,
            },
            depth,
            discovered_from: (depth > 0).then(|| id(0)),
            friends: friends.iter().map(|&f| id(f)).collect(),
            expanded: !friends.is_empty(),
            games: Vec::new(),
        }
    }

    /// seed 0 with friends 1 and 2; 2 also lists 9, which was never crawled
    fn completed_crawl(db: &mut Database) -> String {
        let (job, _) = db.get_or_create_job(&id(0), Depth::new(1).unwrap()).unwrap();
        db.record_discovered(&job.crawl_id, 3).unwrap();
        let mut seed = profile(0, 0, &[1, 2]);
        seed.games = vec![OwnedGame {
            appid: 440,
            name: "Team Fortress 2".to_string(),
            playtime_forever: 60,
            img_icon_url: String::new(),
        }];
        db.record_profile(&job.crawl_id, &seed).unwrap();
        db.record_profile(&job.crawl_id, &profile(2, 1, &[0, 9])).unwrap();
        db.record_profile(&job.crawl_id, &profile(1, 1, &[])).unwrap();
        db.complete_job(&job.crawl_id, false).unwrap();
        job.crawl_id
    }

    #[test]
    fn test_materialize_requires_completion() {
        let mut db = Database::open_in_memory().unwrap();
        let (job, _) = db.get_or_create_job(&id(0), Depth::new(1).unwrap()).unwrap();

        assert!(matches!(
            materialize(&db, &job.crawl_id),
            Err(CoreError::NotReady(_))
        ));
        assert!(matches!(
            materialize(&db, "missing"),
            Err(CoreError::NotFound(_))
        ));
        assert!(!exists(&db, &job.crawl_id).unwrap());
    }

    #[test]
    fn test_artifact_contents() {
        let mut db = Database::open_in_memory().unwrap();
        let crawl_id = completed_crawl(&mut db);

        let payload = materialize(&db, &crawl_id).unwrap();
        let artifact: GraphArtifact = serde_json::from_str(&payload).unwrap();

        assert_eq!(artifact.max_level, 2);
        assert_eq!(artifact.user.steam_id, id(0));
        let order: Vec<_> = artifact.nodes.iter().map(|n| n.steam_id.clone()).collect();
        assert_eq!(order, vec![id(0), id(1), id(2)]);
        assert_eq!(artifact.edges, vec![[id(0), id(1)], [id(0), id(2)]]);
        assert_eq!(artifact.stats.per_level, vec![1, 2]);
        assert_eq!(artifact.stats.components, 1);
        assert_eq!(artifact.user.games.len(), 1);
        assert_eq!(artifact.stats.top_games.len(), 1);
        assert_eq!(artifact.stats.top_games[0].appid, 440);
        assert_eq!(artifact.stats.top_games[0].owners, 1);
        assert!(payload.contains("\"topgames\""));
        assert!(exists(&db, &crawl_id).unwrap());
    }

    #[test]
    fn test_materialize_is_byte_identical() {
        let mut db = Database::open_in_memory().unwrap();
        let crawl_id = completed_crawl(&mut db);

        let first = materialize(&db, &crawl_id).unwrap();
        let second = materialize(&db, &crawl_id).unwrap();
        assert_eq!(first, second);
    }
}
