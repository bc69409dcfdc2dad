// Tests for crawl orchestration, status tracking and the engine facade

use friendgraph_core::config::Config;
use friendgraph_core::crawl::{CrawlOptions, Orchestrator};
use friendgraph_core::data::Database;
use friendgraph_core::engine::Engine;
use friendgraph_core::error::CoreError;
use friendgraph_core::graph::GraphArtifact;
use friendgraph_core::model::{Depth, Distance, JobStatus};
use friendgraph_core::validate::ProfileVisibility;
use friendgraph_scanner::memory::{MemoryFriendSource, account};
use friendgraph_scanner::{RequestBudget, SteamId, Visibility};
use std::sync::Arc;
use std::time::Duration;

const SEED: &str = "76561198000000000";

fn seed() -> SteamId {
    SteamId::parse(SEED).unwrap()
}

fn test_config() -> Config {
    Config {
        retry_attempts: 2,
        retry_base_delay: Duration::from_millis(1),
        request_spacing: Duration::ZERO,
        ..Config::default()
    }
}

/// SEED has friends 1, 2 and 3 (3 private); 1 knows 4; 2 and 5 are friends.
fn network() -> MemoryFriendSource {
    MemoryFriendSource::new()
        .with_public(&seed(), "seed")
        .with_public(&account(1), "one")
        .with_public(&account(2), "two")
        .with_profile(&account(3), "three", Visibility::Private)
        .with_public(&account(4), "four")
        .with_public(&account(5), "five")
        .with_public(&account(6), "six")
        .with_friendship(&seed(), &account(1))
        .with_friendship(&seed(), &account(2))
        .with_friendship(&seed(), &account(3))
        .with_friendship(&account(1), &account(4))
        .with_friendship(&account(2), &account(5))
        .with_friendship(&account(5), &account(6))
}

fn engine(source: MemoryFriendSource) -> Engine {
    Engine::new(
        Database::open_in_memory().unwrap(),
        Arc::new(source),
        &test_config(),
    )
    .unwrap()
}

fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Orchestrator Tests
// ============================================================================

#[tokio::test]
async fn test_depth_one_crawl_completes() {
    let engine = engine(network());
    let depth = Depth::from_level(2).unwrap();

    let crawl_ids = engine.submit(&ids(&[SEED]), depth).await.unwrap();
    assert_eq!(crawl_ids.len(), 1);

    let job = engine.wait_for(&crawl_ids[0]).await.unwrap();
    assert_eq!(job.state(), JobStatus::Completed);
    // seed plus its two public friends
    assert_eq!(job.users_discovered, 3);
    assert_eq!(job.users_processed, job.users_discovered);
    assert!(job.completed_at.is_some());
    assert!(!job.truncated);
}

#[tokio::test]
async fn test_status_moves_from_pending_to_completed() {
    let db = Database::open_in_memory().unwrap().into_shared();
    let orchestrator = Orchestrator::new(
        db.clone(),
        Arc::new(network()),
        RequestBudget::unlimited(),
        CrawlOptions::from_config(&test_config()),
    );
    let mut finished = orchestrator.subscribe();

    let crawl_ids = orchestrator
        .start_crawl(&[seed()], Depth::new(1).unwrap())
        .unwrap();
    let initial = db.lock().unwrap().get_job(&crawl_ids[0]).unwrap().unwrap();
    assert_eq!(initial.status, JobStatus::Pending);

    finished.changed().await.unwrap();
    let job = orchestrator.wait_for(&crawl_ids[0]).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_repeated_submissions_return_same_id() {
    let source = Arc::new(network());
    let engine = Engine::new(
        Database::open_in_memory().unwrap(),
        source.clone(),
        &test_config(),
    )
    .unwrap();
    let depth = Depth::new(1).unwrap();

    let first = engine.submit(&ids(&[SEED]), depth).await.unwrap();
    engine.wait_for(&first[0]).await.unwrap();
    let requests = source.requests();

    let second = engine.submit(&ids(&[SEED]), depth).await.unwrap();
    assert_eq!(first, second);
    // a known crawl is neither re-validated nor re-crawled
    assert_eq!(source.requests(), requests);
    assert_eq!(
        engine.find_existing(SEED, depth).unwrap(),
        Some(first[0].clone())
    );
    assert_eq!(engine.find_existing(SEED, Depth::new(2).unwrap()).unwrap(), None);
}

#[tokio::test]
async fn test_two_seeds_keep_order() {
    let engine = engine(network());
    let depth = Depth::new(1).unwrap();
    let other = account(5).to_string();

    let crawl_ids = engine
        .submit(&ids(&[SEED, other.as_str()]), depth)
        .await
        .unwrap();
    assert_eq!(crawl_ids.len(), 2);

    assert_eq!(engine.status(&crawl_ids[0]).unwrap().seed, seed());
    assert_eq!(engine.status(&crawl_ids[1]).unwrap().seed, account(5));
}

#[tokio::test]
async fn test_identical_seeds_in_one_request_share_a_job() {
    let engine = engine(network());

    let crawl_ids = engine
        .submit(&ids(&[SEED, SEED]), Depth::new(1).unwrap())
        .await
        .unwrap();
    assert_eq!(crawl_ids[0], crawl_ids[1]);
}

#[tokio::test]
async fn test_submission_validation() {
    let engine = engine(network());
    let depth = Depth::new(1).unwrap();

    assert!(matches!(
        engine.submit(&[], depth).await,
        Err(CoreError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.submit(&ids(&[SEED, SEED, SEED]), depth).await,
        Err(CoreError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.submit(&ids(&["1234"]), depth).await,
        Err(CoreError::InvalidInput(_))
    ));
    let padded = format!(" {}", SEED);
    assert!(matches!(
        engine.submit(&ids(&[padded.as_str()]), depth).await,
        Err(CoreError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.find_existing(&format!("{}\n", SEED), depth),
        Err(CoreError::InvalidInput(_))
    ));

    let private = account(3).to_string();
    assert!(matches!(
        engine.submit(&ids(&[private.as_str()]), depth).await,
        Err(CoreError::PrivateProfile(_))
    ));
}

#[tokio::test]
async fn test_upstream_outage_fails_job_with_partial_progress() {
    // 4 is only reached at depth 2, after the seed level has been stored
    let source = network().with_unavailable(&account(4));
    let engine = engine(source);

    let crawl_ids = engine
        .submit(&ids(&[SEED]), Depth::new(2).unwrap())
        .await
        .unwrap();
    let job = engine.wait_for(&crawl_ids[0]).await.unwrap();

    assert_eq!(job.state(), JobStatus::Failed);
    assert!(job.failure.is_some());
    assert!(job.users_processed >= 1);
    assert!(job.users_processed <= job.users_discovered);
    assert!(engine.crawling_user(&crawl_ids[0]).is_ok());
}

#[tokio::test]
async fn test_failed_crawl_is_not_offered_for_reuse() {
    let source = network().with_unavailable(&account(4));
    let engine = engine(source);
    let depth = Depth::new(2).unwrap();

    let crawl_ids = engine.submit(&ids(&[SEED]), depth).await.unwrap();
    let job = engine.wait_for(&crawl_ids[0]).await.unwrap();
    assert_eq!(job.state(), JobStatus::Failed);

    assert_eq!(engine.find_existing(SEED, depth).unwrap(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_share_one_job() {
    let engine = Arc::new(engine(network()));
    let depth = Depth::new(2).unwrap();

    let handles = (0..16)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.submit(&ids(&[SEED]), depth).await })
        })
        .collect::<Vec<_>>();

    let mut crawl_ids = Vec::new();
    for handle in handles {
        crawl_ids.extend(handle.await.unwrap().unwrap());
    }
    assert_eq!(crawl_ids.len(), 16);
    crawl_ids.sort();
    crawl_ids.dedup();
    assert_eq!(crawl_ids.len(), 1);

    let job = engine.wait_for(&crawl_ids[0]).await.unwrap();
    assert_eq!(job.state(), JobStatus::Completed);
    assert_eq!(engine.database().lock().unwrap().list_jobs().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_job_restarts_under_same_id() {
    let engine = engine(network());
    let depth = Depth::new(1).unwrap();

    let (job, _) = engine
        .database()
        .lock()
        .unwrap()
        .get_or_create_job(&seed(), depth)
        .unwrap();
    engine
        .database()
        .lock()
        .unwrap()
        .fail_job(&job.crawl_id, "interrupted")
        .unwrap();

    let crawl_ids = engine.submit(&ids(&[SEED]), depth).await.unwrap();
    assert_eq!(crawl_ids[0], job.crawl_id);

    let job = engine.wait_for(&crawl_ids[0]).await.unwrap();
    assert_eq!(job.state(), JobStatus::Completed);
}

#[tokio::test]
async fn test_interrupted_jobs_are_failed_on_startup() {
    let mut db = Database::open_in_memory().unwrap();
    let (job, _) = db.get_or_create_job(&seed(), Depth::new(1).unwrap()).unwrap();
    db.mark_running(&job.crawl_id).unwrap();

    let engine = Engine::new(db, Arc::new(network()), &test_config()).unwrap();
    assert_eq!(engine.status(&job.crawl_id).unwrap().state(), JobStatus::Failed);
}

#[tokio::test]
async fn test_fan_out_cap_marks_truncated() {
    let config = Config {
        max_profiles_per_crawl: 2,
        ..test_config()
    };
    let engine = Engine::new(
        Database::open_in_memory().unwrap(),
        Arc::new(network()),
        &config,
    )
    .unwrap();

    let crawl_ids = engine
        .submit(&ids(&[SEED]), Depth::new(2).unwrap())
        .await
        .unwrap();
    let job = engine.wait_for(&crawl_ids[0]).await.unwrap();

    assert_eq!(job.state(), JobStatus::Completed);
    assert!(job.truncated);
    assert_eq!(job.users_discovered, 2);
}

// ============================================================================
// Status Tracker Tests
// ============================================================================

#[tokio::test]
async fn test_unknown_crawl_is_not_found() {
    let engine = engine(network());
    assert!(matches!(engine.status("nope"), Err(CoreError::NotFound(_))));
    assert!(matches!(
        engine.crawling_user("nope"),
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_finished_since_with_advancing_watermark() {
    let engine = engine(network());
    let depth = Depth::new(0).unwrap();

    let mut seen = Vec::new();
    let mut watermark = 0;
    for n in [1, 2, 4] {
        let crawl_ids = engine
            .submit(&ids(&[account(n).as_str()]), depth)
            .await
            .unwrap();
        engine.wait_for(&crawl_ids[0]).await.unwrap();

        for finished in engine.finished_since(watermark).unwrap() {
            watermark = watermark.max(finished.job.completed_at.unwrap());
            assert!(finished.user.is_some());
            seen.push(finished.job.crawl_id);
        }
    }

    assert_eq!(seen.len(), 3);
    let mut unique = seen.clone();
    unique.dedup();
    assert_eq!(unique, seen);
    assert!(engine.finished_since(watermark).unwrap().is_empty());
}

#[tokio::test]
async fn test_crawling_user_is_seed_profile() {
    let engine = engine(network());
    let crawl_ids = engine
        .submit(&ids(&[SEED]), Depth::new(1).unwrap())
        .await
        .unwrap();
    engine.wait_for(&crawl_ids[0]).await.unwrap();

    let user = engine.crawling_user(&crawl_ids[0]).unwrap();
    assert_eq!(user.steam_id, seed());
    assert_eq!(user.persona_name, "seed");
    assert_eq!(user.depth, 0);
}

// ============================================================================
// Graph And Distance Tests
// ============================================================================

#[tokio::test]
async fn test_graph_is_materialized_on_completion() {
    let engine = engine(network());
    let crawl_ids = engine
        .submit(&ids(&[SEED]), Depth::new(2).unwrap())
        .await
        .unwrap();
    engine.wait_for(&crawl_ids[0]).await.unwrap();

    assert!(engine.graph_exists(&crawl_ids[0]).unwrap());
    let first = engine.graph(&crawl_ids[0]).unwrap();
    let second = engine.graph(&crawl_ids[0]).unwrap();
    assert_eq!(first, second);

    let artifact: GraphArtifact = serde_json::from_str(&first).unwrap();
    assert_eq!(artifact.max_level, 3);
    // seed, 1, 2, then 4 and 5
    assert_eq!(artifact.stats.node_count, 5);
    assert_eq!(artifact.stats.per_level, vec![1, 2, 2]);
    assert_eq!(artifact.user.steam_id, seed());
}

#[tokio::test]
async fn test_games_are_stored_with_the_crawl() {
    let source = network()
        .with_game(&seed(), 440, "Team Fortress 2", 120)
        .with_game(&account(1), 440, "Team Fortress 2", 30)
        .with_game(&account(1), 570, "Dota 2", 500);
    let engine = engine(source);

    let crawl_ids = engine
        .submit(&ids(&[SEED]), Depth::new(1).unwrap())
        .await
        .unwrap();
    engine.wait_for(&crawl_ids[0]).await.unwrap();

    let user = engine.crawling_user(&crawl_ids[0]).unwrap();
    assert_eq!(user.games.len(), 1);

    let artifact: GraphArtifact = serde_json::from_str(&engine.graph(&crawl_ids[0]).unwrap()).unwrap();
    let top: Vec<_> = artifact
        .stats
        .top_games
        .iter()
        .map(|g| (g.appid, g.owners))
        .collect();
    assert_eq!(top, vec![(440, 2), (570, 1)]);

    assert_eq!(engine.game_details(570).unwrap().name, "Dota 2");
    assert!(matches!(engine.game_details(1), Err(CoreError::NotFound(_))));
    assert_eq!(engine.games_details(&[570, 440]).unwrap().len(), 2);
    assert!(matches!(
        engine.games_details(&[]),
        Err(CoreError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_stored_profiles_are_broadcast() {
    let engine = engine(network());
    let mut new_users = engine.subscribe_new_users();

    let crawl_ids = engine
        .submit(&ids(&[SEED]), Depth::new(1).unwrap())
        .await
        .unwrap();
    let job = engine.wait_for(&crawl_ids[0]).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = new_users.try_recv() {
        assert_eq!(event.crawl_id, crawl_ids[0]);
        seen.push(event.steam_id);
    }
    assert_eq!(seen.len() as u64, job.users_processed);
    assert_eq!(seen[0], seed());
}

#[tokio::test]
async fn test_visibility_check() {
    let engine = engine(network());

    assert_eq!(
        engine.check_visibility(SEED).await.unwrap(),
        ProfileVisibility::Public
    );
    assert_eq!(
        engine
            .check_visibility(account(3).as_str())
            .await
            .unwrap(),
        ProfileVisibility::Private
    );
    assert!(matches!(
        engine.check_visibility("not-an-id").await,
        Err(CoreError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_shortest_distance_between_two_crawls() {
    let engine = engine(network());
    let depth = Depth::new(1).unwrap();

    // one hop out the two crawls share nobody; two hops out they meet at 2 and 5
    let crawl_ids = engine
        .submit(&ids(&[SEED, account(6).as_str()]), depth)
        .await
        .unwrap();
    for crawl_id in &crawl_ids {
        engine.wait_for(crawl_id).await.unwrap();
    }
    let result = engine.compute_distance(&crawl_ids).unwrap();
    assert_eq!(result.distance, Distance::Unreachable);

    let deeper = engine
        .submit(&ids(&[SEED, account(6).as_str()]), Depth::new(2).unwrap())
        .await
        .unwrap();
    for crawl_id in &deeper {
        engine.wait_for(crawl_id).await.unwrap();
    }
    let result = engine.compute_distance(&deeper).unwrap();
    // SEED - 2 - 5 - 6
    assert_eq!(result.distance, Distance::Hops(3));
    assert_eq!(result.path.len(), 4);

    let reversed = vec![deeper[1].clone(), deeper[0].clone()];
    assert_eq!(engine.get_distance(&reversed).unwrap(), result);
    assert_eq!(engine.distances_since(0).unwrap().len(), 2);
}

#[tokio::test]
async fn test_distance_requires_completed_crawls() {
    let engine = engine(network());
    assert!(matches!(
        engine.compute_distance(&ids(&["a"])),
        Err(CoreError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.compute_distance(&ids(&["a", "b"])),
        Err(CoreError::NotFound(_))
    ));

    let (job, _) = engine
        .database()
        .lock()
        .unwrap()
        .get_or_create_job(&seed(), Depth::new(1).unwrap())
        .unwrap();
    let done = engine
        .submit(&ids(&[account(6).as_str()]), Depth::new(1).unwrap())
        .await
        .unwrap();
    engine.wait_for(&done[0]).await.unwrap();

    assert!(matches!(
        engine.compute_distance(&[job.crawl_id, done[0].clone()]),
        Err(CoreError::NotReady(_))
    ));
}
