// Tests for database functionality

use friendgraph_core::data::Database;
use friendgraph_core::model::{Depth, JobOrigin, JobStatus};
use friendgraph_scanner::{OwnedGame, PlayerSummary, ProfileResult, SteamId, Visibility};
use tempfile::TempDir;

fn create_test_db() -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::new(&db_path).unwrap();
    (temp_dir, db)
}

fn id(n: u64) -> SteamId {
    SteamId::from_u64(76561198000000000 + n).unwrap()
}

fn depth(d: u8) -> Depth {
    Depth::new(d).unwrap()
}

fn game(appid: u32, name: &str, playtime: u64) -> OwnedGame {
    OwnedGame {
        appid,
        name: name.to_string(),
        playtime_forever: playtime,
        img_icon_url: format!("icon{}", appid),
    }
}

fn profile(n: u64, hops: u8, friends: &[u64]) -> ProfileResult {
    ProfileResult {
        summary: PlayerSummary {
            steam_id: id(n),
            persona_name: format!("player {}", n),
            profile_url: format!("https://steamcommunity.com/profiles/{}/", id(n)),
            avatar: "https://avatars.example/full.jpg".to_string(),
            country_code: Some("SE".to_string()),
            visibility: Visibility::Public,
        },
        depth: hops,
        discovered_from: (hops > 0).then(|| id(0)),
        friends: friends.iter().map(|&f| id(f)).collect(),
        expanded: !friends.is_empty(),
        games: Vec::new(),
    }
}

// ============================================================================
// Database Creation Tests
// ============================================================================

#[test]
fn test_database_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let db = Database::new(&db_path);
    assert!(db.is_ok());
    assert!(db_path.exists());
}

#[test]
fn test_database_remove() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let _db = Database::new(&db_path).unwrap();
        assert!(Database::exists(&db_path));
    }

    Database::remove(&db_path).unwrap();
    assert!(!Database::exists(&db_path));
}

#[test]
fn test_reopen_keeps_jobs() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let crawl_id = {
        let mut db = Database::new(&db_path).unwrap();
        db.get_or_create_job(&id(0), depth(1)).unwrap().0.crawl_id
    };

    let db = Database::new(&db_path).unwrap();
    assert!(db.get_job(&crawl_id).unwrap().is_some());
}

// ============================================================================
// Job Tests
// ============================================================================

#[test]
fn test_create_job() {
    let (_temp_dir, mut db) = create_test_db();

    let (job, origin) = db.get_or_create_job(&id(0), depth(1)).unwrap();

    assert_eq!(origin, JobOrigin::Created);
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.seed, id(0));
    assert_eq!(job.users_discovered, 0);
    assert!(uuid::Uuid::parse_str(&job.crawl_id).is_ok());
}

#[test]
fn test_same_seed_and_depth_reuses_job() {
    let (_temp_dir, mut db) = create_test_db();

    let (first, _) = db.get_or_create_job(&id(0), depth(1)).unwrap();
    let (second, origin) = db.get_or_create_job(&id(0), depth(1)).unwrap();

    assert_eq!(origin, JobOrigin::Existing);
    assert_eq!(first.crawl_id, second.crawl_id);
    assert_eq!(db.list_jobs().unwrap().len(), 1);
}

#[test]
fn test_different_depth_is_a_different_job() {
    let (_temp_dir, mut db) = create_test_db();

    let (shallow, _) = db.get_or_create_job(&id(0), depth(1)).unwrap();
    let (deep, origin) = db.get_or_create_job(&id(0), depth(2)).unwrap();

    assert_eq!(origin, JobOrigin::Created);
    assert_ne!(shallow.crawl_id, deep.crawl_id);
}

#[test]
fn test_failed_job_is_rearmed_in_place() {
    let (_temp_dir, mut db) = create_test_db();

    let (job, _) = db.get_or_create_job(&id(0), depth(1)).unwrap();
    db.record_discovered(&job.crawl_id, 2).unwrap();
    db.record_profile(&job.crawl_id, &profile(0, 0, &[1])).unwrap();
    db.fail_job(&job.crawl_id, "upstream down").unwrap();

    let (again, origin) = db.get_or_create_job(&id(0), depth(1)).unwrap();

    assert_eq!(origin, JobOrigin::Restarted);
    assert_eq!(again.crawl_id, job.crawl_id);
    assert_eq!(again.status, JobStatus::Pending);
    assert_eq!(again.users_discovered, 0);
    assert_eq!(again.users_processed, 0);
    assert!(again.failure.is_none());
    assert!(db.get_profiles(&job.crawl_id).unwrap().is_empty());
}

#[test]
fn test_rearm_clears_profile_games_but_keeps_catalogue() {
    let (_temp_dir, mut db) = create_test_db();

    let (job, _) = db.get_or_create_job(&id(0), depth(1)).unwrap();
    db.record_discovered(&job.crawl_id, 1).unwrap();
    let mut seed = profile(0, 0, &[]);
    seed.games = vec![game(440, "Team Fortress 2", 10)];
    db.record_profile(&job.crawl_id, &seed).unwrap();
    db.fail_job(&job.crawl_id, "upstream down").unwrap();

    db.get_or_create_job(&id(0), depth(1)).unwrap();

    let owned: i64 = db
        .get_connection()
        .query_row(
            "SELECT COUNT(*) FROM crawl_profile_games WHERE crawl_id = ?1",
            [&job.crawl_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(owned, 0);
    assert!(db.get_game(440).unwrap().is_some());
}

#[test]
fn test_progress_counters() {
    let (_temp_dir, mut db) = create_test_db();

    let (job, _) = db.get_or_create_job(&id(0), depth(1)).unwrap();
    db.mark_running(&job.crawl_id).unwrap();
    db.record_discovered(&job.crawl_id, 1).unwrap();
    db.record_discovered(&job.crawl_id, 2).unwrap();
    db.record_profile(&job.crawl_id, &profile(0, 0, &[1, 2])).unwrap();

    let job = db.get_job(&job.crawl_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.users_discovered, 3);
    assert_eq!(job.users_processed, 1);
}

#[test]
fn test_processed_cannot_exceed_discovered() {
    let (_temp_dir, mut db) = create_test_db();

    let (job, _) = db.get_or_create_job(&id(0), depth(1)).unwrap();
    let result = db.record_profile(&job.crawl_id, &profile(0, 0, &[]));

    assert!(result.is_err());
    let job = db.get_job(&job.crawl_id).unwrap().unwrap();
    assert_eq!(job.users_processed, 0);
    assert!(db.get_profiles(&job.crawl_id).unwrap().is_empty());
}

#[test]
fn test_fail_interrupted_jobs() {
    let (_temp_dir, mut db) = create_test_db();

    let (pending, _) = db.get_or_create_job(&id(0), depth(0)).unwrap();
    let (running, _) = db.get_or_create_job(&id(1), depth(0)).unwrap();
    let (done, _) = db.get_or_create_job(&id(2), depth(0)).unwrap();
    db.mark_running(&running.crawl_id).unwrap();
    db.record_discovered(&done.crawl_id, 1).unwrap();
    db.record_profile(&done.crawl_id, &profile(2, 0, &[])).unwrap();
    db.complete_job(&done.crawl_id, false).unwrap();

    assert_eq!(db.fail_interrupted_jobs().unwrap(), 2);

    for crawl_id in [&pending.crawl_id, &running.crawl_id] {
        let job = db.get_job(crawl_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure.as_deref(), Some("interrupted"));
    }
    let done = db.get_job(&done.crawl_id).unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
}

// ============================================================================
// Completion Watermark Tests
// ============================================================================

#[test]
fn test_completion_timestamps_strictly_increase() {
    let (_temp_dir, mut db) = create_test_db();

    let mut stamps = Vec::new();
    for n in 0..5 {
        let (job, _) = db.get_or_create_job(&id(n), depth(0)).unwrap();
        db.record_discovered(&job.crawl_id, 1).unwrap();
        db.record_profile(&job.crawl_id, &profile(n, 0, &[])).unwrap();
        stamps.push(db.complete_job(&job.crawl_id, false).unwrap());
    }

    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_finished_since_watermark() {
    let (_temp_dir, mut db) = create_test_db();

    let mut completed = Vec::new();
    for n in 0..3 {
        let (job, _) = db.get_or_create_job(&id(n), depth(0)).unwrap();
        db.record_discovered(&job.crawl_id, 1).unwrap();
        db.record_profile(&job.crawl_id, &profile(n, 0, &[])).unwrap();
        let at = db.complete_job(&job.crawl_id, false).unwrap();
        completed.push((job.crawl_id, at));
    }
    let (failed, _) = db.get_or_create_job(&id(9), depth(0)).unwrap();
    db.fail_job(&failed.crawl_id, "boom").unwrap();

    let all = db.finished_jobs_since(0).unwrap();
    let ids: Vec<_> = all.iter().map(|j| j.crawl_id.clone()).collect();
    let expected: Vec<_> = completed.iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(ids, expected);

    let after_first = db.finished_jobs_since(completed[0].1).unwrap();
    assert_eq!(after_first.len(), 2);
    assert_eq!(after_first[0].crawl_id, completed[1].0);

    assert!(db.finished_jobs_since(completed[2].1).unwrap().is_empty());
}

// ============================================================================
// Profile And Edge Tests
// ============================================================================

#[test]
fn test_profile_round_trip() {
    let (_temp_dir, mut db) = create_test_db();

    let (job, _) = db.get_or_create_job(&id(0), depth(1)).unwrap();
    db.record_discovered(&job.crawl_id, 1).unwrap();
    db.record_profile(&job.crawl_id, &profile(0, 0, &[1])).unwrap();

    let stored = db.get_profile(&job.crawl_id, &id(0)).unwrap().unwrap();
    assert_eq!(stored.persona_name, "player 0");
    assert_eq!(stored.country_code.as_deref(), Some("SE"));
    assert_eq!(stored.visibility, Visibility::Public);
    assert!(stored.expanded);
    assert!(stored.discovered_from.is_none());
    assert!(stored.games.is_empty());
}

#[test]
fn test_profile_games_keep_rank_order() {
    let (_temp_dir, mut db) = create_test_db();

    let (job, _) = db.get_or_create_job(&id(0), depth(1)).unwrap();
    db.record_discovered(&job.crawl_id, 2).unwrap();
    let mut seed = profile(0, 0, &[1]);
    seed.games = vec![game(570, "Dota 2", 900), game(440, "Team Fortress 2", 300)];
    db.record_profile(&job.crawl_id, &seed).unwrap();
    let mut friend = profile(1, 1, &[]);
    friend.games = vec![game(440, "Team Fortress 2 (renamed)", 5)];
    let stored = db.record_profile(&job.crawl_id, &friend).unwrap();
    assert_eq!(stored.games, friend.games);

    let seed_games = db.get_profile(&job.crawl_id, &id(0)).unwrap().unwrap().games;
    assert_eq!(
        seed_games.iter().map(|g| g.appid).collect::<Vec<_>>(),
        vec![570, 440]
    );
    assert_eq!(seed_games[0].playtime_forever, 900);

    let profiles = db.get_profiles(&job.crawl_id).unwrap();
    assert_eq!(profiles[0].games.len(), 2);
    assert_eq!(profiles[1].games[0].playtime_forever, 5);

    // the catalogue keeps the latest name seen
    let tf2 = db.get_game(440).unwrap().unwrap();
    assert_eq!(tf2.name, "Team Fortress 2 (renamed)");
    assert_eq!(db.get_games(&[440, 1, 570]).unwrap().len(), 2);
}

#[test]
fn test_edges_only_between_crawled_profiles() {
    let (_temp_dir, mut db) = create_test_db();

    let (job, _) = db.get_or_create_job(&id(0), depth(1)).unwrap();
    db.record_discovered(&job.crawl_id, 3).unwrap();
    db.record_profile(&job.crawl_id, &profile(0, 0, &[2, 1, 7])).unwrap();
    db.record_profile(&job.crawl_id, &profile(1, 1, &[0])).unwrap();
    db.record_profile(&job.crawl_id, &profile(2, 1, &[])).unwrap();

    let edges = db.get_edges(&job.crawl_id).unwrap();
    assert_eq!(edges, vec![(id(0), id(1)), (id(0), id(2))]);
}

// ============================================================================
// Artifact Tests
// ============================================================================

#[test]
fn test_store_artifact_keeps_first_payload() {
    let (_temp_dir, mut db) = create_test_db();

    let (job, _) = db.get_or_create_job(&id(0), depth(0)).unwrap();
    assert!(!db.has_artifact(&job.crawl_id).unwrap());

    let first = db.store_artifact(&job.crawl_id, "{\"v\":1}").unwrap();
    let second = db.store_artifact(&job.crawl_id, "{\"v\":2}").unwrap();

    assert_eq!(first, "{\"v\":1}");
    assert_eq!(second, first);
    assert!(db.has_artifact(&job.crawl_id).unwrap());
}
