use crate::model::{CrawlJob, CrawledProfile, Depth, GameInfo, JobOrigin, JobStatus};
use friendgraph_scanner::{OwnedGame, ProfileResult, SteamId, Visibility};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Result, Row, TransactionBehavior, params};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct Database {
    conn: Connection,
}

/// One store shared by the HTTP handlers and every crawl task.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Wall clock in milliseconds since the unix epoch.
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

const JOB_COLUMNS: &str = "id, seed_steam_id, depth, status, users_discovered, users_processed, \
     truncated, failure, started_at, completed_at";

const PROFILE_COLUMNS: &str = "steam_id, persona_name, profile_url, avatar, country_code, \
     visibility, depth, discovered_from, expanded, crawled_at";

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

fn steam_id_column(row: &Row, column: usize) -> Result<SteamId> {
    let raw: String = row.get(column)?;
    SteamId::parse(&raw).map_err(|e| conversion_error(column, e.to_string()))
}

fn count_column(row: &Row, column: usize) -> Result<u64> {
    let raw: i64 = row.get(column)?;
    u64::try_from(raw).map_err(|e| conversion_error(column, e.to_string()))
}

fn job_from_row(row: &Row) -> Result<CrawlJob> {
    let depth: u8 = row.get(2)?;
    let status: String = row.get(3)?;
    Ok(CrawlJob {
        crawl_id: row.get(0)?,
        seed: steam_id_column(row, 1)?,
        depth: Depth::new(depth).map_err(|e| conversion_error(2, e.to_string()))?,
        status: JobStatus::parse(&status)
            .ok_or_else(|| conversion_error(3, format!("unknown job status '{}'", status)))?,
        users_discovered: count_column(row, 4)?,
        users_processed: count_column(row, 5)?,
        truncated: row.get(6)?,
        failure: row.get(7)?,
        started_at: row.get(8)?,
        completed_at: row.get(9)?,
    })
}

fn profile_from_row(row: &Row) -> Result<CrawledProfile> {
    let visibility: String = row.get(5)?;
    let discovered_from: Option<String> = row.get(7)?;
    Ok(CrawledProfile {
        steam_id: steam_id_column(row, 0)?,
        persona_name: row.get(1)?,
        profile_url: row.get(2)?,
        avatar: row.get(3)?,
        country_code: row.get(4)?,
        visibility: Visibility::parse(&visibility)
            .ok_or_else(|| conversion_error(5, format!("unknown visibility '{}'", visibility)))?,
        depth: row.get(6)?,
        discovered_from: discovered_from
            .map(|id| SteamId::parse(&id).map_err(|e| conversion_error(7, e.to_string())))
            .transpose()?,
        expanded: row.get(8)?,
        crawled_at: row.get(9)?,
        games: Vec::new(),
    })
}

fn owned_game_from_row(row: &Row, offset: usize) -> Result<OwnedGame> {
    Ok(OwnedGame {
        appid: row.get(offset)?,
        name: row.get(offset + 1)?,
        playtime_forever: count_column(row, offset + 2)?,
        img_icon_url: row.get(offset + 3)?,
    })
}

fn game_info_from_row(row: &Row) -> Result<GameInfo> {
    Ok(GameInfo {
        appid: row.get(0)?,
        name: row.get(1)?,
        img_icon_url: row.get(2)?,
    })
}

/// Undirected edges are stored once, smallest id first.
fn edge_key<'a>(a: &'a SteamId, b: &'a SteamId) -> (&'a SteamId, &'a SteamId) {
    if a <= b { (a, b) } else { (b, a) }
}

impl Database {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    /// Deletes the database file along with its WAL side files.
    pub fn remove(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)?;
        for suffix in ["-wal", "-shm"] {
            let mut side = path.as_os_str().to_owned();
            side.push(suffix);
            let side = Path::new(&side);
            if side.exists() {
                fs::remove_file(side)?;
            }
        }
        Ok(())
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn into_shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- One row per (seed, depth); never deleted, doubles as the dedup cache
            CREATE TABLE IF NOT EXISTS crawl_jobs (
    id TEXT PRIMARY KEY,
    seed_steam_id TEXT NOT NULL,
    depth INTEGER NOT NULL CHECK(depth BETWEEN 0 AND 2),
    status TEXT NOT NULL CHECK(status IN ('pending', 'running', 'completed', 'failed')),
    users_discovered INTEGER NOT NULL DEFAULT 0,
    users_processed INTEGER NOT NULL DEFAULT 0,
    truncated BOOLEAN NOT NULL DEFAULT 0,
    failure TEXT,
    started_at INTEGER NOT NULL,
    completed_at INTEGER,          -- milliseconds, strictly increasing across jobs
    UNIQUE(seed_steam_id, depth),
    CHECK(users_processed <= users_discovered)
);

CREATE INDEX IF NOT EXISTS idx_crawl_jobs_completed ON crawl_jobs(status, completed_at);

-- Profiles visited by a crawl
CREATE TABLE IF NOT EXISTS crawl_profiles (
    crawl_id TEXT NOT NULL,
    steam_id TEXT NOT NULL,
    persona_name TEXT NOT NULL,
    profile_url TEXT NOT NULL,
    avatar TEXT NOT NULL,
    country_code TEXT,
    visibility TEXT NOT NULL CHECK(visibility IN ('public', 'private')),
    depth INTEGER NOT NULL,
    discovered_from TEXT,
    expanded BOOLEAN NOT NULL DEFAULT 0,
    crawled_at INTEGER NOT NULL,

    PRIMARY KEY(crawl_id, steam_id),
    FOREIGN KEY(crawl_id) REFERENCES crawl_jobs(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_crawl_profiles_depth ON crawl_profiles(crawl_id, depth);

-- Game catalogue, filled from the libraries of crawled profiles
CREATE TABLE IF NOT EXISTS games (
    appid INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    img_icon_url TEXT NOT NULL
);

-- Most played games of each crawled profile; play_rank 0 is the most played
CREATE TABLE IF NOT EXISTS crawl_profile_games (
    crawl_id TEXT NOT NULL,
    steam_id TEXT NOT NULL,
    appid INTEGER NOT NULL,
    playtime_forever INTEGER NOT NULL,
    play_rank INTEGER NOT NULL,

    PRIMARY KEY(crawl_id, steam_id, appid),
    FOREIGN KEY(crawl_id, steam_id) REFERENCES crawl_profiles(crawl_id, steam_id) ON DELETE CASCADE,
    FOREIGN KEY(appid) REFERENCES games(appid)
);

-- Friendships reported while expanding profiles; source < target
CREATE TABLE IF NOT EXISTS crawl_edges (
    crawl_id TEXT NOT NULL,
    source TEXT NOT NULL,
    target TEXT NOT NULL,

    PRIMARY KEY(crawl_id, source, target),
    FOREIGN KEY(crawl_id) REFERENCES crawl_jobs(id) ON DELETE CASCADE
);

-- Serialized graph per completed crawl, written once
CREATE TABLE IF NOT EXISTS graph_artifacts (
    crawl_id TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY(crawl_id) REFERENCES crawl_jobs(id) ON DELETE CASCADE
);

-- Shortest distance per unordered pair of crawls; first_crawl_id <= second_crawl_id
CREATE TABLE IF NOT EXISTS shortest_distances (
    first_crawl_id TEXT NOT NULL,
    second_crawl_id TEXT NOT NULL,
    payload TEXT NOT NULL,
    computed_at INTEGER NOT NULL,

    PRIMARY KEY(first_crawl_id, second_crawl_id),
    CHECK(first_crawl_id <= second_crawl_id),
    FOREIGN KEY(first_crawl_id) REFERENCES crawl_jobs(id) ON DELETE CASCADE,
    FOREIGN KEY(second_crawl_id) REFERENCES crawl_jobs(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_shortest_distances_computed ON shortest_distances(computed_at);
            ",
        )?;
        Ok(())
    }

    // Job management

    /// Returns the job for `(seed, depth)`, creating it when none exists and
    /// re-arming it in place when it previously failed. Runs as one
    /// transaction so concurrent callers always agree on a single job.
    pub fn get_or_create_job(
        &mut self,
        seed: &SteamId,
        depth: Depth,
    ) -> Result<(CrawlJob, JobOrigin)> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
            .query_row(
                &format!(
                    "SELECT {} FROM crawl_jobs WHERE seed_steam_id = ?1 AND depth = ?2",
                    JOB_COLUMNS
                ),
                params![seed.as_str(), depth.get()],
                job_from_row,
            )
            .optional()?;

        let timestamp = current_timestamp();
        let (crawl_id, origin) = match existing {
            Some(job) if job.status != JobStatus::Failed => {
                tx.commit()?;
                return Ok((job, JobOrigin::Existing));
            }
            Some(job) => {
                tx.execute(
                    "DELETE FROM crawl_profile_games WHERE crawl_id = ?1",
                    params![&job.crawl_id],
                )?;
                tx.execute(
                    "DELETE FROM crawl_profiles WHERE crawl_id = ?1",
                    params![&job.crawl_id],
                )?;
                tx.execute(
                    "DELETE FROM crawl_edges WHERE crawl_id = ?1",
                    params![&job.crawl_id],
                )?;
                tx.execute(
                    "UPDATE crawl_jobs
                     SET status = 'pending', users_discovered = 0, users_processed = 0,
                         truncated = 0, failure = NULL, started_at = ?1, completed_at = NULL
                     WHERE id = ?2",
                    params![timestamp, &job.crawl_id],
                )?;
                (job.crawl_id, JobOrigin::Restarted)
            }
            None => {
                let crawl_id = uuid::Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO crawl_jobs (id, seed_steam_id, depth, status, started_at)
                     VALUES (?1, ?2, ?3, 'pending', ?4)",
                    params![&crawl_id, seed.as_str(), depth.get(), timestamp],
                )?;
                (crawl_id, JobOrigin::Created)
            }
        };

        let job = tx.query_row(
            &format!("SELECT {} FROM crawl_jobs WHERE id = ?1", JOB_COLUMNS),
            params![&crawl_id],
            job_from_row,
        )?;
        tx.commit()?;
        Ok((job, origin))
    }

    pub fn find_job(&self, seed: &SteamId, depth: Depth) -> Result<Option<CrawlJob>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM crawl_jobs WHERE seed_steam_id = ?1 AND depth = ?2",
                    JOB_COLUMNS
                ),
                params![seed.as_str(), depth.get()],
                job_from_row,
            )
            .optional()
    }

    pub fn get_job(&self, crawl_id: &str) -> Result<Option<CrawlJob>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM crawl_jobs WHERE id = ?1", JOB_COLUMNS),
                params![crawl_id],
                job_from_row,
            )
            .optional()
    }

    pub fn mark_running(&self, crawl_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE crawl_jobs SET status = 'running' WHERE id = ?1 AND status = 'pending'",
            params![crawl_id],
        )?;
        Ok(())
    }

    pub fn record_discovered(&self, crawl_id: &str, count: usize) -> Result<()> {
        self.conn.execute(
            "UPDATE crawl_jobs SET users_discovered = users_discovered + ?1 WHERE id = ?2",
            params![count as i64, crawl_id],
        )?;
        Ok(())
    }

    /// Stores a processed profile with its friendships and games and bumps
    /// the processed counter, all in one transaction. Returns the stored row.
    pub fn record_profile(&mut self, crawl_id: &str, profile: &ProfileResult) -> Result<CrawledProfile> {
        let crawled = CrawledProfile::from_result(profile, current_timestamp());
        let tx = self.conn.transaction()?;

        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO crawl_profiles (crawl_id, {})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                PROFILE_COLUMNS
            ),
            params![
                crawl_id,
                crawled.steam_id.as_str(),
                &crawled.persona_name,
                &crawled.profile_url,
                &crawled.avatar,
                &crawled.country_code,
                crawled.visibility.as_str(),
                crawled.depth,
                crawled.discovered_from.as_ref().map(SteamId::as_str),
                crawled.expanded,
                crawled.crawled_at,
            ],
        )?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO crawl_edges (crawl_id, source, target) VALUES (?1, ?2, ?3)",
            )?;
            for friend in &profile.friends {
                if friend == &crawled.steam_id {
                    continue;
                }
                let (source, target) = edge_key(&crawled.steam_id, friend);
                stmt.execute(params![crawl_id, source.as_str(), target.as_str()])?;
            }
        }

        {
            tx.execute(
                "DELETE FROM crawl_profile_games WHERE crawl_id = ?1 AND steam_id = ?2",
                params![crawl_id, crawled.steam_id.as_str()],
            )?;
            let mut catalogue = tx.prepare_cached(
                "INSERT INTO games (appid, name, img_icon_url) VALUES (?1, ?2, ?3)
                 ON CONFLICT(appid) DO UPDATE SET name = excluded.name,
                     img_icon_url = excluded.img_icon_url",
            )?;
            let mut owned = tx.prepare_cached(
                "INSERT OR REPLACE INTO crawl_profile_games
                     (crawl_id, steam_id, appid, playtime_forever, play_rank)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (rank, game) in crawled.games.iter().enumerate() {
                catalogue.execute(params![game.appid, &game.name, &game.img_icon_url])?;
                owned.execute(params![
                    crawl_id,
                    crawled.steam_id.as_str(),
                    game.appid,
                    game.playtime_forever as i64,
                    rank as i64,
                ])?;
            }
        }

        tx.execute(
            "UPDATE crawl_jobs SET users_processed = users_processed + 1 WHERE id = ?1",
            params![crawl_id],
        )?;
        tx.commit()?;
        Ok(crawled)
    }

    /// Completion time for the next finished job: the wall clock, pushed
    /// forward if needed so it is strictly greater than any earlier one.
    fn next_completion_timestamp(&self) -> Result<i64> {
        let last: Option<i64> = self
            .conn
            .query_row("SELECT MAX(completed_at) FROM crawl_jobs", [], |row| row.get(0))?;
        let now = current_timestamp();
        Ok(last.map_or(now, |last| now.max(last + 1)))
    }

    pub fn complete_job(&self, crawl_id: &str, truncated: bool) -> Result<i64> {
        let timestamp = self.next_completion_timestamp()?;
        self.conn.execute(
            "UPDATE crawl_jobs SET status = 'completed', truncated = ?1, completed_at = ?2
             WHERE id = ?3",
            params![truncated, timestamp, crawl_id],
        )?;
        Ok(timestamp)
    }

    pub fn fail_job(&self, crawl_id: &str, reason: &str) -> Result<()> {
        let timestamp = self.next_completion_timestamp()?;
        self.conn.execute(
            "UPDATE crawl_jobs SET status = 'failed', failure = ?1, completed_at = ?2
             WHERE id = ?3",
            params![reason, timestamp, crawl_id],
        )?;
        Ok(())
    }

    /// Marks jobs a previous process left unfinished as failed.
    pub fn fail_interrupted_jobs(&self) -> Result<usize> {
        let timestamp = self.next_completion_timestamp()?;
        self.conn.execute(
            "UPDATE crawl_jobs SET status = 'failed', failure = 'interrupted', completed_at = ?1
             WHERE status IN ('pending', 'running')",
            params![timestamp],
        )
    }

    /// Completed jobs with `completed_at > timestamp`, oldest first.
    pub fn finished_jobs_since(&self, timestamp: i64) -> Result<Vec<CrawlJob>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM crawl_jobs
             WHERE status = 'completed' AND completed_at > ?1
             ORDER BY completed_at",
            JOB_COLUMNS
        ))?;

        let jobs = stmt
            .query_map(params![timestamp], job_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(jobs)
    }

    pub fn list_jobs(&self) -> Result<Vec<CrawlJob>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM crawl_jobs ORDER BY started_at, id",
            JOB_COLUMNS
        ))?;

        let jobs = stmt
            .query_map([], job_from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(jobs)
    }

    // Crawled profiles

    pub fn get_profile(&self, crawl_id: &str, steam_id: &SteamId) -> Result<Option<CrawledProfile>> {
        let profile = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM crawl_profiles WHERE crawl_id = ?1 AND steam_id = ?2",
                    PROFILE_COLUMNS
                ),
                params![crawl_id, steam_id.as_str()],
                profile_from_row,
            )
            .optional()?;

        let Some(mut profile) = profile else {
            return Ok(None);
        };
        let mut stmt = self.conn.prepare_cached(
            "SELECT g.appid, g.name, o.playtime_forever, g.img_icon_url
             FROM crawl_profile_games o
             JOIN games g ON g.appid = o.appid
             WHERE o.crawl_id = ?1 AND o.steam_id = ?2
             ORDER BY o.play_rank",
        )?;
        profile.games = stmt
            .query_map(params![crawl_id, steam_id.as_str()], |row| {
                owned_game_from_row(row, 0)
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(profile))
    }

    /// All profiles of a crawl, nearest to the seed first, then by id.
    pub fn get_profiles(&self, crawl_id: &str) -> Result<Vec<CrawledProfile>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM crawl_profiles WHERE crawl_id = ?1 ORDER BY depth, steam_id",
            PROFILE_COLUMNS
        ))?;

        let mut profiles = stmt
            .query_map(params![crawl_id], profile_from_row)?
            .collect::<Result<Vec<_>>>()?;

        let mut games = self.get_crawl_games(crawl_id)?;
        for profile in &mut profiles {
            if let Some(owned) = games.remove(&profile.steam_id) {
                profile.games = owned;
            }
        }
        Ok(profiles)
    }

    /// Stored games of every profile in a crawl, each list in rank order.
    fn get_crawl_games(&self, crawl_id: &str) -> Result<HashMap<SteamId, Vec<OwnedGame>>> {
        let mut stmt = self.conn.prepare(
            "SELECT o.steam_id, g.appid, g.name, o.playtime_forever, g.img_icon_url
             FROM crawl_profile_games o
             JOIN games g ON g.appid = o.appid
             WHERE o.crawl_id = ?1
             ORDER BY o.steam_id, o.play_rank",
        )?;

        let mut games: HashMap<SteamId, Vec<OwnedGame>> = HashMap::new();
        let rows = stmt.query_map(params![crawl_id], |row| {
            Ok((steam_id_column(row, 0)?, owned_game_from_row(row, 1)?))
        })?;
        for row in rows {
            let (steam_id, game) = row?;
            games.entry(steam_id).or_default().push(game);
        }
        Ok(games)
    }

    // Game catalogue

    pub fn get_game(&self, appid: u32) -> Result<Option<GameInfo>> {
        self.conn
            .query_row(
                "SELECT appid, name, img_icon_url FROM games WHERE appid = ?1",
                params![appid],
                game_info_from_row,
            )
            .optional()
    }

    /// Catalogue entries for the given ids, in request order. Unknown ids
    /// are skipped.
    pub fn get_games(&self, appids: &[u32]) -> Result<Vec<GameInfo>> {
        let mut games = Vec::with_capacity(appids.len());
        for &appid in appids {
            if let Some(game) = self.get_game(appid)? {
                games.push(game);
            }
        }
        Ok(games)
    }

    /// Friendships whose both ends were visited by the crawl, sorted.
    pub fn get_edges(&self, crawl_id: &str) -> Result<Vec<(SteamId, SteamId)>> {
        let mut stmt = self.conn.prepare(
            "SELECT e.source, e.target
             FROM crawl_edges e
             JOIN crawl_profiles s ON s.crawl_id = e.crawl_id AND s.steam_id = e.source
             JOIN crawl_profiles t ON t.crawl_id = e.crawl_id AND t.steam_id = e.target
             WHERE e.crawl_id = ?1
             ORDER BY e.source, e.target",
        )?;

        let edges = stmt
            .query_map(params![crawl_id], |row| {
                Ok((steam_id_column(row, 0)?, steam_id_column(row, 1)?))
            })?
            .collect::<Result<Vec<_>>>()?;

        Ok(edges)
    }

    // Graph artifacts

    pub fn has_artifact(&self, crawl_id: &str) -> Result<bool> {
        self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM graph_artifacts WHERE crawl_id = ?1)",
            params![crawl_id],
            |row| row.get(0),
        )
    }

    pub fn get_artifact(&self, crawl_id: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT payload FROM graph_artifacts WHERE crawl_id = ?1",
                params![crawl_id],
                |row| row.get(0),
            )
            .optional()
    }

    /// Stores the artifact unless one exists and returns whichever is stored.
    pub fn store_artifact(&self, crawl_id: &str, payload: &str) -> Result<String> {
        self.conn.execute(
            "INSERT OR IGNORE INTO graph_artifacts (crawl_id, payload, created_at) VALUES (?1, ?2, ?3)",
            params![crawl_id, payload, current_timestamp()],
        )?;
        self.conn.query_row(
            "SELECT payload FROM graph_artifacts WHERE crawl_id = ?1",
            params![crawl_id],
            |row| row.get(0),
        )
    }

    // Shortest distances

    /// Computation time for the next cached distance, strictly increasing.
    pub fn next_distance_timestamp(&self) -> Result<i64> {
        let last: Option<i64> = self.conn.query_row(
            "SELECT MAX(computed_at) FROM shortest_distances",
            [],
            |row| row.get(0),
        )?;
        let now = current_timestamp();
        Ok(last.map_or(now, |last| now.max(last + 1)))
    }

    pub fn get_distance(&self, first: &str, second: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT payload FROM shortest_distances
                 WHERE first_crawl_id = ?1 AND second_crawl_id = ?2",
                params![first, second],
                |row| row.get(0),
            )
            .optional()
    }

    /// Caches a distance unless the pair already has one and returns the
    /// stored payload.
    pub fn store_distance(
        &self,
        first: &str,
        second: &str,
        computed_at: i64,
        payload: &str,
    ) -> Result<String> {
        self.conn.execute(
            "INSERT OR IGNORE INTO shortest_distances
                 (first_crawl_id, second_crawl_id, payload, computed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![first, second, payload, computed_at],
        )?;
        self.conn.query_row(
            "SELECT payload FROM shortest_distances
             WHERE first_crawl_id = ?1 AND second_crawl_id = ?2",
            params![first, second],
            |row| row.get(0),
        )
    }

    /// Payloads of distances computed after `timestamp`, oldest first.
    pub fn distances_since(&self, timestamp: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM shortest_distances WHERE computed_at > ?1 ORDER BY computed_at",
        )?;

        let payloads = stmt
            .query_map(params![timestamp], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;

        Ok(payloads)
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}
