use clap::ArgMatches;
use colored::Colorize;
use friendgraph_core::config::{Config, resolve_database_path};
use friendgraph_core::data::Database;
use friendgraph_core::graph::GraphArtifact;
use friendgraph_core::model::{CrawlJob, JobStatus};
use friendgraph_core::validate::validate_format;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "friendgraph=info,tower_http=info";

/// Installs the global subscriber; `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Collects `serve`/`crawl` options into a core `Config`.
pub fn config_from_matches(matches: &ArgMatches) -> Result<Config, String> {
    let defaults = Config::default();

    let steam_api_key = matches
        .get_one::<String>("steam-api-key")
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| "A Steam API key is required (--steam-api-key or STEAM_API_KEY)".to_string())?;

    let listen_addr = matches
        .try_get_one::<std::net::SocketAddr>("addr")
        .ok()
        .flatten()
        .copied()
        .unwrap_or(defaults.listen_addr);

    let workers = matches.get_one::<usize>("workers").copied().unwrap_or(defaults.workers);
    if workers == 0 {
        return Err("--workers must be at least 1".to_string());
    }
    let max_in_flight = matches
        .get_one::<usize>("max-in-flight")
        .copied()
        .unwrap_or(defaults.max_in_flight);
    if max_in_flight == 0 {
        return Err("--max-in-flight must be at least 1".to_string());
    }

    Ok(Config {
        steam_api_key,
        steam_api_url: matches
            .get_one::<String>("steam-api-url")
            .cloned()
            .unwrap_or(defaults.steam_api_url),
        request_timeout_secs: matches
            .get_one::<u64>("timeout")
            .copied()
            .unwrap_or(defaults.request_timeout_secs),
        database_dir: matches
            .get_one::<String>("db")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_dir),
        listen_addr,
        workers,
        max_profiles_per_crawl: matches
            .get_one::<usize>("max-profiles")
            .copied()
            .unwrap_or(defaults.max_profiles_per_crawl),
        max_in_flight,
        request_spacing: matches
            .get_one::<u64>("request-spacing")
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or(defaults.request_spacing),
        retry_attempts: matches
            .get_one::<u32>("retry-attempts")
            .copied()
            .unwrap_or(defaults.retry_attempts),
        retry_base_delay: matches
            .get_one::<u64>("retry-backoff")
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or(defaults.retry_base_delay),
    })
}

/// Rejects anything that is not a 17 digit steam id before touching Steam.
pub fn parse_seed_argument(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if validate_format(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(format!("'{}' is not a 17 digit Steam id", raw))
    }
}

/// Creates the database directory and a fresh database inside it.
///
/// An existing database is kept unless `force` is set, in which case it is
/// removed first.
pub fn initialize_database(dir: &str, force: bool) -> Result<PathBuf, String> {
    let db_path = resolve_database_path(dir);
    let db_dir = db_path
        .parent()
        .ok_or_else(|| format!("Invalid database path: {}", db_path.display()))?;

    fs::create_dir_all(db_dir)
        .map_err(|e| format!("Failed to create {}: {}", db_dir.display(), e))?;

    if Database::exists(&db_path) {
        if !force {
            return Err(format!(
                "A database already exists at {} (use --force to overwrite)",
                db_path.display()
            ));
        }
        Database::remove(&db_path)
            .map_err(|e| format!("Failed to remove {}: {}", db_path.display(), e))?;
    }

    Database::new(&db_path).map_err(|e| format!("Failed to create database: {}", e))?;
    Ok(db_path)
}

/// Opens the database, creating it (and its directory) on first use.
pub fn open_database(path: &Path) -> Result<Database, String> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
    }
    Database::new(path).map_err(|e| format!("Failed to open database {}: {}", path.display(), e))
}

/// `1m 05s`, `12.3s`, `250ms`.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

pub fn progress_message(job: &CrawlJob) -> String {
    format!(
        "{} {}/{} profiles",
        job.state(),
        job.users_processed,
        job.users_discovered
    )
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

pub fn print_crawl_summary(job: &CrawlJob, artifact: Option<&GraphArtifact>) {
    let elapsed = job
        .completed_at
        .map(|done| Duration::from_millis(done.saturating_sub(job.started_at).max(0) as u64));

    println!();
    print_divider();
    println!("{}", " CRAWL SUMMARY".bright_white().bold());
    print_divider();

    let state = match job.state() {
        JobStatus::Completed => "completed".bright_green().bold(),
        JobStatus::Failed => "failed".bright_red().bold(),
        other => other.as_str().bright_yellow().bold(),
    };
    println!("  {:<14} {}", "Crawl id:".bright_cyan(), job.crawl_id);
    println!("  {:<14} {}", "Seed:".bright_cyan(), job.seed);
    println!("  {:<14} {}", "Level:".bright_cyan(), job.depth.level());
    println!("  {:<14} {}", "State:".bright_cyan(), state);
    println!(
        "  {:<14} {}/{}",
        "Profiles:".bright_cyan(),
        job.users_processed,
        job.users_discovered
    );
    if let Some(elapsed) = elapsed {
        println!("  {:<14} {}", "Elapsed:".bright_cyan(), format_duration(elapsed));
    }
    if job.truncated {
        println!(
            "  {}",
            "Profile cap reached; the outer level is incomplete.".yellow()
        );
    }
    if let Some(reason) = &job.failure {
        println!("  {:<14} {}", "Failure:".bright_red(), reason);
    }

    if let Some(artifact) = artifact {
        let stats = &artifact.stats;
        println!(
            "  {:<14} {} nodes, {} edges, {} component(s)",
            "Graph:".bright_cyan(),
            stats.node_count,
            stats.edge_count,
            stats.components
        );
        for (hops, count) in stats.per_level.iter().enumerate() {
            println!("    {} hop(s): {}", hops, count);
        }
        if !stats.top_games.is_empty() {
            println!("  {}", "Top games:".bright_cyan());
            for (rank, game) in stats.top_games.iter().enumerate() {
                println!(
                    "    {:>2}. {} ({} player(s), {}h)",
                    rank + 1,
                    game.name,
                    game.owners,
                    game.playtime / 60
                );
            }
        }
    }
    print_divider();
}
