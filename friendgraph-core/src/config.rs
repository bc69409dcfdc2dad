use friendgraph_scanner::steam::DEFAULT_STEAM_API_URL;
use friendgraph_scanner::{RequestBudget, RetryPolicy};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATABASE_DIR: &str = "~/.config/friendgraph/";
pub const DATABASE_FILE: &str = "friendgraph.db";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:2590";

/// Runtime settings shared by the server and the command line crawler.
#[derive(Debug, Clone)]
pub struct Config {
    pub steam_api_key: String,
    pub steam_api_url: String,
    pub request_timeout_secs: u64,
    pub database_dir: PathBuf,
    pub listen_addr: SocketAddr,
    /// Profiles expanded concurrently within one crawl level.
    pub workers: usize,
    pub max_profiles_per_crawl: usize,
    /// Upstream requests in flight across all crawls.
    pub max_in_flight: usize,
    pub request_spacing: Duration,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            steam_api_key: String::new(),
            steam_api_url: DEFAULT_STEAM_API_URL.to_string(),
            request_timeout_secs: 10,
            database_dir: PathBuf::from(DEFAULT_DATABASE_DIR),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 2590)),
            workers: 8,
            max_profiles_per_crawl: 5000,
            max_in_flight: 10,
            request_spacing: Duration::from_millis(50),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl Config {
    /// The database file inside `database_dir`, with `~` expanded.
    pub fn database_path(&self) -> PathBuf {
        resolve_database_path(&self.database_dir.to_string_lossy())
    }

    pub fn budget(&self) -> RequestBudget {
        RequestBudget::new(self.max_in_flight, self.request_spacing)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_base_delay)
    }
}

/// Expands `~` in a database directory and appends the database file name.
pub fn resolve_database_path(dir: &str) -> PathBuf {
    let expanded = shellexpand::tilde(dir);
    Path::new(expanded.as_ref()).join(DATABASE_FILE)
}
