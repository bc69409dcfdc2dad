pub mod config;
pub mod crawl;
pub mod data;
pub mod dedup;
pub mod distance;
pub mod engine;
pub mod error;
pub mod games;
pub mod graph;
pub mod model;
pub mod status;
pub mod validate;

pub use config::Config;
pub use data::{Database, SharedDatabase};
pub use engine::Engine;
pub use error::{CoreError, Result};
pub use model::{
    CrawlJob, CrawledProfile, Depth, Distance, GameInfo, JobStatus, NewUserEvent,
    ShortestDistanceResult, TopGame,
};
