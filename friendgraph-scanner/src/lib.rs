pub mod budget;
pub mod crawler;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod result;
pub mod retry;
pub mod steam;
pub mod steam_id;

pub use budget::RequestBudget;
pub use crawler::{Crawler, EventCallback};
pub use error::ScanError;
pub use result::{CrawlEvent, CrawlSummary, ProfileResult};
pub use retry::RetryPolicy;
pub use steam::{
    FriendList, FriendSource, MAX_GAMES_PER_PROFILE, OwnedGame, PlayerSummary, SteamApiClient,
    Visibility, top_games,
};
pub use steam_id::SteamId;
