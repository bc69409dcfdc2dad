use friendgraph_scanner::steam_id;
use friendgraph_scanner::{FriendList, FriendSource, RequestBudget, RetryPolicy, SteamId};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// True iff `identifier` is exactly 17 ASCII digits.
pub fn validate_format(identifier: &str) -> bool {
    steam_id::is_valid_format(identifier)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileVisibility {
    Public,
    Private,
    /// The upstream provider could not be asked; worth retrying later.
    Unknown,
}

impl ProfileVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileVisibility::Public => "public",
            ProfileVisibility::Private => "private",
            ProfileVisibility::Unknown => "unknown",
        }
    }
}

/// Checks that a profile can actually be crawled.
pub struct Validator {
    source: Arc<dyn FriendSource>,
    budget: RequestBudget,
    retry: RetryPolicy,
}

impl Validator {
    pub fn new(source: Arc<dyn FriendSource>, budget: RequestBudget, retry: RetryPolicy) -> Self {
        Self {
            source,
            budget,
            retry,
        }
    }

    /// Public means the summary is public and the friend list is readable
    /// and non-empty. A profile with no visible friends has nothing to crawl.
    pub async fn check_visibility(&self, steam_id: &SteamId) -> ProfileVisibility {
        let summaries = self
            .retry
            .run("GetPlayerSummaries", || async move {
                let _permit = self.budget.acquire().await?;
                self.source.player_summaries(std::slice::from_ref(steam_id)).await
            })
            .await;

        let summary = match summaries {
            Ok(summaries) => summaries.into_iter().find(|s| &s.steam_id == steam_id),
            Err(e) => {
                warn!("Visibility check for {} failed: {}", steam_id, e);
                return ProfileVisibility::Unknown;
            }
        };
        match summary {
            Some(summary) if summary.is_public() => {}
            Some(_) => return ProfileVisibility::Private,
            None => {
                debug!("No profile found for {}", steam_id);
                return ProfileVisibility::Private;
            }
        }

        let friends = self
            .retry
            .run("GetFriendList", || async move {
                let _permit = self.budget.acquire().await?;
                self.source.friend_list(steam_id).await
            })
            .await;

        match friends {
            Ok(FriendList::Public(friends)) if !friends.is_empty() => ProfileVisibility::Public,
            Ok(_) => ProfileVisibility::Private,
            Err(e) => {
                warn!("Friend list check for {} failed: {}", steam_id, e);
                ProfileVisibility::Unknown
            }
        }
    }
}
