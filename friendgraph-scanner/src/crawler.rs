use crate::budget::RequestBudget;
use crate::error::Result;
use crate::result::{CrawlEvent, CrawlSummary, ProfileResult};
use crate::retry::RetryPolicy;
use crate::steam::{
    FriendList, FriendSource, MAX_SUMMARY_BATCH, OwnedGame, PlayerSummary, top_games,
};
use crate::steam_id::SteamId;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

pub type EventCallback = Arc<dyn Fn(CrawlEvent) + Send + Sync>;

/// Deepest traversal supported: friends of friends.
pub const MAX_DEPTH: u8 = 2;

pub const DEFAULT_MAX_PROFILES: usize = 5000;

/// Breadth-first traversal of the friend graph around one seed profile.
///
/// Levels are expanded one at a time; within a level up to `workers`
/// profiles are expanded concurrently. Every upstream request draws from the
/// shared `RequestBudget` and transient failures are retried per the
/// `RetryPolicy`. A persistent upstream failure aborts the crawl; a failed
/// game library lookup only leaves that profile without games.
pub struct Crawler {
    source: Arc<dyn FriendSource>,
    budget: RequestBudget,
    retry: RetryPolicy,
    max_depth: u8,
    workers: usize,
    max_profiles: usize,
    event_callback: Option<EventCallback>,
}

/// What expanding one frontier profile produced.
struct Expansion {
    profile: ProfileResult,
    candidates: Vec<PlayerSummary>,
    /// Unseen friends were left unresolved because the profile cap was hit.
    capped: bool,
}

impl Expansion {
    fn leaf(profile: ProfileResult) -> Self {
        Self {
            profile,
            candidates: Vec::new(),
            capped: false,
        }
    }
}

impl Crawler {
    pub fn new(source: Arc<dyn FriendSource>) -> Self {
        Self {
            source,
            budget: RequestBudget::default(),
            retry: RetryPolicy::default(),
            max_depth: 1,
            workers: 8,
            max_profiles: DEFAULT_MAX_PROFILES,
            event_callback: None,
        }
    }

    pub fn with_max_depth(mut self, depth: u8) -> Self {
        self.max_depth = depth.min(MAX_DEPTH);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_budget(mut self, budget: RequestBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Stop discovering new profiles once this many are known.
    pub fn with_max_profiles(mut self, max_profiles: usize) -> Self {
        self.max_profiles = max_profiles.max(1);
        self
    }

    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    pub async fn crawl(&self, seed: &SteamId) -> Result<CrawlSummary> {
        info!(
            "Starting crawl of {} to depth {} with {} workers",
            seed, self.max_depth, self.workers
        );

        let seed_summary = self
            .fetch_summaries(std::slice::from_ref(seed))
            .await?
            .into_iter()
            .next()
            .unwrap_or_else(|| PlayerSummary::unreachable(seed.clone()));

        let mut visited: HashSet<SteamId> = HashSet::from([seed.clone()]);
        let mut processed = 0usize;
        let mut truncated = false;
        // Set once the cap is reached; expansions still running stop
        // resolving new friends from then on.
        let full = AtomicBool::new(visited.len() >= self.max_profiles);
        self.emit(CrawlEvent::Discovered { count: 1 });

        let mut frontier: Vec<(PlayerSummary, Option<SteamId>)> = vec![(seed_summary, None)];

        for depth in 0..=self.max_depth {
            if frontier.is_empty() {
                break;
            }
            let expand = depth < self.max_depth;
            debug!("Level {}: {} profiles", depth, frontier.len());

            // Ids known before this level started; used to skip summary
            // lookups for friends that are already part of the crawl.
            let known = visited.clone();
            let pending: Vec<_> = frontier
                .drain(..)
                .map(|(summary, from)| self.expand(summary, from, depth, expand, &known, &full))
                .collect();
            let mut expansions = stream::iter(pending).buffer_unordered(self.workers);

            let mut next_frontier = Vec::new();
            while let Some(expansion) = expansions.next().await {
                let Expansion {
                    profile,
                    candidates,
                    capped,
                } = expansion?;
                truncated |= capped;

                let mut discovered = 0usize;
                for candidate in candidates {
                    if visited.contains(&candidate.steam_id) {
                        continue;
                    }
                    if visited.len() >= self.max_profiles {
                        truncated = true;
                        break;
                    }
                    visited.insert(candidate.steam_id.clone());
                    next_frontier.push((candidate, Some(profile.steam_id().clone())));
                    discovered += 1;
                }
                if visited.len() >= self.max_profiles {
                    full.store(true, Ordering::Release);
                }

                if discovered > 0 {
                    self.emit(CrawlEvent::Discovered { count: discovered });
                }
                processed += 1;
                self.emit(CrawlEvent::Processed(profile));
            }

            frontier = next_frontier;
        }

        if truncated {
            warn!(
                "Crawl of {} stopped discovering at {} profiles",
                seed, self.max_profiles
            );
        }
        info!(
            "Crawl of {} complete. Processed {} profiles",
            seed, processed
        );

        Ok(CrawlSummary {
            seed: seed.clone(),
            max_depth: self.max_depth,
            profiles_discovered: visited.len(),
            profiles_processed: processed,
            truncated,
        })
    }

    async fn expand(
        &self,
        summary: PlayerSummary,
        discovered_from: Option<SteamId>,
        depth: u8,
        expand: bool,
        known: &HashSet<SteamId>,
        full: &AtomicBool,
    ) -> Result<Expansion> {
        let public = summary.is_public();
        let mut profile = ProfileResult::leaf(summary, depth, discovered_from);
        if public {
            profile.games = self.fetch_owned_games(profile.steam_id()).await;
        }

        if !expand {
            return Ok(Expansion::leaf(profile));
        }
        if !public {
            debug!("{} is private, not expanding", profile.steam_id());
            return Ok(Expansion::leaf(profile));
        }

        let friends = match self.fetch_friend_list(profile.steam_id()).await? {
            FriendList::Public(friends) => friends,
            FriendList::Private => {
                warn!("Friend list of {} is hidden, treating as leaf", profile.steam_id());
                return Ok(Expansion::leaf(profile));
            }
        };

        let unseen: Vec<SteamId> = friends
            .iter()
            .filter(|id| !known.contains(*id))
            .cloned()
            .collect();
        let capped = !unseen.is_empty() && full.load(Ordering::Acquire);
        let candidates = if capped {
            debug!(
                "Profile cap reached, not resolving {} friends of {}",
                unseen.len(),
                profile.steam_id()
            );
            Vec::new()
        } else {
            self.fetch_summaries(&unseen)
                .await?
                .into_iter()
                .filter(PlayerSummary::is_public)
                .collect()
        };

        profile.friends = friends;
        profile.expanded = true;
        Ok(Expansion {
            profile,
            candidates,
            capped,
        })
    }

    /// Library lookups are best effort: after retries, a failure only costs
    /// this profile its games.
    async fn fetch_owned_games(&self, steam_id: &SteamId) -> Vec<OwnedGame> {
        let result = self
            .retry
            .run("GetOwnedGames", || async move {
                let _permit = self.budget.acquire().await?;
                self.source.owned_games(steam_id).await
            })
            .await;

        match result {
            Ok(games) => top_games(games),
            Err(e) => {
                warn!("Could not fetch the games of {}: {}", steam_id, e);
                Vec::new()
            }
        }
    }

    async fn fetch_friend_list(&self, steam_id: &SteamId) -> Result<FriendList> {
        self.retry
            .run("GetFriendList", || async move {
                let _permit = self.budget.acquire().await?;
                self.source.friend_list(steam_id).await
            })
            .await
    }

    async fn fetch_summaries(&self, steam_ids: &[SteamId]) -> Result<Vec<PlayerSummary>> {
        let mut summaries = Vec::with_capacity(steam_ids.len());
        for batch in steam_ids.chunks(MAX_SUMMARY_BATCH) {
            let fetched = self
                .retry
                .run("GetPlayerSummaries", || async move {
                    let _permit = self.budget.acquire().await?;
                    self.source.player_summaries(batch).await
                })
                .await?;
            summaries.extend(fetched);
        }
        Ok(summaries)
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}
