use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::{HistoryTrade, MarketMeta, RankInfo};
use crate::polymarket::types::{parse_trade_timestamp, GammaMarket};
use crate::polymarket::{DataClient, GammaClient, LeaderboardClient};

use super::{Leaderboard, MarketLookup, WalletHistory};

/// Group slugs the venue uses for sports and esports markets.
const SPORTS_SLUGS: &[&str] = &[
    "sports", "nba", "nfl", "mlb", "nhl", "soccer", "football", "basketball",
    "baseball", "hockey", "tennis", "golf", "ufc", "mma", "boxing", "f1",
    "formula-1", "cricket", "esports", "league-of-legends", "dota", "csgo",
    "valorant", "nba-games", "nfl-games", "epl", "premier-league",
    "champions-league",
];

/// Fallback terms scanned in the market slug/question when tags are absent.
const SPORTS_TERMS: &[&str] = &[
    "nba", "nfl", "mlb", "nhl", "ufc", "boxing", "soccer", "basketball",
    "baseball", "hockey", "tennis", "golf", "super-bowl", "world-series",
    "stanley-cup", "esports", "champions-league", "world-cup", "olympics",
    "ncaa",
];

const SNAPSHOT_PAGE_SIZE: u32 = 500;
const SNAPSHOT_MAX_MARKETS: usize = 2_000;

// ---------------------------------------------------------------------------
// Market metadata via the Gamma API
// ---------------------------------------------------------------------------

struct MarketSnapshot {
    markets: HashMap<String, MarketMeta>,
    refreshed_at: Option<Instant>,
}

/// [`MarketLookup`] backed by a periodically rebuilt snapshot of all active
/// markets. The Gamma API has no cheap single-market endpoint, so the whole
/// active set is paged in and indexed by condition ID and token ID.
pub struct GammaMarketSource {
    client: GammaClient,
    ttl: Duration,
    snapshot: tokio::sync::Mutex<MarketSnapshot>,
    sports_tag_ids: Mutex<BTreeSet<String>>,
}

impl GammaMarketSource {
    pub fn new(client: GammaClient, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            snapshot: tokio::sync::Mutex::new(MarketSnapshot {
                markets: HashMap::new(),
                refreshed_at: None,
            }),
            sports_tag_ids: Mutex::new(BTreeSet::new()),
        }
    }

    /// Refresh the set of venue-defined sports tag IDs. Run at startup and
    /// on the refresher cadence.
    pub async fn refresh_sports_tags(&self) -> anyhow::Result<usize> {
        let tag_ids = self.client.get_sports_tag_ids().await?;
        let count = tag_ids.len();
        *self.sports_tag_ids.lock().unwrap() = tag_ids;
        tracing::info!(tags = count, "Sports tag registry refreshed");
        Ok(count)
    }

    fn build_meta(&self, market: &GammaMarket) -> MarketMeta {
        let sports_tag_ids = self.sports_tag_ids.lock().unwrap();

        let group_slug = market.group_slug.as_deref().map(str::to_lowercase);
        let mut category_tags = BTreeSet::new();
        let mut is_sports = group_slug
            .as_deref()
            .is_some_and(|g| SPORTS_SLUGS.contains(&g));

        for tag in &market.tags {
            if let Some(slug) = tag.slug.as_deref() {
                let slug = slug.to_lowercase();
                if SPORTS_SLUGS.contains(&slug.as_str()) {
                    is_sports = true;
                }
                category_tags.insert(slug);
            }
            if let Some(id) = tag.id_str() {
                if sports_tag_ids.contains(&id) {
                    is_sports = true;
                }
            }
        }

        if !is_sports {
            let text = format!(
                "{} {}",
                market.slug.as_deref().unwrap_or_default().to_lowercase(),
                market.question.to_lowercase(),
            );
            is_sports = SPORTS_TERMS.iter().any(|term| text.contains(term));
        }

        MarketMeta {
            market_id: market.condition_id.clone(),
            is_sports,
            category_tags,
            group_slug,
        }
    }

    async fn ensure_snapshot(&self) -> anyhow::Result<()> {
        let mut snapshot = self.snapshot.lock().await;
        if snapshot
            .refreshed_at
            .is_some_and(|at| at.elapsed() < self.ttl)
        {
            return Ok(());
        }

        let mut markets = HashMap::new();
        let mut offset = 0u32;
        loop {
            let page = self
                .client
                .get_active_markets(SNAPSHOT_PAGE_SIZE, offset)
                .await?;
            let page_len = page.len();

            for market in &page {
                let meta = self.build_meta(market);
                for token_id in market.parse_token_ids() {
                    markets.insert(token_id, meta.clone());
                }
                markets.insert(market.condition_id.clone(), meta);
            }

            if page_len < SNAPSHOT_PAGE_SIZE as usize || markets.len() >= SNAPSHOT_MAX_MARKETS {
                break;
            }
            offset += SNAPSHOT_PAGE_SIZE;
        }

        tracing::info!(entries = markets.len(), "Market metadata snapshot refreshed");
        snapshot.markets = markets;
        snapshot.refreshed_at = Some(Instant::now());
        Ok(())
    }
}

#[async_trait]
impl MarketLookup for GammaMarketSource {
    async fn get(&self, market_id: &str) -> anyhow::Result<Option<MarketMeta>> {
        self.ensure_snapshot().await?;
        let snapshot = self.snapshot.lock().await;
        Ok(snapshot.markets.get(market_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Wallet history via the Data API
// ---------------------------------------------------------------------------

/// [`WalletHistory`] over the Data API trade feed.
pub struct DataHistorySource {
    client: DataClient,
}

impl DataHistorySource {
    pub fn new(client: DataClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WalletHistory for DataHistorySource {
    async fn fetch(&self, wallet: &str, limit: usize) -> anyhow::Result<Vec<HistoryTrade>> {
        let trades = self.client.get_user_trades(wallet, limit).await?;
        Ok(trades
            .iter()
            .filter_map(|t| parse_trade_timestamp(t.timestamp.as_ref()))
            .map(|timestamp| HistoryTrade { timestamp })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Leaderboard snapshot
// ---------------------------------------------------------------------------

pub const TOP_TRADER_COUNT: usize = 25;

struct LeaderboardSnapshot {
    by_wallet: HashMap<String, RankInfo>,
    refreshed_at: Option<Instant>,
}

/// [`Leaderboard`] backed by a cached top-25 snapshot, refreshed on demand
/// when stale and proactively by the refresher service.
pub struct LeaderboardSource {
    client: LeaderboardClient,
    ttl: Duration,
    snapshot: tokio::sync::Mutex<LeaderboardSnapshot>,
}

impl LeaderboardSource {
    pub fn new(client: LeaderboardClient, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            snapshot: tokio::sync::Mutex::new(LeaderboardSnapshot {
                by_wallet: HashMap::new(),
                refreshed_at: None,
            }),
        }
    }

    /// Fetch the top-25 list and rebuild the wallet index.
    pub async fn refresh(&self) -> anyhow::Result<usize> {
        let entries = self.client.top(TOP_TRADER_COUNT).await?;

        let mut by_wallet = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            let Some(address) = entry.address.as_deref() else {
                continue;
            };
            let rank = entry.rank.unwrap_or(idx as u32 + 1);
            if rank as usize > TOP_TRADER_COUNT {
                continue;
            }
            let wallet = address.to_lowercase();
            by_wallet.insert(
                wallet.clone(),
                RankInfo {
                    wallet,
                    rank,
                    pnl: entry.profit_decimal(),
                },
            );
        }

        let count = by_wallet.len();
        let mut snapshot = self.snapshot.lock().await;
        snapshot.by_wallet = by_wallet;
        snapshot.refreshed_at = Some(Instant::now());
        tracing::info!(traders = count, "Leaderboard snapshot refreshed");
        Ok(count)
    }

    async fn ensure_fresh(&self) -> anyhow::Result<()> {
        let stale = {
            let snapshot = self.snapshot.lock().await;
            !snapshot
                .refreshed_at
                .is_some_and(|at| at.elapsed() < self.ttl)
        };
        if stale {
            self.refresh().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Leaderboard for LeaderboardSource {
    async fn lookup(&self, wallet: &str) -> anyhow::Result<Option<RankInfo>> {
        self.ensure_fresh().await?;
        let snapshot = self.snapshot.lock().await;
        Ok(snapshot.by_wallet.get(&wallet.to_lowercase()).cloned())
    }
}
