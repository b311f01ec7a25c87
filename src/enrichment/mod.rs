pub mod sources;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::errors::IngestError;
use crate::models::{HistoryTrade, MarketMeta, RankInfo};

/// Market metadata TTL.
pub const MARKET_META_TTL: Duration = Duration::from_secs(300);
/// Wallet-history verdict TTL.
pub const WALLET_HISTORY_TTL: Duration = Duration::from_secs(300);
/// Positive leaderboard-rank TTL.
pub const RANK_POSITIVE_TTL: Duration = Duration::from_secs(600);
/// Negative leaderboard-rank TTL. Negative lookups dominate volume and
/// rarely change within a day.
pub const RANK_NEGATIVE_TTL: Duration = Duration::from_secs(86_400);
/// Bound on every external enrichment lookup. On expiry the caches answer
/// with a conservative default instead of blocking the pipeline.
pub const ENRICH_TIMEOUT: Duration = Duration::from_secs(3);
/// Sample size for the authoritative freshness check. Too small a sample is
/// a known source of false "fresh wallet" positives.
pub const HISTORY_SAMPLE: usize = 10;

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

#[async_trait]
pub trait MarketLookup: Send + Sync {
    async fn get(&self, market_id: &str) -> anyhow::Result<Option<MarketMeta>>;
}

#[async_trait]
pub trait WalletHistory: Send + Sync {
    /// Most recent trades for a wallet, newest first.
    async fn fetch(&self, wallet: &str, limit: usize) -> anyhow::Result<Vec<HistoryTrade>>;
}

#[async_trait]
pub trait Leaderboard: Send + Sync {
    async fn lookup(&self, wallet: &str) -> anyhow::Result<Option<RankInfo>>;
}

// ---------------------------------------------------------------------------
// Market metadata cache
// ---------------------------------------------------------------------------

struct CachedMeta {
    meta: MarketMeta,
    fetched_at: Instant,
}

/// Short-TTL cache over [`MarketLookup`]. Timeout or miss resolves to
/// [`MarketMeta::unknown`]: guessing sports would suppress legitimate whale
/// alerts, guessing non-sports cannot.
pub struct MarketMetaCache {
    source: Arc<dyn MarketLookup>,
    ttl: Duration,
    lookup_timeout: Duration,
    entries: Mutex<HashMap<String, CachedMeta>>,
}

impl MarketMetaCache {
    pub fn new(source: Arc<dyn MarketLookup>) -> Self {
        Self::with_limits(source, MARKET_META_TTL, ENRICH_TIMEOUT)
    }

    pub fn with_limits(source: Arc<dyn MarketLookup>, ttl: Duration, lookup_timeout: Duration) -> Self {
        Self {
            source,
            ttl,
            lookup_timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, market_id: &str) -> MarketMeta {
        {
            let entries = self.entries.lock().unwrap();
            if let Some(cached) = entries.get(market_id) {
                if cached.fetched_at.elapsed() < self.ttl {
                    return cached.meta.clone();
                }
            }
        }

        match timeout(self.lookup_timeout, self.source.get(market_id)).await {
            Ok(Ok(Some(meta))) => {
                self.store(market_id, meta.clone());
                meta
            }
            Ok(Ok(None)) => {
                // Unknown market: cache the negative so we do not re-query
                // on every trade of an unindexed market.
                let meta = MarketMeta::unknown(market_id);
                self.store(market_id, meta.clone());
                meta
            }
            Ok(Err(e)) => {
                counter!("enrichment_errors_total").increment(1);
                tracing::warn!(error = %e, market = %market_id, "Market lookup failed, assuming non-sports");
                MarketMeta::unknown(market_id)
            }
            Err(_) => {
                counter!("enrichment_timeouts_total").increment(1);
                let err = IngestError::EnrichmentTimeout(self.lookup_timeout);
                tracing::warn!(error = %err, market = %market_id, "Assuming non-sports");
                MarketMeta::unknown(market_id)
            }
        }
    }

    fn store(&self, market_id: &str, meta: MarketMeta) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            market_id.to_string(),
            CachedMeta {
                meta,
                fetched_at: Instant::now(),
            },
        );
    }
}

// ---------------------------------------------------------------------------
// Freshness cache
// ---------------------------------------------------------------------------

/// Determines whether a wallet is trading for the first time.
///
/// The authoritative answer is always the external history fetch: pull the
/// wallet's most recent [`HISTORY_SAMPLE`] trades, drop any whose timestamp
/// is at or after the current trade (the in-flight trade must not count as
/// its own history), and the wallet is fresh iff nothing remains.
///
/// The first-seen ledger is an optimization hint only. "Seen before" lets
/// us skip the external call; "never seen" always goes to the source.
pub struct FreshnessCache {
    history: Arc<dyn WalletHistory>,
    ttl: Duration,
    lookup_timeout: Duration,
    first_seen: Mutex<HashMap<String, DateTime<Utc>>>,
    verdicts: Mutex<HashMap<String, (bool, Instant)>>,
}

impl FreshnessCache {
    pub fn new(history: Arc<dyn WalletHistory>) -> Self {
        Self::with_limits(history, WALLET_HISTORY_TTL, ENRICH_TIMEOUT)
    }

    pub fn with_limits(history: Arc<dyn WalletHistory>, ttl: Duration, lookup_timeout: Duration) -> Self {
        Self {
            history,
            ttl,
            lookup_timeout,
            first_seen: Mutex::new(HashMap::new()),
            verdicts: Mutex::new(HashMap::new()),
        }
    }

    /// `trade_ts` is the timestamp of the trade being classified; it is
    /// excluded from the wallet's own history.
    pub async fn is_fresh(&self, wallet: &str, trade_ts: DateTime<Utc>) -> bool {
        let wallet = wallet.to_lowercase();

        // Hint: a wallet this process already handled cannot be fresh.
        let already_seen = {
            let ledger = self.first_seen.lock().unwrap();
            ledger.contains_key(&wallet)
        };
        if already_seen {
            self.record_seen(&wallet, trade_ts);
            return false;
        }

        if let Some(has_prior) = self.cached_verdict(&wallet) {
            self.record_seen(&wallet, trade_ts);
            return !has_prior;
        }

        let has_prior = match timeout(
            self.lookup_timeout,
            self.history.fetch(&wallet, HISTORY_SAMPLE),
        )
        .await
        {
            Ok(Ok(trades)) => {
                let prior = trades.iter().filter(|t| t.timestamp < trade_ts).count();
                self.store_verdict(&wallet, prior > 0);
                prior > 0
            }
            Ok(Err(e)) => {
                counter!("enrichment_errors_total").increment(1);
                tracing::warn!(error = %e, wallet = %wallet, "History lookup failed, assuming not fresh");
                true
            }
            Err(_) => {
                counter!("enrichment_timeouts_total").increment(1);
                let err = IngestError::EnrichmentTimeout(self.lookup_timeout);
                tracing::warn!(error = %err, wallet = %wallet, "Assuming not fresh");
                // No confirmation means no fresh-wallet alert.
                true
            }
        };

        self.record_seen(&wallet, trade_ts);
        !has_prior
    }

    fn cached_verdict(&self, wallet: &str) -> Option<bool> {
        let verdicts = self.verdicts.lock().unwrap();
        verdicts
            .get(wallet)
            .filter(|(_, at)| at.elapsed() < self.ttl)
            .map(|(has_prior, _)| *has_prior)
    }

    fn store_verdict(&self, wallet: &str, has_prior: bool) {
        let mut verdicts = self.verdicts.lock().unwrap();
        verdicts.insert(wallet.to_string(), (has_prior, Instant::now()));
    }

    fn record_seen(&self, wallet: &str, trade_ts: DateTime<Utc>) {
        let mut ledger = self.first_seen.lock().unwrap();
        ledger.entry(wallet.to_string()).or_insert(trade_ts);
    }

    /// First-seen timestamp from the local ledger, if any.
    pub fn first_seen(&self, wallet: &str) -> Option<DateTime<Utc>> {
        let ledger = self.first_seen.lock().unwrap();
        ledger.get(&wallet.to_lowercase()).copied()
    }
}

// ---------------------------------------------------------------------------
// Leaderboard rank cache
// ---------------------------------------------------------------------------

/// Two-layer rank cache: positives expire quickly (ranks shift intraday),
/// negatives live a day (almost every wallet is not top-25 and stays that
/// way). Timeout default is not-top-25.
pub struct RankCache {
    source: Arc<dyn Leaderboard>,
    positive_ttl: Duration,
    negative_ttl: Duration,
    lookup_timeout: Duration,
    positive: Mutex<HashMap<String, (RankInfo, Instant)>>,
    negative: Mutex<HashMap<String, Instant>>,
}

impl RankCache {
    pub fn new(source: Arc<dyn Leaderboard>) -> Self {
        Self::with_limits(source, RANK_POSITIVE_TTL, RANK_NEGATIVE_TTL, ENRICH_TIMEOUT)
    }

    pub fn with_limits(
        source: Arc<dyn Leaderboard>,
        positive_ttl: Duration,
        negative_ttl: Duration,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            source,
            positive_ttl,
            negative_ttl,
            lookup_timeout,
            positive: Mutex::new(HashMap::new()),
            negative: Mutex::new(HashMap::new()),
        }
    }

    pub async fn rank(&self, wallet: &str) -> Option<RankInfo> {
        let wallet = wallet.to_lowercase();

        {
            let positive = self.positive.lock().unwrap();
            if let Some((info, at)) = positive.get(&wallet) {
                if at.elapsed() < self.positive_ttl {
                    return Some(info.clone());
                }
            }
        }
        {
            let negative = self.negative.lock().unwrap();
            if let Some(at) = negative.get(&wallet) {
                if at.elapsed() < self.negative_ttl {
                    return None;
                }
            }
        }

        match timeout(self.lookup_timeout, self.source.lookup(&wallet)).await {
            Ok(Ok(Some(info))) => {
                let mut positive = self.positive.lock().unwrap();
                positive.insert(wallet, (info.clone(), Instant::now()));
                Some(info)
            }
            Ok(Ok(None)) => {
                let mut negative = self.negative.lock().unwrap();
                negative.insert(wallet, Instant::now());
                None
            }
            Ok(Err(e)) => {
                counter!("enrichment_errors_total").increment(1);
                tracing::warn!(error = %e, wallet = %wallet, "Rank lookup failed, assuming not top-25");
                None
            }
            Err(_) => {
                counter!("enrichment_timeouts_total").increment(1);
                let err = IngestError::EnrichmentTimeout(self.lookup_timeout);
                tracing::warn!(error = %err, wallet = %wallet, "Assuming not top-25");
                None
            }
        }
    }
}
