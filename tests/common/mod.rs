// Shared across test binaries; not every target uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use polywatch::config::{GuildConfigStore, RoutingConfig, TrackedWalletRegistry};
use polywatch::enrichment::{
    FreshnessCache, Leaderboard, MarketLookup, MarketMetaCache, RankCache, WalletHistory,
};
use polywatch::ingestion::pipeline::Pipeline;
use polywatch::ingestion::Deduplicator;
use polywatch::models::{
    AlertEvent, ChannelId, HistoryTrade, MarketMeta, RankInfo, Side, TradeEvent,
};
use polywatch::services::dispatcher::AlertSink;

pub const GUILD: u64 = 1;

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Collaborator fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeMarketLookup {
    pub metas: HashMap<String, MarketMeta>,
}

impl FakeMarketLookup {
    pub fn with_sports(market_id: &str) -> Self {
        let mut metas = HashMap::new();
        metas.insert(
            market_id.to_string(),
            MarketMeta {
                market_id: market_id.to_string(),
                is_sports: true,
                category_tags: BTreeSet::from(["sports".to_string()]),
                group_slug: Some("nba".into()),
            },
        );
        Self { metas }
    }
}

#[async_trait]
impl MarketLookup for FakeMarketLookup {
    async fn get(&self, market_id: &str) -> anyhow::Result<Option<MarketMeta>> {
        Ok(self.metas.get(market_id).cloned())
    }
}

#[derive(Default)]
pub struct FakeWalletHistory {
    pub by_wallet: HashMap<String, Vec<HistoryTrade>>,
}

#[async_trait]
impl WalletHistory for FakeWalletHistory {
    async fn fetch(&self, wallet: &str, _limit: usize) -> anyhow::Result<Vec<HistoryTrade>> {
        Ok(self
            .by_wallet
            .get(&wallet.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakeLeaderboard {
    pub ranks: HashMap<String, RankInfo>,
}

impl FakeLeaderboard {
    pub fn with_rank(wallet: &str, rank: u32) -> Self {
        let wallet = wallet.to_lowercase();
        let mut ranks = HashMap::new();
        ranks.insert(
            wallet.clone(),
            RankInfo {
                wallet,
                rank,
                pnl: Decimal::from(2_500_000),
            },
        );
        Self { ranks }
    }
}

#[async_trait]
impl Leaderboard for FakeLeaderboard {
    async fn lookup(&self, wallet: &str) -> anyhow::Result<Option<RankInfo>> {
        Ok(self.ranks.get(&wallet.to_lowercase()).cloned())
    }
}

/// Sink that records everything it is handed.
#[derive(Default)]
pub struct CollectingSink {
    alerts: Mutex<Vec<AlertEvent>>,
}

impl CollectingSink {
    pub fn alerts(&self) -> Vec<AlertEvent> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for CollectingSink {
    async fn deliver(&self, alert: AlertEvent) {
        self.alerts.lock().unwrap().push(alert);
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Guild config with every category bound to its own channel.
pub fn full_routing_config() -> RoutingConfig {
    let mut config = RoutingConfig::defaults(GUILD);
    config.alert_channel = Some(ChannelId(1));
    config.whale_channel = Some(ChannelId(2));
    config.fresh_wallet_channel = Some(ChannelId(3));
    config.sports_channel = Some(ChannelId(4));
    config.top_trader_channel = Some(ChannelId(5));
    config.bonds_channel = Some(ChannelId(6));
    config.tracked_wallet_channel = Some(ChannelId(7));
    config.volatility_channel = Some(ChannelId(8));
    config
}

pub struct PipelineHarness {
    pub pipeline: Pipeline,
    pub sink: Arc<CollectingSink>,
    pub configs: Arc<GuildConfigStore>,
    pub tracked: Arc<TrackedWalletRegistry>,
}

/// Pipeline wired to in-memory fakes; enrichment caches are real, only the
/// external sources are replaced.
pub fn pipeline_harness(
    markets: FakeMarketLookup,
    history: FakeWalletHistory,
    leaderboard: FakeLeaderboard,
) -> PipelineHarness {
    let sink = Arc::new(CollectingSink::default());
    let configs = Arc::new(GuildConfigStore::new());
    configs.upsert(full_routing_config());
    let tracked = Arc::new(TrackedWalletRegistry::new());

    let pipeline = Pipeline {
        dedup: Arc::new(Deduplicator::new()),
        market_meta: Arc::new(MarketMetaCache::with_limits(
            Arc::new(markets),
            Duration::from_secs(300),
            Duration::from_secs(1),
        )),
        freshness: Arc::new(FreshnessCache::with_limits(
            Arc::new(history),
            Duration::from_secs(300),
            Duration::from_secs(1),
        )),
        ranks: Arc::new(RankCache::with_limits(
            Arc::new(leaderboard),
            Duration::from_secs(600),
            Duration::from_secs(600),
            Duration::from_secs(1),
        )),
        configs: configs.clone(),
        tracked: tracked.clone(),
        sink: sink.clone(),
        sample_tx: None,
    };

    PipelineHarness {
        pipeline,
        sink,
        configs,
        tracked,
    }
}

pub fn make_trade(
    tx: &str,
    wallet: &str,
    market: &str,
    price_pct: i64,
    value: i64,
    timestamp: DateTime<Utc>,
) -> TradeEvent {
    let price = Decimal::new(price_pct, 2);
    TradeEvent {
        tx_id: TradeEvent::unique_trade_id(tx, timestamp.timestamp(), wallet, "token-1"),
        wallet: wallet.to_lowercase(),
        market_id: market.to_string(),
        asset_id: "token-1".into(),
        side: Side::Buy,
        price,
        size_usd: Decimal::from(value),
        title: "Test market".into(),
        slug: "test-market".into(),
        event_slug: "test-event".into(),
        outcome: "Yes".into(),
        timestamp,
    }
}
