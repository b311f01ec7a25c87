use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};

use crate::config::{GuildConfigStore, TrackedWalletRegistry};
use crate::enrichment::{FreshnessCache, MarketMetaCache, RankCache};
use crate::ingestion::Deduplicator;
use crate::intelligence::{classify, route, route_tracked};
use crate::models::{
    AlertCategory, AlertEvent, AlertPayload, PriceSample, TradeEvent, WalletProfile,
};
use crate::services::dispatcher::AlertSink;

/// Everything one trade needs on its way from the feed to the dispatcher.
pub struct Pipeline {
    pub dedup: Arc<Deduplicator>,
    pub market_meta: Arc<MarketMetaCache>,
    pub freshness: Arc<FreshnessCache>,
    pub ranks: Arc<RankCache>,
    pub configs: Arc<GuildConfigStore>,
    pub tracked: Arc<TrackedWalletRegistry>,
    pub sink: Arc<dyn AlertSink>,
    /// Side-stream to the volatility tracker; `None` disables sampling.
    pub sample_tx: Option<mpsc::Sender<PriceSample>>,
}

impl Pipeline {
    /// Process a single trade:
    /// 1. Reject replays via the deduplicator
    /// 2. Feed the volatility side-stream
    /// 3. Resolve enrichment (market meta, freshness, rank)
    /// 4. Classify, route per destination group, dispatch
    ///
    /// Every trade that gets past deduplication reaches an explicit
    /// route-or-no-alert decision; enrichment failures degrade to
    /// conservative defaults inside the caches.
    pub async fn process_trade(&self, event: &TradeEvent) -> anyhow::Result<()> {
        let start = Instant::now();

        if !self.dedup.check_and_mark(&event.tx_id) {
            tracing::debug!(tx_id = %event.tx_id, "Duplicate trade skipped");
            return Ok(());
        }
        counter!("trade_events_total").increment(1);

        let meta = self.market_meta.get(&event.market_id).await;

        if let Some(sample_tx) = &self.sample_tx {
            let sample = PriceSample {
                market_id: event.market_id.clone(),
                title: event.title.clone(),
                price: event.price,
                volume: event.size_usd,
                timestamp: event.timestamp,
                tags: meta.category_tags.clone(),
            };
            // Sampling must never stall classification; a full queue just
            // drops the sample.
            if sample_tx.try_send(sample).is_err() {
                counter!("volatility_samples_dropped_total").increment(1);
            }
        }

        let is_fresh = self.freshness.is_fresh(&event.wallet, event.timestamp).await;
        let profile = WalletProfile {
            wallet: event.wallet.clone(),
            is_fresh: Some(is_fresh),
            first_seen: self
                .freshness
                .first_seen(&event.wallet)
                .unwrap_or(event.timestamp),
        };
        let rank = self.ranks.rank(&event.wallet).await;

        let signals = classify(event, &meta, &profile, rank.as_ref());

        let mut emitted = 0usize;
        for config in self.configs.active_guilds() {
            if let Some((category, channel)) = route(&signals, &config) {
                tracing::info!(
                    guild = config.guild_id,
                    category = %category,
                    channel = %channel,
                    wallet = %event.wallet,
                    value = %event.size_usd,
                    "Alert routed"
                );
                let alert = AlertEvent::new(
                    config.guild_id,
                    category,
                    channel,
                    AlertPayload::Trade {
                        trade: event.clone(),
                        rank: rank.clone(),
                        wallet_label: None,
                    },
                );
                self.sink.deliver(alert).await;
                emitted += 1;
            }

            // Tracked-wallet emission is independent of the primary branch:
            // a trade may produce both.
            if let Some(tracked) = self.tracked.lookup(config.guild_id, &event.wallet) {
                if let Some(channel) = route_tracked(event.timestamp, &tracked, &config) {
                    tracing::info!(
                        guild = config.guild_id,
                        channel = %channel,
                        wallet = %event.wallet,
                        label = tracked.label.as_deref().unwrap_or("-"),
                        "Tracked wallet alert routed"
                    );
                    let alert = AlertEvent::new(
                        config.guild_id,
                        AlertCategory::Tracked,
                        channel,
                        AlertPayload::Trade {
                            trade: event.clone(),
                            rank: rank.clone(),
                            wallet_label: tracked.label.clone(),
                        },
                    );
                    self.sink.deliver(alert).await;
                    emitted += 1;
                }
            }
        }

        if emitted == 0 {
            tracing::debug!(tx_id = %event.tx_id, value = %event.size_usd, "No alert for trade");
        }

        histogram!("pipeline_latency_seconds").record(start.elapsed().as_secs_f64());
        Ok(())
    }
}

/// Consume trades from the feed until the channel closes or the stop signal
/// fires.
pub async fn run_pipeline(
    mut rx: mpsc::Receiver<TradeEvent>,
    pipeline: Pipeline,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    tracing::warn!("Trade channel closed");
                    break;
                };
                if let Err(e) = pipeline.process_trade(&event).await {
                    tracing::error!(error = %e, wallet = %event.wallet, "Pipeline processing failed");
                }
            }
            _ = stop.changed() => break,
        }
    }
    tracing::info!("Pipeline stopped");
}
