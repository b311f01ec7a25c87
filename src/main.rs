use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use polywatch::config::{AppConfig, GuildConfigStore, TrackedWalletRegistry};
use polywatch::enrichment::sources::{DataHistorySource, GammaMarketSource, LeaderboardSource};
use polywatch::enrichment::{
    FreshnessCache, MarketMetaCache, RankCache, MARKET_META_TTL, RANK_POSITIVE_TTL,
};
use polywatch::ingestion::pipeline::{run_pipeline, Pipeline};
use polywatch::ingestion::ws_feed::{run_feed, FeedConfig};
use polywatch::ingestion::Deduplicator;
use polywatch::services::dispatcher::{run_dispatcher, QueueSink};
use polywatch::services::refresher::run_refresher;
use polywatch::volatility::{run_volatility, VolatilityConfig, VolatilityTracker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // tokio-tungstenite and reqwest both link rustls; pick one provider.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let _metrics_handle = polywatch::metrics::init_metrics();

    let config = AppConfig::from_env()?;

    let http = reqwest::Client::new();
    let market_source = Arc::new(GammaMarketSource::new(
        polywatch::polymarket::GammaClient::new(http.clone()),
        MARKET_META_TTL,
    ));
    let leaderboard_source = Arc::new(LeaderboardSource::new(
        polywatch::polymarket::LeaderboardClient::new(http.clone()),
        RANK_POSITIVE_TTL,
    ));
    let history_source = Arc::new(DataHistorySource::new(
        polywatch::polymarket::DataClient::new(http),
    ));

    let market_meta = Arc::new(MarketMetaCache::new(market_source.clone()));
    let freshness = Arc::new(FreshnessCache::new(history_source));
    let ranks = Arc::new(RankCache::new(leaderboard_source.clone()));
    let dedup = Arc::new(Deduplicator::new());

    let configs = Arc::new(GuildConfigStore::new());
    configs.upsert(config.routing.clone());

    let tracked = Arc::new(TrackedWalletRegistry::new());
    for wallet in &config.tracked_wallets {
        tracing::info!(
            wallet = %wallet.wallet,
            label = wallet.label.as_deref().unwrap_or("-"),
            "Tracking wallet"
        );
        tracked.track(wallet.clone());
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let (trade_tx, trade_rx) = mpsc::channel(1_000);
    let (sample_tx, sample_rx) = mpsc::channel(1_024);
    let (alert_tx, alert_rx) = mpsc::channel(256);

    let sink = Arc::new(QueueSink::new(alert_tx));

    // --- Feed connector ---
    let feed_config = FeedConfig {
        url: config.ws_url.clone(),
        data_timeout: config.data_timeout,
        max_connection_age: config.max_connection_age,
        backup_connection: config.backup_connection,
    };
    tracing::info!(
        url = %feed_config.url,
        data_timeout_secs = feed_config.data_timeout.as_secs(),
        max_age_secs = feed_config.max_connection_age.as_secs(),
        backup = feed_config.backup_connection,
        "Starting feed connector"
    );
    tokio::spawn(run_feed(feed_config, trade_tx, stop_rx.clone()));

    // --- Ingestion pipeline ---
    let pipeline = Pipeline {
        dedup,
        market_meta,
        freshness,
        ranks,
        configs: configs.clone(),
        tracked,
        sink: sink.clone(),
        sample_tx: Some(sample_tx),
    };
    tokio::spawn(run_pipeline(trade_rx, pipeline, stop_rx.clone()));

    // --- Volatility tracker ---
    let tracker = VolatilityTracker::new(VolatilityConfig {
        blacklist: config.routing.volatility_blacklist.clone(),
        ..VolatilityConfig::default()
    });
    tokio::spawn(run_volatility(
        sample_rx,
        tracker,
        configs,
        sink,
        stop_rx.clone(),
    ));

    // --- Dispatcher + metadata refresher ---
    tokio::spawn(run_dispatcher(alert_rx, stop_rx.clone()));
    tokio::spawn(run_refresher(market_source, leaderboard_source, stop_rx));

    tracing::info!(guild = config.guild_id, "polywatch engine started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    let _ = stop_tx.send(true);
    // Give tasks a moment to observe the stop signal and close sockets.
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
