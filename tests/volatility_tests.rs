mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};

use polywatch::config::{GuildConfigStore, RoutingConfig};
use polywatch::models::{AlertCategory, AlertPayload, ChannelId, PriceSample};
use polywatch::volatility::{run_volatility, Timeframe, VolatilityConfig, VolatilityTracker};

use common::{full_routing_config, ts, CollectingSink, GUILD};

fn sample(market: &str, secs: i64, price_pct: i64, volume: i64) -> PriceSample {
    PriceSample {
        market_id: market.into(),
        title: "Test market".into(),
        price: Decimal::new(price_pct, 2),
        volume: Decimal::from(volume),
        timestamp: ts(secs),
        tags: BTreeSet::new(),
    }
}

/// Drive the volatility task end-to-end: samples in, alerts out through the
/// dispatcher seam.
#[tokio::test]
async fn rapid_move_is_dispatched_to_the_volatility_channel() {
    let sink = Arc::new(CollectingSink::default());
    let configs = Arc::new(GuildConfigStore::new());
    configs.upsert(full_routing_config());

    let tracker =
        VolatilityTracker::with_start(VolatilityConfig::default(), ts(-600));

    let (sample_tx, sample_rx) = mpsc::channel(16);
    let (stop_tx, stop_rx) = watch::channel(false);
    let task = tokio::spawn(run_volatility(
        sample_rx,
        tracker,
        configs,
        sink.clone(),
        stop_rx,
    ));

    for s in [
        sample("m1", 0, 50, 700),
        sample("m1", 60, 50, 700),
        sample("m1", 120, 50, 700),
        sample("m1", 180, 56, 980),
    ] {
        sample_tx.send(s).await.unwrap();
    }

    // Let the task drain the queue.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = stop_tx.send(true);
    task.await.unwrap();

    let alerts = sink.alerts();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.category, AlertCategory::Volatility);
    assert_eq!(alert.channel, ChannelId(8));
    assert_eq!(alert.guild_id, GUILD);

    let AlertPayload::Volatility(snapshot) = &alert.payload else {
        panic!("expected volatility payload");
    };
    assert_eq!(snapshot.timeframe, Timeframe::M5);
    assert_eq!(snapshot.timeframe.urgency(), "RAPID");
    assert_eq!(snapshot.change_points, Decimal::from(6));
}

#[tokio::test]
async fn guild_without_volatility_channel_receives_nothing() {
    let sink = Arc::new(CollectingSink::default());
    let configs = Arc::new(GuildConfigStore::new());
    // Guild bound only to a whale channel, no volatility and no default.
    let mut config = RoutingConfig::defaults(GUILD);
    config.whale_channel = Some(ChannelId(2));
    configs.upsert(config);

    let tracker =
        VolatilityTracker::with_start(VolatilityConfig::default(), ts(-600));

    let (sample_tx, sample_rx) = mpsc::channel(16);
    let (stop_tx, stop_rx) = watch::channel(false);
    let task = tokio::spawn(run_volatility(
        sample_rx,
        tracker,
        configs,
        sink.clone(),
        stop_rx,
    ));

    for s in [
        sample("m1", 0, 50, 700),
        sample("m1", 60, 50, 700),
        sample("m1", 120, 50, 700),
        sample("m1", 180, 56, 980),
    ] {
        sample_tx.send(s).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = stop_tx.send(true);
    task.await.unwrap();

    assert!(sink.alerts().is_empty());
}

#[tokio::test]
async fn blacklisted_tags_opt_the_market_out() {
    let sink = Arc::new(CollectingSink::default());
    let configs = Arc::new(GuildConfigStore::new());
    configs.upsert(full_routing_config());

    let config = VolatilityConfig {
        blacklist: BTreeSet::from(["crypto".to_string()]),
        ..VolatilityConfig::default()
    };
    let tracker = VolatilityTracker::with_start(config, ts(-600));

    let (sample_tx, sample_rx) = mpsc::channel(16);
    let (stop_tx, stop_rx) = watch::channel(false);
    let task = tokio::spawn(run_volatility(
        sample_rx,
        tracker,
        configs,
        sink.clone(),
        stop_rx,
    ));

    for secs in [0, 60, 120] {
        let mut s = sample("m1", secs, 50, 700);
        s.tags.insert("crypto".into());
        sample_tx.send(s).await.unwrap();
    }
    let mut spike = sample("m1", 180, 56, 980);
    spike.tags.insert("crypto".into());
    sample_tx.send(spike).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let _ = stop_tx.send(true);
    task.await.unwrap();

    assert!(sink.alerts().is_empty());
}
