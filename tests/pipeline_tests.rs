mod common;

use chrono::Duration;
use chrono::Utc;

use polywatch::config::RoutingConfig;
use polywatch::models::{AlertCategory, ChannelId, TrackedWallet};

use common::{
    full_routing_config, make_trade, pipeline_harness, ts, FakeLeaderboard, FakeMarketLookup,
    FakeWalletHistory, GUILD,
};

#[tokio::test]
async fn replaying_the_same_tx_id_emits_exactly_once() {
    // Wallet has prior history so it routes as a plain whale.
    let mut history = FakeWalletHistory::default();
    history.by_wallet.insert(
        "0xwhale".into(),
        vec![polywatch::models::HistoryTrade { timestamp: ts(100) }],
    );
    let harness = pipeline_harness(
        FakeMarketLookup::default(),
        history,
        FakeLeaderboard::default(),
    );

    let trade = make_trade("0xaaa", "0xWHALE", "cond-1", 50, 15_000, ts(1_000));

    harness.pipeline.process_trade(&trade).await.unwrap();
    // The venue redelivers the same fill after a reconnect.
    harness.pipeline.process_trade(&trade).await.unwrap();

    let alerts = harness.sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].category, AlertCategory::Whale);
}

#[tokio::test]
async fn plain_large_trade_routes_to_whale_channel() {
    let mut history = FakeWalletHistory::default();
    history.by_wallet.insert(
        "0xwhale".into(),
        vec![polywatch::models::HistoryTrade { timestamp: ts(100) }],
    );
    let harness = pipeline_harness(
        FakeMarketLookup::default(),
        history,
        FakeLeaderboard::default(),
    );

    let trade = make_trade("0xaaa", "0xWHALE", "cond-1", 50, 15_000, ts(1_000));
    harness.pipeline.process_trade(&trade).await.unwrap();

    let alerts = harness.sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].category, AlertCategory::Whale);
    assert_eq!(alerts[0].channel, ChannelId(2));
    assert_eq!(alerts[0].guild_id, GUILD);
}

#[tokio::test]
async fn sports_trade_routes_to_sports_channel_never_whale() {
    let mut history = FakeWalletHistory::default();
    history.by_wallet.insert(
        "0xfan".into(),
        vec![polywatch::models::HistoryTrade { timestamp: ts(100) }],
    );
    let harness = pipeline_harness(
        FakeMarketLookup::with_sports("cond-nba"),
        history,
        FakeLeaderboard::default(),
    );

    let trade = make_trade("0xbbb", "0xFAN", "cond-nba", 50, 15_000, ts(1_000));
    harness.pipeline.process_trade(&trade).await.unwrap();

    let alerts = harness.sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].category, AlertCategory::Sports);
    assert_eq!(alerts[0].channel, ChannelId(4));
}

#[tokio::test]
async fn bond_priced_trade_routes_to_bonds_channel() {
    let mut history = FakeWalletHistory::default();
    history.by_wallet.insert(
        "0xbond".into(),
        vec![polywatch::models::HistoryTrade { timestamp: ts(100) }],
    );
    let harness = pipeline_harness(
        FakeMarketLookup::default(),
        history,
        FakeLeaderboard::default(),
    );

    let trade = make_trade("0xccc", "0xBOND", "cond-1", 96, 6_000, ts(1_000));
    harness.pipeline.process_trade(&trade).await.unwrap();

    let alerts = harness.sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].category, AlertCategory::Bond);
    assert_eq!(alerts[0].channel, ChannelId(6));
}

#[tokio::test]
async fn top_trader_wins_even_on_sports_markets() {
    let mut history = FakeWalletHistory::default();
    history.by_wallet.insert(
        "0xtop".into(),
        vec![polywatch::models::HistoryTrade { timestamp: ts(100) }],
    );
    let harness = pipeline_harness(
        FakeMarketLookup::with_sports("cond-nba"),
        history,
        FakeLeaderboard::with_rank("0xTOP", 5),
    );

    let trade = make_trade("0xddd", "0xTOP", "cond-nba", 50, 5_000, ts(1_000));
    harness.pipeline.process_trade(&trade).await.unwrap();

    let alerts = harness.sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].category, AlertCategory::TopTrader);
    assert_eq!(alerts[0].channel, ChannelId(5));
}

#[tokio::test]
async fn unknown_market_defaults_to_non_sports_and_still_alerts() {
    let mut history = FakeWalletHistory::default();
    history.by_wallet.insert(
        "0xwhale".into(),
        vec![polywatch::models::HistoryTrade { timestamp: ts(100) }],
    );
    // Market lookup knows nothing about this market.
    let harness = pipeline_harness(
        FakeMarketLookup::default(),
        history,
        FakeLeaderboard::default(),
    );

    let trade = make_trade("0xeee", "0xWHALE", "cond-unknown", 50, 20_000, ts(1_000));
    harness.pipeline.process_trade(&trade).await.unwrap();

    let alerts = harness.sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].category, AlertCategory::Whale);
}

#[tokio::test]
async fn fresh_wallet_first_trade_alerts_second_does_not() {
    // Empty history: the wallet has never traded before.
    let harness = pipeline_harness(
        FakeMarketLookup::default(),
        FakeWalletHistory::default(),
        FakeLeaderboard::default(),
    );

    let first = make_trade("0xf01", "0xNEW", "cond-1", 50, 15_000, ts(1_000));
    harness.pipeline.process_trade(&first).await.unwrap();

    let second = make_trade("0xf02", "0xNEW", "cond-1", 50, 15_000, ts(2_000));
    harness.pipeline.process_trade(&second).await.unwrap();

    let alerts = harness.sink.alerts();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].category, AlertCategory::FreshWallet);
    assert_eq!(alerts[0].channel, ChannelId(3));
    // Second trade: the wallet now has prior activity, so it is a plain
    // whale at this size.
    assert_eq!(alerts[1].category, AlertCategory::Whale);
}

#[tokio::test]
async fn tracked_wallet_alert_is_additive_to_primary() {
    let mut history = FakeWalletHistory::default();
    history.by_wallet.insert(
        "0xboth".into(),
        vec![polywatch::models::HistoryTrade { timestamp: ts(100) }],
    );
    let harness = pipeline_harness(
        FakeMarketLookup::default(),
        history,
        FakeLeaderboard::default(),
    );
    harness.tracked.track(TrackedWallet {
        guild_id: GUILD,
        wallet: "0xboth".into(),
        label: Some("smart money".into()),
        added_at: ts(500),
    });

    let trade = make_trade("0xggg", "0xBOTH", "cond-1", 50, 15_000, ts(1_000));
    harness.pipeline.process_trade(&trade).await.unwrap();

    let alerts = harness.sink.alerts();
    assert_eq!(alerts.len(), 2);
    let categories: Vec<_> = alerts.iter().map(|a| a.category).collect();
    assert!(categories.contains(&AlertCategory::Whale));
    assert!(categories.contains(&AlertCategory::Tracked));

    let tracked = alerts
        .iter()
        .find(|a| a.category == AlertCategory::Tracked)
        .unwrap();
    assert_eq!(tracked.channel, ChannelId(7));
}

#[tokio::test]
async fn tracked_alert_suppressed_for_trades_before_tracking_began() {
    let mut history = FakeWalletHistory::default();
    history.by_wallet.insert(
        "0xlate".into(),
        vec![polywatch::models::HistoryTrade { timestamp: ts(100) }],
    );
    let harness = pipeline_harness(
        FakeMarketLookup::default(),
        history,
        FakeLeaderboard::default(),
    );
    harness.tracked.track(TrackedWallet {
        guild_id: GUILD,
        wallet: "0xlate".into(),
        label: None,
        added_at: ts(5_000),
    });

    // Observed trade predates the tracking request.
    let trade = make_trade("0xhhh", "0xLATE", "cond-1", 50, 15_000, ts(1_000));
    harness.pipeline.process_trade(&trade).await.unwrap();

    let alerts = harness.sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].category, AlertCategory::Whale);
}

#[tokio::test]
async fn paused_guild_emits_nothing() {
    let mut history = FakeWalletHistory::default();
    history.by_wallet.insert(
        "0xwhale".into(),
        vec![polywatch::models::HistoryTrade { timestamp: ts(100) }],
    );
    let harness = pipeline_harness(
        FakeMarketLookup::default(),
        history,
        FakeLeaderboard::default(),
    );
    harness.configs.set_paused(GUILD, true);

    let trade = make_trade("0xiii", "0xWHALE", "cond-1", 50, 15_000, ts(1_000));
    harness.pipeline.process_trade(&trade).await.unwrap();

    assert!(harness.sink.alerts().is_empty());
}

#[tokio::test]
async fn below_threshold_trade_reaches_an_explicit_no_alert_decision() {
    let mut history = FakeWalletHistory::default();
    history.by_wallet.insert(
        "0xsmall".into(),
        vec![polywatch::models::HistoryTrade { timestamp: ts(100) }],
    );
    let harness = pipeline_harness(
        FakeMarketLookup::default(),
        history,
        FakeLeaderboard::default(),
    );

    let trade = make_trade("0xjjj", "0xSMALL", "cond-1", 50, 500, ts(1_000));
    harness.pipeline.process_trade(&trade).await.unwrap();

    assert!(harness.sink.alerts().is_empty());
}

#[tokio::test]
async fn second_guild_routes_independently() {
    let mut history = FakeWalletHistory::default();
    history.by_wallet.insert(
        "0xwhale".into(),
        vec![polywatch::models::HistoryTrade { timestamp: ts(100) }],
    );
    let harness = pipeline_harness(
        FakeMarketLookup::default(),
        history,
        FakeLeaderboard::default(),
    );

    // Second guild with a higher whale threshold and only a default channel.
    let mut other = RoutingConfig::defaults(2);
    other.whale_threshold = rust_decimal::Decimal::from(50_000);
    other.alert_channel = Some(ChannelId(99));
    harness.configs.upsert(other);

    let trade = make_trade("0xkkk", "0xWHALE", "cond-1", 50, 15_000, ts(1_000));
    harness.pipeline.process_trade(&trade).await.unwrap();

    // Guild 1 fires, guild 2's threshold suppresses.
    let alerts = harness.sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].guild_id, GUILD);
}

#[tokio::test]
async fn tracked_registry_changes_apply_without_restart() {
    let mut history = FakeWalletHistory::default();
    history.by_wallet.insert(
        "0xhot".into(),
        vec![polywatch::models::HistoryTrade { timestamp: ts(100) }],
    );
    let harness = pipeline_harness(
        FakeMarketLookup::default(),
        history,
        FakeLeaderboard::default(),
    );

    let added_at = Utc::now() - Duration::days(1);
    harness.tracked.track(TrackedWallet {
        guild_id: GUILD,
        wallet: "0xhot".into(),
        label: None,
        added_at,
    });

    let small = make_trade("0xlll", "0xHOT", "cond-1", 50, 200, added_at + Duration::hours(1));
    harness.pipeline.process_trade(&small).await.unwrap();

    // Below every threshold, but tracked: exactly the tracked alert fires.
    let alerts = harness.sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].category, AlertCategory::Tracked);

    harness.tracked.untrack(GUILD, "0xhot");
    let next = make_trade("0xmmm", "0xHOT", "cond-1", 50, 200, added_at + Duration::hours(2));
    harness.pipeline.process_trade(&next).await.unwrap();
    assert_eq!(harness.sink.alerts().len(), 1);
}

#[test]
fn full_config_binds_every_category() {
    let config = full_routing_config();
    for category in [
        AlertCategory::Whale,
        AlertCategory::FreshWallet,
        AlertCategory::Sports,
        AlertCategory::Bond,
        AlertCategory::TopTrader,
        AlertCategory::Tracked,
        AlertCategory::Volatility,
    ] {
        assert!(config.channel_for(category).is_some());
    }
}
