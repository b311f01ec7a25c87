use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::TradeSignals;
use crate::config::RoutingConfig;
use crate::models::{AlertCategory, ChannelId, TrackedWallet};

/// Bond alerts have a fixed notional floor regardless of guild settings.
pub fn bond_min_value() -> Decimal {
    Decimal::from(5_000)
}

/// Pick at most one primary category for a trade and resolve its channel.
///
/// The cascade is ordered by priority and every branch is terminal: a trade
/// that matches a branch but has no resolvable channel emits nothing rather
/// than falling through to a lower-priority category.
///
/// Fresh-wallet trades below the fresh threshold are fully suppressed — they
/// do not regain whale eligibility.
pub fn route(
    signals: &TradeSignals,
    config: &RoutingConfig,
) -> Option<(AlertCategory, ChannelId)> {
    let category = if signals.is_top25() && signals.value >= config.top_trader_threshold {
        AlertCategory::TopTrader
    } else if signals.is_sports {
        if signals.value >= config.sports_threshold {
            AlertCategory::Sports
        } else {
            return None;
        }
    } else if signals.is_bond {
        if signals.value >= bond_min_value() {
            AlertCategory::Bond
        } else {
            return None;
        }
    } else if signals.is_fresh {
        if signals.value >= config.fresh_wallet_threshold {
            AlertCategory::FreshWallet
        } else {
            return None;
        }
    } else if signals.value >= config.whale_threshold {
        AlertCategory::Whale
    } else {
        return None;
    };

    config.channel_for(category).map(|channel| (category, channel))
}

/// Tracked-wallet routing, independent of and additive to the primary
/// cascade. Trades observed before the wallet was added are suppressed.
pub fn route_tracked(
    trade_ts: DateTime<Utc>,
    tracked: &TrackedWallet,
    config: &RoutingConfig,
) -> Option<ChannelId> {
    if trade_ts < tracked.added_at {
        return None;
    }
    config.channel_for(AlertCategory::Tracked)
}
