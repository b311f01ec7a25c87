use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::models::{AlertCategory, ChannelId, TrackedWallet};

const DEFAULT_WS_URL: &str = "wss://ws-live-data.polymarket.com";

// ---------------------------------------------------------------------------
// Per-guild routing configuration
// ---------------------------------------------------------------------------

/// Thresholds, channel bindings and the volatility blacklist for one
/// destination group. Resolved once per trade; missing guilds fall back to
/// the defaults, never to an error.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub guild_id: u64,
    pub is_paused: bool,

    pub whale_threshold: Decimal,
    pub fresh_wallet_threshold: Decimal,
    pub sports_threshold: Decimal,
    pub top_trader_threshold: Decimal,

    /// Group-default channel, used when no per-category binding exists.
    pub alert_channel: Option<ChannelId>,
    pub whale_channel: Option<ChannelId>,
    pub fresh_wallet_channel: Option<ChannelId>,
    pub sports_channel: Option<ChannelId>,
    pub top_trader_channel: Option<ChannelId>,
    pub bonds_channel: Option<ChannelId>,
    pub tracked_wallet_channel: Option<ChannelId>,
    pub volatility_channel: Option<ChannelId>,

    /// Markets whose tags intersect this set are excluded from the
    /// volatility pipeline.
    pub volatility_blacklist: BTreeSet<String>,
}

impl RoutingConfig {
    pub fn defaults(guild_id: u64) -> Self {
        Self {
            guild_id,
            is_paused: false,
            whale_threshold: Decimal::from(10_000),
            fresh_wallet_threshold: Decimal::from(10_000),
            sports_threshold: Decimal::from(5_000),
            top_trader_threshold: Decimal::from(1_000),
            alert_channel: None,
            whale_channel: None,
            fresh_wallet_channel: None,
            sports_channel: None,
            top_trader_channel: None,
            bonds_channel: None,
            tracked_wallet_channel: None,
            volatility_channel: None,
            volatility_blacklist: BTreeSet::new(),
        }
    }

    /// Resolve the destination for a category: per-category binding first,
    /// group default second.
    pub fn channel_for(&self, category: AlertCategory) -> Option<ChannelId> {
        let bound = match category {
            AlertCategory::Whale => self.whale_channel,
            AlertCategory::FreshWallet => self.fresh_wallet_channel,
            AlertCategory::Sports => self.sports_channel,
            AlertCategory::TopTrader => self.top_trader_channel,
            AlertCategory::Bond => self.bonds_channel,
            AlertCategory::Tracked => self.tracked_wallet_channel,
            AlertCategory::Volatility => self.volatility_channel,
        };
        bound.or(self.alert_channel)
    }

    /// True when at least one destination is bound.
    pub fn has_destination(&self) -> bool {
        self.alert_channel.is_some()
            || self.whale_channel.is_some()
            || self.fresh_wallet_channel.is_some()
            || self.sports_channel.is_some()
            || self.top_trader_channel.is_some()
            || self.bonds_channel.is_some()
            || self.tracked_wallet_channel.is_some()
            || self.volatility_channel.is_some()
    }
}

/// Cached per-guild configs with default fallback.
pub struct GuildConfigStore {
    configs: Mutex<HashMap<u64, Arc<RoutingConfig>>>,
}

impl Default for GuildConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GuildConfigStore {
    pub fn new() -> Self {
        Self {
            configs: Mutex::new(HashMap::new()),
        }
    }

    pub fn upsert(&self, config: RoutingConfig) {
        let mut configs = self.configs.lock().unwrap();
        configs.insert(config.guild_id, Arc::new(config));
    }

    /// Config for a guild; defaults when none is stored.
    pub fn for_guild(&self, guild_id: u64) -> Arc<RoutingConfig> {
        let configs = self.configs.lock().unwrap();
        configs
            .get(&guild_id)
            .cloned()
            .unwrap_or_else(|| Arc::new(RoutingConfig::defaults(guild_id)))
    }

    /// Guilds with at least one destination bound and alerts not paused.
    pub fn active_guilds(&self) -> Vec<Arc<RoutingConfig>> {
        let configs = self.configs.lock().unwrap();
        configs
            .values()
            .filter(|c| !c.is_paused && c.has_destination())
            .cloned()
            .collect()
    }

    pub fn set_paused(&self, guild_id: u64, paused: bool) {
        let mut configs = self.configs.lock().unwrap();
        if let Some(existing) = configs.get(&guild_id) {
            let mut updated = (**existing).clone();
            updated.is_paused = paused;
            configs.insert(guild_id, Arc::new(updated));
        }
    }
}

// ---------------------------------------------------------------------------
// Tracked wallets
// ---------------------------------------------------------------------------

/// Per-guild tracked wallet lists. Wallet keys are lower-cased.
pub struct TrackedWalletRegistry {
    by_guild: Mutex<HashMap<u64, HashMap<String, TrackedWallet>>>,
}

impl Default for TrackedWalletRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackedWalletRegistry {
    pub fn new() -> Self {
        Self {
            by_guild: Mutex::new(HashMap::new()),
        }
    }

    pub fn track(&self, wallet: TrackedWallet) {
        let mut by_guild = self.by_guild.lock().unwrap();
        by_guild
            .entry(wallet.guild_id)
            .or_default()
            .insert(wallet.wallet.to_lowercase(), wallet);
    }

    pub fn untrack(&self, guild_id: u64, wallet: &str) -> bool {
        let mut by_guild = self.by_guild.lock().unwrap();
        by_guild
            .get_mut(&guild_id)
            .map(|wallets| wallets.remove(&wallet.to_lowercase()).is_some())
            .unwrap_or(false)
    }

    pub fn lookup(&self, guild_id: u64, wallet: &str) -> Option<TrackedWallet> {
        let by_guild = self.by_guild.lock().unwrap();
        by_guild
            .get(&guild_id)
            .and_then(|wallets| wallets.get(&wallet.to_lowercase()))
            .cloned()
    }
}

// ---------------------------------------------------------------------------
// Process configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ws_url: String,
    pub backup_connection: bool,
    pub data_timeout: Duration,
    pub max_connection_age: Duration,

    pub guild_id: u64,
    pub routing: RoutingConfig,
    /// Seed tracked wallets, parsed from `TRACKED_WALLETS=wallet[:label],...`
    pub tracked_wallets: Vec<TrackedWallet>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let guild_id: u64 = env::var("GUILD_ID")
            .unwrap_or_else(|_| "0".into())
            .parse()?;

        let mut routing = RoutingConfig::defaults(guild_id);
        routing.whale_threshold = decimal_env("WHALE_THRESHOLD", routing.whale_threshold);
        routing.fresh_wallet_threshold =
            decimal_env("FRESH_WALLET_THRESHOLD", routing.fresh_wallet_threshold);
        routing.sports_threshold = decimal_env("SPORTS_THRESHOLD", routing.sports_threshold);
        routing.top_trader_threshold =
            decimal_env("TOP_TRADER_THRESHOLD", routing.top_trader_threshold);

        routing.alert_channel = channel_env("ALERT_CHANNEL_ID");
        routing.whale_channel = channel_env("WHALE_CHANNEL_ID");
        routing.fresh_wallet_channel = channel_env("FRESH_WALLET_CHANNEL_ID");
        routing.sports_channel = channel_env("SPORTS_CHANNEL_ID");
        routing.top_trader_channel = channel_env("TOP_TRADER_CHANNEL_ID");
        routing.bonds_channel = channel_env("BONDS_CHANNEL_ID");
        routing.tracked_wallet_channel = channel_env("TRACKED_WALLET_CHANNEL_ID");
        routing.volatility_channel = channel_env("VOLATILITY_CHANNEL_ID");

        routing.volatility_blacklist = env::var("VOLATILITY_BLACKLIST")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let tracked_wallets = env::var("TRACKED_WALLETS")
            .unwrap_or_default()
            .split(',')
            .filter_map(|entry| {
                let entry = entry.trim();
                if entry.is_empty() {
                    return None;
                }
                let (wallet, label) = match entry.split_once(':') {
                    Some((w, l)) => (w, Some(l.to_string())),
                    None => (entry, None),
                };
                Some(TrackedWallet {
                    guild_id,
                    wallet: wallet.to_lowercase(),
                    label,
                    added_at: Utc::now(),
                })
            })
            .collect();

        Ok(Self {
            ws_url: env::var("POLYMARKET_WS_URL").unwrap_or_else(|_| DEFAULT_WS_URL.into()),
            backup_connection: env::var("WS_BACKUP_CONNECTION")
                .unwrap_or_else(|_| "true".into())
                .parse()
                .unwrap_or(true),
            data_timeout: secs_env("WS_DATA_TIMEOUT_SECS", 120),
            max_connection_age: secs_env("WS_MAX_CONNECTION_AGE_SECS", 900),
            guild_id,
            routing,
            tracked_wallets,
        })
    }
}

fn decimal_env(key: &str, default: Decimal) -> Decimal {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn channel_env(key: &str) -> Option<ChannelId> {
    env::var(key).ok().and_then(|v| v.parse().ok()).map(ChannelId)
}

fn secs_env(key: &str, default: u64) -> Duration {
    let secs = env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}
