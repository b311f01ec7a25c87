use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::config::GuildConfigStore;
use crate::models::{AlertCategory, AlertEvent, AlertPayload, PriceSample, VolatilitySnapshot};
use crate::services::dispatcher::AlertSink;

/// Rolling timeframes, shortest first. Order is the precedence order: when
/// several timeframes trigger on the same sample, the shortest one wins the
/// emission and suppresses the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    M5,
    M15,
    M60,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::M5, Timeframe::M15, Timeframe::M60];

    pub fn span(&self) -> Duration {
        match self {
            Timeframe::M5 => Duration::minutes(5),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::M60 => Duration::minutes(60),
        }
    }

    /// Urgency label shown downstream.
    pub fn urgency(&self) -> &'static str {
        match self {
            Timeframe::M5 => "RAPID",
            Timeframe::M15 => "Fast",
            Timeframe::M60 => "Swing",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::M5 => f.write_str("5m"),
            Timeframe::M15 => f.write_str("15m"),
            Timeframe::M60 => f.write_str("60m"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VolatilityConfig {
    /// Absolute move vs the window VWAP, in points on the 0–100 scale.
    pub price_change_threshold: Decimal,
    /// Minimum total window volume in USD.
    pub min_volume: Decimal,
    /// Minimum number of prior samples in the window.
    pub min_trades: usize,
    /// The triggering sample's volume must exceed the trailing average by
    /// this factor (spike confirmation).
    pub spike_ratio: Decimal,
    pub cooldown: Duration,
    pub warmup: Duration,
    /// Markets carrying any of these tags are excluded entirely.
    pub blacklist: BTreeSet<String>,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            price_change_threshold: Decimal::from(5),
            min_volume: Decimal::from(2_000),
            min_trades: 3,
            spike_ratio: Decimal::new(13, 1),
            cooldown: Duration::minutes(15),
            warmup: Duration::minutes(5),
            blacklist: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    timestamp: DateTime<Utc>,
    price: Decimal,
    volume: Decimal,
}

struct WindowMove {
    vwap: Decimal,
    change_points: Decimal,
    total_volume: Decimal,
}

/// Rolling window state: bounded sample queue plus VWAP accumulators
/// maintained incrementally on push/evict. Decimal arithmetic is exact, so
/// the running sums never drift from the queue contents.
#[derive(Default)]
struct Window {
    samples: VecDeque<Sample>,
    sum_price_volume: Decimal,
    sum_volume: Decimal,
    cooldown_until: Option<DateTime<Utc>>,
}

impl Window {
    fn push(&mut self, sample: Sample) {
        self.sum_price_volume += sample.price * sample.volume;
        self.sum_volume += sample.volume;
        self.samples.push_back(sample);
    }

    fn evict_before(&mut self, cutoff: DateTime<Utc>) {
        while let Some(front) = self.samples.front() {
            if front.timestamp >= cutoff {
                break;
            }
            let evicted = *front;
            self.samples.pop_front();
            self.sum_price_volume -= evicted.price * evicted.volume;
            self.sum_volume -= evicted.volume;
        }
    }

    /// Evaluate the trigger condition for an incoming sample against the
    /// samples already in the window (the incoming sample is the "current
    /// price", the window is the baseline).
    fn evaluate(&self, current: &Sample, config: &VolatilityConfig) -> Option<WindowMove> {
        if self.samples.len() < config.min_trades {
            return None;
        }

        let prior_volume = self.sum_volume;
        if prior_volume.is_zero() {
            return None;
        }
        let total_volume = prior_volume + current.volume;
        if total_volume < config.min_volume {
            return None;
        }

        let vwap = self.sum_price_volume / prior_volume;

        // Near-certain baselines produce meaningless percentage swings.
        if vwap <= Decimal::new(1, 2) || vwap >= Decimal::new(99, 2) {
            return None;
        }

        let change_points = (current.price - vwap) * Decimal::from(100);
        if change_points.abs() < config.price_change_threshold {
            return None;
        }

        // Spike confirmation: the move must come with unusual volume.
        let trailing_avg = prior_volume / Decimal::from(self.samples.len() as i64);
        if current.volume < config.spike_ratio * trailing_avg {
            return None;
        }

        Some(WindowMove {
            vwap,
            change_points,
            total_volume,
        })
    }
}

/// Multi-timeframe volatility detector, keyed by `(market, timeframe)`.
///
/// Fed by a price/volume side-stream derived from trades; emits at most one
/// snapshot per observed sample.
pub struct VolatilityTracker {
    config: VolatilityConfig,
    started_at: DateTime<Utc>,
    windows: HashMap<(String, Timeframe), Window>,
}

impl VolatilityTracker {
    pub fn new(config: VolatilityConfig) -> Self {
        Self::with_start(config, Utc::now())
    }

    pub fn with_start(config: VolatilityConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            config,
            started_at,
            windows: HashMap::new(),
        }
    }

    /// Push one sample through every timeframe window and return the
    /// highest-urgency snapshot it produced, if any.
    pub fn observe(&mut self, sample: &PriceSample) -> Option<VolatilitySnapshot> {
        if sample.tags.iter().any(|t| self.config.blacklist.contains(t)) {
            return None;
        }

        // Rolling windows start empty; give them representative history
        // before trusting them.
        let warmed_up = sample.timestamp - self.started_at >= self.config.warmup;

        let incoming = Sample {
            timestamp: sample.timestamp,
            price: sample.price,
            volume: sample.volume,
        };

        let mut fired: Option<VolatilitySnapshot> = None;
        for timeframe in Timeframe::ALL {
            let window = self
                .windows
                .entry((sample.market_id.clone(), timeframe))
                .or_default();
            window.evict_before(sample.timestamp - timeframe.span());

            if warmed_up {
                if let Some(window_move) = window.evaluate(&incoming, &self.config) {
                    let cooling = window
                        .cooldown_until
                        .is_some_and(|until| sample.timestamp < until);
                    if !cooling {
                        window.cooldown_until = Some(sample.timestamp + self.config.cooldown);
                        // Shortest timeframe wins; longer ones that also
                        // triggered only enter cooldown.
                        if fired.is_none() {
                            fired = Some(VolatilitySnapshot {
                                market_id: sample.market_id.clone(),
                                title: sample.title.clone(),
                                timeframe,
                                baseline: window_move.vwap,
                                current_price: sample.price,
                                change_points: window_move.change_points,
                                window_volume: window_move.total_volume,
                                triggered_at: sample.timestamp,
                            });
                        }
                    }
                }
            }

            window.push(incoming);
        }

        fired
    }
}

/// Consume price samples and dispatch volatility alerts per guild.
pub async fn run_volatility(
    mut rx: mpsc::Receiver<PriceSample>,
    mut tracker: VolatilityTracker,
    configs: Arc<GuildConfigStore>,
    sink: Arc<dyn AlertSink>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            sample = rx.recv() => {
                let Some(sample) = sample else {
                    tracing::warn!("Price sample channel closed");
                    break;
                };
                let Some(snapshot) = tracker.observe(&sample) else {
                    continue;
                };
                counter!("volatility_alerts_total").increment(1);
                tracing::info!(
                    market = %snapshot.market_id,
                    timeframe = %snapshot.timeframe,
                    urgency = snapshot.timeframe.urgency(),
                    change = %snapshot.change_points,
                    "Volatility trigger"
                );
                for config in configs.active_guilds() {
                    let Some(channel) = config.channel_for(AlertCategory::Volatility) else {
                        continue;
                    };
                    let alert = AlertEvent::new(
                        config.guild_id,
                        AlertCategory::Volatility,
                        channel,
                        AlertPayload::Volatility(snapshot.clone()),
                    );
                    sink.deliver(alert).await;
                }
            }
            _ = stop.changed() => break,
        }
    }
    tracing::info!("Volatility tracker stopped");
}
