use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::errors::IngestError;
use crate::models::{Side, TradeEvent};
use crate::polymarket::types::{decimal_field, parse_trade_timestamp, RtdsMessage, RtdsSubscribe};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Health-check cadence for the active connection.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);
/// How often a missing backup connection is re-established.
const BACKUP_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30);
/// Retries before backoff kicks in.
const IMMEDIATE_RETRIES: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    /// Silence on the data stream longer than this forces a reconnect.
    pub data_timeout: Duration,
    /// Connections are rotated at this age even when healthy, to pre-empt a
    /// known upstream long-lived-connection freeze.
    pub max_connection_age: Duration,
    /// Keep a warm backup connection for gapless failover.
    pub backup_connection: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "wss://ws-live-data.polymarket.com".into(),
            data_timeout: Duration::from_secs(120),
            max_connection_age: Duration::from_secs(900),
            backup_connection: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Connection state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Subscribed,
    Degraded,
    Reconnecting,
    Failed,
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnState::Disconnected => "disconnected",
            ConnState::Connecting => "connecting",
            ConnState::Subscribed => "subscribed",
            ConnState::Degraded => "degraded",
            ConnState::Reconnecting => "reconnecting",
            ConnState::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn set_state(state: &mut ConnState, next: ConnState) {
    if *state != next {
        tracing::info!(from = %state, to = %next, "Feed connector state change");
        *state = next;
    }
}

/// Verdict of one health check over the active connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthVerdict {
    Healthy,
    /// No data within the timeout: the connection is presumed dead even if
    /// the transport still answers control frames. Intermediaries routinely
    /// forward data frames while dropping control frames, so silence of
    /// data is the only reliable failure signal.
    Stale,
    /// Healthy but past the rotation age.
    Rotate,
}

pub fn health_verdict(
    now: Instant,
    connected_at: Instant,
    last_data: Instant,
    data_timeout: Duration,
    max_connection_age: Duration,
) -> HealthVerdict {
    if now.duration_since(last_data) > data_timeout {
        HealthVerdict::Stale
    } else if now.duration_since(connected_at) > max_connection_age {
        HealthVerdict::Rotate
    } else {
        HealthVerdict::Healthy
    }
}

/// Reconnect delay schedule: immediate for the first three attempts, then
/// exponential from 2s capped at 30s so a persistently failing endpoint is
/// never busy-looped against.
pub fn backoff_delay(attempt: u32) -> Duration {
    if attempt < IMMEDIATE_RETRIES {
        return Duration::ZERO;
    }
    let exp = (attempt - IMMEDIATE_RETRIES).min(8);
    let delay = BASE_BACKOFF * 2u32.saturating_pow(exp);
    delay.min(MAX_BACKOFF)
}

// ---------------------------------------------------------------------------
// Message parsing
// ---------------------------------------------------------------------------

/// Parse one text frame from the feed. `Ok(None)` for non-trade messages
/// (acks, heartbeats); `Err(MalformedMessage)` for frames that claim to be
/// trades but cannot be normalized.
pub fn parse_feed_message(text: &str) -> Result<Option<TradeEvent>, IngestError> {
    let msg: RtdsMessage = serde_json::from_str(text)
        .map_err(|e| IngestError::MalformedMessage(e.to_string()))?;

    let Some(payload) = msg.payload else {
        return Ok(None);
    };

    let wallet = payload
        .proxy_wallet
        .as_deref()
        .filter(|w| !w.is_empty())
        .ok_or_else(|| IngestError::MalformedMessage("trade payload without wallet".into()))?
        .to_lowercase();

    let side = payload
        .side
        .as_deref()
        .and_then(Side::from_api_str)
        .ok_or_else(|| IngestError::MalformedMessage("trade payload without side".into()))?;

    let price = decimal_field(payload.price.as_ref())
        .ok_or_else(|| IngestError::MalformedMessage("unparseable price".into()))?;
    let size = decimal_field(payload.size.as_ref())
        .ok_or_else(|| IngestError::MalformedMessage("unparseable size".into()))?;

    let timestamp = parse_trade_timestamp(payload.timestamp.as_ref())
        .ok_or_else(|| IngestError::MalformedMessage("unparseable timestamp".into()))?;

    let asset_id = payload.asset.clone().unwrap_or_default();
    let tx_hash = payload.transaction_hash.clone().unwrap_or_default();
    let tx_id =
        TradeEvent::unique_trade_id(&tx_hash, timestamp.timestamp(), &wallet, &asset_id);

    Ok(Some(TradeEvent {
        tx_id,
        wallet,
        market_id: payload.condition_id.clone().unwrap_or_default(),
        asset_id,
        side,
        price,
        size_usd: size * price,
        title: payload.title.clone().unwrap_or_default(),
        slug: payload.slug.clone().unwrap_or_default(),
        event_slug: payload.event_slug.clone().unwrap_or_default(),
        outcome: payload.outcome.clone().unwrap_or_default(),
        timestamp,
    }))
}

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

struct Connection {
    stream: WsStream,
    established_at: Instant,
}

impl Connection {
    async fn open(url: &str) -> Result<Self, IngestError> {
        let (mut stream, _response) = connect_async(url)
            .await
            .map_err(|e| IngestError::TransientNetwork(e.to_string()))?;

        let subscribe = serde_json::to_string(&RtdsSubscribe::activity_trades())
            .map_err(|e| IngestError::MalformedMessage(e.to_string()))?;
        stream
            .send(Message::Text(subscribe.into()))
            .await
            .map_err(|e| IngestError::TransientNetwork(e.to_string()))?;

        Ok(Self {
            stream,
            established_at: Instant::now(),
        })
    }
}

/// Resolve the next frame from the backup connection, pending forever when
/// no backup exists so the select arm never fires.
async fn next_backup(
    backup: &mut Option<Connection>,
) -> Option<Result<Message, tokio_tungstenite::tungstenite::Error>> {
    match backup {
        Some(conn) => conn.stream.next().await,
        None => std::future::pending().await,
    }
}

/// Promote the backup to primary, if one is alive. Returns `false` when
/// there is nothing to fail over to.
fn promote_backup(
    primary: &mut Connection,
    backup: &mut Option<Connection>,
    last_data: &mut Instant,
    state: &mut ConnState,
) -> bool {
    let Some(next) = backup.take() else {
        return false;
    };
    // Dropping the old stream closes it.
    let _old = std::mem::replace(primary, next);
    *last_data = Instant::now();
    counter!("ws_failovers_total").increment(1);
    set_state(state, ConnState::Subscribed);
    tracing::info!("Failed over to backup connection");
    true
}

/// Run the feed connector until the stop signal fires. Trades are pushed
/// into `tx` in arrival order; gaps are bridged by reconnection and the
/// brief duplication around a failover is absorbed by the deduplicator.
pub async fn run_feed(
    config: FeedConfig,
    tx: mpsc::Sender<TradeEvent>,
    mut stop: watch::Receiver<bool>,
) {
    let mut state = ConnState::Disconnected;
    let mut attempt: u32 = 0;

    'reconnect: loop {
        if *stop.borrow() {
            break;
        }

        let delay = backoff_delay(attempt);
        if !delay.is_zero() {
            set_state(&mut state, ConnState::Reconnecting);
            tracing::info!(delay_secs = delay.as_secs(), attempt, "Reconnecting after backoff");
            tokio::select! {
                _ = sleep(delay) => {}
                _ = stop.changed() => break 'reconnect,
            }
        }

        set_state(&mut state, ConnState::Connecting);
        counter!("ws_reconnects_total").increment(1);

        let mut primary = match Connection::open(&config.url).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(error = %e, url = %config.url, "Feed connection failed");
                set_state(&mut state, ConnState::Failed);
                attempt = attempt.saturating_add(1);
                continue;
            }
        };
        attempt = 0;
        set_state(&mut state, ConnState::Subscribed);
        tracing::info!(url = %config.url, "Feed connected and subscribed");

        let mut backup: Option<Connection> = None;
        let mut last_data = Instant::now();

        let mut health_timer = interval(HEALTH_CHECK_INTERVAL);
        health_timer.tick().await; // consume the immediate first tick
        let mut backup_timer = interval(BACKUP_MAINTENANCE_INTERVAL);
        backup_timer.tick().await;

        loop {
            tokio::select! {
                msg = primary.stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            last_data = Instant::now();
                            if !handle_text_frame(text.as_ref(), &tx).await {
                                tracing::warn!("Trade channel closed, stopping feed");
                                break 'reconnect;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            // Answered for protocol hygiene, never used for
                            // health accounting.
                            let _ = primary.stream.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::warn!("Primary connection closed by server");
                            if !promote_backup(&mut primary, &mut backup, &mut last_data, &mut state) {
                                set_state(&mut state, ConnState::Reconnecting);
                                continue 'reconnect;
                            }
                        }
                        Some(Ok(_)) => {} // Binary, Pong, Frame — ignore
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "Primary connection read error");
                            if !promote_backup(&mut primary, &mut backup, &mut last_data, &mut state) {
                                set_state(&mut state, ConnState::Reconnecting);
                                continue 'reconnect;
                            }
                        }
                    }
                }
                msg = next_backup(&mut backup) => {
                    match msg {
                        // Drain the backup so its buffers stay empty; only
                        // primary frames are delivered downstream.
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "Backup connection error, dropping it");
                            backup = None;
                        }
                        None => backup = None,
                    }
                }
                _ = health_timer.tick() => {
                    let verdict = health_verdict(
                        Instant::now(),
                        primary.established_at,
                        last_data,
                        config.data_timeout,
                        config.max_connection_age,
                    );
                    match verdict {
                        HealthVerdict::Healthy => {}
                        HealthVerdict::Stale => {
                            set_state(&mut state, ConnState::Degraded);
                            tracing::warn!(
                                silence_secs = last_data.elapsed().as_secs(),
                                "No data activity, replacing connection"
                            );
                            if !promote_backup(&mut primary, &mut backup, &mut last_data, &mut state) {
                                set_state(&mut state, ConnState::Reconnecting);
                                continue 'reconnect;
                            }
                        }
                        HealthVerdict::Rotate => {
                            counter!("ws_rotations_total").increment(1);
                            tracing::info!(
                                age_secs = primary.established_at.elapsed().as_secs(),
                                "Proactive connection rotation"
                            );
                            if !promote_backup(&mut primary, &mut backup, &mut last_data, &mut state) {
                                set_state(&mut state, ConnState::Reconnecting);
                                continue 'reconnect;
                            }
                        }
                    }
                }
                _ = backup_timer.tick() => {
                    if config.backup_connection && backup.is_none() {
                        match Connection::open(&config.url).await {
                            Ok(conn) => {
                                tracing::debug!("Backup connection established");
                                backup = Some(conn);
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "Backup connection attempt failed");
                            }
                        }
                    }
                }
                _ = stop.changed() => {
                    break 'reconnect;
                }
            }
        }
    }

    set_state(&mut state, ConnState::Disconnected);
    tracing::info!("Feed connector stopped");
}

/// Returns `false` when the downstream channel is gone.
async fn handle_text_frame(text: &str, tx: &mpsc::Sender<TradeEvent>) -> bool {
    match parse_feed_message(text) {
        Ok(Some(event)) => {
            counter!("feed_trades_total").increment(1);
            tracing::debug!(
                wallet = %event.wallet,
                market = %event.market_id,
                side = %event.side,
                value = %event.size_usd,
                "Trade received"
            );
            tx.send(event).await.is_ok()
        }
        Ok(None) => {
            tracing::trace!(raw = %text, "Non-trade message received");
            true
        }
        Err(e) => {
            counter!("malformed_messages_total").increment(1);
            tracing::debug!(error = %e, "Dropped malformed feed message");
            true
        }
    }
}
