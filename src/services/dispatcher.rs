use async_trait::async_trait;
use metrics::counter;
use tokio::sync::{mpsc, watch};

use crate::models::{AlertEvent, AlertPayload};

/// Seam to the downstream presentation layer. The dispatcher behind this
/// trait owns formatting and delivery retries; the engine only hands over
/// fully resolved `(category, destination, payload)` tuples.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, alert: AlertEvent);
}

/// Sink that enqueues alerts onto a bounded channel. Delivery failures are
/// logged and never block the pipeline.
pub struct QueueSink {
    tx: mpsc::Sender<AlertEvent>,
}

impl QueueSink {
    pub fn new(tx: mpsc::Sender<AlertEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl AlertSink for QueueSink {
    async fn deliver(&self, alert: AlertEvent) {
        if let Err(e) = self.tx.send(alert).await {
            tracing::error!(error = %e, "Alert queue closed, alert dropped");
        }
    }
}

/// Drain the alert queue and hand each event to the downstream consumer.
/// This is the process boundary: everything past here belongs to the
/// chat-platform layer.
pub async fn run_dispatcher(
    mut rx: mpsc::Receiver<AlertEvent>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            alert = rx.recv() => {
                let Some(alert) = alert else {
                    tracing::warn!("Alert channel closed");
                    break;
                };
                counter!("alerts_emitted_total").increment(1);
                match &alert.payload {
                    AlertPayload::Trade { trade, rank, wallet_label } => {
                        tracing::info!(
                            id = %alert.id,
                            guild = alert.guild_id,
                            category = %alert.category,
                            channel = %alert.channel,
                            wallet = %trade.wallet,
                            market = %trade.title,
                            side = %trade.side,
                            price = %trade.price,
                            value = %trade.size_usd,
                            rank = rank.as_ref().map(|r| r.rank).unwrap_or(0),
                            label = wallet_label.as_deref().unwrap_or("-"),
                            "Alert dispatched"
                        );
                    }
                    AlertPayload::Volatility(snapshot) => {
                        tracing::info!(
                            id = %alert.id,
                            guild = alert.guild_id,
                            category = %alert.category,
                            channel = %alert.channel,
                            market = %snapshot.title,
                            timeframe = %snapshot.timeframe,
                            urgency = snapshot.timeframe.urgency(),
                            baseline = %snapshot.baseline,
                            price = %snapshot.current_price,
                            change = %snapshot.change_points,
                            "Volatility alert dispatched"
                        );
                    }
                }
            }
            _ = stop.changed() => break,
        }
    }
    tracing::info!("Dispatcher stopped");
}
