use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;

use super::protocol::{Envelope, Request, Response, Sender};

// Set to true to log channel lifecycle
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

const CHANNEL_CAPACITY: usize = 64;

/// One side of the exchange that services inbound messages.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, message: Value) -> Response;
}

type Pending = (Value, oneshot::Sender<Response>);

/// Caller half of a channel. The identity is fixed when the channel is made.
#[derive(Clone)]
pub struct RpcClient {
    tx: mpsc::Sender<Pending>,
    sender: Sender,
}

/// Serving half. Every message it yields carries the channel's identity,
/// whatever the caller wrote into the body.
pub struct RpcListener {
    rx: mpsc::Receiver<Pending>,
    sender: Sender,
}

pub fn channel(sender: Sender) -> (RpcClient, RpcListener) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        RpcClient {
            tx,
            sender: sender.clone(),
        },
        RpcListener { rx, sender },
    )
}

fn stamp_sender(mut message: Value, sender: &Value) -> Value {
    if let Some(fields) = message.as_object_mut() {
        fields.insert("sender".into(), sender.clone());
    }
    message
}

impl RpcClient {
    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub async fn call(&self, request: Request) -> Result<Response> {
        let envelope = Envelope {
            sender: self.sender.clone(),
            request,
        };
        let message = serde_json::to_value(&envelope).context("failed to encode request")?;
        self.call_raw(message).await
    }

    /// Send a hand-built message. Its `sender` field is replaced on delivery.
    pub async fn call_raw(&self, message: Value) -> Result<Response> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((message, reply_tx))
            .await
            .map_err(|_| anyhow!("rpc channel closed before request was delivered"))?;
        reply_rx
            .await
            .map_err(|_| anyhow!("rpc peer dropped the request without replying"))
    }
}

/// Service messages until the token is cancelled or every client is gone.
/// Each message runs on its own task; replies are not ordered.
pub async fn serve(
    mut listener: RpcListener,
    handler: Arc<dyn RequestHandler>,
    cancel_token: CancellationToken,
) {
    let identity = match serde_json::to_value(&listener.sender) {
        Ok(identity) => identity,
        Err(err) => {
            log_error!("cannot encode channel identity, not serving: {err}");
            return;
        }
    };

    loop {
        tokio::select! {
            next = listener.rx.recv() => {
                let Some((message, reply_tx)) = next else {
                    log_info!("rpc channel closed by all clients");
                    break;
                };
                let message = stamp_sender(message, &identity);
                let handler = handler.clone();
                tokio::spawn(async move {
                    let response = handler.handle(message).await;
                    if reply_tx.send(response).is_err() {
                        log_debug!("rpc caller went away before the reply");
                    }
                });
            }
            _ = cancel_token.cancelled() => {
                log_info!("rpc serve loop shutting down");
                break;
            }
        }
    }
}

/// The browsing surface that currently has focus, if any.
#[derive(Clone, Default)]
pub struct FocusedSurface {
    inner: Arc<RwLock<Option<RpcClient>>>,
}

impl FocusedSurface {
    pub async fn focus(&self, client: RpcClient) {
        *self.inner.write().await = Some(client);
    }

    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }

    pub async fn current(&self) -> Option<RpcClient> {
        self.inner.read().await.clone()
    }
}
