//! Line-delimited JSON transport: one message per input line, one reply
//! per output line, in order.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::{channel::RequestHandler, protocol::Response};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub async fn serve_lines<R, W>(
    reader: R,
    mut writer: W,
    handler: Arc<dyn RequestHandler>,
    cancel_token: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read rpc input")?,
            _ = cancel_token.cancelled() => {
                log_info!("stdio rpc shutting down");
                break;
            }
        };
        let Some(line) = line else {
            log_info!("stdio rpc input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(&line) {
            Ok(message) => handler.handle(message).await,
            Err(err) => {
                log_warn!("discarding unparseable rpc line: {err}");
                Response::failure(format!("Invalid message: {err}"))
            }
        };

        let mut encoded = serde_json::to_string(&response).context("failed to encode reply")?;
        encoded.push('\n');
        writer
            .write_all(encoded.as_bytes())
            .await
            .context("failed to write rpc reply")?;
        writer.flush().await.context("failed to flush rpc reply")?;
    }

    Ok(())
}
