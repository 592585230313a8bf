//! Newline-delimited JSON transport.
//!
//! Each input line is an [`InboundMessage`] and each output line an
//! [`OutboundMessage`]:
//!
//! ```text
//! {"conversation_id":"42","text":"/addtask"}
//! ```
//!
//! When bound to stdin/stdout, stdout is reserved for the protocol; all
//! diagnostics go to stderr.

use crate::channels::traits::{ChannelAdapter, InboundMessage, OutboundMessage};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{Mutex as AsyncMutex, mpsc};

/// JSON-lines adapter over any async reader/writer pair.
pub struct JsonLinesAdapter<R, W> {
    reader: Mutex<Option<R>>,
    writer: AsyncMutex<BufWriter<W>>,
}

/// The adapter bound to the process's stdin and stdout.
pub type StdioAdapter = JsonLinesAdapter<tokio::io::Stdin, tokio::io::Stdout>;

impl StdioAdapter {
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> JsonLinesAdapter<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            writer: AsyncMutex::new(BufWriter::new(writer)),
        }
    }
}

#[async_trait]
impl<R, W> ChannelAdapter for JsonLinesAdapter<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn id(&self) -> &'static str {
        "stdio"
    }

    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()> {
        let json = serde_json::to_string(&message).context("failed to encode outbound message")?;
        let mut writer = self.writer.lock().await;
        writer
            .write_all(json.as_bytes())
            .await
            .context("failed to write outbound message")?;
        writer
            .write_all(b"\n")
            .await
            .context("failed to write newline")?;
        writer.flush().await.context("failed to flush output")?;
        Ok(())
    }

    async fn run(&self, inbound_tx: mpsc::Sender<InboundMessage>) -> anyhow::Result<()> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(reader) = reader else {
            anyhow::bail!("{} input was already consumed", self.id());
        };

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        loop {
            line.clear();
            let bytes_read = reader
                .read_line(&mut line)
                .await
                .context("failed to read inbound line")?;

            if bytes_read == 0 {
                tracing::info!("input closed (EOF); stopping {} transport", self.id());
                return Ok(());
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<InboundMessage>(trimmed) {
                Ok(message) => {
                    if inbound_tx.send(message).await.is_err() {
                        tracing::debug!("runtime no longer accepts messages");
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        raw_line = %trimmed,
                        "failed to parse inbound message"
                    );
                }
            }
        }
    }
}
