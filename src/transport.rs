//! TCP transport – one JSON object per line.
//!
//! The first line from a client is a [`Hello`]; every following line is an
//! [`Envelope`].  Outbound envelopes are written the same way.  Each accepted
//! connection becomes one [`ObserverId`].
//!
//! A failed accept is logged and retried after [`ACCEPT_BACKOFF`]; only the
//! connection it would have produced is lost.

use crate::bus::Inbound;
use crate::error::{GateError, Result};
use crate::protocol::Envelope;
use crate::types::ObserverId;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::Instrument;

/// Pause after a failed accept before trying again.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Connection preamble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    /// Name the server logs for this observer's actions.
    pub name: String,
}

/// Source of inbound connections for [`serve`].
pub trait Listener: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Send + 'static;

    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Listener for TcpListener {
    type Stream = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// Accept connections forever, feeding each into `inbound`.
pub async fn serve<L: Listener>(mut listener: L, inbound: mpsc::Sender<Inbound>) {
    let mut next_id: u32 = 1;
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Accept failed: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        let observer = ObserverId(next_id);
        next_id = next_id.wrapping_add(1);

        let inbound = inbound.clone();
        let span = tracing::info_span!("observer", id = observer.0, %addr);
        tokio::spawn(
            async move {
                if let Err(e) = handle_connection(stream, observer, inbound).await {
                    warn!("Connection {} ended with error: {}", observer, e);
                }
            }
            .instrument(span),
        );
    }
}

async fn handle_connection<S: AsyncRead + AsyncWrite + Send + 'static>(
    stream: S,
    observer: ObserverId,
    inbound: mpsc::Sender<Inbound>,
) -> Result<()> {
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();

    let hello_line = lines
        .next_line()
        .await?
        .ok_or_else(|| GateError::Transport("connection closed before hello".into()))?;
    let hello: Hello = serde_json::from_str(&hello_line)?;
    info!("{} says hello as '{}'", observer, hello.name);

    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
    inbound
        .send(Inbound::Connect {
            observer,
            name: hello.name,
            outbound: tx,
        })
        .await
        .map_err(|_| GateError::Transport("authority agent stopped".into()))?;

    let writer = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let mut line = match serde_json::to_string(&envelope) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to serialise {}: {}", envelope.channel, e);
                    continue;
                }
            };
            line.push('\n');
            if write.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match serde_json::from_str::<Envelope>(&line) {
                Ok(envelope) => {
                    if inbound.send(Inbound::Event { observer, envelope }).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Ignoring malformed line from {}: {}", observer, e),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Read error from {}: {}", observer, e);
                break;
            }
        }
    }

    let _ = inbound.send(Inbound::Disconnect { observer }).await;
    writer.abort();
    Ok(())
}
