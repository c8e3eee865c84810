//! TCP front end: newline-delimited JSON, one task per connection

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

use super::multiplexer::{ConnectionMultiplexer, Transport};
use super::protocol::{decode_line, encode, ClientMessage, ServerMessage};
use super::registry::ServerRegistry;

/// Transport backed by an unbounded channel drained by the writer task
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<ServerMessage>,
    closed: watch::Sender<bool>,
}

impl ChannelTransport {
    pub fn channel() -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<ServerMessage>,
        watch::Receiver<bool>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed, closed_rx) = watch::channel(false);
        (Arc::new(Self { tx, closed }), rx, closed_rx)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, message: ServerMessage) {
        if *self.closed.borrow() {
            return;
        }
        let _ = self.tx.send(message);
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }
}

/// Accept connections forever
pub async fn serve(listener: TcpListener, registry: ServerRegistry) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening");
    }
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let (reader, writer) = stream.into_split();
                    handle_connection(reader, writer, registry, Some(peer)).await;
                });
            }
            Err(e) => tracing::warn!(error = %e, "accept failed"),
        }
    }
}

/// Drive one client connection until it closes or is superseded
pub async fn handle_connection<R, W>(
    reader: R,
    writer: W,
    registry: ServerRegistry,
    peer: Option<SocketAddr>,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    let (transport, rx, mut closed) = ChannelTransport::channel();

    let first = match lines.next_line().await {
        Ok(Some(line)) => line,
        Ok(None) => return,
        Err(e) => {
            tracing::debug!(?peer, error = %e, "connection failed before first message");
            return;
        }
    };
    let (identity, pending) = match decode_line(&first) {
        Ok(ClientMessage::Hello { identity }) => (identity, None),
        Ok(message) => (None, Some(message)),
        Err(e) => {
            tracing::warn!(?peer, error = %e, "malformed message");
            (None, None)
        }
    };

    let transport_dyn: Arc<dyn Transport> = transport.clone();
    let attachment = registry.attach(identity.as_deref(), Arc::clone(&transport_dyn));
    let multiplexer = attachment.multiplexer;
    tracing::info!(?peer, key = multiplexer.key(), resumed = attachment.resumed, "client attached");

    tokio::spawn(write_loop(writer, rx, closed.clone()));

    if let Some(message) = pending {
        dispatch(&multiplexer, transport_dyn.as_ref(), message).await;
    }

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match decode_line(&line) {
                        Ok(message) => dispatch(&multiplexer, transport_dyn.as_ref(), message).await,
                        Err(e) => tracing::warn!(?peer, error = %e, "malformed message"),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(?peer, error = %e, "read failed");
                    break;
                }
            },
            changed = closed.changed() => {
                if changed.is_err() || *closed.borrow() {
                    tracing::info!(?peer, key = multiplexer.key(), "connection superseded");
                    break;
                }
            }
        }
    }

    multiplexer.disconnect(attachment.generation);
    transport.close();
    tracing::info!(?peer, key = multiplexer.key(), "client disconnected");
}

async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
    mut closed: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let message = tokio::select! {
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
            changed = closed.changed() => {
                if changed.is_err() || *closed.borrow() {
                    break;
                }
                continue;
            }
        };
        let line = match encode(&message) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode message");
                continue;
            }
        };
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            tracing::debug!(error = %e, "write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Apply one client request; only `create`, `process` and `request_paste` are acknowledged
async fn dispatch(multiplexer: &ConnectionMultiplexer, transport: &dyn Transport, message: ClientMessage) {
    match message {
        ClientMessage::Hello { .. } => {
            tracing::debug!(key = multiplexer.key(), "ignoring repeated hello");
        }
        ClientMessage::Create { seq, cols, rows } => {
            let reply = match multiplexer.create(cols, rows) {
                Ok(result) => ServerMessage::ack_ok(seq, &result),
                Err(e) => ServerMessage::ack_err(seq, e),
            };
            transport.send(reply);
        }
        ClientMessage::Data { id, data } => {
            if let Err(e) = multiplexer.write(&id, &data) {
                tracing::warn!(key = multiplexer.key(), error = %e, "dropping client data");
            }
        }
        ClientMessage::Resize { id, cols, rows } => multiplexer.resize(&id, cols, rows),
        ClientMessage::Kill { id } => multiplexer.kill(&id),
        ClientMessage::Process { seq, id } => {
            let reply = match multiplexer.query_process_name(&id) {
                Ok(name) => ServerMessage::ack_ok(seq, name),
                Err(e) => ServerMessage::ack_err(seq, e),
            };
            transport.send(reply);
        }
        ClientMessage::RequestPaste { seq } => {
            let reply = match multiplexer.request_paste().await {
                Ok(text) => ServerMessage::ack_ok(seq, text),
                Err(e) => {
                    tracing::warn!(key = multiplexer.key(), error = %e, "paste failed");
                    ServerMessage::ack_err(seq, e)
                }
            };
            transport.send(reply);
        }
    }
}
