//! WebSocket connection to the scene-switching tool.
//!
//! [`spawn_scene_link`] runs a background task that keeps one connection to
//! `ws://host:port` open.  Inbound text frames are forwarded as
//! [`LinkEvent::Frame`]; a dropped connection produces
//! [`LinkEvent::Disconnected`] and the task retries after the configured
//! delay.  Frames queued on the outbound channel while no connection is open
//! are discarded, because requests built for an old session are meaningless
//! to a new one.
//!
//! The protocol itself (handshake, requests, events) is handled by
//! [`crate::application::scene_switcher::SceneSwitcher`].

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

/// What the link task reports to the event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One inbound text frame.
    Frame(String),
    /// An open connection was lost.
    Disconnected,
}

/// Handles to a running link task.
#[derive(Debug)]
pub struct SceneLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub events: mpsc::UnboundedReceiver<LinkEvent>,
    pub task: JoinHandle<()>,
}

/// How a single connection ended.
enum SessionEnd {
    /// The socket closed or failed; reconnect.
    Lost,
    /// The console dropped its side of a channel; stop the task.
    Shutdown,
}

/// Starts the reconnecting connection task.
pub fn spawn_scene_link(url: String, reconnect_delay: Duration) -> SceneLink {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(link_loop(url, reconnect_delay, outbound_rx, events_tx));
    SceneLink {
        outbound: outbound_tx,
        events: events_rx,
        task,
    }
}

async fn link_loop(
    url: String,
    reconnect_delay: Duration,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    loop {
        // Stale requests from the previous session.
        while outbound.try_recv().is_ok() {}

        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws_stream, _response)) => {
                info!("scene switcher connected at {url}");
                match run_session(ws_stream, &mut outbound, &events).await {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Lost => {
                        if events.send(LinkEvent::Disconnected).is_err() {
                            break;
                        }
                    }
                }
            }
            Err(e) => debug!("scene switcher connect to {url} failed: {e}"),
        }

        if events.is_closed() {
            break;
        }
        tokio::time::sleep(reconnect_delay).await;
    }
    info!("scene switcher link stopped");
}

async fn run_session<S>(
    ws_stream: tokio_tungstenite::WebSocketStream<S>,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    events: &mpsc::UnboundedSender<LinkEvent>,
) -> SessionEnd
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws_stream.split();

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    if events.send(LinkEvent::Frame(text)).is_err() {
                        return SessionEnd::Shutdown;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    debug!("scene switcher closed the connection");
                    return SessionEnd::Lost;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("scene switcher WebSocket error: {e}");
                    return SessionEnd::Lost;
                }
            },
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = sink.send(WsMessage::Text(text)).await {
                        warn!("scene switcher send failed: {e}");
                        return SessionEnd::Lost;
                    }
                }
                None => {
                    sink.close().await.ok();
                    return SessionEnd::Shutdown;
                }
            },
        }
    }
}
