use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::config::Config;
use crate::error::ConnectionError;
use crate::types::events::client::StartEvent;
use crate::types::{ClientEvent, Envelope, Pace, ServerEvent};

pub(crate) mod consts;
mod utils;

pub use utils::build_url;

pub type InboundRx = mpsc::Receiver<ConnectionEvent>;

/// Everything the tutoring service can tell the engine, in receipt order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Message(ServerEvent),
    /// The transport ended. Delivered once, and always last.
    Closed { error: Option<String> },
}

enum Outbound {
    Control(ClientEvent),
    Audio(Vec<u8>),
}

/// The persistent channel to `session/{id}`.
///
/// Writes go through a queue drained by a writer task; reads are parsed by a
/// reader task into [`ConnectionEvent`]s.
pub struct SessionConnection {
    c_tx: Option<mpsc::Sender<Outbound>>,
    open: Arc<AtomicBool>,
    recv_handle: Option<JoinHandle<()>>,
}

impl SessionConnection {
    /// Connects and sends `start` with the initial pace before returning, so no
    /// later frame can overtake it.
    pub async fn open(
        config: &Config,
        session_id: &str,
        pace: Pace,
    ) -> Result<(Self, InboundRx), ConnectionError> {
        let url = build_url(config, session_id)?;
        tracing::info!("connecting to {}", url);

        let (ws_stream, _) =
            tokio::time::timeout(config.connect_timeout(), tokio_tungstenite::connect_async(url.as_str()))
                .await
                .map_err(|_| ConnectionError::Timeout(config.connect_timeout()))??;

        let (mut write, mut read) = ws_stream.split();

        let start = serde_json::to_string(&ClientEvent::Start(StartEvent::new(pace)))?;
        write.send(Message::Text(start)).await?;
        tracing::debug!("sent start, pace={}", pace);

        let (c_tx, mut c_rx) = mpsc::channel::<Outbound>(config.capacity());
        let (s_tx, s_rx) = mpsc::channel::<ConnectionEvent>(config.capacity());
        let open = Arc::new(AtomicBool::new(true));

        tokio::spawn(async move {
            while let Some(outbound) = c_rx.recv().await {
                let message = match outbound {
                    Outbound::Control(event) => match serde_json::to_string(&event) {
                        Ok(text) => Message::Text(text),
                        Err(e) => {
                            tracing::error!("failed to serialize event: {}", e);
                            continue;
                        }
                    },
                    Outbound::Audio(bytes) => Message::Binary(bytes),
                };
                if let Err(e) = write.send(message).await {
                    tracing::error!("failed to send message: {}", e);
                    break;
                }
            }
            // Queue dropped by close(): say goodbye and release the socket.
            if let Err(e) = write.close().await {
                tracing::debug!("close handshake failed: {}", e);
            }
        });

        let reader_open = open.clone();
        let recv_handle = tokio::spawn(async move {
            let error = loop {
                let message = match read.next().await {
                    None => break None,
                    Some(Err(e)) => {
                        tracing::error!("failed to read message: {}", e);
                        break Some(e.to_string());
                    }
                    Some(Ok(message)) => message,
                };
                match message {
                    Message::Text(text) => {
                        if let Some(event) = parse_frame(&text) {
                            if s_tx.send(ConnectionEvent::Message(event)).await.is_err() {
                                tracing::debug!("inbound receiver dropped, stopping reader");
                                reader_open.store(false, Ordering::Release);
                                return;
                            }
                        }
                    }
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary message: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        break None;
                    }
                    _ => {}
                }
            };
            reader_open.store(false, Ordering::Release);
            if s_tx.send(ConnectionEvent::Closed { error }).await.is_err() {
                tracing::debug!("inbound receiver dropped before close notification");
            }
        });

        Ok((
            Self {
                c_tx: Some(c_tx),
                open,
                recv_handle: Some(recv_handle),
            },
            s_rx,
        ))
    }

    /// Whether frames handed to the connection will be written.
    pub fn is_open(&self) -> bool {
        self.c_tx.is_some() && self.open.load(Ordering::Acquire)
    }

    /// Queues a control message. Silently dropped when the channel is not open.
    pub async fn send_control(&self, event: ClientEvent) -> bool {
        let kind = event.kind();
        let sent = self.send(Outbound::Control(event)).await;
        if !sent {
            tracing::debug!("dropping {} control message, channel not open", kind);
        }
        sent
    }

    /// Queues one finalized recording as a single binary frame.
    pub async fn send_audio(&self, payload: Vec<u8>) -> bool {
        let len = payload.len();
        let sent = self.send(Outbound::Audio(payload)).await;
        if sent {
            tracing::debug!("queued {} bytes of learner audio", len);
        } else {
            tracing::debug!("dropping {} bytes of learner audio, channel not open", len);
        }
        sent
    }

    async fn send(&self, outbound: Outbound) -> bool {
        if !self.is_open() {
            return false;
        }
        match self.c_tx {
            Some(ref tx) => tx.send(outbound).await.is_ok(),
            None => false,
        }
    }

    /// Shuts the channel down for good. Safe to call more than once.
    ///
    /// No [`ConnectionEvent::Closed`] is emitted for a local close.
    pub fn close(&mut self) {
        self.open.store(false, Ordering::Release);
        if let Some(handle) = self.recv_handle.take() {
            handle.abort();
        }
        if self.c_tx.take().is_some() {
            tracing::info!("session channel closed locally");
        }
    }
}

impl Drop for SessionConnection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Parses one text frame. Unknown types and malformed frames yield `None`.
pub(crate) fn parse_frame(text: &str) -> Option<ServerEvent> {
    match serde_json::from_str::<ServerEvent>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            match serde_json::from_str::<Envelope>(text) {
                Ok(envelope) if !ServerEvent::is_known_kind(envelope.kind()) => {
                    tracing::debug!("ignoring message type: {}", envelope.kind());
                }
                Ok(envelope) => {
                    tracing::warn!(
                        "malformed {} message: {}, data=> {:?}",
                        envelope.kind(),
                        e,
                        envelope.data()
                    );
                }
                Err(_) => {
                    tracing::warn!("failed to parse frame: {}, text=> {:?}", e, text);
                }
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::events::server::TextEvent;

    #[test]
    fn parses_known_frames() {
        let event = parse_frame(r#"{"type":"tutor_text","data":{"text":"Namaste!"}}"#);
        assert_eq!(event, Some(ServerEvent::TutorText(TextEvent::new("Namaste!"))));
    }

    #[test]
    fn unknown_types_are_ignored() {
        assert_eq!(parse_frame(r#"{"type":"whiteboard","data":{"strokes":[]}}"#), None);
    }

    #[test]
    fn malformed_frames_are_dropped() {
        assert_eq!(parse_frame("not json at all"), None);
        assert_eq!(parse_frame(r#"{"type":"tutor_text","data":{"words":3}}"#), None);
        assert_eq!(parse_frame(r#"{"data":{}}"#), None);
    }
}
