//! WebSocket Transport
//!
//! `Connector` implementation over tokio-tungstenite. Each attempt gets a
//! reader task (socket → tagged `TransportEvent`s) and a writer task
//! (`Outbox` → socket), both owned by the returned `TransportLink`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::traits::{
    AttemptId, Connector, Outbox, TransportEvent, TransportEventSender, TransportLink,
};
use crate::error::TransportError;

/// Connects to the chat stream over WebSocket
#[derive(Clone, Copy, Debug, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a connector
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        url: &str,
        attempt: AttemptId,
        events: TransportEventSender,
    ) -> Result<TransportLink, TransportError> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("WebSocket connect failed: {e}")))?;

        let (mut write, mut read) = ws_stream.split();
        let outbox = Arc::new(Outbox::new());

        // Read task: socket -> tagged events
        let read_events = events.clone();
        let reader = tokio::spawn(async move {
            loop {
                let event = match read.next().await {
                    Some(Ok(Message::Text(text))) => TransportEvent::Frame(text),
                    Some(Ok(Message::Binary(bytes))) => {
                        TransportEvent::Frame(String::from_utf8_lossy(&bytes).into_owned())
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(%attempt, ?frame, "WebSocket closed by server");
                        TransportEvent::Closed
                    }
                    Some(Ok(_)) => continue, // ping/pong handled by tungstenite
                    Some(Err(e)) => TransportEvent::Error(e.to_string()),
                    None => TransportEvent::Closed,
                };

                let terminal = !matches!(event, TransportEvent::Frame(_));
                if read_events.send((attempt, event)).is_err() || terminal {
                    break;
                }
            }
        });

        // Write task: outbox -> socket. A failed frame stays in flight so the
        // manager can report it; the rest stay pending for the next attempt.
        let writer_outbox = Arc::clone(&outbox);
        let writer = tokio::spawn(async move {
            while let Some(frame) = writer_outbox.next().await {
                if let Err(e) = write.send(Message::Text(frame)).await {
                    tracing::warn!(%attempt, error = %e, "WebSocket write error");
                    writer_outbox.close();
                    let _ = events.send((
                        attempt,
                        TransportEvent::WriteFailed {
                            reason: e.to_string(),
                        },
                    ));
                    return;
                }
                writer_outbox.written();
            }
            let _ = write.close().await;
        });

        tracing::debug!(%attempt, "WebSocket connected");

        Ok(TransportLink::new(attempt, outbox, vec![reader, writer]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop a listener so the port is very likely closed
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, _rx) = mpsc::unbounded_channel();
        let result = WebSocketConnector::new()
            .connect(&format!("ws://{addr}/api/v1/chat/stream"), AttemptId(1), tx)
            .await;

        assert!(matches!(result, Err(TransportError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_frames_and_close_are_reported() {
        use tokio_tungstenite::accept_async;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                r#"{"type":"system","payload":"Connected"}"#.to_string(),
            ))
            .await
            .unwrap();
            // Echo one client frame back, then close
            if let Some(Ok(msg)) = ws.next().await {
                ws.send(msg).await.unwrap();
            }
            ws.close(None).await.unwrap();
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let link = WebSocketConnector::new()
            .connect(&format!("ws://{addr}/stream?token=t"), AttemptId(7), tx)
            .await
            .unwrap();

        let (attempt, event) = rx.recv().await.unwrap();
        assert_eq!(attempt, AttemptId(7));
        assert_eq!(
            event,
            TransportEvent::Frame(r#"{"type":"system","payload":"Connected"}"#.to_string())
        );

        link.transmit("ping".to_string()).unwrap();
        let (_, event) = rx.recv().await.unwrap();
        assert_eq!(event, TransportEvent::Frame("ping".to_string()));

        let (_, event) = rx.recv().await.unwrap();
        assert_eq!(event, TransportEvent::Closed);

        server.await.unwrap();
    }
}
