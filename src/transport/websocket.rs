//! WebSocket client links
//!
//! The lipsync server link sends the session token as the first (text)
//! message. After that every inbound binary message is one stream message,
//! and every outbound message is PCM16 audio sent as binary.
//!
//! An audio source link is receive-only: it listens to a voice broadcast and
//! yields each binary message as a block of PCM16 audio.

use bytes::Bytes;
use futures_util::{SinkExt, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::{ChannelTransport, Transport};
use crate::constants::MIN_SESSION_TOKEN_LEN;
use crate::error::TransportError;

/// An open connection: an outbound transport plus the inbound message stream
pub struct WebSocketLink {
    pub transport: Arc<ChannelTransport>,
    pub inbound: mpsc::Receiver<Bytes>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// Reject tokens the server would refuse, without opening a socket
pub fn validate_session_token(session_token: &str) -> Result<(), TransportError> {
    let len = session_token.chars().count();
    if len < MIN_SESSION_TOKEN_LEN {
        return Err(TransportError::InvalidSessionToken {
            len,
            min: MIN_SESSION_TOKEN_LEN,
        });
    }
    Ok(())
}

/// Connect to `url` and authenticate with `session_token`
pub async fn connect(
    url: &str,
    session_token: &str,
    inbound_capacity: usize,
) -> Result<WebSocketLink, TransportError> {
    validate_session_token(session_token)?;

    let (stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
    tracing::info!("Connected to lipsync server at {}", url);

    let (mut sink, source) = stream.split();
    sink.send(Message::Text(session_token.to_string()))
        .await
        .map_err(|e| TransportError::SendFailed(e.to_string()))?;

    let (transport, mut outbound) = ChannelTransport::new();
    let (inbound_tx, inbound) = mpsc::channel::<Bytes>(inbound_capacity.max(1));

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if let Err(e) = sink.send(Message::Binary(message.to_vec())).await {
                tracing::warn!("WebSocket send failed: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
        tracing::debug!("WebSocket writer finished");
    });

    let reader = spawn_reader(source, inbound_tx, "lipsync server");

    Ok(WebSocketLink {
        transport: Arc::new(transport),
        inbound,
        reader,
        writer,
    })
}

impl WebSocketLink {
    /// Close the outbound side and wait for the socket to shut down
    pub async fn shutdown(self) {
        self.transport.close();
        let _ = self.writer.await;
        self.reader.abort();
    }
}

/// A receive-only connection to a voice broadcast
pub struct AudioSourceLink {
    pub inbound: mpsc::Receiver<Bytes>,
    reader: JoinHandle<()>,
}

/// Connect to a voice broadcast at `url`
pub async fn open_audio_source(
    url: &str,
    inbound_capacity: usize,
) -> Result<AudioSourceLink, TransportError> {
    let (stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
    tracing::info!("Connected to audio source at {}", url);

    let (inbound_tx, inbound) = mpsc::channel::<Bytes>(inbound_capacity.max(1));
    let reader = spawn_reader(stream, inbound_tx, "audio source");

    Ok(AudioSourceLink { inbound, reader })
}

impl Drop for AudioSourceLink {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Forward binary messages from `source` until it closes or the receiver is dropped
fn spawn_reader<S>(
    mut source: S,
    inbound_tx: mpsc::Sender<Bytes>,
    peer: &'static str,
) -> JoinHandle<()>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Binary(data)) => {
                    if inbound_tx.send(Bytes::from(data)).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Text(text)) => {
                    tracing::debug!("Text message from {}: {}", peer, text);
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!("{} closed connection: {:?}", peer, frame);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("WebSocket receive from {} failed: {}", peer, e);
                    break;
                }
            }
        }
        tracing::debug!("WebSocket reader for {} finished", peer);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn local_server() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    #[test]
    fn test_session_token_length() {
        assert!(validate_session_token(&"x".repeat(MIN_SESSION_TOKEN_LEN)).is_ok());
        assert!(matches!(
            validate_session_token(""),
            Err(TransportError::InvalidSessionToken { len: 0, .. })
        ));
        assert!(matches!(
            validate_session_token(&"x".repeat(MIN_SESSION_TOKEN_LEN - 1)),
            Err(TransportError::InvalidSessionToken { len: 19, min: 20 })
        ));
    }

    #[tokio::test]
    async fn test_short_token_rejected_before_connecting() {
        // Nothing listens here; validation must fail first
        let Err(err) = connect("ws://127.0.0.1:1", "short", 8).await else {
            panic!("connect accepted a short token");
        };
        assert!(matches!(
            err,
            TransportError::InvalidSessionToken { len: 5, min: 20 }
        ));
    }

    #[tokio::test]
    async fn test_connect_sends_token_first() {
        let (listener, url) = local_server().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let first = ws.next().await.unwrap().unwrap();
            ws.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
            let upstream = ws.next().await.unwrap().unwrap();
            (first, upstream)
        });

        let token = "t".repeat(32);
        let Ok(mut link) = connect(&url, &token, 8).await else {
            panic!("connect failed");
        };
        assert_eq!(link.inbound.recv().await.unwrap().as_ref(), &[1, 2, 3]);
        link.transport.send(Bytes::from_static(&[9, 9])).unwrap();

        let (first, upstream) = server.await.unwrap();
        assert_eq!(first, Message::Text(token));
        assert_eq!(upstream, Message::Binary(vec![9, 9]));

        link.shutdown().await;
    }

    #[tokio::test]
    async fn test_audio_source_yields_binary_messages() {
        let (listener, url) = local_server().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Text("hello".into())).await.unwrap();
            ws.send(Message::Binary(vec![1, 2])).await.unwrap();
            ws.send(Message::Binary(vec![3, 4])).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let Ok(mut source) = open_audio_source(&url, 8).await else {
            panic!("audio source connect failed");
        };
        assert_eq!(source.inbound.recv().await.unwrap().as_ref(), &[1, 2]);
        assert_eq!(source.inbound.recv().await.unwrap().as_ref(), &[3, 4]);
        assert!(source.inbound.recv().await.is_none());

        server.await.unwrap();
    }
}
