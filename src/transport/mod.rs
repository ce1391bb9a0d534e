//! Outbound transport to the lipsync server
//!
//! The session only ever sends: silence keep-alives and voice audio. Inbound
//! messages reach the session through [`Session::feed`](crate::Session::feed).

pub mod websocket;

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::TransportError;

/// Message-oriented outbound channel
pub trait Transport: Send + Sync {
    fn send(&self, message: Bytes) -> Result<(), TransportError>;

    /// Release the channel. Later sends fail with [`TransportError::Closed`].
    fn close(&self) {}
}

/// Transport that forwards every message into a tokio channel.
///
/// The receiving end is typically a socket writer task; dropping the sender
/// on [`close`](Transport::close) lets that task finish.
pub struct ChannelTransport {
    tx: Mutex<Option<UnboundedSender<Bytes>>>,
    messages_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl ChannelTransport {
    /// Create a transport and the receiver its messages are delivered to
    pub fn new() -> (Self, UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
                messages_sent: AtomicU64::new(0),
                bytes_sent: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Check if the transport has been closed
    pub fn is_closed(&self) -> bool {
        self.tx.lock().as_ref().map_or(true, |tx| tx.is_closed())
    }

    /// Get transport statistics
    pub fn stats(&self) -> TransportStats {
        TransportStats {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }
}

impl Transport for ChannelTransport {
    fn send(&self, message: Bytes) -> Result<(), TransportError> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(TransportError::Closed)?;
        let len = message.len() as u64;
        tx.send(message).map_err(|_| TransportError::Closed)?;

        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(len, Ordering::Relaxed);
        Ok(())
    }

    fn close(&self) {
        self.tx.lock().take();
    }
}

/// Transport statistics
#[derive(Debug, Clone, Default)]
pub struct TransportStats {
    pub messages_sent: u64,
    pub bytes_sent: u64,
}
