//! In-Process Transport
//!
//! Direct channel-based communication for embedded mode: the UI surface
//! and the engine share one process and exchange events/messages over
//! tokio channels with no serialization.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::events::UiEvent;
use crate::messages::EngineMessage;

use super::traits::{TransportError, UiTransport};

/// In-process transport using tokio channels.
pub struct InProcessTransport {
    /// Channel to send events to the engine.
    event_tx: mpsc::Sender<UiEvent>,
    /// Channel to receive messages from the engine.
    msg_rx: mpsc::Receiver<EngineMessage>,
    /// Connection state.
    connected: Arc<AtomicBool>,
}

impl InProcessTransport {
    /// Create a transport pair.
    ///
    /// Returns:
    /// - `InProcessTransport`: use this in the surface
    /// - `mpsc::Receiver<UiEvent>`: the engine's event loop reads here
    /// - `mpsc::Sender<EngineMessage>`: hand this to [`crate::Engine`]
    #[must_use]
    pub fn new_pair() -> (
        Self,
        mpsc::Receiver<UiEvent>,
        mpsc::Sender<EngineMessage>,
    ) {
        Self::new_pair_with_capacity(100)
    }

    /// Create a transport pair with custom channel capacity.
    #[must_use]
    pub fn new_pair_with_capacity(
        capacity: usize,
    ) -> (
        Self,
        mpsc::Receiver<UiEvent>,
        mpsc::Sender<EngineMessage>,
    ) {
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (msg_tx, msg_rx) = mpsc::channel(capacity);

        let transport = Self {
            event_tx,
            msg_rx,
            connected: Arc::new(AtomicBool::new(true)),
        };

        (transport, event_rx, msg_tx)
    }
}

#[async_trait]
impl UiTransport for InProcessTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, event: UiEvent) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::InvalidState(
                "transport not connected".to_string(),
            ));
        }

        self.event_tx
            .send(event)
            .await
            .map_err(|_| TransportError::SendFailed("channel closed".to_string()))
    }

    async fn recv(&mut self) -> Result<EngineMessage, TransportError> {
        self.msg_rx
            .recv()
            .await
            .ok_or(TransportError::ConnectionClosed)
    }

    fn try_recv(&mut self) -> Option<EngineMessage> {
        self.msg_rx.try_recv().ok()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
