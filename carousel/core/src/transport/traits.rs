//! Transport Traits
//!
//! Abstraction over how a UI surface exchanges events and messages with
//! the engine. The daemon speaks newline-delimited JSON over stdio; an
//! embedded surface uses [`super::InProcessTransport`] channels directly.

use async_trait::async_trait;
use thiserror::Error;

use crate::events::UiEvent;
use crate::messages::EngineMessage;

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport is in the wrong state for the call.
    #[error("invalid transport state: {0}")]
    InvalidState(String),

    /// Sending failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Surface-side transport: send events to the engine, receive messages.
#[async_trait]
pub trait UiTransport: Send {
    /// Mark the transport connected.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Mark the transport disconnected.
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Send an event to the engine.
    async fn send(&self, event: UiEvent) -> Result<(), TransportError>;

    /// Receive the next message from the engine, waiting if necessary.
    async fn recv(&mut self) -> Result<EngineMessage, TransportError>;

    /// Receive without waiting. `None` when no message is ready.
    fn try_recv(&mut self) -> Option<EngineMessage>;

    /// Whether the transport is currently connected.
    fn is_connected(&self) -> bool;
}
