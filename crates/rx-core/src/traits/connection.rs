//! Connection traits

use async_trait::async_trait;

use crate::error::TransportError;
use rx_protocol::Outbound;

/// Outbound half of the duplex connection to the backend
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send a message over the connection
    async fn send(&self, message: Outbound) -> Result<(), TransportError>;

    /// Check if the connection is still open
    fn is_open(&self) -> bool;

    /// Close the connection gracefully
    async fn close(&self) -> Result<(), TransportError>;
}
