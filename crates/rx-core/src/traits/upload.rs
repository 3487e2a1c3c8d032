//! Upload channel trait

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use rx_protocol::ConnectionId;

/// Out-of-band transfer of a deployment artifact.
///
/// A successful return only means the submission was delivered. Whether the
/// deployment worked is reported later as a `deployOutput` message on the
/// connection identified by `correlation`.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        name: &str,
        payload: Bytes,
        correlation: &ConnectionId,
    ) -> Result<(), TransportError>;
}
