//! Multipart upload channel
//!
//! Artifacts travel out of band over HTTP. The request only has to be
//! delivered: the verdict arrives later as a `deployOutput` message on the
//! WebSocket connection, correlated by the connection identity sent in the
//! `id` field.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};

use rx_core::error::TransportError;
use rx_core::traits::Uploader;
use rx_protocol::ConnectionId;

/// Uploads artifacts with `multipart/form-data` POST requests
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploader {
    /// Create an uploader posting to `endpoint`, bounding each request by `timeout`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Upload(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Endpoint uploads are posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn form(name: &str, payload: Bytes, correlation: &ConnectionId) -> Result<Form, TransportError> {
        let length = payload.len() as u64;
        let file = Part::stream_with_length(payload, length)
            .file_name(name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| TransportError::Upload(e.to_string()))?;

        Ok(Form::new()
            .text("name", name.to_string())
            .part("file", file)
            .text("id", correlation.to_string()))
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(
        &self,
        name: &str,
        payload: Bytes,
        correlation: &ConnectionId,
    ) -> Result<(), TransportError> {
        let size = payload.len();
        let form = Self::form(name, payload, correlation)?;

        tracing::debug!(name, size, endpoint = %self.endpoint, "Uploading artifact");

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Upload(e.to_string()))?;

        // The backend reports the outcome over the connection; the HTTP
        // status is informational only.
        let status = response.status();
        if status.is_success() {
            tracing::debug!(name, %status, "Upload delivered");
        } else {
            tracing::warn!(name, %status, "Upload endpoint answered with a non-success status");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Multipart, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    type Fields = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

    async fn record(State(fields): State<Fields>, mut multipart: Multipart) -> StatusCode {
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().unwrap_or_default().to_string();
            let data = field.bytes().await.unwrap_or_default();
            fields.lock().push((name, data.to_vec()));
        }
        StatusCode::OK
    }

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/deploy", addr)
    }

    #[tokio::test]
    async fn test_upload_sends_all_fields() {
        let fields: Fields = Arc::default();
        let router = Router::new()
            .route("/deploy", post(record))
            .with_state(Arc::clone(&fields));
        let endpoint = serve(router).await;

        let uploader = HttpUploader::new(endpoint, Duration::from_secs(5)).unwrap();
        uploader
            .upload("job", Bytes::from_static(b"\x7fELF"), &ConnectionId::new("c1"))
            .await
            .unwrap();

        let fields = fields.lock().clone();
        assert_eq!(
            fields,
            vec![
                ("name".to_string(), b"job".to_vec()),
                ("file".to_string(), b"\x7fELF".to_vec()),
                ("id".to_string(), b"c1".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn test_large_payload_arrives_intact() {
        let fields: Fields = Arc::default();
        let router = Router::new()
            .route("/deploy", post(record))
            .with_state(Arc::clone(&fields));
        let endpoint = serve(router).await;

        let payload: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
        let uploader = HttpUploader::new(endpoint, Duration::from_secs(5)).unwrap();
        uploader
            .upload("big", Bytes::from(payload.clone()), &ConnectionId::new("c1"))
            .await
            .unwrap();

        let fields = fields.lock().clone();
        let file = fields.iter().find(|(name, _)| name == "file").unwrap();
        assert_eq!(file.1, payload);
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_an_error() {
        let router = Router::new().route(
            "/deploy",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let endpoint = serve(router).await;

        let uploader = HttpUploader::new(endpoint, Duration::from_secs(5)).unwrap();
        let result = uploader
            .upload("job", Bytes::from_static(b"x"), &ConnectionId::new("c1"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_upload_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let uploader =
            HttpUploader::new(format!("http://{}/deploy", addr), Duration::from_secs(5)).unwrap();
        let result = uploader
            .upload("job", Bytes::from_static(b"x"), &ConnectionId::new("c1"))
            .await;
        assert!(matches!(result, Err(TransportError::Upload(_))));
    }
}
