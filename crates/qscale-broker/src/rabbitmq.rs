//! Queue depth via the RabbitMQ management HTTP API.
//!
//! `GET {base}/api/queues/{vhost}/{queue}` returns a JSON document whose
//! `messages` field is the number of ready plus unacknowledged messages.
//! One client serves every virtual host; the vhost is a path segment.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use qscale_autoscale::{BrokerClient, ClientError};

use crate::error::BrokerError;

const USER_AGENT: &str = concat!("qscale/", env!("CARGO_PKG_VERSION"));

/// Management API queue document. Only the field we need.
#[derive(Debug, Deserialize)]
struct QueueInfo {
    #[serde(default)]
    messages: Option<u64>,
}

/// RabbitMQ management API client.
#[derive(Debug, Clone)]
pub struct RabbitMqClient {
    base: Url,
    authority: String,
    authorization: String,
    timeout: Duration,
}

impl RabbitMqClient {
    /// Build a client for `base_url`, e.g. `http://rabbitmq:15672`.
    pub fn new(
        base_url: &str,
        user: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, BrokerError> {
        let base = Url::parse(base_url).map_err(|e| BrokerError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if base.scheme() != "http" {
            return Err(BrokerError::UnsupportedScheme(base.scheme().to_string()));
        }
        let host = base.host_str().ok_or_else(|| BrokerError::InvalidUrl {
            url: base_url.to_string(),
            reason: "missing host".to_string(),
        })?;
        let port = base.port_or_known_default().unwrap_or(80);
        let authority = format!("{host}:{port}");

        let credentials = STANDARD.encode(format!("{user}:{password}"));

        Ok(Self {
            authority,
            base,
            authorization: format!("Basic {credentials}"),
            timeout,
        })
    }

    /// URL of a queue's management document. Both segments are
    /// percent-encoded, so the default vhost `/` becomes `%2F`.
    pub fn queue_url(&self, virtual_host: &str, queue: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "queues", virtual_host, queue]);
        }
        url
    }

    async fn get(&self, url: &Url) -> Result<(http::StatusCode, Bytes), ClientError> {
        let stream = tokio::net::TcpStream::connect(&self.authority)
            .await
            .map_err(|e| ClientError::Transport(format!("connect {}: {e}", self.authority)))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ClientError::Transport(format!("handshake: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(&url[url::Position::BeforePath..])
            .header("host", &self.authority)
            .header("user-agent", USER_AGENT)
            .header("accept", "application/json")
            .header("authorization", &self.authorization)
            .body(Empty::<Bytes>::new())
            .map_err(|e| ClientError::Transport(format!("build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ClientError::Transport(format!("request: {e}")))?;
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ClientError::Transport(format!("read body: {e}")))?
            .to_bytes();

        Ok((status, body))
    }
}

#[async_trait]
impl BrokerClient for RabbitMqClient {
    async fn queue_depth(&self, virtual_host: &str, queue: &str) -> Result<u64, ClientError> {
        let url = self.queue_url(virtual_host, queue);

        let (status, body) = tokio::time::timeout(self.timeout, self.get(&url))
            .await
            .map_err(|_| ClientError::Transport(format!("timed out after {:?}", self.timeout)))??;

        if status == http::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(format!("queue {virtual_host}/{queue}")));
        }
        if !status.is_success() {
            debug!(%status, %url, "management API non-2xx");
            return Err(ClientError::Transport(format!(
                "management API returned {status} for {virtual_host}/{queue}"
            )));
        }

        parse_queue_depth(&body)
    }
}

/// Extract the message count from a queue document. A missing or null
/// `messages` field (a freshly declared queue) counts as empty.
pub fn parse_queue_depth(body: &[u8]) -> Result<u64, ClientError> {
    let info: QueueInfo =
        serde_json::from_slice(body).map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
    Ok(info.messages.unwrap_or(0))
}
