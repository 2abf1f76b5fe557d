//! HTTP boundary to the remote healing pipeline.
//!
//! Every call is a single timeout-bounded request/response. No retries happen
//! here; the pollers decide what a failure means.

use crate::error::TransportError;
use crate::model::{
    Ack, ClientConfig, HealthReport, ResultSnapshot, StartAck, StartPayload, StatusReport,
    TimelineReport,
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Operations the controller needs from the pipeline service.
#[async_trait]
pub trait PipelineTransport: Send + Sync {
    async fn start(&self, payload: &StartPayload) -> Result<StartAck, TransportError>;
    async fn poll_status(&self) -> Result<StatusReport, TransportError>;
    async fn fetch_results(&self) -> Result<ResultSnapshot, TransportError>;
    async fn fetch_timeline(&self) -> Result<TimelineReport, TransportError>;
    async fn reset_remote(&self) -> Result<Ack, TransportError>;
    async fn health(&self) -> Result<HealthReport, TransportError>;
}

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(cfg: &ClientConfig) -> Result<Self, TransportError> {
        let base_url = Url::parse(cfg.base_url.trim())
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", cfg.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::InvalidUrl(cfg.base_url.clone()));
        }
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.request_timeout)
            .build()
            .map_err(TransportError::Request)?;
        Ok(Self { http, base_url })
    }

    /// Resolve an API path against the base URL, keeping any path prefix.
    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}{}", self.base_url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.endpoint(path);
        debug!(%method, %url, "pipeline request");
        self.http.request(method, url)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Vec<u8>, TransportError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status,
                detail: extract_detail(&body),
                body,
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, TransportError> {
        let body = self.send(req).await?;
        serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Like `send_json`, but an empty body decodes to the default value.
    async fn send_ack<T: DeserializeOwned + Default>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, TransportError> {
        let body = self.send(req).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PipelineTransport for HttpTransport {
    async fn start(&self, payload: &StartPayload) -> Result<StartAck, TransportError> {
        self.send_ack(self.request(Method::POST, "/api/run-agent").json(payload))
            .await
    }

    async fn poll_status(&self) -> Result<StatusReport, TransportError> {
        self.send_json(self.request(Method::GET, "/api/status")).await
    }

    async fn fetch_results(&self) -> Result<ResultSnapshot, TransportError> {
        self.send_json(self.request(Method::GET, "/api/results")).await
    }

    async fn fetch_timeline(&self) -> Result<TimelineReport, TransportError> {
        self.send_json(self.request(Method::GET, "/api/timeline")).await
    }

    async fn reset_remote(&self) -> Result<Ack, TransportError> {
        self.send_ack(self.request(Method::POST, "/api/reset")).await
    }

    async fn health(&self) -> Result<HealthReport, TransportError> {
        self.send_json(self.request(Method::GET, "/health")).await
    }
}

/// Pull the human-readable message out of an error body. Handles both
/// `{"detail": "..."}` and validation lists `{"detail": [{"msg": "..."}]}`.
fn extract_detail(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    match v.get("detail")? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|i| i.get("msg").and_then(|m| m.as_str()))
                .collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        _ => None,
    }
}
