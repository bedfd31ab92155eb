//! Wire layer: one POST per call, JSON body in, status + text out.
//!
//! `Transport` is the seam the session layer is written against; the
//! production implementation is [`HttpTransport`] (reqwest), tests use an
//! in-memory script.

use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::envelope::Body;

/// Header carrying the session token.
pub const SESSION_HEADER: &str = "X-Session-Id";

/// A fully built outbound call. Always constructed from scratch, so a
/// replay after re-authentication can never carry a stale token.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub endpoint: String,
    pub token: Option<String>,
    pub body: Body,
}

impl OutboundRequest {
    /// Copy `body` and stamp the token into both the header slot and the
    /// body's `session_id` field.
    pub fn build(endpoint: &str, body: &Body, token: Option<&str>) -> Self {
        let mut body = body.clone();
        match token {
            Some(t) => {
                body.insert("session_id".into(), serde_json::Value::String(t.to_string()));
            }
            None => {
                body.remove("session_id");
            }
        }
        OutboundRequest {
            endpoint: endpoint.to_string(),
            token: token.map(str::to_string),
            body,
        }
    }
}

/// Status code plus undecoded body text.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("{0}")]
    Other(String),
}

/// Sends one request; retries, sessions and rate limits live above this.
pub trait Transport {
    async fn post(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport against a fixed base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base })
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

impl Transport for HttpTransport {
    async fn post(&self, request: &OutboundRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .post(self.endpoint_url(&request.endpoint))
            .header(CONTENT_TYPE, "application/json")
            .json(&request.body);
        if let Some(token) = &request.token {
            builder = builder.header(SESSION_HEADER, token);
        }
        let resp = builder.send().await.map_err(classify)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(classify)?;
        Ok(RawResponse { status, body })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
