// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

// Chat transport
//
// One streaming POST per turn. The session only sees `ChatTransport`; the
// HTTP adapter builds the wire request from config and hands the body back
// as a stream of raw chunks.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use futures_util::TryStreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use uuid::Uuid;

use crate::config::EndpointConfig;
use crate::message::Message;

/// Upper bound on how much of an error body is kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 1024;

// ---------------------------------------------------------------------------
// Request and errors
// ---------------------------------------------------------------------------

/// What the session asks the transport to send: the full transcript,
/// newest user turn last.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub request_id: Uuid,
    pub messages: Vec<Message>,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            messages,
        }
    }
}

/// Raw response body, chunked as it arrived.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("upstream returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream request timed out: {0}")]
    Timeout(String),
    #[error("invalid request: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else {
            TransportError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Interfaces
// ---------------------------------------------------------------------------

/// Opens one streaming chat exchange.
///
/// `Ok` means the upstream accepted the request; the stream then yields the
/// body in arrival order. Anything else (non-success status, connect
/// failure) is an `Err` before a single chunk is produced.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(&self, request: ChatRequest) -> Result<ChunkStream, TransportError>;
}

/// Sends HTTP requests upstream.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub timeout_ms: Option<u64>,
}

pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ChunkStream,
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

pub struct ReqwestHttpSender {
    client: reqwest::Client,
}

impl ReqwestHttpSender {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Client with the endpoint's connect timeout applied.
    pub fn from_endpoint(endpoint: &EndpointConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(ms) = endpoint.connect_timeout_ms {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl HttpSender for ReqwestHttpSender {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut req = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .body(request.body);

        if let Some(timeout_ms) = request.timeout_ms {
            req = req.timeout(Duration::from_millis(timeout_ms));
        }

        let resp = req.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes_stream().map_err(TransportError::from);

        Ok(HttpResponse {
            status,
            headers,
            body: Box::pin(body),
        })
    }
}

// ---------------------------------------------------------------------------
// HTTP chat adapter
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireBody<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<WireMessage<'a>>,
}

/// `ChatTransport` over an OpenAI-style chat-completions endpoint.
pub struct HttpChatTransport {
    http: Arc<dyn HttpSender>,
    url: String,
    model: String,
    system_prompt: Option<String>,
    headers: HeaderMap,
    timeout_ms: Option<u64>,
}

impl HttpChatTransport {
    pub fn new(
        endpoint: &EndpointConfig,
        system_prompt: Option<String>,
        http: Arc<dyn HttpSender>,
    ) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        if let Some(key) = &endpoint.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| TransportError::Request("api key is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        for (name, value) in &endpoint.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::Request(format!("invalid header name \"{name}\"")))?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                TransportError::Request(format!("invalid value for header \"{name}\""))
            })?;
            headers.insert(name, value);
        }

        Ok(Self {
            http,
            url: endpoint.url.clone(),
            model: endpoint.model.clone(),
            system_prompt,
            headers,
            timeout_ms: endpoint.request_timeout_ms,
        })
    }

    fn encode_body(&self, request: &ChatRequest) -> Result<Bytes, TransportError> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(prompt) = &self.system_prompt {
            messages.push(WireMessage {
                role: "system",
                content: prompt,
            });
        }
        messages.extend(request.messages.iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        let body = WireBody {
            model: &self.model,
            stream: true,
            messages,
        };
        serde_json::to_vec(&body)
            .map(Bytes::from)
            .map_err(|e| TransportError::Request(format!("failed to encode request body: {e}")))
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn open(&self, request: ChatRequest) -> Result<ChunkStream, TransportError> {
        let body = self.encode_body(&request)?;

        let mut headers = self.headers.clone();
        if let Ok(value) = HeaderValue::from_str(&request.request_id.to_string()) {
            headers.insert("x-request-id", value);
        }

        tracing::debug!(
            request_id = %request.request_id,
            url = %self.url,
            messages = request.messages.len(),
            body_bytes = body.len(),
            "opening chat stream"
        );

        let response = self
            .http
            .send(HttpRequest {
                method: Method::POST,
                url: self.url.clone(),
                headers,
                body,
                timeout_ms: self.timeout_ms,
            })
            .await?;

        if !response.status.is_success() {
            let status = response.status.as_u16();
            let body = read_error_body(response.body).await;
            tracing::warn!(
                request_id = %request.request_id,
                status,
                "upstream rejected chat request"
            );
            return Err(TransportError::Status { status, body });
        }

        Ok(response.body)
    }
}

/// Collect the start of an error body. Read failures end collection early.
async fn read_error_body(mut body: ChunkStream) -> String {
    let mut collected = Vec::new();
    while collected.len() < ERROR_BODY_LIMIT {
        match body.next().await {
            Some(Ok(chunk)) => collected.extend_from_slice(&chunk),
            Some(Err(_)) | None => break,
        }
    }
    collected.truncate(ERROR_BODY_LIMIT);
    String::from_utf8_lossy(&collected).trim().to_string()
}
