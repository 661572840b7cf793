use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use scenaria_core::ordered_map::OrderedMap;
use tracing::debug;

#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
    #[error("timeout")]
    Timeout,
    #[error("connect/dns/tls error: {0}")]
    Network(String),
    #[error("invalid request: {0}")]
    Request(String),
    #[error("http error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Default)]
pub struct HttpRequestParts {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponseParts {
    pub status: u16,
    /// Multi-valued headers in canonical form (`Content-Type`).
    pub headers: OrderedMap<String, Vec<String>>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, req: HttpRequestParts) -> Result<HttpResponseParts, HttpError>;
}

/// Settings that decide which pooled client a request goes through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ClientConfig {
    pub timeout: Option<Duration>,
    pub no_redirect: bool,
}

pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self, HttpError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("scenaria/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = cfg.timeout {
            builder = builder.timeout(timeout);
        }
        if cfg.no_redirect {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }
        let client = builder
            .build()
            .map_err(|e| HttpError::Other(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, req: HttpRequestParts) -> Result<HttpResponseParts, HttpError> {
        let method: reqwest::Method = req
            .method
            .parse()
            .map_err(|e: <reqwest::Method as std::str::FromStr>::Err| HttpError::Request(e.to_string()))?;
        let mut rb = self.client.request(method, &req.url);
        for (k, v) in req.headers {
            rb = rb.header(k, v);
        }
        if let Some(body) = req.body {
            rb = rb.body(body);
        }

        let resp = rb.send().await.map_err(map_reqwest_error)?;
        let status = resp.status().as_u16();

        let mut headers: OrderedMap<String, Vec<String>> = OrderedMap::new();
        for (k, v) in resp.headers().iter() {
            if let Ok(s) = v.to_str() {
                headers
                    .entry(canonical_header(k.as_str()))
                    .or_default()
                    .push(s.to_string());
            }
        }

        let body = resp.bytes().await.map_err(map_reqwest_error)?.to_vec();
        Ok(HttpResponseParts {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        return HttpError::Timeout;
    }
    if e.is_connect() {
        return HttpError::Network(e.to_string());
    }
    if e.is_builder() || e.is_request() {
        return HttpError::Request(e.to_string());
    }
    HttpError::Other(e.to_string())
}

/// `content-type` -> `Content-Type`.
pub fn canonical_header(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// One client per distinct [`ClientConfig`], shared by every request using it.
#[derive(Default)]
pub struct ClientPool {
    clients: Mutex<HashMap<ClientConfig, Arc<dyn HttpClient>>>,
}

impl ClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cfg: &ClientConfig) -> Result<Arc<dyn HttpClient>, HttpError> {
        let mut clients = self.clients.lock();
        if let Some(c) = clients.get(cfg) {
            return Ok(c.clone());
        }
        debug!(timeout = ?cfg.timeout, no_redirect = cfg.no_redirect, "creating HTTP client");
        let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new(cfg)?);
        clients.insert(cfg.clone(), client.clone());
        Ok(client)
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
