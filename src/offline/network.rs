//! Request/response types and the network seam the agent fetches through.

use reqwest::Method;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
        }
    }

    /// Cache lookups ignore the fragment, like a browser cache does.
    pub fn cache_url(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}

/// How a response relates to the requesting origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Basic,
    Cors,
    Opaque,
    Error,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Cors => "cors",
            Self::Opaque => "opaque",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "basic" => Self::Basic,
            "cors" => Self::Cors,
            "opaque" => Self::Opaque,
            _ => Self::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub kind: ResponseKind,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            kind: ResponseKind::Basic,
            content_type: None,
            body: body.into(),
        }
    }

    /// Only complete, successful responses are worth keeping.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind != ResponseKind::Error
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("reading response body from {url} failed: {message}")]
    Body { url: String, message: String },
}

/// Anything that can perform a request. Implementations must be safe to call
/// from several threads at once.
pub trait Network: Send + Sync {
    fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// `Network` over a blocking `reqwest` client.
pub struct HttpNetwork {
    client: reqwest::blocking::Client,
    origin: Url,
}

impl HttpNetwork {
    pub fn new(origin: Url) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("predger/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, origin })
    }
}

impl Network for HttpNetwork {
    fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = request.url.to_string();
        let resp = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .map_err(|e| FetchError::Network {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let kind = if request.url.origin() == self.origin.origin() {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        };
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = resp
            .bytes()
            .map_err(|e| FetchError::Body {
                url,
                message: e.to_string(),
            })?
            .to_vec();

        Ok(Response {
            status,
            kind,
            content_type,
            body,
        })
    }
}
