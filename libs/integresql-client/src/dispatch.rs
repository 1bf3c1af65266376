//! Request dispatch over a reusable HTTP transport.
//!
//! [`Dispatcher`] turns `(method, path, query, body)` into a full URL under
//! `{base_url}/{api_version}/`, hands it to a [`Transport`], and logs the
//! request and the resulting status. Transport failures come back as
//! [`ClientError::Transport`] unchanged; interpreting the status is left to
//! [`crate::classify`].

use std::fmt;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use tracing::{debug, info};

pub use reqwest::Method;

use crate::classify::{self, Operation, Reply};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// A fully built request, ready for a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

/// Raw status and body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

/// Blocking request/response transport.
///
/// Implementations must be safe to share between threads; the dispatcher
/// adds no locking of its own.
pub trait Transport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> ClientResult<ApiResponse>;
}

/// [`Transport`] backed by a pooled blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a transport with a fresh connection pool.
    pub fn new() -> ClientResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| ClientError::Transport(Box::new(e)))?;
        Ok(Self { client })
    }

    /// Wrap an existing client, e.g. one configured with timeouts or a proxy.
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> ClientResult<ApiResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let rsp = builder
            .send()
            .map_err(|e| ClientError::Transport(Box::new(e)))?;
        let status = rsp.status().as_u16();
        let body = rsp
            .text()
            .map_err(|e| ClientError::Transport(Box::new(e)))?;
        Ok(ApiResponse { status, body })
    }
}

/// Issues requests against one IntegreSQL API root.
pub struct Dispatcher {
    root: String,
    transport: Box<dyn Transport>,
}

impl Dispatcher {
    pub fn new(config: &ClientConfig, transport: Box<dyn Transport>) -> Self {
        Self {
            root: config.api_root(),
            transport,
        }
    }

    /// `{base_url}/{api_version}`, without a trailing slash.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Full URL for `path`; a leading `/` on `path` is ignored.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.root, path.trim_start_matches('/'))
    }

    /// Send one request and return its raw status and body.
    pub fn dispatch<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> ClientResult<ApiResponse> {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(ClientError::Encode)?;
        let request = ApiRequest {
            method,
            url: self.url(path),
            query: query
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            body,
        };

        info!(
            method = %request.method,
            url = %request.url,
            query = ?request.query,
            body = ?request.body,
            "request"
        );
        let rsp = self.transport.send(&request)?;
        info!(
            method = %request.method,
            url = %request.url,
            status = rsp.status,
            "response"
        );
        // records carry database credentials
        debug!(url = %request.url, body = %rsp.body, "response body");
        Ok(rsp)
    }

    /// Dispatch and classify in one step.
    pub fn call<B: Serialize + ?Sized>(
        &self,
        operation: Operation,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ClientResult<Reply> {
        let rsp = self.dispatch(method, path, &[], body)?;
        let reply = classify::classify(operation, rsp.status, &rsp.body);
        debug!(%operation, status = rsp.status, ok = reply.is_ok(), "classified response");
        reply
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
