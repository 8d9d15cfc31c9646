//! Request context handed to handlers.
//!
//! # Responsibilities
//! - Expose request metadata (method, host, uri, headers, protocol)
//! - Collect response headers set by the handler
//! - Turn replies into responses or pooled error replies
//!
//! # Design Decisions
//! - Extracted from request parts only, so it combines with body extractors
//! - The pool comes from the request extensions when the server installed
//!   one, else the process-wide pool

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        request::Parts,
        Method, StatusCode, Uri, Version,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::reply::{ErrReply, ErrReplyPool, Reply};

/// Per-request view used by handlers.
#[derive(Debug, Clone)]
pub struct Context {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    resp_headers: HeaderMap,
    pool: Arc<ErrReplyPool>,
}

impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let pool = parts
            .extensions
            .get::<Arc<ErrReplyPool>>()
            .cloned()
            .unwrap_or_else(ErrReplyPool::global);

        Ok(Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
            resp_headers: HeaderMap::new(),
            pool,
        })
    }
}

impl Context {
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Host header, falling back to the URI authority.
    pub fn host(&self) -> &str {
        self.headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
            .unwrap_or_default()
    }

    /// Request URI (path and query), unescaped.
    pub fn uri(&self) -> String {
        let raw = self
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path());
        query_unescape(raw)
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Protocol string such as `HTTP/1.1`.
    pub fn protocol(&self) -> &'static str {
        protocol(self.version)
    }

    pub fn user_agent(&self) -> &str {
        self.get_header(header::USER_AGENT.as_str())
    }

    /// First value of query parameter `name`, unescaped.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.uri.query()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (query_unescape(key) == name).then(|| query_unescape(value))
        })
    }

    /// Request header value; empty when absent or not visible ASCII.
    pub fn get_header(&self, key: &str) -> &str {
        self.headers
            .get(key)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    /// Overwrite a request header as seen through this context.
    ///
    /// Invalid names or values are logged and ignored.
    pub fn set_header(&mut self, key: &str, value: &str) {
        if let Some((name, value)) = header_pair(key, value) {
            self.headers.insert(name, value);
        }
    }

    /// Set a header on every response built by this context.
    pub fn set_resp_header(&mut self, key: &str, value: &str) {
        if let Some((name, value)) = header_pair(key, value) {
            self.resp_headers.insert(name, value);
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// JSON response with the context's response headers.
    pub fn json<T: Serialize>(&self, status: StatusCode, body: &T) -> Response {
        self.with_resp_headers((status, Json(body)).into_response())
    }

    /// Write `payload`. Status 400 and above is treated as an error.
    pub fn set_payload(&self, payload: Reply) -> Result<Response, ErrReply> {
        if payload.is_error() {
            return Err(self.abort(payload));
        }
        Ok(self.json(payload.status(), &payload.to_body()))
    }

    /// Stop handling and answer with `reply` as an error.
    pub fn abort(&self, reply: Reply) -> ErrReply {
        self.pool.acquire(reply)
    }

    fn with_resp_headers(&self, mut response: Response) -> Response {
        for (name, value) in &self.resp_headers {
            response.headers_mut().insert(name.clone(), value.clone());
        }
        response
    }
}

fn header_pair(key: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    match (HeaderName::try_from(key), HeaderValue::try_from(value)) {
        (Ok(name), Ok(value)) => Some((name, value)),
        _ => {
            tracing::warn!(header = key, "Invalid header ignored");
            None
        }
    }
}

/// Decode `%XX` escapes and `+` as in a query string.
pub fn query_unescape(s: &str) -> String {
    let s = s.replace('+', " ");
    percent_encoding::percent_decode_str(&s)
        .decode_utf8_lossy()
        .into_owned()
}

pub(crate) fn protocol(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/?",
    }
}
