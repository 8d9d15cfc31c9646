//! Virtual host dispatch.
//!
//! # Responsibilities
//! - Pick the router for the request's host
//! - Fall back to the default router for unknown hosts
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110)
//! - The exact `host:port` is tried first, then the bare host
//! - Immutable after construction; O(1) lookup via HashMap

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    Router,
};
use tower::ServiceExt;

/// Default router plus one router per virtual host.
#[derive(Debug, Clone, Default)]
pub struct HostRouter {
    default: Router,
    hosts: HashMap<String, Router>,
}

impl HostRouter {
    pub fn new(default: Router) -> Self {
        Self {
            default,
            hosts: HashMap::new(),
        }
    }

    /// Register `router` for `host`. A later registration replaces an
    /// earlier one.
    pub fn insert(&mut self, host: &str, router: Router) {
        self.hosts.insert(host.to_ascii_lowercase(), router);
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Router for a request whose host is `host`.
    pub fn select(&self, host: Option<&str>) -> &Router {
        let Some(host) = host else {
            return &self.default;
        };
        let host = host.to_ascii_lowercase();

        if let Some(router) = self.hosts.get(&host) {
            return router;
        }
        strip_port(&host)
            .and_then(|bare| self.hosts.get(bare))
            .unwrap_or(&self.default)
    }

    /// Single router dispatching on the host.
    pub fn into_router(self) -> Router {
        if self.hosts.is_empty() {
            return self.default;
        }

        let dispatch = Arc::new(self);
        Router::new().fallback_service(tower::service_fn(move |req: Request| {
            let router = dispatch.select(request_host(&req)).clone();
            async move { router.oneshot(req).await }
        }))
    }
}

/// Host header, falling back to the URI authority (HTTP/2).
pub fn request_host(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().authority().map(|a| a.as_str()))
}

fn strip_port(host: &str) -> Option<&str> {
    let (bare, port) = host.rsplit_once(':')?;
    port.parse::<u16>().ok().map(|_| bare)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get};

    fn tagged(tag: &'static str) -> Router {
        Router::new().route("/", get(move || async move { tag }))
    }

    async fn body_of(router: Router, host: Option<&str>) -> String {
        let mut req = axum::http::Request::builder().uri("/");
        if let Some(host) = host {
            req = req.header("Host", host);
        }
        let response = router.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.com:8080"), Some("example.com"));
        assert_eq!(strip_port("[::1]:443"), Some("[::1]"));
        assert_eq!(strip_port("example.com"), None);
        assert_eq!(strip_port("[::1]"), None);
    }

    #[tokio::test]
    async fn test_host_dispatch() {
        let mut hosts = HostRouter::new(tagged("default"));
        hosts.insert("API.example.com", tagged("api"));
        let router = hosts.into_router();

        assert_eq!(body_of(router.clone(), Some("api.example.com")).await, "api");
        // Case insensitive
        assert_eq!(body_of(router.clone(), Some("API.EXAMPLE.COM")).await, "api");
        assert_eq!(body_of(router.clone(), Some("api.example.com:8080")).await, "api");
        assert_eq!(body_of(router.clone(), Some("other.com")).await, "default");
        assert_eq!(body_of(router, None).await, "default");
    }

    #[tokio::test]
    async fn test_exact_port_wins() {
        let mut hosts = HostRouter::new(tagged("default"));
        hosts.insert("example.com", tagged("any-port"));
        hosts.insert("example.com:9000", tagged("9000"));
        let router = hosts.into_router();

        assert_eq!(body_of(router.clone(), Some("example.com:9000")).await, "9000");
        assert_eq!(body_of(router, Some("example.com:80")).await, "any-port");
    }
}
