//! Access logging middleware.
//!
//! # Responsibilities
//! - Emit one event per request on the `uaxum::access` target
//! - Pick the level from the response status
//! - Attach the diagnostic fields and error chain of error replies
//!
//! # Design Decisions
//! - A plain tower layer so it can be named, cloned and installed with
//!   `HttpServer::pre`, `HttpServer::layer` or `Group::layer`
//! - Installed before routing it also sees reports added by the error
//!   boundary for framework errors

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::{Duration, Instant};

use axum::{extract::Request, http::request::Parts, response::Response};
use tower::{Layer, Service};
use tracing::Level;

use crate::http::context::{protocol, query_unescape};
use crate::reply::ErrorReport;

/// Decides whether a request is left out of the access log.
pub type Skipper = Arc<dyn Fn(&Parts) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct LoggerConfig {
    pub skipper: Option<Skipper>,
}

impl std::fmt::Debug for LoggerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggerConfig")
            .field("skipper", &self.skipper.is_some())
            .finish()
    }
}

/// Access logger with the default configuration.
pub fn logger() -> LoggerLayer {
    logger_with_config(LoggerConfig::default())
}

pub fn logger_with_config(config: LoggerConfig) -> LoggerLayer {
    LoggerLayer { config }
}

/// Level of the access event for `status`.
pub fn level_for_status(status: u16) -> Level {
    match status {
        500.. => Level::ERROR,
        400..=499 => Level::WARN,
        _ => Level::INFO,
    }
}

#[derive(Debug, Clone)]
pub struct LoggerLayer {
    config: LoggerConfig,
}

impl<S> Layer<S> for LoggerLayer {
    type Service = Logger<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logger {
            inner,
            config: self.config.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Logger<S> {
    inner: S,
    config: LoggerConfig,
}

/// Request data captured before the request is handed on.
struct AccessEntry {
    host: String,
    uri: String,
    method: String,
    protocol: &'static str,
    user_agent: String,
}

impl AccessEntry {
    fn new(parts: &Parts) -> Self {
        let header = |name: axum::http::HeaderName| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        let host = {
            let h = header(axum::http::header::HOST);
            if h.is_empty() {
                parts.uri.authority().map(|a| a.to_string()).unwrap_or_default()
            } else {
                h
            }
        };
        let raw_uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| parts.uri.path());

        Self {
            host,
            uri: query_unescape(raw_uri),
            method: parts.method.to_string(),
            protocol: protocol(parts.version),
            user_agent: header(axum::http::header::USER_AGENT),
        }
    }

    fn log(&self, status: u16, latency: Duration, report: Option<&ErrorReport>) {
        let latency = format!("{:?}", latency);
        // tracing levels must be static at the callsite
        macro_rules! emit {
            ($level:expr) => {
                match report {
                    Some(report) => tracing::event!(
                        target: "uaxum::access",
                        $level,
                        host = %self.host,
                        uri = %self.uri,
                        method = %self.method,
                        protocol = self.protocol,
                        user_agent = %self.user_agent,
                        status,
                        latency = %latency,
                        fields = %report.fields_display(),
                        error = %report.detail,
                    ),
                    None => tracing::event!(
                        target: "uaxum::access",
                        $level,
                        host = %self.host,
                        uri = %self.uri,
                        method = %self.method,
                        protocol = self.protocol,
                        user_agent = %self.user_agent,
                        status,
                        latency = %latency,
                    ),
                }
            };
        }

        let level = level_for_status(status);
        if level == Level::ERROR {
            emit!(Level::ERROR)
        } else if level == Level::WARN {
            emit!(Level::WARN)
        } else {
            emit!(Level::INFO)
        }
    }
}

impl<S> Service<Request> for Logger<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // Take the service that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let (parts, body) = req.into_parts();
        let skip = self
            .config
            .skipper
            .as_ref()
            .is_some_and(|skipper| skipper(&parts));
        let entry = (!skip).then(|| AccessEntry::new(&parts));
        let req = Request::from_parts(parts, body);

        Box::pin(async move {
            let start = Instant::now();
            let response = inner.call(req).await?;
            if let Some(entry) = entry {
                entry.log(
                    response.status().as_u16(),
                    start.elapsed(),
                    response.extensions().get::<ErrorReport>(),
                );
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::Context;
    use crate::reply::{ERR_ILLEGAL_PARAMS, OK};
    use axum::http::Request;
    use axum::{body::Body, routing::get, Router};
    use std::io;
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn app(layer: LoggerLayer) -> Router {
        Router::new()
            .route("/ok", get(|ctx: Context| async move { ctx.set_payload(OK) }))
            .route(
                "/bad",
                get(|ctx: Context| async move {
                    ctx.abort(ERR_ILLEGAL_PARAMS)
                        .with_err("missing id")
                        .with_field("rpc", "/svc")
                }),
            )
            .route("/health", get(|| async { "up" }))
            .layer(layer)
    }

    async fn capture(layer: LoggerLayer, uri: &str) -> String {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .with_max_level(Level::TRACE)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let _ = app(layer)
            .oneshot(Request::get(uri).header("user-agent", "curl/8.5").body(Body::empty()).unwrap())
            .await
            .unwrap();
        captured.text()
    }

    #[test]
    fn test_level_for_status() {
        assert_eq!(level_for_status(200), Level::INFO);
        assert_eq!(level_for_status(302), Level::INFO);
        assert_eq!(level_for_status(400), Level::WARN);
        assert_eq!(level_for_status(499), Level::WARN);
        assert_eq!(level_for_status(500), Level::ERROR);
        assert_eq!(level_for_status(503), Level::ERROR);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_success_logged_at_info() {
        let out = capture(logger(), "/ok?x=a%20b").await;
        assert!(out.contains("INFO"), "{out}");
        assert!(out.contains("uri=/ok?x=a b"), "{out}");
        assert!(out.contains("status=200"), "{out}");
        assert!(out.contains("user_agent=curl/8.5"), "{out}");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_client_error_logged_at_warn_with_fields() {
        let out = capture(logger(), "/bad").await;
        assert!(out.contains("WARN"), "{out}");
        assert!(out.contains("rpc=/svc"), "{out}");
        assert!(out.contains("missing id"), "{out}");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_skipper() {
        let config = LoggerConfig {
            skipper: Some(Arc::new(|parts: &Parts| parts.uri.path() == "/health")),
        };
        let out = capture(logger_with_config(config.clone()), "/health").await;
        assert!(!out.contains("uaxum::access"), "{out}");

        let out = capture(logger_with_config(config), "/ok").await;
        assert!(out.contains("uaxum::access"), "{out}");
    }
}
