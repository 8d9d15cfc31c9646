//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Collect routes, groups, virtual hosts and middleware
//! - Assemble the axum router: host dispatch, fallbacks, error boundary
//! - Bind and serve over HTTP/1.1 (+h2c prior knowledge), TLS or h2c only
//! - Stop gracefully on `shutdown()` or a signal
//!
//! # Design Decisions
//! - `pre` middleware wraps the whole dispatch and sees every request,
//!   including unknown hosts and framework errors
//! - `layer` middleware is applied to every router after routing, so it
//!   runs for matched routes and the 404/405 fallbacks
//! - The error-reply pool is handed to handlers as a request extension

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Request,
    handler::Handler,
    http::Method,
    middleware,
    response::IntoResponse,
    routing::{MethodRouter, Route},
    Extension, Router,
};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::{Layer, Service};

use crate::config::{AppConfig, ListenerConfig};
use crate::error::Result;
use crate::http::error_handler::handle_errors;
use crate::http::handler::{method_not_allowed_handler, not_found_handler, Handle};
use crate::lifecycle::{startup, Shutdown};
use crate::net::{bind_listener, load_tls_config, CertSource};
use crate::reply::ErrReplyPool;
use crate::routing::group::{attach, RouterLayer};
use crate::routing::{Group, HostRouter, RouteInfo};

/// Options for [`HttpServer::start_h2c`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct H2cOptions {
    pub max_concurrent_streams: u32,
}

impl Default for H2cOptions {
    fn default() -> Self {
        Self::from(&ListenerConfig::default())
    }
}

impl From<&ListenerConfig> for H2cOptions {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            max_concurrent_streams: config.h2c_max_concurrent_streams,
        }
    }
}

/// HTTP server: registration front end plus the serving loops.
pub struct HttpServer {
    config: AppConfig,
    root: Group,
    groups: Vec<Group>,
    pre: Vec<RouterLayer>,
    layers: Vec<RouterLayer>,
    pool: Arc<ErrReplyPool>,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        let pool = Arc::new(ErrReplyPool::new(config.pool.max_idle));
        Self {
            config,
            root: Group::new(""),
            groups: Vec::new(),
            pre: Vec::new(),
            layers: Vec::new(),
            pool,
            shutdown: Shutdown::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Pool handing out the error replies of this server's handlers.
    pub fn pool(&self) -> Arc<ErrReplyPool> {
        Arc::clone(&self.pool)
    }

    /// Handle that stops the server once started.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Start a graceful shutdown of every serving loop of this server.
    pub fn shutdown(&self) {
        tracing::info!("Shutdown requested");
        self.shutdown.trigger();
    }

    /// Middleware run before routing, around the whole dispatch.
    pub fn pre<L>(mut self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.pre
            .push(Arc::new(move |router: Router| router.layer(layer.clone())));
        self
    }

    /// Middleware run after routing, for every host and group.
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.layers
            .push(Arc::new(move |router: Router| router.layer(layer.clone())));
        self
    }

    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.root = self.root.route(path, method_router);
        self
    }

    pub fn get<H: Handler<T, ()>, T: 'static>(mut self, path: &str, handler: H) -> Self {
        self.root = self.root.get(path, handler);
        self
    }

    pub fn post<H: Handler<T, ()>, T: 'static>(mut self, path: &str, handler: H) -> Self {
        self.root = self.root.post(path, handler);
        self
    }

    pub fn put<H: Handler<T, ()>, T: 'static>(mut self, path: &str, handler: H) -> Self {
        self.root = self.root.put(path, handler);
        self
    }

    pub fn delete<H: Handler<T, ()>, T: 'static>(mut self, path: &str, handler: H) -> Self {
        self.root = self.root.delete(path, handler);
        self
    }

    pub fn patch<H: Handler<T, ()>, T: 'static>(mut self, path: &str, handler: H) -> Self {
        self.root = self.root.patch(path, handler);
        self
    }

    pub fn head<H: Handler<T, ()>, T: 'static>(mut self, path: &str, handler: H) -> Self {
        self.root = self.root.head(path, handler);
        self
    }

    pub fn options<H: Handler<T, ()>, T: 'static>(mut self, path: &str, handler: H) -> Self {
        self.root = self.root.options(path, handler);
        self
    }

    pub fn trace<H: Handler<T, ()>, T: 'static>(mut self, path: &str, handler: H) -> Self {
        self.root = self.root.trace(path, handler);
        self
    }

    pub fn connect<H: Handler<T, ()>, T: 'static>(mut self, path: &str, handler: H) -> Self {
        self.root = self.root.connect(path, handler);
        self
    }

    pub fn any<H: Handler<T, ()>, T: 'static>(mut self, path: &str, handler: H) -> Self {
        self.root = self.root.any(path, handler);
        self
    }

    pub fn match_methods<H: Handler<T, ()>, T: 'static>(
        mut self,
        methods: &[Method],
        path: &str,
        handler: H,
    ) -> Self {
        self.root = self.root.match_methods(methods, path, handler);
        self
    }

    pub fn handle<H: Handle>(mut self, path: &str, h: H) -> Self {
        self.root = self.root.handle(path, h);
        self
    }

    pub fn static_dir(mut self, prefix: &str, root: impl AsRef<std::path::Path>) -> Self {
        self.root = self.root.static_dir(prefix, root);
        self
    }

    pub fn file(mut self, path: &str, file: impl AsRef<std::path::Path>) -> Self {
        self.root = self.root.file(path, file);
        self
    }

    /// Empty group for virtual host `name`; register it with [`HttpServer::mount`].
    pub fn host(&self, name: &str) -> Group {
        Group::host(name)
    }

    /// Empty group under `prefix`; register it with [`HttpServer::mount`].
    pub fn group(&self, prefix: &str) -> Group {
        Group::new(prefix)
    }

    pub fn mount(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    /// Every route registered so far.
    pub fn routes(&self) -> Vec<RouteInfo> {
        self.root
            .routes()
            .iter()
            .chain(self.groups.iter().flat_map(|g| g.routes()))
            .cloned()
            .collect()
    }

    /// Assemble the application router.
    pub fn into_router(self) -> Router {
        let HttpServer {
            config,
            root,
            groups,
            pre,
            layers,
            pool,
            ..
        } = self;

        let mut default = root.into_router();
        let mut hosts: Vec<(String, Router)> = Vec::new();
        for group in groups {
            let prefix = group.prefix().to_string();
            match group.host_name().map(str::to_string) {
                None => default = attach(default, &prefix, group.into_router()),
                Some(host) => {
                    let router = group.into_router();
                    match hosts.iter_mut().find(|(h, _)| *h == host) {
                        Some((_, existing)) => {
                            *existing = attach(std::mem::take(existing), &prefix, router)
                        }
                        None => hosts.push((host, attach(Router::new(), &prefix, router))),
                    }
                }
            }
        }

        let finish = |router: Router| {
            let mut router = router
                .fallback(not_found_handler)
                .method_not_allowed_fallback(method_not_allowed_handler);
            for layer in &layers {
                router = layer(router);
            }
            router
        };

        let mut dispatch = HostRouter::new(finish(default));
        for (host, router) in hosts {
            dispatch.insert(&host, finish(router));
        }

        let mut router = dispatch
            .into_router()
            .layer(Extension(pool))
            .layer(middleware::from_fn_with_state(config.debug, handle_errors));
        for layer in &pre {
            router = layer(router);
        }
        router
    }

    /// Serve HTTP/1.1 and h2c (prior knowledge) on `addr`.
    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = bind_listener(addr, &self.config.listener.network).await?;
        startup::announce(&self.config, "http", listener.local_addr()?);
        self.run(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn run(self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        let shutdown = self.shutdown.clone();
        let app = self.into_router();

        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move { shutdown.wait_or_signal().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr`. HTTP/2 is offered through ALPN unless
    /// `listener.disable_http2` is set.
    pub async fn start_tls(
        self,
        addr: &str,
        cert: impl Into<CertSource>,
        key: impl Into<CertSource>,
    ) -> Result<()> {
        let http2 = !self.config.listener.disable_http2;
        let tls = load_tls_config(&cert.into(), &key.into(), http2)?;

        let listener = bind_listener(addr, &self.config.listener.network).await?;
        let local = listener.local_addr()?;
        startup::announce(&self.config, "https", local);

        let grace = Duration::from_secs(self.config.shutdown.grace_period_secs);
        let shutdown = self.shutdown.clone();
        let app = self.into_router();

        let listener = listener.into_std()?;
        let handle = axum_server::Handle::new();
        let watcher = handle.clone();
        // Dropped on every exit from here, so a failed serve leaves no
        // task waiting on the signal.
        let _drain = AbortOnDrop(tokio::spawn(async move {
            shutdown.wait_or_signal().await;
            tracing::info!("HTTPS server draining");
            watcher.graceful_shutdown(Some(grace));
        }));

        tracing::info!(address = %local, http2, "HTTPS server starting");

        axum_server::from_tcp_rustls(listener, tls)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Serve cleartext HTTP/2 only on `addr`.
    pub async fn start_h2c(self, addr: &str, options: H2cOptions) -> Result<()> {
        let listener = bind_listener(addr, &self.config.listener.network).await?;
        startup::announce(&self.config, "h2c", listener.local_addr()?);
        self.run_h2c(listener, options).await
    }

    /// Serve cleartext HTTP/2 only on an already bound listener.
    pub async fn run_h2c(self, listener: TcpListener, options: H2cOptions) -> Result<()> {
        let local = listener.local_addr()?;
        let grace = Duration::from_secs(self.config.shutdown.grace_period_secs);
        let shutdown = self.shutdown.clone();
        let app = self.into_router();

        let mut builder = Builder::new(TokioExecutor::new()).http2_only();
        builder
            .http2()
            .max_concurrent_streams(options.max_concurrent_streams);
        let builder = Arc::new(builder);

        tracing::info!(
            address = %local,
            max_concurrent_streams = options.max_concurrent_streams,
            "h2c server starting"
        );

        let mut connections = tokio::task::JoinSet::new();
        let stop = shutdown.clone();
        let stopping = stop.wait_or_signal();
        tokio::pin!(stopping);

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = &mut stopping => break,
            };
            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) if is_connection_error(&e) => {
                    tracing::debug!(error = %e, "Accept failed");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => continue,
                        _ = &mut stopping => break,
                    }
                }
            };

            let service = TowerToHyperService::new(app.clone());
            let builder = Arc::clone(&builder);
            let shutdown = shutdown.clone();
            connections.spawn(async move {
                let conn = builder.serve_connection(TokioIo::new(stream), service);
                tokio::pin!(conn);
                tokio::select! {
                    result = conn.as_mut() => {
                        if let Err(e) = result {
                            tracing::debug!(peer = %peer, error = %e, "h2c connection closed with error");
                        }
                    }
                    _ = shutdown.wait() => {
                        conn.as_mut().graceful_shutdown();
                        let _ = conn.await;
                    }
                }
            });
        }

        // The accept loop may have stopped on a signal only.
        shutdown.trigger();
        if tokio::time::timeout(grace, async { while connections.join_next().await.is_some() {} })
            .await
            .is_err()
        {
            tracing::warn!(remaining = connections.len(), "Grace period elapsed, closing connections");
            connections.abort_all();
        }

        tracing::info!("h2c server stopped");
        Ok(())
    }
}

/// Pause after an accept error that is not tied to one connection, such as
/// running out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Errors that only concern the connection being accepted.
fn is_connection_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
    )
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("config", &self.config)
            .field("routes", &self.routes())
            .field("pre", &self.pre.len())
            .field("layers", &self.layers.len())
            .finish()
    }
}
