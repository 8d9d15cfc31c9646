//! Route groups.
//!
//! # Responsibilities
//! - Register handlers under a common path prefix and optional host
//! - Apply group middleware to every route of the group, including routes
//!   added after the middleware and routes of sub-groups
//! - Record a [`RouteInfo`] per registration
//!
//! # Design Decisions
//! - Middleware is kept aside and applied when the group is turned into a
//!   router, so registration order does not matter
//! - A prefixed group with middleware answers its own unmatched paths with
//!   the 404 envelope, so the middleware also runs for them
//! - Static files are served by `tower-http`

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::Request,
    handler::Handler,
    http::Method,
    response::IntoResponse,
    routing::{self, MethodFilter, MethodRouter, Route},
    Router,
};
use tower::{Layer, Service};
use tower_http::services::{ServeDir, ServeFile};

use crate::http::handler::{handler_of, not_found_handler, Handle};

/// Function applied to a router when it is finalized.
pub(crate) type RouterLayer = Arc<dyn Fn(Router) -> Router + Send + Sync>;

/// A registered route, as listed by [`crate::HttpServer::routes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// Virtual host, empty for the default host.
    pub host: String,
    pub method: String,
    pub path: String,
    /// Type name of the handler.
    pub name: String,
}

/// Set of routes sharing a prefix, a host and middleware.
#[derive(Clone)]
pub struct Group {
    host: Option<String>,
    /// Mount point relative to the parent.
    prefix: String,
    /// Full path of the mount point, used for route listings.
    base: String,
    router: Router,
    layers: Vec<RouterLayer>,
    routes: Vec<RouteInfo>,
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("host", &self.host)
            .field("prefix", &self.prefix)
            .field("layers", &self.layers.len())
            .field("routes", &self.routes)
            .finish()
    }
}

impl Group {
    /// Group for the default host mounted at `prefix`.
    pub fn new(prefix: &str) -> Self {
        let prefix = normalize_prefix(prefix);
        Self {
            host: None,
            base: prefix.clone(),
            prefix,
            router: Router::new(),
            layers: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Group answering only requests for virtual host `name`.
    pub fn host(name: &str) -> Self {
        Self {
            host: Some(name.to_ascii_lowercase()),
            ..Self::new("")
        }
    }

    pub fn host_name(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Routes registered so far, with full paths.
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    /// Register a method router built with `axum::routing`.
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        self.record("*", path, std::any::type_name::<MethodRouter>());
        self.router = self.router.route(path, method_router);
        self
    }

    pub fn get<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.on(Method::GET, path, handler)
    }

    pub fn post<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.on(Method::POST, path, handler)
    }

    pub fn put<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.on(Method::DELETE, path, handler)
    }

    pub fn patch<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.on(Method::PATCH, path, handler)
    }

    pub fn head<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.on(Method::HEAD, path, handler)
    }

    pub fn options<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.on(Method::OPTIONS, path, handler)
    }

    pub fn trace<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.on(Method::TRACE, path, handler)
    }

    pub fn connect<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.on(Method::CONNECT, path, handler)
    }

    /// Register `handler` for every method.
    pub fn any<H, T>(mut self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.record("*", path, std::any::type_name::<H>());
        self.router = self.router.route(path, routing::any(handler));
        self
    }

    /// Register `handler` for each of `methods`.
    ///
    /// Methods without a routing filter (extension methods) are logged and
    /// skipped.
    pub fn match_methods<H, T>(mut self, methods: &[Method], path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let mut filter: Option<MethodFilter> = None;
        for method in methods {
            match MethodFilter::try_from(method.clone()) {
                Ok(f) => {
                    filter = Some(filter.map_or(f, |acc| acc.or(f)));
                    self.record(method.as_str(), path, std::any::type_name::<H>());
                }
                Err(_) => {
                    tracing::warn!(method = %method, path, "Method cannot be routed, skipped");
                }
            }
        }

        if let Some(filter) = filter {
            self.router = self.router.route(path, routing::on(filter, handler));
        }
        self
    }

    /// Register a [`Handle`] implementation for every method.
    pub fn handle<H: Handle>(mut self, path: &str, h: H) -> Self {
        self.record("*", path, std::any::type_name::<H>());
        self.router = self.router.route(path, handler_of(h));
        self
    }

    /// Add group middleware.
    ///
    /// Applies to every route of the group and its sub-groups, whenever
    /// they are registered.
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

    /// Add a sub-group mounted at `prefix`, configured by `build`.
    ///
    /// The sub-group inherits the host and the middleware of this group.
    pub fn group(mut self, prefix: &str, build: impl FnOnce(Group) -> Group) -> Self {
        let prefix = normalize_prefix(prefix);
        let child = Group {
            host: self.host.clone(),
            base: join(&self.base, &prefix),
            prefix,
            router: Router::new(),
            layers: Vec::new(),
            routes: Vec::new(),
        };
        let child = build(child);

        self.routes.extend(child.routes.iter().cloned());
        let prefix = child.prefix.clone();
        self.router = attach(self.router, &prefix, child.into_router());
        self
    }

    /// Serve the files under `root` at `prefix`.
    pub fn static_dir(mut self, prefix: &str, root: impl AsRef<Path>) -> Self {
        let prefix = normalize_prefix(prefix);
        self.record("GET", &format!("{}/{{*path}}", prefix), std::any::type_name::<ServeDir>());

        let service = ServeDir::new(root);
        self.router = if prefix.is_empty() {
            self.router.fallback_service(service)
        } else {
            self.router.nest_service(&prefix, service)
        };
        self
    }

    /// Serve the single file `file` at `path`.
    pub fn file(mut self, path: &str, file: impl AsRef<Path>) -> Self {
        self.record("GET", path, std::any::type_name::<ServeFile>());
        self.router = self.router.route_service(path, ServeFile::new(file));
        self
    }

    /// Finalize into a router with paths relative to [`Group::prefix`].
    pub fn into_router(self) -> Router {
        let mut router = self.router;
        if self.layers.is_empty() {
            return router;
        }
        if !self.prefix.is_empty() {
            router = router.fallback(not_found_handler);
        }
        for layer in &self.layers {
            router = layer(router);
        }
        router
    }

    fn on<H, T>(mut self, method: Method, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.record(method.as_str(), path, std::any::type_name::<H>());
        let filter = match MethodFilter::try_from(method) {
            Ok(filter) => filter,
            // every method passed by the shortcuts has a filter
            Err(_) => return self,
        };
        self.router = self.router.route(path, routing::on(filter, handler));
        self
    }

    fn record(&mut self, method: &str, path: &str, name: &str) {
        self.routes.push(RouteInfo {
            host: self.host.clone().unwrap_or_default(),
            method: method.to_string(),
            path: join(&self.base, path),
            name: name.to_string(),
        });
    }
}

/// Mount `child` on `parent` at `prefix`; an empty prefix merges.
pub(crate) fn attach(parent: Router, prefix: &str, child: Router) -> Router {
    if prefix.is_empty() {
        parent.merge(child)
    } else {
        parent.nest(prefix, child)
    }
}

/// `"/"` and `""` mean the root; otherwise a leading slash and no
/// trailing one.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn join(base: &str, path: &str) -> String {
    match (base.is_empty(), path) {
        (true, "") => "/".to_string(),
        (true, _) => path.to_string(),
        (false, "" | "/") => base.to_string(),
        (false, _) => format!("{}{}", base, path),
    }
}
