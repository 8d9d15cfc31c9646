//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (before start):
//!     HttpServer shortcuts / Group::get, post, ...
//!     → group.rs (prefix, group middleware, RouteInfo)
//!     → attached to the default router or a host router
//!
//! Dispatch (per request):
//!     host.rs (Host header → router)
//!     → axum path/method routing
//!     → handler, or 404/405 fallback
//! ```
//!
//! # Design Decisions
//! - Routes are fixed once the server starts
//! - Deterministic: same input always matches same route
//! - Unknown hosts are served by the default router

pub mod group;
pub mod host;

pub use group::{Group, RouteInfo};
pub use host::HostRouter;
