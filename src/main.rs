//! uaxum demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!   Client Request    │  ┌─────────┐   ┌───────────┐   ┌──────────┐  │
//!   ──────────────────┼─▶│   net   │──▶│    pre    │──▶│  error   │  │
//!                     │  │listener │   │ (logger)  │   │ boundary │  │
//!                     │  └─────────┘   └───────────┘   └────┬─────┘  │
//!                     │                                     ▼        │
//!                     │                ┌───────────┐   ┌──────────┐  │
//!                     │                │  handler  │◀──│ routing  │  │
//!                     │                │ + Context │   │host/group│  │
//!                     │                └─────┬─────┘   └──────────┘  │
//!   Client Response   │                      ▼                       │
//!   ◀─────────────────┼──────────── Reply / ErrReply envelope        │
//!                     └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use clap::Parser;
use serde::Serialize;

use uaxum::config::{load_config, AppConfig};
use uaxum::http::middleware::logger;
use uaxum::lifecycle::startup;
use uaxum::observability::init_logging;
use uaxum::{Context, Handle, HandlerResult, HttpServer, ERR_ILLEGAL_PARAMS, ERR_INTERNAL, OK};

#[derive(Debug, Parser)]
#[command(name = "uaxum", version, about = "Demo server for the uaxum reply envelope")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration.
    #[arg(short, long)]
    addr: Option<String>,

    /// Surface error chains in responses.
    #[arg(long)]
    debug: bool,
}

#[derive(Debug, Clone, Serialize)]
struct EchoHandler {
    field1: String,
}

impl Handle for EchoHandler {
    async fn handle(&self, mut ctx: Context) -> HandlerResult {
        ctx.set_resp_header("test-key", "abcdefg");
        let echo = EchoHandler {
            field1: ctx.query_param("field1").unwrap_or_else(|| self.field1.clone()),
        };
        Ok(ctx.json(axum::http::StatusCode::OK, &echo))
    }
}

#[derive(Debug, Serialize)]
struct Hello {
    field_1: &'static str,
    field_2: i64,
}

async fn timing(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;
    tracing::debug!(path = %path, elapsed = ?start.elapsed(), "Group middleware");
    response
}

fn build(config: AppConfig) -> HttpServer {
    let server = HttpServer::new(config);

    let v1 = server
        .group("/v1")
        .layer(axum::middleware::from_fn(timing))
        .get("/hello", |ctx: Context| async move {
            ctx.abort(ERR_INTERNAL)
                .with_err("internal error")
                .with_field("rpc", "/service/session-service")
        });

    let v2 = server
        .group("/v2")
        .layer(axum::middleware::from_fn(timing))
        .post("/hello", |ctx: Context| async move {
            ctx.set_payload(OK.with_data(Hello {
                field_1: "field_1",
                field_2: 100_000_000,
            }))
        });

    server
        .pre(logger())
        .mount(v1)
        .mount(v2)
        .get("/v3/hello", |ctx: Context| async move {
            ctx.abort(ERR_ILLEGAL_PARAMS).with_err("parameter parsing failed")
        })
        .handle(
            "/v4/handler",
            EchoHandler {
                field1: "Handler".to_string(),
            },
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if cli.debug {
        config.debug = true;
    }
    if let Some(addr) = cli.addr {
        config.listener.bind_address = addr;
    }

    init_logging(&config.logging);
    startup::apply_i18n(&config.i18n);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        network = %config.listener.network,
        debug = config.debug,
        "Configuration loaded"
    );

    let addr = config.listener.bind_address.clone();
    let tls = config.listener.tls.clone();
    let server = build(config);
    for route in server.routes() {
        tracing::debug!(method = %route.method, path = %route.path, handler = %route.name, "Route registered");
    }

    match tls {
        Some(tls) => {
            server
                .start_tls(&addr, PathBuf::from(tls.cert_path), PathBuf::from(tls.key_path))
                .await?
        }
        None => server.start(&addr).await?,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
