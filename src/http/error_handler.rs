//! Error boundary.
//!
//! # Responsibilities
//! - Give every error response the `{ec, em}` envelope
//! - Show the full error chain in debug mode only
//! - Answer `HEAD` requests without a body
//!
//! # Design Decisions
//! - Runs as middleware around the dispatcher: `IntoResponse` has no access
//!   to server state, so the debug switch is applied here
//! - Error replies already carry an [`ErrorReport`]; anything else with an
//!   error status (extractor rejections, static file misses) is converted
//!   from its status and body text

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
};

use crate::reply::{ErrorReport, HttpApiResponse};

/// Largest body read back from a framework error response.
const MAX_ERROR_BODY: usize = 64 * 1024;

/// Middleware for `axum::middleware::from_fn_with_state(debug, handle_errors)`.
pub async fn handle_errors(State(debug): State<bool>, req: Request, next: Next) -> Response {
    let is_head = req.method() == Method::HEAD;
    let response = next.run(req).await;

    let status = response.status();
    let (mut parts, body) = response.into_parts();

    if let Some(report) = parts.extensions.get::<ErrorReport>().cloned() {
        if debug {
            let envelope = HttpApiResponse {
                ec: report.ec,
                em: report.detail,
                data: None,
            };
            return render(parts, &envelope, is_head);
        }
        if is_head {
            return strip_body(parts);
        }
        return Response::from_parts(parts, body);
    }

    if status.as_u16() < 400 {
        return Response::from_parts(parts, body);
    }

    let text = match axum::body::to_bytes(body, MAX_ERROR_BODY).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
        Err(e) => {
            tracing::debug!(error = %e, status = status.as_u16(), "Error body unreadable");
            String::new()
        }
    };
    let em = if text.is_empty() {
        status.canonical_reason().unwrap_or_default().to_string()
    } else {
        text
    };

    let report = ErrorReport::from_status(status.as_u16(), em);
    let envelope = HttpApiResponse {
        ec: report.ec,
        em: if debug {
            report.detail.clone()
        } else {
            report.em.clone()
        },
        data: None,
    };
    parts.extensions.insert(report);
    render(parts, &envelope, is_head)
}

fn render(mut parts: axum::http::response::Parts, envelope: &HttpApiResponse, is_head: bool) -> Response {
    parts.headers.remove(header::CONTENT_LENGTH);
    if is_head {
        return Response::from_parts(parts, Body::empty());
    }

    match serde_json::to_vec(envelope) {
        Ok(bytes) => {
            parts.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode error envelope");
            Response::from_parts(parts, Body::empty())
        }
    }
}

fn strip_body(mut parts: axum::http::response::Parts) -> Response {
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::Context;
    use crate::reply::{ERR_INTERNAL, ERR_NOT_FOUND};
    use axum::http::Request;
    use axum::{
        http::StatusCode,
        middleware,
        routing::{get, post},
        Json, Router,
    };
    use tower::ServiceExt;

    fn app(debug: bool) -> Router {
        Router::new()
            .route(
                "/fail",
                get(|ctx: Context| async move { ctx.abort(ERR_INTERNAL).with_err("db down") }),
            )
            .route(
                "/missing",
                get(|ctx: Context| async move { ctx.abort(ERR_NOT_FOUND) }),
            )
            .route(
                "/json",
                post(|Json(v): Json<serde_json::Value>| async move { Json(v) }),
            )
            .route("/teapot", get(|| async { StatusCode::IM_A_TEAPOT }))
            .layer(middleware::from_fn_with_state(debug, handle_errors))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_debug_shows_error_chain() {
        let response = app(true)
            .oneshot(Request::get("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["ec"], 500);
        assert!(body["em"].as_str().unwrap().contains("db down"));
    }

    #[tokio::test]
    async fn test_non_debug_hides_error_chain() {
        let response = app(false)
            .oneshot(Request::get("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["em"], "Internal Server Error");
    }

    #[tokio::test]
    async fn test_framework_rejection_gets_envelope() {
        let response = app(false)
            .oneshot(
                Request::post("/json")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let report = response.extensions().get::<ErrorReport>().cloned().unwrap();
        assert_eq!(report.ec, 400);

        let body = body_json(response).await;
        assert_eq!(body["ec"], 400);
        assert!(!body["em"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_error_body_uses_reason() {
        let response = app(false)
            .oneshot(Request::get("/teapot").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body, serde_json::json!({"ec": 418, "em": "I'm a teapot"}));
    }

    #[tokio::test]
    async fn test_debug_framework_error_shows_detail() {
        let response = app(true)
            .oneshot(Request::get("/teapot").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({"ec": 418, "em": "code: 418, I'm a teapot"})
        );
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let response = app(true)
            .oneshot(
                Request::builder()
                    .method(Method::HEAD)
                    .uri("/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }
}
