//! Handler contract and built-in fallbacks.

use std::future::Future;
use std::sync::Arc;

use axum::{
    response::Response,
    routing::{self, MethodRouter},
};

use crate::http::context::Context;
use crate::reply::{ErrReply, ERR_METHOD_NOT_ALLOWED, ERR_NOT_FOUND};

/// What handlers return: a response, or an error reply for the boundary.
pub type HandlerResult = Result<Response, ErrReply>;

/// A handler implemented by a type rather than a function.
///
/// ```ignore
/// struct Greeter { greeting: String }
///
/// impl Handle for Greeter {
///     async fn handle(&self, ctx: Context) -> HandlerResult {
///         ctx.set_payload(OK.with_data(&self.greeting))
///     }
/// }
/// ```
pub trait Handle: Send + Sync + 'static {
    fn handle(&self, ctx: Context) -> impl Future<Output = HandlerResult> + Send;
}

/// Route answering every method with a [`Handle`] implementation.
pub fn handler_of<H: Handle>(h: H) -> MethodRouter {
    let h = Arc::new(h);
    routing::any(move |ctx: Context| {
        let h = Arc::clone(&h);
        async move { h.handle(ctx).await }
    })
}

/// Fallback for unmatched paths.
pub async fn not_found_handler(ctx: Context) -> ErrReply {
    ctx.abort(ERR_NOT_FOUND)
}

/// Fallback for a matched path without a route for the method.
pub async fn method_not_allowed_handler(ctx: Context) -> ErrReply {
    ctx.abort(ERR_METHOD_NOT_ALLOWED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::{ErrorReport, OK};
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    struct Greeter {
        greeting: &'static str,
    }

    impl Handle for Greeter {
        async fn handle(&self, ctx: Context) -> HandlerResult {
            if ctx.query_param("fail").is_some() {
                return Err(ctx.abort(crate::reply::ERR_ILLEGAL_PARAMS));
            }
            ctx.set_payload(OK.with_data(self.greeting))
        }
    }

    #[tokio::test]
    async fn test_struct_handler() {
        let app = Router::new().route("/hi", handler_of(Greeter { greeting: "hello" }));

        let ok = app
            .clone()
            .oneshot(Request::get("/hi").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(ok.status(), 200);

        let bad = app
            .oneshot(Request::get("/hi?fail=1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(bad.status(), 400);
        assert_eq!(bad.extensions().get::<ErrorReport>().unwrap().ec, 400);
    }

    #[tokio::test]
    async fn test_fallbacks_answer_with_envelope() {
        let app = Router::new()
            .route("/only-get", get(|| async { "ok" }))
            .fallback(not_found_handler)
            .method_not_allowed_fallback(method_not_allowed_handler);

        let missing = app
            .clone()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);

        let wrong_method = app
            .oneshot(Request::post("/only-get").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(wrong_method.status(), 405);
        assert_eq!(wrong_method.extensions().get::<ErrorReport>().unwrap().ec, 405);
    }
}
