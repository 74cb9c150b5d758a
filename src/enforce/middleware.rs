//! Request-interception middleware that enforces a limiter.

use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, warn};

use super::guard::RateLimitGuard;
use super::identity::client_identity;

/// Structured denial payload for API flows.
#[derive(Debug, Serialize)]
struct DenialBody {
    detail: String,
    retry_after: u64,
}

/// Axum middleware enforcing the [`RateLimitGuard`] attached to the
/// route.
///
/// Wire it with `axum::middleware::from_fn(rate_limit)` plus an
/// `Extension(Arc<RateLimitGuard>)` layer outside it. Each request is
/// checked against the guard's limiter under the resolved caller
/// identity; allowed requests run the wrapped handler unchanged, denied
/// requests branch to a redirect (browser flows) or a structured
/// too-many-requests payload (API flows).
///
/// When the guard extension is missing entirely the middleware fails
/// open: it logs an error and runs the handler unthrottled. Broken
/// wiring degrades to availability, not to a hard failure, and tests
/// rely on exactly that.
pub async fn rate_limit(req: Request<Body>, next: Next) -> Response {
    let Some(guard) = req.extensions().get::<Arc<RateLimitGuard>>().cloned() else {
        error!("rate limit guard extension missing from request, failing open");
        return next.run(req).await;
    };

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let identity = client_identity(req.headers(), peer);

    if guard.limiter.check(&identity) {
        let response = next.run(req).await;
        if guard.remaining_header {
            return with_remaining(response, guard.limiter.remaining(&identity));
        }
        return response;
    }

    deny(&guard, &identity, &req)
}

/// Build the denial response and emit the warning log line.
fn deny(guard: &RateLimitGuard, identity: &str, req: &Request<Body>) -> Response {
    let limiter = &guard.limiter;

    let details = guard.diagnostics.as_ref().and_then(|diagnostics| {
        match catch_unwind(AssertUnwindSafe(|| diagnostics(identity))) {
            Ok(details) => Some(details),
            Err(_) => {
                error!(
                    limiter = %limiter.name(),
                    identity = %identity,
                    "diagnostics callback panicked, continuing with denial"
                );
                None
            }
        }
    });
    match &details {
        Some(details) => warn!(
            limiter = %limiter.name(),
            identity = %identity,
            %details,
            "request denied by rate limit"
        ),
        None => warn!(
            limiter = %limiter.name(),
            identity = %identity,
            "request denied by rate limit"
        ),
    }

    if let Some(target) = &guard.redirect {
        if let Some(sink) = &guard.warnings {
            sink.notify_warning(req, &guard.message);
        }
        return Redirect::to(target).into_response();
    }

    let retry_after = limiter.policy().window.as_secs();
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after.to_string())],
        Json(DenialBody {
            detail: guard.message.clone(),
            retry_after,
        }),
    )
        .into_response()
}

fn with_remaining(mut response: Response, remaining: u32) -> Response {
    if let Ok(value) = HeaderValue::from_str(&remaining.to_string()) {
        response.headers_mut().insert("x-ratelimit-remaining", value);
    }
    response
}
