//! Enforcement parameters for a guarded route.

use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;

use crate::ratelimit::Limiter;

/// Receives the user-facing warning emitted when a browser flow is
/// denied.
///
/// This is the seam to the application's session or flash-message
/// mechanism. The middleware only triggers the side effect, on the
/// redirect branch, and consumes no result.
pub trait WarningSink: Send + Sync {
    fn notify_warning(&self, request: &Request<Body>, message: &str);
}

/// Produces extra diagnostic text for the denial log line, given the
/// resolved identity.
pub type DiagnosticsFn = dyn Fn(&str) -> String + Send + Sync;

const DEFAULT_MESSAGE: &str = "Too many requests. Wait a moment before trying again.";

/// Per-route enforcement parameters consumed by
/// [`rate_limit`](super::rate_limit).
///
/// Attach it to the route as an extension so the middleware can find it:
///
/// ```ignore
/// Router::new()
///     .route("/login", post(login))
///     .layer(middleware::from_fn(rate_limit))
///     .layer(Extension(Arc::new(
///         RateLimitGuard::new(limiter).with_redirect("/login"),
///     )))
/// ```
pub struct RateLimitGuard {
    pub(crate) limiter: Arc<dyn Limiter>,
    pub(crate) message: String,
    pub(crate) redirect: Option<String>,
    pub(crate) diagnostics: Option<Arc<DiagnosticsFn>>,
    pub(crate) warnings: Option<Arc<dyn WarningSink>>,
    pub(crate) remaining_header: bool,
}

impl RateLimitGuard {
    pub fn new(limiter: Arc<dyn Limiter>) -> Self {
        Self {
            limiter,
            message: DEFAULT_MESSAGE.to_string(),
            redirect: None,
            diagnostics: None,
            warnings: None,
            remaining_header: false,
        }
    }

    /// Custom denial message, used in the structured payload or the flash
    /// warning.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Deny browser flows with a redirect to `target` instead of a
    /// structured payload.
    pub fn with_redirect(mut self, target: impl Into<String>) -> Self {
        self.redirect = Some(target.into());
        self
    }

    /// Append callback-derived context to the denial log line.
    ///
    /// A panicking callback is caught and logged; it never changes the
    /// enforcement decision.
    pub fn with_diagnostics(
        mut self,
        diagnostics: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.diagnostics = Some(Arc::new(diagnostics));
        self
    }

    /// Route the denial warning side effect through `sink`.
    pub fn with_warning_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.warnings = Some(sink);
        self
    }

    /// Annotate allowed responses with an `X-RateLimit-Remaining` header.
    pub fn with_remaining_header(mut self) -> Self {
        self.remaining_header = true;
        self
    }
}

impl fmt::Debug for RateLimitGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitGuard")
            .field("limiter", &self.limiter.name())
            .field("message", &self.message)
            .field("redirect", &self.redirect)
            .field("remaining_header", &self.remaining_header)
            .finish_non_exhaustive()
    }
}
