//! HTTP surface for health probes.
//!
//! A single endpoint, `GET /health`, renders the [`HealthChecker`]'s status
//! document as JSON: 200 when healthy, 503 when any subcheck fails. This is
//! intended for load balancers and orchestration liveness probes.

use std::sync::Arc;

use crate::health::HealthChecker;

pub mod health;

pub use health::health_handler;

/// Shared application state, passed to handlers via axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    checker: HealthChecker,
}

impl AppState {
    pub fn new(checker: HealthChecker) -> Self {
        AppState {
            inner: Arc::new(AppStateInner { checker }),
        }
    }

    pub fn checker(&self) -> &HealthChecker {
        &self.inner.checker
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/health", get(health_handler))
        .with_state(app_state)
}
