//! # pax-api — Axum HTTP Surface for the PAX Stack
//!
//! Personnel Access eXchange: access-rule lifecycle, lifecycle-event
//! intake, scheduled-action runs, and read-only audit trails.
//!
//! ## API Surface
//!
//! | Prefix                 | Module                  | Domain                     |
//! |------------------------|-------------------------|----------------------------|
//! | `/v1/rules/*`          | [`routes::rules`]       | Access-rule lifecycle      |
//! | `/v1/events/lifecycle` | [`routes::lifecycle`]   | Lifecycle-event intake     |
//! | `/v1/admin/*`          | [`routes::admin`]       | Operational triggers       |
//! | `/v1/audit/*`          | [`routes::audit`]       | Event and job audit trails |
//! | `/v1/relay/log`        | [`routes::audit`]       | Relay observability log    |
//!
//! Health probes live at `/health/*`; the OpenAPI spec at `/openapi.json`.

pub mod error;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::rules::router())
        .merge(routes::lifecycle::router())
        .merge(routes::admin::router())
        .merge(routes::audit::router())
        .merge(openapi::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

/// Liveness probe — always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe — returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}
