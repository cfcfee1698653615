//! connscale-api: REST API for connscale.
//!
//! The control surface external actors use to drive the monitor:
//! registering keys before traffic arrives, rewriting thresholds live,
//! clearing scaling gates once a signal has been acted on, and feeding
//! extracted connection events in.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/keys` | List registered keys with their state |
//! | GET | `/api/v1/keys/{key}` | Get one key's state |
//! | POST | `/api/v1/keys/{key}` | Register a key |
//! | DELETE | `/api/v1/keys/{key}` | Unregister a key |
//! | DELETE | `/api/v1/keys/{key}/gate` | Clear a key's scaling gate |
//! | GET | `/api/v1/thresholds` | Read the threshold slots |
//! | PUT | `/api/v1/thresholds` | Replace all three bounds |
//! | PUT | `/api/v1/thresholds/{slot}` | Rewrite one slot |
//! | POST | `/api/v1/events` | Ingest a batch of `{key, state}` events |
//! | GET | `/api/v1/stats` | Monitor counters as JSON |
//! | GET | `/metrics` | Prometheus exposition |
//!
//! Keys appear in paths in their text form, e.g. `/api/v1/keys/port:8080`.

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use connscale_monitor::ConnectionMonitor;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub monitor: Arc<ConnectionMonitor>,
}

/// Build the complete API router (REST + metrics).
pub fn build_router(monitor: Arc<ConnectionMonitor>) -> Router {
    let api_state = ApiState { monitor };

    let api_routes = Router::new()
        .route("/keys", get(handlers::list_keys))
        .route(
            "/keys/{key}",
            get(handlers::get_key)
                .post(handlers::register_key)
                .delete(handlers::unregister_key),
        )
        .route("/keys/{key}/gate", delete(handlers::clear_gate))
        .route(
            "/thresholds",
            get(handlers::get_thresholds).put(handlers::put_thresholds),
        )
        .route("/thresholds/{slot}", put(handlers::put_threshold_slot))
        .route("/events", post(handlers::ingest_events))
        .route("/stats", get(handlers::get_stats))
        .with_state(api_state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(api_state))
}
