//! REST API handlers.
//!
//! Each handler drives the shared `ConnectionMonitor` and returns JSON
//! responses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{debug, info};

use connscale_core::{ConnEvent, MonitorKey, SignalRecord, ThresholdConfig};
use connscale_monitor::{MonitorError, render_prometheus};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn monitor_error_response(e: &MonitorError) -> axum::response::Response {
    let status = match e {
        MonitorError::CapacityExceeded { .. } => StatusCode::SERVICE_UNAVAILABLE,
        MonitorError::UnknownKey(_) => StatusCode::NOT_FOUND,
        MonitorError::Config(_) => StatusCode::BAD_REQUEST,
    };
    error_response(&e.to_string(), status).into_response()
}

/// Parse a key from its path form, or produce the 400 response.
fn parse_key(raw: &str) -> Result<MonitorKey, axum::response::Response> {
    raw.parse::<MonitorKey>()
        .map_err(|e| error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response())
}

// ── Keys ───────────────────────────────────────────────────────

/// GET /api/v1/keys
pub async fn list_keys(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.monitor.all_stats())
}

/// GET /api/v1/keys/:key
pub async fn get_key(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let key = match parse_key(&key) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match state.monitor.stats(&key) {
        Some(stats) => ApiResponse::ok(stats).into_response(),
        None => error_response("key not registered", StatusCode::NOT_FOUND).into_response(),
    }
}

/// POST /api/v1/keys/:key
pub async fn register_key(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let key = match parse_key(&key) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match state.monitor.register(key) {
        Ok(true) => {
            info!(%key, "key registered via API");
            (StatusCode::CREATED, ApiResponse::ok(key)).into_response()
        }
        Ok(false) => ApiResponse::ok(key).into_response(),
        Err(e) => monitor_error_response(&e),
    }
}

/// DELETE /api/v1/keys/:key
pub async fn unregister_key(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let key = match parse_key(&key) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    if state.monitor.unregister(&key) {
        info!(%key, "key unregistered via API");
        ApiResponse::ok("deleted").into_response()
    } else {
        error_response("key not registered", StatusCode::NOT_FOUND).into_response()
    }
}

/// Gate clearing response body.
#[derive(serde::Serialize)]
struct GateCleared {
    key: MonitorKey,
    was_held: bool,
}

/// DELETE /api/v1/keys/:key/gate
pub async fn clear_gate(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    let key = match parse_key(&key) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match state.monitor.clear_gate(&key) {
        Ok(was_held) => ApiResponse::ok(GateCleared { key, was_held }).into_response(),
        Err(e) => monitor_error_response(&e),
    }
}

// ── Thresholds ─────────────────────────────────────────────────

/// Threshold slots view.
#[derive(serde::Serialize)]
struct ThresholdView {
    /// Raw slots `[lower_limit, upper_limit, buffer_length]`.
    slots: [Option<u32>; 3],
    /// The bounds events are evaluated against, if consistent.
    active: Option<ThresholdConfig>,
}

/// GET /api/v1/thresholds
pub async fn get_thresholds(State(state): State<ApiState>) -> impl IntoResponse {
    let slots = state.monitor.thresholds();
    ApiResponse::ok(ThresholdView {
        slots: slots.raw(),
        active: slots.load(),
    })
}

/// PUT /api/v1/thresholds
pub async fn put_thresholds(
    State(state): State<ApiState>,
    Json(config): Json<ThresholdConfig>,
) -> impl IntoResponse {
    match state.monitor.thresholds().store(config) {
        Ok(()) => {
            info!(
                lower_limit = config.lower_limit,
                upper_limit = config.upper_limit,
                buffer_length = config.buffer_length,
                "thresholds updated"
            );
            ApiResponse::ok(config).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    }
}

/// Single-slot write body.
#[derive(serde::Deserialize)]
pub struct SlotWrite {
    pub value: u32,
}

/// PUT /api/v1/thresholds/:slot
pub async fn put_threshold_slot(
    State(state): State<ApiState>,
    Path(slot): Path<usize>,
    Json(req): Json<SlotWrite>,
) -> impl IntoResponse {
    let slots = state.monitor.thresholds();
    match slots.write_slot(slot, req.value) {
        Ok(()) => {
            info!(slot, value = req.value, "threshold slot updated");
            ApiResponse::ok(ThresholdView {
                slots: slots.raw(),
                active: slots.load(),
            })
            .into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    }
}

// ── Events ─────────────────────────────────────────────────────

/// Batch ingestion summary.
#[derive(serde::Serialize)]
struct IngestSummary {
    received: usize,
    /// Signals fired while processing this batch.
    signals: Vec<SignalRecord>,
}

/// POST /api/v1/events
pub async fn ingest_events(
    State(state): State<ApiState>,
    Json(events): Json<Vec<ConnEvent>>,
) -> impl IntoResponse {
    let signals = events
        .iter()
        .filter_map(|event| {
            state
                .monitor
                .on_event(event)
                .direction()
                .map(|direction| SignalRecord {
                    key: event.key,
                    direction,
                    buffer_length: None,
                })
        })
        .collect();
    debug!(received = events.len(), "event batch ingested");

    ApiResponse::ok(IngestSummary {
        received: events.len(),
        signals,
    })
}

// ── Metrics ────────────────────────────────────────────────────

/// GET /api/v1/stats
pub async fn get_stats(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.monitor.metrics())
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = render_prometheus(&state.monitor.metrics(), &state.monitor.all_stats());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use connscale_core::{GatePolicy, MonitorSettings};
    use connscale_monitor::{ConnectionMonitor, SignalStream};

    fn test_state() -> (ApiState, SignalStream) {
        let (monitor, stream) = ConnectionMonitor::new(&MonitorSettings {
            gate: GatePolicy::Latched,
            max_keys: 2,
            signal_slots: 1,
            slot_capacity: 16,
        });
        let monitor = monitor
            .with_thresholds(ThresholdConfig::new(2, 10, 3).unwrap())
            .unwrap();
        (
            ApiState {
                monitor: Arc::new(monitor),
            },
            stream,
        )
    }

    #[tokio::test]
    async fn list_keys_empty() {
        let (state, _stream) = test_state();
        let resp = list_keys(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_then_reregister() {
        let (state, _stream) = test_state();

        let resp = register_key(State(state.clone()), Path("port:8080".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = register_key(State(state.clone()), Path("port:8080".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(state.monitor.is_watched(&MonitorKey::Port(8080)));
    }

    #[tokio::test]
    async fn register_bad_key_is_400() {
        let (state, _stream) = test_state();
        let resp = register_key(State(state), Path("socket:1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_over_capacity_is_503() {
        let (state, _stream) = test_state();
        for key in ["port:1", "port:2"] {
            register_key(State(state.clone()), Path(key.to_string())).await;
        }
        let resp = register_key(State(state), Path("port:3".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn get_unknown_key_is_404() {
        let (state, _stream) = test_state();
        let resp = get_key(State(state), Path("netns:1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unregister_unknown_key_is_404() {
        let (state, _stream) = test_state();
        let resp = unregister_key(State(state), Path("netns:1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ingest_fires_and_clear_gate_rearms() {
        let (state, mut stream) = test_state();
        let key = MonitorKey::Netns(7);
        state.monitor.register(key).unwrap();

        let closes = vec![ConnEvent { key, state: 7 }; 3];
        let resp = ingest_events(State(state.clone()), Json(closes))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(stream.drain().len(), 1);
        assert!(state.monitor.stats(&key).unwrap().gated);

        let resp = clear_gate(State(state.clone()), Path("netns:7".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!state.monitor.stats(&key).unwrap().gated);
    }

    #[tokio::test]
    async fn clear_gate_unknown_key_is_404() {
        let (state, _stream) = test_state();
        let resp = clear_gate(State(state), Path("port:9".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_invalid_thresholds_is_400() {
        let (state, _stream) = test_state();
        let bad = ThresholdConfig {
            lower_limit: 10,
            upper_limit: 2,
            buffer_length: 3,
        };
        let resp = put_thresholds(State(state.clone()), Json(bad))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        // Previous bounds untouched.
        assert_eq!(
            state.monitor.thresholds().load(),
            Some(ThresholdConfig::new(2, 10, 3).unwrap())
        );
    }

    #[tokio::test]
    async fn put_slot_updates_live() {
        let (state, _stream) = test_state();
        let resp = put_threshold_slot(State(state.clone()), Path(2), Json(SlotWrite { value: 5 }))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            state.monitor.thresholds().load().map(|c| c.buffer_length),
            Some(5)
        );

        let resp = put_threshold_slot(State(state), Path(7), Json(SlotWrite { value: 5 }))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
