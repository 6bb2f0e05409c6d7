use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use rumqttc::AsyncClient;
use serde_json::json;
use std::net::SocketAddr;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::dispatch::{self, Command};
use crate::state::{format_wire_ts, NodeStore, PumpStatus};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub store: NodeStore,
    pub mqtt: AsyncClient,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(api_status))
        .route("/api/node/{id}/pump/run", post(run_pump))
        .route("/api/node/{id}/sensor/update", post(request_sensor_update))
        .route("/api/node/{id}/led/toggle", post(toggle_led))
        .with_state(state)
}

async fn api_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.snapshot().await)
}

/// Manual pump activation. The run time is recorded right away; like the
/// automatic path, the device never confirms.
async fn run_pump(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    let now = OffsetDateTime::now_utc();
    if let Err(e) = dispatch::send(&state.mqtt, &id, Command::RunPump).await {
        return dispatch_failed(&state, &id, e).await;
    }
    state
        .store
        .set_pump_status(&id, PumpStatus::LastRunAt(now))
        .await;
    Json(json!({ "status": "success", "last_run": format_wire_ts(now) })).into_response()
}

async fn request_sensor_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if let Err(e) = dispatch::send(&state.mqtt, &id, Command::RequestSensorUpdate).await {
        return dispatch_failed(&state, &id, e).await;
    }
    Json(json!({ "status": "success" })).into_response()
}

async fn toggle_led(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    if let Err(e) = dispatch::send(&state.mqtt, &id, Command::ToggleIndicator).await {
        return dispatch_failed(&state, &id, e).await;
    }
    Json(json!({ "status": "success" })).into_response()
}

async fn dispatch_failed(
    state: &AppState,
    node_id: &str,
    err: anyhow::Error,
) -> axum::response::Response {
    error!(node = %node_id, "command dispatch failed: {err}");
    state
        .store
        .record_error(format!("{node_id}: command dispatch failed: {err}"))
        .await;
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "status": "error" })),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(state: AppState, port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.expect("failed to bind web port");

    info!("api listening on http://{addr}");

    axum::serve(listener, router(state))
        .await
        .expect("web server error");
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state() -> (AppState, rumqttc::EventLoop) {
        let opts = rumqttc::MqttOptions::new("test-web", "127.0.0.1", 1883);
        let (mqtt, eventloop) = AsyncClient::new(opts, 10);
        (
            AppState {
                store: NodeStore::new(500),
                mqtt,
            },
            eventloop,
        )
    }

    async fn body_json(res: axum::response::Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn status_endpoint_returns_snapshot() {
        let (state, _el) = test_state();
        state
            .store
            .upsert_sensor_reading("n1", "moisture", 44.0, OffsetDateTime::now_utc())
            .await;

        let res = router(state)
            .oneshot(Request::builder().uri("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["nodes"]["n1"]["sensors"]["moisture"]["value"], 44.0);
        assert_eq!(json["mqtt_connected"], false);
    }

    #[tokio::test]
    async fn run_pump_records_last_run() {
        let (state, _el) = test_state();
        let store = state.store.clone();

        let res = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/node/n1/pump/run")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["status"], "success");
        let last_run = json["last_run"].as_str().unwrap().to_string();

        // The store entry was created lazily and carries the same timestamp
        // the response reported.
        let snap = store.snapshot().await;
        assert_eq!(snap.nodes["n1"].pump, last_run);
    }

    #[tokio::test]
    async fn sensor_update_does_not_touch_store() {
        let (state, _el) = test_state();
        let store = state.store.clone();

        let res = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/node/n1/sensor/update")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["status"], "success");
        // Fire-and-forget: no node entry appears until the device replies.
        assert!(store.snapshot().await.nodes.is_empty());
    }

    #[tokio::test]
    async fn led_toggle_returns_success() {
        let (state, _el) = test_state();

        let res = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/node/kitchen/led/toggle")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["status"], "success");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (state, _el) = test_state();

        let res = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/node/n1/pump/stop")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
