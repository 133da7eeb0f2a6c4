//! Axum-based HTTP server: read-only views of the monitor plus identity
//! selection and notice acknowledgement

use crate::display::DisplayView;
use crate::identity::SessionIdentity;
use crate::monitor::MonitorHandle;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub monitor: MonitorHandle,
    pub currency_symbol: String,
}

#[derive(Debug, Deserialize)]
pub struct IdentityBody {
    pub account_id: String,
    pub charge_point_id: String,
}

fn command_result(res: crate::error::Result<()>) -> impl IntoResponse {
    match res {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"ok": true}))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"ok": false, "error": e.to_string()})),
        ),
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn version() -> impl IntoResponse {
    Json(serde_json::json!({ "version": env!("APP_VERSION") }))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.monitor.current();
    Json(DisplayView::project(&snapshot, &state.currency_symbol))
}

async fn snapshot(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.monitor.current();
    Json((*snapshot).clone())
}

async fn set_identity(
    State(state): State<AppState>,
    Json(body): Json<IdentityBody>,
) -> axum::response::Response {
    let account = body.account_id.trim();
    let cp = body.charge_point_id.trim();
    if account.is_empty() || cp.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "ok": false,
                "error": "account_id and charge_point_id are required"
            })),
        )
            .into_response();
    }
    command_result(state.monitor.set_identity(SessionIdentity::new(account, cp))).into_response()
}

async fn clear_identity(State(state): State<AppState>) -> impl IntoResponse {
    command_result(state.monitor.clear_identity())
}

async fn acknowledge_notice(State(state): State<AppState>) -> impl IntoResponse {
    command_result(state.monitor.acknowledge_notice())
}

async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let currency = state.currency_symbol.clone();
    let stream = WatchStream::new(state.monitor.subscribe()).filter_map(move |snapshot| {
        let view = DisplayView::project(&snapshot, &currency);
        Event::default()
            .event("status")
            .json_data(&view)
            .ok()
            .map(Ok::<Event, std::convert::Infallible>)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/version", get(version))
        .route("/api/status", get(status))
        .route("/api/snapshot", get(snapshot))
        .route("/api/identity", post(set_identity).delete(clear_identity))
        .route("/api/notice/ack", post(acknowledge_notice))
        .route("/api/events", get(events))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let router = build_router(state);
    let logger = crate::logging::get_logger("web");

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!("Invalid host '{}'; falling back to 127.0.0.1", host));
            ([127, 0, 0, 1], port).into()
        }
    };
    logger.info(&format!("Binding web server to {}", addr));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}
